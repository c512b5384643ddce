//! Test utilities: small programs and interpreter-based checks.

use cachet_ir::interp::{self, Memory};
use cachet_ir::{BlockRealize, DType, Expr, For, IterVar, MemoryType, Module, Stmt, Store, Tensor, TensorTable};

/// Declare a float tensor with its own global buffer.
pub fn declare(tensors: &mut TensorTable, name: &str, shape: &[i64]) {
    tensors.declare_with_buffer(Tensor::new(name, DType::Float32, shape.iter().copied()), MemoryType::Global).unwrap();
}

/// Declare a float tensor sharing the buffer of `of`.
pub fn declare_alias(tensors: &mut TensorTable, name: &str, of: &str) {
    let source = tensors.tensor(of).unwrap().clone();
    let mut alias = Tensor::new(name, source.dtype, source.shape.iter().copied());
    alias.buffer = source.buffer;
    tensors.declare(alias).unwrap();
}

/// `for var in 0..extent { block (v{var} = var) { body(v{var}) } }`
///
/// Bodies are left unwrapped so the primitives have something to normalize.
pub fn loop_block(var: &str, extent: i64, block: &str, body: impl FnOnce(Expr) -> Store) -> Stmt {
    let iv = format!("v{var}");
    let store = body(Expr::var(iv.as_str()));
    let realize = BlockRealize::builder()
        .name(block)
        .iter_vars(vec![IterVar::spatial(iv.as_str(), extent)])
        .iter_values(vec![Expr::var(var)])
        .body(store)
        .build();
    For::builder().var(var).extent(extent).body(realize).build().into()
}

/// X -> A -> B over `n` elements:
///
/// ```text
/// for i: A[vi] = X[vi] * 2.0
/// for j: B[vj] = A[vj] + 1.0
/// ```
pub fn producer_consumer(n: i64) -> Module {
    let mut tensors = TensorTable::new();
    for name in ["X", "A", "B"] {
        declare(&mut tensors, name, &[n]);
    }
    let mut module = Module::new(tensors);
    module.push_program(Stmt::Seq(vec![
        loop_block("i", n, "A", |v| Store::new("A", [v.clone()], Expr::load("X", [v]) * Expr::float(2.0))),
        loop_block("j", n, "B", |v| Store::new("B", [v.clone()], Expr::load("A", [v]) + Expr::float(1.0))),
    ]));
    module
}

/// Row sums of X[rows, cols] into C with a zero-initialization twin:
///
/// ```text
/// for i:
///   C__reduce_init[vi] = 0.0
///   for k: C[vi] = C[vi] + X[vi, vk]
/// ```
pub fn row_sum(rows: i64, cols: i64) -> Module {
    let mut tensors = TensorTable::new();
    declare(&mut tensors, "X", &[rows, cols]);
    declare(&mut tensors, "C", &[rows]);
    declare_alias(&mut tensors, "C__reduce_init", "C");

    let init = BlockRealize::builder()
        .name("C__reduce_init")
        .iter_vars(vec![IterVar::spatial("vi", rows)])
        .iter_values(vec![Expr::var("i")])
        .body(Store::new("C__reduce_init", [Expr::var("vi")], Expr::float(0.0)))
        .build();
    let update = BlockRealize::builder()
        .name("C")
        .iter_vars(vec![IterVar::spatial("vi", rows), IterVar::reduce("vk", cols)])
        .iter_values(vec![Expr::var("i"), Expr::var("k")])
        .body(Store::new(
            "C",
            [Expr::var("vi")],
            Expr::load("C", [Expr::var("vi")]) + Expr::load("X", [Expr::var("vi"), Expr::var("vk")]),
        ))
        .build();
    let body = Stmt::Seq(vec![init.into(), For::builder().var("k").extent(cols).body(update).build().into()]);

    let mut module = Module::new(tensors);
    module.push_program(For::builder().var("i").extent(rows).body(body).build());
    module
}

pub fn ramp(n: i64) -> Vec<f64> {
    (0..n).map(|i| i as f64 * 0.5 + 1.0).collect()
}

pub fn run(module: &Module, inputs: &[(&str, Vec<f64>)]) -> Memory {
    interp::run(module, inputs.iter().map(|(name, data)| (*name, data.clone()))).unwrap()
}

/// Contents of `tensor` after running `module`.
pub fn output(module: &Module, inputs: &[(&str, Vec<f64>)], tensor: &str) -> Vec<f64> {
    run(module, inputs).tensor(&module.tensors, tensor).unwrap().to_vec()
}

/// Root body of program `index` as a sequence.
pub fn body(module: &Module, index: usize) -> &[Stmt] {
    let root = module.root(index).unwrap().as_realize().unwrap();
    root.block.body.as_seq().unwrap()
}

//! Reference interpreter.
//!
//! Executes every program of a module in order over buffer-backed storage.
//! Loads and stores go through the tensor's bound buffer, so aliased tensors
//! observe each other's writes. Values are kept as `f64` and converted to the
//! tensor's dtype on load.

use std::collections::{BTreeMap, HashMap};

use snafu::{OptionExt, ensure};

use crate::error::{
    DivisionByZeroSnafu, InputSizeMismatchSnafu, NonIntegerValueSnafu, OutOfBoundsSnafu, RankMismatchSnafu, Result,
    UnboundVariableSnafu, UnknownIntrinsicSnafu,
};
use crate::expr::Expr;
use crate::module::Module;
use crate::stmt::Stmt;
use crate::tensor::TensorTable;
use crate::types::{ConstValue, DType};

/// Intrinsics the interpreter accepts as no-ops.
const NOOP_INTRINSICS: &[&str] = &["__syncthreads"];

/// Contents of every buffer after a run, keyed by buffer name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Memory {
    pub buffers: BTreeMap<String, Vec<f64>>,
}

impl Memory {
    /// Data of the buffer currently bound to `tensor`.
    pub fn tensor<'a>(&'a self, tensors: &TensorTable, tensor: &str) -> Result<&'a [f64]> {
        let buffer = tensors.buffer_of(tensor)?;
        Ok(self.buffers.get(&buffer.name).map(Vec::as_slice).unwrap_or_default())
    }
}

/// Run every program of `module`, seeding tensors from `inputs`.
pub fn run<'a>(module: &Module, inputs: impl IntoIterator<Item = (&'a str, Vec<f64>)>) -> Result<Memory> {
    let mut interp = Interpreter::new(&module.tensors);
    for (tensor, data) in inputs {
        interp.seed(tensor, data)?;
    }
    for root in &module.exprs {
        interp.exec(root)?;
    }
    Ok(interp.memory)
}

struct Interpreter<'m> {
    tensors: &'m TensorTable,
    memory: Memory,
    env: HashMap<String, i64>,
}

impl<'m> Interpreter<'m> {
    fn new(tensors: &'m TensorTable) -> Self {
        let buffers = tensors.buffers().map(|b| (b.name.clone(), vec![0.0; b.numel().max(0) as usize])).collect();
        Self { tensors, memory: Memory { buffers }, env: HashMap::new() }
    }

    fn seed(&mut self, tensor: &str, data: Vec<f64>) -> Result<()> {
        let buffer = self.tensors.buffer_of(tensor)?;
        let expected = buffer.numel().max(0) as usize;
        ensure!(data.len() == expected, InputSizeMismatchSnafu { tensor, expected, got: data.len() });
        self.memory.buffers.insert(buffer.name.clone(), data);
        Ok(())
    }

    fn exec(&mut self, stmt: &Stmt) -> Result<()> {
        match stmt {
            Stmt::Seq(stmts) => stmts.iter().try_for_each(|s| self.exec(s)),
            Stmt::For(node) => {
                let min = self.eval_int(&node.min, "loop min")?;
                let extent = self.eval_int(&node.extent, "loop extent")?;
                let saved = self.env.get(&node.var.name).copied();
                for i in min..min + extent {
                    self.env.insert(node.var.name.clone(), i);
                    self.exec(&node.body)?;
                }
                self.restore(&node.var.name, saved);
                Ok(())
            }
            Stmt::Realize(realize) => {
                let values =
                    realize.iter_values.iter().map(|v| self.eval_int(v, "iter value")).collect::<Result<Vec<_>>>()?;
                let saved: Vec<_> = realize
                    .block
                    .iter_vars
                    .iter()
                    .zip(values)
                    .map(|(iv, value)| (iv.var.name.clone(), self.env.insert(iv.var.name.clone(), value)))
                    .collect();
                self.exec(&realize.block.body)?;
                for (name, old) in saved {
                    self.restore(&name, old);
                }
                Ok(())
            }
            Stmt::Store(store) => {
                let value = self.eval(&store.value)?.as_f64();
                let offset = self.offset(&store.tensor, &store.indices)?;
                let buffer = self.tensors.buffer_of(&store.tensor)?;
                if let Some(slot) = self.memory.buffers.get_mut(&buffer.name).and_then(|data| data.get_mut(offset)) {
                    *slot = value;
                }
                Ok(())
            }
            Stmt::Evaluate(expr) => self.eval(expr).map(|_| ()),
        }
    }

    fn restore(&mut self, name: &str, old: Option<i64>) {
        match old {
            Some(v) => self.env.insert(name.to_string(), v),
            None => self.env.remove(name),
        };
    }

    fn eval(&self, expr: &Expr) -> Result<ConstValue> {
        match expr {
            Expr::Const(c) => Ok(*c),
            Expr::Var(v) => self.env.get(&v.name).map(|&i| ConstValue::Int(i)).context(UnboundVariableSnafu {
                name: v.name.clone(),
            }),
            Expr::Binary(op, a, b) => {
                let (a, b) = (self.eval(a)?, self.eval(b)?);
                a.apply(*op, b).context(DivisionByZeroSnafu)
            }
            Expr::Load(load) => {
                let offset = self.offset(&load.tensor, &load.indices)?;
                let dtype = self.tensors.tensor(&load.tensor)?.dtype;
                let buffer = self.tensors.buffer_of(&load.tensor)?;
                let raw = self.memory.buffers.get(&buffer.name).and_then(|data| data.get(offset)).copied();
                Ok(ConstValue::from_f64(raw.unwrap_or_default(), dtype))
            }
            Expr::Call { name, .. } => {
                ensure!(NOOP_INTRINSICS.contains(&name.as_str()), UnknownIntrinsicSnafu { name: name.clone() });
                Ok(ConstValue::from_f64(0.0, DType::Void))
            }
        }
    }

    fn eval_int(&self, expr: &Expr, context: &'static str) -> Result<i64> {
        self.eval(expr)?.as_int().context(NonIntegerValueSnafu { context })
    }

    /// Row-major offset of an access into its tensor's buffer.
    fn offset(&self, tensor: &str, indices: &[Expr]) -> Result<usize> {
        let buffer = self.tensors.buffer_of(tensor)?;
        ensure!(
            indices.len() == buffer.shape.len(),
            RankMismatchSnafu { tensor, expected: buffer.shape.len(), got: indices.len() }
        );
        let index = indices.iter().map(|idx| self.eval_int(idx, "index")).collect::<Result<Vec<_>>>()?;
        let in_bounds = index.iter().zip(&buffer.shape).all(|(&i, &dim)| (0..dim).contains(&i));
        ensure!(in_bounds, OutOfBoundsSnafu { tensor, index: index.clone(), shape: buffer.shape.to_vec() });
        Ok(index.iter().zip(&buffer.shape).fold(0i64, |acc, (&i, &dim)| acc * dim + i) as usize)
    }
}

//! Region analysis against brute-force enumeration.

use cachet_ir::types::{floor_div, floor_mod};
use cachet_ir::{BlockRealize, Expr, For, IterVar, Stmt, Store, StmtPath};
use proptest::prelude::*;

use crate::calculate_tensor_region;

/// `for i in 0..ei: for j in 0..ej: block (vi = i, vj = j) { A[index] = 0 }`
fn nest(ei: i64, ej: i64, index: Expr) -> (Stmt, StmtPath) {
    let block = BlockRealize::builder()
        .name("B")
        .iter_vars(vec![IterVar::spatial("vi", ei), IterVar::spatial("vj", ej)])
        .iter_values(vec![Expr::var("i"), Expr::var("j")])
        .body(Store::new("A", [index], Expr::float(0.0)))
        .build();
    let root: Stmt = For::builder()
        .var("i")
        .extent(ei)
        .body(For::builder().var("j").extent(ej).body(block).build())
        .build()
        .into();
    let path = root.find_block("B").unwrap_or_default();
    (root, path)
}

fn values(ei: i64, ej: i64, f: impl Fn(i64, i64) -> i64) -> (i64, i64) {
    let all: Vec<i64> = (0..ei).flat_map(|i| (0..ej).map(move |j| (i, j))).map(|(i, j)| f(i, j)).collect();
    (all.iter().copied().min().unwrap_or_default(), all.iter().copied().max().unwrap_or_default())
}

fn affine(a: i64, b: i64, c: i64) -> Expr {
    Expr::var("vi") * a + Expr::var("vj") * b + c
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(300))]

    /// Affine indices are bounded exactly.
    #[test]
    fn affine_region_is_tight(ei in 1i64..8, ej in 1i64..8, a in -3i64..=3, b in -3i64..=3, c in -10i64..=10) {
        let (root, path) = nest(ei, ej, affine(a, b, c));
        let region = calculate_tensor_region(&root, &path, "A", &[affine(a, b, c)]).unwrap();

        let (lo, hi) = values(ei, ej, |i, j| a * i + b * j + c);
        let axis = region.axes()[0];
        prop_assert_eq!((axis.min, axis.max()), (lo, hi));
    }

    /// Floor division of an affine index is bounded exactly.
    #[test]
    fn division_region_is_tight(ei in 1i64..8, ej in 1i64..8, a in -3i64..=3, c in -10i64..=10, d in 1i64..6) {
        let index = affine(a, 1, c).floor_div(Expr::int(d));
        let (root, path) = nest(ei, ej, index.clone());
        let region = calculate_tensor_region(&root, &path, "A", &[index]).unwrap();

        let (lo, hi) = values(ei, ej, |i, j| floor_div(a * i + j + c, d).unwrap_or_default());
        let axis = region.axes()[0];
        prop_assert_eq!((axis.min, axis.max()), (lo, hi));
    }

    /// Modulo and min/max bounds contain every value the index takes.
    #[test]
    fn nonlinear_region_is_sound(ei in 1i64..8, ej in 1i64..8, a in -3i64..=3, c in -10i64..=10, d in 1i64..6, k in -5i64..10) {
        let cases: [(Expr, Box<dyn Fn(i64, i64) -> i64>); 3] = [
            (affine(a, 1, c).floor_mod(Expr::int(d)), Box::new(move |i, j| floor_mod(a * i + j + c, d).unwrap_or_default())),
            (affine(a, 1, c).min(Expr::int(k)), Box::new(move |i, j| (a * i + j + c).min(k))),
            (affine(a, 1, c).max(Expr::int(k)), Box::new(move |i, j| (a * i + j + c).max(k))),
        ];
        for (index, eval) in cases {
            let (root, path) = nest(ei, ej, index.clone());
            let region = calculate_tensor_region(&root, &path, "A", &[index]).unwrap();

            let (lo, hi) = values(ei, ej, eval);
            let axis = region.axes()[0];
            prop_assert!(axis.min <= lo && hi <= axis.max(), "[{}, {}] not within {}", lo, hi, region);
        }
    }
}

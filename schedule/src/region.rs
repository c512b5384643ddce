//! Region analysis.
//!
//! Computes the axis-aligned box of indices a tensor access can touch. Index
//! expressions are first rewritten in terms of loop variables (every enclosing
//! block's iteration variables are replaced by the values they are realized
//! with), then bounded over the ranges of the enclosing loops:
//!
//! - affine forms `c0 + c1*v1 + ... + cn*vn` are bounded exactly,
//! - `Div`/`Mod` by a positive constant, `Min` and `Max` are bounded by
//!   interval arithmetic over their operands,
//! - anything else is rejected as an unsupported access pattern.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;

use cachet_ir::types::{floor_div, floor_mod};
use cachet_ir::{BinaryOp, ConstValue, Expr, Shape, Stmt};
use itertools::Itertools;
use smallvec::SmallVec;

use crate::error::{Result, ScheduleError};

/// Index range of one axis: `min..min + extent`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AxisRange {
    pub min: i64,
    pub extent: i64,
}

impl AxisRange {
    pub const fn new(min: i64, extent: i64) -> Self {
        Self { min, extent }
    }

    /// Largest index in the range.
    pub const fn max(&self) -> i64 {
        self.min + self.extent - 1
    }

    pub fn union(self, other: AxisRange) -> AxisRange {
        let min = self.min.min(other.min);
        AxisRange::new(min, self.max().max(other.max()) - min + 1)
    }

    pub const fn contains(&self, other: &AxisRange) -> bool {
        self.min <= other.min && other.max() <= self.max()
    }
}

/// Box of indices, one range per tensor axis.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct Region(pub SmallVec<[AxisRange; 4]>);

impl Region {
    /// The whole index space of a tensor of `shape`.
    pub fn full(shape: &[i64]) -> Self {
        Region(shape.iter().map(|&dim| AxisRange::new(0, dim)).collect())
    }

    pub fn rank(&self) -> usize {
        self.0.len()
    }

    pub fn axes(&self) -> &[AxisRange] {
        &self.0
    }

    /// Per-axis bounding box of `self` and `other`.
    pub fn union(&self, other: &Region) -> Region {
        Region(self.0.iter().zip(&other.0).map(|(a, b)| a.union(*b)).collect())
    }

    pub fn contains(&self, other: &Region) -> bool {
        self.rank() == other.rank() && self.0.iter().zip(&other.0).all(|(a, b)| a.contains(b))
    }

    pub fn extents(&self) -> Shape {
        self.0.iter().map(|axis| axis.extent).collect()
    }

    pub fn mins(&self) -> SmallVec<[i64; 4]> {
        self.0.iter().map(|axis| axis.min).collect()
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}]", self.0.iter().map(|axis| format!("{}:{}", axis.min, axis.min + axis.extent)).join(", "))
    }
}

/// Closed integer interval `[lo, hi]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Interval {
    pub lo: i64,
    pub hi: i64,
}

impl Interval {
    pub const fn point(value: i64) -> Self {
        Self { lo: value, hi: value }
    }

    fn scale(self, k: i64) -> Self {
        let (a, b) = (self.lo * k, self.hi * k);
        Self { lo: a.min(b), hi: a.max(b) }
    }

    fn to_axis(self) -> AxisRange {
        AxisRange::new(self.lo, self.hi - self.lo + 1)
    }
}

/// Linear combination of variables with integer coefficients.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AffineForm {
    pub constant: i64,
    pub terms: BTreeMap<String, i64>,
}

impl AffineForm {
    /// Linearize `expr`, or `None` if it is not affine.
    pub fn of(expr: &Expr) -> Option<Self> {
        match expr {
            Expr::Const(ConstValue::Int(v)) => Some(Self { constant: *v, terms: BTreeMap::new() }),
            Expr::Var(v) => Some(Self { constant: 0, terms: BTreeMap::from([(v.name.clone(), 1)]) }),
            Expr::Binary(BinaryOp::Add, a, b) => Some(Self::of(a)?.plus(Self::of(b)?, 1)),
            Expr::Binary(BinaryOp::Sub, a, b) => Some(Self::of(a)?.plus(Self::of(b)?, -1)),
            Expr::Binary(BinaryOp::Mul, a, b) => {
                let (a, b) = (Self::of(a)?, Self::of(b)?);
                match (a.as_const(), b.as_const()) {
                    (Some(k), _) => Some(b.scaled(k)),
                    (_, Some(k)) => Some(a.scaled(k)),
                    _ => None,
                }
            }
            _ => None,
        }
    }

    fn as_const(&self) -> Option<i64> {
        self.terms.is_empty().then_some(self.constant)
    }

    fn plus(mut self, other: AffineForm, sign: i64) -> Self {
        self.constant += sign * other.constant;
        for (var, coeff) in other.terms {
            *self.terms.entry(var).or_default() += sign * coeff;
        }
        self.terms.retain(|_, coeff| *coeff != 0);
        self
    }

    fn scaled(mut self, k: i64) -> Self {
        self.constant *= k;
        self.terms.values_mut().for_each(|coeff| *coeff *= k);
        self.terms.retain(|_, coeff| *coeff != 0);
        self
    }
}

/// Loop ranges and iteration-variable bindings visible at one tree position.
#[derive(Debug, Clone, Default)]
pub struct BoundContext {
    /// Range of every enclosing loop variable; `None` if its bounds could not
    /// be determined or the loop never runs.
    vars: HashMap<String, Option<Interval>>,
    subst: HashMap<String, Expr>,
}

impl BoundContext {
    /// Context seen by the node at `path` under `root`, the node included.
    pub fn at(root: &Stmt, path: &[usize]) -> Self {
        let mut ctx = Self::default();
        ctx.enter(root);
        let mut node = root;
        for &i in path {
            let Some(child) = node.child(i) else { break };
            node = child;
            ctx.enter(node);
        }
        ctx
    }

    /// Account for the scope `stmt` opens.
    pub fn enter(&mut self, stmt: &Stmt) {
        match stmt {
            Stmt::For(node) => {
                let min = self.bound(&self.resolve(&node.min));
                let extent = self.bound(&self.resolve(&node.extent));
                let range = match (min, extent) {
                    (Ok(min), Ok(extent)) if extent.hi >= 1 => Some(Interval { lo: min.lo, hi: min.hi + extent.hi - 1 }),
                    _ => None,
                };
                self.vars.insert(node.var.name.clone(), range);
            }
            Stmt::Realize(realize) => {
                let bound: Vec<_> = realize
                    .block
                    .iter_vars
                    .iter()
                    .zip(&realize.iter_values)
                    .map(|(iv, value)| (iv.var.name.clone(), self.resolve(value)))
                    .collect();
                self.subst.extend(bound);
            }
            Stmt::Seq(_) | Stmt::Store(_) | Stmt::Evaluate(_) => {}
        }
    }

    /// Rewrite `expr` in terms of loop variables.
    pub fn resolve(&self, expr: &Expr) -> Expr {
        if self.subst.is_empty() { expr.clone() } else { expr.substitute(&self.subst) }
    }

    /// Loop variables `expr` depends on once resolved.
    pub fn loop_vars_of(&self, expr: &Expr) -> BTreeSet<String> {
        let mut vars = BTreeSet::new();
        self.resolve(expr).collect_vars(&mut vars);
        vars.retain(|var| self.vars.contains_key(var));
        vars
    }

    /// Bounds of an already resolved expression.
    pub fn bound(&self, expr: &Expr) -> std::result::Result<Interval, &'static str> {
        if let Some(form) = AffineForm::of(expr) {
            return self.bound_affine(&form);
        }
        match expr {
            Expr::Const(ConstValue::Int(v)) => Ok(Interval::point(*v)),
            Expr::Const(_) => Err("non-integer constant"),
            Expr::Var(v) => self.var_range(&v.name),
            Expr::Binary(op, a, b) => self.bound_binary(*op, a, b),
            Expr::Load(_) => Err("index depends on a tensor load"),
            Expr::Call { .. } => Err("index depends on an intrinsic call"),
        }
    }

    fn bound_affine(&self, form: &AffineForm) -> std::result::Result<Interval, &'static str> {
        form.terms.iter().try_fold(Interval::point(form.constant), |acc, (var, &coeff)| {
            let range = self.var_range(var)?.scale(coeff);
            Ok(Interval { lo: acc.lo + range.lo, hi: acc.hi + range.hi })
        })
    }

    fn var_range(&self, var: &str) -> std::result::Result<Interval, &'static str> {
        match self.vars.get(var) {
            Some(Some(range)) => Ok(*range),
            Some(None) => Err("enclosing loop bounds are not boundable or the loop is empty"),
            None => Err("free variable"),
        }
    }

    fn bound_binary(&self, op: BinaryOp, a: &Expr, b: &Expr) -> std::result::Result<Interval, &'static str> {
        let positive_divisor = || b.as_int().filter(|&c| c > 0).ok_or("divisor is not a positive constant");
        match op {
            BinaryOp::Add => {
                let (a, b) = (self.bound(a)?, self.bound(b)?);
                Ok(Interval { lo: a.lo + b.lo, hi: a.hi + b.hi })
            }
            BinaryOp::Sub => {
                let (a, b) = (self.bound(a)?, self.bound(b)?);
                Ok(Interval { lo: a.lo - b.hi, hi: a.hi - b.lo })
            }
            BinaryOp::Mul => match (a.as_int(), b.as_int()) {
                (Some(k), _) => Ok(self.bound(b)?.scale(k)),
                (_, Some(k)) => Ok(self.bound(a)?.scale(k)),
                _ => Err("non-constant multiplication"),
            },
            BinaryOp::Div => {
                let c = positive_divisor()?;
                let a = self.bound(a)?;
                match (floor_div(a.lo, c), floor_div(a.hi, c)) {
                    (Some(lo), Some(hi)) => Ok(Interval { lo, hi }),
                    _ => Err("divisor is not a positive constant"),
                }
            }
            BinaryOp::Mod => {
                let c = positive_divisor()?;
                let a = self.bound(a)?;
                match (floor_div(a.lo, c), floor_div(a.hi, c), floor_mod(a.lo, c), floor_mod(a.hi, c)) {
                    // The whole range lies within one period.
                    (Some(q0), Some(q1), Some(lo), Some(hi)) if q0 == q1 => Ok(Interval { lo, hi }),
                    _ => Ok(Interval { lo: 0, hi: c - 1 }),
                }
            }
            BinaryOp::Min => {
                let (a, b) = (self.bound(a)?, self.bound(b)?);
                Ok(Interval { lo: a.lo.min(b.lo), hi: a.hi.min(b.hi) })
            }
            BinaryOp::Max => {
                let (a, b) = (self.bound(a)?, self.bound(b)?);
                Ok(Interval { lo: a.lo.max(b.lo), hi: a.hi.max(b.hi) })
            }
        }
    }

    /// Region touched by an access to `tensor` with `indices`.
    pub fn region(&self, tensor: &str, indices: &[Expr]) -> Result<Region> {
        indices
            .iter()
            .enumerate()
            .map(|(axis, index)| {
                self.bound(&self.resolve(index)).map(Interval::to_axis).map_err(|reason| {
                    ScheduleError::UnsupportedAccessPattern {
                        tensor: tensor.to_string(),
                        axis,
                        expr: index.to_string(),
                        reason,
                    }
                })
            })
            .collect::<Result<SmallVec<[AxisRange; 4]>>>()
            .map(Region)
    }
}

/// Region of `tensor` accessed with `indices` inside the block at
/// `block_path` under `root`.
///
/// `indices` are expressed in the block's iteration variables.
pub fn calculate_tensor_region(root: &Stmt, block_path: &[usize], tensor: &str, indices: &[Expr]) -> Result<Region> {
    let region = BoundContext::at(root, block_path).region(tensor, indices)?;
    tracing::trace!(tensor, region = %region, "calculated tensor region");
    Ok(region)
}

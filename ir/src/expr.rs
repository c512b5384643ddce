//! Value expressions: constants, variables, arithmetic, tensor loads and
//! intrinsic calls.

use std::collections::{BTreeSet, HashMap};
use std::ops::{Add, Mul, Sub};

use crate::types::{BinaryOp, ConstValue, DType};

/// Index expressions of one tensor access, one per axis.
pub type Indices = Vec<Expr>;

/// A named scalar variable (loop variable or block iteration variable).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, derive_more::Display)]
#[display("{name}")]
pub struct Var {
    pub name: String,
}

impl Var {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl From<&str> for Var {
    fn from(name: &str) -> Self {
        Var::new(name)
    }
}

impl From<String> for Var {
    fn from(name: String) -> Self {
        Var { name }
    }
}

/// Read of one tensor element.
#[derive(Debug, Clone, PartialEq)]
pub struct Load {
    pub tensor: String,
    pub indices: Indices,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Const(ConstValue),
    Var(Var),
    Binary(BinaryOp, Box<Expr>, Box<Expr>),
    Load(Load),
    /// Intrinsic call, e.g. a barrier.
    Call { name: String, args: Vec<Expr>, dtype: DType },
}

impl Expr {
    pub fn int(value: i64) -> Self {
        Expr::Const(ConstValue::Int(value))
    }

    pub fn float(value: f64) -> Self {
        Expr::Const(ConstValue::Float(value))
    }

    pub fn var(name: impl Into<String>) -> Self {
        Expr::Var(Var::new(name))
    }

    /// Build a binary node without folding.
    pub fn binary(op: BinaryOp, lhs: Expr, rhs: Expr) -> Self {
        Expr::Binary(op, Box::new(lhs), Box::new(rhs))
    }

    pub fn load(tensor: impl Into<String>, indices: impl IntoIterator<Item = Expr>) -> Self {
        Expr::Load(Load { tensor: tensor.into(), indices: indices.into_iter().collect() })
    }

    pub fn call(name: impl Into<String>, args: Vec<Expr>, dtype: DType) -> Self {
        Expr::Call { name: name.into(), args, dtype }
    }

    pub fn min(self, rhs: Expr) -> Self {
        Expr::binary(BinaryOp::Min, self, rhs)
    }

    pub fn max(self, rhs: Expr) -> Self {
        Expr::binary(BinaryOp::Max, self, rhs)
    }

    pub fn floor_div(self, rhs: Expr) -> Self {
        Expr::binary(BinaryOp::Div, self, rhs)
    }

    pub fn floor_mod(self, rhs: Expr) -> Self {
        Expr::binary(BinaryOp::Mod, self, rhs)
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Expr::Const(c) => c.as_int(),
            _ => None,
        }
    }

    pub fn as_var(&self) -> Option<&Var> {
        match self {
            Expr::Var(v) => Some(v),
            _ => None,
        }
    }

    /// Visit every load in pre-order (a load before the loads in its indices).
    pub fn visit_loads<'a>(&'a self, f: &mut impl FnMut(&'a Load)) {
        match self {
            Expr::Const(_) | Expr::Var(_) => {}
            Expr::Binary(_, a, b) => {
                a.visit_loads(f);
                b.visit_loads(f);
            }
            Expr::Load(load) => {
                f(load);
                load.indices.iter().for_each(|idx| idx.visit_loads(f));
            }
            Expr::Call { args, .. } => args.iter().for_each(|arg| arg.visit_loads(f)),
        }
    }

    /// Mutable counterpart of [`Expr::visit_loads`], same visiting order.
    pub fn visit_loads_mut(&mut self, f: &mut impl FnMut(&mut Load)) {
        match self {
            Expr::Const(_) | Expr::Var(_) => {}
            Expr::Binary(_, a, b) => {
                a.visit_loads_mut(f);
                b.visit_loads_mut(f);
            }
            Expr::Load(load) => {
                f(load);
                load.indices.iter_mut().for_each(|idx| idx.visit_loads_mut(f));
            }
            Expr::Call { args, .. } => args.iter_mut().for_each(|arg| arg.visit_loads_mut(f)),
        }
    }

    /// Replace variables by the expressions bound to their names.
    pub fn substitute(&self, bindings: &HashMap<String, Expr>) -> Expr {
        match self {
            Expr::Var(v) => bindings.get(&v.name).cloned().unwrap_or_else(|| self.clone()),
            Expr::Const(_) => self.clone(),
            Expr::Binary(op, a, b) => Expr::binary(*op, a.substitute(bindings), b.substitute(bindings)),
            Expr::Load(load) => Expr::Load(Load {
                tensor: load.tensor.clone(),
                indices: load.indices.iter().map(|idx| idx.substitute(bindings)).collect(),
            }),
            Expr::Call { name, args, dtype } => Expr::Call {
                name: name.clone(),
                args: args.iter().map(|arg| arg.substitute(bindings)).collect(),
                dtype: *dtype,
            },
        }
    }

    /// Collect the names of all variables referenced by this expression.
    pub fn collect_vars(&self, out: &mut BTreeSet<String>) {
        match self {
            Expr::Var(v) => {
                out.insert(v.name.clone());
            }
            Expr::Const(_) => {}
            Expr::Binary(_, a, b) => {
                a.collect_vars(out);
                b.collect_vars(out);
            }
            Expr::Load(load) => load.indices.iter().for_each(|idx| idx.collect_vars(out)),
            Expr::Call { args, .. } => args.iter().for_each(|arg| arg.collect_vars(out)),
        }
    }
}

impl From<i64> for Expr {
    fn from(value: i64) -> Self {
        Expr::int(value)
    }
}

impl From<Var> for Expr {
    fn from(var: Var) -> Self {
        Expr::Var(var)
    }
}

impl From<&Var> for Expr {
    fn from(var: &Var) -> Self {
        Expr::Var(var.clone())
    }
}

impl From<Load> for Expr {
    fn from(load: Load) -> Self {
        Expr::Load(load)
    }
}

// Arithmetic operators fold integer constants and identities so that
// synthesized index expressions stay readable (`v + 0` is just `v`).

impl Add for Expr {
    type Output = Expr;

    fn add(self, rhs: Expr) -> Expr {
        match (self.as_int(), rhs.as_int()) {
            (Some(a), Some(b)) => Expr::int(a.wrapping_add(b)),
            (Some(0), None) => rhs,
            (None, Some(0)) => self,
            _ => Expr::binary(BinaryOp::Add, self, rhs),
        }
    }
}

impl Sub for Expr {
    type Output = Expr;

    fn sub(self, rhs: Expr) -> Expr {
        match (self.as_int(), rhs.as_int()) {
            (Some(a), Some(b)) => Expr::int(a.wrapping_sub(b)),
            (None, Some(0)) => self,
            // `(x + a) - b` rebases to `x + (a - b)`.
            (None, Some(b)) => match self {
                Expr::Binary(BinaryOp::Add, x, a) => match a.as_int() {
                    Some(a) => *x + a.wrapping_sub(b),
                    None => Expr::binary(BinaryOp::Sub, Expr::Binary(BinaryOp::Add, x, a), rhs),
                },
                lhs => Expr::binary(BinaryOp::Sub, lhs, rhs),
            },
            _ => Expr::binary(BinaryOp::Sub, self, rhs),
        }
    }
}

impl Mul for Expr {
    type Output = Expr;

    fn mul(self, rhs: Expr) -> Expr {
        match (self.as_int(), rhs.as_int()) {
            (Some(a), Some(b)) => Expr::int(a.wrapping_mul(b)),
            (Some(0), None) | (None, Some(0)) => Expr::int(0),
            (Some(1), None) => rhs,
            (None, Some(1)) => self,
            _ => Expr::binary(BinaryOp::Mul, self, rhs),
        }
    }
}

impl Add<i64> for Expr {
    type Output = Expr;

    fn add(self, rhs: i64) -> Expr {
        self + Expr::int(rhs)
    }
}

impl Sub<i64> for Expr {
    type Output = Expr;

    fn sub(self, rhs: i64) -> Expr {
        self - Expr::int(rhs)
    }
}

impl Mul<i64> for Expr {
    type Output = Expr;

    fn mul(self, rhs: i64) -> Expr {
        self * Expr::int(rhs)
    }
}

//! Type definitions for the loop-nest IR.
//!
//! Scalar element types, constant values and the small enums that tag loops
//! and storage with their execution and memory properties.

use std::cmp::Ordering;

/// Element type of a tensor or expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[derive(strum::Display, strum::EnumString, strum::AsRefStr)]
#[strum(serialize_all = "lowercase")]
pub enum DType {
    Bool,
    Int32,
    Int64,
    #[default]
    Float32,
    Float64,
    /// Result type of side-effecting intrinsics.
    Void,
}

impl DType {
    pub const fn is_float(self) -> bool {
        matches!(self, DType::Float32 | DType::Float64)
    }

    pub const fn is_int(self) -> bool {
        matches!(self, DType::Int32 | DType::Int64)
    }
}

/// Constant value carried by an expression.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ConstValue {
    Int(i64),
    Float(f64),
    Bool(bool),
}

impl ConstValue {
    pub const fn dtype(&self) -> DType {
        match self {
            ConstValue::Int(_) => DType::Int64,
            ConstValue::Float(_) => DType::Float64,
            ConstValue::Bool(_) => DType::Bool,
        }
    }

    pub const fn as_int(&self) -> Option<i64> {
        match self {
            ConstValue::Int(v) => Some(*v),
            ConstValue::Bool(b) => Some(*b as i64),
            ConstValue::Float(_) => None,
        }
    }

    pub const fn as_f64(&self) -> f64 {
        match self {
            ConstValue::Int(v) => *v as f64,
            ConstValue::Float(v) => *v,
            ConstValue::Bool(b) => *b as u8 as f64,
        }
    }

    /// Wrap a raw storage value as a constant of `dtype`.
    pub fn from_f64(value: f64, dtype: DType) -> Self {
        match dtype {
            DType::Bool => ConstValue::Bool(value != 0.0),
            DType::Int32 | DType::Int64 => ConstValue::Int(value as i64),
            DType::Float32 | DType::Float64 | DType::Void => ConstValue::Float(value),
        }
    }

    /// Evaluate `self op rhs`.
    ///
    /// Integer pairs stay integral with floor semantics for `Div` and `Mod`;
    /// any float operand promotes the result to float. Returns `None` on
    /// integer division by zero.
    pub fn apply(self, op: BinaryOp, rhs: ConstValue) -> Option<ConstValue> {
        match (self.as_int(), rhs.as_int()) {
            (Some(a), Some(b)) => op.eval_int(a, b).map(ConstValue::Int),
            _ => Some(ConstValue::Float(op.eval_float(self.as_f64(), rhs.as_f64()))),
        }
    }
}

/// Binary operator over expressions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    /// Floor division.
    Div,
    /// Floor modulo (result has the sign of the divisor).
    Mod,
    Min,
    Max,
}

impl BinaryOp {
    pub const fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Mod => "%",
            BinaryOp::Min => "min",
            BinaryOp::Max => "max",
        }
    }

    pub const fn is_function(self) -> bool {
        matches!(self, BinaryOp::Min | BinaryOp::Max)
    }

    pub fn eval_int(self, a: i64, b: i64) -> Option<i64> {
        Some(match self {
            BinaryOp::Add => a.wrapping_add(b),
            BinaryOp::Sub => a.wrapping_sub(b),
            BinaryOp::Mul => a.wrapping_mul(b),
            BinaryOp::Div => floor_div(a, b)?,
            BinaryOp::Mod => floor_mod(a, b)?,
            BinaryOp::Min => a.min(b),
            BinaryOp::Max => a.max(b),
        })
    }

    pub fn eval_float(self, a: f64, b: f64) -> f64 {
        match self {
            BinaryOp::Add => a + b,
            BinaryOp::Sub => a - b,
            BinaryOp::Mul => a * b,
            BinaryOp::Div => a / b,
            BinaryOp::Mod => a - b * (a / b).floor(),
            BinaryOp::Min => match a.partial_cmp(&b) {
                Some(Ordering::Greater) => b,
                _ => a,
            },
            BinaryOp::Max => match a.partial_cmp(&b) {
                Some(Ordering::Less) => b,
                _ => a,
            },
        }
    }
}

/// Integer division rounding toward negative infinity.
pub fn floor_div(a: i64, b: i64) -> Option<i64> {
    if b == 0 {
        return None;
    }
    let q = a / b;
    Some(if a % b != 0 && ((a < 0) != (b < 0)) { q - 1 } else { q })
}

/// Remainder matching [`floor_div`].
pub fn floor_mod(a: i64, b: i64) -> Option<i64> {
    floor_div(a, b).map(|q| a - b * q)
}

/// Memory level a buffer lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, PartialOrd, Ord)]
#[derive(strum::Display, strum::EnumString, strum::AsRefStr, strum::VariantArray)]
#[strum(serialize_all = "lowercase")]
pub enum MemoryType {
    /// Device-wide storage.
    #[default]
    Global,
    /// Storage shared by a thread group.
    Shared,
    /// Thread-private storage.
    Local,
}

/// Device a loop is emitted for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[derive(strum::Display, strum::EnumString, strum::AsRefStr)]
#[strum(serialize_all = "lowercase")]
pub enum DeviceApi {
    #[default]
    Host,
    Gpu,
}

/// Execution kind of a loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[derive(strum::Display, strum::EnumString, strum::AsRefStr)]
#[strum(serialize_all = "snake_case")]
pub enum ForKind {
    #[default]
    Serial,
    Parallel,
    Unrolled,
    Vectorized,
    GpuBlock,
    GpuThread,
}

/// Whether a block iteration variable is a data-parallel or a reduction axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum IterKind {
    #[default]
    Spatial,
    Reduce,
}

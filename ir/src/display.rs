//! Text form of the IR.
//!
//! ```text
//! ScheduleBlock(root) {
//!   for (i, 0, 128) {
//!     ScheduleBlock(B) {
//!       i0 = axis.bind(i)
//!       B[i0] = (A[i0] + 1)
//!     }
//!   }
//! }
//! ```

use std::fmt::{self, Display, Formatter};

use itertools::Itertools;

use crate::expr::{Expr, Load};
use crate::stmt::{BlockRealize, For, Stmt, Store};
use crate::tensor::{Buffer, Tensor};
use crate::types::{ConstValue, DeviceApi, ForKind, IterKind};

const INDENT: usize = 2;

impl Display for ConstValue {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            ConstValue::Int(v) => write!(f, "{v}"),
            ConstValue::Float(v) => write!(f, "{v:?}"),
            ConstValue::Bool(v) => write!(f, "{v}"),
        }
    }
}

impl Display for Load {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}]", self.tensor, self.indices.iter().join(", "))
    }
}

impl Display for Expr {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Const(c) => write!(f, "{c}"),
            Expr::Var(v) => write!(f, "{v}"),
            Expr::Binary(op, a, b) if op.is_function() => write!(f, "{}({a}, {b})", op.symbol()),
            Expr::Binary(op, a, b) => write!(f, "({a} {} {b})", op.symbol()),
            Expr::Load(load) => write!(f, "{load}"),
            Expr::Call { name, args, .. } => write!(f, "{name}({})", args.iter().join(", ")),
        }
    }
}

impl Display for Store {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}] = {}", self.tensor, self.indices.iter().join(", "), self.value)
    }
}

impl Display for Stmt {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write_stmt(f, self, 0)
    }
}

impl Display for Tensor {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}[{}]", self.name, self.dtype, self.shape.iter().join(", "))?;
        if let Some(buffer) = &self.buffer {
            write!(f, " @ {buffer}")?;
        }
        Ok(())
    }
}

impl Display for Buffer {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}): {}[{}]", self.name, self.memory, self.dtype, self.shape.iter().join(", "))
    }
}

fn write_stmt(f: &mut Formatter<'_>, stmt: &Stmt, depth: usize) -> fmt::Result {
    let pad = depth * INDENT;
    match stmt {
        Stmt::Seq(stmts) => stmts.iter().try_for_each(|s| write_stmt(f, s, depth)),
        Stmt::For(node) => {
            writeln!(f, "{:pad$}{} {{", "", ForHeader(node))?;
            write_stmt(f, &node.body, depth + 1)?;
            writeln!(f, "{:pad$}}}", "")
        }
        Stmt::Realize(realize) => write_realize(f, realize, depth),
        Stmt::Store(store) => writeln!(f, "{:pad$}{store}", ""),
        Stmt::Evaluate(expr) => writeln!(f, "{:pad$}{expr}", ""),
    }
}

fn write_realize(f: &mut Formatter<'_>, realize: &BlockRealize, depth: usize) -> fmt::Result {
    let pad = depth * INDENT;
    let inner = (depth + 1) * INDENT;
    writeln!(f, "{:pad$}ScheduleBlock({}) {{", "", realize.block.name)?;
    for (iv, value) in realize.block.iter_vars.iter().zip(&realize.iter_values) {
        let bind = match iv.kind {
            IterKind::Spatial => "bind",
            IterKind::Reduce => "reduce_bind",
        };
        writeln!(f, "{:inner$}{} = axis.{bind}({value})", "", iv.var)?;
    }
    write_stmt(f, &realize.block.body, depth + 1)?;
    writeln!(f, "{:pad$}}}", "")
}

struct ForHeader<'a>(&'a For);

impl Display for ForHeader<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let node = self.0;
        if node.kind != ForKind::Serial {
            write!(f, "{} ", node.kind)?;
        }
        write!(f, "for ({}, {}, {})", node.var, node.min, node.extent)?;
        if node.device != DeviceApi::Host {
            write!(f, " @{}", node.device)?;
        }
        Ok(())
    }
}

impl For {
    /// One-line description used by tree rendering.
    pub(crate) fn header(&self) -> String {
        ForHeader(self).to_string()
    }
}

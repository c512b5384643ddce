//! Predicate-driven search over a program tree.
//!
//! [`collect_nodes`] visits statements and expressions in pre-order and
//! returns those the predicate accepts; with [`SearchMode::First`] it stops at
//! the first match.

use std::ops::ControlFlow;

use crate::expr::{Expr, Load};
use crate::stmt::{BlockRealize, Stmt, StmtPath, Store};

/// A node reached by a search, statement or expression.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum NodeRef<'a> {
    Stmt(&'a Stmt),
    Expr(&'a Expr),
}

impl<'a> NodeRef<'a> {
    pub fn as_store(self) -> Option<&'a Store> {
        match self {
            NodeRef::Stmt(Stmt::Store(s)) => Some(s),
            _ => None,
        }
    }

    pub fn as_load(self) -> Option<&'a Load> {
        match self {
            NodeRef::Expr(Expr::Load(l)) => Some(l),
            _ => None,
        }
    }

    pub fn as_realize(self) -> Option<&'a BlockRealize> {
        match self {
            NodeRef::Stmt(Stmt::Realize(r)) => Some(r),
            _ => None,
        }
    }

    /// Tensor read or written by this node, if it is an access.
    pub fn accessed_tensor(self) -> Option<&'a str> {
        self.as_store().map(|s| s.tensor.as_str()).or_else(|| self.as_load().map(|l| l.tensor.as_str()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SearchMode {
    #[default]
    All,
    First,
}

/// A match together with the path of the statement that holds it.
#[derive(Debug, Clone, PartialEq)]
pub struct Found<'a> {
    pub path: StmtPath,
    pub node: NodeRef<'a>,
}

/// Collect every node under `root` accepted by `pred`.
pub fn collect_nodes<'a>(root: &'a Stmt, mode: SearchMode, mut pred: impl FnMut(NodeRef<'a>) -> bool) -> Vec<Found<'a>> {
    let mut found = Vec::new();
    let _ = root.walk(&mut |path, stmt| {
        let mut hit = |node: NodeRef<'a>| {
            if pred(node) {
                found.push(Found { path: path.to_vec(), node });
                if mode == SearchMode::First {
                    return ControlFlow::Break(());
                }
            }
            ControlFlow::Continue(())
        };
        hit(NodeRef::Stmt(stmt))?;
        for expr in stmt.local_exprs() {
            visit_expr(expr, &mut hit)?;
        }
        ControlFlow::Continue(())
    });
    found
}

fn visit_expr<'a>(expr: &'a Expr, f: &mut impl FnMut(NodeRef<'a>) -> ControlFlow<()>) -> ControlFlow<()> {
    f(NodeRef::Expr(expr))?;
    match expr {
        Expr::Const(_) | Expr::Var(_) => {}
        Expr::Binary(_, a, b) => {
            visit_expr(a, f)?;
            visit_expr(b, f)?;
        }
        Expr::Load(load) => {
            for idx in &load.indices {
                visit_expr(idx, f)?;
            }
        }
        Expr::Call { args, .. } => {
            for arg in args {
                visit_expr(arg, f)?;
            }
        }
    }
    ControlFlow::Continue(())
}

/// Every Store under `root`, in pre-order.
pub fn collect_stores(root: &Stmt) -> Vec<&Store> {
    collect_nodes(root, SearchMode::All, |n| n.as_store().is_some()).into_iter().filter_map(|f| f.node.as_store()).collect()
}

/// Every realized block under `root` (including `root` itself), in pre-order.
pub fn collect_blocks(root: &Stmt) -> Vec<&BlockRealize> {
    collect_nodes(root, SearchMode::All, |n| n.as_realize().is_some())
        .into_iter()
        .filter_map(|f| f.node.as_realize())
        .collect()
}

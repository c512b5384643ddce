//! Statement nodes of the program tree.
//!
//! The tree is owned: a rewrite clones the affected subtree, edits the clone
//! and hands it back to the owner, which substitutes it at one known slot.
//! Nodes are addressed by a [`StmtPath`], the sequence of child positions
//! from the node a path is taken against.

use std::ops::ControlFlow;

use bon::bon;
use smallvec::{SmallVec, smallvec};

use crate::expr::{Expr, Indices, Var};
use crate::types::{DeviceApi, ForKind, IterKind};

/// Position of a statement relative to some ancestor.
///
/// `Seq` children are addressed by their index, the single body of a `For`
/// or a `Realize` by `0`.
pub type StmtPath = Vec<usize>;

/// Name of the block that wraps every program.
pub const ROOT_BLOCK: &str = "root";

#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    /// Statements executed in order.
    Seq(Vec<Stmt>),
    For(For),
    Realize(BlockRealize),
    Store(Store),
    /// Expression evaluated for its side effect (intrinsic calls).
    Evaluate(Expr),
}

#[derive(Debug, Clone, PartialEq)]
pub struct For {
    pub var: Var,
    pub min: Expr,
    pub extent: Expr,
    pub kind: ForKind,
    pub device: DeviceApi,
    pub body: Box<Stmt>,
}

#[bon]
impl For {
    /// Create a loop with builder pattern.
    #[builder]
    pub fn builder(
        #[builder(into)] var: Var,
        #[builder(into, default = Expr::int(0))] min: Expr,
        #[builder(into)] extent: Expr,
        #[builder(default)] kind: ForKind,
        #[builder(default)] device: DeviceApi,
        #[builder(into)] body: Stmt,
    ) -> Self {
        Self { var, min, extent, kind, device, body: Box::new(body) }
    }
}

/// Write of one tensor element.
#[derive(Debug, Clone, PartialEq)]
pub struct Store {
    pub tensor: String,
    pub indices: Indices,
    pub value: Expr,
}

impl Store {
    pub fn new(tensor: impl Into<String>, indices: impl IntoIterator<Item = Expr>, value: Expr) -> Self {
        Self { tensor: tensor.into(), indices: indices.into_iter().collect(), value }
    }
}

/// Iteration variable declared by a block.
#[derive(Debug, Clone, PartialEq)]
pub struct IterVar {
    pub var: Var,
    pub extent: Expr,
    pub kind: IterKind,
}

impl IterVar {
    pub fn spatial(var: impl Into<Var>, extent: impl Into<Expr>) -> Self {
        Self { var: var.into(), extent: extent.into(), kind: IterKind::Spatial }
    }

    pub fn reduce(var: impl Into<Var>, extent: impl Into<Expr>) -> Self {
        Self { var: var.into(), extent: extent.into(), kind: IterKind::Reduce }
    }
}

/// A named unit of computation. Its body refers to its iteration variables.
#[derive(Debug, Clone, PartialEq)]
pub struct ScheduleBlock {
    pub name: String,
    pub iter_vars: Vec<IterVar>,
    pub body: Box<Stmt>,
}

/// A block together with the values its iteration variables take.
#[derive(Debug, Clone, PartialEq)]
pub struct BlockRealize {
    pub iter_values: Vec<Expr>,
    pub block: ScheduleBlock,
}

#[bon]
impl BlockRealize {
    /// Create a realized block with builder pattern.
    #[builder]
    pub fn builder(
        #[builder(into)] name: String,
        #[builder(default)] iter_vars: Vec<IterVar>,
        #[builder(default)] iter_values: Vec<Expr>,
        #[builder(into)] body: Stmt,
    ) -> Self {
        Self { iter_values, block: ScheduleBlock { name, iter_vars, body: Box::new(body) } }
    }
}

impl BlockRealize {
    /// The block wrapping a whole program.
    pub fn root(body: impl Into<Stmt>) -> Self {
        Self::builder().name(ROOT_BLOCK).body(body).build()
    }

    pub fn name(&self) -> &str {
        &self.block.name
    }

    pub fn is_root(&self) -> bool {
        self.iter_values.is_empty() && self.block.name == ROOT_BLOCK
    }
}

impl From<For> for Stmt {
    fn from(node: For) -> Self {
        Stmt::For(node)
    }
}

impl From<BlockRealize> for Stmt {
    fn from(node: BlockRealize) -> Self {
        Stmt::Realize(node)
    }
}

impl From<Store> for Stmt {
    fn from(node: Store) -> Self {
        Stmt::Store(node)
    }
}

impl From<Vec<Stmt>> for Stmt {
    fn from(stmts: Vec<Stmt>) -> Self {
        Stmt::Seq(stmts)
    }
}

impl Stmt {
    pub fn as_realize(&self) -> Option<&BlockRealize> {
        match self {
            Stmt::Realize(r) => Some(r),
            _ => None,
        }
    }

    pub fn as_realize_mut(&mut self) -> Option<&mut BlockRealize> {
        match self {
            Stmt::Realize(r) => Some(r),
            _ => None,
        }
    }

    pub fn as_for(&self) -> Option<&For> {
        match self {
            Stmt::For(f) => Some(f),
            _ => None,
        }
    }

    pub fn as_store(&self) -> Option<&Store> {
        match self {
            Stmt::Store(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_seq(&self) -> Option<&Vec<Stmt>> {
        match self {
            Stmt::Seq(stmts) => Some(stmts),
            _ => None,
        }
    }

    pub fn as_seq_mut(&mut self) -> Option<&mut Vec<Stmt>> {
        match self {
            Stmt::Seq(stmts) => Some(stmts),
            _ => None,
        }
    }

    /// Name of the block this node realizes, if any.
    pub fn block_name(&self) -> Option<&str> {
        self.as_realize().map(BlockRealize::name)
    }

    pub fn child_count(&self) -> usize {
        match self {
            Stmt::Seq(stmts) => stmts.len(),
            Stmt::For(_) | Stmt::Realize(_) => 1,
            Stmt::Store(_) | Stmt::Evaluate(_) => 0,
        }
    }

    pub fn child(&self, index: usize) -> Option<&Stmt> {
        match (self, index) {
            (Stmt::Seq(stmts), i) => stmts.get(i),
            (Stmt::For(f), 0) => Some(&f.body),
            (Stmt::Realize(r), 0) => Some(&r.block.body),
            _ => None,
        }
    }

    pub fn child_mut(&mut self, index: usize) -> Option<&mut Stmt> {
        match (self, index) {
            (Stmt::Seq(stmts), i) => stmts.get_mut(i),
            (Stmt::For(f), 0) => Some(&mut f.body),
            (Stmt::Realize(r), 0) => Some(&mut r.block.body),
            _ => None,
        }
    }

    pub fn get(&self, path: &[usize]) -> Option<&Stmt> {
        path.iter().try_fold(self, |node, &i| node.child(i))
    }

    pub fn get_mut(&mut self, path: &[usize]) -> Option<&mut Stmt> {
        path.iter().try_fold(self, |node, &i| node.child_mut(i))
    }

    /// Expressions owned directly by this node, excluding child statements.
    ///
    /// The order is fixed and shared with [`Stmt::local_exprs_mut`], so an
    /// access can be addressed by its ordinal within a node.
    pub fn local_exprs(&self) -> SmallVec<[&Expr; 4]> {
        match self {
            Stmt::Seq(_) => SmallVec::new(),
            Stmt::For(f) => smallvec![&f.min, &f.extent],
            Stmt::Realize(r) => r.iter_values.iter().collect(),
            Stmt::Store(s) => s.indices.iter().chain(std::iter::once(&s.value)).collect(),
            Stmt::Evaluate(e) => smallvec![e],
        }
    }

    pub fn local_exprs_mut(&mut self) -> SmallVec<[&mut Expr; 4]> {
        match self {
            Stmt::Seq(_) => SmallVec::new(),
            Stmt::For(f) => smallvec![&mut f.min, &mut f.extent],
            Stmt::Realize(r) => r.iter_values.iter_mut().collect(),
            Stmt::Store(s) => s.indices.iter_mut().chain(std::iter::once(&mut s.value)).collect(),
            Stmt::Evaluate(e) => smallvec![e],
        }
    }

    /// Pre-order walk with the path of every node relative to `self`.
    ///
    /// Returning `ControlFlow::Break` stops the walk.
    pub fn walk<'a>(&'a self, f: &mut impl FnMut(&[usize], &'a Stmt) -> ControlFlow<()>) -> ControlFlow<()> {
        fn go<'a>(
            node: &'a Stmt,
            path: &mut StmtPath,
            f: &mut impl FnMut(&[usize], &'a Stmt) -> ControlFlow<()>,
        ) -> ControlFlow<()> {
            f(path, node)?;
            for i in 0..node.child_count() {
                if let Some(child) = node.child(i) {
                    path.push(i);
                    let flow = go(child, path, f);
                    path.pop();
                    flow?;
                }
            }
            ControlFlow::Continue(())
        }
        go(self, &mut Vec::new(), f)
    }

    /// Pre-order mutable walk over every statement.
    pub fn walk_mut(&mut self, f: &mut impl FnMut(&mut Stmt)) {
        f(self);
        for i in 0..self.child_count() {
            if let Some(child) = self.child_mut(i) {
                child.walk_mut(f);
            }
        }
    }

    /// Path of the first realized block named `name`.
    pub fn find_block(&self, name: &str) -> Option<StmtPath> {
        let mut found = None;
        let _ = self.walk(&mut |path, node| {
            if node.block_name() == Some(name) {
                found = Some(path.to_vec());
                return ControlFlow::Break(());
            }
            ControlFlow::Continue(())
        });
        found
    }

    /// Path of the first loop over `var`.
    pub fn find_loop(&self, var: &str) -> Option<StmtPath> {
        let mut found = None;
        let _ = self.walk(&mut |path, node| {
            if node.as_for().is_some_and(|f| f.var.name == var) {
                found = Some(path.to_vec());
                return ControlFlow::Break(());
            }
            ControlFlow::Continue(())
        });
        found
    }
}

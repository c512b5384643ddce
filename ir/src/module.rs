//! A module: every scheduled program plus the tensors they share.

use snafu::OptionExt;

use crate::error::{Result, UnknownProgramSnafu};
use crate::stmt::{BlockRealize, Stmt, StmtPath};
use crate::tensor::TensorTable;

/// All top-level programs of one compilation unit.
///
/// Each entry of `exprs` is a root block (`BlockRealize` named `root`). The
/// tensor table is shared by every program, so buffer bindings are
/// module-wide.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Module {
    pub exprs: Vec<Stmt>,
    pub tensors: TensorTable,
}

impl Module {
    pub fn new(tensors: TensorTable) -> Self {
        Self { exprs: Vec::new(), tensors }
    }

    /// Append a program, wrapping `body` in a root block. Returns its index.
    pub fn push_program(&mut self, body: impl Into<Stmt>) -> usize {
        self.exprs.push(BlockRealize::root(body).into());
        self.exprs.len() - 1
    }

    pub fn root(&self, index: usize) -> Result<&Stmt> {
        self.exprs.get(index).context(UnknownProgramSnafu { index })
    }

    /// Program index and path of the first block named `name`.
    pub fn find_block(&self, name: &str) -> Option<(usize, StmtPath)> {
        self.exprs.iter().enumerate().find_map(|(i, root)| root.find_block(name).map(|path| (i, path)))
    }

    /// Program index and path of the first loop over `var`.
    pub fn find_loop(&self, var: &str) -> Option<(usize, StmtPath)> {
        self.exprs.iter().enumerate().find_map(|(i, root)| root.find_loop(var).map(|path| (i, path)))
    }

    /// Substitute the body of program `index` with the body of `new_root`.
    ///
    /// This is the single substitution point of every schedule primitive; the
    /// root block object itself is kept.
    pub fn replace_root_body(&mut self, index: usize, new_root: Stmt) -> Result<()> {
        let root = self.exprs.get_mut(index).and_then(Stmt::as_realize_mut).context(UnknownProgramSnafu { index })?;
        let new_body = match new_root {
            Stmt::Realize(realize) => realize.block.body,
            other => Box::new(other),
        };
        root.block.body = new_body;
        Ok(())
    }
}

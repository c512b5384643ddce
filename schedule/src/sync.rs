//! Barrier insertion.

use cachet_ir::{DType, Expr, Module, Stmt, StmtPath};
use snafu::{OptionExt, ensure};

use crate::config::ScheduleConfig;
use crate::error::{BlockNotFoundSnafu, LoopNotFoundSnafu, Result, RootTargetSnafu};
use crate::schedule::Staged;
use crate::tree_utils::{insert_sibling, normalize_to_block};

/// A scope node addressed by name: a block by its name, a loop by its
/// variable. The first match in program order wins.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ScopeRef {
    Block(String),
    Loop(String),
}

impl ScopeRef {
    pub fn block(name: impl Into<String>) -> Self {
        ScopeRef::Block(name.into())
    }

    pub fn for_loop(var: impl Into<String>) -> Self {
        ScopeRef::Loop(var.into())
    }

    pub fn name(&self) -> &str {
        match self {
            ScopeRef::Block(name) | ScopeRef::Loop(name) => name,
        }
    }

    /// Program index and path of the referenced node.
    pub fn find(&self, module: &Module) -> Result<(usize, StmtPath)> {
        match self {
            ScopeRef::Block(name) => module.find_block(name).context(BlockNotFoundSnafu { name }),
            ScopeRef::Loop(var) => module.find_loop(var).context(LoopNotFoundSnafu { var }),
        }
    }

    fn find_in(&self, root: &Stmt) -> Option<StmtPath> {
        match self {
            ScopeRef::Block(name) => root.find_block(name),
            ScopeRef::Loop(var) => root.find_loop(var),
        }
    }
}

/// Zero-argument call of the barrier intrinsic.
pub fn barrier(config: &ScheduleConfig) -> Stmt {
    Stmt::Evaluate(Expr::call(config.barrier_intrinsic.as_str(), Vec::new(), DType::Void))
}

pub(crate) fn sync_threads(module: &Module, config: &ScheduleConfig, scope: &ScopeRef, after: bool) -> Result<Staged> {
    let (program, _) = scope.find(module)?;
    let mut root = module.root(program)?.clone();
    normalize_to_block(&mut root);

    let name = scope.name();
    let path = scope.find_in(&root).context(BlockNotFoundSnafu { name })?;
    ensure!(!path.is_empty(), RootTargetSnafu { name });
    insert_sibling(&mut root, &path, barrier(config), after, name)?;

    tracing::debug!(scope = name, after, barrier = %config.barrier_intrinsic, "inserted barrier");
    Ok(Staged { program, root, tensors: module.tensors.clone() })
}

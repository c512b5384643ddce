//! The schedule handle.
//!
//! [`Schedule`] owns a [`Module`] and applies primitives to it. Every
//! primitive works on a normalized clone of the affected program and a clone
//! of the tensor table; the module only changes once the primitive has
//! succeeded, by substituting the program's root body and swapping in the new
//! table.

use cachet_ir::search::collect_blocks;
use cachet_ir::{BlockRealize, MemoryType, Module, Stmt, StmtPath, TensorTable};
use snafu::{OptionExt, ensure};

use crate::config::ScheduleConfig;
use crate::error::{BlockNotFoundSnafu, Result, RootTargetSnafu};
use crate::sync::ScopeRef;
use crate::tree_utils::{loops_above, normalize_to_block};
use crate::{buffer, cache, sync};

/// Result of a primitive, ready to be committed.
#[derive(Debug, Clone)]
pub(crate) struct Staged {
    pub program: usize,
    pub root: Stmt,
    pub tensors: TensorTable,
}

/// Program index, normalized clone of its root and path of block `name`.
pub(crate) fn stage_block(module: &Module, name: &str) -> Result<(usize, Stmt, StmtPath)> {
    let (program, _) = module.find_block(name).context(BlockNotFoundSnafu { name })?;
    let mut root = module.root(program)?.clone();
    normalize_to_block(&mut root);
    let path = root.find_block(name).context(BlockNotFoundSnafu { name })?;
    ensure!(!path.is_empty(), RootTargetSnafu { name });
    Ok((program, root, path))
}

#[derive(Debug, Clone)]
pub struct Schedule {
    module: Module,
    config: ScheduleConfig,
}

impl Schedule {
    pub fn new(module: Module) -> Self {
        Self::with_config(module, ScheduleConfig::default())
    }

    pub fn with_config(module: Module, config: ScheduleConfig) -> Self {
        Self { module, config }
    }

    pub fn module(&self) -> &Module {
        &self.module
    }

    pub fn into_module(self) -> Module {
        self.module
    }

    pub fn config(&self) -> &ScheduleConfig {
        &self.config
    }

    pub fn get_block(&self, name: &str) -> Result<&BlockRealize> {
        let (program, path) = self.module.find_block(name).context(BlockNotFoundSnafu { name })?;
        self.module.root(program)?.get(&path).and_then(Stmt::as_realize).context(BlockNotFoundSnafu { name })
    }

    /// Variables of the loops enclosing block `name`, outermost first.
    pub fn get_loops(&self, name: &str) -> Result<Vec<String>> {
        let (program, path) = self.module.find_block(name).context(BlockNotFoundSnafu { name })?;
        Ok(loops_above(self.module.root(program)?, &path))
    }

    /// Names of every block of program `program` except its root, in order.
    pub fn get_all_blocks(&self, program: usize) -> Result<Vec<String>> {
        let root = self.module.root(program)?;
        Ok(collect_blocks(root).into_iter().filter(|b| !b.is_root()).map(|b| b.name().to_string()).collect())
    }

    /// Root of the program holding block `name`.
    pub fn get_root(&self, name: &str) -> Result<&Stmt> {
        let (program, _) = self.module.find_block(name).context(BlockNotFoundSnafu { name })?;
        Ok(self.module.root(program)?)
    }

    /// Read the `read_index`-th load of `block` through a new tensor at
    /// `memory`. Returns the name of the cache tensor, which is also the name
    /// of the block filling it.
    pub fn cache_read(&mut self, block: &str, read_index: usize, memory: MemoryType) -> Result<String> {
        let (staged, cache) = cache::cache_read(&self.module, &self.config, block, read_index, memory)?;
        self.commit(staged, "cache_read")?;
        Ok(cache)
    }

    /// Write the `write_index`-th store of `block` through a new tensor at
    /// `memory`. Returns the name of the cache tensor, which is also the name
    /// of the block copying it back.
    pub fn cache_write(&mut self, block: &str, write_index: usize, memory: MemoryType) -> Result<String> {
        let (staged, cache) = cache::cache_write(&self.module, &self.config, block, write_index, memory)?;
        self.commit(staged, "cache_write")?;
        Ok(cache)
    }

    /// Insert a barrier right before (or after) the referenced block or loop.
    pub fn sync_threads(&mut self, scope: &ScopeRef, after: bool) -> Result<()> {
        let staged = sync::sync_threads(&self.module, &self.config, scope, after)?;
        self.commit(staged, "sync_threads")
    }

    /// Bind the tensor stored by `block` (and its reduction-init twin) to a new
    /// buffer at `memory`. With `fixed` and local memory, the buffer is then
    /// shrunk to the block's footprint.
    pub fn set_buffer(&mut self, block: &str, memory: MemoryType, fixed: bool) -> Result<()> {
        let staged = buffer::set_buffer(&self.module, &self.config, block, memory, fixed)?;
        self.commit(staged, "set_buffer")
    }

    /// Shrink the tensor stored by `block` to the footprint its program
    /// accesses.
    pub fn fix_local_buffer_size(&mut self, block: &str) -> Result<()> {
        let staged = buffer::fix_block_buffer_size(&self.module, &self.config, block)?;
        self.commit(staged, "fix_local_buffer_size")
    }

    fn commit(&mut self, staged: Staged, primitive: &'static str) -> Result<()> {
        let Staged { program, root, tensors } = staged;
        self.module.replace_root_body(program, root)?;
        self.module.tensors = tensors;

        if self.config.trace_ir
            && let Ok(root) = self.module.root(program)
        {
            tracing::debug!(primitive, program, "program after {primitive}:\n{root}");
        }
        Ok(())
    }
}

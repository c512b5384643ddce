//! Cache insertion.
//!
//! `cache_read` and `cache_write` run the same pipeline over a normalized copy
//! of the target's program:
//!
//! 1. pick the access and collect every access to the tensor's storage,
//! 2. locate the insertion point and the accesses the cache serves,
//!    computing the cached region,
//! 3. declare the cache tensor and build its copy block,
//! 4. redirect the selected accesses and splice the copy block,
//! 5. (write side) rebind the aliases of the original buffer to the cache.
//!
//! Nothing reaches the module until the caller commits the staged result.

pub mod artifact;
pub mod locate;
pub mod rewrite;

use std::collections::BTreeSet;

use cachet_ir::search::collect_blocks;
use cachet_ir::{MemoryType, Module, Stmt};
use snafu::ensure;

use crate::access::{collect_accesses, nth_access};
use crate::buffer::bind_cache_write;
use crate::config::ScheduleConfig;
use crate::error::{AccessKind, CacheBlockCountSnafu, Result, UnboundStoreTargetSnafu};
use crate::schedule::{Staged, stage_block};

pub use artifact::{make_cache_block, make_cache_tensor};
pub use locate::InsertionPoint;
pub use rewrite::{CacheReadRewriter, CacheWriteRewriter};

/// Identities involved in one cache insertion.
///
/// The copy block always moves data from `read_tensor` to `write_tensor`: for
/// a read cache the cache tensor is the write target of the copy, for a write
/// cache it is the read source. `alloc` names the cache tensor, whose copy
/// block is its declaration site.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CacheBlockInfo {
    pub read_tensor: String,
    pub write_tensor: String,
    pub alloc: String,
    pub loc: InsertionPoint,
}

/// Tensors sharing `tensor`'s buffer, `tensor` included.
fn storage_group(module: &Module, tensor: &str) -> BTreeSet<String> {
    let mut group: BTreeSet<String> = match module.tensors.buffer_of(tensor) {
        Ok(buffer) => module.tensors.aliases(&buffer.name).map(String::from).collect(),
        Err(_) => BTreeSet::new(),
    };
    group.insert(tensor.to_string());
    group
}

/// Exactly one realized block must carry the cache tensor's name.
fn check_cache_block(module: &Module, program: usize, root: &Stmt, name: &str) -> Result<()> {
    let found: usize = module
        .exprs
        .iter()
        .enumerate()
        .map(|(i, other)| if i == program { root } else { other })
        .map(|r| collect_blocks(r).into_iter().filter(|b| b.name() == name).count())
        .sum();
    ensure!(found == 1, CacheBlockCountSnafu { name, found });
    Ok(())
}

pub(crate) fn cache_read(
    module: &Module,
    config: &ScheduleConfig,
    block: &str,
    read_index: usize,
    memory: MemoryType,
) -> Result<(Staged, String)> {
    let (program, mut root, block_path) = stage_block(module, block)?;
    let target = nth_access(&root, block, &block_path, read_index, AccessKind::Read)?;
    let tensor = target.tensor.clone();
    let group = storage_group(module, &tensor);
    let sites = collect_accesses(&root, |t| group.contains(t));

    let mut info = CacheBlockInfo { read_tensor: tensor.clone(), ..Default::default() };
    let selection = locate::locate_read(&root, &sites, &target, &mut info)?;

    let mut tensors = module.tensors.clone();
    let cache = make_cache_tensor(&mut tensors, &tensor, &selection.region, memory)?;
    info.write_tensor = cache.clone();
    info.alloc = cache.clone();

    let copy = make_cache_block(&selection.region, &info, config.device);
    CacheReadRewriter { info: &info, region: &selection.region }.apply(&mut root, &selection.loads, copy)?;
    check_cache_block(module, program, &root, &cache)?;

    tracing::debug!(block, tensor = %tensor, cache = %cache, region = %selection.region, "cache_read");
    Ok((Staged { program, root, tensors }, cache))
}

pub(crate) fn cache_write(
    module: &Module,
    config: &ScheduleConfig,
    block: &str,
    write_index: usize,
    memory: MemoryType,
) -> Result<(Staged, String)> {
    let (program, mut root, block_path) = stage_block(module, block)?;
    let target = nth_access(&root, block, &block_path, write_index, AccessKind::Write)?;
    let tensor = target.tensor.clone();
    ensure!(module.tensors.buffer_of(&tensor).is_ok(), UnboundStoreTargetSnafu { tensor: tensor.as_str() });
    let group = storage_group(module, &tensor);
    let sites = collect_accesses(&root, |t| group.contains(t));
    let shape = module.tensors.tensor(&tensor)?.shape.clone();

    let mut info = CacheBlockInfo { write_tensor: tensor.clone(), ..Default::default() };
    let selection = locate::locate_write(&root, &sites, &target, &shape, group.len() > 1, &mut info)?;

    let mut tensors = module.tensors.clone();
    let cache = make_cache_tensor(&mut tensors, &tensor, &selection.region, memory)?;
    info.read_tensor = cache.clone();
    info.alloc = cache.clone();

    let copy = make_cache_block(&selection.region, &info, config.device);
    CacheWriteRewriter { info: &info, region: &selection.region }.apply(
        &mut root,
        &selection.stores,
        &selection.loads,
        copy,
    )?;
    bind_cache_write(&mut tensors, &tensor, &cache)?;
    check_cache_block(module, program, &root, &cache)?;

    tracing::debug!(block, tensor = %tensor, cache = %cache, region = %selection.region, "cache_write");
    Ok((Staged { program, root, tensors }, cache))
}

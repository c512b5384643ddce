//! Buffer binding and local footprint sizing.

use cachet_ir::search::collect_stores;
use cachet_ir::{Buffer, MemoryType, Module, Stmt, TensorTable};
use snafu::OptionExt;

use crate::access::{collect_accesses, rewrite_sites};
use crate::config::ScheduleConfig;
use crate::error::{BlockNotFoundSnafu, FootprintEscapesSnafu, Result, StoreCountSnafu};
use crate::region::Region;
use crate::schedule::{Staged, stage_block};

/// Move every alias of `original`'s buffer onto the buffer of `cache`.
///
/// The rebind goes through the module-wide tensor table, so aliases used by
/// other programs of the module move as well. `original` keeps its buffer.
pub fn bind_cache_write(tensors: &mut TensorTable, original: &str, cache: &str) -> Result<Vec<String>> {
    let old = tensors.buffer_of(original)?.name.clone();
    let new = tensors.buffer_of(cache)?.name.clone();
    let moved = tensors.rebind_all(&old, &new, Some(original))?;
    tracing::debug!(from = %old, to = %new, rebound = ?moved, "rebound aliases to cache buffer");
    Ok(moved)
}

fn fresh_buffer_name(tensors: &TensorTable, base: &str) -> String {
    if !tensors.contains_buffer(base) {
        return base.to_string();
    }
    (1..).map(|i| format!("{base}_{i}")).find(|name| !tensors.contains_buffer(name)).unwrap_or_else(|| base.to_string())
}

/// Tensor stored by the block at `block_path`, which must hold exactly one
/// store, followed by its reduction-init twin when one is declared.
fn stored_tensors(
    root: &Stmt,
    tensors: &TensorTable,
    config: &ScheduleConfig,
    block: &str,
    block_path: &[usize],
) -> Result<Vec<String>> {
    let block_stmt = root.get(block_path).context(BlockNotFoundSnafu { name: block })?;
    let stores = collect_stores(block_stmt);
    let [store] = stores.as_slice() else {
        return StoreCountSnafu { block, count: stores.len() }.fail();
    };
    let mut names = vec![store.tensor.clone()];
    let init = config.reduce_init_name(&store.tensor);
    if tensors.contains(&init) {
        names.push(init);
    }
    Ok(names)
}

/// Every access to the buffers of `names` must live in `program`, through
/// `names` themselves, for the sized buffer to stay in bounds.
fn ensure_footprint_local(module: &Module, program: usize, tensors: &TensorTable, names: &[String]) -> Result<()> {
    let named = |t: &str| names.iter().any(|name| name == t);
    for name in names {
        let buffer = tensors.buffer_of(name)?.name.as_str();
        if let Some(other) = tensors.aliases(buffer).find(|alias| !named(alias)) {
            return FootprintEscapesSnafu { tensor: name.as_str(), reason: format!("its buffer is shared with '{other}'") }
                .fail();
        }
    }
    let elsewhere = module
        .exprs
        .iter()
        .enumerate()
        .filter(|(index, _)| *index != program)
        .find_map(|(index, root)| collect_accesses(root, named).into_iter().next().map(|site| (index, site)));
    if let Some((index, site)) = elsewhere {
        return FootprintEscapesSnafu { tensor: site.tensor, reason: format!("it is also accessed by program {index}") }
            .fail();
    }
    Ok(())
}

/// Shrink the tensors in `names` and their buffers to the box their accesses
/// under `root` actually touch, rebasing those accesses to start at zero.
///
/// Returns the footprint, or `None` when nothing under `root` accesses them.
/// Accesses outside `root` are not rebased.
pub fn fix_local_buffer_size(root: &mut Stmt, tensors: &mut TensorTable, names: &[String]) -> Result<Option<Region>> {
    let sites = collect_accesses(root, |t| names.iter().any(|name| name == t));
    let mut footprint: Option<Region> = None;
    for site in &sites {
        let region = site.region(root)?;
        footprint = Some(match footprint {
            Some(acc) => acc.union(&region),
            None => region,
        });
    }
    let Some(footprint) = footprint else { return Ok(None) };

    let extents = footprint.extents();
    for name in names {
        tensors.tensor_mut(name)?.shape = extents.clone();
        let buffer = tensors.buffer_of(name)?.name.clone();
        tensors.buffer_mut(&buffer)?.shape = extents.clone();
    }
    let rebased = rewrite_sites(root, &sites, None, &footprint.mins());
    tracing::debug!(tensors = ?names, footprint = %footprint, rebased, "fixed local buffer size");
    Ok(Some(footprint))
}

pub(crate) fn set_buffer(
    module: &Module,
    config: &ScheduleConfig,
    block: &str,
    memory: MemoryType,
    fixed: bool,
) -> Result<Staged> {
    let (program, mut root, block_path) = stage_block(module, block)?;
    let mut tensors = module.tensors.clone();
    let names = stored_tensors(&root, &tensors, config, block, &block_path)?;

    let target = tensors.tensor(&names[0])?;
    let (dtype, shape) = (target.dtype, target.shape.clone());
    let buffer = fresh_buffer_name(&tensors, &format!("_{}_temp_buffer", names[0]));
    tensors.declare_buffer(Buffer::new(buffer.as_str(), memory, dtype, shape))?;
    for name in &names {
        tensors.bind(name, &buffer)?;
    }
    tracing::debug!(block, tensors = ?names, buffer = %buffer, memory = %memory, "set buffer");

    if memory == MemoryType::Local && fixed {
        ensure_footprint_local(module, program, &tensors, &names)?;
        fix_local_buffer_size(&mut root, &mut tensors, &names)?;
    }
    Ok(Staged { program, root, tensors })
}

pub(crate) fn fix_block_buffer_size(module: &Module, config: &ScheduleConfig, block: &str) -> Result<Staged> {
    let (program, mut root, block_path) = stage_block(module, block)?;
    let mut tensors = module.tensors.clone();
    let names = stored_tensors(&root, &tensors, config, block, &block_path)?;
    ensure_footprint_local(module, program, &tensors, &names)?;
    fix_local_buffer_size(&mut root, &mut tensors, &names)?;
    Ok(Staged { program, root, tensors })
}

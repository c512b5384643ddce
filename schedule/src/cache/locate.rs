//! Insertion point locator.
//!
//! Decides which accesses a cache serves and where its copy block goes. The
//! accesses of a tensor are grouped into units (the innermost block holding
//! them) in execution order; a unit that stores to the tensor or to any of its
//! aliases is a writer.

use std::collections::BTreeSet;

use cachet_ir::{Stmt, StmtPath};
use snafu::OptionExt;

use super::CacheBlockInfo;
use crate::access::AccessSite;
use crate::error::{Result, StructuralConflictSnafu};
use crate::region::Region;
use crate::tree_utils::{common_prefix, enclosing_seq};

/// Position in a sequence where a copy block is spliced.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct InsertionPoint {
    /// Path of the `Seq` receiving the block.
    pub scope: StmtPath,
    /// Index the block takes among the sequence's children.
    pub index: usize,
}

#[derive(Debug)]
struct Unit {
    path: StmtPath,
    reads: bool,
    writes: bool,
}

/// Units of `sites` in order of first appearance.
fn units(sites: &[AccessSite], tensor: &str) -> Vec<Unit> {
    let mut units: Vec<Unit> = Vec::new();
    for site in sites {
        let reads = !site.is_store() && site.tensor == tensor;
        let writes = site.is_store();
        match units.iter_mut().find(|unit| unit.path == site.unit) {
            Some(unit) => {
                unit.reads |= reads;
                unit.writes |= writes;
            }
            None => units.push(Unit { path: site.unit.clone(), reads, writes }),
        }
    }
    units
}

/// Innermost sequence that is a proper ancestor of every path.
fn common_scope(root: &Stmt, paths: &[&[usize]]) -> Option<StmtPath> {
    let prefix = common_prefix(paths.iter().copied());
    let proper = paths.iter().all(|path| path.len() > prefix.len());
    if proper && matches!(root.get(&prefix), Some(Stmt::Seq(_))) { Some(prefix) } else { enclosing_seq(root, &prefix) }
}

/// Move `scope` out of the outermost loop on its path iterating one of `vars`.
fn raise_above(root: &Stmt, scope: StmtPath, vars: &BTreeSet<String>) -> Option<StmtPath> {
    for len in 0..scope.len() {
        if let Some(Stmt::For(node)) = root.get(&scope[..len])
            && vars.contains(&node.var.name)
        {
            return enclosing_seq(root, &scope[..len]);
        }
    }
    Some(scope)
}

fn union_regions<'a>(root: &Stmt, sites: impl IntoIterator<Item = &'a AccessSite>) -> Result<Option<Region>> {
    let mut acc: Option<Region> = None;
    for site in sites {
        let region = site.region(root)?;
        acc = Some(match acc {
            Some(acc) => acc.union(&region),
            None => region,
        });
    }
    Ok(acc)
}

/// Loads a read cache serves, with the region they cover.
#[derive(Debug)]
pub struct ReadSelection {
    pub loads: Vec<AccessSite>,
    pub region: Region,
}

/// Place the copy of `info.read_tensor` in front of its readers.
///
/// The readers are the units reading the tensor between the nearest writers
/// before and after `target`. The copy goes into their innermost common
/// sequence, moved out of every loop the redirected indices depend on, right
/// before the child holding the first reader.
pub fn locate_read(root: &Stmt, sites: &[AccessSite], target: &AccessSite, info: &mut CacheBlockInfo) -> Result<ReadSelection> {
    let tensor = info.read_tensor.as_str();
    let units = units(sites, tensor);
    let pos = units.iter().position(|unit| unit.path == target.unit).context(StructuralConflictSnafu {
        tensor,
        reason: "the cached access is not reachable from its program root",
    })?;
    if units[pos].writes {
        return StructuralConflictSnafu { tensor, reason: "the cached block also writes the tensor" }.fail();
    }

    let mut start = pos;
    while start > 0 && !units[start - 1].writes {
        start -= 1;
    }
    let mut end = pos;
    while end + 1 < units.len() && !units[end + 1].writes {
        end += 1;
    }
    let readers: Vec<&[usize]> = units[start..=end].iter().filter(|u| u.reads).map(|u| u.path.as_slice()).collect();

    let loads: Vec<AccessSite> = sites
        .iter()
        .filter(|s| !s.is_store() && s.tensor == tensor && readers.contains(&s.unit.as_slice()))
        .cloned()
        .collect();
    let region = union_regions(root, &loads)?
        .context(StructuralConflictSnafu { tensor, reason: "no load is left to redirect" })?;

    let vars: BTreeSet<String> = loads.iter().flat_map(|s| s.loop_vars(root)).collect();
    let scope = common_scope(root, &readers)
        .and_then(|scope| raise_above(root, scope, &vars))
        .context(StructuralConflictSnafu { tensor, reason: "the readers share no enclosing sequence" })?;

    let (first, last) = match (readers.first(), readers.last()) {
        (Some(first), Some(last)) => (first[scope.len()], last[scope.len()]),
        _ => return StructuralConflictSnafu { tensor, reason: "no reader found" }.fail(),
    };
    if sites.iter().any(|s| s.is_store() && s.child_of(&scope).is_some_and(|c| (first..=last).contains(&c))) {
        return StructuralConflictSnafu { tensor, reason: "the tensor is written between its cached readers" }.fail();
    }

    tracing::debug!(
        tensor,
        readers = readers.len(),
        loads = loads.len(),
        region = %region,
        scope = ?scope,
        index = first,
        "located cache read"
    );
    info.loc = InsertionPoint { scope, index: first };
    Ok(ReadSelection { loads, region })
}

/// Accesses a write cache takes over, with the region it holds.
#[derive(Debug)]
pub struct WriteSelection {
    pub stores: Vec<AccessSite>,
    pub loads: Vec<AccessSite>,
    pub region: Region,
}

/// Place the copy back of `info.write_tensor` right after its writer.
///
/// The scope is the innermost sequence holding the writer and every later
/// reader up to the next writer, moved out of every loop the written indices
/// depend on. The cache covers every store of the tensor in the writer's
/// child of that scope and only loads inside that child are redirected, so
/// later readers see the copied back tensor. When other tensors alias its
/// buffer the writer must cover the whole tensor.
pub fn locate_write(
    root: &Stmt,
    sites: &[AccessSite],
    target: &AccessSite,
    shape: &[i64],
    has_aliases: bool,
    info: &mut CacheBlockInfo,
) -> Result<WriteSelection> {
    let tensor = info.write_tensor.as_str();
    let units = units(sites, tensor);
    let pos = units.iter().position(|unit| unit.path == target.unit).context(StructuralConflictSnafu {
        tensor,
        reason: "the cached access is not reachable from its program root",
    })?;

    let mut participants = vec![target.unit.as_slice()];
    participants.extend(units[pos + 1..].iter().take_while(|u| !u.writes).filter(|u| u.reads).map(|u| u.path.as_slice()));

    let vars: BTreeSet<String> = sites
        .iter()
        .filter(|s| s.is_store() && s.tensor == tensor && s.unit == target.unit)
        .flat_map(|s| s.loop_vars(root))
        .collect();
    let scope = common_scope(root, &participants)
        .and_then(|scope| raise_above(root, scope, &vars))
        .context(StructuralConflictSnafu { tensor, reason: "the writer and its readers share no enclosing sequence" })?;
    let writer_child = target
        .child_of(&scope)
        .context(StructuralConflictSnafu { tensor, reason: "the writer lies outside the chosen scope" })?;

    let in_child: Vec<&AccessSite> = sites.iter().filter(|s| s.child_of(&scope) == Some(writer_child)).collect();
    if in_child.first().is_some_and(|s| !s.is_store()) {
        return StructuralConflictSnafu { tensor, reason: "its previous value is read before the cache is written" }
            .fail();
    }

    let stores: Vec<AccessSite> = in_child.iter().filter(|s| s.is_store() && s.tensor == tensor).map(|s| (*s).clone()).collect();
    let region = union_regions(root, &stores)?
        .context(StructuralConflictSnafu { tensor, reason: "no store is left to redirect" })?;
    // Aliases are rebound to the cache and would observe elements it never holds.
    if has_aliases && region != Region::full(shape) {
        return StructuralConflictSnafu {
            tensor,
            reason: format!("other tensors alias its buffer but the writer only covers {region}"),
        }
        .fail();
    }

    let mut loads = Vec::new();
    for site in in_child.iter().filter(|s| !s.is_store() && s.tensor == tensor) {
        if region.contains(&site.region(root)?) {
            loads.push((*site).clone());
        }
    }

    tracing::debug!(
        tensor,
        stores = stores.len(),
        loads = loads.len(),
        region = %region,
        scope = ?scope,
        index = writer_child + 1,
        "located cache write"
    );
    info.loc = InsertionPoint { scope, index: writer_child + 1 };
    Ok(WriteSelection { stores, loads, region })
}

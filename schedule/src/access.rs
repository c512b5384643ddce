//! Tensor access sites.
//!
//! An [`AccessSite`] records where a tensor is loaded or stored: the path of
//! the statement holding the access, which access of that statement it is,
//! and the block ("unit") it belongs to. Sites are produced in execution
//! order, so a statement's loads come before its store.

use std::collections::{BTreeMap, BTreeSet};
use std::ops::ControlFlow;

use cachet_ir::{Expr, Indices, Stmt, StmtPath};
use snafu::{OptionExt, ensure};

use crate::error::{AccessIndexOutOfRangeSnafu, AccessKind, BlockNotFoundSnafu, Result};
use crate::region::{BoundContext, Region};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Slot {
    /// The n-th load of the statement, counting loads of every tensor.
    Load(usize),
    Store,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AccessSite {
    pub path: StmtPath,
    pub slot: Slot,
    pub tensor: String,
    pub indices: Indices,
    /// Innermost non-root block holding the access, or the statement itself
    /// when no block encloses it.
    pub unit: StmtPath,
}

impl AccessSite {
    pub fn kind(&self) -> AccessKind {
        match self.slot {
            Slot::Load(_) => AccessKind::Read,
            Slot::Store => AccessKind::Write,
        }
    }

    pub fn is_store(&self) -> bool {
        self.slot == Slot::Store
    }

    pub fn region(&self, root: &Stmt) -> Result<Region> {
        BoundContext::at(root, &self.path).region(&self.tensor, &self.indices)
    }

    /// Loop variables the indices depend on.
    pub fn loop_vars(&self, root: &Stmt) -> BTreeSet<String> {
        let ctx = BoundContext::at(root, &self.path);
        self.indices.iter().flat_map(|idx| ctx.loop_vars_of(idx)).collect()
    }

    /// Position of the child of `scope` that holds this access.
    pub fn child_of(&self, scope: &[usize]) -> Option<usize> {
        if self.path.starts_with(scope) { self.path.get(scope.len()).copied() } else { None }
    }
}

/// Path of the innermost non-root block on `path`, or `path` itself.
fn enclosing_unit(root: &Stmt, path: &[usize]) -> StmtPath {
    let mut node = root;
    let mut unit = path.len();
    for (depth, &i) in path.iter().enumerate() {
        let Some(child) = node.child(i) else { break };
        node = child;
        if node.as_realize().is_some() {
            unit = depth + 1;
        }
    }
    path[..unit].to_vec()
}

/// Every access under `root` to a tensor accepted by `wanted`.
pub fn collect_accesses(root: &Stmt, mut wanted: impl FnMut(&str) -> bool) -> Vec<AccessSite> {
    let mut sites = Vec::new();
    let _ = root.walk(&mut |path, stmt| {
        let mut ordinal = 0;
        for expr in stmt.local_exprs() {
            expr.visit_loads(&mut |load| {
                if wanted(&load.tensor) {
                    sites.push(AccessSite {
                        path: path.to_vec(),
                        slot: Slot::Load(ordinal),
                        tensor: load.tensor.clone(),
                        indices: load.indices.clone(),
                        unit: enclosing_unit(root, path),
                    });
                }
                ordinal += 1;
            });
        }
        if let Stmt::Store(store) = stmt
            && wanted(&store.tensor)
        {
            sites.push(AccessSite {
                path: path.to_vec(),
                slot: Slot::Store,
                tensor: store.tensor.clone(),
                indices: store.indices.clone(),
                unit: enclosing_unit(root, path),
            });
        }
        ControlFlow::Continue(())
    });
    sites
}

/// The `index`-th load or store inside the block at `block_path`.
pub fn nth_access(root: &Stmt, block: &str, block_path: &[usize], index: usize, kind: AccessKind) -> Result<AccessSite> {
    let block_stmt = root.get(block_path).context(BlockNotFoundSnafu { name: block })?;
    let candidates: Vec<_> = collect_accesses(block_stmt, |_| true).into_iter().filter(|s| s.kind() == kind).collect();
    let count = candidates.len();
    ensure!(index < count, AccessIndexOutOfRangeSnafu { block, kind, index, count });

    let mut site = candidates.into_iter().nth(index).context(AccessIndexOutOfRangeSnafu { block, kind, index, count })?;
    site.path = block_path.iter().chain(&site.path).copied().collect();
    site.unit = enclosing_unit(root, &site.path);
    Ok(site)
}

/// Point the accesses at `sites` to `tensor` (if given) and shift their
/// indices down by `mins`. Returns the number of rewritten accesses.
pub fn rewrite_sites<'a>(
    root: &mut Stmt,
    sites: impl IntoIterator<Item = &'a AccessSite>,
    tensor: Option<&str>,
    mins: &[i64],
) -> usize {
    let mut by_stmt: BTreeMap<&StmtPath, (BTreeSet<usize>, bool)> = BTreeMap::new();
    for site in sites {
        let entry = by_stmt.entry(&site.path).or_default();
        match site.slot {
            Slot::Load(ordinal) => {
                entry.0.insert(ordinal);
            }
            Slot::Store => entry.1 = true,
        }
    }

    let mut rewritten = 0;
    for (path, (loads, store)) in by_stmt {
        let Some(stmt) = root.get_mut(path) else { continue };
        if !loads.is_empty() {
            let mut ordinal = 0;
            for expr in stmt.local_exprs_mut() {
                expr.visit_loads_mut(&mut |load| {
                    if loads.contains(&ordinal) {
                        retarget(&mut load.tensor, &mut load.indices, tensor, mins);
                        rewritten += 1;
                    }
                    ordinal += 1;
                });
            }
        }
        if store && let Stmt::Store(s) = stmt {
            retarget(&mut s.tensor, &mut s.indices, tensor, mins);
            rewritten += 1;
        }
    }
    rewritten
}

fn retarget(name: &mut String, indices: &mut Indices, tensor: Option<&str>, mins: &[i64]) {
    if let Some(tensor) = tensor {
        *name = tensor.to_string();
    }
    for (index, &min) in indices.iter_mut().zip(mins) {
        let old = std::mem::replace(index, Expr::int(0));
        *index = old - min;
    }
}

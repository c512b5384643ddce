//! Scope rewriters.
//!
//! Both rewriters redirect a preselected set of accesses to the cache tensor,
//! translating their indices by the cached region's minimum, and then splice
//! the copy block at the located insertion point. Everything else in the tree
//! is left as is.

use cachet_ir::Stmt;

use super::CacheBlockInfo;
use crate::access::{AccessSite, rewrite_sites};
use crate::error::Result;
use crate::region::Region;
use crate::tree_utils::insert_into_seq;

/// Redirects readers of the original tensor to the cache, which the copy
/// block fills right before them.
pub struct CacheReadRewriter<'a> {
    pub info: &'a CacheBlockInfo,
    pub region: &'a Region,
}

impl CacheReadRewriter<'_> {
    pub fn apply(&self, root: &mut Stmt, loads: &[AccessSite], copy: Stmt) -> Result<usize> {
        let rewritten = rewrite_sites(root, loads, Some(self.info.write_tensor.as_str()), &self.region.mins());
        insert_into_seq(root, &self.info.loc.scope, self.info.loc.index, copy, &self.info.alloc)?;
        tracing::debug!(cache = %self.info.write_tensor, rewritten, "redirected loads to cache");
        Ok(rewritten)
    }
}

/// Redirects the writer (and the reads that should see its values) to the
/// cache, which the copy block flushes back to the original tensor.
pub struct CacheWriteRewriter<'a> {
    pub info: &'a CacheBlockInfo,
    pub region: &'a Region,
}

impl CacheWriteRewriter<'_> {
    pub fn apply(&self, root: &mut Stmt, stores: &[AccessSite], loads: &[AccessSite], copy: Stmt) -> Result<usize> {
        let cache = Some(self.info.read_tensor.as_str());
        let mins = self.region.mins();
        let rewritten = rewrite_sites(root, stores.iter().chain(loads), cache, &mins);
        insert_into_seq(root, &self.info.loc.scope, self.info.loc.index, copy, &self.info.alloc)?;
        tracing::debug!(cache = %self.info.read_tensor, rewritten, "redirected accesses to cache");
        Ok(rewritten)
    }
}

//! Cache tensors and the copy blocks that fill them.

use cachet_ir::{BlockRealize, Buffer, DeviceApi, Expr, For, IterVar, MemoryType, Stmt, Store, Tensor, TensorTable, Var};

use super::CacheBlockInfo;
use crate::error::Result;
use crate::region::Region;

/// Declare a tensor caching `source` over `region` at `memory`, backed by a
/// fresh buffer. Returns the new tensor's name.
pub fn make_cache_tensor(tensors: &mut TensorTable, source: &str, region: &Region, memory: MemoryType) -> Result<String> {
    let dtype = tensors.tensor(source)?.dtype;
    let name = tensors.fresh_tensor_name(&format!("{source}_{memory}_temp_buffer"));
    let buffer = Buffer::new(Buffer::default_name(&name), memory, dtype, region.extents());

    let mut tensor = Tensor::new(name.clone(), dtype, region.extents());
    tensor.buffer = Some(buffer.name.clone());
    tensors.declare_buffer(buffer)?;
    tensors.declare(tensor)?;

    tracing::debug!(cache = %name, source, memory = %memory, shape = ?region.extents(), "declared cache tensor");
    Ok(name)
}

/// Loop nest copying `info.read_tensor` into `info.write_tensor` over `region`.
///
/// The cache side is indexed by the block's iteration variables, the original
/// side by the region minimum plus those variables. The block is named after
/// `info.alloc`.
pub fn make_cache_block(region: &Region, info: &CacheBlockInfo, device: DeviceApi) -> Stmt {
    let cache = info.alloc.as_str();
    let loop_vars: Vec<Var> = (0..region.rank()).map(|k| Var::new(format!("{cache}_ax{k}"))).collect();
    let iter_vars: Vec<IterVar> =
        region.axes().iter().enumerate().map(|(k, axis)| IterVar::spatial(format!("{cache}_v{k}"), axis.extent)).collect();

    let cache_indices: Vec<Expr> = iter_vars.iter().map(|iv| Expr::from(&iv.var)).collect();
    let original_indices: Vec<Expr> =
        cache_indices.iter().zip(region.axes()).map(|(v, axis)| v.clone() + axis.min).collect();
    let (read_indices, write_indices) = if info.read_tensor == cache {
        (cache_indices, original_indices)
    } else {
        (original_indices, cache_indices)
    };

    let copy = Store::new(info.write_tensor.as_str(), write_indices, Expr::load(info.read_tensor.as_str(), read_indices));
    let block = BlockRealize::builder()
        .name(cache)
        .iter_vars(iter_vars)
        .iter_values(loop_vars.iter().map(Expr::from).collect())
        .body(Stmt::Seq(vec![copy.into()]))
        .build();

    loop_vars.into_iter().zip(region.axes()).rev().fold(Stmt::from(block), |body, (var, axis)| {
        For::builder().var(var).extent(axis.extent).device(device).body(Stmt::Seq(vec![body])).build().into()
    })
}

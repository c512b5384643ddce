//! Tensors, buffers and the aliasing relation between them.
//!
//! A tensor is a named logical array; a buffer is the physical storage it is
//! bound to. Several tensors may bind to the same buffer. The table keeps the
//! forward relation (tensor -> buffer) on each tensor and a reverse index
//! (buffer -> tensors) so that rebinding touches only the affected tensors.

use std::collections::{BTreeMap, BTreeSet};

use smallvec::SmallVec;
use snafu::{OptionExt, ensure};

use crate::error::{
    BufferExistsSnafu, Result, TensorExistsSnafu, UnboundBufferSnafu, UnknownBufferSnafu, UnknownTensorSnafu,
};
use crate::types::{DType, MemoryType};

/// Concrete extents, one per axis.
pub type Shape = SmallVec<[i64; 4]>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tensor {
    pub name: String,
    pub dtype: DType,
    pub shape: Shape,
    /// Name of the bound buffer, if any.
    pub buffer: Option<String>,
}

impl Tensor {
    pub fn new(name: impl Into<String>, dtype: DType, shape: impl IntoIterator<Item = i64>) -> Self {
        Self { name: name.into(), dtype, shape: shape.into_iter().collect(), buffer: None }
    }

    pub fn numel(&self) -> i64 {
        self.shape.iter().product()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Buffer {
    pub name: String,
    pub memory: MemoryType,
    pub dtype: DType,
    pub shape: Shape,
}

impl Buffer {
    pub fn new(name: impl Into<String>, memory: MemoryType, dtype: DType, shape: impl IntoIterator<Item = i64>) -> Self {
        Self { name: name.into(), memory, dtype, shape: shape.into_iter().collect() }
    }

    /// Default buffer name for a tensor.
    pub fn default_name(tensor: &str) -> String {
        format!("_{tensor}")
    }

    pub fn numel(&self) -> i64 {
        self.shape.iter().product()
    }
}

/// Owner of every tensor and buffer of a module.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TensorTable {
    tensors: BTreeMap<String, Tensor>,
    buffers: BTreeMap<String, Buffer>,
    /// Reverse index: buffer name -> names of the tensors bound to it.
    bound: BTreeMap<String, BTreeSet<String>>,
}

impl TensorTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tensor. A buffer named in `tensor.buffer` must already exist.
    pub fn declare(&mut self, tensor: Tensor) -> Result<()> {
        ensure!(!self.tensors.contains_key(&tensor.name), TensorExistsSnafu { name: tensor.name.clone() });
        if let Some(buffer) = &tensor.buffer {
            ensure!(self.buffers.contains_key(buffer), UnknownBufferSnafu { name: buffer.clone() });
            self.bound.entry(buffer.clone()).or_default().insert(tensor.name.clone());
        }
        self.tensors.insert(tensor.name.clone(), tensor);
        Ok(())
    }

    pub fn declare_buffer(&mut self, buffer: Buffer) -> Result<()> {
        ensure!(!self.buffers.contains_key(&buffer.name), BufferExistsSnafu { name: buffer.name.clone() });
        self.buffers.insert(buffer.name.clone(), buffer);
        Ok(())
    }

    /// Declare a tensor together with a fresh buffer named after it.
    pub fn declare_with_buffer(&mut self, mut tensor: Tensor, memory: MemoryType) -> Result<()> {
        let buffer = Buffer::new(Buffer::default_name(&tensor.name), memory, tensor.dtype, tensor.shape.clone());
        ensure!(!self.tensors.contains_key(&tensor.name), TensorExistsSnafu { name: tensor.name.clone() });
        tensor.buffer = Some(buffer.name.clone());
        self.declare_buffer(buffer)?;
        self.declare(tensor)
    }

    pub fn contains(&self, tensor: &str) -> bool {
        self.tensors.contains_key(tensor)
    }

    pub fn contains_buffer(&self, buffer: &str) -> bool {
        self.buffers.contains_key(buffer)
    }

    pub fn tensor(&self, name: &str) -> Result<&Tensor> {
        self.tensors.get(name).context(UnknownTensorSnafu { name })
    }

    pub fn tensor_mut(&mut self, name: &str) -> Result<&mut Tensor> {
        self.tensors.get_mut(name).context(UnknownTensorSnafu { name })
    }

    pub fn buffer(&self, name: &str) -> Result<&Buffer> {
        self.buffers.get(name).context(UnknownBufferSnafu { name })
    }

    pub fn buffer_mut(&mut self, name: &str) -> Result<&mut Buffer> {
        self.buffers.get_mut(name).context(UnknownBufferSnafu { name })
    }

    /// Buffer bound to `tensor`; fails if the tensor is unbound.
    pub fn buffer_of(&self, tensor: &str) -> Result<&Buffer> {
        let name = self.tensor(tensor)?.buffer.as_deref().context(UnboundBufferSnafu { tensor })?;
        self.buffer(name)
    }

    pub fn tensors(&self) -> impl Iterator<Item = &Tensor> {
        self.tensors.values()
    }

    pub fn buffers(&self) -> impl Iterator<Item = &Buffer> {
        self.buffers.values()
    }

    /// Names of the tensors currently bound to `buffer`.
    pub fn aliases(&self, buffer: &str) -> impl Iterator<Item = &str> {
        self.bound.get(buffer).into_iter().flatten().map(String::as_str)
    }

    /// Bind `tensor` to `buffer`, replacing any previous binding.
    pub fn bind(&mut self, tensor: &str, buffer: &str) -> Result<()> {
        ensure!(self.buffers.contains_key(buffer), UnknownBufferSnafu { name: buffer });
        let entry = self.tensors.get_mut(tensor).context(UnknownTensorSnafu { name: tensor })?;
        if let Some(old) = entry.buffer.replace(buffer.to_string())
            && let Some(set) = self.bound.get_mut(&old)
        {
            set.remove(tensor);
            if set.is_empty() {
                self.bound.remove(&old);
            }
        }
        self.bound.entry(buffer.to_string()).or_default().insert(tensor.to_string());
        Ok(())
    }

    /// Rebind every tensor bound to `old_buffer` (other than `except`) to
    /// `new_buffer`. Returns the rebound tensor names.
    pub fn rebind_all(&mut self, old_buffer: &str, new_buffer: &str, except: Option<&str>) -> Result<Vec<String>> {
        ensure!(self.buffers.contains_key(new_buffer), UnknownBufferSnafu { name: new_buffer });
        let moved: Vec<String> = self.aliases(old_buffer).filter(|name| Some(*name) != except).map(String::from).collect();
        for name in &moved {
            self.bind(name, new_buffer)?;
            tracing::trace!(tensor = %name, from = old_buffer, to = new_buffer, "rebound tensor");
        }
        Ok(moved)
    }

    /// `base` if no tensor uses it yet, otherwise `base_1`, `base_2`, ...
    pub fn fresh_tensor_name(&self, base: &str) -> String {
        if !self.is_taken(base) {
            return base.to_string();
        }
        (1..).map(|i| format!("{base}_{i}")).find(|name| !self.is_taken(name)).unwrap_or_else(|| base.to_string())
    }

    fn is_taken(&self, name: &str) -> bool {
        self.tensors.contains_key(name) || self.buffers.contains_key(&Buffer::default_name(name))
    }
}

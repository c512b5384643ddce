//! Loop-nest intermediate representation for the cachet tensor scheduler.
//!
//! A program is a tree of nested scopes: loops, realized blocks (named units
//! of computation with bound iteration variables) and leaf statements that
//! load from and store to tensors. Tensors are referenced by name and bound to
//! physical buffers through a module-wide [`TensorTable`].
//!
//! # Module Organization
//!
//! - [`types`] - Element types, constants and loop/storage tags
//! - [`expr`] - Value expressions
//! - [`stmt`] - Statements and tree addressing
//! - [`tensor`] - Tensors, buffers and the aliasing index
//! - [`module`] - Programs sharing one tensor table
//! - [`search`] - Predicate-driven tree search
//! - [`error`] - Error types and result handling

pub mod display;
pub mod error;
pub mod expr;
pub mod module;
pub mod search;
pub mod stmt;
pub mod tensor;
pub mod tree;
pub mod types;

#[cfg(any(test, feature = "interp"))]
pub mod interp;


pub use error::{Error, Result};
pub use expr::{Expr, Indices, Load, Var};
pub use module::Module;
pub use search::{Found, NodeRef, SearchMode, collect_nodes};
pub use stmt::{BlockRealize, For, IterVar, ROOT_BLOCK, ScheduleBlock, Stmt, StmtPath, Store};
pub use tensor::{Buffer, Shape, Tensor, TensorTable};
pub use types::{BinaryOp, ConstValue, DType, DeviceApi, ForKind, IterKind, MemoryType};

//! Scheduling primitives for the cachet loop-nest IR.
//!
//! The primitives redirect tensor accesses through storage at another level
//! of the memory hierarchy while preserving what the program computes.
//!
//! # Module Organization
//!
//! - [`schedule`] - The [`Schedule`] handle exposing every primitive
//! - [`cache`] - Cache read/write insertion (artifacts, locator, rewriters)
//! - [`region`] - Index region analysis
//! - [`access`] - Tensor access sites and their rewriting
//! - [`buffer`] - Buffer binding and local footprint sizing
//! - [`sync`] - Barrier insertion
//! - [`config`] - Schedule configuration

pub mod access;
pub mod buffer;
pub mod cache;
pub mod config;
pub mod error;
pub mod region;
pub mod schedule;
pub mod sync;
pub mod tree_utils;

#[cfg(test)]
pub mod test;

pub use cache::{CacheBlockInfo, InsertionPoint};
pub use config::ScheduleConfig;
pub use error::{AccessKind, ErrorKind, Result, ScheduleError};
pub use region::{AxisRange, Region, calculate_tensor_region};
pub use schedule::Schedule;
pub use sync::ScopeRef;

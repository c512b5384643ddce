//! Schedule configuration.
//!
//! Provides typed configuration for the schedule primitives with bon builders.
//! Supports both explicit configuration and environment variable fallbacks.

use bon::bon;
use cachet_ir::DeviceApi;

/// Name of the barrier intrinsic emitted by `sync_threads`.
pub const DEFAULT_BARRIER: &str = "__syncthreads";

/// Suffix naming the zero-initialization twin of a reduction tensor.
pub const DEFAULT_REDUCE_INIT_SUFFIX: &str = "__reduce_init";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduleConfig {
    /// Device tag of synthesized copy loops.
    pub device: DeviceApi,
    pub barrier_intrinsic: String,
    pub reduce_init_suffix: String,
    /// Log the whole program after every primitive.
    pub trace_ir: bool,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

#[bon]
impl ScheduleConfig {
    /// Create a schedule configuration with builder pattern.
    #[builder]
    pub fn builder(
        #[builder(default)] device: DeviceApi,
        #[builder(into, default = DEFAULT_BARRIER.to_string())] barrier_intrinsic: String,
        #[builder(into, default = DEFAULT_REDUCE_INIT_SUFFIX.to_string())] reduce_init_suffix: String,
        #[builder(default = false)] trace_ir: bool,
    ) -> Self {
        Self { device, barrier_intrinsic, reduce_init_suffix, trace_ir }
    }

    /// Create configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// * `CACHET_DEVICE=host|gpu` - Device tag of synthesized copy loops
    /// * `CACHET_TRACE_IR=1` - Log the program after every primitive
    pub fn from_env() -> Self {
        let device = std::env::var("CACHET_DEVICE").ok().and_then(|d| d.parse().ok()).unwrap_or_default();
        let trace_ir = std::env::var("CACHET_TRACE_IR").is_ok_and(|v| v == "1");
        Self::builder().device(device).trace_ir(trace_ir).build()
    }

    /// Name of the zero-initialization twin of `tensor`.
    pub fn reduce_init_name(&self, tensor: &str) -> String {
        format!("{tensor}{}", self.reduce_init_suffix)
    }
}

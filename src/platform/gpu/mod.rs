//! GPU-specific platform code.
//!
//! Provides GPU utilization readings for the load sampler.
//! Currently supports NVIDIA via NVML; other vendors would slot in here.

mod nvidia;

pub use nvidia::NvidiaGpuProvider;

use crate::core::sampler::GpuProvider;
use crate::error::{GuardError, Result};

/// Attempt to get an available GPU provider
///
/// Returns error if no GPU is available; the sampler then runs with GPU
/// telemetry marked unavailable rather than failing.
pub fn get_gpu_provider() -> Result<Box<dyn GpuProvider>> {
    if let Ok(provider) = NvidiaGpuProvider::new() {
        return Ok(Box::new(provider));
    }

    Err(GuardError::gpu_not_available("No supported GPU found"))
}

/// Check if any GPU is available without keeping a provider around
pub fn is_gpu_available() -> bool {
    get_gpu_provider().is_ok()
}

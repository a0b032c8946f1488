#[cfg(feature = "nvml")]
use nvml_wrapper::{Device, Nvml};

use crate::core::sampler::GpuProvider;
use crate::error::{GuardError, Result};

/// NVIDIA GPU provider using NVML
pub struct NvidiaGpuProvider {
    #[cfg(feature = "nvml")]
    nvml: Nvml,
    device_index: u32,
}

impl NvidiaGpuProvider {
    /// Create a new NVIDIA GPU provider
    ///
    /// Initializes NVML and selects the first available GPU.
    pub fn new() -> Result<Self> {
        Self::with_device_index(0)
    }

    /// Create provider for a specific GPU index
    pub fn with_device_index(index: u32) -> Result<Self> {
        #[cfg(feature = "nvml")]
        {
            let nvml = Nvml::init()
                .map_err(|e| GuardError::gpu_not_available(format!("Failed to init NVML: {}", e)))?;

            // Verify device exists
            let _ = nvml.device_by_index(index).map_err(|e| {
                GuardError::gpu_not_available(format!("GPU {} not found: {}", index, e))
            })?;

            Ok(Self {
                nvml,
                device_index: index,
            })
        }
        #[cfg(not(feature = "nvml"))]
        {
            let _ = index;
            Err(GuardError::gpu_not_available(
                "NVIDIA GPU support not enabled",
            ))
        }
    }

    #[cfg(feature = "nvml")]
    fn get_device(&self) -> Result<Device<'_>> {
        self.nvml
            .device_by_index(self.device_index)
            .map_err(|e| GuardError::sampling(format!("Failed to get GPU device: {}", e)))
    }
}

impl GpuProvider for NvidiaGpuProvider {
    fn name(&self) -> String {
        #[cfg(feature = "nvml")]
        {
            self.get_device()
                .and_then(|device| {
                    device
                        .name()
                        .map_err(|e| GuardError::sampling(e.to_string()))
                })
                .unwrap_or_else(|_| "Unknown NVIDIA GPU".to_string())
        }
        #[cfg(not(feature = "nvml"))]
        {
            "NVIDIA GPU (support not enabled)".to_string()
        }
    }

    fn utilization_percent(&mut self) -> Result<f32> {
        #[cfg(feature = "nvml")]
        {
            let device = self.get_device()?;
            let utilization = device.utilization_rates().map_err(|e| {
                GuardError::sampling(format!("Failed to get GPU utilization: {}", e))
            })?;
            Ok(utilization.gpu as f32)
        }
        #[cfg(not(feature = "nvml"))]
        {
            Err(GuardError::gpu_not_available(
                "NVIDIA GPU support not enabled",
            ))
        }
    }
}

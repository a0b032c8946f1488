//! Load sampling: CPU via sysinfo, GPU via a vendor provider.
//!
//! The sampler wraps a raw probe with bounded retries, a previous-sample
//! fallback for transient failures, and a degraded-sampling escalation for
//! sustained ones. The CPU figure is the OS primitive's utilization since
//! the previous refresh, so each cycle already sees a short-window average.

use log::{debug, warn};
use sysinfo::{CpuRefreshKind, RefreshKind, System};

use crate::core::engine::LoadSample;
use crate::error::Result;
use crate::platform::gpu::get_gpu_provider;

/// Extra read attempts within one cycle before falling back to the previous sample
const SAMPLE_RETRIES: u32 = 2;
/// Consecutive failed cycles before the sampler reports itself degraded
const DEGRADED_AFTER_CYCLES: u32 = 3;

/// Trait for GPU utilization providers
///
/// Implementations are provided in the platform layer and selected at
/// startup; no compatible GPU simply means no provider.
pub trait GpuProvider: Send {
    /// Human-readable device name
    fn name(&self) -> String;

    /// Current GPU utilization in percent
    fn utilization_percent(&mut self) -> Result<f32>;
}

/// One raw reading from a probe, before clamping and timestamping
#[derive(Debug, Clone, Copy)]
pub struct RawLoad {
    pub cpu: f32,
    /// `None` when no GPU telemetry is available
    pub gpu: Option<f32>,
}

/// Source of raw CPU/GPU readings
pub trait LoadProbe: Send {
    fn read(&mut self) -> Result<RawLoad>;
}

/// Probe backed by sysinfo for CPU and an optional vendor provider for GPU.
pub struct SystemLoadProbe {
    system: System,
    gpu: Option<Box<dyn GpuProvider>>,
}

impl SystemLoadProbe {
    pub fn new() -> Self {
        let refresh_kind = RefreshKind::nothing().with_cpu(CpuRefreshKind::everything());
        let mut system = System::new_with_specifics(refresh_kind);

        // First refresh establishes the baseline for the usage delta
        system.refresh_cpu_usage();

        let gpu = match get_gpu_provider() {
            Ok(provider) => {
                debug!("GPU telemetry available: {}", provider.name());
                Some(provider)
            }
            Err(e) => {
                warn!("GPU telemetry unavailable, CPU thresholds only: {}", e);
                None
            }
        };

        Self { system, gpu }
    }

    pub fn gpu_name(&self) -> Option<String> {
        self.gpu.as_ref().map(|provider| provider.name())
    }
}

impl Default for SystemLoadProbe {
    fn default() -> Self {
        Self::new()
    }
}

impl LoadProbe for SystemLoadProbe {
    fn read(&mut self) -> Result<RawLoad> {
        self.system.refresh_cpu_usage();
        let cpu = self.system.global_cpu_usage();

        // A failed GPU read is worth a log line but not a failed cycle; the
        // reading is just unavailable for this sample
        let gpu = match self.gpu.as_mut() {
            Some(provider) => match provider.utilization_percent() {
                Ok(value) => Some(value),
                Err(e) => {
                    debug!("GPU utilization read failed: {}", e);
                    None
                }
            },
            None => None,
        };

        Ok(RawLoad { cpu, gpu })
    }
}

/// Outcome of one sampling cycle
#[derive(Debug, Clone)]
pub struct SampleOutcome {
    pub sample: LoadSample,
    /// Set once `DEGRADED_AFTER_CYCLES` consecutive cycles failed to read
    pub degraded: bool,
}

/// Wraps a probe with the per-cycle retry/fallback/degradation policy.
pub struct LoadSampler {
    probe: Box<dyn LoadProbe>,
    last_sample: Option<LoadSample>,
    failed_cycles: u32,
}

impl LoadSampler {
    pub fn new(probe: Box<dyn LoadProbe>) -> Self {
        Self {
            probe,
            last_sample: None,
            failed_cycles: 0,
        }
    }

    /// Produce this cycle's sample.
    ///
    /// Retries transient failures a bounded number of times within the
    /// cycle, then reuses the previous sample for this cycle only. The
    /// degraded condition is reported after sustained failure and clears on
    /// the next successful read. Never blocks beyond the probe's own reads
    /// and never fails the cycle.
    pub fn sample(&mut self) -> SampleOutcome {
        for attempt in 1..=(1 + SAMPLE_RETRIES) {
            match self.probe.read() {
                Ok(raw) => {
                    if self.failed_cycles >= DEGRADED_AFTER_CYCLES {
                        warn!("Load sampling recovered after {} failed cycles", self.failed_cycles);
                    }
                    self.failed_cycles = 0;
                    let sample = LoadSample {
                        cpu_percent: raw.cpu.clamp(0.0, 100.0),
                        gpu_percent: raw.gpu.map(|gpu| gpu.clamp(0.0, 100.0)),
                        timestamp: chrono::Utc::now().timestamp(),
                    };
                    self.last_sample = Some(sample.clone());
                    return SampleOutcome {
                        sample,
                        degraded: false,
                    };
                }
                Err(e) => {
                    debug!("Load probe read failed (attempt {}): {}", attempt, e);
                }
            }
        }

        self.failed_cycles += 1;
        let degraded = self.failed_cycles >= DEGRADED_AFTER_CYCLES;
        if degraded {
            warn!(
                "Load sampling degraded: {} consecutive failed cycles",
                self.failed_cycles
            );
        }

        // Fall back to the previous reading for this cycle only; with no
        // history yet, report idle readings alongside the failure counter
        let sample = match &self.last_sample {
            Some(last) => LoadSample {
                timestamp: chrono::Utc::now().timestamp(),
                ..last.clone()
            },
            None => LoadSample {
                cpu_percent: 0.0,
                gpu_percent: None,
                timestamp: chrono::Utc::now().timestamp(),
            },
        };

        SampleOutcome { sample, degraded }
    }
}

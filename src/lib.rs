// Resguard Library - Public API

// Re-export error types
pub mod error;
pub use error::{GuardError, Result};

// Module declarations
pub mod core;
pub mod platform;

// Re-export commonly used types
pub use crate::core::config::GuardianConfig;
pub use crate::core::engine::{
    ControlAction, EngineEvent, GuardianEngine, GuardianRuntime, LoadSample, Pid, PriorityLevel,
    ProcessControl, ReportedCondition, ThrottleState,
};
pub use crate::core::sampler::{GpuProvider, LoadProbe, LoadSampler, RawLoad, SystemLoadProbe};

// Initialize logging
pub fn init_logging() {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();
}

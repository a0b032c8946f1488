// Platform-specific code module

pub mod gpu;
pub mod process;

pub use process::SystemProcessControl;

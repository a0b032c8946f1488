//! Weak reference to the process under management.
//!
//! The engine never owns the OS process; it holds a lookup key (the process
//! name) plus a lazily revalidated cached PID that is dropped and re-resolved
//! when the process exits, restarts, or the PID gets reused.

use log::{debug, info};

use crate::error::{GuardError, Result};

/// OS process identifier
pub type Pid = u32;

/// Scheduling priority the guardian can assign to the target.
///
/// A single step below normal is the only throttle level for now; graduated
/// levels would extend this enum rather than the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PriorityLevel {
    Normal,
    BelowNormal,
}

/// Capability interface for controlling a target process.
///
/// Platform implementations live in the platform layer and are selected at
/// startup; the engine never branches on the OS. All mutating operations are
/// idempotent at the handle level: suspending an already-suspended process or
/// re-applying the current priority succeeds as a no-op.
pub trait ProcessControl: Send {
    /// Find a process by name (first case-insensitive substring match).
    ///
    /// Multiple instances of the same name are not disambiguated; the first
    /// match wins. Documented limitation, not a defect.
    fn resolve(&mut self, name: &str) -> Option<Pid>;

    fn set_priority(&mut self, pid: Pid, level: PriorityLevel) -> Result<()>;

    fn suspend(&mut self, pid: Pid) -> Result<()>;

    fn resume(&mut self, pid: Pid) -> Result<()>;

    fn is_alive(&mut self, pid: Pid) -> bool;
}

/// Lookup key plus cached handle for the target process.
#[derive(Debug, Clone)]
pub struct TargetProcess {
    name: String,
    pid: Option<Pid>,
}

impl TargetProcess {
    pub fn new<S: Into<String>>(name: S) -> Self {
        Self {
            name: name.into(),
            pid: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn cached_pid(&self) -> Option<Pid> {
        self.pid
    }

    /// Point at a different process; takes effect on the next resolution.
    pub fn set_name(&mut self, name: &str) {
        if name != self.name {
            info!("Target process changed: '{}' -> '{}'", self.name, name);
            self.name = name.to_string();
            self.pid = None;
        }
    }

    /// Drop the cached handle so the next cycle resolves afresh.
    pub fn invalidate(&mut self) {
        self.pid = None;
    }

    /// Return a live PID for the target, revalidating the cache.
    ///
    /// A dead cached handle yields `ProcessGone` for this cycle and clears
    /// the cache; resolution is retried on the next cycle, not in a loop
    /// here. With no cache, one fresh resolution attempt is made.
    pub fn current(&mut self, control: &mut dyn ProcessControl) -> Result<Pid> {
        if let Some(pid) = self.pid {
            if control.is_alive(pid) {
                return Ok(pid);
            }
            debug!("Cached handle for '{}' (pid {}) is stale", self.name, pid);
            self.pid = None;
            return Err(GuardError::ProcessGone(pid));
        }

        match control.resolve(&self.name) {
            Some(pid) => {
                info!("Resolved target '{}' to pid {}", self.name, pid);
                self.pid = Some(pid);
                Ok(pid)
            }
            None => Err(GuardError::process_not_found(&self.name)),
        }
    }
}

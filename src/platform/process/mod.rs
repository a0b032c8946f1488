//! Process-control platform code.
//!
//! Resolution and liveness go through sysinfo on every platform; the
//! mutating operations (priority, suspend, resume) are implemented per OS.

#[cfg(unix)]
mod unix;
#[cfg(unix)]
use unix as imp;

#[cfg(windows)]
mod windows;
#[cfg(windows)]
use windows as imp;

use sysinfo::{ProcessRefreshKind, ProcessesToUpdate, RefreshKind, System};

use crate::core::engine::{Pid, PriorityLevel, ProcessControl};
use crate::error::Result;

/// Process controller backed by the host OS.
pub struct SystemProcessControl {
    system: System,
}

impl SystemProcessControl {
    pub fn new() -> Self {
        let refresh_kind =
            RefreshKind::nothing().with_processes(ProcessRefreshKind::nothing());
        Self {
            system: System::new_with_specifics(refresh_kind),
        }
    }
}

impl Default for SystemProcessControl {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessControl for SystemProcessControl {
    fn resolve(&mut self, name: &str) -> Option<Pid> {
        self.system
            .refresh_processes(ProcessesToUpdate::All, true);

        let needle = name.to_lowercase();
        // Lowest matching pid, so repeated resolution is deterministic
        self.system
            .processes()
            .iter()
            .filter(|(_, process)| {
                process
                    .name()
                    .to_string_lossy()
                    .to_lowercase()
                    .contains(&needle)
            })
            .map(|(pid, _)| pid.as_u32())
            .min()
    }

    fn set_priority(&mut self, pid: Pid, level: PriorityLevel) -> Result<()> {
        imp::set_priority(pid, level)
    }

    fn suspend(&mut self, pid: Pid) -> Result<()> {
        imp::suspend(pid)
    }

    fn resume(&mut self, pid: Pid) -> Result<()> {
        imp::resume(pid)
    }

    fn is_alive(&mut self, pid: Pid) -> bool {
        let sys_pid = sysinfo::Pid::from_u32(pid);
        self.system
            .refresh_processes(ProcessesToUpdate::Some(&[sys_pid]), true);
        self.system.process(sys_pid).is_some()
    }
}

//! Unix process control: nice levels and stop/continue signals.
//!
//! Raising priority back to normal may require CAP_SYS_NICE; that surfaces
//! as PermissionDenied and is reported, not fatal.

use crate::core::engine::{Pid, PriorityLevel};
use crate::error::{GuardError, Result};

fn nice_value(level: PriorityLevel) -> libc::c_int {
    match level {
        PriorityLevel::Normal => 0,
        PriorityLevel::BelowNormal => 10,
    }
}

pub fn set_priority(pid: Pid, level: PriorityLevel) -> Result<()> {
    let rc = unsafe { libc::setpriority(libc::PRIO_PROCESS, pid as libc::id_t, nice_value(level)) };
    if rc == -1 {
        return Err(map_errno(pid));
    }
    Ok(())
}

pub fn suspend(pid: Pid) -> Result<()> {
    // SIGSTOP on an already-stopped process is a no-op
    send_signal(pid, libc::SIGSTOP)
}

pub fn resume(pid: Pid) -> Result<()> {
    // SIGCONT on a running process is a no-op
    send_signal(pid, libc::SIGCONT)
}

fn send_signal(pid: Pid, signal: libc::c_int) -> Result<()> {
    let rc = unsafe { libc::kill(pid as libc::pid_t, signal) };
    if rc == -1 {
        return Err(map_errno(pid));
    }
    Ok(())
}

fn map_errno(pid: Pid) -> GuardError {
    let err = std::io::Error::last_os_error();
    match err.raw_os_error() {
        Some(libc::ESRCH) => GuardError::ProcessGone(pid),
        Some(libc::EPERM) | Some(libc::EACCES) => {
            GuardError::permission_denied(format!("pid {}: {}", pid, err))
        }
        _ => GuardError::Io(err),
    }
}

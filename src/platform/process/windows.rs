//! Windows process control: priority classes and whole-process
//! suspend/resume via per-thread SuspendThread/ResumeThread.

use std::mem;

use winapi::shared::winerror::{ERROR_ACCESS_DENIED, ERROR_INVALID_PARAMETER};
use winapi::um::handleapi::{CloseHandle, INVALID_HANDLE_VALUE};
use winapi::um::processthreadsapi::{
    OpenProcess, OpenThread, ResumeThread, SetPriorityClass, SuspendThread,
};
use winapi::um::tlhelp32::{
    CreateToolhelp32Snapshot, Thread32First, Thread32Next, TH32CS_SNAPTHREAD, THREADENTRY32,
};
use winapi::um::winbase::{BELOW_NORMAL_PRIORITY_CLASS, NORMAL_PRIORITY_CLASS};
use winapi::um::winnt::{HANDLE, PROCESS_SET_INFORMATION, THREAD_SUSPEND_RESUME};

use crate::core::engine::{Pid, PriorityLevel};
use crate::error::{GuardError, Result};

fn priority_class(level: PriorityLevel) -> u32 {
    match level {
        PriorityLevel::Normal => NORMAL_PRIORITY_CLASS,
        PriorityLevel::BelowNormal => BELOW_NORMAL_PRIORITY_CLASS,
    }
}

pub fn set_priority(pid: Pid, level: PriorityLevel) -> Result<()> {
    unsafe {
        let handle = OpenProcess(PROCESS_SET_INFORMATION, 0, pid);
        if handle.is_null() {
            return Err(last_error(pid));
        }
        // Setting the class the process already has succeeds as a no-op
        let ok = SetPriorityClass(handle, priority_class(level));
        CloseHandle(handle);
        if ok == 0 {
            return Err(last_error(pid));
        }
    }
    Ok(())
}

pub fn suspend(pid: Pid) -> Result<()> {
    // SuspendThread stacks a suspend count; undo the extra increment on an
    // already-suspended thread so repeated suspends stay idempotent
    for_each_thread(pid, |thread| unsafe {
        let previous = SuspendThread(thread);
        if previous != u32::MAX && previous >= 1 {
            ResumeThread(thread);
        }
    })
}

pub fn resume(pid: Pid) -> Result<()> {
    // Unwind the whole suspend count; resuming a running thread is a no-op
    for_each_thread(pid, |thread| unsafe {
        loop {
            let previous = ResumeThread(thread);
            if previous == u32::MAX || previous <= 1 {
                break;
            }
        }
    })
}

fn for_each_thread<F: FnMut(HANDLE)>(pid: Pid, mut f: F) -> Result<()> {
    unsafe {
        let snapshot = CreateToolhelp32Snapshot(TH32CS_SNAPTHREAD, 0);
        if snapshot == INVALID_HANDLE_VALUE {
            return Err(last_error(pid));
        }

        let mut entry: THREADENTRY32 = mem::zeroed();
        entry.dwSize = mem::size_of::<THREADENTRY32>() as u32;

        let mut matched = 0u32;
        let mut has_entry = Thread32First(snapshot, &mut entry);
        while has_entry != 0 {
            if entry.th32OwnerProcessID == pid {
                let thread = OpenThread(THREAD_SUSPEND_RESUME, 0, entry.th32ThreadID);
                if !thread.is_null() {
                    matched += 1;
                    f(thread);
                    CloseHandle(thread);
                }
            }
            has_entry = Thread32Next(snapshot, &mut entry);
        }
        CloseHandle(snapshot);

        if matched == 0 {
            return Err(GuardError::ProcessGone(pid));
        }
    }
    Ok(())
}

fn last_error(pid: Pid) -> GuardError {
    let err = std::io::Error::last_os_error();
    match err.raw_os_error() {
        Some(code) if code == ERROR_ACCESS_DENIED as i32 => {
            GuardError::permission_denied(format!("pid {}: {}", pid, err))
        }
        Some(code) if code == ERROR_INVALID_PARAMETER as i32 => GuardError::ProcessGone(pid),
        _ => GuardError::Io(err),
    }
}

use std::{io, os::fd::RawFd};

use crate::cutils::cerr;
use interface::ProcessId;

use self::signal::SignalNumber;

// generalized traits for when we want to hide implementations
pub mod interface;

pub mod signal;

pub mod wait;

pub(crate) fn _exit(status: libc::c_int) -> ! {
    unsafe { libc::_exit(status) }
}

pub(crate) enum ForkResult {
    // Parent process branch with the child process' PID.
    Parent(ProcessId),
    // Child process branch.
    Child,
}

/// Create a new process.
///
/// The shell is single threaded, so the child may keep running arbitrary code until it calls
/// `exec`.
pub(crate) fn fork() -> io::Result<ForkResult> {
    let pid = cerr(unsafe { libc::fork() })?;
    if pid == 0 {
        Ok(ForkResult::Child)
    } else {
        Ok(ForkResult::Parent(ProcessId::new(pid)))
    }
}

/// Send a signal to a process with the specified ID.
#[cfg(test)]
pub fn kill(pid: ProcessId, signal: SignalNumber) -> io::Result<()> {
    cerr(unsafe { libc::kill(pid.get(), signal) }).map(|_| ())
}

/// Send a signal to a process group with the specified ID.
pub fn killpg(pgid: ProcessId, signal: SignalNumber) -> io::Result<()> {
    // SAFETY: This function cannot cause UB even if `pgid` is not a valid process ID or if
    // `signal` is not a valid signal code.
    cerr(unsafe { libc::killpg(pgid.get(), signal) }).map(|_| ())
}

/// Get the process group ID of the current process.
#[cfg(test)]
pub fn getpgrp() -> ProcessId {
    ProcessId::new(unsafe { libc::getpgrp() })
}

/// Get a process group ID.
#[cfg(test)]
pub fn getpgid(pid: ProcessId) -> io::Result<ProcessId> {
    // SAFETY: This function cannot cause UB even if `pid` is not a valid process ID
    cerr(unsafe { libc::getpgid(pid.get()) }).map(ProcessId::new)
}

/// Set a process group ID.
///
/// Passing zero for both arguments moves the calling process into a new group named after itself.
pub fn setpgid(pid: ProcessId, pgid: ProcessId) -> io::Result<()> {
    cerr(unsafe { libc::setpgid(pid.get(), pgid.get()) }).map(|_| ())
}

/// Make `new_fd` refer to the same open file as `old_fd`.
pub fn dup2(old_fd: RawFd, new_fd: RawFd) -> io::Result<()> {
    cerr(unsafe { libc::dup2(old_fd, new_fd) }).map(|_| ())
}

/// Write `bytes` to `fd` with plain `write` calls.
///
/// This is async-signal-safe: there is no buffering, no locking and no allocation. Short writes
/// are retried and errors are ignored as there is nobody to report them to.
pub fn write_raw(fd: RawFd, mut bytes: &[u8]) {
    while !bytes.is_empty() {
        let written = unsafe { libc::write(fd, bytes.as_ptr().cast(), bytes.len()) };
        if written <= 0 {
            return;
        }
        bytes = &bytes[written as usize..];
    }
}

pub fn make_zeroed_sigaction() -> libc::sigaction {
    // SAFETY: since sigaction is a C struct, all-zeroes is a valid representation
    // We cannot use a "literal struct" initialization method since the exact representation
    // of libc::sigaction is not fixed.
    unsafe { std::mem::zeroed() }
}

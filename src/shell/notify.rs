//! Signal handlers.
//!
//! Everything reachable from these functions must be async-signal-safe: no allocation, no
//! locks other than the signal mask, no buffered IO and no logging. Messages are formatted into
//! a [`SioBuf`] on the stack and written with a single `write` loop.

use crate::{
    cutils::SavedErrno,
    jobs::{ChildEvent, ChildEventKind, JobControl, JobState},
    system::{
        _exit,
        interface::ProcessId,
        killpg,
        signal::SignalNumber,
        wait::{AnyChild, Wait, WaitError, WaitOptions},
        write_raw,
    },
};

use super::JOBS;

const SIO_CAPACITY: usize = 128;

/// A fixed-size output buffer. Anything that does not fit is cut off.
pub(super) struct SioBuf {
    buf: [u8; SIO_CAPACITY],
    len: usize,
}

impl SioBuf {
    pub(super) const fn new() -> Self {
        Self {
            buf: [0; SIO_CAPACITY],
            len: 0,
        }
    }

    pub(super) fn push_bytes(&mut self, bytes: &[u8]) -> &mut Self {
        let n = bytes.len().min(SIO_CAPACITY - self.len);
        self.buf[self.len..self.len + n].copy_from_slice(&bytes[..n]);
        self.len += n;
        self
    }

    pub(super) fn push_decimal(&mut self, value: i64) -> &mut Self {
        let mut digits = [0u8; 20];
        let mut start = digits.len();
        let mut rest = value.unsigned_abs();
        loop {
            start -= 1;
            digits[start] = b'0' + (rest % 10) as u8;
            rest /= 10;
            if rest == 0 {
                break;
            }
        }

        if value < 0 {
            self.push_bytes(b"-");
        }
        self.push_bytes(&digits[start..])
    }

    pub(super) fn as_bytes(&self) -> &[u8] {
        &self.buf[..self.len]
    }

    pub(super) fn write_out(&self) {
        write_raw(libc::STDOUT_FILENO, self.as_bytes());
    }
}

/// Abort the shell from a context where the normal error path is not available.
fn fatal(message: &[u8]) -> ! {
    write_raw(libc::STDOUT_FILENO, message);
    _exit(1)
}

/// Apply a status change of `pid` to the job table.
///
/// Returns the message to show the user, if any. The change is also queued for the verbose log.
pub(super) fn apply_status(
    control: &mut JobControl,
    pid: ProcessId,
    kind: ChildEventKind,
) -> Option<SioBuf> {
    let jid = control.table.find_by_pid(pid).map(|job| job.jid());
    control.events.push(ChildEvent { pid, jid, kind });

    let jid = jid?;
    let mut message = SioBuf::new();
    let mut report = |what: &[u8], signal: SignalNumber| {
        message
            .push_bytes(b"Job [")
            .push_decimal(jid.get().into())
            .push_bytes(b"] (")
            .push_decimal(pid.get().into())
            .push_bytes(what)
            .push_decimal(signal.into())
            .push_bytes(b"\n");
    };

    match kind {
        ChildEventKind::Exited(_) => {
            control.table.remove(pid);
            None
        }
        ChildEventKind::Signaled(signal) => {
            control.table.remove(pid);
            report(b") terminated by signal ", signal);
            Some(message)
        }
        ChildEventKind::Stopped(signal) => {
            control.table.set_state(pid, JobState::Stopped);
            report(b") stopped by signal ", signal);
            Some(message)
        }
        ChildEventKind::Continued | ChildEventKind::Forwarded(_) => None,
    }
}

/// Reap every child with a pending status change.
pub(super) extern "C" fn on_sigchld(_signal: SignalNumber) {
    let _errno = SavedErrno::save();
    let options = WaitOptions::new().no_hang().untraced().continued();

    loop {
        let (pid, status) = match AnyChild.wait(options) {
            Ok(reaped) => reaped,
            Err(WaitError::Io(err)) if err.raw_os_error() == Some(libc::EINTR) => continue,
            Err(WaitError::NotReady) => break,
            Err(err) if err.is_no_children() => break,
            Err(_) => fatal(b"waitpid error\n"),
        };

        let Some(kind) = ChildEventKind::from_status(status) else {
            continue;
        };

        let Ok(mut jobs) = JOBS.lock() else {
            fatal(b"sigprocmask error\n")
        };
        if let Some(message) = apply_status(&mut jobs, pid, kind) {
            message.write_out();
        }
    }
}

/// Pick the foreground job as the receiver of a keyboard signal and queue that for the verbose
/// log. Returns the process group to signal.
pub(super) fn forward_target(
    control: &mut JobControl,
    signal: SignalNumber,
) -> Option<ProcessId> {
    let job = control.table.foreground()?;
    let (pid, jid) = (job.pid(), job.jid());
    control.events.push(ChildEvent {
        pid,
        jid: Some(jid),
        kind: ChildEventKind::Forwarded(signal),
    });

    Some(pid)
}

/// Forward `SIGINT` and `SIGTSTP` to the process group of the foreground job.
pub(super) extern "C" fn on_keyboard(signal: SignalNumber) {
    let _errno = SavedErrno::save();

    let Ok(mut jobs) = JOBS.lock() else {
        fatal(b"sigprocmask error\n")
    };
    if let Some(pid) = forward_target(&mut jobs, signal) {
        // The group may already be gone; the SIGCHLD handler reports what happened to it.
        let _ = killpg(pid, signal);
    }
}

/// Terminate the shell cleanly, for the benefit of test drivers.
pub(super) extern "C" fn on_sigquit(_signal: SignalNumber) {
    fatal(b"Terminating after receipt of SIGQUIT signal\n")
}

#[cfg(test)]
mod tests {
    use super::{apply_status, forward_target, SioBuf, SIO_CAPACITY};
    use crate::{
        jobs::{ChildEventKind, JobControl, JobId, JobState},
        system::{
            interface::ProcessId,
            signal::consts::{SIGINT, SIGTSTP},
        },
    };
    use pretty_assertions::assert_eq;

    fn text(message: Option<SioBuf>) -> Option<String> {
        message.map(|message| String::from_utf8(message.as_bytes().to_vec()).unwrap())
    }

    #[test]
    fn sio_formatting() {
        let mut buf = SioBuf::new();
        buf.push_bytes(b"n=")
            .push_decimal(0)
            .push_bytes(b",")
            .push_decimal(-42)
            .push_bytes(b",")
            .push_decimal(i64::MIN)
            .push_bytes(b",")
            .push_decimal(1234567890);
        assert_eq!(
            buf.as_bytes(),
            b"n=0,-42,-9223372036854775808,1234567890"
        );
    }

    #[test]
    fn sio_truncates() {
        let mut buf = SioBuf::new();
        for _ in 0..SIO_CAPACITY {
            buf.push_bytes(b"ab");
        }
        buf.push_decimal(7);
        assert_eq!(buf.as_bytes().len(), SIO_CAPACITY);
    }

    #[test]
    fn exit_removes_quietly() {
        let mut control = JobControl::new();
        let pid = ProcessId::new(4242);
        control.table.insert(pid, JobState::Foreground, "sleep 1").unwrap();

        assert_eq!(text(apply_status(&mut control, pid, ChildEventKind::Exited(0))), None);
        assert!(control.table.is_empty());

        let event = control.events.pop().unwrap();
        assert_eq!(event.jid, Some(JobId::new(1)));
        assert_eq!(event.kind, ChildEventKind::Exited(0));
    }

    #[test]
    fn termination_is_reported() {
        let mut control = JobControl::new();
        let pid = ProcessId::new(4242);
        control.table.insert(pid, JobState::Foreground, "sleep 10").unwrap();

        assert_eq!(
            text(apply_status(&mut control, pid, ChildEventKind::Signaled(SIGINT))),
            Some(format!("Job [1] (4242) terminated by signal {SIGINT}\n"))
        );
        assert!(control.table.find_by_pid(pid).is_none());
    }

    #[test]
    fn stop_is_reported() {
        let mut control = JobControl::new();
        let pid = ProcessId::new(4343);
        control.table.insert(ProcessId::new(1), JobState::Background, "a &").unwrap();
        control.table.insert(pid, JobState::Foreground, "sleep 10").unwrap();

        assert_eq!(
            text(apply_status(&mut control, pid, ChildEventKind::Stopped(SIGTSTP))),
            Some(format!("Job [2] (4343) stopped by signal {SIGTSTP}\n"))
        );
        assert_eq!(
            control.table.find_by_pid(pid).unwrap().state(),
            JobState::Stopped
        );
        assert!(control.table.foreground().is_none());

        // continuing does not change the state; bg and fg do that
        assert_eq!(text(apply_status(&mut control, pid, ChildEventKind::Continued)), None);
        assert_eq!(
            control.table.find_by_pid(pid).unwrap().state(),
            JobState::Stopped
        );
    }

    #[test]
    fn untracked_children_are_only_logged() {
        let mut control = JobControl::new();
        let pid = ProcessId::new(99);

        assert_eq!(
            text(apply_status(&mut control, pid, ChildEventKind::Signaled(SIGINT))),
            None
        );
        let event = control.events.pop().unwrap();
        assert_eq!(event.pid, pid);
        assert_eq!(event.jid, None);
    }

    #[test]
    fn keyboard_signals_go_to_the_foreground_job() {
        let mut control = JobControl::new();
        control.table.insert(ProcessId::new(10), JobState::Background, "a &").unwrap();
        assert_eq!(forward_target(&mut control, SIGINT), None);
        assert_eq!(control.events.pop(), None);

        let pid = ProcessId::new(11);
        control.table.insert(pid, JobState::Foreground, "sleep 10").unwrap();
        assert_eq!(forward_target(&mut control, SIGTSTP), Some(pid));

        let event = control.events.pop().unwrap();
        assert_eq!(event.jid, Some(JobId::new(2)));
        assert_eq!(event.kind, ChildEventKind::Forwarded(SIGTSTP));
        // forwarding alone leaves the state to the SIGCHLD handler
        assert_eq!(control.table.foreground().map(|job| job.pid()), Some(pid));
    }
}

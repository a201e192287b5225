use std::fmt;

use crate::system::{
    interface::ProcessId,
    signal::{consts::SIGCONT, signal_name, SignalNumber},
    wait::WaitStatus,
};

use super::JobId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ChildEventKind {
    Exited(i32),
    Signaled(SignalNumber),
    Stopped(SignalNumber),
    Continued,
    /// A keyboard signal the shell passed on to the foreground job.
    Forwarded(SignalNumber),
}

impl ChildEventKind {
    /// Decode a status reported by `waitpid`.
    pub(crate) fn from_status(status: WaitStatus) -> Option<Self> {
        if let Some(code) = status.exit_status() {
            Some(Self::Exited(code))
        } else if let Some(signal) = status.term_signal() {
            Some(Self::Signaled(signal))
        } else if let Some(signal) = status.stop_signal() {
            Some(Self::Stopped(signal))
        } else if status.did_continue() {
            Some(Self::Continued)
        } else {
            None
        }
    }
}

/// A child status change observed by the `SIGCHLD` handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct ChildEvent {
    pub pid: ProcessId,
    /// `None` for children that were never added to the job table.
    pub jid: Option<JobId>,
    pub kind: ChildEventKind,
}

impl fmt::Display for ChildEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.jid {
            Some(jid) => write!(f, "Job [{jid}] ({}) ", self.pid)?,
            None => write!(f, "Untracked process ({}) ", self.pid)?,
        }

        match self.kind {
            ChildEventKind::Exited(code) => write!(f, "terminates OK (status {code})"),
            ChildEventKind::Signaled(signal) => {
                write!(f, "deleted after {}", signal_name(signal))
            }
            ChildEventKind::Stopped(signal) => write!(f, "stopped by {}", signal_name(signal)),
            ChildEventKind::Continued => write!(f, "restarted by signal {SIGCONT}"),
            ChildEventKind::Forwarded(signal) => write!(f, "sent {}", signal_name(signal)),
        }
    }
}

/// A bounded ring of events. Pushing never allocates; events that do not fit are counted.
pub(crate) struct EventQueue<const N: usize> {
    events: [Option<ChildEvent>; N],
    head: usize,
    len: usize,
    dropped: usize,
}

impl<const N: usize> EventQueue<N> {
    pub(crate) const fn new() -> Self {
        Self {
            events: [None; N],
            head: 0,
            len: 0,
            dropped: 0,
        }
    }

    pub(crate) fn push(&mut self, event: ChildEvent) {
        if self.len == N {
            self.dropped += 1;
            return;
        }

        self.events[(self.head + self.len) % N] = Some(event);
        self.len += 1;
    }

    pub(crate) fn pop(&mut self) -> Option<ChildEvent> {
        if self.len == 0 {
            return None;
        }

        let event = self.events[self.head].take();
        self.head = (self.head + 1) % N;
        self.len -= 1;

        event
    }

    /// The number of events that were lost since the last call.
    pub(crate) fn take_dropped(&mut self) -> usize {
        std::mem::take(&mut self.dropped)
    }
}

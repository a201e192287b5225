//! The job table and the state shared with the signal handlers.
//!
//! Nothing in here allocates or frees memory except [`JobTable::snapshot`], because the table is
//! updated from the `SIGCHLD` handler.

use std::{fmt, num::ParseIntError, str::FromStr};

use crate::{common::Error, system::interface::ProcessId};

pub(crate) use events::{ChildEvent, ChildEventKind, EventQueue};
pub(crate) use shared::{MaskGuard, MaskedCell};

mod events;
mod shared;

/// Maximum number of jobs tracked at the same time.
pub(crate) const MAX_JOBS: usize = 16;
/// Maximum number of bytes of a command line kept for display.
pub(crate) const MAX_LINE: usize = 1024;
/// Number of child status updates that can wait to be logged.
pub(crate) const EVENT_CAPACITY: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct JobId(u32);

impl JobId {
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    pub const fn get(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for JobId {
    type Err = ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse::<u32>().map(JobId::new)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum JobState {
    Foreground,
    Background,
    Stopped,
}

impl JobState {
    /// The state column of the job listing.
    pub(crate) fn label(self) -> &'static str {
        match self {
            JobState::Background => "Running    ",
            JobState::Foreground => "Foreground ",
            JobState::Stopped => "Stopped    ",
        }
    }
}

/// A command line stored inline, so jobs can be dropped inside a signal handler.
#[derive(Clone)]
pub(crate) struct CommandLine {
    buf: [u8; MAX_LINE],
    len: usize,
}

impl CommandLine {
    /// Copy `line`, truncating it to [`MAX_LINE`] bytes on a character boundary.
    pub(crate) fn new(line: &str) -> Self {
        let mut len = line.len().min(MAX_LINE);
        while !line.is_char_boundary(len) {
            len -= 1;
        }

        let mut buf = [0; MAX_LINE];
        buf[..len].copy_from_slice(&line.as_bytes()[..len]);

        Self { buf, len }
    }

    pub(crate) fn as_str(&self) -> &str {
        // Only ever filled with a prefix of a `str` that ends on a character boundary.
        std::str::from_utf8(&self.buf[..self.len]).unwrap_or_default()
    }
}

impl fmt::Debug for CommandLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self.as_str(), f)
    }
}

impl fmt::Display for CommandLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone)]
pub(crate) struct Job {
    pid: ProcessId,
    jid: JobId,
    state: JobState,
    command_line: CommandLine,
}

impl Job {
    pub(crate) fn pid(&self) -> ProcessId {
        self.pid
    }

    pub(crate) fn jid(&self) -> JobId {
        self.jid
    }

    pub(crate) fn state(&self) -> JobState {
        self.state
    }

    pub(crate) fn command_line(&self) -> &str {
        self.command_line.as_str()
    }

    /// The line printed by `jobs`: `[<jid>] (<pid>) <state><command line>`.
    pub(crate) fn listing(&self) -> impl fmt::Display + '_ {
        struct Listing<'a>(&'a Job);

        impl fmt::Display for Listing<'_> {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                let job = self.0;
                write!(
                    f,
                    "[{}] ({}) {}{}",
                    job.jid(),
                    job.pid(),
                    job.state().label(),
                    job.command_line()
                )
            }
        }

        Listing(self)
    }
}

/// The line printed when a job starts or continues in the background:
/// `[<jid>] (<pid>) <command line>`.
impl fmt::Display for Job {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] ({}) {}", self.jid(), self.pid(), self.command_line())
    }
}

/// Why `bg` or `fg` could not find the job it was asked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetError {
    /// No argument, or more than one.
    Missing,
    /// Neither a PID nor `%` followed by a job ID.
    Malformed,
    NoSuchProcess(ProcessId),
    NoSuchJob(JobId),
}

fn all_digits(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit())
}

const EMPTY_SLOT: Option<Job> = None;

/// A fixed number of job slots.
///
/// At most one job is in the foreground. Job IDs of live jobs are distinct and the next job ID
/// is always larger than any live one; numbering starts over at 1 once the table is empty.
pub(crate) struct JobTable {
    slots: [Option<Job>; MAX_JOBS],
    next_jid: u32,
}

impl Default for JobTable {
    fn default() -> Self {
        Self::new()
    }
}

impl JobTable {
    pub(crate) const fn new() -> Self {
        Self {
            slots: [EMPTY_SLOT; MAX_JOBS],
            next_jid: 1,
        }
    }

    fn jobs(&self) -> impl Iterator<Item = &Job> {
        self.slots.iter().flatten()
    }

    fn find_mut(&mut self, pid: ProcessId) -> Option<&mut Job> {
        self.slots.iter_mut().flatten().find(|job| job.pid == pid)
    }

    /// Track a new job, returning its job ID.
    ///
    /// Fails with [`Error::TooManyJobs`] if every slot is taken; the process is then left
    /// running untracked.
    pub(crate) fn insert(
        &mut self,
        pid: ProcessId,
        state: JobState,
        command_line: &str,
    ) -> Result<JobId, Error> {
        if !pid.is_valid() {
            return Err(Error::InvalidProcessId(pid));
        }
        debug_assert!(
            state != JobState::Foreground || self.foreground().is_none(),
            "there is already a foreground job"
        );

        let slot = self
            .slots
            .iter_mut()
            .find(|slot| slot.is_none())
            .ok_or(Error::TooManyJobs)?;

        let jid = JobId::new(self.next_jid);
        self.next_jid += 1;

        *slot = Some(Job {
            pid,
            jid,
            state,
            command_line: CommandLine::new(command_line),
        });

        Ok(jid)
    }

    /// Forget the job with the given PID. Returns whether there was one.
    pub(crate) fn remove(&mut self, pid: ProcessId) -> bool {
        let Some(slot) = self
            .slots
            .iter_mut()
            .find(|slot| slot.as_ref().is_some_and(|job| job.pid == pid))
        else {
            return false;
        };

        *slot = None;
        self.next_jid = self
            .jobs()
            .map(|job| job.jid.get())
            .max()
            .map_or(1, |max| max + 1);

        true
    }

    /// Change the state of the job with the given PID.
    ///
    /// Returns `false` if there is no such job, or if moving it to the foreground would leave two
    /// jobs there.
    pub(crate) fn set_state(&mut self, pid: ProcessId, state: JobState) -> bool {
        if state == JobState::Foreground
            && self
                .foreground()
                .is_some_and(|foreground| foreground.pid != pid)
        {
            return false;
        }

        match self.find_mut(pid) {
            Some(job) => {
                job.state = state;
                true
            }
            None => false,
        }
    }

    pub(crate) fn find_by_pid(&self, pid: ProcessId) -> Option<&Job> {
        if !pid.is_valid() {
            return None;
        }
        self.jobs().find(|job| job.pid == pid)
    }

    pub(crate) fn find_by_jid(&self, jid: JobId) -> Option<&Job> {
        self.jobs().find(|job| job.jid == jid)
    }

    pub(crate) fn foreground(&self) -> Option<&Job> {
        self.jobs().find(|job| job.state == JobState::Foreground)
    }

    /// Copy of every job, in slot order.
    pub(crate) fn snapshot(&self) -> Vec<Job> {
        self.jobs().cloned().collect()
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.jobs().count()
    }

    #[cfg(test)]
    pub(crate) fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Find the job named by a `bg`/`fg` argument: either a PID or `%` followed by a job ID.
    pub(crate) fn resolve(&self, target: &str) -> Result<&Job, TargetError> {
        if all_digits(target) {
            let pid = target.parse().map_err(|_| TargetError::Malformed)?;
            return self
                .find_by_pid(pid)
                .ok_or(TargetError::NoSuchProcess(pid));
        }

        match target.strip_prefix('%') {
            Some(jid) if all_digits(jid) => {
                let jid = jid.parse().map_err(|_| TargetError::Malformed)?;
                self.find_by_jid(jid).ok_or(TargetError::NoSuchJob(jid))
            }
            _ => Err(TargetError::Malformed),
        }
    }
}

/// Everything the main flow shares with the signal handlers.
pub(crate) struct JobControl {
    pub table: JobTable,
    pub events: EventQueue<EVENT_CAPACITY>,
}

impl JobControl {
    pub(crate) const fn new() -> Self {
        Self {
            table: JobTable::new(),
            events: EventQueue::new(),
        }
    }
}

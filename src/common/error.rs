use crate::{jobs::TargetError, parse::ParseError, system::interface::ProcessId};
use std::{fmt, io, path::PathBuf};

#[derive(Debug)]
pub enum Error {
    Parse(ParseError),
    CommandNotFound(String),
    Redirect(PathBuf, io::Error),
    TooManyJobs,
    InvalidProcessId(ProcessId),
    InvalidTarget {
        command: &'static str,
        error: TargetError,
    },
    Synchronization(&'static str, io::Error),
    Io(Option<PathBuf>, io::Error),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Parse(e) => write!(f, "{e}"),
            Error::CommandNotFound(name) => write!(f, "{name}: Command not found"),
            Error::Redirect(path, e) => write!(f, "{}: {e}", path.display()),
            Error::TooManyJobs => f.write_str("Tried to create too many jobs"),
            Error::InvalidProcessId(pid) => write!(f, "invalid process id {pid}"),
            Error::InvalidTarget { command, error } => match error {
                TargetError::Missing => {
                    write!(f, "{command} command requires PID or %jobid argument")
                }
                TargetError::Malformed => {
                    write!(f, "{command}: argument must be a PID or %jobid")
                }
                TargetError::NoSuchProcess(pid) => write!(f, "({pid}): No such process"),
                TargetError::NoSuchJob(jid) => write!(f, "%{jid}: No such job"),
            },
            Error::Synchronization(call, e) => write!(f, "{call} error: {e}"),
            Error::Io(location, e) => {
                if let Some(path) = location {
                    write!(f, "cannot open '{}': {e}", path.display())
                } else {
                    write!(f, "IO error: {e}")
                }
            }
        }
    }
}

impl From<ParseError> for Error {
    fn from(err: ParseError) -> Self {
        Error::Parse(err)
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(None, err)
    }
}

impl Error {
    /// Wrap the failure of a signal-masking or process-control call.
    pub fn sync(call: &'static str) -> impl FnOnce(io::Error) -> Self {
        move |err| Self::Synchronization(call, err)
    }

    /// Returns `true` if the shell cannot keep running after this error.
    ///
    /// Continuing after a masking or process-control failure could silently reopen the window
    /// between creating a child and registering it.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Synchronization(..))
    }
}

use crate::{cutils::cerr, system::make_zeroed_sigaction};

use super::{consts::*, handler::SignalHandlerBehavior, SignalNumber};

use std::{io, mem::MaybeUninit};

#[repr(transparent)]
pub(super) struct SignalAction {
    raw: libc::sigaction,
}

impl SignalAction {
    pub(super) fn new(behavior: SignalHandlerBehavior) -> io::Result<Self> {
        // Slow system calls such as reading the next command line are restarted instead of failing
        // with `EINTR` when a handler runs.
        let sa_flags = libc::SA_RESTART;

        let (sa_sigaction, sa_mask) = match behavior {
            SignalHandlerBehavior::Default => (libc::SIG_DFL, SignalSet::empty()?),
            SignalHandlerBehavior::Ignore => (libc::SIG_IGN, SignalSet::empty()?),
            // Handlers must not be interrupted by any of the handlers that touch the job table.
            SignalHandlerBehavior::Handle(handler) => {
                (handler as libc::sighandler_t, SignalSet::job_control()?)
            }
        };

        let mut raw: libc::sigaction = make_zeroed_sigaction();
        raw.sa_sigaction = sa_sigaction;
        raw.sa_mask = sa_mask.raw;
        raw.sa_flags = sa_flags;

        Ok(Self { raw })
    }

    pub(super) fn register(&self, signal: SignalNumber) -> io::Result<Self> {
        let mut original_action = MaybeUninit::<Self>::zeroed();

        cerr(unsafe { libc::sigaction(signal, &self.raw, original_action.as_mut_ptr().cast()) })?;

        Ok(unsafe { original_action.assume_init() })
    }
}

// A signal set that can be used to mask signals.
#[repr(transparent)]
#[derive(Clone, Copy)]
pub(crate) struct SignalSet {
    raw: libc::sigset_t,
}

impl SignalSet {
    /// The signals whose handlers read or write the job table: `SIGCHLD`, `SIGINT` and `SIGTSTP`.
    pub(crate) const JOB_CONTROL: [SignalNumber; 3] = [SIGCHLD, SIGINT, SIGTSTP];

    /// Create an empty set.
    pub(crate) fn empty() -> io::Result<Self> {
        let mut set = MaybeUninit::<Self>::zeroed();

        cerr(unsafe { libc::sigemptyset(set.as_mut_ptr().cast()) })?;

        Ok(unsafe { set.assume_init() })
    }

    /// Create a set containing all the signals.
    #[cfg(test)]
    pub(crate) fn full() -> io::Result<Self> {
        let mut set = MaybeUninit::<Self>::zeroed();

        cerr(unsafe { libc::sigfillset(set.as_mut_ptr().cast()) })?;

        Ok(unsafe { set.assume_init() })
    }

    /// Create a set containing exactly [`SignalSet::JOB_CONTROL`].
    pub(crate) fn job_control() -> io::Result<Self> {
        let mut set = Self::empty()?;
        for signal in Self::JOB_CONTROL {
            set.add(signal)?;
        }
        Ok(set)
    }

    /// Add `signal` to this set.
    pub(crate) fn add(&mut self, signal: SignalNumber) -> io::Result<()> {
        cerr(unsafe { libc::sigaddset(&mut self.raw, signal) }).map(|_| ())
    }

    /// Return whether `signal` is a member of this set.
    #[cfg(test)]
    pub(crate) fn contains(&self, signal: SignalNumber) -> io::Result<bool> {
        cerr(unsafe { libc::sigismember(&self.raw, signal) }).map(|res| res == 1)
    }

    /// Return the set of currently blocked signals.
    #[cfg(test)]
    pub(crate) fn current() -> io::Result<Self> {
        let mut current = MaybeUninit::<Self>::zeroed();

        cerr(unsafe {
            libc::sigprocmask(libc::SIG_BLOCK, std::ptr::null(), current.as_mut_ptr().cast())
        })?;

        Ok(unsafe { current.assume_init() })
    }

    fn sigprocmask(&self, how: libc::c_int) -> io::Result<Self> {
        let mut original_set = MaybeUninit::<Self>::zeroed();

        cerr(unsafe { libc::sigprocmask(how, &self.raw, original_set.as_mut_ptr().cast()) })?;

        Ok(unsafe { original_set.assume_init() })
    }

    /// Block all the signals in this set and return the previous set of blocked signals.
    ///
    /// After calling this function successfully, the set of blocked signals will be the union of
    /// the previous set of blocked signals and this set.
    pub(crate) fn block(&self) -> io::Result<Self> {
        self.sigprocmask(libc::SIG_BLOCK)
    }

    /// Block only the signals that are in this set and return the previous set of blocked signals.
    ///
    /// After calling this function successfully, the set of blocked signals will be the exactly
    /// this set.
    pub(crate) fn set_mask(&self) -> io::Result<Self> {
        self.sigprocmask(libc::SIG_SETMASK)
    }

    /// Temporarily replace the set of blocked signals with this set and sleep until a signal that
    /// is not blocked gets handled.
    ///
    /// Swapping the mask and going to sleep happen atomically, so a signal that was pending while
    /// blocked is never lost between checking a condition and calling this function. The previous
    /// mask is back in place when this function returns.
    pub(crate) fn suspend(&self) -> io::Result<()> {
        match cerr(unsafe { libc::sigsuspend(&self.raw) }) {
            Err(err) if err.raw_os_error() == Some(libc::EINTR) => Ok(()),
            Err(err) => Err(err),
            Ok(_) => Ok(()),
        }
    }
}

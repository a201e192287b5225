use std::{
    cell::UnsafeCell,
    ops::{Deref, DerefMut},
    sync::atomic::{compiler_fence, Ordering},
};

use crate::{
    common::Error,
    system::{_exit, signal::SignalSet, write_raw},
};

/// State shared between the main flow of a single-threaded program and its signal handlers.
///
/// The value can only be reached through a [`MaskGuard`], which keeps the job control signals
/// blocked for as long as it lives. A handler for one of those signals therefore never observes
/// the value halfway through an update, and the main flow never observes it change under its
/// feet except inside [`MaskGuard::suspend`].
pub(crate) struct MaskedCell<T> {
    value: UnsafeCell<T>,
}

// SAFETY: the only other context that may touch the value is a signal handler running on the
// same thread, which is excluded by the signal mask. `MaskedCell::new` requires the program
// to be single-threaded.
unsafe impl<T: Send> Sync for MaskedCell<T> {}

impl<T> MaskedCell<T> {
    /// # Safety
    ///
    /// The cell must only ever be locked from one thread, and from signal handlers that have
    /// all of [`SignalSet::JOB_CONTROL`] in their mask.
    pub(crate) const unsafe fn new(value: T) -> Self {
        Self {
            value: UnsafeCell::new(value),
        }
    }

    /// Block the job control signals and give access to the value.
    pub(crate) fn lock(&self) -> Result<MaskGuard<'_, T>, Error> {
        let previous = SignalSet::job_control()
            .and_then(|set| set.block())
            .map_err(Error::sync("sigprocmask"))?;

        Ok(MaskGuard {
            cell: self,
            previous,
        })
    }
}

/// Access to a [`MaskedCell`]. Dropping it restores the signal mask that was in place before.
pub(crate) struct MaskGuard<'a, T> {
    cell: &'a MaskedCell<T>,
    previous: SignalSet,
}

impl<T> MaskGuard<'_, T> {
    /// The signal mask that will be restored.
    pub(crate) fn previous_mask(&self) -> &SignalSet {
        &self.previous
    }

    /// Atomically unblock the job control signals and sleep until a handler has run.
    ///
    /// This is the only point where the handlers can change the value while the guard is alive.
    pub(crate) fn suspend(&mut self) -> Result<(), Error> {
        self.previous
            .suspend()
            .map_err(Error::sync("sigsuspend"))?;
        // Handlers may have written through the cell.
        compiler_fence(Ordering::SeqCst);
        Ok(())
    }

    /// Restore the previous signal mask, reporting failures to the caller.
    pub(crate) fn release(self) -> Result<(), Error> {
        let previous = self.previous;
        std::mem::forget(self);
        previous
            .set_mask()
            .map(|_| ())
            .map_err(Error::sync("sigprocmask"))
    }
}

impl<T> Deref for MaskGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        // SAFETY: the job control signals are blocked while `self` is alive.
        unsafe { &*self.cell.value.get() }
    }
}

impl<T> DerefMut for MaskGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        // SAFETY: see `deref`; `&mut self` rules out other references through this guard.
        unsafe { &mut *self.cell.value.get() }
    }
}

impl<T> Drop for MaskGuard<'_, T> {
    fn drop(&mut self) {
        // This also runs inside signal handlers, so only async-signal-safe calls are allowed.
        if self.previous.set_mask().is_err() {
            write_raw(libc::STDOUT_FILENO, b"sigprocmask error\n");
            _exit(1);
        }
    }
}

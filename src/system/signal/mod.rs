//! Utilities to handle signals.
#![warn(unused)]
mod handler;
mod set;

pub(crate) use handler::{SignalHandler, SignalHandlerBehavior};
pub(crate) use set::SignalSet;

pub type SignalNumber = libc::c_int;

macro_rules! define_consts {
    ($($signal:ident,)*) => {
        pub(crate) mod consts {
            pub(crate) use libc::{$($signal,)*};
        }

        pub(crate) fn signal_name(signal: SignalNumber) -> &'static str {
            match signal {
                $(consts::$signal => stringify!($signal),)*
                _ => "unknown signal",
            }
        }
    };
}

define_consts! {
    SIGINT,
    SIGQUIT,
    SIGTSTP,
    SIGUSR1,
    SIGUSR2,
    SIGCHLD,
    SIGCONT,
    SIGTTIN,
    SIGTTOU,
    SIGKILL,
    SIGSTOP,
}

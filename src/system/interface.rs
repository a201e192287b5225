use std::{fmt::Display, num::ParseIntError, str::FromStr};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ProcessId(libc::pid_t);

impl ProcessId {
    pub const fn new(id: libc::pid_t) -> Self {
        Self(id)
    }

    pub const fn get(&self) -> libc::pid_t {
        self.0
    }

    /// Whether this value can name a single existing process.
    ///
    /// Zero and negative values have special meanings for `kill` and `waitpid`.
    pub const fn is_valid(&self) -> bool {
        self.0 > 0
    }
}

impl Display for ProcessId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ProcessId {
    type Err = ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse::<libc::pid_t>().map(ProcessId::new)
    }
}

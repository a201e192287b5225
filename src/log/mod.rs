#![allow(unused_macros)]
use self::simple_logger::SimpleLogger;
use std::fmt;
use std::ops::Deref;

mod simple_logger;

macro_rules! logger_macro {
    ($name:ident is $rule_level:ident to $target:expr, $d:tt) => {
        macro_rules! $name {
            ($d($d arg:tt)+) => (::log::log!(target: $target, ::log::Level::$rule_level, $d($d arg)+));
        }

        pub(crate) use $name;
    };
    ($name:ident is $rule_level:ident to $target:expr) => {
        logger_macro!($name is $rule_level to $target, $);
    };
}

logger_macro!(user_error is Error to "tsh::user");

// verbose (`-v`) job diagnostics
logger_macro!(job_debug is Debug to "tsh::job");

macro_rules! dev_logger_macro {
    ($name:ident is $rule_level:ident to $target:expr, $d:tt) => {
        macro_rules! $name {
            ($d($d arg:tt)+) => {
                if std::cfg!(feature = "dev") {
                    (::log::log!(
                        target: $target,
                        ::log::Level::$rule_level,
                        "{}: {}",
                        std::panic::Location::caller(),
                        format_args!($d($d arg)+)
                    ));
                }
            };
        }

        pub(crate) use $name;
    };
    ($name:ident is $rule_level:ident to $target:expr) => {
        dev_logger_macro!($name is $rule_level to $target, $);
    };
}

dev_logger_macro!(dev_warn is Warn to "tsh::dev");
dev_logger_macro!(dev_info is Info to "tsh::dev");

#[derive(Default)]
pub struct ShellLogger(Vec<(String, Box<dyn Log>)>);

impl ShellLogger {
    pub fn new(prefix: &'static str) -> Self {
        let mut logger: Self = Default::default();

        logger.add_logger("tsh::user", SimpleLogger::to_stderr(prefix));

        logger.add_logger("tsh::job", SimpleLogger::to_stdout(""));

        #[cfg(feature = "dev")]
        {
            let path = std::env::var_os("TSH_DEV_LOGS")
                .map(|s| s.into())
                .unwrap_or_else(|| {
                    std::env::temp_dir().join(format!("tsh-dev-{}.log", std::process::id()))
                });
            if let Ok(file_logger) = SimpleLogger::to_file(path, "") {
                logger.add_logger("tsh::dev", file_logger);
            }
        }

        logger
    }

    /// Install this logger as the global logger.
    ///
    /// Verbose mode makes the `Debug` job diagnostics visible; development logs are always
    /// recorded when the `dev` feature is enabled.
    pub fn into_global_logger(self, verbose: bool) {
        let max_level = if verbose || cfg!(feature = "dev") {
            log::LevelFilter::Trace
        } else {
            log::LevelFilter::Info
        };

        let logger = VerbosityFilter {
            verbose,
            inner: self,
        };

        log::set_boxed_logger(Box::new(logger))
            .map(|()| log::set_max_level(max_level))
            .expect("Could not set previously set logger");
    }

    /// Add a logger for a specific prefix to the stack
    fn add_logger(
        &mut self,
        prefix: impl ToString + Deref<Target = str>,
        logger: impl Log + 'static,
    ) {
        let prefix = if prefix.ends_with("::") {
            prefix.to_string()
        } else {
            // given a prefix `my::prefix`, we want to match `my::prefix::somewhere`
            // but not `my::prefix_to_somewhere`
            format!("{}::", prefix.to_string())
        };
        self.0.push((prefix, Box::new(logger)))
    }
}

impl log::Log for ShellLogger {
    fn enabled(&self, metadata: &log::Metadata) -> bool {
        metadata.level() <= log::max_level() && metadata.level() <= log::STATIC_MAX_LEVEL
    }

    fn log(&self, record: &log::Record) {
        for (prefix, l) in self.0.iter() {
            if record.target() == &prefix[..prefix.len() - 2] || record.target().starts_with(prefix)
            {
                l.log(record);
            }
        }
    }

    fn flush(&self) {
        for (_, l) in self.0.iter() {
            l.flush();
        }
    }
}

/// Hides the debug-level job diagnostics unless the shell runs in verbose mode.
struct VerbosityFilter {
    verbose: bool,
    inner: ShellLogger,
}

impl VerbosityFilter {
    fn is_hidden(&self, metadata: &log::Metadata) -> bool {
        !self.verbose
            && metadata.level() > log::Level::Info
            && metadata.target().starts_with("tsh::job")
    }
}

impl log::Log for VerbosityFilter {
    fn enabled(&self, metadata: &log::Metadata) -> bool {
        !self.is_hidden(metadata) && self.inner.enabled(metadata)
    }

    fn log(&self, record: &log::Record) {
        if self.enabled(record.metadata()) {
            log::Log::log(&self.inner, record)
        }
    }

    fn flush(&self) {
        log::Log::flush(&self.inner)
    }
}

trait Log: Send + Sync {
    fn log(&self, record: &log::Record);
    fn flush(&self);
}

impl<T: log::Log> Log for T {
    fn log(&self, record: &log::Record) {
        log::Log::log(self, record)
    }

    fn flush(&self) {
        log::Log::flush(self)
    }
}

impl fmt::Debug for ShellLogger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.0.iter().map(|(prefix, _)| prefix))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::{ShellLogger, VerbosityFilter};

    #[test]
    fn can_construct_logger() {
        let logger = ShellLogger::new("tsh: ");
        let len = if cfg!(feature = "dev") { 3 } else { 2 };
        assert_eq!(logger.0.len(), len);
        assert_eq!(logger.0[0].0, "tsh::user::");
        assert_eq!(logger.0[1].0, "tsh::job::");
    }

    #[test]
    fn job_debug_is_hidden_unless_verbose() {
        let metadata = log::Metadata::builder()
            .level(log::Level::Debug)
            .target("tsh::job")
            .build();
        let user = log::Metadata::builder()
            .level(log::Level::Debug)
            .target("tsh::user")
            .build();

        let quiet = VerbosityFilter {
            verbose: false,
            inner: ShellLogger::default(),
        };
        assert!(quiet.is_hidden(&metadata));
        assert!(!quiet.is_hidden(&user));

        let verbose = VerbosityFilter {
            verbose: true,
            inner: ShellLogger::default(),
        };
        assert!(!verbose.is_hidden(&metadata));
    }
}

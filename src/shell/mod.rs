//! The read-eval loop and the launching and waiting of jobs.
#![deny(unsafe_code)]

use std::io::{self, BufRead};

use crate::{
    cli::{help, TshAction, TshOptions},
    common::Error,
    exec::{self, Program},
    jobs::{JobControl, JobState, MaskGuard, MaskedCell},
    log::{dev_info, job_debug, user_error, ShellLogger},
    parse::{parse_line, ParsedCommand},
    system::{
        dup2,
        signal::{consts::*, SignalHandler, SignalHandlerBehavior},
    },
};

mod builtins;
mod notify;

const PROMPT: &str = "tsh> ";

// SAFETY: the shell never starts a second thread, and every handler that locks this cell is
// registered through `SignalHandlerBehavior::Handle`, which masks the job control signals.
#[allow(unsafe_code)]
static JOBS: MaskedCell<JobControl> = unsafe { MaskedCell::new(JobControl::new()) };

/// Sleep until there is no foreground job anymore.
///
/// The guard keeps the job control signals blocked except while suspended, so a child that
/// changes state between the check and the suspension still wakes the shell up.
fn wait_foreground(jobs: &mut MaskGuard<'_, JobControl>) -> Result<(), Error> {
    while let Some(job) = jobs.table.foreground() {
        dev_info!("waiting for foreground job {}", job.pid());
        jobs.suspend()?;
        log_events(jobs);
    }

    Ok(())
}

/// Write the child status changes recorded by the `SIGCHLD` handler to the verbose log.
fn log_events(control: &mut JobControl) {
    while let Some(event) = control.events.pop() {
        job_debug!("{event}");
    }

    let dropped = control.events.take_dropped();
    if dropped > 0 {
        job_debug!("{dropped} more child status changes were not recorded");
    }
}

/// Run an external program as a new job.
fn launch(command: &ParsedCommand, line: &str) -> Result<(), Error> {
    let program = Program::new(command);

    // Until the job is in the table, the SIGCHLD handler must not see the child.
    let mut jobs = JOBS.lock()?;
    let pid = exec::spawn(program, jobs.previous_mask())?;

    let state = if command.background {
        JobState::Background
    } else {
        JobState::Foreground
    };
    let jid = jobs.table.insert(pid, state, line)?;
    job_debug!("Added job [{jid}] {pid} {line}");

    if command.background {
        if let Some(job) = jobs.table.find_by_jid(jid) {
            println_ignore_io_error!("{job}");
        }
    } else {
        wait_foreground(&mut jobs)?;
    }

    jobs.release()
}

struct Shell {
    options: TshOptions,
    // restored when the shell is dropped
    _handlers: Vec<SignalHandler>,
}

impl Shell {
    fn new(options: TshOptions) -> Result<Self, Error> {
        let behaviors = [
            (SIGCHLD, SignalHandlerBehavior::Handle(notify::on_sigchld)),
            (SIGINT, SignalHandlerBehavior::Handle(notify::on_keyboard)),
            (SIGTSTP, SignalHandlerBehavior::Handle(notify::on_keyboard)),
            (SIGQUIT, SignalHandlerBehavior::Handle(notify::on_sigquit)),
            (SIGTTIN, SignalHandlerBehavior::Ignore),
            (SIGTTOU, SignalHandlerBehavior::Ignore),
        ];

        let handlers = behaviors
            .into_iter()
            .map(|(signal, behavior)| SignalHandler::register(signal, behavior))
            .collect::<io::Result<Vec<_>>>()
            .map_err(Error::sync("sigaction"))?;

        Ok(Self {
            options,
            _handlers: handlers,
        })
    }

    fn eval(&self, line: &str) -> Result<(), Error> {
        let Some(command) = parse_line(line)? else {
            return Ok(());
        };

        match command.builtin {
            Some(builtin) => builtins::run(builtin, &command),
            None => launch(&command, line),
        }
    }

    fn run(self) -> Result<(), Error> {
        let mut input = io::stdin().lock();
        let mut buf = Vec::new();

        loop {
            if !self.options.no_prompt {
                print_flush_ignore_io_error!("{PROMPT}");
            }

            buf.clear();
            if input.read_until(b'\n', &mut buf)? == 0 {
                println_ignore_io_error!();
                return Ok(());
            }

            let line = String::from_utf8_lossy(&buf);
            let line = line.strip_suffix('\n').unwrap_or(&line[..]);
            if let Err(err) = self.eval(line) {
                if err.is_fatal() {
                    return Err(err);
                }
                println_ignore_io_error!("{err}");
            }

            log_events(&mut *JOBS.lock()?);
        }
    }
}

pub fn main() {
    // A test driver reads everything from a single pipe.
    if let Err(err) = dup2(libc::STDOUT_FILENO, libc::STDERR_FILENO) {
        println_ignore_io_error!("dup2 error: {err}");
        std::process::exit(1);
    }

    let options = match TshOptions::from_env() {
        Ok(options) => options,
        Err(e) => {
            println_ignore_io_error!("{e}\n{}", help::long_help_message());
            std::process::exit(1);
        }
    };

    if options.action == TshAction::Help {
        println_ignore_io_error!("{}", help::long_help_message());
        std::process::exit(0);
    }

    ShellLogger::new("tsh: ").into_global_logger(options.verbose);

    dev_info!("development logs are enabled");

    match Shell::new(options).and_then(Shell::run) {
        Ok(()) => std::process::exit(0),
        Err(error) => {
            user_error!("{error}");
            std::process::exit(1);
        }
    }
}

use std::io::{self, Write};

use crate::{
    common::Error,
    exec::open_output,
    jobs::{JobState, JobTable, TargetError},
    log::{dev_info, dev_warn},
    parse::{Builtin, ParsedCommand},
    system::{interface::ProcessId, killpg, signal::consts::SIGCONT},
};

use super::{wait_foreground, JOBS};

pub(super) fn run(builtin: Builtin, command: &ParsedCommand) -> Result<(), Error> {
    match builtin {
        Builtin::Quit => std::process::exit(0),
        Builtin::Jobs => match &command.outfile {
            Some(path) => {
                let mut file =
                    open_output(path).map_err(|err| Error::Io(Some(path.clone()), err))?;
                list_jobs(&mut file)
            }
            None => list_jobs(&mut io::stdout().lock()),
        },
        Builtin::Bg => background(target(builtin, command.arguments())?),
        Builtin::Fg => foreground(target(builtin, command.arguments())?),
    }
}

fn target(builtin: Builtin, arguments: &[String]) -> Result<&str, Error> {
    match arguments {
        [target] => Ok(target.as_str()),
        _ => Err(invalid_target(builtin)(TargetError::Missing)),
    }
}

fn invalid_target(builtin: Builtin) -> impl FnOnce(TargetError) -> Error {
    move |error| Error::InvalidTarget {
        command: builtin.name(),
        error,
    }
}

/// Look up a job and return its PID.
fn resolve(table: &JobTable, builtin: Builtin, target: &str) -> Result<ProcessId, Error> {
    table
        .resolve(target)
        .map(|job| job.pid())
        .map_err(invalid_target(builtin))
}

fn list_jobs(out: &mut impl Write) -> Result<(), Error> {
    let jobs = JOBS.lock()?;
    let snapshot = jobs.table.snapshot();
    jobs.release()?;

    for job in &snapshot {
        writeln!(out, "{}", job.listing())?;
    }
    out.flush()?;

    Ok(())
}

fn continue_group(pid: ProcessId) -> Result<(), Error> {
    match killpg(pid, SIGCONT) {
        // Already gone; the SIGCHLD handler takes care of it.
        Err(err) if err.raw_os_error() == Some(libc::ESRCH) => {
            dev_info!("cannot continue {pid}: {err}");
            Ok(())
        }
        result => result.map_err(Error::sync("kill")),
    }
}

fn set_state(table: &mut JobTable, pid: ProcessId, state: JobState) {
    if !table.set_state(pid, state) {
        dev_warn!("cannot move {pid} to {state:?}");
    }
}

/// Resume a stopped job in the background.
fn background(target: &str) -> Result<(), Error> {
    let mut jobs = JOBS.lock()?;
    let pid = resolve(&jobs.table, Builtin::Bg, target)?;

    set_state(&mut jobs.table, pid, JobState::Background);
    if let Some(job) = jobs.table.find_by_pid(pid) {
        println_ignore_io_error!("{job}");
    }
    continue_group(pid)?;

    jobs.release()
}

/// Resume a job in the foreground and wait for it.
fn foreground(target: &str) -> Result<(), Error> {
    let mut jobs = JOBS.lock()?;
    let pid = resolve(&jobs.table, Builtin::Fg, target)?;

    set_state(&mut jobs.table, pid, JobState::Foreground);
    continue_group(pid)?;
    wait_foreground(&mut jobs)?;

    jobs.release()
}

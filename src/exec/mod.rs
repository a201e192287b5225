//! Starting external programs as jobs.
#![deny(unsafe_code)]

use std::{
    fs::{File, OpenOptions},
    os::unix::{fs::OpenOptionsExt, process::CommandExt},
    path::{Path, PathBuf},
    process::Command,
};

use crate::{
    common::Error,
    log::{dev_info, dev_warn, user_error},
    parse::ParsedCommand,
    system::{
        _exit, fork,
        interface::ProcessId,
        setpgid,
        signal::{SignalHandler, SignalHandlerBehavior, SignalSet},
        ForkResult,
    },
};

/// An external program together with the files its standard streams are redirected to.
pub(crate) struct Program {
    command: Command,
    name: String,
    infile: Option<PathBuf>,
    outfile: Option<PathBuf>,
}

impl Program {
    pub(crate) fn new(parsed: &ParsedCommand) -> Self {
        let mut command = Command::new(parsed.program());
        command.args(parsed.arguments());

        Self {
            command,
            name: parsed.program().to_owned(),
            infile: parsed.infile.clone(),
            outfile: parsed.outfile.clone(),
        }
    }

    /// Replace the current process image with this program.
    ///
    /// Only returns if the redirections could not be set up or the program could not be started.
    pub(crate) fn exec(mut self) -> Error {
        if let Some(path) = &self.infile {
            match File::open(path) {
                Ok(file) => self.command.stdin(file),
                Err(err) => return Error::Redirect(path.clone(), err),
            };
        }

        if let Some(path) = &self.outfile {
            match open_output(path) {
                Ok(file) => self.command.stdout(file),
                Err(err) => return Error::Redirect(path.clone(), err),
            };
        }

        let err = self.command.exec();
        dev_warn!("cannot execute {}: {err}", self.name);
        Error::CommandNotFound(self.name)
    }
}

/// Open `path` for writing, creating it with mode 0644 or truncating it.
pub(crate) fn open_output(path: &Path) -> std::io::Result<File> {
    OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(0o644)
        .open(path)
}

/// Fork a child that runs `program` in a process group of its own.
///
/// The job control signals must be blocked by the caller so the child cannot be reaped before it
/// has been added to the job table; `restore` is the signal mask the program starts with.
pub(crate) fn spawn(program: Program, restore: &SignalSet) -> Result<ProcessId, Error> {
    let ForkResult::Parent(pid) = fork().map_err(Error::sync("fork"))? else {
        exec_child(program, restore)
    };

    // Also done by the child; whichever runs first wins, so the group exists as soon as either
    // side could signal it.
    if let Err(err) = setpgid(pid, pid) {
        dev_info!("setpgid({pid}) in parent: {err}");
    }

    dev_info!("forked {pid} for {}", program.name);
    Ok(pid)
}

fn exec_child(program: Program, restore: &SignalSet) -> ! {
    let own_group = ProcessId::new(0);
    if let Err(err) = setpgid(own_group, own_group) {
        user_error!("setpgid error: {err}");
        _exit(1);
    }

    // Reset the shell's handlers before unblocking anything.
    for signal in SignalSet::JOB_CONTROL {
        match SignalHandler::register(signal, SignalHandlerBehavior::Default) {
            Ok(handler) => handler.forget(),
            Err(err) => dev_warn!("cannot reset signal handler: {err}"),
        }
    }

    if let Err(err) = restore.set_mask() {
        user_error!("sigprocmask error: {err}");
        _exit(1);
    }

    let err = program.exec();
    println_ignore_io_error!("{err}");
    _exit(1)
}

#[cfg(test)]
mod tests {
    use std::os::unix::fs::PermissionsExt;

    use super::{open_output, Program};
    use crate::{common::Error, parse::parse_line};

    fn program(line: &str) -> Program {
        Program::new(&parse_line(line).unwrap().unwrap())
    }

    #[test]
    fn output_files_are_truncated() {
        let path = std::env::temp_dir().join(format!("tsh-exec-test-{}", std::process::id()));
        std::fs::write(&path, "some previous content").unwrap();

        drop(open_output(&path).unwrap());
        assert_eq!(std::fs::read(&path).unwrap(), b"");
        std::fs::remove_file(&path).unwrap();

        drop(open_output(&path).unwrap());
        let mode = std::fs::metadata(&path).unwrap().permissions().mode();
        // the process umask can only take permissions away
        assert_eq!(mode & 0o133, 0);
        std::fs::remove_file(&path).unwrap();
    }

    // These only fail before replacing the test process.
    #[test]
    fn missing_program() {
        let err = program("/nonexistent/tsh-test-program").exec();
        assert!(matches!(
            err,
            Error::CommandNotFound(ref name) if name == "/nonexistent/tsh-test-program"
        ));
        assert_eq!(
            err.to_string(),
            "/nonexistent/tsh-test-program: Command not found"
        );
    }

    #[test]
    fn missing_input_file() {
        let err = program("cat < /nonexistent/tsh-test-input").exec();
        assert!(matches!(err, Error::Redirect(..)));
        assert!(err.to_string().starts_with("/nonexistent/tsh-test-input: "));
    }
}

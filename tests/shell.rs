//! Drive the `tsh` binary through pipes, the way a test driver would.

use std::{
    io::Write,
    path::PathBuf,
    process::{Child, Command, Output, Stdio},
    thread,
    time::Duration,
};

use pretty_assertions::assert_eq;

fn spawn(args: &[&str]) -> Child {
    Command::new(env!("CARGO_BIN_EXE_tsh"))
        .args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .unwrap()
}

fn tsh(args: &[&str], script: &str) -> Output {
    let mut child = spawn(args);
    child
        .stdin
        .take()
        .unwrap()
        .write_all(script.as_bytes())
        .unwrap();
    child.wait_with_output().unwrap()
}

/// Run a script without prompts and return everything the shell printed.
fn run(script: &str) -> String {
    let output = tsh(&["-p"], script);
    assert!(output.status.success(), "{output:?}");
    String::from_utf8(output.stdout).unwrap()
}

/// Send `signal` to the shell once its foreground job had time to start.
fn signal_later(child: &Child, signal: libc::c_int) {
    thread::sleep(Duration::from_millis(500));
    let pid = child.id() as libc::pid_t;
    assert_eq!(unsafe { libc::kill(pid, signal) }, 0);
}

fn temp_path(name: &str) -> PathBuf {
    std::env::temp_dir().join(format!("tsh-{name}-{}", std::process::id()))
}

/// Non-empty output lines; the shell ends its output with an empty line at end of input.
fn lines(output: &str) -> Vec<&str> {
    output.lines().filter(|line| !line.is_empty()).collect()
}

/// `(<pid>)` as printed in job reports.
fn pid_of(line: &str) -> &str {
    let start = line.find('(').unwrap() + 1;
    let end = line.find(')').unwrap();
    &line[start..end]
}

#[test]
fn prompt_and_eof() {
    let output = tsh(&[], "");
    assert!(output.status.success());
    assert_eq!(String::from_utf8(output.stdout).unwrap(), "tsh> \n");

    assert_eq!(run(""), "\n");
}

#[test]
fn quit() {
    assert_eq!(run("quit\n/bin/echo unreachable\n"), "");
}

#[test]
fn foreground_command() {
    assert_eq!(run("/bin/echo hello   world\n"), "hello world\n\n");
    // the program is looked up in PATH
    assert_eq!(run("echo 'quoted  words'\n"), "quoted  words\n\n");
}

#[test]
fn blank_lines_are_ignored() {
    assert_eq!(run("\n   \n\t\n"), "\n");
}

#[test]
fn background_job_is_listed() {
    let output = run("sleep 1 &\njobs\n");
    let lines = lines(&output);

    let pid = pid_of(lines[0]);
    assert_eq!(lines[0], format!("[1] ({pid}) sleep 1 &"));
    assert_eq!(lines[1], format!("[1] ({pid}) Running    sleep 1 &"));
}

#[test]
fn finished_jobs_leave_the_table() {
    let output = run("/bin/true\n/bin/false\njobs\nsleep 1 &\njobs\n");
    let lines = lines(&output);

    // the first listing is empty, and the job ids start over
    let pid = pid_of(lines[0]);
    assert_eq!(lines[0], format!("[1] ({pid}) sleep 1 &"));
    assert_eq!(lines[1], format!("[1] ({pid}) Running    sleep 1 &"));
    assert_eq!(lines.len(), 2, "{output}");
}

#[test]
fn too_many_jobs() {
    let output = run(&format!("{}jobs\n", "sleep 3 &\n".repeat(17)));
    let lines = lines(&output);

    for (n, line) in lines[..16].iter().enumerate() {
        assert!(line.starts_with(&format!("[{}] (", n + 1)), "{output}");
    }
    assert_eq!(lines[16], "Tried to create too many jobs");

    let listing = &lines[17..33];
    for (n, line) in listing.iter().enumerate() {
        assert!(line.starts_with(&format!("[{}] (", n + 1)), "{output}");
        assert!(line.ends_with(") Running    sleep 3 &"), "{output}");
    }
}

#[test]
fn stop_and_resume_in_foreground() {
    let output = run("sh -c 'kill -STOP $$; echo resumed'\njobs\nfg %1\njobs\n");
    let lines = lines(&output);

    let pid = pid_of(lines[0]);
    assert_eq!(
        lines[0],
        format!("Job [1] ({pid}) stopped by signal {}", libc::SIGSTOP)
    );
    assert_eq!(
        lines[1],
        format!("[1] ({pid}) Stopped    sh -c 'kill -STOP $$; echo resumed'")
    );
    // fg waits for the job, so nothing is listed afterwards
    assert_eq!(lines[2], "resumed");
    assert_eq!(lines.len(), 3, "{output}");
}

#[test]
fn resume_in_background() {
    let output = run("sh -c 'kill -STOP $$; echo resumed'\nbg 0\nbg %1\nsleep 1\njobs\n");
    let lines = lines(&output);

    let pid = pid_of(lines[0]);
    assert_eq!(lines[1], "(0): No such process");
    assert_eq!(
        lines[2],
        format!("[1] ({pid}) sh -c 'kill -STOP $$; echo resumed'")
    );
    assert_eq!(lines[3], "resumed");
    assert_eq!(lines.len(), 4, "{output}");
}

#[test]
fn killed_and_exited_jobs_are_distinguishable() {
    let output = run("sh -c 'kill -KILL $$'\nsh -c 'exit 3'\njobs\n");
    let lines = lines(&output);

    let pid = pid_of(lines[0]);
    assert_eq!(
        lines[0],
        format!("Job [1] ({pid}) terminated by signal {}", libc::SIGKILL)
    );
    // a normal exit is silent, whatever its status
    assert_eq!(lines.len(), 1, "{output}");
}

#[test]
fn keyboard_interrupt_reaches_the_foreground_job() {
    let mut child = spawn(&["-p"]);
    let mut stdin = child.stdin.take().unwrap();
    stdin.write_all(b"sleep 5\njobs\n").unwrap();
    drop(stdin);

    signal_later(&child, libc::SIGINT);
    let output = child.wait_with_output().unwrap();
    assert!(output.status.success());

    let output = String::from_utf8(output.stdout).unwrap();
    let lines = lines(&output);
    let pid = pid_of(lines[0]);
    assert_eq!(
        lines[0],
        format!("Job [1] ({pid}) terminated by signal {}", libc::SIGINT)
    );
    assert_eq!(lines.len(), 1, "{output}");
}

#[test]
fn keyboard_stop_reaches_the_foreground_job() {
    let mut child = spawn(&["-p"]);
    let mut stdin = child.stdin.take().unwrap();
    stdin.write_all(b"sleep 2\njobs\nfg %1\n").unwrap();
    drop(stdin);

    signal_later(&child, libc::SIGTSTP);
    let output = child.wait_with_output().unwrap();
    assert!(output.status.success());

    let output = String::from_utf8(output.stdout).unwrap();
    let lines = lines(&output);
    let pid = pid_of(lines[0]);
    assert_eq!(
        lines[0],
        format!("Job [1] ({pid}) stopped by signal {}", libc::SIGTSTP)
    );
    assert_eq!(lines[1], format!("[1] ({pid}) Stopped    sleep 2"));
    assert_eq!(lines.len(), 2, "{output}");
}

#[test]
fn sigquit_terminates_the_shell() {
    let mut child = spawn(&["-p"]);
    let stdin = child.stdin.take().unwrap();

    signal_later(&child, libc::SIGQUIT);
    let output = child.wait_with_output().unwrap();
    drop(stdin);

    assert_eq!(output.status.code(), Some(1));
    assert_eq!(
        String::from_utf8(output.stdout).unwrap(),
        "Terminating after receipt of SIGQUIT signal\n"
    );
}

#[test]
fn bg_and_fg_diagnostics() {
    let output = run("bg\nfg %1 %2\nbg 999\nfg %3\nbg abc\nfg 1x\n");
    assert_eq!(
        output,
        "bg command requires PID or %jobid argument
fg command requires PID or %jobid argument
(999): No such process
%3: No such job
bg: argument must be a PID or %jobid
fg: argument must be a PID or %jobid

"
    );
}

#[test]
fn parse_errors() {
    let output = run("echo 'oops\necho \"oops\ncat < a < b\ncat >\n");
    assert_eq!(
        output,
        "Error: unmatched '.
Error: unmatched \".
Error: Ambiguous I/O redirection
Error: must provide file name for redirection

"
    );
}

#[test]
fn command_not_found() {
    assert_eq!(
        run("./tsh-no-such-program arg\njobs\n"),
        "./tsh-no-such-program: Command not found\n\n"
    );
}

#[test]
fn redirections() {
    let input = temp_path("input");
    let output = temp_path("output");
    std::fs::write(&input, "from a file\n").unwrap();
    std::fs::write(&output, "stale content that is longer\n").unwrap();

    let printed = run(&format!(
        "cat < {} > {}\n",
        input.display(),
        output.display()
    ));
    assert_eq!(printed, "\n");
    assert_eq!(std::fs::read_to_string(&output).unwrap(), "from a file\n");

    let printed = run(&format!("cat < {}/missing\n", input.display()));
    assert!(printed.starts_with(&format!("{}/missing: ", input.display())));

    std::fs::remove_file(&input).unwrap();
    std::fs::remove_file(&output).unwrap();
}

#[test]
fn jobs_output_can_be_redirected() {
    let listing = temp_path("listing");

    let printed = run(&format!("sleep 1 &\njobs > {}\n", listing.display()));
    let lines = lines(&printed);
    let pid = pid_of(lines[0]);

    assert_eq!(
        std::fs::read_to_string(&listing).unwrap(),
        format!("[1] ({pid}) Running    sleep 1 &\n")
    );
    std::fs::remove_file(&listing).unwrap();
}

#[test]
fn verbose_mode_reports_every_job() {
    let output = tsh(&["-vp"], "/bin/true\n");
    assert!(output.status.success());

    let output = String::from_utf8(output.stdout).unwrap();
    assert!(output.contains("Added job [1] "), "{output}");
    assert!(output.contains("terminates OK (status 0)"), "{output}");

    // without -v, nothing but the trailing newline
    assert_eq!(run("/bin/true\n"), "\n");
}

#[test]
fn verbose_mode_reports_forwarded_signals() {
    let mut child = spawn(&["-vp"]);
    let mut stdin = child.stdin.take().unwrap();
    stdin.write_all(b"sleep 5\n").unwrap();
    drop(stdin);

    signal_later(&child, libc::SIGINT);
    let output = child.wait_with_output().unwrap();
    assert!(output.status.success());

    let output = String::from_utf8(output.stdout).unwrap();
    assert!(output.contains(") sent SIGINT"), "{output}");
    assert!(output.contains(") deleted after SIGINT"), "{output}");
}

#[test]
fn command_line_flags() {
    let output = tsh(&["-h"], "");
    assert!(output.status.success());
    assert!(String::from_utf8(output.stdout)
        .unwrap()
        .starts_with("Usage: tsh [-hvp]\n"));

    let output = tsh(&["-x"], "");
    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8(output.stdout)
        .unwrap()
        .contains("Usage: tsh [-hvp]"));
}

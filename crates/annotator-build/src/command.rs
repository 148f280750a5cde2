use std::{
    fmt,
    io::{self, Read},
    path::PathBuf,
    process::{Command, Stdio},
    thread,
    time::{Duration, Instant},
};

/// A shell script run through `/bin/sh -c` in `cwd`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShellCommand {
    pub cwd: PathBuf,
    pub script: String,
}

impl ShellCommand {
    pub fn new(cwd: impl Into<PathBuf>, script: impl Into<String>) -> Self {
        Self {
            cwd: cwd.into(),
            script: script.into(),
        }
    }
}

impl fmt::Display for ShellCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (in {})", self.script, self.cwd.display())
    }
}

/// Captured output from a command invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    /// Exit code, or `None` when the process was killed by a signal.
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }

    /// Returns `stdout` + `stderr` concatenated with a newline separator when needed.
    pub fn combined(&self) -> String {
        let mut s = String::new();
        s.push_str(&self.stdout);
        if !self.stderr.is_empty() {
            if !s.is_empty() && !s.ends_with('\n') {
                s.push('\n');
            }
            s.push_str(&self.stderr);
        }
        s
    }
}

pub trait CommandRunner: Send + Sync + fmt::Debug {
    fn run(&self, command: &ShellCommand) -> io::Result<CommandOutput>;
}

#[derive(Debug, Clone, Default)]
pub struct DefaultCommandRunner {
    /// Optional timeout for the whole build.
    ///
    /// Enforced by polling the child and killing it when exceeded. Processes
    /// the build tool spawned itself may outlive the kill.
    pub timeout: Option<Duration>,
}

impl DefaultCommandRunner {
    pub fn with_timeout(timeout: Option<Duration>) -> Self {
        Self { timeout }
    }
}

impl CommandRunner for DefaultCommandRunner {
    fn run(&self, command: &ShellCommand) -> io::Result<CommandOutput> {
        let mut child = Command::new("/bin/sh")
            .arg("-c")
            .arg(&command.script)
            .current_dir(&command.cwd)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|err| io::Error::new(err.kind(), format!("failed to spawn `{command}`: {err}")))?;

        let mut stdout = child
            .stdout
            .take()
            .ok_or_else(|| io::Error::new(io::ErrorKind::Other, "failed to capture stdout"))?;
        let mut stderr = child
            .stderr
            .take()
            .ok_or_else(|| io::Error::new(io::ErrorKind::Other, "failed to capture stderr"))?;

        let stdout_handle = thread::spawn(move || {
            let mut buf = Vec::new();
            let _ = stdout.read_to_end(&mut buf);
            buf
        });
        let stderr_handle = thread::spawn(move || {
            let mut buf = Vec::new();
            let _ = stderr.read_to_end(&mut buf);
            buf
        });

        let status = match self.timeout {
            None => child.wait(),
            Some(timeout) => {
                let start = Instant::now();
                loop {
                    if let Some(status) = child.try_wait()? {
                        break Ok(status);
                    }
                    if start.elapsed() >= timeout {
                        break Err(io::Error::new(
                            io::ErrorKind::TimedOut,
                            format!("`{command}` timed out after {timeout:?}"),
                        ));
                    }
                    thread::sleep(Duration::from_millis(50));
                }
            }
        };
        if status.is_err() {
            let _ = child.kill();
            let _ = child.wait();
        }

        let stdout = String::from_utf8_lossy(&stdout_handle.join().unwrap_or_default()).into_owned();
        let stderr = String::from_utf8_lossy(&stderr_handle.join().unwrap_or_default()).into_owned();
        let status = status?;

        Ok(CommandOutput {
            code: status.code(),
            stdout,
            stderr,
        })
    }
}

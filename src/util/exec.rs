use std::ffi::OsString;
use std::io::{self, Read};
use std::path::PathBuf;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use anyhow::{anyhow, Context, Result};
use wait_timeout::ChildExt;

/// Subprocess execution with per-call timeouts and captured output.
#[derive(Debug, Clone)]
pub struct ExecService {
    default_timeout: Duration,
}

impl ExecService {
    pub fn new(default_timeout: Duration) -> Self {
        Self { default_timeout }
    }

    pub fn run(&self, request: ExecRequest) -> Result<ExecOutput> {
        let mut cmd = Command::new(&request.program);
        cmd.args(&request.args);
        if let Some(ref cwd) = request.cwd {
            cmd.current_dir(cwd);
        }
        for (key, value) in &request.env {
            cmd.env(key, value);
        }

        if request.interactive {
            cmd.stdin(Stdio::inherit())
                .stdout(Stdio::inherit())
                .stderr(Stdio::inherit());
        } else {
            cmd.stdin(Stdio::null())
                .stdout(Stdio::piped())
                .stderr(Stdio::piped());
        }

        tracing::debug!(command = %request.preview(), "exec");

        let mut child = cmd.spawn().with_context(|| {
            format!(
                "failed to spawn {:?} with args {:?}",
                request.program, request.args
            )
        })?;

        // Drain both pipes while the child runs; a full pipe would otherwise
        // stall the child until the timeout fires.
        let stdout_reader = spawn_reader(child.stdout.take());
        let stderr_reader = spawn_reader(child.stderr.take());

        let timeout = request.timeout.unwrap_or(self.default_timeout);
        let started = Instant::now();
        let status = wait_with_timeout(&mut child, timeout, &request)?;
        let duration = started.elapsed();

        let stdout = join_reader(stdout_reader)?;
        let stderr = join_reader(stderr_reader)?;

        Ok(ExecOutput {
            status,
            duration,
            stdout,
            stderr,
        })
    }
}

impl Default for ExecService {
    fn default() -> Self {
        Self::new(Duration::from_secs(30))
    }
}

fn wait_with_timeout(
    child: &mut Child,
    timeout: Duration,
    request: &ExecRequest,
) -> Result<ExitStatus> {
    if timeout.is_zero() {
        return child.wait().context("failed to wait for process");
    }
    match child
        .wait_timeout(timeout)
        .context("failed to wait with timeout")?
    {
        Some(status) => Ok(status),
        None => {
            let _ = child.kill();
            let _ = child.wait();
            Err(anyhow!(
                "command `{}` timed out after {:?}",
                request.preview(),
                timeout
            ))
        }
    }
}

fn spawn_reader<R>(stream: Option<R>) -> Option<JoinHandle<io::Result<String>>>
where
    R: Read + Send + 'static,
{
    stream.map(|mut reader| {
        std::thread::spawn(move || {
            let mut buf = Vec::new();
            reader.read_to_end(&mut buf)?;
            Ok(String::from_utf8_lossy(&buf).into_owned())
        })
    })
}

fn join_reader(handle: Option<JoinHandle<io::Result<String>>>) -> Result<String> {
    match handle {
        None => Ok(String::new()),
        Some(h) => h
            .join()
            .map_err(|_| anyhow!("process output reader panicked"))?
            .context("failed to read process output"),
    }
}

#[derive(Debug, Default)]
pub struct ExecRequest {
    program: OsString,
    args: Vec<OsString>,
    cwd: Option<PathBuf>,
    env: Vec<(OsString, OsString)>,
    timeout: Option<Duration>,
    interactive: bool,
}

impl ExecRequest {
    pub fn new(program: impl Into<OsString>) -> Self {
        Self {
            program: program.into(),
            ..Self::default()
        }
    }

    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn cwd(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cwd = Some(dir.into());
        self
    }

    pub fn env(mut self, key: impl Into<OsString>, value: impl Into<OsString>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    /// Zero disables the timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Inherit the terminal instead of capturing output.
    pub fn interactive(mut self, interactive: bool) -> Self {
        self.interactive = interactive;
        self
    }

    /// Shell-escaped command line for logs and error messages.
    pub fn preview(&self) -> String {
        let mut words = vec![self.program.to_string_lossy().into_owned()];
        words.extend(self.args.iter().map(|a| a.to_string_lossy().into_owned()));
        super::shell_join(&words)
    }
}

#[derive(Debug)]
pub struct ExecOutput {
    pub status: ExitStatus,
    pub duration: Duration,
    pub stdout: String,
    pub stderr: String,
}

impl ExecOutput {
    pub fn success(&self) -> bool {
        self.status.success()
    }

    /// Trimmed stderr, falling back to trimmed stdout when stderr is empty.
    pub fn error_text(&self) -> String {
        let err = self.stderr.trim();
        if err.is_empty() {
            self.stdout.trim().to_string()
        } else {
            err.to_string()
        }
    }
}

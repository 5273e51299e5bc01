//! Command runner
//!
//! Runs one external process to completion and captures its combined
//! stdout/stderr. Every step kind is built on [`CommandSpec::run`].
//!
//! The child is spawned in its own process group (unix). When the run
//! context is cancelled or its deadline passes, the whole group is killed
//! and the leader reaped before control returns, so nothing the command
//! started outlives the step.

use std::collections::BTreeMap;
use std::ffi::OsString;
use std::io;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::process::{Child, Command};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{timeout, Instant};
use tracing::{debug, info, warn};

use crate::engine::context::RunContext;
use crate::engine::error::CommandError;

/// Bound on reaping the child after the process tree was killed
const REAP_TIMEOUT: Duration = Duration::from_secs(2);

/// Cap on the excerpt of output quoted in error messages
const EXCERPT_MAX_LINES: usize = 20;
const EXCERPT_MAX_BYTES: usize = 4096;

/// One external command invocation
#[derive(Debug, Clone)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
    pub dir: PathBuf,
    /// Added to the inherited environment
    pub env: BTreeMap<String, String>,
    /// Written to stdin, which is then closed; stdin is null when absent
    pub input: Option<Vec<u8>>,
}

/// Captured result of a command that exited successfully
#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub code: Option<i32>,
    /// stdout and stderr interleaved in arrival order
    pub output: Vec<u8>,
    pub duration: Duration,
}

impl CommandOutput {
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.output).into_owned()
    }
}

enum Outcome {
    Finished(Result<(ExitStatus, Vec<u8>), CommandError>),
    Cancelled,
    TimedOut(Duration),
}

impl CommandSpec {
    pub fn new(program: impl Into<String>, dir: impl AsRef<Path>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            dir: dir.as_ref().to_path_buf(),
            env: BTreeMap::new(),
            input: None,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    pub fn input(mut self, input: impl Into<Vec<u8>>) -> Self {
        self.input = Some(input.into());
        self
    }

    /// Locate the executable on the search path.
    ///
    /// A `PATH` entry in [`CommandSpec::env`] takes precedence over the host's.
    /// Names containing a path separator resolve relative to the working
    /// directory.
    pub fn resolve(&self) -> Result<PathBuf, CommandError> {
        let paths: Option<OsString> = self
            .env
            .get("PATH")
            .map(OsString::from)
            .or_else(|| std::env::var_os("PATH"));

        which::which_in(&self.program, paths, &self.dir).map_err(|source| CommandError::NotFound {
            program: self.program.clone(),
            source,
        })
    }

    /// Run the command and wait for it.
    ///
    /// Returns the captured output on exit code zero. A nonzero exit yields
    /// [`CommandError::Exit`] carrying an excerpt of the output.
    pub async fn run(&self, ctx: &RunContext) -> Result<CommandOutput, CommandError> {
        if ctx.is_cancelled() {
            return Err(CommandError::Cancelled);
        }

        let executable = self.resolve()?;

        let mut cmd = Command::new(&executable);
        cmd.args(&self.args)
            .current_dir(&self.dir)
            .envs(&self.env)
            .stdin(if self.input.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        #[cfg(unix)]
        cmd.process_group(0);

        let started = Instant::now();
        let mut child = cmd.spawn().map_err(|source| CommandError::Start {
            program: self.program.clone(),
            source,
        })?;
        let pid = child.id();

        debug!(
            program = %self.program,
            executable = %executable.display(),
            dir = %self.dir.display(),
            pid = ?pid,
            args = ?self.args,
            "spawned process"
        );

        if let (Some(input), Some(mut stdin)) = (self.input.clone(), child.stdin.take()) {
            tokio::spawn(async move {
                if let Err(e) = stdin.write_all(&input).await {
                    debug!(error = %e, "failed to write process input");
                }
                // stdin dropped here, closing the pipe
            });
        }

        let (tx, rx) = mpsc::unbounded_channel::<Vec<u8>>();
        let mut readers = Vec::with_capacity(2);
        if let Some(stdout) = child.stdout.take() {
            readers.push(spawn_reader(stdout, tx.clone()));
        }
        if let Some(stderr) = child.stderr.take() {
            readers.push(spawn_reader(stderr, tx.clone()));
        }
        drop(tx);

        let outcome = tokio::select! {
            res = wait_with_output(&mut child, rx, readers) => Outcome::Finished(res),
            _ = ctx.cancel_token().cancelled() => Outcome::Cancelled,
            limit = ctx.expired() => Outcome::TimedOut(limit),
        };

        let (status, output) = match outcome {
            Outcome::Finished(Ok(done)) => done,
            Outcome::Finished(Err(e)) => {
                terminate_tree(&mut child, pid).await;
                return Err(e);
            }
            Outcome::Cancelled => {
                info!(program = %self.program, pid = ?pid, "cancellation requested; killing process tree");
                terminate_tree(&mut child, pid).await;
                return Err(CommandError::Cancelled);
            }
            Outcome::TimedOut(limit) => {
                warn!(
                    program = %self.program,
                    pid = ?pid,
                    timeout_ms = limit.as_millis() as u64,
                    "process timed out; killing process tree"
                );
                terminate_tree(&mut child, pid).await;
                return Err(CommandError::TimedOut(limit));
            }
        };

        let duration = started.elapsed();
        let code = status.code();

        debug!(
            program = %self.program,
            exit_code = ?code,
            success = status.success(),
            elapsed_ms = duration.as_millis() as u64,
            "process exited"
        );

        if !status.success() {
            return Err(CommandError::Exit {
                program: self.program.clone(),
                code,
                output: excerpt(&String::from_utf8_lossy(&output)),
            });
        }

        Ok(CommandOutput {
            code,
            output,
            duration,
        })
    }
}

fn spawn_reader<R>(mut reader: R, tx: mpsc::UnboundedSender<Vec<u8>>) -> JoinHandle<io::Result<()>>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut buf = vec![0u8; 8192];
        loop {
            let n = reader.read(&mut buf).await?;
            if n == 0 {
                return Ok(());
            }
            // Receiver only goes away once the run is abandoned
            if tx.send(buf[..n].to_vec()).is_err() {
                return Ok(());
            }
        }
    })
}

async fn wait_with_output(
    child: &mut Child,
    mut rx: mpsc::UnboundedReceiver<Vec<u8>>,
    readers: Vec<JoinHandle<io::Result<()>>>,
) -> Result<(ExitStatus, Vec<u8>), CommandError> {
    let status = child.wait().await?;

    let mut output = Vec::new();
    while let Some(chunk) = rx.recv().await {
        output.extend_from_slice(&chunk);
    }
    for reader in readers {
        reader.await.map_err(io::Error::other)??;
    }

    Ok((status, output))
}

/// Kill the child's process group, then the child itself, and reap it.
async fn terminate_tree(child: &mut Child, pid: Option<u32>) {
    #[cfg(unix)]
    if let Some(pid) = pid {
        // SAFETY: killpg only sends a signal. The group id is the pid of a
        // child we spawned with `process_group(0)` and have not reaped yet.
        let rc = unsafe { libc::killpg(pid as libc::pid_t, libc::SIGKILL) };
        if rc != 0 {
            debug!(pid, error = %io::Error::last_os_error(), "killpg failed");
        }
    }
    #[cfg(not(unix))]
    let _ = pid;

    if let Err(e) = child.kill().await {
        warn!(error = %e, "failed to kill child process");
    }
    match timeout(REAP_TIMEOUT, child.wait()).await {
        Ok(Ok(_)) => {}
        Ok(Err(e)) => warn!(error = %e, "failed to reap child process"),
        Err(_) => warn!("child process did not exit after kill"),
    }
}

/// Trimmed tail of `output` short enough to quote in an error message.
pub fn excerpt(output: &str) -> String {
    let trimmed = output.trim();
    let lines: Vec<&str> = trimmed.lines().collect();
    let mut text = if lines.len() > EXCERPT_MAX_LINES {
        let skipped = lines.len() - EXCERPT_MAX_LINES;
        format!(
            "... ({} earlier lines omitted)\n{}",
            skipped,
            lines[skipped..].join("\n")
        )
    } else {
        trimmed.to_string()
    };

    if text.len() > EXCERPT_MAX_BYTES {
        let mut cut = text.len() - EXCERPT_MAX_BYTES;
        while !text.is_char_boundary(cut) {
            cut += 1;
        }
        text = format!("...{}", &text[cut..]);
    }
    text
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::engine::error::FailureKind;
    use crate::engine::error::StepFailure;
    use tempfile::tempdir;

    fn sh(dir: &Path, script: &str) -> CommandSpec {
        CommandSpec::new("sh", dir).arg("-c").arg(script)
    }

    #[tokio::test]
    async fn test_run_captures_combined_output() {
        let dir = tempdir().unwrap();
        let out = sh(dir.path(), "echo out; echo err 1>&2")
            .run(&RunContext::new())
            .await
            .unwrap();

        assert_eq!(out.code, Some(0));
        let text = out.text();
        assert!(text.contains("out\n"));
        assert!(text.contains("err\n"));
    }

    #[tokio::test]
    async fn test_run_uses_working_dir() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("marker.txt"), "here").unwrap();

        let out = CommandSpec::new("cat", dir.path())
            .arg("marker.txt")
            .run(&RunContext::new())
            .await
            .unwrap();
        assert_eq!(out.text(), "here");
    }

    #[tokio::test]
    async fn test_run_adds_environment() {
        let dir = tempdir().unwrap();
        let out = sh(dir.path(), "printf %s \"$LOCALCI_TEST_VALUE\"")
            .env("LOCALCI_TEST_VALUE", "injected")
            .run(&RunContext::new())
            .await
            .unwrap();
        assert_eq!(out.text(), "injected");
    }

    #[tokio::test]
    async fn test_run_feeds_input() {
        let dir = tempdir().unwrap();
        let out = CommandSpec::new("cat", dir.path())
            .input("from stdin\n")
            .run(&RunContext::new())
            .await
            .unwrap();
        assert_eq!(out.text(), "from stdin\n");
    }

    #[tokio::test]
    async fn test_run_nonzero_exit() {
        let dir = tempdir().unwrap();
        let err = sh(dir.path(), "echo broken; exit 3")
            .run(&RunContext::new())
            .await
            .unwrap_err();

        match &err {
            CommandError::Exit { code, output, .. } => {
                assert_eq!(*code, Some(3));
                assert_eq!(output, "broken");
            }
            other => panic!("expected exit error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_run_executable_not_found() {
        let dir = tempdir().unwrap();
        let err = CommandSpec::new("localci-no-such-tool", dir.path())
            .run(&RunContext::new())
            .await
            .unwrap_err();
        assert_eq!(StepFailure::from(err).kind(), FailureKind::NotFound);
    }

    #[tokio::test]
    async fn test_run_missing_working_dir_fails_to_start() {
        let dir = tempdir().unwrap();
        let missing = dir.path().join("nope");
        let err = CommandSpec::new("/bin/sh", &missing)
            .arg("-c")
            .arg("true")
            .run(&RunContext::new())
            .await
            .unwrap_err();
        assert_eq!(StepFailure::from(err).kind(), FailureKind::Start);
    }

    #[tokio::test]
    async fn test_run_times_out() {
        let dir = tempdir().unwrap();
        let ctx = RunContext::new().with_timeout(Duration::from_millis(200));
        let started = std::time::Instant::now();

        let err = sh(dir.path(), "sleep 30").run(&ctx).await.unwrap_err();

        assert!(matches!(err, CommandError::TimedOut(d) if d == Duration::from_millis(200)));
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_run_cancelled() {
        let dir = tempdir().unwrap();
        let ctx = RunContext::new();
        let canceller = ctx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            canceller.cancel();
        });

        let err = sh(dir.path(), "sleep 30").run(&ctx).await.unwrap_err();
        assert!(matches!(err, CommandError::Cancelled));
    }

    #[tokio::test]
    async fn test_run_already_cancelled_does_not_spawn() {
        let dir = tempdir().unwrap();
        let ctx = RunContext::new();
        ctx.cancel();

        let err = sh(dir.path(), "touch spawned").run(&ctx).await.unwrap_err();
        assert!(matches!(err, CommandError::Cancelled));
        assert!(!dir.path().join("spawned").exists());
    }

    #[cfg(target_os = "linux")]
    #[tokio::test]
    async fn test_timeout_kills_descendants() {
        let dir = tempdir().unwrap();
        let pid_file = dir.path().join("bg.pid");
        let script = format!("sleep 30 & echo $! > {}; wait", pid_file.display());
        let ctx = RunContext::new().with_timeout(Duration::from_millis(300));

        let err = sh(dir.path(), &script).run(&ctx).await.unwrap_err();
        assert!(matches!(err, CommandError::TimedOut(_)));

        let pid = std::fs::read_to_string(&pid_file).unwrap();
        let stat = format!("/proc/{}/stat", pid.trim());

        // An orphaned zombie awaiting reaping by init counts as terminated
        let mut alive = true;
        for _ in 0..40 {
            alive = match std::fs::read_to_string(&stat) {
                Ok(content) => !content.contains(") Z "),
                Err(_) => false,
            };
            if !alive {
                break;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        assert!(!alive, "background process survived the timeout");
    }

    #[test]
    fn test_excerpt_trims_and_caps() {
        assert_eq!(excerpt("  \n main.go\n\n"), "main.go");

        let many: String = (0..30).map(|i| format!("line {}\n", i)).collect();
        let cut = excerpt(&many);
        assert!(cut.starts_with("... (10 earlier lines omitted)"));
        assert!(cut.ends_with("line 29"));
        assert!(!cut.contains("line 9\n"));

        let long = "x".repeat(EXCERPT_MAX_BYTES * 2);
        assert_eq!(excerpt(&long).len(), EXCERPT_MAX_BYTES + 3);
    }
}

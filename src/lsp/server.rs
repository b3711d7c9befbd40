//! Language server subprocess lifecycle.

use std::path::Path;
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use super::Result;
use super::error::LspError;
use super::provider::LspProvider;

/// How often `stop` polls for voluntary exit.
const EXIT_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Owns a running language server process.
///
/// `start` returns once the process is running; readiness to answer queries
/// is a protocol-level concept tracked by the client, not the process.
pub struct ServerProcess {
    child: Child,
    command: String,
}

impl ServerProcess {
    /// Spawn the server with stdin/stdout piped and stderr passed through
    /// for diagnostics.
    ///
    /// Returns the process handle together with the pipe ends a
    /// [`super::Connection`] is built on.
    ///
    /// # Errors
    ///
    /// Returns [`LspError::NotFound`] (with the provider's install hint) when
    /// the executable is missing, or [`LspError::SpawnFailed`] for any other
    /// spawn failure.
    ///
    /// # Panics
    ///
    /// Panics if stdin/stdout are not available after spawning. This should
    /// never happen when `Stdio::piped()` is used.
    pub fn start(
        provider: &dyn LspProvider,
        workdir: &Path,
    ) -> Result<(Self, ChildStdin, ChildStdout)> {
        let command = provider.command();
        let args = provider.args();

        debug!(
            command,
            args = ?args,
            workdir = %workdir.display(),
            "starting language server"
        );

        let mut child = Command::new(command)
            .args(&args)
            .current_dir(workdir)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    LspError::not_found(command, provider.install_hint())
                } else {
                    LspError::spawn_failed(command, e)
                }
            })?;

        let stdin = child.stdin.take().expect("stdin was piped");
        let stdout = child.stdout.take().expect("stdout was piped");

        Ok((
            Self {
                child,
                command: command.to_string(),
            },
            stdin,
            stdout,
        ))
    }

    /// Operating-system process id of the server.
    #[must_use]
    pub fn id(&self) -> u32 {
        self.child.id()
    }

    /// Best-effort graceful stop.
    ///
    /// The protocol-level shutdown (sent by the client beforehand) is the
    /// interrupt; this waits up to `grace` for the process to exit on its
    /// own, then falls back to a forced kill. Exit errors during shutdown are
    /// expected and swallowed.
    pub fn stop(&mut self, grace: Duration) {
        let deadline = Instant::now() + grace;

        loop {
            match self.child.try_wait() {
                Ok(Some(status)) => {
                    if !status.success() {
                        warn!(
                            command = %self.command,
                            exit_code = ?status.code(),
                            "language server exited with non-zero status"
                        );
                    }
                    return;
                }
                Ok(None) => {
                    if Instant::now() >= deadline {
                        debug!(command = %self.command, "grace period elapsed, killing server");
                        self.kill();
                        return;
                    }
                    std::thread::sleep(EXIT_POLL_INTERVAL);
                }
                Err(e) => {
                    warn!(command = %self.command, error = %e, "failed to poll server exit");
                    self.kill();
                    return;
                }
            }
        }
    }

    /// Forced stop: kill and reap without waiting for voluntary exit.
    pub fn kill(&mut self) {
        if let Err(e) = self.child.kill() {
            // InvalidInput means the process already exited - not an error
            if e.kind() != std::io::ErrorKind::InvalidInput {
                warn!(command = %self.command, error = %e, "failed to kill language server");
            }
        }
        let _ = self.child.wait();
    }
}

impl Drop for ServerProcess {
    fn drop(&mut self) {
        // Reap unconditionally to prevent zombies; already-exited processes
        // make both calls no-ops.
        self.kill();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lsp::provider::LspProvider;

    struct MissingServer;

    impl LspProvider for MissingServer {
        fn command(&self) -> &'static str {
            "capstan-test-no-such-server"
        }

        fn install_hint(&self) -> &'static str {
            "this server intentionally does not exist"
        }
    }

    #[test]
    fn missing_executable_yields_not_found_with_hint() {
        match ServerProcess::start(&MissingServer, Path::new(".")) {
            Err(LspError::NotFound { command, install_hint }) => {
                assert_eq!(command, "capstan-test-no-such-server");
                assert!(install_hint.contains("intentionally"));
            }
            Err(other) => panic!("expected NotFound, got {other:?}"),
            Ok(_) => panic!("expected NotFound, got a running process"),
        }
    }

    #[test]
    fn stop_reaps_an_exited_process() {
        let workdir = tempfile::tempdir().expect("tempdir");
        let (mut server, stdin, stdout) =
            ServerProcess::start(&CatProvider, workdir.path()).expect("cat should spawn");
        drop(stdin);
        drop(stdout);
        // cat exits once stdin closes; stop must not hang or error
        server.stop(Duration::from_secs(5));
    }

    struct CatProvider;

    impl LspProvider for CatProvider {
        fn command(&self) -> &'static str {
            "cat"
        }
    }
}

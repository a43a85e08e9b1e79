use anyhow::{Context, Result};
use std::io::Read;
use std::process::{Child, Command, ExitStatus};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// How long pipe readers may keep draining once the child is gone. Anything
/// still holding the pipes after that is abandoned.
const DRAIN_GRACE: Duration = Duration::from_millis(500);

pub enum WaitOutcome {
    Exited {
        status: ExitStatus,
        stdout: Vec<u8>,
        stderr: Vec<u8>,
    },
    /// The child was killed at the deadline; output is whatever it flushed
    /// before that.
    TimedOut { stdout: Vec<u8>, stderr: Vec<u8> },
}

/// Puts the child in a process group of its own so everything it spawns can
/// be signalled together.
pub fn own_process_group(cmd: &mut Command) {
    #[cfg(unix)]
    {
        use std::os::unix::process::CommandExt;
        cmd.process_group(0);
    }
    #[cfg(not(unix))]
    let _ = cmd;
}

/// Waits for `child` up to `timeout`, killing it (and its process group) at
/// the deadline. Both pipes are drained on their own threads so a chatty
/// child cannot block on a full buffer, and the total wait is bounded even
/// when a descendant keeps the pipes open.
pub fn wait_with_timeout(child: &mut Child, timeout: Duration) -> Result<WaitOutcome> {
    let stdout = PipeReader::spawn(child.stdout.take());
    let stderr = PipeReader::spawn(child.stderr.take());

    let start = Instant::now();
    loop {
        if let Some(status) = child.try_wait().with_context(|| "try_wait")? {
            // Leftover descendants must not outlive the run.
            kill_group(child);
            return Ok(WaitOutcome::Exited {
                status,
                stdout: stdout.finish("stdout"),
                stderr: stderr.finish("stderr"),
            });
        }

        if start.elapsed() > timeout {
            warn!("child process timed out after {:?}", timeout);
            kill_group(child);
            let _ = child.kill();
            child.wait().with_context(|| "wait after kill")?;
            return Ok(WaitOutcome::TimedOut {
                stdout: stdout.finish("stdout"),
                stderr: stderr.finish("stderr"),
            });
        }

        std::thread::sleep(Duration::from_millis(25));
    }
}

#[cfg(unix)]
fn kill_group(child: &Child) {
    use nix::sys::signal::{killpg, Signal};
    use nix::unistd::Pid;

    let Ok(pid) = i32::try_from(child.id()) else {
        return;
    };
    // ESRCH just means the group is already gone.
    if let Err(err) = killpg(Pid::from_raw(pid), Signal::SIGKILL) {
        debug!("killpg {pid}: {err}");
    }
}

#[cfg(not(unix))]
fn kill_group(_child: &Child) {}

struct PipeReader {
    buf: Arc<Mutex<Vec<u8>>>,
    handle: JoinHandle<()>,
}

impl PipeReader {
    fn spawn<R: Read + Send + 'static>(reader: Option<R>) -> Self {
        let buf = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&buf);
        let handle = std::thread::spawn(move || {
            let Some(mut r) = reader else {
                return;
            };
            let mut chunk = [0u8; 8192];
            loop {
                match r.read(&mut chunk) {
                    Ok(0) => break,
                    Ok(n) => match sink.lock() {
                        Ok(mut b) => b.extend_from_slice(&chunk[..n]),
                        Err(_) => break,
                    },
                    Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                    Err(_) => break,
                }
            }
        });
        Self { buf, handle }
    }

    /// Whatever was read, after giving the reader `DRAIN_GRACE` to see EOF.
    fn finish(self, name: &str) -> Vec<u8> {
        let deadline = Instant::now() + DRAIN_GRACE;
        while !self.handle.is_finished() && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(10));
        }
        if self.handle.is_finished() {
            let _ = self.handle.join();
        } else {
            warn!("{name} still held open by a descendant; abandoning reader");
        }
        match self.buf.lock() {
            Ok(b) => b.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

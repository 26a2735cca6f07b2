//! Native subprocess execution for the command adapters.

use std::process::Stdio;
use std::time::Duration;

use tokio::io::AsyncReadExt;
use tokio::process::{Child, Command};
use tokio::time::{Instant, timeout_at};

use crate::adapters::{Invocation, NativeOutput};

/// Stdout beyond this is treated as a failed run rather than buffered.
const MAX_STDOUT: u64 = 64 * 1024 * 1024;
const MAX_STDERR: u64 = 64 * 1024;

/// RAII guard that kills a child process (and its process group on Unix) on drop.
///
/// Wrap a spawned child immediately after `spawn()` so that dropping the
/// owning future kills the native tool. Call `disarm()` once the process has
/// exited normally.
pub struct ChildGuard {
    child: Child,
    armed: bool,
}

impl ChildGuard {
    #[must_use]
    pub const fn new(child: Child) -> Self {
        Self { child, armed: true }
    }

    pub const fn child_mut(&mut self) -> &mut Child {
        &mut self.child
    }

    pub const fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for ChildGuard {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        #[cfg(unix)]
        {
            let group_killed = self
                .child
                .id()
                .and_then(|pid| i32::try_from(pid).ok())
                .is_some_and(|pgid| unsafe { libc::killpg(pgid, libc::SIGKILL) } == 0);
            if !group_killed {
                let _ = self.child.start_kill();
            }
        }
        #[cfg(not(unix))]
        {
            let _ = self.child.start_kill();
        }
        let _ = self.child.try_wait();
    }
}

/// Put the child process in its own session (Unix only) so the entire process
/// group can be killed via `killpg` in `ChildGuard::drop`.
#[cfg(unix)]
pub fn set_new_session(cmd: &mut Command) {
    use std::os::unix::process::CommandExt;
    unsafe {
        cmd.as_std_mut().pre_exec(|| {
            if libc::setsid() == -1 {
                return Err(std::io::Error::last_os_error());
            }
            // Linux-only: the child dies with us even on SIGKILL.
            #[cfg(target_os = "linux")]
            if libc::prctl(libc::PR_SET_PDEATHSIG, libc::SIGKILL) == -1 {
                return Err(std::io::Error::last_os_error());
            }
            Ok(())
        });
    }
}

/// Why a native run produced no usable output.
#[derive(Debug, thiserror::Error)]
pub enum NativeFailure {
    #[error("failed to spawn {program}: {source}")]
    Spawn {
        program: String,
        source: std::io::Error,
    },
    #[error("{program} timed out after {}ms", .elapsed.as_millis())]
    TimedOut { program: String, elapsed: Duration },
    #[error("{program} produced more than {} bytes of output", MAX_STDOUT)]
    OutputTooLarge { program: String },
    #[error("i/o error talking to {program}: {source}")]
    Io {
        program: String,
        source: std::io::Error,
    },
}

/// Run `invocation` to completion, or until `deadline`.
///
/// Stdin is closed, stdout is collected in full, stderr is capped. The exit
/// status is reported, never interpreted: that is the adapter's job.
pub async fn run_native(
    invocation: &Invocation,
    deadline: Instant,
) -> Result<NativeOutput, NativeFailure> {
    let program = invocation.program.display().to_string();
    let started = Instant::now();

    let mut cmd = Command::new(&invocation.program);
    cmd.args(&invocation.args)
        .envs(invocation.envs.iter().map(|(k, v)| (k, v)))
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    if let Some(dir) = &invocation.current_dir {
        cmd.current_dir(dir);
    }
    #[cfg(unix)]
    set_new_session(&mut cmd);

    tracing::debug!(program = %program, args = ?invocation.args, "Spawning native tool");
    let child = cmd.spawn().map_err(|source| NativeFailure::Spawn {
        program: program.clone(),
        source,
    })?;
    let mut guard = ChildGuard::new(child);

    let io_err = |source| NativeFailure::Io {
        program: program.clone(),
        source,
    };
    let missing_pipe = || std::io::Error::other("pipe not captured");
    let mut stdout = guard
        .child_mut()
        .stdout
        .take()
        .ok_or_else(missing_pipe)
        .map_err(io_err)?;
    let stderr = guard
        .child_mut()
        .stderr
        .take()
        .ok_or_else(missing_pipe)
        .map_err(io_err)?;

    let stderr_task = tokio::spawn(async move {
        let mut buf = Vec::with_capacity(1024);
        let _ = stderr.take(MAX_STDERR).read_to_end(&mut buf).await;
        String::from_utf8_lossy(&buf).into_owned()
    });

    let collected = timeout_at(deadline, async {
        let mut buf = Vec::new();
        (&mut stdout)
            .take(MAX_STDOUT + 1)
            .read_to_end(&mut buf)
            .await?;
        let status = guard.child_mut().wait().await?;
        Ok::<_, std::io::Error>((buf, status))
    })
    .await;

    let (stdout, status) = match collected {
        Ok(Ok(done)) => done,
        Ok(Err(source)) => return Err(NativeFailure::Io { program, source }),
        Err(_) => {
            return Err(NativeFailure::TimedOut {
                program,
                elapsed: started.elapsed(),
            });
        }
    };
    guard.disarm();

    if stdout.len() as u64 > MAX_STDOUT {
        return Err(NativeFailure::OutputTooLarge { program });
    }
    let stderr = stderr_task
        .await
        .unwrap_or_else(|e| format!("[stderr task failed: {e}]"));

    Ok(NativeOutput {
        stdout,
        stderr,
        exit_code: status.code(),
    })
}

use super::{limits, Outcome, ProcessOutput, RunSpec, SandboxError};
use std::io::{self, Read, Write};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::thread;
use std::time::{Duration, Instant};
use wait_timeout::ChildExt;

#[derive(Debug, Clone, Copy)]
enum Stream {
    Stdout,
    Stderr,
}

/// Spawn `cmd` and wait for it under `spec`.
///
/// Stdout and stderr are drained by reader threads while the child runs, so
/// a chatty child can't fill the pipe and stall. On unix the child leads its
/// own process group; when the timeout fires the whole group gets SIGTERM,
/// then SIGKILL after the grace period. If the child exits but something it
/// left in the background keeps the pipes open, the group is killed once the
/// deadline passes.
pub fn run(mut cmd: Command, spec: &RunSpec<'_>) -> Result<ProcessOutput, SandboxError> {
    let program = cmd.get_program().to_string_lossy().into_owned();

    cmd.stdin(if spec.stdin.is_some() {
        Stdio::piped()
    } else {
        Stdio::null()
    })
    .stdout(Stdio::piped())
    .stderr(Stdio::piped());

    #[cfg(unix)]
    {
        use std::os::unix::process::CommandExt;
        cmd.process_group(0);
    }
    limits::apply(&mut cmd, spec.limits);

    let start = Instant::now();
    let mut child = cmd
        .spawn()
        .map_err(|source| SandboxError::Spawn { program, source })?;
    tracing::debug!(pid = child.id(), "spawned child process");

    let (tx, rx) = mpsc::channel();
    if let Some(out) = child.stdout.take() {
        spawn_reader(Stream::Stdout, out, spec.output_cap, tx.clone());
    }
    if let Some(err) = child.stderr.take() {
        spawn_reader(Stream::Stderr, err, spec.output_cap, tx.clone());
    }
    drop(tx);

    if let (Some(mut pipe), Some(input)) = (child.stdin.take(), spec.stdin) {
        let input = input.to_owned();
        thread::spawn(move || {
            // EPIPE if the child exits without reading it all
            let _ = pipe.write_all(input.as_bytes());
        });
    }

    let mut deadline = start + spec.timeout;
    let outcome = match child.wait_timeout(spec.timeout) {
        Ok(Some(status)) => Outcome::Exited(exit_code(status)),
        Ok(None) => {
            tracing::warn!(
                pid = child.id(),
                timeout_secs = spec.timeout.as_secs(),
                "child exceeded its time budget, terminating"
            );
            terminate(&mut child, spec.kill_grace);
            // the group is dead, readers only need to hit EOF
            deadline = Instant::now() + spec.kill_grace;
            Outcome::TimedOut
        }
        Err(e) => {
            kill_group(&child);
            let _ = child.kill();
            let _ = child.wait();
            return Err(SandboxError::Wait(e));
        }
    };

    let (stdout, stderr) = collect(&rx, &child, deadline, spec.kill_grace);
    let elapsed = start.elapsed();
    tracing::debug!(?outcome, elapsed_ms = elapsed.as_millis() as u64, "child finished");

    Ok(ProcessOutput {
        outcome,
        stdout: String::from_utf8_lossy(&stdout).into_owned(),
        stderr: String::from_utf8_lossy(&stderr).into_owned(),
        elapsed,
    })
}

fn spawn_reader<R>(stream: Stream, mut pipe: R, cap: usize, tx: Sender<(Stream, Vec<u8>)>)
where
    R: Read + Send + 'static,
{
    thread::spawn(move || {
        let mut kept = Vec::new();
        let mut dropped = 0usize;
        let mut buf = [0u8; 8192];
        loop {
            match pipe.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => {
                    let take = n.min(cap.saturating_sub(kept.len()));
                    kept.extend_from_slice(&buf[..take]);
                    dropped += n - take;
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(_) => break,
            }
        }
        if dropped > 0 {
            tracing::warn!(?stream, cap, dropped, "output exceeded cap, discarding the rest");
        }
        let _ = tx.send((stream, kept));
    });
}

/// Gather both streams. Readers normally finish as soon as the child exits;
/// if the pipes are still held open at the deadline the group is killed and
/// readers get one grace period to report before being abandoned.
fn collect(
    rx: &mpsc::Receiver<(Stream, Vec<u8>)>,
    child: &Child,
    deadline: Instant,
    grace: Duration,
) -> (Vec<u8>, Vec<u8>) {
    let mut stdout = Vec::new();
    let mut stderr = Vec::new();
    let mut killed = false;

    loop {
        let wait = if killed {
            grace
        } else {
            deadline.saturating_duration_since(Instant::now())
        };
        match rx.recv_timeout(wait) {
            Ok((Stream::Stdout, bytes)) => stdout = bytes,
            Ok((Stream::Stderr, bytes)) => stderr = bytes,
            Err(RecvTimeoutError::Disconnected) => break,
            Err(RecvTimeoutError::Timeout) if !killed => {
                tracing::warn!(
                    pid = child.id(),
                    "output pipes still open at the deadline, killing process group"
                );
                kill_group(child);
                killed = true;
            }
            Err(RecvTimeoutError::Timeout) => {
                tracing::warn!(pid = child.id(), "abandoning output readers");
                break;
            }
        }
    }
    (stdout, stderr)
}

fn terminate(child: &mut Child, grace: Duration) {
    signal_group(child, GroupSignal::Term);
    match child.wait_timeout(grace) {
        Ok(Some(_)) => {}
        Ok(None) => tracing::debug!(pid = child.id(), "ignored SIGTERM, sending SIGKILL"),
        Err(e) => tracing::warn!(pid = child.id(), "wait after SIGTERM failed: {}", e),
    }
    // stragglers left in the group after the leader exited
    kill_group(child);
    let _ = child.kill();
    let _ = child.wait();
}

fn kill_group(child: &Child) {
    signal_group(child, GroupSignal::Kill);
}

#[derive(Debug, Clone, Copy)]
enum GroupSignal {
    Term,
    Kill,
}

#[cfg(unix)]
fn signal_group(child: &Child, signal: GroupSignal) {
    use nix::errno::Errno;
    use nix::sys::signal::{killpg, Signal};
    use nix::unistd::Pid;

    let sig = match signal {
        GroupSignal::Term => Signal::SIGTERM,
        GroupSignal::Kill => Signal::SIGKILL,
    };
    match killpg(Pid::from_raw(child.id() as i32), sig) {
        Ok(()) | Err(Errno::ESRCH) => {}
        Err(e) => tracing::warn!(pid = child.id(), "killpg({}) failed: {}", sig, e),
    }
}

#[cfg(not(unix))]
fn signal_group(_child: &Child, _signal: GroupSignal) {}

fn exit_code(status: ExitStatus) -> i32 {
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return -signal;
        }
    }
    status.code().unwrap_or(-1)
}

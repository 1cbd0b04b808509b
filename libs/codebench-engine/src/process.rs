/// Process control for local execution.
///
/// - Spawns a command in its own process group with piped output.
/// - Caps captured output per stream.
/// - Samples the process-tree RSS while it runs.
/// - On timeout, kills the whole subtree (descendants first).

use crate::backend::ExecError;
use std::path::Path;
use std::process::{ExitStatus, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use sysinfo::{Pid, System};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::process::Command;
use tracing::{debug, warn};

/// Per-stream capture limit
pub const OUTPUT_LIMIT_BYTES: usize = 1024 * 1024;
pub const TRUNCATION_MARKER: &str = "\n... [output truncated]";

const SAMPLE_INTERVAL: Duration = Duration::from_millis(25);
/// How long to wait for pipes to drain after a kill
const DRAIN_GRACE: Duration = Duration::from_secs(1);

pub struct ProcessSpec<'a> {
    pub argv: &'a [String],
    pub cwd: &'a Path,
    pub stdin: Option<&'a str>,
    pub timeout: Duration,
    pub sample_memory: bool,
}

#[derive(Debug, Clone)]
pub struct Captured {
    pub stdout: String,
    pub stderr: String,
    pub elapsed: Duration,
    /// Peak minus baseline RSS, MB
    pub memory_mb: u64,
}

#[derive(Debug)]
pub enum ProcessOutcome {
    Exited { code: i32, captured: Captured },
    TimedOut { captured: Captured },
}

pub async fn run_bounded(spec: ProcessSpec<'_>) -> Result<ProcessOutcome, ExecError> {
    let (program, args) = spec
        .argv
        .split_first()
        .ok_or_else(|| ExecError::Internal("empty command".to_string()))?;

    let mut cmd = Command::new(program);
    cmd.args(args)
        .current_dir(spec.cwd)
        .stdin(if spec.stdin.is_some() { Stdio::piped() } else { Stdio::null() })
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    #[cfg(unix)]
    cmd.process_group(0);

    let mut child = cmd.spawn().map_err(|e| spawn_error(program, e))?;
    let started = Instant::now();
    let pid = child.id();
    debug!(program = %program, pid = ?pid, "Spawned process");

    let sampler = match (spec.sample_memory, pid) {
        (true, Some(pid)) => Some(MemorySampler::start(pid)),
        _ => None,
    };

    if let (Some(input), Some(mut stdin)) = (spec.stdin, child.stdin.take()) {
        let input = input.to_string();
        tokio::spawn(async move {
            // The program may exit without reading; a broken pipe is fine
            let _ = stdin.write_all(input.as_bytes()).await;
        });
    }

    let stdout_task = tokio::spawn(read_capped(child.stdout.take(), OUTPUT_LIMIT_BYTES));
    let stderr_task = tokio::spawn(read_capped(child.stderr.take(), OUTPUT_LIMIT_BYTES));

    let waited = tokio::time::timeout(spec.timeout, child.wait()).await;
    let elapsed = started.elapsed();

    let status: Option<ExitStatus> = match waited {
        Ok(Ok(status)) => Some(status),
        Ok(Err(e)) => {
            if let Some(pid) = pid {
                kill_tree(pid).await;
            }
            if let Some(s) = sampler {
                s.finish().await;
            }
            return Err(ExecError::Internal(format!("failed to wait for {}: {}", program, e)));
        }
        Err(_) => {
            warn!(program = %program, timeout_ms = spec.timeout.as_millis() as u64, "Process timed out, killing subtree");
            if let Some(pid) = pid {
                kill_tree(pid).await;
            }
            let _ = child.kill().await;
            None
        }
    };

    let memory_mb = match sampler {
        Some(s) => s.finish().await,
        None => 0,
    };
    let stdout = drain(stdout_task).await;
    let stderr = drain(stderr_task).await;
    let captured = Captured { stdout, stderr, elapsed, memory_mb };

    Ok(match status {
        Some(status) => ProcessOutcome::Exited { code: exit_code(&status), captured },
        None => ProcessOutcome::TimedOut { captured },
    })
}

fn spawn_error(program: &str, e: std::io::Error) -> ExecError {
    match e.kind() {
        std::io::ErrorKind::NotFound | std::io::ErrorKind::PermissionDenied => {
            ExecError::ToolchainUnavailable(format!("'{}' could not be started: {}", program, e))
        }
        _ => ExecError::Internal(format!("failed to spawn '{}': {}", program, e)),
    }
}

#[cfg(unix)]
fn exit_code(status: &ExitStatus) -> i32 {
    use std::os::unix::process::ExitStatusExt;
    status
        .code()
        .or_else(|| status.signal().map(|sig| 128 + sig))
        .unwrap_or(-1)
}

#[cfg(not(unix))]
fn exit_code(status: &ExitStatus) -> i32 {
    status.code().unwrap_or(-1)
}

/// Read a stream to EOF, keeping at most `limit` bytes. The rest is
/// drained and discarded so the child never blocks on a full pipe.
async fn read_capped<R: AsyncRead + Unpin>(reader: Option<R>, limit: usize) -> String {
    let Some(mut reader) = reader else {
        return String::new();
    };
    let mut kept = Vec::new();
    let mut truncated = false;
    let mut buf = [0u8; 8192];
    loop {
        match reader.read(&mut buf).await {
            Ok(0) | Err(_) => break,
            Ok(n) => {
                let room = limit.saturating_sub(kept.len());
                if n > room {
                    truncated = true;
                }
                kept.extend_from_slice(&buf[..n.min(room)]);
            }
        }
    }
    let mut text = String::from_utf8_lossy(&kept).into_owned();
    if truncated {
        text.push_str(TRUNCATION_MARKER);
    }
    text
}

async fn drain(task: tokio::task::JoinHandle<String>) -> String {
    let abort = task.abort_handle();
    match tokio::time::timeout(DRAIN_GRACE, task).await {
        Ok(Ok(text)) => text,
        Ok(Err(_)) => String::new(),
        Err(_) => {
            // An escaped grandchild still holds the pipe open
            abort.abort();
            String::new()
        }
    }
}

/// All descendants of `root`, breadth-first
fn descendants(sys: &System, root: Pid) -> Vec<Pid> {
    let mut found = Vec::new();
    let mut frontier = vec![root];
    while let Some(parent) = frontier.pop() {
        for (pid, process) in sys.processes() {
            if process.parent() == Some(parent) && *pid != root && !found.contains(pid) {
                found.push(*pid);
                frontier.push(*pid);
            }
        }
    }
    found
}

fn tree_rss(sys: &System, root: Pid) -> u64 {
    let own = sys.process(root).map(|p| p.memory()).unwrap_or(0);
    descendants(sys, root)
        .into_iter()
        .filter_map(|pid| sys.process(pid))
        .map(|p| p.memory())
        .sum::<u64>()
        + own
}

/// Kill `root` and every descendant, deepest first
pub async fn kill_tree(root: u32) {
    let joined = tokio::task::spawn_blocking(move || {
        let mut sys = System::new();
        sys.refresh_processes();
        let root = Pid::from_u32(root);
        let mut victims = descendants(&sys, root);
        victims.reverse();
        victims.push(root);
        let mut killed = 0usize;
        for pid in victims {
            if let Some(process) = sys.process(pid) {
                if process.kill() {
                    killed += 1;
                }
            }
        }
        killed
    })
    .await;
    match joined {
        Ok(killed) => debug!(root = root, killed = killed, "Killed process tree"),
        Err(e) => warn!(root = root, "Process tree kill task failed: {}", e),
    }
}

/// Background RSS sampler for one process tree.
///
/// Runs on a plain thread because `sysinfo` refreshes are blocking.
struct MemorySampler {
    stop: Arc<AtomicBool>,
    handle: std::thread::JoinHandle<(u64, u64)>,
}

impl MemorySampler {
    fn start(pid: u32) -> Self {
        let stop = Arc::new(AtomicBool::new(false));
        let flag = stop.clone();
        let handle = std::thread::spawn(move || {
            let pid = Pid::from_u32(pid);
            let mut sys = System::new();
            let mut baseline: Option<u64> = None;
            let mut peak = 0u64;
            loop {
                sys.refresh_processes();
                if sys.process(pid).is_some() {
                    let rss = tree_rss(&sys, pid);
                    baseline.get_or_insert(rss);
                    peak = peak.max(rss);
                }
                if flag.load(Ordering::Relaxed) {
                    break;
                }
                std::thread::sleep(SAMPLE_INTERVAL);
            }
            (baseline.unwrap_or(0), peak)
        });
        Self { stop, handle }
    }

    /// Stop sampling; returns `max(0, peak - baseline)` in MB
    async fn finish(self) -> u64 {
        self.stop.store(true, Ordering::Relaxed);
        let handle = self.handle;
        match tokio::task::spawn_blocking(move || handle.join()).await {
            Ok(Ok((baseline, peak))) => peak.saturating_sub(baseline) / (1024 * 1024),
            _ => {
                warn!("Memory sampler did not finish cleanly");
                0
            }
        }
    }
}

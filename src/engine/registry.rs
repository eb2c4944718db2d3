//! Registry of live encoder processes
//!
//! Every encoder launch registers a handle here before spawning and removes it
//! on every exit path. Shutdown and per-job cancellation enumerate the
//! registry to signal whatever is still running. All access goes through one
//! mutex, so completions and shutdown may race freely.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use tokio::sync::Notify;
use tracing::{debug, info, warn};

use crate::error::{MixerError, MixerResult};

/// Opaque key of one registered process
pub type ProcessToken = String;

/// Cancellation channel shared between the registry and one supervisor run
#[derive(Debug, Clone, Default)]
pub struct CancelSignal {
    cancelled: Arc<AtomicBool>,
    kill: Arc<Notify>,
}

impl CancelSignal {
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Resolves once the registry asks for a force-kill
    pub async fn killed(&self) {
        self.kill.notified().await
    }

    fn mark_cancelled(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    fn request_kill(&self) {
        self.mark_cancelled();
        // notify_one keeps a permit if the supervisor is not waiting yet
        self.kill.notify_one();
    }
}

/// One live (or about to be launched) encoder process
#[derive(Debug)]
pub struct ActiveProcessHandle {
    pub job_id: String,
    pub pid: Option<u32>,
    pub started_at: Instant,
    pub temp_files: Vec<PathBuf>,
    signal: CancelSignal,
}

/// Snapshot entry for reporting
#[derive(Debug, Clone, PartialEq)]
pub struct ActiveProcessInfo {
    pub token: ProcessToken,
    pub job_id: String,
    pub pid: Option<u32>,
    pub elapsed: Duration,
}

#[derive(Debug, Default)]
pub struct ProcessRegistry {
    handles: Mutex<HashMap<ProcessToken, ActiveProcessHandle>>,
}

impl ProcessRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<ProcessToken, ActiveProcessHandle>> {
        // a panicked holder cannot leave the map half-updated
        self.handles.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Register a handle for `job_id` and return its token and cancel signal.
    pub fn register(&self, job_id: &str, temp_files: Vec<PathBuf>) -> (ProcessToken, CancelSignal) {
        let token = uuid::Uuid::new_v4().to_string();
        let signal = CancelSignal::default();
        let handle = ActiveProcessHandle {
            job_id: job_id.to_string(),
            pid: None,
            started_at: Instant::now(),
            temp_files,
            signal: signal.clone(),
        };
        self.lock().insert(token.clone(), handle);
        debug!("Registered encoder handle {} for job {}", token, job_id);
        (token, signal)
    }

    pub fn set_pid(&self, token: &str, pid: u32) {
        if let Some(handle) = self.lock().get_mut(token) {
            handle.pid = Some(pid);
        }
    }

    pub fn unregister(&self, token: &str) -> Option<ActiveProcessHandle> {
        let removed = self.lock().remove(token);
        if removed.is_some() {
            debug!("Unregistered encoder handle {}", token);
        }
        removed
    }

    pub fn contains(&self, token: &str) -> bool {
        self.lock().contains_key(token)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn snapshot(&self) -> Vec<ActiveProcessInfo> {
        self.lock()
            .iter()
            .map(|(token, handle)| ActiveProcessInfo {
                token: token.clone(),
                job_id: handle.job_id.clone(),
                pid: handle.pid,
                elapsed: handle.started_at.elapsed(),
            })
            .collect()
    }

    /// Terminate, then force-kill, every process owned by `job_id`.
    ///
    /// Returns the number of handles that were signalled.
    pub async fn cancel_job(&self, job_id: &str, grace: Duration) -> usize {
        let count = self.cancel_where(|handle| handle.job_id == job_id, grace).await;
        if count > 0 {
            info!("Cancelled {} encoder process(es) of job {}", count, job_id);
        }
        count
    }

    /// Terminate, then force-kill, every registered process and clear the registry.
    pub async fn cancel_all(&self, grace: Duration) -> usize {
        let count = self.cancel_where(|_| true, grace).await;
        if count > 0 {
            info!("Cancelled {} active encoder process(es)", count);
        }
        count
    }

    async fn cancel_where<F>(&self, matches: F, grace: Duration) -> usize
    where
        F: Fn(&ActiveProcessHandle) -> bool,
    {
        let targets: Vec<(ProcessToken, Option<u32>, CancelSignal)> = self
            .lock()
            .iter()
            .filter(|(_, handle)| matches(handle))
            .map(|(token, handle)| (token.clone(), handle.pid, handle.signal.clone()))
            .collect();

        if targets.is_empty() {
            return 0;
        }

        for (token, pid, signal) in &targets {
            signal.mark_cancelled();
            match pid {
                Some(pid) => {
                    debug!("Sending terminate to encoder {} (pid {})", token, pid);
                    terminate(*pid);
                }
                None => signal.request_kill(),
            }
        }

        let deadline = Instant::now() + grace;
        while Instant::now() < deadline {
            let still_live = {
                let handles = self.lock();
                targets.iter().any(|(token, _, _)| handles.contains_key(token))
            };
            if !still_live {
                break;
            }
            tokio::time::sleep(Duration::from_millis(25).min(grace)).await;
        }

        for (token, pid, signal) in &targets {
            let Some(handle) = self.unregister(token) else {
                continue;
            };
            warn!(
                "Encoder {} of job {} outlived the grace period; force-killing",
                token, handle.job_id
            );
            signal.request_kill();
            if let Some(pid) = pid {
                force_kill(*pid);
            }
            for path in &handle.temp_files {
                if let Err(e) = remove_temp_file(path) {
                    warn!("{}", e);
                }
            }
        }

        targets.len()
    }
}

/// Delete one temp file; a missing file counts as removed.
pub fn remove_temp_file(path: &std::path::Path) -> MixerResult<()> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(MixerError::Cleanup {
            path: path.to_path_buf(),
            message: e.to_string(),
        }),
    }
}

/// Send SIGTERM to the encoder's process group
#[cfg(unix)]
pub fn terminate(pid: u32) {
    signal_group(pid, libc::SIGTERM);
}

/// Send SIGKILL to the encoder's process group
#[cfg(unix)]
pub fn force_kill(pid: u32) {
    signal_group(pid, libc::SIGKILL);
}

#[cfg(unix)]
fn signal_group(pid: u32, signal: libc::c_int) {
    let Ok(pid) = libc::pid_t::try_from(pid) else {
        return;
    };
    // SAFETY: kill(2) has no memory-safety preconditions; a stale pid only yields ESRCH.
    unsafe {
        // encoders are spawned as group leaders, so -pid reaches their children too
        if libc::kill(-pid, signal) != 0 {
            libc::kill(pid, signal);
        }
    }
}

#[cfg(not(unix))]
pub fn terminate(_pid: u32) {}

#[cfg(not(unix))]
pub fn force_kill(_pid: u32) {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_and_unregister() {
        let registry = ProcessRegistry::new();
        let (token, _signal) = registry.register("job-1", vec![PathBuf::from("/tmp/x")]);
        assert!(registry.contains(&token));
        registry.set_pid(&token, 42);

        let snapshot = registry.snapshot();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].job_id, "job-1");
        assert_eq!(snapshot[0].pid, Some(42));

        let handle = registry.unregister(&token).unwrap();
        assert_eq!(handle.temp_files, vec![PathBuf::from("/tmp/x")]);
        assert!(registry.is_empty());
        assert!(registry.unregister(&token).is_none());
    }

    #[test]
    fn test_tokens_are_unique() {
        let registry = ProcessRegistry::new();
        let (a, _) = registry.register("job", Vec::new());
        let (b, _) = registry.register("job", Vec::new());
        assert_ne!(a, b);
        assert_eq!(registry.len(), 2);
    }

    #[tokio::test]
    async fn test_cancel_all_without_pids_signals_and_clears() {
        let registry = ProcessRegistry::new();
        let (_, first) = registry.register("a", Vec::new());
        let (_, second) = registry.register("b", Vec::new());

        let count = registry.cancel_all(Duration::from_millis(50)).await;
        assert_eq!(count, 2);
        assert!(registry.is_empty());
        assert!(first.is_cancelled());
        assert!(second.is_cancelled());
        // the stored permit resolves immediately
        tokio::time::timeout(Duration::from_millis(100), first.killed())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_cancel_job_only_touches_that_job() {
        let dir = tempfile::tempdir().unwrap();
        let temp = dir.path().join("left_concat.txt");
        std::fs::write(&temp, "file 'x'").unwrap();

        let registry = ProcessRegistry::new();
        let (_, target) = registry.register("target", vec![temp.clone()]);
        let (other_token, other) = registry.register("other", Vec::new());

        assert_eq!(registry.cancel_job("target", Duration::from_millis(10)).await, 1);
        assert!(target.is_cancelled());
        assert!(!other.is_cancelled());
        assert!(registry.contains(&other_token));
        assert!(!temp.exists());

        assert_eq!(registry.cancel_job("missing", Duration::from_millis(10)).await, 0);
    }

    #[tokio::test]
    async fn test_cancel_all_on_empty_registry() {
        let registry = ProcessRegistry::new();
        assert_eq!(registry.cancel_all(Duration::from_secs(5)).await, 0);
    }

    #[test]
    fn test_remove_temp_file_tolerates_missing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gone.txt");
        assert!(remove_temp_file(&path).is_ok());

        std::fs::write(&path, "x").unwrap();
        assert!(remove_temp_file(&path).is_ok());
        assert!(!path.exists());

        // a directory cannot be removed as a file
        let err = remove_temp_file(dir.path()).unwrap_err();
        assert!(matches!(err, MixerError::Cleanup { .. }));
    }
}

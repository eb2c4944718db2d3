//! Process supervisor: runs one encoder invocation with a timeout, progress
//! forwarding and guaranteed cleanup

use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::engine::graph::EncoderInvocation;
use crate::engine::progress::{EncoderProgress, ProgressSink};
use crate::engine::registry::{self, ProcessRegistry, ProcessToken};
use crate::error::{MixerError, MixerResult};
use crate::ports::EncodePort;

/// Keep this much of the encoder's stderr for error messages
const STDERR_TAIL_BYTES: usize = 2048;

/// Buffered stderr is cut back to the tail once it grows past this
const STDERR_KEEP_BYTES: usize = 64 * 1024;

/// How long to wait for the output readers once the encoder has exited
const READER_DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Debug, Clone)]
pub struct SupervisorConfig {
    pub encoder_path: PathBuf,
    /// Hard wall-clock budget per invocation
    pub timeout: Duration,
    /// Delay between terminate and force-kill on timeout
    pub kill_grace: Duration,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            encoder_path: PathBuf::from("ffmpeg"),
            timeout: Duration::from_secs(600),
            kill_grace: Duration::from_secs(2),
        }
    }
}

pub struct ProcessSupervisor {
    config: SupervisorConfig,
    registry: Arc<ProcessRegistry>,
}

/// Unregisters the handle and deletes temp files when the run ends, however it ends
struct RegistrationGuard {
    registry: Arc<ProcessRegistry>,
    token: ProcessToken,
    temp_files: Vec<PathBuf>,
}

impl Drop for RegistrationGuard {
    fn drop(&mut self) {
        self.registry.unregister(&self.token);
        for path in &self.temp_files {
            if let Err(e) = registry::remove_temp_file(path) {
                warn!("{}", e);
            }
        }
    }
}

enum Exit {
    Finished(std::io::Result<ExitStatus>),
    TimedOut,
    Killed,
}

impl ProcessSupervisor {
    pub fn new(config: SupervisorConfig, registry: Arc<ProcessRegistry>) -> Self {
        Self { config, registry }
    }

    pub fn registry(&self) -> &Arc<ProcessRegistry> {
        &self.registry
    }

    pub fn config(&self) -> &SupervisorConfig {
        &self.config
    }

    /// Run `invocation` to completion.
    ///
    /// The handle is registered before anything else happens and removed, with
    /// its temp files, on every exit path including a dropped future.
    pub async fn run(
        &self,
        job_id: &str,
        invocation: &EncoderInvocation,
        progress: ProgressSink,
    ) -> MixerResult<()> {
        let (token, signal) = self
            .registry
            .register(job_id, invocation.temp_files.clone());
        let _guard = RegistrationGuard {
            registry: Arc::clone(&self.registry),
            token: token.clone(),
            temp_files: invocation.temp_files.clone(),
        };

        if let Some(manifest) = &invocation.manifest {
            tokio::fs::write(&manifest.path, &manifest.contents)
                .await
                .map_err(|e| {
                    MixerError::encoding(format!(
                        "Failed to write concat manifest {}: {}",
                        manifest.path.display(),
                        e
                    ))
                })?;
        }
        if let Some(parent) = invocation.output_path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        if signal.is_cancelled() {
            return Err(MixerError::Cancelled {
                job_id: job_id.to_string(),
            });
        }

        let mut command = Command::new(&self.config.encoder_path);
        command
            .args(&invocation.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        #[cfg(unix)]
        command.process_group(0);

        let mut child = command.spawn().map_err(|e| {
            MixerError::encoding(format!(
                "Failed to start encoder {}: {}",
                self.config.encoder_path.display(),
                e
            ))
        })?;
        let pid = child.id();
        if let Some(pid) = pid {
            self.registry.set_pid(&token, pid);
        }
        info!(
            "Encoder started for job {} (pid {:?}, {} args)",
            job_id,
            pid,
            invocation.args.len()
        );

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| MixerError::encoding("Failed to capture encoder stdout"))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| MixerError::encoding("Failed to capture encoder stderr"))?;

        // drained concurrently so the encoder never blocks on a full pipe
        let stderr_task = tokio::spawn(async move {
            let mut reader = BufReader::new(stderr);
            let mut kept: Vec<u8> = Vec::new();
            let mut chunk = [0u8; 4096];
            let mut failure = None;
            loop {
                match reader.read(&mut chunk).await {
                    Ok(0) => break,
                    Ok(n) => {
                        kept.extend_from_slice(&chunk[..n]);
                        if kept.len() > STDERR_KEEP_BYTES {
                            let excess = kept.len() - STDERR_TAIL_BYTES;
                            kept.drain(..excess);
                        }
                    }
                    Err(e) => {
                        failure = Some(e);
                        break;
                    }
                }
            }
            let mut output = String::from_utf8_lossy(&kept).into_owned();
            if let Some(e) = failure {
                output.push_str(&format!("<failed to read encoder stderr: {}>", e));
            }
            output
        });

        let (tx, mut rx) = mpsc::unbounded_channel::<f64>();
        let expected = invocation.expected_duration_secs;
        let progress_task = tokio::spawn(async move {
            let mut lines = BufReader::new(stdout).lines();
            let mut state = EncoderProgress::default();
            while let Ok(Some(line)) = lines.next_line().await {
                if state.apply_line(&line) && tx.send(state.percent(expected)).is_err() {
                    break;
                }
            }
        });

        let started = Instant::now();
        let deadline = tokio::time::sleep(self.config.timeout);
        tokio::pin!(deadline);

        let exit = loop {
            tokio::select! {
                status = child.wait() => break Exit::Finished(status),
                Some(percent) = rx.recv() => progress(percent.clamp(0.0, 100.0)),
                _ = &mut deadline => break Exit::TimedOut,
                _ = signal.killed() => break Exit::Killed,
            }
        };

        match exit {
            Exit::Finished(status) => {
                let _ = tokio::time::timeout(READER_DRAIN_TIMEOUT, progress_task).await;
                while let Ok(percent) = rx.try_recv() {
                    progress(percent.clamp(0.0, 100.0));
                }
                let stderr_output = match tokio::time::timeout(READER_DRAIN_TIMEOUT, stderr_task).await {
                    Ok(Ok(output)) => output,
                    _ => String::new(),
                };

                let status = status.map_err(|e| {
                    MixerError::encoding(format!("Failed to wait on encoder: {}", e))
                })?;

                if !status.success() {
                    if signal.is_cancelled() {
                        return Err(MixerError::Cancelled {
                            job_id: job_id.to_string(),
                        });
                    }
                    return Err(MixerError::encoding(format!(
                        "encoder exited with {}: {}",
                        status,
                        stderr_tail(&stderr_output)
                    )));
                }

                if !output_exists(&invocation.output_path).await {
                    return Err(MixerError::encoding(format!(
                        "encoder reported success but {} was not written",
                        invocation.output_path.display()
                    )));
                }

                progress(100.0);
                info!(
                    "Encoder finished for job {} in {:.1}s",
                    job_id,
                    started.elapsed().as_secs_f64()
                );
                Ok(())
            }
            Exit::TimedOut => {
                warn!(
                    "Encoder for job {} exceeded {:?}; terminating",
                    job_id, self.config.timeout
                );
                self.stop(&mut child, pid).await;
                progress_task.abort();
                stderr_task.abort();
                Err(MixerError::Timeout {
                    budget: self.config.timeout,
                })
            }
            Exit::Killed => {
                debug!("Force-killing encoder for job {}", job_id);
                if let Some(pid) = pid {
                    registry::force_kill(pid);
                }
                let _ = child.start_kill();
                let _ = child.wait().await;
                progress_task.abort();
                stderr_task.abort();
                Err(MixerError::Cancelled {
                    job_id: job_id.to_string(),
                })
            }
        }
    }

    /// Terminate, wait up to the kill grace, then force-kill and reap.
    async fn stop(&self, child: &mut Child, pid: Option<u32>) {
        if let Some(pid) = pid {
            registry::terminate(pid);
        }
        match tokio::time::timeout(self.config.kill_grace, child.wait()).await {
            Ok(_) => {}
            Err(_) => {
                warn!("Encoder ignored terminate; force-killing");
                if let Some(pid) = pid {
                    registry::force_kill(pid);
                }
                let _ = child.start_kill();
                let _ = child.wait().await;
            }
        }
    }
}

#[async_trait]
impl EncodePort for ProcessSupervisor {
    async fn encode(
        &self,
        job_id: &str,
        invocation: &EncoderInvocation,
        progress: ProgressSink,
    ) -> MixerResult<()> {
        self.run(job_id, invocation, progress).await
    }
}

async fn output_exists(path: &Path) -> bool {
    tokio::fs::metadata(path)
        .await
        .map(|m| m.is_file())
        .unwrap_or(false)
}

fn stderr_tail(output: &str) -> String {
    let trimmed = output.trim();
    if trimmed.len() <= STDERR_TAIL_BYTES {
        return trimmed.to_string();
    }
    let mut start = trimmed.len() - STDERR_TAIL_BYTES;
    while !trimmed.is_char_boundary(start) {
        start += 1;
    }
    format!("...{}", &trimmed[start..])
}

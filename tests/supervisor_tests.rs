#![cfg(unix)]

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use clipmix::engine::{EncoderInvocation, Manifest, ProcessRegistry, ProcessSupervisor, SupervisorConfig};
use clipmix::ports::ProgressSink;
use clipmix::MixerError;

fn shell_supervisor(timeout: Duration) -> (Arc<ProcessSupervisor>, Arc<ProcessRegistry>) {
    let registry = Arc::new(ProcessRegistry::new());
    let supervisor = Arc::new(ProcessSupervisor::new(
        SupervisorConfig {
            encoder_path: PathBuf::from("sh"),
            timeout,
            kill_grace: Duration::from_millis(200),
        },
        Arc::clone(&registry),
    ));
    (supervisor, registry)
}

fn shell_invocation(dir: &Path, script: &str, manifest: Option<Manifest>) -> EncoderInvocation {
    let temp_files = manifest.iter().map(|m| m.path.clone()).collect();
    EncoderInvocation {
        inputs: Vec::new(),
        filter_graph: String::new(),
        args: vec!["-c".to_string(), script.to_string()],
        output_path: dir.join("out.mp4"),
        manifest,
        temp_files,
        expected_duration_secs: 4.0,
    }
}

async fn wait_for_pid(registry: &ProcessRegistry) -> u32 {
    let deadline = Instant::now() + Duration::from_secs(10);
    loop {
        if let Some(pid) = registry.snapshot().iter().find_map(|info| info.pid) {
            return pid;
        }
        assert!(Instant::now() < deadline, "encoder never registered a pid");
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

fn is_alive(pid: u32) -> bool {
    unsafe { libc::kill(pid as libc::pid_t, 0) == 0 }
}

fn recording_sink() -> (ProgressSink, Arc<Mutex<Vec<f64>>>) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink_seen = Arc::clone(&seen);
    let sink: ProgressSink = Arc::new(move |p| sink_seen.lock().unwrap().push(p));
    (sink, seen)
}

#[tokio::test]
async fn test_successful_run_reports_progress_and_cleans_up() {
    let dir = tempfile::tempdir().unwrap();
    let manifest_path = dir.path().join("out_concat.txt");
    let output = dir.path().join("out.mp4");
    let script = format!(
        "test -f '{manifest}' || exit 3; \
         printf 'out_time_us=1000000\\nprogress=continue\\n'; \
         printf 'out_time_us=2000000\\nprogress=continue\\n'; \
         printf 'progress=end\\n'; \
         touch '{output}'",
        manifest = manifest_path.display(),
        output = output.display()
    );
    let invocation = shell_invocation(
        dir.path(),
        &script,
        Some(Manifest {
            path: manifest_path.clone(),
            contents: "file '/tmp/a.mp4'".into(),
        }),
    );
    let (supervisor, registry) = shell_supervisor(Duration::from_secs(30));
    let (sink, seen) = recording_sink();

    supervisor.run("job-ok", &invocation, sink).await.unwrap();

    let seen = seen.lock().unwrap().clone();
    assert!(seen.contains(&25.0), "{:?}", seen);
    assert!(seen.contains(&50.0), "{:?}", seen);
    assert_eq!(seen.last(), Some(&100.0));
    assert!(seen.iter().all(|p| (0.0..=100.0).contains(p)));
    assert!(output.exists());
    assert!(!manifest_path.exists(), "manifest is removed after the run");
    assert!(registry.is_empty());
}

#[tokio::test]
async fn test_failed_exit_carries_stderr() {
    let dir = tempfile::tempdir().unwrap();
    let invocation = shell_invocation(
        dir.path(),
        "echo 'moov atom not found' >&2; exit 1",
        None,
    );
    let (supervisor, registry) = shell_supervisor(Duration::from_secs(30));
    let (sink, _) = recording_sink();

    let err = supervisor.run("job-fail", &invocation, sink).await.unwrap_err();
    match err {
        MixerError::Encoding { message } => assert!(message.contains("moov atom not found"), "{}", message),
        other => panic!("expected an encoding error, got {:?}", other),
    }
    assert!(registry.is_empty());
}

#[tokio::test]
async fn test_non_utf8_stderr_is_kept() {
    let dir = tempfile::tempdir().unwrap();
    let invocation = shell_invocation(
        dir.path(),
        "printf 'caf\\351.mp4: No such file or directory\\n' >&2; exit 1",
        None,
    );
    let (supervisor, _) = shell_supervisor(Duration::from_secs(30));
    let (sink, _) = recording_sink();

    let err = supervisor.run("job-latin1", &invocation, sink).await.unwrap_err();
    match err {
        MixerError::Encoding { message } => {
            assert!(message.contains("caf"), "{}", message);
            assert!(message.contains("No such file or directory"), "{}", message);
            assert!(!message.contains("failed to read encoder stderr"), "{}", message);
        }
        other => panic!("expected an encoding error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_success_without_output_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let invocation = shell_invocation(dir.path(), "exit 0", None);
    let (supervisor, _) = shell_supervisor(Duration::from_secs(30));
    let (sink, seen) = recording_sink();

    let err = supervisor.run("job-empty", &invocation, sink).await.unwrap_err();
    assert!(matches!(err, MixerError::Encoding { .. }));
    assert!(!seen.lock().unwrap().contains(&100.0));
}

#[tokio::test]
async fn test_timeout_kills_the_encoder() {
    let dir = tempfile::tempdir().unwrap();
    let manifest_path = dir.path().join("out_concat.txt");
    let invocation = shell_invocation(
        dir.path(),
        "sleep 30",
        Some(Manifest {
            path: manifest_path.clone(),
            contents: String::new(),
        }),
    );
    let (supervisor, registry) = shell_supervisor(Duration::from_millis(200));
    let (sink, _) = recording_sink();

    let started = Instant::now();
    let err = supervisor.run("job-slow", &invocation, sink).await.unwrap_err();

    match &err {
        MixerError::Timeout { budget } => assert_eq!(*budget, Duration::from_millis(200)),
        other => panic!("expected a timeout, got {:?}", other),
    }
    assert!(err.to_string().contains("200ms"), "{}", err);
    assert!(started.elapsed() < Duration::from_secs(10));
    assert!(registry.is_empty());
    assert!(!manifest_path.exists());
}

#[tokio::test]
async fn test_cancel_all_stops_running_encoder() {
    let dir = tempfile::tempdir().unwrap();
    let invocation = shell_invocation(dir.path(), "sleep 30", None);
    let (supervisor, registry) = shell_supervisor(Duration::from_secs(60));

    let run = {
        let supervisor = Arc::clone(&supervisor);
        tokio::spawn(async move {
            let (sink, _) = recording_sink();
            supervisor.run("job-cancel", &invocation, sink).await
        })
    };

    let pid = wait_for_pid(&registry).await;

    let cancelled = registry.cancel_all(Duration::from_secs(2)).await;
    assert_eq!(cancelled, 1);

    let result = tokio::time::timeout(Duration::from_secs(10), run)
        .await
        .expect("supervisor returned after cancel")
        .unwrap();
    match result {
        Err(MixerError::Cancelled { job_id }) => assert_eq!(job_id, "job-cancel"),
        other => panic!("expected cancellation, got {:?}", other),
    }
    assert!(registry.is_empty());

    // the process has been reaped
    assert!(!is_alive(pid));
}

#[tokio::test]
async fn test_timeout_escalates_when_terminate_is_ignored() {
    let dir = tempfile::tempdir().unwrap();
    let invocation = shell_invocation(dir.path(), "trap '' TERM; sleep 30", None);
    let (supervisor, registry) = shell_supervisor(Duration::from_millis(300));

    let run = {
        let supervisor = Arc::clone(&supervisor);
        tokio::spawn(async move {
            let (sink, _) = recording_sink();
            supervisor.run("job-stubborn", &invocation, sink).await
        })
    };
    let pid = wait_for_pid(&registry).await;

    let started = Instant::now();
    let result = tokio::time::timeout(Duration::from_secs(10), run)
        .await
        .expect("supervisor returned after the timeout")
        .unwrap();
    assert!(matches!(result, Err(MixerError::Timeout { .. })), "{:?}", result);
    assert!(started.elapsed() < Duration::from_secs(5));
    assert!(registry.is_empty());
    assert!(!is_alive(pid));
}

#[tokio::test]
async fn test_cancel_all_escalates_when_terminate_is_ignored() {
    let dir = tempfile::tempdir().unwrap();
    let manifest_path = dir.path().join("out_concat.txt");
    let invocation = shell_invocation(
        dir.path(),
        "trap '' TERM; sleep 30",
        Some(Manifest {
            path: manifest_path.clone(),
            contents: String::new(),
        }),
    );
    let (supervisor, registry) = shell_supervisor(Duration::from_secs(60));

    let run = {
        let supervisor = Arc::clone(&supervisor);
        tokio::spawn(async move {
            let (sink, _) = recording_sink();
            supervisor.run("job-stubborn", &invocation, sink).await
        })
    };
    let pid = wait_for_pid(&registry).await;

    let cancelled = registry.cancel_all(Duration::from_millis(300)).await;
    assert_eq!(cancelled, 1);

    let result = tokio::time::timeout(Duration::from_secs(10), run)
        .await
        .expect("supervisor returned after cancel")
        .unwrap();
    match result {
        Err(MixerError::Cancelled { job_id }) => assert_eq!(job_id, "job-stubborn"),
        other => panic!("expected cancellation, got {:?}", other),
    }
    assert!(registry.is_empty());
    assert!(!manifest_path.exists());
    assert!(!is_alive(pid));
}

#[tokio::test]
async fn test_missing_encoder_binary() {
    let dir = tempfile::tempdir().unwrap();
    let registry = Arc::new(ProcessRegistry::new());
    let supervisor = ProcessSupervisor::new(
        SupervisorConfig {
            encoder_path: dir.path().join("no-such-encoder"),
            ..Default::default()
        },
        Arc::clone(&registry),
    );
    let invocation = shell_invocation(dir.path(), "true", None);
    let (sink, _) = recording_sink();

    let err = supervisor.run("job-missing", &invocation, sink).await.unwrap_err();
    assert!(matches!(err, MixerError::Encoding { .. }));
    assert!(registry.is_empty());
}

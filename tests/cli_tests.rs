use std::path::Path;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn clipmix(workdir: &Path) -> Command {
    let mut cmd = Command::cargo_bin("clipmix").unwrap();
    cmd.current_dir(workdir)
        .env_remove("RUST_LOG")
        .env("CLIPMIX_PROJECTS_DIR", workdir.join("projects"))
        .env("CLIPMIX_UPLOAD_DIR", workdir.join("uploads"))
        .env("CLIPMIX_OUTPUT_DIR", workdir.join("outputs"))
        .env("CLIPMIX_STATUS_DIR", workdir.join("status"));
    cmd
}

fn workspace_with_project() -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    std::fs::create_dir_all(dir.path().join("projects")).unwrap();
    let project = serde_json::json!({
        "id": "p1",
        "userId": "u1",
        "videos": [
            { "id": "a", "filePath": "a.mp4", "duration": 4.0, "order": 0 },
            { "id": "b", "filePath": "b.mp4", "duration": 3.0, "order": 1 },
            { "id": "c", "filePath": "c.mp4", "duration": 2.0, "order": 2 }
        ]
    });
    std::fs::write(
        dir.path().join("projects/p1.json"),
        serde_json::to_string(&project).unwrap(),
    )
    .unwrap();
    dir
}

fn write_job(dir: &Path, project_id: &str, total_videos: usize) -> std::path::PathBuf {
    let job = serde_json::json!({
        "generationId": "gen-cli",
        "projectId": project_id,
        "settings": { "enableOrderMixing": true, "audioOption": "mute" },
        "totalVideos": total_videos
    });
    let path = dir.join("job.json");
    std::fs::write(&path, serde_json::to_string(&job).unwrap()).unwrap();
    path
}

#[test]
fn test_help_lists_commands() {
    let dir = tempfile::tempdir().unwrap();
    clipmix(dir.path())
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("generate"))
        .stdout(predicate::str::contains("combinations"));
}

#[test]
fn test_combinations_counts_orderings() {
    let dir = tempfile::tempdir().unwrap();
    clipmix(dir.path())
        .args(["combinations", "--clips", "4"])
        .assert()
        .success()
        .stdout("24\n");

    clipmix(dir.path())
        .args(["combinations", "--clips", "3", "--groups", "3", "--group-mixing"])
        .assert()
        .success()
        .stdout("36\n");

    clipmix(dir.path())
        .args(["combinations", "--clips", "11"])
        .assert()
        .success()
        .stdout("unbounded\n");
}

#[test]
fn test_invalid_log_level_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    clipmix(dir.path())
        .args(["--log-level", "loud", "combinations", "--clips", "2"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("log-level"));
}

#[test]
fn test_plan_prints_json_without_encoding() {
    let dir = workspace_with_project();
    let job = write_job(dir.path(), "p1", 2);

    let output = clipmix(dir.path())
        .args(["plan", "--seed", "11", "--json", "--job"])
        .arg(&job)
        .output()
        .unwrap();
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));

    let previews: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let previews = previews.as_array().unwrap();
    assert_eq!(previews.len(), 2);
    for preview in previews {
        let mut ids: Vec<&str> = preview["clipIds"]
            .as_array()
            .unwrap()
            .iter()
            .map(|v| v.as_str().unwrap())
            .collect();
        ids.sort_unstable();
        assert_eq!(ids, vec!["a", "b", "c"]);
        let args: Vec<&str> = preview["invocation"]["args"]
            .as_array()
            .unwrap()
            .iter()
            .map(|v| v.as_str().unwrap())
            .collect();
        assert!(args.contains(&"-an"));
    }
    assert!(!dir.path().join("outputs").exists());
    assert!(!dir.path().join("status").exists());
}

#[test]
fn test_generate_for_missing_project_records_failure() {
    let dir = workspace_with_project();
    let job = write_job(dir.path(), "nope", 1);

    clipmix(dir.path())
        .args(["generate", "--job"])
        .arg(&job)
        .assert()
        .failure()
        .stderr(predicate::str::contains("no clips found in project nope"));

    let record: serde_json::Value = serde_json::from_str(
        &std::fs::read_to_string(dir.path().join("status/gen-cli.json")).unwrap(),
    )
    .unwrap();
    assert_eq!(record["status"], "failed");
    assert_eq!(record["errorMessage"], "no clips found in project nope");
}

#[test]
fn test_estimate_reports_project_summary() {
    let dir = workspace_with_project();
    let settings = dir.path().join("settings.json");
    std::fs::write(
        &settings,
        r#"{ "enableOrderMixing": true, "enableDifferentStart": true }"#,
    )
    .unwrap();

    let output = clipmix(dir.path())
        .args(["estimate", "--project", "p1", "--videos", "5", "--settings"])
        .arg(&settings)
        .output()
        .unwrap();
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));

    let estimate: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(estimate["totalSourceClips"], 3);
    assert_eq!(estimate["totalVideosToGenerate"], 5);
    assert_eq!(estimate["strength"], 2);
    assert_eq!(estimate["strengthLabel"], "Fair");
    assert_eq!(estimate["possibleCombinations"]["value"], 6);
    assert_eq!(estimate["estimatedDurationPerVideo"], 9.0);
}

#[cfg(unix)]
#[test]
fn test_sigterm_stops_the_running_encoder() {
    use std::os::unix::fs::PermissionsExt;
    use std::time::{Duration, Instant};

    let dir = workspace_with_project();
    let job = write_job(dir.path(), "p1", 1);
    let pid_file = dir.path().join("encoder.pid");
    let encoder = dir.path().join("enc.sh");
    std::fs::write(
        &encoder,
        format!("#!/bin/sh\necho $$ > '{}'\nexec sleep 60\n", pid_file.display()),
    )
    .unwrap();
    std::fs::set_permissions(&encoder, std::fs::Permissions::from_mode(0o755)).unwrap();

    let mut worker = std::process::Command::new(assert_cmd::cargo::cargo_bin("clipmix"))
        .current_dir(dir.path())
        .env_remove("RUST_LOG")
        .env("CLIPMIX_PROJECTS_DIR", dir.path().join("projects"))
        .env("CLIPMIX_UPLOAD_DIR", dir.path().join("uploads"))
        .env("CLIPMIX_OUTPUT_DIR", dir.path().join("outputs"))
        .env("CLIPMIX_STATUS_DIR", dir.path().join("status"))
        .arg("--encoder")
        .arg(&encoder)
        .args(["generate", "--job"])
        .arg(&job)
        .stdout(std::process::Stdio::null())
        .stderr(std::process::Stdio::null())
        .spawn()
        .unwrap();

    let deadline = Instant::now() + Duration::from_secs(20);
    let encoder_pid: libc::pid_t = loop {
        let written = std::fs::read_to_string(&pid_file).unwrap_or_default();
        if let Ok(pid) = written.trim().parse() {
            break pid;
        }
        assert!(Instant::now() < deadline, "encoder never started");
        std::thread::sleep(Duration::from_millis(20));
    };

    unsafe { libc::kill(worker.id() as libc::pid_t, libc::SIGTERM) };
    let status = worker.wait().unwrap();
    assert!(!status.success());

    let deadline = Instant::now() + Duration::from_secs(5);
    while unsafe { libc::kill(encoder_pid, 0) } == 0 {
        assert!(Instant::now() < deadline, "encoder {} outlived the worker", encoder_pid);
        std::thread::sleep(Duration::from_millis(20));
    }

    let record: serde_json::Value = serde_json::from_str(
        &std::fs::read_to_string(dir.path().join("status/gen-cli.json")).unwrap(),
    )
    .unwrap();
    assert_eq!(record["status"], "failed");

    let leftovers: Vec<_> = std::fs::read_dir(dir.path().join("outputs"))
        .unwrap()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_name().to_string_lossy().ends_with("_concat.txt"))
        .collect();
    assert!(leftovers.is_empty(), "{:?}", leftovers);
}

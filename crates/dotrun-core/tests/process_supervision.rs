//! Integration tests for the process supervisor.
//!
//! Shell scripts stand in for compiled artifacts.

#![cfg(unix)]

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tempfile::TempDir;

use dotrun_core::execute::{KillStatus, ProcessEvent, ProcessSupervisor, kill_by_name};

fn script(dir: &Path, name: &str, body: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
    fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
    path
}

fn exits(events: &[ProcessEvent]) -> usize {
    events
        .iter()
        .filter(|e| matches!(e, ProcessEvent::Exited(_)))
        .count()
}

#[tokio::test]
async fn test_output_and_exit_code() {
    let temp = TempDir::new().unwrap();
    let app = script(
        temp.path(),
        "app",
        "echo 'Hello, Compiled Code!'\necho oops >&2\nexit 3",
    );

    let mut supervisor = ProcessSupervisor::new();
    let events = supervisor.execute(&app, temp.path()).await;
    assert_eq!(supervisor.file_path(), Some(app.as_path()));
    assert_eq!(supervisor.working_dir(), Some(temp.path()));

    let events = events.collect().await;
    assert!(events.contains(&ProcessEvent::Output("Hello, Compiled Code!".to_string())));
    assert!(events.contains(&ProcessEvent::Error("oops".to_string())));
    assert_eq!(events.last(), Some(&ProcessEvent::Exited(Some(3))));
    assert_eq!(exits(&events), 1);
    assert!(!supervisor.is_running());
}

#[tokio::test]
async fn test_working_directory() {
    let temp = TempDir::new().unwrap();
    let work = temp.path().join("work");
    fs::create_dir_all(&work).unwrap();
    let app = script(temp.path(), "app", "pwd");

    let mut supervisor = ProcessSupervisor::new();
    let events = supervisor.execute(&app, &work).await.collect().await;

    let expected = work.canonicalize().unwrap();
    let printed = events.iter().find_map(|e| match e {
        ProcessEvent::Output(line) => Some(PathBuf::from(line)),
        _ => None,
    });
    assert_eq!(printed.map(|p| p.canonicalize().unwrap()), Some(expected));
}

#[tokio::test]
async fn test_stop_yields_one_exit_and_is_idempotent() {
    let temp = TempDir::new().unwrap();
    let app = script(temp.path(), "app", "echo started\nsleep 30");

    let mut supervisor = ProcessSupervisor::new();
    let mut events = supervisor.execute(&app, temp.path()).await;
    assert_eq!(
        events.recv().await,
        Some(ProcessEvent::Output("started".to_string()))
    );
    assert!(supervisor.is_running());

    tokio::time::timeout(Duration::from_secs(5), supervisor.stop())
        .await
        .unwrap();
    assert!(!supervisor.is_running());
    assert!(supervisor.file_path().is_none());
    supervisor.stop().await;

    let rest = events.collect().await;
    assert_eq!(exits(&rest), 1);
    // Killed by a signal, so no exit code.
    assert_eq!(rest.last(), Some(&ProcessEvent::Exited(None)));
}

#[tokio::test]
async fn test_execute_replaces_previous_run() {
    let temp = TempDir::new().unwrap();
    let slow = script(temp.path(), "slow", "sleep 30");
    let fast = script(temp.path(), "fast", "echo second");

    let mut supervisor = ProcessSupervisor::new();
    let first = supervisor.execute(&slow, temp.path()).await;
    let second = supervisor.execute(&fast, temp.path()).await;

    let first = tokio::time::timeout(Duration::from_secs(5), first.collect())
        .await
        .unwrap();
    assert_eq!(exits(&first), 1);

    let second = second.collect().await;
    assert!(second.contains(&ProcessEvent::Output("second".to_string())));
    assert_eq!(second.last(), Some(&ProcessEvent::Exited(Some(0))));
}

#[tokio::test]
async fn test_shell_characters_in_path() {
    let temp = TempDir::new().unwrap();
    let dir = temp.path().join("a$HOME `x` \"q\"");
    fs::create_dir_all(&dir).unwrap();
    let app = script(&dir, "app", "echo hi");

    let mut supervisor = ProcessSupervisor::new();
    let events = supervisor.execute(&app, temp.path()).await.collect().await;

    assert_eq!(
        events,
        vec![
            ProcessEvent::Output("hi".to_string()),
            ProcessEvent::Exited(Some(0)),
        ]
    );
}

#[tokio::test]
async fn test_assembly_runs_through_configured_host() {
    let temp = TempDir::new().unwrap();
    let host = script(temp.path(), "my dotnet", "echo \"host: $1\"");
    let assembly = temp.path().join("App.dll");
    fs::write(&assembly, b"").unwrap();

    let mut supervisor = ProcessSupervisor::with_dotnet(&host);
    let events = supervisor
        .execute(&assembly, temp.path())
        .await
        .collect()
        .await;

    let expected = format!("host: {}", assembly.display());
    assert!(events.contains(&ProcessEvent::Output(expected)));
    assert_eq!(events.last(), Some(&ProcessEvent::Exited(Some(0))));
}

#[tokio::test]
async fn test_launch_failure_is_an_error_event() {
    let temp = TempDir::new().unwrap();
    let app = script(temp.path(), "app", "echo never");

    let mut supervisor = ProcessSupervisor::new();
    let events = supervisor
        .execute(&app, &temp.path().join("missing-dir"))
        .await
        .collect()
        .await;

    assert_eq!(events.len(), 1);
    assert!(matches!(&events[0], ProcessEvent::Error(msg) if msg.contains("failed to launch")));
    assert!(!supervisor.is_running());
}

#[test]
fn test_kill_by_name_without_match() {
    assert!(kill_by_name(Path::new("/tmp/dotrun-never-running-7c1e.exe")).is_empty());
}

#[cfg(target_os = "linux")]
#[test]
fn test_kill_by_name_terminates_matches() {
    let temp = TempDir::new().unwrap();
    let name = format!("dk{}", std::process::id());
    let app = script(temp.path(), &name, "while true; do sleep 1; done");

    let mut child = std::process::Command::new(&app).spawn().unwrap();
    std::thread::sleep(Duration::from_millis(300));

    let outcomes = kill_by_name(&app);
    assert_eq!(outcomes.len(), 1);
    assert_eq!(outcomes[0].pid, child.id());
    assert_eq!(outcomes[0].status, KillStatus::Killed);

    let status = child.wait().unwrap();
    assert!(!status.success());
}

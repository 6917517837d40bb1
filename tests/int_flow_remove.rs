mod common;

use std::collections::BTreeMap;
use std::fs;

use common::{create_instance, orchestrator, FakeContainers, FakeRepo};
use devbox::{ConfirmationMethod, ContainerStatus, ErrorCode, GitState, RemoveRequest, SafetyReport};

fn staged() -> GitState {
    GitState {
        has_staged: true,
        staged_count: 2,
        ..GitState::default()
    }
}

fn audit_lines(base: &std::path::Path) -> Vec<serde_json::Value> {
    match fs::read_to_string(base.join("audit.log")) {
        Ok(text) => text
            .lines()
            .map(|l| serde_json::from_str(l).expect("audit line is JSON"))
            .collect(),
        Err(_) => Vec::new(),
    }
}

#[test]
fn test_remove_clean_instance() {
    let td = tempfile::tempdir().unwrap();
    let orch = orchestrator(td.path(), FakeContainers::default(), FakeRepo::default());
    let created = create_instance(&orch, "clean");

    let out = orch.remove("clean", RemoveRequest::default(), None).expect("remove");
    assert!(!out.forced);
    assert_eq!(out.confirmation, None);
    assert!(!created.workspace.root.exists());
    assert_eq!(orch.containers().count("stop"), 1);
    assert_eq!(orch.containers().count("remove"), 1);
    assert!(audit_lines(td.path()).is_empty(), "unforced removal is not audited");
}

#[test]
fn test_remove_dirty_instance_is_blocked() {
    let td = tempfile::tempdir().unwrap();
    let orch = orchestrator(td.path(), FakeContainers::default(), FakeRepo::with_state(staged()));
    let created = create_instance(&orch, "dirty");

    let err = orch.remove("dirty", RemoveRequest::default(), None).unwrap_err();
    assert_eq!(err.code, ErrorCode::SafetyCheckFailed);
    assert_eq!(err.blockers, vec!["2 files with staged changes".to_string()]);
    assert_eq!(err.git_state, Some(staged()));
    assert!(err.suggestion.as_deref().unwrap_or("").contains("--force"));
    assert!(created.workspace.root.exists());
    assert_eq!(orch.containers().count("stop"), 0);
    assert_eq!(orch.containers().count("remove"), 0);
}

#[test]
fn test_remove_git_failure_is_distinct() {
    let td = tempfile::tempdir().unwrap();
    let orch = orchestrator(
        td.path(),
        FakeContainers::default(),
        FakeRepo::failing_state("fatal: not a git repository"),
    );
    let created = create_instance(&orch, "broken");

    let err = orch.remove("broken", RemoveRequest::default(), None).unwrap_err();
    assert_eq!(err.code, ErrorCode::GitStateFailed);
    assert!(err.message.contains("not a git repository"));
    assert!(created.workspace.root.exists());
}

#[test]
fn test_forced_remove_with_yes_writes_one_audit_line() {
    let td = tempfile::tempdir().unwrap();
    let orch = orchestrator(td.path(), FakeContainers::default(), FakeRepo::with_state(staged()));
    let created = create_instance(&orch, "dirty");
    orch.containers()
        .set_status(&created.state.container_name, ContainerStatus::Running);

    let out = orch
        .remove("dirty", RemoveRequest { force: true, yes: true }, None)
        .expect("forced remove");
    assert_eq!(out.confirmation, Some(ConfirmationMethod::YesFlag));
    assert!(out.audit_logged);
    assert!(!created.workspace.root.exists());

    let lines = audit_lines(td.path());
    assert_eq!(lines.len(), 1);
    assert_eq!(lines[0]["action"], "force-remove");
    assert_eq!(lines[0]["instanceName"], "widgets-dirty");
    assert_eq!(lines[0]["confirmationMethod"], "yes-flag");
    assert_eq!(lines[0]["gitState"]["stagedCount"], 2);
}

#[test]
fn test_forced_remove_with_typed_name() {
    let td = tempfile::tempdir().unwrap();
    let mut ahead = BTreeMap::new();
    ahead.insert("main".to_string(), 3);
    let state = GitState {
        unpushed_branches: vec!["main".to_string()],
        unpushed_commit_counts: ahead,
        ..GitState::default()
    };
    let orch = orchestrator(td.path(), FakeContainers::default(), FakeRepo::with_state(state));
    create_instance(&orch, "typed");

    let mut seen_blockers = 0;
    let mut confirm = |name: &str, report: Option<&SafetyReport>| {
        seen_blockers = report.map(|r| r.blockers.len()).unwrap_or(0);
        Some(name.to_string())
    };
    let out = orch
        .remove("typed", RemoveRequest { force: true, yes: false }, Some(&mut confirm))
        .expect("forced remove");
    assert_eq!(out.confirmation, Some(ConfirmationMethod::TypedName));
    assert_eq!(seen_blockers, 1);
    assert_eq!(audit_lines(td.path())[0]["confirmationMethod"], "typed-name");
}

#[test]
fn test_forced_remove_wrong_confirmation_keeps_instance() {
    let td = tempfile::tempdir().unwrap();
    let orch = orchestrator(td.path(), FakeContainers::default(), FakeRepo::with_state(staged()));
    let created = create_instance(&orch, "keep");

    let mut confirm = |_: &str, _: Option<&SafetyReport>| Some("keep".to_string());
    let err = orch
        .remove("keep", RemoveRequest { force: true, yes: false }, Some(&mut confirm))
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::ConfirmationRequired);
    assert!(created.workspace.root.exists());
    assert!(audit_lines(td.path()).is_empty());

    let err = orch
        .remove("keep", RemoveRequest { force: true, yes: false }, None)
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::ConfirmationRequired);
}

#[test]
fn test_forced_remove_of_clean_instance_needs_no_confirmation() {
    let td = tempfile::tempdir().unwrap();
    let orch = orchestrator(td.path(), FakeContainers::default(), FakeRepo::default());
    create_instance(&orch, "tidy");

    let out = orch
        .remove("tidy", RemoveRequest { force: true, yes: false }, None)
        .expect("forced remove");
    assert_eq!(out.confirmation, Some(ConfirmationMethod::NotRequired));
    let lines = audit_lines(td.path());
    assert_eq!(lines.len(), 1);
    assert_eq!(lines[0]["confirmationMethod"], "not-required");
    assert_eq!(lines[0]["gitState"]["isClean"], true);
}

#[test]
fn test_forced_remove_with_failed_git_state_logs_null() {
    let td = tempfile::tempdir().unwrap();
    let orch = orchestrator(
        td.path(),
        FakeContainers::default(),
        FakeRepo::failing_state("index.lock exists"),
    );
    create_instance(&orch, "gone");

    let out = orch
        .remove("gone", RemoveRequest { force: true, yes: true }, None)
        .expect("forced remove");
    assert_eq!(out.git_state, None);
    assert!(audit_lines(td.path())[0]["gitState"].is_null());
}

#[test]
fn test_remove_requires_runtime() {
    let td = tempfile::tempdir().unwrap();
    let orch = orchestrator(td.path(), FakeContainers::default(), FakeRepo::default());
    let created = create_instance(&orch, "rt");

    let down = FakeContainers {
        unavailable: true,
        ..FakeContainers::default()
    };
    let orch = orchestrator(td.path(), down, FakeRepo::default());
    let err = orch.remove("rt", RemoveRequest::default(), None).unwrap_err();
    assert_eq!(err.code, ErrorCode::RuntimeUnavailable);
    assert!(created.workspace.root.exists());
}

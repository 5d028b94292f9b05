mod common;

use common::{write_tree, Call, FakeStager};
use p4harmonize_core::error::PathErrorKind;
use p4harmonize_core::reconcile::{Plan, StagingAction};
use p4harmonize_core::staging::{ExecutionState, Executor, FsCopier};
use p4harmonize_core::SilentReporter;
use std::fs;
use tempfile::tempdir;

fn add(path: &str) -> StagingAction {
    StagingAction::Add {
        path: path.into(),
        deferred: false,
    }
}

fn edit(path: &str, expect_unchanged: bool) -> StagingAction {
    StagingAction::Edit {
        path: path.into(),
        expect_unchanged,
    }
}

fn plan(actions: Vec<StagingAction>) -> Plan {
    Plan {
        actions,
        second_pass_required: false,
    }
}

#[test]
fn test_unchanged_edits_are_reverted() {
    let source = tempdir().unwrap();
    let workspace = tempdir().unwrap();
    write_tree(
        source.path(),
        &[
            ("same.txt", b"same content"),
            ("changed.txt", b"new content"),
            ("Docs/new.md", b"# new"),
        ],
    );
    let stager = FakeStager::new(workspace.path())
        .with_depot_file("same.txt", b"same content")
        .with_depot_file("changed.txt", b"old content");

    let plan = plan(vec![
        add("Docs/new.md"),
        StagingAction::Delete {
            path: "gone.txt".into(),
        },
        edit("changed.txt", false),
        edit("same.txt", true),
        StagingAction::RevertIfUnchanged {
            paths: vec!["changed.txt".into(), "same.txt".into()],
        },
    ]);

    let mut executor = Executor::new(
        &FsCopier,
        &stager,
        source.path(),
        workspace.path(),
        &SilentReporter,
    );
    let report = executor.execute(&plan);

    assert_eq!(executor.state(), ExecutionState::Done);
    assert!(report.is_success());
    assert_eq!(report.copied, 3);
    assert_eq!(report.reverted, vec!["same.txt".to_string()]);
    assert_eq!(report.surviving_count(), 3);
    assert!(!report
        .surviving()
        .any(|a| matches!(a, StagingAction::Edit { path, .. } if path == "same.txt")));
    assert_eq!(
        fs::read_to_string(workspace.path().join("Docs/new.md")).unwrap(),
        "# new"
    );

    assert_eq!(
        stager.calls(),
        vec![
            Call::Delete(vec!["gone.txt".into()]),
            Call::Add(vec!["Docs/new.md".into()]),
            Call::Edit(vec!["changed.txt".into(), "same.txt".into()]),
            Call::Revert(vec!["changed.txt".into(), "same.txt".into()]),
        ]
    );
}

#[test]
fn test_copy_failure_skips_only_that_path() {
    let source = tempdir().unwrap();
    let workspace = tempdir().unwrap();
    write_tree(source.path(), &[("present.txt", b"here")]);
    let stager = FakeStager::new(workspace.path());

    let plan = plan(vec![add("missing.txt"), add("present.txt")]);
    let mut executor = Executor::new(
        &FsCopier,
        &stager,
        source.path(),
        workspace.path(),
        &SilentReporter,
    );
    let report = executor.execute(&plan);

    assert_eq!(report.state, ExecutionState::Done);
    assert!(!report.is_success());
    assert_eq!(report.errors.len(), 1);
    assert_eq!(report.errors[0].path, "missing.txt");
    assert_eq!(report.errors[0].kind, PathErrorKind::Copy);
    assert_eq!(report.skipped, vec![add("missing.txt")]);
    assert_eq!(stager.calls(), vec![Call::Add(vec!["present.txt".into()])]);
}

#[test]
fn test_staging_failure_is_collected_and_not_reverted() {
    let source = tempdir().unwrap();
    let workspace = tempdir().unwrap();
    write_tree(source.path(), &[("a.txt", b"a"), ("locked.uasset", b"b")]);
    let stager = FakeStager::new(workspace.path())
        .with_depot_file("a.txt", b"a")
        .failing_on("locked.uasset");

    let plan = plan(vec![
        edit("a.txt", true),
        edit("locked.uasset", false),
        StagingAction::RevertIfUnchanged {
            paths: vec!["a.txt".into(), "locked.uasset".into()],
        },
    ]);
    let mut executor = Executor::new(
        &FsCopier,
        &stager,
        source.path(),
        workspace.path(),
        &SilentReporter,
    );
    let report = executor.execute(&plan);

    assert_eq!(report.state, ExecutionState::Done);
    assert_eq!(report.errors[0].kind, PathErrorKind::Staging);
    assert_eq!(report.skipped, vec![edit("locked.uasset", false)]);
    assert_eq!(
        stager.calls().last(),
        Some(&Call::Revert(vec!["a.txt".into()]))
    );
    assert_eq!(report.surviving_count(), 0);
}

#[test]
fn test_deferred_add_is_reported_not_staged() {
    let source = tempdir().unwrap();
    let workspace = tempdir().unwrap();
    write_tree(source.path(), &[("README.md", b"hello")]);
    let stager = FakeStager::new(workspace.path());

    let plan = Plan {
        actions: vec![
            StagingAction::Delete {
                path: "readme.md".into(),
            },
            StagingAction::Add {
                path: "README.md".into(),
                deferred: true,
            },
        ],
        second_pass_required: true,
    };
    let mut executor = Executor::new(
        &FsCopier,
        &stager,
        source.path(),
        workspace.path(),
        &SilentReporter,
    );
    let report = executor.execute(&plan);

    assert_eq!(report.deferred, vec!["README.md".to_string()]);
    assert_eq!(report.copied, 0);
    assert!(!workspace.path().join("README.md").exists());
    assert_eq!(stager.calls(), vec![Call::Delete(vec!["readme.md".into()])]);
}

#[test]
fn test_move_copies_new_case_before_staging() {
    let source = tempdir().unwrap();
    let workspace = tempdir().unwrap();
    write_tree(source.path(), &[("Docs/Guide.md", b"guide")]);
    let stager = FakeStager::new(workspace.path());

    let plan = plan(vec![StagingAction::Move {
        from: "docs/guide.md".into(),
        to: "Docs/Guide.md".into(),
    }]);
    let mut executor = Executor::new(
        &FsCopier,
        &stager,
        source.path(),
        workspace.path(),
        &SilentReporter,
    );
    let report = executor.execute(&plan);

    assert!(report.is_success());
    assert_eq!(
        fs::read_to_string(workspace.path().join("Docs/Guide.md")).unwrap(),
        "guide"
    );
    assert_eq!(
        stager.calls(),
        vec![Call::Move("docs/guide.md".into(), "Docs/Guide.md".into())]
    );
}

#[test]
fn test_fatal_stager_error_leaves_earlier_work_staged() {
    let source = tempdir().unwrap();
    let workspace = tempdir().unwrap();
    write_tree(source.path(), &[("new.txt", b"n")]);
    let stager = FakeStager::new(workspace.path()).fatal_on("add");

    let plan = plan(vec![
        add("new.txt"),
        StagingAction::Delete {
            path: "old.txt".into(),
        },
    ]);
    let mut executor = Executor::new(
        &FsCopier,
        &stager,
        source.path(),
        workspace.path(),
        &SilentReporter,
    );
    let report = executor.execute(&plan);

    assert_eq!(executor.state(), ExecutionState::Failed);
    assert_eq!(report.state, ExecutionState::Failed);
    assert!(report.failure.as_deref().unwrap().contains("connection lost"));
    assert_eq!(
        report.staged,
        vec![StagingAction::Delete {
            path: "old.txt".into()
        }]
    );
    assert!(!report.is_success());
}

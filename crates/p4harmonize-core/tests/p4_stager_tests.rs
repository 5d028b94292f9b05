#![cfg(unix)]

use p4harmonize_core::config::DestinationConfig;
use p4harmonize_core::p4::P4Connection;
use p4harmonize_core::staging::{P4Stager, Stager};
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;
use tempfile::tempdir;

/// Stand-in `p4` that logs its arguments and fails `move` while
/// `fail_move` exists next to it.
fn write_fake_p4(dir: &Path) -> String {
    let script = dir.join("p4");
    let log = dir.join("calls.log");
    let switch = dir.join("fail_move");
    fs::write(
        &script,
        format!(
            "#!/bin/sh\n\
             echo \"$*\" >> '{log}'\n\
             case \"$*\" in\n\
             *\" move \"*)\n\
             if [ -f '{switch}' ]; then echo 'Move failed: target not in client view.' >&2; exit 1; fi ;;\n\
             esac\n\
             exit 0\n",
            log = log.display(),
            switch = switch.display(),
        ),
    )
    .unwrap();
    fs::set_permissions(&script, fs::Permissions::from_mode(0o755)).unwrap();
    script.to_string_lossy().into_owned()
}

fn calls(dir: &Path) -> Vec<String> {
    fs::read_to_string(dir.join("calls.log"))
        .unwrap_or_default()
        .lines()
        .map(str::to_string)
        .collect()
}

#[test]
fn test_failed_move_reverts_the_opened_source() {
    let tools = tempdir().unwrap();
    let workspace = tempdir().unwrap();
    let destination = DestinationConfig {
        p4port: "localhost:1666".to_string(),
        p4user: "builder".to_string(),
        p4client: "builder_harmonize".to_string(),
        root: workspace.path().to_string_lossy().into_owned(),
        stream: "//UE5/Release".to_string(),
        description: None,
        case_sensitive: Some(true),
        p4_program: Some(write_fake_p4(tools.path())),
    };
    let stager = P4Stager::new(P4Connection::new(&destination), workspace.path(), Some(7));

    fs::write(tools.path().join("fail_move"), b"").unwrap();
    let errors = stager.move_file("docs/guide.md", "Docs/Guide.md").unwrap();

    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].path, "Docs/Guide.md");
    assert!(errors[0].message.contains("Move failed"));
    assert!(errors[0].message.ends_with("(reverted docs/guide.md)"));
    let log = calls(tools.path());
    assert_eq!(log.len(), 3);
    assert!(log[0].contains(" edit -c 7 -k "));
    assert!(log[1].contains(" move -c 7 -k "));
    assert!(log[2].contains(" revert -c 7 -k "));
    assert!(log[2].ends_with("docs/guide.md"));

    // A move that goes through leaves nothing to revert.
    fs::remove_file(tools.path().join("fail_move")).unwrap();
    fs::remove_file(tools.path().join("calls.log")).unwrap();
    let errors = stager.move_file("docs/guide.md", "Docs/Guide.md").unwrap();

    assert!(errors.is_empty());
    let log = calls(tools.path());
    assert_eq!(log.len(), 2);
    assert!(log.iter().all(|call| !call.contains(" revert ")));
}

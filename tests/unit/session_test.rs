//! Tests for src/session - per-terminal session state

use gardenctl::session::{gc_stale_sessions, validate_session_id, Session, HISTORY_LIMIT};
use gardenctl::target::Target;
use std::fs;
use std::os::unix::fs::PermissionsExt;
use tempfile::TempDir;

// ============================================================================
// Session directory tests
// ============================================================================

#[test]
fn test_open_creates_private_dirs() {
    let root = TempDir::new().unwrap();
    let session = Session::open(&root.path().join("garden"), "term-1").unwrap();
    assert_eq!(session.id(), "term-1");
    assert!(session.dir().ends_with("garden/term-1"));

    let mode = fs::metadata(session.dir()).unwrap().permissions().mode() & 0o777;
    assert_eq!(mode, 0o700);
}

#[test]
fn test_open_rejects_path_like_ids() {
    let root = TempDir::new().unwrap();
    for id in ["..", "a/b", "", "with space"] {
        assert!(Session::open(root.path(), id).is_err(), "{id:?}");
    }
    assert!(validate_session_id("w0t1p0:5F2A-0000.x_y").is_ok());
}

// ============================================================================
// Target and history tests
// ============================================================================

#[test]
fn test_missing_target_is_empty() {
    let root = TempDir::new().unwrap();
    let session = Session::open(root.path(), "s1").unwrap();
    assert_eq!(session.read_target().unwrap(), Target::default());
}

#[test]
fn test_target_survives_reopen() {
    let root = TempDir::new().unwrap();
    let target = Target::new("g", "prod", "", "my-shoot").with_control_plane(true);
    Session::open(root.path(), "s1").unwrap().write_target(&target).unwrap();

    let reopened = Session::open(root.path(), "s1").unwrap();
    assert_eq!(reopened.read_target().unwrap(), target);
    assert_eq!(
        Session::open(root.path(), "s2").unwrap().read_target().unwrap(),
        Target::default()
    );
}

#[test]
fn test_history_keeps_newest_records() {
    let root = TempDir::new().unwrap();
    let session = Session::open(root.path(), "s1").unwrap();
    for i in 0..HISTORY_LIMIT + 5 {
        session.append_history(&format!("gardenctl target --garden g{i}")).unwrap();
    }
    let records = session.read_history().unwrap();
    assert_eq!(records.len(), HISTORY_LIMIT);
    assert_eq!(records[0], "gardenctl target --garden g5");
    assert_eq!(
        records.last().map(String::as_str),
        Some(format!("gardenctl target --garden g{}", HISTORY_LIMIT + 4).as_str())
    );
}

// ============================================================================
// Garbage collection tests
// ============================================================================

#[test]
fn test_gc_keeps_non_sid_sessions() {
    let root = TempDir::new().unwrap();
    Session::open(root.path(), "term-1").unwrap();
    Session::open(root.path(), "current").unwrap();
    assert_eq!(gc_stale_sessions(root.path(), "current"), 0);
    assert!(root.path().join("term-1").exists());
}

#[test]
fn test_gc_missing_root() {
    let root = TempDir::new().unwrap();
    assert_eq!(gc_stale_sessions(&root.path().join("absent"), "current"), 0);
}

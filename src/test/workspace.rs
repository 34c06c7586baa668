use std::fs;

use crate::workspace::{ensure_root, FilesystemError, Workspace};

#[test]
fn test_acquire_creates_schema() {
  let root = tempfile::tempdir().unwrap();
  let ws = Workspace::acquire(root.path(), "job-1").unwrap();

  for sub in ["submission", "problem", "lib", "build", "run", "logs"] {
    assert!(ws.path().join(sub).is_dir(), "{} missing", sub);
  }
}

#[test]
fn test_release_removes_tree() {
  let root = tempfile::tempdir().unwrap();
  let ws = Workspace::acquire(root.path(), "job-2").unwrap();
  let path = ws.path().to_path_buf();
  fs::write(path.join("submission/main.c"), "x").unwrap();

  ws.release(false).unwrap();
  assert!(!path.exists());
}

#[test]
fn test_release_keep_for_debug_archives() {
  let root = tempfile::tempdir().unwrap();
  let ws = Workspace::acquire(root.path(), "job-3").unwrap();
  let path = ws.path().to_path_buf();

  ws.release(true).unwrap();
  assert!(!path.exists());
  assert!(root.path().join("debug/job-3").is_dir());
}

#[test]
fn test_contained_join_accepts_nested() {
  let root = tempfile::tempdir().unwrap();
  let ws = Workspace::acquire(root.path(), "job-4").unwrap();

  let p = ws
    .contained_join(&ws.problem_dir(), "cases/1.in")
    .unwrap();
  assert!(p.starts_with(ws.path()));
}

#[test]
fn test_contained_join_rejects_traversal() {
  let root = tempfile::tempdir().unwrap();
  let ws = Workspace::acquire(root.path(), "job-5").unwrap();

  assert!(matches!(
    ws.contained_join(&ws.problem_dir(), "../../etc/passwd"),
    Err(FilesystemError::Containment { .. })
  ));
  assert!(matches!(
    ws.contained_join(&ws.problem_dir(), "/etc/passwd"),
    Err(FilesystemError::Containment { .. })
  ));
}

#[test]
fn test_contained_join_rejects_symlink_escape() {
  let root = tempfile::tempdir().unwrap();
  let outside = tempfile::tempdir().unwrap();
  let ws = Workspace::acquire(root.path(), "job-6").unwrap();

  std::os::unix::fs::symlink(outside.path(), ws.path().join("lib/leak")).unwrap();

  assert!(matches!(
    ws.contained_join(&ws.lib_dir(), "leak/secret.txt"),
    Err(FilesystemError::Containment { .. })
  ));
}

#[test]
fn test_run_dir_created_on_demand() {
  let root = tempfile::tempdir().unwrap();
  let ws = Workspace::acquire(root.path(), "job-7").unwrap();

  let dir = ws.run_dir("3").unwrap();
  assert!(dir.is_dir());
  assert_eq!(dir, ws.path().join("run/3"));
}

#[test]
fn test_ensure_root_creates_and_probes() {
  let base = tempfile::tempdir().unwrap();
  let root = base.path().join("work");
  ensure_root(&root).unwrap();
  assert!(root.is_dir());
  // The probe file does not linger.
  assert_eq!(fs::read_dir(&root).unwrap().count(), 0);
}

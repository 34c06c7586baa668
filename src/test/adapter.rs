use std::{fs, io::Write, time};

use zip::write::FileOptions;

use crate::{adapter, error::SubmissionError, test};

#[test]
fn test_backoff_schedule() {
  let base = time::Duration::from_secs(1);
  assert_eq!(adapter::backoff_delay(base, 0), time::Duration::from_secs(1));
  assert_eq!(adapter::backoff_delay(base, 1), time::Duration::from_secs(2));
  assert_eq!(adapter::backoff_delay(base, 2), time::Duration::from_secs(4));
}

fn write_zip(path: &std::path::Path, entries: &[(&str, &[u8])]) {
  let file = fs::File::create(path).unwrap();
  let mut zip = zip::ZipWriter::new(file);
  for (name, data) in entries {
    zip.start_file(*name, FileOptions::default()).unwrap();
    zip.write_all(data).unwrap();
  }
  zip.finish().unwrap();
}

#[test]
fn test_unpack_archive() {
  test::init();

  let dir = tempfile::tempdir().unwrap();
  let archive = dir.path().join("sub.zip");
  write_zip(
    &archive,
    &[
      ("main.c", b"int main(){return 0;}" as &[u8]),
      ("src/util.c", b"/* helper */"),
    ],
  );

  let dest = dir.path().join("submission");
  fs::create_dir(&dest).unwrap();
  adapter::unpack_archive(&archive, &dest).unwrap();

  assert_eq!(
    fs::read(dest.join("main.c")).unwrap(),
    b"int main(){return 0;}".to_vec()
  );
  assert!(dest.join("src/util.c").is_file());
}

#[test]
fn test_unpack_archive_rejects_escaping_entry() {
  let dir = tempfile::tempdir().unwrap();
  let archive = dir.path().join("evil.zip");
  write_zip(&archive, &[("../evil.txt", b"nope" as &[u8])]);

  let dest = dir.path().join("submission");
  fs::create_dir(&dest).unwrap();

  let res = adapter::unpack_archive(&archive, &dest);
  assert!(matches!(res, Err(SubmissionError::Protocol(_))));
  assert!(!dir.path().join("evil.txt").exists());
}

#[test]
fn test_unpack_archive_rejects_garbage() {
  let dir = tempfile::tempdir().unwrap();
  let archive = dir.path().join("not-a.zip");
  fs::write(&archive, b"definitely not a zip").unwrap();

  let dest = dir.path().join("submission");
  fs::create_dir(&dest).unwrap();

  assert!(matches!(
    adapter::unpack_archive(&archive, &dest),
    Err(SubmissionError::Protocol(_))
  ));
}

use std::{
  fs::{self, OpenOptions},
  io::Write,
  path::PathBuf,
  sync::Mutex,
};

/// Capability for capturing per-stage output during one submission.
///
/// Threaded into the evaluator instead of living behind a process-global so
/// that everything a stage printed ends up in the UI's debug payload, not
/// just on the worker's own log.
pub trait LogSink: Send + Sync {
  /// Append `text` to the log of `stage` (for example `compile` or
  /// `execute:3`). Never fails the pipeline; capture problems are only
  /// worth a host-side warning.
  fn append(&self, stage: &str, text: &str);

  /// Everything captured so far, stage by stage in first-write order.
  fn collect(&self) -> String;
}

/// Writes each stage to `<logs>/<stage>.log`.
pub struct FileSink {
  dir: PathBuf,
  stages: Mutex<Vec<String>>,
}

impl FileSink {
  pub fn new(dir: PathBuf) -> Self {
    return Self {
      dir,
      stages: Mutex::new(vec![]),
    };
  }

  fn stage_path(&self, stage: &str) -> PathBuf {
    // Stage names contain test names; keep the file name flat.
    return self.dir.join(format!("{}.log", stage.replace('/', "_")));
  }
}

impl LogSink for FileSink {
  fn append(&self, stage: &str, text: &str) {
    let path = self.stage_path(stage);
    let res = OpenOptions::new()
      .create(true)
      .append(true)
      .open(&path)
      .and_then(|mut f| f.write_all(text.as_bytes()));
    if let Err(e) = res {
      log::warn!("stage log {} not captured: {}", path.display(), e);
      return;
    }

    let mut stages = self.stages.lock().unwrap();
    if !stages.iter().any(|s| s == stage) {
      stages.push(stage.to_string());
    }
  }

  fn collect(&self) -> String {
    let stages = self.stages.lock().unwrap();
    let mut out = String::new();
    for stage in stages.iter() {
      out.push_str(&format!("=== {} ===\n", stage));
      match fs::read_to_string(self.stage_path(stage)) {
        Ok(text) => out.push_str(&text),
        Err(e) => out.push_str(&format!("(log lost: {})\n", e)),
      }
      if !out.ends_with('\n') {
        out.push('\n');
      }
    }
    return out;
  }
}

/// [`FileSink`] that also mirrors every line to the host log, for running a
/// worker interactively.
pub struct TeeSink {
  file: FileSink,
}

impl TeeSink {
  pub fn new(dir: PathBuf) -> Self {
    return Self {
      file: FileSink::new(dir),
    };
  }
}

impl LogSink for TeeSink {
  fn append(&self, stage: &str, text: &str) {
    for line in text.lines() {
      log::debug!("[{}] {}", stage, line);
    }
    self.file.append(stage, text);
  }

  fn collect(&self) -> String {
    return self.file.collect();
  }
}

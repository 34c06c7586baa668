use std::path::PathBuf;

use thiserror::Error;

/// What one container run produced, as far as the engine exposed it.
#[derive(Debug, Clone, Default)]
pub struct RunOutcome {
  pub exit_code: Option<i64>,

  /// Captured container stdout, capped at the output limit.
  pub stdout: String,

  /// Captured container stderr, capped at the output limit.
  pub stderr: String,

  /// Cpu time in seconds, sampled from engine stats.
  pub cpu_time: Option<f64>,

  /// Peak memory in bytes, sampled from engine stats.
  pub peak_memory: Option<u64>,

  /// Host-side wall clock of the run, in seconds.
  pub wall_time: f64,

  /// The wall clock timeout fired and the container was killed.
  pub timed_out: bool,

  /// The kernel killed the container for exceeding its memory limit.
  pub oom_killed: bool,

  /// Captured output hit the cap and was cut.
  pub output_truncated: bool,
}

impl RunOutcome {
  /// Clean termination: exited zero without hitting any limit.
  pub fn success(&self) -> bool {
    return !self.timed_out && !self.oom_killed && self.exit_code == Some(0);
  }

  /// Cpu time when known, wall clock otherwise.
  pub fn time_secs(&self) -> f64 {
    return self.cpu_time.unwrap_or(self.wall_time);
  }
}

/// Error when the container engine refuses or misbehaves, or when a run
/// request violates the workspace containment invariant.
#[derive(Debug, Error)]
pub enum SandboxError {
  #[error("container engine: {0}")]
  Engine(#[from] bollard::errors::Error),

  #[error("mount `{path}` is outside the submission workspace")]
  MountContainment { path: PathBuf },

  #[error("judge for test {test} exceeded its own resource envelope")]
  JudgeOverrun { test: String },
}

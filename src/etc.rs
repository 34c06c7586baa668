use std::{collections::HashMap, path::PathBuf, time};

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
/// Sterta worker config.
pub struct Cfg {
  /// Base URL of the web UI that queues submissions and stores problems.
  pub gui_url: url::Url,

  /// Queues to poll, in priority order.
  pub queue_names: Vec<String>,

  /// Container image used to run compiled submissions.
  pub exec_image: String,

  /// Container image used to compare produced output against the expected one.
  pub judge_image: String,

  /// Compile image per queue, used when a submission carries no explicit
  /// compiler header.
  pub queue_compiler_map: HashMap<String, String>,

  /// Path to the container engine unix socket.
  pub docker_socket: String,

  /// Host directory under which per-submission workspaces are created.
  pub workspace_root: PathBuf,

  /// Sleep between polls when every queue is empty.
  pub poll_interval: time::Duration,

  pub http_connect_timeout: time::Duration,

  pub http_read_timeout: time::Duration,

  /// Keep workspaces of anomalous submissions under `<workspace_root>/debug`.
  pub debug_mode: bool,

  /// Hard cap on any single downloaded file, in bytes.
  pub max_file_bytes: u64,

  pub limits: LimitsCfg,

  pub report: ReportCfg,
}

impl Default for Cfg {
  // Set default values for config
  fn default() -> Self {
    return Self {
      gui_url: url::Url::parse("http://localhost:8000/").unwrap(),
      queue_names: vec![],
      exec_image: "sterta/exec:latest".to_string(),
      judge_image: "sterta/judge:latest".to_string(),
      queue_compiler_map: HashMap::new(),
      docker_socket: "/var/run/docker.sock".to_string(),
      workspace_root: PathBuf::from("/var/lib/sterta/work"),
      poll_interval: time::Duration::from_secs(1),
      http_connect_timeout: time::Duration::from_secs(5),
      http_read_timeout: time::Duration::from_secs(15),
      debug_mode: false,
      max_file_bytes: 1024 * 1024 * 1024, // 1 GiB
      limits: LimitsCfg::default(),
      report: ReportCfg::default(),
    };
  }
}

/// Default sandbox resource limits.
///
/// Per-test time and memory come from the problem script; everything here is
/// the worker-wide envelope applied on top of it.
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct LimitsCfg {
  /// Wall-clock timeout = cpu limit * factor + overhead, enforced host-side.
  pub wall_clock_factor: f64,

  pub wall_clock_overhead: time::Duration,

  /// Fixed wall-clock timeout for the compile stage.
  pub compile_wall_timeout: time::Duration,

  /// Fixed wall-clock timeout for one judge run.
  pub judge_wall_timeout: time::Duration,

  /// Memory limit for compile and judge containers, in bytes.
  pub service_memory_limit: u64,

  /// Process count limit inside any container.
  pub pids_limit: u64,

  /// Open file descriptor limit inside any container.
  pub open_files_limit: u64,

  /// Largest file a container may create, in bytes.
  pub file_size_limit: u64,

  /// Cap on captured stdout/stderr, in bytes. Exceeding it on the execute
  /// stage is the output-limit-exceeded verdict.
  pub output_limit: u64,
}

impl Default for LimitsCfg {
  fn default() -> Self {
    return Self {
      wall_clock_factor: 2.0,
      wall_clock_overhead: time::Duration::from_secs(1),
      compile_wall_timeout: time::Duration::from_secs(60),
      judge_wall_timeout: time::Duration::from_secs(60),
      service_memory_limit: 1024 * 1024 * 1024, // 1 GiB
      pids_limit: 64,
      open_files_limit: 256,
      file_size_limit: 64 * 1024 * 1024, // 64 MiB
      output_limit: 16 * 1024 * 1024,    // 16 MiB
    };
  }
}

/// Result reporting retry policy.
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct ReportCfg {
  /// Total POST attempts before the result is dropped.
  pub retries: u32,

  /// First retry delay; each further retry doubles it.
  pub backoff_base: time::Duration,
}

impl Default for ReportCfg {
  fn default() -> Self {
    return Self {
      retries: 3,
      backoff_base: time::Duration::from_secs(1),
    };
  }
}

/// Error when the layered config sources cannot be read or deserialized.
#[derive(Debug, Error)]
#[error("config load failed: {0}")]
pub struct LoadError(#[from] config::ConfigError);

impl Cfg {
  /// Create and load the config.
  ///
  /// Sources, later ones overriding earlier ones: `/etc/sterta/worker`,
  /// every file from the `-c` search path, then `STERTA_WORKER_*`
  /// environment variables.
  pub fn load(search_paths: &Vec<String>) -> Result<Self, LoadError> {
    let mut builder = config::Config::builder()
      .add_source(config::File::with_name("/etc/sterta/worker").required(false));

    for p in search_paths {
      builder = builder.add_source(config::File::with_name(p.as_str()).required(false));
    }

    builder = builder.add_source(config::Environment::with_prefix("STERTA_WORKER"));

    return Ok(builder.build()?.try_deserialize::<Self>()?);
  }

  /// Wall-clock timeout for one execute run with the given cpu limit.
  pub fn wall_timeout(&self, cpu_time_limit: f64) -> time::Duration {
    let secs = cpu_time_limit * self.limits.wall_clock_factor
      + self.limits.wall_clock_overhead.as_secs_f64();
    return time::Duration::from_secs_f64(secs);
  }
}

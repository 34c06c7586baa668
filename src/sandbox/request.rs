use std::{path::PathBuf, time};

use bollard::container::Config;
use bollard::models::{HostConfig, ResourcesUlimits};
use serde::{Deserialize, Serialize};

use crate::etc;

/// A single host to container bind mount.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VolumeMapping {
  pub host_path: PathBuf,
  pub container_path: String,
  pub read_only: bool,
}

impl VolumeMapping {
  pub fn ro(host_path: PathBuf, container_path: &str) -> Self {
    return Self {
      host_path,
      container_path: container_path.to_string(),
      read_only: true,
    };
  }

  pub fn rw(host_path: PathBuf, container_path: &str) -> Self {
    return Self {
      host_path,
      container_path: container_path.to_string(),
      read_only: false,
    };
  }

  fn bind(&self) -> String {
    return format!(
      "{}:{}:{}",
      self.host_path.display(),
      self.container_path,
      if self.read_only { "ro" } else { "rw" }
    );
  }
}

/// Engine-neutral resource envelope for one container run.
///
/// Engine-specific knob names stay below this record; nothing above the
/// sandbox module sees them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Limits {
  /// Cpu time limit in seconds, enforced in-container via the cpu ulimit.
  pub cpu_time_limit: f64,

  /// Memory limit in bytes. Swap is pinned to the same value.
  pub memory_limit: u64,

  pub pids_limit: u64,

  pub file_size_limit: u64,

  pub open_files_limit: u64,

  pub stack_size_limit: Option<u64>,

  /// Cap on captured stdout/stderr, in bytes.
  pub output_limit: u64,
}

impl Limits {
  /// Worker-wide envelope from config with the per-run cpu/memory knobs.
  pub fn new(
    l: &etc::LimitsCfg,
    cpu_time_limit: f64,
    memory_limit: u64,
    stack_size_limit: Option<u64>,
  ) -> Self {
    return Self {
      cpu_time_limit,
      memory_limit,
      pids_limit: l.pids_limit,
      file_size_limit: l.file_size_limit,
      open_files_limit: l.open_files_limit,
      stack_size_limit,
      output_limit: l.output_limit,
    };
  }
}

/// Everything needed to run one sandboxed command.
#[derive(Debug, Clone)]
pub struct RunSpec {
  pub image: String,

  /// Command line; `None` runs the image entrypoint, which is the normal
  /// case (the images know how to compile, execute and judge).
  pub command: Option<Vec<String>>,

  /// `NAME=value` pairs.
  pub env: Vec<String>,

  pub mounts: Vec<VolumeMapping>,

  pub limits: Limits,

  /// Host-side wall clock timeout; the container is killed when it fires.
  pub wall_timeout: time::Duration,
}

impl RunSpec {
  /// Translate the neutral records to the engine's creation request.
  /// Network stays disabled unconditionally.
  pub(super) fn container_config(&self) -> Config<String> {
    let l = &self.limits;
    let cpu_secs = self.limits.cpu_time_limit.ceil() as i64;

    let mut ulimits = vec![
      ResourcesUlimits {
        name: Some("nofile".to_string()),
        soft: Some(l.open_files_limit as i64),
        hard: Some(l.open_files_limit as i64),
      },
      ResourcesUlimits {
        name: Some("fsize".to_string()),
        soft: Some(l.file_size_limit as i64),
        hard: Some(l.file_size_limit as i64),
      },
      // Hard limit one second above soft so the process gets a SIGXCPU
      // before the hard kill.
      ResourcesUlimits {
        name: Some("cpu".to_string()),
        soft: Some(cpu_secs),
        hard: Some(cpu_secs + 1),
      },
    ];
    if let Some(stack) = l.stack_size_limit {
      ulimits.push(ResourcesUlimits {
        name: Some("stack".to_string()),
        soft: Some(stack as i64),
        hard: Some(stack as i64),
      });
    }

    return Config {
      image: Some(self.image.clone()),
      cmd: self.command.clone(),
      env: Some(self.env.clone()),
      network_disabled: Some(true),
      host_config: Some(HostConfig {
        binds: Some(self.mounts.iter().map(VolumeMapping::bind).collect()),
        memory: Some(l.memory_limit as i64),
        memory_swap: Some(l.memory_limit as i64),
        pids_limit: Some(l.pids_limit as i64),
        ulimits: Some(ulimits),
        network_mode: Some("none".to_string()),
        ..Default::default()
      }),
      ..Default::default()
    };
  }
}

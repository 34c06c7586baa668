use std::{
  path::Path,
  sync::{Arc, Mutex},
  time,
};

use bollard::container::{
  CreateContainerOptions, KillContainerOptions, LogOutput, LogsOptions, RemoveContainerOptions,
  StartContainerOptions, StatsOptions, WaitContainerOptions,
};
use bollard::{errors::Error as EngineError, Docker, API_DEFAULT_VERSION};
use futures_util::StreamExt;

use super::{RunOutcome, RunSpec, SandboxError};

/// Grace period for a killed container to actually die before logs are read.
const KILL_DRAIN: time::Duration = time::Duration::from_secs(5);

/// Container engine wrapper. Every stage of every submission goes through
/// [`Engine::run`].
#[derive(Clone)]
pub struct Engine {
  docker: Docker,
}

/// Peak values sampled from the engine's stats stream while a container runs.
#[derive(Debug, Default, Clone, Copy)]
struct Sampled {
  peak_memory: Option<u64>,
  cpu_time: Option<f64>,
}

impl Engine {
  /// Connect to the engine daemon over its unix socket.
  ///
  /// # Errors
  ///
  /// This function will return an error if the socket address is malformed;
  /// reachability is only established by [`Engine::ping`].
  pub fn connect(socket: &str) -> Result<Self, SandboxError> {
    return Ok(Self {
      docker: Docker::connect_with_unix(socket, 120, API_DEFAULT_VERSION)?,
    });
  }

  /// Startup reachability check.
  pub async fn ping(&self) -> Result<(), SandboxError> {
    self.docker.ping().await?;
    return Ok(());
  }

  /// Run one sandboxed command to completion and return what it produced.
  ///
  /// The container is created with the requested limits, awaited under the
  /// requested wall clock timeout (SIGKILL on expiry) and removed on every
  /// exit path, error paths included.
  ///
  /// # Errors
  ///
  /// This function will return an error if a mount escapes `scope` or the
  /// engine refuses any step of the lifecycle.
  pub async fn run(&self, spec: &RunSpec, scope: &Path) -> Result<RunOutcome, SandboxError> {
    for mount in &spec.mounts {
      ensure_scoped(&mount.host_path, scope)?;
    }

    let name = format!("sterta-run-{}", uuid::Uuid::new_v4());
    let created = self
      .docker
      .create_container(
        Some(CreateContainerOptions {
          name: name.as_str(),
          platform: None,
        }),
        spec.container_config(),
      )
      .await?;

    let guard = ContainerGuard::new(self.docker.clone(), created.id.clone());
    let outcome = self.drive(&created.id, spec).await;
    guard.finish().await;
    return outcome;
  }

  async fn drive(&self, id: &str, spec: &RunSpec) -> Result<RunOutcome, SandboxError> {
    self
      .docker
      .start_container(id, None::<StartContainerOptions<String>>)
      .await?;
    let started = time::Instant::now();

    let sampled = Arc::new(Mutex::new(Sampled::default()));
    let sampler = tokio::spawn(sample_stats(
      self.docker.clone(),
      id.to_string(),
      sampled.clone(),
    ));

    let mut wait = self
      .docker
      .wait_container(id, None::<WaitContainerOptions<String>>);
    let timed_out = match tokio::time::timeout(spec.wall_timeout, wait.next()).await {
      Ok(Some(Ok(_))) => false,
      // The engine reports a non-zero exit through the wait stream as an
      // error item; the exit code itself comes from inspect below.
      Ok(Some(Err(EngineError::DockerContainerWaitError { .. }))) => false,
      Ok(Some(Err(e))) => return Err(e.into()),
      Ok(None) => false,
      Err(_) => {
        // The container may exit on its own between the timeout firing and
        // the kill landing; that race is not an engine failure.
        if let Err(e) = self
          .docker
          .kill_container(id, Some(KillContainerOptions { signal: "SIGKILL" }))
          .await
        {
          log::warn!("kill of timed out container {} failed: {}", id, e);
        }
        let _ = tokio::time::timeout(KILL_DRAIN, wait.next()).await;
        true
      }
    };
    let wall_time = started.elapsed().as_secs_f64();

    sampler.abort();
    let sampled = *sampled.lock().unwrap();

    let (stdout, stderr, output_truncated) =
      self.capture_logs(id, spec.limits.output_limit).await?;

    let state = self
      .docker
      .inspect_container(id, None)
      .await?
      .state
      .unwrap_or_default();

    return Ok(RunOutcome {
      exit_code: state.exit_code,
      stdout,
      stderr,
      cpu_time: sampled.cpu_time,
      peak_memory: sampled.peak_memory,
      wall_time,
      timed_out,
      oom_killed: state.oom_killed.unwrap_or(false),
      output_truncated,
    });
  }

  /// Read back the container's stdout and stderr, split, capped at `cap`
  /// bytes each.
  async fn capture_logs(
    &self,
    id: &str,
    cap: u64,
  ) -> Result<(String, String, bool), SandboxError> {
    let mut stream = self.docker.logs(
      id,
      Some(LogsOptions::<String> {
        stdout: true,
        stderr: true,
        follow: false,
        ..Default::default()
      }),
    );

    let mut out: Vec<u8> = vec![];
    let mut err: Vec<u8> = vec![];
    let mut truncated = false;

    while let Some(item) = stream.next().await {
      let (buf, message) = match item? {
        LogOutput::StdOut { message } => (&mut out, message),
        LogOutput::StdErr { message } => (&mut err, message),
        _ => continue,
      };
      let room = (cap as usize).saturating_sub(buf.len());
      if message.len() > room {
        buf.extend_from_slice(&message[..room]);
        truncated = true;
        break;
      }
      buf.extend_from_slice(&message);
    }

    return Ok((
      String::from_utf8_lossy(&out).into_owned(),
      String::from_utf8_lossy(&err).into_owned(),
      truncated,
    ));
  }
}

/// Follow the stats stream while the container runs, tracking peak memory
/// and total cpu time. The stream ends by itself when the container stops.
async fn sample_stats(docker: Docker, id: String, sampled: Arc<Mutex<Sampled>>) {
  let mut stream = docker.stats(
    &id,
    Some(StatsOptions {
      stream: true,
      one_shot: false,
    }),
  );

  while let Some(Ok(stats)) = stream.next().await {
    let mut s = sampled.lock().unwrap();
    if let Some(usage) = stats.memory_stats.max_usage.or(stats.memory_stats.usage) {
      s.peak_memory = Some(s.peak_memory.map_or(usage, |m| m.max(usage)));
    }
    let cpu_ns = stats.cpu_stats.cpu_usage.total_usage;
    if cpu_ns > 0 {
      s.cpu_time = Some(cpu_ns as f64 / 1e9);
    }
  }
}

fn ensure_scoped(host_path: &Path, scope: &Path) -> Result<(), SandboxError> {
  let containment = || SandboxError::MountContainment {
    path: host_path.to_path_buf(),
  };
  let real = host_path.canonicalize().map_err(|_| containment())?;
  let real_scope = scope.canonicalize().map_err(|_| containment())?;
  if !real.starts_with(&real_scope) {
    return Err(containment());
  }
  return Ok(());
}

/// Removal guard for one container.
///
/// The normal path removes explicitly through [`ContainerGuard::finish`];
/// if the run errors or panics first, `Drop` schedules the same removal so
/// no container outlives its submission.
struct ContainerGuard {
  docker: Docker,
  id: String,
  armed: bool,
}

impl ContainerGuard {
  fn new(docker: Docker, id: String) -> Self {
    return Self {
      docker,
      id,
      armed: true,
    };
  }

  async fn finish(mut self) {
    self.armed = false;
    remove_container(&self.docker, &self.id).await;
  }
}

impl Drop for ContainerGuard {
  fn drop(&mut self) {
    if self.armed {
      let docker = self.docker.clone();
      let id = self.id.clone();
      tokio::spawn(async move { remove_container(&docker, &id).await });
    }
  }
}

async fn remove_container(docker: &Docker, id: &str) {
  let res = docker
    .remove_container(
      id,
      Some(RemoveContainerOptions {
        force: true,
        v: true,
        ..Default::default()
      }),
    )
    .await;
  if let Err(e) = res {
    log::warn!("container {} not removed: {}", id, e);
  }
}

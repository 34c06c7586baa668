use std::{fs, io, path::Path, time};

use crate::{
  client::{self, PollResult, UiClient},
  error::SubmissionError,
  etc, report,
  result::SubmissionResult,
  script::{self, ProblemSpec},
  workspace::{FilesystemError, Workspace},
};

/// One job, as far as the queue headers describe it. The problem itself is
/// fetched separately.
#[derive(Debug)]
pub struct Submission {
  pub id: String,

  /// Image used for the compile stage of this submission's language.
  pub comp_image: String,

  /// Entry point filename, for languages that need one.
  pub mainfile: Option<String>,

  pub submitted_by: Option<String>,

  pub problem_id: String,
}

/// Orchestrates the UI client against a workspace: pull work, pull the
/// problem, push the verdict.
pub struct Adapter<'a> {
  ui: &'a UiClient,
  cfg: &'a etc::Cfg,
}

impl<'a> Adapter<'a> {
  pub fn new(ui: &'a UiClient, cfg: &'a etc::Cfg) -> Self {
    return Self { ui, cfg };
  }

  /// Poll the configured queues in order; on the first hit, unpack the
  /// archive into `submission/` and return the job shell.
  ///
  /// A transport failure on one queue only skips that queue for this round;
  /// the UI may simply be restarting.
  pub async fn fetch_submission(
    &self,
    ws: &Workspace,
  ) -> Result<Option<Submission>, SubmissionError> {
    let archive = ws.path().join("submission.zip");

    for queue in &self.cfg.queue_names {
      let hit = match self.ui.poll_queue(queue, &archive).await {
        Ok(PollResult::Empty) => continue,
        Ok(PollResult::Hit(hit)) => hit,
        Err(client::ClientError::Transport(e)) => {
          log::warn!("queue {}: {}", queue, e);
          continue;
        }
        Err(e) => return Err(e.into()),
      };

      log::info!(
        "submission {} from queue {} (problem {}, student {})",
        hit.submission_id,
        queue,
        hit.problem_id,
        hit.student_id.as_deref().unwrap_or("-")
      );

      let comp_image = hit
        .comp_image
        .clone()
        .or_else(|| self.cfg.queue_compiler_map.get(queue).cloned())
        .ok_or_else(|| client::ProtocolError::NoCompiler {
          queue: queue.clone(),
        })?;

      let arch = hit.archive_path.clone();
      let dest = ws.submission_dir();
      tokio::task::spawn_blocking(move || unpack_archive(&arch, &dest))
        .await
        .map_err(|e| FilesystemError::Io {
          path: ws.submission_dir(),
          source: io::Error::new(io::ErrorKind::Other, e),
        })??;

      return Ok(Some(Submission {
        id: hit.submission_id,
        comp_image,
        mainfile: hit.mainfile,
        submitted_by: hit.student_id,
        problem_id: hit.problem_id,
      }));
    }

    return Ok(None);
  }

  /// Download the problem package and parse its script.
  ///
  /// Test data (`*.in`/`*.out`) lands in `problem/`, everything else in
  /// `lib/`; the auxiliary files the script declares are then staged next to
  /// the student sources so the compiler sees them.
  pub async fn fetch_problem(
    &self,
    problem_id: &str,
    ws: &Workspace,
  ) -> Result<ProblemSpec, SubmissionError> {
    let names = self.ui.list_problem_files(problem_id).await?;

    for name in &names {
      let base = if name.ends_with(".in") || name.ends_with(".out") {
        ws.problem_dir()
      } else {
        ws.lib_dir()
      };
      let dest = ws.contained_join(&base, name)?;
      if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent).map_err(|source| FilesystemError::Io {
          path: parent.to_path_buf(),
          source,
        })?;
      }
      self.ui.get_problem_file(problem_id, name, &dest).await?;
    }

    if !names.iter().any(|n| n == "script.txt") {
      return Err(
        client::ProtocolError::MissingProblemFile {
          name: "script.txt".to_string(),
        }
        .into(),
      );
    }
    let script_path = ws.lib_dir().join("script.txt");
    let text = fs::read_to_string(&script_path).map_err(|source| FilesystemError::Io {
      path: script_path,
      source,
    })?;
    let spec = script::parse_script(&text, problem_id)?;

    for aux in spec.aux_files() {
      let src = ws.contained_join(&ws.lib_dir(), aux)?;
      if !src.is_file() {
        return Err(
          client::ProtocolError::MissingProblemFile { name: aux.clone() }.into(),
        );
      }
      let dst = ws.contained_join(&ws.submission_dir(), aux)?;
      fs::copy(&src, &dst).map_err(|source| FilesystemError::Io {
        path: dst.clone(),
        source,
      })?;
    }

    return Ok(spec);
  }

  /// Format and POST the verdict, retrying transport failures with
  /// exponential backoff. After the attempts are exhausted the result is
  /// logged and dropped; the UI re-queues stale submissions on its own.
  pub async fn report_result(&self, submission_id: &str, result: &SubmissionResult) {
    let payload = report::render(result);
    let r = &self.cfg.report;
    let attempts = r.retries.max(1);

    for attempt in 0..attempts {
      match self.ui.post_result(submission_id, &payload).await {
        Ok(body) => {
          log::info!(
            "result for {} accepted ({} points): {}",
            submission_id,
            result.points,
            body.trim()
          );
          return;
        }
        Err(e) => {
          log::warn!(
            "result post {}/{} for {} failed: {}",
            attempt + 1,
            attempts,
            submission_id,
            e
          );
          if attempt + 1 < attempts {
            tokio::time::sleep(backoff_delay(r.backoff_base, attempt)).await;
          }
        }
      }
    }

    log::error!(
      "result for {} dropped after {} attempts",
      submission_id,
      attempts
    );
  }
}

/// Delay before the retry following attempt number `attempt` (0-based):
/// base, 2x base, 4x base...
pub fn backoff_delay(base: time::Duration, attempt: u32) -> time::Duration {
  return base * (1u32 << attempt.min(16));
}

/// Extract the submission archive, validating every entry path instead of
/// trusting the archive.
pub(crate) fn unpack_archive(archive: &Path, dest: &Path) -> Result<(), SubmissionError> {
  let io_err = |path: &Path| {
    let path = path.to_path_buf();
    move |source| FilesystemError::Io { path, source }
  };

  let file = fs::File::open(archive).map_err(io_err(archive))?;
  let mut zip = zip::ZipArchive::new(file)
    .map_err(|e| client::ProtocolError::BadArchive(e.to_string()))?;

  for i in 0..zip.len() {
    let mut entry = zip
      .by_index(i)
      .map_err(|e| client::ProtocolError::BadArchive(e.to_string()))?;
    let rel = entry
      .enclosed_name()
      .map(Path::to_path_buf)
      .ok_or_else(|| client::ProtocolError::BadArchive(format!("unsafe path `{}`", entry.name())))?;
    let out = dest.join(rel);

    if entry.is_dir() {
      fs::create_dir_all(&out).map_err(io_err(&out))?;
      continue;
    }
    if let Some(parent) = out.parent() {
      fs::create_dir_all(parent).map_err(io_err(parent))?;
    }
    let mut target = fs::File::create(&out).map_err(io_err(&out))?;
    io::copy(&mut entry, &mut target).map_err(io_err(&out))?;
  }

  return Ok(());
}

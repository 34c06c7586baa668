use std::{fs, io::Write, path::Path};

use tokio::sync::watch;

use crate::{
  adapter::Submission,
  error::SubmissionError,
  etc,
  logsink::LogSink,
  result::{self, SubmissionResult, TestResult, Verdict},
  sandbox::{Engine, Limits, RunOutcome, RunSpec, VolumeMapping},
  script::{ProblemSpec, TestSpec},
  workspace::{FilesystemError, Workspace},
};

/// Container-side mount points. The images are built against these paths.
const BOX_SUBMISSION: &str = "/box/submission";
const BOX_LIB: &str = "/box/lib";
const BOX_BUILD: &str = "/box/build";
const BOX_RUN: &str = "/box/run";

/// The submission pipeline: compile once, then execute and judge each test
/// in problem order, then aggregate.
pub struct Evaluator<'a> {
  engine: &'a Engine,
  cfg: &'a etc::Cfg,
  sink: &'a dyn LogSink,
  shutdown: watch::Receiver<bool>,
}

struct CompileFailure {
  info: String,
}

impl<'a> Evaluator<'a> {
  pub fn new(
    engine: &'a Engine,
    cfg: &'a etc::Cfg,
    sink: &'a dyn LogSink,
    shutdown: watch::Receiver<bool>,
  ) -> Self {
    return Self {
      engine,
      cfg,
      sink,
      shutdown,
    };
  }

  /// Run the whole pipeline for one prepared submission. Never fails: every
  /// failure mode is folded into the returned result.
  pub async fn run(
    &self,
    ws: &Workspace,
    sub: &Submission,
    problem: &ProblemSpec,
  ) -> SubmissionResult {
    let compile_info = match self.compile(ws, sub, problem).await {
      Ok(info) => info,
      Err(failure) => {
        return SubmissionResult::all_failed(
          &problem.test_names(),
          Verdict::CompileError,
          Some(failure.info),
          Some(self.sink.collect()),
        );
      }
    };

    let mut test_results = Vec::with_capacity(problem.tests.len());
    for test in &problem.tests {
      if *self.shutdown.borrow() {
        log::warn!("shutdown requested, stopping evaluation before test {}", test.test_name);
        break;
      }
      test_results.push(self.run_test(ws, sub, test).await);
    }

    return SubmissionResult::new(
      test_results,
      Some(compile_info),
      Some(self.sink.collect()),
    );
  }

  /// Stage 1. The compile image's entrypoint compiles whatever it finds in
  /// the submission mount into the build mount.
  async fn compile(
    &self,
    ws: &Workspace,
    sub: &Submission,
    problem: &ProblemSpec,
  ) -> Result<String, CompileFailure> {
    let l = &self.cfg.limits;
    let spec = RunSpec {
      image: sub.comp_image.clone(),
      command: None,
      env: stage_env(sub, Some(problem), None),
      mounts: vec![
        VolumeMapping::ro(ws.submission_dir(), BOX_SUBMISSION),
        VolumeMapping::ro(ws.lib_dir(), BOX_LIB),
        VolumeMapping::rw(ws.build_dir(), BOX_BUILD),
      ],
      limits: Limits::new(
        l,
        l.compile_wall_timeout.as_secs_f64(),
        l.service_memory_limit,
        None,
      ),
      wall_timeout: l.compile_wall_timeout,
    };

    let outcome = match self.engine.run(&spec, ws.path()).await {
      Ok(outcome) => outcome,
      Err(e) => {
        let info = format!("compilation could not be run: {}", e);
        self.sink.append("compile", &format!("{}\n", info));
        log::error!("submission {}: {}", sub.id, info);
        return Err(CompileFailure { info });
      }
    };

    self.sink.append("compile", &outcome.stdout);
    self.sink.append("compile", &outcome.stderr);
    let info = result::limit_message(&join_output(&outcome));

    if !outcome.success() || !has_artifact(&ws.build_dir()) {
      return Err(CompileFailure { info });
    }
    return Ok(info);
  }

  /// Stages 2 and 3 for one test. Sandbox and staging failures become the
  /// SE verdict for this test only.
  async fn run_test(&self, ws: &Workspace, sub: &Submission, test: &TestSpec) -> TestResult {
    return match self.execute_and_judge(ws, sub, test).await {
      Ok(result) => result,
      Err(e) => {
        let stage = format!("execute:{}", test.test_name);
        self.sink.append(&stage, &format!("test aborted: {}\n", e));
        log::error!("submission {} test {}: {}", sub.id, test.test_name, e);
        TestResult::failed(&test.test_name, Verdict::SandboxError)
      }
    };
  }

  async fn execute_and_judge(
    &self,
    ws: &Workspace,
    sub: &Submission,
    test: &TestSpec,
  ) -> Result<TestResult, SubmissionError> {
    let run_dir = ws.run_dir(&test.test_name)?;
    let input = ws.contained_join(&ws.problem_dir(), &format!("{}.in", test.test_name))?;
    copy_staged(&input, &run_dir.join("stdin"))?;

    let spec = RunSpec {
      image: self.cfg.exec_image.clone(),
      command: None,
      env: stage_env(sub, None, Some(&test.test_name)),
      mounts: vec![
        VolumeMapping::ro(ws.build_dir(), BOX_BUILD),
        VolumeMapping::rw(run_dir.clone(), BOX_RUN),
      ],
      limits: Limits::new(
        &self.cfg.limits,
        test.time_limit,
        test.total_memory_limit,
        test.stack_size_limit,
      ),
      wall_timeout: self.cfg.wall_timeout(test.time_limit),
    };

    let outcome = self.engine.run(&spec, ws.path()).await?;
    let stage = format!("execute:{}", test.test_name);
    self.sink.append(&stage, &outcome.stdout);
    self.sink.append(&stage, &outcome.stderr);

    let produced = run_dir.join("stdout");
    let produced_bytes = fs::metadata(&produced).map(|m| m.len()).ok();
    let verdict = classify_execution(&outcome, produced_bytes, &spec.limits);

    let mut result = TestResult {
      test_name: test.test_name.clone(),
      grade: false,
      ret_code: outcome.exit_code,
      time: Some(outcome.time_secs()),
      memory: outcome.peak_memory.map(|m| m as f64),
      info: Some(verdict.to_string()),
    };
    if !verdict.is_ok() {
      return Ok(result);
    }

    let accepted = self.judge(ws, test, &run_dir).await?;
    result.grade = accepted;
    result.info = if accepted {
      None
    } else {
      Some(Verdict::WrongAnswer.to_string())
    };
    return Ok(result);
  }

  /// Stage 3. The judge image reads `stdin`, `stdout`, `expected` and
  /// `judge.cfg` from its run mount and exits zero to accept.
  async fn judge(
    &self,
    ws: &Workspace,
    test: &TestSpec,
    run_dir: &Path,
  ) -> Result<bool, SubmissionError> {
    let expected = ws.contained_join(&ws.problem_dir(), &format!("{}.out", test.test_name))?;
    copy_staged(&expected, &run_dir.join("expected"))?;
    write_judge_cfg(test, &run_dir.join("judge.cfg"))?;

    let l = &self.cfg.limits;
    let spec = RunSpec {
      image: self.cfg.judge_image.clone(),
      command: None,
      env: vec![format!("TEST_NAME={}", test.test_name)],
      mounts: vec![VolumeMapping::ro(run_dir.to_path_buf(), BOX_RUN)],
      limits: Limits::new(
        l,
        l.judge_wall_timeout.as_secs_f64(),
        l.service_memory_limit,
        None,
      ),
      wall_timeout: l.judge_wall_timeout,
    };

    let outcome = self.engine.run(&spec, ws.path()).await?;
    let stage = format!("judge:{}", test.test_name);
    self.sink.append(&stage, &outcome.stdout);
    self.sink.append(&stage, &outcome.stderr);

    if outcome.timed_out || outcome.oom_killed {
      // The judge ran out of its own envelope; that is an infrastructure
      // fault, not a wrong answer.
      return Err(
        crate::sandbox::SandboxError::JudgeOverrun {
          test: test.test_name.clone(),
        }
        .into(),
      );
    }
    return Ok(outcome.exit_code == Some(0));
  }
}

/// Preliminary verdict of the execute stage, before any judging.
pub fn classify_execution(
  outcome: &RunOutcome,
  produced_bytes: Option<u64>,
  limits: &Limits,
) -> Verdict {
  // A run killed by the in-container cpu ulimit does not trip the wall
  // clock; the sampled cpu time catches it.
  if outcome.timed_out
    || outcome
      .cpu_time
      .map_or(false, |t| t > limits.cpu_time_limit)
  {
    return Verdict::TimeLimitExceeded;
  }
  if outcome.oom_killed
    || outcome
      .peak_memory
      .map_or(false, |peak| peak > limits.memory_limit)
  {
    return Verdict::MemoryLimitExceeded;
  }
  if outcome.output_truncated
    || produced_bytes.map_or(false, |bytes| bytes > limits.output_limit)
  {
    return Verdict::OutputLimitExceeded;
  }
  return match outcome.exit_code {
    Some(0) => Verdict::Ok,
    _ => Verdict::RuntimeError,
  };
}

fn stage_env(
  sub: &Submission,
  problem: Option<&ProblemSpec>,
  test_name: Option<&str>,
) -> Vec<String> {
  let mut env = vec![];
  if let Some(mainfile) = &sub.mainfile {
    env.push(format!("MAINFILE={}", mainfile));
  }
  if let Some(problem) = problem.filter(|p| !p.compile_directives.is_empty()) {
    let joined: Vec<String> = problem
      .compile_directives
      .iter()
      .map(|d| d.join(" "))
      .collect();
    env.push(format!("COMPILE_DIRECTIVES={}", joined.join(";")));
  }
  if let Some(name) = test_name {
    env.push(format!("TEST_NAME={}", name));
  }
  return env;
}

fn join_output(outcome: &RunOutcome) -> String {
  let mut text = outcome.stdout.clone();
  if !outcome.stderr.is_empty() {
    if !text.is_empty() && !text.ends_with('\n') {
      text.push('\n');
    }
    text.push_str(&outcome.stderr);
  }
  return text;
}

/// The compile stage must leave at least one artifact behind.
fn has_artifact(build_dir: &Path) -> bool {
  return fs::read_dir(build_dir)
    .map(|mut entries| entries.next().is_some())
    .unwrap_or(false);
}

fn copy_staged(src: &Path, dst: &Path) -> Result<(), FilesystemError> {
  fs::copy(src, dst)
    .map(|_| ())
    .map_err(|source| FilesystemError::Io {
      path: src.to_path_buf(),
      source,
    })
}

/// `judge.cfg`: the judge kind mnemonic on the first line, then the raw
/// script arguments one per line. Opaque to the worker.
fn write_judge_cfg(test: &TestSpec, path: &Path) -> Result<(), FilesystemError> {
  let io_err = |source| FilesystemError::Io {
    path: path.to_path_buf(),
    source,
  };
  let mut f = fs::File::create(path).map_err(io_err)?;
  writeln!(f, "{}", test.judge.kind).map_err(io_err)?;
  for arg in &test.judge.args {
    writeln!(f, "{}", arg).map_err(io_err)?;
  }
  return Ok(());
}

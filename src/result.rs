use serde::{Deserialize, Serialize};
use strum::Display;

/// Verdict classifier for a single test, in the exact spelling the UI shows.
#[derive(Debug, PartialEq, Eq, Clone, Copy, strum::EnumString, Display, Serialize, Deserialize)]
pub enum Verdict {
  #[strum(serialize = "OK")]
  Ok,
  #[strum(serialize = "CE")]
  CompileError,
  #[strum(serialize = "WA")]
  WrongAnswer,
  #[strum(serialize = "TLE")]
  TimeLimitExceeded,
  #[strum(serialize = "MLE")]
  MemoryLimitExceeded,
  #[strum(serialize = "RE")]
  RuntimeError,
  #[strum(serialize = "SE")]
  SandboxError,
  #[strum(serialize = "OLE")]
  OutputLimitExceeded,
}

impl Verdict {
  pub fn is_ok(&self) -> bool {
    return *self == Verdict::Ok;
  }
}

/// Outcome of one test case.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestResult {
  pub test_name: String,

  /// Pass / fail.
  pub grade: bool,

  pub ret_code: Option<i64>,

  /// Cpu time in seconds, when the engine exposed it.
  pub time: Option<f64>,

  /// Peak memory in bytes, when the engine exposed it.
  pub memory: Option<f64>,

  /// Verdict classifier plus an optional diagnostic. Always present when
  /// `grade` is false.
  pub info: Option<String>,
}

impl TestResult {
  /// A failing result carrying only its classifier.
  pub fn failed(test_name: &str, verdict: Verdict) -> Self {
    return Self {
      test_name: test_name.to_string(),
      grade: false,
      ret_code: None,
      time: None,
      memory: None,
      info: Some(verdict.to_string()),
    };
  }
}

/// Aggregate of one submission's run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmissionResult {
  /// Count of passed tests.
  pub points: u32,

  /// Typically the compiler output summary, or the failure diagnostic when
  /// the pipeline could not run.
  pub info: Option<String>,

  /// Concatenated stage logs.
  pub debug: Option<String>,

  /// One entry per test, in problem order.
  pub test_results: Vec<TestResult>,
}

impl SubmissionResult {
  pub fn new(
    test_results: Vec<TestResult>,
    info: Option<String>,
    debug: Option<String>,
  ) -> Self {
    let points = test_results.iter().filter(|t| t.grade).count() as u32;
    return Self {
      points,
      info,
      debug,
      test_results,
    };
  }

  /// A zero-point result describing a submission that failed before any test
  /// could run. Every test of the problem is marked with `verdict`.
  pub fn all_failed(
    test_names: &[String],
    verdict: Verdict,
    info: Option<String>,
    debug: Option<String>,
  ) -> Self {
    return Self::new(
      test_names
        .iter()
        .map(|name| TestResult::failed(name, verdict))
        .collect(),
      info,
      debug,
    );
  }

  /// Percentage score shown by the UI: `100 * passed / total`, 0 for an
  /// empty test list.
  pub fn score_percent(&self) -> f64 {
    if self.test_results.is_empty() {
      return 0.;
    }
    return 100. * self.points as f64 / self.test_results.len() as f64;
  }

  /// True when something went wrong on the worker side rather than in the
  /// student code. Used to decide whether a workspace is worth archiving.
  ///
  /// An empty test list means the pipeline failed before any test could
  /// produce a result, which is just as much a worker-side problem as a
  /// sandbox error on one test.
  pub fn anomalous(&self) -> bool {
    return self.test_results.is_empty()
      || self
        .test_results
        .iter()
        .any(|t| t.info.as_deref() == Some("SE"));
  }
}

const MESSAGE_LIMIT: usize = 4096;

/// Cap a diagnostic message to a size the UI can comfortably store,
/// keeping the head and marking the cut.
pub fn limit_message(s: &str) -> String {
  if s.len() <= MESSAGE_LIMIT {
    return s.to_string();
  }
  let mut end = MESSAGE_LIMIT;
  while !s.is_char_boundary(end) {
    end -= 1;
  }
  return format!("{}\n... ({} bytes omitted)", &s[..end], s.len() - end);
}

use std::str::FromStr;

use crate::result::{self, SubmissionResult, TestResult, Verdict};

#[test]
fn test_verdict_spelling() {
  assert_eq!(Verdict::Ok.to_string(), "OK");
  assert_eq!(Verdict::CompileError.to_string(), "CE");
  assert_eq!(Verdict::WrongAnswer.to_string(), "WA");
  assert_eq!(Verdict::TimeLimitExceeded.to_string(), "TLE");
  assert_eq!(Verdict::MemoryLimitExceeded.to_string(), "MLE");
  assert_eq!(Verdict::RuntimeError.to_string(), "RE");
  assert_eq!(Verdict::SandboxError.to_string(), "SE");
  assert_eq!(Verdict::OutputLimitExceeded.to_string(), "OLE");

  assert_eq!(Verdict::from_str("TLE").unwrap(), Verdict::TimeLimitExceeded);
  assert!(Verdict::from_str("NOPE").is_err());
}

#[test]
fn test_failed_result_carries_classifier() {
  let t = TestResult::failed("3", Verdict::MemoryLimitExceeded);
  assert!(!t.grade);
  assert_eq!(t.info.as_deref(), Some("MLE"));
}

#[test]
fn test_points_count_passed_tests() {
  let res = SubmissionResult::new(
    vec![
      TestResult::failed("1", Verdict::WrongAnswer),
      TestResult {
        test_name: "2".to_string(),
        grade: true,
        ret_code: Some(0),
        time: None,
        memory: None,
        info: None,
      },
      TestResult::failed("3", Verdict::RuntimeError),
    ],
    None,
    None,
  );
  assert_eq!(res.points, 1);
  assert_eq!(res.test_results.len(), 3);
}

#[test]
fn test_all_failed_marks_every_test() {
  let names = vec!["1".to_string(), "2".to_string(), "3".to_string()];
  let res = SubmissionResult::all_failed(
    &names,
    Verdict::CompileError,
    Some("foo.c:1: error".to_string()),
    None,
  );
  assert_eq!(res.points, 0);
  assert_eq!(res.test_results.len(), 3);
  assert!(res
    .test_results
    .iter()
    .all(|t| t.info.as_deref() == Some("CE")));
}

#[test]
fn test_anomalous_on_sandbox_error() {
  let ok = SubmissionResult::new(vec![TestResult::failed("1", Verdict::WrongAnswer)], None, None);
  assert!(!ok.anomalous());

  let bad = SubmissionResult::new(vec![TestResult::failed("1", Verdict::SandboxError)], None, None);
  assert!(bad.anomalous());
}

#[test]
fn test_anomalous_when_no_result_was_produced() {
  // The pipeline died before running any test (problem fetch or script
  // parse failed); the workspace is worth keeping.
  let dead = SubmissionResult::new(
    vec![],
    Some("submission could not be evaluated: script error".to_string()),
    None,
  );
  assert!(dead.anomalous());
}

#[test]
fn test_limit_message_caps_long_output() {
  let long = "x".repeat(10_000);
  let capped = result::limit_message(&long);
  assert!(capped.len() < 5_000);
  assert!(capped.contains("bytes omitted"));

  let short = "all good";
  assert_eq!(result::limit_message(short), short);
}

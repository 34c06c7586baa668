use crate::{
  etc,
  evaluate::classify_execution,
  result::Verdict,
  sandbox::{Limits, RunOutcome},
};

fn limits() -> Limits {
  return Limits::new(&etc::LimitsCfg::default(), 1.0, 64 * 1024 * 1024, None);
}

fn clean_exit() -> RunOutcome {
  return RunOutcome {
    exit_code: Some(0),
    wall_time: 0.2,
    ..Default::default()
  };
}

#[test]
fn test_classify_ok() {
  assert_eq!(
    classify_execution(&clean_exit(), Some(100), &limits()),
    Verdict::Ok
  );
}

#[test]
fn test_classify_wall_timeout() {
  let outcome = RunOutcome {
    timed_out: true,
    exit_code: Some(137),
    ..Default::default()
  };
  assert_eq!(classify_execution(&outcome, None, &limits()), Verdict::TimeLimitExceeded);
}

#[test]
fn test_classify_cpu_overrun() {
  // Killed by the cpu ulimit: the wall clock never fired, but the sampled
  // cpu time is over the limit.
  let outcome = RunOutcome {
    exit_code: Some(137),
    cpu_time: Some(1.4),
    ..Default::default()
  };
  assert_eq!(classify_execution(&outcome, None, &limits()), Verdict::TimeLimitExceeded);
}

#[test]
fn test_classify_oom() {
  let outcome = RunOutcome {
    oom_killed: true,
    exit_code: Some(137),
    ..Default::default()
  };
  assert_eq!(
    classify_execution(&outcome, None, &limits()),
    Verdict::MemoryLimitExceeded
  );
}

#[test]
fn test_classify_peak_over_limit() {
  let outcome = RunOutcome {
    exit_code: Some(0),
    peak_memory: Some(65 * 1024 * 1024),
    ..Default::default()
  };
  assert_eq!(
    classify_execution(&outcome, None, &limits()),
    Verdict::MemoryLimitExceeded
  );
}

#[test]
fn test_classify_output_limit() {
  let l = limits();

  let truncated = RunOutcome {
    exit_code: Some(0),
    output_truncated: true,
    ..Default::default()
  };
  assert_eq!(
    classify_execution(&truncated, None, &l),
    Verdict::OutputLimitExceeded
  );

  assert_eq!(
    classify_execution(&clean_exit(), Some(l.output_limit + 1), &l),
    Verdict::OutputLimitExceeded
  );
  // Exactly at the cap is fine.
  assert_eq!(
    classify_execution(&clean_exit(), Some(l.output_limit), &l),
    Verdict::Ok
  );
}

#[test]
fn test_classify_runtime_error() {
  let outcome = RunOutcome {
    exit_code: Some(11),
    ..Default::default()
  };
  assert_eq!(classify_execution(&outcome, None, &limits()), Verdict::RuntimeError);
}

use crate::{
  report,
  result::{SubmissionResult, TestResult, Verdict},
};

fn passed(name: &str) -> TestResult {
  return TestResult {
    test_name: name.to_string(),
    grade: true,
    ret_code: Some(0),
    time: Some(0.12),
    memory: Some(12.0 * 1024. * 1024.),
    info: None,
  };
}

#[test]
fn test_result_payload_all_passed() {
  let res = SubmissionResult::new(vec![passed("1"), passed("2")], None, None);

  assert_eq!(res.points, 2);
  assert_eq!(
    report::result_payload(&res),
    "result=100.0\ninfoformat=html\ndebugformat=html\ninfo=All tests passed\n"
  );
}

#[test]
fn test_result_payload_partial() {
  let res = SubmissionResult::new(
    vec![
      passed("1"),
      TestResult::failed("2", Verdict::TimeLimitExceeded),
      TestResult::failed("3", Verdict::WrongAnswer),
      passed("4"),
    ],
    None,
    None,
  );

  assert_eq!(res.points, 2);
  assert_eq!(res.score_percent(), 50.0);
  // The summary names the first failing test.
  assert_eq!(report::summary_line(&res), "TLE on test 2");
  assert!(report::result_payload(&res).starts_with("result=50.0\n"));
}

#[test]
fn test_empty_result_scores_zero() {
  let res = SubmissionResult::new(vec![], Some("script.txt unreadable".to_string()), None);
  assert_eq!(res.score_percent(), 0.0);
  assert!(report::result_payload(&res).starts_with("result=0.0\n"));
  assert_eq!(report::summary_line(&res), "script.txt unreadable");
}

#[test]
fn test_info_html_rows() {
  let res = SubmissionResult::new(
    vec![passed("1"), TestResult::failed("2", Verdict::RuntimeError)],
    Some("gcc: all fine".to_string()),
    None,
  );
  let html = report::info_html(&res);

  assert!(html.contains("<td>1</td>"));
  assert!(html.contains(">OK</td>"));
  assert!(html.contains(">RE</td>"));
  assert!(html.contains("12 MiB"));
  assert!(html.contains("0.12 s"));
  assert!(html.contains("<pre>gcc: all fine</pre>"));
}

#[test]
fn test_info_html_escapes() {
  let res = SubmissionResult::new(
    vec![],
    Some("error: expected `;` before <token>".to_string()),
    None,
  );
  let html = report::info_html(&res);
  assert!(html.contains("&lt;token&gt;"));
  assert!(!html.contains("<token>"));
}

#[test]
fn test_ansi_to_html_colors() {
  assert_eq!(
    report::ansi_to_html("\x1b[31mbad\x1b[0m fine"),
    "<span style=\"color:#cc0000\">bad</span> fine"
  );
  assert_eq!(
    report::ansi_to_html("\x1b[1mstrong\x1b[0m"),
    "<span style=\"font-weight:bold\">strong</span>"
  );
}

#[test]
fn test_ansi_to_html_closes_dangling_spans() {
  assert_eq!(
    report::ansi_to_html("\x1b[32mnever reset"),
    "<span style=\"color:#4e9a06\">never reset</span>"
  );
}

#[test]
fn test_ansi_to_html_strips_non_sgr() {
  // Cursor movement has no HTML counterpart.
  assert_eq!(report::ansi_to_html("a\x1b[2Kb"), "ab");
}

#[test]
fn test_ansi_to_html_escapes_markup() {
  assert_eq!(report::ansi_to_html("1 < 2 & 3 > 2"), "1 &lt; 2 &amp; 3 &gt; 2");
}

#[test]
fn test_debug_html_wraps_pre() {
  let res = SubmissionResult::new(vec![], None, Some("=== compile ===\nok\n".to_string()));
  assert_eq!(report::debug_html(&res), "<pre>=== compile ===\nok\n</pre>\n");
}

#[test]
fn test_size_to_string() {
  assert_eq!(report::size_to_string(0.), Some("0 B".to_string()));
  assert_eq!(report::size_to_string(1023.), Some("1023 B".to_string()));
  assert_eq!(report::size_to_string(1024.), Some("1 KiB".to_string()));
  assert_eq!(report::size_to_string(1536.), Some("1.5 KiB".to_string()));
  assert_eq!(
    report::size_to_string(256. * 1024. * 1024.),
    Some("256 MiB".to_string())
  );
  assert_eq!(
    report::size_to_string(3. * 1024. * 1024. * 1024. * 1024.),
    Some("3 TiB".to_string())
  );
}

#[test]
fn test_size_to_string_rejects_negative() {
  assert_eq!(report::size_to_string(-1.), None);
  assert_eq!(report::size_to_string(f64::NAN), None);
  assert_eq!(report::size_to_string(f64::INFINITY), None);
}

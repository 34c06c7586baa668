use std::str::FromStr;

use regex::Regex;

use crate::result::{SubmissionResult, Verdict};

/// The three strings the UI consumes for one submission.
#[derive(Debug, Clone, PartialEq)]
pub struct Payload {
  pub result: String,
  pub info: String,
  pub debug: String,
}

pub fn render(res: &SubmissionResult) -> Payload {
  return Payload {
    result: result_payload(res),
    info: info_html(res),
    debug: debug_html(res),
  };
}

/// The machine-readable payload. Line format is fixed by the UI.
pub fn result_payload(res: &SubmissionResult) -> String {
  return format!(
    "result={:.1}\ninfoformat=html\ndebugformat=html\ninfo={}\n",
    res.score_percent(),
    summary_line(res)
  );
}

/// One-line summary: the first failing classifier, or the happy case.
pub fn summary_line(res: &SubmissionResult) -> String {
  if res.test_results.is_empty() {
    return res
      .info
      .as_deref()
      .and_then(|i| i.lines().next())
      .unwrap_or("No tests were run")
      .to_string();
  }
  for t in &res.test_results {
    if !t.grade {
      if let Some(info) = &t.info {
        let classifier = info.lines().next().unwrap_or(info);
        return format!("{} on test {}", classifier, t.test_name);
      }
    }
  }
  return "All tests passed".to_string();
}

/// The human-readable verdict table plus the compiler output block.
pub fn info_html(res: &SubmissionResult) -> String {
  let mut html = String::from(
    "<table class=\"verdicts\">\n\
     <tr><th>test</th><th>verdict</th><th>time</th><th>memory</th><th>exit</th></tr>\n",
  );

  for t in &res.test_results {
    let verdict = t.info.clone().unwrap_or_else(|| Verdict::Ok.to_string());
    let time = t
      .time
      .map(|s| format!("{:.2} s", s))
      .unwrap_or_else(|| "-".to_string());
    let memory = t
      .memory
      .and_then(size_to_string)
      .unwrap_or_else(|| "-".to_string());
    let exit = t
      .ret_code
      .map(|c| c.to_string())
      .unwrap_or_else(|| "-".to_string());
    html.push_str(&format!(
      "<tr><td>{}</td><td style=\"color:{}\">{}</td><td>{}</td><td>{}</td><td>{}</td></tr>\n",
      escape_html(&t.test_name),
      verdict_color(Verdict::from_str(&verdict).ok()),
      escape_html(&verdict),
      time,
      memory,
      exit,
    ));
  }
  html.push_str("</table>\n");

  if let Some(info) = &res.info {
    html.push_str(&format!(
      "<h4>compilation</h4>\n<pre>{}</pre>\n",
      escape_html(info)
    ));
  }
  return html;
}

/// The captured stage logs as HTML, terminal colors included.
pub fn debug_html(res: &SubmissionResult) -> String {
  let debug = res.debug.as_deref().unwrap_or("");
  return format!("<pre>{}</pre>\n", ansi_to_html(debug));
}

fn verdict_color(verdict: Option<Verdict>) -> &'static str {
  return match verdict {
    Some(Verdict::Ok) => "#2e7d32",
    Some(Verdict::WrongAnswer) => "#c62828",
    Some(Verdict::TimeLimitExceeded) => "#ef6c00",
    Some(Verdict::MemoryLimitExceeded) => "#6a1b9a",
    Some(Verdict::OutputLimitExceeded) => "#ef6c00",
    Some(Verdict::RuntimeError) => "#ad1457",
    Some(Verdict::CompileError) => "#546e7a",
    Some(Verdict::SandboxError) => "#37474f",
    None => "#546e7a",
  };
}

pub fn escape_html(s: &str) -> String {
  return s
    .replace('&', "&amp;")
    .replace('<', "&lt;")
    .replace('>', "&gt;");
}

/// Translate ANSI SGR escape sequences to inline HTML spans; every other
/// escape sequence is stripped. Pure function, no color state kept between
/// calls.
pub fn ansi_to_html(input: &str) -> String {
  lazy_static! {
    static ref CSI: Regex = Regex::new("\x1b\\[([0-9;]*)([A-Za-z])").unwrap();
  }

  let escaped = escape_html(input);
  let mut out = String::new();
  let mut open_spans = 0usize;
  let mut last = 0usize;

  for cap in CSI.captures_iter(&escaped) {
    let m = cap.get(0).unwrap();
    out.push_str(&escaped[last..m.start()]);
    last = m.end();

    if &cap[2] != "m" {
      continue;
    }
    for code in cap[1].split(';') {
      // An empty parameter list means reset.
      match code.parse::<u8>().unwrap_or(0) {
        0 => {
          for _ in 0..open_spans {
            out.push_str("</span>");
          }
          open_spans = 0;
        }
        1 => {
          out.push_str("<span style=\"font-weight:bold\">");
          open_spans += 1;
        }
        c => {
          if let Some(color) = sgr_color(c) {
            out.push_str(&format!("<span style=\"color:{}\">", color));
            open_spans += 1;
          }
        }
      }
    }
  }
  out.push_str(&escaped[last..]);

  for _ in 0..open_spans {
    out.push_str("</span>");
  }
  return out;
}

fn sgr_color(code: u8) -> Option<&'static str> {
  return match code {
    30 => Some("#000000"),
    31 => Some("#cc0000"),
    32 => Some("#4e9a06"),
    33 => Some("#c4a000"),
    34 => Some("#3465a4"),
    35 => Some("#75507b"),
    36 => Some("#06989a"),
    37 => Some("#d3d7cf"),
    90 => Some("#555753"),
    91 => Some("#ef2929"),
    92 => Some("#8ae234"),
    93 => Some("#fce94f"),
    94 => Some("#729fcf"),
    95 => Some("#ad7fa8"),
    96 => Some("#34e2e2"),
    97 => Some("#eeeeec"),
    _ => None,
  };
}

/// Render a byte count with a binary unit, one decimal at most. Parsing the
/// magnitude back yields the input within the displayed precision; negative
/// and non-finite inputs are rejected.
pub fn size_to_string(bytes: f64) -> Option<String> {
  if !bytes.is_finite() || bytes < 0. {
    return None;
  }

  const UNITS: [&str; 5] = ["B", "KiB", "MiB", "GiB", "TiB"];
  let mut value = bytes;
  let mut unit = 0;
  while value >= 1024. && unit + 1 < UNITS.len() {
    value /= 1024.;
    unit += 1;
  }

  let text = format!("{:.1}", value);
  let text = text.strip_suffix(".0").unwrap_or(&text);
  return Some(format!("{} {}", text, UNITS[unit]));
}

use std::{collections::BTreeMap, str::FromStr};

use serde::{Deserialize, Serialize};
use strum::Display;
use thiserror::Error;

/// Resource envelope and judge configuration of one test.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct TestSpec {
  /// Stable identifier; also the basename of the test's `.in`/`.out` files.
  pub test_name: String,

  /// Cpu time limit in seconds.
  pub time_limit: f64,

  /// Memory limit in bytes.
  pub total_memory_limit: u64,

  /// Stack limit in bytes, when the script narrows it below the memory limit.
  pub stack_size_limit: Option<u64>,

  pub judge: JudgeCfg,
}

pub const DEFAULT_TIME_LIMIT: f64 = 2.0;
pub const DEFAULT_MEMORY_LIMIT: u64 = 256 * 1024 * 1024;

impl TestSpec {
  fn with_name(test_name: String) -> Self {
    return Self {
      test_name,
      time_limit: DEFAULT_TIME_LIMIT,
      total_memory_limit: DEFAULT_MEMORY_LIMIT,
      stack_size_limit: None,
      judge: JudgeCfg::default(),
    };
  }
}

/// How a test's output is to be compared. The worker only records the kind
/// and the raw arguments; their semantics belong to the judge image.
#[derive(Debug, PartialEq, Clone, Default, Serialize, Deserialize)]
pub struct JudgeCfg {
  pub kind: JudgeKind,

  /// Arguments from the script line, verbatim (tolerances and the like).
  pub args: Vec<String>,
}

/// Judge kinds, named by their script mnemonics.
#[derive(
  Debug, PartialEq, Eq, Clone, Copy, Default, strum::EnumString, Display, Serialize, Deserialize,
)]
pub enum JudgeKind {
  /// Plain comparison against the expected output.
  #[default]
  #[strum(serialize = "J")]
  Exact,

  /// Numeric comparison.
  #[strum(serialize = "JN")]
  Numeric,

  /// Line-order-insensitive comparison.
  #[strum(serialize = "JUB")]
  UnorderedExact,

  /// Line-order-insensitive numeric comparison.
  #[strum(serialize = "JUN")]
  UnorderedNumeric,
}

/// A problem as consumed by the evaluator.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct ProblemSpec {
  pub id: String,

  /// Captured `C`/`CU`/`CO` lines, command word included. Forwarded to the
  /// compile container, not interpreted here.
  pub compile_directives: Vec<Vec<String>>,

  /// Auxiliary header files to stage for compilation.
  pub aux_headers: Vec<String>,

  /// Auxiliary source files to stage for compilation.
  pub aux_sources: Vec<String>,

  /// Tests in evaluation order (ascending script index).
  pub tests: Vec<TestSpec>,
}

impl ProblemSpec {
  pub fn test_names(&self) -> Vec<String> {
    return self.tests.iter().map(|t| t.test_name.clone()).collect();
  }

  pub fn aux_files(&self) -> impl Iterator<Item = &String> {
    return self.aux_headers.iter().chain(self.aux_sources.iter());
  }
}

/// Error when the problem script cannot be parsed.
#[derive(Debug, PartialEq, Clone, Error)]
pub enum ScriptError {
  #[error("script line {line}: `{command}` takes a numeric argument, got `{token}`")]
  BadNumber {
    line: usize,
    command: String,
    token: String,
  },

  #[error("script line {line}: `{command}` requires a positive value, got `{token}`")]
  NonPositive {
    line: usize,
    command: String,
    token: String,
  },

  #[error("script line {line}: `{command}` requires an argument")]
  MissingArgument { line: usize, command: String },

  #[error("script line {line}: `{command}` before any TST declaration")]
  NoCurrentTest { line: usize, command: String },
}

/// Parse a STOS-family problem script into a normalized [`ProblemSpec`].
///
/// The format is line oriented: one command word plus whitespace-separated
/// arguments per line, `#` starting a comment. Unknown commands are skipped
/// with a warning so that newer scripts keep working on older workers; a
/// malformed argument on a known command fails the whole parse.
///
/// Pure in `script` and `problem_id`: the same inputs always produce an
/// equal spec.
pub fn parse_script(script: &str, problem_id: &str) -> Result<ProblemSpec, ScriptError> {
  let mut tests: BTreeMap<u64, TestSpec> = BTreeMap::new();
  let mut current: Option<u64> = None;
  let mut compile_directives = vec![];
  let mut aux_headers = vec![];
  let mut aux_sources = vec![];

  for (idx, raw) in script.lines().enumerate() {
    let line = idx + 1;
    let text = raw.trim();
    if text.is_empty() || text.starts_with('#') {
      continue;
    }

    let mut words = text.split_whitespace().map(str::to_string);
    let command = words.next().unwrap();
    let args: Vec<String> = words.collect();

    match command.as_str() {
      "C" | "CU" | "CO" => {
        let mut directive = vec![command.clone()];
        directive.extend(args);
        compile_directives.push(directive);
      }

      "TST" => {
        let index = parse_number::<u64>(line, &command, args.first())?;
        if tests.contains_key(&index) {
          log::warn!("script line {}: test {} redeclared, last wins", line, index);
        }
        tests.insert(index, TestSpec::with_name(index.to_string()));
        current = Some(index);
      }

      "T" => {
        let value = parse_positive::<f64>(line, &command, args.first())?;
        if !value.is_finite() {
          return Err(ScriptError::BadNumber {
            line,
            command: command.clone(),
            token: args.first().unwrap().clone(),
          });
        }
        current_test(&mut tests, current, line, &command)?.time_limit = value;
      }

      "TN" => {
        let value = parse_positive::<u64>(line, &command, args.first())?;
        current_test(&mut tests, current, line, &command)?.total_memory_limit = value;
      }

      "TS" => {
        let value = parse_positive::<u64>(line, &command, args.first())?;
        current_test(&mut tests, current, line, &command)?.stack_size_limit = Some(value);
      }

      "J" | "JN" | "JUB" | "JUN" => {
        let kind = JudgeKind::from_str(&command).unwrap();
        current_test(&mut tests, current, line, &command)?.judge = JudgeCfg { kind, args };
      }

      "AH" | "ADDHDR" => {
        aux_headers.push(file_argument(line, &command, args.into_iter().next())?);
      }

      "AS" | "ADDSRC" => {
        aux_sources.push(file_argument(line, &command, args.into_iter().next())?);
      }

      _ => {
        log::warn!("script line {}: unknown command `{}` skipped", line, command);
      }
    }
  }

  return Ok(ProblemSpec {
    id: problem_id.to_string(),
    compile_directives,
    aux_headers,
    aux_sources,
    tests: tests.into_values().collect(),
  });
}

fn parse_number<T: FromStr>(
  line: usize,
  command: &str,
  token: Option<&String>,
) -> Result<T, ScriptError> {
  let token = token.ok_or_else(|| ScriptError::MissingArgument {
    line,
    command: command.to_string(),
  })?;
  return token.parse::<T>().map_err(|_| ScriptError::BadNumber {
    line,
    command: command.to_string(),
    token: token.clone(),
  });
}

fn parse_positive<T: FromStr + PartialOrd + Default>(
  line: usize,
  command: &str,
  token: Option<&String>,
) -> Result<T, ScriptError> {
  let value = parse_number::<T>(line, command, token)?;
  if value <= T::default() {
    return Err(ScriptError::NonPositive {
      line,
      command: command.to_string(),
      token: token.unwrap().clone(),
    });
  }
  return Ok(value);
}

fn file_argument(
  line: usize,
  command: &str,
  token: Option<String>,
) -> Result<String, ScriptError> {
  return token.ok_or_else(|| ScriptError::MissingArgument {
    line,
    command: command.to_string(),
  });
}

fn current_test<'a>(
  tests: &'a mut BTreeMap<u64, TestSpec>,
  current: Option<u64>,
  line: usize,
  command: &str,
) -> Result<&'a mut TestSpec, ScriptError> {
  let index = current.ok_or_else(|| ScriptError::NoCurrentTest {
    line,
    command: command.to_string(),
  })?;
  return Ok(tests.get_mut(&index).unwrap());
}

use std::path::{Path, PathBuf};

use reqwest::StatusCode;
use thiserror::Error;
use tokio::io::AsyncWriteExt;

use crate::{etc, report, workspace::FilesystemError};

/// Network or HTTP failure while talking to the UI.
#[derive(Debug, Error)]
#[error("{context}: {source}")]
pub struct TransportError {
  context: &'static str,
  #[source]
  source: reqwest::Error,
}

/// Malformed UI response.
#[derive(Debug, Error)]
pub enum ProtocolError {
  #[error("response is missing the {name} header")]
  MissingHeader { name: &'static str },

  #[error("unusable {name} header: `{value}`")]
  BadHeader { name: &'static str, value: String },

  #[error("download exceeds the {limit} byte cap")]
  TooLarge { limit: u64 },

  #[error("submission archive is not a readable zip: {0}")]
  BadArchive(String),

  #[error("declared problem file `{name}` was not delivered")]
  MissingProblemFile { name: String },

  #[error("no compile image for queue `{queue}` and none supplied by the UI")]
  NoCompiler { queue: String },
}

#[derive(Debug, Error)]
pub enum ClientError {
  #[error(transparent)]
  Transport(#[from] TransportError),

  #[error(transparent)]
  Protocol(#[from] ProtocolError),

  #[error(transparent)]
  Filesystem(#[from] FilesystemError),
}

/// One successful queue poll.
#[derive(Debug)]
pub struct QueueHit {
  pub submission_id: String,
  pub problem_id: String,
  pub student_id: Option<String>,
  pub mainfile: Option<String>,
  /// Explicit compile image from the UI, when present.
  pub comp_image: Option<String>,
  pub archive_path: PathBuf,
}

/// Result of polling one queue.
#[derive(Debug)]
pub enum PollResult {
  /// Queue empty (the UI answers 404).
  Empty,
  Hit(QueueHit),
}

/// Typed client for the UI's HTTP surface. Performs no retries of its own;
/// retry posture belongs to the adapter and the main loop.
pub struct UiClient {
  http: reqwest::Client,
  base: String,
  max_file_bytes: u64,
}

impl UiClient {
  pub fn new(cfg: &etc::Cfg) -> Result<Self, TransportError> {
    let http = reqwest::Client::builder()
      .connect_timeout(cfg.http_connect_timeout)
      .timeout(cfg.http_read_timeout)
      .build()
      .map_err(|source| TransportError {
        context: "http client setup",
        source,
      })?;
    return Ok(Self {
      http,
      base: cfg.gui_url.as_str().trim_end_matches('/').to_string(),
      max_file_bytes: cfg.max_file_bytes,
    });
  }

  /// One GET against the queue endpoint. Streams the submission archive to
  /// `dest` and reads the job metadata from the response headers.
  ///
  /// # Errors
  ///
  /// 404 is not an error (empty queue); any other HTTP failure is a
  /// transport error and missing/garbled headers are protocol errors.
  pub async fn poll_queue(&self, queue: &str, dest: &Path) -> Result<PollResult, ClientError> {
    let resp = self
      .http
      .get(format!("{}/queue/{}/submission", self.base, queue))
      .send()
      .await
      .map_err(transport("queue poll"))?;

    if resp.status() == StatusCode::NOT_FOUND {
      return Ok(PollResult::Empty);
    }
    let resp = resp.error_for_status().map_err(transport("queue poll"))?;

    let submission_id = required_header(&resp, "X-Server-Id")?;
    let param = required_header(&resp, "X-Param")?;
    let (problem_id, student_id) = parse_param(&param)?;
    let mainfile = optional_header(&resp, "X-Mainfile");
    let comp_image = optional_header(&resp, "X-Compiler");

    self.download(resp, dest).await?;

    return Ok(PollResult::Hit(QueueHit {
      submission_id,
      problem_id,
      student_id,
      mainfile,
      comp_image,
      archive_path: dest.to_path_buf(),
    }));
  }

  /// Newline-separated listing of a problem's files.
  pub async fn list_problem_files(&self, problem_id: &str) -> Result<Vec<String>, ClientError> {
    let body = self
      .http
      .get(format!("{}/filesystem/problem/{}", self.base, problem_id))
      .send()
      .await
      .and_then(|r| r.error_for_status())
      .map_err(transport("problem listing"))?
      .text()
      .await
      .map_err(transport("problem listing"))?;

    return Ok(
      body
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect(),
    );
  }

  /// Stream one problem file to `dest`.
  pub async fn get_problem_file(
    &self,
    problem_id: &str,
    filename: &str,
    dest: &Path,
  ) -> Result<(), ClientError> {
    let resp = self
      .http
      .get(format!(
        "{}/filesystem/problem/{}/{}",
        self.base, problem_id, filename
      ))
      .send()
      .await
      .and_then(|r| r.error_for_status())
      .map_err(transport("problem file"))?;
    self.download(resp, dest).await?;
    return Ok(());
  }

  /// POST the three result payloads as form fields. The UI's text body is
  /// returned for logging only.
  pub async fn post_result(
    &self,
    submission_id: &str,
    payload: &report::Payload,
  ) -> Result<String, ClientError> {
    let body = self
      .http
      .post(format!("{}/result/{}", self.base, submission_id))
      .form(&[
        ("result", payload.result.as_str()),
        ("info", payload.info.as_str()),
        ("debug", payload.debug.as_str()),
      ])
      .send()
      .await
      .and_then(|r| r.error_for_status())
      .map_err(transport("result post"))?
      .text()
      .await
      .map_err(transport("result post"))?;
    return Ok(body);
  }

  /// Stream a response body to disk under the configured size cap. The cap
  /// is checked against the declared length first and enforced on the
  /// actual byte count regardless; a body exactly at the cap passes.
  async fn download(&self, mut resp: reqwest::Response, dest: &Path) -> Result<u64, ClientError> {
    if let Some(declared) = resp.content_length() {
      if declared > self.max_file_bytes {
        return Err(
          ProtocolError::TooLarge {
            limit: self.max_file_bytes,
          }
          .into(),
        );
      }
    }

    let io_err = |source| FilesystemError::Io {
      path: dest.to_path_buf(),
      source,
    };
    let mut file = tokio::fs::File::create(dest).await.map_err(io_err)?;
    let mut written: u64 = 0;
    while let Some(chunk) = resp.chunk().await.map_err(transport("body read"))? {
      written += chunk.len() as u64;
      if written > self.max_file_bytes {
        return Err(
          ProtocolError::TooLarge {
            limit: self.max_file_bytes,
          }
          .into(),
        );
      }
      file.write_all(&chunk).await.map_err(io_err)?;
    }
    file.flush().await.map_err(io_err)?;
    return Ok(written);
  }
}

fn transport(context: &'static str) -> impl FnOnce(reqwest::Error) -> TransportError {
  return move |source| TransportError { context, source };
}

fn required_header(resp: &reqwest::Response, name: &'static str) -> Result<String, ProtocolError> {
  let value = resp
    .headers()
    .get(name)
    .ok_or(ProtocolError::MissingHeader { name })?;
  return value
    .to_str()
    .map(|v| v.trim().to_string())
    .map_err(|_| ProtocolError::BadHeader {
      name,
      value: format!("{:?}", value),
    });
}

fn optional_header(resp: &reqwest::Response, name: &'static str) -> Option<String> {
  return resp
    .headers()
    .get(name)
    .and_then(|v| v.to_str().ok())
    .map(|v| v.trim().to_string())
    .filter(|v| !v.is_empty());
}

/// Split the `X-Param` value `<problem_id>;<student_id>`; the student part
/// is optional.
pub fn parse_param(value: &str) -> Result<(String, Option<String>), ProtocolError> {
  let mut parts = value.splitn(2, ';');
  let problem_id = parts.next().unwrap_or("").trim();
  if problem_id.is_empty() {
    return Err(ProtocolError::BadHeader {
      name: "X-Param",
      value: value.to_string(),
    });
  }
  let student_id = parts
    .next()
    .map(str::trim)
    .filter(|s| !s.is_empty())
    .map(str::to_string);
  return Ok((problem_id.to_string(), student_id));
}

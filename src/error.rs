use thiserror::Error;

use crate::{client, sandbox, script, workspace};

/// Everything that can end one submission early.
///
/// Contained within a single main-loop iteration; the loop itself is never
/// killed by one of these.
#[derive(Debug, Error)]
pub enum SubmissionError {
  #[error(transparent)]
  Transport(#[from] client::TransportError),

  #[error(transparent)]
  Protocol(#[from] client::ProtocolError),

  #[error(transparent)]
  Script(#[from] script::ScriptError),

  #[error(transparent)]
  Filesystem(#[from] workspace::FilesystemError),

  #[error(transparent)]
  Sandbox(#[from] sandbox::SandboxError),
}

impl From<client::ClientError> for SubmissionError {
  fn from(e: client::ClientError) -> Self {
    match e {
      client::ClientError::Transport(e) => Self::Transport(e),
      client::ClientError::Protocol(e) => Self::Protocol(e),
      client::ClientError::Filesystem(e) => Self::Filesystem(e),
    }
  }
}

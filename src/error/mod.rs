use thiserror::Error;

/// Failure taxonomy for the synthesis engine. Only `Parse` on the host
/// script and non-retryable `Transport` terminate a run; everything else
/// surfaces at the stub call site like any other runtime failure.
#[derive(Debug, Clone, Error)]
pub enum Error {
  #[error("parse error at {line}:{col}: {message}")]
  Parse { line: usize, col: usize, message: String },

  #[error("provider transport failure: {message}")]
  Transport { message: String, retryable: bool },

  #[error("candidate rejected: {message}")]
  Validation { message: String },

  #[error("synthesis of '{name}' exhausted after {attempts} attempt(s): {last_error}")]
  SynthesisExhausted { name: String, attempts: u32, last_error: String },

  #[error("{message}")]
  Runtime { message: String },
}

impl Error {
  pub fn parse(line: usize, col: usize, message: impl Into<String>) -> Self {
    Error::Parse { line, col, message: message.into() }
  }

  pub fn runtime(message: impl Into<String>) -> Self {
    Error::Runtime { message: message.into() }
  }

  pub fn validation(message: impl Into<String>) -> Self {
    Error::Validation { message: message.into() }
  }

  /// Transport failures fold into the retry loop unless the provider
  /// signalled a non-retryable condition (bad credentials).
  pub fn is_retryable(&self) -> bool {
    match self {
      Error::Transport { retryable, .. } => *retryable,
      Error::Validation { .. } => true,
      _ => false,
    }
  }
}

pub type Result<T> = std::result::Result<T, Error>;

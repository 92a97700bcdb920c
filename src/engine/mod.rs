use crate::ai::{CompletionProvider, CompletionRequest};
use crate::ast::{Stmt, StubFunction};
use crate::error::{Error, Result};
use crate::prompt::{build_prompt, Feedback};
use crate::validate::validate_candidate;

pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// A validated implementation, owned by the cache entry for its
/// fingerprint and immutable for the rest of the run.
#[derive(Debug, Clone)]
pub struct GeneratedImplementation {
  pub source_text: String,
  pub body: Vec<Stmt>,
  pub validated: bool,
  pub attempt_count: u32,
}

pub struct SynthesisOptions {
  pub model: String,
  pub temperature: f64,
  pub max_attempts: u32,
  pub verbose: bool,
}

/// Drive prompt → completion → validation for one stub, feeding each
/// failure back into the next prompt, up to `max_attempts`. Retryable
/// transport failures burn an attempt like validation failures do;
/// non-retryable ones (bad credentials) abort immediately. Runtime behavior
/// of the result is out of scope here; only structure is checked.
pub fn synthesize(
  provider: &dyn CompletionProvider,
  stub: &StubFunction,
  allowlist: &[String],
  opts: &SynthesisOptions,
) -> Result<GeneratedImplementation> {
  let mut feedback: Option<Feedback> = None;
  let mut attempt = 0u32;
  let max_attempts = opts.max_attempts.max(1);

  loop {
    attempt += 1;
    if opts.verbose {
      eprintln!(
        "[drizzle] synthesizing '{}' via {} (attempt {}/{})",
        stub.name,
        provider.name(),
        attempt,
        max_attempts
      );
    }

    let input = build_prompt(stub, allowlist, feedback.as_ref());
    let request = CompletionRequest {
      prompt: &input,
      model: &opts.model,
      temperature: opts.temperature.clamp(0.0, 1.0),
    };

    let failure = match provider.complete(&request) {
      Ok(text) => match validate_candidate(&text) {
        Ok(candidate) => {
          if opts.verbose {
            eprintln!("[drizzle] '{}' validated on attempt {}", stub.name, attempt);
          }
          return Ok(GeneratedImplementation {
            source_text: candidate.source_text,
            body: candidate.body,
            validated: true,
            attempt_count: attempt,
          });
        }
        Err(err) => Feedback { candidate: Some(text), error: err.to_string() },
      },
      Err(err) => {
        if !err.is_retryable() {
          return Err(err);
        }
        Feedback { candidate: None, error: err.to_string() }
      }
    };

    if opts.verbose {
      eprintln!("[drizzle] attempt {} for '{}' failed: {}", attempt, stub.name, failure.error);
    }

    if attempt >= max_attempts {
      return Err(Error::SynthesisExhausted {
        name: stub.name.clone(),
        attempts: attempt,
        last_error: failure.error,
      });
    }
    feedback = Some(failure);
  }
}

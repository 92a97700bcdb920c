use crate::ast::{Item, Stmt};
use crate::error::{Error, Result};
use crate::extract::is_stub_body;
use crate::parser::parse_source;

/// A candidate that survived structural checks. `source_text` is the
/// fence-stripped text that actually parsed.
#[derive(Debug)]
pub struct ValidatedCandidate {
  pub source_text: String,
  pub body: Vec<Stmt>,
}

/// Structurally check a completion: does it parse as a function body (or a
/// single full `fn` definition)? Nothing semantic is verified here; whether
/// the logic matches the docstring is entirely the model's problem.
pub fn validate_candidate(raw: &str) -> Result<ValidatedCandidate> {
  let text = strip_code_fences(raw).trim().to_string();
  if text.is_empty() {
    return Err(Error::validation("completion was empty"));
  }

  let script = parse_source(&text).map_err(|err| Error::validation(err.to_string()))?;

  let mut fns = Vec::new();
  let mut stmts = Vec::new();
  for item in script.items {
    match item {
      Item::Fn(decl) => fns.push(decl),
      Item::Stmt(stmt) => stmts.push(stmt),
    }
  }

  let body = match (fns.len(), stmts.len()) {
    (0, _) => stmts,
    // A full definition is acceptable; the stub's own identity governs
    // installation, so a mismatched name only costs the model its label.
    (1, 0) => fns.remove(0).body,
    _ => {
      return Err(Error::validation(
        "expected a bare function body or exactly one fn definition",
      ))
    }
  };

  if is_stub_body(&body) {
    return Err(Error::validation("body is still a placeholder, not an implementation"));
  }

  Ok(ValidatedCandidate { source_text: text, body })
}

/// Providers wrap code in markdown fences no matter how firmly the prompt
/// forbids it; strip one fenced block if present.
fn strip_code_fences(response: &str) -> &str {
  let trimmed = response.trim();
  let Some(rest) = trimmed.strip_prefix("```") else {
    return trimmed;
  };
  // Skip the info string (e.g. ```drizzle) on the opening fence line.
  let body_start = rest.find('\n').map(|i| i + 1).unwrap_or(rest.len());
  let body = &rest[body_start..];
  match body.rfind("```") {
    Some(end) => &body[..end],
    None => body,
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn accepts_bare_body() {
    let v = validate_candidate("return a + b").expect("valid");
    assert_eq!(v.body.len(), 1);
  }

  #[test]
  fn accepts_fenced_full_fn() {
    let raw = "```drizzle\nfn add(a, b):\n  return a + b\nend\n```";
    let v = validate_candidate(raw).expect("valid");
    assert_eq!(v.body.len(), 1);
    assert!(!v.source_text.contains("```"));
  }

  #[test]
  fn rejects_placeholder_body() {
    assert!(validate_candidate("...").is_err());
    assert!(validate_candidate("pass").is_err());
  }

  #[test]
  fn rejects_unparsable_text() {
    let err = validate_candidate("Sure! Here is the implementation:").unwrap_err();
    assert!(matches!(err, Error::Validation { .. }));
  }
}

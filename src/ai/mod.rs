use serde_json::{json, Value};

use crate::error::{Error, Result};

const ANTHROPIC_SYSTEM: &str =
  "You are the drizzle function synthesizer. Output only drizzle source code.";

/// One generation request. Arguments of the intercepted call never appear
/// here: the prompt describes the declaration, not a specific invocation.
pub struct CompletionRequest<'a> {
  pub prompt: &'a str,
  pub model: &'a str,
  pub temperature: f64,
}

/// Boundary to the model. Implementations either return completion text or
/// a transport error whose `retryable` flag steers the retry loop.
pub trait CompletionProvider {
  fn name(&self) -> &str;
  fn complete(&self, req: &CompletionRequest) -> Result<String>;
}

pub enum AiProvider {
  OpenAI { api_key: String },
  Anthropic { api_key: String },
  Gemini { api_key: String },
  Offline,
}

impl CompletionProvider for AiProvider {
  fn name(&self) -> &str {
    match self {
      AiProvider::OpenAI { .. } => "openai",
      AiProvider::Anthropic { .. } => "anthropic",
      AiProvider::Gemini { .. } => "gemini",
      AiProvider::Offline => "offline",
    }
  }

  fn complete(&self, req: &CompletionRequest) -> Result<String> {
    match self {
      AiProvider::OpenAI { api_key } => openai_complete(api_key, req),
      AiProvider::Anthropic { api_key } => anthropic_complete(api_key, req),
      AiProvider::Gemini { api_key } => gemini_complete(api_key, req),
      AiProvider::Offline => Ok(offline_complete()),
    }
  }
}

// The offline provider stands in when no key is configured: a minimal body
// that parses and runs, so scripts stay executable without credentials.
fn offline_complete() -> String {
  "return null".to_string()
}

fn openai_complete(api_key: &str, req: &CompletionRequest) -> Result<String> {
  let body = json!({
    "model": req.model,
    "input": req.prompt,
    "temperature": req.temperature,
  });

  let client = reqwest::blocking::Client::new();
  let resp = client
    .post("https://api.openai.com/v1/responses")
    .bearer_auth(api_key)
    .json(&body)
    .send()
    .map_err(send_failure)?;

  if !resp.status().is_success() {
    let status = resp.status();
    let text = resp.text().unwrap_or_else(|_| "<no body>".to_string());
    return Err(status_failure("OpenAI", status, &text));
  }

  let value: Value = resp.json().map_err(send_failure)?;
  match extract_output_text(&value) {
    Some(text) => Ok(text),
    None => Err(empty_output("OpenAI")),
  }
}

fn extract_output_text(value: &Value) -> Option<String> {
  let output = value.get("output")?.as_array()?;
  let mut text = String::new();
  for item in output {
    if let Some(content) = item.get("content").and_then(|c| c.as_array()) {
      for part in content {
        if part.get("type").and_then(|t| t.as_str()) == Some("output_text") {
          if let Some(t) = part.get("text").and_then(|t| t.as_str()) {
            text.push_str(t);
          }
        }
      }
    }
  }
  if text.is_empty() { None } else { Some(text) }
}

fn anthropic_complete(api_key: &str, req: &CompletionRequest) -> Result<String> {
  let body = json!({
    "model": req.model,
    "max_tokens": 2048,
    "temperature": req.temperature,
    "system": ANTHROPIC_SYSTEM,
    "messages": [
      { "role": "user", "content": req.prompt }
    ]
  });

  let client = reqwest::blocking::Client::new();
  let resp = client
    .post("https://api.anthropic.com/v1/messages")
    .header("x-api-key", api_key)
    .header("anthropic-version", "2023-06-01")
    .header("content-type", "application/json")
    .json(&body)
    .send()
    .map_err(send_failure)?;

  if !resp.status().is_success() {
    let status = resp.status();
    let text = resp.text().unwrap_or_else(|_| "<no body>".to_string());
    return Err(status_failure("Anthropic", status, &text));
  }

  let value: Value = resp.json().map_err(send_failure)?;
  match extract_anthropic_text(&value) {
    Some(text) => Ok(text),
    None => Err(empty_output("Anthropic")),
  }
}

fn extract_anthropic_text(value: &Value) -> Option<String> {
  let content = value.get("content")?.as_array()?;
  let mut text = String::new();
  for item in content {
    if item.get("type").and_then(|t| t.as_str()) == Some("text") {
      if let Some(t) = item.get("text").and_then(|t| t.as_str()) {
        text.push_str(t);
      }
    }
  }
  if text.is_empty() { None } else { Some(text) }
}

fn gemini_complete(api_key: &str, req: &CompletionRequest) -> Result<String> {
  let body = json!({
    "contents": [
      { "role": "user", "parts": [ { "text": req.prompt } ] }
    ],
    "generationConfig": {
      "temperature": req.temperature
    }
  });

  let url = format!(
    "https://generativelanguage.googleapis.com/v1beta/models/{}:generateContent",
    req.model
  );
  let client = reqwest::blocking::Client::new();
  let resp = client
    .post(url)
    .header("x-goog-api-key", api_key)
    .header("content-type", "application/json")
    .json(&body)
    .send()
    .map_err(send_failure)?;

  if !resp.status().is_success() {
    let status = resp.status();
    let text = resp.text().unwrap_or_else(|_| "<no body>".to_string());
    return Err(status_failure("Gemini", status, &text));
  }

  let value: Value = resp.json().map_err(send_failure)?;
  match extract_gemini_text(&value) {
    Some(text) => Ok(text),
    None => Err(empty_output("Gemini")),
  }
}

fn extract_gemini_text(value: &Value) -> Option<String> {
  let candidates = value.get("candidates")?.as_array()?;
  let first = candidates.first()?;
  let content = first.get("content")?;
  let parts = content.get("parts")?.as_array()?;
  let mut text = String::new();
  for part in parts {
    if let Some(t) = part.get("text").and_then(|t| t.as_str()) {
      text.push_str(t);
    }
  }
  if text.is_empty() { None } else { Some(text) }
}

fn send_failure(err: reqwest::Error) -> Error {
  Error::Transport { message: format!("request failed: {}", err), retryable: true }
}

// Credential rejections are not worth retrying; everything else might be
// transient on the provider side.
fn status_failure(provider: &str, status: reqwest::StatusCode, body: &str) -> Error {
  let retryable = !matches!(status.as_u16(), 401 | 403);
  Error::Transport {
    message: format!("{} error: status {} body {}", provider, status, body),
    retryable,
  }
}

fn empty_output(provider: &str) -> Error {
  Error::Transport { message: format!("{} returned empty output", provider), retryable: true }
}

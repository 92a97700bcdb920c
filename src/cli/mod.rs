use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};

use crate::ai::AiProvider;
use crate::ast::StubFunction;
use crate::engine::{SynthesisOptions, DEFAULT_MAX_ATTEMPTS};
use crate::extract::extract_stubs;
use crate::interp::{is_builtin, BUILTIN_NAMES};
use crate::runtime::install_and_run;

const DEFAULT_OPENAI_MODEL: &str = "gpt-4.1";
const DEFAULT_ANTHROPIC_MODEL: &str = "claude-sonnet-4-20250514";
const DEFAULT_GEMINI_MODEL: &str = "gemini-2.5-pro";

#[derive(Parser)]
#[command(name = "drizzle", version, about = "Run scripts whose stub functions are synthesized on demand")]
pub struct Cli {
  #[command(subcommand)]
  cmd: Command,
}

#[derive(Subcommand)]
pub enum Command {
  /// Execute a script, synthesizing placeholder functions on first call
  Run {
    script: PathBuf,
    #[arg(long)]
    provider: Option<String>,
    #[arg(long)]
    model: Option<String>,
    #[arg(long, default_value_t = 0.2)]
    temperature: f64,
    #[arg(long, default_value_t = DEFAULT_MAX_ATTEMPTS)]
    max_attempts: u32,
    /// Capability allow-list for generated code (repeatable; default: all builtins)
    #[arg(long = "allow")]
    allow: Vec<String>,
    #[arg(long)]
    strict_provider: bool,
    #[arg(short, long)]
    verbose: bool,
  },
  /// List detected stub functions without contacting any provider
  Stubs {
    script: PathBuf,
    #[arg(long)]
    json: bool,
  },
  Auth {
    #[command(subcommand)]
    cmd: AuthCommand,
  },
  /// Write runnable demo scripts into ./demos
  Demos,
}

#[derive(Subcommand)]
pub enum AuthCommand {
  Check {
    #[arg(long, default_value = "openai")]
    provider: String,
    #[arg(long)]
    verify: bool,
  },
}

#[derive(Default, serde::Deserialize)]
struct Config {
  provider: Option<String>,
  openai: Option<ProviderConfig>,
  anthropic: Option<ProviderConfig>,
  gemini: Option<ProviderConfig>,
}

#[derive(Default, serde::Deserialize)]
struct ProviderConfig {
  api_key: Option<String>,
  model: Option<String>,
}

pub fn run() -> Result<()> {
  let cli = Cli::parse();
  match cli.cmd {
    Command::Run { script, provider, model, temperature, max_attempts, allow, strict_provider, verbose } => {
      run_script(&script, provider, model, temperature, max_attempts, allow, strict_provider, verbose)
    }
    Command::Stubs { script, json } => list_stubs(&script, json),
    Command::Auth { cmd } => match cmd {
      AuthCommand::Check { provider, verify } => auth_check(&provider, verify),
    },
    Command::Demos => write_demos(),
  }
}

#[allow(clippy::too_many_arguments)]
fn run_script(
  script: &Path,
  provider: Option<String>,
  model: Option<String>,
  temperature: f64,
  max_attempts: u32,
  allow: Vec<String>,
  strict_provider: bool,
  verbose: bool,
) -> Result<()> {
  let source = fs::read_to_string(script).with_context(|| format!("Failed to read {:?}", script))?;

  if !(0.0..=1.0).contains(&temperature) {
    bail!("Temperature must be in 0.0..1.0, got {}", temperature);
  }

  let allowlist = resolve_allowlist(allow)?;
  let (ai_provider, model_name) = select_ai_provider(provider, model, strict_provider)?;

  let opts = SynthesisOptions {
    model: model_name,
    temperature,
    max_attempts,
    verbose,
  };
  install_and_run(&source, &ai_provider, allowlist, opts)?;
  Ok(())
}

fn resolve_allowlist(allow: Vec<String>) -> Result<Vec<String>> {
  if allow.is_empty() {
    return Ok(BUILTIN_NAMES.iter().map(|s| s.to_string()).collect());
  }
  for cap in &allow {
    if !is_builtin(cap) {
      bail!("Unknown capability '{}'. Available: {}", cap, BUILTIN_NAMES.join(", "));
    }
  }
  Ok(allow)
}

fn list_stubs(script: &Path, json: bool) -> Result<()> {
  let source = fs::read_to_string(script).with_context(|| format!("Failed to read {:?}", script))?;
  let stubs = extract_stubs(&source)?;

  if json {
    println!("{}", serde_json::to_string_pretty(&stubs)?);
    return Ok(());
  }

  print_stubs(&stubs);
  Ok(())
}

fn print_stubs(stubs: &[StubFunction]) {
  if stubs.is_empty() {
    println!("No stub functions found.");
    return;
  }
  println!("Found {} stub function(s):\n", stubs.len());
  for stub in stubs {
    println!("  Line {}: {}", stub.line, stub.name);
    println!("    Signature: {}", stub.signature());
    if let Some(doc) = &stub.docstring {
      let first_line = doc.lines().next().unwrap_or("").trim();
      println!("    Docstring: {}", first_line);
    }
    println!();
  }
}

fn auth_check(provider: &str, verify: bool) -> Result<()> {
  match provider {
    "openai" => {
      let config = load_config();
      let key = env::var("OPENAI_API_KEY")
        .ok()
        .or_else(|| config.openai.and_then(|c| c.api_key));
      let Some(api_key) = key else {
        bail!("OPENAI_API_KEY not set and no key in drizzle.config.json");
      };

      if !verify {
        println!("OpenAI provider: API key found");
        return Ok(());
      }

      let client = reqwest::blocking::Client::new();
      let resp = client
        .get("https://api.openai.com/v1/models")
        .bearer_auth(api_key)
        .send()?;
      if !resp.status().is_success() {
        bail!("OpenAI auth check failed: status {}", resp.status());
      }
      println!("OpenAI provider: API key verified");
      Ok(())
    }
    "anthropic" => {
      let config = load_config();
      let key = env::var("ANTHROPIC_API_KEY")
        .ok()
        .or_else(|| config.anthropic.as_ref().and_then(|c| c.api_key.clone()));
      let Some(api_key) = key else {
        bail!("ANTHROPIC_API_KEY not set and no key in drizzle.config.json");
      };

      if !verify {
        println!("Anthropic provider: API key found");
        return Ok(());
      }

      let model = config
        .anthropic
        .as_ref()
        .and_then(|c| c.model.clone())
        .unwrap_or_else(|| DEFAULT_ANTHROPIC_MODEL.to_string());
      let client = reqwest::blocking::Client::new();
      let body = serde_json::json!({
        "model": model,
        "max_tokens": 1,
        "system": "ping",
        "messages": [{ "role": "user", "content": "ping" }]
      });
      let resp = client
        .post("https://api.anthropic.com/v1/messages")
        .header("x-api-key", api_key)
        .header("anthropic-version", "2023-06-01")
        .header("content-type", "application/json")
        .json(&body)
        .send()?;
      if !resp.status().is_success() {
        bail!("Anthropic auth check failed: status {}", resp.status());
      }
      println!("Anthropic provider: API key verified");
      Ok(())
    }
    "gemini" => {
      let config = load_config();
      let key = env::var("GEMINI_API_KEY")
        .ok()
        .or_else(|| config.gemini.as_ref().and_then(|c| c.api_key.clone()));
      let Some(api_key) = key else {
        bail!("GEMINI_API_KEY not set and no key in drizzle.config.json");
      };

      if !verify {
        println!("Gemini provider: API key found");
        return Ok(());
      }

      let model = config
        .gemini
        .as_ref()
        .and_then(|c| c.model.clone())
        .unwrap_or_else(|| DEFAULT_GEMINI_MODEL.to_string());
      let body = serde_json::json!({
        "contents": [{ "role": "user", "parts": [{ "text": "ping" }] }],
        "generationConfig": { "maxOutputTokens": 1 }
      });
      let url = format!(
        "https://generativelanguage.googleapis.com/v1beta/models/{}:generateContent",
        model
      );
      let client = reqwest::blocking::Client::new();
      let resp = client
        .post(url)
        .header("x-goog-api-key", api_key)
        .header("content-type", "application/json")
        .json(&body)
        .send()?;
      if !resp.status().is_success() {
        bail!("Gemini auth check failed: status {}", resp.status());
      }
      println!("Gemini provider: API key verified");
      Ok(())
    }
    other => bail!("Unknown provider: {}", other),
  }
}

fn select_ai_provider(
  provider_override: Option<String>,
  model_override: Option<String>,
  strict: bool,
) -> Result<(AiProvider, String)> {
  let config = load_config();
  let provider_name = provider_override
    .or_else(|| config.provider.clone())
    .unwrap_or_else(|| "openai".to_string());

  match provider_name.as_str() {
    "openai" => {
      let key = env::var("OPENAI_API_KEY")
        .ok()
        .or_else(|| config.openai.as_ref().and_then(|c| c.api_key.clone()));
      if let Some(api_key) = key {
        let model_name = model_override
          .or_else(|| config.openai.and_then(|c| c.model))
          .unwrap_or_else(|| DEFAULT_OPENAI_MODEL.to_string());
        Ok((AiProvider::OpenAI { api_key }, model_name))
      } else if strict {
        bail!("OpenAI provider selected but no API key provided");
      } else {
        eprintln!("Warning: OpenAI provider selected but no API key found. Falling back to offline stub bodies.");
        Ok((AiProvider::Offline, "offline".to_string()))
      }
    }
    "anthropic" => {
      let key = env::var("ANTHROPIC_API_KEY")
        .ok()
        .or_else(|| config.anthropic.as_ref().and_then(|c| c.api_key.clone()));
      if let Some(api_key) = key {
        let model_name = model_override
          .or_else(|| config.anthropic.as_ref().and_then(|c| c.model.clone()))
          .unwrap_or_else(|| DEFAULT_ANTHROPIC_MODEL.to_string());
        Ok((AiProvider::Anthropic { api_key }, model_name))
      } else if strict {
        bail!("Anthropic provider selected but no API key provided");
      } else {
        eprintln!("Warning: Anthropic provider selected but no API key found. Falling back to offline stub bodies.");
        Ok((AiProvider::Offline, "offline".to_string()))
      }
    }
    "gemini" => {
      let key = env::var("GEMINI_API_KEY")
        .ok()
        .or_else(|| config.gemini.as_ref().and_then(|c| c.api_key.clone()));
      if let Some(api_key) = key {
        let model_name = model_override
          .or_else(|| config.gemini.as_ref().and_then(|c| c.model.clone()))
          .unwrap_or_else(|| DEFAULT_GEMINI_MODEL.to_string());
        Ok((AiProvider::Gemini { api_key }, model_name))
      } else if strict {
        bail!("Gemini provider selected but no API key provided");
      } else {
        eprintln!("Warning: Gemini provider selected but no API key found. Falling back to offline stub bodies.");
        Ok((AiProvider::Offline, "offline".to_string()))
      }
    }
    "offline" => Ok((AiProvider::Offline, "offline".to_string())),
    other => bail!("Unknown AI provider: {}", other),
  }
}

fn load_config() -> Config {
  let path = Path::new("drizzle.config.json");
  if let Ok(data) = fs::read_to_string(path) {
    if let Ok(cfg) = serde_json::from_str::<Config>(&data) {
      return cfg;
    }
  }
  Config::default()
}

fn write_demos() -> Result<()> {
  let demos_dir = Path::new("demos");
  fs::create_dir_all(demos_dir)?;

  let stubs_demo = r#"# Stub functions: bodies are synthesized on first call.
# Run with: drizzle run demos/stubs.dz --verbose

fn calculate_tip(bill: float, service_quality: str) -> float:
  "Return the tip in dollars: 10% of the bill for poor service, 15% for okay, 18% for good, 25% for excellent."
  ...
end

fn is_palindrome(text: str) -> bool:
  "Check whether the text reads the same forwards and backwards, ignoring case and spaces."
  pass
end

fn first_word_with(text: str, letter: str) -> str:
  "Return the first word of the text that starts with the given letter, or an empty string."
  raise NotImplemented
end

print("tip for 85.5 excellent:", calculate_tip(85.5, "excellent"))
print("racecar palindrome:", is_palindrome("racecar"))
print("hello palindrome:", is_palindrome("hello"))
print("first q-word:", first_word_with("the quick brown fox", "q"))
"#;

  let tour_demo = r#"# Plain drizzle, no stubs: a quick tour of the language.
# Run with: drizzle run demos/tour.dz

fn shout(text: str) -> str:
  "Uppercase with an exclamation mark."
  return upper(text) + "!"
end

total = 0
for n in range(1, 6):
  total += n
end
print("sum 1..5 =", total)

words = ["cloud", "rain", "mist"]
for w in words:
  print(shout(w))
end

i = 3
while i > 0:
  print("countdown", i)
  i = i - 1
end
"#;

  fs::write(demos_dir.join("stubs.dz"), stubs_demo)?;
  fs::write(demos_dir.join("tour.dz"), tour_demo)?;
  println!("Wrote demos/stubs.dz");
  println!("Wrote demos/tour.dz");
  Ok(())
}

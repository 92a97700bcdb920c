use std::cell::RefCell;
use std::collections::VecDeque;

use drizzle::ai::{CompletionProvider, CompletionRequest};
use drizzle::engine::SynthesisOptions;
use drizzle::error::Error;
use drizzle::interp::BUILTIN_NAMES;
use drizzle::runtime::install_and_run;

struct ScriptedProvider {
    replies: RefCell<VecDeque<String>>,
    calls: RefCell<usize>,
}

impl ScriptedProvider {
    fn new(replies: &[&str]) -> Self {
        Self {
            replies: RefCell::new(replies.iter().map(|s| s.to_string()).collect()),
            calls: RefCell::new(0),
        }
    }

    fn calls(&self) -> usize {
        *self.calls.borrow()
    }
}

impl CompletionProvider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    fn complete(&self, _req: &CompletionRequest) -> drizzle::error::Result<String> {
        *self.calls.borrow_mut() += 1;
        match self.replies.borrow_mut().pop_front() {
            Some(text) => Ok(text),
            None => panic!("provider called more often than scripted"),
        }
    }
}

fn opts() -> SynthesisOptions {
    SynthesisOptions {
        model: "test-model".to_string(),
        temperature: 0.2,
        max_attempts: 3,
        verbose: false,
    }
}

fn full_allowlist() -> Vec<String> {
    BUILTIN_NAMES.iter().map(|s| s.to_string()).collect()
}

#[test]
fn synthesizes_once_across_repeated_calls() {
    let src = r#"fn add(a: int, b: int) -> int:
  "Return the sum of a and b."
  ...
end

first = add(2, 3)
if first != 5:
  raise "add(2, 3) returned " + str(first)
end

second = add(10, -1)
if second != 9:
  raise "add(10, -1) returned " + str(second)
end
"#;
    let provider = ScriptedProvider::new(&["return a + b"]);
    install_and_run(src, &provider, full_allowlist(), opts()).expect("run ok");
    // Two calls with different arguments, one generation.
    assert_eq!(provider.calls(), 1);
}

#[test]
fn non_stub_functions_pass_through_untouched() {
    let src = r#"fn double(x: int) -> int:
  return x * 2
end

if double(21) != 42:
  raise "double broke"
end
"#;
    // Zero scripted replies: any provider call panics the test.
    let provider = ScriptedProvider::new(&[]);
    install_and_run(src, &provider, full_allowlist(), opts()).expect("run ok");
    assert_eq!(provider.calls(), 0);
}

#[test]
fn generated_code_uses_granted_capabilities() {
    let src = r#"fn shout(text: str) -> str:
  "Uppercase the text and append an exclamation mark."
  ...
end

if shout("hi") != "HI!":
  raise "shout returned " + shout("hi")
end
"#;
    let provider = ScriptedProvider::new(&["return upper(text) + \"!\""]);
    install_and_run(src, &provider, full_allowlist(), opts()).expect("run ok");
    assert_eq!(provider.calls(), 1);
}

#[test]
fn exhaustion_surfaces_at_the_call_site() {
    let src = r#"fn add(a: int, b: int) -> int:
  ...
end

x = add(1, 2)
"#;
    let provider = ScriptedProvider::new(&["$ bad", "$ bad", "$ bad"]);
    let err = install_and_run(src, &provider, full_allowlist(), opts()).unwrap_err();
    assert!(matches!(err, Error::SynthesisExhausted { .. }), "got {:?}", err);
    assert_eq!(provider.calls(), 3);
}

#[test]
fn runtime_failure_of_generated_code_is_not_retried() {
    let src = r#"fn fetch(url: str) -> str:
  ...
end

x = fetch("https://example.com")
"#;
    // Validates fine, then trips the sandbox at execution time.
    let provider = ScriptedProvider::new(&["return http_get(url)"]);
    let err = install_and_run(src, &provider, full_allowlist(), opts()).unwrap_err();
    assert!(matches!(err, Error::Runtime { .. }), "got {:?}", err);
    assert!(err.to_string().contains("allow-list"));
    assert_eq!(provider.calls(), 1);
}

#[test]
fn narrowed_allowlist_restricts_generated_code() {
    let src = r#"fn shout(text: str) -> str:
  ...
end

x = shout("hi")
"#;
    let provider = ScriptedProvider::new(&["return upper(text)"]);
    let err = install_and_run(src, &provider, vec!["len".to_string()], opts()).unwrap_err();
    assert!(err.to_string().contains("allow-list"));
}

#[test]
fn untyped_undocumented_stub_still_dispatches() {
    let src = r#"fn mystery(a, b):
  ...
end

x = mystery(1, 2)
if x != null:
  raise "expected null"
end
"#;
    let provider = ScriptedProvider::new(&["return null"]);
    install_and_run(src, &provider, full_allowlist(), opts()).expect("run ok");
}

#[test]
fn fenced_completion_is_accepted() {
    let src = r#"fn add(a: int, b: int) -> int:
  ...
end

if add(2, 2) != 4:
  raise "bad sum"
end
"#;
    let provider = ScriptedProvider::new(&["```drizzle\nfn add(a, b):\n  return a + b\nend\n```"]);
    install_and_run(src, &provider, full_allowlist(), opts()).expect("run ok");
}

#[test]
fn host_parse_failure_aborts_before_any_synthesis() {
    let provider = ScriptedProvider::new(&[]);
    let err = install_and_run("fn broken(:\n", &provider, full_allowlist(), opts()).unwrap_err();
    assert!(matches!(err, Error::Parse { .. }));
    assert_eq!(provider.calls(), 0);
}

#[test]
fn duplicate_function_names_are_rejected() {
    let src = r#"fn f():
  return 1
end

fn f():
  return 2
end
"#;
    let provider = ScriptedProvider::new(&[]);
    let err = install_and_run(src, &provider, full_allowlist(), opts()).unwrap_err();
    assert!(err.to_string().contains("duplicate function"));
}

#[test]
fn top_level_return_is_an_error() {
    let provider = ScriptedProvider::new(&[]);
    let err = install_and_run("return 1\n", &provider, full_allowlist(), opts()).unwrap_err();
    assert!(err.to_string().contains("outside a function"));
}

#[test]
fn script_functions_can_recurse() {
    let src = r#"fn factorial(n: int) -> int:
  if n <= 1:
    return 1
  end
  return n * factorial(n - 1)
end

if factorial(5) != 120:
  raise "factorial broke"
end
"#;
    let provider = ScriptedProvider::new(&[]);
    install_and_run(src, &provider, full_allowlist(), opts()).expect("run ok");
}

#[test]
fn hand_written_raise_not_implemented_still_runs() {
    // A second real statement disqualifies the body as a stub, so the
    // raise executes normally when called.
    let src = r#"fn later(x: int) -> int:
  print("about to give up")
  raise NotImplemented
end

y = later(1)
"#;
    let provider = ScriptedProvider::new(&[]);
    let err = install_and_run(src, &provider, full_allowlist(), opts()).unwrap_err();
    assert_eq!(err.to_string(), "not implemented");
    assert_eq!(provider.calls(), 0);
}

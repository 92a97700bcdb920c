use std::cell::RefCell;
use std::collections::VecDeque;

use drizzle::ai::{CompletionProvider, CompletionRequest};
use drizzle::engine::{synthesize, SynthesisOptions};
use drizzle::error::Error;
use drizzle::extract::extract_stubs;
use drizzle::interp::BUILTIN_NAMES;

enum Reply {
    Text(&'static str),
    Fail { message: &'static str, retryable: bool },
}

struct ScriptedProvider {
    replies: RefCell<VecDeque<Reply>>,
    prompts: RefCell<Vec<String>>,
}

impl ScriptedProvider {
    fn new(replies: Vec<Reply>) -> Self {
        Self {
            replies: RefCell::new(replies.into()),
            prompts: RefCell::new(Vec::new()),
        }
    }

    fn calls(&self) -> usize {
        self.prompts.borrow().len()
    }
}

impl CompletionProvider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    fn complete(&self, req: &CompletionRequest) -> drizzle::error::Result<String> {
        self.prompts.borrow_mut().push(req.prompt.to_string());
        match self.replies.borrow_mut().pop_front() {
            Some(Reply::Text(t)) => Ok(t.to_string()),
            Some(Reply::Fail { message, retryable }) => Err(Error::Transport {
                message: message.to_string(),
                retryable,
            }),
            None => panic!("provider called more often than scripted"),
        }
    }
}

fn add_stub() -> drizzle::ast::StubFunction {
    let src = "fn add(a: int, b: int) -> int:\n  \"Return the sum of a and b.\"\n  ...\nend\n";
    extract_stubs(src).expect("parse ok").remove(0)
}

fn opts(max_attempts: u32) -> SynthesisOptions {
    SynthesisOptions {
        model: "test-model".to_string(),
        temperature: 0.2,
        max_attempts,
        verbose: false,
    }
}

fn allowlist() -> Vec<String> {
    BUILTIN_NAMES.iter().map(|s| s.to_string()).collect()
}

#[test]
fn succeeds_first_try() {
    let provider = ScriptedProvider::new(vec![Reply::Text("return a + b")]);
    let imp = synthesize(&provider, &add_stub(), &allowlist(), &opts(3)).expect("synthesis ok");
    assert!(imp.validated);
    assert_eq!(imp.attempt_count, 1);
    assert_eq!(provider.calls(), 1);
}

#[test]
fn prompt_carries_signature_docstring_and_capabilities() {
    let provider = ScriptedProvider::new(vec![Reply::Text("return a + b")]);
    synthesize(&provider, &add_stub(), &allowlist(), &opts(3)).expect("synthesis ok");
    let prompts = provider.prompts.borrow();
    assert!(prompts[0].contains("fn add(a: int, b: int) -> int"));
    assert!(prompts[0].contains("Return the sum of a and b."));
    assert!(prompts[0].contains("print"));
    assert!(!prompts[0].contains("PREVIOUS_ATTEMPT"));
}

#[test]
fn retry_prompt_carries_candidate_and_error() {
    let provider = ScriptedProvider::new(vec![
        Reply::Text("while without colon end"),
        Reply::Text("return a + b"),
    ]);
    let imp = synthesize(&provider, &add_stub(), &allowlist(), &opts(3)).expect("synthesis ok");
    assert_eq!(imp.attempt_count, 2);
    let prompts = provider.prompts.borrow();
    assert!(prompts[1].contains("PREVIOUS_ATTEMPT"));
    assert!(prompts[1].contains("while without colon end"));
    assert!(prompts[1].contains("ERROR:"));
}

#[test]
fn succeeds_on_third_attempt_and_counts_it() {
    let provider = ScriptedProvider::new(vec![
        Reply::Text("this is not ^ code"),
        Reply::Text("also ! not code"),
        Reply::Text("return a + b"),
    ]);
    let imp = synthesize(&provider, &add_stub(), &allowlist(), &opts(3)).expect("synthesis ok");
    assert_eq!(imp.attempt_count, 3);
    assert_eq!(provider.calls(), 3);
}

#[test]
fn exhausts_after_exactly_max_attempts() {
    let provider = ScriptedProvider::new(vec![
        Reply::Text("$ nope"),
        Reply::Text("$ nope"),
        Reply::Text("$ nope"),
    ]);
    let err = synthesize(&provider, &add_stub(), &allowlist(), &opts(3)).unwrap_err();
    match err {
        Error::SynthesisExhausted { name, attempts, .. } => {
            assert_eq!(name, "add");
            assert_eq!(attempts, 3);
        }
        other => panic!("expected SynthesisExhausted, got {:?}", other),
    }
    assert_eq!(provider.calls(), 3);
}

#[test]
fn retryable_transport_failure_consumes_an_attempt() {
    let provider = ScriptedProvider::new(vec![
        Reply::Fail { message: "status 500", retryable: true },
        Reply::Text("return a + b"),
    ]);
    let imp = synthesize(&provider, &add_stub(), &allowlist(), &opts(3)).expect("synthesis ok");
    assert_eq!(imp.attempt_count, 2);
    // No candidate to quote after a transport failure, only the error.
    let prompts = provider.prompts.borrow();
    assert!(!prompts[1].contains("PREVIOUS_ATTEMPT"));
    assert!(prompts[1].contains("status 500"));
}

#[test]
fn non_retryable_transport_aborts_immediately() {
    let provider = ScriptedProvider::new(vec![Reply::Fail {
        message: "status 401 bad credentials",
        retryable: false,
    }]);
    let err = synthesize(&provider, &add_stub(), &allowlist(), &opts(3)).unwrap_err();
    assert!(matches!(err, Error::Transport { retryable: false, .. }));
    assert_eq!(provider.calls(), 1);
}

#[test]
fn placeholder_candidate_is_rejected_and_retried() {
    let provider = ScriptedProvider::new(vec![
        Reply::Text("..."),
        Reply::Text("return a + b"),
    ]);
    let imp = synthesize(&provider, &add_stub(), &allowlist(), &opts(3)).expect("synthesis ok");
    assert_eq!(imp.attempt_count, 2);
}

#[test]
fn bare_stub_still_gets_a_synthesis_attempt() {
    let src = "fn mystery(a, b):\n  ...\nend\n";
    let stub = extract_stubs(src).expect("parse ok").remove(0);
    let provider = ScriptedProvider::new(vec![Reply::Text("return null")]);
    let imp = synthesize(&provider, &stub, &allowlist(), &opts(3)).expect("synthesis ok");
    assert_eq!(imp.attempt_count, 1);
}

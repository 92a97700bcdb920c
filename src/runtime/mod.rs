use std::collections::HashMap;

use crate::ai::CompletionProvider;
use crate::ast::{FnDecl, Item, StubFunction};
use crate::engine::{synthesize, SynthesisOptions};
use crate::error::{Error, Result};
use crate::extract::{is_stub_body, stub_from_decl};
use crate::fingerprint::{fingerprint, Cache};
use crate::interp::{self, call_builtin, is_builtin, run_sandboxed, Dispatcher, Flow, Scope, Value};
use crate::parser::parse_source;

#[derive(Clone)]
enum Callable {
  Script(FnDecl),
  Stub(StubFunction),
}

/// The run-scoped callable table plus everything stub dispatch needs:
/// provider, allow-list, synthesis options, and the fingerprint cache.
/// The table is built before any top-level statement runs, so every call
/// site already resolves to the wrapper.
pub struct Session<'p> {
  provider: &'p dyn CompletionProvider,
  opts: SynthesisOptions,
  allowlist: Vec<String>,
  functions: HashMap<String, Callable>,
  cache: Cache,
}

impl<'p> Session<'p> {
  fn call_script_fn(&mut self, decl: &FnDecl, args: Vec<Value>) -> Result<Value> {
    if args.len() != decl.params.len() {
      return Err(Error::runtime(format!(
        "{}() takes {} argument(s), got {}",
        decl.name,
        decl.params.len(),
        args.len()
      )));
    }
    let mut scope = Scope::new();
    for (param, value) in decl.params.iter().zip(args) {
      scope.vars.insert(param.name.clone(), value);
    }
    match interp::exec_block(&decl.body, &mut scope, self)? {
      Flow::Return(value) => Ok(value),
      Flow::Normal => Ok(Value::Null),
      Flow::Break | Flow::Continue => {
        Err(Error::runtime(format!("'break' or 'continue' outside a loop in {}()", decl.name)))
      }
    }
  }

  /// First call synthesizes and installs; every later call bound to the
  /// same fingerprint reuses the cached implementation. Only the code is
  /// cached; each call re-executes it with its own arguments.
  fn call_stub(&mut self, stub: &StubFunction, args: Vec<Value>) -> Result<Value> {
    let fp = fingerprint(stub);
    if self.cache.get(&fp).is_none() {
      if self.opts.verbose {
        eprintln!("[drizzle] first call of '{}', synthesizing", stub.name);
      }
      let imp = synthesize(self.provider, stub, &self.allowlist, &self.opts)?;
      if self.opts.verbose {
        eprintln!(
          "[drizzle] installed '{}' after {} attempt(s):\n{}",
          stub.name, imp.attempt_count, imp.source_text
        );
      }
      self.cache.insert(fp.clone(), imp);
    }
    let imp = match self.cache.get(&fp) {
      Some(imp) => imp,
      None => return Err(Error::runtime(format!("no implementation cached for '{}'", stub.name))),
    };
    run_sandboxed(&imp.body, stub, &args, &self.allowlist)
  }
}

impl Dispatcher for Session<'_> {
  fn dispatch(&mut self, name: &str, args: Vec<Value>) -> Result<Value> {
    if let Some(callable) = self.functions.get(name).cloned() {
      return match callable {
        Callable::Script(decl) => self.call_script_fn(&decl, args),
        Callable::Stub(stub) => self.call_stub(&stub, args),
      };
    }
    if is_builtin(name) {
      return call_builtin(name, &args);
    }
    Err(Error::runtime(format!("unknown function '{}'", name)))
  }

  fn lookup_global(&self, name: &str) -> Option<Value> {
    // Lets hand-written bodies spell `raise NotImplemented`.
    if name == "NotImplemented" {
      return Some(Value::Str("not implemented".to_string()));
    }
    None
  }
}

/// Parse the script, install a wrapper for every placeholder function, and
/// execute the remaining top-level statements in source order. Functions
/// with real bodies pass through untouched.
pub fn install_and_run(
  source: &str,
  provider: &dyn CompletionProvider,
  allowlist: Vec<String>,
  opts: SynthesisOptions,
) -> Result<()> {
  let script = parse_source(source)?;

  let mut functions = HashMap::new();
  let mut stub_names = Vec::new();
  for item in &script.items {
    if let Item::Fn(decl) = item {
      if functions.contains_key(&decl.name) {
        return Err(Error::runtime(format!("duplicate function '{}'", decl.name)));
      }
      if is_stub_body(&decl.body) {
        let stub = stub_from_decl(decl);
        stub_names.push(stub.name.clone());
        functions.insert(decl.name.clone(), Callable::Stub(stub));
      } else {
        functions.insert(decl.name.clone(), Callable::Script(decl.clone()));
      }
    }
  }

  if opts.verbose && !stub_names.is_empty() {
    eprintln!(
      "[drizzle] found {} stub function(s): {}",
      stub_names.len(),
      stub_names.join(", ")
    );
  }

  let mut session = Session {
    provider,
    opts,
    allowlist,
    functions,
    cache: Cache::new(),
  };

  let mut top = Scope::new();
  for item in &script.items {
    if let Item::Stmt(stmt) = item {
      match interp::exec_block(std::slice::from_ref(stmt), &mut top, &mut session)? {
        Flow::Normal => {}
        Flow::Return(_) => return Err(Error::runtime("'return' outside a function")),
        Flow::Break | Flow::Continue => {
          return Err(Error::runtime("'break' or 'continue' outside a loop"))
        }
      }
    }
  }
  Ok(())
}

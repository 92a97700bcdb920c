use std::collections::HashMap;
use std::fmt;

use crate::ast::{AssignOp, BinaryOp, Expr, Stmt, StubFunction, UnaryOp};
use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
  Null,
  Bool(bool),
  Number(f64),
  Str(String),
  List(Vec<Value>),
}

impl fmt::Display for Value {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Value::Null => write!(f, "null"),
      Value::Bool(b) => write!(f, "{}", b),
      Value::Number(n) => {
        if n.fract() == 0.0 && n.is_finite() && n.abs() < 1e15 {
          write!(f, "{}", *n as i64)
        } else {
          write!(f, "{}", n)
        }
      }
      Value::Str(s) => write!(f, "{}", s),
      Value::List(items) => {
        write!(f, "[")?;
        for (i, item) in items.iter().enumerate() {
          if i > 0 {
            write!(f, ", ")?;
          }
          match item {
            Value::Str(s) => write!(f, "\"{}\"", s)?,
            other => write!(f, "{}", other)?,
          }
        }
        write!(f, "]")
      }
    }
  }
}

pub fn truthy(value: &Value) -> bool {
  match value {
    Value::Null => false,
    Value::Bool(b) => *b,
    Value::Number(n) => *n != 0.0,
    Value::Str(s) => !s.is_empty(),
    Value::List(items) => !items.is_empty(),
  }
}

/// Local variable bindings for one execution frame.
#[derive(Default)]
pub struct Scope {
  pub vars: HashMap<String, Value>,
}

impl Scope {
  pub fn new() -> Self {
    Self::default()
  }
}

/// Resolution of everything a frame cannot answer locally: calls by name
/// and free-variable lookups. The host runner and the sandbox implement
/// this differently; that difference is the sandbox.
pub trait Dispatcher {
  fn dispatch(&mut self, name: &str, args: Vec<Value>) -> Result<Value>;
  fn lookup_global(&self, name: &str) -> Option<Value>;
}

pub enum Flow {
  Normal,
  Return(Value),
  Break,
  Continue,
}

pub fn exec_block(stmts: &[Stmt], scope: &mut Scope, d: &mut dyn Dispatcher) -> Result<Flow> {
  for stmt in stmts {
    match exec_stmt(stmt, scope, d)? {
      Flow::Normal => {}
      other => return Ok(other),
    }
  }
  Ok(Flow::Normal)
}

fn exec_stmt(stmt: &Stmt, scope: &mut Scope, d: &mut dyn Dispatcher) -> Result<Flow> {
  match stmt {
    Stmt::Assign { target, op, value } => {
      let value = eval_expr(value, scope, d)?;
      let new = match op {
        AssignOp::Set => value,
        AssignOp::Add => {
          let current = scope
            .vars
            .get(target)
            .cloned()
            .or_else(|| d.lookup_global(target))
            .ok_or_else(|| Error::runtime(format!("undefined variable '{}'", target)))?;
          binary_add(&current, &value)?
        }
      };
      scope.vars.insert(target.clone(), new);
      Ok(Flow::Normal)
    }
    Stmt::Return(value) => {
      let value = match value {
        Some(expr) => eval_expr(expr, scope, d)?,
        None => Value::Null,
      };
      Ok(Flow::Return(value))
    }
    Stmt::Raise(expr) => {
      let value = eval_expr(expr, scope, d)?;
      Err(Error::runtime(value.to_string()))
    }
    Stmt::Pass | Stmt::Placeholder => Ok(Flow::Normal),
    Stmt::If { cond, then_body, else_body } => {
      let cond = eval_expr(cond, scope, d)?;
      if truthy(&cond) {
        exec_block(then_body, scope, d)
      } else {
        exec_block(else_body, scope, d)
      }
    }
    Stmt::While { cond, body } => {
      loop {
        let c = eval_expr(cond, scope, d)?;
        if !truthy(&c) {
          break;
        }
        match exec_block(body, scope, d)? {
          Flow::Normal | Flow::Continue => {}
          Flow::Break => break,
          Flow::Return(v) => return Ok(Flow::Return(v)),
        }
      }
      Ok(Flow::Normal)
    }
    Stmt::For { var, iter, body } => {
      let iter = eval_expr(iter, scope, d)?;
      let items: Vec<Value> = match iter {
        Value::List(items) => items,
        Value::Str(s) => s.chars().map(|c| Value::Str(c.to_string())).collect(),
        other => {
          return Err(Error::runtime(format!("cannot iterate over {}", type_name(&other))))
        }
      };
      for item in items {
        scope.vars.insert(var.clone(), item);
        match exec_block(body, scope, d)? {
          Flow::Normal | Flow::Continue => {}
          Flow::Break => break,
          Flow::Return(v) => return Ok(Flow::Return(v)),
        }
      }
      Ok(Flow::Normal)
    }
    Stmt::Break => Ok(Flow::Break),
    Stmt::Continue => Ok(Flow::Continue),
    Stmt::Expr(expr) => {
      eval_expr(expr, scope, d)?;
      Ok(Flow::Normal)
    }
  }
}

pub fn eval_expr(expr: &Expr, scope: &mut Scope, d: &mut dyn Dispatcher) -> Result<Value> {
  match expr {
    Expr::Number(n) => Ok(Value::Number(*n)),
    Expr::String(s) => Ok(Value::Str(s.clone())),
    Expr::Bool(b) => Ok(Value::Bool(*b)),
    Expr::Null => Ok(Value::Null),
    Expr::Ident(name) => scope
      .vars
      .get(name)
      .cloned()
      .or_else(|| d.lookup_global(name))
      .ok_or_else(|| Error::runtime(format!("undefined variable '{}'", name))),
    Expr::List(items) => {
      let mut out = Vec::with_capacity(items.len());
      for item in items {
        out.push(eval_expr(item, scope, d)?);
      }
      Ok(Value::List(out))
    }
    Expr::Call(call) => {
      let mut args = Vec::with_capacity(call.args.len());
      for arg in &call.args {
        args.push(eval_expr(arg, scope, d)?);
      }
      d.dispatch(&call.name, args)
    }
    Expr::Index { target, index } => {
      let target = eval_expr(target, scope, d)?;
      let index = eval_expr(index, scope, d)?;
      eval_index(&target, &index)
    }
    Expr::Unary { op, expr } => {
      let value = eval_expr(expr, scope, d)?;
      match op {
        UnaryOp::Neg => match value {
          Value::Number(n) => Ok(Value::Number(-n)),
          other => Err(Error::runtime(format!("cannot negate {}", type_name(&other)))),
        },
        UnaryOp::Not => Ok(Value::Bool(!truthy(&value))),
      }
    }
    Expr::Binary { left, op, right } => {
      // and/or short-circuit and yield the deciding operand.
      if *op == BinaryOp::And {
        let l = eval_expr(left, scope, d)?;
        if !truthy(&l) {
          return Ok(l);
        }
        return eval_expr(right, scope, d);
      }
      if *op == BinaryOp::Or {
        let l = eval_expr(left, scope, d)?;
        if truthy(&l) {
          return Ok(l);
        }
        return eval_expr(right, scope, d);
      }
      let l = eval_expr(left, scope, d)?;
      let r = eval_expr(right, scope, d)?;
      eval_binary(&l, *op, &r)
    }
  }
}

fn eval_index(target: &Value, index: &Value) -> Result<Value> {
  let idx = match index {
    Value::Number(n) if n.fract() == 0.0 && *n >= 0.0 => *n as usize,
    other => {
      return Err(Error::runtime(format!(
        "index must be a non-negative integer, got {}",
        other
      )))
    }
  };
  match target {
    Value::List(items) => items
      .get(idx)
      .cloned()
      .ok_or_else(|| Error::runtime(format!("index {} out of range (len {})", idx, items.len()))),
    Value::Str(s) => s
      .chars()
      .nth(idx)
      .map(|c| Value::Str(c.to_string()))
      .ok_or_else(|| {
        Error::runtime(format!("index {} out of range (len {})", idx, s.chars().count()))
      }),
    other => Err(Error::runtime(format!("cannot index {}", type_name(other)))),
  }
}

fn eval_binary(l: &Value, op: BinaryOp, r: &Value) -> Result<Value> {
  match op {
    BinaryOp::Add => binary_add(l, r),
    BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div | BinaryOp::Mod => {
      let (a, b) = match (l, r) {
        (Value::Number(a), Value::Number(b)) => (*a, *b),
        _ => {
          return Err(Error::runtime(format!(
            "unsupported operand types for '{}': {} and {}",
            op_symbol(op),
            type_name(l),
            type_name(r)
          )))
        }
      };
      let out = match op {
        BinaryOp::Sub => a - b,
        BinaryOp::Mul => a * b,
        BinaryOp::Div => {
          if b == 0.0 {
            return Err(Error::runtime("division by zero"));
          }
          a / b
        }
        BinaryOp::Mod => {
          if b == 0.0 {
            return Err(Error::runtime("modulo by zero"));
          }
          a % b
        }
        _ => unreachable!(),
      };
      Ok(Value::Number(out))
    }
    BinaryOp::Eq => Ok(Value::Bool(l == r)),
    BinaryOp::Neq => Ok(Value::Bool(l != r)),
    BinaryOp::Lt | BinaryOp::Lte | BinaryOp::Gt | BinaryOp::Gte => {
      let ordering = match (l, r) {
        (Value::Number(a), Value::Number(b)) => a.partial_cmp(b),
        (Value::Str(a), Value::Str(b)) => Some(a.cmp(b)),
        _ => None,
      };
      let Some(ordering) = ordering else {
        return Err(Error::runtime(format!(
          "cannot compare {} and {}",
          type_name(l),
          type_name(r)
        )));
      };
      let result = match op {
        BinaryOp::Lt => ordering == std::cmp::Ordering::Less,
        BinaryOp::Lte => ordering != std::cmp::Ordering::Greater,
        BinaryOp::Gt => ordering == std::cmp::Ordering::Greater,
        BinaryOp::Gte => ordering != std::cmp::Ordering::Less,
        _ => unreachable!(),
      };
      Ok(Value::Bool(result))
    }
    BinaryOp::And | BinaryOp::Or => unreachable!("short-circuited in eval_expr"),
  }
}

fn binary_add(l: &Value, r: &Value) -> Result<Value> {
  match (l, r) {
    (Value::Number(a), Value::Number(b)) => Ok(Value::Number(a + b)),
    (Value::Str(a), Value::Str(b)) => Ok(Value::Str(format!("{}{}", a, b))),
    (Value::List(a), Value::List(b)) => {
      let mut out = a.clone();
      out.extend(b.iter().cloned());
      Ok(Value::List(out))
    }
    _ => Err(Error::runtime(format!(
      "unsupported operand types for '+': {} and {}",
      type_name(l),
      type_name(r)
    ))),
  }
}

fn op_symbol(op: BinaryOp) -> &'static str {
  match op {
    BinaryOp::Add => "+",
    BinaryOp::Sub => "-",
    BinaryOp::Mul => "*",
    BinaryOp::Div => "/",
    BinaryOp::Mod => "%",
    BinaryOp::Eq => "==",
    BinaryOp::Neq => "!=",
    BinaryOp::Lt => "<",
    BinaryOp::Lte => "<=",
    BinaryOp::Gt => ">",
    BinaryOp::Gte => ">=",
    BinaryOp::And => "and",
    BinaryOp::Or => "or",
  }
}

pub fn type_name(value: &Value) -> &'static str {
  match value {
    Value::Null => "null",
    Value::Bool(_) => "bool",
    Value::Number(_) => "number",
    Value::Str(_) => "string",
    Value::List(_) => "list",
  }
}

// --- builtin capability registry ---

pub const BUILTIN_NAMES: &[&str] = &[
  "print", "len", "str", "num", "abs", "min", "max", "floor", "round", "sqrt", "range", "push",
  "join", "split", "upper", "lower", "trim", "contains",
];

pub fn is_builtin(name: &str) -> bool {
  BUILTIN_NAMES.contains(&name)
}

pub fn call_builtin(name: &str, args: &[Value]) -> Result<Value> {
  match name {
    "print" => {
      let line = args.iter().map(|v| v.to_string()).collect::<Vec<_>>().join(" ");
      println!("{}", line);
      Ok(Value::Null)
    }
    "len" => {
      check_arity(name, args, 1)?;
      match &args[0] {
        Value::Str(s) => Ok(Value::Number(s.chars().count() as f64)),
        Value::List(items) => Ok(Value::Number(items.len() as f64)),
        other => Err(Error::runtime(format!("len() does not apply to {}", type_name(other)))),
      }
    }
    "str" => {
      check_arity(name, args, 1)?;
      Ok(Value::Str(args[0].to_string()))
    }
    "num" => {
      check_arity(name, args, 1)?;
      match &args[0] {
        Value::Number(n) => Ok(Value::Number(*n)),
        Value::Bool(b) => Ok(Value::Number(if *b { 1.0 } else { 0.0 })),
        Value::Str(s) => s
          .trim()
          .parse::<f64>()
          .map(Value::Number)
          .map_err(|_| Error::runtime(format!("num() cannot parse '{}'", s))),
        other => Err(Error::runtime(format!("num() does not apply to {}", type_name(other)))),
      }
    }
    "abs" => Ok(Value::Number(number_arg(name, args, 0, 1)?.abs())),
    "floor" => Ok(Value::Number(number_arg(name, args, 0, 1)?.floor())),
    "round" => Ok(Value::Number(number_arg(name, args, 0, 1)?.round())),
    "sqrt" => {
      let n = number_arg(name, args, 0, 1)?;
      if n < 0.0 {
        return Err(Error::runtime("sqrt() of a negative number"));
      }
      Ok(Value::Number(n.sqrt()))
    }
    "min" | "max" => fold_extremum(name, args),
    "range" => {
      let (start, stop) = match args.len() {
        1 => (0.0, number_arg(name, args, 0, 1)?),
        2 => (number_arg(name, args, 0, 2)?, number_arg(name, args, 1, 2)?),
        n => return Err(Error::runtime(format!("range() takes 1 or 2 arguments, got {}", n))),
      };
      let mut items = Vec::new();
      let mut current = start;
      while current < stop {
        items.push(Value::Number(current));
        current += 1.0;
      }
      Ok(Value::List(items))
    }
    "push" => {
      check_arity(name, args, 2)?;
      match &args[0] {
        Value::List(items) => {
          let mut out = items.clone();
          out.push(args[1].clone());
          Ok(Value::List(out))
        }
        other => Err(Error::runtime(format!("push() expects a list, got {}", type_name(other)))),
      }
    }
    "join" => {
      check_arity(name, args, 2)?;
      match (&args[0], &args[1]) {
        (Value::List(items), Value::Str(sep)) => {
          let parts = items.iter().map(|v| v.to_string()).collect::<Vec<_>>();
          Ok(Value::Str(parts.join(sep)))
        }
        _ => Err(Error::runtime("join() expects a list and a separator string")),
      }
    }
    "split" => {
      check_arity(name, args, 2)?;
      match (&args[0], &args[1]) {
        (Value::Str(s), Value::Str(sep)) if !sep.is_empty() => Ok(Value::List(
          s.split(sep.as_str()).map(|p| Value::Str(p.to_string())).collect(),
        )),
        _ => Err(Error::runtime("split() expects a string and a non-empty separator")),
      }
    }
    "upper" => Ok(Value::Str(str_arg(name, args)?.to_uppercase())),
    "lower" => Ok(Value::Str(str_arg(name, args)?.to_lowercase())),
    "trim" => Ok(Value::Str(str_arg(name, args)?.trim().to_string())),
    "contains" => {
      check_arity(name, args, 2)?;
      match (&args[0], &args[1]) {
        (Value::Str(s), Value::Str(needle)) => Ok(Value::Bool(s.contains(needle.as_str()))),
        (Value::List(items), needle) => Ok(Value::Bool(items.contains(needle))),
        _ => Err(Error::runtime("contains() expects a string or list haystack")),
      }
    }
    other => Err(Error::runtime(format!("unknown builtin '{}'", other))),
  }
}

fn check_arity(name: &str, args: &[Value], expected: usize) -> Result<()> {
  if args.len() != expected {
    return Err(Error::runtime(format!(
      "{}() takes {} argument(s), got {}",
      name,
      expected,
      args.len()
    )));
  }
  Ok(())
}

fn number_arg(name: &str, args: &[Value], index: usize, expected: usize) -> Result<f64> {
  check_arity(name, args, expected)?;
  match &args[index] {
    Value::Number(n) => Ok(*n),
    other => Err(Error::runtime(format!(
      "{}() expects a number, got {}",
      name,
      type_name(other)
    ))),
  }
}

fn str_arg<'a>(name: &str, args: &'a [Value]) -> Result<&'a str> {
  check_arity(name, args, 1)?;
  match &args[0] {
    Value::Str(s) => Ok(s.as_str()),
    other => Err(Error::runtime(format!(
      "{}() expects a string, got {}",
      name,
      type_name(other)
    ))),
  }
}

fn fold_extremum(name: &str, args: &[Value]) -> Result<Value> {
  let numbers: Vec<f64> = match args {
    [Value::List(items)] => items
      .iter()
      .map(|v| match v {
        Value::Number(n) => Ok(*n),
        other => Err(Error::runtime(format!(
          "{}() expects numbers, got {}",
          name,
          type_name(other)
        ))),
      })
      .collect::<Result<_>>()?,
    _ => args
      .iter()
      .map(|v| match v {
        Value::Number(n) => Ok(*n),
        other => Err(Error::runtime(format!(
          "{}() expects numbers, got {}",
          name,
          type_name(other)
        ))),
      })
      .collect::<Result<_>>()?,
  };
  if numbers.is_empty() {
    return Err(Error::runtime(format!("{}() of an empty sequence", name)));
  }
  let folded = numbers
    .into_iter()
    .reduce(|a, b| if (name == "min") == (b < a) { b } else { a })
    .unwrap_or(0.0);
  Ok(Value::Number(folded))
}

// --- sandboxed execution of generated bodies ---

struct SandboxDispatcher<'a> {
  allowlist: &'a [String],
}

impl Dispatcher for SandboxDispatcher<'_> {
  fn dispatch(&mut self, name: &str, args: Vec<Value>) -> Result<Value> {
    if is_builtin(name) && self.allowlist.iter().any(|c| c == name) {
      return call_builtin(name, &args);
    }
    Err(Error::runtime(format!(
      "unknown name '{}' (not in the capability allow-list)",
      name
    )))
  }

  fn lookup_global(&self, _name: &str) -> Option<Value> {
    None
  }
}

/// Run a validated implementation body against one call's arguments. The
/// namespace holds exactly the bound parameters plus the allow-listed
/// builtins; anything else resolves to a runtime error, never a retry.
pub fn run_sandboxed(
  body: &[Stmt],
  stub: &StubFunction,
  args: &[Value],
  allowlist: &[String],
) -> Result<Value> {
  if args.len() != stub.params.len() {
    return Err(Error::runtime(format!(
      "{}() takes {} argument(s), got {}",
      stub.name,
      stub.params.len(),
      args.len()
    )));
  }
  let mut scope = Scope::new();
  for (param, value) in stub.params.iter().zip(args.iter()) {
    scope.vars.insert(param.name.clone(), value.clone());
  }
  let mut dispatcher = SandboxDispatcher { allowlist };
  match exec_block(body, &mut scope, &mut dispatcher)? {
    Flow::Return(value) => Ok(value),
    Flow::Normal => Ok(Value::Null),
    Flow::Break | Flow::Continue => {
      Err(Error::runtime(format!("'break' or 'continue' outside a loop in {}()", stub.name)))
    }
  }
}

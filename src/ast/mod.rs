use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Script {
  pub items: Vec<Item>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Item {
  Fn(FnDecl),
  Stmt(Stmt),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FnDecl {
  pub name: String,
  pub params: Vec<Param>,
  pub return_type: Option<String>,
  pub docstring: Option<String>,
  pub body: Vec<Stmt>,
  pub line: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Param {
  pub name: String,
  pub ty: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Stmt {
  Assign { target: String, op: AssignOp, value: Expr },
  Return(Option<Expr>),
  Raise(Expr),
  Pass,
  Placeholder,
  If { cond: Expr, then_body: Vec<Stmt>, else_body: Vec<Stmt> },
  While { cond: Expr, body: Vec<Stmt> },
  For { var: String, iter: Expr, body: Vec<Stmt> },
  Break,
  Continue,
  Expr(Expr),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum AssignOp {
  Set,
  Add,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Expr {
  Number(f64),
  String(String),
  Bool(bool),
  Null,
  Ident(String),
  List(Vec<Expr>),
  Call(Call),
  Index { target: Box<Expr>, index: Box<Expr> },
  Unary { op: UnaryOp, expr: Box<Expr> },
  Binary { left: Box<Expr>, op: BinaryOp, right: Box<Expr> },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Call {
  pub name: String,
  pub args: Vec<Expr>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnaryOp {
  Neg,
  Not,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BinaryOp {
  Add,
  Sub,
  Mul,
  Div,
  Mod,
  Eq,
  Neq,
  Lt,
  Lte,
  Gt,
  Gte,
  And,
  Or,
}

/// Static description of one unimplemented function, created once at parse
/// time and never mutated. The body placeholder itself is deliberately not
/// recorded: it carries no semantic content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StubFunction {
  pub name: String,
  pub params: Vec<Param>,
  pub return_type: Option<String>,
  pub docstring: Option<String>,
  pub line: usize,
}

impl StubFunction {
  /// Render the declared signature the way it appears in a script,
  /// e.g. `fn add(a: int, b: int) -> int`.
  pub fn signature(&self) -> String {
    let params = self
      .params
      .iter()
      .map(|p| match &p.ty {
        Some(ty) => format!("{}: {}", p.name, ty),
        None => p.name.clone(),
      })
      .collect::<Vec<_>>()
      .join(", ");
    let mut sig = format!("fn {}({})", self.name, params);
    if let Some(rt) = &self.return_type {
      sig.push_str(" -> ");
      sig.push_str(rt);
    }
    sig
  }
}

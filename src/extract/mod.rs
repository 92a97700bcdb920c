use crate::ast::{Expr, FnDecl, Item, Stmt, StubFunction};
use crate::error::Result;
use crate::parser::parse_source;

/// Scan source text for top-level functions whose body is a placeholder.
/// Returned in source order. A parse failure here is fatal for the run:
/// without a tree there is nothing to scan.
pub fn extract_stubs(source: &str) -> Result<Vec<StubFunction>> {
  let script = parse_source(source)?;
  let stubs = script
    .items
    .iter()
    .filter_map(|item| match item {
      Item::Fn(decl) if is_stub_body(&decl.body) => Some(stub_from_decl(decl)),
      _ => None,
    })
    .collect();
  Ok(stubs)
}

/// A body qualifies iff it is exactly one placeholder statement: `...`,
/// `pass`, or `raise NotImplemented`. The docstring was already split off
/// by the parser, and a body left empty by that split also counts.
/// Anything else, even alongside a placeholder, is a real implementation.
pub fn is_stub_body(body: &[Stmt]) -> bool {
  if body.is_empty() {
    return true;
  }
  if body.len() != 1 {
    return false;
  }
  match &body[0] {
    Stmt::Placeholder | Stmt::Pass => true,
    Stmt::Raise(Expr::Ident(name)) => name == "NotImplemented",
    Stmt::Raise(Expr::Call(call)) => call.name == "NotImplemented",
    _ => false,
  }
}

pub fn stub_from_decl(decl: &FnDecl) -> StubFunction {
  StubFunction {
    name: decl.name.clone(),
    params: decl.params.clone(),
    return_type: decl.return_type.clone(),
    docstring: decl.docstring.clone(),
    line: decl.line,
  }
}

use crate::ast::StubFunction;

/// Grammar cheat sheet included in every synthesis prompt. The model is
/// writing drizzle, not a mainstream language, so the prompt has to carry
/// the rules it may assume.
const LANGUAGE_PRIMER: &str = "\
Drizzle is a small line-oriented scripting language.
Blocks open with ':' and close with 'end'. Statements are separated by newlines.
  x = 1                     assignment ('x += e' accumulates)
  if cond: ... else: ... end
  while cond: ... end
  for item in seq: ... end
  return expr               raise expr    break    continue
Values: numbers, strings (\"...\"), true, false, null, lists like [1, 2].
Operators: + - * / %   == != < <= > >=   and or not   xs[i] indexing.
'+' adds numbers and concatenates strings or lists. Lists are immutable;
push(xs, v) returns a new list. There are no methods: everything is a call
like len(xs). Comments start with '#'.";

/// Feedback from a failed attempt, threaded into the next prompt so the
/// model can self-correct. `candidate` is absent when the attempt died in
/// transport and there is no text to quote.
pub struct Feedback {
  pub candidate: Option<String>,
  pub error: String,
}

pub fn build_prompt(stub: &StubFunction, allowlist: &[String], feedback: Option<&Feedback>) -> String {
  let mut input = String::new();
  input.push_str("You are the drizzle function synthesizer. Write the implementation of one declared function.\n");
  input.push_str("Output only drizzle source code. No explanations, no markdown fences.\n");

  input.push_str("\nLANGUAGE:\n");
  input.push_str(LANGUAGE_PRIMER);
  input.push('\n');

  input.push_str("\nSIGNATURE:\n");
  input.push_str(&stub.signature());
  input.push('\n');

  input.push_str("\nDESCRIPTION:\n");
  match &stub.docstring {
    Some(doc) => input.push_str(doc),
    None => input.push_str("(no description given; infer the behavior from the name and signature)"),
  }
  input.push('\n');

  input.push_str("\nCAPABILITIES:\n");
  input.push_str("You may call only these builtin functions: ");
  input.push_str(&allowlist.join(", "));
  input.push_str(".\nNothing else exists. Do not reference any other function, module, or global variable.\n");

  input.push_str("\nOUTPUT:\n");
  input.push_str("Emit the statements of the function body, or the complete fn ... end definition.\n");
  input.push_str("The body must be a real implementation, not '...', 'pass', or 'raise NotImplemented'.\n");

  if let Some(feedback) = feedback {
    if let Some(candidate) = &feedback.candidate {
      input.push_str("\nPREVIOUS_ATTEMPT:\n");
      input.push_str(candidate);
      input.push('\n');
    }
    input.push_str("\nERROR:\n");
    input.push_str(&feedback.error);
    input.push_str("\nFix this and emit a corrected implementation.\n");
  }

  input
}

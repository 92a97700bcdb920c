use drizzle::extract::extract_stubs;

#[test]
fn detects_each_placeholder_form() {
    let src = r#"fn a():
  ...
end

fn b():
  pass
end

fn c():
  raise NotImplemented
end
"#;
    let stubs = extract_stubs(src).expect("parse ok");
    let names: Vec<_> = stubs.iter().map(|s| s.name.as_str()).collect();
    assert_eq!(names, vec!["a", "b", "c"]);
}

#[test]
fn docstring_plus_placeholder_is_a_stub() {
    let src = r#"fn summarize(text: str) -> str:
  "Summarize the text in one sentence."
  ...
end
"#;
    let stubs = extract_stubs(src).expect("parse ok");
    assert_eq!(stubs.len(), 1);
    assert_eq!(stubs[0].docstring.as_deref(), Some("Summarize the text in one sentence."));
}

#[test]
fn docstring_only_body_is_a_stub() {
    let src = r#"fn describe(n: int) -> str:
  "Describe the number in words."
end
"#;
    let stubs = extract_stubs(src).expect("parse ok");
    assert_eq!(stubs.len(), 1);
}

#[test]
fn placeholder_plus_real_statement_is_not_a_stub() {
    let src = r#"fn f(x: int) -> int:
  ...
  return x
end
"#;
    let stubs = extract_stubs(src).expect("parse ok");
    assert!(stubs.is_empty());
}

#[test]
fn real_body_is_not_a_stub() {
    let src = r#"fn double(x: int) -> int:
  return x * 2
end
"#;
    let stubs = extract_stubs(src).expect("parse ok");
    assert!(stubs.is_empty());
}

#[test]
fn raise_with_message_is_not_a_stub() {
    // Only the NotImplemented spelling marks a stub; a real raise is a
    // deliberate one-statement implementation.
    let src = r#"fn f():
  raise "boom"
end
"#;
    let stubs = extract_stubs(src).expect("parse ok");
    assert!(stubs.is_empty());
}

#[test]
fn records_signature_details_in_source_order() {
    let src = r#"fn first(a: int, b) -> int:
  ...
end

x = 1

fn second(text: str):
  pass
end
"#;
    let stubs = extract_stubs(src).expect("parse ok");
    assert_eq!(stubs.len(), 2);
    assert_eq!(stubs[0].name, "first");
    assert_eq!(stubs[0].params[0].ty.as_deref(), Some("int"));
    assert_eq!(stubs[0].params[1].ty, None);
    assert_eq!(stubs[0].return_type.as_deref(), Some("int"));
    assert_eq!(stubs[0].line, 1);
    assert_eq!(stubs[1].name, "second");
    assert_eq!(stubs[1].return_type, None);
    assert_eq!(stubs[1].line, 7);
}

#[test]
fn whole_script_parse_failure_is_fatal() {
    assert!(extract_stubs("fn broken(:\n").is_err());
}

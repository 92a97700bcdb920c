use drizzle::extract::extract_stubs;
use drizzle::fingerprint::fingerprint;

fn single_stub(src: &str) -> drizzle::ast::StubFunction {
    let stubs = extract_stubs(src).expect("parse ok");
    assert_eq!(stubs.len(), 1, "expected one stub in fixture");
    stubs.into_iter().next().unwrap()
}

#[test]
fn fingerprint_is_idempotent() {
    let stub = single_stub("fn add(a: int, b: int) -> int:\n  \"sum\"\n  ...\nend\n");
    assert_eq!(fingerprint(&stub), fingerprint(&stub));
}

#[test]
fn placeholder_style_does_not_matter() {
    let a = single_stub("fn add(a: int, b: int) -> int:\n  \"sum\"\n  ...\nend\n");
    let b = single_stub("fn add(a: int, b: int) -> int:\n  \"sum\"\n  raise NotImplemented\nend\n");
    let c = single_stub("fn add(a: int, b: int) -> int:\n  \"sum\"\n  pass\nend\n");
    assert_eq!(fingerprint(&a), fingerprint(&b));
    assert_eq!(fingerprint(&a), fingerprint(&c));
}

#[test]
fn docstring_change_changes_fingerprint() {
    let a = single_stub("fn f():\n  \"returns one\"\n  ...\nend\n");
    let b = single_stub("fn f():\n  \"returns two\"\n  ...\nend\n");
    assert_ne!(fingerprint(&a), fingerprint(&b));
}

#[test]
fn signature_change_changes_fingerprint() {
    let a = single_stub("fn f(a: int):\n  ...\nend\n");
    let b = single_stub("fn f(a: int, b: int):\n  ...\nend\n");
    let c = single_stub("fn f(a: str):\n  ...\nend\n");
    assert_ne!(fingerprint(&a), fingerprint(&b));
    assert_ne!(fingerprint(&a), fingerprint(&c));
}

#[test]
fn missing_annotation_differs_from_annotated() {
    let untyped = single_stub("fn f(a):\n  ...\nend\n");
    let typed = single_stub("fn f(a: int):\n  ...\nend\n");
    assert_ne!(fingerprint(&untyped), fingerprint(&typed));
}

#[test]
fn bare_stub_fingerprint_is_computable() {
    // No types, no docstring: sentinels substitute and hashing still works.
    let stub = single_stub("fn mystery(a, b):\n  ...\nend\n");
    assert_eq!(fingerprint(&stub).as_hex().len(), 64);
}

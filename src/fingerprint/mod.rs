use std::collections::HashMap;

use sha2::Digest;

use crate::ast::StubFunction;
use crate::engine::GeneratedImplementation;

// Absent annotations serialize as a sentinel rather than being omitted:
// omission would collide a stub with `a` against one with `a: int` dropped.
const ABSENT: &str = "<none>";
const SEP: char = '\u{1f}';

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Fingerprint(String);

impl Fingerprint {
  pub fn as_hex(&self) -> &str {
    &self.0
  }
}

/// Stable identity of a synthesis target: name, parameter signature,
/// return type, docstring. Body placeholder style and call arguments are
/// excluded, so `...` and `raise NotImplemented` variants of the same
/// declaration fingerprint identically.
pub fn fingerprint(stub: &StubFunction) -> Fingerprint {
  let canonical = canonical_identity(stub);
  let mut hasher = sha2::Sha256::new();
  hasher.update(canonical.as_bytes());
  Fingerprint(format!("{:x}", hasher.finalize()))
}

fn canonical_identity(stub: &StubFunction) -> String {
  let mut parts = Vec::new();
  parts.push(stub.name.clone());
  for param in &stub.params {
    parts.push(param.name.clone());
    parts.push(param.ty.clone().unwrap_or_else(|| ABSENT.to_string()));
  }
  parts.push(stub.return_type.clone().unwrap_or_else(|| ABSENT.to_string()));
  parts.push(stub.docstring.clone().unwrap_or_else(|| ABSENT.to_string()));
  parts.join(&SEP.to_string())
}

/// Run-local store of validated implementations, one per fingerprint.
/// Insertion-only; the first entry for a fingerprint wins, so a stub is
/// generated at most once per run no matter how often it is called.
#[derive(Default)]
pub struct Cache {
  entries: HashMap<Fingerprint, GeneratedImplementation>,
}

impl Cache {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn get(&self, fp: &Fingerprint) -> Option<&GeneratedImplementation> {
    self.entries.get(fp)
  }

  pub fn insert(&mut self, fp: Fingerprint, imp: GeneratedImplementation) {
    self.entries.entry(fp).or_insert(imp);
  }

  pub fn len(&self) -> usize {
    self.entries.len()
  }

  pub fn is_empty(&self) -> bool {
    self.entries.is_empty()
  }
}

// Copyright 2020-2024 IOTA Stiftung
// SPDX-License-Identifier: Apache-2.0

use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;

use crate::DecoyGenerator;
use crate::Hasher;
use crate::SaltProvider;

/// Deterministic [`SaltProvider`] cycling through a fixed salt sequence.
pub(crate) struct StaticSaltProvider {
  salts: Vec<String>,
  next: AtomicUsize,
}

impl StaticSaltProvider {
  pub(crate) fn new(salts: &[&str]) -> Self {
    assert!(!salts.is_empty());
    Self {
      salts: salts.iter().map(ToString::to_string).collect(),
      next: AtomicUsize::new(0),
    }
  }
}

impl SaltProvider for StaticSaltProvider {
  fn salt(&self) -> String {
    let index = self.next.fetch_add(1, Ordering::Relaxed);
    self.salts[index % self.salts.len()].clone()
  }
}

/// Deterministic [`DecoyGenerator`] emitting `prefix-0`, `prefix-1`, ….
pub(crate) struct StaticDecoyGenerator {
  prefix: String,
  next: AtomicUsize,
}

impl StaticDecoyGenerator {
  pub(crate) fn new(prefix: &str) -> Self {
    Self {
      prefix: prefix.to_string(),
      next: AtomicUsize::new(0),
    }
  }
}

impl DecoyGenerator for StaticDecoyGenerator {
  fn decoy_digest(&self, _hasher: &dyn Hasher) -> String {
    let index = self.next.fetch_add(1, Ordering::Relaxed);
    format!("{}-{}", self.prefix, index)
  }
}

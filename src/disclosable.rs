// Copyright 2020-2024 IOTA Stiftung
// SPDX-License-Identifier: Apache-2.0

use serde_json::Value;

/// One node of the claims description handed to the issuance engine.
///
/// Every claim of the issued SD-JWT is either emitted in plain text
/// (`Always`), replaced by the digest of a disclosure (`Sd`), or is a
/// container whose entries are tagged individually. The `SdObject` and
/// `SdArray` variants describe recursive disclosure: the whole container
/// collapses into a single digest in its parent while its own entries are
/// expanded into further disclosures.
#[derive(Debug, Clone, PartialEq)]
pub enum DisclosableValue {
  /// A claim that is always visible in the payload.
  Always(Value),
  /// A selectively disclosable claim.
  Sd(Value),
  /// A visible object with individually tagged entries.
  Object(DisclosableObject),
  /// A selectively disclosable object (recursive disclosure).
  SdObject(DisclosableObject),
  /// A visible array with individually tagged elements.
  Array(DisclosableArray),
  /// A selectively disclosable array (recursive disclosure).
  SdArray(DisclosableArray),
}

/// Ordered description of an object's claims.
///
/// Entry order is preserved and determines the order of the emitted
/// disclosures. Entries are not deduplicated: a second entry under an
/// already-used name is kept as-is and rejected by the issuance engine
/// with a claim collision, never silently overwritten.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DisclosableObject {
  entries: Vec<(String, DisclosableValue)>,
  min_digests: Option<usize>,
}

impl DisclosableObject {
  pub fn new() -> Self {
    Self::default()
  }

  /// Adds `element` under `name`. A previous entry of the same name stays
  /// in place; the duplicate surfaces as an error at issuance.
  pub fn insert(&mut self, name: impl Into<String>, element: DisclosableValue) {
    self.entries.push((name.into(), element));
  }

  /// Chainable [`Self::insert`].
  pub fn with(mut self, name: impl Into<String>, element: DisclosableValue) -> Self {
    self.insert(name, element);
    self
  }

  /// Adds an always-visible claim.
  pub fn plain(self, name: impl Into<String>, value: Value) -> Self {
    self.with(name, DisclosableValue::Always(value))
  }

  /// Adds a selectively disclosable claim.
  pub fn disclosable(self, name: impl Into<String>, value: Value) -> Self {
    self.with(name, DisclosableValue::Sd(value))
  }

  /// Requests at least `count` digests in this object's `_sd` array; the
  /// issuance engine pads with decoys up to the hint.
  pub fn with_min_digests(mut self, count: usize) -> Self {
    self.min_digests = Some(count);
    self
  }

  /// The entries in insertion order, duplicate names included.
  pub fn entries(&self) -> &[(String, DisclosableValue)] {
    &self.entries
  }

  pub fn min_digests(&self) -> Option<usize> {
    self.min_digests
  }
}

/// Ordered description of an array's elements.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DisclosableArray {
  elements: Vec<DisclosableValue>,
  min_digests: Option<usize>,
}

impl DisclosableArray {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn push(&mut self, element: DisclosableValue) {
    self.elements.push(element);
  }

  /// Chainable [`Self::push`].
  pub fn with(mut self, element: DisclosableValue) -> Self {
    self.push(element);
    self
  }

  /// Appends an always-visible element.
  pub fn plain(self, value: Value) -> Self {
    self.with(DisclosableValue::Always(value))
  }

  /// Appends a selectively disclosable element.
  pub fn disclosable(self, value: Value) -> Self {
    self.with(DisclosableValue::Sd(value))
  }

  /// Requests at least `count` digest entries in this array; the issuance
  /// engine pads with decoy `{"...": digest}` elements up to the hint.
  pub fn with_min_digests(mut self, count: usize) -> Self {
    self.min_digests = Some(count);
    self
  }

  pub fn elements(&self) -> &[DisclosableValue] {
    &self.elements
  }

  pub fn min_digests(&self) -> Option<usize> {
    self.min_digests
  }
}

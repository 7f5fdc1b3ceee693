// Copyright 2020-2024 IOTA Stiftung
// SPDX-License-Identifier: Apache-2.0

use std::fmt::Display;

use indexmap::IndexSet;
use itertools::Itertools;
use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

use crate::Disclosure;
use crate::Error;
use crate::ProvenanceMap;

/// One element of a [`ClaimPath`].
///
/// The serialized form is one of: a string (object property), a
/// non-negative integer (array index) or `null` (all array elements).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ClaimPathElement {
  /// Addresses the property `name` of an object.
  Claim(String),
  /// Addresses the element at `index` of an array.
  ArrayElement(usize),
  /// Addresses every element of an array.
  AllArrayElements,
}

impl ClaimPathElement {
  /// Element-wise containment: `AllArrayElements` contains any concrete
  /// index, everything contains itself, and wildcards never contain a
  /// named claim.
  pub fn contains(&self, other: &ClaimPathElement) -> bool {
    match (self, other) {
      (ClaimPathElement::Claim(a), ClaimPathElement::Claim(b)) => a == b,
      (ClaimPathElement::ArrayElement(a), ClaimPathElement::ArrayElement(b)) => a == b,
      (ClaimPathElement::AllArrayElements, ClaimPathElement::ArrayElement(_)) => true,
      (ClaimPathElement::AllArrayElements, ClaimPathElement::AllArrayElements) => true,
      _ => false,
    }
  }
}

impl Display for ClaimPathElement {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    match self {
      ClaimPathElement::Claim(name) => write!(f, "\"{name}\""),
      ClaimPathElement::ArrayElement(index) => write!(f, "{index}"),
      ClaimPathElement::AllArrayElements => f.write_str("null"),
    }
  }
}

impl From<&str> for ClaimPathElement {
  fn from(name: &str) -> Self {
    ClaimPathElement::Claim(name.to_owned())
  }
}

impl From<usize> for ClaimPathElement {
  fn from(index: usize) -> Self {
    ClaimPathElement::ArrayElement(index)
  }
}

/// A structural address into a recreated claims tree.
///
/// A path is a non-empty sequence of [`ClaimPathElement`]s read from the
/// root. Its serialized form is the JSON array used by SD-JWT VC claim
/// metadata, e.g. `["address", "street_address"]` or `["nationalities", null]`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "Vec<ClaimPathElement>", into = "Vec<ClaimPathElement>")]
pub struct ClaimPath(Vec<ClaimPathElement>);

impl ClaimPath {
  /// Creates a path consisting of the single element `first`.
  pub fn new(first: impl Into<ClaimPathElement>) -> Self {
    Self(vec![first.into()])
  }

  /// Appends one element to the path.
  pub fn push(&mut self, element: impl Into<ClaimPathElement>) {
    self.0.push(element.into());
  }

  /// Returns this path extended by `element`.
  pub fn extended(&self, element: impl Into<ClaimPathElement>) -> Self {
    let mut extended = self.clone();
    extended.push(element);
    extended
  }

  /// Returns this path followed by all elements of `other`.
  pub fn joined(&self, other: &ClaimPath) -> Self {
    Self(self.0.iter().chain(other.0.iter()).cloned().collect())
  }

  /// The elements of the path, in root-to-leaf order.
  pub fn elements(&self) -> &[ClaimPathElement] {
    &self.0
  }

  /// The number of elements; at least 1 by construction.
  pub fn len(&self) -> usize {
    self.0.len()
  }

  pub fn is_empty(&self) -> bool {
    self.0.is_empty()
  }

  /// The first element.
  pub fn head(&self) -> &ClaimPathElement {
    // Invariant: `self.0` is non-empty.
    &self.0[0]
  }

  /// The path after the first element, or `None` for single-element paths.
  pub fn tail(&self) -> Option<ClaimPath> {
    (self.0.len() > 1).then(|| Self(self.0[1..].to_vec()))
  }

  /// The path without its last element, or `None` for single-element paths.
  pub fn parent(&self) -> Option<ClaimPath> {
    (self.0.len() > 1).then(|| Self(self.0[..self.0.len() - 1].to_vec()))
  }

  /// Element-wise containment under the wildcard rule. Paths of different
  /// lengths never contain one another.
  pub fn contains(&self, other: &ClaimPath) -> bool {
    self.0.len() == other.0.len()
      && self
        .0
        .iter()
        .zip(other.0.iter())
        .all(|(mine, theirs)| mine.contains(theirs))
  }

  /// Same length and mutual containment.
  pub fn matches(&self, other: &ClaimPath) -> bool {
    self.contains(other) && other.contains(self)
  }

  /// Resolves this path against `tree`, returning every concrete match as
  /// a `(path, value)` pair. Wildcards expand to all valid indices in
  /// ascending order; elements that do not resolve yield no match.
  pub fn select<'a>(&self, tree: &'a Value) -> Vec<(ClaimPath, &'a Value)> {
    let mut matches: Vec<(Vec<ClaimPathElement>, &'a Value)> = vec![(vec![], tree)];
    for element in &self.0 {
      let mut next: Vec<(Vec<ClaimPathElement>, &'a Value)> = vec![];
      for (prefix, value) in matches {
        match element {
          ClaimPathElement::Claim(name) => {
            if let Some(property) = value.as_object().and_then(|object| object.get(name)) {
              let mut path = prefix.clone();
              path.push(ClaimPathElement::Claim(name.clone()));
              next.push((path, property));
            }
          }
          ClaimPathElement::ArrayElement(index) => {
            if let Some(entry) = value.as_array().and_then(|array| array.get(*index)) {
              let mut path = prefix.clone();
              path.push(ClaimPathElement::ArrayElement(*index));
              next.push((path, entry));
            }
          }
          ClaimPathElement::AllArrayElements => {
            if let Some(array) = value.as_array() {
              for (index, entry) in array.iter().enumerate() {
                let mut path = prefix.clone();
                path.push(ClaimPathElement::ArrayElement(index));
                next.push((path, entry));
              }
            }
          }
        }
      }
      matches = next;
    }

    matches.into_iter().map(|(elements, value)| (Self(elements), value)).collect()
  }
}

impl ClaimPath {
  /// Internal constructor for walks that build paths element by element.
  /// Callers guarantee `elements` is non-empty.
  pub(crate) fn from_elements(elements: Vec<ClaimPathElement>) -> Self {
    debug_assert!(!elements.is_empty());
    Self(elements)
  }
}

impl TryFrom<Vec<ClaimPathElement>> for ClaimPath {
  type Error = Error;

  fn try_from(elements: Vec<ClaimPathElement>) -> Result<Self, Self::Error> {
    if elements.is_empty() {
      Err(Error::InvalidClaimPath("a claim path cannot be empty".to_string()))
    } else {
      Ok(Self(elements))
    }
  }
}

impl From<ClaimPath> for Vec<ClaimPathElement> {
  fn from(path: ClaimPath) -> Self {
    path.0
  }
}

impl Display for ClaimPath {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(f, "[{}]", self.0.iter().join(", "))
  }
}

/// Returns the union of the provenance disclosure lists of every path in
/// `provenance` satisfying `predicate`, in provenance order.
pub fn to_disclosure_set<F>(provenance: &ProvenanceMap, predicate: F) -> IndexSet<Disclosure>
where
  F: Fn(&ClaimPath) -> bool,
{
  provenance
    .iter()
    .filter(|(path, _)| predicate(path))
    .flat_map(|(_, disclosures)| disclosures.iter().cloned())
    .collect()
}

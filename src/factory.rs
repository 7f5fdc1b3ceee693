// Copyright 2020-2024 IOTA Stiftung
// SPDX-License-Identifier: Apache-2.0

use std::collections::BTreeSet;

use serde_json::json;
use serde_json::Value;

use crate::DecoyGenerator;
use crate::Disclosure;
use crate::DisclosableArray;
use crate::DisclosableObject;
use crate::DisclosableValue;
use crate::Error;
use crate::Hasher;
use crate::JsonObject;
use crate::RandomDecoyGenerator;
use crate::RandomSaltProvider;
use crate::Result;
use crate::SaltProvider;
#[cfg(feature = "sha")]
use crate::Sha256Hasher;

pub(crate) const DIGESTS_KEY: &str = "_sd";
pub(crate) const ARRAY_DIGEST_KEY: &str = "...";
pub(crate) const SD_ALG: &str = "_sd_alg";
pub(crate) const RESERVED_CLAIM_NAMES: [&str; 3] = [DIGESTS_KEY, SD_ALG, ARRAY_DIGEST_KEY];

/// Nesting bound shared by issuance and recreation.
pub(crate) const MAX_NESTING_DEPTH: usize = 128;

/// The output of issuance: the redacted payload object and the disclosures
/// whose digests it references.
#[derive(Debug, Clone)]
pub struct SdPayload {
  /// The payload object, with disclosed claims replaced by digests.
  pub object: JsonObject,
  /// The disclosures, in left-to-right order of the claims description.
  pub disclosures: Vec<Disclosure>,
}

/// Folds a [`DisclosableObject`] claims description into a payload with
/// disclosure digests and the corresponding list of [`Disclosure`]s.
///
/// Salts and decoy digests come from injectable providers so that issuance
/// is deterministic under test.
#[cfg(feature = "sha")]
pub struct SdJwtFactory<H: Hasher = Sha256Hasher> {
  /// The hash function used to create digests.
  hasher: H,
  salt_provider: Box<dyn SaltProvider>,
  decoy_generator: Box<dyn DecoyGenerator>,
}

#[cfg(not(feature = "sha"))]
pub struct SdJwtFactory<H: Hasher> {
  /// The hash function used to create digests.
  hasher: H,
  salt_provider: Box<dyn SaltProvider>,
  decoy_generator: Box<dyn DecoyGenerator>,
}

#[cfg(feature = "sha")]
impl SdJwtFactory {
  /// Creates a new [`SdJwtFactory`] with the `sha-256` hash function and
  /// random salt and decoy sources.
  pub fn new() -> Self {
    Self::with_hasher(Sha256Hasher::new())
  }
}

#[cfg(feature = "sha")]
impl Default for SdJwtFactory {
  fn default() -> Self {
    Self::new()
  }
}

impl<H: Hasher> SdJwtFactory<H> {
  /// Creates a new [`SdJwtFactory`] with a custom hash function to create
  /// digests.
  pub fn with_hasher(hasher: H) -> Self {
    Self {
      hasher,
      salt_provider: Box::new(RandomSaltProvider::default()),
      decoy_generator: Box::new(RandomDecoyGenerator::default()),
    }
  }

  /// Replaces the salt source.
  pub fn salt_provider(mut self, salt_provider: impl SaltProvider + 'static) -> Self {
    self.salt_provider = Box::new(salt_provider);
    self
  }

  /// Replaces the decoy digest source.
  pub fn decoy_generator(mut self, decoy_generator: impl DecoyGenerator + 'static) -> Self {
    self.decoy_generator = Box::new(decoy_generator);
    self
  }

  /// Returns the hash function in use.
  pub fn hasher(&self) -> &H {
    &self.hasher
  }

  /// Folds `claims` into a payload object and its disclosures.
  ///
  /// Disclosed object properties are replaced by digests in their parent's
  /// `_sd` array, disclosed array elements by `{"...": digest}` entries.
  /// Each `_sd` array is padded up to the node's `min_digests` hint with
  /// decoys and sorted lexicographically. `_sd_alg` is added at the root
  /// when at least one disclosure was produced.
  ///
  /// ## Error
  /// [`Error::NullNotDisclosable`] for disclosable `null` leaves,
  /// [`Error::ClaimCollision`] for two entries sharing a name at one
  /// object level or for claims named like the digest bookkeeping keys,
  /// [`Error::DepthLimitExceeded`] for claim trees nested deeper than the
  /// supported maximum.
  pub fn create(&self, claims: &DisclosableObject) -> Result<SdPayload> {
    let mut disclosures: Vec<Disclosure> = vec![];
    let mut object = self.encode_object(claims, 0, &mut disclosures)?;

    if !disclosures.is_empty() {
      object.insert(SD_ALG.to_owned(), Value::String(self.hasher.alg_name().to_owned()));
    }

    Ok(SdPayload { object, disclosures })
  }

  fn encode_object(
    &self,
    claims: &DisclosableObject,
    depth: usize,
    disclosures: &mut Vec<Disclosure>,
  ) -> Result<JsonObject> {
    if depth >= MAX_NESTING_DEPTH {
      return Err(Error::DepthLimitExceeded(MAX_NESTING_DEPTH));
    }

    let mut object = JsonObject::new();
    let mut digests: Vec<String> = vec![];
    let mut seen_names: BTreeSet<&str> = BTreeSet::new();

    for (name, element) in claims.entries() {
      // A name may appear once per level, and never as a bookkeeping key.
      if RESERVED_CLAIM_NAMES.contains(&name.as_str()) || !seen_names.insert(name.as_str()) {
        return Err(Error::ClaimCollision(name.clone()));
      }

      match element {
        DisclosableValue::Always(value) => {
          object.insert(name.clone(), value.clone());
        }
        DisclosableValue::Sd(value) => {
          Self::check_disclosable_leaf(name, value)?;
          let disclosure = Disclosure::object_property(self.salt_provider.salt(), name.clone(), value.clone())?;
          digests.push(disclosure.digest(&self.hasher));
          disclosures.push(disclosure);
        }
        DisclosableValue::Object(inner) => {
          let encoded = self.encode_object(inner, depth + 1, disclosures)?;
          object.insert(name.clone(), Value::Object(encoded));
        }
        DisclosableValue::Array(inner) => {
          let encoded = self.encode_array(inner, depth + 1, disclosures)?;
          object.insert(name.clone(), Value::Array(encoded));
        }
        DisclosableValue::SdObject(inner) => {
          // The wrapped payload may itself carry an `_sd` array; nested
          // digests are legitimate only on this path.
          let encoded = self.encode_object(inner, depth + 1, disclosures)?;
          let disclosure =
            Disclosure::object_property(self.salt_provider.salt(), name.clone(), Value::Object(encoded))?;
          digests.push(disclosure.digest(&self.hasher));
          disclosures.push(disclosure);
        }
        DisclosableValue::SdArray(inner) => {
          let encoded = self.encode_array(inner, depth + 1, disclosures)?;
          let disclosure =
            Disclosure::object_property(self.salt_provider.salt(), name.clone(), Value::Array(encoded))?;
          digests.push(disclosure.digest(&self.hasher));
          disclosures.push(disclosure);
        }
      }
    }

    let decoys = claims.min_digests().unwrap_or(0).saturating_sub(digests.len());
    for _ in 0..decoys {
      digests.push(self.decoy_generator.decoy_digest(&self.hasher));
    }

    // Sorted so that position reveals nothing about which digests are decoys.
    digests.sort_unstable();
    if !digests.is_empty() {
      object.insert(
        DIGESTS_KEY.to_owned(),
        Value::Array(digests.into_iter().map(Value::String).collect()),
      );
    }

    Ok(object)
  }

  fn encode_array(
    &self,
    elements: &DisclosableArray,
    depth: usize,
    disclosures: &mut Vec<Disclosure>,
  ) -> Result<Vec<Value>> {
    if depth >= MAX_NESTING_DEPTH {
      return Err(Error::DepthLimitExceeded(MAX_NESTING_DEPTH));
    }

    let mut array: Vec<Value> = vec![];
    let mut digest_count: usize = 0;

    for (index, element) in elements.elements().iter().enumerate() {
      match element {
        DisclosableValue::Always(value) => {
          array.push(value.clone());
        }
        DisclosableValue::Sd(value) => {
          Self::check_disclosable_leaf(&index.to_string(), value)?;
          let disclosure = Disclosure::array_element(self.salt_provider.salt(), value.clone());
          array.push(json!({ARRAY_DIGEST_KEY: disclosure.digest(&self.hasher)}));
          disclosures.push(disclosure);
          digest_count += 1;
        }
        DisclosableValue::Object(inner) => {
          let encoded = self.encode_object(inner, depth + 1, disclosures)?;
          array.push(Value::Object(encoded));
        }
        DisclosableValue::Array(inner) => {
          let encoded = self.encode_array(inner, depth + 1, disclosures)?;
          array.push(Value::Array(encoded));
        }
        DisclosableValue::SdObject(inner) => {
          let encoded = self.encode_object(inner, depth + 1, disclosures)?;
          let disclosure = Disclosure::array_element(self.salt_provider.salt(), Value::Object(encoded));
          array.push(json!({ARRAY_DIGEST_KEY: disclosure.digest(&self.hasher)}));
          disclosures.push(disclosure);
          digest_count += 1;
        }
        DisclosableValue::SdArray(inner) => {
          let encoded = self.encode_array(inner, depth + 1, disclosures)?;
          let disclosure = Disclosure::array_element(self.salt_provider.salt(), Value::Array(encoded));
          array.push(json!({ARRAY_DIGEST_KEY: disclosure.digest(&self.hasher)}));
          disclosures.push(disclosure);
          digest_count += 1;
        }
      }
    }

    let decoys = elements.min_digests().unwrap_or(0).saturating_sub(digest_count);
    for _ in 0..decoys {
      array.push(json!({ARRAY_DIGEST_KEY: self.decoy_generator.decoy_digest(&self.hasher)}));
    }

    Ok(array)
  }

  fn check_disclosable_leaf(name: &str, value: &Value) -> Result<()> {
    if value.is_null() {
      return Err(Error::NullNotDisclosable(name.to_owned()));
    }
    // Disclosure values may not smuggle digest bookkeeping keys; only the
    // recursive wrapping steps above produce those.
    if let Some(object) = value.as_object() {
      for key in [DIGESTS_KEY, SD_ALG] {
        if object.contains_key(key) {
          return Err(Error::InvalidDisclosure(format!(
            "value of claim {name} directly contains the reserved key {key}"
          )));
        }
      }
    }
    Ok(())
  }
}

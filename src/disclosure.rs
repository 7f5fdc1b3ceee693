// Copyright 2020-2024 IOTA Stiftung
// SPDX-License-Identifier: Apache-2.0

use serde_json::Value;
use std::fmt::Display;
use std::hash::Hash;

use crate::Error;
use crate::Hasher;
use crate::RESERVED_CLAIM_NAMES;

/// A disclosable value.
/// Both object properties and array elements disclosures are supported.
///
/// See: https://www.ietf.org/archive/id/draft-ietf-oauth-selective-disclosure-jwt-07.html#name-disclosures
#[derive(Debug, Clone)]
pub struct Disclosure {
  /// The salt value.
  pub salt: String,
  /// The claim name, `None` for array element disclosures.
  pub claim_name: Option<String>,
  /// The claim Value which can be of any type.
  pub claim_value: Value,
  /// The base64url encoding this disclosure was created or parsed with.
  /// Digests are always recomputed from this string, never from a
  /// re-serialization of the parsed value.
  unparsed: String,
}

impl Disclosure {
  /// Creates a disclosure for the object property `(name, value)`.
  ///
  /// The encoded form is the unpadded base64url encoding of the canonical
  /// JSON array `[salt, name, value]` (no whitespace, minimal escapes).
  ///
  /// ## Error
  /// Returns [`Error::InvalidDisclosure`] if `name` is one of the reserved
  /// claim names `_sd`, `_sd_alg` or `...`.
  pub fn object_property(salt: String, name: String, value: Value) -> Result<Self, Error> {
    if RESERVED_CLAIM_NAMES.contains(&name.as_str()) {
      return Err(Error::InvalidDisclosure(format!(
        "claim name cannot be the reserved name {name}"
      )));
    }

    let array = Value::Array(vec![
      Value::String(salt.clone()),
      Value::String(name.clone()),
      value.clone(),
    ]);
    let unparsed = multibase::Base::Base64Url.encode(array.to_string());
    Ok(Self {
      salt,
      claim_name: Some(name),
      claim_value: value,
      unparsed,
    })
  }

  /// Creates a disclosure for an array element `value`.
  ///
  /// The encoded form is the unpadded base64url encoding of the canonical
  /// JSON array `[salt, value]`.
  pub fn array_element(salt: String, value: Value) -> Self {
    let array = Value::Array(vec![Value::String(salt.clone()), value.clone()]);
    let unparsed = multibase::Base::Base64Url.encode(array.to_string());
    Self {
      salt,
      claim_name: None,
      claim_value: value,
      unparsed,
    }
  }

  /// Parses a base64url encoded disclosure into a [`Disclosure`].
  ///
  /// The input string is retained byte-for-byte so that digests recompute
  /// identically regardless of the encoder's JSON conventions.
  ///
  /// ## Error
  ///
  /// Returns an [`Error::InvalidDisclosure`] if input is not a valid disclosure.
  pub fn parse(disclosure: &str) -> Result<Self, Error> {
    // Padding is tolerated on decode; digests still cover the input as-is.
    let decoded: Vec<Value> = multibase::Base::Base64Url
      .decode(disclosure.trim_end_matches('='))
      .map_err(|_e| {
        Error::InvalidDisclosure(format!(
          "Base64 decoding of the disclosure was not possible {}",
          disclosure
        ))
      })
      .and_then(|data| {
        serde_json::from_slice(&data).map_err(|_e| {
          Error::InvalidDisclosure(format!(
            "decoded disclosure could not be serialized as an array {}",
            disclosure
          ))
        })
      })?;

    if decoded.len() == 2 {
      Ok(Self {
        salt: decoded
          .first()
          .ok_or(Error::InvalidDisclosure("invalid salt".to_string()))?
          .as_str()
          .ok_or(Error::InvalidDisclosure(
            "salt could not be parsed as a string".to_string(),
          ))?
          .to_owned(),
        claim_name: None,
        claim_value: decoded
          .get(1)
          .ok_or(Error::InvalidDisclosure("invalid claim value".to_string()))?
          .clone(),
        unparsed: disclosure.to_string(),
      })
    } else if decoded.len() == 3 {
      let claim_name = decoded
        .get(1)
        .ok_or(Error::InvalidDisclosure("invalid claim name".to_string()))?
        .as_str()
        .ok_or(Error::InvalidDisclosure(
          "claim name could not be parsed as a string".to_string(),
        ))?
        .to_owned();
      if RESERVED_CLAIM_NAMES.contains(&claim_name.as_str()) {
        return Err(Error::InvalidDisclosure(format!(
          "claim name cannot be the reserved name {claim_name}"
        )));
      }

      Ok(Self {
        salt: decoded
          .first()
          .ok_or(Error::InvalidDisclosure("invalid salt".to_string()))?
          .as_str()
          .ok_or(Error::InvalidDisclosure(
            "salt could not be parsed as a string".to_string(),
          ))?
          .to_owned(),
        claim_name: Some(claim_name),
        claim_value: decoded
          .get(2)
          .ok_or(Error::InvalidDisclosure("invalid claim value".to_string()))?
          .clone(),
        unparsed: disclosure.to_string(),
      })
    } else {
      Err(Error::InvalidDisclosure(format!(
        "deserialized array has an invalid length of {}",
        decoded.len()
      )))
    }
  }

  /// Returns the base64url encoded string of this disclosure.
  pub fn as_str(&self) -> &str {
    &self.unparsed
  }

  /// Returns the base64url-encoded digest of this disclosure under
  /// `hasher`'s algorithm.
  pub fn digest(&self, hasher: &dyn Hasher) -> String {
    hasher.encoded_digest(&self.unparsed)
  }
}

// Disclosure equality is equality of the encoded strings.
impl PartialEq for Disclosure {
  fn eq(&self, other: &Self) -> bool {
    self.unparsed == other.unparsed
  }
}

impl Eq for Disclosure {}

impl Hash for Disclosure {
  fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
    self.unparsed.hash(state);
  }
}

impl Display for Disclosure {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.write_str(&self.unparsed)
  }
}

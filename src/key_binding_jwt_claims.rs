// Copyright 2020-2024 IOTA Stiftung
// SPDX-License-Identifier: Apache-2.0

use itertools::Itertools;
use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;

use crate::Hasher;
use crate::JsonObject;

/// Claims set for key binding JWT.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
pub struct KeyBindingJwtClaims {
  pub iat: i64,
  pub aud: String,
  pub nonce: String,
  /// Digest of the presented SD-JWT up to and including the `~` that
  /// terminates the disclosure list.
  pub sd_hash: String,
  #[serde(flatten)]
  pub properties: BTreeMap<String, Value>,
}

impl KeyBindingJwtClaims {
  pub const KB_JWT_HEADER_TYP: &'static str = "kb+jwt";

  /// Creates a new [`KeyBindingJwtClaims`], computing `sd_hash` over the
  /// wire form `<jwt>~<disclosure 1>~…~<disclosure n>~` under `hasher`.
  pub fn new(hasher: &dyn Hasher, jwt: String, disclosures: Vec<String>, nonce: String, aud: String, iat: i64) -> Self {
    let sd_hash = hasher.encoded_digest(&presented_prefix(&jwt, &disclosures));
    Self {
      iat,
      aud,
      nonce,
      sd_hash,
      properties: BTreeMap::new(),
    }
  }
}

/// The holder key an issuer requires presentations to be bound to, carried
/// in the `cnf` claim of the issuer-signed JWT.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RequiredKeyBinding {
  /// A public key in JWK form, under `cnf.jwk`.
  Jwk(JsonObject),
}

/// The wire prefix a KB-JWT's `sd_hash` commits to.
pub(crate) fn presented_prefix(jwt: &str, disclosures: &[String]) -> String {
  if disclosures.is_empty() {
    format!("{jwt}~")
  } else {
    format!("{jwt}~{}~", disclosures.iter().join("~"))
  }
}

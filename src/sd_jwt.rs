// Copyright 2020-2024 IOTA Stiftung
// SPDX-License-Identifier: Apache-2.0

use std::fmt::Display;
use std::ops::Deref;
use std::str::FromStr;

use itertools::Itertools;
use serde::Deserialize;
use serde::Serialize;
use serde_with::skip_serializing_none;

use crate::claim_path::ClaimPath;
use crate::claim_path::to_disclosure_set;
use crate::decoder::SdObjectDecoder;
use crate::jwt::Jwt;
use crate::key_binding_jwt_claims::presented_prefix;
use crate::Disclosure;
use crate::Error;
use crate::JsonObject;
use crate::KeyBindingJwtClaims;
use crate::RequiredKeyBinding;
use crate::Result;

/// The `typ` header value of issuer-signed JWTs.
pub const HEADER_TYP: &str = "sd-jwt";

/// The claims set of an issuer-signed JWT: digest bookkeeping claims plus
/// arbitrary visible properties.
#[skip_serializing_none]
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SdJwtClaims {
  #[serde(skip_serializing_if = "Vec::is_empty", default)]
  pub _sd: Vec<String>,
  pub _sd_alg: Option<String>,
  pub cnf: Option<RequiredKeyBinding>,
  #[serde(flatten)]
  properties: JsonObject,
}

impl SdJwtClaims {
  /// Returns the claims set as a plain JSON object, including the digest
  /// bookkeeping claims.
  pub fn to_object(&self) -> Result<JsonObject> {
    match serde_json::to_value(self) {
      Ok(serde_json::Value::Object(object)) => Ok(object),
      _ => Err(Error::Unspecified("claims set is not a JSON object".to_string())),
    }
  }
}

impl Deref for SdJwtClaims {
  type Target = JsonObject;
  fn deref(&self) -> &Self::Target {
    &self.properties
  }
}

/// The raw `~`-separated segments of a compact SD-JWT, split but not
/// decoded.
///
/// Verification works on these parts so that structural, signature and
/// disclosure errors surface in a fixed order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SdJwtParts {
  /// The issuer-signed compact JWT, passed through verbatim.
  pub jwt: String,
  /// The encoded disclosure strings.
  pub disclosures: Vec<String>,
  /// The compact KB-JWT, when one is attached.
  pub key_binding_jwt: Option<String>,
}

impl SdJwtParts {
  /// Splits a compact SD-JWT of the format
  /// `<JWT>~<Disclosure 1>~...~<Disclosure N>~<optional KB-JWT>`.
  ///
  /// A final non-empty segment not terminated by `~` is the KB-JWT; empty
  /// trailing segments are discarded.
  pub fn parse(sd_jwt: &str) -> Result<Self> {
    let segments: Vec<&str> = sd_jwt.split('~').collect();
    if segments.len() < 2 {
      return Err(Error::Deserialization(
        "SD-JWT format is invalid, less than 2 segments".to_string(),
      ));
    }

    let includes_key_binding = sd_jwt.chars().next_back().is_some_and(|char| char != '~');
    let key_binding_jwt = includes_key_binding.then(|| segments[segments.len() - 1].to_string());

    let mut disclosures: Vec<&str> = segments[1..segments.len() - 1].to_vec();
    while disclosures.last().is_some_and(|segment| segment.is_empty()) {
      disclosures.pop();
    }
    if disclosures.iter().any(|segment| segment.is_empty()) {
      return Err(Error::Deserialization(
        "SD-JWT contains an empty disclosure segment".to_string(),
      ));
    }

    Ok(Self {
      jwt: segments[0].to_string(),
      disclosures: disclosures.into_iter().map(ToString::to_string).collect(),
      key_binding_jwt,
    })
  }

  /// Serializes the parts back into the compact format.
  pub fn presentation(&self) -> String {
    let mut presentation = presented_prefix(&self.jwt, &self.disclosures);
    if let Some(kb_jwt) = &self.key_binding_jwt {
      presentation.push_str(kb_jwt);
    }
    presentation
  }
}

impl FromStr for SdJwtParts {
  type Err = Error;
  fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
    Self::parse(s)
  }
}

/// Representation of an SD-JWT of the format
/// `<Issuer-signed JWT>~<Disclosure 1>~<Disclosure 2>~...~<Disclosure N>~<optional KB-JWT>`.
#[derive(Debug, Clone, PartialEq)]
pub struct SdJwt {
  /// The JWT part.
  jwt: Jwt<SdJwtClaims>,
  /// The disclosures part.
  disclosures: Vec<Disclosure>,
  /// The optional key binding JWT.
  key_binding_jwt: Option<Jwt<KeyBindingJwtClaims>>,
}

impl SdJwt {
  /// Creates a new [`SdJwt`] from its components.
  pub(crate) fn new(
    jwt: Jwt<SdJwtClaims>,
    disclosures: Vec<Disclosure>,
    key_binding_jwt: Option<Jwt<KeyBindingJwtClaims>>,
  ) -> Self {
    Self {
      jwt,
      disclosures,
      key_binding_jwt,
    }
  }

  pub fn header(&self) -> &JsonObject {
    &self.jwt.header
  }

  pub fn claims(&self) -> &SdJwtClaims {
    &self.jwt.claims
  }

  /// The issuer-signed compact JWT.
  pub fn jwt(&self) -> &Jwt<SdJwtClaims> {
    &self.jwt
  }

  pub fn disclosures(&self) -> &[Disclosure] {
    &self.disclosures
  }

  /// The holder key the issuer requires presentations to be bound to.
  pub fn required_key_bind(&self) -> Option<&RequiredKeyBinding> {
    self.claims().cnf.as_ref()
  }

  pub fn key_binding_jwt(&self) -> Option<&Jwt<KeyBindingJwtClaims>> {
    self.key_binding_jwt.as_ref()
  }

  /// Attaches a holder-signed KB-JWT, making this a key-bound presentation.
  pub fn attach_key_binding_jwt(&mut self, kb_jwt: Jwt<KeyBindingJwtClaims>) {
    self.key_binding_jwt = Some(kb_jwt);
  }

  /// Serializes the components into the final SD-JWT.
  pub fn presentation(&self) -> String {
    let disclosures: Vec<String> = self.disclosures.iter().map(ToString::to_string).collect();
    let mut presentation = presented_prefix(self.jwt.as_str(), &disclosures);
    if let Some(key_binding_jwt) = &self.key_binding_jwt {
      presentation.push_str(key_binding_jwt.as_str());
    }
    presentation
  }

  /// Parses an SD-JWT into its components as [`SdJwt`].
  pub fn parse(sd_jwt: &str) -> Result<Self> {
    Self::from_parts(&SdJwtParts::parse(sd_jwt)?)
  }

  pub(crate) fn from_parts(parts: &SdJwtParts) -> Result<Self> {
    let jwt = parts.jwt.parse()?;
    let disclosures: Vec<Disclosure> = parts
      .disclosures
      .iter()
      .map(|disclosure| Disclosure::parse(disclosure))
      .try_collect()?;
    let key_binding_jwt = parts
      .key_binding_jwt
      .as_deref()
      .map(str::parse)
      .transpose()?;

    Ok(Self {
      jwt,
      disclosures,
      key_binding_jwt,
    })
  }

  /// Builds the presentation revealing exactly the claims whose path is
  /// contained in one of the `query` paths.
  ///
  /// The issuer-signed JWT is carried over verbatim and the selected
  /// disclosures keep their issuance order. Always-visible claims need not
  /// be queried; they require no disclosures. Any previously attached
  /// KB-JWT is dropped, since a new presentation needs a fresh binding.
  ///
  /// Returns `Ok(None)` when no disclosure matches the query.
  pub fn present(self, decoder: &SdObjectDecoder, query: &[ClaimPath]) -> Result<Option<SdJwt>> {
    self.present_where(decoder, |path| query.iter().any(|query_path| query_path.contains(path)))
  }

  /// [`Self::present`] with a free-form predicate over claim paths.
  pub fn present_where<F>(self, decoder: &SdObjectDecoder, predicate: F) -> Result<Option<SdJwt>>
  where
    F: Fn(&ClaimPath) -> bool,
  {
    let object = self.claims().to_object()?;
    let (_, provenance) = decoder.decode_with_provenance(&object, &self.disclosures)?;

    let selected = to_disclosure_set(&provenance, predicate);
    if selected.is_empty() {
      return Ok(None);
    }

    let disclosures = self
      .disclosures
      .into_iter()
      .filter(|disclosure| selected.contains(disclosure))
      .collect();
    Ok(Some(SdJwt {
      jwt: self.jwt,
      disclosures,
      key_binding_jwt: None,
    }))
  }

  /// Returns the JSON object obtained by replacing all digests with their
  /// corresponding disclosed claims.
  pub fn into_disclosed_object(self, decoder: &SdObjectDecoder) -> Result<JsonObject> {
    let object = self.claims().to_object()?;
    decoder.decode(&object, &self.disclosures)
  }
}

impl Display for SdJwt {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.write_str(&(self.presentation()))
  }
}

impl FromStr for SdJwt {
  type Err = Error;
  fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
    Self::parse(s)
  }
}

#[cfg(test)]
mod test {
  use super::SdJwt;
  use super::SdJwtParts;
  use crate::claim_path::ClaimPath;
  use crate::test_utils::StaticSaltProvider;
  use crate::DisclosableObject;
  use crate::DisclosableValue;
  use crate::JsonObject;
  use crate::SdJwtFactory;
  use crate::SdObjectDecoder;
  use serde_json::json;
  use serde_json::Value;

  const SD_JWT: &str = "eyJhbGciOiAiRVMyNTYiLCAidHlwIjogImV4YW1wbGUrc2Qtand0In0.eyJfc2QiOiBbIkM5aW5wNllvUmFFWFI0Mjd6WUpQN1FyazFXSF84YmR3T0FfWVVyVW5HUVUiLCAiS3VldDF5QWEwSElRdlluT1ZkNTloY1ZpTzlVZzZKMmtTZnFZUkJlb3d2RSIsICJNTWxkT0ZGekIyZDB1bWxtcFRJYUdlcmhXZFVfUHBZZkx2S2hoX2ZfOWFZIiwgIlg2WkFZT0lJMnZQTjQwVjd4RXhad1Z3ejd5Um1MTmNWd3Q1REw4Ukx2NGciLCAiWTM0em1JbzBRTExPdGRNcFhHd2pCZ0x2cjE3eUVoaFlUMEZHb2ZSLWFJRSIsICJmeUdwMFdUd3dQdjJKRFFsbjFsU2lhZW9iWnNNV0ExMGJRNTk4OS05RFRzIiwgIm9tbUZBaWNWVDhMR0hDQjB1eXd4N2ZZdW8zTUhZS08xNWN6LVJaRVlNNVEiLCAiczBCS1lzTFd4UVFlVTh0VmxsdE03TUtzSVJUckVJYTFQa0ptcXhCQmY1VSJdLCAiaXNzIjogImh0dHBzOi8vaXNzdWVyLmV4YW1wbGUuY29tIiwgImlhdCI6IDE2ODMwMDAwMDAsICJleHAiOiAxODgzMDAwMDAwLCAiYWRkcmVzcyI6IHsiX3NkIjogWyI2YVVoelloWjdTSjFrVm1hZ1FBTzN1MkVUTjJDQzFhSGhlWnBLbmFGMF9FIiwgIkF6TGxGb2JrSjJ4aWF1cFJFUHlvSnotOS1OU2xkQjZDZ2pyN2ZVeW9IemciLCAiUHp6Y1Z1MHFiTXVCR1NqdWxmZXd6a2VzRDl6dXRPRXhuNUVXTndrclEtayIsICJiMkRrdzBqY0lGOXJHZzhfUEY4WmN2bmNXN3p3Wmo1cnlCV3ZYZnJwemVrIiwgImNQWUpISVo4VnUtZjlDQ3lWdWIyVWZnRWs4anZ2WGV6d0sxcF9KbmVlWFEiLCAiZ2xUM2hyU1U3ZlNXZ3dGNVVEWm1Xd0JUdzMyZ25VbGRJaGk4aEdWQ2FWNCIsICJydkpkNmlxNlQ1ZWptc0JNb0d3dU5YaDlxQUFGQVRBY2k0MG9pZEVlVnNBIiwgInVOSG9XWWhYc1poVkpDTkUyRHF5LXpxdDd0NjlnSkt5NVFhRnY3R3JNWDQiXX0sICJfc2RfYWxnIjogInNoYS0yNTYifQ.gR6rSL7urX79CNEvTQnP1MH5xthG11ucIV44SqKFZ4Pvlu_u16RfvXQd4k4CAIBZNKn2aTI18TfvFwV97gJFoA~WyJHMDJOU3JRZmpGWFE3SW8wOXN5YWpBIiwgInJlZ2lvbiIsICJcdTZlMmZcdTUzM2EiXQ~WyJsa2x4RjVqTVlsR1RQVW92TU5JdkNBIiwgImNvdW50cnkiLCAiSlAiXQ~";

  fn fake_jwt_compact(object: &JsonObject) -> String {
    let header = multibase::Base::Base64Url.encode(r#"{"alg":"ES256","typ":"sd-jwt"}"#);
    let payload = multibase::Base::Base64Url.encode(serde_json::to_vec(object).unwrap());
    format!("{header}.{payload}.c2ln")
  }

  fn issue(claims: &DisclosableObject, salts: &[&str]) -> SdJwt {
    let payload = SdJwtFactory::new()
      .salt_provider(StaticSaltProvider::new(salts))
      .create(claims)
      .unwrap();
    let jwt = fake_jwt_compact(&payload.object).parse().unwrap();
    SdJwt::new(jwt, payload.disclosures, None)
  }

  #[test]
  fn parse() {
    let sd_jwt = SdJwt::parse(SD_JWT).unwrap();
    assert_eq!(sd_jwt.disclosures.len(), 2);
    assert!(sd_jwt.key_binding_jwt.is_none());
  }

  #[test]
  fn round_trip_ser_des() {
    let sd_jwt = SdJwt::parse(SD_JWT).unwrap();
    assert_eq!(&sd_jwt.to_string(), SD_JWT);
  }

  #[test]
  fn parts_split_kb_jwt() {
    let parts = SdJwtParts::parse("h.p.s~d1~d2~a.b.c").unwrap();
    assert_eq!(parts.jwt, "h.p.s");
    assert_eq!(parts.disclosures, vec!["d1", "d2"]);
    assert_eq!(parts.key_binding_jwt.as_deref(), Some("a.b.c"));
    assert_eq!(parts.presentation(), "h.p.s~d1~d2~a.b.c");
  }

  #[test]
  fn parts_without_disclosures() {
    let parts = SdJwtParts::parse("h.p.s~").unwrap();
    assert!(parts.disclosures.is_empty());
    assert!(parts.key_binding_jwt.is_none());
    assert_eq!(parts.presentation(), "h.p.s~");

    let parts = SdJwtParts::parse("h.p.s~a.b.c").unwrap();
    assert!(parts.disclosures.is_empty());
    assert_eq!(parts.key_binding_jwt.as_deref(), Some("a.b.c"));
  }

  #[test]
  fn parts_discard_empty_trailing_segments() {
    let parts = SdJwtParts::parse("h.p.s~~").unwrap();
    assert!(parts.disclosures.is_empty());
    assert!(SdJwtParts::parse("h.p.s~~d1~").is_err());
    assert!(SdJwtParts::parse("h.p.s").is_err());
  }

  #[test]
  fn present_reveals_only_the_queried_claims() {
    let claims = DisclosableObject::new()
      .disclosable("given_name", json!("John"))
      .disclosable("email", json!("johndoe@example.com"))
      .plain("family_name", json!("Doe"));
    let sd_jwt = issue(&claims, &["salt1", "salt2"]);

    let decoder = SdObjectDecoder::new_with_sha256();
    let query = [ClaimPath::new("given_name")];
    let presented = sd_jwt.present(&decoder, &query).unwrap().unwrap();

    assert_eq!(presented.disclosures().len(), 1);
    assert_eq!(presented.disclosures()[0].claim_name.as_deref(), Some("given_name"));

    let disclosed = presented.into_disclosed_object(&decoder).unwrap();
    assert_eq!(
      Value::Object(disclosed),
      json!({"given_name": "John", "family_name": "Doe"})
    );
  }

  #[test]
  fn present_includes_container_disclosures() {
    let claims = DisclosableObject::new().with(
      "address",
      DisclosableValue::SdObject(DisclosableObject::new().disclosable("street", json!("Main"))),
    );
    let sd_jwt = issue(&claims, &["inner", "outer"]);

    let decoder = SdObjectDecoder::new_with_sha256();
    let mut query_path = ClaimPath::new("address");
    query_path.push("street");
    let presented = sd_jwt.present(&decoder, &[query_path]).unwrap().unwrap();

    // The street disclosure alone is useless without the address wrapper.
    assert_eq!(presented.disclosures().len(), 2);
  }

  #[test]
  fn present_is_idempotent() {
    let claims = DisclosableObject::new()
      .disclosable("given_name", json!("John"))
      .disclosable("email", json!("johndoe@example.com"));
    let sd_jwt = issue(&claims, &["salt1", "salt2"]);

    let decoder = SdObjectDecoder::new_with_sha256();
    let query = [ClaimPath::new("given_name")];
    let once = sd_jwt.present(&decoder, &query).unwrap().unwrap();
    let twice = once.clone().present(&decoder, &query).unwrap().unwrap();
    assert_eq!(once, twice);
  }

  #[test]
  fn present_without_matches_is_no_presentation() {
    let claims = DisclosableObject::new().disclosable("given_name", json!("John"));
    let sd_jwt = issue(&claims, &["salt1"]);

    let decoder = SdObjectDecoder::new_with_sha256();
    let query = [ClaimPath::new("no_such_claim")];
    assert!(sd_jwt.present(&decoder, &query).unwrap().is_none());
  }
}

// Copyright 2020-2024 IOTA Stiftung
// SPDX-License-Identifier: Apache-2.0

use std::collections::BTreeSet;

use async_trait::async_trait;
use serde_json::Value;

use crate::factory::ARRAY_DIGEST_KEY;
use crate::factory::DIGESTS_KEY;
use crate::factory::MAX_NESTING_DEPTH;
use crate::sd_jwt::SdJwtParts;
use crate::Disclosure;
use crate::Error;
use crate::JsonObject;
use crate::KeyBindingError;
use crate::Result;
use crate::SdObjectDecoder;

/// Checks JWT signatures on behalf of the verification pipeline.
///
/// Implementations hold the trusted issuer keys and the accepted signing
/// algorithm policy.
#[async_trait]
pub trait JwtSignatureVerifier: Sync + Send {
  type Error: std::error::Error;

  /// Checks the signature of the compact JWS `jwt` and returns its claims
  /// set.
  async fn verify(&self, jwt: &str) -> std::result::Result<JsonObject, Self::Error>;
}

/// Checks holder signatures on KB-JWTs.
#[async_trait]
pub trait KeyBindingVerifier: Sync + Send {
  type Error: std::error::Error;

  /// Locates the holder's public key in the issuer-signed claims.
  ///
  /// The default implementation looks for a JWK under `cnf.jwk`.
  fn holder_key(&self, claims: &JsonObject) -> Option<JsonObject> {
    claims
      .get("cnf")
      .and_then(|cnf| cnf.get("jwk"))
      .and_then(Value::as_object)
      .cloned()
  }

  /// Checks the signature of the compact `kb_jwt` against `holder_jwk`
  /// and returns the KB-JWT claims set.
  async fn verify(&self, kb_jwt: &str, holder_jwk: &JsonObject) -> std::result::Result<JsonObject, Self::Error>;
}

/// The outcome of a successful verification.
#[derive(Debug, Clone)]
pub struct VerifiedSdJwt {
  /// The claims set of the issuer-signed JWT, as returned by the signature
  /// verifier.
  pub claims: JsonObject,
  /// The parsed disclosures of the presentation.
  pub disclosures: Vec<Disclosure>,
  /// The claims set of the verified KB-JWT, when key binding was required.
  pub key_binding_claims: Option<JsonObject>,
}

impl VerifiedSdJwt {
  /// Recreates the disclosed claims tree.
  ///
  /// Verification only proves that recreation will succeed; callers that
  /// need the actual tree invoke this.
  pub fn disclosed_object(&self, decoder: &SdObjectDecoder) -> Result<JsonObject> {
    decoder.decode(&self.claims, &self.disclosures)
  }
}

/// Verification pipeline over a compact SD-JWT (or one normalised from the
/// JWS JSON serialization).
///
/// Checks run in a fixed order: wire structure, issuer signature,
/// disclosure shape, disclosure uniqueness, digest uniqueness and
/// coverage, then the key binding arm. The first failing check aborts
/// verification; no partial results are returned.
pub struct SdJwtVerifier<V> {
  jwt_verifier: V,
  decoder: SdObjectDecoder,
}

#[cfg(feature = "sha")]
impl<V: JwtSignatureVerifier> SdJwtVerifier<V> {
  /// Creates a verifier with a `sha-256`-only digest registry.
  pub fn new(jwt_verifier: V) -> Self {
    Self::with_decoder(jwt_verifier, SdObjectDecoder::new_with_sha256())
  }
}

impl<V: JwtSignatureVerifier> SdJwtVerifier<V> {
  /// Creates a verifier resolving `_sd_alg` against the hashers registered
  /// in `decoder`.
  pub fn with_decoder(jwt_verifier: V, decoder: SdObjectDecoder) -> Self {
    Self { jwt_verifier, decoder }
  }

  /// The decoder backing this verifier, for callers that want to recreate
  /// the claims tree after verification.
  pub fn decoder(&self) -> &SdObjectDecoder {
    &self.decoder
  }

  /// Verifies a standalone SD-JWT. A key binding JWT must not be present.
  pub async fn verify(&self, sd_jwt: &str) -> Result<VerifiedSdJwt> {
    let (parts, claims, disclosures) = self.verify_common(sd_jwt).await?;

    if parts.key_binding_jwt.is_some() {
      return Err(KeyBindingError::UnexpectedKeyBindingJwt.into());
    }

    Ok(VerifiedSdJwt {
      claims,
      disclosures,
      key_binding_claims: None,
    })
  }

  /// Verifies an SD-JWT presentation whose key binding JWT must be present
  /// and valid.
  ///
  /// The holder key is located in the verified claims by
  /// [`KeyBindingVerifier::holder_key`], the KB-JWT signature is checked
  /// with it, and the KB-JWT's `sd_hash` must equal the digest of the
  /// presented bytes up to and including the `~` preceding the KB-JWT.
  pub async fn verify_with_key_binding<K: KeyBindingVerifier>(
    &self,
    sd_jwt: &str,
    kb_verifier: &K,
  ) -> Result<VerifiedSdJwt> {
    let (parts, claims, disclosures) = self.verify_common(sd_jwt).await?;

    let Some(kb_jwt) = parts.key_binding_jwt.as_deref() else {
      return Err(KeyBindingError::MissingKeyBindingJwt.into());
    };
    let holder_jwk = kb_verifier
      .holder_key(&claims)
      .ok_or(KeyBindingError::MissingHolderPublicKey)?;
    let kb_claims = kb_verifier
      .verify(kb_jwt, &holder_jwk)
      .await
      .map_err(|e| KeyBindingError::InvalidKeyBindingJwt(e.to_string()))?;

    // `sd_hash` commits to the presented bytes, KB-JWT excluded.
    let hasher = self.decoder.determine_hasher(&claims)?;
    let prefix_end = sd_jwt
      .rfind('~')
      .map(|index| index + 1)
      .ok_or(Error::Deserialization("SD-JWT misses the `~` separators".to_string()))?;
    let expected_sd_hash = hasher.encoded_digest(&sd_jwt[..prefix_end]);
    let sd_hash = kb_claims
      .get("sd_hash")
      .and_then(Value::as_str)
      .ok_or(KeyBindingError::InvalidKeyBindingJwt(
        "missing `sd_hash` claim".to_string(),
      ))?;
    if sd_hash != expected_sd_hash {
      return Err(
        KeyBindingError::InvalidKeyBindingJwt("`sd_hash` does not match the presented SD-JWT".to_string()).into(),
      );
    }

    Ok(VerifiedSdJwt {
      claims,
      disclosures,
      key_binding_claims: Some(kb_claims),
    })
  }

  /// Steps shared by both verification shapes: wire parse, signature
  /// check, disclosure shape and uniqueness, digest uniqueness and
  /// coverage.
  async fn verify_common(&self, sd_jwt: &str) -> Result<(SdJwtParts, JsonObject, Vec<Disclosure>)> {
    let parts = SdJwtParts::parse(sd_jwt)?;

    let claims = self
      .jwt_verifier
      .verify(&parts.jwt)
      .await
      .map_err(|e| Error::InvalidJwt(e.to_string()))?;

    let mut disclosures: Vec<Disclosure> = Vec::with_capacity(parts.disclosures.len());
    let mut invalid: Vec<String> = vec![];
    for disclosure in &parts.disclosures {
      match Disclosure::parse(disclosure) {
        Ok(parsed) => disclosures.push(parsed),
        Err(_) => invalid.push(disclosure.clone()),
      }
    }
    if !invalid.is_empty() {
      return Err(Error::InvalidDisclosures(invalid));
    }

    let mut unique: BTreeSet<&str> = BTreeSet::new();
    for disclosure in &parts.disclosures {
      if !unique.insert(disclosure.as_str()) {
        return Err(Error::NonUniqueDisclosures(disclosure.clone()));
      }
    }

    // Every digest site, in the payload or nested in a disclosed value,
    // must be unique across the whole SD-JWT.
    let mut digests: BTreeSet<String> = BTreeSet::new();
    collect_digests(&Value::Object(claims.clone()), &mut digests, 0)?;
    for disclosure in &disclosures {
      collect_digests(&disclosure.claim_value, &mut digests, 0)?;
    }

    let hasher = self.decoder.determine_hasher(&claims)?;
    let missing: Vec<String> = disclosures
      .iter()
      .filter(|disclosure| !digests.contains(&disclosure.digest(hasher)))
      .map(|disclosure| disclosure.as_str().to_owned())
      .collect();
    if !missing.is_empty() {
      return Err(Error::MissingDigests(missing));
    }

    Ok((parts, claims, disclosures))
  }
}

/// Collects every digest string referenced by `value` into `digests`,
/// failing on the first one seen twice.
fn collect_digests(value: &Value, digests: &mut BTreeSet<String>, depth: usize) -> Result<()> {
  if depth >= MAX_NESTING_DEPTH {
    return Err(Error::DepthLimitExceeded(MAX_NESTING_DEPTH));
  }

  match value {
    Value::Object(object) => {
      if let Some(sd) = object.get(DIGESTS_KEY) {
        let sd_array = sd
          .as_array()
          .ok_or(Error::DataTypeMismatch(format!("{} is not an array", DIGESTS_KEY)))?;
        for digest in sd_array {
          let digest = digest
            .as_str()
            .ok_or(Error::DataTypeMismatch(format!("{} is not a string", digest)))?;
          if !digests.insert(digest.to_owned()) {
            return Err(Error::DuplicateDigest(digest.to_owned()));
          }
        }
      }
      for (key, entry) in object {
        if key != DIGESTS_KEY {
          collect_digests(entry, digests, depth + 1)?;
        }
      }
    }
    Value::Array(array) => {
      for entry in array {
        let array_digest = entry
          .as_object()
          .filter(|object| object.len() == 1)
          .and_then(|object| object.get(ARRAY_DIGEST_KEY))
          .and_then(Value::as_str);
        if let Some(digest) = array_digest {
          if !digests.insert(digest.to_owned()) {
            return Err(Error::DuplicateDigest(digest.to_owned()));
          }
        } else {
          collect_digests(entry, digests, depth + 1)?;
        }
      }
    }
    _ => {}
  }
  Ok(())
}

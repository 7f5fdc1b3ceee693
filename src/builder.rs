use anyhow::Context as _;
use serde_json::Value;

use crate::DisclosableObject;
use crate::Error;
use crate::Hasher;
use crate::JwsSigner;
use crate::RequiredKeyBinding;
use crate::Result;
use crate::SdJwt;
use crate::SdJwtFactory;
use crate::SdPayload;
#[cfg(feature = "sha")]
use crate::Sha256Hasher;
use crate::HEADER_TYP;

/// Builder structure to create an issuable SD-JWT.
#[cfg(feature = "sha")]
pub struct SdJwtBuilder<H: Hasher = Sha256Hasher> {
  factory: SdJwtFactory<H>,
  claims: DisclosableObject,
  key_bind: Option<RequiredKeyBinding>,
}

#[cfg(not(feature = "sha"))]
pub struct SdJwtBuilder<H: Hasher> {
  factory: SdJwtFactory<H>,
  claims: DisclosableObject,
  key_bind: Option<RequiredKeyBinding>,
}

#[cfg(feature = "sha")]
impl SdJwtBuilder {
  /// Creates a new [`SdJwtBuilder`] issuing `claims` with the `sha-256`
  /// hash function.
  pub fn new(claims: DisclosableObject) -> Self {
    Self::with_factory(claims, SdJwtFactory::new())
  }
}

impl<H: Hasher> SdJwtBuilder<H> {
  /// Creates a new [`SdJwtBuilder`] issuing `claims` through a custom
  /// [`SdJwtFactory`], e.g. one with another hash function or injected
  /// salt and decoy sources.
  pub fn with_factory(claims: DisclosableObject, factory: SdJwtFactory<H>) -> Self {
    Self {
      factory,
      claims,
      key_bind: None,
    }
  }

  /// Require a proof of possession of a given key from the holder.
  ///
  /// This operation adds a JWT confirmation (`cnf`) claim as specified in
  /// [RFC8300](https://www.rfc-editor.org/rfc/rfc7800.html#section-3).
  pub fn require_key_binding(mut self, key_bind: RequiredKeyBinding) -> Self {
    self.key_bind = Some(key_bind);
    self
  }

  /// Creates an SD-JWT with the provided data.
  ///
  /// ## Error
  /// [`Error::ClaimCollision`] if a key binding was required while the
  /// claims already declare a top-level `cnf`, besides the issuance
  /// failure modes of [`SdJwtFactory::create`].
  pub async fn finish<S>(self, signer: &S, alg: &str) -> Result<SdJwt>
  where
    S: JwsSigner,
  {
    let SdJwtBuilder {
      factory,
      claims,
      key_bind,
    } = self;

    // `cnf` is written by the builder itself; a caller-declared claim of
    // that name must not be silently clobbered.
    if key_bind.is_some() && claims.entries().iter().any(|(name, _)| name == "cnf") {
      return Err(Error::ClaimCollision("cnf".to_string()));
    }

    let SdPayload { mut object, disclosures } = factory.create(&claims)?;

    // Add key binding requirement as `cnf`.
    if let Some(key_bind) = key_bind {
      let key_bind = serde_json::to_value(key_bind).map_err(|e| Error::Deserialization(e.to_string()))?;
      object.insert("cnf".to_string(), key_bind);
    }

    let Value::Object(header) = serde_json::json!({
      "typ": HEADER_TYP,
      "alg": alg,
    }) else {
      unreachable!();
    };

    let jws = signer
      .sign(&header, &object)
      .await
      .map_err(|e| anyhow::anyhow!("jws failed: {e}"))
      .and_then(|jws_bytes| String::from_utf8(jws_bytes).context("invalid JWS"))
      .map_err(|e| Error::JwsSignerFailure(e.to_string()))?;

    let jwt = jws.parse()?;
    Ok(SdJwt::new(jwt, disclosures, None))
  }
}

#[cfg(test)]
mod test {
  use super::SdJwtBuilder;
  use crate::DisclosableObject;
  use crate::Error;
  use crate::JsonObject;
  use crate::JwsSigner;
  use crate::RequiredKeyBinding;
  use async_trait::async_trait;
  use serde_json::json;

  #[derive(Debug, thiserror::Error)]
  #[error("signing must not be reached")]
  struct UnreachableSigner;

  #[async_trait]
  impl JwsSigner for UnreachableSigner {
    type Error = UnreachableSigner;

    async fn sign(&self, _header: &JsonObject, _payload: &JsonObject) -> Result<Vec<u8>, Self::Error> {
      Err(UnreachableSigner)
    }
  }

  #[tokio::test]
  async fn key_binding_does_not_clobber_a_cnf_claim() {
    let claims = DisclosableObject::new().plain("cnf", json!({"jwk": {"kty": "oct"}}));
    let result = SdJwtBuilder::new(claims)
      .require_key_binding(RequiredKeyBinding::Jwk(JsonObject::new()))
      .finish(&UnreachableSigner, "HS256")
      .await;
    assert!(matches!(
      result.unwrap_err(),
      Error::ClaimCollision(collision) if collision == "cnf"
    ));
  }
}

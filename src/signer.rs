// Copyright 2020-2024 IOTA Stiftung
// SPDX-License-Identifier: Apache-2.0

use std::error::Error;

use async_trait::async_trait;
use serde_json::Map;
use serde_json::Value;

pub type JsonObject = Map<String, Value>;

/// JSON Web Signature (JWS) Signer.
///
/// Implementations hold the issuer's key material and decide which signing
/// algorithms they accept; the codec never inspects `alg`.
#[async_trait]
pub trait JwsSigner {
  type Error: Error;

  /// Creates a JWS over `payload`. The algorithm used for signing must be
  /// read from the `header.alg` property. Returns the bytes of the compact
  /// serialization.
  async fn sign(&self, header: &JsonObject, payload: &JsonObject) -> Result<Vec<u8>, Self::Error>;
}

#[async_trait]
impl<'a, S: JwsSigner + Sync> JwsSigner for &'a S {
  type Error = S::Error;

  async fn sign(&self, header: &JsonObject, payload: &JsonObject) -> Result<Vec<u8>, Self::Error> {
    (*self).sign(header, payload).await
  }
}

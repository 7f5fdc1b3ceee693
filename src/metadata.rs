// Copyright 2020-2024 IOTA Stiftung
// SPDX-License-Identifier: Apache-2.0

use std::error::Error;

use async_trait::async_trait;

use crate::JsonObject;

/// Validates disclosed claims against a JSON Schema.
///
/// Used by credential layers built on top of the codec; the core never
/// invokes it.
#[async_trait]
pub trait JsonSchemaValidator: Sync + Send {
  type Error: Error;

  /// Validates `object` against the schema identified by `schema_uri`.
  async fn validate(&self, schema_uri: &str, object: &JsonObject) -> Result<(), Self::Error>;
}

/// Retrieves type metadata documents for credential types.
///
/// Implementations typically fetch over HTTPS and may cache; callers must
/// treat calls as blocking I/O.
#[async_trait]
pub trait TypeMetadataFetcher: Sync + Send {
  type Error: Error;

  /// Retrieves the type metadata document identified by `vct`.
  async fn fetch(&self, vct: &str) -> Result<JsonObject, Self::Error>;
}

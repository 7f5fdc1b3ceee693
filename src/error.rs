// Copyright 2020-2024 IOTA Stiftung
// SPDX-License-Identifier: Apache-2.0

/// Alias for a `Result` with the error type [`Error`].
pub type Result<T> = ::core::result::Result<T, Error>;

#[derive(Debug, thiserror::Error, strum::IntoStaticStr)]
#[non_exhaustive]
pub enum Error {
  /// A single disclosure string could not be decoded to the required shape.
  #[error("invalid disclosure: {0}")]
  InvalidDisclosure(String),

  /// One or more disclosure strings of an SD-JWT could not be parsed.
  /// Carries the offending raw strings.
  #[error("{} disclosures could not be parsed", .0.len())]
  InvalidDisclosures(Vec<String>),

  /// The `_sd_alg` claim names an algorithm outside the supported set.
  #[error("unsupported hashing algorithm: {0}")]
  UnsupportedHashAlgorithm(String),

  /// No hasher is registered for the required algorithm.
  #[error("no hasher available for algorithm {0}")]
  MissingHasher(String),

  #[error("data type is not expected: {0}")]
  DataTypeMismatch(String),

  /// A claim name collides with a claim already present at the same
  /// object level, or with one of the reserved claim names.
  #[error("claim {0} collides with a claim already present")]
  ClaimCollision(String),

  /// The same digest appears at more than one site.
  #[error("digest {0} appears multiple times")]
  DuplicateDigest(String),

  /// Two disclosure strings of one SD-JWT are byte-identical.
  #[error("disclosure {0} appears multiple times")]
  NonUniqueDisclosures(String),

  /// Disclosures whose digests have no site in the payload or in any
  /// disclosed value. Carries the encoded disclosure strings.
  #[error("{} disclosures have no matching digest", .0.len())]
  MissingDigests(Vec<String>),

  #[error("array disclosure object contains keys other than `...`")]
  InvalidArrayDisclosureObject,

  #[error("invalid claim path: {0}")]
  InvalidClaimPath(String),

  #[error("invalid input: {0}")]
  Deserialization(String),

  /// The issuer-signed JWT is rejected: bad signature, malformed segments
  /// or an `_sd_alg` claim of the wrong type.
  #[error("invalid JWT: {0}")]
  InvalidJwt(String),

  #[error("signing failed: {0}")]
  JwsSignerFailure(String),

  #[error("key binding verification failed: {0}")]
  KeyBinding(#[from] KeyBindingError),

  /// A `null` value was marked selectively disclosable.
  #[error("claim {0} is null and cannot be made disclosable")]
  NullNotDisclosable(String),

  #[error("nesting depth exceeds the supported maximum of {0}")]
  DepthLimitExceeded(usize),

  #[error("salt size must be greater or equal 16")]
  InvalidSaltSize,

  #[error("{0}")]
  Unspecified(String),
}

/// Failure kinds of the key binding arm of verification.
#[derive(Debug, thiserror::Error, strum::IntoStaticStr)]
#[non_exhaustive]
pub enum KeyBindingError {
  /// The issuer-signed claims carry no holder public key.
  #[error("no holder public key found in the issuer-signed claims")]
  MissingHolderPublicKey,

  #[error("holder public key is not usable: {0}")]
  UnsupportedHolderPublicKey(String),

  /// The KB-JWT is present but does not check out: bad signature, wrong
  /// `sd_hash`, or malformed claims.
  #[error("invalid key binding JWT: {0}")]
  InvalidKeyBindingJwt(String),

  /// A KB-JWT was attached although none is allowed.
  #[error("unexpected key binding JWT")]
  UnexpectedKeyBindingJwt,

  /// A KB-JWT is required but missing.
  #[error("missing key binding JWT")]
  MissingKeyBindingJwt,
}

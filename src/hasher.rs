// Copyright 2020-2024 IOTA Stiftung
// SPDX-License-Identifier: Apache-2.0

use std::str::FromStr;

#[cfg(feature = "sha")]
use crypto::hashes::sha::SHA256;
#[cfg(feature = "sha")]
use crypto::hashes::sha::SHA256_LEN;
#[cfg(feature = "sha")]
use crypto::hashes::sha::SHA384;
#[cfg(feature = "sha")]
use crypto::hashes::sha::SHA384_LEN;
#[cfg(feature = "sha")]
use crypto::hashes::sha::SHA512;
#[cfg(feature = "sha")]
use crypto::hashes::sha::SHA512_LEN;

use crate::Error;

/// The closed set of hash algorithms an SD-JWT may name in its `_sd_alg`
/// claim.
///
/// The string forms are the "Hash Name String" values of the IANA
/// "Named Information Hash Algorithm" registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display, strum::EnumString, strum::IntoStaticStr)]
pub enum HashAlg {
  #[strum(serialize = "sha-256")]
  Sha256,
  #[strum(serialize = "sha-384")]
  Sha384,
  #[strum(serialize = "sha-512")]
  Sha512,
  #[strum(serialize = "sha3-256")]
  Sha3_256,
  #[strum(serialize = "sha3-384")]
  Sha3_384,
  #[strum(serialize = "sha3-512")]
  Sha3_512,
}

impl HashAlg {
  /// The algorithm used when an SD-JWT carries no `_sd_alg` claim.
  pub const DEFAULT: Self = HashAlg::Sha256;

  /// Parses an IANA hash name.
  ///
  /// ## Error
  /// Returns [`Error::UnsupportedHashAlgorithm`] for names outside the
  /// supported set.
  pub fn parse(name: &str) -> Result<Self, Error> {
    Self::from_str(name).map_err(|_| Error::UnsupportedHashAlgorithm(name.to_string()))
  }
}

/// Used to implement hash functions to be used for encoding/decoding.
///
/// ## Note
///
/// Implementations of this trait are expected only for algorithms listed in
/// the IANA "Named Information Hash Algorithm" registry.
/// See [Hash Function Claim](https://www.ietf.org/archive/id/draft-ietf-oauth-selective-disclosure-jwt-06.html#name-hash-function-claim)
pub trait Hasher: Sync + Send {
  /// Digests input to produce unique fixed-size hash value in bytes.
  fn digest(&self, input: &[u8]) -> Vec<u8>;

  /// Returns the name of hash function used.
  fn alg_name(&self) -> &'static str;

  /// Returns the base64url-encoded digest of a `disclosure`.
  fn encoded_digest(&self, disclosure: &str) -> String {
    let hash = self.digest(disclosure.as_bytes());
    multibase::Base::Base64Url.encode(hash)
  }
}

/// An implementation of [`Hasher`] that uses the `sha-256` hash function.
#[cfg(feature = "sha")]
#[derive(Debug, Clone, Default)]
pub struct Sha256Hasher;

#[cfg(feature = "sha")]
impl Sha256Hasher {
  pub const ALG_NAME: &'static str = "sha-256";

  /// Creates a new [`Sha256Hasher`].
  pub fn new() -> Self {
    Sha256Hasher {}
  }
}

#[cfg(feature = "sha")]
impl Hasher for Sha256Hasher {
  fn digest(&self, input: &[u8]) -> Vec<u8> {
    let mut digest: [u8; SHA256_LEN] = Default::default();
    SHA256(input, &mut digest);
    digest.to_vec()
  }

  fn alg_name(&self) -> &'static str {
    Sha256Hasher::ALG_NAME
  }
}

/// An implementation of [`Hasher`] that uses the `sha-384` hash function.
#[cfg(feature = "sha")]
#[derive(Debug, Clone, Default)]
pub struct Sha384Hasher;

#[cfg(feature = "sha")]
impl Sha384Hasher {
  pub const ALG_NAME: &'static str = "sha-384";

  /// Creates a new [`Sha384Hasher`].
  pub fn new() -> Self {
    Sha384Hasher {}
  }
}

#[cfg(feature = "sha")]
impl Hasher for Sha384Hasher {
  fn digest(&self, input: &[u8]) -> Vec<u8> {
    let mut digest: [u8; SHA384_LEN] = [0u8; SHA384_LEN];
    SHA384(input, &mut digest);
    digest.to_vec()
  }

  fn alg_name(&self) -> &'static str {
    Sha384Hasher::ALG_NAME
  }
}

/// An implementation of [`Hasher`] that uses the `sha-512` hash function.
#[cfg(feature = "sha")]
#[derive(Debug, Clone, Default)]
pub struct Sha512Hasher;

#[cfg(feature = "sha")]
impl Sha512Hasher {
  pub const ALG_NAME: &'static str = "sha-512";

  /// Creates a new [`Sha512Hasher`].
  pub fn new() -> Self {
    Sha512Hasher {}
  }
}

#[cfg(feature = "sha")]
impl Hasher for Sha512Hasher {
  fn digest(&self, input: &[u8]) -> Vec<u8> {
    let mut digest: [u8; SHA512_LEN] = [0u8; SHA512_LEN];
    SHA512(input, &mut digest);
    digest.to_vec()
  }

  fn alg_name(&self) -> &'static str {
    Sha512Hasher::ALG_NAME
  }
}

/// An implementation of [`Hasher`] that uses the `sha3-256` hash function.
#[cfg(feature = "sha3")]
#[derive(Debug, Clone, Default)]
pub struct Sha3_256Hasher;

#[cfg(feature = "sha3")]
impl Sha3_256Hasher {
  pub const ALG_NAME: &'static str = "sha3-256";

  /// Creates a new [`Sha3_256Hasher`].
  pub fn new() -> Self {
    Sha3_256Hasher {}
  }
}

#[cfg(feature = "sha3")]
impl Hasher for Sha3_256Hasher {
  fn digest(&self, input: &[u8]) -> Vec<u8> {
    use sha3::Digest;
    sha3::Sha3_256::digest(input).to_vec()
  }

  fn alg_name(&self) -> &'static str {
    Sha3_256Hasher::ALG_NAME
  }
}

/// An implementation of [`Hasher`] that uses the `sha3-384` hash function.
#[cfg(feature = "sha3")]
#[derive(Debug, Clone, Default)]
pub struct Sha3_384Hasher;

#[cfg(feature = "sha3")]
impl Sha3_384Hasher {
  pub const ALG_NAME: &'static str = "sha3-384";

  /// Creates a new [`Sha3_384Hasher`].
  pub fn new() -> Self {
    Sha3_384Hasher {}
  }
}

#[cfg(feature = "sha3")]
impl Hasher for Sha3_384Hasher {
  fn digest(&self, input: &[u8]) -> Vec<u8> {
    use sha3::Digest;
    sha3::Sha3_384::digest(input).to_vec()
  }

  fn alg_name(&self) -> &'static str {
    Sha3_384Hasher::ALG_NAME
  }
}

/// An implementation of [`Hasher`] that uses the `sha3-512` hash function.
#[cfg(feature = "sha3")]
#[derive(Debug, Clone, Default)]
pub struct Sha3_512Hasher;

#[cfg(feature = "sha3")]
impl Sha3_512Hasher {
  pub const ALG_NAME: &'static str = "sha3-512";

  /// Creates a new [`Sha3_512Hasher`].
  pub fn new() -> Self {
    Sha3_512Hasher {}
  }
}

#[cfg(feature = "sha3")]
impl Hasher for Sha3_512Hasher {
  fn digest(&self, input: &[u8]) -> Vec<u8> {
    use sha3::Digest;
    sha3::Sha3_512::digest(input).to_vec()
  }

  fn alg_name(&self) -> &'static str {
    Sha3_512Hasher::ALG_NAME
  }
}

// Some test values taken from https://www.ietf.org/archive/id/draft-ietf-oauth-selective-disclosure-jwt-05.html#name-hashing-disclosures
#[cfg(test)]
mod test {
  use super::HashAlg;
  use crate::Error;
  use crate::Hasher;
  use crate::Sha256Hasher;

  #[test]
  fn test1() {
    let disclosure = "WyI2cU1RdlJMNWhhaiIsICJmYW1pbHlfbmFtZSIsICJNw7ZiaXVzIl0";
    let hasher = Sha256Hasher::new();
    let hash = hasher.encoded_digest(disclosure);
    assert_eq!("uutlBuYeMDyjLLTpf6Jxi7yNkEF35jdyWMn9U7b_RYY", hash);
  }

  #[test]
  fn test2() {
    let disclosure =
      "WyJlSThaV205UW5LUHBOUGVOZW5IZGhRIiwgImVtYWlsIiwgIlwidW51c3VhbCBlbWFpbCBhZGRyZXNzXCJAZXhhbXBsZS5qcCJd";
    let hasher = Sha256Hasher::new();
    let hash = hasher.encoded_digest(disclosure);
    assert_eq!("Kuet1yAa0HIQvYnOVd59hcViO9Ug6J2kSfqYRBeowvE", hash);
  }

  #[test]
  fn test3() {
    let disclosure = "WyJsa2x4RjVqTVlsR1RQVW92TU5JdkNBIiwgIkZSIl0";
    let hasher = Sha256Hasher::new();
    let hash = hasher.encoded_digest(disclosure);
    assert_eq!("w0I8EKcdCtUPkGCNUrfwVp2xEgNjtoIDlOxc9-PlOhs", hash);
  }

  #[test]
  fn alg_names_round_trip() {
    for name in ["sha-256", "sha-384", "sha-512", "sha3-256", "sha3-384", "sha3-512"] {
      assert_eq!(HashAlg::parse(name).unwrap().to_string(), name);
    }
  }

  #[test]
  fn unknown_alg_is_rejected() {
    assert!(matches!(
      HashAlg::parse("md5").unwrap_err(),
      Error::UnsupportedHashAlgorithm(name) if name == "md5"
    ));
  }
}

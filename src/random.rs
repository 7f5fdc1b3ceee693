// Copyright 2020-2024 IOTA Stiftung
// SPDX-License-Identifier: Apache-2.0

use rand::Rng;

use crate::Error;
use crate::Hasher;
use crate::Result;

/// Size of random data used to generate the salts for disclosures in bytes.
/// Constant length for readability considerations.
pub(crate) const DEFAULT_SALT_SIZE: usize = 16;
pub(crate) const MIN_SALT_SIZE: usize = 16;

pub(crate) fn gen_rand(len: usize) -> String {
  let mut rng = rand::thread_rng();
  let random_bytes: Vec<u8> = (0..len).map(|_| rng.gen()).collect();
  multibase::Base::Base64Url.encode(random_bytes)
}

/// Source of the salts embedded in disclosures.
///
/// Production providers must draw from a cryptographically secure source;
/// deterministic implementations are meant for tests only.
pub trait SaltProvider: Sync + Send {
  /// Returns a fresh base64url-encoded salt.
  fn salt(&self) -> String;
}

/// Default [`SaltProvider`] drawing salts from [`rand::thread_rng`].
#[derive(Debug, Clone)]
pub struct RandomSaltProvider {
  salt_size: usize,
}

impl RandomSaltProvider {
  /// Creates a provider emitting salts of `salt_size` random bytes.
  ///
  /// ## Error
  /// [`Error::InvalidSaltSize`] if `salt_size` is below 16 bytes.
  pub fn new(salt_size: usize) -> Result<Self> {
    if salt_size < MIN_SALT_SIZE {
      Err(Error::InvalidSaltSize)
    } else {
      Ok(Self { salt_size })
    }
  }

  /// Returns the used salt length.
  pub fn salt_size(&self) -> usize {
    self.salt_size
  }
}

impl Default for RandomSaltProvider {
  fn default() -> Self {
    Self {
      salt_size: DEFAULT_SALT_SIZE,
    }
  }
}

impl SaltProvider for RandomSaltProvider {
  fn salt(&self) -> String {
    gen_rand(self.salt_size)
  }
}

/// Source of the decoy digests padding `_sd` arrays.
///
/// The number of decoys is decided by the issuance engine; only the decoy
/// values come from this trait.
pub trait DecoyGenerator: Sync + Send {
  /// Returns a digest-shaped random value under `hasher`'s algorithm.
  fn decoy_digest(&self, hasher: &dyn Hasher) -> String;
}

/// Default [`DecoyGenerator`]: hashes a random salt so that decoys are
/// indistinguishable from disclosure digests.
#[derive(Debug, Clone, Default)]
pub struct RandomDecoyGenerator {
  salt_provider: RandomSaltProvider,
}

impl RandomDecoyGenerator {
  /// Creates a generator drawing decoy pre-images from `salt_provider`.
  pub fn new(salt_provider: RandomSaltProvider) -> Self {
    Self { salt_provider }
  }
}

impl DecoyGenerator for RandomDecoyGenerator {
  fn decoy_digest(&self, hasher: &dyn Hasher) -> String {
    hasher.encoded_digest(&self.salt_provider.salt())
  }
}

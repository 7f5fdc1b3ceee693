// Copyright 2020-2024 IOTA Stiftung
// SPDX-License-Identifier: Apache-2.0

mod builder;
mod claim_path;
mod decoder;
mod disclosable;
mod disclosure;
mod error;
mod factory;
mod hasher;
mod jws_json;
mod jwt;
mod key_binding_jwt_claims;
mod metadata;
mod random;
mod sd_jwt;
mod signer;
#[cfg(test)]
mod test_utils;
mod verifier;

pub use builder::*;
pub use claim_path::*;
pub use decoder::*;
pub use disclosable::*;
pub use disclosure::*;
pub use error::*;
pub use factory::*;
pub use hasher::*;
pub use jws_json::*;
pub use jwt::*;
pub use key_binding_jwt_claims::*;
pub use metadata::*;
pub use random::*;
pub use sd_jwt::*;
pub use signer::*;
pub use verifier::*;

pub(crate) use factory::RESERVED_CLAIM_NAMES;

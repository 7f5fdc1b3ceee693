// Copyright 2020-2024 IOTA Stiftung
// SPDX-License-Identifier: Apache-2.0

use std::error::Error;

use async_trait::async_trait;
use josekit::jws::JwsHeader;
use josekit::jws::HS256;
use josekit::jwt::JwtPayload;
use josekit::jwt::{self};
use serde_json::json;

use sd_jwt_core::ClaimPath;
use sd_jwt_core::DisclosableArray;
use sd_jwt_core::DisclosableObject;
use sd_jwt_core::DisclosableValue;
use sd_jwt_core::JsonObject;
use sd_jwt_core::JwsSigner;
use sd_jwt_core::JwtSignatureVerifier;
use sd_jwt_core::SdJwt;
use sd_jwt_core::SdJwtBuilder;
use sd_jwt_core::SdJwtVerifier;
use sd_jwt_core::SdObjectDecoder;

const KEY: &[u8] = b"0123456789ABCDEF0123456789ABCDEF";

// Creating and checking JWTs is outside the scope of this library, josekit
// is used here as an example.
struct HmacSigner;

#[async_trait]
impl JwsSigner for HmacSigner {
  type Error = josekit::JoseError;

  async fn sign(&self, header: &JsonObject, payload: &JsonObject) -> Result<Vec<u8>, Self::Error> {
    let signer = HS256.signer_from_bytes(KEY)?;
    let header = JwsHeader::from_map(header.clone())?;
    let payload = JwtPayload::from_map(payload.clone())?;
    Ok(jwt::encode_with_signer(&payload, &header, &signer)?.into_bytes())
  }
}

struct HmacVerifier;

#[async_trait]
impl JwtSignatureVerifier for HmacVerifier {
  type Error = josekit::JoseError;

  async fn verify(&self, compact_jwt: &str) -> Result<JsonObject, Self::Error> {
    let verifier = HS256.verifier_from_bytes(KEY)?;
    let (payload, _header) = jwt::decode_with_verifier(compact_jwt, &verifier)?;
    Ok(payload.claims_set().clone())
  }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
  let claims = DisclosableObject::new()
    .plain("sub", json!("user_42"))
    .disclosable("given_name", json!("John"))
    .disclosable("family_name", json!("Doe"))
    .disclosable("email", json!("johndoe@example.com"))
    .with(
      "address",
      DisclosableValue::SdObject(
        DisclosableObject::new()
          .disclosable("street_address", json!("123 Main St"))
          .plain("locality", json!("Anytown"))
          .plain("country", json!("US")),
      ),
    )
    .with(
      "nationalities",
      DisclosableValue::Array(DisclosableArray::new().plain(json!("US")).disclosable(json!("DE"))),
    )
    .with_min_digests(6);

  // Issue and sign.
  let sd_jwt = SdJwtBuilder::new(claims).finish(&HmacSigner, "HS256").await?;
  println!(
    "issued payload: {}",
    serde_json::to_string_pretty(&sd_jwt.claims().to_object()?)?
  );
  println!("issued SD-JWT: {}", sd_jwt.presentation());

  // The holder reveals only the given name and the street address.
  let decoder = SdObjectDecoder::new_with_sha256();
  let query = [
    ClaimPath::new("given_name"),
    ClaimPath::new("address").extended("street_address"),
  ];
  let presented = sd_jwt
    .present(&decoder, &query)?
    .expect("the query matches disclosed claims");
  println!("presented SD-JWT: {}", presented.presentation());

  // The verifier checks the presentation and recreates the visible claims.
  let verifier = SdJwtVerifier::new(HmacVerifier);
  let verified = verifier.verify(&presented.presentation()).await?;
  let disclosed = verified.disclosed_object(verifier.decoder())?;
  println!("disclosed claims: {}", serde_json::to_string_pretty(&disclosed)?);

  // Round trip through the wire format.
  let reparsed = SdJwt::parse(&presented.presentation())?;
  assert_eq!(reparsed.presentation(), presented.presentation());
  Ok(())
}

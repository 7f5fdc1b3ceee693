// Copyright 2020-2024 IOTA Stiftung
// SPDX-License-Identifier: Apache-2.0

use serde::Deserialize;
use serde::Serialize;
use serde_with::skip_serializing_none;

use crate::key_binding_jwt_claims::presented_prefix;
use crate::Error;
use crate::Result;
use crate::SdJwt;

/// The JWS JSON serialization of an SD-JWT (RFC 7515 §7.2): the signed
/// segments as JSON members instead of a compact string, with the
/// disclosures and the optional KB-JWT carried in the unprotected header.
///
/// The signed segments stay base64url-encoded strings and are reassembled
/// verbatim on normalization, so signature checks see the exact issued
/// bytes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum JwsJson {
  General(JwsJsonGeneral),
  Flattened(JwsJsonFlattened),
}

/// General JWS JSON serialization: a `signatures` array.
///
/// An SD-JWT has exactly one signer, so exactly one entry is accepted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JwsJsonGeneral {
  pub payload: String,
  pub signatures: Vec<JwsJsonSignature>,
}

/// One signature entry of the general serialization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JwsJsonSignature {
  pub protected: String,
  pub signature: String,
  pub header: UnprotectedHeader,
}

/// Flattened JWS JSON serialization: a single signature, inlined.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JwsJsonFlattened {
  pub protected: String,
  pub payload: String,
  pub signature: String,
  pub header: UnprotectedHeader,
}

/// The unprotected header members an SD-JWT uses.
#[skip_serializing_none]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnprotectedHeader {
  #[serde(default)]
  pub disclosures: Vec<String>,
  pub kb_jwt: Option<String>,
}

impl JwsJson {
  /// Converts `sd_jwt` into the flattened serialization.
  pub fn flattened(sd_jwt: &SdJwt) -> Result<Self> {
    let (protected, payload, signature) = split_compact(sd_jwt.jwt().as_str())?;
    Ok(JwsJson::Flattened(JwsJsonFlattened {
      protected,
      payload,
      signature,
      header: unprotected_header(sd_jwt),
    }))
  }

  /// Converts `sd_jwt` into the general serialization with a single
  /// signature entry.
  pub fn general(sd_jwt: &SdJwt) -> Result<Self> {
    let (protected, payload, signature) = split_compact(sd_jwt.jwt().as_str())?;
    Ok(JwsJson::General(JwsJsonGeneral {
      payload,
      signatures: vec![JwsJsonSignature {
        protected,
        signature,
        header: unprotected_header(sd_jwt),
      }],
    }))
  }

  /// Normalises this serialization back into the compact
  /// `<JWT>~<disclosures>~<KB-JWT>` form, reassembling the signed segments
  /// without re-encoding them.
  ///
  /// ## Error
  /// [`Error::Deserialization`] if a general serialization does not carry
  /// exactly one signature.
  pub fn to_compact(&self) -> Result<String> {
    let (protected, payload, signature, header) = match self {
      JwsJson::Flattened(flattened) => (
        &flattened.protected,
        &flattened.payload,
        &flattened.signature,
        &flattened.header,
      ),
      JwsJson::General(general) => {
        let [signature] = general.signatures.as_slice() else {
          return Err(Error::Deserialization(format!(
            "general JWS JSON serialization of an SD-JWT requires exactly one signature, found {}",
            general.signatures.len()
          )));
        };
        (&signature.protected, &general.payload, &signature.signature, &signature.header)
      }
    };

    let jwt = format!("{protected}.{payload}.{signature}");
    let mut compact = presented_prefix(&jwt, &header.disclosures);
    if let Some(kb_jwt) = &header.kb_jwt {
      compact.push_str(kb_jwt);
    }
    Ok(compact)
  }

  /// Normalises and parses this serialization into an [`SdJwt`].
  pub fn into_sd_jwt(&self) -> Result<SdJwt> {
    SdJwt::parse(&self.to_compact()?)
  }
}

fn unprotected_header(sd_jwt: &SdJwt) -> UnprotectedHeader {
  UnprotectedHeader {
    disclosures: sd_jwt
      .disclosures()
      .iter()
      .map(|disclosure| disclosure.as_str().to_owned())
      .collect(),
    kb_jwt: sd_jwt.key_binding_jwt().map(|kb_jwt| kb_jwt.as_str().to_owned()),
  }
}

fn split_compact(jwt: &str) -> Result<(String, String, String)> {
  let segments: Vec<&str> = jwt.split('.').collect();
  let [protected, payload, signature] = segments.as_slice() else {
    return Err(Error::Deserialization(
      "compact JWT does not consist of 3 segments".to_string(),
    ));
  };
  Ok((protected.to_string(), payload.to_string(), signature.to_string()))
}

#[cfg(test)]
mod test {
  use super::JwsJson;
  use crate::SdJwt;
  use serde_json::json;

  const SD_JWT: &str = "eyJhbGciOiAiRVMyNTYifQ.eyJfc2QiOiBbIkM5aW5wNllvUmFFWFI0Mjd6WUpQN1FyazFXSF84YmR3T0FfWVVyVW5HUVUiXSwgIl9zZF9hbGciOiAic2hhLTI1NiJ9.c2ln~WyJHMDJOU3JRZmpGWFE3SW8wOXN5YWpBIiwgInJlZ2lvbiIsICJcdTZlMmZcdTUzM2EiXQ~";

  #[test]
  fn flattened_round_trip() {
    let sd_jwt = SdJwt::parse(SD_JWT).unwrap();
    let flattened = JwsJson::flattened(&sd_jwt).unwrap();
    assert_eq!(flattened.to_compact().unwrap(), SD_JWT);

    let serialized = serde_json::to_string(&flattened).unwrap();
    let deserialized: JwsJson = serde_json::from_str(&serialized).unwrap();
    assert_eq!(deserialized, flattened);
    assert_eq!(deserialized.into_sd_jwt().unwrap(), sd_jwt);
  }

  #[test]
  fn general_round_trip() {
    let sd_jwt = SdJwt::parse(SD_JWT).unwrap();
    let general = JwsJson::general(&sd_jwt).unwrap();
    assert_eq!(general.to_compact().unwrap(), SD_JWT);

    let serialized = serde_json::to_value(&general).unwrap();
    assert!(serialized.get("signatures").is_some());
    let deserialized: JwsJson = serde_json::from_value(serialized).unwrap();
    assert_eq!(deserialized.into_sd_jwt().unwrap(), sd_jwt);
  }

  #[test]
  fn serialized_members() {
    let sd_jwt = SdJwt::parse(SD_JWT).unwrap();
    let JwsJson::Flattened(flattened) = JwsJson::flattened(&sd_jwt).unwrap() else {
      panic!("expected the flattened form");
    };
    assert_eq!(flattened.protected, "eyJhbGciOiAiRVMyNTYifQ");
    assert_eq!(flattened.signature, "c2ln");
    assert_eq!(flattened.header.disclosures.len(), 1);
    assert_eq!(flattened.header.kb_jwt, None);
  }

  #[test]
  fn multiple_signatures_are_rejected() {
    let serialized = json!({
      "payload": "cGF5bG9hZA",
      "signatures": [
        {"protected": "cA", "signature": "cw", "header": {"disclosures": []}},
        {"protected": "cA", "signature": "cw", "header": {"disclosures": []}}
      ]
    });
    let parsed: JwsJson = serde_json::from_value(serialized).unwrap();
    assert!(parsed.to_compact().is_err());
  }

  #[test]
  fn kb_jwt_is_carried_in_the_unprotected_header() {
    const KB_JWT: &str = "eyJhbGciOiJFUzI1NiIsInR5cCI6ImtiK2p3dCJ9.eyJpYXQiOjE2ODMwMDAwMDAsImF1ZCI6InZlcmlmaWVyIiwibm9uY2UiOiJuLTEyMyIsInNkX2hhc2giOiJhYmMifQ.c2ln";
    let with_kb = format!("{SD_JWT}{KB_JWT}");
    let sd_jwt = SdJwt::parse(&with_kb).unwrap();
    let JwsJson::General(general) = JwsJson::general(&sd_jwt).unwrap() else {
      panic!("expected the general form");
    };
    assert_eq!(general.signatures[0].header.kb_jwt.as_deref(), Some(KB_JWT));
    assert_eq!(JwsJson::General(general).to_compact().unwrap(), with_kb);
  }
}

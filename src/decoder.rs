// Copyright 2020-2024 IOTA Stiftung
// SPDX-License-Identifier: Apache-2.0

use std::collections::BTreeMap;
use std::collections::BTreeSet;

use indexmap::IndexMap;
use serde_json::Value;

use crate::claim_path::ClaimPath;
use crate::claim_path::ClaimPathElement;
use crate::factory::ARRAY_DIGEST_KEY;
use crate::factory::DIGESTS_KEY;
use crate::factory::MAX_NESTING_DEPTH;
use crate::factory::SD_ALG;
use crate::Disclosure;
use crate::Error;
use crate::HashAlg;
use crate::Hasher;
use crate::JsonObject;
#[cfg(feature = "sha")]
use crate::Sha256Hasher;

/// The disclosures that must be revealed to make each claim visible,
/// keyed by the claim's path in the recreated tree. Iteration order is
/// the visit order of the walk: containers precede their contents.
pub type ProvenanceMap = IndexMap<ClaimPath, Vec<Disclosure>>;

/// Substitutes digests in an SD-JWT object by their corresponding plain
/// text values provided by disclosures.
pub struct SdObjectDecoder {
  hashers: BTreeMap<String, Box<dyn Hasher>>,
}

impl SdObjectDecoder {
  /// Creates a new [`SdObjectDecoder`] with `sha-256` hasher.
  #[cfg(feature = "sha")]
  pub fn new_with_sha256() -> Self {
    let mut decoder = Self::new();
    decoder.add_hasher(Box::new(Sha256Hasher::new()));
    decoder
  }

  /// Creates a new [`SdObjectDecoder`] without any hashers.
  pub fn new() -> Self {
    Self {
      hashers: BTreeMap::new(),
    }
  }

  /// Adds a hasher.
  ///
  /// If a hasher for the same algorithm [`Hasher::alg_name`] already exists, it will be replaced and
  /// the existing hasher will be returned, otherwise `None`.
  pub fn add_hasher(&mut self, hasher: Box<dyn Hasher>) -> Option<Box<dyn Hasher>> {
    let alg_name = hasher.as_ref().alg_name().to_string();
    self.hashers.insert(alg_name, hasher)
  }

  /// Removes a hasher.
  ///
  /// If the hasher for that algorithm exists, it will be removed and returned, otherwise `None`.
  pub fn remove_hasher(&mut self, hash_alg: String) -> Option<Box<dyn Hasher>> {
    self.hashers.remove(&hash_alg)
  }

  /// Resolves the hasher named by `object`'s `_sd_alg` claim.
  ///
  /// If the `_sd_alg` claim is not present at the top level, a default
  /// value of `sha-256` MUST be used.
  ///
  /// ## Error
  /// [`Error::InvalidJwt`] if `_sd_alg` is present but not a string,
  /// [`Error::UnsupportedHashAlgorithm`] if it names an unknown algorithm,
  /// [`Error::MissingHasher`] if no hasher is registered for it.
  pub fn determine_hasher(&self, object: &JsonObject) -> Result<&dyn Hasher, Error> {
    let alg: HashAlg = if let Some(alg) = object.get(SD_ALG) {
      let name = alg
        .as_str()
        .ok_or(Error::InvalidJwt("the value of `_sd_alg` is not a string".to_string()))?;
      HashAlg::parse(name)?
    } else {
      HashAlg::DEFAULT
    };
    let name: &'static str = alg.into();
    self
      .hashers
      .get(name)
      .map(AsRef::as_ref)
      .ok_or(Error::MissingHasher(name.to_string()))
  }

  /// Decodes an SD-JWT `object` by substituting the digests with their
  /// corresponding plain text values provided by `disclosures`.
  ///
  /// ## Notes
  /// * The hasher is determined by the `_sd_alg` property. If none is set, the sha-256 hasher will
  ///   be used, if present.
  /// * Claims like `exp` or `iat` are not validated in the process of decoding.
  /// * `_sd_alg` property will be removed if present.
  pub fn decode(&self, object: &JsonObject, disclosures: &[Disclosure]) -> Result<JsonObject, Error> {
    self.decode_with_provenance(object, disclosures).map(|(decoded, _)| decoded)
  }

  /// Decodes an SD-JWT `object` like [`Self::decode`], additionally
  /// reporting for every claim of the recreated tree the disclosures that
  /// make it visible.
  ///
  /// The provenance of a claim is the provenance of its container followed
  /// by the disclosure that revealed the claim itself, if any; plain
  /// top-level claims map to an empty list.
  pub fn decode_with_provenance(
    &self,
    object: &JsonObject,
    disclosures: &[Disclosure],
  ) -> Result<(JsonObject, ProvenanceMap), Error> {
    let hasher = self.determine_hasher(object)?;

    // Create a map of (disclosure digest) → (disclosure).
    let mut disclosures_map: BTreeMap<String, Disclosure> = BTreeMap::new();
    for disclosure in disclosures {
      let digest = disclosure.digest(hasher);
      if disclosures_map.insert(digest, disclosure.clone()).is_some() {
        return Err(Error::NonUniqueDisclosures(disclosure.as_str().to_owned()));
      }
    }

    let mut root = object.clone();
    root.remove(SD_ALG);

    let mut ctx = DecodeCtx {
      seen_digests: BTreeSet::new(),
      consumed_digests: BTreeSet::new(),
      provenance: IndexMap::new(),
    };
    let decoded = self.decode_object(&root, &disclosures_map, &mut ctx, &[], &[], 0)?;

    // Disclosures without a digest site render the SD-JWT invalid.
    let unused: Vec<String> = disclosures_map
      .iter()
      .filter(|(digest, _)| !ctx.consumed_digests.contains(*digest))
      .map(|(_, disclosure)| disclosure.as_str().to_owned())
      .collect();
    if !unused.is_empty() {
      return Err(Error::MissingDigests(unused));
    }

    Ok((decoded, ctx.provenance))
  }

  fn decode_object(
    &self,
    object: &JsonObject,
    disclosures: &BTreeMap<String, Disclosure>,
    ctx: &mut DecodeCtx,
    path: &[ClaimPathElement],
    inherited: &[Disclosure],
    depth: usize,
  ) -> Result<JsonObject, Error> {
    if depth >= MAX_NESTING_DEPTH {
      return Err(Error::DepthLimitExceeded(MAX_NESTING_DEPTH));
    }

    let mut output: JsonObject = JsonObject::new();
    for (key, value) in object.iter() {
      if key == DIGESTS_KEY {
        let sd_array: &Vec<Value> = value
          .as_array()
          .ok_or(Error::DataTypeMismatch(format!("{} is not an array", DIGESTS_KEY)))?;
        for digest in sd_array {
          let digest_str = digest
            .as_str()
            .ok_or(Error::DataTypeMismatch(format!("{} is not a string", digest)))?
            .to_string();

          // Reject if any digest is found more than once.
          ctx.observe_digest(&digest_str)?;

          // Check if a disclosure of this digest is available
          // and insert its claim name and value in the object.
          if let Some(disclosure) = disclosures.get(&digest_str) {
            let claim_name = disclosure.claim_name.clone().ok_or(Error::DataTypeMismatch(format!(
              "array element disclosure in an `_sd` array: {}",
              disclosure
            )))?;

            if object.contains_key(&claim_name) || output.contains_key(&claim_name) {
              return Err(Error::ClaimCollision(claim_name));
            }
            ctx.consumed_digests.insert(digest_str);

            let claim_path = extend(path, ClaimPathElement::Claim(claim_name.clone()));
            let claim_provenance = extend_provenance(inherited, Some(disclosure));
            ctx
              .provenance
              .insert(ClaimPath::from_elements(claim_path.clone()), claim_provenance.clone());

            let decoded =
              self.decode_value(&disclosure.claim_value, disclosures, ctx, &claim_path, &claim_provenance, depth)?;
            output.insert(claim_name, decoded);
          }
        }
        continue;
      }

      let claim_path = extend(path, ClaimPathElement::Claim(key.clone()));
      ctx
        .provenance
        .insert(ClaimPath::from_elements(claim_path.clone()), inherited.to_vec());
      let decoded = self.decode_value(value, disclosures, ctx, &claim_path, inherited, depth)?;
      output.insert(key.clone(), decoded);
    }
    Ok(output)
  }

  fn decode_value(
    &self,
    value: &Value,
    disclosures: &BTreeMap<String, Disclosure>,
    ctx: &mut DecodeCtx,
    path: &[ClaimPathElement],
    inherited: &[Disclosure],
    depth: usize,
  ) -> Result<Value, Error> {
    match value {
      Value::Object(object) => Ok(Value::Object(
        self.decode_object(object, disclosures, ctx, path, inherited, depth + 1)?,
      )),
      Value::Array(array) => Ok(Value::Array(
        self.decode_array(array, disclosures, ctx, path, inherited, depth + 1)?,
      )),
      other => Ok(other.clone()),
    }
  }

  fn decode_array(
    &self,
    array: &[Value],
    disclosures: &BTreeMap<String, Disclosure>,
    ctx: &mut DecodeCtx,
    path: &[ClaimPathElement],
    inherited: &[Disclosure],
    depth: usize,
  ) -> Result<Vec<Value>, Error> {
    if depth >= MAX_NESTING_DEPTH {
      return Err(Error::DepthLimitExceeded(MAX_NESTING_DEPTH));
    }

    let mut output: Vec<Value> = vec![];
    for value in array.iter() {
      let digest_entry = value
        .as_object()
        .and_then(|object| object.get(ARRAY_DIGEST_KEY).map(|digest| (object, digest)));

      if let Some((object, digest)) = digest_entry {
        if object.len() != 1 {
          return Err(Error::InvalidArrayDisclosureObject);
        }

        let digest_str = digest
          .as_str()
          .ok_or(Error::DataTypeMismatch(format!("{} is not a string", ARRAY_DIGEST_KEY)))?
          .to_string();

        // Reject if any digest is found more than once.
        ctx.observe_digest(&digest_str)?;

        if let Some(disclosure) = disclosures.get(&digest_str) {
          if disclosure.claim_name.is_some() {
            return Err(Error::InvalidDisclosure(
              "a disclosed array element must decode to an array of length 2".to_string(),
            ));
          }
          ctx.consumed_digests.insert(digest_str);

          let claim_path = extend(path, ClaimPathElement::ArrayElement(output.len()));
          let claim_provenance = extend_provenance(inherited, Some(disclosure));
          ctx
            .provenance
            .insert(ClaimPath::from_elements(claim_path.clone()), claim_provenance.clone());

          let decoded =
            self.decode_value(&disclosure.claim_value, disclosures, ctx, &claim_path, &claim_provenance, depth)?;
          output.push(decoded);
        }
        // An unmatched digest is a decoy: the entry is dropped and later
        // elements move up.
        continue;
      }

      let claim_path = extend(path, ClaimPathElement::ArrayElement(output.len()));
      ctx
        .provenance
        .insert(ClaimPath::from_elements(claim_path.clone()), inherited.to_vec());
      let decoded = self.decode_value(value, disclosures, ctx, &claim_path, inherited, depth)?;
      output.push(decoded);
    }

    Ok(output)
  }
}

#[cfg(feature = "sha")]
impl Default for SdObjectDecoder {
  fn default() -> Self {
    Self::new_with_sha256()
  }
}

struct DecodeCtx {
  /// Every digest encountered in the payload or in a disclosed value.
  seen_digests: BTreeSet<String>,
  /// The subset of `seen_digests` that matched a disclosure.
  consumed_digests: BTreeSet<String>,
  provenance: ProvenanceMap,
}

impl DecodeCtx {
  fn observe_digest(&mut self, digest: &str) -> Result<(), Error> {
    if !self.seen_digests.insert(digest.to_owned()) {
      return Err(Error::DuplicateDigest(digest.to_owned()));
    }
    Ok(())
  }
}

fn extend(path: &[ClaimPathElement], element: ClaimPathElement) -> Vec<ClaimPathElement> {
  let mut extended = path.to_vec();
  extended.push(element);
  extended
}

fn extend_provenance(inherited: &[Disclosure], disclosure: Option<&Disclosure>) -> Vec<Disclosure> {
  let mut provenance = inherited.to_vec();
  if let Some(disclosure) = disclosure {
    provenance.push(disclosure.clone());
  }
  provenance
}

#[cfg(test)]
mod test {
  use super::SdObjectDecoder;
  use crate::claim_path::ClaimPath;
  use crate::claim_path::ClaimPathElement;
  use crate::test_utils::StaticSaltProvider;
  use crate::Disclosure;
  use crate::DisclosableArray;
  use crate::DisclosableObject;
  use crate::DisclosableValue;
  use crate::Error;
  use crate::SdJwtFactory;
  use serde_json::json;
  use serde_json::Value;

  fn factory(salts: &[&str]) -> SdJwtFactory {
    SdJwtFactory::new().salt_provider(StaticSaltProvider::new(salts))
  }

  fn path(elements: &[ClaimPathElement]) -> ClaimPath {
    ClaimPath::try_from(elements.to_vec()).unwrap()
  }

  #[test]
  fn round_trip_flat() {
    let claims = DisclosableObject::new()
      .disclosable("given_name", json!("John"))
      .plain("family_name", json!("Doe"));
    let payload = factory(&["salt1"]).create(&claims).unwrap();

    let decoder = SdObjectDecoder::new_with_sha256();
    let decoded = decoder.decode(&payload.object, &payload.disclosures).unwrap();
    assert_eq!(
      Value::Object(decoded),
      json!({"given_name": "John", "family_name": "Doe"})
    );
  }

  #[test]
  fn round_trip_recursive_object_with_provenance() {
    let claims = DisclosableObject::new().with(
      "address",
      DisclosableValue::SdObject(
        DisclosableObject::new()
          .disclosable("street", json!("Main"))
          .plain("city", json!("X")),
      ),
    );
    let payload = factory(&["inner", "outer"]).create(&claims).unwrap();

    let decoder = SdObjectDecoder::new_with_sha256();
    let (decoded, provenance) = decoder
      .decode_with_provenance(&payload.object, &payload.disclosures)
      .unwrap();
    assert_eq!(
      Value::Object(decoded),
      json!({"address": {"street": "Main", "city": "X"}})
    );

    let street_disclosure = &payload.disclosures[0];
    let address_disclosure = &payload.disclosures[1];

    let address_provenance = provenance.get(&path(&["address".into()])).unwrap();
    assert_eq!(address_provenance, &vec![address_disclosure.clone()]);

    // Revealing the street requires the address disclosure as well.
    let street_provenance = provenance
      .get(&path(&["address".into(), "street".into()]))
      .unwrap();
    assert_eq!(
      street_provenance,
      &vec![address_disclosure.clone(), street_disclosure.clone()]
    );

    // The plain city claim inherits its container's provenance.
    let city_provenance = provenance.get(&path(&["address".into(), "city".into()])).unwrap();
    assert_eq!(city_provenance, &vec![address_disclosure.clone()]);
  }

  #[test]
  fn array_decoys_are_dropped_and_indices_preserved() {
    let claims = DisclosableObject::new().with(
      "nationalities",
      DisclosableValue::Array(
        DisclosableArray::new()
          .plain(json!("GR"))
          .disclosable(json!("DE"))
          .with_min_digests(3),
      ),
    );
    let payload = factory(&["salt"]).create(&claims).unwrap();

    let decoder = SdObjectDecoder::new_with_sha256();
    let (decoded, provenance) = decoder
      .decode_with_provenance(&payload.object, &payload.disclosures)
      .unwrap();
    assert_eq!(Value::Object(decoded), json!({"nationalities": ["GR", "DE"]}));

    let de_provenance = provenance
      .get(&path(&["nationalities".into(), 1.into()]))
      .unwrap();
    assert_eq!(de_provenance, &vec![payload.disclosures[0].clone()]);
  }

  #[test]
  fn collision() {
    let claims = DisclosableObject::new().disclosable("id", json!("did:value"));
    let mut payload = factory(&["salt"]).create(&claims).unwrap();
    payload
      .object
      .insert("id".to_string(), Value::String("id-value".to_string()));

    let decoder = SdObjectDecoder::new_with_sha256();
    let decoded = decoder.decode(&payload.object, &payload.disclosures).unwrap_err();
    assert!(matches!(decoded, Error::ClaimCollision(_)));
  }

  #[test]
  fn sd_alg_is_removed() {
    let claims = DisclosableObject::new()
      .plain("id", json!("did:value"))
      .disclosable("claim", json!("value"));
    let payload = factory(&["salt"]).create(&claims).unwrap();
    assert_eq!(payload.object.get("_sd_alg").unwrap(), "sha-256");

    let decoder = SdObjectDecoder::new_with_sha256();
    let decoded = decoder.decode(&payload.object, &payload.disclosures).unwrap();
    assert!(decoded.get("_sd_alg").is_none());
  }

  #[test]
  fn unknown_sd_alg_is_rejected() {
    let object = json!({"_sd_alg": "md5"});
    let decoder = SdObjectDecoder::new_with_sha256();
    assert!(matches!(
      decoder.decode(object.as_object().unwrap(), &[]).unwrap_err(),
      Error::UnsupportedHashAlgorithm(_)
    ));
  }

  #[test]
  fn non_string_sd_alg_is_rejected() {
    let object = json!({"_sd_alg": 42});
    let decoder = SdObjectDecoder::new_with_sha256();
    assert!(matches!(
      decoder.decode(object.as_object().unwrap(), &[]).unwrap_err(),
      Error::InvalidJwt(_)
    ));
  }

  #[test]
  fn known_but_unregistered_alg_is_missing_hasher() {
    let object = json!({"_sd_alg": "sha-512"});
    let decoder = SdObjectDecoder::new_with_sha256();
    assert!(matches!(
      decoder.decode(object.as_object().unwrap(), &[]).unwrap_err(),
      Error::MissingHasher(name) if name == "sha-512"
    ));
  }

  #[test]
  fn duplicate_digest() {
    let claims = DisclosableObject::new().disclosable("id", json!("did:value"));
    let payload = factory(&["salt"]).create(&claims).unwrap();
    let digest = payload.disclosures[0].digest(&crate::Sha256Hasher::new());

    let object = json!({"_sd": [digest, digest]});
    let decoder = SdObjectDecoder::new_with_sha256();
    let result = decoder.decode(object.as_object().unwrap(), &payload.disclosures);
    assert!(matches!(result.unwrap_err(), Error::DuplicateDigest(_)));
  }

  #[test]
  fn unused_disclosure() {
    let claims = DisclosableObject::new()
      .disclosable("id", json!("did:value"))
      .disclosable("tst", json!("tst-value"));
    let payload = factory(&["salt1", "salt2"]).create(&claims).unwrap();

    // Keep only the digest of `id` in the object.
    let id_digest = payload.disclosures[0].digest(&crate::Sha256Hasher::new());
    let object = json!({"_sd": [id_digest], "_sd_alg": "sha-256"});

    let decoder = SdObjectDecoder::new_with_sha256();
    let result = decoder.decode(object.as_object().unwrap(), &payload.disclosures);
    assert!(matches!(
      result.unwrap_err(),
      Error::MissingDigests(unused) if unused == vec![payload.disclosures[1].as_str().to_owned()]
    ));
  }

  #[test]
  fn byte_identical_disclosures_are_rejected() {
    let disclosure = Disclosure::array_element("salt".to_owned(), json!("DE"));
    let digest = disclosure.digest(&crate::Sha256Hasher::new());
    let object = json!({"values": [{"...": digest}]});
    let decoder = SdObjectDecoder::new_with_sha256();
    let result = decoder.decode(
      object.as_object().unwrap(),
      &[disclosure.clone(), disclosure],
    );
    assert!(matches!(result.unwrap_err(), Error::NonUniqueDisclosures(_)));
  }

  #[test]
  fn array_disclosure_object_with_extra_keys_is_rejected() {
    let object = json!({"arr": [{"...": "digest", "extra": 1}]});
    let decoder = SdObjectDecoder::new_with_sha256();
    assert!(matches!(
      decoder.decode(object.as_object().unwrap(), &[]).unwrap_err(),
      Error::InvalidArrayDisclosureObject
    ));
  }

  #[test]
  fn object_disclosure_in_array_slot_is_rejected() {
    let disclosure =
      Disclosure::object_property("salt".to_owned(), "name".to_owned(), json!("value")).unwrap();
    let digest = disclosure.digest(&crate::Sha256Hasher::new());
    let object = json!({"arr": [{"...": digest}]});
    let decoder = SdObjectDecoder::new_with_sha256();
    assert!(matches!(
      decoder.decode(object.as_object().unwrap(), &[disclosure]).unwrap_err(),
      Error::InvalidDisclosure(_)
    ));
  }

  #[test]
  fn depth_limit_is_enforced() {
    let mut object = json!({"leaf": 1});
    for _ in 0..200 {
      object = json!({ "nested": object });
    }
    let decoder = SdObjectDecoder::new_with_sha256();
    assert!(matches!(
      decoder.decode(object.as_object().unwrap(), &[]).unwrap_err(),
      Error::DepthLimitExceeded(_)
    ));
  }
}

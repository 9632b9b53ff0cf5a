//! Key material: public keys, content-addressed key ids, private-key
//! handles, and the key-store abstraction the signer draws from.
//!
//! Raw cryptographic operations are delegated to `ring`; this module owns
//! the wire representation and the id derivation. A key id is the lowercase
//! hex SHA-256 of the canonical encoding of the public key object, so ids
//! are a pure function of `(keytype, public material)` and are never
//! accepted from the outside without being recomputed.

pub mod db;

pub use db::{KeyDb, KeyDbError};

use crate::canonical::{self, CanonicalError};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use ring::rand::SystemRandom;
use ring::signature::{
    EcdsaKeyPair, Ed25519KeyPair, KeyPair as _, RsaKeyPair, ECDSA_P256_SHA256_ASN1_SIGNING,
    RSA_PSS_SHA256,
};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fmt;
use thiserror::Error;

/// Errors raised while handling key material
#[derive(Debug, Error)]
pub enum KeyError {
    /// Public key material was not valid base64
    #[error("key material is not valid base64")]
    MaterialEncoding(#[from] base64::DecodeError),

    /// The underlying library refused the key material
    #[error("key material rejected: {reason}")]
    Rejected { reason: String },

    /// The signing operation itself failed
    #[error("signing operation failed")]
    SigningFailed,

    /// The key object could not be canonically encoded for id derivation
    #[error("cannot derive key id")]
    Canonical(#[from] CanonicalError),
}

/// Supported key ciphers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyType {
    Ed25519,
    Rsa,
    Ecdsa,
}

impl KeyType {
    pub fn as_str(&self) -> &'static str {
        match self {
            KeyType::Ed25519 => "ed25519",
            KeyType::Rsa => "rsa",
            KeyType::Ecdsa => "ecdsa",
        }
    }

    /// The signature method metadata produced by this cipher carries.
    pub fn method(&self) -> SignatureMethod {
        match self {
            KeyType::Ed25519 => SignatureMethod::Ed25519,
            KeyType::Rsa => SignatureMethod::RsaSsaPssSha256,
            KeyType::Ecdsa => SignatureMethod::EcdsaSha2Nistp256,
        }
    }
}

impl fmt::Display for KeyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Wire identifier of a signature scheme.
///
/// Unknown ids are preserved rather than rejected: verification skips
/// signatures it cannot dispatch, it does not fail on them.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SignatureMethod {
    Ed25519,
    RsaSsaPssSha256,
    EcdsaSha2Nistp256,
    Unknown(String),
}

impl SignatureMethod {
    pub fn as_str(&self) -> &str {
        match self {
            SignatureMethod::Ed25519 => "ed25519",
            SignatureMethod::RsaSsaPssSha256 => "rsassa-pss-sha256",
            SignatureMethod::EcdsaSha2Nistp256 => "ecdsa-sha2-nistp256",
            SignatureMethod::Unknown(other) => other,
        }
    }
}

impl From<&str> for SignatureMethod {
    fn from(s: &str) -> Self {
        match s {
            "ed25519" => SignatureMethod::Ed25519,
            "rsassa-pss-sha256" => SignatureMethod::RsaSsaPssSha256,
            "ecdsa-sha2-nistp256" => SignatureMethod::EcdsaSha2Nistp256,
            other => SignatureMethod::Unknown(other.to_string()),
        }
    }
}

impl fmt::Display for SignatureMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for SignatureMethod {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for SignatureMethod {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Ok(SignatureMethod::from(s.as_str()))
    }
}

/// Content-addressed key identifier: lowercase hex SHA-256 of the canonical
/// public key object.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct KeyId(String);

impl KeyId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for KeyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for KeyId {
    fn from(s: String) -> Self {
        KeyId(s)
    }
}

impl From<&str> for KeyId {
    fn from(s: &str) -> Self {
        KeyId(s.to_string())
    }
}

/// The `keyval` object of the wire format. Public metadata always carries an
/// empty `private` field; the field participates in id derivation so it is
/// kept rather than skipped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyValue {
    pub public: String,
    #[serde(default)]
    pub private: String,
}

/// A public key as it appears in role metadata
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicKey {
    #[serde(rename = "keytype")]
    pub key_type: KeyType,
    #[serde(rename = "keyval")]
    pub key_val: KeyValue,
}

impl PublicKey {
    /// Build a public key from raw material bytes.
    pub fn new(key_type: KeyType, material: &[u8]) -> Self {
        PublicKey {
            key_type,
            key_val: KeyValue {
                public: BASE64.encode(material),
                private: String::new(),
            },
        }
    }

    /// Decode the raw public material.
    pub fn public_bytes(&self) -> Result<Vec<u8>, KeyError> {
        Ok(BASE64.decode(&self.key_val.public)?)
    }

    /// Derive the content-addressed identifier for this key.
    pub fn key_id(&self) -> Result<KeyId, KeyError> {
        let encoded = canonical::to_canonical_json(self)?;
        let digest = Sha256::digest(&encoded);
        Ok(KeyId(hex::encode(digest)))
    }

    /// A copy guaranteed to carry no private material, for embedding in
    /// emitted metadata.
    pub fn public_only(&self) -> PublicKey {
        PublicKey {
            key_type: self.key_type,
            key_val: KeyValue {
                public: self.key_val.public.clone(),
                private: String::new(),
            },
        }
    }
}

/// A private-key handle. Owns the ring key pair; material never leaves the
/// handle.
pub enum PrivateKey {
    Ed25519(Ed25519KeyPair),
    Rsa(RsaKeyPair),
    Ecdsa(EcdsaKeyPair),
}

impl PrivateKey {
    /// Generate a fresh ed25519 key pair.
    pub fn generate_ed25519() -> Result<Self, KeyError> {
        let rng = SystemRandom::new();
        let doc = Ed25519KeyPair::generate_pkcs8(&rng).map_err(|_| KeyError::SigningFailed)?;
        let pair = Ed25519KeyPair::from_pkcs8(doc.as_ref()).map_err(|e| KeyError::Rejected {
            reason: e.to_string(),
        })?;
        Ok(PrivateKey::Ed25519(pair))
    }

    /// Deterministically derive an ed25519 key pair from a 32-byte seed.
    pub fn ed25519_from_seed(seed: &[u8; 32]) -> Result<Self, KeyError> {
        let pair = Ed25519KeyPair::from_seed_unchecked(seed).map_err(|e| KeyError::Rejected {
            reason: e.to_string(),
        })?;
        Ok(PrivateKey::Ed25519(pair))
    }

    /// Generate a fresh ECDSA P-256 key pair.
    pub fn generate_ecdsa() -> Result<Self, KeyError> {
        let rng = SystemRandom::new();
        let doc = EcdsaKeyPair::generate_pkcs8(&ECDSA_P256_SHA256_ASN1_SIGNING, &rng)
            .map_err(|_| KeyError::SigningFailed)?;
        let pair = EcdsaKeyPair::from_pkcs8(&ECDSA_P256_SHA256_ASN1_SIGNING, doc.as_ref(), &rng)
            .map_err(|e| KeyError::Rejected {
                reason: e.to_string(),
            })?;
        Ok(PrivateKey::Ecdsa(pair))
    }

    /// Load an RSA key pair from PKCS#8 DER. Ring cannot generate RSA keys,
    /// so the pair comes from an external ceremony.
    pub fn rsa_from_pkcs8(der: &[u8]) -> Result<Self, KeyError> {
        let pair = RsaKeyPair::from_pkcs8(der).map_err(|e| KeyError::Rejected {
            reason: e.to_string(),
        })?;
        Ok(PrivateKey::Rsa(pair))
    }

    pub fn key_type(&self) -> KeyType {
        match self {
            PrivateKey::Ed25519(_) => KeyType::Ed25519,
            PrivateKey::Rsa(_) => KeyType::Rsa,
            PrivateKey::Ecdsa(_) => KeyType::Ecdsa,
        }
    }

    pub fn method(&self) -> SignatureMethod {
        self.key_type().method()
    }

    /// The public half, in wire form.
    pub fn public(&self) -> PublicKey {
        let material = match self {
            PrivateKey::Ed25519(pair) => pair.public_key().as_ref(),
            PrivateKey::Rsa(pair) => pair.public_key().as_ref(),
            PrivateKey::Ecdsa(pair) => pair.public_key().as_ref(),
        };
        PublicKey::new(self.key_type(), material)
    }

    /// Sign a message, returning raw signature bytes.
    pub fn sign(&self, message: &[u8]) -> Result<Vec<u8>, KeyError> {
        match self {
            PrivateKey::Ed25519(pair) => Ok(pair.sign(message).as_ref().to_vec()),
            PrivateKey::Rsa(pair) => {
                let rng = SystemRandom::new();
                let mut sig = vec![0u8; pair.public().modulus_len()];
                pair.sign(&RSA_PSS_SHA256, &rng, message, &mut sig)
                    .map_err(|_| KeyError::SigningFailed)?;
                Ok(sig)
            }
            PrivateKey::Ecdsa(pair) => {
                let rng = SystemRandom::new();
                let sig = pair.sign(&rng, message).map_err(|_| KeyError::SigningFailed)?;
                Ok(sig.as_ref().to_vec())
            }
        }
    }
}

impl fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PrivateKey")
            .field("keytype", &self.key_type())
            .finish_non_exhaustive()
    }
}

/// Source of private-key handles for the signer. Implementations decide
/// where material lives; the core only ever borrows handles.
pub trait KeyStore {
    fn private_key(&self, key_id: &KeyId) -> Option<&PrivateKey>;
}

/// Key store backed by a plain in-memory map
#[derive(Debug, Default)]
pub struct InMemoryKeyStore {
    keys: HashMap<KeyId, PrivateKey>,
}

impl InMemoryKeyStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a private key, returning the derived id of its public half.
    pub fn insert(&mut self, key: PrivateKey) -> Result<KeyId, KeyError> {
        let id = key.public().key_id()?;
        self.keys.insert(id.clone(), key);
        Ok(id)
    }
}

impl KeyStore for InMemoryKeyStore {
    fn private_key(&self, key_id: &KeyId) -> Option<&PrivateKey> {
        self.keys.get(key_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_id_is_stable_across_serde_round_trip() {
        let key = PrivateKey::ed25519_from_seed(&[7u8; 32]).unwrap().public();
        let id = key.key_id().unwrap();

        let wire = serde_json::to_string(&key).unwrap();
        let back: PublicKey = serde_json::from_str(&wire).unwrap();
        assert_eq!(back.key_id().unwrap(), id);
    }

    #[test]
    fn key_id_depends_on_material() {
        let a = PrivateKey::ed25519_from_seed(&[1u8; 32]).unwrap().public();
        let b = PrivateKey::ed25519_from_seed(&[2u8; 32]).unwrap().public();
        assert_ne!(a.key_id().unwrap(), b.key_id().unwrap());
    }

    #[test]
    fn key_id_is_lowercase_hex_sha256() {
        let key = PrivateKey::ed25519_from_seed(&[9u8; 32]).unwrap().public();
        let id = key.key_id().unwrap();
        assert_eq!(id.as_str().len(), 64);
        assert!(id.as_str().chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn public_key_wire_shape() {
        let key = PrivateKey::ed25519_from_seed(&[3u8; 32]).unwrap().public();
        let wire: serde_json::Value = serde_json::to_value(&key).unwrap();
        assert_eq!(wire["keytype"], "ed25519");
        assert_eq!(wire["keyval"]["private"], "");
        assert!(wire["keyval"]["public"].as_str().is_some());
    }

    #[test]
    fn unknown_method_round_trips() {
        let m: SignatureMethod = serde_json::from_str(r#""quantum-lattice""#).unwrap();
        assert_eq!(m, SignatureMethod::Unknown("quantum-lattice".to_string()));
        assert_eq!(serde_json::to_string(&m).unwrap(), r#""quantum-lattice""#);
    }

    #[test]
    fn cipher_to_method_mapping() {
        assert_eq!(KeyType::Ed25519.method().as_str(), "ed25519");
        assert_eq!(KeyType::Rsa.method().as_str(), "rsassa-pss-sha256");
        assert_eq!(KeyType::Ecdsa.method().as_str(), "ecdsa-sha2-nistp256");
    }

    #[test]
    fn keystore_lookup_by_derived_id() {
        let mut store = InMemoryKeyStore::new();
        let key = PrivateKey::ed25519_from_seed(&[5u8; 32]).unwrap();
        let public = key.public();
        let id = store.insert(key).unwrap();
        assert_eq!(id, public.key_id().unwrap());
        assert!(store.private_key(&id).is_some());
        assert!(store.private_key(&KeyId::from("missing")).is_none());
    }
}

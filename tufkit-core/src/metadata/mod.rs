//! Typed metadata: the signed envelope, the shared payload header, file
//! fingerprints, and role definitions.
//!
//! Decoding here is purely syntactic. Nothing in this module checks a
//! signature; that is the verification service's job.

pub mod root;
pub mod snapshot;
pub mod targets;
pub mod timestamp;

pub use root::{Root, SignedRoot};
pub use snapshot::{SignedSnapshot, Snapshot};
pub use targets::{Delegations, SignedTargets, Targets};
pub use timestamp::{SignedTimestamp, Timestamp};

use crate::canonical::{self, CanonicalError};
use crate::keys::{KeyId, SignatureMethod};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

/// The four top-level roles every repository carries.
pub const TOP_LEVEL_ROLES: [&str; 4] = ["root", "targets", "snapshot", "timestamp"];

/// Delegation depth past which traversal gives up.
pub const MAX_DELEGATION_DEPTH: usize = 32;

/// The payload type a role's metadata must declare. Delegated targets roles
/// produce `targets` metadata under their own name.
pub fn base_type(role_name: &str) -> &str {
    if role_name.contains('/') {
        "targets"
    } else {
        role_name
    }
}

/// Conventional expiry window for freshly signed metadata, by role.
/// Short-lived roles re-sign often; root is expected to be stable.
pub fn default_expires(role_name: &str) -> DateTime<Utc> {
    let window = match base_type(role_name) {
        "root" => Duration::days(365),
        "targets" => Duration::days(90),
        "snapshot" => Duration::days(7),
        _ => Duration::days(1),
    };
    Utc::now() + window
}

/// Hex digest of a target path, used for hashed-prefix delegation matching.
pub fn path_digest(path: &str) -> String {
    hex::encode(Sha256::digest(path.as_bytes()))
}

/// One signature of the envelope
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signature {
    #[serde(rename = "keyid")]
    pub key_id: KeyId,
    pub method: SignatureMethod,
    pub sig: String,
}

impl Signature {
    pub fn sig_bytes(&self) -> Result<Vec<u8>, base64::DecodeError> {
        use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
        BASE64.decode(&self.sig)
    }
}

/// The wire envelope: an ordered signature list over one role payload.
///
/// The payload is held as a decoded JSON tree, never as wire bytes: the
/// envelope may have been re-serialized in transit, so the bytes that were
/// signed are always reproduced through the canonical encoder.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Signed {
    pub signatures: Vec<Signature>,
    pub signed: serde_json::Value,
}

impl Signed {
    /// Decode an envelope from raw bytes. Accepts any valid JSON.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }

    /// The exact byte sequence signatures are computed over.
    pub fn canonical_payload(&self) -> Result<Vec<u8>, CanonicalError> {
        canonical::encode(&self.signed)
    }

    /// Canonical encoding of the whole envelope, for persistence and for
    /// snapshot/timestamp fingerprinting.
    pub fn to_canonical_bytes(&self) -> Result<Vec<u8>, CanonicalError> {
        canonical::to_canonical_json(self)
    }

    /// Extract the header every payload shares.
    pub fn header(&self) -> Result<MetaHeader, serde_json::Error> {
        serde_json::from_value(self.signed.clone())
    }
}

/// The `{_type, expires, version}` header common to all role payloads
#[derive(Debug, Clone, Deserialize)]
pub struct MetaHeader {
    #[serde(rename = "_type")]
    pub type_name: String,
    pub expires: DateTime<Utc>,
    pub version: u64,
}

/// Raw bytes carried as a lowercase hex string on the wire
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HexBytes(pub Vec<u8>);

impl Serialize for HexBytes {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(&self.0))
    }
}

impl<'de> Deserialize<'de> for HexBytes {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        hex::decode(&s)
            .map(HexBytes)
            .map_err(serde::de::Error::custom)
    }
}

/// Size-and-hashes fingerprint used to cross-authenticate references
/// between roles. Unknown hash algorithms are carried, not rejected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileMeta {
    pub length: u64,
    pub hashes: BTreeMap<String, HexBytes>,
}

impl FileMeta {
    /// Fingerprint a byte sequence with SHA-256.
    pub fn from_bytes(data: &[u8]) -> FileMeta {
        let mut hashes = BTreeMap::new();
        hashes.insert(
            "sha256".to_string(),
            HexBytes(Sha256::digest(data).to_vec()),
        );
        FileMeta {
            length: data.len() as u64,
            hashes,
        }
    }
}

/// The trimmed role form stored in root: authorized keys and threshold only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleKeys {
    #[serde(rename = "keyids")]
    pub key_ids: Vec<KeyId>,
    pub threshold: u32,
}

/// A named authority: threshold, key set, and (for delegations) the path
/// scope it may author.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    pub name: String,
    pub threshold: u32,
    #[serde(rename = "keyids")]
    pub key_ids: Vec<KeyId>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub paths: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub path_hash_prefixes: Vec<String>,
}

impl Role {
    /// A role is a delegation iff its name is `/`-separated.
    pub fn is_delegation(&self) -> bool {
        self.name.contains('/')
    }

    /// Non-empty, no parent-directory traversal, no leading separator.
    pub fn is_valid_name(&self) -> bool {
        !self.name.is_empty() && !self.name.contains("..") && !self.name.starts_with('/')
    }

    /// The parent role a delegation hangs off, by name.
    pub fn parent_name(&self) -> Option<&str> {
        self.name.rsplit_once('/').map(|(parent, _)| parent)
    }

    /// Whether this delegation is authoritative for a target path. A listed
    /// hash prefix must prefix the path digest, or a listed path must prefix
    /// the path itself; a delegation listing neither matches nothing.
    pub fn matches_path(&self, path: &str, digest_hex: &str) -> bool {
        let by_prefix = self
            .path_hash_prefixes
            .iter()
            .any(|p| digest_hex.starts_with(p.as_str()));
        let by_path = self.paths.iter().any(|p| path.starts_with(p.as_str()));
        by_prefix || by_path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn base_type_of_delegations_is_targets() {
        assert_eq!(base_type("root"), "root");
        assert_eq!(base_type("snapshot"), "snapshot");
        assert_eq!(base_type("targets/ops"), "targets");
        assert_eq!(base_type("targets/ops/eu"), "targets");
    }

    #[test]
    fn header_extraction() {
        let signed = Signed {
            signatures: Vec::new(),
            signed: json!({
                "_type": "root",
                "expires": "2030-01-01T00:00:00Z",
                "version": 3,
                "keys": {}
            }),
        };
        let header = signed.header().unwrap();
        assert_eq!(header.type_name, "root");
        assert_eq!(header.version, 3);
    }

    #[test]
    fn file_meta_fingerprint() {
        let meta = FileMeta::from_bytes(b"payload bytes");
        assert_eq!(meta.length, 13);
        let wire = serde_json::to_value(&meta).unwrap();
        let digest = wire["hashes"]["sha256"].as_str().unwrap();
        assert_eq!(digest.len(), 64);

        let back: FileMeta = serde_json::from_value(wire).unwrap();
        assert_eq!(back, meta);
    }

    #[test]
    fn role_path_matching() {
        let role = Role {
            name: "targets/ops".to_string(),
            threshold: 1,
            key_ids: Vec::new(),
            paths: vec!["linux/".to_string()],
            path_hash_prefixes: Vec::new(),
        };
        let digest = path_digest("linux/vmlinuz");
        assert!(role.matches_path("linux/vmlinuz", &digest));
        assert!(!role.matches_path("windows/kernel.dll", &path_digest("windows/kernel.dll")));
    }

    #[test]
    fn role_hash_prefix_matching() {
        let path = "linux/vmlinuz";
        let digest = path_digest(path);
        let role = Role {
            name: "targets/hashed".to_string(),
            threshold: 1,
            key_ids: Vec::new(),
            paths: Vec::new(),
            path_hash_prefixes: vec![digest[..4].to_string()],
        };
        assert!(role.matches_path(path, &digest));

        // A non-hex prefix can never match a hex digest.
        let never = Role {
            path_hash_prefixes: vec!["zzzz".to_string()],
            ..role
        };
        assert!(!never.matches_path(path, &digest));
    }

    #[test]
    fn empty_scope_matches_nothing() {
        let role = Role {
            name: "targets/idle".to_string(),
            threshold: 1,
            key_ids: Vec::new(),
            paths: Vec::new(),
            path_hash_prefixes: Vec::new(),
        };
        assert!(!role.matches_path("anything", &path_digest("anything")));
    }
}

//! Snapshot role metadata: fingerprints of the signed root and every
//! targets file, so a client can check it holds a coherent set.

use crate::canonical::CanonicalError;
use crate::metadata::{default_expires, FileMeta, Signature, Signed};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// The snapshot payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(rename = "_type")]
    pub type_name: String,
    pub version: u64,
    pub expires: DateTime<Utc>,
    pub meta: BTreeMap<String, FileMeta>,
}

/// Snapshot payload plus signatures and lifecycle state
#[derive(Debug, Clone)]
pub struct SignedSnapshot {
    pub signatures: Vec<Signature>,
    pub signed: Snapshot,
    pub dirty: bool,
}

impl SignedSnapshot {
    /// Build a fresh snapshot over the signed forms of root and the
    /// top-level targets file. Fingerprints cover the canonical encoding of
    /// the full envelopes, signatures included.
    pub fn new(root: &Signed, targets: &Signed) -> Result<Self, CanonicalError> {
        let mut meta = BTreeMap::new();
        meta.insert(
            "root".to_string(),
            FileMeta::from_bytes(&root.to_canonical_bytes()?),
        );
        meta.insert(
            "targets".to_string(),
            FileMeta::from_bytes(&targets.to_canonical_bytes()?),
        );
        Ok(SignedSnapshot {
            signatures: Vec::new(),
            signed: Snapshot {
                type_name: "snapshot".to_string(),
                version: 0,
                expires: default_expires("snapshot"),
                meta,
            },
            dirty: true,
        })
    }

    pub fn to_signed(&self) -> Result<Signed, CanonicalError> {
        Ok(Signed {
            signatures: self.signatures.clone(),
            signed: serde_json::to_value(&self.signed)?,
        })
    }

    pub fn from_signed(signed: &Signed) -> Result<Self, serde_json::Error> {
        Ok(SignedSnapshot {
            signatures: signed.signatures.clone(),
            signed: serde_json::from_value(signed.signed.clone())?,
            dirty: false,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::SignedTargets;

    #[test]
    fn covers_root_and_targets() {
        let targets = SignedTargets::new().to_signed().unwrap();
        let fake_root = Signed {
            signatures: Vec::new(),
            signed: serde_json::json!({"_type": "root"}),
        };
        let snapshot = SignedSnapshot::new(&fake_root, &targets).unwrap();
        assert!(snapshot.dirty);
        assert_eq!(snapshot.signed.meta.len(), 2);
        assert_eq!(
            snapshot.signed.meta["root"],
            FileMeta::from_bytes(&fake_root.to_canonical_bytes().unwrap())
        );
    }
}

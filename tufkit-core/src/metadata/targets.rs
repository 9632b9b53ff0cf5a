//! Targets role metadata: the target file map and the ordered delegation
//! list beneath it. The same shape serves the top-level `targets` role and
//! every delegated role.

use crate::canonical::CanonicalError;
use crate::keys::{KeyId, PublicKey};
use crate::metadata::{default_expires, FileMeta, Role, Signature, Signed};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Delegation block: key material plus the priority-ordered role list.
/// List order is semantically significant; earlier roles win.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Delegations {
    pub keys: BTreeMap<KeyId, PublicKey>,
    pub roles: Vec<Role>,
}

/// The targets payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Targets {
    #[serde(rename = "_type")]
    pub type_name: String,
    pub version: u64,
    pub expires: DateTime<Utc>,
    pub targets: BTreeMap<String, FileMeta>,
    #[serde(default)]
    pub delegations: Delegations,
}

/// Targets payload plus signatures and lifecycle state
#[derive(Debug, Clone)]
pub struct SignedTargets {
    pub signatures: Vec<Signature>,
    pub signed: Targets,
    pub dirty: bool,
}

impl SignedTargets {
    /// A fresh, empty targets file at version 0, marked dirty.
    pub fn new() -> Self {
        SignedTargets {
            signatures: Vec::new(),
            signed: Targets {
                type_name: "targets".to_string(),
                version: 0,
                expires: default_expires("targets"),
                targets: BTreeMap::new(),
                delegations: Delegations::default(),
            },
            dirty: true,
        }
    }

    pub fn to_signed(&self) -> Result<Signed, CanonicalError> {
        Ok(Signed {
            signatures: self.signatures.clone(),
            signed: serde_json::to_value(&self.signed)?,
        })
    }

    pub fn from_signed(signed: &Signed) -> Result<Self, serde_json::Error> {
        Ok(SignedTargets {
            signatures: signed.signatures.clone(),
            signed: serde_json::from_value(signed.signed.clone())?,
            dirty: false,
        })
    }
}

impl Default for SignedTargets {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_targets_are_empty_and_dirty() {
        let t = SignedTargets::new();
        assert!(t.dirty);
        assert!(t.signed.targets.is_empty());
        assert!(t.signed.delegations.roles.is_empty());
    }

    #[test]
    fn missing_delegations_block_decodes_as_empty() {
        let envelope = Signed {
            signatures: Vec::new(),
            signed: serde_json::json!({
                "_type": "targets",
                "version": 1,
                "expires": "2030-01-01T00:00:00Z",
                "targets": {}
            }),
        };
        let t = SignedTargets::from_signed(&envelope).unwrap();
        assert!(t.signed.delegations.keys.is_empty());
    }
}

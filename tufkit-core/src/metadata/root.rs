//! Root role metadata: the trust anchor that authorizes every other role.

use crate::canonical::CanonicalError;
use crate::keys::{KeyId, PublicKey};
use crate::metadata::{default_expires, RoleKeys, Signature, Signed};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// The root payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Root {
    #[serde(rename = "_type")]
    pub type_name: String,
    pub version: u64,
    pub expires: DateTime<Utc>,
    pub keys: BTreeMap<KeyId, PublicKey>,
    pub roles: BTreeMap<String, RoleKeys>,
    pub consistent_snapshot: bool,
}

/// Root payload plus its signatures and lifecycle state
#[derive(Debug, Clone)]
pub struct SignedRoot {
    pub signatures: Vec<Signature>,
    pub signed: Root,
    pub dirty: bool,
}

impl SignedRoot {
    /// A freshly initialized root at version 0, marked dirty.
    pub fn new(
        keys: BTreeMap<KeyId, PublicKey>,
        roles: BTreeMap<String, RoleKeys>,
        consistent_snapshot: bool,
    ) -> Self {
        SignedRoot {
            signatures: Vec::new(),
            signed: Root {
                type_name: "root".to_string(),
                version: 0,
                expires: default_expires("root"),
                keys,
                roles,
                consistent_snapshot,
            },
            dirty: true,
        }
    }

    /// Canonical envelope form, current signatures attached.
    pub fn to_signed(&self) -> Result<Signed, CanonicalError> {
        Ok(Signed {
            signatures: self.signatures.clone(),
            signed: serde_json::to_value(&self.signed)?,
        })
    }

    /// Syntactic decode from an envelope; signatures are carried over and
    /// never checked here.
    pub fn from_signed(signed: &Signed) -> Result<Self, serde_json::Error> {
        Ok(SignedRoot {
            signatures: signed.signatures.clone(),
            signed: serde_json::from_value(signed.signed.clone())?,
            dirty: false,
        })
    }
}

//! Timestamp role metadata: the single short-lived pointer at the current
//! snapshot.

use crate::canonical::CanonicalError;
use crate::metadata::{default_expires, FileMeta, Signature, Signed};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// The timestamp payload; `meta` holds exactly the `snapshot` entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Timestamp {
    #[serde(rename = "_type")]
    pub type_name: String,
    pub version: u64,
    pub expires: DateTime<Utc>,
    pub meta: BTreeMap<String, FileMeta>,
}

/// Timestamp payload plus signatures and lifecycle state
#[derive(Debug, Clone)]
pub struct SignedTimestamp {
    pub signatures: Vec<Signature>,
    pub signed: Timestamp,
    pub dirty: bool,
}

impl SignedTimestamp {
    /// Build a fresh timestamp over the signed snapshot envelope.
    pub fn new(snapshot: &Signed) -> Result<Self, CanonicalError> {
        let mut meta = BTreeMap::new();
        meta.insert(
            "snapshot".to_string(),
            FileMeta::from_bytes(&snapshot.to_canonical_bytes()?),
        );
        Ok(SignedTimestamp {
            signatures: Vec::new(),
            signed: Timestamp {
                type_name: "timestamp".to_string(),
                version: 0,
                expires: default_expires("timestamp"),
                meta,
            },
            dirty: true,
        })
    }

    /// The fingerprint of the snapshot this timestamp vouches for.
    pub fn snapshot_meta(&self) -> Option<&FileMeta> {
        self.signed.meta.get("snapshot")
    }

    pub fn to_signed(&self) -> Result<Signed, CanonicalError> {
        Ok(Signed {
            signatures: self.signatures.clone(),
            signed: serde_json::to_value(&self.signed)?,
        })
    }

    pub fn from_signed(signed: &Signed) -> Result<Self, serde_json::Error> {
        Ok(SignedTimestamp {
            signatures: signed.signatures.clone(),
            signed: serde_json::from_value(signed.signed.clone())?,
            dirty: false,
        })
    }
}

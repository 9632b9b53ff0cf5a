//! The verification service: role-aware threshold checking over the
//! canonical payload, followed by header validation.

use crate::canonical::CanonicalError;
use crate::keys::{KeyDb, KeyId};
use crate::metadata::{base_type, Signed};
use crate::signing::{Clock, SystemClock, VerifierSet};
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use std::collections::HashSet;
use thiserror::Error;
use tracing::debug;

/// Verification outcomes that reject a piece of metadata
#[derive(Debug, Error)]
pub enum VerifyError {
    /// The registry has no definition for the role
    #[error("unknown role {role}")]
    UnknownRole { role: String },

    /// The envelope carries no signatures at all
    #[error("metadata has no signatures")]
    NoSignatures,

    /// Fewer distinct authorized keys verified than the role requires
    #[error("valid signatures did not meet threshold: {valid} of {threshold}")]
    ThresholdNotMet { valid: usize, threshold: u32 },

    /// The payload declares a type other than the role's
    #[error("metadata has wrong type: expected {expected}, found {found}")]
    WrongType { expected: String, found: String },

    /// The payload expired at or before the current instant
    #[error("metadata expired at {expires}")]
    Expired { expires: DateTime<Utc> },

    /// The payload's version went backwards
    #[error("version {version} is lower than required minimum {minimum}")]
    LowVersion { version: u64, minimum: u64 },

    /// The payload could not be canonically re-encoded
    #[error("cannot canonicalize payload")]
    Canonical(#[from] CanonicalError),

    /// Malformed envelope or payload
    #[error("malformed metadata")]
    Parse(#[from] serde_json::Error),
}

/// Orchestrates signature checking against a role's threshold, then
/// validates the shared payload header.
pub struct VerificationService {
    verifiers: VerifierSet,
    clock: Box<dyn Clock>,
}

impl Default for VerificationService {
    fn default() -> Self {
        VerificationService::new(VerifierSet::default(), Box::new(SystemClock))
    }
}

impl VerificationService {
    pub fn new(verifiers: VerifierSet, clock: Box<dyn Clock>) -> Self {
        VerificationService { verifiers, clock }
    }

    /// Full verification: threshold signatures, then role type, expiry, and
    /// monotonic version.
    pub fn verify(
        &self,
        signed: &Signed,
        role: &str,
        min_version: u64,
        db: &KeyDb,
    ) -> Result<(), VerifyError> {
        self.verify_signatures(signed, role, db)?;

        let header = signed.header()?;
        let expected = base_type(role);
        if !header.type_name.eq_ignore_ascii_case(expected) {
            return Err(VerifyError::WrongType {
                expected: expected.to_string(),
                found: header.type_name,
            });
        }
        if header.expires <= self.clock.now() {
            return Err(VerifyError::Expired {
                expires: header.expires,
            });
        }
        if header.version < min_version {
            return Err(VerifyError::LowVersion {
                version: header.version,
                minimum: min_version,
            });
        }
        Ok(())
    }

    /// Threshold check only. Signatures that cannot be counted — an
    /// unauthorized or unknown key id, an unknown method, or a rejected
    /// signature — are skipped rather than treated as errors, so stale
    /// signatures left on the wire during key rotation do not poison the
    /// envelope. Duplicate signatures by one key count once.
    pub fn verify_signatures(
        &self,
        signed: &Signed,
        role_name: &str,
        db: &KeyDb,
    ) -> Result<(), VerifyError> {
        let role = db.get_role(role_name).ok_or_else(|| VerifyError::UnknownRole {
            role: role_name.to_string(),
        })?;

        if signed.signatures.is_empty() {
            return Err(VerifyError::NoSignatures);
        }

        // The wire bytes may not be canonical; signers and verifiers agree
        // on the canonical re-encoding of the decoded payload.
        let message = signed.canonical_payload()?;

        let mut valid: HashSet<&KeyId> = HashSet::new();
        for signature in &signed.signatures {
            if !role.key_ids.contains(&signature.key_id) {
                debug!(key_id = %signature.key_id, role = role_name, "skipping signature by unauthorized key");
                continue;
            }
            let Some(key) = db.get_key(&signature.key_id) else {
                debug!(key_id = %signature.key_id, "skipping signature by unknown key");
                continue;
            };
            let Some(verifier) = self.verifiers.get(&signature.method) else {
                debug!(method = %signature.method, "skipping signature with unsupported method");
                continue;
            };
            let Ok(sig_bytes) = signature.sig_bytes() else {
                debug!(key_id = %signature.key_id, "skipping signature with undecodable bytes");
                continue;
            };
            if verifier.verify(key, &message, &sig_bytes).is_err() {
                debug!(key_id = %signature.key_id, "skipping invalid signature");
                continue;
            }
            valid.insert(&signature.key_id);
        }

        if valid.len() < role.threshold as usize {
            return Err(VerifyError::ThresholdNotMet {
                valid: valid.len(),
                threshold: role.threshold,
            });
        }
        Ok(())
    }

    /// Decode raw envelope bytes, fully verify them, and deserialize the
    /// payload.
    pub fn verify_parse<T: DeserializeOwned>(
        &self,
        bytes: &[u8],
        role: &str,
        min_version: u64,
        db: &KeyDb,
    ) -> Result<T, VerifyError> {
        let signed = Signed::from_slice(bytes)?;
        self.verify(&signed, role, min_version, db)?;
        Ok(serde_json::from_value(signed.signed)?)
    }

    /// Like `verify_parse`, but checks signatures only — for metadata whose
    /// header fields are validated elsewhere (e.g. an expired local root
    /// that still anchors a rotation).
    pub fn verify_parse_trusted<T: DeserializeOwned>(
        &self,
        bytes: &[u8],
        role: &str,
        db: &KeyDb,
    ) -> Result<T, VerifyError> {
        let signed = Signed::from_slice(bytes)?;
        self.verify_signatures(&signed, role, db)?;
        Ok(serde_json::from_value(signed.signed)?)
    }
}

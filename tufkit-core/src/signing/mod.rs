//! Signature verification and production
//!
//! A fixed dispatch table maps wire method ids onto stateless ring-backed
//! verifiers; the verification service layers role/threshold logic on top,
//! and the signer mirrors the verify side using injected private-key
//! handles. The clock used for expiry checks is injected so tests can pin
//! it.

pub mod service;
pub mod signer;

pub use service::{VerificationService, VerifyError};
pub use signer::{SignError, Signer};

use crate::keys::{PublicKey, SignatureMethod};
use chrono::{DateTime, Utc};
use ring::signature::{ECDSA_P256_SHA256_ASN1, ED25519, RSA_PSS_2048_8192_SHA256};
use std::collections::HashMap;
use thiserror::Error;

/// Failure of a single signature check. The verification service treats
/// every variant the same way: the signature is skipped.
#[derive(Debug, Error)]
pub enum SignatureError {
    #[error("malformed key material")]
    BadKeyMaterial,
    #[error("signature rejected")]
    Rejected,
}

/// A stateless, deterministic signature verifier for one method.
pub trait Verifier {
    fn verify(&self, key: &PublicKey, message: &[u8], sig: &[u8]) -> Result<(), SignatureError>;
}

struct RingVerifier(&'static dyn ring::signature::VerificationAlgorithm);

impl Verifier for RingVerifier {
    fn verify(&self, key: &PublicKey, message: &[u8], sig: &[u8]) -> Result<(), SignatureError> {
        let material = key
            .public_bytes()
            .map_err(|_| SignatureError::BadKeyMaterial)?;
        ring::signature::UnparsedPublicKey::new(self.0, material)
            .verify(message, sig)
            .map_err(|_| SignatureError::Rejected)
    }
}

/// Dispatch table from signature method id to verifier.
///
/// Unknown methods are simply absent; looking one up yields `None` and the
/// caller skips the signature rather than erroring.
pub struct VerifierSet {
    verifiers: HashMap<SignatureMethod, Box<dyn Verifier>>,
}

impl VerifierSet {
    /// An empty set; useful when composing a fully custom table.
    pub fn empty() -> Self {
        VerifierSet {
            verifiers: HashMap::new(),
        }
    }

    /// Register (or replace) the verifier for a method.
    pub fn insert(&mut self, method: SignatureMethod, verifier: Box<dyn Verifier>) {
        self.verifiers.insert(method, verifier);
    }

    pub fn get(&self, method: &SignatureMethod) -> Option<&dyn Verifier> {
        self.verifiers.get(method).map(|v| v.as_ref())
    }
}

impl Default for VerifierSet {
    /// The three methods every conforming repository understands.
    fn default() -> Self {
        let mut set = VerifierSet::empty();
        set.insert(SignatureMethod::Ed25519, Box::new(RingVerifier(&ED25519)));
        set.insert(
            SignatureMethod::RsaSsaPssSha256,
            Box::new(RingVerifier(&RSA_PSS_2048_8192_SHA256)),
        );
        set.insert(
            SignatureMethod::EcdsaSha2Nistp256,
            Box::new(RingVerifier(&ECDSA_P256_SHA256_ASN1)),
        );
        set
    }
}

/// Injectable time source for expiry checks
pub trait Clock {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time
#[derive(Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock pinned to one instant, for tests and deterministic replay
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::PrivateKey;

    #[test]
    fn ed25519_verifier_accepts_and_rejects() {
        let key = PrivateKey::ed25519_from_seed(&[21u8; 32]).unwrap();
        let public = key.public();
        let sig = key.sign(b"message").unwrap();

        let set = VerifierSet::default();
        let verifier = set.get(&SignatureMethod::Ed25519).unwrap();
        assert!(verifier.verify(&public, b"message", &sig).is_ok());
        assert!(verifier.verify(&public, b"other message", &sig).is_err());
    }

    #[test]
    fn ecdsa_verifier_round_trip() {
        let key = PrivateKey::generate_ecdsa().unwrap();
        let public = key.public();
        let sig = key.sign(b"message").unwrap();

        let set = VerifierSet::default();
        let verifier = set.get(&SignatureMethod::EcdsaSha2Nistp256).unwrap();
        assert!(verifier.verify(&public, b"message", &sig).is_ok());
    }

    #[test]
    fn unknown_method_has_no_verifier() {
        let set = VerifierSet::default();
        assert!(set
            .get(&SignatureMethod::Unknown("unknown-method".to_string()))
            .is_none());
    }
}

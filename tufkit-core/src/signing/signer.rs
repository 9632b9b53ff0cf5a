//! The signer: the mirror image of the verification service.

use crate::canonical::CanonicalError;
use crate::keys::{KeyError, KeyId, KeyStore, PublicKey};
use crate::metadata::{Signature, Signed};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use thiserror::Error;
use tracing::debug;

/// Signing shortfalls
#[derive(Debug, Error)]
pub enum SignError {
    /// None of the provided public keys has a private counterpart in the store
    #[error("no private keys available for any provided public key")]
    NoSigningKeys,

    /// A private-key operation failed
    #[error(transparent)]
    Key(#[from] KeyError),

    /// The payload could not be canonically encoded
    #[error("cannot canonicalize payload")]
    Canonical(#[from] CanonicalError),
}

/// Produces signatures over the canonical payload using private-key handles
/// drawn from an injected key store.
pub struct Signer {
    keystore: Box<dyn KeyStore>,
}

impl Signer {
    pub fn new(keystore: Box<dyn KeyStore>) -> Self {
        Signer { keystore }
    }

    /// Whether the store can sign for a key id.
    pub fn has_key(&self, key_id: &KeyId) -> bool {
        self.keystore.private_key(key_id).is_some()
    }

    /// Sign the envelope's canonical payload with every provided key that
    /// has a private counterpart. An existing signature by the same key id
    /// is replaced, never duplicated; signatures by other keys are left in
    /// place.
    pub fn sign(&self, signed: &mut Signed, keys: &[PublicKey]) -> Result<(), SignError> {
        let message = signed.canonical_payload()?;

        let mut produced = 0usize;
        for key in keys {
            let key_id = key.key_id()?;
            let Some(private) = self.keystore.private_key(&key_id) else {
                debug!(%key_id, "no private key available, skipping");
                continue;
            };
            let sig = private.sign(&message)?;
            signed.signatures.retain(|s| s.key_id != key_id);
            signed.signatures.push(Signature {
                key_id,
                method: private.method(),
                sig: BASE64.encode(sig),
            });
            produced += 1;
        }

        if produced == 0 {
            return Err(SignError::NoSigningKeys);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::{InMemoryKeyStore, PrivateKey};
    use serde_json::json;

    fn envelope() -> Signed {
        Signed {
            signatures: Vec::new(),
            signed: json!({"_type": "targets", "version": 1}),
        }
    }

    #[test]
    fn signing_replaces_rather_than_duplicates() {
        let mut store = InMemoryKeyStore::new();
        let key = PrivateKey::ed25519_from_seed(&[31u8; 32]).unwrap();
        let public = key.public();
        store.insert(key).unwrap();
        let signer = Signer::new(Box::new(store));

        let mut signed = envelope();
        signer.sign(&mut signed, &[public.clone()]).unwrap();
        signer.sign(&mut signed, &[public]).unwrap();
        assert_eq!(signed.signatures.len(), 1);
    }

    #[test]
    fn preserves_signatures_by_other_keys() {
        let mut store = InMemoryKeyStore::new();
        let ours = PrivateKey::ed25519_from_seed(&[32u8; 32]).unwrap();
        let public = ours.public();
        store.insert(ours).unwrap();
        let signer = Signer::new(Box::new(store));

        let mut signed = envelope();
        signed.signatures.push(Signature {
            key_id: "someone-else".into(),
            method: crate::keys::SignatureMethod::Ed25519,
            sig: "AAAA".to_string(),
        });
        signer.sign(&mut signed, &[public]).unwrap();
        assert_eq!(signed.signatures.len(), 2);
    }

    #[test]
    fn fails_without_any_private_key() {
        let signer = Signer::new(Box::new(InMemoryKeyStore::new()));
        let stranger = PrivateKey::ed25519_from_seed(&[33u8; 32]).unwrap().public();

        let mut signed = envelope();
        let err = signer.sign(&mut signed, &[stranger]).unwrap_err();
        assert!(matches!(err, SignError::NoSigningKeys));
        assert!(signed.signatures.is_empty());
    }
}

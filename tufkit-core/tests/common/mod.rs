//! Test helper functions for integration tests
//!
//! Shared across test files using the tests/common/ pattern.

use std::sync::Once;
use tufkit_core::keys::{InMemoryKeyStore, KeyDb, PrivateKey, PublicKey};
use tufkit_core::metadata::Role;
use tufkit_core::repo::Repository;
use tufkit_core::signing::Signer;

/// Initialize logging for tests (only once per test run)
#[allow(dead_code)]
static INIT: Once = Once::new();

#[allow(dead_code)]
pub fn init_test_logging() {
    INIT.call_once(|| {
        use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

        let _ = tracing_subscriber::registry()
            .with(tracing_subscriber::fmt::layer().with_test_writer())
            .with(tracing_subscriber::filter::EnvFilter::from_default_env())
            .try_init();
    });
}

/// Deterministic ed25519 key for a seed byte.
#[allow(dead_code)]
pub fn seeded_key(seed: u8) -> PrivateKey {
    PrivateKey::ed25519_from_seed(&[seed; 32]).expect("seed is a valid ed25519 seed")
}

/// A role definition without path scoping.
#[allow(dead_code)]
pub fn plain_role(name: &str, threshold: u32, keys: &[&PublicKey]) -> Role {
    Role {
        name: name.to_string(),
        threshold,
        key_ids: keys.iter().map(|k| k.key_id().unwrap()).collect(),
        paths: Vec::new(),
        path_hash_prefixes: Vec::new(),
    }
}

/// A delegation scoped to path prefixes, keyed by the given public keys.
#[allow(dead_code)]
pub fn scoped_role(name: &str, paths: &[&str], keys: &[&PublicKey]) -> Role {
    Role {
        name: name.to_string(),
        threshold: 1,
        key_ids: keys.iter().map(|k| k.key_id().unwrap()).collect(),
        paths: paths.iter().map(|p| p.to_string()).collect(),
        path_hash_prefixes: Vec::new(),
    }
}

/// A writable repository with the four top-level roles pre-registered at
/// threshold 1, one deterministic ed25519 key each.
#[allow(dead_code)]
pub fn bootstrap_repository() -> Repository {
    let mut db = KeyDb::new();
    let mut store = InMemoryKeyStore::new();

    for (i, name) in ["root", "targets", "snapshot", "timestamp"].iter().enumerate() {
        let key = seeded_key(100 + i as u8);
        let public = key.public();
        db.add_key(&public).unwrap();
        store.insert(key).unwrap();
        db.add_role(plain_role(name, 1, &[&public])).unwrap();
    }

    Repository::new(db, Some(Signer::new(Box::new(store))))
}

/// Like `bootstrap_repository`, with additional seeded private keys
/// available to the signer (delegation tests need these at threshold time).
#[allow(dead_code)]
pub fn bootstrap_repository_with_extra_keys(extra_seeds: &[u8]) -> Repository {
    let mut db = KeyDb::new();
    let mut store = InMemoryKeyStore::new();

    for (i, name) in ["root", "targets", "snapshot", "timestamp"].iter().enumerate() {
        let key = seeded_key(100 + i as u8);
        let public = key.public();
        db.add_key(&public).unwrap();
        store.insert(key).unwrap();
        db.add_role(plain_role(name, 1, &[&public])).unwrap();
    }
    for seed in extra_seeds {
        store.insert(seeded_key(*seed)).unwrap();
    }

    Repository::new(db, Some(Signer::new(Box::new(store))))
}

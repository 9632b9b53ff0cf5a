//! Key and role registry
//!
//! A pure lookup cache mapping key ids to public keys and role names to role
//! definitions. It is owned by exactly one repository and rebuilt from role
//! objects on ingest; it has no persistence of its own. `Clone` exists so
//! the controller can stage registry changes and swap them in atomically.

use crate::keys::{KeyError, KeyId, PublicKey};
use crate::metadata::Role;
use std::collections::HashMap;
use thiserror::Error;

/// Registry constraint violations
#[derive(Debug, Error)]
pub enum KeyDbError {
    /// A key id is already bound to different material
    #[error("key id {key_id} is already bound to different key material")]
    KeyIdConflict { key_id: KeyId },

    /// A role references a key the registry has never seen
    #[error("role {role} references unknown key {key_id}")]
    UnknownKey { role: String, key_id: KeyId },

    /// Threshold outside `1..=|key_ids|`
    #[error("role {role} has invalid threshold {threshold} for {keys} key(s)")]
    InvalidThreshold {
        role: String,
        threshold: u32,
        keys: usize,
    },

    /// Role name failed validation
    #[error("invalid role name {name:?}")]
    InvalidRole { name: String },

    /// Key id derivation failed
    #[error(transparent)]
    Key(#[from] KeyError),
}

/// In-memory key and role registry
#[derive(Debug, Clone, Default)]
pub struct KeyDb {
    keys: HashMap<KeyId, PublicKey>,
    roles: HashMap<String, Role>,
}

impl KeyDb {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a public key under its derived id. Re-inserting identical
    /// material is idempotent; the same id with different material is a
    /// conflict.
    pub fn add_key(&mut self, key: &PublicKey) -> Result<KeyId, KeyDbError> {
        let key_id = key.key_id()?;
        match self.keys.get(&key_id) {
            Some(existing) if existing != key => {
                return Err(KeyDbError::KeyIdConflict { key_id });
            }
            Some(_) => {}
            None => {
                self.keys.insert(key_id.clone(), key.public_only());
            }
        }
        Ok(key_id)
    }

    pub fn get_key(&self, key_id: &KeyId) -> Option<&PublicKey> {
        self.keys.get(key_id)
    }

    /// Register a role definition. Every referenced key must already be
    /// known, the threshold must be satisfiable, and the name must be
    /// well-formed. Duplicate names replace the previous definition.
    pub fn add_role(&mut self, role: Role) -> Result<(), KeyDbError> {
        if !role.is_valid_name() {
            return Err(KeyDbError::InvalidRole { name: role.name });
        }
        if role.threshold < 1 || role.threshold as usize > role.key_ids.len() {
            return Err(KeyDbError::InvalidThreshold {
                role: role.name,
                threshold: role.threshold,
                keys: role.key_ids.len(),
            });
        }
        for key_id in &role.key_ids {
            if !self.keys.contains_key(key_id) {
                return Err(KeyDbError::UnknownKey {
                    role: role.name.clone(),
                    key_id: key_id.clone(),
                });
            }
        }
        self.roles.insert(role.name.clone(), role);
        Ok(())
    }

    pub fn get_role(&self, name: &str) -> Option<&Role> {
        self.roles.get(name)
    }
}

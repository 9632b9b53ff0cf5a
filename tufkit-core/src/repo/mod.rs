//! The repository controller: the façade that ingests signed metadata,
//! answers target queries through the delegation tree, applies mutations,
//! and emits freshly signed blobs.
//!
//! Ingest (`set_*`) is atomic per role: registry changes are staged on a
//! copy of the key database and swapped in only once the whole operation
//! has succeeded, so a failed call leaves every accessor observing the
//! pre-call state. Callers are responsible for verifying blobs before
//! handing them to `set_*`.

use crate::canonical::CanonicalError;
use crate::keys::{KeyDb, KeyDbError, KeyError, KeyId, PublicKey};
use crate::metadata::{
    default_expires, path_digest, FileMeta, Role, RoleKeys, Signed, SignedRoot, SignedSnapshot,
    SignedTargets, SignedTimestamp, MAX_DELEGATION_DEPTH, TOP_LEVEL_ROLES,
};
use crate::signing::{SignError, Signer};
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap, HashSet};
use thiserror::Error;
use tracing::debug;

/// Controller-level failures
#[derive(Debug, Error)]
pub enum RepoError {
    /// A role required by the operation is not registered or not loaded
    #[error("role {role} is not registered")]
    MissingRole { role: String },

    /// The named role cannot be used the way the operation needs
    #[error("invalid role {role}: {reason}")]
    InvalidRole { role: String, reason: String },

    /// The key store cannot satisfy the role's signing threshold
    #[error("no usable signing keys satisfy role {role}")]
    MissingSigningKey { role: String },

    /// Registry constraint violation
    #[error(transparent)]
    KeyDb(#[from] KeyDbError),

    /// Key material failure
    #[error(transparent)]
    Key(#[from] KeyError),

    /// Signer shortfall
    #[error(transparent)]
    Sign(#[from] SignError),

    /// Canonical encoding failure
    #[error("cannot canonicalize metadata")]
    Canonical(#[from] CanonicalError),

    /// Malformed metadata blob
    #[error("malformed metadata")]
    Parse(#[from] serde_json::Error),
}

/// In-memory TUF repository
///
/// Owns the four top-level role objects, the delegated targets map, and the
/// key database. A repository constructed without a signer is read-only:
/// queries and `set_*` work, `sign_*` and `add_targets` fail.
pub struct Repository {
    root: Option<SignedRoot>,
    targets: HashMap<String, SignedTargets>,
    snapshot: Option<SignedSnapshot>,
    timestamp: Option<SignedTimestamp>,
    keydb: KeyDb,
    signer: Option<Signer>,
}

impl Repository {
    pub fn new(keydb: KeyDb, signer: Option<Signer>) -> Self {
        Repository {
            root: None,
            targets: HashMap::new(),
            snapshot: None,
            timestamp: None,
            keydb,
            signer,
        }
    }

    pub fn root(&self) -> Option<&SignedRoot> {
        self.root.as_ref()
    }

    pub fn targets(&self, role: &str) -> Option<&SignedTargets> {
        self.targets.get(role)
    }

    pub fn snapshot(&self) -> Option<&SignedSnapshot> {
        self.snapshot.as_ref()
    }

    pub fn timestamp(&self) -> Option<&SignedTimestamp> {
        self.timestamp.as_ref()
    }

    pub fn key_db(&self) -> &KeyDb {
        &self.keydb
    }

    /// Create the base metadata set for a fresh repository. Requires the
    /// key database to be pre-populated with the four top-level roles and
    /// their keys.
    pub fn init(&mut self, consistent_snapshot: bool) -> Result<(), RepoError> {
        let mut root_roles = BTreeMap::new();
        let mut root_keys = BTreeMap::new();
        for name in TOP_LEVEL_ROLES {
            let Some(role) = self.keydb.get_role(name) else {
                return Err(RepoError::MissingRole {
                    role: name.to_string(),
                });
            };
            root_roles.insert(
                name.to_string(),
                RoleKeys {
                    key_ids: role.key_ids.clone(),
                    threshold: role.threshold,
                },
            );
            for key_id in &role.key_ids {
                // Key presence was checked when the role entered the db.
                if let Some(key) = self.keydb.get_key(key_id) {
                    root_keys.insert(key_id.clone(), key.public_only());
                }
            }
        }
        self.root = Some(SignedRoot::new(root_keys, root_roles, consistent_snapshot));
        self.targets.insert("targets".to_string(), SignedTargets::new());

        let signed_root = self.sign_root(default_expires("root"))?;
        let signed_targets = self.sign_targets("targets", default_expires("targets"))?;
        self.snapshot = Some(SignedSnapshot::new(&signed_root, &signed_targets)?);
        let signed_snapshot = self.sign_snapshot(default_expires("snapshot"))?;
        self.timestamp = Some(SignedTimestamp::new(&signed_snapshot)?);
        Ok(())
    }

    /// Install a root blob: every key and role it declares enters the key
    /// database (externally supplied key ids are recomputed and checked),
    /// then the root object replaces the current one.
    pub fn set_root(&mut self, signed: &Signed) -> Result<(), RepoError> {
        let root = SignedRoot::from_signed(signed)?;

        let mut staged = self.keydb.clone();
        for (key_id, key) in &root.signed.keys {
            let derived = key.key_id()?;
            if &derived != key_id {
                debug!(given = %key_id, %derived, "root key id does not match material");
                return Err(RepoError::KeyDb(KeyDbError::KeyIdConflict {
                    key_id: key_id.clone(),
                }));
            }
            staged.add_key(key)?;
        }
        for (name, role_keys) in &root.signed.roles {
            // Legacy metadata named roles after their files; strip the
            // deprecated suffix so both spellings resolve to one role.
            let name = name.strip_suffix(".txt").unwrap_or(name);
            staged.add_role(Role {
                name: name.to_string(),
                threshold: role_keys.threshold,
                key_ids: role_keys.key_ids.clone(),
                paths: Vec::new(),
                path_hash_prefixes: Vec::new(),
            })?;
        }

        self.keydb = staged;
        self.root = Some(root);
        Ok(())
    }

    /// Install a targets blob under a role name, registering its delegation
    /// keys and roles.
    pub fn set_targets(&mut self, role: &str, signed: &Signed) -> Result<(), RepoError> {
        let targets = SignedTargets::from_signed(signed)?;

        let mut staged = self.keydb.clone();
        for (key_id, key) in &targets.signed.delegations.keys {
            let derived = key.key_id()?;
            if &derived != key_id {
                return Err(RepoError::KeyDb(KeyDbError::KeyIdConflict {
                    key_id: key_id.clone(),
                }));
            }
            staged.add_key(key)?;
        }
        for delegated in &targets.signed.delegations.roles {
            staged.add_role(delegated.clone())?;
        }

        self.keydb = staged;
        self.targets.insert(role.to_string(), targets);
        Ok(())
    }

    pub fn set_snapshot(&mut self, signed: &Signed) -> Result<(), RepoError> {
        self.snapshot = Some(SignedSnapshot::from_signed(signed)?);
        Ok(())
    }

    pub fn set_timestamp(&mut self, signed: &Signed) -> Result<(), RepoError> {
        self.timestamp = Some(SignedTimestamp::from_signed(signed)?);
        Ok(())
    }

    /// The file-meta entry for a path directly in one role's targets file.
    pub fn target_meta(&self, role: &str, path: &str) -> Option<&FileMeta> {
        self.targets.get(role)?.signed.targets.get(path)
    }

    /// The delegations of a role that are authoritative for a path, in
    /// declared (priority) order.
    pub fn target_delegations(&self, role: &str, path: &str) -> Vec<&Role> {
        self.delegations_for(role, path, &path_digest(path))
    }

    fn delegations_for(&self, role: &str, path: &str, digest: &str) -> Vec<&Role> {
        match self.targets.get(role) {
            Some(targets) => targets
                .signed
                .delegations
                .roles
                .iter()
                .filter(|r| r.matches_path(path, digest))
                .collect(),
            None => Vec::new(),
        }
    }

    /// Locate the first file-meta entry for a path in a pre-order walk of
    /// the delegation tree rooted at `targets`. Multiple roles may claim
    /// the same target; the first encountered wins. Cycles and excessive
    /// depth terminate the affected branch rather than erroring — a
    /// malformed repository simply yields no target.
    pub fn find_target(&self, path: &str) -> Option<&FileMeta> {
        let digest = path_digest(path);
        let mut visited = HashSet::new();
        self.walk_targets("targets", path, &digest, &mut visited, 0)
    }

    fn walk_targets<'a>(
        &'a self,
        role: &str,
        path: &str,
        digest: &str,
        visited: &mut HashSet<String>,
        depth: usize,
    ) -> Option<&'a FileMeta> {
        if depth > MAX_DELEGATION_DEPTH {
            debug!(role, depth, "delegation depth cap reached");
            return None;
        }
        if !visited.insert(role.to_string()) {
            debug!(role, "delegation cycle detected, skipping");
            return None;
        }
        if let Some(meta) = self.target_meta(role, path) {
            return Some(meta);
        }
        for child in self.delegations_for(role, path, digest) {
            if let Some(meta) = self.walk_targets(&child.name, path, digest, visited, depth + 1) {
                return Some(meta);
            }
        }
        None
    }

    /// Add or update a delegation. Supplied keys are appended to the role's
    /// key set, installed into the parent's delegation keys and the key
    /// database. An existing delegation of the same name is replaced in
    /// place; a new one is inserted before `before` (higher priority) or
    /// appended. The role always gets a fresh, empty targets file.
    pub fn update_delegations(
        &mut self,
        mut role: Role,
        keys: &[PublicKey],
        before: Option<&str>,
    ) -> Result<(), RepoError> {
        if !role.is_delegation() || !role.is_valid_name() {
            return Err(RepoError::InvalidRole {
                role: role.name,
                reason: "not a valid delegation name".to_string(),
            });
        }
        let parent_name = match role.parent_name() {
            Some(parent) => parent.to_string(),
            None => {
                return Err(RepoError::InvalidRole {
                    role: role.name,
                    reason: "delegation has no parent".to_string(),
                })
            }
        };

        let mut prepared = Vec::with_capacity(keys.len());
        for key in keys {
            prepared.push((key.key_id()?, key.public_only()));
        }

        let mut staged = self.keydb.clone();
        for (key_id, key) in &prepared {
            staged.add_key(key)?;
            if !role.key_ids.contains(key_id) {
                role.key_ids.push(key_id.clone());
            }
        }
        staged.add_role(role.clone())?;

        let Some(parent) = self.targets.get_mut(&parent_name) else {
            return Err(RepoError::InvalidRole {
                role: role.name,
                reason: format!("parent role {parent_name} has no targets file"),
            });
        };
        for (key_id, key) in prepared {
            parent.signed.delegations.keys.insert(key_id, key);
        }
        let roles = &mut parent.signed.delegations.roles;
        if let Some(existing) = roles.iter_mut().find(|r| r.name == role.name) {
            *existing = role.clone();
        } else {
            match before.and_then(|b| roles.iter().position(|r| r.name == b)) {
                Some(index) => roles.insert(index, role.clone()),
                None => roles.push(role.clone()),
            }
        }
        parent.dirty = true;

        self.targets.insert(role.name.clone(), SignedTargets::new());
        self.keydb = staged;
        Ok(())
    }

    /// Authorize additional keys for a role. Top-level roles are edited in
    /// root; delegated roles in the parent targets file that declares them.
    pub fn add_keys(&mut self, role_name: &str, keys: &[PublicKey]) -> Result<(), RepoError> {
        let mut prepared = Vec::with_capacity(keys.len());
        for key in keys {
            prepared.push((key.key_id()?, key.public_only()));
        }

        let mut staged = self.keydb.clone();
        for (_, key) in &prepared {
            staged.add_key(key)?;
        }
        let mut updated = staged
            .get_role(role_name)
            .cloned()
            .ok_or_else(|| RepoError::MissingRole {
                role: role_name.to_string(),
            })?;
        for (key_id, _) in &prepared {
            if !updated.key_ids.contains(key_id) {
                updated.key_ids.push(key_id.clone());
            }
        }
        staged.add_role(updated.clone())?;

        if role_name.contains('/') {
            let parent_name = parent_of(role_name);
            let Some(parent) = self.targets.get_mut(parent_name) else {
                return Err(RepoError::InvalidRole {
                    role: role_name.to_string(),
                    reason: format!("parent role {parent_name} has no targets file"),
                });
            };
            let Some(entry) = parent
                .signed
                .delegations
                .roles
                .iter_mut()
                .find(|r| r.name == role_name)
            else {
                return Err(RepoError::InvalidRole {
                    role: role_name.to_string(),
                    reason: "delegation not declared by parent".to_string(),
                });
            };
            entry.key_ids = updated.key_ids.clone();
            for (key_id, key) in prepared {
                parent.signed.delegations.keys.insert(key_id, key);
            }
            parent.dirty = true;
        } else {
            let Some(root) = self.root.as_mut() else {
                return Err(RepoError::MissingRole {
                    role: "root".to_string(),
                });
            };
            let Some(entry) = root.signed.roles.get_mut(role_name) else {
                return Err(RepoError::MissingRole {
                    role: role_name.to_string(),
                });
            };
            entry.key_ids = updated.key_ids.clone();
            for (key_id, key) in prepared {
                root.signed.keys.insert(key_id, key);
            }
            root.dirty = true;
        }

        self.keydb = staged;
        Ok(())
    }

    /// Withdraw key ids from a role. Key material no other role in the same
    /// file references is dropped alongside. Removing keys below the role's
    /// threshold is rejected; lower the threshold first.
    pub fn remove_keys(&mut self, role_name: &str, key_ids: &[KeyId]) -> Result<(), RepoError> {
        let mut staged = self.keydb.clone();
        let mut updated = staged
            .get_role(role_name)
            .cloned()
            .ok_or_else(|| RepoError::MissingRole {
                role: role_name.to_string(),
            })?;
        updated.key_ids.retain(|k| !key_ids.contains(k));
        staged.add_role(updated.clone())?;

        if role_name.contains('/') {
            let parent_name = parent_of(role_name);
            let Some(parent) = self.targets.get_mut(parent_name) else {
                return Err(RepoError::InvalidRole {
                    role: role_name.to_string(),
                    reason: format!("parent role {parent_name} has no targets file"),
                });
            };
            let Some(entry) = parent
                .signed
                .delegations
                .roles
                .iter_mut()
                .find(|r| r.name == role_name)
            else {
                return Err(RepoError::InvalidRole {
                    role: role_name.to_string(),
                    reason: "delegation not declared by parent".to_string(),
                });
            };
            entry.key_ids = updated.key_ids.clone();

            let referenced: HashSet<KeyId> = parent
                .signed
                .delegations
                .roles
                .iter()
                .flat_map(|r| r.key_ids.iter().cloned())
                .collect();
            parent
                .signed
                .delegations
                .keys
                .retain(|id, _| referenced.contains(id));
            parent.dirty = true;
        } else {
            let Some(root) = self.root.as_mut() else {
                return Err(RepoError::MissingRole {
                    role: "root".to_string(),
                });
            };
            let Some(entry) = root.signed.roles.get_mut(role_name) else {
                return Err(RepoError::MissingRole {
                    role: role_name.to_string(),
                });
            };
            entry.key_ids = updated.key_ids.clone();

            let referenced: HashSet<KeyId> = root
                .signed
                .roles
                .values()
                .flat_map(|r| r.key_ids.iter().cloned())
                .collect();
            root.signed.keys.retain(|id, _| referenced.contains(id));
            root.dirty = true;
        }

        self.keydb = staged;
        Ok(())
    }

    /// Record target files under a role. Fails up front unless the key
    /// store can meet the role's signing threshold, so the mutation is
    /// never left unsignable.
    pub fn add_targets(
        &mut self,
        role_name: &str,
        files: BTreeMap<String, FileMeta>,
    ) -> Result<(), RepoError> {
        let Some(role) = self.keydb.get_role(role_name) else {
            return Err(RepoError::MissingRole {
                role: role_name.to_string(),
            });
        };
        let Some(signer) = self.signer.as_ref() else {
            return Err(RepoError::MissingSigningKey {
                role: role_name.to_string(),
            });
        };
        let available = role.key_ids.iter().filter(|id| signer.has_key(id)).count();
        if available < role.threshold as usize {
            return Err(RepoError::MissingSigningKey {
                role: role_name.to_string(),
            });
        }
        let Some(entry) = self.targets.get_mut(role_name) else {
            return Err(RepoError::InvalidRole {
                role: role_name.to_string(),
                reason: "role has no targets file".to_string(),
            });
        };
        entry.signed.targets.extend(files);
        entry.dirty = true;
        Ok(())
    }

    /// Rebuild the snapshot's meta map from the current signed forms of
    /// root and every targets file.
    pub fn update_snapshot(&mut self) -> Result<(), RepoError> {
        let root_meta = match self.root.as_ref() {
            Some(root) => FileMeta::from_bytes(&root.to_signed()?.to_canonical_bytes()?),
            None => {
                return Err(RepoError::MissingRole {
                    role: "root".to_string(),
                })
            }
        };
        let mut meta = BTreeMap::new();
        meta.insert("root".to_string(), root_meta);
        for (name, targets) in &self.targets {
            meta.insert(
                name.clone(),
                FileMeta::from_bytes(&targets.to_signed()?.to_canonical_bytes()?),
            );
        }

        let Some(snapshot) = self.snapshot.as_mut() else {
            return Err(RepoError::MissingRole {
                role: "snapshot".to_string(),
            });
        };
        snapshot.signed.meta = meta;
        snapshot.dirty = true;
        Ok(())
    }

    /// Re-point the timestamp at the current signed snapshot.
    pub fn update_timestamp(&mut self) -> Result<(), RepoError> {
        let snapshot_meta = match self.snapshot.as_ref() {
            Some(snapshot) => FileMeta::from_bytes(&snapshot.to_signed()?.to_canonical_bytes()?),
            None => {
                return Err(RepoError::MissingRole {
                    role: "snapshot".to_string(),
                })
            }
        };
        let Some(timestamp) = self.timestamp.as_mut() else {
            return Err(RepoError::MissingRole {
                role: "timestamp".to_string(),
            });
        };
        timestamp
            .signed
            .meta
            .insert("snapshot".to_string(), snapshot_meta);
        timestamp.dirty = true;
        Ok(())
    }

    /// Sign the root role. The expiry is stamped into the payload; a dirty
    /// role gets its version bumped and the bit cleared. The stored object
    /// is only updated once signing has succeeded.
    pub fn sign_root(&mut self, expires: DateTime<Utc>) -> Result<Signed, RepoError> {
        let keys = self.signing_keys("root")?;
        let Some(signer) = self.signer.as_ref() else {
            return Err(RepoError::MissingSigningKey {
                role: "root".to_string(),
            });
        };
        let Some(root) = self.root.as_mut() else {
            return Err(RepoError::MissingRole {
                role: "root".to_string(),
            });
        };

        let mut payload = root.signed.clone();
        payload.expires = expires;
        if root.dirty {
            payload.version += 1;
        }
        let mut blob = Signed {
            signatures: root.signatures.clone(),
            signed: serde_json::to_value(&payload).map_err(CanonicalError::from)?,
        };
        signer.sign(&mut blob, &keys)?;

        root.signed = payload;
        root.signatures = blob.signatures.clone();
        root.dirty = false;
        Ok(blob)
    }

    /// Sign a targets role (top-level or delegated) by name.
    pub fn sign_targets(
        &mut self,
        role_name: &str,
        expires: DateTime<Utc>,
    ) -> Result<Signed, RepoError> {
        let keys = self.signing_keys(role_name)?;
        let Some(signer) = self.signer.as_ref() else {
            return Err(RepoError::MissingSigningKey {
                role: role_name.to_string(),
            });
        };
        let Some(targets) = self.targets.get_mut(role_name) else {
            return Err(RepoError::MissingRole {
                role: role_name.to_string(),
            });
        };

        let mut payload = targets.signed.clone();
        payload.expires = expires;
        if targets.dirty {
            payload.version += 1;
        }
        let mut blob = Signed {
            signatures: targets.signatures.clone(),
            signed: serde_json::to_value(&payload).map_err(CanonicalError::from)?,
        };
        signer.sign(&mut blob, &keys)?;

        targets.signed = payload;
        targets.signatures = blob.signatures.clone();
        targets.dirty = false;
        Ok(blob)
    }

    /// Sign the snapshot role.
    pub fn sign_snapshot(&mut self, expires: DateTime<Utc>) -> Result<Signed, RepoError> {
        let keys = self.signing_keys("snapshot")?;
        let Some(signer) = self.signer.as_ref() else {
            return Err(RepoError::MissingSigningKey {
                role: "snapshot".to_string(),
            });
        };
        let Some(snapshot) = self.snapshot.as_mut() else {
            return Err(RepoError::MissingRole {
                role: "snapshot".to_string(),
            });
        };

        let mut payload = snapshot.signed.clone();
        payload.expires = expires;
        if snapshot.dirty {
            payload.version += 1;
        }
        let mut blob = Signed {
            signatures: snapshot.signatures.clone(),
            signed: serde_json::to_value(&payload).map_err(CanonicalError::from)?,
        };
        signer.sign(&mut blob, &keys)?;

        snapshot.signed = payload;
        snapshot.signatures = blob.signatures.clone();
        snapshot.dirty = false;
        Ok(blob)
    }

    /// Sign the timestamp role.
    pub fn sign_timestamp(&mut self, expires: DateTime<Utc>) -> Result<Signed, RepoError> {
        let keys = self.signing_keys("timestamp")?;
        let Some(signer) = self.signer.as_ref() else {
            return Err(RepoError::MissingSigningKey {
                role: "timestamp".to_string(),
            });
        };
        let Some(timestamp) = self.timestamp.as_mut() else {
            return Err(RepoError::MissingRole {
                role: "timestamp".to_string(),
            });
        };

        let mut payload = timestamp.signed.clone();
        payload.expires = expires;
        if timestamp.dirty {
            payload.version += 1;
        }
        let mut blob = Signed {
            signatures: timestamp.signatures.clone(),
            signed: serde_json::to_value(&payload).map_err(CanonicalError::from)?,
        };
        signer.sign(&mut blob, &keys)?;

        timestamp.signed = payload;
        timestamp.signatures = blob.signatures.clone();
        timestamp.dirty = false;
        Ok(blob)
    }

    /// Public keys authorized for a role, resolved through the registry.
    fn signing_keys(&self, role_name: &str) -> Result<Vec<PublicKey>, RepoError> {
        let Some(role) = self.keydb.get_role(role_name) else {
            return Err(RepoError::MissingRole {
                role: role_name.to_string(),
            });
        };
        let keys: Vec<PublicKey> = role
            .key_ids
            .iter()
            .filter_map(|id| self.keydb.get_key(id).cloned())
            .collect();
        if keys.is_empty() {
            return Err(RepoError::MissingSigningKey {
                role: role_name.to_string(),
            });
        }
        Ok(keys)
    }
}

fn parent_of(role_name: &str) -> &str {
    role_name.rsplit_once('/').map(|(p, _)| p).unwrap_or("")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::{InMemoryKeyStore, PrivateKey};

    fn delegation(name: &str, paths: &[&str]) -> Role {
        Role {
            name: name.to_string(),
            threshold: 1,
            key_ids: Vec::new(),
            paths: paths.iter().map(|p| p.to_string()).collect(),
            path_hash_prefixes: Vec::new(),
        }
    }

    fn repo_with_top_level_targets() -> (Repository, PublicKey) {
        let mut db = KeyDb::new();
        let mut store = InMemoryKeyStore::new();

        let key = PrivateKey::ed25519_from_seed(&[41u8; 32]).unwrap();
        let public = key.public();
        let id = db.add_key(&public).unwrap();
        store.insert(key).unwrap();
        db.add_role(Role {
            name: "targets".to_string(),
            threshold: 1,
            key_ids: vec![id],
            paths: Vec::new(),
            path_hash_prefixes: Vec::new(),
        })
        .unwrap();

        let mut repo = Repository::new(db, Some(Signer::new(Box::new(store))));
        repo.targets
            .insert("targets".to_string(), SignedTargets::new());
        (repo, public)
    }

    #[test]
    fn update_delegations_orders_by_before() {
        let (mut repo, key) = repo_with_top_level_targets();
        let keys = [key];

        repo.update_delegations(delegation("targets/b", &["b/"]), &keys, None)
            .unwrap();
        repo.update_delegations(delegation("targets/c", &["c/"]), &keys, None)
            .unwrap();
        repo.update_delegations(delegation("targets/a", &["a/"]), &keys, Some("targets/c"))
            .unwrap();

        let order: Vec<&str> = repo
            .targets("targets")
            .unwrap()
            .signed
            .delegations
            .roles
            .iter()
            .map(|r| r.name.as_str())
            .collect();
        assert_eq!(order, ["targets/b", "targets/a", "targets/c"]);
    }

    #[test]
    fn update_delegations_replaces_in_place() {
        let (mut repo, key) = repo_with_top_level_targets();
        let keys = [key];

        repo.update_delegations(delegation("targets/a", &["a/"]), &keys, None)
            .unwrap();
        repo.update_delegations(delegation("targets/b", &["b/"]), &keys, None)
            .unwrap();
        repo.update_delegations(delegation("targets/a", &["other/"]), &keys, None)
            .unwrap();

        let roles = &repo.targets("targets").unwrap().signed.delegations.roles;
        assert_eq!(roles.len(), 2);
        assert_eq!(roles[0].name, "targets/a");
        assert_eq!(roles[0].paths, ["other/"]);
    }

    #[test]
    fn update_delegations_rejects_top_level_names() {
        let (mut repo, key) = repo_with_top_level_targets();
        let err = repo
            .update_delegations(delegation("snapshot", &[]), &[key], None)
            .unwrap_err();
        assert!(matches!(err, RepoError::InvalidRole { .. }));
    }

    #[test]
    fn update_delegations_requires_parent_targets() {
        let (mut repo, key) = repo_with_top_level_targets();
        let err = repo
            .update_delegations(delegation("targets/missing/child", &[]), &[key], None)
            .unwrap_err();
        assert!(matches!(err, RepoError::InvalidRole { .. }));
    }

    #[test]
    fn remove_keys_respects_threshold() {
        let (mut repo, key) = repo_with_top_level_targets();
        let id = key.key_id().unwrap();
        let err = repo.remove_keys("targets", &[id]).unwrap_err();
        assert!(matches!(
            err,
            RepoError::KeyDb(KeyDbError::InvalidThreshold { .. })
        ));
        // Atomic: the role still holds its key.
        assert_eq!(repo.key_db().get_role("targets").unwrap().key_ids.len(), 1);
    }

    #[test]
    fn parent_of_nested_names() {
        assert_eq!(parent_of("targets/a"), "targets");
        assert_eq!(parent_of("targets/a/b"), "targets/a");
    }
}

//! Persistent identity and pairing storage.
//!
//! The accessory identity (its id and long-term Ed25519 key) is created once
//! at first boot and never rotated. Controller pairings are capped at
//! [`MAX_PAIRINGS`]; capacity enforcement lives here rather than in the
//! pairing state machines so every caller (Pair-Setup, `AddPairing`) goes
//! through the same check.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Maximum number of controller pairings an accessory will hold at once.
pub const MAX_PAIRINGS: usize = 16;

bitflags::bitflags! {
    /// Permission bits carried by a stored pairing.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
    pub struct Permissions: u8 {
        /// Regular controller, may read/write per-characteristic permissions.
        const USER = 0;
        /// May add/remove/list other pairings.
        const ADMIN = 1 << 0;
    }
}

/// A single paired controller record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pairing {
    /// iOS controller UUID (36-byte UTF-8 string).
    pub device_id: String,
    /// Controller's long-term Ed25519 public key.
    pub device_public_key: [u8; 32],
    /// Admin vs. regular controller.
    pub permissions: Permissions,
}

/// The accessory's own long-term identity, created once at first boot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessoryIdentity {
    /// `XX:XX:XX:XX:XX:XX` uppercase hex accessory id.
    pub accessory_id: String,
    /// Long-term Ed25519 secret key (32 bytes).
    pub secret_key: [u8; 32],
    /// Long-term Ed25519 public key (32 bytes).
    pub public_key: [u8; 32],
}

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("pairing table is full (max {MAX_PAIRINGS})")]
    MaxPeers,

    #[error("no identity has been provisioned yet")]
    NoIdentity,
}

/// Abstract storage interface for the accessory identity and pairing table.
///
/// The delegated persistent-state collaborator (§6) this server expects to
/// be plugged with: durability before a pair-setup M6 reply is sent is the
/// caller's responsibility (call [`IdentityStore::save`] / add the pairing
/// before replying).
pub trait IdentityStore: Send + Sync {
    /// Load the accessory identity, if one has been provisioned.
    fn load_identity(&self) -> Option<AccessoryIdentity>;

    /// Persist the accessory identity. Called once, at first boot.
    ///
    /// # Errors
    /// Returns an error if the underlying storage write fails.
    fn save_identity(&mut self, identity: &AccessoryIdentity) -> Result<(), StorageError>;

    /// Whether another pairing can be added without exceeding [`MAX_PAIRINGS`].
    fn can_add_pairing(&self) -> bool;

    /// Look up a pairing by controller id.
    fn find_pairing(&self, device_id: &str) -> Option<Pairing>;

    /// Insert or update a pairing.
    ///
    /// # Errors
    /// Returns [`StorageError::MaxPeers`] if the table is full and
    /// `device_id` is not already present.
    fn add_pairing(&mut self, pairing: Pairing) -> Result<(), StorageError>;

    /// Remove a pairing by controller id. No-op if absent.
    ///
    /// # Errors
    /// Returns an error if the underlying storage write fails.
    fn remove_pairing(&mut self, device_id: &str) -> Result<(), StorageError>;

    /// Iterate all stored pairings.
    fn list_pairings(&self) -> Vec<Pairing>;

    /// Whether any stored pairing has admin permissions.
    fn has_admin_pairing(&self) -> bool {
        self.list_pairings()
            .iter()
            .any(|p| p.permissions.contains(Permissions::ADMIN))
    }

    /// Wipe all identity and pairing state.
    ///
    /// # Errors
    /// Returns an error if the underlying storage write fails.
    fn reset(&mut self) -> Result<(), StorageError>;
}

/// In-memory storage (non-persistent); useful for tests.
#[derive(Debug, Default)]
pub struct MemoryStore {
    identity: Option<AccessoryIdentity>,
    pairings: HashMap<String, Pairing>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl IdentityStore for MemoryStore {
    fn load_identity(&self) -> Option<AccessoryIdentity> {
        self.identity.clone()
    }

    fn save_identity(&mut self, identity: &AccessoryIdentity) -> Result<(), StorageError> {
        self.identity = Some(identity.clone());
        Ok(())
    }

    fn can_add_pairing(&self) -> bool {
        self.pairings.len() < MAX_PAIRINGS
    }

    fn find_pairing(&self, device_id: &str) -> Option<Pairing> {
        self.pairings.get(device_id).cloned()
    }

    fn add_pairing(&mut self, pairing: Pairing) -> Result<(), StorageError> {
        if !self.pairings.contains_key(&pairing.device_id) && self.pairings.len() >= MAX_PAIRINGS {
            return Err(StorageError::MaxPeers);
        }
        self.pairings.insert(pairing.device_id.clone(), pairing);
        Ok(())
    }

    fn remove_pairing(&mut self, device_id: &str) -> Result<(), StorageError> {
        self.pairings.remove(device_id);
        Ok(())
    }

    fn list_pairings(&self) -> Vec<Pairing> {
        self.pairings.values().cloned().collect()
    }

    fn reset(&mut self) -> Result<(), StorageError> {
        self.identity = None;
        self.pairings.clear();
        Ok(())
    }
}

/// JSON-file-backed storage; the whole table is rewritten on every mutation,
/// which is acceptable given the ≤16-pairing cap and the low mutation rate
/// (pairing add/remove is a rare, user-driven event).
#[derive(Serialize, Deserialize, Default)]
struct FileContents {
    identity: Option<AccessoryIdentity>,
    pairings: HashMap<String, Pairing>,
}

pub struct FileStore {
    path: std::path::PathBuf,
    contents: FileContents,
}

impl FileStore {
    /// # Errors
    /// Returns an error if the directory cannot be created or the existing
    /// file cannot be parsed.
    pub fn new(path: impl AsRef<std::path::Path>) -> Result<Self, StorageError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = Self::load(&path)?;
        Ok(Self { path, contents })
    }

    fn load(path: &std::path::Path) -> Result<FileContents, StorageError> {
        if !path.exists() {
            return Ok(FileContents::default());
        }
        let file = std::fs::File::open(path)?;
        let reader = std::io::BufReader::new(file);
        serde_json::from_reader(reader).map_err(|e| StorageError::Serialization(e.to_string()))
    }

    fn flush(&self) -> Result<(), StorageError> {
        let file = std::fs::File::create(&self.path)?;
        let writer = std::io::BufWriter::new(file);
        serde_json::to_writer_pretty(writer, &self.contents)
            .map_err(|e| StorageError::Serialization(e.to_string()))
    }
}

impl IdentityStore for FileStore {
    fn load_identity(&self) -> Option<AccessoryIdentity> {
        self.contents.identity.clone()
    }

    fn save_identity(&mut self, identity: &AccessoryIdentity) -> Result<(), StorageError> {
        self.contents.identity = Some(identity.clone());
        self.flush()
    }

    fn can_add_pairing(&self) -> bool {
        self.contents.pairings.len() < MAX_PAIRINGS
    }

    fn find_pairing(&self, device_id: &str) -> Option<Pairing> {
        self.contents.pairings.get(device_id).cloned()
    }

    fn add_pairing(&mut self, pairing: Pairing) -> Result<(), StorageError> {
        if !self.contents.pairings.contains_key(&pairing.device_id)
            && self.contents.pairings.len() >= MAX_PAIRINGS
        {
            return Err(StorageError::MaxPeers);
        }
        self.contents.pairings.insert(pairing.device_id.clone(), pairing);
        self.flush()
    }

    fn remove_pairing(&mut self, device_id: &str) -> Result<(), StorageError> {
        self.contents.pairings.remove(device_id);
        self.flush()
    }

    fn list_pairings(&self) -> Vec<Pairing> {
        self.contents.pairings.values().cloned().collect()
    }

    fn reset(&mut self) -> Result<(), StorageError> {
        self.contents = FileContents::default();
        self.flush()
    }
}

//! Receipt persistence
//!
//! The gateway only ever reads receipts through `ReceiptStore::list`. The
//! JSON file store adds the writes the CLI needs.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, RwLock};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use tracing::debug;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::models::{NewReceipt, Receipt};

/// Read access to stored receipts
pub trait ReceiptStore: Send + Sync {
    /// Receipts belonging to `owner_id`, newest first
    fn list(&self, owner_id: &str) -> Result<Vec<Receipt>>;
}

fn newest_first(mut receipts: Vec<Receipt>) -> Vec<Receipt> {
    receipts.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    receipts
}

const STORE_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
struct StoreFile {
    version: u32,
    #[serde(default)]
    receipts: Vec<Receipt>,
}

impl Default for StoreFile {
    fn default() -> Self {
        Self {
            version: STORE_VERSION,
            receipts: Vec::new(),
        }
    }
}

/// All receipts in one JSON document on disk
///
/// Writes go to a temp file in the same directory and are renamed into
/// place, so a crash never leaves a half-written store.
pub struct JsonFileStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonFileStore {
    /// Open (or lazily create) the store at `path`
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        Ok(Self {
            path,
            write_lock: Mutex::new(()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> Result<StoreFile> {
        if !self.path.exists() {
            return Ok(StoreFile::default());
        }
        let content = fs::read_to_string(&self.path)?;
        if content.trim().is_empty() {
            return Ok(StoreFile::default());
        }
        let file: StoreFile = serde_json::from_str(&content)?;
        if file.version > STORE_VERSION {
            return Err(Error::InvalidData(format!(
                "Receipt store {} has unsupported version {}",
                self.path.display(),
                file.version
            )));
        }
        Ok(file)
    }

    fn save(&self, file: &StoreFile) -> Result<()> {
        let dir = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };

        let mut temp = NamedTempFile::new_in(&dir)?;
        serde_json::to_writer_pretty(&mut temp, file)?;
        temp.write_all(b"\n")?;
        temp.as_file().sync_all()?;
        temp.persist(&self.path).map_err(|e| Error::Io(e.error))?;

        debug!(path = %self.path.display(), receipts = file.receipts.len(), "Saved receipt store");
        Ok(())
    }

    /// Read, change and write back under the write lock
    fn update<T>(&self, change: impl FnOnce(&mut StoreFile) -> Result<T>) -> Result<T> {
        let _guard = self
            .write_lock
            .lock()
            .map_err(|_| Error::InvalidData("Receipt store lock poisoned".into()))?;
        let mut file = self.load()?;
        let result = change(&mut file)?;
        self.save(&file)?;
        Ok(result)
    }

    /// Save a new receipt for `owner_id`, assigning its id and timestamp
    pub fn add(&self, owner_id: &str, new: NewReceipt) -> Result<Receipt> {
        let receipt = Receipt {
            id: Uuid::new_v4().to_string(),
            owner_id: owner_id.to_string(),
            image_path: new.image_path,
            total_amount: new.total_amount,
            date: new.date,
            time: new.time,
            store_name: new.store_name,
            category: new.category,
            items: new.items,
            created_at: Utc::now(),
        };
        self.insert(receipt)
    }

    /// Store a fully formed receipt (imports, tests)
    pub fn insert(&self, receipt: Receipt) -> Result<Receipt> {
        self.update(|file| {
            if file.receipts.iter().any(|r| r.id == receipt.id) {
                return Err(Error::InvalidData(format!(
                    "Receipt {} already exists",
                    receipt.id
                )));
            }
            file.receipts.push(receipt.clone());
            Ok(receipt)
        })
    }

    pub fn get(&self, id: &str) -> Result<Receipt> {
        self.load()?
            .receipts
            .into_iter()
            .find(|r| r.id == id)
            .ok_or_else(|| Error::NotFound(format!("receipt {}", id)))
    }

    /// Remove a receipt, returning what was removed
    pub fn delete(&self, id: &str) -> Result<Receipt> {
        self.update(|file| {
            let pos = file
                .receipts
                .iter()
                .position(|r| r.id == id)
                .ok_or_else(|| Error::NotFound(format!("receipt {}", id)))?;
            Ok(file.receipts.remove(pos))
        })
    }
}

impl ReceiptStore for JsonFileStore {
    fn list(&self, owner_id: &str) -> Result<Vec<Receipt>> {
        let receipts = self
            .load()?
            .receipts
            .into_iter()
            .filter(|r| r.owner_id == owner_id)
            .collect();
        Ok(newest_first(receipts))
    }
}

/// In-memory store for tests and embedding
#[derive(Default)]
pub struct MemoryStore {
    receipts: RwLock<Vec<Receipt>>,
}

impl MemoryStore {
    pub fn new(receipts: Vec<Receipt>) -> Self {
        Self {
            receipts: RwLock::new(receipts),
        }
    }

    pub fn push(&self, receipt: Receipt) -> Result<()> {
        self.receipts
            .write()
            .map_err(|_| Error::InvalidData("Memory store lock poisoned".into()))?
            .push(receipt);
        Ok(())
    }
}

impl ReceiptStore for MemoryStore {
    fn list(&self, owner_id: &str) -> Result<Vec<Receipt>> {
        let receipts = self
            .receipts
            .read()
            .map_err(|_| Error::InvalidData("Memory store lock poisoned".into()))?
            .iter()
            .filter(|r| r.owner_id == owner_id)
            .cloned()
            .collect();
        Ok(newest_first(receipts))
    }
}

//! Durable storage for the chain.
//!
//! The whole chain is rewritten on every save. Blocks are stored exactly as
//! held in memory and nothing is recomputed on load.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use crate::block::Block;
use crate::error::StoreError;

pub trait ChainStore: Send {
    /// The persisted chain, or `None` when nothing was ever saved.
    fn load(&self) -> Result<Option<Vec<Block>>, StoreError>;

    /// Replace the persisted chain with `chain`.
    fn save(&mut self, chain: &[Block]) -> Result<(), StoreError>;
}

/// Pretty-printed JSON array of blocks in a single file.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn tmp_path(&self) -> PathBuf {
        let mut name = self.path.file_name().unwrap_or_default().to_os_string();
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    fn write_err(&self, source: std::io::Error) -> StoreError {
        StoreError::Write {
            path: self.path.clone(),
            source,
        }
    }
}

impl ChainStore for JsonFileStore {
    fn load(&self) -> Result<Option<Vec<Block>>, StoreError> {
        if !self.path.exists() {
            return Ok(None);
        }
        let raw = fs::read(&self.path).map_err(|source| StoreError::Read {
            path: self.path.clone(),
            source,
        })?;
        let blocks = serde_json::from_slice(&raw).map_err(|source| StoreError::Decode {
            path: self.path.clone(),
            source,
        })?;
        Ok(Some(blocks))
    }

    fn save(&mut self, chain: &[Block]) -> Result<(), StoreError> {
        let json = serde_json::to_vec_pretty(chain)?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| self.write_err(e))?;
        }

        // Write aside then rename so a crash never leaves a partial chain.
        let tmp = self.tmp_path();
        {
            let mut file = fs::File::create(&tmp).map_err(|e| self.write_err(e))?;
            file.write_all(&json).map_err(|e| self.write_err(e))?;
            file.sync_all().map_err(|e| self.write_err(e))?;
        }
        fs::rename(&tmp, &self.path).map_err(|e| self.write_err(e))?;
        Ok(())
    }
}

/// Chain kept in memory. Clones share the same contents, so a caller can
/// keep a handle to inspect what the ledger saved.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    blocks: Arc<Mutex<Option<Vec<Block>>>>,
    fail_writes: Arc<AtomicBool>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from an already persisted chain.
    pub fn with_chain(chain: Vec<Block>) -> Self {
        Self {
            blocks: Arc::new(Mutex::new(Some(chain))),
            fail_writes: Arc::default(),
        }
    }

    /// Make every following `save` fail, simulating an unavailable disk.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Copy of the last saved chain.
    pub fn snapshot(&self) -> Option<Vec<Block>> {
        self.blocks.lock().ok().and_then(|guard| guard.clone())
    }
}

fn memory_error(msg: &str) -> std::io::Error {
    std::io::Error::new(std::io::ErrorKind::Other, msg.to_string())
}

impl ChainStore for MemoryStore {
    fn load(&self) -> Result<Option<Vec<Block>>, StoreError> {
        let guard = self.blocks.lock().map_err(|_| StoreError::Read {
            path: PathBuf::from("<memory>"),
            source: memory_error("store lock poisoned"),
        })?;
        Ok(guard.clone())
    }

    fn save(&mut self, chain: &[Block]) -> Result<(), StoreError> {
        let write_err = |msg: &str| StoreError::Write {
            path: PathBuf::from("<memory>"),
            source: memory_error(msg),
        };
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(write_err("writes disabled"));
        }
        let mut guard = self.blocks.lock().map_err(|_| write_err("store lock poisoned"))?;
        *guard = Some(chain.to_vec());
        Ok(())
    }
}

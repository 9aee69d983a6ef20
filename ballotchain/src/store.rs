use crate::*;
use fs2::FileExt;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};
use tempfile::NamedTempFile;

/// Load/save collaborator for the ledger's chain
pub trait LedgerStore: Send + Sync {
    /// Load the persisted chain, `None` if nothing has been saved yet
    fn load(&self) -> Result<Option<Vec<Block>>, Error>;

    /// Replace the persisted chain. Must be idempotent.
    fn save(&self, chain: &[Block]) -> Result<(), Error>;
}

/// A store that keeps the chain as a JSON array in a single file
#[derive(Debug, Clone)]
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        FileStore { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Take an exclusive advisory lock on `<ledger>.lock`, blocking until it is free.
    ///
    /// Processes sharing a ledger file hold this across load, seal and save so that their
    /// chains never diverge. The lock is released when the returned guard is dropped.
    pub fn lock(&self) -> Result<LedgerLock, Error> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(sibling_path(&self.path, ".lock"))?;
        file.lock_exclusive()?;
        Ok(LedgerLock { _file: file })
    }
}

/// Held exclusive lock on a ledger file
#[derive(Debug)]
pub struct LedgerLock {
    _file: File,
}

impl LedgerStore for FileStore {
    fn load(&self) -> Result<Option<Vec<Block>>, Error> {
        read_json(&self.path)
    }

    fn save(&self, chain: &[Block]) -> Result<(), Error> {
        write_json_atomic(&self.path, chain)
    }
}

/// Read a JSON document, `None` if the file does not exist
pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>, Error> {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    Ok(Some(serde_json::from_slice(&bytes)?))
}

/// Write a JSON document to a uniquely named temporary file in the same directory, then
/// rename it over `path`.
///
/// A crash mid-write leaves the previous document intact, and concurrent writers never
/// share a temporary file.
pub fn write_json_atomic<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), Error> {
    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };

    // Removed on drop unless persisted
    let mut tmp = NamedTempFile::new_in(dir)?;
    {
        let mut writer = BufWriter::new(tmp.as_file_mut());
        serde_json::to_writer_pretty(&mut writer, value)?;
        writer.flush()?;
    }
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

fn sibling_path(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(suffix);
    path.with_file_name(name)
}

/// A simple store that keeps the chain in memory
#[derive(Default)]
pub struct MemStore {
    inner: Mutex<Option<Vec<Block>>>,
    saves: AtomicUsize,
}

impl MemStore {
    /// A store that already holds a chain
    pub fn with_chain(chain: Vec<Block>) -> Self {
        MemStore {
            inner: Mutex::new(Some(chain)),
            saves: AtomicUsize::new(0),
        }
    }

    /// The last saved chain
    pub fn saved(&self) -> Option<Vec<Block>> {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Number of times `save` has been called
    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }
}

impl LedgerStore for MemStore {
    fn load(&self) -> Result<Option<Vec<Block>>, Error> {
        Ok(self.saved())
    }

    fn save(&self, chain: &[Block]) -> Result<(), Error> {
        *self.inner.lock().unwrap_or_else(PoisonError::into_inner) = Some(chain.to_vec());
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

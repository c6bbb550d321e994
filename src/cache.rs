//! Stores for calibration constants, keyed by register count.
//!
//! The compute-on-miss cycle (check, compute, persist) of the default
//! [`CalibrationCache::get_or_insert_with`] is not atomic. Stores shared between
//! concurrently running networks must override it, as [`MemoryCache`] and
//! [`FileCache`] do.

use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use enum_dispatch::enum_dispatch;
use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::error::Result;

/// Calibration constant computation invoked on a cache miss
pub type Compute<'a> = &'a dyn Fn() -> Result<f64>;

/// Calibration cache store types
#[derive(Debug)]
#[enum_dispatch]
pub enum CacheStore {
    Memory(MemoryCache),
    File(FileCache),
    Disabled(NoCache),
}

/// Key-value store of calibration constants which must be implemented by all stores.
#[enum_dispatch(CacheStore)]
pub trait CalibrationCache {
    /// Return cached constant for `registers`
    fn get(&self, registers: usize) -> Option<f64>;

    /// Store constant for `registers`
    fn put(&self, registers: usize, value: f64) -> Result<()>;

    /// Return cached constant for `registers` or compute and store it.
    ///
    /// Failure to store the computed constant is not fatal.
    fn get_or_insert_with(&self, registers: usize, compute: Compute<'_>) -> Result<f64> {
        if let Some(value) = self.get(registers) {
            return Ok(value);
        }
        let value = compute()?;
        if let Err(err) = self.put(registers, value) {
            warn!(registers, %err, "failed to store calibration constant");
        }
        Ok(value)
    }
}

/// Process-local store safe for concurrent writers
#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: DashMap<usize, f64>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl CalibrationCache for MemoryCache {
    fn get(&self, registers: usize) -> Option<f64> {
        self.entries.get(&registers).map(|v| *v)
    }

    fn put(&self, registers: usize, value: f64) -> Result<()> {
        self.entries.insert(registers, value);
        Ok(())
    }

    /// Shard lock is held while computing, so each key is computed at most once.
    fn get_or_insert_with(&self, registers: usize, compute: Compute<'_>) -> Result<f64> {
        let entry = self.entries.entry(registers);
        match entry {
            Entry::Occupied(e) => Ok(*e.get()),
            Entry::Vacant(e) => {
                let value = compute()?;
                e.insert(value);
                Ok(value)
            }
        }
    }
}

/// Store persisted as a JSON object in a file, shared across process invocations.
///
/// Writers within one process are serialized; concurrent processes writing the
/// same file must be coordinated externally.
#[derive(Debug)]
pub struct FileCache {
    path: PathBuf,
    entries: Mutex<BTreeMap<usize, f64>>,
}

impl FileCache {
    /// Open store at `path`, starting empty when the file does not exist yet.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let entries = match fs::read(&path) {
            Ok(bytes) => serde_json::from_slice(&bytes)?,
            Err(err) if err.kind() == ErrorKind::NotFound => BTreeMap::new(),
            Err(err) => return Err(err.into()),
        };
        debug!(path = %path.display(), "opened calibration cache");
        Ok(Self {
            path,
            entries: Mutex::new(entries),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Rewrite the whole file through a temporary sibling so readers never see a partial write
    fn persist(&self, entries: &BTreeMap<usize, f64>) -> Result<()> {
        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, serde_json::to_vec_pretty(entries)?)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl CalibrationCache for FileCache {
    fn get(&self, registers: usize) -> Option<f64> {
        self.entries.lock().get(&registers).copied()
    }

    fn put(&self, registers: usize, value: f64) -> Result<()> {
        let mut entries = self.entries.lock();
        entries.insert(registers, value);
        self.persist(&entries)
    }

    fn get_or_insert_with(&self, registers: usize, compute: Compute<'_>) -> Result<f64> {
        let mut entries = self.entries.lock();
        if let Some(&value) = entries.get(&registers) {
            return Ok(value);
        }
        let value = compute()?;
        entries.insert(registers, value);
        if let Err(err) = self.persist(&entries) {
            warn!(registers, %err, path = %self.path.display(), "failed to persist calibration constant");
        }
        Ok(value)
    }
}

/// Store that never retains anything
#[derive(Debug, Default, Clone, Copy)]
pub struct NoCache;

impl CalibrationCache for NoCache {
    fn get(&self, _registers: usize) -> Option<f64> {
        None
    }

    fn put(&self, _registers: usize, _value: f64) -> Result<()> {
        Ok(())
    }
}

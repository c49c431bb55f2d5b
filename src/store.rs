//! Key-value persistence for the trained model and the built dataset.

use std::{
    collections::HashMap,
    fs::{self, File},
    io::{self, Write},
    marker::PhantomData,
    path::{Path, PathBuf},
    sync::Arc,
};

use log::debug;
use parking_lot::{Mutex, RwLock};
use serde::{de::DeserializeOwned, Serialize};

use crate::{
    dataset::BuiltDataset, error::StoreError, normalize::DisplayTable, trainer::TrainedModel,
};

/// Byte storage addressed by string keys.
///
/// A reader never observes a partially written value.
pub trait KvStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError>;

    /// Replaces the value of `key`. On failure the previous value is left untouched.
    fn set(&self, key: &str, value: &[u8]) -> Result<(), StoreError>;

    fn exists(&self, key: &str) -> bool;

    fn remove(&self, key: &str) -> Result<(), StoreError>;
}

/// In-process storage with an optional quota over the total bytes held, keys included.
#[derive(Debug, Default)]
pub struct MemoryKv {
    entries: RwLock<HashMap<String, Vec<u8>>>,
    quota: Option<usize>,
}

impl MemoryKv {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_quota(quota: usize) -> Self {
        Self {
            entries: RwLock::default(),
            quota: Some(quota),
        }
    }
}

impl KvStore for MemoryKv {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        Ok(self.entries.read().get(key).cloned())
    }

    fn set(&self, key: &str, value: &[u8]) -> Result<(), StoreError> {
        let mut entries = self.entries.write();

        if let Some(quota) = self.quota {
            let used: usize = entries
                .iter()
                .filter(|(k, _)| k.as_str() != key)
                .map(|(k, v)| k.len() + v.len())
                .sum();
            let needed = key.len() + value.len();
            let available = quota.saturating_sub(used);

            if needed > available {
                return Err(StoreError::QuotaExceeded {
                    key: key.to_string(),
                    needed,
                    available,
                });
            }
        }

        entries.insert(key.to_string(), value.to_vec());
        Ok(())
    }

    fn exists(&self, key: &str) -> bool {
        self.entries.read().contains_key(key)
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        self.entries.write().remove(key);
        Ok(())
    }
}

/// One JSON file per key inside a directory. Writes go to a temporary file which is synced and
/// then renamed over the previous one.
#[derive(Debug)]
pub struct FileKv {
    dir: PathBuf,
    lock: RwLock<()>,
}

impl FileKv {
    /// Opens the store, creating `dir` if needed.
    pub fn open<P: AsRef<Path>>(dir: P) -> Result<Self, StoreError> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;

        Ok(Self {
            dir,
            lock: RwLock::new(()),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path(&self, key: &str) -> Result<PathBuf, StoreError> {
        let valid = !key.is_empty()
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');

        if !valid {
            return Err(StoreError::Io(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("invalid store key {key:?}"),
            )));
        }

        Ok(self.dir.join(format!("{key}.json")))
    }
}

impl KvStore for FileKv {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        let path = self.path(key)?;
        let _guard = self.lock.read();

        match fs::read(path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn set(&self, key: &str, value: &[u8]) -> Result<(), StoreError> {
        let path = self.path(key)?;
        let tmp = self.dir.join(format!(".{key}.json.tmp"));
        let _guard = self.lock.write();

        let write = || -> io::Result<()> {
            let mut file = File::create(&tmp)?;
            file.write_all(value)?;
            file.sync_all()?;
            fs::rename(&tmp, &path)
        };

        write().map_err(|e| {
            let _ = fs::remove_file(&tmp);
            StoreError::Io(e)
        })
    }

    fn exists(&self, key: &str) -> bool {
        let _guard = self.lock.read();
        self.path(key).map(|path| path.is_file()).unwrap_or(false)
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        let path = self.path(key)?;
        let _guard = self.lock.write();

        match fs::remove_file(path) {
            Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e.into()),
            _ => Ok(()),
        }
    }
}

/// A value type with a fixed slot in the store.
pub trait Slot: Serialize + DeserializeOwned {
    const KEY: &'static str;

    /// Checks a value before it's stored and after it's loaded.
    fn validate(&self) -> Result<(), String>;
}

impl Slot for TrainedModel {
    const KEY: &'static str = "trainedModel";

    fn validate(&self) -> Result<(), String> {
        TrainedModel::validate(self)
    }
}

impl Slot for BuiltDataset {
    const KEY: &'static str = "preprocessedData";

    fn validate(&self) -> Result<(), String> {
        BuiltDataset::validate(self)
    }
}

impl Slot for DisplayTable {
    const KEY: &'static str = "normalizedRealEstateData";

    fn validate(&self) -> Result<(), String> {
        DisplayTable::validate(self)
    }
}

/// Typed access to the slot of `T`, serialized as JSON.
pub struct SlotStore<T> {
    kv: Arc<dyn KvStore>,
    write: Mutex<()>,
    _value: PhantomData<fn() -> T>,
}

pub type ModelStore = SlotStore<TrainedModel>;
pub type DatasetStore = SlotStore<BuiltDataset>;
pub type DisplayStore = SlotStore<DisplayTable>;

impl<T: Slot> SlotStore<T> {
    pub fn new(kv: Arc<dyn KvStore>) -> Self {
        Self {
            kv,
            write: Mutex::new(()),
            _value: PhantomData,
        }
    }

    pub fn key(&self) -> &'static str {
        T::KEY
    }

    /// Loads the stored value.
    ///
    /// # Returns
    /// `None` if the slot is empty, `StoreError::Corrupt` if the stored bytes don't hold a valid
    /// value.
    pub fn load(&self) -> Result<Option<T>, StoreError> {
        let Some(bytes) = self.kv.get(T::KEY)? else {
            return Ok(None);
        };

        let value: T = serde_json::from_slice(&bytes).map_err(|e| self.corrupt(e))?;
        value.validate().map_err(|msg| self.corrupt(msg))?;

        Ok(Some(value))
    }

    /// Stores `value`, then reads it back to make sure it landed.
    pub fn save(&self, value: &T) -> Result<(), StoreError> {
        value
            .validate()
            .map_err(|msg| self.corrupt(format!("refusing to store: {msg}")))?;

        let bytes = serde_json::to_vec(value)?;
        let _guard = self.write.lock();

        self.kv.set(T::KEY, &bytes)?;

        if self.kv.get(T::KEY)?.as_deref() != Some(bytes.as_slice()) {
            return Err(StoreError::VerifyFailed {
                key: T::KEY.to_string(),
            });
        }

        debug!("stored {} bytes under '{}'", bytes.len(), T::KEY);
        Ok(())
    }

    pub fn exists(&self) -> bool {
        self.kv.exists(T::KEY)
    }

    pub fn remove(&self) -> Result<(), StoreError> {
        self.kv.remove(T::KEY)
    }

    fn corrupt<E: ToString>(&self, e: E) -> StoreError {
        StoreError::Corrupt {
            key: T::KEY.to_string(),
            msg: e.to_string(),
        }
    }
}

/// Opens both slots over the same backend.
pub fn open_stores(kv: Arc<dyn KvStore>) -> (ModelStore, DatasetStore) {
    (SlotStore::new(kv.clone()), SlotStore::new(kv))
}

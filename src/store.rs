//! Object storage the products read from and write to.

use crate::errors::WaveformErr;
use log::debug;
use std::{
    collections::HashMap,
    io::ErrorKind,
    path::{Component, Path, PathBuf},
    sync::Mutex,
};

/// Whole-object reads and writes addressed by bucket and key.
pub trait ObjectStore {
    /// Fetch an object. Absent or unreadable objects are retrieval errors.
    fn get(&self, bucket: &str, key: &str) -> Result<Vec<u8>, WaveformErr>;

    /// Store an object, replacing any existing one.
    fn put(&self, bucket: &str, key: &str, bytes: &[u8]) -> Result<(), WaveformErr>;
}

/// A store kept in a directory, each bucket a sub-directory and each key a relative path in it.
#[derive(Debug)]
pub struct LocalStore {
    root: PathBuf,
}

impl LocalStore {
    /// Use `root` as the store. It is created on the first write if it does not exist.
    pub fn new(root: &dyn AsRef<Path>) -> Self {
        LocalStore {
            root: root.as_ref().to_path_buf(),
        }
    }

    /// Directory holding the buckets.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_of(&self, bucket: &str, key: &str) -> Result<PathBuf, WaveformErr> {
        let relative = Path::new(bucket).join(key);

        let plain = !bucket.is_empty()
            && !key.is_empty()
            && relative
                .components()
                .all(|c| matches!(c, Component::Normal(_)));
        if !plain {
            return Err(WaveformErr::Validation(format!(
                "bucket '{}' and key '{}' do not name an object",
                bucket, key
            )));
        }

        Ok(self.root.join(relative))
    }
}

impl ObjectStore for LocalStore {
    fn get(&self, bucket: &str, key: &str) -> Result<Vec<u8>, WaveformErr> {
        let path = self.path_of(bucket, key)?;
        debug!("reading {}", path.display());

        std::fs::read(&path).map_err(|err| match err.kind() {
            ErrorKind::NotFound => WaveformErr::retrieval(bucket, key, "no such object"),
            _ => WaveformErr::retrieval(bucket, key, err),
        })
    }

    fn put(&self, bucket: &str, key: &str, bytes: &[u8]) -> Result<(), WaveformErr> {
        let path = self.path_of(bucket, key)?;
        debug!("writing {} bytes to {}", bytes.len(), path.display());

        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        std::fs::write(&path, bytes)?;

        Ok(())
    }
}

/// A store held in memory.
#[derive(Debug, Default)]
pub struct MemoryStore {
    objects: Mutex<HashMap<(String, String), Vec<u8>>>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Keys of every object in a bucket, sorted.
    pub fn keys(&self, bucket: &str) -> Vec<String> {
        let objects = self.objects.lock().unwrap_or_else(|err| err.into_inner());

        let mut keys: Vec<String> = objects
            .keys()
            .filter(|(b, _)| b == bucket)
            .map(|(_, k)| k.clone())
            .collect();
        keys.sort();
        keys
    }
}

impl ObjectStore for MemoryStore {
    fn get(&self, bucket: &str, key: &str) -> Result<Vec<u8>, WaveformErr> {
        let objects = self.objects.lock().unwrap_or_else(|err| err.into_inner());

        objects
            .get(&(bucket.to_owned(), key.to_owned()))
            .cloned()
            .ok_or_else(|| WaveformErr::retrieval(bucket, key, "no such object"))
    }

    fn put(&self, bucket: &str, key: &str, bytes: &[u8]) -> Result<(), WaveformErr> {
        let mut objects = self.objects.lock().unwrap_or_else(|err| err.into_inner());
        objects.insert((bucket.to_owned(), key.to_owned()), bytes.to_vec());

        Ok(())
    }
}

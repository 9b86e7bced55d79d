//! JSON-file document store.
//!
//! Layout: `<root>/<collection>/<key>.json`, each file holding
//! `{"version": n, "data": ...}`. A `put` takes a `<key>.lock` file created
//! with `create_new`, so the version check and the write are atomic across
//! processes sharing the directory. A lock older than the stale age is
//! assumed abandoned by a crashed writer and removed. Appended documents are
//! written as bare JSON under a generated key.

use async_trait::async_trait;
use common::Error;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tracing::warn;
use uuid::Uuid;

use crate::{DocumentStore, Precondition, Versioned};

const LOCK_ATTEMPTS: u32 = 200;
const LOCK_WAIT: Duration = Duration::from_millis(10);
/// A lock older than this belongs to a writer that died mid-`put`.
const STALE_LOCK_AGE: Duration = Duration::from_secs(30);

#[derive(Debug, Serialize, Deserialize)]
struct Envelope {
    version: u64,
    data: Value,
}

/// Removes the lock file when dropped.
struct LockGuard {
    path: PathBuf,
}

impl LockGuard {
    fn acquire(path: PathBuf, stale_after: Duration) -> Result<Self, Error> {
        for _ in 0..LOCK_ATTEMPTS {
            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(mut file) => {
                    // Owner info for whoever finds this lock left behind.
                    let stamp = SystemTime::now()
                        .duration_since(UNIX_EPOCH)
                        .map(|d| d.as_secs())
                        .unwrap_or_default();
                    let owner = format!("pid={} created={}", std::process::id(), stamp);
                    if let Err(e) = writeln!(file, "{owner}") {
                        warn!("Failed to record lock owner in {}: {}", path.display(), e);
                    }
                    return Ok(Self { path });
                }
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                    if break_if_stale(&path, stale_after) {
                        continue;
                    }
                    thread::sleep(LOCK_WAIT);
                }
                Err(e) => return Err(e.into()),
            }
        }
        Err(Error::Store(format!(
            "timed out waiting for lock {}",
            path.display()
        )))
    }
}

/// Remove `path` if it has not been touched for `stale_after`. Returns
/// whether the caller should retry immediately.
fn break_if_stale(path: &Path, stale_after: Duration) -> bool {
    let age = fs::metadata(path)
        .and_then(|m| m.modified())
        .ok()
        .and_then(|modified| SystemTime::now().duration_since(modified).ok());

    match age {
        Some(age) if age >= stale_after => {
            let owner = fs::read_to_string(path).unwrap_or_default();
            warn!(
                lock = %path.display(),
                age_secs = age.as_secs(),
                owner = owner.trim(),
                "Breaking stale lock"
            );
            match fs::remove_file(path) {
                Ok(()) => true,
                Err(e) if e.kind() == ErrorKind::NotFound => true,
                Err(e) => {
                    warn!("Failed to remove stale lock {}: {}", path.display(), e);
                    false
                }
            }
        }
        _ => false,
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.path) {
            warn!("Failed to release lock {}: {}", self.path.display(), e);
        }
    }
}

#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
    stale_lock_age: Duration,
}

impl FileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            stale_lock_age: STALE_LOCK_AGE,
        }
    }

    /// Age at which another writer's lock file is considered abandoned.
    pub fn with_stale_lock_age(mut self, age: Duration) -> Self {
        self.stale_lock_age = age;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn collection_dir(&self, collection: &str) -> Result<PathBuf, Error> {
        validate_segment(collection)?;
        Ok(self.root.join(collection))
    }

    fn doc_path(&self, collection: &str, key: &str) -> Result<PathBuf, Error> {
        validate_segment(key)?;
        Ok(self.collection_dir(collection)?.join(format!("{key}.json")))
    }
}

/// Keys and collection names become path components.
fn validate_segment(segment: &str) -> Result<(), Error> {
    let ok = !segment.is_empty()
        && segment != "."
        && segment != ".."
        && !segment.contains(['/', '\\', '\0']);
    if ok {
        Ok(())
    } else {
        Err(Error::Store(format!("invalid document path segment {segment:?}")))
    }
}

fn read_envelope(path: &Path) -> Result<Option<Envelope>, Error> {
    match fs::read(path) {
        Ok(bytes) => serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|e| Error::Store(format!("corrupt document {}: {e}", path.display()))),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Write via a temp file and rename so readers never see a partial file.
fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), Error> {
    let tmp = path.with_extension(format!("tmp-{}", Uuid::new_v4()));
    let result = (|| -> std::io::Result<()> {
        let mut file = OpenOptions::new().write(true).create_new(true).open(&tmp)?;
        file.write_all(bytes)?;
        file.sync_all()?;
        fs::rename(&tmp, path)
    })();
    if result.is_err() {
        let _ = fs::remove_file(&tmp);
    }
    result.map_err(Error::from)
}

async fn blocking<T, F>(f: F) -> Result<T, Error>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, Error> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| Error::Store(format!("store task failed: {e}")))?
}

#[async_trait]
impl DocumentStore for FileStore {
    async fn get(&self, collection: &str, key: &str) -> Result<Option<Versioned>, Error> {
        let path = self.doc_path(collection, key)?;
        let envelope = blocking(move || read_envelope(&path)).await?;
        Ok(envelope.map(|e| Versioned {
            version: e.version,
            data: e.data,
        }))
    }

    async fn put(
        &self,
        collection: &str,
        key: &str,
        data: Value,
        precondition: Precondition,
    ) -> Result<u64, Error> {
        let dir = self.collection_dir(collection)?;
        let path = self.doc_path(collection, key)?;
        let lock_path = dir.join(format!("{key}.lock"));
        let (collection, key) = (collection.to_string(), key.to_string());
        let stale_after = self.stale_lock_age;

        blocking(move || {
            fs::create_dir_all(&dir)?;
            let _lock = LockGuard::acquire(lock_path, stale_after)?;

            let current = read_envelope(&path)?.map(|e| e.version);
            precondition.check(current, &collection, &key)?;

            let version = current.map_or(1, |v| v + 1);
            let bytes = serde_json::to_vec(&Envelope { version, data })?;
            write_atomic(&path, &bytes)?;
            Ok(version)
        })
        .await
    }

    async fn append(&self, collection: &str, data: Value) -> Result<String, Error> {
        let dir = self.collection_dir(collection)?;
        let id = Uuid::new_v4().to_string();
        let path = dir.join(format!("{id}.json"));

        blocking(move || {
            fs::create_dir_all(&dir)?;
            let bytes = serde_json::to_vec(&data)?;
            write_atomic(&path, &bytes)?;
            Ok(id)
        })
        .await
    }
}

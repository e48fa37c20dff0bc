use crate::CacheStore;
use crate::error::Result;
use serde::Deserialize;
use serde::Serialize;
use sha1::Digest;
use sha1::Sha1;
use std::fs;
use std::io::ErrorKind;
use std::path::Path;
use std::path::PathBuf;
use std::time::Duration;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;
use tracing::warn;

const ENTRY_EXTENSION: &str = "json";

#[derive(Debug, Serialize, Deserialize)]
struct Envelope {
    key: String,
    expires_at: Option<u64>,
    value: Vec<u8>,
}

impl Envelope {
    fn is_expired(&self, now: u64) -> bool {
        self.expires_at.is_some_and(|deadline| deadline <= now)
    }
}

/// Directory-backed store shared between processes. One JSON envelope per
/// key; file names are the SHA-1 of the key so arbitrary keys stay valid
/// paths.
#[derive(Debug, Clone)]
pub struct FileCacheStore {
    dir: PathBuf,
}

impl FileCacheStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn entry_path(&self, key: &str) -> PathBuf {
        let digest = Sha1::digest(key.as_bytes());
        let name: String = digest.iter().map(|byte| format!("{byte:02x}")).collect();
        self.dir.join(format!("{name}.{ENTRY_EXTENSION}"))
    }

    fn read_envelope(path: &Path) -> Result<Option<Envelope>> {
        let data = match fs::read(path) {
            Ok(data) => data,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        };
        match serde_json::from_slice(&data) {
            Ok(envelope) => Ok(Some(envelope)),
            Err(err) => {
                warn!("cache entry {path:?} is unreadable ({err}); dropping it");
                remove_if_present(path)?;
                Ok(None)
            }
        }
    }
}

impl CacheStore for FileCacheStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let path = self.entry_path(key);
        let Some(envelope) = Self::read_envelope(&path)? else {
            return Ok(None);
        };
        if envelope.key != key {
            return Ok(None);
        }
        if envelope.is_expired(unix_now()) {
            remove_if_present(&path)?;
            return Ok(None);
        }
        Ok(Some(envelope.value))
    }

    fn put(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<()> {
        fs::create_dir_all(&self.dir)?;
        let envelope = Envelope {
            key: key.to_string(),
            expires_at: unix_now().checked_add(ttl.as_secs()),
            value,
        };
        let path = self.entry_path(key);
        let tmp_path = path.with_extension("tmp");
        fs::write(&tmp_path, serde_json::to_vec(&envelope)?)?;
        fs::rename(tmp_path, path)?;
        Ok(())
    }

    fn forget(&self, key: &str) -> Result<()> {
        remove_if_present(&self.entry_path(key))
    }

    fn forget_by_prefix(&self, prefix: &str) -> Result<usize> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(0),
            Err(err) => return Err(err.into()),
        };
        let mut removed = 0;
        for entry in entries {
            let path = entry?.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some(ENTRY_EXTENSION) {
                continue;
            }
            if let Some(envelope) = Self::read_envelope(&path)?
                && envelope.key.starts_with(prefix)
            {
                remove_if_present(&path)?;
                removed += 1;
            }
        }
        Ok(removed)
    }
}

fn remove_if_present(path: &Path) -> Result<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
        Err(err) => Err(err.into()),
    }
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs())
        .unwrap_or_default()
}

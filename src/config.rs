use crate::error::PlayerError;
use anyhow::{Context, Result};
use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::PathBuf;

const APP_DIR: &str = "mixtape";
const LOG_FILE: &str = "mixtape.log";

/// Storage key the playlist is persisted under.
pub const PLAYLIST_KEY: &str = "playlist";

pub fn config_root() -> Result<PathBuf> {
    if let Ok(override_dir) = env::var("MIXTAPE_CONFIG_DIR") {
        return Ok(PathBuf::from(override_dir));
    }

    let home = env::var("HOME")
        .or_else(|_| env::var("USERPROFILE"))
        .context("neither HOME nor USERPROFILE is set")?;
    Ok(PathBuf::from(home).join(".config").join(APP_DIR))
}

pub fn ensure_config_dir() -> Result<PathBuf> {
    let root = config_root()?;
    fs::create_dir_all(&root).with_context(|| format!("failed to create {}", root.display()))?;
    Ok(root)
}

/// Remote tracks are fetched here before decoding. Entries are deleted when
/// the track they back is superseded or unloaded.
pub fn stream_cache_dir() -> Result<PathBuf> {
    Ok(config_root()?.join("stream_cache"))
}

pub fn log_file_path() -> Result<PathBuf> {
    Ok(config_root()?.join(LOG_FILE))
}

/// Opens the log file for appending, creating the config dir first. Logging
/// starts before anything else touches the config root, so a fresh machine
/// has no directory yet at this point.
pub fn open_log_file() -> Result<fs::File> {
    ensure_config_dir()?;
    let path = log_file_path()?;
    fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .with_context(|| format!("failed to open {}", path.display()))
}

/// Opaque durable string store the playlist is persisted into. Reads treat
/// every failure as "absent"; writes surface a storage error the caller is
/// expected to absorb.
pub trait KvStore {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&mut self, key: &str, value: &str) -> Result<(), PlayerError>;
}

/// One file per key under the config root.
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    pub fn open() -> Result<Self> {
        Ok(Self {
            root: ensure_config_dir()?,
        })
    }

    fn key_path(&self, key: &str) -> PathBuf {
        self.root.join(format!("{key}.json"))
    }
}

impl KvStore for FileStore {
    fn get(&self, key: &str) -> Option<String> {
        fs::read_to_string(self.key_path(key)).ok()
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), PlayerError> {
        fs::create_dir_all(&self.root)
            .map_err(|err| PlayerError::Storage(format!("{}: {err}", self.root.display())))?;
        let path = self.key_path(key);
        fs::write(&path, value)
            .map_err(|err| PlayerError::Storage(format!("{}: {err}", path.display())))
    }
}

#[derive(Default)]
pub struct MemoryStore {
    entries: HashMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KvStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), PlayerError> {
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn file_store_round_trip() {
        let dir = tempdir().expect("tempdir");
        let mut store = FileStore {
            root: dir.path().to_path_buf(),
        };

        assert!(store.get("playlist").is_none());
        store.set("playlist", "{\"tracks\":[]}").expect("set");
        assert_eq!(store.get("playlist").as_deref(), Some("{\"tracks\":[]}"));
    }

    // One test owns the env override; parallel writers to the same var
    // would race.
    #[test]
    fn config_root_override_works_before_the_dir_exists() {
        let dir = tempdir().expect("tempdir");
        let root = dir.path().join("not").join("yet").join("created");
        unsafe {
            env::set_var("MIXTAPE_CONFIG_DIR", root.to_string_lossy().as_ref());
        }

        assert_eq!(config_root().expect("config root"), root);

        // Opening the log must work on a fresh machine where nothing has
        // created the config dir yet.
        let file = open_log_file().expect("open log file");
        drop(file);
        assert!(root.join(LOG_FILE).exists());
    }

    #[test]
    fn memory_store_round_trip() {
        let mut store = MemoryStore::new();
        store.set("playlist", "x").expect("set");
        assert_eq!(store.get("playlist").as_deref(), Some("x"));
        assert!(store.get("other").is_none());
    }
}

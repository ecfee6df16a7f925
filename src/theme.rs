//! Persisted dark/light preference.
//!
//! The preference lives in a small string key-value file shared by every
//! client process. Changes made here are announced in-process through a
//! `watch` channel; changes made by another process are picked up by
//! re-reading the file.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::config::AppConfig;

pub const DARK_MODE_KEY: &str = "darkMode";

/// Durable string key-value storage backed by a JSON file
#[derive(Debug)]
pub struct LocalStorage {
    path: PathBuf,
    entries: BTreeMap<String, String>,
}

impl LocalStorage {
    pub fn default_path() -> Option<PathBuf> {
        AppConfig::project_dirs().map(|p| p.config_dir().join("local_storage.json"))
    }

    pub fn open(path: impl Into<PathBuf>) -> Result<Self, anyhow::Error> {
        let path = path.into();
        let entries = read_entries(&path)?;
        Ok(Self { path, entries })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    pub fn set(&mut self, key: &str, value: &str) -> Result<(), anyhow::Error> {
        self.entries.insert(key.to_string(), value.to_string());
        self.flush()
    }

    /// Re-read the file; returns the keys whose values changed.
    pub fn reload(&mut self) -> Result<Vec<String>, anyhow::Error> {
        let fresh = read_entries(&self.path)?;
        let mut changed: Vec<String> = fresh
            .iter()
            .filter(|(k, v)| self.entries.get(*k) != Some(*v))
            .map(|(k, _)| k.clone())
            .collect();
        changed.extend(
            self.entries
                .keys()
                .filter(|k| !fresh.contains_key(*k))
                .cloned(),
        );
        self.entries = fresh;
        Ok(changed)
    }

    fn flush(&self) -> Result<(), anyhow::Error> {
        if let Some(dir) = self.path.parent() {
            fs::create_dir_all(dir)?;
        }
        let content = serde_json::to_string_pretty(&self.entries)?;
        fs::write(&self.path, content)?;
        Ok(())
    }
}

fn read_entries(path: &Path) -> Result<BTreeMap<String, String>, anyhow::Error> {
    if !path.exists() {
        return Ok(BTreeMap::new());
    }
    let content = fs::read_to_string(path)?;
    if content.trim().is_empty() {
        return Ok(BTreeMap::new());
    }
    Ok(serde_json::from_str(&content)?)
}

/// Dark mode flag stored as `"true"` / `"false"` under [`DARK_MODE_KEY`]
pub struct ThemeStore {
    storage: LocalStorage,
    tx: watch::Sender<bool>,
}

impl ThemeStore {
    /// Dark mode is the default; an absent key is written as `"true"`.
    pub fn open(mut storage: LocalStorage) -> Result<Self, anyhow::Error> {
        if storage.get(DARK_MODE_KEY).is_none() {
            storage.set(DARK_MODE_KEY, "true")?;
        }
        let dark = storage.get(DARK_MODE_KEY) == Some("true");
        let (tx, _rx) = watch::channel(dark);
        Ok(Self { storage, tx })
    }

    pub fn is_dark(&self) -> bool {
        *self.tx.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.tx.subscribe()
    }

    pub fn set_dark(&mut self, dark: bool) -> Result<(), anyhow::Error> {
        self.storage
            .set(DARK_MODE_KEY, if dark { "true" } else { "false" })?;
        self.tx.send_replace(dark);
        Ok(())
    }

    pub fn toggle(&mut self) -> Result<bool, anyhow::Error> {
        let dark = !self.is_dark();
        self.set_dark(dark)?;
        Ok(dark)
    }

    /// Pick up a change written by another process. Returns true if the
    /// preference changed.
    pub fn sync_from_storage(&mut self) -> Result<bool, anyhow::Error> {
        let changed = self.storage.reload()?;
        if !changed.iter().any(|k| k == DARK_MODE_KEY) {
            return Ok(false);
        }
        let dark = self.storage.get(DARK_MODE_KEY) == Some("true");
        if dark == self.is_dark() {
            return Ok(false);
        }
        debug!(dark, "theme changed in storage");
        self.tx.send_replace(dark);
        Ok(true)
    }
}

/// Periodically re-read storage so other processes' changes propagate.
pub fn spawn_storage_sync(theme: Arc<Mutex<ThemeStore>>, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        loop {
            ticker.tick().await;
            let result = match theme.lock() {
                Ok(mut guard) => guard.sync_from_storage(),
                Err(_) => break,
            };
            if let Err(e) = result {
                warn!("theme storage sync failed: {}", e);
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_to_dark_and_persists_default() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("local_storage.json");
        let theme = ThemeStore::open(LocalStorage::open(&path).unwrap()).unwrap();
        assert!(theme.is_dark());

        let reopened = LocalStorage::open(&path).unwrap();
        assert_eq!(reopened.get(DARK_MODE_KEY), Some("true"));
    }

    #[test]
    fn test_toggle_persists_and_notifies() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("local_storage.json");
        let mut theme = ThemeStore::open(LocalStorage::open(&path).unwrap()).unwrap();
        let rx = theme.subscribe();

        assert!(!theme.toggle().unwrap());
        assert!(!*rx.borrow());
        assert!(rx.has_changed().unwrap());
        assert_eq!(
            LocalStorage::open(&path).unwrap().get(DARK_MODE_KEY),
            Some("false")
        );
    }

    #[test]
    fn test_external_change_is_synced() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("local_storage.json");
        let mut ours = ThemeStore::open(LocalStorage::open(&path).unwrap()).unwrap();
        let mut theirs = ThemeStore::open(LocalStorage::open(&path).unwrap()).unwrap();

        theirs.set_dark(false).unwrap();
        assert!(ours.is_dark());
        assert!(ours.sync_from_storage().unwrap());
        assert!(!ours.is_dark());
        assert!(!ours.sync_from_storage().unwrap());
    }
}

//! INI-backed key/value settings.
//!
//! Small persisted state the core reads and writes through plain get/set
//! semantics: the last used router kind and the routing-disclaimer flag.
//! Changes are written back to disk immediately; the in-memory constructor
//! backs tests and simulations.

use std::path::{Path, PathBuf};
use std::sync::RwLock;

use ini::Ini;
use thiserror::Error;
use tracing::debug;

/// Well-known sections and keys.
pub mod keys {
    pub const SECTION_ROUTING: &str = "routing";
    pub const KEY_LAST_ROUTER: &str = "last_router";
    pub const KEY_DISCLAIMER_ACCEPTED: &str = "disclaimer_accepted";
}

/// Errors from loading or persisting settings.
#[derive(Debug, Error)]
pub enum SettingsError {
    /// The settings file exists but could not be read or parsed.
    #[error("failed to load settings: {0}")]
    Load(#[from] ini::Error),
    /// The settings file could not be written.
    #[error("failed to write settings: {0}")]
    Write(#[from] std::io::Error),
}

/// Key/value settings store.
pub struct Settings {
    path: Option<PathBuf>,
    doc: RwLock<Ini>,
}

impl Settings {
    /// Load settings from `path`, starting empty if the file does not exist.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, SettingsError> {
        let path = path.as_ref();
        let doc = if path.exists() {
            Ini::load_from_file(path)?
        } else {
            Ini::new()
        };
        Ok(Self {
            path: Some(path.to_path_buf()),
            doc: RwLock::new(doc),
        })
    }

    /// An in-memory store that never touches disk.
    pub fn in_memory() -> Self {
        Self {
            path: None,
            doc: RwLock::new(Ini::new()),
        }
    }

    /// Read a value.
    pub fn get(&self, section: &str, key: &str) -> Option<String> {
        self.doc
            .read()
            .ok()
            .and_then(|doc| doc.get_from(Some(section), key).map(str::to_owned))
    }

    /// Write a value and persist.
    pub fn set(&self, section: &str, key: &str, value: &str) -> Result<(), SettingsError> {
        {
            let Ok(mut doc) = self.doc.write() else {
                return Ok(());
            };
            doc.set_to(Some(section), key.to_owned(), value.to_owned());
        }
        debug!(section, key, value, "setting updated");
        self.persist()
    }

    /// Read a boolean, treating anything but `"true"` as false.
    pub fn get_bool(&self, section: &str, key: &str) -> bool {
        self.get(section, key).as_deref() == Some("true")
    }

    /// Write a boolean and persist.
    pub fn set_bool(&self, section: &str, key: &str, value: bool) -> Result<(), SettingsError> {
        self.set(section, key, if value { "true" } else { "false" })
    }

    fn persist(&self) -> Result<(), SettingsError> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let Ok(doc) = self.doc.read() else {
            return Ok(());
        };
        doc.write_to_file(path)?;
        Ok(())
    }
}

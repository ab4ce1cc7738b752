//! Persisted configuration.

pub mod settings;

pub use settings::{keys, Settings, SettingsError};

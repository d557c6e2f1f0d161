//! # strand-settings
//!
//! Layered configuration for the strand event store.
//!
//! Settings are loaded from three layers (in priority order):
//! 1. **Compiled defaults**: [`StrandSettings::default()`]
//! 2. **Settings file**: `~/.strand/settings.json`, deep-merged over defaults
//! 3. **Environment variables**: `STRAND_*` overrides (highest priority)

#![deny(unsafe_code)]

pub mod errors;
pub mod loader;
pub mod types;

pub use errors::{Result, SettingsError};
pub use loader::{
    deep_merge, load_settings, load_settings_from_path, load_settings_with_env, settings_path,
    strand_home,
};
pub use types::{DatabaseSettings, LoggingSettings, StrandSettings};

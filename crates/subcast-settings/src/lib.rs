//! # subcast-settings
//!
//! Configuration management with layered sources for the subcast relay.
//!
//! Settings are loaded from three layers (in priority order):
//! 1. **Compiled defaults** — [`SubcastSettings::default()`]
//! 2. **User file** — `~/.subcast/settings.json` (deep-merged over defaults)
//! 3. **Environment variables** — `SUBCAST_*` overrides (highest priority)
//!
//! CLI flags are applied on top by the binary and win over all three layers.

#![deny(unsafe_code)]

pub mod errors;
pub mod loader;
pub mod types;

pub use errors::{Result, SettingsError};
pub use loader::{deep_merge, load_settings, load_settings_from_path, parse_port, settings_path};
pub use types::{BusSettings, LoggingSettings, ServerSettings, SubcastSettings};

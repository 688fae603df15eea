//! Configuration management.
//!
//! TOML-based configuration with one table per concern, atomic writes and
//! section-level updates.
//!
//! # Example
//!
//! ```no_run
//! use rhythmc_core::config::{ConfigManager, ConfigSection};
//!
//! let mut config = ConfigManager::new(".config/rhythmc.toml");
//! config.load_or_create().unwrap();
//!
//! config.settings_mut().backend.base_url = "https://packs.example".into();
//! config.update_section(ConfigSection::Backend).unwrap();
//! ```

mod manager;
mod settings;

pub use manager::{ConfigError, ConfigManager, ConfigResult};
pub use settings::{
    BackendSettings, ConfigSection, EngineSettings, IdentifierSettings, LoggingSettings,
    PathSettings, Settings,
};

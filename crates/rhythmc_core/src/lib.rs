//! RhythMC pack builder core.
//!
//! Turns an audio file into Minecraft resource packs (one full pack plus
//! one charter pack per segment), uploads them and returns the identifier
//! used in-game with `/editor create`.

pub mod archive;
pub mod config;
pub mod engine;
pub mod identifier;
pub mod logging;
pub mod models;
pub mod orchestrator;
pub mod pack;
pub mod upload;

/// Returns the crate version.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

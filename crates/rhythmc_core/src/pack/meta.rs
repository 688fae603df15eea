//! `pack.mcmeta` generation.

use bytes::Bytes;
use serde::Serialize;

pub const PACK_FORMAT: u32 = 22;
pub const MAX_SUPPORTED_FORMAT: u32 = 99;

#[derive(Debug, Serialize)]
struct PackMeta<'a> {
    pack: PackSection<'a>,
}

#[derive(Debug, Serialize)]
struct PackSection<'a> {
    pack_format: u32,
    description: &'a str,
    supported_formats: SupportedFormats,
}

#[derive(Debug, Serialize)]
struct SupportedFormats {
    min_inclusive: u32,
    max_inclusive: u32,
}

/// Description line shown in the in-game pack list.
pub fn pack_description(song_name: &str, composer_name: &str) -> String {
    format!(
        "§bRhythMC §3韵律方块 §6音乐资源包\n§c§o{} §f- §e{}",
        song_name, composer_name
    )
}

/// Serialize the metadata file: two-space indented JSON, UTF-8.
pub fn pack_meta(song_name: &str, composer_name: &str) -> Bytes {
    let description = pack_description(song_name, composer_name);
    let meta = PackMeta {
        pack: PackSection {
            pack_format: PACK_FORMAT,
            description: &description,
            supported_formats: SupportedFormats {
                min_inclusive: PACK_FORMAT,
                max_inclusive: MAX_SUPPORTED_FORMAT,
            },
        },
    };
    // Plain structs of strings and integers always serialize.
    let json = serde_json::to_string_pretty(&meta).unwrap_or_default();
    Bytes::from(json)
}

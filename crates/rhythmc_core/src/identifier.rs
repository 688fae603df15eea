//! Result identifier encoding.
//!
//! The identifier is what players paste into `/editor create <id>`. It is a
//! colon-delimited string; free-text fields are standard padded base64 of
//! their UTF-8 bytes, so the delimiter can never appear inside a field.
//!
//! ```text
//! song           <hash>:<ticks>:<b64 song>
//! song-composer  <hash>:<ticks>:<b64 song>:<b64 composer>
//! ```

use std::fmt;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use thiserror::Error;

const DELIMITER: char = ':';

#[derive(Error, Debug, PartialEq, Eq)]
pub enum IdentifierError {
    #[error("Cannot build identifier: {0} is missing")]
    MissingField(&'static str),

    #[error("Hash must not contain ':'")]
    DelimiterInHash,

    #[error("Expected {expected} fields for schema '{schema}', found {found}")]
    FieldCount {
        schema: IdentifierSchema,
        expected: usize,
        found: usize,
    },

    #[error("Invalid tick count '{0}'")]
    InvalidTicks(String),

    #[error("Field '{field}' is not valid base64: {message}")]
    InvalidBase64 { field: &'static str, message: String },

    #[error("Field '{0}' is not valid UTF-8")]
    InvalidUtf8(&'static str),
}

pub type IdentifierResult<T> = Result<T, IdentifierError>;

/// Which name fields the identifier carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum IdentifierSchema {
    /// `<hash>:<ticks>:<song>`
    #[default]
    Song,
    /// `<hash>:<ticks>:<song>:<composer>`
    SongComposer,
}

impl IdentifierSchema {
    pub fn field_count(&self) -> usize {
        match self {
            IdentifierSchema::Song => 3,
            IdentifierSchema::SongComposer => 4,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            IdentifierSchema::Song => "song",
            IdentifierSchema::SongComposer => "song-composer",
        }
    }
}

impl fmt::Display for IdentifierSchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for IdentifierSchema {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "song" => Ok(IdentifierSchema::Song),
            "song-composer" => Ok(IdentifierSchema::SongComposer),
            other => Err(format!(
                "unknown identifier schema '{other}' (expected 'song' or 'song-composer')"
            )),
        }
    }
}

/// Decoded identifier contents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedIdentifier {
    pub hash: String,
    pub duration_ticks: u64,
    pub song_name: String,
    /// Present only for [`IdentifierSchema::SongComposer`].
    pub composer_name: Option<String>,
}

/// Build the identifier string.
pub fn encode(
    schema: IdentifierSchema,
    hash: &str,
    duration_ticks: u64,
    song_name: &str,
    composer_name: &str,
) -> IdentifierResult<String> {
    if hash.is_empty() {
        return Err(IdentifierError::MissingField("hash"));
    }
    if hash.contains(DELIMITER) {
        return Err(IdentifierError::DelimiterInHash);
    }
    if song_name.is_empty() {
        return Err(IdentifierError::MissingField("song name"));
    }
    if composer_name.is_empty() {
        return Err(IdentifierError::MissingField("composer name"));
    }

    let mut fields = vec![
        hash.to_string(),
        duration_ticks.to_string(),
        STANDARD.encode(song_name.as_bytes()),
    ];
    if schema == IdentifierSchema::SongComposer {
        fields.push(STANDARD.encode(composer_name.as_bytes()));
    }

    Ok(fields.join(&DELIMITER.to_string()))
}

/// Parse an identifier produced with `schema`.
///
/// Only the given schema is accepted; a string with a different number of
/// fields is rejected rather than guessed at.
pub fn decode(schema: IdentifierSchema, identifier: &str) -> IdentifierResult<DecodedIdentifier> {
    let fields: Vec<&str> = identifier.trim().split(DELIMITER).collect();
    if fields.len() != schema.field_count() {
        return Err(IdentifierError::FieldCount {
            schema,
            expected: schema.field_count(),
            found: fields.len(),
        });
    }

    let hash = fields[0];
    if hash.is_empty() {
        return Err(IdentifierError::MissingField("hash"));
    }

    let duration_ticks = fields[1]
        .parse::<u64>()
        .map_err(|_| IdentifierError::InvalidTicks(fields[1].to_string()))?;

    let song_name = decode_text("song name", fields[2])?;
    let composer_name = match schema {
        IdentifierSchema::Song => None,
        IdentifierSchema::SongComposer => Some(decode_text("composer name", fields[3])?),
    };

    Ok(DecodedIdentifier {
        hash: hash.to_string(),
        duration_ticks,
        song_name,
        composer_name,
    })
}

fn decode_text(field: &'static str, value: &str) -> IdentifierResult<String> {
    let bytes = STANDARD
        .decode(value)
        .map_err(|e| IdentifierError::InvalidBase64 {
            field,
            message: e.to_string(),
        })?;
    String::from_utf8(bytes).map_err(|_| IdentifierError::InvalidUtf8(field))
}

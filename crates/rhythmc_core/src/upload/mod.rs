//! Pack upload client.
//!
//! The backend exposes three endpoints:
//!
//! | Request                     | Purpose                                   |
//! |-----------------------------|-------------------------------------------|
//! | `GET /api/verify`           | check an access key (200 = valid)         |
//! | `POST /api/texture/player`  | upload the full pack, returns its hash    |
//! | `POST /api/texture/charter` | upload one charter pack for that hash     |
//!
//! Every request carries the key in `X-Auth-Token`.

mod http;

use async_trait::async_trait;
use thiserror::Error;

use crate::models::ArchiveBlob;

pub use http::{HttpUploader, AUTH_HEADER, HASH_HEADER};

#[derive(Error, Debug)]
pub enum UploadError {
    #[error("An access key is required to upload packs")]
    MissingCredential,

    #[error("Access key was rejected (HTTP {status})")]
    Unauthorized { status: u16 },

    #[error("{endpoint} returned HTTP {status}: {body}")]
    Status {
        endpoint: String,
        status: u16,
        body: String,
    },

    #[error("Server returned an empty pack hash")]
    EmptyHash,

    #[error("Invalid backend URL '{url}': {message}")]
    InvalidUrl { url: String, message: String },

    #[error("Network error: {0}")]
    Transport(#[from] reqwest::Error),
}

pub type UploadResult<T> = Result<T, UploadError>;

#[async_trait]
pub trait PackUploader: Send + Sync {
    /// Succeeds only if the backend accepts `access_key`.
    async fn verify(&self, access_key: &str) -> UploadResult<()>;

    /// Upload the full pack and return the hash that identifies it.
    ///
    /// `part_count` is sent along when non-zero.
    async fn upload_full(
        &self,
        access_key: &str,
        archive: &ArchiveBlob,
        part_count: u32,
    ) -> UploadResult<String>;

    /// Upload one charter pack tagged with its part number and the full
    /// pack's hash.
    async fn upload_charter(
        &self,
        access_key: &str,
        archive: &ArchiveBlob,
        part: u32,
        hash: &str,
    ) -> UploadResult<()>;
}

//! Archive construction.
//!
//! [`ArchiveBuilder`] turns an in-memory [`Pack`] into an [`ArchiveBlob`].
//! Building is CPU-bound and synchronous; the orchestrator runs it on the
//! blocking pool.

mod zip_builder;

use thiserror::Error;

use crate::models::{ArchiveBlob, Pack};

pub use zip_builder::ZipArchiveBuilder;

#[derive(Error, Debug)]
pub enum ArchiveError {
    #[error("Zip error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Archive task for {name} did not complete: {message}")]
    TaskFailed { name: String, message: String },
}

pub type ArchiveResult<T> = Result<T, ArchiveError>;

/// Serializes a pack into archive bytes.
pub trait ArchiveBuilder: Send + Sync {
    fn build(&self, pack: &Pack, file_name: &str) -> ArchiveResult<ArchiveBlob>;
}

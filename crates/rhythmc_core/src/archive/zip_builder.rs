//! Zip implementation of [`ArchiveBuilder`].

use std::io::{Cursor, Write};

use bytes::Bytes;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, DateTime, ZipWriter};

use crate::models::{ArchiveBlob, Pack};

use super::{ArchiveBuilder, ArchiveResult};

/// Builds deflated zip archives with fixed entry timestamps.
///
/// Entries are written in path order and stamped with the zip epoch
/// (1980-01-01), so the same pack always yields the same bytes and digest.
#[derive(Debug, Clone, Copy)]
pub struct ZipArchiveBuilder {
    compression: CompressionMethod,
}

impl ZipArchiveBuilder {
    pub fn new() -> Self {
        Self {
            compression: CompressionMethod::Deflated,
        }
    }

    /// Store entries without compression.
    pub fn stored() -> Self {
        Self {
            compression: CompressionMethod::Stored,
        }
    }

    fn options(&self) -> SimpleFileOptions {
        SimpleFileOptions::default()
            .compression_method(self.compression)
            .last_modified_time(DateTime::default())
            .unix_permissions(0o644)
    }
}

impl Default for ZipArchiveBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ArchiveBuilder for ZipArchiveBuilder {
    fn build(&self, pack: &Pack, file_name: &str) -> ArchiveResult<ArchiveBlob> {
        let mut writer = ZipWriter::new(Cursor::new(Vec::with_capacity(pack.total_bytes())));
        let options = self.options();

        for (path, contents) in pack.files() {
            writer.start_file(path, options)?;
            writer.write_all(contents)?;
        }

        let data = writer.finish()?.into_inner();
        tracing::debug!(
            "Built {} ({} entries, {} bytes)",
            file_name,
            pack.len(),
            data.len()
        );
        Ok(ArchiveBlob::new(pack.kind(), file_name, Bytes::from(data)))
    }
}

//! Index-addressed segment sources and the fused stream over them.

use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;

use super::types::EngineResult;

/// Random access to the segments an engine produced.
///
/// `Ok(None)` means there is no segment at `index`; errors are genuine
/// failures.
#[async_trait]
pub trait SegmentSource: Send {
    async fn fetch(&mut self, index: u32) -> EngineResult<Option<Bytes>>;
}

/// Reads `segment000.ogg`, `segment001.ogg`, … from a directory.
#[derive(Debug, Clone)]
pub struct DirSegmentSource {
    dir: PathBuf,
}

impl DirSegmentSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// On-disk name of segment `index`.
    pub fn file_name(index: u32) -> String {
        format!("segment{:03}.ogg", index)
    }
}

#[async_trait]
impl SegmentSource for DirSegmentSource {
    async fn fetch(&mut self, index: u32) -> EngineResult<Option<Bytes>> {
        let path = self.dir.join(Self::file_name(index));
        match tokio::fs::read(&path).await {
            Ok(data) => Ok(Some(Bytes::from(data))),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

/// Segments held in memory, keyed by index.
#[derive(Debug, Clone, Default)]
pub struct MemorySegmentSource {
    segments: BTreeMap<u32, Bytes>,
}

impl MemorySegmentSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Segments at indices `0..n` in order.
    pub fn from_segments(segments: impl IntoIterator<Item = Bytes>) -> Self {
        Self {
            segments: (0u32..).zip(segments).collect(),
        }
    }

    pub fn insert(&mut self, index: u32, data: Bytes) {
        self.segments.insert(index, data);
    }
}

#[async_trait]
impl SegmentSource for MemorySegmentSource {
    async fn fetch(&mut self, index: u32) -> EngineResult<Option<Bytes>> {
        Ok(self.segments.get(&index).cloned())
    }
}

/// One segment with its zero-based index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    pub index: u32,
    pub data: Bytes,
}

impl Segment {
    /// Charter part number for this segment.
    pub fn part(&self) -> u32 {
        self.index + 1
    }
}

/// Pulls segments from index 0 upward until the source runs out.
///
/// Fused: after the first `Ok(None)` or error the source is never queried
/// again and every later call returns `Ok(None)`.
pub struct SegmentStream {
    source: Box<dyn SegmentSource>,
    next_index: u32,
    finished: bool,
}

impl SegmentStream {
    pub fn new(source: Box<dyn SegmentSource>) -> Self {
        Self {
            source,
            next_index: 0,
            finished: false,
        }
    }

    /// Number of segments yielded so far.
    pub fn yielded(&self) -> u32 {
        self.next_index
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub async fn next(&mut self) -> EngineResult<Option<Segment>> {
        if self.finished {
            return Ok(None);
        }

        let index = self.next_index;
        match self.source.fetch(index).await {
            Ok(Some(data)) => {
                self.next_index += 1;
                Ok(Some(Segment { index, data }))
            }
            Ok(None) => {
                self.finished = true;
                Ok(None)
            }
            Err(e) => {
                self.finished = true;
                Err(e)
            }
        }
    }
}

impl std::fmt::Debug for SegmentStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SegmentStream")
            .field("next_index", &self.next_index)
            .field("finished", &self.finished)
            .finish()
    }
}

//! Core data structures shared across the pipeline.

mod job;
mod pack;

pub use job::{
    duration_to_ticks, is_canonical_audio, JobRequest, CANONICAL_EXTENSION, TICKS_PER_SECOND,
};
pub use pack::{
    export_file_name, ArchiveBlob, Pack, PackKind, PackSet, CHARTER_AUDIO_PATH, FULL_AUDIO_PATH, META_PATH,
    THUMBNAIL_PATH,
};

//! Resource pack data structures.

use std::collections::BTreeMap;
use std::fmt;

use bytes::Bytes;

/// Audio path of the full pack (replaces the horse death sound).
pub const FULL_AUDIO_PATH: &str = "assets/minecraft/sounds/mob/horse/death.ogg";

/// Audio path of every charter pack (replaces the iron golem death sound).
pub const CHARTER_AUDIO_PATH: &str = "assets/minecraft/sounds/mob/irongolem/death.ogg";

pub const META_PATH: &str = "pack.mcmeta";

pub const THUMBNAIL_PATH: &str = "pack.png";

/// Name to save an archive under inside an export folder.
///
/// Path separators, characters most file systems reject, and control
/// characters become `_`, so the result never leaves the folder.
pub fn export_file_name(file_name: &str) -> String {
    file_name
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect()
}

/// Which variant of a pack this is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PackKind {
    /// The whole song.
    Full,
    /// One segment; parts are numbered from 1.
    Charter { part: u32 },
}

impl PackKind {
    /// Canonical path of the audio asset for this kind.
    pub fn audio_path(&self) -> &'static str {
        match self {
            PackKind::Full => FULL_AUDIO_PATH,
            PackKind::Charter { .. } => CHARTER_AUDIO_PATH,
        }
    }

    /// Archive file name: `<song>.zip` or `part-<N>.zip`.
    pub fn archive_name(&self, song_name: &str) -> String {
        match self {
            PackKind::Full => format!("{}.zip", song_name),
            PackKind::Charter { part } => format!("part-{}.zip", part),
        }
    }

    pub fn part(&self) -> Option<u32> {
        match self {
            PackKind::Full => None,
            PackKind::Charter { part } => Some(*part),
        }
    }
}

impl fmt::Display for PackKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PackKind::Full => write!(f, "full pack"),
            PackKind::Charter { part } => write!(f, "part-{}", part),
        }
    }
}

/// In-memory resource pack: archive path → file contents.
///
/// Paths are unique by construction; iteration is in path order so that
/// archives built from a pack are byte-for-byte reproducible.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pack {
    kind: PackKind,
    files: BTreeMap<String, Bytes>,
}

impl Pack {
    pub fn new(kind: PackKind) -> Self {
        Self {
            kind,
            files: BTreeMap::new(),
        }
    }

    pub fn kind(&self) -> PackKind {
        self.kind
    }

    /// Insert or replace a file.
    pub fn insert(&mut self, path: impl Into<String>, contents: Bytes) {
        self.files.insert(path.into(), contents);
    }

    pub fn get(&self, path: &str) -> Option<&Bytes> {
        self.files.get(path)
    }

    pub fn contains(&self, path: &str) -> bool {
        self.files.contains_key(path)
    }

    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.files.keys().map(String::as_str)
    }

    pub fn files(&self) -> impl Iterator<Item = (&str, &Bytes)> {
        self.files.iter().map(|(p, b)| (p.as_str(), b))
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// The audio asset at this pack's canonical path.
    pub fn audio(&self) -> Option<&Bytes> {
        self.files.get(self.kind.audio_path())
    }

    pub fn total_bytes(&self) -> usize {
        self.files.values().map(Bytes::len).sum()
    }
}

/// The full pack plus its charter packs in part order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackSet {
    full: Pack,
    charters: Vec<Pack>,
}

impl PackSet {
    pub fn new(full: Pack) -> Self {
        Self {
            full,
            charters: Vec::new(),
        }
    }

    /// Append the next charter pack.
    ///
    /// # Panics
    /// If the pack is not a charter or its part number is not the next
    /// dense part number. Parts are assigned by the assembler, so a
    /// mismatch is a programming error.
    pub fn push_charter(&mut self, pack: Pack) {
        let expected = self.charters.len() as u32 + 1;
        assert_eq!(
            pack.kind(),
            PackKind::Charter { part: expected },
            "charter packs must be appended in part order"
        );
        self.charters.push(pack);
    }

    pub fn full(&self) -> &Pack {
        &self.full
    }

    pub fn charters(&self) -> &[Pack] {
        &self.charters
    }

    pub fn charter_count(&self) -> usize {
        self.charters.len()
    }

    /// All packs: full first, then charters by part.
    pub fn iter(&self) -> impl Iterator<Item = &Pack> {
        std::iter::once(&self.full).chain(self.charters.iter())
    }
}

/// A zipped pack ready for upload or export.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveBlob {
    pub kind: PackKind,
    /// `<song>.zip` or `part-<N>.zip`.
    pub file_name: String,
    pub data: Bytes,
    /// Lowercase hex md5 of `data`.
    pub md5: String,
}

impl ArchiveBlob {
    pub fn new(kind: PackKind, file_name: impl Into<String>, data: Bytes) -> Self {
        let md5 = format!("{:x}", md5::compute(&data));
        Self {
            kind,
            file_name: file_name.into(),
            data,
            md5,
        }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

//! Pack assembly.

use bytes::Bytes;

use crate::models::{Pack, PackKind, META_PATH, THUMBNAIL_PATH};

use super::meta::pack_meta;

/// Shared inputs for every pack of one job.
#[derive(Debug, Clone)]
pub struct PackAssembler {
    meta: Bytes,
    thumbnail: Option<Bytes>,
}

impl PackAssembler {
    /// The metadata file is rendered once and shared by every pack, as is
    /// the thumbnail.
    pub fn new(song_name: &str, composer_name: &str, thumbnail: Option<Bytes>) -> Self {
        Self {
            meta: pack_meta(song_name, composer_name),
            thumbnail,
        }
    }

    pub fn has_thumbnail(&self) -> bool {
        self.thumbnail.is_some()
    }

    /// Build one pack around `audio`.
    pub fn assemble(&self, kind: PackKind, audio: Bytes) -> Pack {
        let mut pack = Pack::new(kind);
        pack.insert(kind.audio_path(), audio);
        pack.insert(META_PATH, self.meta.clone());
        if let Some(thumbnail) = &self.thumbnail {
            pack.insert(THUMBNAIL_PATH, thumbnail.clone());
        }
        pack
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CHARTER_AUDIO_PATH, FULL_AUDIO_PATH};

    fn assemble(kind: PackKind, audio: Bytes, song: &str, composer: &str, thumbnail: Option<Bytes>) -> Pack {
        PackAssembler::new(song, composer, thumbnail).assemble(kind, audio)
    }

    #[test]
    fn full_pack_without_thumbnail_has_two_files() {
        let pack = assemble(PackKind::Full, Bytes::from_static(b"ogg"), "Test", "Case", None);
        assert_eq!(pack.len(), 2);
        assert!(pack.contains(FULL_AUDIO_PATH));
        assert!(pack.contains(META_PATH));
        assert!(!pack.contains(THUMBNAIL_PATH));
    }

    #[test]
    fn charter_pack_uses_golem_path() {
        let pack = assemble(
            PackKind::Charter { part: 1 },
            Bytes::from_static(b"seg"),
            "Test",
            "Case",
            None,
        );
        assert_eq!(pack.get(CHARTER_AUDIO_PATH).unwrap().as_ref(), b"seg");
        assert!(!pack.contains(FULL_AUDIO_PATH));
    }

    #[test]
    fn thumbnail_is_shared_not_copied() {
        let thumb = Bytes::from(vec![0x89, b'P', b'N', b'G']);
        let assembler = PackAssembler::new("Test", "Case", Some(thumb.clone()));
        let full = assembler.assemble(PackKind::Full, Bytes::from_static(b"a"));
        let part = assembler.assemble(PackKind::Charter { part: 1 }, Bytes::from_static(b"b"));

        let a = full.get(THUMBNAIL_PATH).unwrap();
        let b = part.get(THUMBNAIL_PATH).unwrap();
        assert_eq!(a, &thumb);
        assert_eq!(a.as_ptr(), b.as_ptr());
    }
}

pub mod cover;
pub mod normalize;

use std::path::Path;

use lofty::prelude::*;
use lofty::tag::{ItemKey, Tag};
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::{MetadataOptions, MetadataRevision, StandardTagKey, StandardVisualKey};
use symphonia::core::probe::Hint;

use normalize::{clean_text, coerce_text, coerce_value_text};

/// Normalized metadata for a single track. Every text field is either
/// `None` or non-empty trimmed text; the comment often carries a Camelot
/// key token written by DJ tagging tools.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct TrackMetadata {
    pub artist: Option<String>,
    pub title: Option<String>,
    pub label: Option<String>,
    pub genre: Option<String>,
    pub bpm: Option<String>,
    pub comment: Option<String>,
    pub cover: Option<Vec<u8>>,
}

impl TrackMetadata {
    /// True when no strategy produced anything for this file.
    pub fn is_empty(&self) -> bool {
        !self.has_any_field() && self.cover.is_none()
    }

    fn has_any_field(&self) -> bool {
        self.artist.is_some()
            || self.title.is_some()
            || self.label.is_some()
            || self.genre.is_some()
            || self.bpm.is_some()
            || self.comment.is_some()
    }

    fn has_gaps(&self) -> bool {
        self.artist.is_none()
            || self.title.is_none()
            || self.label.is_none()
            || self.genre.is_none()
            || self.bpm.is_none()
            || self.comment.is_none()
            || self.cover.is_none()
    }

    /// Fill fields this record is missing from another extraction pass.
    fn merge_missing(&mut self, other: TrackMetadata) {
        self.artist = self.artist.take().or(other.artist);
        self.title = self.title.take().or(other.title);
        self.label = self.label.take().or(other.label);
        self.genre = self.genre.take().or(other.genre);
        self.bpm = self.bpm.take().or(other.bpm);
        self.comment = self.comment.take().or(other.comment);
        self.cover = self.cover.take().or(other.cover);
    }
}

/// Extract metadata for an audio file. Never fails: decode errors in either
/// strategy degrade to absent fields. Pure read — callers decide whether the
/// result is worth caching.
pub fn extract(path: &Path) -> TrackMetadata {
    let mut meta = match read_tagged(path) {
        Ok(meta) => meta,
        Err(e) => {
            log::debug!("Tag read failed for {}: {}", path.display(), e);
            TrackMetadata::default()
        }
    };

    // Second, independent decoder: fills whatever the first pass missed,
    // and is the only source when the container defeated lofty entirely.
    if meta.has_gaps() {
        match read_probed(path) {
            Ok(fallback) => meta.merge_missing(fallback),
            Err(e) => log::debug!("Probe metadata failed for {}: {}", path.display(), e),
        }
    }

    meta
}

/// Primary strategy: lofty's normalized tag view plus raw item scans.
fn read_tagged(path: &Path) -> Result<TrackMetadata, lofty::error::LoftyError> {
    let file = lofty::read_from_path(path)?;

    let mut meta = TrackMetadata::default();
    if let Some(tag) = file.primary_tag().or_else(|| file.first_tag()) {
        meta.artist = alias_text(tag, &[ItemKey::TrackArtist, ItemKey::AlbumArtist]);
        meta.title = alias_text(tag, &[ItemKey::TrackTitle]);
        meta.genre =
            alias_text(tag, &[ItemKey::Genre]).or_else(|| raw_text(tag, &["TCON", "GENRE"]));
        meta.bpm = alias_text(tag, &[ItemKey::IntegerBpm, ItemKey::Bpm])
            .or_else(|| raw_text(tag, &["TBPM", "BPM", "bpm"]));
        meta.label = alias_text(tag, &[ItemKey::Label, ItemKey::Publisher]).or_else(|| {
            raw_text(tag, &["ORGANIZATION", "organization", "PUBLISHER", "TPUB"])
        });
    }

    meta.comment = cover::find_comment(&file);
    meta.cover = cover::find_cover(&file);
    Ok(meta)
}

/// First non-empty value among the given logical keys.
fn alias_text(tag: &Tag, keys: &[ItemKey]) -> Option<String> {
    keys.iter()
        .find_map(|key| tag.get_string(key).and_then(clean_text))
}

/// First raw item whose unrecognized key matches one of `names`.
fn raw_text(tag: &Tag, names: &[&str]) -> Option<String> {
    names.iter().find_map(|name| {
        tag.items().find_map(|item| match item.key() {
            ItemKey::Unknown(key) if key.as_str() == *name => coerce_text(item.value()),
            _ => None,
        })
    })
}

/// Fallback strategy: probe the container with symphonia and read its
/// metadata revisions (container-level first, then format-level).
fn read_probed(path: &Path) -> Result<TrackMetadata, symphonia::core::errors::Error> {
    let file = std::fs::File::open(path)?;
    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(ext);
    }

    let mut probed = symphonia::default::get_probe().format(
        &hint,
        mss,
        &FormatOptions::default(),
        &MetadataOptions::default(),
    )?;

    let mut meta = TrackMetadata::default();
    if let Some(container_meta) = probed.metadata.get() {
        if let Some(revision) = container_meta.current() {
            meta.merge_missing(revision_metadata(revision));
        }
    }
    if let Some(revision) = probed.format.metadata().current() {
        meta.merge_missing(revision_metadata(revision));
    }
    Ok(meta)
}

fn revision_metadata(revision: &MetadataRevision) -> TrackMetadata {
    let mut meta = TrackMetadata::default();

    for tag in revision.tags() {
        let value = || coerce_value_text(&tag.value);
        match tag.std_key {
            Some(StandardTagKey::Artist) | Some(StandardTagKey::AlbumArtist) => {
                if meta.artist.is_none() {
                    meta.artist = value();
                }
            }
            Some(StandardTagKey::TrackTitle) => {
                if meta.title.is_none() {
                    meta.title = value();
                }
            }
            Some(StandardTagKey::Genre) => {
                if meta.genre.is_none() {
                    meta.genre = value();
                }
            }
            Some(StandardTagKey::Bpm) => {
                if meta.bpm.is_none() {
                    meta.bpm = value();
                }
            }
            Some(StandardTagKey::Label) => {
                if meta.label.is_none() {
                    meta.label = value();
                }
            }
            Some(StandardTagKey::Comment) => {
                if meta.comment.is_none() {
                    meta.comment = value();
                }
            }
            _ => {}
        }
    }

    let visual = revision
        .visuals()
        .iter()
        .find(|v| v.usage == Some(StandardVisualKey::FrontCover))
        .or_else(|| revision.visuals().first());
    if let Some(visual) = visual {
        if !visual.data.is_empty() {
            meta.cover = Some(visual.data.to_vec());
        }
    }

    meta
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_byte_file_extracts_to_all_none() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("silence.mp3");
        std::fs::write(&path, b"").unwrap();

        let meta = extract(&path);
        assert!(meta.is_empty());
        assert_eq!(meta, TrackMetadata::default());
    }

    #[test]
    fn garbage_container_extracts_to_all_none() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("noise.flac");
        std::fs::write(&path, [0x00, 0x01, 0x02, 0x03, 0xFF, 0xFE]).unwrap();

        let meta = extract(&path);
        assert!(meta.is_empty());
    }

    #[test]
    fn missing_file_extracts_to_all_none() {
        let meta = extract(Path::new("/nonexistent/track.ogg"));
        assert!(meta.is_empty());
    }

    #[test]
    fn merge_missing_keeps_existing_fields() {
        let mut meta = TrackMetadata {
            artist: Some("Daft Punk".into()),
            ..Default::default()
        };
        meta.merge_missing(TrackMetadata {
            artist: Some("wrong".into()),
            title: Some("Digital Love".into()),
            ..Default::default()
        });
        assert_eq!(meta.artist.as_deref(), Some("Daft Punk"));
        assert_eq!(meta.title.as_deref(), Some("Digital Love"));
    }

    #[test]
    fn alias_chain_takes_first_non_empty() {
        let mut tag = Tag::new(lofty::tag::TagType::Id3v2);
        tag.insert_text(ItemKey::AlbumArtist, "Various".to_string());
        assert_eq!(
            alias_text(&tag, &[ItemKey::TrackArtist, ItemKey::AlbumArtist]),
            Some("Various".to_string())
        );
    }

    #[test]
    fn raw_keys_cover_format_specific_frames() {
        let mut tag = Tag::new(lofty::tag::TagType::VorbisComments);
        tag.push_unchecked(lofty::tag::TagItem::new(
            ItemKey::Unknown("ORGANIZATION".to_string()),
            lofty::tag::ItemValue::Text("Warp Records".to_string()),
        ));
        assert_eq!(
            raw_text(&tag, &["ORGANIZATION", "organization"]),
            Some("Warp Records".to_string())
        );
        assert_eq!(raw_text(&tag, &["TPUB"]), None);
    }
}

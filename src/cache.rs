//! Durable per-track cache: one JSON document mapping resolved absolute
//! paths to extracted tag fields and waveform envelopes, fingerprinted by
//! file modification time. A fingerprint mismatch invalidates the whole
//! entry — metadata and waveform always live and die together.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::{Deserialize, Serialize};

use crate::tags::TrackMetadata;

/// Longest side of a stored cover thumbnail, in pixels.
const THUMBNAIL_MAX_DIM: u32 = 128;
const THUMBNAIL_JPEG_QUALITY: u8 = 80;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
struct CacheEntry {
    mtime_ns: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    artist: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    genre: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    bpm: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    comments: Option<String>,
    /// Base64 JPEG thumbnail, never the original embedded bytes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    cover_data: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    waveform: Option<Vec<f32>>,
}

/// Summary counters for the `stats` subcommand.
pub struct CacheStats {
    pub entries: usize,
    pub with_waveform: usize,
    pub with_cover: usize,
}

/// In-memory cache with lazy durability: mutations set a dirty flag and
/// `flush` persists only when something changed. The scanner owns exactly
/// one of these and threads it through extraction calls.
pub struct TrackCache {
    path: PathBuf,
    entries: HashMap<String, CacheEntry>,
    dirty: bool,
}

impl TrackCache {
    /// Load the cache document at `path`. A missing or unparseable file
    /// yields an empty cache — worst case we re-extract everything.
    pub fn open(path: &Path) -> Self {
        let entries = match std::fs::read_to_string(path) {
            Ok(contents) => match serde_json::from_str(&contents) {
                Ok(entries) => entries,
                Err(e) => {
                    log::warn!(
                        "Discarding corrupt cache {}: {}",
                        path.display(),
                        e
                    );
                    HashMap::new()
                }
            },
            Err(e) => {
                log::debug!("No cache at {}: {}", path.display(), e);
                HashMap::new()
            }
        };
        Self {
            path: path.to_path_buf(),
            entries,
            dirty: false,
        }
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entries: self.entries.len(),
            with_waveform: self.entries.values().filter(|e| e.waveform.is_some()).count(),
            with_cover: self.entries.values().filter(|e| e.cover_data.is_some()).count(),
        }
    }

    /// Cached metadata for `path`, or `None` on any kind of miss: no entry,
    /// stale fingerprint, or unreachable file. Callers can't (and shouldn't)
    /// tell those apart.
    pub fn get(&self, path: &Path) -> Option<TrackMetadata> {
        let entry = self.valid_entry(path)?;
        Some(TrackMetadata {
            artist: entry.artist.clone(),
            title: entry.title.clone(),
            label: entry.label.clone(),
            genre: entry.genre.clone(),
            bpm: entry.bpm.clone(),
            comment: entry.comments.clone(),
            cover: entry
                .cover_data
                .as_deref()
                .and_then(|data| BASE64.decode(data).ok()),
        })
    }

    /// Store extracted metadata under the file's current fingerprint. Cover
    /// art is shrunk to a thumbnail first; if the image data won't decode,
    /// the entry simply has no cover. A file we can't fingerprint is not
    /// stored at all — there would be nothing to validate a later read
    /// against.
    pub fn put_metadata(&mut self, path: &Path, meta: &TrackMetadata) {
        let Some(fingerprint) = fingerprint(path) else {
            log::debug!("Not caching unreachable file {}", path.display());
            return;
        };
        let entry = self.entries.entry(cache_key(path)).or_default();
        if entry.mtime_ns != fingerprint {
            // The waveform belongs to the previous generation of the file.
            entry.waveform = None;
        }
        entry.mtime_ns = fingerprint;
        entry.artist = meta.artist.clone();
        entry.title = meta.title.clone();
        entry.label = meta.label.clone();
        entry.genre = meta.genre.clone();
        entry.bpm = meta.bpm.clone();
        entry.comments = meta.comment.clone();
        entry.cover_data = meta.cover.as_deref().and_then(encode_thumbnail);
        self.dirty = true;
    }

    /// Cached waveform for `path`, validated by the same fingerprint as the
    /// metadata fields.
    pub fn get_waveform(&self, path: &Path) -> Option<Vec<f32>> {
        self.valid_entry(path)?.waveform.clone()
    }

    /// Store a waveform envelope. If the entry is stale (or absent), the
    /// old metadata fields are dropped rather than mixed into the new
    /// generation.
    pub fn put_waveform(&mut self, path: &Path, waveform: &[f32]) {
        let Some(fingerprint) = fingerprint(path) else {
            log::debug!("Not caching unreachable file {}", path.display());
            return;
        };
        let entry = self.entries.entry(cache_key(path)).or_default();
        if entry.mtime_ns != fingerprint {
            *entry = CacheEntry {
                mtime_ns: fingerprint,
                ..CacheEntry::default()
            };
        }
        entry.waveform = Some(waveform.to_vec());
        self.dirty = true;
    }

    /// Persist to disk if anything changed since the last flush. Write
    /// failures keep the dirty flag set so a later flush retries; the
    /// in-memory state stays authoritative for the session either way.
    pub fn flush(&mut self) {
        if !self.dirty {
            return;
        }
        let json = match serde_json::to_string(&self.entries) {
            Ok(json) => json,
            Err(e) => {
                log::warn!("Could not serialize cache: {e}");
                return;
            }
        };
        match std::fs::write(&self.path, json) {
            Ok(()) => self.dirty = false,
            Err(e) => log::warn!("Could not write cache {}: {}", self.path.display(), e),
        }
    }

    fn valid_entry(&self, path: &Path) -> Option<&CacheEntry> {
        let fingerprint = fingerprint(path)?;
        let entry = self.entries.get(&cache_key(path))?;
        if entry.mtime_ns == fingerprint {
            Some(entry)
        } else {
            None
        }
    }
}

/// Nanosecond-precision modification time. `None` for unreachable files or
/// mtimes before the epoch — both make the file uncacheable.
fn fingerprint(path: &Path) -> Option<u64> {
    let modified = std::fs::metadata(path).ok()?.modified().ok()?;
    let nanos = modified.duration_since(UNIX_EPOCH).ok()?.as_nanos();
    u64::try_from(nanos).ok()
}

/// Resolved absolute path string used as the cache key. Falls back to the
/// given path when resolution fails (vanished file) so lookups stay
/// consistent within a session.
fn cache_key(path: &Path) -> String {
    path.canonicalize()
        .unwrap_or_else(|_| path.to_path_buf())
        .to_string_lossy()
        .into_owned()
}

/// Re-encode cover art as a bounded-size JPEG thumbnail, base64 for the
/// JSON document. Corrupt image data yields `None` rather than an error.
fn encode_thumbnail(cover: &[u8]) -> Option<String> {
    let img = match image::load_from_memory(cover) {
        Ok(img) => img,
        Err(e) => {
            log::debug!("Cover art won't decode, skipping thumbnail: {e}");
            return None;
        }
    };
    let thumb = img.thumbnail(THUMBNAIL_MAX_DIM, THUMBNAIL_MAX_DIM);
    // JPEG has no alpha; flatten before encoding.
    let rgb = image::DynamicImage::ImageRgb8(thumb.to_rgb8());

    let mut buf = Vec::new();
    let encoder =
        image::codecs::jpeg::JpegEncoder::new_with_quality(&mut buf, THUMBNAIL_JPEG_QUALITY);
    if let Err(e) = rgb.write_with_encoder(encoder) {
        log::debug!("Thumbnail encode failed: {e}");
        return None;
    }
    Some(BASE64.encode(&buf))
}

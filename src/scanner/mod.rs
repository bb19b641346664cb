use std::path::{Path, PathBuf};

use thiserror::Error;
use walkdir::WalkDir;

use crate::SUPPORTED_EXTENSIONS;
use crate::cache::TrackCache;
use crate::progress::ProgressHandle;
use crate::tags::{self, TrackMetadata};

#[derive(Error, Debug)]
pub enum ScanError {
    #[error("not a directory: {0}")]
    NotADirectory(PathBuf),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// One row of the library: where the file lives and what we know about it.
pub struct Track {
    pub path: PathBuf,
    pub meta: TrackMetadata,
}

pub struct ScanOutcome {
    /// Tracks in deterministic (case-insensitive file name) order. On a
    /// cancelled scan this holds the rows collected so far.
    pub tracks: Vec<Track>,
    pub cached: u64,
    pub extracted: u64,
    pub skipped: u64,
    pub cancelled: bool,
}

/// Walk `root` and assemble the track list, serving metadata from the cache
/// where fingerprints still match and extracting (then caching) everywhere
/// else. Cancellation is polled once per file; the cache is flushed before
/// returning, cancelled or not.
pub fn scan(
    root: &Path,
    cache: &mut TrackCache,
    progress: &dyn ProgressHandle,
    force: bool,
) -> Result<ScanOutcome, ScanError> {
    if !root.is_dir() {
        return Err(ScanError::NotADirectory(root.to_path_buf()));
    }

    let files = collect_audio_files(root);
    progress.set_total(files.len() as u64);

    let mut outcome = ScanOutcome {
        tracks: Vec::with_capacity(files.len()),
        cached: 0,
        extracted: 0,
        skipped: 0,
        cancelled: false,
    };

    for path in files {
        if progress.is_cancelled() {
            log::info!("Scan cancelled after {} tracks", outcome.tracks.len());
            outcome.cancelled = true;
            break;
        }

        // Files can vanish between the walk and the read.
        if !path.is_file() {
            log::debug!("Skipping vanished file {}", path.display());
            outcome.skipped += 1;
            progress.advance(1);
            continue;
        }

        let cached_meta = if force { None } else { cache.get(&path) };
        let meta = match cached_meta {
            Some(meta) => {
                outcome.cached += 1;
                meta
            }
            None => {
                let meta = tags::extract(&path);
                cache.put_metadata(&path, &meta);
                outcome.extracted += 1;
                meta
            }
        };

        outcome.tracks.push(Track { path, meta });
        progress.advance(1);
    }

    cache.flush();
    Ok(outcome)
}

/// Recursively collect supported audio files, sorted case-insensitively by
/// file name (ties broken by full path) for a stable presentation order.
fn collect_audio_files(root: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = WalkDir::new(root)
        .follow_links(true)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| e.into_path())
        .filter(|p| is_supported(p))
        .collect();

    files.sort_by_key(|path| {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_lowercase())
            .unwrap_or_default();
        (name, path.clone())
    });
    files
}

fn is_supported(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|ext| SUPPORTED_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
        .unwrap_or(false)
}

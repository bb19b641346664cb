pub mod cache;
pub mod camelot;
pub mod config;
pub mod progress;
pub mod scanner;
pub mod tags;
pub mod waveform;

/// Audio file extensions we support
pub const SUPPORTED_EXTENSIONS: &[&str] = &["mp3", "flac", "wav", "m4a", "ogg", "aac"];

/// Durable cache file name, resolved against the working directory
pub const CACHE_FILE_NAME: &str = "saio_music_cache.json";

/// Settings file name, resolved against the working directory
pub const SETTINGS_FILE_NAME: &str = "saio_music.cfg";

/// Default number of waveform bars for the track inspector
pub const DEFAULT_BAR_COUNT: usize = 320;

/// Application name
pub const APP_NAME: &str = "saio-music";

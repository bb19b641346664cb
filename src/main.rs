use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;

use saio_music::cache::TrackCache;
use saio_music::camelot::{self, CamelotKey};
use saio_music::config::Settings;
use saio_music::progress::ProgressHandle;
use saio_music::scanner::{self, Track};
use saio_music::{tags, waveform};

#[derive(Parser)]
#[command(
    name = "saio-music",
    version,
    about = "Music library browser and DJ track inspector"
)]
struct Cli {
    /// Path to the cache file (defaults to ./saio_music_cache.json)
    #[arg(long, global = true)]
    cache_path: Option<PathBuf>,

    /// Verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scan a directory and list its tracks
    Scan {
        /// Directory to scan (defaults to the last scanned directory)
        dir: Option<PathBuf>,

        /// Only show tracks in this Camelot key (e.g. 8A)
        #[arg(long)]
        key: Option<String>,

        /// With --key, also show harmonically compatible tracks
        #[arg(long, requires = "key")]
        compatible: bool,

        /// Re-extract metadata even for unchanged files
        #[arg(long)]
        force: bool,
    },

    /// Show extracted metadata for a single file
    Inspect {
        /// Audio file to inspect
        file: PathBuf,
    },

    /// Build and render a waveform envelope for a file
    Waveform {
        /// Audio file to render
        file: PathBuf,

        /// Number of amplitude bars
        #[arg(long, default_value_t = saio_music::DEFAULT_BAR_COUNT)]
        bars: usize,
    },

    /// Show cache statistics
    Stats,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    let log_level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level))
        .format_timestamp(None)
        .init();

    let cache_path = cli
        .cache_path
        .clone()
        .unwrap_or_else(|| PathBuf::from(saio_music::CACHE_FILE_NAME));

    match cli.command {
        Commands::Scan {
            dir,
            key,
            compatible,
            force,
        } => {
            let settings_path = PathBuf::from(saio_music::SETTINGS_FILE_NAME);
            let mut settings = Settings::load(&settings_path);

            let root = dir
                .or_else(|| settings.last_directory.clone())
                .unwrap_or_else(|| PathBuf::from("."));

            let key_filter = match key.as_deref() {
                Some(text) => Some(
                    camelot::parse_key(text)
                        .with_context(|| format!("\"{text}\" is not a Camelot key (1A-12B)"))?,
                ),
                None => None,
            };

            let mut cache = TrackCache::open(&cache_path);
            let bar = CliProgress::scan_bar();
            let outcome = scanner::scan(&root, &mut cache, &bar, force).context("Scan failed")?;
            bar.finish();

            settings.last_directory = Some(root.clone());
            settings.save(&settings_path);

            let tracks: Vec<&Track> = outcome
                .tracks
                .iter()
                .filter(|t| match &key_filter {
                    None => true,
                    Some(wanted) => track_key(t).is_some_and(|k| {
                        if compatible {
                            wanted.is_compatible(&k)
                        } else {
                            *wanted == k
                        }
                    }),
                })
                .collect();

            print_track_table(&tracks);
            println!();
            if let Some(wanted) = &key_filter {
                println!(
                    "{} of {} tracks in {}{}",
                    tracks.len(),
                    outcome.tracks.len(),
                    wanted,
                    if compatible { " (or compatible)" } else { "" }
                );
            }
            println!(
                "Scan complete: {} tracks ({} cached, {} extracted, {} skipped){}",
                outcome.tracks.len(),
                outcome.cached,
                outcome.extracted,
                outcome.skipped,
                if outcome.cancelled { " — cancelled" } else { "" }
            );
        }

        Commands::Inspect { file } => {
            anyhow::ensure!(file.is_file(), "No such file: {}", file.display());
            let meta = tags::extract(&file);

            println!("File:    {}", file.display());
            println!("Artist:  {}", field(&meta.artist));
            println!("Title:   {}", field(&meta.title));
            println!("Label:   {}", field(&meta.label));
            println!("Genre:   {}", field(&meta.genre));
            println!("BPM:     {}", field(&meta.bpm));
            println!("Comment: {}", field(&meta.comment));
            match meta.comment.as_deref().and_then(camelot::parse_key) {
                Some(key) => println!("Key:     {} (wheel color {})", key, key.color()),
                None => println!("Key:     --"),
            }
            match &meta.cover {
                Some(cover) => println!("Cover:   {} bytes", cover.len()),
                None => println!("Cover:   none"),
            }
        }

        Commands::Waveform { file, bars } => {
            anyhow::ensure!(file.is_file(), "No such file: {}", file.display());

            let mut cache = TrackCache::open(&cache_path);
            let envelope = match cache.get_waveform(&file) {
                Some(envelope) => {
                    log::info!("Waveform served from cache");
                    envelope
                }
                None => {
                    let bar = CliProgress::waveform_bar();
                    let envelope = waveform::build(&file, bars, &bar);
                    bar.finish();
                    if !envelope.is_empty() {
                        cache.put_waveform(&file, &envelope);
                        cache.flush();
                    }
                    envelope
                }
            };

            if envelope.is_empty() {
                println!("Waveform unavailable for {}", file.display());
            } else {
                println!("{}", sparkline(&envelope));
                let peak_at = envelope
                    .iter()
                    .enumerate()
                    .max_by(|a, b| a.1.total_cmp(b.1))
                    .map(|(i, _)| i)
                    .unwrap_or(0);
                println!(
                    "{} bars, peak at bar {} ({:.0}% in)",
                    envelope.len(),
                    peak_at,
                    100.0 * peak_at as f32 / envelope.len() as f32
                );
            }
        }

        Commands::Stats => {
            let cache = TrackCache::open(&cache_path);
            let stats = cache.stats();
            println!("Cache: {}", cache_path.display());
            println!("  entries:   {}", stats.entries);
            println!("  waveforms: {}", stats.with_waveform);
            println!("  covers:    {}", stats.with_cover);
        }
    }

    Ok(())
}

/// indicatif progress bar adapted to the core's progress capability.
struct CliProgress {
    bar: ProgressBar,
}

impl CliProgress {
    fn scan_bar() -> Self {
        Self::styled("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} files ({eta})")
    }

    fn waveform_bar() -> Self {
        Self::styled("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} bars")
    }

    fn styled(template: &str) -> Self {
        let bar = ProgressBar::new(0);
        bar.set_style(
            ProgressStyle::with_template(template)
                .unwrap()
                .progress_chars("#>-"),
        );
        Self { bar }
    }

    fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

impl ProgressHandle for CliProgress {
    fn set_total(&self, total: u64) {
        self.bar.set_length(total);
    }

    fn advance(&self, delta: u64) {
        self.bar.inc(delta);
    }
}

fn track_key(track: &Track) -> Option<CamelotKey> {
    track.meta.comment.as_deref().and_then(camelot::parse_key)
}

/// Placeholder for absent fields.
fn field(value: &Option<String>) -> &str {
    value.as_deref().unwrap_or("--")
}

/// Char-safe truncation for table cells.
fn clip(text: &str, width: usize) -> String {
    if text.chars().count() <= width {
        text.to_string()
    } else {
        let cut: String = text.chars().take(width.saturating_sub(3)).collect();
        format!("{cut}...")
    }
}

fn print_track_table(tracks: &[&Track]) {
    println!(
        "{:<24} {:<30} {:>6} {:>4}  {:<14} {}",
        "Artist", "Title", "BPM", "Key", "Genre", "Label"
    );
    println!("{}", "-".repeat(96));

    for track in tracks {
        let meta = &track.meta;
        let title = meta.title.clone().unwrap_or_else(|| {
            track
                .path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| "--".to_string())
        });
        let key = track_key(track)
            .map(|k| k.to_string())
            .unwrap_or_else(|| "--".to_string());

        println!(
            "{:<24} {:<30} {:>6} {:>4}  {:<14} {}",
            clip(field(&meta.artist), 24),
            clip(&title, 30),
            field(&meta.bpm),
            key,
            clip(field(&meta.genre), 14),
            clip(field(&meta.label), 20),
        );
    }
}

/// One-line block-glyph rendering of an amplitude envelope.
fn sparkline(envelope: &[f32]) -> String {
    const GLYPHS: [char; 8] = ['▁', '▂', '▃', '▄', '▅', '▆', '▇', '█'];
    envelope
        .iter()
        .map(|&amp| {
            let level = (amp.clamp(0.0, 1.0) * (GLYPHS.len() - 1) as f32).round() as usize;
            GLYPHS[level]
        })
        .collect()
}

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Application settings persisted as a line-based `KEY=value` file in the
/// working directory. All fields are optional — the file may be absent.
///
/// Only two keys matter to us (`last_directory`, `layout_state`); anything
/// else in the file is kept verbatim so a newer build doesn't strip settings
/// an older one wrote.
#[derive(Debug, Default)]
pub struct Settings {
    /// Directory the library browser last scanned.
    pub last_directory: Option<PathBuf>,
    /// Opaque layout blob owned by the presentation layer.
    pub layout_state: Option<String>,
    /// Unrecognized keys, preserved on save.
    extra: BTreeMap<String, String>,
}

const KEY_LAST_DIRECTORY: &str = "last_directory";
const KEY_LAYOUT_STATE: &str = "layout_state";

impl Settings {
    /// Load settings from `path`. A missing or unreadable file yields
    /// defaults; malformed lines are skipped with a warning.
    pub fn load(path: &Path) -> Self {
        let contents = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) => {
                log::debug!("No settings at {}: {}", path.display(), e);
                return Self::default();
            }
        };
        Self::parse(&contents)
    }

    fn parse(contents: &str) -> Self {
        let mut settings = Self::default();
        for line in contents.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let Some((key, value)) = line.split_once('=') else {
                log::warn!("Skipping malformed settings line: {line:?}");
                continue;
            };
            let key = key.trim();
            let value = value.trim();
            match key {
                KEY_LAST_DIRECTORY => {
                    if !value.is_empty() {
                        settings.last_directory = Some(PathBuf::from(value));
                    }
                }
                KEY_LAYOUT_STATE => {
                    if !value.is_empty() {
                        settings.layout_state = Some(value.to_string());
                    }
                }
                _ => {
                    settings.extra.insert(key.to_string(), value.to_string());
                }
            }
        }
        settings
    }

    fn render(&self) -> String {
        let mut out = String::from("# saio-music settings\n");
        if let Some(dir) = &self.last_directory {
            out.push_str(&format!("{KEY_LAST_DIRECTORY}={}\n", dir.display()));
        }
        if let Some(layout) = &self.layout_state {
            out.push_str(&format!("{KEY_LAYOUT_STATE}={layout}\n"));
        }
        for (key, value) in &self.extra {
            out.push_str(&format!("{key}={value}\n"));
        }
        out
    }

    /// Write settings back to `path`. Failures are logged and swallowed —
    /// settings are a convenience, never worth failing the session over.
    pub fn save(&self, path: &Path) {
        if let Err(e) = std::fs::write(path, self.render()) {
            log::warn!("Could not save settings to {}: {}", path.display(), e);
        }
    }
}

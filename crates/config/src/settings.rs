// Composer settings
// Loaded from ~/.config/composer/settings.json

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use composer_engine::formula::number::DEFAULT_SHAPE_CACHE_CAPACITY;
use composer_engine::Locale;
use serde::{Deserialize, Serialize};

use crate::parse_hex_color;

/// Reference highlight palette (Excel-like)
pub const DEFAULT_PALETTE: [u32; 8] = [
    0x4472C4, // Blue
    0xED7D31, // Orange
    0x9B59B6, // Purple
    0x70AD47, // Green
    0x00B0F0, // Cyan
    0xFFC000, // Yellow
    0xFF6B9D, // Pink
    0x00B294, // Teal
];

#[derive(Debug)]
pub enum SettingsError {
    /// Reading or writing the settings file failed.
    Io(String),
    /// The settings could not be encoded as JSON.
    Serialize(String),
}

impl fmt::Display for SettingsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(msg) => write!(f, "IO error: {msg}"),
            Self::Serialize(msg) => write!(f, "serialize error: {msg}"),
        }
    }
}

impl std::error::Error for SettingsError {}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    // Locale
    #[serde(rename = "locale.code")]
    pub locale_code: String,

    #[serde(rename = "locale.decimalSeparator", skip_serializing_if = "Option::is_none")]
    pub decimal_separator: Option<char>,

    #[serde(rename = "locale.thousandsSeparator", skip_serializing_if = "Option::is_none")]
    pub thousands_separator: Option<char>,

    #[serde(rename = "locale.argSeparator", skip_serializing_if = "Option::is_none")]
    pub arg_separator: Option<char>,

    // Autocomplete
    #[serde(rename = "autocomplete.maxProposals")]
    pub max_proposals: usize,

    // Highlighting
    #[serde(rename = "highlight.palette")]
    pub palette: Vec<String>,

    // Number recognition
    #[serde(rename = "number.shapeCacheCapacity")]
    pub shape_cache_capacity: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            locale_code: "en-US".to_string(),
            decimal_separator: None, // None = preset value
            thousands_separator: None,
            arg_separator: None,
            max_proposals: 10,
            palette: DEFAULT_PALETTE.iter().map(|c| crate::format_hex_color(*c)).collect(),
            shape_cache_capacity: DEFAULT_SHAPE_CACHE_CAPACITY,
        }
    }
}

impl Settings {
    /// Get the settings file path
    pub fn config_path() -> PathBuf {
        let config_dir = dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("composer");
        config_dir.join("settings.json")
    }

    /// Load settings from the user config dir, writing a commented default
    /// file on first run.
    pub fn load() -> Self {
        let path = Self::config_path();
        if !path.exists() {
            Self::create_default_file(&path);
            return Self::default();
        }
        Self::load_from(&path)
    }

    /// Load settings from `path`, falling back to defaults
    pub fn load_from(path: &Path) -> Self {
        match fs::read_to_string(path) {
            Ok(contents) => {
                // Strip comments (lines starting with //)
                let cleaned: String = contents
                    .lines()
                    .filter(|line| !line.trim().starts_with("//"))
                    .collect::<Vec<_>>()
                    .join("\n");

                match serde_json::from_str(&cleaned) {
                    Ok(settings) => settings,
                    Err(e) => {
                        log::warn!("Error parsing {}: {}; using default settings", path.display(), e);
                        Self::default()
                    }
                }
            }
            Err(e) => {
                log::warn!("Error reading {}: {}", path.display(), e);
                Self::default()
            }
        }
    }

    /// Save current settings to the user config dir
    pub fn save(&self) -> Result<(), SettingsError> {
        self.save_to(&Self::config_path())
    }

    pub fn save_to(&self, path: &Path) -> Result<(), SettingsError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| SettingsError::Io(e.to_string()))?;
        }

        let json = serde_json::to_string_pretty(self).map_err(|e| SettingsError::Serialize(e.to_string()))?;

        fs::write(path, json).map_err(|e| SettingsError::Io(e.to_string()))
    }

    /// Locale preset named by `locale.code`, with any separator overrides applied.
    pub fn locale(&self) -> Locale {
        let mut locale = Locale::from_code(&self.locale_code).unwrap_or_else(|| {
            log::warn!("Unknown locale '{}', using en-US", self.locale_code);
            Locale::en_us()
        });
        if let Some(sep) = self.decimal_separator {
            locale.decimal_separator = sep;
        }
        if let Some(sep) = self.thousands_separator {
            locale.thousands_separator = Some(sep);
        }
        if let Some(sep) = self.arg_separator {
            locale.arg_separator = sep;
        }
        locale
    }

    /// Highlight palette as 0xRRGGBB values. Invalid entries are skipped; an
    /// empty result falls back to the default palette.
    pub fn palette_colors(&self) -> Vec<u32> {
        let colors: Vec<u32> = self
            .palette
            .iter()
            .filter_map(|entry| {
                let parsed = parse_hex_color(entry);
                if parsed.is_none() {
                    log::warn!("Ignoring invalid palette color '{}'", entry);
                }
                parsed
            })
            .collect();
        if colors.is_empty() {
            DEFAULT_PALETTE.to_vec()
        } else {
            colors
        }
    }

    /// Create default settings file with comments
    fn create_default_file(path: &Path) {
        if let Some(parent) = path.parent() {
            if let Err(e) = fs::create_dir_all(parent) {
                log::warn!("Error creating config directory: {}", e);
                return;
            }
        }

        let default_config = r##"{
    // Locale preset: "en-US", "fr-FR", "de-DE"
    "locale.code": "en-US",
    // Uncomment to override the preset separators
    // "locale.decimalSeparator": ".",
    // "locale.thousandsSeparator": ",",
    // "locale.argSeparator": ",",

    // Autocomplete
    "autocomplete.maxProposals": 10,

    // Reference highlight colors, reused in order
    "highlight.palette": ["#4472C4", "#ED7D31", "#9B59B6", "#70AD47", "#00B0F0", "#FFC000", "#FF6B9D", "#00B294"],

    // Number recognition
    "number.shapeCacheCapacity": 256
}
"##;

        if let Err(e) = fs::write(path, default_config) {
            log::warn!("Error writing default settings.json: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_palette_matches_constant() {
        assert_eq!(Settings::default().palette_colors(), DEFAULT_PALETTE.to_vec());
    }

    #[test]
    fn locale_overrides_apply_on_top_of_preset() {
        let settings = Settings {
            locale_code: "fr-FR".to_string(),
            arg_separator: Some('|'),
            ..Settings::default()
        };
        let locale = settings.locale();
        assert_eq!(locale.decimal_separator, ',');
        assert_eq!(locale.arg_separator, '|');
    }

    #[test]
    fn unknown_locale_falls_back() {
        let settings = Settings { locale_code: "xx-YY".to_string(), ..Settings::default() };
        assert_eq!(settings.locale(), Locale::en_us());
    }

    #[test]
    fn invalid_palette_entries_are_skipped() {
        let settings = Settings {
            palette: vec!["#112233".to_string(), "nope".to_string()],
            ..Settings::default()
        };
        assert_eq!(settings.palette_colors(), vec![0x112233]);

        let empty = Settings { palette: vec!["bad".to_string()], ..Settings::default() };
        assert_eq!(empty.palette_colors(), DEFAULT_PALETTE.to_vec());
    }

    #[test]
    fn load_strips_comment_lines_and_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(
            &path,
            "{\n  // locale\n  \"locale.code\": \"de-DE\",\n  \"autocomplete.maxProposals\": 3\n}\n",
        )
        .unwrap();

        let settings = Settings::load_from(&path);
        assert_eq!(settings.locale_code, "de-DE");
        assert_eq!(settings.max_proposals, 3);
        assert_eq!(settings.shape_cache_capacity, DEFAULT_SHAPE_CACHE_CAPACITY);
    }

    #[test]
    fn invalid_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, "{ not json").unwrap();
        assert_eq!(Settings::load_from(&path), Settings::default());
        assert_eq!(Settings::load_from(&dir.path().join("missing.json")), Settings::default());
    }

    #[test]
    fn save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("settings.json");
        let settings = Settings { max_proposals: 4, decimal_separator: Some(','), ..Settings::default() };
        settings.save_to(&path).unwrap();
        assert_eq!(Settings::load_from(&path), settings);
    }

    #[test]
    fn default_file_parses() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("composer").join("settings.json");
        Settings::create_default_file(&path);
        assert_eq!(Settings::load_from(&path), Settings::default());
    }
}

use serde::{Deserialize, Serialize};

/// Number and argument separators used when reading and writing formulas.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Locale {
    pub code: String,
    pub decimal_separator: char,
    pub thousands_separator: Option<char>,
    pub arg_separator: char,
}

impl Default for Locale {
    fn default() -> Self {
        Self::en_us()
    }
}

impl Locale {
    pub fn en_us() -> Self {
        Self {
            code: "en-US".to_string(),
            decimal_separator: '.',
            thousands_separator: Some(','),
            arg_separator: ',',
        }
    }

    pub fn fr_fr() -> Self {
        Self {
            code: "fr-FR".to_string(),
            decimal_separator: ',',
            thousands_separator: Some(' '),
            arg_separator: ';',
        }
    }

    pub fn de_de() -> Self {
        Self {
            code: "de-DE".to_string(),
            decimal_separator: ',',
            thousands_separator: Some('.'),
            arg_separator: ';',
        }
    }

    /// Look up one of the built-in presets by code (case-insensitive, `_` or `-`).
    pub fn from_code(code: &str) -> Option<Self> {
        match code.replace('_', "-").to_ascii_lowercase().as_str() {
            "en-us" | "en" => Some(Self::en_us()),
            "fr-fr" | "fr" => Some(Self::fr_fr()),
            "de-de" | "de" => Some(Self::de_de()),
            _ => None,
        }
    }
}

/// Source of the locale currently in effect. Re-tokenization reads it on
/// every content change.
pub trait LocaleProvider {
    fn locale(&self) -> Locale;
}

impl LocaleProvider for Locale {
    fn locale(&self) -> Locale {
        self.clone()
    }
}

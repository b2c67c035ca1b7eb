// Configuration loading

pub mod settings;

pub use settings::{Settings, SettingsError};

/// Parse `#RRGGBB` (or `RRGGBB`) into 0xRRGGBB.
pub fn parse_hex_color(text: &str) -> Option<u32> {
    let hex = text.trim().trim_start_matches('#');
    if hex.len() != 6 {
        return None;
    }
    u32::from_str_radix(hex, 16).ok()
}

/// Format 0xRRGGBB as `#RRGGBB`.
pub fn format_hex_color(color: u32) -> String {
    format!("#{:06X}", color & 0xFF_FFFF)
}

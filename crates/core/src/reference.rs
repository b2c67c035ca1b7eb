//! A1-style reference text ("xc")
//!
//! Contains:
//! - Column letter conversion
//! - Endpoint classification (cell, bare column, bare row)
//! - Parsing of references with optional sheet prefix into unbounded zones
//! - Formatting of zones back to text, honouring `$` fixedness
//! - Fixedness cycling (A1 -> $A$1 -> A$1 -> $A1 -> A1)

use once_cell::sync::Lazy;
use regex::Regex;

use crate::zone::UnboundedZone;

/// Endpoint grammar: optional `$` + column letters, optional `$` + row digits.
static ENDPOINT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:(\$?)([A-Za-z]{1,3}))?(?:(\$?)([0-9]+))?$").expect("valid endpoint regex")
});

/// Sheet names that can be written without quotes.
static PLAIN_SHEET_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_.]*$").expect("valid sheet name regex"));

// ============================================================================
// Columns
// ============================================================================

/// Convert a 0-based column index to letters (0 -> A, 25 -> Z, 26 -> AA).
pub fn col_to_letters(col: usize) -> String {
    let mut result = String::new();
    let mut n = col;
    loop {
        result.insert(0, (b'A' + (n % 26) as u8) as char);
        if n < 26 {
            break;
        }
        n = n / 26 - 1;
    }
    result
}

/// Convert column letters (case-insensitive) to a 0-based column index.
pub fn letters_to_col(letters: &str) -> Option<usize> {
    if letters.is_empty() {
        return None;
    }
    let mut col = 0usize;
    for ch in letters.chars() {
        if !ch.is_ascii_alphabetic() {
            return None;
        }
        col = col * 26 + (ch.to_ascii_uppercase() as u8 - b'A') as usize + 1;
    }
    Some(col - 1)
}

// ============================================================================
// Fixedness
// ============================================================================

/// `$` markers of one reference endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub struct RangePart {
    pub col_fixed: bool,
    pub row_fixed: bool,
}

impl RangePart {
    pub const RELATIVE: RangePart = RangePart { col_fixed: false, row_fixed: false };

    /// Next state in the F4 cycle: relative -> fixed -> row fixed -> column fixed -> relative.
    pub fn cycle(self) -> Self {
        match (self.col_fixed, self.row_fixed) {
            (false, false) => RangePart { col_fixed: true, row_fixed: true },
            (true, true) => RangePart { col_fixed: false, row_fixed: true },
            (false, true) => RangePart { col_fixed: true, row_fixed: false },
            (true, false) => RangePart::RELATIVE,
        }
    }
}

// ============================================================================
// Endpoints
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndpointKind {
    /// `A1`, `$B$7`
    Cell,
    /// `A`, `$AB`
    Column,
    /// `3`, `$12`
    Row,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Endpoint {
    Cell { col: usize, row: usize, part: RangePart },
    Column { col: usize, fixed: bool },
    Row { row: usize, fixed: bool },
}

impl Endpoint {
    fn kind(&self) -> EndpointKind {
        match self {
            Endpoint::Cell { .. } => EndpointKind::Cell,
            Endpoint::Column { .. } => EndpointKind::Column,
            Endpoint::Row { .. } => EndpointKind::Row,
        }
    }

    fn part(&self) -> RangePart {
        match *self {
            Endpoint::Cell { part, .. } => part,
            Endpoint::Column { fixed, .. } => RangePart { col_fixed: fixed, row_fixed: false },
            Endpoint::Row { fixed, .. } => RangePart { col_fixed: false, row_fixed: fixed },
        }
    }
}

fn parse_endpoint(text: &str) -> Option<Endpoint> {
    let caps = ENDPOINT_RE.captures(text)?;
    let letters = caps.get(2).map(|m| m.as_str());
    let digits = caps.get(4).map(|m| m.as_str());
    let col_fixed = caps.get(1).is_some_and(|m| !m.as_str().is_empty());
    let row_fixed = caps.get(3).is_some_and(|m| !m.as_str().is_empty());

    let row = match digits {
        Some(d) => {
            let n: usize = d.parse().ok()?;
            if n == 0 {
                return None;
            }
            Some(n - 1)
        }
        None => None,
    };

    match (letters, row) {
        (Some(l), Some(row)) => Some(Endpoint::Cell {
            col: letters_to_col(l)?,
            row,
            part: RangePart { col_fixed, row_fixed },
        }),
        (Some(l), None) => Some(Endpoint::Column { col: letters_to_col(l)?, fixed: col_fixed }),
        (None, Some(row)) => Some(Endpoint::Row { row, fixed: row_fixed }),
        (None, None) => None,
    }
}

/// Classify one side of a `:` range, ignoring any sheet prefix.
pub fn endpoint_kind(text: &str) -> Option<EndpointKind> {
    let (_, body) = split_sheet_prefix(text.trim());
    parse_endpoint(body.trim()).map(|e| e.kind())
}

// ============================================================================
// Sheet prefixes
// ============================================================================

/// Split `Sheet1!A1` / `'My Sheet'!A1` into (`Some("Sheet1!")`, `"A1"`).
/// The returned prefix is verbatim and includes the `!`.
pub fn split_sheet_prefix(text: &str) -> (Option<&str>, &str) {
    if text.starts_with('\'') {
        let bytes = text.as_bytes();
        let mut i = 1;
        while i < bytes.len() {
            if bytes[i] == b'\'' {
                if bytes.get(i + 1) == Some(&b'\'') {
                    i += 2;
                    continue;
                }
                if bytes.get(i + 1) == Some(&b'!') {
                    return (Some(&text[..i + 2]), &text[i + 2..]);
                }
                return (None, text);
            }
            i += 1;
        }
        return (None, text);
    }
    match text.find('!') {
        Some(idx) => (Some(&text[..idx + 1]), &text[idx + 1..]),
        None => (None, text),
    }
}

/// Sheet name from a verbatim prefix (`'It''s'!` -> `It's`).
pub fn sheet_name_from_prefix(prefix: &str) -> String {
    let name = prefix.strip_suffix('!').unwrap_or(prefix);
    match name.strip_prefix('\'').and_then(|n| n.strip_suffix('\'')) {
        Some(quoted) => quoted.replace("''", "'"),
        None => name.to_string(),
    }
}

/// Sheet prefix for a name, quoted when the name is not a plain identifier.
pub fn format_sheet_prefix(name: &str) -> String {
    if PLAIN_SHEET_RE.is_match(name) && parse_endpoint(name).is_none() {
        format!("{}!", name)
    } else {
        format!("'{}'!", name.replace('\'', "''"))
    }
}

// ============================================================================
// Parsing & formatting
// ============================================================================

/// A parsed reference: optional sheet name, the zone it covers, and the `$`
/// markers of its two endpoints (equal for a single cell).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferenceText {
    pub sheet_name: Option<String>,
    pub zone: UnboundedZone,
    pub parts: [RangePart; 2],
}

impl ReferenceText {
    /// Parse a cell (`A1`) or range (`A1:B2`, `A:A`, `3:3`, `B3:4`, `A:A5`)
    /// reference. Whitespace around the parts is ignored. A bare column or row
    /// without a partner is not a reference.
    pub fn parse(text: &str) -> Option<Self> {
        let (prefix, body) = split_sheet_prefix(text.trim());
        let sheet_name = prefix.map(sheet_name_from_prefix);

        let mut sides = body.split(':');
        let first = sides.next()?.trim();
        let second = sides.next();
        if sides.next().is_some() {
            return None;
        }

        let a = parse_endpoint(first)?;
        let Some(second) = second else {
            return match a {
                Endpoint::Cell { col, row, part } => Some(ReferenceText {
                    sheet_name,
                    zone: UnboundedZone { left: col, top: row, right: Some(col), bottom: Some(row) },
                    parts: [part, part],
                }),
                _ => None,
            };
        };
        let (_, second) = split_sheet_prefix(second.trim());
        let b = parse_endpoint(second.trim())?;

        let zone = match (a, b) {
            (Endpoint::Cell { col: c1, row: r1, .. }, Endpoint::Cell { col: c2, row: r2, .. }) => {
                UnboundedZone {
                    left: c1.min(c2),
                    top: r1.min(r2),
                    right: Some(c1.max(c2)),
                    bottom: Some(r1.max(r2)),
                }
            }
            (Endpoint::Column { col: c1, .. }, Endpoint::Column { col: c2, .. }) => UnboundedZone {
                left: c1.min(c2),
                top: 0,
                right: Some(c1.max(c2)),
                bottom: None,
            },
            (Endpoint::Row { row: r1, .. }, Endpoint::Row { row: r2, .. }) => UnboundedZone {
                left: 0,
                top: r1.min(r2),
                right: None,
                bottom: Some(r1.max(r2)),
            },
            (Endpoint::Cell { col, row, .. }, Endpoint::Column { col: c2, .. })
            | (Endpoint::Column { col: c2, .. }, Endpoint::Cell { col, row, .. }) => UnboundedZone {
                left: col.min(c2),
                top: row,
                right: Some(col.max(c2)),
                bottom: None,
            },
            (Endpoint::Cell { col, row, .. }, Endpoint::Row { row: r2, .. })
            | (Endpoint::Row { row: r2, .. }, Endpoint::Cell { col, row, .. }) => UnboundedZone {
                left: col,
                top: row.min(r2),
                right: None,
                bottom: Some(row.max(r2)),
            },
            (Endpoint::Column { .. }, Endpoint::Row { .. })
            | (Endpoint::Row { .. }, Endpoint::Column { .. }) => return None,
        };

        Some(ReferenceText { sheet_name, zone, parts: [a.part(), b.part()] })
    }

    /// True for a single cell reference (no `:`).
    pub fn is_single_cell(&self) -> bool {
        self.zone.right == Some(self.zone.left) && self.zone.bottom == Some(self.zone.top)
    }
}

fn format_col(col: usize, fixed: bool) -> String {
    format!("{}{}", if fixed { "$" } else { "" }, col_to_letters(col))
}

fn format_row(row: usize, fixed: bool) -> String {
    format!("{}{}", if fixed { "$" } else { "" }, row + 1)
}

fn format_cell(col: usize, row: usize, part: RangePart) -> String {
    format!("{}{}", format_col(col, part.col_fixed), format_row(row, part.row_fixed))
}

/// Render a zone as reference text (no sheet prefix).
pub fn format_zone(zone: &UnboundedZone, parts: &[RangePart; 2]) -> String {
    let [p1, p2] = *parts;
    match (zone.right, zone.bottom) {
        (right, None) if zone.top == 0 => format!(
            "{}:{}",
            format_col(zone.left, p1.col_fixed),
            format_col(right.unwrap_or(zone.left), p2.col_fixed)
        ),
        (right, None) => format!(
            "{}:{}",
            format_cell(zone.left, zone.top, p1),
            format_col(right.unwrap_or(zone.left), p2.col_fixed)
        ),
        (None, Some(bottom)) if zone.left == 0 => format!(
            "{}:{}",
            format_row(zone.top, p1.row_fixed),
            format_row(bottom, p2.row_fixed)
        ),
        (None, Some(bottom)) => format!(
            "{}:{}",
            format_cell(zone.left, zone.top, p1),
            format_row(bottom, p2.row_fixed)
        ),
        (Some(right), Some(bottom)) => {
            if right == zone.left && bottom == zone.top {
                format_cell(zone.left, zone.top, p1)
            } else {
                format!("{}:{}", format_cell(zone.left, zone.top, p1), format_cell(right, bottom, p2))
            }
        }
    }
}

// ============================================================================
// Fixedness cycling
// ============================================================================

fn cycle_endpoint(text: &str) -> String {
    let Some(caps) = ENDPOINT_RE.captures(text) else {
        return text.to_string();
    };
    let letters = caps.get(2).map(|m| m.as_str());
    let digits = caps.get(4).map(|m| m.as_str());
    if letters.is_none() && digits.is_none() {
        return text.to_string();
    }
    let current = RangePart {
        col_fixed: caps.get(1).is_some_and(|m| !m.as_str().is_empty()),
        row_fixed: caps.get(3).is_some_and(|m| !m.as_str().is_empty()),
    };
    let next = current.cycle();

    let mut out = String::with_capacity(text.len() + 2);
    if let Some(l) = letters {
        if next.col_fixed {
            out.push('$');
        }
        out.push_str(l);
    }
    if let Some(d) = digits {
        if next.row_fixed {
            out.push('$');
        }
        out.push_str(d);
    }
    out
}

/// Advance every endpoint of a reference to its next fixedness state. Only
/// `$` markers change: whitespace and sheet prefixes are kept verbatim.
pub fn cycle_fixedness(text: &str) -> String {
    let (prefix, body) = split_sheet_prefix(text.trim_start());
    let leading = &text[..text.len() - text.trim_start().len()];

    let mut out = String::with_capacity(text.len() + 4);
    out.push_str(leading);
    out.push_str(prefix.unwrap_or(""));

    for (i, side) in body.split(':').enumerate() {
        if i > 0 {
            out.push(':');
        }
        let trimmed = side.trim();
        let lead_ws = &side[..side.len() - side.trim_start().len()];
        let trail_ws = &side[side.trim_end().len()..];
        let (side_prefix, endpoint) = split_sheet_prefix(trimmed);
        out.push_str(lead_ws);
        out.push_str(side_prefix.unwrap_or(""));
        out.push_str(&cycle_endpoint(endpoint));
        out.push_str(trail_ws);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn col_letters_round_trip() {
        assert_eq!(col_to_letters(0), "A");
        assert_eq!(col_to_letters(25), "Z");
        assert_eq!(col_to_letters(26), "AA");
        assert_eq!(col_to_letters(701), "ZZ");
        assert_eq!(col_to_letters(702), "AAA");
        assert_eq!(letters_to_col("A"), Some(0));
        assert_eq!(letters_to_col("aa"), Some(26));
        assert_eq!(letters_to_col("AAA"), Some(702));
        assert_eq!(letters_to_col(""), None);
    }

    #[test]
    fn endpoint_kinds() {
        assert_eq!(endpoint_kind("A1"), Some(EndpointKind::Cell));
        assert_eq!(endpoint_kind("$B$7"), Some(EndpointKind::Cell));
        assert_eq!(endpoint_kind("A"), Some(EndpointKind::Column));
        assert_eq!(endpoint_kind("$AB"), Some(EndpointKind::Column));
        assert_eq!(endpoint_kind("3"), Some(EndpointKind::Row));
        assert_eq!(endpoint_kind("$3"), Some(EndpointKind::Row));
        assert_eq!(endpoint_kind("Sheet2!C"), Some(EndpointKind::Column));
        assert_eq!(endpoint_kind("SUMX"), None);
        assert_eq!(endpoint_kind("A0"), None);
        assert_eq!(endpoint_kind(""), None);
    }

    #[test]
    fn parse_single_cell() {
        let r = ReferenceText::parse("$B$3").unwrap();
        assert!(r.is_single_cell());
        assert_eq!(r.zone, UnboundedZone { left: 1, top: 2, right: Some(1), bottom: Some(2) });
        assert_eq!(r.parts[0], RangePart { col_fixed: true, row_fixed: true });
        assert_eq!(r.sheet_name, None);
    }

    #[test]
    fn parse_ranges() {
        let r = ReferenceText::parse("B2:A1").unwrap();
        assert_eq!(r.zone, UnboundedZone { left: 0, top: 0, right: Some(1), bottom: Some(1) });

        let cols = ReferenceText::parse("A:C").unwrap();
        assert_eq!(cols.zone, UnboundedZone { left: 0, top: 0, right: Some(2), bottom: None });

        let rows = ReferenceText::parse("3:3").unwrap();
        assert_eq!(rows.zone, UnboundedZone { left: 0, top: 2, right: None, bottom: Some(2) });

        let partial = ReferenceText::parse("B3:4").unwrap();
        assert_eq!(partial.zone, UnboundedZone { left: 1, top: 2, right: None, bottom: Some(3) });

        let col_partial = ReferenceText::parse("A:A5").unwrap();
        assert_eq!(col_partial.zone, UnboundedZone { left: 0, top: 4, right: Some(0), bottom: None });
    }

    #[test]
    fn parse_rejects_row_column_pairs() {
        assert!(ReferenceText::parse("3:A").is_none());
        assert!(ReferenceText::parse("A:3").is_none());
        assert!(ReferenceText::parse("A").is_none());
        assert!(ReferenceText::parse("3").is_none());
        assert!(ReferenceText::parse("A1:B2:C3").is_none());
    }

    #[test]
    fn parse_with_spaces_and_sheet() {
        let r = ReferenceText::parse(" A : A ").unwrap();
        assert_eq!(r.zone.bottom, None);

        let r = ReferenceText::parse("'My Sheet'!A1:B2").unwrap();
        assert_eq!(r.sheet_name.as_deref(), Some("My Sheet"));

        let r = ReferenceText::parse("Data!C5").unwrap();
        assert_eq!(r.sheet_name.as_deref(), Some("Data"));
        assert_eq!(r.zone.left, 2);
    }

    #[test]
    fn sheet_prefix_quoting() {
        assert_eq!(format_sheet_prefix("Sheet1"), "Sheet1!");
        assert_eq!(format_sheet_prefix("My Sheet"), "'My Sheet'!");
        assert_eq!(format_sheet_prefix("It's"), "'It''s'!");
        // A name that reads as a cell must be quoted
        assert_eq!(format_sheet_prefix("A1"), "'A1'!");
        assert_eq!(sheet_name_from_prefix("'It''s'!"), "It's");
    }

    #[test]
    fn format_round_trips_parse() {
        for text in ["A1", "$A$1", "A1:B2", "A:C", "$A:$A", "3:5", "B3:4", "A3:B", "A$1:$B2"] {
            let r = ReferenceText::parse(text).unwrap();
            assert_eq!(format_zone(&r.zone, &r.parts), text, "round trip of {}", text);
        }
    }

    #[test]
    fn cycle_single_cell_four_states() {
        assert_eq!(cycle_fixedness("A1"), "$A$1");
        assert_eq!(cycle_fixedness("$A$1"), "A$1");
        assert_eq!(cycle_fixedness("A$1"), "$A1");
        assert_eq!(cycle_fixedness("$A1"), "A1");
    }

    #[test]
    fn cycle_preserves_spaces_and_prefix() {
        assert_eq!(cycle_fixedness(" A1 : B2 "), " $A$1 : $B$2 ");
        assert_eq!(cycle_fixedness("'My Sheet'!A1:B2"), "'My Sheet'!$A$1:$B$2");
    }

    #[test]
    fn cycle_returns_after_four_steps() {
        for text in ["A1", "B3:4", "A:A", "3:3", "Sheet2!$C$9", " A : A "] {
            let mut current = text.to_string();
            for _ in 0..4 {
                current = cycle_fixedness(&current);
            }
            assert_eq!(current, text);
        }
    }
}

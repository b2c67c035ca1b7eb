//! Shared types for the formula composer: zones, sheet ids, A1 reference text
//! and UTF-16 text offsets.

pub mod reference;
pub mod text;
pub mod zone;

pub use reference::{RangePart, ReferenceText};
pub use text::Selection;
pub use zone::{CellPosition, SheetId, UnboundedZone, Zone};

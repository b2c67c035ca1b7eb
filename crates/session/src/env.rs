//! Collaborators of an edit session
//!
//! The session only reads from these (plus one capture/release pair on the
//! selection source). Every trait has a working in-memory implementation in
//! [`crate::memory`].

use std::rc::Rc;

use composer_core::reference::{format_sheet_prefix, format_zone, ReferenceText};
use composer_core::{CellPosition, RangePart, SheetId, UnboundedZone, Zone};
use composer_engine::formula::FunctionRegistry;
use composer_engine::LocaleProvider;

use crate::autocomplete::ProposalProvider;

// ============================================================================
// Zones
// ============================================================================

/// Resolves reference text to zones and back.
///
/// Only the sheet lookups and merges are required; reference parsing and
/// formatting have default implementations on top of them.
pub trait ZoneResolver {
    fn active_sheet(&self) -> SheetId;

    fn sheet_by_name(&self, name: &str) -> Option<SheetId>;

    fn sheet_name(&self, sheet: SheetId) -> Option<String>;

    /// (columns, rows) of a sheet.
    fn sheet_size(&self, sheet: SheetId) -> Option<(usize, usize)>;

    /// The merged area containing `zone`, or `zone` itself.
    fn expand_to_merge(&self, _sheet: SheetId, zone: Zone) -> Zone {
        zone
    }

    /// Resolve reference text. References without a sheet prefix resolve on
    /// `default_sheet`. Open edges are clamped to the sheet size.
    fn resolve(&self, xc: &str, default_sheet: SheetId) -> Option<(SheetId, Zone)> {
        let reference = ReferenceText::parse(xc)?;
        let sheet = match &reference.sheet_name {
            Some(name) => self.sheet_by_name(name)?,
            None => default_sheet,
        };
        let (cols, rows) = self.sheet_size(sheet)?;
        Some((sheet, reference.zone.bounded(cols, rows)))
    }

    /// Render a zone of `sheet` as seen from a formula on `from_sheet`.
    fn format_zone(&self, zone: &UnboundedZone, parts: &[RangePart; 2], sheet: SheetId, from_sheet: SheetId) -> String {
        let body = format_zone(zone, parts);
        if sheet == from_sheet {
            return body;
        }
        match self.sheet_name(sheet) {
            Some(name) => format!("{}{}", format_sheet_prefix(&name), body),
            None => body,
        }
    }

    /// Turn a zone spanning whole rows and/or columns into an open one, so a
    /// full-column pick renders as `A:A`.
    fn unbounded_zone(&self, sheet: SheetId, zone: Zone) -> UnboundedZone {
        let mut unbounded = UnboundedZone::from(zone);
        if let Some((cols, rows)) = self.sheet_size(sheet) {
            // A whole-sheet pick renders as full columns
            if zone.top == 0 && zone.bottom + 1 >= rows {
                unbounded.bottom = None;
            } else if zone.left == 0 && zone.right + 1 >= cols {
                unbounded.right = None;
            }
        }
        unbounded
    }
}

// ============================================================================
// Edit target
// ============================================================================

/// Where the edited content comes from and goes to.
pub trait EditTarget {
    /// Current content of the edited cell, as the composer should show it.
    fn fetch(&self, position: &CellPosition) -> String;

    /// Semantic check before commit; `Err` carries the message to show.
    fn validate(&self, _position: &CellPosition, _content: &str) -> Result<(), String> {
        Ok(())
    }

    fn commit(&self, position: &CellPosition, content: &str);

    /// True if the cell's current value is displayed with a percent format.
    fn displays_percent(&self, _position: &CellPosition) -> bool {
        false
    }

    /// Bring `sheet` back to front after a cross-sheet edit.
    fn activate_sheet(&self, _sheet: SheetId) {}
}

/// Side effects that differ between the cell editor and standalone
/// composers (chart ranges, data-validation inputs...).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    pub validate_on_commit: bool,
    pub return_to_edited_sheet: bool,
    pub percent_aware_input: bool,
}

impl Capabilities {
    /// Grid cell editor: validation, sheet navigation and percent input.
    pub const fn cell_editor() -> Self {
        Self { validate_on_commit: true, return_to_edited_sheet: true, percent_aware_input: true }
    }

    /// Composer embedded in a side panel: plain commit.
    pub const fn standalone() -> Self {
        Self { validate_on_commit: false, return_to_edited_sheet: false, percent_aware_input: false }
    }
}

// ============================================================================
// Notifications
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationLevel {
    Error,
    Warning,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub level: NotificationLevel,
    pub text: String,
}

impl Notification {
    pub fn error(text: impl Into<String>) -> Self {
        Self { level: NotificationLevel::Error, text: text.into() }
    }

    pub fn warning(text: impl Into<String>) -> Self {
        Self { level: NotificationLevel::Warning, text: text.into() }
    }
}

pub trait NotificationSink {
    fn notify(&self, notification: Notification);
}

// ============================================================================
// Spatial selection
// ============================================================================

/// Identifies the component holding the grid selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OwnerId(pub u64);

/// Grid selection protocol. While captured, grid selection changes are routed
/// to the owner as [`SelectionEvent`]s instead of moving the cell cursor.
pub trait SelectionSource {
    fn capture(&self, owner: OwnerId, anchor: Zone);
    fn release(&self, owner: OwnerId);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionEventMode {
    /// A new anchor was started (click, ctrl+click).
    NewAnchor,
    /// The current anchor was extended or moved (drag, shift+arrow).
    UpdateAnchor,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SelectionEvent {
    pub mode: SelectionEventMode,
    pub anchor: Zone,
    pub previous_anchor: Option<Zone>,
    /// Whole rows/columns were picked from the headers.
    pub unbounded: bool,
}

// ============================================================================
// Pivots
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PivotCell {
    pub measure: Option<String>,
    /// (field, value) pairs locating the cell in the pivot.
    pub domain: Vec<(String, String)>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PivotCellInfo {
    pub pivot_id: String,
    pub cell: PivotCell,
    /// The cell already holds a literal pivot formula.
    pub is_pivot_formula: bool,
}

pub trait PivotFormulaBuilder {
    fn pivot_cell_at(&self, sheet: SheetId, col: usize, row: usize) -> Option<PivotCellInfo>;

    fn shorthand(&self, pivot_id: &str, cell: &PivotCell) -> Option<String>;
}

// ============================================================================
// Bundle
// ============================================================================

/// Everything a session talks to.
pub struct Collaborators {
    pub resolver: Rc<dyn ZoneResolver>,
    pub target: Rc<dyn EditTarget>,
    pub notifications: Rc<dyn NotificationSink>,
    pub selection: Rc<dyn SelectionSource>,
    pub locale: Rc<dyn LocaleProvider>,
    pub functions: Rc<dyn FunctionRegistry>,
    pub pivots: Option<Rc<dyn PivotFormulaBuilder>>,
    pub providers: Vec<Box<dyn ProposalProvider>>,
}

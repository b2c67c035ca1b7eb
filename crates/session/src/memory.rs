//! In-memory workbook
//!
//! Implements every session collaborator over plain maps: sheets with sizes,
//! merges, cell contents and percent formats, plus a record of notifications,
//! commits and selection captures. Used by tests and the CLI.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use composer_core::{CellPosition, SheetId, Zone};
use composer_engine::formula::{BuiltinFunctions, FunctionRegistry};
use composer_engine::{Locale, LocaleProvider};
use rustc_hash::{FxHashMap, FxHashSet};

use crate::autocomplete::FunctionProposals;
use crate::env::{
    Collaborators, EditTarget, Notification, NotificationSink, OwnerId, PivotCell, PivotCellInfo,
    PivotFormulaBuilder, SelectionSource, ZoneResolver,
};

pub const DEFAULT_COLS: usize = 26;
pub const DEFAULT_ROWS: usize = 1000;

struct MemorySheet {
    id: SheetId,
    name: String,
    cols: usize,
    rows: usize,
    cells: FxHashMap<(usize, usize), String>,
    percent: FxHashSet<(usize, usize)>,
    merges: Vec<Zone>,
}

impl MemorySheet {
    fn new(id: SheetId, name: &str, cols: usize, rows: usize) -> Self {
        Self {
            id,
            name: name.to_string(),
            cols,
            rows,
            cells: FxHashMap::default(),
            percent: FxHashSet::default(),
            merges: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitRecord {
    pub position: CellPosition,
    pub content: String,
}

type Validator = Box<dyn Fn(&str) -> Result<(), String>>;

pub struct MemoryWorkbook {
    sheets: RefCell<Vec<MemorySheet>>,
    active: Cell<SheetId>,
    next_id: Cell<u32>,
    locale: RefCell<Locale>,
    validator: RefCell<Option<Validator>>,
    pivots: RefCell<FxHashMap<(SheetId, usize, usize), PivotCellInfo>>,
    notifications: RefCell<Vec<Notification>>,
    commits: RefCell<Vec<CommitRecord>>,
    activations: RefCell<Vec<SheetId>>,
    captured_activations: RefCell<Vec<SheetId>>,
    capture: RefCell<Option<(OwnerId, Zone)>>,
}

impl Default for MemoryWorkbook {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryWorkbook {
    /// A workbook with one empty sheet named `Sheet1`.
    pub fn new() -> Self {
        let first = SheetId::from_raw(1);
        Self {
            sheets: RefCell::new(vec![MemorySheet::new(first, "Sheet1", DEFAULT_COLS, DEFAULT_ROWS)]),
            active: Cell::new(first),
            next_id: Cell::new(2),
            locale: RefCell::new(Locale::en_us()),
            validator: RefCell::new(None),
            pivots: RefCell::new(FxHashMap::default()),
            notifications: RefCell::new(Vec::new()),
            commits: RefCell::new(Vec::new()),
            activations: RefCell::new(Vec::new()),
            captured_activations: RefCell::new(Vec::new()),
            capture: RefCell::new(None),
        }
    }

    /// Bundle this workbook as the collaborators of a session, with function
    /// name autocomplete.
    pub fn collaborators(self: &Rc<Self>, max_proposals: usize) -> Collaborators {
        let functions: Rc<dyn FunctionRegistry> = Rc::new(BuiltinFunctions);
        let resolver: Rc<dyn ZoneResolver> = self.clone();
        let target: Rc<dyn EditTarget> = self.clone();
        let notifications: Rc<dyn NotificationSink> = self.clone();
        let selection: Rc<dyn SelectionSource> = self.clone();
        let locale: Rc<dyn LocaleProvider> = self.clone();
        let pivots: Rc<dyn PivotFormulaBuilder> = self.clone();
        Collaborators {
            resolver,
            target,
            notifications,
            selection,
            locale,
            functions: functions.clone(),
            pivots: Some(pivots),
            providers: vec![Box::new(FunctionProposals::new(functions, max_proposals))],
        }
    }

    // ------------------------------------------------------------------------
    // Setup
    // ------------------------------------------------------------------------

    pub fn first_sheet(&self) -> SheetId {
        self.sheets.borrow().first().map(|s| s.id).unwrap_or(self.active.get())
    }

    pub fn add_sheet(&self, name: &str, cols: usize, rows: usize) -> SheetId {
        let id = SheetId::from_raw(self.next_id.get());
        self.next_id.set(self.next_id.get() + 1);
        self.sheets.borrow_mut().push(MemorySheet::new(id, name, cols, rows));
        id
    }

    pub fn set_active_sheet(&self, sheet: SheetId) {
        self.active.set(sheet);
    }

    pub fn set_locale(&self, locale: Locale) {
        *self.locale.borrow_mut() = locale;
    }

    pub fn set_cell(&self, position: CellPosition, content: &str) {
        self.with_sheet(position.sheet, |sheet| {
            sheet.cells.insert((position.col, position.row), content.to_string());
        });
    }

    pub fn set_percent_format(&self, position: CellPosition) {
        self.with_sheet(position.sheet, |sheet| {
            sheet.percent.insert((position.col, position.row));
        });
    }

    pub fn add_merge(&self, sheet: SheetId, zone: Zone) {
        self.with_sheet(sheet, |sheet| sheet.merges.push(zone));
    }

    pub fn set_validator(&self, validator: impl Fn(&str) -> Result<(), String> + 'static) {
        *self.validator.borrow_mut() = Some(Box::new(validator));
    }

    pub fn set_pivot_cell(&self, sheet: SheetId, col: usize, row: usize, info: PivotCellInfo) {
        self.pivots.borrow_mut().insert((sheet, col, row), info);
    }

    fn with_sheet(&self, id: SheetId, f: impl FnOnce(&mut MemorySheet)) {
        match self.sheets.borrow_mut().iter_mut().find(|s| s.id == id) {
            Some(sheet) => f(sheet),
            None => log::warn!("no sheet {:?}", id),
        }
    }

    // ------------------------------------------------------------------------
    // Inspection
    // ------------------------------------------------------------------------

    pub fn cell(&self, position: CellPosition) -> Option<String> {
        let sheets = self.sheets.borrow();
        let sheet = sheets.iter().find(|s| s.id == position.sheet)?;
        sheet.cells.get(&(position.col, position.row)).cloned()
    }

    pub fn notifications(&self) -> Vec<Notification> {
        self.notifications.borrow().clone()
    }

    pub fn commits(&self) -> Vec<CommitRecord> {
        self.commits.borrow().clone()
    }

    /// Sheets brought back to front after a commit, in order.
    pub fn activations(&self) -> Vec<SheetId> {
        self.activations.borrow().clone()
    }

    /// Activations that happened while a session still held the selection.
    pub fn captured_activations(&self) -> Vec<SheetId> {
        self.captured_activations.borrow().clone()
    }

    pub fn captured_by(&self) -> Option<OwnerId> {
        self.capture.borrow().map(|(owner, _)| owner)
    }
}

impl ZoneResolver for MemoryWorkbook {
    fn active_sheet(&self) -> SheetId {
        self.active.get()
    }

    fn sheet_by_name(&self, name: &str) -> Option<SheetId> {
        self.sheets
            .borrow()
            .iter()
            .find(|s| s.name.eq_ignore_ascii_case(name))
            .map(|s| s.id)
    }

    fn sheet_name(&self, sheet: SheetId) -> Option<String> {
        self.sheets.borrow().iter().find(|s| s.id == sheet).map(|s| s.name.clone())
    }

    fn sheet_size(&self, sheet: SheetId) -> Option<(usize, usize)> {
        self.sheets.borrow().iter().find(|s| s.id == sheet).map(|s| (s.cols, s.rows))
    }

    fn expand_to_merge(&self, sheet: SheetId, zone: Zone) -> Zone {
        self.sheets
            .borrow()
            .iter()
            .find(|s| s.id == sheet)
            .and_then(|s| s.merges.iter().find(|m| m.includes(&zone)).copied())
            .unwrap_or(zone)
    }
}

impl EditTarget for MemoryWorkbook {
    fn fetch(&self, position: &CellPosition) -> String {
        self.cell(*position).unwrap_or_default()
    }

    fn validate(&self, _position: &CellPosition, content: &str) -> Result<(), String> {
        match self.validator.borrow().as_ref() {
            Some(validator) => validator(content),
            None => Ok(()),
        }
    }

    fn commit(&self, position: &CellPosition, content: &str) {
        self.set_cell(*position, content);
        self.commits.borrow_mut().push(CommitRecord { position: *position, content: content.to_string() });
    }

    fn displays_percent(&self, position: &CellPosition) -> bool {
        self.sheets
            .borrow()
            .iter()
            .find(|s| s.id == position.sheet)
            .is_some_and(|s| s.percent.contains(&(position.col, position.row)))
    }

    fn activate_sheet(&self, sheet: SheetId) {
        self.active.set(sheet);
        self.activations.borrow_mut().push(sheet);
        if self.capture.borrow().is_some() {
            self.captured_activations.borrow_mut().push(sheet);
        }
    }
}

impl NotificationSink for MemoryWorkbook {
    fn notify(&self, notification: Notification) {
        log::debug!("notification: {:?} {}", notification.level, notification.text);
        self.notifications.borrow_mut().push(notification);
    }
}

impl SelectionSource for MemoryWorkbook {
    fn capture(&self, owner: OwnerId, anchor: Zone) {
        *self.capture.borrow_mut() = Some((owner, anchor));
    }

    fn release(&self, owner: OwnerId) {
        let mut capture = self.capture.borrow_mut();
        if capture.is_some_and(|(current, _)| current == owner) {
            *capture = None;
        }
    }
}

impl LocaleProvider for MemoryWorkbook {
    fn locale(&self) -> Locale {
        self.locale.borrow().clone()
    }
}

fn quoted(text: &str) -> String {
    format!("\"{}\"", text.replace('"', "\"\""))
}

impl PivotFormulaBuilder for MemoryWorkbook {
    fn pivot_cell_at(&self, sheet: SheetId, col: usize, row: usize) -> Option<PivotCellInfo> {
        self.pivots.borrow().get(&(sheet, col, row)).cloned()
    }

    /// `PIVOT.VALUE(id,"measure","field","value",...)` for values,
    /// `PIVOT.HEADER(id,"field","value",...)` for headers.
    fn shorthand(&self, pivot_id: &str, cell: &PivotCell) -> Option<String> {
        let mut args = vec![pivot_id.to_string()];
        if let Some(measure) = &cell.measure {
            args.push(quoted(measure));
        }
        for (field, value) in &cell.domain {
            args.push(quoted(field));
            args.push(quoted(value));
        }
        let function = if cell.measure.is_some() { "PIVOT.VALUE" } else { "PIVOT.HEADER" };
        Some(format!("{}({})", function, args.join(",")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_references_on_named_sheets() {
        let book = MemoryWorkbook::new();
        let data = book.add_sheet("My Data", 10, 20);
        let s1 = book.first_sheet();

        assert_eq!(book.resolve("B2", s1), Some((s1, Zone::single(1, 1))));
        assert_eq!(book.resolve("'my data'!A1:B3", s1), Some((data, Zone::new(0, 0, 1, 2))));
        assert_eq!(book.resolve("A:A", data), Some((data, Zone::new(0, 0, 0, 19))));
        assert_eq!(book.resolve("Nope!A1", s1), None);
    }

    #[test]
    fn formats_cross_sheet_references() {
        let book = MemoryWorkbook::new();
        let data = book.add_sheet("My Data", 10, 20);
        let s1 = book.first_sheet();
        let parts = [composer_core::RangePart::RELATIVE; 2];

        let zone = Zone::new(0, 0, 1, 1).into();
        assert_eq!(book.format_zone(&zone, &parts, s1, s1), "A1:B2");
        assert_eq!(book.format_zone(&zone, &parts, data, s1), "'My Data'!A1:B2");
    }

    #[test]
    fn whole_column_picks_become_open_zones() {
        let book = MemoryWorkbook::new();
        let s1 = book.first_sheet();
        let parts = [composer_core::RangePart::RELATIVE; 2];

        let columns = book.unbounded_zone(s1, Zone::new(1, 0, 2, DEFAULT_ROWS - 1));
        assert_eq!(book.format_zone(&columns, &parts, s1, s1), "B:C");

        let rows = book.unbounded_zone(s1, Zone::new(0, 4, DEFAULT_COLS - 1, 4));
        assert_eq!(book.format_zone(&rows, &parts, s1, s1), "5:5");

        let sheet = book.unbounded_zone(s1, Zone::new(0, 0, DEFAULT_COLS - 1, DEFAULT_ROWS - 1));
        assert_eq!(book.format_zone(&sheet, &parts, s1, s1), "A:Z");
    }

    #[test]
    fn merges_expand_single_cells() {
        let book = MemoryWorkbook::new();
        let s1 = book.first_sheet();
        book.add_merge(s1, Zone::new(0, 0, 1, 1));
        assert_eq!(book.expand_to_merge(s1, Zone::single(1, 0)), Zone::new(0, 0, 1, 1));
        assert_eq!(book.expand_to_merge(s1, Zone::single(3, 3)), Zone::single(3, 3));
    }

    #[test]
    fn release_only_by_the_capturing_owner() {
        let book = MemoryWorkbook::new();
        book.capture(OwnerId(1), Zone::single(0, 0));
        book.release(OwnerId(2));
        assert_eq!(book.captured_by(), Some(OwnerId(1)));
        book.release(OwnerId(1));
        assert_eq!(book.captured_by(), None);
    }

    #[test]
    fn pivot_shorthand() {
        let book = MemoryWorkbook::new();
        let cell = PivotCell {
            measure: Some("Revenue".to_string()),
            domain: vec![("Region".to_string(), "East".to_string())],
        };
        assert_eq!(book.shorthand("1", &cell).as_deref(), Some("PIVOT.VALUE(1,\"Revenue\",\"Region\",\"East\")"));

        let header = PivotCell { measure: None, domain: vec![("Region".to_string(), "West".to_string())] };
        assert_eq!(book.shorthand("2", &header).as_deref(), Some("PIVOT.HEADER(2,\"Region\",\"West\")"));
    }
}

//! Composer edit session
//!
//! One session per formula input. It owns the text, the selection inside the
//! text and everything derived from them (tokens, mode, highlight colors),
//! and talks to the rest of the application through [`Collaborators`].
//!
//! Every content change goes through [`ComposerSession::apply`]: re-tokenize,
//! clamp the selection, sync colors, recompute the mode.

use std::rc::Rc;

use composer_config::settings::DEFAULT_PALETTE;
use composer_config::{format_hex_color, Settings};
use composer_core::reference::{format_zone, split_sheet_prefix, ReferenceText};
use composer_core::text::{splice_utf16, utf16_len};
use composer_core::{CellPosition, RangePart, Selection, SheetId, UnboundedZone, Zone};
use composer_engine::formula::number::DEFAULT_SHAPE_CACHE_CAPACITY;
use composer_engine::formula::{
    composer_tokenize_with_limit, parse_number, EnrichedToken, LexError, NumberParser, TokenType, MAX_TOKENS,
};
use rustc_hash::FxHashSet;
use serde::Serialize;

use crate::autocomplete::{build_proposals, AutocompleteContext, Proposal, ProposalKind};
use crate::colors::{normalize_key, palette_color, ColorIndexMap};
use crate::cycle;
use crate::env::{
    Capabilities, Collaborators, Notification, OwnerId, SelectionEvent, SelectionEventMode,
};
use crate::error::SessionError;
use crate::style::{styled_tokens, StyledToken};

const RELATIVE_PARTS: [RangePart; 2] = [RangePart::RELATIVE, RangePart::RELATIVE];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EditionMode {
    Inactive,
    Editing,
    /// The caret sits where a range can be picked from the grid.
    Selecting,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CommitOutcome {
    Committed,
    /// The validator refused the content; the session is still open.
    Rejected,
    /// Nothing was being edited.
    Inactive,
}

/// Structural edits made to the workbook while a session is open.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StructureChange {
    SheetDeleted(SheetId),
    RowsRemoved { sheet: SheetId, start: usize, count: usize },
    RowsInserted { sheet: SheetId, before: usize, count: usize },
    ColumnsRemoved { sheet: SheetId, start: usize, count: usize },
    ColumnsInserted { sheet: SheetId, before: usize, count: usize },
}

fn shift_removed(index: usize, start: usize, count: usize) -> Option<usize> {
    if index < start {
        Some(index)
    } else if index < start + count {
        None
    } else {
        Some(index - count)
    }
}

fn shift_inserted(index: usize, before: usize, count: usize) -> usize {
    if index >= before {
        index + count
    } else {
        index
    }
}

impl StructureChange {
    /// Where `position` ends up after the change, `None` if it was removed.
    pub fn translate(&self, position: CellPosition) -> Option<CellPosition> {
        let mut moved = position;
        match *self {
            Self::SheetDeleted(sheet) => {
                if sheet == position.sheet {
                    return None;
                }
            }
            Self::RowsRemoved { sheet, start, count } if sheet == position.sheet => {
                moved.row = shift_removed(position.row, start, count)?;
            }
            Self::RowsInserted { sheet, before, count } if sheet == position.sheet => {
                moved.row = shift_inserted(position.row, before, count);
            }
            Self::ColumnsRemoved { sheet, start, count } if sheet == position.sheet => {
                moved.col = shift_removed(position.col, start, count)?;
            }
            Self::ColumnsInserted { sheet, before, count } if sheet == position.sheet => {
                moved.col = shift_inserted(position.col, before, count);
            }
            _ => {}
        }
        Some(moved)
    }
}

/// A reference drawn on the grid while editing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Highlight {
    pub zone: Zone,
    pub color: String,
    pub sheet: SheetId,
    /// The zone is on the edited sheet and can be dragged.
    pub interactive: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionOptions {
    pub palette: Vec<u32>,
    pub shape_cache_capacity: usize,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self { palette: DEFAULT_PALETTE.to_vec(), shape_cache_capacity: DEFAULT_SHAPE_CACHE_CAPACITY }
    }
}

impl SessionOptions {
    pub fn from_settings(settings: &Settings) -> Self {
        Self { palette: settings.palette_colors(), shape_cache_capacity: settings.shape_cache_capacity }
    }
}

/// Span of a reference token without its surrounding whitespace.
fn reference_span(token: &EnrichedToken) -> Selection {
    let leading = utf16_len(&token.value[..token.value.len() - token.value.trim_start().len()]);
    let trailing = utf16_len(&token.value[token.value.trim_end().len()..]);
    Selection::new(token.start + leading, token.end.saturating_sub(trailing).max(token.start + leading))
}

fn reference_parts(token: &EnrichedToken) -> [RangePart; 2] {
    ReferenceText::parse(&token.value).map(|r| r.parts).unwrap_or(RELATIVE_PARTS)
}

pub struct ComposerSession {
    owner: OwnerId,
    env: Collaborators,
    caps: Capabilities,
    options: SessionOptions,
    numbers: NumberParser,

    mode: EditionMode,
    position: Option<CellPosition>,
    content: String,
    initial_content: String,
    tokens: Vec<EnrichedToken>,
    selection: Selection,
    colors: ColorIndexMap,
    last_lex_error: Option<LexError>,
    captured: bool,
    /// Span of the reference inserted by the last grid pick.
    picked: Option<Selection>,
}

impl ComposerSession {
    pub fn new(owner: OwnerId, env: Collaborators, caps: Capabilities, options: SessionOptions) -> Self {
        let numbers = NumberParser::new(env.locale.locale(), options.shape_cache_capacity);
        Self {
            owner,
            env,
            caps,
            options,
            numbers,
            mode: EditionMode::Inactive,
            position: None,
            content: String::new(),
            initial_content: String::new(),
            tokens: Vec::new(),
            selection: Selection::default(),
            colors: ColorIndexMap::new(),
            last_lex_error: None,
            captured: false,
            picked: None,
        }
    }

    // ========================================================================
    // Observers
    // ========================================================================

    pub fn edition_mode(&self) -> EditionMode {
        self.mode
    }

    pub fn is_active(&self) -> bool {
        self.mode != EditionMode::Inactive
    }

    pub fn capabilities(&self) -> Capabilities {
        self.caps
    }

    pub fn current_content(&self) -> &str {
        &self.content
    }

    pub fn current_tokens(&self) -> &[EnrichedToken] {
        &self.tokens
    }

    pub fn selection(&self) -> Selection {
        self.selection
    }

    pub fn edited_position(&self) -> Option<CellPosition> {
        self.position
    }

    pub fn last_lex_error(&self) -> Option<&LexError> {
        self.last_lex_error.as_ref()
    }

    /// True while the content differs from what the cell held at start.
    pub fn is_dirty(&self) -> bool {
        self.is_active() && self.content != self.initial_content
    }

    pub fn is_capturing_selection(&self) -> bool {
        self.captured
    }

    fn cursor_index(&self) -> Option<usize> {
        if self.selection == Selection::caret(0) {
            return None;
        }
        let (min, max) = (self.selection.min(), self.selection.max());
        self.tokens.iter().position(|t| t.covers(min, max))
    }

    pub fn token_at_cursor(&self) -> Option<&EnrichedToken> {
        self.cursor_index().map(|i| &self.tokens[i])
    }

    /// True if a range typed or picked at the caret would form a valid
    /// operand: an operator, `(` or separator on the left, and the end of the
    /// formula, `)`, an operator or a separator on the right.
    pub fn can_start_range_selection(&self) -> bool {
        self.range_slot_open(false)
    }

    /// With `sticky`, a reference just picked from the grid with the caret on
    /// it counts as the empty slot it fills.
    fn range_slot_open(&self, sticky: bool) -> bool {
        let Some(idx) = self.cursor_index() else {
            return false;
        };
        let token = &self.tokens[idx];
        let picked = sticky
            && token.token_type == TokenType::Reference
            && self.picked == Some(reference_span(token));

        let left_end = if picked {
            match idx.checked_sub(1) {
                Some(i) => i,
                None => return false,
            }
        } else {
            idx
        };

        let left_ok = match self.tokens[..=left_end].iter().rev().find(|t| t.token_type != TokenType::Space) {
            Some(t) => match t.token_type {
                TokenType::ArgSeparator | TokenType::LeftParen => true,
                // `%` is postfix
                TokenType::Operator => t.value != "%",
                _ => false,
            },
            None => false,
        };
        if !left_ok {
            return false;
        }

        match self.tokens[idx + 1..].iter().find(|t| t.token_type != TokenType::Space) {
            None => true,
            Some(t) => matches!(
                t.token_type,
                TokenType::ArgSeparator | TokenType::RightParen | TokenType::Operator
            ),
        }
    }

    /// Every reference of the formula that resolves, once per distinct text.
    pub fn highlights(&self) -> Vec<Highlight> {
        let Some(position) = self.position.filter(|_| self.is_active()) else {
            return Vec::new();
        };
        let mut seen = FxHashSet::default();
        self.tokens
            .iter()
            .filter(|t| t.token_type == TokenType::Reference)
            .filter(|t| seen.insert(normalize_key(&t.value)))
            .filter_map(|t| {
                let (sheet, zone) = self.env.resolver.resolve(&t.value, position.sheet)?;
                let index = self.colors.index_of(&t.value).unwrap_or(0);
                Some(Highlight {
                    zone,
                    color: format_hex_color(palette_color(&self.options.palette, index)),
                    sheet,
                    interactive: sheet == position.sheet,
                })
            })
            .collect()
    }

    pub fn styled_tokens(&self) -> Vec<StyledToken> {
        styled_tokens(&self.tokens, self.selection, &self.colors)
    }

    pub fn autocomplete_proposals(&self) -> Vec<Proposal> {
        if !self.is_active() {
            return Vec::new();
        }
        let Some(token) = self.token_at_cursor() else {
            return Vec::new();
        };
        let ctx = AutocompleteContext {
            token,
            content: &self.content,
            initial_content: &self.initial_content,
            selecting: self.mode == EditionMode::Selecting,
        };
        build_proposals(&self.env.providers, &ctx)
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// Open an edit of `position`. `initial_text` replaces the cell content
    /// (typing over a cell); without it the current content is edited.
    pub fn start(&mut self, position: CellPosition, initial_text: Option<&str>, selection: Option<Selection>) {
        if self.is_active() {
            log::debug!("start ignored: already editing {:?}", self.position);
            return;
        }

        let snapshot = self.env.target.fetch(&position);
        let mut content = initial_text.map(str::to_string).unwrap_or_else(|| snapshot.clone());
        let mut selection = selection;

        if let Some(text) = initial_text {
            if self.caps.percent_aware_input && self.is_plain_number(text) && self.env.target.displays_percent(&position)
            {
                content.push('%');
                selection = Some(Selection::caret(utf16_len(text)));
            }
        }

        self.position = Some(position);
        self.initial_content = snapshot;
        self.colors.clear();
        self.picked = None;
        self.mode = EditionMode::Editing;

        let len = utf16_len(&content);
        let selection = selection.filter(|s| s.max() <= len).unwrap_or(Selection::caret(len));
        self.apply(content, selection);

        self.env.selection.capture(self.owner, Zone::single(position.col, position.row));
        self.captured = true;
        log::debug!("edit started at {:?} in {:?} mode", position, self.mode);
    }

    fn is_plain_number(&self, text: &str) -> bool {
        !text.starts_with('=') && !text.contains('%') && parse_number(text, &self.env.locale.locale()).is_some()
    }

    /// Commit the content. Unclosed parentheses are closed first.
    pub fn stop(&mut self) -> CommitOutcome {
        let Some(position) = self.position.filter(|_| self.is_active()) else {
            return CommitOutcome::Inactive;
        };

        let mut content = self.content.clone();
        if content.starts_with('=') {
            let (open, close) = self.tokens.iter().fold((0usize, 0usize), |(open, close), t| match t.token_type {
                TokenType::LeftParen => (open + 1, close),
                TokenType::RightParen => (open, close + 1),
                _ => (open, close),
            });
            content.push_str(&")".repeat(open.saturating_sub(close)));
        }

        if self.tokens.len() > MAX_TOKENS {
            log::debug!("committing an oversized formula at {:?}", position);
            self.env.notifications.notify(Notification::warning(format!(
                "This formula has more than {MAX_TOKENS} tokens and may be slow to edit"
            )));
        }

        if self.caps.validate_on_commit {
            if let Err(message) = self.env.target.validate(&position, &content) {
                log::debug!("commit rejected at {:?}: {}", position, message);
                self.env.notifications.notify(Notification::error(message));
                return CommitOutcome::Rejected;
            }
        }

        self.env.target.commit(&position, &content);
        if self.caps.return_to_edited_sheet && self.env.resolver.active_sheet() != position.sheet {
            self.env.target.activate_sheet(position.sheet);
        }
        self.finish(content);
        log::debug!("edit committed at {:?}", position);
        CommitOutcome::Committed
    }

    /// Drop the edit; the content goes back to what the cell held.
    pub fn cancel(&mut self) {
        if !self.is_active() {
            return;
        }
        log::debug!("edit cancelled at {:?}", self.position);
        let snapshot = std::mem::take(&mut self.initial_content);
        self.finish(snapshot);
    }

    fn finish(&mut self, content: String) {
        if self.captured {
            self.env.selection.release(self.owner);
            self.captured = false;
        }
        self.mode = EditionMode::Inactive;
        self.picked = None;
        let len = utf16_len(&content);
        self.apply(content, Selection::caret(len));
        self.position = None;
    }

    /// React to a structural change of the workbook.
    pub fn on_structure_change(&mut self, change: StructureChange) {
        let Some(position) = self.position.filter(|_| self.is_active()) else {
            return;
        };
        match change.translate(position) {
            Some(moved) => {
                if moved != position {
                    log::debug!("edited cell moved from {:?} to {:?}", position, moved);
                }
                self.position = Some(moved);
            }
            None => {
                log::warn!("edited cell {:?} was removed by {:?}, cancelling", position, change);
                self.env.notifications.notify(Notification::error("The edited cell was removed"));
                self.cancel();
            }
        }
    }

    // ========================================================================
    // Text edits
    // ========================================================================

    /// Replace the whole content. The selection defaults to a caret at the end.
    pub fn set_content(&mut self, text: &str, selection: Option<Selection>) {
        if !self.is_active() {
            return;
        }
        let len = utf16_len(text);
        let selection = selection.filter(|s| s.max() <= len).unwrap_or(Selection::caret(len));
        self.picked = None;
        self.apply(text.to_string(), selection);
    }

    /// Replace the selected text (or insert at the caret).
    pub fn replace_selection(&mut self, text: &str) {
        if !self.is_active() {
            return;
        }
        let at = self.selection.min();
        let content = splice_utf16(&self.content, self.selection.start, self.selection.end, text);
        self.picked = None;
        self.apply(content, Selection::caret(at + utf16_len(text)));
    }

    /// Move the selection. Bounds outside the content are ignored.
    pub fn change_selection(&mut self, start: usize, end: usize) {
        if !self.is_active() {
            return;
        }
        let len = utf16_len(&self.content);
        if start > len || end > len {
            log::trace!("selection {start}..{end} out of bounds (len {len})");
            return;
        }
        let selection = Selection::new(start, end);
        self.picked = self.picked.filter(|p| p.min() <= selection.min() && selection.max() <= p.max());
        self.selection = selection;
        self.recompute_mode();
    }

    pub fn stop_range_selection(&mut self) {
        if self.mode == EditionMode::Selecting {
            log::debug!("range selection stopped");
            self.mode = EditionMode::Editing;
        }
    }

    /// Cycle the `$` markers of the references under the selection.
    pub fn cycle_references(&mut self) {
        if !self.is_active() {
            return;
        }
        let Some((content, selection)) = cycle::cycle_references(&self.content, &self.tokens, self.selection) else {
            return;
        };
        let was_picking = self.picked.take().is_some();
        self.apply(content, selection);

        // Keep extending the reference that was just picked and cycled
        if was_picking {
            self.picked = self
                .token_at_cursor()
                .filter(|t| t.token_type == TokenType::Reference)
                .map(reference_span);
            self.recompute_mode();
        }
    }

    /// Insert an autocomplete proposal, replacing the name being typed.
    pub fn accept_proposal(&mut self, proposal: &Proposal) {
        if !self.is_active() {
            return;
        }
        let (span, next) = match self.cursor_index() {
            Some(i) if matches!(self.tokens[i].token_type, TokenType::Symbol | TokenType::Function) => {
                let token = &self.tokens[i];
                (Selection::new(token.start, token.end), self.tokens.get(i + 1))
            }
            _ => (self.selection, None),
        };

        let mut text = proposal.text.clone();
        if proposal.kind == ProposalKind::Function && !next.is_some_and(|t| t.token_type == TokenType::LeftParen) {
            text.push('(');
        }

        let content = splice_utf16(&self.content, span.min(), span.max(), &text);
        let caret = span.min() + utf16_len(&text);
        self.picked = None;
        self.apply(content, Selection::caret(caret));
    }

    // ========================================================================
    // Range picking
    // ========================================================================

    /// Grid selection changed while captured.
    pub fn on_selection_event(&mut self, event: SelectionEvent) -> Result<(), SessionError> {
        let Some(position) = self.position.filter(|_| self.is_active()) else {
            return Ok(());
        };

        match (event.mode, self.mode) {
            (SelectionEventMode::NewAnchor, EditionMode::Selecting) => {
                let reference = self.render_pick(&event, RELATIVE_PARTS, position);
                let text = if self.can_start_range_selection() {
                    reference.clone()
                } else {
                    format!("{}{}", self.env.locale.locale().arg_separator, reference)
                };
                let offset = utf16_len(&text) - utf16_len(&reference);
                self.insert_pick(self.selection, &text, offset);
                Ok(())
            }
            (SelectionEventMode::UpdateAnchor, EditionMode::Selecting) => {
                let (min, max) = (self.selection.min(), self.selection.max());
                let target = self
                    .tokens
                    .iter()
                    .find(|t| t.token_type == TokenType::Reference && t.covers(min, max))
                    .map(|t| (reference_span(t), reference_parts(t)));
                let (span, parts) = match (target, self.picked) {
                    (Some(found), _) => found,
                    (None, Some(picked)) if picked.max() <= utf16_len(&self.content) => (picked, RELATIVE_PARTS),
                    (None, _) => (self.selection, RELATIVE_PARTS),
                };
                let reference = self.render_pick(&event, parts, position);
                self.insert_pick(span, &reference, 0);
                Ok(())
            }
            (SelectionEventMode::UpdateAnchor, EditionMode::Editing) => self.reanchor(&event, position),
            _ => {
                log::trace!("selection event {:?} ignored in {:?} mode", event.mode, self.mode);
                Ok(())
            }
        }
    }

    /// The selection source dropped the capture.
    pub fn on_selection_released(&mut self) {
        self.captured = false;
        self.stop_range_selection();
    }

    fn insert_pick(&mut self, span: Selection, text: &str, reference_offset: usize) {
        let start = span.min();
        let end = start + utf16_len(text);
        let content = splice_utf16(&self.content, span.min(), span.max(), text);
        self.picked = Some(Selection::new(start + reference_offset, end));
        self.apply(content, Selection::caret(end));
    }

    /// Text of the reference to a picked zone, as seen from the edited sheet.
    fn render_pick(&self, event: &SelectionEvent, parts: [RangePart; 2], position: CellPosition) -> String {
        let resolver = &self.env.resolver;
        let sheet = resolver.active_sheet();
        let mut zone = event.anchor;

        if zone.is_single() {
            if let Some(shorthand) = self.pivot_shorthand(sheet, zone) {
                return shorthand;
            }
            zone = resolver.expand_to_merge(sheet, zone);
        }

        let unbounded = if event.unbounded { resolver.unbounded_zone(sheet, zone) } else { UnboundedZone::from(zone) };
        resolver.format_zone(&unbounded, &parts, sheet, position.sheet)
    }

    fn pivot_shorthand(&self, sheet: SheetId, zone: Zone) -> Option<String> {
        let pivots = self.env.pivots.as_ref()?;
        let info = pivots.pivot_cell_at(sheet, zone.left, zone.top)?;
        if info.is_pivot_formula {
            return None;
        }
        pivots.shorthand(&info.pivot_id, &info.cell)
    }

    /// Move an existing reference after its highlight was dragged on the grid.
    fn reanchor(&mut self, event: &SelectionEvent, position: CellPosition) -> Result<(), SessionError> {
        let previous = event.previous_anchor.unwrap_or(event.anchor);
        let resolver = Rc::clone(&self.env.resolver);

        let Some(token) = self.tokens.iter().find(|t| {
            t.token_type == TokenType::Reference
                && resolver.resolve(&t.value, position.sheet) == Some((position.sheet, previous))
        }) else {
            log::warn!("no reference to {:?} in '{}'", previous, self.content);
            return Err(SessionError::ReferenceNotFound { zone: previous });
        };

        let parsed = ReferenceText::parse(&token.value);
        let parts = parsed.as_ref().map(|r| r.parts).unwrap_or(RELATIVE_PARTS);
        let was_unbounded = parsed.as_ref().is_some_and(|r| r.zone.right.is_none() || r.zone.bottom.is_none());
        let zone = if was_unbounded {
            resolver.unbounded_zone(position.sheet, event.anchor)
        } else {
            UnboundedZone::from(event.anchor)
        };

        let (prefix, _) = split_sheet_prefix(token.value.trim());
        let text = format!("{}{}", prefix.unwrap_or(""), format_zone(&zone, &parts));
        let span = reference_span(token);

        let content = splice_utf16(&self.content, span.min(), span.max(), &text);
        let selection = self.selection;
        self.apply(content, selection);
        Ok(())
    }

    // ========================================================================
    // Derived state
    // ========================================================================

    fn apply(&mut self, content: String, selection: Selection) {
        self.content = content;
        self.retokenize();

        let len = utf16_len(&self.content);
        self.selection = if selection.max() <= len { selection } else { Selection::caret(len) };

        self.colors.update(
            self.tokens
                .iter()
                .filter(|t| t.token_type == TokenType::Reference)
                .map(|t| t.value.as_str()),
        );
        self.recompute_mode();
    }

    fn retokenize(&mut self) {
        self.last_lex_error = None;
        if !self.content.starts_with('=') {
            self.tokens.clear();
            return;
        }

        let locale = self.env.locale.locale();
        if *self.numbers.locale() != locale {
            log::debug!("locale changed to {}", locale.code);
            self.numbers = NumberParser::new(locale, self.options.shape_cache_capacity);
        }

        // Long formulas stay editable; only commit warns about them
        match composer_tokenize_with_limit(&self.content, &mut self.numbers, self.env.functions.as_ref(), None) {
            Ok(tokens) => self.tokens = tokens,
            Err(e) => {
                log::debug!("tokenize failed: {e}");
                self.tokens.clear();
                self.last_lex_error = Some(e);
            }
        }
    }

    fn recompute_mode(&mut self) {
        if self.mode == EditionMode::Inactive {
            return;
        }
        let mode = if self.range_slot_open(true) { EditionMode::Selecting } else { EditionMode::Editing };
        if mode != self.mode {
            log::trace!("mode {:?} -> {:?}", self.mode, mode);
            self.mode = mode;
        }
    }
}

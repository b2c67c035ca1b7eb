//! Edit scripts
//!
//! A plain-text list of user actions replayed against an in-memory workbook
//! and one composer session. One command per line; blank lines and lines
//! starting with `#` are skipped. Text arguments run to the end of the line,
//! or may be written as a JSON string to keep surrounding spaces.
//!
//! ```text
//! type =SUM(
//! pick B2
//! extend B2:C5
//! type )
//! commit
//! ```

use std::fmt;
use std::io::Write;
use std::rc::Rc;

use composer_core::text::utf16_to_byte;
use composer_core::{ReferenceText, Selection, Zone};
use composer_engine::Locale;
use composer_session::{
    CommitOutcome, ComposerSession, MemoryWorkbook, SelectionEvent, SelectionEventMode, SessionError, ZoneResolver,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Replace the selection with text, as typing does.
    Type(String),
    /// Replace the whole content.
    Set(String),
    Caret(usize),
    Select(usize, usize),
    /// Click on the grid: a new anchor.
    Pick(String),
    /// Shift-click or drag: the current anchor grows or moves.
    Extend(String),
    /// Drag a highlighted reference from one zone to another.
    Drag { from: String, to: String },
    /// The grid dropped its selection capture.
    Release,
    Cycle,
    StopRange,
    /// Accept the n-th proposal (1-based).
    Accept(usize),
    /// Switch to a sheet, creating it if needed.
    Sheet(String),
    /// Put content in a cell of the active sheet.
    Cell { reference: String, content: String },
    Merge(String),
    Locale(String),
    Show,
    Commit,
    Cancel,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptLine {
    pub line: usize,
    pub command: Command,
}

#[derive(Debug)]
pub enum ScriptError {
    Syntax { line: usize, message: String },
    Session { line: usize, source: SessionError },
    Io(String),
}

impl fmt::Display for ScriptError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Syntax { line, message } => write!(f, "line {}: {}", line, message),
            Self::Session { line, source } => write!(f, "line {}: {}", line, source),
            Self::Io(msg) => write!(f, "{}", msg),
        }
    }
}

impl std::error::Error for ScriptError {}

// ============================================================================
// Parsing
// ============================================================================

pub fn parse_script(text: &str) -> Result<Vec<ScriptLine>, ScriptError> {
    let mut lines = Vec::new();
    for (idx, raw) in text.lines().enumerate() {
        let line = idx + 1;
        let trimmed = raw.trim_start();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let command = parse_command(trimmed).map_err(|message| ScriptError::Syntax { line, message })?;
        lines.push(ScriptLine { line, command });
    }
    Ok(lines)
}

fn parse_command(line: &str) -> Result<Command, String> {
    let (name, rest) = match line.split_once(' ') {
        Some((name, rest)) => (name, rest),
        None => (line.trim_end(), ""),
    };

    let command = match name {
        "type" => Command::Type(text_arg(rest)?),
        "set" => Command::Set(text_arg(rest)?),
        "caret" => Command::Caret(number_arg(rest.trim())?),
        "select" => {
            let mut parts = rest.split_whitespace();
            let (Some(start), Some(end), None) = (parts.next(), parts.next(), parts.next()) else {
                return Err("select takes a start and an end offset".to_string());
            };
            Command::Select(number_arg(start)?, number_arg(end)?)
        }
        "pick" => Command::Pick(word_arg(name, rest)?),
        "extend" => Command::Extend(word_arg(name, rest)?),
        "drag" => {
            let mut parts = rest.split_whitespace();
            let (Some(from), Some(to), None) = (parts.next(), parts.next(), parts.next()) else {
                return Err("drag takes a source and a target reference".to_string());
            };
            Command::Drag { from: from.to_string(), to: to.to_string() }
        }
        "release" => Command::Release,
        "cycle" => Command::Cycle,
        "stop-range" => Command::StopRange,
        "accept" => {
            let rest = rest.trim();
            Command::Accept(if rest.is_empty() { 1 } else { number_arg(rest)? })
        }
        "sheet" => Command::Sheet(text_arg(rest)?),
        "cell" => {
            let rest = rest.trim_start();
            let (reference, content) = rest.split_once(' ').unwrap_or((rest, ""));
            if reference.is_empty() {
                return Err("cell takes a reference and its content".to_string());
            }
            Command::Cell { reference: reference.to_string(), content: text_arg(content)? }
        }
        "merge" => Command::Merge(word_arg(name, rest)?),
        "locale" => Command::Locale(word_arg(name, rest)?),
        "show" => Command::Show,
        "commit" => Command::Commit,
        "cancel" => Command::Cancel,
        other => return Err(format!("unknown command '{}'", other)),
    };
    Ok(command)
}

/// Rest of the line verbatim, or the decoded value of a JSON string.
fn text_arg(rest: &str) -> Result<String, String> {
    if rest.trim_start().starts_with('"') {
        return serde_json::from_str::<String>(rest.trim()).map_err(|e| format!("bad quoted text: {}", e));
    }
    Ok(rest.to_string())
}

fn word_arg(command: &str, rest: &str) -> Result<String, String> {
    let word = rest.trim();
    if word.is_empty() || word.contains(char::is_whitespace) {
        return Err(format!("{} takes exactly one argument", command));
    }
    Ok(word.to_string())
}

fn number_arg(text: &str) -> Result<usize, String> {
    text.parse().map_err(|_| format!("'{}' is not an offset", text))
}

// ============================================================================
// Execution
// ============================================================================

/// Sizes of sheets created by `sheet`.
const NEW_SHEET_COLS: usize = 26;
const NEW_SHEET_ROWS: usize = 1000;

/// Replay `lines`. `show` writes the session state to `out`. Returns the
/// outcome of the last `commit`, if any.
pub fn run_script(
    lines: &[ScriptLine],
    book: &Rc<MemoryWorkbook>,
    session: &mut ComposerSession,
    out: &mut dyn Write,
) -> Result<Option<CommitOutcome>, ScriptError> {
    let mut outcome = None;

    for ScriptLine { line, command } in lines {
        let line = *line;
        let syntax = |message: String| ScriptError::Syntax { line, message };
        log::debug!("line {}: {:?}", line, command);

        match command {
            Command::Type(text) => session.replace_selection(text),
            Command::Set(text) => session.set_content(text, None),
            Command::Caret(at) => session.change_selection(*at, *at),
            Command::Select(start, end) => session.change_selection(*start, *end),
            Command::Pick(xc) => {
                let event = selection_event(book, xc, SelectionEventMode::NewAnchor, None).map_err(syntax)?;
                session.on_selection_event(event).map_err(|source| ScriptError::Session { line, source })?;
            }
            Command::Extend(xc) => {
                let event = selection_event(book, xc, SelectionEventMode::UpdateAnchor, None).map_err(syntax)?;
                session.on_selection_event(event).map_err(|source| ScriptError::Session { line, source })?;
            }
            Command::Drag { from, to } => {
                let (_, previous) = resolve(book, from).map_err(syntax)?;
                let event =
                    selection_event(book, to, SelectionEventMode::UpdateAnchor, Some(previous)).map_err(syntax)?;
                session.on_selection_event(event).map_err(|source| ScriptError::Session { line, source })?;
            }
            Command::Release => session.on_selection_released(),
            Command::Cycle => session.cycle_references(),
            Command::StopRange => session.stop_range_selection(),
            Command::Accept(n) => {
                let proposals = session.autocomplete_proposals();
                let proposal = n
                    .checked_sub(1)
                    .and_then(|idx| proposals.get(idx))
                    .ok_or_else(|| syntax(format!("no proposal #{} ({} offered)", n, proposals.len())))?;
                session.accept_proposal(proposal);
            }
            Command::Sheet(name) => {
                let sheet = book
                    .sheet_by_name(name)
                    .unwrap_or_else(|| book.add_sheet(name, NEW_SHEET_COLS, NEW_SHEET_ROWS));
                book.set_active_sheet(sheet);
            }
            Command::Cell { reference, content } => {
                let (sheet, zone) = resolve(book, reference).map_err(syntax)?;
                book.set_cell(composer_core::CellPosition::new(sheet, zone.left, zone.top), content);
            }
            Command::Merge(xc) => {
                let (sheet, zone) = resolve(book, xc).map_err(syntax)?;
                book.add_merge(sheet, zone);
            }
            Command::Locale(code) => {
                let locale = Locale::from_code(code).ok_or_else(|| syntax(format!("unknown locale '{}'", code)))?;
                book.set_locale(locale);
            }
            Command::Show => {
                writeln!(out, "{}", describe(session)).map_err(|e| ScriptError::Io(e.to_string()))?;
            }
            Command::Commit => outcome = Some(session.stop()),
            Command::Cancel => session.cancel(),
        }
    }

    Ok(outcome)
}

fn resolve(book: &MemoryWorkbook, xc: &str) -> Result<(composer_core::SheetId, Zone), String> {
    book.resolve(xc, book.active_sheet())
        .ok_or_else(|| format!("'{}' is not a reference to an existing sheet", xc))
}

/// The grid event produced by selecting `xc`. A reference on another sheet
/// first brings that sheet to front, as navigating there would.
fn selection_event(
    book: &MemoryWorkbook,
    xc: &str,
    mode: SelectionEventMode,
    previous_anchor: Option<Zone>,
) -> Result<SelectionEvent, String> {
    let reference = ReferenceText::parse(xc).ok_or_else(|| format!("'{}' is not a reference", xc))?;
    let (sheet, anchor) = resolve(book, xc)?;
    if sheet != book.active_sheet() {
        book.set_active_sheet(sheet);
    }
    let unbounded = reference.zone.right.is_none() || reference.zone.bottom.is_none();
    Ok(SelectionEvent { mode, anchor, previous_anchor, unbounded })
}

/// One-line view of the session: mode, then the content with `|` at a caret
/// or `[...]` around a selection.
pub fn describe(session: &ComposerSession) -> String {
    format!("{:<9} {}", mode_label(session), mark_selection(session.current_content(), session.selection()))
}

pub fn mode_label(session: &ComposerSession) -> &'static str {
    match session.edition_mode() {
        composer_session::EditionMode::Inactive => "inactive",
        composer_session::EditionMode::Editing => "editing",
        composer_session::EditionMode::Selecting => "selecting",
    }
}

pub fn mark_selection(content: &str, selection: Selection) -> String {
    let start = utf16_to_byte(content, selection.min());
    let end = utf16_to_byte(content, selection.max());
    if start == end {
        format!("{}|{}", &content[..start], &content[start..])
    } else {
        format!("{}[{}]{}", &content[..start], &content[start..end], &content[end..])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use composer_core::CellPosition;
    use composer_session::{Capabilities, OwnerId, SessionOptions};

    fn session_on(book: &Rc<MemoryWorkbook>) -> ComposerSession {
        let mut session =
            ComposerSession::new(OwnerId(1), book.collaborators(10), Capabilities::cell_editor(), SessionOptions::default());
        session.start(CellPosition::new(book.first_sheet(), 0, 0), None, None);
        session
    }

    fn run(text: &str) -> (Rc<MemoryWorkbook>, ComposerSession, String, Option<CommitOutcome>) {
        let book = Rc::new(MemoryWorkbook::new());
        let mut session = session_on(&book);
        let lines = parse_script(text).unwrap();
        let mut out = Vec::new();
        let outcome = run_script(&lines, &book, &mut session, &mut out).unwrap();
        (book, session, String::from_utf8(out).unwrap(), outcome)
    }

    // =========================================================================
    // Parsing
    // =========================================================================

    #[test]
    fn comments_and_blank_lines_are_skipped() {
        let lines = parse_script("# setup\n\ntype =1\n   # indented comment\ncommit\n").unwrap();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0], ScriptLine { line: 3, command: Command::Type("=1".to_string()) });
        assert_eq!(lines[1].line, 5);
    }

    #[test]
    fn quoted_text_keeps_spaces() {
        let lines = parse_script("type \" + \"\nset =A1 + B1").unwrap();
        assert_eq!(lines[0].command, Command::Type(" + ".to_string()));
        assert_eq!(lines[1].command, Command::Set("=A1 + B1".to_string()));
    }

    #[test]
    fn syntax_errors_name_the_line() {
        let err = parse_script("type =\nfrobnicate\n").unwrap_err();
        assert_eq!(err.to_string(), "line 2: unknown command 'frobnicate'");

        let err = parse_script("select 1").unwrap_err();
        assert!(err.to_string().contains("select takes"));

        let err = parse_script("caret x").unwrap_err();
        assert!(err.to_string().contains("not an offset"));
    }

    #[test]
    fn accept_defaults_to_the_first_proposal() {
        let lines = parse_script("accept\naccept 3").unwrap();
        assert_eq!(lines[0].command, Command::Accept(1));
        assert_eq!(lines[1].command, Command::Accept(3));
    }

    // =========================================================================
    // Execution
    // =========================================================================

    #[test]
    fn pick_and_commit() {
        let (book, _, out, outcome) = run("type =SUM(\npick B2\nextend B2:C3\nshow\ntype )\ncommit\n");
        assert_eq!(out, "selecting =SUM(B2:C3|\n");
        assert_eq!(outcome, Some(CommitOutcome::Committed));
        assert_eq!(book.cell(CellPosition::new(book.first_sheet(), 0, 0)).as_deref(), Some("=SUM(B2:C3)"));
    }

    #[test]
    fn picking_on_another_sheet_activates_it() {
        let (book, session, _, _) = run("sheet Data\nsheet Sheet1\ntype =\npick Data!A1:A3\n");
        assert_eq!(session.current_content(), "=Data!A1:A3");
        assert_eq!(book.sheet_name(book.active_sheet()).as_deref(), Some("Data"));
    }

    #[test]
    fn drag_of_a_missing_reference_is_a_session_error() {
        let book = Rc::new(MemoryWorkbook::new());
        let mut session = session_on(&book);
        let lines = parse_script("set =A1+1\ndrag C7 D7\n").unwrap();
        let err = run_script(&lines, &book, &mut session, &mut Vec::new()).unwrap_err();
        assert!(matches!(err, ScriptError::Session { line: 2, .. }));
    }

    #[test]
    fn accept_out_of_range_is_reported() {
        let book = Rc::new(MemoryWorkbook::new());
        let mut session = session_on(&book);
        let lines = parse_script("type =1\naccept 2\n").unwrap();
        let err = run_script(&lines, &book, &mut session, &mut Vec::new()).unwrap_err();
        assert_eq!(err.to_string(), "line 2: no proposal #2 (0 offered)");
    }

    #[test]
    fn selection_markers() {
        assert_eq!(mark_selection("=A1", Selection::caret(1)), "=|A1");
        assert_eq!(mark_selection("=A1", Selection::new(3, 1)), "=[A1]");
        assert_eq!(mark_selection("", Selection::caret(0)), "|");
    }
}

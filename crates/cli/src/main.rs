// Formula composer CLI - tokenize formulas and replay edit sessions headless

mod exit_codes;
mod script;

use std::fs;
use std::io::{self, Read, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use std::rc::Rc;

use clap::{Parser, Subcommand};
use composer_config::Settings;
use composer_core::reference::format_zone;
use composer_core::{CellPosition, RangePart, ReferenceText, Selection, UnboundedZone};
use composer_engine::formula::functions::functions_by_prefix;
use composer_engine::formula::{composer_tokenize, tokenize_localized, BuiltinFunctions, NumberParser, TokenType};
use composer_engine::Locale;
use composer_session::{
    Capabilities, CommitOutcome, ComposerSession, MemoryWorkbook, NotificationLevel, OwnerId, SessionOptions,
    ZoneResolver,
};
use serde_json::json;

use exit_codes::{
    lex_exit_code, session_exit_code, EXIT_EDIT_REJECTED, EXIT_EDIT_SCRIPT, EXIT_ERROR, EXIT_NOT_A_NUMBER,
    EXIT_SUCCESS, EXIT_USAGE,
};
use script::ScriptError;

#[derive(Parser)]
#[command(name = "composer")]
#[command(about = "Formula composer (headless): tokenize formulas and replay edit sessions")]
#[command(version)]
#[command(subcommand_required = false)]
struct Cli {
    /// Settings file (defaults to settings.json in the user config dir)
    #[arg(long, global = true, env = "COMPOSER_SETTINGS")]
    settings: Option<PathBuf>,

    /// Locale code, overriding `locale.code` (en-US, fr-FR, de-DE)
    #[arg(long, global = true)]
    locale: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Split a formula into tokens
    #[command(after_help = "\
Examples:
  composer tokenize '=SUM(A1:B2, 3)'
  composer tokenize '=SUM(1,5; 2)' --locale fr-FR
  composer tokenize '=IF(A1>0,\"yes\",\"no\")' --json")]
    Tokenize {
        /// Formula text
        #[arg(allow_hyphen_values = true)]
        formula: String,

        /// Lexer output only: no positions, ranges, parentheses or function context
        #[arg(long)]
        raw: bool,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Recognize a number in the locale's notation
    #[command(after_help = "\
Examples:
  composer number '1,234.5'
  composer number '1 234,5' --locale fr-FR
  composer number '12%'
  composer number -5%")]
    Number {
        /// Text to recognize
        #[arg(allow_hyphen_values = true)]
        text: String,
    },

    /// List built-in functions
    ListFunctions {
        /// Only names starting with this prefix
        prefix: Option<String>,
    },

    /// Replay an edit script against an in-memory workbook
    #[command(after_help = "\
Script commands (one per line, # starts a comment):
  type TEXT         replace the selection with TEXT
  set TEXT          replace the whole content
  caret N           move the caret to UTF-16 offset N
  select A B        select offsets A..B
  pick REF          click a cell or range on the grid
  extend REF        grow or move the current pick
  drag FROM TO      drag a highlighted reference
  release           the grid drops its capture
  cycle             cycle $ markers of the selected references
  stop-range        leave range selection
  accept [N]        accept the N-th autocomplete proposal
  sheet NAME        switch to a sheet, creating it if needed
  cell REF TEXT     put TEXT in a cell
  merge REF         merge a range
  locale CODE       change the workbook locale
  show              print mode and content
  commit            stop editing and write the cell
  cancel            stop editing and drop changes

Examples:
  printf 'type =SUM(\\npick B2:B9\\ntype )\\ncommit\\n' | composer edit
  composer edit script.txt --cell C1 --json")]
    Edit {
        /// Script file (reads stdin if omitted)
        script: Option<PathBuf>,

        /// Edited cell on the first sheet
        #[arg(long, default_value = "A1")]
        cell: String,

        /// Existing content of the edited cell
        #[arg(long)]
        content: Option<String>,

        /// Text typed to start editing (replaces the content)
        #[arg(long)]
        initial: Option<String>,

        /// The edited cell displays a percent format
        #[arg(long)]
        percent: bool,

        /// Side-panel composer: no validation, no sheet switching, plain input
        #[arg(long)]
        standalone: bool,

        /// Output the final state as JSON
        #[arg(long)]
        json: bool,
    },
}

fn main() -> ExitCode {
    env_logger::init();
    let cli = Cli::parse();

    let result = match cli.command {
        None => {
            // No subcommand = show help
            eprintln!("Usage: composer <command> [options]");
            eprintln!("       composer --help for more information");
            Ok(())
        }
        Some(command) => load_settings(cli.settings, cli.locale).and_then(|settings| match command {
            Commands::Tokenize { formula, raw, json } => cmd_tokenize(&settings, formula, raw, json),
            Commands::Number { text } => cmd_number(&settings, text),
            Commands::ListFunctions { prefix } => cmd_list_functions(prefix),
            Commands::Edit { script, cell, content, initial, percent, standalone, json } => {
                cmd_edit(&settings, EditArgs { script, cell, content, initial, percent, standalone, json })
            }
        }),
    };

    match result {
        Ok(()) => ExitCode::from(EXIT_SUCCESS),
        Err(CliError { code, message, hint }) => {
            if !message.is_empty() {
                eprintln!("error: {}", message);
            }
            if let Some(hint) = hint {
                eprintln!("hint:  {}", hint);
            }
            ExitCode::from(code)
        }
    }
}

#[derive(Debug)]
pub struct CliError {
    pub code: u8,
    pub message: String,
    pub hint: Option<String>,
}

impl CliError {
    pub fn args(msg: impl Into<String>) -> Self {
        Self { code: EXIT_USAGE, message: msg.into(), hint: None }
    }

    pub fn io(msg: impl Into<String>) -> Self {
        Self { code: EXIT_ERROR, message: msg.into(), hint: None }
    }

    pub fn with_code(code: u8, msg: impl Into<String>) -> Self {
        Self { code, message: msg.into(), hint: None }
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }

    fn script(err: ScriptError) -> Self {
        match err {
            ScriptError::Syntax { .. } => Self::with_code(EXIT_EDIT_SCRIPT, err.to_string())
                .with_hint("run `composer edit --help` for the list of script commands"),
            ScriptError::Session { ref source, .. } => Self::with_code(session_exit_code(source), err.to_string()),
            ScriptError::Io(msg) => Self::io(msg),
        }
    }
}

/// Settings from `path` (or the user config dir), with `--locale` applied.
fn load_settings(path: Option<PathBuf>, locale: Option<String>) -> Result<Settings, CliError> {
    let mut settings = match path {
        Some(path) => Settings::load_from(&path),
        None => Settings::load(),
    };
    if let Some(code) = locale {
        if Locale::from_code(&code).is_none() {
            return Err(CliError::args(format!("unknown locale '{}'", code))
                .with_hint("known locales: en-US, fr-FR, de-DE"));
        }
        settings.locale_code = code;
    }
    Ok(settings)
}

fn write_out(out: &mut impl Write, text: &str) -> Result<(), CliError> {
    writeln!(out, "{}", text).map_err(|e| CliError::io(e.to_string()))
}

fn type_label(token_type: TokenType) -> &'static str {
    match token_type {
        TokenType::Operator => "OPERATOR",
        TokenType::Number => "NUMBER",
        TokenType::String => "STRING",
        TokenType::Function => "FUNCTION",
        TokenType::Symbol => "SYMBOL",
        TokenType::Space => "SPACE",
        TokenType::Debugger => "DEBUGGER",
        TokenType::ArgSeparator => "ARG_SEPARATOR",
        TokenType::LeftParen => "LEFT_PAREN",
        TokenType::RightParen => "RIGHT_PAREN",
        TokenType::Reference => "REFERENCE",
    }
}

// ============================================================================
// tokenize
// ============================================================================

fn cmd_tokenize(settings: &Settings, formula: String, raw: bool, json: bool) -> Result<(), CliError> {
    let mut numbers = NumberParser::new(settings.locale(), settings.shape_cache_capacity);
    let stdout = io::stdout();
    let mut out = stdout.lock();
    let lex_error = |e: composer_engine::formula::LexError| CliError::with_code(lex_exit_code(&e), e.to_string());

    if raw {
        let tokens = tokenize_localized(&formula, &mut numbers, &BuiltinFunctions).map_err(lex_error)?;
        if json {
            let text = serde_json::to_string_pretty(&tokens).map_err(|e| CliError::io(e.to_string()))?;
            return write_out(&mut out, &text);
        }
        for token in &tokens {
            write_out(&mut out, &format!("{:<14}{:?}", type_label(token.token_type), token.value))?;
        }
        return Ok(());
    }

    let tokens = composer_tokenize(&formula, &mut numbers, &BuiltinFunctions).map_err(lex_error)?;
    if json {
        let text = serde_json::to_string_pretty(&tokens).map_err(|e| CliError::io(e.to_string()))?;
        return write_out(&mut out, &text);
    }
    for token in &tokens {
        let mut line = format!(
            "{:>3}..{:<3} {:<14}{:?}",
            token.start,
            token.end,
            type_label(token.token_type),
            token.value
        );
        if let Some(paren) = token.paren_index {
            line.push_str(&format!("  paren={}", paren));
        }
        if let Some(ctx) = &token.function_context {
            line.push_str(&format!("  in={}#{}", ctx.parent, ctx.arg_position));
        }
        write_out(&mut out, &line)?;
    }
    Ok(())
}

// ============================================================================
// number
// ============================================================================

fn cmd_number(settings: &Settings, text: String) -> Result<(), CliError> {
    let locale = settings.locale();
    let mut numbers = NumberParser::new(locale.clone(), settings.shape_cache_capacity);
    match numbers.parse(&text) {
        Some(value) => write_out(&mut io::stdout().lock(), &value.to_string()),
        None => Err(CliError::with_code(EXIT_NOT_A_NUMBER, format!("'{}' is not a number in {}", text, locale.code))
            .with_hint(format!(
                "{} uses '{}' as decimal separator",
                locale.code, locale.decimal_separator
            ))),
    }
}

// ============================================================================
// list-functions
// ============================================================================

fn cmd_list_functions(prefix: Option<String>) -> Result<(), CliError> {
    let stdout = io::stdout();
    let mut handle = stdout.lock();

    for info in functions_by_prefix(&BuiltinFunctions, prefix.as_deref().unwrap_or("")) {
        write_out(&mut handle, &format!("{:<16}{}", info.name, info.signature))?;
    }

    Ok(())
}

// ============================================================================
// edit
// ============================================================================

struct EditArgs {
    script: Option<PathBuf>,
    cell: String,
    content: Option<String>,
    initial: Option<String>,
    percent: bool,
    standalone: bool,
    json: bool,
}

fn cmd_edit(settings: &Settings, args: EditArgs) -> Result<(), CliError> {
    let text = match &args.script {
        Some(path) => fs::read_to_string(path)
            .map_err(|e| CliError::args(format!("cannot read {}: {}", path.display(), e)))?,
        None => {
            let mut buf = String::new();
            io::stdin().read_to_string(&mut buf).map_err(|e| CliError::io(e.to_string()))?;
            buf
        }
    };
    let lines = script::parse_script(&text).map_err(CliError::script)?;

    let book = Rc::new(MemoryWorkbook::new());
    book.set_locale(settings.locale());

    let reference = ReferenceText::parse(&args.cell)
        .filter(|r| r.is_single_cell() && r.sheet_name.is_none())
        .ok_or_else(|| CliError::args(format!("--cell '{}' is not a single cell", args.cell)))?;
    let position = CellPosition::new(book.first_sheet(), reference.zone.left, reference.zone.top);
    if let Some(content) = &args.content {
        book.set_cell(position, content);
    }
    if args.percent {
        book.set_percent_format(position);
    }

    let caps = if args.standalone { Capabilities::standalone() } else { Capabilities::cell_editor() };
    let options = SessionOptions::from_settings(settings);
    let mut session = ComposerSession::new(OwnerId(1), book.collaborators(settings.max_proposals), caps, options);
    session.start(position, args.initial.as_deref(), None);

    let stdout = io::stdout();
    let mut out = stdout.lock();
    let outcome = script::run_script(&lines, &book, &mut session, &mut out).map_err(CliError::script)?;

    let cell_content = book.cell(position);
    if args.json {
        report_json(&mut out, &book, &session, outcome, &args.cell, cell_content)?;
    } else {
        report_text(&mut out, &book, &session, outcome, &args.cell, cell_content)?;
    }

    if outcome == Some(CommitOutcome::Rejected) {
        return Err(CliError::with_code(EXIT_EDIT_REJECTED, "commit rejected")
            .with_hint("the session is still open; fix the formula and commit again"));
    }
    Ok(())
}

fn outcome_label(outcome: Option<CommitOutcome>) -> &'static str {
    match outcome {
        None => "none",
        Some(CommitOutcome::Committed) => "committed",
        Some(CommitOutcome::Rejected) => "rejected",
        Some(CommitOutcome::Inactive) => "inactive",
    }
}

fn level_label(level: NotificationLevel) -> &'static str {
    match level {
        NotificationLevel::Error => "error",
        NotificationLevel::Warning => "warning",
    }
}

fn report_text(
    out: &mut impl Write,
    book: &MemoryWorkbook,
    session: &ComposerSession,
    outcome: Option<CommitOutcome>,
    cell: &str,
    cell_content: Option<String>,
) -> Result<(), CliError> {
    write_out(out, &format!("mode:    {}", script::mode_label(session)))?;
    write_out(out, &format!("content: {}", script::mark_selection(session.current_content(), session.selection())))?;
    write_out(out, &format!("outcome: {}", outcome_label(outcome)))?;
    write_out(out, &format!("cell:    {} = {}", cell, cell_content.unwrap_or_default()))?;
    if let Some(err) = session.last_lex_error() {
        write_out(out, &format!("lex:     {}", err))?;
    }
    for highlight in session.highlights() {
        let sheet = book.sheet_name(highlight.sheet).unwrap_or_default();
        let xc = format_zone(&UnboundedZone::from(highlight.zone), &[RangePart::RELATIVE; 2]);
        write_out(out, &format!("range:   {} {}!{}", highlight.color, sheet, xc))?;
    }
    for notification in book.notifications() {
        write_out(out, &format!("{}: {}", level_label(notification.level), notification.text))?;
    }
    Ok(())
}

fn report_json(
    out: &mut impl Write,
    book: &MemoryWorkbook,
    session: &ComposerSession,
    outcome: Option<CommitOutcome>,
    cell: &str,
    cell_content: Option<String>,
) -> Result<(), CliError> {
    let selection: Selection = session.selection();
    let notifications: Vec<_> = book
        .notifications()
        .into_iter()
        .map(|n| json!({ "level": level_label(n.level), "text": n.text }))
        .collect();
    let report = json!({
        "mode": session.edition_mode(),
        "content": session.current_content(),
        "selection": selection,
        "outcome": outcome,
        "cell": { "ref": cell, "content": cell_content },
        "tokens": session.current_tokens(),
        "highlights": session.highlights(),
        "proposals": session.autocomplete_proposals(),
        "lex_error": session.last_lex_error().map(|e| e.to_string()),
        "notifications": notifications,
    });
    let text = serde_json::to_string_pretty(&report).map_err(|e| CliError::io(e.to_string()))?;
    write_out(out, &text)
}

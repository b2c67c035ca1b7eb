//! CLI Exit Code Registry
//!
//! This is the single source of truth for all CLI exit codes.
//! Exit codes are part of the shell contract; scripts rely on them.
//!
//! # Exit Code Ranges
//!
//! | Range   | Domain           | Description                              |
//! |---------|------------------|------------------------------------------|
//! | 0       | Universal        | Success                                  |
//! | 1       | Universal        | General error (unspecified)              |
//! | 2       | Universal        | CLI usage error (bad args, missing file) |
//! | 3-9     | tokenize/number  | Lexing and number recognition            |
//! | 10-19   | edit             | Edit script execution                    |
//!
//! # Adding New Exit Codes
//!
//! 1. Add the constant in the appropriate range
//! 2. Document what triggers it
//! 3. Update the table above
//! 4. Wire it into the relevant command's error handling

use composer_engine::formula::LexError;
use composer_session::SessionError;

// =============================================================================
// Universal (0-2)
// =============================================================================

/// Success - command completed without errors.
pub const EXIT_SUCCESS: u8 = 0;

/// General error - unspecified failure.
/// Avoid using this; prefer a specific error code.
pub const EXIT_ERROR: u8 = 1;

/// Usage error - bad arguments, missing required options.
pub const EXIT_USAGE: u8 = 2;

// =============================================================================
// Tokenize / number (3-9)
// =============================================================================

/// The formula contains a character no token recognizer accepts.
pub const EXIT_LEX_UNEXPECTED: u8 = 3;

/// The formula produced more tokens than the lexer allows.
pub const EXIT_LEX_TOO_MANY_TOKENS: u8 = 4;

/// `number`: the text is not a number in the requested locale.
pub const EXIT_NOT_A_NUMBER: u8 = 5;

// =============================================================================
// Edit (10-19)
// =============================================================================

/// Script syntax error (unknown command, bad argument).
pub const EXIT_EDIT_SCRIPT: u8 = 10;

/// The last commit in the script was refused by validation.
pub const EXIT_EDIT_REJECTED: u8 = 11;

/// A drag moved a reference that is no longer in the formula.
pub const EXIT_EDIT_REFERENCE_NOT_FOUND: u8 = 12;

/// Map a lexer error to its exit code.
pub fn lex_exit_code(err: &LexError) -> u8 {
    match err {
        LexError::UnexpectedCharacter { .. } => EXIT_LEX_UNEXPECTED,
        LexError::TooManyTokens { .. } => EXIT_LEX_TOO_MANY_TOKENS,
    }
}

/// Map a session error to its exit code.
pub fn session_exit_code(err: &SessionError) -> u8 {
    match err {
        SessionError::ReferenceNotFound { .. } => EXIT_EDIT_REFERENCE_NOT_FOUND,
    }
}

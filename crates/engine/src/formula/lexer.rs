// Formula lexer
//
// Splits formula text into a flat, lossless token list: concatenating the
// token values gives back the input. Recognizers are tried in a fixed order at
// each position; the first one that matches wins.

use std::fmt;

use composer_core::text::byte_to_utf16;

use super::functions::FunctionRegistry;
use super::number::NumberParser;
use super::token::{Token, TokenType};

/// Hard bound on the number of tokens produced for one input.
pub const MAX_TOKENS: usize = 100;

/// Operators, longest first so `>=` wins over `>`.
const OPERATORS: &[&str] = &["<>", ">=", "<=", "+", "-", "*", "/", ":", "=", ">", "<", "^", "&", "%"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LexError {
    /// No recognizer matched. `position` is a UTF-16 offset.
    UnexpectedCharacter { remainder: String, position: usize },
    /// The input produced more than `limit` tokens.
    TooManyTokens { limit: usize },
}

impl fmt::Display for LexError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnexpectedCharacter { remainder, position } => {
                write!(f, "unexpected character at position {position}: '{remainder}'")
            }
            Self::TooManyTokens { limit } => write!(f, "formula has more than {limit} tokens"),
        }
    }
}

impl std::error::Error for LexError {}

/// How numeric runs are recognized.
enum NumberRule<'a> {
    /// Digits and `.` only.
    Raw,
    /// Locale decimal separator and exponent, through the number grammar.
    Localized(&'a mut NumberParser),
}

struct Lexer<'a> {
    text: &'a str,
    pos: usize,
    arg_separator: char,
    functions: &'a dyn FunctionRegistry,
    numbers: NumberRule<'a>,
    max_tokens: Option<usize>,
}

/// Tokenize with en-US punctuation and raw numeric runs.
pub fn tokenize(text: &str, functions: &dyn FunctionRegistry) -> Result<Vec<Token>, LexError> {
    Lexer { text, pos: 0, arg_separator: ',', functions, numbers: NumberRule::Raw, max_tokens: Some(MAX_TOKENS) }
        .run()
}

/// Tokenize with the argument separator and number rules of the parser's
/// locale. This is the variant interactive editing uses.
pub fn tokenize_localized(
    text: &str,
    numbers: &mut NumberParser,
    functions: &dyn FunctionRegistry,
) -> Result<Vec<Token>, LexError> {
    tokenize_localized_with_limit(text, numbers, functions, Some(MAX_TOKENS))
}

/// [`tokenize_localized`] with a caller-chosen token bound. `None` lexes
/// inputs of any length.
pub fn tokenize_localized_with_limit(
    text: &str,
    numbers: &mut NumberParser,
    functions: &dyn FunctionRegistry,
    max_tokens: Option<usize>,
) -> Result<Vec<Token>, LexError> {
    let arg_separator = numbers.locale().arg_separator;
    Lexer { text, pos: 0, arg_separator, functions, numbers: NumberRule::Localized(numbers), max_tokens }.run()
}

fn is_word_char(ch: char) -> bool {
    ch.is_alphanumeric() || matches!(ch, '_' | '.' | '$' | '!')
}

impl<'a> Lexer<'a> {
    fn run(mut self) -> Result<Vec<Token>, LexError> {
        let text = self.text;
        let mut tokens = Vec::new();

        while self.pos < text.len() {
            let rest = &text[self.pos..];
            let Some((token_type, len)) = self.next_token(rest) else {
                return Err(LexError::UnexpectedCharacter {
                    remainder: rest.to_string(),
                    position: byte_to_utf16(text, self.pos),
                });
            };

            let value = &rest[..len];
            let token_type = match token_type {
                TokenType::Symbol if self.functions.contains(&value.to_uppercase()) => TokenType::Function,
                other => other,
            };
            tokens.push(Token::new(token_type, value));
            if let Some(limit) = self.max_tokens.filter(|limit| tokens.len() > *limit) {
                return Err(LexError::TooManyTokens { limit });
            }
            self.pos += len;
        }

        Ok(tokens)
    }

    fn next_token(&mut self, rest: &str) -> Option<(TokenType, usize)> {
        let ch = rest.chars().next()?;

        if ch == '?' {
            return Some((TokenType::Debugger, 1));
        }
        if ch.is_whitespace() {
            return Some((TokenType::Space, run_length(rest, char::is_whitespace)));
        }
        if ch == self.arg_separator {
            return Some((TokenType::ArgSeparator, ch.len_utf8()));
        }
        if ch == '(' {
            return Some((TokenType::LeftParen, 1));
        }
        if ch == ')' {
            return Some((TokenType::RightParen, 1));
        }
        if let Some(op) = OPERATORS.iter().find(|op| rest.starts_with(**op)) {
            return Some((TokenType::Operator, op.len()));
        }
        if let Some(len) = self.number(rest, ch) {
            return Some((TokenType::Number, len));
        }
        if ch == '"' {
            return Some((TokenType::String, string_length(rest)));
        }
        if ch == '\'' || is_word_char(ch) {
            return Some((TokenType::Symbol, word_length(rest)));
        }
        None
    }

    fn number(&mut self, rest: &str, first: char) -> Option<usize> {
        match &mut self.numbers {
            NumberRule::Raw => {
                let len = run_length(rest, |c| c.is_ascii_digit() || c == '.');
                rest[..len].bytes().any(|b| b.is_ascii_digit()).then_some(len)
            }
            NumberRule::Localized(parser) => {
                if first.is_ascii_digit() || first == parser.locale().decimal_separator {
                    parser.scan_formula_literal(rest)
                } else {
                    None
                }
            }
        }
    }
}

/// Byte length of the leading run of chars matching `pred`.
fn run_length(s: &str, pred: impl Fn(char) -> bool) -> usize {
    s.char_indices()
        .find(|(_, c)| !pred(*c))
        .map(|(i, _)| i)
        .unwrap_or(s.len())
}

/// Length of a `"`-delimited string, closing quote included. A quote right
/// after a backslash does not close the string; an unterminated string runs
/// to the end of the input.
fn string_length(s: &str) -> usize {
    let mut prev = '"';
    for (i, ch) in s.char_indices().skip(1) {
        if ch == '"' && prev != '\\' {
            return i + 1;
        }
        prev = ch;
    }
    s.len()
}

/// Length of a bare word, optionally starting with a `'quoted sheet'` part.
fn word_length(s: &str) -> usize {
    let mut len = 0;
    if s.starts_with('\'') {
        let mut chars = s.char_indices().skip(1).peekable();
        len = s.len();
        while let Some((i, ch)) = chars.next() {
            if ch == '\'' {
                if matches!(chars.peek(), Some((_, '\''))) {
                    chars.next();
                    continue;
                }
                len = i + 1;
                break;
            }
        }
    }
    len + run_length(&s[len..], is_word_char)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formula::functions::BuiltinFunctions;
    use crate::locale::Locale;

    fn lex(text: &str) -> Vec<(TokenType, String)> {
        tokenize(text, &BuiltinFunctions)
            .unwrap()
            .into_iter()
            .map(|t| (t.token_type, t.value))
            .collect()
    }

    fn lex_localized(text: &str, locale: Locale) -> Vec<(TokenType, String)> {
        let mut numbers = NumberParser::new(locale, 16);
        tokenize_localized(text, &mut numbers, &BuiltinFunctions)
            .unwrap()
            .into_iter()
            .map(|t| (t.token_type, t.value))
            .collect()
    }

    fn t(token_type: TokenType, value: &str) -> (TokenType, String) {
        (token_type, value.to_string())
    }

    // =========================================================================
    // Recognizers
    // =========================================================================

    #[test]
    fn function_call_with_args() {
        use TokenType::*;
        assert_eq!(
            lex("=SUM(A1, 2)"),
            vec![
                t(Operator, "="),
                t(Function, "SUM"),
                t(LeftParen, "("),
                t(Symbol, "A1"),
                t(ArgSeparator, ","),
                t(Space, " "),
                t(Number, "2"),
                t(RightParen, ")"),
            ]
        );
    }

    #[test]
    fn function_names_keep_their_case() {
        use TokenType::*;
        assert_eq!(lex("=sum(a1)")[1], t(Function, "sum"));
        assert_eq!(lex("=sum(a1)")[3], t(Symbol, "a1"));
        assert_eq!(lex("=stdev.s(1)")[1], t(Function, "stdev.s"));
    }

    #[test]
    fn operators_longest_first() {
        use TokenType::*;
        assert_eq!(
            lex("=1>=2<>3<4"),
            vec![
                t(Operator, "="),
                t(Number, "1"),
                t(Operator, ">="),
                t(Number, "2"),
                t(Operator, "<>"),
                t(Number, "3"),
                t(Operator, "<"),
                t(Number, "4"),
            ]
        );
    }

    #[test]
    fn postfix_percent_is_an_operator() {
        assert_eq!(lex("=5%")[2], t(TokenType::Operator, "%"));
    }

    #[test]
    fn debugger_marker() {
        assert_eq!(lex("=?A1")[1], t(TokenType::Debugger, "?"));
    }

    #[test]
    fn whitespace_runs_are_single_tokens() {
        assert_eq!(lex("= \t 1")[1], t(TokenType::Space, " \t "));
    }

    #[test]
    fn strings() {
        use TokenType::*;
        assert_eq!(lex(r#"="a(b""#)[1], t(String, r#""a(b""#));
        assert_eq!(lex(r#"="a\"b"&1"#)[1], t(String, r#""a\"b""#));
        assert_eq!(lex(r#"="open"#)[1], t(String, r#""open"#));
    }

    #[test]
    fn single_quotes_belong_to_symbols() {
        use TokenType::*;
        assert_eq!(lex("='My Sheet'!A1"), vec![t(Operator, "="), t(Symbol, "'My Sheet'!A1")]);
        assert_eq!(lex("='It''s'!B2")[1], t(Symbol, "'It''s'!B2"));
        assert_eq!(lex("='abc"), vec![t(Operator, "="), t(Symbol, "'abc")]);
    }

    #[test]
    fn raw_numbers_are_digits_and_dots() {
        use TokenType::*;
        assert_eq!(lex("=1.2.3")[1], t(Number, "1.2.3"));
        assert_eq!(lex("=1.5e3"), vec![t(Operator, "="), t(Number, "1.5"), t(Symbol, "e3")]);
    }

    #[test]
    fn localized_numbers() {
        use TokenType::*;
        assert_eq!(lex_localized("=1.5e3", Locale::en_us())[1], t(Number, "1.5e3"));
        assert_eq!(
            lex_localized("=SUM(1,5;2)", Locale::fr_fr()),
            vec![
                t(Operator, "="),
                t(Function, "SUM"),
                t(LeftParen, "("),
                t(Number, "1,5"),
                t(ArgSeparator, ";"),
                t(Number, "2"),
                t(RightParen, ")"),
            ]
        );
    }

    #[test]
    fn absolute_references_are_symbols() {
        assert_eq!(lex("=$A$1")[1], t(TokenType::Symbol, "$A$1"));
    }

    // =========================================================================
    // Errors
    // =========================================================================

    #[test]
    fn unexpected_character_reports_remainder_and_position() {
        let err = tokenize("=1#x", &BuiltinFunctions).unwrap_err();
        assert_eq!(err, LexError::UnexpectedCharacter { remainder: "#x".to_string(), position: 2 });
    }

    #[test]
    fn too_many_tokens() {
        let text = format!("={}1", "1+".repeat(60));
        let err = tokenize(&text, &BuiltinFunctions).unwrap_err();
        assert_eq!(err, LexError::TooManyTokens { limit: MAX_TOKENS });

        let text = format!("={}1", "1+".repeat(49));
        assert_eq!(tokenize(&text, &BuiltinFunctions).unwrap().len(), 100);
    }

    #[test]
    fn token_limit_is_configurable() {
        let text = format!("={}1", "1+".repeat(60));
        let mut numbers = NumberParser::new(Locale::en_us(), 16);
        let tokens = tokenize_localized_with_limit(&text, &mut numbers, &BuiltinFunctions, None).unwrap();
        assert_eq!(tokens.len(), 122);

        let err = tokenize_localized_with_limit("=1+2", &mut numbers, &BuiltinFunctions, Some(3)).unwrap_err();
        assert_eq!(err, LexError::TooManyTokens { limit: 3 });
        assert_eq!(
            tokenize_localized(&text, &mut numbers, &BuiltinFunctions).unwrap_err(),
            LexError::TooManyTokens { limit: MAX_TOKENS }
        );
    }

    #[test]
    fn round_trip_samples() {
        for text in [
            "=SUM(A1:B2, 3) * 2",
            "=IF(A1>=10,\"big\",\"small\")",
            "='My Sheet'!A1 + Sheet2!$B$3",
            "= A : A ",
            "=sum(sum(1,2",
            "plain text, no formula",
            "=\"é😀\"&A1",
        ] {
            let joined: String = tokenize(text, &BuiltinFunctions).unwrap().iter().map(|t| t.value.as_str()).collect();
            assert_eq!(joined, text);
        }
    }
}

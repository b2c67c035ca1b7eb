//! Token styling for the composer input
//!
//! Maps each enriched token to a highlight class. References also carry the
//! palette index of their highlight, and the parenthesis pair around the
//! caret is flagged.

use composer_core::Selection;
use composer_engine::formula::{EnrichedToken, TokenType};
use serde::Serialize;

use crate::colors::ColorIndexMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenStyle {
    Function,
    /// A name called like a function that the registry does not know.
    UnknownFunction,
    Reference,
    Number,
    String,
    Operator,
    Separator,
    Paren,
    MatchedParen,
    Name,
    Space,
    Debugger,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StyledToken {
    pub start: usize,
    pub end: usize,
    pub style: TokenStyle,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color_index: Option<usize>,
}

fn next_non_space(tokens: &[EnrichedToken], index: usize) -> Option<&EnrichedToken> {
    tokens[index + 1..].iter().find(|t| t.token_type != TokenType::Space)
}

/// Style of `tokens[index]`.
pub fn token_style(tokens: &[EnrichedToken], index: usize) -> TokenStyle {
    let token = &tokens[index];
    match token.token_type {
        TokenType::Function => TokenStyle::Function,
        TokenType::Symbol => {
            if next_non_space(tokens, index).is_some_and(|t| t.token_type == TokenType::LeftParen) {
                TokenStyle::UnknownFunction
            } else {
                TokenStyle::Name
            }
        }
        TokenType::Reference => TokenStyle::Reference,
        TokenType::Number => TokenStyle::Number,
        TokenType::String => TokenStyle::String,
        TokenType::Operator => TokenStyle::Operator,
        TokenType::ArgSeparator => TokenStyle::Separator,
        TokenType::LeftParen | TokenType::RightParen => TokenStyle::Paren,
        TokenType::Space => TokenStyle::Space,
        TokenType::Debugger => TokenStyle::Debugger,
    }
}

/// Id of the parenthesis pair touching a collapsed caret, if both halves exist.
pub fn matched_paren_at(tokens: &[EnrichedToken], selection: Selection) -> Option<usize> {
    if !selection.is_collapsed() {
        return None;
    }
    let caret = selection.start;
    let id = tokens
        .iter()
        .filter(|t| matches!(t.token_type, TokenType::LeftParen | TokenType::RightParen))
        .find(|t| t.end == caret || t.start == caret)
        .and_then(|t| t.paren_index)?;

    let halves = tokens.iter().filter(|t| t.paren_index == Some(id)).count();
    (halves == 2).then_some(id)
}

pub fn styled_tokens(tokens: &[EnrichedToken], selection: Selection, colors: &ColorIndexMap) -> Vec<StyledToken> {
    let matched = matched_paren_at(tokens, selection);
    tokens
        .iter()
        .enumerate()
        .map(|(i, token)| {
            let mut style = token_style(tokens, i);
            if style == TokenStyle::Paren && matched.is_some() && token.paren_index == matched {
                style = TokenStyle::MatchedParen;
            }
            let color_index = match token.token_type {
                TokenType::Reference => colors.index_of(&token.value),
                _ => None,
            };
            StyledToken { start: token.start, end: token.end, style, color_index }
        })
        .collect()
}

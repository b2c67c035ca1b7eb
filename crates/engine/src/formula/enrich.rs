//! Token enrichment
//!
//! Four independent passes over a token list:
//! 1. [`enrich_positions`] - UTF-16 start/end/length
//! 2. [`merge_references`] - collapse `A1 : B2`-shaped windows into REFERENCE tokens
//! 3. [`match_parentheses`] - pair ids for `(` / `)`
//! 4. [`map_function_contexts`] - enclosing function name and argument index
//!
//! [`composer_tokenize`] chains them in that order.

use composer_core::reference::{endpoint_kind, EndpointKind, ReferenceText};
use composer_core::text::utf16_len;

use super::functions::FunctionRegistry;
use super::lexer::{tokenize_localized_with_limit, LexError, MAX_TOKENS};
use super::number::NumberParser;
use super::token::{EnrichedToken, FunctionContext, Token, TokenType};

// ============================================================================
// Positions
// ============================================================================

pub fn enrich_positions(tokens: Vec<Token>) -> Vec<EnrichedToken> {
    let mut offset = 0;
    tokens
        .into_iter()
        .map(|token| {
            let length = utf16_len(&token.value);
            let enriched = EnrichedToken {
                token_type: token.token_type,
                value: token.value,
                start: offset,
                end: offset + length,
                length,
                paren_index: None,
                function_context: None,
            };
            offset += length;
            enriched
        })
        .collect()
}

// ============================================================================
// Reference merging
// ============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeOptions {
    /// Drop whitespace from merged reference values.
    pub strip_spaces: bool,
}

fn operand_kind(token: &EnrichedToken) -> Option<EndpointKind> {
    match token.token_type {
        TokenType::Symbol => endpoint_kind(&token.value),
        TokenType::Number if token.value.bytes().all(|b| b.is_ascii_digit()) => {
            endpoint_kind(&token.value)
        }
        _ => None,
    }
}

/// Row against column makes no range (`3:A`, `A:3`); every other pairing does.
fn pairs_with(a: EndpointKind, b: EndpointKind) -> bool {
    !matches!(
        (a, b),
        (EndpointKind::Row, EndpointKind::Column) | (EndpointKind::Column, EndpointKind::Row)
    )
}

fn skip_spaces(tokens: &[EnrichedToken], mut i: usize) -> usize {
    while tokens.get(i).is_some_and(|t| t.token_type == TokenType::Space) {
        i += 1;
    }
    i
}

/// Match `spaces? operand spaces? ":" spaces? operand spaces?` at `i` and
/// return the exclusive end index of the window.
fn match_range_window(tokens: &[EnrichedToken], i: usize) -> Option<usize> {
    let first = skip_spaces(tokens, i);
    let left = operand_kind(tokens.get(first)?)?;

    let colon = skip_spaces(tokens, first + 1);
    if !tokens.get(colon)?.is_operator(":") {
        return None;
    }

    let second = skip_spaces(tokens, colon + 1);
    let right = operand_kind(tokens.get(second)?)?;
    if !pairs_with(left, right) {
        return None;
    }

    Some(skip_spaces(tokens, second + 1))
}

fn merged_token(window: &[EnrichedToken], options: MergeOptions) -> EnrichedToken {
    let mut value: String = window.iter().map(|t| t.value.as_str()).collect();
    if options.strip_spaces {
        value.retain(|c| !c.is_whitespace());
    }
    let start = window[0].start;
    let end = window[window.len() - 1].end;
    EnrichedToken {
        token_type: TokenType::Reference,
        value,
        start,
        end,
        length: end - start,
        paren_index: None,
        function_context: None,
    }
}

/// Collapse range-shaped windows into single REFERENCE tokens, and retype a
/// lone SYMBOL that reads as a cell reference to REFERENCE. Expects
/// position-enriched tokens.
pub fn merge_references(tokens: Vec<EnrichedToken>, options: MergeOptions) -> Vec<EnrichedToken> {
    let mut merged = Vec::with_capacity(tokens.len());
    let mut i = 0;

    while i < tokens.len() {
        if let Some(end) = match_range_window(&tokens, i) {
            merged.push(merged_token(&tokens[i..end], options));
            i = end;
            continue;
        }

        let mut token = tokens[i].clone();
        if token.token_type == TokenType::Symbol
            && ReferenceText::parse(&token.value).is_some_and(|r| r.is_single_cell())
        {
            token.token_type = TokenType::Reference;
        }
        merged.push(token);
        i += 1;
    }

    merged
}

// ============================================================================
// Parentheses
// ============================================================================

/// Give each `(` a fresh id and its matching `)` the same id. Unbalanced
/// parentheses get none.
pub fn match_parentheses(mut tokens: Vec<EnrichedToken>) -> Vec<EnrichedToken> {
    let mut stack: Vec<usize> = Vec::new();
    let mut next_id = 0;

    for token in &mut tokens {
        match token.token_type {
            TokenType::LeftParen => {
                token.paren_index = Some(next_id);
                stack.push(next_id);
                next_id += 1;
            }
            TokenType::RightParen => {
                token.paren_index = stack.pop();
            }
            _ => {}
        }
    }

    tokens
}

// ============================================================================
// Function contexts
// ============================================================================

struct Frame {
    parent: Option<String>,
    arg_position: usize,
}

impl Frame {
    fn context(&self) -> Option<FunctionContext> {
        let parent = self.parent.clone()?;
        Some(FunctionContext { parent, arg_position: self.arg_position })
    }
}

/// Annotate every token inside a function call with the innermost call's
/// name and the index of the argument it belongs to. A call's own `(` and
/// `)` carry the call's context; a `,` carries the argument it opens.
pub fn map_function_contexts(mut tokens: Vec<EnrichedToken>) -> Vec<EnrichedToken> {
    let mut stack: Vec<Frame> = Vec::new();
    let mut pending_function: Option<String> = None;

    for token in &mut tokens {
        match token.token_type {
            TokenType::Function => {
                pending_function = Some(token.value.to_uppercase());
            }
            TokenType::LeftParen => {
                stack.push(Frame { parent: pending_function.take(), arg_position: 0 });
            }
            TokenType::RightParen => {
                pending_function = None;
                if let Some(frame) = stack.pop() {
                    token.function_context = frame.context();
                    continue;
                }
            }
            TokenType::ArgSeparator => {
                pending_function = None;
                if let Some(frame) = stack.last_mut() {
                    frame.arg_position += 1;
                }
            }
            TokenType::Space => {}
            _ => pending_function = None,
        }

        token.function_context = stack.last().and_then(Frame::context);
    }

    tokens
}

// ============================================================================
// Pipeline
// ============================================================================

/// Lex `text` with the parser's locale and run every enrichment pass.
pub fn composer_tokenize(
    text: &str,
    numbers: &mut NumberParser,
    functions: &dyn FunctionRegistry,
) -> Result<Vec<EnrichedToken>, LexError> {
    composer_tokenize_with_limit(text, numbers, functions, Some(MAX_TOKENS))
}

/// [`composer_tokenize`] with a caller-chosen token bound; `None` for no bound.
pub fn composer_tokenize_with_limit(
    text: &str,
    numbers: &mut NumberParser,
    functions: &dyn FunctionRegistry,
    max_tokens: Option<usize>,
) -> Result<Vec<EnrichedToken>, LexError> {
    let tokens = tokenize_localized_with_limit(text, numbers, functions, max_tokens)?;
    let tokens = enrich_positions(tokens);
    let tokens = merge_references(tokens, MergeOptions::default());
    let tokens = match_parentheses(tokens);
    Ok(map_function_contexts(tokens))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formula::functions::BuiltinFunctions;
    use crate::formula::lexer::tokenize;
    use crate::locale::Locale;

    fn pipeline(text: &str) -> Vec<EnrichedToken> {
        let mut numbers = NumberParser::new(Locale::en_us(), 16);
        composer_tokenize(text, &mut numbers, &BuiltinFunctions).unwrap()
    }

    fn references(text: &str) -> Vec<String> {
        pipeline(text)
            .into_iter()
            .filter(|t| t.token_type == TokenType::Reference)
            .map(|t| t.value)
            .collect()
    }

    // =========================================================================
    // Positions
    // =========================================================================

    #[test]
    fn positions_are_utf16_prefix_sums() {
        let tokens = enrich_positions(tokenize("=\"😀\"&A1", &BuiltinFunctions).unwrap());
        let spans: Vec<_> = tokens.iter().map(|t| (t.start, t.end, t.length)).collect();
        assert_eq!(spans, vec![(0, 1, 1), (1, 5, 4), (5, 6, 1), (6, 8, 2)]);
    }

    // =========================================================================
    // Merging
    // =========================================================================

    #[test]
    fn merges_cell_range() {
        let tokens = pipeline("=A1:B1");
        assert_eq!(tokens.len(), 2);
        assert_eq!(tokens[1].token_type, TokenType::Reference);
        assert_eq!(tokens[1].value, "A1:B1");
        assert_eq!((tokens[1].start, tokens[1].end), (1, 6));
    }

    #[test]
    fn merges_full_columns_and_rows() {
        assert_eq!(references("=A:A"), vec!["A:A"]);
        assert_eq!(references("=1:1"), vec!["1:1"]);
        assert_eq!(references("=$A:$C"), vec!["$A:$C"]);
        assert_eq!(references("=$3:$4"), vec!["$3:$4"]);
    }

    #[test]
    fn merges_partial_ranges() {
        assert_eq!(references("=B3:4"), vec!["B3:4"]);
        assert_eq!(references("=A:A5"), vec!["A:A5"]);
        assert_eq!(references("=A3:B7"), vec!["A3:B7"]);
    }

    #[test]
    fn merge_keeps_spaces_verbatim() {
        let tokens = pipeline("= A : A ");
        assert_eq!(tokens.len(), 2);
        assert_eq!(tokens[1].value, " A : A ");
        assert_eq!((tokens[1].start, tokens[1].end), (1, 8));
    }

    #[test]
    fn merge_can_strip_spaces() {
        let tokens = enrich_positions(tokenize("= A : A ", &BuiltinFunctions).unwrap());
        let merged = merge_references(tokens, MergeOptions { strip_spaces: true });
        assert_eq!(merged[1].value, "A:A");
        assert_eq!(merged[1].length, 7);
    }

    #[test]
    fn row_and_column_do_not_pair() {
        let tokens = pipeline("=3:A");
        assert!(tokens.iter().all(|t| t.token_type != TokenType::Reference));
        assert_eq!(tokens.len(), 4);
        assert!(references("=A:3").is_empty());
    }

    #[test]
    fn lone_operands() {
        assert_eq!(references("=A1+5"), vec!["A1"]);
        assert_eq!(references("=Sheet2!$B$2"), vec!["Sheet2!$B$2"]);
        // Bare columns and names are not references on their own
        assert!(references("=A+total").is_empty());
    }

    #[test]
    fn sheet_prefixed_range() {
        assert_eq!(references("='My Sheet'!A1:B2*2"), vec!["'My Sheet'!A1:B2"]);
    }

    #[test]
    fn merge_is_lossless() {
        let text = "=SUM( A1 : B2 ,C:C, 3:3 )";
        let joined: String = pipeline(text).iter().map(|t| t.value.as_str()).collect();
        assert_eq!(joined, text);
    }

    // =========================================================================
    // Parentheses
    // =========================================================================

    #[test]
    fn parentheses_get_matching_ids() {
        let tokens = pipeline("=SUM((1),MAX(2)");
        let ids: Vec<_> = tokens
            .iter()
            .filter(|t| matches!(t.token_type, TokenType::LeftParen | TokenType::RightParen))
            .map(|t| (t.value.clone(), t.paren_index))
            .collect();
        assert_eq!(
            ids,
            vec![
                ("(".to_string(), Some(0)),
                ("(".to_string(), Some(1)),
                (")".to_string(), Some(1)),
                ("(".to_string(), Some(2)),
                (")".to_string(), Some(2)),
            ]
        );
    }

    #[test]
    fn unbalanced_close_has_no_id() {
        let tokens = pipeline("=1)");
        assert_eq!(tokens[2].paren_index, None);
    }

    // =========================================================================
    // Function contexts
    // =========================================================================

    #[test]
    fn nested_function_contexts() {
        let tokens = pipeline("=SUM(A1, MAX(B1, C1))");
        let ctx = |value: &str| {
            tokens
                .iter()
                .find(|t| t.value == value)
                .and_then(|t| t.function_context.clone())
                .map(|c| (c.parent, c.arg_position))
        };
        assert_eq!(ctx("A1"), Some(("SUM".to_string(), 0)));
        assert_eq!(ctx("MAX"), Some(("SUM".to_string(), 1)));
        assert_eq!(ctx("B1"), Some(("MAX".to_string(), 0)));
        assert_eq!(ctx("C1"), Some(("MAX".to_string(), 1)));
        assert_eq!(ctx("SUM"), None);
    }

    #[test]
    fn grouping_parens_have_no_parent() {
        let tokens = pipeline("=(A1)+SUM(B1)");
        assert_eq!(tokens[2].value, "A1");
        assert_eq!(tokens[2].function_context, None);
        let b1 = tokens.iter().find(|t| t.value == "B1").unwrap();
        assert_eq!(b1.function_context.as_ref().map(|c| c.parent.as_str()), Some("SUM"));
    }

    #[test]
    fn lowercase_function_context_is_normalized() {
        let tokens = pipeline("=sum(1");
        assert_eq!(tokens[3].function_context.as_ref().map(|c| c.parent.as_str()), Some("SUM"));
    }

    fn contexts(text: &str) -> Vec<(String, Option<(String, usize)>)> {
        pipeline(text)
            .into_iter()
            .map(|t| (t.value, t.function_context.map(|c| (c.parent, c.arg_position))))
            .collect()
    }

    #[test]
    fn call_parentheses_carry_the_call() {
        let sum = |arg| Some(("SUM".to_string(), arg));
        assert_eq!(contexts("=SUM(")[2], ("(".to_string(), sum(0)));

        let tokens = contexts("=SUM(1,2)");
        assert_eq!(tokens[4], (",".to_string(), sum(1)));
        assert_eq!(tokens[6], (")".to_string(), sum(1)));
    }

    #[test]
    fn closing_paren_takes_the_enclosing_call() {
        let tokens = contexts("=SUM(MAX(1),2)");
        assert_eq!(tokens[6].0, ")");
        assert_eq!(tokens[6].1, Some(("MAX".to_string(), 0)));
        let after = &tokens[7];
        assert_eq!(after.0, ",");
        assert_eq!(after.1, Some(("SUM".to_string(), 1)));
    }

    #[test]
    fn function_name_is_forgotten_after_other_tokens() {
        let tokens = contexts("=SUM+(A1)");
        assert!(tokens.iter().all(|(_, ctx)| ctx.is_none()), "{:?}", tokens);

        // Spaces between the name and its parenthesis are fine
        let tokens = contexts("=SUM (A1)");
        let a1 = tokens.iter().find(|(v, _)| v == "A1").unwrap();
        assert_eq!(a1.1, Some(("SUM".to_string(), 0)));
    }
}

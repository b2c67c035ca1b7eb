// Reference fixedness cycling (F4)

use composer_core::reference::cycle_fixedness;
use composer_core::text::utf16_len;
use composer_core::Selection;
use composer_engine::formula::{EnrichedToken, TokenType};

fn overlaps(token: &EnrichedToken, selection: Selection) -> bool {
    let (min, max) = (selection.min(), selection.max());
    (token.start <= min && min <= token.end) || (min <= token.start && token.start <= max)
}

/// Cycle the `$` markers of every reference touched by `selection`.
///
/// Returns the rewritten content and the selection spanning the rewritten
/// references, or `None` when no reference is touched. `tokens` must be the
/// tokens of `content`.
pub fn cycle_references(content: &str, tokens: &[EnrichedToken], selection: Selection) -> Option<(String, Selection)> {
    let mut text = String::with_capacity(content.len() + 4);
    let mut offset = 0;
    let mut first_start = None;
    let mut last_end = 0;
    let mut cycled = 0;

    for token in tokens {
        if token.token_type == TokenType::Reference && overlaps(token, selection) {
            let value = cycle_fixedness(&token.value);
            first_start.get_or_insert(offset);
            offset += utf16_len(&value);
            last_end = offset;
            cycled += 1;
            text.push_str(&value);
        } else {
            offset += token.length;
            text.push_str(&token.value);
        }
    }

    let start = first_start?;
    let selection = if cycled == 1 && selection.is_collapsed() {
        Selection::caret(last_end)
    } else {
        Selection::new(start, last_end)
    };
    Some((text, selection))
}

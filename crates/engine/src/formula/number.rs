//! Locale-aware number recognition
//!
//! Text is split into number tokens (digit runs, separators, signs, currency,
//! percent, exponent marker) and the token *shape* is matched against a
//! recursive-descent grammar:
//!
//! ```text
//! integer  := DIGIT (THOUSANDS DIGIT)*
//! decimal  := DECIMAL DIGIT?
//! numeral  := integer decimal? | decimal        (at least one digit run)
//! exponent := EXPONENT SIGN? DIGIT
//! value    := numeral exponent? PERCENT?
//! number   := SPACE* ((SIGN | CURRENCY) SPACE*)* value (SPACE* CURRENCY)?
//! ```
//!
//! Sign and currency appear at most once each. The compiled layout of a
//! shape does not depend on the digits, so layouts are cached per shape in a
//! bounded [`ShapeCache`].

use rustc_hash::FxHashMap;

use crate::locale::Locale;

pub const DEFAULT_SHAPE_CACHE_CAPACITY: usize = 256;

const CURRENCY_SYMBOLS: &[char] = &['$', '€', '£', '¥'];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NumberTokenType {
    Space,
    Digit,
    DecimalSeparator,
    Sign,
    Percent,
    ThousandsSeparator,
    Currency,
    Exponent,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NumberToken {
    pub token_type: NumberTokenType,
    pub value: String,
}

/// Split `text` into number tokens. Returns `None` as soon as a character
/// cannot be part of a number.
pub fn number_tokens(text: &str, locale: &Locale) -> Option<Vec<NumberToken>> {
    use NumberTokenType::*;

    let chars: Vec<char> = text.chars().collect();
    let mut tokens: Vec<NumberToken> = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let ch = chars[i];

        if ch.is_ascii_digit() {
            let start = i;
            while i < chars.len() && chars[i].is_ascii_digit() {
                i += 1;
            }
            tokens.push(NumberToken { token_type: Digit, value: chars[start..i].iter().collect() });
            continue;
        }

        let token_type = if ch == locale.decimal_separator {
            DecimalSeparator
        } else if Some(ch) == locale.thousands_separator
            && tokens.last().is_some_and(|t| t.token_type == Digit)
            && chars.get(i + 1).is_some_and(|c| c.is_ascii_digit())
        {
            ThousandsSeparator
        } else if ch.is_whitespace() {
            let start = i;
            while i < chars.len() && chars[i].is_whitespace() {
                i += 1;
            }
            tokens.push(NumberToken { token_type: Space, value: chars[start..i].iter().collect() });
            continue;
        } else if ch == '+' || ch == '-' {
            Sign
        } else if ch == '%' {
            Percent
        } else if ch == 'e' || ch == 'E' {
            Exponent
        } else if CURRENCY_SYMBOLS.contains(&ch) {
            Currency
        } else {
            return None;
        };

        tokens.push(NumberToken { token_type, value: ch.to_string() });
        i += 1;
    }

    Some(tokens)
}

// ============================================================================
// Grammar
// ============================================================================

/// Token indices of each part of a recognized number. Digit values are read
/// from the token list at evaluation time.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Layout {
    consumed: usize,
    sign: Option<usize>,
    integer: Vec<usize>,
    fraction: Option<usize>,
    exponent: Option<Exponent>,
    percent: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Exponent {
    sign: Option<usize>,
    digits: usize,
}

struct Numeral {
    integer: Vec<usize>,
    fraction: Option<usize>,
}

struct Value {
    numeral: Numeral,
    exponent: Option<Exponent>,
    percent: bool,
}

/// Parser result: the parsed part and the cursor just past it.
type Parsed<T> = Option<(T, usize)>;

type Shape = [NumberTokenType];

fn at(shape: &Shape, pos: usize, expected: NumberTokenType) -> bool {
    shape.get(pos) == Some(&expected)
}

fn skip_spaces(shape: &Shape, mut pos: usize) -> usize {
    while at(shape, pos, NumberTokenType::Space) {
        pos += 1;
    }
    pos
}

fn integer_part(shape: &Shape, pos: usize) -> Parsed<Vec<usize>> {
    use NumberTokenType::*;
    if !at(shape, pos, Digit) {
        return None;
    }
    let mut digits = vec![pos];
    let mut cursor = pos + 1;
    while at(shape, cursor, ThousandsSeparator) && at(shape, cursor + 1, Digit) {
        digits.push(cursor + 1);
        cursor += 2;
    }
    Some((digits, cursor))
}

fn decimal_part(shape: &Shape, pos: usize) -> Parsed<Option<usize>> {
    use NumberTokenType::*;
    if !at(shape, pos, DecimalSeparator) {
        return None;
    }
    if at(shape, pos + 1, Digit) {
        Some((Some(pos + 1), pos + 2))
    } else {
        Some((None, pos + 1))
    }
}

fn numeral(shape: &Shape, pos: usize) -> Parsed<Numeral> {
    let (integer, cursor) = integer_part(shape, pos).unwrap_or((Vec::new(), pos));
    let (fraction, cursor) = decimal_part(shape, cursor).unwrap_or((None, cursor));
    if integer.is_empty() && fraction.is_none() {
        return None;
    }
    Some((Numeral { integer, fraction }, cursor))
}

fn exponent(shape: &Shape, pos: usize) -> Parsed<Exponent> {
    if !at(shape, pos, NumberTokenType::Exponent) {
        return None;
    }
    let mut cursor = pos + 1;
    let sign = if at(shape, cursor, NumberTokenType::Sign) {
        cursor += 1;
        Some(cursor - 1)
    } else {
        None
    };
    if !at(shape, cursor, NumberTokenType::Digit) {
        return None;
    }
    Some((Exponent { sign, digits: cursor }, cursor + 1))
}

/// `standalone` values may hold spaces between their parts and end in a
/// percent sign. Formula literals are contiguous.
fn value(shape: &Shape, pos: usize, standalone: bool) -> Parsed<Value> {
    let gap = |cursor: usize| if standalone { skip_spaces(shape, cursor) } else { cursor };

    let (numeral, mut cursor) = numeral(shape, pos)?;
    let exponent = exponent(shape, gap(cursor)).map(|(e, next)| {
        cursor = next;
        e
    });
    let before_percent = gap(cursor);
    let percent = standalone && at(shape, before_percent, NumberTokenType::Percent);
    if percent {
        cursor = before_percent + 1;
    }
    Some((Value { numeral, exponent, percent }, cursor))
}

fn full_number(shape: &Shape) -> Option<Layout> {
    use NumberTokenType::*;

    let mut cursor = skip_spaces(shape, 0);
    let mut sign = None;
    let mut currency_before = false;
    loop {
        match shape.get(cursor) {
            Some(Sign) if sign.is_none() => {
                sign = Some(cursor);
                cursor = skip_spaces(shape, cursor + 1);
            }
            Some(Currency) if !currency_before => {
                currency_before = true;
                cursor = skip_spaces(shape, cursor + 1);
            }
            _ => break,
        }
    }

    let (value, mut consumed) = value(shape, cursor, true)?;
    if !currency_before {
        let after = skip_spaces(shape, consumed);
        if at(shape, after, Currency) {
            consumed = after + 1;
        }
    }

    Some(Layout {
        consumed,
        sign,
        integer: value.numeral.integer,
        fraction: value.numeral.fraction,
        exponent: value.exponent,
        percent: value.percent,
    })
}

/// Numeric literal as it may appear inside a formula: no sign, currency,
/// grouping or percent (those are operators or symbols there).
fn formula_literal(shape: &Shape) -> Option<Layout> {
    let (value, consumed) = value(shape, 0, false)?;
    Some(Layout {
        consumed,
        sign: None,
        integer: value.numeral.integer,
        fraction: value.numeral.fraction,
        exponent: value.exponent,
        percent: false,
    })
}

fn evaluate(tokens: &[NumberToken], layout: &Layout) -> Option<f64> {
    let mut literal = String::new();
    if let Some(i) = layout.sign {
        if tokens[i].value == "-" {
            literal.push('-');
        }
    }
    if layout.integer.is_empty() {
        literal.push('0');
    }
    for &i in &layout.integer {
        literal.push_str(&tokens[i].value);
    }
    if let Some(i) = layout.fraction {
        literal.push('.');
        literal.push_str(&tokens[i].value);
    }

    let mut exp: i64 = 0;
    if let Some(e) = layout.exponent {
        exp = tokens[e.digits].value.parse().unwrap_or(i64::from(i32::MAX));
        if e.sign.is_some_and(|s| tokens[s].value == "-") {
            exp = -exp;
        }
    }
    if layout.percent {
        exp -= 2;
    }
    if exp != 0 {
        literal.push_str(&format!("e{}", exp));
    }
    literal.parse().ok()
}

// ============================================================================
// Shape cache
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Grammar {
    Full,
    FormulaLiteral,
}

/// Compiled layouts keyed by grammar and token shape. Cleared when full, so
/// memory stays bounded over a long session.
#[derive(Debug)]
pub struct ShapeCache {
    capacity: usize,
    layouts: FxHashMap<(Grammar, Vec<NumberTokenType>), Option<Layout>>,
}

impl ShapeCache {
    pub fn new(capacity: usize) -> Self {
        Self { capacity: capacity.max(1), layouts: FxHashMap::default() }
    }

    pub fn len(&self) -> usize {
        self.layouts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layouts.is_empty()
    }

    pub fn clear(&mut self) {
        self.layouts.clear();
    }

    fn layout(&mut self, grammar: Grammar, shape: Vec<NumberTokenType>) -> Option<Layout> {
        let key = (grammar, shape);
        if let Some(layout) = self.layouts.get(&key) {
            return layout.clone();
        }
        let layout = match grammar {
            Grammar::Full => full_number(&key.1),
            Grammar::FormulaLiteral => formula_literal(&key.1),
        };
        if self.layouts.len() >= self.capacity {
            self.layouts.clear();
        }
        self.layouts.insert(key, layout.clone());
        layout
    }
}

// ============================================================================
// Parser
// ============================================================================

/// Number recognizer bound to one locale, owning its shape cache.
#[derive(Debug)]
pub struct NumberParser {
    locale: Locale,
    cache: ShapeCache,
}

impl NumberParser {
    pub fn new(locale: Locale, cache_capacity: usize) -> Self {
        Self { locale, cache: ShapeCache::new(cache_capacity) }
    }

    pub fn locale(&self) -> &Locale {
        &self.locale
    }

    pub fn cached_shapes(&self) -> usize {
        self.cache.len()
    }

    /// Recognize the longest number at the start of `tokens`, returning its
    /// value and the number of tokens it spans.
    pub fn recognize(&mut self, tokens: &[NumberToken]) -> Option<(f64, usize)> {
        let shape: Vec<_> = tokens.iter().map(|t| t.token_type).collect();
        let layout = self.cache.layout(Grammar::Full, shape)?;
        let value = evaluate(tokens, &layout)?;
        Some((value, layout.consumed))
    }

    /// Parse `text` as a whole number. Surrounding whitespace is ignored;
    /// anything else left over makes the text a non-number.
    pub fn parse(&mut self, text: &str) -> Option<f64> {
        let tokens = number_tokens(text.trim(), &self.locale)?;
        let (value, consumed) = self.recognize(&tokens)?;
        (consumed == tokens.len()).then_some(value)
    }

    /// Byte length of the numeric literal at the start of `text`, formula
    /// rules (digits, decimal separator, exponent).
    pub fn scan_formula_literal(&mut self, text: &str) -> Option<usize> {
        let decimal = self.locale.decimal_separator;
        let mut end = 0;
        let mut prev: Option<char> = None;
        for (idx, ch) in text.char_indices() {
            let accepted = ch.is_ascii_digit()
                || ch == decimal
                || ch == 'e'
                || ch == 'E'
                || ((ch == '+' || ch == '-') && matches!(prev, Some('e') | Some('E')));
            if !accepted {
                break;
            }
            end = idx + ch.len_utf8();
            prev = Some(ch);
        }
        if end == 0 {
            return None;
        }

        let candidate = &text[..end];
        let literal_locale = Locale { thousands_separator: None, ..self.locale.clone() };
        let tokens = number_tokens(candidate, &literal_locale)?;
        let shape: Vec<_> = tokens.iter().map(|t| t.token_type).collect();
        let layout = self.cache.layout(Grammar::FormulaLiteral, shape)?;
        Some(tokens[..layout.consumed].iter().map(|t| t.value.len()).sum())
    }
}

/// Parse a locale-formatted number (`"1,234.5"`, `"-5%"`, `"1 234,5 €"`).
pub fn parse_number(text: &str, locale: &Locale) -> Option<f64> {
    NumberParser::new(locale.clone(), 8).parse(text)
}

pub fn is_number(text: &str, locale: &Locale) -> bool {
    parse_number(text, locale).is_some()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn en(text: &str) -> Option<f64> {
        parse_number(text, &Locale::en_us())
    }

    // =========================================================================
    // Token splitting
    // =========================================================================

    #[test]
    fn splits_into_number_tokens() {
        use NumberTokenType::*;
        let tokens = number_tokens("-1,234.5e3 %", &Locale::en_us()).unwrap();
        let types: Vec<_> = tokens.iter().map(|t| t.token_type).collect();
        assert_eq!(
            types,
            vec![Sign, Digit, ThousandsSeparator, Digit, DecimalSeparator, Digit, Exponent, Digit, Space, Percent]
        );
        assert_eq!(tokens[3].value, "234");
    }

    #[test]
    fn rejects_foreign_characters() {
        assert!(number_tokens("12a", &Locale::en_us()).is_none());
        assert!(number_tokens("1;2", &Locale::en_us()).is_none());
    }

    #[test]
    fn space_thousands_separator_only_between_digits() {
        use NumberTokenType::*;
        let tokens = number_tokens("1 234,5 €", &Locale::fr_fr()).unwrap();
        let types: Vec<_> = tokens.iter().map(|t| t.token_type).collect();
        assert_eq!(types, vec![Digit, ThousandsSeparator, Digit, DecimalSeparator, Digit, Space, Currency]);
    }

    // =========================================================================
    // Grammar
    // =========================================================================

    #[test]
    fn plain_numbers() {
        assert_eq!(en("42"), Some(42.0));
        assert_eq!(en("3.25"), Some(3.25));
        assert_eq!(en(".5"), Some(0.5));
        assert_eq!(en("5."), Some(5.0));
        assert_eq!(en("  7  "), Some(7.0));
    }

    #[test]
    fn grouped_and_localized() {
        assert_eq!(en("1,234.5"), Some(1234.5));
        assert_eq!(parse_number("1 234,5 €", &Locale::fr_fr()), Some(1234.5));
        assert_eq!(parse_number("1.234,5", &Locale::de_de()), Some(1234.5));
    }

    #[test]
    fn signs_percent_exponent() {
        assert_eq!(en("-5%"), Some(-0.05));
        assert_eq!(en("+12"), Some(12.0));
        assert_eq!(en("1e3"), Some(1000.0));
        assert_eq!(en("2.5E-2"), Some(0.025));
        assert_eq!(en("1.5e-3%"), Some(1.5e-5));
        assert_eq!(en("- 3"), Some(-3.0));
    }

    #[test]
    fn spaces_between_parts() {
        assert_eq!(en("5 %"), Some(0.05));
        assert_eq!(en("1 e3"), Some(1000.0));
        assert_eq!(en("-2.5 E-1 %"), Some(-0.0025));
        assert_eq!(en("1 e"), None);
        assert_eq!(en("5 % %"), None);
    }

    #[test]
    fn currency_before_or_after() {
        assert_eq!(en("$12"), Some(12.0));
        assert_eq!(en("$ 12"), Some(12.0));
        assert_eq!(en("12 $"), Some(12.0));
        assert_eq!(en("-$12"), Some(-12.0));
        assert_eq!(en("$-12"), Some(-12.0));
        assert_eq!(en("$12$"), None);
    }

    #[test]
    fn malformed_numbers() {
        assert_eq!(en("."), None);
        assert_eq!(en("1e"), None);
        assert_eq!(en("5-"), None);
        assert_eq!(en("--5"), None);
        assert_eq!(en("5%%"), None);
        assert_eq!(en(""), None);
        assert_eq!(en("%"), None);
        assert_eq!(en("1.2.3"), None);
    }

    #[test]
    fn recognize_consumes_prefix_only() {
        let mut parser = NumberParser::new(Locale::en_us(), 16);
        let tokens = number_tokens("5-", &Locale::en_us()).unwrap();
        assert_eq!(parser.recognize(&tokens), Some((5.0, 1)));

        let tokens = number_tokens("12 $ 4", &Locale::en_us()).unwrap();
        assert_eq!(parser.recognize(&tokens), Some((12.0, 3)));
    }

    // =========================================================================
    // Cache
    // =========================================================================

    #[test]
    fn same_shape_reuses_layout() {
        let mut parser = NumberParser::new(Locale::en_us(), 16);
        assert_eq!(parser.parse("12.5"), Some(12.5));
        assert_eq!(parser.parse("99.125"), Some(99.125));
        assert_eq!(parser.cached_shapes(), 1);
        assert_eq!(parser.parse("-7"), Some(-7.0));
        assert_eq!(parser.cached_shapes(), 2);
    }

    #[test]
    fn cache_stays_bounded() {
        let mut parser = NumberParser::new(Locale::en_us(), 2);
        for text in ["1", "1.5", "-1", "1%", "1e2"] {
            assert!(parser.parse(text).is_some());
            assert!(parser.cached_shapes() <= 2);
        }
        // Results do not depend on what was evicted
        assert_eq!(parser.parse("1.5"), Some(1.5));
    }

    // =========================================================================
    // Formula literals
    // =========================================================================

    #[test]
    fn formula_literal_lengths() {
        let mut parser = NumberParser::new(Locale::en_us(), 16);
        assert_eq!(parser.scan_formula_literal("1.5e3+2"), Some(5));
        assert_eq!(parser.scan_formula_literal("1e+"), Some(1));
        assert_eq!(parser.scan_formula_literal("2E-2)"), Some(4));
        assert_eq!(parser.scan_formula_literal(".5)"), Some(2));
        assert_eq!(parser.scan_formula_literal("12,3"), Some(2));
        assert_eq!(parser.scan_formula_literal("1 e3"), Some(1));
        assert_eq!(parser.scan_formula_literal("."), None);
        assert_eq!(parser.scan_formula_literal("A1"), None);
    }

    #[test]
    fn formula_literal_uses_locale_decimal() {
        let mut parser = NumberParser::new(Locale::fr_fr(), 16);
        assert_eq!(parser.scan_formula_literal("1,5;2"), Some(3));
        assert_eq!(parser.scan_formula_literal("1.5"), Some(1));
    }
}

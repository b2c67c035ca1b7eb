use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TokenType {
    Operator,
    Number,
    String,
    Function,
    Symbol,
    Space,
    Debugger,
    ArgSeparator,
    LeftParen,
    RightParen,
    /// Produced by the range merger, never by the lexer.
    Reference,
}

/// A lexical token. Concatenating the values of a token list reproduces the
/// lexed text exactly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    #[serde(rename = "type")]
    pub token_type: TokenType,
    pub value: String,
}

impl Token {
    pub fn new(token_type: TokenType, value: impl Into<String>) -> Self {
        Self { token_type, value: value.into() }
    }
}

/// Enclosing function call of a token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionContext {
    pub parent: String,
    pub arg_position: usize,
}

/// A token annotated with its UTF-16 span, matching parenthesis id and
/// enclosing function call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnrichedToken {
    #[serde(rename = "type")]
    pub token_type: TokenType,
    pub value: String,
    pub start: usize,
    pub end: usize,
    pub length: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub paren_index: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub function_context: Option<FunctionContext>,
}

impl EnrichedToken {
    pub fn is_operator(&self, op: &str) -> bool {
        self.token_type == TokenType::Operator && self.value == op
    }

    /// True if `[min, max]` lies inside `[start, end]`.
    pub fn covers(&self, min: usize, max: usize) -> bool {
        self.start <= min && self.end >= max
    }
}


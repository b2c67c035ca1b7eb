// Formula tokenization: lexing, number recognition and enrichment

pub mod enrich;
pub mod functions;
pub mod lexer;
pub mod number;
pub mod token;

pub use enrich::{composer_tokenize, composer_tokenize_with_limit, MergeOptions};
pub use functions::{BuiltinFunctions, FunctionInfo, FunctionRegistry};
pub use lexer::{tokenize, tokenize_localized, tokenize_localized_with_limit, LexError, MAX_TOKENS};
pub use number::{parse_number, NumberParser};
pub use token::{EnrichedToken, FunctionContext, Token, TokenType};

//! Tokens, token lists and the line tokenizer

pub mod token;
pub mod token_list;
pub mod tokenizer;

pub use token::{
    DirectiveToken, ErrorCounter, IndexLiteralToken, IndexMacroToken, SimpleKind,
    SimpleMacroToken, TextToken, Token,
};
pub use token_list::{TokenList, UnrollStatus};
pub use tokenizer::{TokenizeError, Tokenizer};

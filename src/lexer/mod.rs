//! Lexical analysis for PL241
//!
//! Converts source text into a stream of tokens with line and column
//! positions. Two-character operators are recognised with one character of
//! lookahead.

mod scanner;
mod token;

pub use scanner::Scanner;
pub use token::{Token, TokenKind};

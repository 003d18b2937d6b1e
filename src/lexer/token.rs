use serde::{Deserialize, Serialize};

/// A single token from the source code
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    /// The type of token
    pub kind: TokenKind,
    /// Original text of the token
    pub lexeme: String,
    /// Line number where token appears (1-indexed)
    pub line: usize,
    /// Column number where token starts (1-indexed)
    pub column: usize,
}

impl Token {
    /// Creates a new token with the given properties
    pub fn new(kind: TokenKind, lexeme: String, line: usize, column: usize) -> Self {
        Token {
            kind,
            lexeme,
            line,
            column,
        }
    }
}

/// All possible token types in PL241
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TokenKind {
    // Literals
    /// Decimal integer literal
    Number(i64),

    // Identifiers
    /// Identifier (`letter {letter|digit}`)
    Identifier(String),

    // Keywords
    /// MAIN keyword
    Main,
    /// FUNCTION keyword
    Function,
    /// PROCEDURE keyword
    Procedure,
    /// ARRAY keyword
    Array,
    /// VAR keyword
    Var,
    /// RETURN keyword
    Return,
    /// WHILE keyword
    While,
    /// IF keyword
    If,
    /// CALL keyword
    Call,
    /// LET keyword
    Let,
    /// ELSE keyword
    Else,
    /// FI keyword (closes `if`)
    Fi,
    /// DO keyword
    Do,
    /// OD keyword (closes `while`)
    Od,
    /// THEN keyword
    Then,

    // Operators
    /// Plus operator (+)
    Plus,
    /// Minus operator (-)
    Minus,
    /// Star operator (*)
    Star,
    /// Slash operator (/)
    Slash,
    /// Equality operator (==)
    Eq,
    /// Inequality operator (!=)
    NotEq,
    /// Less than operator (<)
    Lt,
    /// Less than or equal operator (<=)
    LtEq,
    /// Greater than operator (>)
    Gt,
    /// Greater than or equal operator (>=)
    GtEq,
    /// Assignment arrow (<-)
    Arrow,

    // Delimiters
    /// Left parenthesis (
    LeftParen,
    /// Right parenthesis )
    RightParen,
    /// Left bracket [
    LeftBracket,
    /// Right bracket ]
    RightBracket,
    /// Left brace {
    LeftBrace,
    /// Right brace }
    RightBrace,
    /// Comma delimiter
    Comma,
    /// Semicolon delimiter
    Semicolon,
    /// Period terminating the computation
    Period,

    // Special
    /// End of file marker
    Eof,
}

impl TokenKind {
    /// Check if token is a keyword
    pub fn is_keyword(&self) -> bool {
        matches!(
            self,
            TokenKind::Main
                | TokenKind::Function
                | TokenKind::Procedure
                | TokenKind::Array
                | TokenKind::Var
                | TokenKind::Return
                | TokenKind::While
                | TokenKind::If
                | TokenKind::Call
                | TokenKind::Let
                | TokenKind::Else
                | TokenKind::Fi
                | TokenKind::Do
                | TokenKind::Od
                | TokenKind::Then
        )
    }

    /// Check if token is one of the six relational operators
    pub fn is_relational(&self) -> bool {
        matches!(
            self,
            TokenKind::Eq
                | TokenKind::NotEq
                | TokenKind::Lt
                | TokenKind::LtEq
                | TokenKind::Gt
                | TokenKind::GtEq
        )
    }

    /// Get keyword from string
    pub fn keyword(s: &str) -> Option<TokenKind> {
        match s {
            "main" => Some(TokenKind::Main),
            "function" => Some(TokenKind::Function),
            "procedure" => Some(TokenKind::Procedure),
            "array" => Some(TokenKind::Array),
            "var" => Some(TokenKind::Var),
            "return" => Some(TokenKind::Return),
            "while" => Some(TokenKind::While),
            "if" => Some(TokenKind::If),
            "call" => Some(TokenKind::Call),
            "let" => Some(TokenKind::Let),
            "else" => Some(TokenKind::Else),
            "fi" => Some(TokenKind::Fi),
            "do" => Some(TokenKind::Do),
            "od" => Some(TokenKind::Od),
            "then" => Some(TokenKind::Then),
            _ => None,
        }
    }
}

impl std::fmt::Display for TokenKind {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        let text = match self {
            TokenKind::Number(n) => return write!(f, "{}", n),
            TokenKind::Identifier(id) => return write!(f, "{}", id),
            TokenKind::Main => "main",
            TokenKind::Function => "function",
            TokenKind::Procedure => "procedure",
            TokenKind::Array => "array",
            TokenKind::Var => "var",
            TokenKind::Return => "return",
            TokenKind::While => "while",
            TokenKind::If => "if",
            TokenKind::Call => "call",
            TokenKind::Let => "let",
            TokenKind::Else => "else",
            TokenKind::Fi => "fi",
            TokenKind::Do => "do",
            TokenKind::Od => "od",
            TokenKind::Then => "then",
            TokenKind::Plus => "+",
            TokenKind::Minus => "-",
            TokenKind::Star => "*",
            TokenKind::Slash => "/",
            TokenKind::Eq => "==",
            TokenKind::NotEq => "!=",
            TokenKind::Lt => "<",
            TokenKind::LtEq => "<=",
            TokenKind::Gt => ">",
            TokenKind::GtEq => ">=",
            TokenKind::Arrow => "<-",
            TokenKind::LeftParen => "(",
            TokenKind::RightParen => ")",
            TokenKind::LeftBracket => "[",
            TokenKind::RightBracket => "]",
            TokenKind::LeftBrace => "{",
            TokenKind::RightBrace => "}",
            TokenKind::Comma => ",",
            TokenKind::Semicolon => ";",
            TokenKind::Period => ".",
            TokenKind::Eof => "end of file",
        };
        write!(f, "{}", text)
    }
}

//! Program tokens
//!
//! The parser reduces a query string to a flat program of typed tokens.
//! The tokeniser binds no meaning to operator words; that happens on the
//! evaluator's stack.

use std::fmt;

/// One token with its byte offset in the source text
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub tok: Tok,
    pub offset: usize,
}

/// Token payload
#[derive(Debug, Clone, PartialEq)]
pub enum Tok {
    /// A string literal
    Str(String),
    /// A numeric literal, scientific notation included
    Num(f64),
    /// An operator word, `:` prefix stripped is the name
    Op(String),
    /// A parenthesised word list
    List(Vec<String>),
}

/// A parsed program: tokens in execution order
pub type Program = Vec<Token>;

impl fmt::Display for Tok {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Tok::Str(s) => write!(f, "{}", s),
            Tok::Num(n) => write!(f, "{}", n),
            Tok::Op(name) => write!(f, ":{}", name),
            Tok::List(words) => write!(f, "(,{},)", words.join(",")),
        }
    }
}

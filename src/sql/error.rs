//! Query language error types
//!
//! Parse failures carry the byte offset of the offending token; evaluation
//! failures carry the operator and the operand types it observed.

use crate::model::DataError;
use thiserror::Error;

/// Errors from the tokeniser
#[derive(Error, Debug)]
pub enum ParseError {
    /// A `(` without a matching `)`
    #[error("unclosed '(' at offset {offset}")]
    UnbalancedOpen { offset: usize },

    /// A `)` without a matching `(`
    #[error("unmatched ')' at offset {offset}")]
    UnbalancedClose { offset: usize },

    /// A `(` inside a word list; lists do not nest
    #[error("nested word list at offset {offset}")]
    NestedList { offset: usize },

    /// Two adjacent commas
    #[error("empty token at offset {offset}")]
    EmptyToken { offset: usize },

    /// A token that starts numeric but fails to parse as a number
    #[error("malformed number {token:?} at offset {offset}")]
    BadNumber { token: String, offset: usize },

    /// A bare `:` with no operator name
    #[error("empty operator name at offset {offset}")]
    EmptyOperator { offset: usize },
}

/// Result type for parsing
pub type ParseResult<T> = Result<T, ParseError>;

/// Errors from program evaluation
#[derive(Error, Debug)]
pub enum EvalError {
    /// An operator popped more operands than the stack held
    #[error("stack underflow in {op}")]
    StackUnderflow { op: String },

    /// An operand of the wrong type
    #[error("{op} expected {expected}, found {found}")]
    TypeMismatch {
        op: String,
        expected: &'static str,
        found: &'static str,
    },

    /// Operator word not in the vocabulary
    #[error("unknown operator {op} at offset {offset}")]
    UnknownOperator { op: String, offset: usize },

    /// A word list of the wrong size
    #[error("{op} expected at least {expected} list items, found {found}")]
    ArityMismatch {
        op: String,
        expected: usize,
        found: usize,
    },

    /// Pattern given to `:re` failed to compile
    #[error("invalid regex {pattern:?}: {source}")]
    InvalidRegex {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    /// An operand with an out-of-range or unparseable value
    #[error("invalid argument to {op}: {message}")]
    InvalidArgument { op: String, message: String },

    /// A literal left on the stack when the program ended
    #[error("operand left on stack after program end: {kind}")]
    TrailingOperand { kind: &'static str },

    /// Sequence or context violation while materialising
    #[error(transparent)]
    Data(#[from] DataError),

    /// Tag index failure, surfaced untouched
    #[error(transparent)]
    Index(#[from] std::io::Error),
}

/// Result type for evaluation
pub type EvalResult<T> = Result<T, EvalError>;

//! Crate-level error type
//!
//! Every layer keeps its own error enum; [`GraphError`] aggregates them
//! at the entry point so callers see exactly one kind per failure. A tag
//! index I/O failure stays an I/O failure all the way up; it is never
//! repackaged as an evaluation error.

use crate::chart::CodecError;
use crate::config::UsageError;
use crate::model::DataError;
use crate::render::RenderError;
use crate::sql::{EvalError, ParseError};
use thiserror::Error;

/// Any failure of a graph request
#[derive(Error, Debug)]
pub enum GraphError {
    /// Option validation failure
    #[error(transparent)]
    Usage(#[from] UsageError),

    /// Query text rejected by the tokeniser
    #[error(transparent)]
    Parse(#[from] ParseError),

    /// Program execution failure
    #[error(transparent)]
    Eval(EvalError),

    /// Context or sequence invariant violation
    #[error(transparent)]
    Data(#[from] DataError),

    /// Rasterisation failure
    #[error(transparent)]
    Render(#[from] RenderError),

    /// Graph definition codec failure
    #[error(transparent)]
    Codec(#[from] CodecError),

    /// Sink or source I/O failure
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl GraphError {
    /// Short kind name for one-line error reporting
    pub fn kind(&self) -> &'static str {
        match self {
            GraphError::Usage(_) => "usage",
            GraphError::Parse(_) => "parse",
            GraphError::Eval(_) => "eval",
            GraphError::Data(_) => "data",
            GraphError::Render(_) => "render",
            GraphError::Codec(_) => "codec",
            GraphError::Io(_) => "io",
        }
    }
}

impl From<EvalError> for GraphError {
    fn from(e: EvalError) -> Self {
        match e {
            // Keep wrapped failures at their own kind
            EvalError::Index(io) => GraphError::Io(io),
            EvalError::Data(d) => GraphError::Data(d),
            other => GraphError::Eval(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn test_index_io_keeps_its_kind() {
        let e = EvalError::Index(io::Error::new(io::ErrorKind::Other, "backend gone"));
        let g: GraphError = e.into();
        assert_eq!(g.kind(), "io");
    }

    #[test]
    fn test_eval_data_keeps_its_kind() {
        let e = EvalError::Data(DataError::InvalidContext("step".to_string()));
        let g: GraphError = e.into();
        assert_eq!(g.kind(), "data");
    }

    #[test]
    fn test_eval_kind() {
        let e = EvalError::StackUnderflow {
            op: "sum".to_string(),
        };
        let g: GraphError = e.into();
        assert_eq!(g.kind(), "eval");
        assert_eq!(g.to_string(), "stack underflow in sum");
    }
}

//! Textual update-rule compiler and evaluator.
//!
//! This crate turns short rule texts (sequences of assignment statements such
//! as `v += w; apre = apre * decay`) into executable programs over named
//! scalar slots. It knows nothing about synapses or neuron populations: the
//! caller supplies a [`Scope`] that resolves variable loads, stores, and
//! stateful calls (`rand()`, `randn()`), which is how the engine binds rule
//! text to its per-synapse and per-neuron arrays.
//!
//! Single expressions (no assignment) can also be parsed, which backs
//! predicate-based connectivity such as `i == j` or `exp(-abs(i-j)*0.1)`.

#![warn(missing_docs)]

mod ast;
mod eval;
mod lexer;
mod parser;

pub use ast::{AssignOp, BinaryOp, Expr, Program, Stmt};
pub use eval::Scope;
pub use parser::{parse_expression, parse_program};

/// Result type for expression operations
pub type Result<T> = std::result::Result<T, ExprError>;

/// Errors produced while compiling or evaluating rule text
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum ExprError {
    /// Rule text could not be parsed
    #[error("parse error at offset {position}: {message}")]
    Parse {
        /// Byte offset into the rule text
        position: usize,
        /// What went wrong
        message: String,
    },

    /// A call names a function the evaluator does not provide
    #[error("unknown function '{name}'")]
    UnknownFunction {
        /// Function name as written
        name: String,
    },

    /// A call has the wrong number of arguments
    #[error("function '{name}' expects {expected} argument(s), got {found}")]
    WrongArity {
        /// Function name as written
        name: String,
        /// Required argument count
        expected: usize,
        /// Argument count in the call
        found: usize,
    },

    /// A variable load or store could not be resolved by the scope
    #[error("unknown variable '{name}'")]
    UnknownVariable {
        /// Variable name as written
        name: String,
    },

    /// A scope-provided call failed
    #[error("call to '{name}' failed")]
    CallFailed {
        /// Function name as written
        name: String,
    },
}

impl ExprError {
    /// Create a parse error
    pub fn parse(position: usize, message: impl Into<String>) -> Self {
        Self::Parse {
            position,
            message: message.into(),
        }
    }
}

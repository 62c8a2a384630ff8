//! Error types for the connectivity and event engine

use synfire_expr::ExprError;
use thiserror::Error;

/// Result type for engine operations
pub type Result<T> = std::result::Result<T, CoreError>;

/// Errors that can occur while building or stepping the engine
#[derive(Error, Debug)]
pub enum CoreError {
    /// Malformed batch input to the connectivity store
    #[error("Invalid connectivity: {reason}")]
    InvalidConnectivity {
        /// Reason the batch was rejected
        reason: String,
    },

    /// A selector resolved outside the population bounds
    #[error("Index {index} out of range (population size {bound})")]
    IndexOutOfRange {
        /// The offending index
        index: u32,
        /// The population size it was checked against
        bound: usize,
    },

    /// Invalid synapse model definition
    #[error("Invalid synapse model: {reason}")]
    InvalidModel {
        /// Reason the model was rejected
        reason: String,
    },

    /// Rule text could not be turned into an executable transform
    #[error("Rule compilation failed: {reason}")]
    RuleCompilation {
        /// Compiler diagnostic
        reason: String,
    },

    /// A compiled rule failed during evaluation; fatal to the run
    #[error("Rule execution failed at t={time_ms}ms: {reason}")]
    RuleExecution {
        /// Simulation time at failure
        time_ms: f32,
        /// Evaluator diagnostic
        reason: String,
    },

    /// Operation the engine rejects by design
    #[error("Unsupported operation: {operation}")]
    Unsupported {
        /// What was attempted
        operation: String,
    },

    /// Expression parse failure surfacing at rule or predicate compile time
    #[error("Expression error: {0}")]
    Expr(#[from] ExprError),
}

impl CoreError {
    /// Create an invalid-connectivity error
    pub fn invalid_connectivity(reason: impl Into<String>) -> Self {
        Self::InvalidConnectivity {
            reason: reason.into(),
        }
    }

    /// Create an out-of-range error
    pub fn index_out_of_range(index: u32, bound: usize) -> Self {
        Self::IndexOutOfRange { index, bound }
    }

    /// Create an invalid-model error
    pub fn invalid_model(reason: impl Into<String>) -> Self {
        Self::InvalidModel {
            reason: reason.into(),
        }
    }

    /// Create a rule-compilation error
    pub fn rule_compilation(reason: impl Into<String>) -> Self {
        Self::RuleCompilation {
            reason: reason.into(),
        }
    }

    /// Create a rule-execution error
    pub fn rule_execution(time_ms: f32, reason: impl Into<String>) -> Self {
        Self::RuleExecution {
            time_ms,
            reason: reason.into(),
        }
    }

    /// Create an unsupported-operation error
    pub fn unsupported(operation: impl Into<String>) -> Self {
        Self::Unsupported {
            operation: operation.into(),
        }
    }
}

//! Error types for strategic allocation.
//!
//! Errors fall into three families that mirror the lifecycle of a model:
//! - [`ConstructionError`]: assembling variables, nodes and arcs. Fatal to
//!   model assembly.
//! - [`TableError`]: allocating, filling and reading tables. Fatal to the
//!   single table operation.
//! - [`QueryError`]: evidence and inference. Fatal to the current query only;
//!   the diagram is left untouched.
//!
//! The unified [`Error`] wraps all three together with configuration and I/O
//! failures and carries stable codes for machine parsing.
//!
//! # Agent-Facing Output
//!
//! Errors serialize to structured JSON through [`ErrorReport`]:
//! ```json
//! {
//!   "code": 22,
//!   "category": "table",
//!   "message": "unknown label 'Sideways' for variable 'GDP_Trend'",
//!   "recoverable": false,
//!   "remediation": "Check the label spelling against the variable's declared domain."
//! }
//! ```

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias for strategic allocation operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while assembling variables, nodes and arcs.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConstructionError {
    #[error("variable '{name}' is already registered")]
    DuplicateName { name: String },

    #[error("node '{name}' is already part of the diagram")]
    DuplicateNode { name: String },

    #[error("invalid domain for variable '{name}': {reason}")]
    InvalidDomain { name: String, reason: String },

    #[error("unknown node '{name}'")]
    UnknownNode { name: String },

    #[error("arc {parent} -> {child} would create a cycle")]
    Cycle { parent: String, child: String },

    #[error("arc {parent} -> {child} is not allowed: {reason}")]
    InvalidTopology {
        parent: String,
        child: String,
        reason: String,
    },
}

/// Errors raised by table operations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TableError {
    #[error("shape mismatch for table '{table}': expected {expected} values, got {actual}")]
    ShapeMismatch {
        table: String,
        expected: usize,
        actual: usize,
    },

    #[error("variable '{variable}' is not a parent of table '{table}'")]
    UnknownVariable { table: String, variable: String },

    #[error("unknown label '{label}' for variable '{variable}'")]
    UnknownLabel { variable: String, label: String },

    #[error("incomplete assignment for table '{table}': missing {missing:?}")]
    IncompleteAssignment { table: String, missing: Vec<String> },

    #[error("index {index} out of range for variable '{variable}' with cardinality {cardinality}")]
    IndexOutOfRange {
        variable: String,
        index: usize,
        cardinality: usize,
    },

    #[error("node '{node}' does not carry a table of this kind")]
    NoTable { node: String },

    #[error("table '{table}' would exceed {limit} entries")]
    TooLarge { table: String, limit: usize },
}

/// Errors raised by evidence handling and inference.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum QueryError {
    #[error("engine is in state {actual}, expected {expected}")]
    State { expected: String, actual: String },

    #[error("model is incomplete ({} violation(s)): {}", .violations.len(), .violations.join("; "))]
    IncompleteModel { violations: Vec<String> },

    #[error("unknown variable '{name}'")]
    UnknownVariable { name: String },

    #[error("unknown label '{label}' for variable '{variable}'")]
    UnknownLabel { variable: String, label: String },

    #[error("'{name}' is not a chance node; evidence applies to chance nodes only")]
    NotAChanceNode { name: String },

    #[error("'{name}' is not a decision node")]
    NotADecisionNode { name: String },

    #[error("evidence has zero probability under the model")]
    ImpossibleEvidence,

    #[error("inference budget of {budget} assignments exceeded")]
    BudgetExceeded { budget: u64 },
}

/// Error categories for grouping related errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Model assembly errors.
    Construction,
    /// Table shape and lookup errors.
    Table,
    /// Evidence and inference errors.
    Query,
    /// Model definition and settings errors.
    Config,
    /// File I/O and serialization errors.
    Io,
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorCategory::Construction => write!(f, "construction"),
            ErrorCategory::Table => write!(f, "table"),
            ErrorCategory::Query => write!(f, "query"),
            ErrorCategory::Config => write!(f, "config"),
            ErrorCategory::Io => write!(f, "io"),
        }
    }
}

/// Unified error type.
#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Construction(#[from] ConstructionError),

    #[error(transparent)]
    Table(#[from] TableError),

    #[error(transparent)]
    Query(#[from] QueryError),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("invalid model definition: {0}")]
    InvalidDefinition(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML serialization error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl Error {
    /// Returns the error code for this error.
    ///
    /// Error codes are stable and grouped by category:
    /// - 10-19: Construction errors
    /// - 20-29: Table errors
    /// - 30-39: Query errors
    /// - 40-49: Configuration errors
    /// - 60-69: I/O errors
    pub fn code(&self) -> u32 {
        match self {
            Error::Construction(e) => match e {
                ConstructionError::DuplicateName { .. } => 10,
                ConstructionError::DuplicateNode { .. } => 11,
                ConstructionError::InvalidDomain { .. } => 12,
                ConstructionError::UnknownNode { .. } => 13,
                ConstructionError::Cycle { .. } => 14,
                ConstructionError::InvalidTopology { .. } => 15,
            },
            Error::Table(e) => match e {
                TableError::ShapeMismatch { .. } => 20,
                TableError::UnknownVariable { .. } => 21,
                TableError::UnknownLabel { .. } => 22,
                TableError::IncompleteAssignment { .. } => 23,
                TableError::IndexOutOfRange { .. } => 24,
                TableError::NoTable { .. } => 25,
                TableError::TooLarge { .. } => 26,
            },
            Error::Query(e) => match e {
                QueryError::State { .. } => 30,
                QueryError::IncompleteModel { .. } => 31,
                QueryError::UnknownVariable { .. } => 32,
                QueryError::UnknownLabel { .. } => 33,
                QueryError::NotAChanceNode { .. } => 34,
                QueryError::NotADecisionNode { .. } => 35,
                QueryError::ImpossibleEvidence => 36,
                QueryError::BudgetExceeded { .. } => 37,
            },
            Error::Config(_) => 40,
            Error::InvalidDefinition(_) => 41,
            Error::Io(_) => 60,
            Error::Json(_) => 61,
            Error::Yaml(_) => 62,
        }
    }

    /// Returns the error category for grouping and filtering.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::Construction(_) => ErrorCategory::Construction,
            Error::Table(_) => ErrorCategory::Table,
            Error::Query(_) => ErrorCategory::Query,
            Error::Config(_) | Error::InvalidDefinition(_) => ErrorCategory::Config,
            Error::Io(_) | Error::Json(_) | Error::Yaml(_) => ErrorCategory::Io,
        }
    }

    /// Returns whether the caller can retry after correcting its inputs.
    ///
    /// Construction and table errors point at a defective model definition and
    /// are never recoverable at runtime. Query errors leave the diagram intact.
    pub fn is_recoverable(&self) -> bool {
        match self {
            Error::Construction(_) | Error::Table(_) => false,
            Error::Query(QueryError::IncompleteModel { .. }) => false,
            Error::Query(_) => true,
            Error::Config(_) | Error::InvalidDefinition(_) => true,
            Error::Io(_) => true,
            Error::Json(_) | Error::Yaml(_) => true,
        }
    }

    /// Returns a human-readable remediation hint.
    pub fn remediation(&self) -> &'static str {
        match self {
            Error::Construction(ConstructionError::Cycle { .. }) => {
                "Remove one of the arcs on the cycle; influence diagrams must be acyclic."
            }
            Error::Construction(ConstructionError::InvalidTopology { .. }) => {
                "Utility nodes cannot be parents, and decision nodes only take informational arcs."
            }
            Error::Construction(_) => {
                "Fix the model definition: names must be unique and every arc must reference declared nodes."
            }
            Error::Table(TableError::UnknownLabel { .. }) => {
                "Check the label spelling against the variable's declared domain."
            }
            Error::Table(TableError::ShapeMismatch { .. }) => {
                "Provide one value per label of the node (or per parent combination for raw tables)."
            }
            Error::Table(TableError::TooLarge { .. }) => {
                "Reduce the number of parents or labels feeding the node."
            }
            Error::Table(_) => "Check the table call site against the node's declared parents.",
            Error::Query(QueryError::State { .. }) => {
                "Call infer() before reading posterior utilities."
            }
            Error::Query(QueryError::IncompleteModel { .. }) => {
                "Run 'sa-core validate' and populate the missing or unnormalized tables."
            }
            Error::Query(QueryError::ImpossibleEvidence) => {
                "The observed labels cannot co-occur under the model; revise the evidence."
            }
            Error::Query(QueryError::BudgetExceeded { .. }) => {
                "Raise max_assignments or switch to the variable_elimination strategy."
            }
            Error::Query(_) => "Check evidence names and labels with 'sa-core describe'.",
            Error::Config(_) | Error::InvalidDefinition(_) => {
                "Run 'sa-core validate --model <file>' to locate the problem."
            }
            Error::Io(_) => "Check that the file exists and is readable.",
            Error::Json(_) | Error::Yaml(_) => {
                "Check file syntax, or regenerate a template with 'sa-core export'."
            }
        }
    }

    /// Returns a short headline for human-readable output.
    pub fn headline(&self) -> &'static str {
        match self {
            Error::Construction(_) => "Model Construction Error",
            Error::Table(_) => "Table Error",
            Error::Query(_) => "Query Error",
            Error::Config(_) => "Configuration Error",
            Error::InvalidDefinition(_) => "Invalid Model Definition",
            Error::Io(_) => "I/O Error",
            Error::Json(_) => "JSON Error",
            Error::Yaml(_) => "YAML Error",
        }
    }

    /// Format for a human reader: headline, reason and fix.
    pub fn to_human(&self) -> String {
        format!(
            "✗ {}\n  Reason: {}\n  Fix: {}",
            self.headline(),
            self,
            self.remediation()
        )
    }

    /// Structured report for machine consumers.
    pub fn report(&self) -> ErrorReport {
        ErrorReport {
            code: self.code(),
            category: self.category(),
            message: self.to_string(),
            recoverable: self.is_recoverable(),
            remediation: self.remediation().to_string(),
        }
    }
}

/// Serializable view of an [`Error`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorReport {
    pub code: u32,
    pub category: ErrorCategory,
    pub message: String,
    pub recoverable: bool,
    pub remediation: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_follow_category_ranges() {
        let construction: Error = ConstructionError::Cycle {
            parent: "A".into(),
            child: "B".into(),
        }
        .into();
        assert_eq!(construction.code(), 14);
        assert_eq!(construction.category(), ErrorCategory::Construction);

        let table: Error = TableError::UnknownLabel {
            variable: "GDP_Trend".into(),
            label: "Sideways".into(),
        }
        .into();
        assert_eq!(table.code(), 22);
        assert_eq!(table.category(), ErrorCategory::Table);

        let query: Error = QueryError::ImpossibleEvidence.into();
        assert_eq!(query.code(), 36);
        assert_eq!(query.category(), ErrorCategory::Query);
    }

    #[test]
    fn query_errors_are_recoverable_construction_errors_are_not() {
        let query: Error = QueryError::State {
            expected: "inferred".into(),
            actual: "idle".into(),
        }
        .into();
        assert!(query.is_recoverable());

        let construction: Error = ConstructionError::DuplicateName { name: "X".into() }.into();
        assert!(!construction.is_recoverable());
    }

    #[test]
    fn messages_carry_context() {
        let err = TableError::ShapeMismatch {
            table: "Bond_Perf".into(),
            expected: 5,
            actual: 4,
        };
        let msg = err.to_string();
        assert!(msg.contains("Bond_Perf"));
        assert!(msg.contains("expected 5"));
        assert!(msg.contains("got 4"));
    }

    #[test]
    fn incomplete_model_lists_violations() {
        let err = QueryError::IncompleteModel {
            violations: vec!["a".into(), "b".into()],
        };
        assert_eq!(err.to_string(), "model is incomplete (2 violation(s)): a; b");
    }

    #[test]
    fn report_serializes() {
        let err: Error = QueryError::UnknownVariable {
            name: "Nope".into(),
        }
        .into();
        let json = serde_json::to_value(err.report()).unwrap();
        assert_eq!(json["code"], 32);
        assert_eq!(json["category"], "query");
        assert_eq!(json["recoverable"], true);
    }

    #[test]
    fn human_format_has_headline_and_fix() {
        let err: Error = QueryError::ImpossibleEvidence.into();
        let human = err.to_human();
        assert!(human.starts_with("✗ Query Error"));
        assert!(human.contains("Fix:"));
    }
}

//! Strategic allocation common types and errors.
//!
//! This crate provides foundational types shared across the workspace:
//! - The construction / table / query error taxonomy
//! - A unified error with stable codes for machine parsing
//! - Node kinds shared by the model definition and the diagram
//! - Output format specifications

pub mod error;
pub mod kind;
pub mod output;

pub use error::{
    ConstructionError, Error, ErrorCategory, ErrorReport, QueryError, Result, TableError,
};
pub use kind::NodeKind;
pub use output::OutputFormat;

/// Schema version for serialized model definitions and query reports.
pub const SCHEMA_VERSION: &str = "1.0.0";

/// Upper bound on the flattened size of one conditional or utility table.
pub const MAX_TABLE_ENTRIES: usize = 1 << 24;

//! Model definition validation errors and semantic validation.
//!
//! These checks run on the raw definition before any diagram is built. Graph
//! structure (cycles, arc topology) and table contents (row sums) are checked
//! by the diagram itself.

use std::collections::HashSet;

use thiserror::Error;

use crate::definition::{ModelDefinition, VariableKind};
use sa_common::{NodeKind, MAX_TABLE_ENTRIES};

/// Validation result type.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Model definition validation errors.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("Semantic validation failed: {0}")]
    SemanticError(String),

    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },

    #[error("Duplicate {what}: {name}")]
    Duplicate { what: &'static str, name: String },

    #[error("Unknown reference in {field}: {name}")]
    UnknownReference { field: String, name: String },

    #[error("Version mismatch: expected {expected}, got {actual}")]
    VersionMismatch { expected: String, actual: String },
}

impl ValidationError {
    /// Error code for structured error reporting.
    pub fn code(&self) -> u32 {
        match self {
            ValidationError::SemanticError(_) => 63,
            ValidationError::MissingField(_) => 64,
            ValidationError::InvalidValue { .. } => 65,
            ValidationError::VersionMismatch { .. } => 66,
            ValidationError::Duplicate { .. } => 67,
            ValidationError::UnknownReference { .. } => 68,
        }
    }
}

impl From<ValidationError> for sa_common::Error {
    fn from(err: ValidationError) -> Self {
        sa_common::Error::InvalidDefinition(err.to_string())
    }
}

/// Validate a model definition semantically.
pub fn validate_definition(def: &ModelDefinition) -> ValidationResult<()> {
    if def.schema_version != crate::CONFIG_SCHEMA_VERSION {
        return Err(ValidationError::VersionMismatch {
            expected: crate::CONFIG_SCHEMA_VERSION.to_string(),
            actual: def.schema_version.clone(),
        });
    }

    if def.name.trim().is_empty() {
        return Err(ValidationError::MissingField("name".to_string()));
    }

    validate_variables(def)?;
    validate_nodes(def)?;
    validate_arcs(def)?;
    validate_table_sizes(def)?;
    validate_tables(def)?;

    if let Some(settings) = &def.inference {
        if !(settings.tolerance > 0.0 && settings.tolerance <= 0.1) {
            return Err(ValidationError::InvalidValue {
                field: "inference.tolerance".to_string(),
                message: format!("Must be in (0, 0.1], got {}", settings.tolerance),
            });
        }
        if settings.max_assignments == Some(0) {
            return Err(ValidationError::InvalidValue {
                field: "inference.max_assignments".to_string(),
                message: "Must be positive".to_string(),
            });
        }
    }

    Ok(())
}

fn validate_variables(def: &ModelDefinition) -> ValidationResult<()> {
    let mut seen = HashSet::new();
    for var in &def.variables {
        if var.name.trim().is_empty() {
            return Err(ValidationError::MissingField("variables[].name".to_string()));
        }
        if !seen.insert(var.name.as_str()) {
            return Err(ValidationError::Duplicate {
                what: "variable",
                name: var.name.clone(),
            });
        }
        match var.kind {
            VariableKind::Labeled => {
                if var.labels.is_empty() {
                    return Err(ValidationError::InvalidValue {
                        field: format!("variables.{}.labels", var.name),
                        message: "Labeled variables need at least one label".to_string(),
                    });
                }
                let mut labels = HashSet::new();
                for label in &var.labels {
                    if !labels.insert(label.as_str()) {
                        return Err(ValidationError::Duplicate {
                            what: "label",
                            name: format!("{}.{}", var.name, label),
                        });
                    }
                }
            }
            VariableKind::Numeric => {
                if !var.labels.is_empty() {
                    return Err(ValidationError::InvalidValue {
                        field: format!("variables.{}.labels", var.name),
                        message: "Numeric variables take no labels".to_string(),
                    });
                }
            }
        }
    }
    Ok(())
}

fn validate_nodes(def: &ModelDefinition) -> ValidationResult<()> {
    let mut seen = HashSet::new();
    for node in &def.nodes {
        let var = def
            .variable(&node.variable)
            .ok_or_else(|| ValidationError::UnknownReference {
                field: "nodes[].variable".to_string(),
                name: node.variable.clone(),
            })?;
        if !seen.insert(node.variable.as_str()) {
            return Err(ValidationError::Duplicate {
                what: "node",
                name: node.variable.clone(),
            });
        }
        let numeric = var.kind == VariableKind::Numeric;
        if numeric != (node.kind == NodeKind::Utility) {
            return Err(ValidationError::SemanticError(format!(
                "node '{}' is a {} node over a {:?} variable; utility nodes and only utility nodes use numeric variables",
                node.variable, node.kind, var.kind
            )));
        }
    }
    Ok(())
}

fn validate_arcs(def: &ModelDefinition) -> ValidationResult<()> {
    let mut seen = HashSet::new();
    for arc in &def.arcs {
        for (field, name) in [("arcs[].parent", &arc.parent), ("arcs[].child", &arc.child)] {
            if def.node(name).is_none() {
                return Err(ValidationError::UnknownReference {
                    field: field.to_string(),
                    name: name.clone(),
                });
            }
        }
        if !seen.insert((arc.parent.as_str(), arc.child.as_str())) {
            return Err(ValidationError::Duplicate {
                what: "arc",
                name: format!("{} -> {}", arc.parent, arc.child),
            });
        }
    }
    Ok(())
}

/// Flattened size of each chance and utility table, bounded by
/// [`MAX_TABLE_ENTRIES`].
fn validate_table_sizes(def: &ModelDefinition) -> ValidationResult<()> {
    let width = |name: &str| {
        def.variable(name).map_or(1, |v| match v.kind {
            VariableKind::Labeled => v.labels.len(),
            VariableKind::Numeric => 1,
        })
    };
    for node in def.nodes.iter().filter(|n| n.kind != NodeKind::Decision) {
        let size = def
            .parents_of(&node.variable)
            .into_iter()
            .try_fold(width(node.variable.as_str()), |acc, parent| {
                acc.checked_mul(width(parent))
                    .filter(|&n| n <= MAX_TABLE_ENTRIES)
            });
        if size.is_none() {
            return Err(ValidationError::InvalidValue {
                field: format!("tables.{}", node.variable),
                message: format!("Table would exceed {} entries", MAX_TABLE_ENTRIES),
            });
        }
    }
    Ok(())
}

fn validate_tables(def: &ModelDefinition) -> ValidationResult<()> {
    let mut seen = HashSet::new();
    for table in &def.tables {
        let node = def
            .node(&table.node)
            .ok_or_else(|| ValidationError::UnknownReference {
                field: "tables[].node".to_string(),
                name: table.node.clone(),
            })?;
        if node.kind == NodeKind::Decision {
            return Err(ValidationError::SemanticError(format!(
                "decision node '{}' cannot carry a table",
                table.node
            )));
        }
        if !seen.insert(table.node.as_str()) {
            return Err(ValidationError::Duplicate {
                what: "table",
                name: table.node.clone(),
            });
        }
        if table.fill.is_some() && table.values.is_some() {
            return Err(ValidationError::SemanticError(format!(
                "table '{}' sets both fill and values",
                table.node
            )));
        }
        let all_values = table
            .fill
            .iter()
            .flatten()
            .chain(table.values.iter().flatten())
            .chain(table.slices.iter().flat_map(|s| s.values.iter()));
        for v in all_values {
            if !v.is_finite() {
                return Err(ValidationError::InvalidValue {
                    field: format!("tables.{}", table.node),
                    message: format!("Values must be finite, got {}", v),
                });
            }
            if node.kind == NodeKind::Chance && *v < 0.0 {
                return Err(ValidationError::InvalidValue {
                    field: format!("tables.{}", table.node),
                    message: format!("Probabilities must be non-negative, got {}", v),
                });
            }
        }
    }
    Ok(())
}

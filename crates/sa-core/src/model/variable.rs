//! Variable registry.
//!
//! Variables are created once, handed out as `Arc<Variable>` and never mutated
//! afterwards. Tables and nodes hold the same `Arc`, so a variable's identity is
//! its registry slot ([`VarId`]) and its name is unique within a registry.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;

use sa_common::{ConstructionError, TableError};

/// Dense handle of a variable inside its registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct VarId(pub(crate) usize);

impl VarId {
    /// Position in the registry.
    pub fn index(self) -> usize {
        self.0
    }
}

/// Domain of a variable.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Domain {
    /// Ordered, unique labels.
    Labels(Vec<String>),
    /// A single real value (the utility axis).
    Numeric,
}

/// An immutable discrete or numeric variable.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Variable {
    id: VarId,
    name: String,
    display_label: String,
    domain: Domain,
}

impl Variable {
    pub fn id(&self) -> VarId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn display_label(&self) -> &str {
        &self.display_label
    }

    pub fn domain(&self) -> &Domain {
        &self.domain
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self.domain, Domain::Numeric)
    }

    /// Labels in declaration order; empty for numeric variables.
    pub fn labels(&self) -> &[String] {
        match &self.domain {
            Domain::Labels(labels) => labels,
            Domain::Numeric => &[],
        }
    }

    /// Number of states. A numeric variable carries exactly one scalar.
    pub fn cardinality(&self) -> usize {
        match &self.domain {
            Domain::Labels(labels) => labels.len(),
            Domain::Numeric => 1,
        }
    }

    /// Position of `label` in the domain.
    pub fn label_to_index(&self, label: &str) -> Result<usize, TableError> {
        self.labels()
            .iter()
            .position(|l| l == label)
            .ok_or_else(|| TableError::UnknownLabel {
                variable: self.name.clone(),
                label: label.to_string(),
            })
    }

    /// Label at `index`.
    pub fn index_to_label(&self, index: usize) -> Result<&str, TableError> {
        self.labels()
            .get(index)
            .map(String::as_str)
            .ok_or_else(|| TableError::IndexOutOfRange {
                variable: self.name.clone(),
                index,
                cardinality: self.labels().len(),
            })
    }
}

/// Owner of all variables of a model.
#[derive(Debug, Clone, Default)]
pub struct VariableRegistry {
    variables: Vec<Arc<Variable>>,
    by_name: HashMap<String, VarId>,
}

impl VariableRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a labeled variable.
    ///
    /// Fails when the name is taken, the label list is empty, or a label repeats.
    pub fn create_variable<I, S>(
        &mut self,
        name: &str,
        display_label: &str,
        labels: I,
    ) -> Result<VarId, ConstructionError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.check_name(name)?;
        let labels: Vec<String> = labels.into_iter().map(Into::into).collect();
        if labels.is_empty() {
            return Err(ConstructionError::InvalidDomain {
                name: name.to_string(),
                reason: "domain must contain at least one label".to_string(),
            });
        }
        for (i, label) in labels.iter().enumerate() {
            if labels[..i].contains(label) {
                return Err(ConstructionError::InvalidDomain {
                    name: name.to_string(),
                    reason: format!("duplicate label '{}'", label),
                });
            }
        }
        Ok(self.insert(name, display_label, Domain::Labels(labels)))
    }

    /// Register the numeric axis of a utility node.
    pub fn create_numeric_variable(
        &mut self,
        name: &str,
        display_label: &str,
    ) -> Result<VarId, ConstructionError> {
        self.check_name(name)?;
        Ok(self.insert(name, display_label, Domain::Numeric))
    }

    fn check_name(&self, name: &str) -> Result<(), ConstructionError> {
        if name.trim().is_empty() {
            return Err(ConstructionError::InvalidDomain {
                name: name.to_string(),
                reason: "variable name must not be empty".to_string(),
            });
        }
        if self.by_name.contains_key(name) {
            return Err(ConstructionError::DuplicateName {
                name: name.to_string(),
            });
        }
        Ok(())
    }

    fn insert(&mut self, name: &str, display_label: &str, domain: Domain) -> VarId {
        let id = VarId(self.variables.len());
        let display_label = if display_label.is_empty() {
            name
        } else {
            display_label
        };
        self.variables.push(Arc::new(Variable {
            id,
            name: name.to_string(),
            display_label: display_label.to_string(),
            domain,
        }));
        self.by_name.insert(name.to_string(), id);
        id
    }

    pub fn get(&self, id: VarId) -> Option<&Arc<Variable>> {
        self.variables.get(id.0)
    }

    pub fn by_name(&self, name: &str) -> Option<&Arc<Variable>> {
        self.by_name.get(name).map(|id| &self.variables[id.0])
    }

    pub fn id_of(&self, name: &str) -> Option<VarId> {
        self.by_name.get(name).copied()
    }

    pub fn len(&self) -> usize {
        self.variables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.variables.is_empty()
    }

    /// Variables in creation order.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<Variable>> {
        self.variables.iter()
    }
}

impl std::ops::Index<VarId> for VariableRegistry {
    type Output = Variable;

    fn index(&self, id: VarId) -> &Variable {
        &self.variables[id.0]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_and_lookup() {
        let mut reg = VariableRegistry::new();
        let id = reg
            .create_variable("GDP_Trend", "GDP Trend", ["Recession", "Stagnant", "Moderate", "Strong"])
            .unwrap();
        let var = &reg[id];
        assert_eq!(var.name(), "GDP_Trend");
        assert_eq!(var.display_label(), "GDP Trend");
        assert_eq!(var.cardinality(), 4);
        assert_eq!(var.label_to_index("Moderate").unwrap(), 2);
        assert_eq!(var.index_to_label(3).unwrap(), "Strong");
        assert_eq!(reg.id_of("GDP_Trend"), Some(id));
        assert!(reg.by_name("Nope").is_none());
    }

    #[test]
    fn duplicate_name_rejected() {
        let mut reg = VariableRegistry::new();
        reg.create_variable("A", "", ["x"]).unwrap();
        let err = reg.create_variable("A", "", ["y"]).unwrap_err();
        assert_eq!(err, ConstructionError::DuplicateName { name: "A".into() });
        let err = reg.create_numeric_variable("A", "").unwrap_err();
        assert!(matches!(err, ConstructionError::DuplicateName { .. }));
    }

    #[test]
    fn invalid_domains_rejected() {
        let mut reg = VariableRegistry::new();
        let empty: [&str; 0] = [];
        assert!(matches!(
            reg.create_variable("A", "", empty),
            Err(ConstructionError::InvalidDomain { .. })
        ));
        assert!(matches!(
            reg.create_variable("B", "", ["x", "y", "x"]),
            Err(ConstructionError::InvalidDomain { .. })
        ));
        assert!(reg.is_empty());
    }

    #[test]
    fn label_errors() {
        let mut reg = VariableRegistry::new();
        let id = reg.create_variable("Risk_Tol", "", ["Conservative", "Moderate"]).unwrap();
        assert!(matches!(
            reg[id].label_to_index("Reckless"),
            Err(TableError::UnknownLabel { .. })
        ));
        assert_eq!(
            reg[id].index_to_label(2),
            Err(TableError::IndexOutOfRange {
                variable: "Risk_Tol".into(),
                index: 2,
                cardinality: 2,
            })
        );
    }

    #[test]
    fn numeric_variable_has_one_slot_and_no_labels() {
        let mut reg = VariableRegistry::new();
        let id = reg.create_numeric_variable("Utility", "Investor Utility").unwrap();
        assert!(reg[id].is_numeric());
        assert_eq!(reg[id].cardinality(), 1);
        assert!(reg[id].labels().is_empty());
        assert!(reg[id].label_to_index("anything").is_err());
    }

    #[test]
    fn display_label_defaults_to_name() {
        let mut reg = VariableRegistry::new();
        let id = reg.create_variable("Market_Vol", "", ["Low"]).unwrap();
        assert_eq!(reg[id].display_label(), "Market_Vol");
    }
}

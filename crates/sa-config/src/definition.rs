//! Serializable influence-diagram definition.
//!
//! A definition is the exchange format between the engine and its external
//! collaborators: a renderer reads nodes and arcs, a model author writes
//! variables and tables. Tables are described the same way they are built,
//! either as raw flattened values or as a default `fill` followed by ordered
//! `slices` keyed by partial parent assignments.
//!
//! Flattened values follow the engine's index convention: parents in arc
//! declaration order, row-major with the last parent varying fastest, and the
//! node's own labels innermost.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::settings::EngineSettings;
use sa_common::NodeKind;

/// Complete model definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelDefinition {
    pub schema_version: String,

    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    pub variables: Vec<VariableDefinition>,

    pub nodes: Vec<NodeDefinition>,

    #[serde(default)]
    pub arcs: Vec<ArcDefinition>,

    #[serde(default)]
    pub tables: Vec<TableDefinition>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inference: Option<EngineSettings>,
}

impl ModelDefinition {
    /// Look up a variable definition by name.
    pub fn variable(&self, name: &str) -> Option<&VariableDefinition> {
        self.variables.iter().find(|v| v.name == name)
    }

    /// Look up the node wrapping the named variable.
    pub fn node(&self, name: &str) -> Option<&NodeDefinition> {
        self.nodes.iter().find(|n| n.variable == name)
    }

    /// Parents of `child` in arc declaration order.
    pub fn parents_of(&self, child: &str) -> Vec<&str> {
        self.arcs
            .iter()
            .filter(|a| a.child == child)
            .map(|a| a.parent.as_str())
            .collect()
    }
}

/// Whether a variable ranges over labels or is the numeric utility axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VariableKind {
    #[default]
    Labeled,
    Numeric,
}

/// A variable and its ordered domain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariableDefinition {
    pub name: String,

    #[serde(default)]
    pub display_label: String,

    #[serde(default)]
    pub kind: VariableKind,

    /// Ordered labels. Empty for numeric variables.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub labels: Vec<String>,
}

/// A node wrapping one variable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeDefinition {
    pub variable: String,
    pub kind: NodeKind,
}

/// A directed arc.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArcDefinition {
    pub parent: String,
    pub child: String,
}

/// Table contents for a chance or utility node.
///
/// Application order: `values` (or `fill`), then each slice in order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableDefinition {
    pub node: String,

    /// Distribution (or single scalar) replicated over every parent combination.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fill: Option<Vec<f64>>,

    /// Raw flattened table.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub values: Option<Vec<f64>>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub slices: Vec<SliceDefinition>,
}

/// One `set_slice` call: a (possibly partial) parent assignment and the
/// distribution, or single utility value, to write there.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SliceDefinition {
    pub assignment: BTreeMap<String, String>,
    pub values: Vec<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"{
        "schema_version": "1.0.0",
        "name": "coin",
        "variables": [
            {"name": "Coin", "display_label": "Coin", "labels": ["Heads", "Tails"]},
            {"name": "Bet", "labels": ["Heads", "Tails"]},
            {"name": "Payoff", "kind": "numeric"}
        ],
        "nodes": [
            {"variable": "Coin", "kind": "chance"},
            {"variable": "Bet", "kind": "decision"},
            {"variable": "Payoff", "kind": "utility"}
        ],
        "arcs": [
            {"parent": "Coin", "child": "Payoff"},
            {"parent": "Bet", "child": "Payoff"}
        ],
        "tables": [
            {"node": "Coin", "fill": [0.5, 0.5]},
            {"node": "Payoff", "fill": [0.0], "slices": [
                {"assignment": {"Coin": "Heads", "Bet": "Heads"}, "values": [1.0]}
            ]}
        ]
    }"#;

    #[test]
    fn parses_minimal_definition() {
        let def: ModelDefinition = serde_json::from_str(MINIMAL).unwrap();
        assert_eq!(def.name, "coin");
        assert_eq!(def.variables.len(), 3);
        assert_eq!(def.variable("Payoff").unwrap().kind, VariableKind::Numeric);
        assert_eq!(def.variable("Bet").unwrap().display_label, "");
        assert_eq!(def.node("Bet").unwrap().kind, NodeKind::Decision);
        assert_eq!(def.parents_of("Payoff"), vec!["Coin", "Bet"]);
        assert!(def.inference.is_none());
    }

    #[test]
    fn serialization_round_trips_through_yaml() {
        let def: ModelDefinition = serde_json::from_str(MINIMAL).unwrap();
        let yaml = serde_yaml::to_string(&def).unwrap();
        let back: ModelDefinition = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(def, back);
    }

    #[test]
    fn skips_empty_optional_fields() {
        let def: ModelDefinition = serde_json::from_str(MINIMAL).unwrap();
        let json = serde_json::to_value(&def).unwrap();
        assert!(json.get("description").is_none());
        assert!(json["variables"][2].get("labels").is_none());
        assert!(json["tables"][0].get("slices").is_none());
    }
}

//! Influence diagram: nodes, arcs and their tables.
//!
//! The diagram owns its [`VariableRegistry`]. Nodes wrap registered
//! variables; the node id is the variable name. Arcs are kept in declaration
//! order because that order fixes the parent order, and therefore the index
//! layout, of every table allocated afterwards.
//!
//! Structural rules are enforced eagerly by [`InfluenceDiagram::add_arc`]:
//! - the arc set stays acyclic;
//! - utility nodes never become parents;
//! - an arc is declared at most once.
//!
//! Table contents are only checked by [`InfluenceDiagram::validate`], so
//! tables can be filled and overwritten incrementally.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde::Serialize;

use sa_common::{ConstructionError, Error, NodeKind, Result, TableError};
use sa_math::DEFAULT_EPSILON;

use super::table::Table;
use super::variable::{VarId, Variable, VariableRegistry};

/// A variable placed in the diagram with a role.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    variable: Arc<Variable>,
    kind: NodeKind,
}

impl Node {
    pub fn variable(&self) -> &Arc<Variable> {
        &self.variable
    }

    pub fn id(&self) -> VarId {
        self.variable.id()
    }

    pub fn name(&self) -> &str {
        self.variable.name()
    }

    pub fn kind(&self) -> NodeKind {
        self.kind
    }
}

/// A broken invariant found by [`InfluenceDiagram::validate`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "violation", rename_all = "snake_case")]
pub enum Violation {
    /// The arc set contains a cycle through these nodes.
    Cycle { nodes: Vec<String> },
    /// A chance or utility node has no table.
    MissingTable { node: String },
    /// A table was allocated before the node's parent list changed.
    StaleTable {
        node: String,
        expected: Vec<String>,
        actual: Vec<String>,
    },
    /// A decision node carries a table.
    DecisionTable { node: String },
    /// Rows of a chance table that do not sum to one.
    UnnormalizedRows {
        node: String,
        count: usize,
        first: Vec<String>,
        sum: f64,
    },
    /// Values in a table that are NaN, infinite or negative probabilities.
    InvalidEntries { node: String, count: usize },
}

impl Violation {
    /// Node the violation is about; `None` for graph-wide problems.
    pub fn node(&self) -> Option<&str> {
        match self {
            Violation::Cycle { .. } => None,
            Violation::MissingTable { node }
            | Violation::StaleTable { node, .. }
            | Violation::DecisionTable { node }
            | Violation::UnnormalizedRows { node, .. }
            | Violation::InvalidEntries { node, .. } => Some(node.as_str()),
        }
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Violation::Cycle { nodes } => write!(f, "cycle through {}", nodes.join(" -> ")),
            Violation::MissingTable { node } => write!(f, "node '{}' has no table", node),
            Violation::StaleTable {
                node,
                expected,
                actual,
            } => write!(
                f,
                "table of '{}' is indexed by [{}] but the node's parents are [{}]",
                node,
                actual.join(", "),
                expected.join(", ")
            ),
            Violation::DecisionTable { node } => {
                write!(f, "decision node '{}' must not carry a table", node)
            }
            Violation::UnnormalizedRows {
                node,
                count,
                first,
                sum,
            } => write!(
                f,
                "{} row(s) of '{}' do not sum to 1; first at [{}] sums to {}",
                count,
                node,
                first.join(", "),
                sum
            ),
            Violation::InvalidEntries { node, count } => {
                write!(f, "table of '{}' has {} invalid value(s)", node, count)
            }
        }
    }
}

/// Complete influence diagram.
#[derive(Debug, Clone)]
pub struct InfluenceDiagram {
    name: String,
    registry: VariableRegistry,
    nodes: Vec<Node>,
    positions: HashMap<VarId, usize>,
    arcs: Vec<(VarId, VarId)>,
    tables: HashMap<VarId, Table>,
}

impl InfluenceDiagram {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            registry: VariableRegistry::new(),
            nodes: Vec::new(),
            positions: HashMap::new(),
            arcs: Vec::new(),
            tables: HashMap::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn registry(&self) -> &VariableRegistry {
        &self.registry
    }

    /// Registry access for creating variables before wrapping them in nodes.
    pub fn registry_mut(&mut self) -> &mut VariableRegistry {
        &mut self.registry
    }

    /// Register a labeled variable and add it as a chance node.
    pub fn add_chance<I, S>(&mut self, name: &str, display_label: &str, labels: I) -> Result<VarId>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let id = self.registry.create_variable(name, display_label, labels)?;
        self.add_node(name, NodeKind::Chance)?;
        Ok(id)
    }

    /// Register a labeled variable and add it as a decision node.
    pub fn add_decision<I, S>(&mut self, name: &str, display_label: &str, labels: I) -> Result<VarId>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let id = self.registry.create_variable(name, display_label, labels)?;
        self.add_node(name, NodeKind::Decision)?;
        Ok(id)
    }

    /// Register a numeric variable and add it as a utility node.
    pub fn add_utility(&mut self, name: &str, display_label: &str) -> Result<VarId> {
        let id = self.registry.create_numeric_variable(name, display_label)?;
        self.add_node(name, NodeKind::Utility)?;
        Ok(id)
    }

    /// Wrap a registered variable in a node.
    ///
    /// Utility nodes take numeric variables, chance and decision nodes take
    /// labeled ones.
    pub fn add_node(&mut self, name: &str, kind: NodeKind) -> std::result::Result<VarId, ConstructionError> {
        let variable = self
            .registry
            .by_name(name)
            .cloned()
            .ok_or_else(|| ConstructionError::UnknownNode {
                name: name.to_string(),
            })?;
        if self.positions.contains_key(&variable.id()) {
            return Err(ConstructionError::DuplicateNode {
                name: name.to_string(),
            });
        }
        if variable.is_numeric() != (kind == NodeKind::Utility) {
            return Err(ConstructionError::InvalidDomain {
                name: name.to_string(),
                reason: format!(
                    "a {} node needs a {} variable",
                    kind,
                    if kind == NodeKind::Utility { "numeric" } else { "labeled" }
                ),
            });
        }
        let id = variable.id();
        self.positions.insert(id, self.nodes.len());
        self.nodes.push(Node { variable, kind });
        tracing::trace!(node = name, kind = %kind, "node added");
        Ok(id)
    }

    /// Declare `parent -> child`.
    ///
    /// Arcs into decision nodes are informational: they never resize a
    /// table. Arcs must be declared before the child's table is allocated.
    pub fn add_arc(&mut self, parent: &str, child: &str) -> std::result::Result<(), ConstructionError> {
        let parent_node = self.node_or_err(parent)?;
        let child_node = self.node_or_err(child)?;
        let (p, c) = (parent_node.id(), child_node.id());

        if parent_node.kind == NodeKind::Utility {
            return Err(ConstructionError::InvalidTopology {
                parent: parent.to_string(),
                child: child.to_string(),
                reason: "utility nodes cannot be parents".to_string(),
            });
        }
        if p == c || self.reaches(c, p) {
            return Err(ConstructionError::Cycle {
                parent: parent.to_string(),
                child: child.to_string(),
            });
        }
        if self.arcs.contains(&(p, c)) {
            return Err(ConstructionError::InvalidTopology {
                parent: parent.to_string(),
                child: child.to_string(),
                reason: "arc already declared".to_string(),
            });
        }
        self.arcs.push((p, c));
        Ok(())
    }

    /// Whether `to` is reachable from `from` along declared arcs.
    fn reaches(&self, from: VarId, to: VarId) -> bool {
        let mut stack = vec![from];
        let mut seen = vec![false; self.registry.len()];
        while let Some(current) = stack.pop() {
            if current == to {
                return true;
            }
            if std::mem::replace(&mut seen[current.index()], true) {
                continue;
            }
            stack.extend(
                self.arcs
                    .iter()
                    .filter(|(from, _)| *from == current)
                    .map(|(_, child)| *child),
            );
        }
        false
    }

    fn node_or_err(&self, name: &str) -> std::result::Result<&Node, ConstructionError> {
        self.node(name).ok_or_else(|| ConstructionError::UnknownNode {
            name: name.to_string(),
        })
    }

    /// Nodes in insertion order.
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn node(&self, name: &str) -> Option<&Node> {
        let id = self.registry.id_of(name)?;
        self.node_by_id(id)
    }

    pub fn node_by_id(&self, id: VarId) -> Option<&Node> {
        self.positions.get(&id).map(|&pos| &self.nodes[pos])
    }

    /// Nodes of one kind, in insertion order.
    pub fn nodes_of_kind(&self, kind: NodeKind) -> impl Iterator<Item = &Node> {
        self.nodes.iter().filter(move |n| n.kind == kind)
    }

    /// Arcs as `(parent, child)` in declaration order.
    pub fn arcs(&self) -> &[(VarId, VarId)] {
        &self.arcs
    }

    /// Parents of a node in arc declaration order.
    pub fn parents(&self, id: VarId) -> Vec<VarId> {
        self.arcs
            .iter()
            .filter(|(_, child)| *child == id)
            .map(|(parent, _)| *parent)
            .collect()
    }

    pub fn children(&self, id: VarId) -> Vec<VarId> {
        self.arcs
            .iter()
            .filter(|(parent, _)| *parent == id)
            .map(|(_, child)| *child)
            .collect()
    }

    /// Kahn's algorithm; among ready nodes the earliest inserted goes first.
    ///
    /// Nodes on a cycle are omitted, which [`InfluenceDiagram::validate`]
    /// reports.
    pub fn topological_order(&self) -> Vec<VarId> {
        let mut in_degree: Vec<usize> = self
            .nodes
            .iter()
            .map(|n| self.arcs.iter().filter(|(_, c)| *c == n.id()).count())
            .collect();
        let mut placed = vec![false; self.nodes.len()];
        let mut order = Vec::with_capacity(self.nodes.len());

        while let Some(pos) = (0..self.nodes.len()).find(|&i| !placed[i] && in_degree[i] == 0) {
            placed[pos] = true;
            let id = self.nodes[pos].id();
            order.push(id);
            for child in self.children(id) {
                if let Some(&child_pos) = self.positions.get(&child) {
                    in_degree[child_pos] -= 1;
                }
            }
        }
        order
    }

    /// Node names in topological order.
    pub fn topological_names(&self) -> Vec<&str> {
        self.topological_order()
            .into_iter()
            .map(|id| self.registry[id].name())
            .collect()
    }

    /// Allocate a zero-filled table over the node's current parents.
    ///
    /// Any previous table of the node is replaced.
    pub fn allocate_table(&mut self, name: &str) -> Result<&mut Table> {
        let node = self.node_or_err(name)?;
        if node.kind == NodeKind::Decision {
            return Err(TableError::NoTable {
                node: name.to_string(),
            }
            .into());
        }
        let id = node.id();
        let variable = node.variable.clone();
        let parents = self
            .parents(id)
            .into_iter()
            .filter_map(|p| self.registry.get(p).cloned())
            .collect();
        let table = Table::allocate(variable, parents)?;
        tracing::trace!(node = name, size = table.len(), "table allocated");
        self.tables.insert(id, table);
        self.tables
            .get_mut(&id)
            .ok_or_else(|| Error::Table(TableError::NoTable { node: name.to_string() }))
    }

    /// Allocate tables for every chance and utility node that has none.
    pub fn allocate_tables(&mut self) -> Result<()> {
        let pending: Vec<String> = self
            .nodes
            .iter()
            .filter(|n| n.kind.has_table() && !self.tables.contains_key(&n.id()))
            .map(|n| n.name().to_string())
            .collect();
        for name in pending {
            self.allocate_table(&name)?;
        }
        Ok(())
    }

    pub fn table(&self, name: &str) -> Option<&Table> {
        let id = self.registry.id_of(name)?;
        self.tables.get(&id)
    }

    pub fn table_by_id(&self, id: VarId) -> Option<&Table> {
        self.tables.get(&id)
    }

    pub fn table_mut(&mut self, name: &str) -> std::result::Result<&mut Table, TableError> {
        self.registry
            .id_of(name)
            .and_then(|id| self.tables.get_mut(&id))
            .ok_or_else(|| TableError::NoTable {
                node: name.to_string(),
            })
    }

    /// Check every structural and table invariant with the default epsilon.
    pub fn validate(&self) -> Vec<Violation> {
        self.validate_with(DEFAULT_EPSILON)
    }

    /// Check every structural and table invariant.
    ///
    /// Returns an empty list for a model that is ready for inference.
    pub fn validate_with(&self, epsilon: f64) -> Vec<Violation> {
        let mut violations = Vec::new();

        let order = self.topological_order();
        if order.len() < self.nodes.len() {
            let nodes = self
                .nodes
                .iter()
                .filter(|n| !order.contains(&n.id()))
                .map(|n| n.name().to_string())
                .collect();
            violations.push(Violation::Cycle { nodes });
        }

        for node in &self.nodes {
            let name = node.name().to_string();
            let table = self.tables.get(&node.id());
            match (node.kind, table) {
                (NodeKind::Decision, Some(_)) => {
                    violations.push(Violation::DecisionTable { node: name });
                }
                (NodeKind::Decision, None) => {}
                (_, None) => violations.push(Violation::MissingTable { node: name }),
                (kind, Some(table)) => {
                    let expected: Vec<VarId> = self.parents(node.id());
                    let actual: Vec<VarId> = table.parents().iter().map(|p| p.id()).collect();
                    if expected != actual {
                        violations.push(Violation::StaleTable {
                            node: name,
                            expected: self.names(&expected),
                            actual: self.names(&actual),
                        });
                        continue;
                    }
                    let invalid = table
                        .values()
                        .iter()
                        .filter(|v| !v.is_finite() || (kind == NodeKind::Chance && **v < 0.0))
                        .count();
                    if invalid > 0 {
                        violations.push(Violation::InvalidEntries {
                            node: name,
                            count: invalid,
                        });
                        continue;
                    }
                    let defects = table.unnormalized_rows(epsilon);
                    if let Some(first) = defects.first() {
                        violations.push(Violation::UnnormalizedRows {
                            node: name,
                            count: defects.len(),
                            first: first.labels.clone(),
                            sum: first.sum,
                        });
                    }
                }
            }
        }
        violations
    }

    fn names(&self, ids: &[VarId]) -> Vec<String> {
        ids.iter().map(|&id| self.registry[id].name().to_string()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn umbrella() -> InfluenceDiagram {
        let mut d = InfluenceDiagram::new("umbrella");
        d.add_chance("Weather", "", ["Dry", "Wet"]).unwrap();
        d.add_chance("Forecast", "", ["Sunny", "Rainy"]).unwrap();
        d.add_decision("Umbrella", "", ["Take", "Leave"]).unwrap();
        d.add_utility("Comfort", "").unwrap();
        d.add_arc("Weather", "Forecast").unwrap();
        d.add_arc("Forecast", "Umbrella").unwrap();
        d.add_arc("Weather", "Comfort").unwrap();
        d.add_arc("Umbrella", "Comfort").unwrap();
        d
    }

    fn populate(d: &mut InfluenceDiagram) {
        d.allocate_tables().unwrap();
        d.table_mut("Weather").unwrap().fill_uniform(&[0.7, 0.3]).unwrap();
        let forecast = d.table_mut("Forecast").unwrap();
        forecast.set_slice([("Weather", "Dry")], &[0.8, 0.2]).unwrap();
        forecast.set_slice([("Weather", "Wet")], &[0.1, 0.9]).unwrap();
        d.table_mut("Comfort")
            .unwrap()
            .set_values(vec![20.0, 100.0, 70.0, 0.0])
            .unwrap();
    }

    #[test]
    fn duplicate_node_rejected() {
        let mut d = umbrella();
        assert_eq!(
            d.add_node("Weather", NodeKind::Chance),
            Err(ConstructionError::DuplicateNode {
                name: "Weather".into()
            })
        );
        assert!(matches!(
            d.add_chance("Weather", "", ["x"]),
            Err(Error::Construction(ConstructionError::DuplicateName { .. }))
        ));
    }

    #[test]
    fn node_kind_must_match_domain() {
        let mut d = InfluenceDiagram::new("t");
        d.registry_mut().create_numeric_variable("U", "").unwrap();
        assert!(matches!(
            d.add_node("U", NodeKind::Chance),
            Err(ConstructionError::InvalidDomain { .. })
        ));
        assert!(matches!(
            d.add_node("Ghost", NodeKind::Chance),
            Err(ConstructionError::UnknownNode { .. })
        ));
    }

    #[test]
    fn arc_errors() {
        let mut d = umbrella();
        assert!(matches!(
            d.add_arc("Ghost", "Weather"),
            Err(ConstructionError::UnknownNode { .. })
        ));
        assert!(matches!(
            d.add_arc("Comfort", "Weather"),
            Err(ConstructionError::InvalidTopology { .. })
        ));
        assert!(matches!(
            d.add_arc("Umbrella", "Weather"),
            Err(ConstructionError::Cycle { .. })
        ));
        assert!(matches!(
            d.add_arc("Weather", "Weather"),
            Err(ConstructionError::Cycle { .. })
        ));
        assert!(matches!(
            d.add_arc("Weather", "Forecast"),
            Err(ConstructionError::InvalidTopology { .. })
        ));
        assert_eq!(d.arcs().len(), 4);
    }

    #[test]
    fn topological_order_respects_arcs_and_insertion() {
        let mut d = umbrella();
        d.add_chance("Mood", "", ["Good", "Bad"]).unwrap();
        let names = d.topological_names();
        assert_eq!(names, vec!["Weather", "Forecast", "Umbrella", "Comfort", "Mood"]);
    }

    #[test]
    fn parents_follow_declaration_order() {
        let d = umbrella();
        let comfort = d.registry().id_of("Comfort").unwrap();
        let names: Vec<&str> = d
            .parents(comfort)
            .into_iter()
            .map(|id| d.registry()[id].name())
            .collect();
        assert_eq!(names, vec!["Weather", "Umbrella"]);
    }

    #[test]
    fn decision_nodes_have_no_table() {
        let mut d = umbrella();
        assert!(matches!(
            d.allocate_table("Umbrella"),
            Err(Error::Table(TableError::NoTable { .. }))
        ));
        d.allocate_tables().unwrap();
        assert!(d.table("Umbrella").is_none());
        assert_eq!(d.table("Comfort").unwrap().len(), 4);
        assert_eq!(d.table("Forecast").unwrap().len(), 4);
    }

    #[test]
    fn oversized_table_fails_to_allocate() {
        let mut d = InfluenceDiagram::new("wide");
        let labels: Vec<String> = (0..100).map(|i| format!("l{i}")).collect();
        d.add_chance("X", "", ["x0", "x1"]).unwrap();
        for i in 0..10 {
            let name = format!("P{i}");
            d.add_chance(&name, "", labels.iter().cloned()).unwrap();
            d.add_arc(&name, "X").unwrap();
        }
        let err = d.allocate_table("X").unwrap_err();
        assert_eq!(err.code(), 26);
        assert!(d.table("X").is_none());
        assert!(matches!(
            d.allocate_tables(),
            Err(Error::Table(TableError::TooLarge { .. }))
        ));
    }

    #[test]
    fn validate_reports_missing_and_unnormalized() {
        let mut d = umbrella();
        let violations = d.validate();
        assert_eq!(violations.len(), 3);
        assert!(violations
            .iter()
            .all(|v| matches!(v, Violation::MissingTable { .. })));

        populate(&mut d);
        assert!(d.validate().is_empty());

        d.table_mut("Forecast")
            .unwrap()
            .set_slice([("Weather", "Wet")], &[0.5, 0.6])
            .unwrap();
        let violations = d.validate();
        assert_eq!(violations.len(), 1);
        match &violations[0] {
            Violation::UnnormalizedRows {
                node, count, first, ..
            } => {
                assert_eq!(node, "Forecast");
                assert_eq!(*count, 1);
                assert_eq!(first, &vec!["Wet".to_string()]);
            }
            other => panic!("unexpected violation {other:?}"),
        }
        assert!(violations[0].to_string().contains("Forecast"));
    }

    #[test]
    fn validate_reports_stale_table() {
        let mut d = umbrella();
        populate(&mut d);
        d.add_chance("Season", "", ["Summer", "Winter"]).unwrap();
        d.add_arc("Season", "Weather").unwrap();
        let violations = d.validate();
        assert!(violations
            .iter()
            .any(|v| matches!(v, Violation::StaleTable { node, .. } if node == "Weather")));
        assert!(violations
            .iter()
            .any(|v| matches!(v, Violation::MissingTable { node } if node == "Season")));
    }

    #[test]
    fn validate_reports_invalid_entries() {
        let mut d = umbrella();
        populate(&mut d);
        d.table_mut("Comfort")
            .unwrap()
            .set_values(vec![f64::NAN, 1.0, 2.0, 3.0])
            .unwrap();
        assert_eq!(
            d.validate(),
            vec![Violation::InvalidEntries {
                node: "Comfort".into(),
                count: 1
            }]
        );
    }

    #[test]
    fn violation_serializes_with_tag() {
        let v = Violation::MissingTable { node: "X".into() };
        let json = serde_json::to_value(&v).unwrap();
        assert_eq!(json["violation"], "missing_table");
        assert_eq!(json["node"], "X");
    }
}

//! Node kinds of an influence diagram.

use serde::{Deserialize, Serialize};

/// The role a node plays in an influence diagram.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    /// Random variable with a conditional probability table.
    Chance,
    /// Controllable choice; carries no table.
    Decision,
    /// Deterministic payoff of its parents; carries a scalar table.
    Utility,
}

impl NodeKind {
    /// Whether nodes of this kind own a table.
    pub fn has_table(self) -> bool {
        !matches!(self, NodeKind::Decision)
    }
}

impl std::fmt::Display for NodeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NodeKind::Chance => write!(f, "chance"),
            NodeKind::Decision => write!(f, "decision"),
            NodeKind::Utility => write!(f, "utility"),
        }
    }
}

//! Exact inference over an influence diagram.
//!
//! The engine evaluates one `(decision, label)` pair at a time through an
//! [`InferenceStrategy`]. The evaluated decision is clamped to the label,
//! chance evidence is clamped to its observed labels, and any other decision
//! node is marginalized with a uniform policy. A strategy returns the
//! normalized expected utility of every utility node and the posterior
//! marginal of every chance node.
//!
//! Two strategies ship with the crate and must agree to within 1e-9:
//! - [`Enumeration`]: depth-first walk over the product space in
//!   topological order, pruning zero-probability branches;
//! - [`VariableElimination`]: sum-product over table factors with a greedy
//!   min-size elimination order.

pub mod elimination;
pub mod engine;
pub mod enumeration;
pub mod factor;
pub mod result;

use std::collections::BTreeMap;

use sa_common::{NodeKind, QueryError};
use sa_config::StrategyKind;

use crate::model::{InfluenceDiagram, VarId};

pub use elimination::VariableElimination;
pub use engine::{EngineState, InferenceEngine};
pub use enumeration::Enumeration;
pub use factor::Factor;
pub use result::{DecisionPosterior, InferenceResult, Marginal, OptionPosterior, UtilityTerm};

/// Observed labels of chance variables, keyed by variable slot.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Evidence {
    observations: BTreeMap<VarId, usize>,
}

impl Evidence {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve `(variable, label)` pairs against a diagram.
    ///
    /// Every name must be a chance node and every label part of its domain.
    /// A name given twice keeps its last label.
    pub fn resolve<'a, I>(diagram: &InfluenceDiagram, observations: I) -> Result<Self, QueryError>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut evidence = Evidence::new();
        for (name, label) in observations {
            let node = diagram
                .node(name)
                .ok_or_else(|| QueryError::UnknownVariable {
                    name: name.to_string(),
                })?;
            if node.kind() != NodeKind::Chance {
                return Err(QueryError::NotAChanceNode {
                    name: name.to_string(),
                });
            }
            let index = node
                .variable()
                .label_to_index(label)
                .map_err(|_| QueryError::UnknownLabel {
                    variable: name.to_string(),
                    label: label.to_string(),
                })?;
            evidence.observations.insert(node.id(), index);
        }
        Ok(evidence)
    }

    pub fn observe(&mut self, variable: VarId, index: usize) {
        self.observations.insert(variable, index);
    }

    pub fn get(&self, variable: VarId) -> Option<usize> {
        self.observations.get(&variable).copied()
    }

    pub fn len(&self) -> usize {
        self.observations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observations.is_empty()
    }

    /// Observations in variable-slot order.
    pub fn iter(&self) -> impl Iterator<Item = (VarId, usize)> + '_ {
        self.observations.iter().map(|(&v, &i)| (v, i))
    }

    /// Observations as `(variable, label)` names.
    pub fn labels(&self, diagram: &InfluenceDiagram) -> Vec<(String, String)> {
        self.iter()
            .map(|(id, index)| {
                let var = &diagram.registry()[id];
                let label = var.index_to_label(index).unwrap_or_default();
                (var.name().to_string(), label.to_string())
            })
            .collect()
    }
}

/// Read-only view of a diagram with the orderings strategies need.
#[derive(Debug, Clone)]
pub struct ModelView<'d> {
    diagram: &'d InfluenceDiagram,
    order: Vec<VarId>,
    chance: Vec<VarId>,
    decisions: Vec<VarId>,
    utilities: Vec<VarId>,
}

impl<'d> ModelView<'d> {
    pub fn new(diagram: &'d InfluenceDiagram) -> Self {
        let order = diagram.topological_order();
        let of_kind = |kind: NodeKind| -> Vec<VarId> {
            order
                .iter()
                .copied()
                .filter(|id| diagram.node_by_id(*id).map(|n| n.kind()) == Some(kind))
                .collect()
        };
        let chance = of_kind(NodeKind::Chance);
        let utilities = of_kind(NodeKind::Utility);
        // Decisions keep insertion order so reports list them as declared.
        let decisions = diagram
            .nodes_of_kind(NodeKind::Decision)
            .map(|n| n.id())
            .collect();
        Self {
            diagram,
            order,
            chance,
            decisions,
            utilities,
        }
    }

    pub fn diagram(&self) -> &'d InfluenceDiagram {
        self.diagram
    }

    /// Every node in topological order.
    pub fn order(&self) -> &[VarId] {
        &self.order
    }

    /// Chance nodes in topological order.
    pub fn chance_nodes(&self) -> &[VarId] {
        &self.chance
    }

    /// Decision nodes in insertion order.
    pub fn decision_nodes(&self) -> &[VarId] {
        &self.decisions
    }

    /// Utility nodes in topological order.
    pub fn utility_nodes(&self) -> &[VarId] {
        &self.utilities
    }

    pub fn kind(&self, id: VarId) -> Option<NodeKind> {
        self.diagram.node_by_id(id).map(|n| n.kind())
    }

    pub fn cardinality(&self, id: VarId) -> usize {
        self.diagram.registry()[id].cardinality()
    }

    /// Number of variable slots; assignment vectors have this length.
    pub fn slots(&self) -> usize {
        self.diagram.registry().len()
    }
}

/// One decision label to evaluate under evidence.
#[derive(Debug, Clone, Copy)]
pub struct Query<'a> {
    pub evidence: &'a Evidence,
    pub decision: VarId,
    pub choice: usize,
}

impl Query<'_> {
    /// Fixed label of a variable under this query, if any.
    pub fn clamped(&self, id: VarId) -> Option<usize> {
        if id == self.decision {
            Some(self.choice)
        } else {
            self.evidence.get(id)
        }
    }
}

/// Normalized output of one strategy run.
#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
    /// Joint probability of the chance evidence (with the clamped decision).
    pub probability_of_evidence: f64,
    /// Expected utility summed over utility nodes.
    pub expected_utility: f64,
    /// Expected utility per utility node, in topological order.
    pub utilities: Vec<(VarId, f64)>,
    /// Posterior marginal per chance node, in topological order.
    pub marginals: Vec<(VarId, Vec<f64>)>,
}

/// Work limit for a single `infer()` call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Budget {
    limit: Option<u64>,
    used: u64,
}

impl Budget {
    pub fn new(limit: Option<u64>) -> Self {
        Self { limit, used: 0 }
    }

    pub fn unlimited() -> Self {
        Self::default()
    }

    /// Record `units` of work, failing once the limit is passed.
    pub fn charge(&mut self, units: u64) -> Result<(), QueryError> {
        self.used = self.used.saturating_add(units);
        match self.limit {
            Some(limit) if self.used > limit => Err(QueryError::BudgetExceeded { budget: limit }),
            _ => Ok(()),
        }
    }

    pub fn used(&self) -> u64 {
        self.used
    }

    pub fn limit(&self) -> Option<u64> {
        self.limit
    }
}

/// An exact inference algorithm.
///
/// Implementations are stateless and shareable between threads; all per-query
/// state lives in the arguments.
pub trait InferenceStrategy: Send + Sync {
    /// Stable name used in reports and logs.
    fn name(&self) -> &'static str;

    /// Evaluate one decision label under evidence.
    ///
    /// Fails with [`QueryError::ImpossibleEvidence`] when the evidence has
    /// zero probability and [`QueryError::BudgetExceeded`] when `budget` runs
    /// out.
    fn evaluate(
        &self,
        model: &ModelView<'_>,
        query: &Query<'_>,
        budget: &mut Budget,
    ) -> Result<Evaluation, QueryError>;
}

/// Strategy implementation for a configured kind.
pub fn strategy_for(kind: StrategyKind) -> Box<dyn InferenceStrategy> {
    match kind {
        StrategyKind::Enumeration => Box::new(Enumeration),
        StrategyKind::VariableElimination => Box::new(VariableElimination),
    }
}

//! Exact inference by enumeration.
//!
//! Walks every assignment of chance and decision nodes in topological order.
//! Each prefix carries its joint weight; a branch whose weight drops to zero is
//! pruned. At a leaf the weight is added to the normalizer, to the marginal of
//! every chance node and, scaled by the payoff, to every utility node.
//!
//! Every visited leaf costs one unit of budget.

use sa_common::{NodeKind, QueryError};
use sa_math::NeumaierSum;

use super::{Budget, Evaluation, InferenceStrategy, ModelView, Query};
use crate::model::{Table, VarId};

/// Depth-first enumeration strategy.
#[derive(Debug, Clone, Copy, Default)]
pub struct Enumeration;

/// How a variable enters the walk.
enum Step<'a> {
    /// Chance node drawn from its table, optionally clamped.
    Chance {
        id: VarId,
        table: &'a Table,
        clamp: Option<usize>,
    },
    /// Decision node fixed to the evaluated label.
    Fixed { id: VarId, index: usize },
    /// Decision node marginalized with a uniform policy.
    Uniform { id: VarId, cardinality: usize },
}

struct Walk<'a, 'b> {
    steps: Vec<Step<'a>>,
    utilities: Vec<(VarId, &'a Table)>,
    chance: &'a [VarId],
    assignment: Vec<usize>,
    normalizer: NeumaierSum,
    payoffs: Vec<NeumaierSum>,
    marginals: Vec<Vec<NeumaierSum>>,
    budget: &'b mut Budget,
}

impl Walk<'_, '_> {
    fn visit(&mut self, depth: usize, weight: f64) -> Result<(), QueryError> {
        if depth == self.steps.len() {
            return self.leaf(weight);
        }
        match self.steps[depth] {
            Step::Chance { id, table, clamp } => {
                let row = table.row_at(&self.assignment);
                match clamp {
                    Some(index) => {
                        let p = row[index];
                        if p > 0.0 {
                            self.assignment[id.index()] = index;
                            self.visit(depth + 1, weight * p)?;
                        }
                    }
                    None => {
                        for (index, &p) in row.iter().enumerate() {
                            if p > 0.0 {
                                self.assignment[id.index()] = index;
                                self.visit(depth + 1, weight * p)?;
                            }
                        }
                    }
                }
            }
            Step::Fixed { id, index } => {
                self.assignment[id.index()] = index;
                self.visit(depth + 1, weight)?;
            }
            Step::Uniform { id, cardinality } => {
                let p = 1.0 / cardinality as f64;
                for index in 0..cardinality {
                    self.assignment[id.index()] = index;
                    self.visit(depth + 1, weight * p)?;
                }
            }
        }
        Ok(())
    }

    fn leaf(&mut self, weight: f64) -> Result<(), QueryError> {
        self.budget.charge(1)?;
        self.normalizer.add(weight);
        for ((_, table), acc) in self.utilities.iter().zip(self.payoffs.iter_mut()) {
            acc.add(weight * table.row_at(&self.assignment)[0]);
        }
        for (id, marginal) in self.chance.iter().zip(self.marginals.iter_mut()) {
            marginal[self.assignment[id.index()]].add(weight);
        }
        Ok(())
    }
}

impl InferenceStrategy for Enumeration {
    fn name(&self) -> &'static str {
        "enumeration"
    }

    fn evaluate(
        &self,
        model: &ModelView<'_>,
        query: &Query<'_>,
        budget: &mut Budget,
    ) -> Result<Evaluation, QueryError> {
        let diagram = model.diagram();
        let missing = |id: VarId| QueryError::IncompleteModel {
            violations: vec![format!(
                "node '{}' has no table",
                diagram.registry()[id].name()
            )],
        };

        let mut steps = Vec::new();
        for &id in model.order() {
            match model.kind(id) {
                Some(NodeKind::Chance) => steps.push(Step::Chance {
                    id,
                    table: diagram.table_by_id(id).ok_or_else(|| missing(id))?,
                    clamp: query.clamped(id),
                }),
                Some(NodeKind::Decision) => match query.clamped(id) {
                    Some(index) => steps.push(Step::Fixed { id, index }),
                    None => steps.push(Step::Uniform {
                        id,
                        cardinality: model.cardinality(id),
                    }),
                },
                Some(NodeKind::Utility) | None => {}
            }
        }
        let utilities = model
            .utility_nodes()
            .iter()
            .map(|&id| diagram.table_by_id(id).map(|t| (id, t)).ok_or_else(|| missing(id)))
            .collect::<Result<Vec<_>, _>>()?;

        let chance = model.chance_nodes();
        let mut walk = Walk {
            steps,
            payoffs: vec![NeumaierSum::new(); utilities.len()],
            utilities,
            chance,
            assignment: vec![0; model.slots()],
            normalizer: NeumaierSum::new(),
            marginals: chance
                .iter()
                .map(|&id| vec![NeumaierSum::new(); model.cardinality(id)])
                .collect(),
            budget,
        };
        walk.visit(0, 1.0)?;

        let z = walk.normalizer.value();
        if z.is_nan() || z <= 0.0 {
            return Err(QueryError::ImpossibleEvidence);
        }

        let utilities: Vec<(VarId, f64)> = walk
            .utilities
            .iter()
            .zip(&walk.payoffs)
            .map(|((id, _), acc)| (*id, acc.value() / z))
            .collect();
        let mut total = NeumaierSum::new();
        total.extend(utilities.iter().map(|(_, u)| *u));

        let marginals = chance
            .iter()
            .zip(&walk.marginals)
            .map(|(&id, accs)| (id, accs.iter().map(|a| a.value() / z).collect()))
            .collect();

        Ok(Evaluation {
            probability_of_evidence: z,
            expected_utility: total.value(),
            utilities,
            marginals,
        })
    }
}

//! Exact inference by sum-product variable elimination.
//!
//! Each chance table becomes a factor restricted by the clamped variables.
//! Unclamped decisions contribute a uniform policy factor. The normalizer,
//! every utility numerator and every chance marginal are separate
//! eliminations over the same restricted factor set.
//!
//! The elimination order is greedy: the next variable is the one whose
//! combined factor is smallest, ties going to the lowest variable slot. Every
//! intermediate factor entry costs one unit of budget.

use std::collections::BTreeSet;

use sa_common::{NodeKind, QueryError};
use sa_math::{point_mass, NeumaierSum};

use super::factor::Factor;
use super::{Budget, Evaluation, InferenceStrategy, ModelView, Query};
use crate::model::VarId;

/// Sum-product variable elimination strategy.
#[derive(Debug, Clone, Copy, Default)]
pub struct VariableElimination;

impl VariableElimination {
    fn restricted_factors(
        model: &ModelView<'_>,
        query: &Query<'_>,
    ) -> Result<Vec<Factor>, QueryError> {
        let diagram = model.diagram();
        let mut factors = Vec::new();
        for &id in model.order() {
            match model.kind(id) {
                Some(NodeKind::Chance) => {
                    let table = diagram.table_by_id(id).ok_or_else(|| missing_table(model, id))?;
                    factors.push(restrict_all(Factor::from_table(table), query));
                }
                Some(NodeKind::Decision) if query.clamped(id).is_none() => {
                    factors.push(Factor::uniform(id, model.cardinality(id)));
                }
                _ => {}
            }
        }
        Ok(factors)
    }
}

fn missing_table(model: &ModelView<'_>, id: VarId) -> QueryError {
    QueryError::IncompleteModel {
        violations: vec![format!(
            "node '{}' has no table",
            model.diagram().registry()[id].name()
        )],
    }
}

fn restrict_all(mut factor: Factor, query: &Query<'_>) -> Factor {
    let clamped: Vec<(VarId, usize)> = factor
        .scope()
        .iter()
        .filter_map(|&v| query.clamped(v).map(|i| (v, i)))
        .collect();
    for (var, index) in clamped {
        factor = factor.restrict(var, index);
    }
    factor
}

/// Size of the factor produced by eliminating `var`.
fn elimination_cost(factors: &[Factor], var: VarId) -> usize {
    let mut scope: Vec<(VarId, usize)> = Vec::new();
    for factor in factors.iter().filter(|f| f.contains(var)) {
        for &v in factor.scope() {
            if !scope.iter().any(|(s, _)| *s == v) {
                scope.push((v, factor.cardinality(v).unwrap_or(1)));
            }
        }
    }
    scope.iter().map(|(_, c)| c).product()
}

/// Eliminate every variable except `keep` and multiply what remains.
fn eliminate(
    mut factors: Vec<Factor>,
    keep: Option<VarId>,
    budget: &mut Budget,
) -> Result<Factor, QueryError> {
    loop {
        let candidates: BTreeSet<VarId> = factors
            .iter()
            .flat_map(|f| f.scope().iter().copied())
            .filter(|v| Some(*v) != keep)
            .collect();
        let mut best: Option<(usize, VarId)> = None;
        for var in candidates {
            let cost = elimination_cost(&factors, var);
            if best.map_or(true, |(c, _)| cost < c) {
                best = Some((cost, var));
            }
        }
        let Some((_, var)) = best else {
            break;
        };

        let (touching, rest): (Vec<Factor>, Vec<Factor>) =
            factors.into_iter().partition(|f| f.contains(var));
        let mut combined = Factor::scalar(1.0);
        for factor in &touching {
            combined = combined.product(factor);
            budget.charge(combined.len() as u64)?;
        }
        factors = rest;
        factors.push(combined.sum_out(var));
    }

    let mut result = Factor::scalar(1.0);
    for factor in &factors {
        result = result.product(factor);
        budget.charge(result.len() as u64)?;
    }
    Ok(result)
}

impl InferenceStrategy for VariableElimination {
    fn name(&self) -> &'static str {
        "variable_elimination"
    }

    fn evaluate(
        &self,
        model: &ModelView<'_>,
        query: &Query<'_>,
        budget: &mut Budget,
    ) -> Result<Evaluation, QueryError> {
        let base = Self::restricted_factors(model, query)?;

        let z = eliminate(base.clone(), None, budget)?.total();
        if z.is_nan() || z <= 0.0 {
            return Err(QueryError::ImpossibleEvidence);
        }

        let diagram = model.diagram();
        let mut utilities = Vec::with_capacity(model.utility_nodes().len());
        for &id in model.utility_nodes() {
            let table = diagram.table_by_id(id).ok_or_else(|| missing_table(model, id))?;
            let mut factors = base.clone();
            factors.push(restrict_all(Factor::from_table(table), query));
            let numerator = eliminate(factors, None, budget)?.total();
            utilities.push((id, numerator / z));
        }
        let mut total = NeumaierSum::new();
        total.extend(utilities.iter().map(|(_, u)| *u));

        let mut marginals = Vec::with_capacity(model.chance_nodes().len());
        for &id in model.chance_nodes() {
            let distribution = match query.clamped(id) {
                Some(index) => point_mass(model.cardinality(id), index),
                None => {
                    let factor = eliminate(base.clone(), Some(id), budget)?;
                    factor
                        .as_distribution_over(id)
                        .map(|values| values.iter().map(|v| v / z).collect())
                        .unwrap_or_else(|| vec![0.0; model.cardinality(id)])
                }
            };
            marginals.push((id, distribution));
        }

        Ok(Evaluation {
            probability_of_evidence: z,
            expected_utility: total.value(),
            utilities,
            marginals,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inference::{Enumeration, Evidence};
    use crate::model::InfluenceDiagram;

    /// Rain -> Traffic -> Late <- Leave_Early, Late -> Cost.
    fn commute() -> InfluenceDiagram {
        let mut d = InfluenceDiagram::new("commute");
        d.add_chance("Rain", "", ["No", "Yes"]).unwrap();
        d.add_chance("Traffic", "", ["Light", "Heavy"]).unwrap();
        d.add_decision("Leave_Early", "", ["Yes", "No"]).unwrap();
        d.add_chance("Late", "", ["No", "Yes"]).unwrap();
        d.add_utility("Cost", "").unwrap();
        d.add_arc("Rain", "Traffic").unwrap();
        d.add_arc("Traffic", "Late").unwrap();
        d.add_arc("Leave_Early", "Late").unwrap();
        d.add_arc("Late", "Cost").unwrap();
        d.add_arc("Leave_Early", "Cost").unwrap();
        d.allocate_tables().unwrap();
        d.table_mut("Rain").unwrap().fill_uniform(&[0.8, 0.2]).unwrap();
        let traffic = d.table_mut("Traffic").unwrap();
        traffic.set_slice([("Rain", "No")], &[0.7, 0.3]).unwrap();
        traffic.set_slice([("Rain", "Yes")], &[0.2, 0.8]).unwrap();
        d.table_mut("Late")
            .unwrap()
            .set_values(vec![0.99, 0.01, 0.9, 0.1, 0.9, 0.1, 0.4, 0.6])
            .unwrap();
        d.table_mut("Cost")
            .unwrap()
            .set_values(vec![-10.0, 0.0, -10.0, -50.0])
            .unwrap();
        d
    }

    fn both(d: &InfluenceDiagram, evidence: &Evidence, choice: usize) -> (Evaluation, Evaluation) {
        let view = ModelView::new(d);
        let query = Query {
            evidence,
            decision: d.registry().id_of("Leave_Early").unwrap(),
            choice,
        };
        let e = Enumeration
            .evaluate(&view, &query, &mut Budget::unlimited())
            .unwrap();
        let v = VariableElimination
            .evaluate(&view, &query, &mut Budget::unlimited())
            .unwrap();
        (e, v)
    }

    fn assert_agree(e: &Evaluation, v: &Evaluation) {
        assert!((e.expected_utility - v.expected_utility).abs() < 1e-9);
        assert!((e.probability_of_evidence - v.probability_of_evidence).abs() < 1e-12);
        assert_eq!(e.marginals.len(), v.marginals.len());
        for ((id_e, pe), (id_v, pv)) in e.marginals.iter().zip(&v.marginals) {
            assert_eq!(id_e, id_v);
            for (a, b) in pe.iter().zip(pv) {
                assert!((a - b).abs() < 1e-9);
            }
        }
    }

    #[test]
    fn agrees_with_enumeration() {
        let d = commute();
        let none = Evidence::new();
        for choice in 0..2 {
            let (e, v) = both(&d, &none, choice);
            assert_agree(&e, &v);
        }
        let rainy = Evidence::resolve(&d, [("Rain", "Yes")]).unwrap();
        let (e, v) = both(&d, &rainy, 1);
        assert_agree(&e, &v);
        let late = Evidence::resolve(&d, [("Late", "Yes")]).unwrap();
        let (e, v) = both(&d, &late, 1);
        assert_agree(&e, &v);
    }

    #[test]
    fn leaving_early_costs_ten() {
        let d = commute();
        let (_, v) = both(&d, &Evidence::new(), 0);
        assert!((v.expected_utility + 10.0).abs() < 1e-12);
    }

    #[test]
    fn observed_marginal_is_point_mass() {
        let d = commute();
        let rainy = Evidence::resolve(&d, [("Rain", "Yes")]).unwrap();
        let (_, v) = both(&d, &rainy, 1);
        let rain = d.registry().id_of("Rain").unwrap();
        let (_, dist) = v.marginals.iter().find(|(id, _)| *id == rain).unwrap();
        assert_eq!(dist, &vec![0.0, 1.0]);
    }

    #[test]
    fn budget_applies() {
        let d = commute();
        let view = ModelView::new(&d);
        let ev = Evidence::new();
        let query = Query {
            evidence: &ev,
            decision: d.registry().id_of("Leave_Early").unwrap(),
            choice: 0,
        };
        let mut budget = Budget::new(Some(3));
        assert_eq!(
            VariableElimination.evaluate(&view, &query, &mut budget),
            Err(QueryError::BudgetExceeded { budget: 3 })
        );
    }
}

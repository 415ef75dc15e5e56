//! Maximum-expected-utility selection.
//!
//! The best label is the first maximum in the decision variable's declared
//! domain order. Equal expected utilities never reorder: the ranking is a
//! stable sort, so tied labels keep their domain order too.

use serde::Serialize;

use sa_common::QueryError;
use sa_math::argmax_first;

use crate::inference::DecisionPosterior;

/// One label in the ranking.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedOption {
    /// 1-based rank.
    pub rank: usize,
    pub label: String,
    pub expected_utility: f64,
    /// Expected utility given up relative to the best label.
    pub regret: f64,
}

/// Recommended label for a decision node.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Recommendation {
    pub decision: String,
    pub label: String,
    /// The maximum expected utility.
    pub meu: f64,
    /// True when another label reached the same maximum.
    pub tie_break: bool,
    pub ranking: Vec<RankedOption>,
}

/// First label with the maximum value.
///
/// Returns the label, its value and whether a later label tied.
pub fn best_choice(utilities: &[(String, f64)]) -> Option<(&str, f64, bool)> {
    let values: Vec<f64> = utilities.iter().map(|(_, u)| *u).collect();
    let best = argmax_first(&values)?;
    Some((utilities[best.index].0.as_str(), best.value, best.tied))
}

/// Rank every label of a decision and pick the best one.
pub fn recommend(posterior: &DecisionPosterior) -> Result<Recommendation, QueryError> {
    let utilities = posterior.expected_utilities();
    let (label, meu, tie_break) =
        best_choice(&utilities).ok_or_else(|| QueryError::IncompleteModel {
            violations: vec![format!(
                "decision '{}' has no finite expected utility",
                posterior.decision
            )],
        })?;

    let mut order: Vec<&(String, f64)> = utilities.iter().collect();
    order.sort_by(|a, b| b.1.total_cmp(&a.1));
    let ranking = order
        .into_iter()
        .enumerate()
        .map(|(i, (label, u))| RankedOption {
            rank: i + 1,
            label: label.clone(),
            expected_utility: *u,
            regret: meu - u,
        })
        .collect();

    Ok(Recommendation {
        decision: posterior.decision.clone(),
        label: label.to_string(),
        meu,
        tie_break,
        ranking,
    })
}

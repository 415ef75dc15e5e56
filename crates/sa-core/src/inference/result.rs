//! Results of one `infer()` call.

use serde::Serialize;

use sa_common::QueryError;

/// Posterior of one chance variable, aligned with its domain.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Marginal {
    pub variable: String,
    pub observed: bool,
    pub labels: Vec<String>,
    pub probabilities: Vec<f64>,
}

/// Expected payoff contributed by one utility node.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UtilityTerm {
    pub node: String,
    pub expected: f64,
}

/// Everything computed for one decision label.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OptionPosterior {
    pub label: String,
    /// Sum of `utilities`.
    pub expected_utility: f64,
    pub probability_of_evidence: f64,
    pub utilities: Vec<UtilityTerm>,
    pub marginals: Vec<Marginal>,
}

impl OptionPosterior {
    pub fn marginal(&self, variable: &str) -> Option<&Marginal> {
        self.marginals.iter().find(|m| m.variable == variable)
    }
}

/// Per-label results of one decision node, in domain order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DecisionPosterior {
    pub decision: String,
    pub options: Vec<OptionPosterior>,
}

impl DecisionPosterior {
    /// `(label, expected utility)` in domain order.
    pub fn expected_utilities(&self) -> Vec<(String, f64)> {
        self.options
            .iter()
            .map(|o| (o.label.clone(), o.expected_utility))
            .collect()
    }

    pub fn option(&self, label: &str) -> Option<&OptionPosterior> {
        self.options.iter().find(|o| o.label == label)
    }
}

/// Output of `infer()`: one entry per decision node.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InferenceResult {
    pub strategy: String,
    /// Observed `(variable, label)` pairs.
    pub evidence: Vec<(String, String)>,
    pub decisions: Vec<DecisionPosterior>,
    /// Budget units spent across all evaluations.
    pub work: u64,
}

impl InferenceResult {
    pub fn decision(&self, name: &str) -> Option<&DecisionPosterior> {
        self.decisions.iter().find(|d| d.decision == name)
    }

    /// Posterior marginal of `variable` with `decision` fixed to `label`.
    pub fn posterior(
        &self,
        decision: &str,
        label: &str,
        variable: &str,
    ) -> Result<&Marginal, QueryError> {
        let posterior = self
            .decision(decision)
            .ok_or_else(|| QueryError::NotADecisionNode {
                name: decision.to_string(),
            })?;
        let option = posterior
            .option(label)
            .ok_or_else(|| QueryError::UnknownLabel {
                variable: decision.to_string(),
                label: label.to_string(),
            })?;
        option
            .marginal(variable)
            .ok_or_else(|| QueryError::NotAChanceNode {
                name: variable.to_string(),
            })
    }
}

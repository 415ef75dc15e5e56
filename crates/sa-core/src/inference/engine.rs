//! Evidence and inference state machine.
//!
//! ```text
//! Idle --set_evidence--> EvidenceSet --infer--> Inferred
//!   ^                        |                     |
//!   +------clear_evidence----+---------------------+
//! ```
//!
//! `set_evidence` is lazy: it validates names and labels and stores the
//! observation set. `infer` evaluates every label of every decision node and
//! caches the result until the evidence changes. Read accessors require the
//! `Inferred` state.

use std::fmt;

use serde::Serialize;
use tracing::{debug, info};

use sa_common::{NodeKind, QueryError};
use sa_config::EngineSettings;

use super::result::{DecisionPosterior, InferenceResult, Marginal, OptionPosterior, UtilityTerm};
use super::{strategy_for, Budget, Evaluation, Evidence, InferenceStrategy, ModelView, Query};
use crate::decision::{self, Recommendation};
use crate::logging::event_names;
use crate::model::{InfluenceDiagram, VarId, Violation};

/// Lifecycle state of an [`InferenceEngine`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineState {
    Idle,
    EvidenceSet,
    Inferred,
}

impl fmt::Display for EngineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineState::Idle => write!(f, "idle"),
            EngineState::EvidenceSet => write!(f, "evidence_set"),
            EngineState::Inferred => write!(f, "inferred"),
        }
    }
}

/// Query engine over a finished, read-only diagram.
///
/// The diagram is borrowed immutably, so any number of engines can run
/// against the same diagram from different threads.
pub struct InferenceEngine<'d> {
    view: ModelView<'d>,
    settings: EngineSettings,
    strategy: Box<dyn InferenceStrategy>,
    violations: Vec<Violation>,
    state: EngineState,
    evidence: Evidence,
    result: Option<InferenceResult>,
}

impl fmt::Debug for InferenceEngine<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InferenceEngine")
            .field("model", &self.view.diagram().name())
            .field("strategy", &self.strategy.name())
            .field("state", &self.state)
            .field("evidence", &self.evidence.len())
            .finish()
    }
}

impl<'d> InferenceEngine<'d> {
    /// Create an engine in the `Idle` state.
    ///
    /// The diagram is validated once here with `settings.tolerance`; the
    /// outcome is reused by every later `infer()`.
    pub fn new(diagram: &'d InfluenceDiagram, settings: EngineSettings) -> Self {
        let violations = diagram.validate_with(settings.tolerance);
        if !violations.is_empty() {
            debug!(
                model = diagram.name(),
                violations = violations.len(),
                "model failed validation; infer() will be refused"
            );
        }
        Self {
            view: ModelView::new(diagram),
            strategy: strategy_for(settings.strategy),
            settings,
            violations,
            state: EngineState::Idle,
            evidence: Evidence::new(),
            result: None,
        }
    }

    /// Replace the configured strategy.
    pub fn with_strategy(mut self, strategy: Box<dyn InferenceStrategy>) -> Self {
        self.strategy = strategy;
        self.result = None;
        if self.state == EngineState::Inferred {
            self.state = EngineState::EvidenceSet;
        }
        self
    }

    pub fn diagram(&self) -> &'d InfluenceDiagram {
        self.view.diagram()
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    pub fn strategy_name(&self) -> &'static str {
        self.strategy.name()
    }

    pub fn state(&self) -> EngineState {
        self.state
    }

    pub fn evidence(&self) -> &Evidence {
        &self.evidence
    }

    /// Violations found when the engine was created.
    pub fn violations(&self) -> &[Violation] {
        &self.violations
    }

    /// Replace the current evidence.
    ///
    /// Every name must be a chance node and every label part of its domain;
    /// on failure the engine keeps its previous evidence and state. Any
    /// cached result is discarded.
    pub fn set_evidence<'a, I>(&mut self, observations: I) -> Result<(), QueryError>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let evidence = Evidence::resolve(self.view.diagram(), observations)?;
        debug!(
            event = event_names::EVIDENCE_SET,
            observed = evidence.len(),
            previous_state = %self.state,
            "evidence set"
        );
        self.evidence = evidence;
        self.result = None;
        self.state = EngineState::EvidenceSet;
        Ok(())
    }

    /// Drop evidence and any cached result. Always succeeds.
    pub fn clear_evidence(&mut self) {
        if self.state != EngineState::Idle {
            debug!(event = event_names::EVIDENCE_CLEARED, previous_state = %self.state, "evidence cleared");
        }
        self.evidence = Evidence::new();
        self.result = None;
        self.state = EngineState::Idle;
    }

    /// Evaluate every label of every decision node under the current
    /// evidence.
    ///
    /// Refused with [`QueryError::State`] once a result is cached, and with
    /// [`QueryError::IncompleteModel`] when the diagram failed validation.
    /// A failed call leaves state and evidence unchanged.
    pub fn infer(&mut self) -> Result<&InferenceResult, QueryError> {
        if self.state == EngineState::Inferred {
            return Err(QueryError::State {
                expected: format!("{} or {}", EngineState::Idle, EngineState::EvidenceSet),
                actual: self.state.to_string(),
            });
        }
        if !self.violations.is_empty() {
            return Err(QueryError::IncompleteModel {
                violations: self.violations.iter().map(|v| v.to_string()).collect(),
            });
        }

        info!(
            event = event_names::INFER_STARTED,
            model = self.view.diagram().name(),
            strategy = self.strategy.name(),
            observed = self.evidence.len(),
            "inference started"
        );

        let mut budget = Budget::new(self.settings.max_assignments);
        let mut decisions = Vec::with_capacity(self.view.decision_nodes().len());
        for &decision in self.view.decision_nodes() {
            decisions.push(self.evaluate_decision(decision, &mut budget)?);
        }

        let result = InferenceResult {
            strategy: self.strategy.name().to_string(),
            evidence: self.evidence.labels(self.view.diagram()),
            decisions,
            work: budget.used(),
        };
        info!(
            event = event_names::INFER_FINISHED,
            strategy = self.strategy.name(),
            decisions = result.decisions.len(),
            work = result.work,
            "inference finished"
        );

        self.state = EngineState::Inferred;
        let result = self.result.insert(result);
        Ok(&*result)
    }

    fn evaluate_decision(
        &self,
        decision: VarId,
        budget: &mut Budget,
    ) -> Result<DecisionPosterior, QueryError> {
        let diagram = self.view.diagram();
        let variable = &diagram.registry()[decision];
        let mut options = Vec::with_capacity(variable.cardinality());
        for (choice, label) in variable.labels().iter().enumerate() {
            let query = Query {
                evidence: &self.evidence,
                decision,
                choice,
            };
            let evaluation = self.strategy.evaluate(&self.view, &query, budget)?;
            debug!(
                decision = variable.name(),
                label = label.as_str(),
                expected_utility = evaluation.expected_utility,
                "decision label evaluated"
            );
            options.push(self.option_posterior(label, evaluation));
        }
        Ok(DecisionPosterior {
            decision: variable.name().to_string(),
            options,
        })
    }

    fn option_posterior(&self, label: &str, evaluation: Evaluation) -> OptionPosterior {
        let registry = self.view.diagram().registry();
        let utilities = evaluation
            .utilities
            .into_iter()
            .map(|(id, expected)| UtilityTerm {
                node: registry[id].name().to_string(),
                expected,
            })
            .collect();
        let marginals = evaluation
            .marginals
            .into_iter()
            .map(|(id, probabilities)| {
                let variable = &registry[id];
                Marginal {
                    variable: variable.name().to_string(),
                    observed: self.evidence.get(id).is_some(),
                    labels: variable.labels().to_vec(),
                    probabilities,
                }
            })
            .collect();
        OptionPosterior {
            label: label.to_string(),
            expected_utility: evaluation.expected_utility,
            probability_of_evidence: evaluation.probability_of_evidence,
            utilities,
            marginals,
        }
    }

    /// The cached result.
    pub fn result(&self) -> Result<&InferenceResult, QueryError> {
        match (&self.result, self.state) {
            (Some(result), EngineState::Inferred) => Ok(result),
            _ => Err(QueryError::State {
                expected: EngineState::Inferred.to_string(),
                actual: self.state.to_string(),
            }),
        }
    }

    fn decision_posterior(&self, name: &str) -> Result<&DecisionPosterior, QueryError> {
        let result = self.result()?;
        let node = self
            .view
            .diagram()
            .node(name)
            .ok_or_else(|| QueryError::UnknownVariable {
                name: name.to_string(),
            })?;
        if node.kind() != NodeKind::Decision {
            return Err(QueryError::NotADecisionNode {
                name: name.to_string(),
            });
        }
        result
            .decision(name)
            .ok_or_else(|| QueryError::NotADecisionNode {
                name: name.to_string(),
            })
    }

    /// Expected utility per label, in the decision's domain order.
    pub fn posterior_utility(&self, decision: &str) -> Result<Vec<(String, f64)>, QueryError> {
        Ok(self.decision_posterior(decision)?.expected_utilities())
    }

    /// Best label and its expected utility; ties go to the first declared
    /// label.
    pub fn best_choice(&self, decision: &str) -> Result<(String, f64), QueryError> {
        let utilities = self.posterior_utility(decision)?;
        let (label, value, _) =
            decision::best_choice(&utilities).ok_or_else(|| QueryError::IncompleteModel {
                violations: vec![format!("decision '{}' has no labels", decision)],
            })?;
        Ok((label.to_string(), value))
    }

    /// Maximum expected utility of a decision.
    pub fn meu(&self, decision: &str) -> Result<f64, QueryError> {
        self.best_choice(decision).map(|(_, value)| value)
    }

    /// Full ranking of a decision's labels.
    pub fn recommend(&self, decision: &str) -> Result<Recommendation, QueryError> {
        let recommendation = decision::recommend(self.decision_posterior(decision)?)?;
        info!(
            event = event_names::DECIDE_RECOMMENDED,
            decision = recommendation.decision.as_str(),
            label = recommendation.label.as_str(),
            meu = recommendation.meu,
            tie_break = recommendation.tie_break,
            "recommendation"
        );
        Ok(recommendation)
    }

    /// Posterior marginal of a chance variable with `decision` fixed to
    /// `label`.
    pub fn posterior(
        &self,
        decision: &str,
        label: &str,
        variable: &str,
    ) -> Result<&Marginal, QueryError> {
        self.decision_posterior(decision)?;
        let node = self
            .view
            .diagram()
            .node(variable)
            .ok_or_else(|| QueryError::UnknownVariable {
                name: variable.to_string(),
            })?;
        if node.kind() != NodeKind::Chance {
            return Err(QueryError::NotAChanceNode {
                name: variable.to_string(),
            });
        }
        self.result()?.posterior(decision, label, variable)
    }
}

//! Command payloads and their renderings.
//!
//! Every report serializes to JSON and YAML as-is and knows how to print
//! itself as Markdown and as a one-line summary. Payloads go to stdout;
//! nothing here writes logs.

use std::fmt::Write as _;

use chrono::{DateTime, Utc};
use serde::Serialize;

use sa_common::{NodeKind, OutputFormat, Result, SCHEMA_VERSION};
use sa_config::ModelSnapshot;

use crate::decision::Recommendation;
use crate::inference::{InferenceResult, OptionPosterior};
use crate::model::{InfluenceDiagram, VarId, Violation};

/// A report printable in every [`OutputFormat`].
pub trait Render: Serialize {
    fn markdown(&self) -> String;
    fn summary(&self) -> String;
}

/// Render a report in the requested format.
pub fn render<T: Render>(report: &T, format: OutputFormat) -> Result<String> {
    Ok(match format {
        OutputFormat::Json => serde_json::to_string_pretty(report)?,
        OutputFormat::Yaml => serde_yaml::to_string(report)?,
        OutputFormat::Md => report.markdown(),
        OutputFormat::Summary => report.summary(),
    })
}

/// One observed `(variable, label)` pair.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Observation {
    pub variable: String,
    pub label: String,
}

fn observations<S: AsRef<str>>(pairs: &[(S, S)]) -> Vec<Observation> {
    pairs
        .iter()
        .map(|(variable, label)| Observation {
            variable: variable.as_ref().to_string(),
            label: label.as_ref().to_string(),
        })
        .collect()
}

fn evidence_line(evidence: &[Observation]) -> String {
    if evidence.is_empty() {
        return "none".to_string();
    }
    evidence
        .iter()
        .map(|o| format!("{}={}", o.variable, o.label))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Three decimals, without a negative sign on values that round to zero.
fn utility(value: f64) -> String {
    let rounded = format!("{:.3}", value);
    match rounded.strip_prefix('-') {
        Some(rest) if rest.bytes().all(|b| b == b'0' || b == b'.') => rest.to_string(),
        _ => rounded,
    }
}

fn ranking_table(out: &mut String, recommendation: &Recommendation) {
    let _ = writeln!(out, "| Rank | Label | Expected utility | Regret |");
    let _ = writeln!(out, "|---:|---|---:|---:|");
    for r in &recommendation.ranking {
        let _ = writeln!(
            out,
            "| {} | {} | {} | {} |",
            r.rank,
            r.label,
            utility(r.expected_utility),
            utility(r.regret)
        );
    }
}

fn best_line(recommendation: &Recommendation) -> String {
    let tie = if recommendation.tie_break {
        " (tie broken by domain order)"
    } else {
        ""
    };
    format!(
        "{} = {} (MEU {}){}",
        recommendation.decision,
        recommendation.label,
        utility(recommendation.meu),
        tie
    )
}

/// Result of `sa-core evaluate`.
#[derive(Debug, Clone, Serialize)]
pub struct EvaluationReport {
    pub schema_version: &'static str,
    pub generated_at: DateTime<Utc>,
    pub run_id: String,
    pub model: ModelSnapshot,
    pub strategy: String,
    pub evidence: Vec<Observation>,
    pub recommendation: Recommendation,
    /// Per-label detail for the recommended decision, in domain order.
    pub options: Vec<OptionPosterior>,
    pub work: u64,
}

impl EvaluationReport {
    pub fn new(
        run_id: impl Into<String>,
        model: ModelSnapshot,
        result: &InferenceResult,
        recommendation: Recommendation,
    ) -> Self {
        let options = result
            .decision(&recommendation.decision)
            .map(|d| d.options.clone())
            .unwrap_or_default();
        Self {
            schema_version: SCHEMA_VERSION,
            generated_at: Utc::now(),
            run_id: run_id.into(),
            model,
            strategy: result.strategy.clone(),
            evidence: observations(&result.evidence),
            recommendation,
            options,
            work: result.work,
        }
    }
}

impl Render for EvaluationReport {
    fn markdown(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "# Evaluation: {}", self.recommendation.decision);
        let _ = writeln!(out);
        let _ = writeln!(out, "Model: {} ({})", self.model.model_name, self.strategy);
        let _ = writeln!(out, "Evidence: {}", evidence_line(&self.evidence));
        let _ = writeln!(out);
        ranking_table(&mut out, &self.recommendation);
        let _ = writeln!(out);
        let _ = writeln!(out, "Best choice: **{}**", best_line(&self.recommendation));
        out
    }

    fn summary(&self) -> String {
        best_line(&self.recommendation)
    }
}

/// One scenario of `sa-core scenarios`.
#[derive(Debug, Clone, Serialize)]
pub struct ScenarioOutcome {
    pub name: String,
    pub description: String,
    pub evidence: Vec<Observation>,
    pub recommendation: Recommendation,
}

impl ScenarioOutcome {
    pub fn new(
        name: &str,
        description: &str,
        evidence: &[(&str, &str)],
        recommendation: Recommendation,
    ) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            evidence: observations(evidence),
            recommendation,
        }
    }
}

/// Result of `sa-core scenarios`.
#[derive(Debug, Clone, Serialize)]
pub struct ScenariosReport {
    pub schema_version: &'static str,
    pub generated_at: DateTime<Utc>,
    pub run_id: String,
    pub model: ModelSnapshot,
    pub strategy: String,
    pub scenarios: Vec<ScenarioOutcome>,
}

impl ScenariosReport {
    pub fn new(
        run_id: impl Into<String>,
        model: ModelSnapshot,
        strategy: impl Into<String>,
        scenarios: Vec<ScenarioOutcome>,
    ) -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            generated_at: Utc::now(),
            run_id: run_id.into(),
            model,
            strategy: strategy.into(),
            scenarios,
        }
    }
}

impl Render for ScenariosReport {
    fn markdown(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "# Scenarios: {}", self.model.model_name);
        for s in &self.scenarios {
            let _ = writeln!(out);
            let _ = writeln!(out, "## {}", s.name);
            let _ = writeln!(out);
            let _ = writeln!(out, "{}", s.description);
            let _ = writeln!(out, "Evidence: {}", evidence_line(&s.evidence));
            let _ = writeln!(out);
            ranking_table(&mut out, &s.recommendation);
            let _ = writeln!(out);
            let _ = writeln!(out, "Best choice: **{}**", best_line(&s.recommendation));
        }
        out
    }

    fn summary(&self) -> String {
        self.scenarios
            .iter()
            .map(|s| format!("{}: {}", s.name, best_line(&s.recommendation)))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Result of `sa-core validate`.
#[derive(Debug, Clone, Serialize)]
pub struct ValidationReport {
    pub schema_version: &'static str,
    pub model: String,
    pub valid: bool,
    pub violations: Vec<Violation>,
}

impl ValidationReport {
    pub fn new(diagram: &InfluenceDiagram, violations: Vec<Violation>) -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            model: diagram.name().to_string(),
            valid: violations.is_empty(),
            violations,
        }
    }
}

impl Render for ValidationReport {
    fn markdown(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "# Validation: {}", self.model);
        let _ = writeln!(out);
        if self.valid {
            let _ = writeln!(out, "No violations.");
        }
        for v in &self.violations {
            let _ = writeln!(out, "- {}", v);
        }
        out
    }

    fn summary(&self) -> String {
        if self.valid {
            format!("{}: valid", self.model)
        } else {
            format!("{}: {} violation(s)", self.model, self.violations.len())
        }
    }
}

/// A node as listed by `sa-core describe`.
#[derive(Debug, Clone, Serialize)]
pub struct NodeSummary {
    pub name: String,
    pub display_label: String,
    pub kind: NodeKind,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub labels: Vec<String>,
    pub parents: Vec<String>,
}

/// Result of `sa-core describe`.
#[derive(Debug, Clone, Serialize)]
pub struct DescribeReport {
    pub schema_version: &'static str,
    pub model: String,
    pub nodes: Vec<NodeSummary>,
    pub arcs: Vec<(String, String)>,
    pub topological_order: Vec<String>,
}

impl DescribeReport {
    pub fn new(diagram: &InfluenceDiagram) -> Self {
        let registry = diagram.registry();
        let name_of = |id: VarId| registry[id].name().to_string();
        let nodes = diagram
            .nodes()
            .iter()
            .map(|n| NodeSummary {
                name: n.name().to_string(),
                display_label: n.variable().display_label().to_string(),
                kind: n.kind(),
                labels: n.variable().labels().to_vec(),
                parents: diagram.parents(n.id()).into_iter().map(&name_of).collect(),
            })
            .collect();
        Self {
            schema_version: SCHEMA_VERSION,
            model: diagram.name().to_string(),
            nodes,
            arcs: diagram
                .arcs()
                .iter()
                .map(|&(p, c)| (name_of(p), name_of(c)))
                .collect(),
            topological_order: diagram
                .topological_names()
                .into_iter()
                .map(str::to_string)
                .collect(),
        }
    }
}

impl Render for DescribeReport {
    fn markdown(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "# Model: {}", self.model);
        let _ = writeln!(out);
        let _ = writeln!(out, "| Node | Kind | Labels | Parents |");
        let _ = writeln!(out, "|---|---|---|---|");
        for n in &self.nodes {
            let _ = writeln!(
                out,
                "| {} | {} | {} | {} |",
                n.name,
                n.kind,
                n.labels.join(", "),
                n.parents.join(", ")
            );
        }
        let _ = writeln!(out);
        let _ = writeln!(out, "Order: {}", self.topological_order.join(" -> "));
        out
    }

    fn summary(&self) -> String {
        format!(
            "{}: {} nodes, {} arcs",
            self.model,
            self.nodes.len(),
            self.arcs.len()
        )
    }
}

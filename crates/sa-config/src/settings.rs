//! Inference engine settings.

use serde::{Deserialize, Serialize};

/// Exact inference algorithm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    /// Depth-first enumeration of unobserved chance assignments.
    #[default]
    Enumeration,
    /// Sum-product variable elimination over table factors.
    VariableElimination,
}

impl std::str::FromStr for StrategyKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "enumeration" | "enum" => Ok(StrategyKind::Enumeration),
            "variable_elimination" | "ve" | "elimination" => Ok(StrategyKind::VariableElimination),
            _ => Err(format!("unknown inference strategy: {}", s)),
        }
    }
}

impl std::fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StrategyKind::Enumeration => write!(f, "enumeration"),
            StrategyKind::VariableElimination => write!(f, "variable_elimination"),
        }
    }
}

fn default_tolerance() -> f64 {
    1e-6
}

/// Settings consumed by the inference engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineSettings {
    #[serde(default)]
    pub strategy: StrategyKind,

    /// Upper bound on visited assignments (enumeration) or factor entries
    /// produced (elimination) per `infer()` call. `None` means unbounded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_assignments: Option<u64>,

    /// Row-sum tolerance used by `validate()`.
    #[serde(default = "default_tolerance")]
    pub tolerance: f64,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            strategy: StrategyKind::default(),
            max_assignments: None,
            tolerance: default_tolerance(),
        }
    }
}

impl EngineSettings {
    pub fn with_strategy(mut self, strategy: StrategyKind) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn with_max_assignments(mut self, budget: u64) -> Self {
        self.max_assignments = Some(budget);
        self
    }
}

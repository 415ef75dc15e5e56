//! Structured event definitions for logging.
//!
//! Every event carries a run id and the processing stage it belongs to, so a
//! JSONL stream from several runs can be split and ordered after the fact.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Log levels for events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl From<tracing::Level> for Level {
    fn from(level: tracing::Level) -> Self {
        match level {
            tracing::Level::TRACE => Level::Trace,
            tracing::Level::DEBUG => Level::Debug,
            tracing::Level::INFO => Level::Info,
            tracing::Level::WARN => Level::Warn,
            tracing::Level::ERROR => Level::Error,
        }
    }
}

/// Processing stages of one CLI run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Startup and configuration.
    Init,
    /// Model assembly from a definition or the built-in builder.
    Build,
    /// Structural and table checks.
    Validate,
    /// Evidence resolution.
    Evidence,
    /// Expected-utility computation.
    Infer,
    /// Label selection.
    Decide,
    /// Payload rendering.
    Report,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Stage::Init => "init",
            Stage::Build => "build",
            Stage::Validate => "validate",
            Stage::Evidence => "evidence",
            Stage::Infer => "infer",
            Stage::Decide => "decide",
            Stage::Report => "report",
        };
        write!(f, "{}", s)
    }
}

impl std::str::FromStr for Stage {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "init" => Ok(Stage::Init),
            "build" => Ok(Stage::Build),
            "validate" => Ok(Stage::Validate),
            "evidence" => Ok(Stage::Evidence),
            "infer" => Ok(Stage::Infer),
            "decide" => Ok(Stage::Decide),
            "report" => Ok(Stage::Report),
            _ => Err(format!("unknown stage: {}", s)),
        }
    }
}

/// Standard event names used in logging.
pub mod event_names {
    pub const RUN_STARTED: &str = "run.started";
    pub const RUN_FINISHED: &str = "run.finished";
    pub const RUN_FAILED: &str = "run.failed";

    pub const CONFIG_LOADED: &str = "config.loaded";
    pub const CONFIG_DEFAULT_USED: &str = "config.default_used";

    pub const MODEL_BUILT: &str = "model.built";
    pub const MODEL_INVALID: &str = "model.invalid";

    pub const EVIDENCE_SET: &str = "evidence.set";
    pub const EVIDENCE_CLEARED: &str = "evidence.cleared";

    pub const INFER_STARTED: &str = "infer.started";
    pub const INFER_FINISHED: &str = "infer.finished";

    pub const DECIDE_RECOMMENDED: &str = "decide.recommended";

    pub const INTERNAL_ERROR: &str = "internal_error";
}

/// A structured log event for JSONL output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEvent {
    pub ts: DateTime<Utc>,
    pub level: Level,
    /// Event name (e.g. "infer.finished").
    pub event: String,
    /// Absent for events emitted outside a run span.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stage: Option<Stage>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub message: String,
    /// Additional structured fields (stable keys).
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub fields: BTreeMap<String, serde_json::Value>,
}

impl LogEvent {
    pub fn new(level: Level, event: impl Into<String>, message: impl Into<String>) -> Self {
        LogEvent {
            ts: Utc::now(),
            level,
            event: event.into(),
            run_id: None,
            stage: None,
            message: message.into(),
            fields: BTreeMap::new(),
        }
    }

    pub fn with_run(mut self, run_id: impl Into<String>, stage: Stage) -> Self {
        self.run_id = Some(run_id.into());
        self.stage = Some(stage);
        self
    }

    /// Add a field; values that fail to serialize are skipped.
    pub fn with_field(mut self, key: impl Into<String>, value: impl Serialize) -> Self {
        if let Ok(v) = serde_json::to_value(value) {
            self.fields.insert(key.into(), v);
        }
        self
    }

    /// Serialize to a single JSON line.
    pub fn to_jsonl(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| {
            format!(
                r#"{{"error":"serialization_failed","event":"{}"}}"#,
                self.event
            )
        })
    }
}

/// Correlation context for one CLI invocation.
#[derive(Debug, Clone)]
pub struct LogContext {
    pub run_id: String,
}

impl LogContext {
    pub fn new(run_id: impl Into<String>) -> Self {
        LogContext {
            run_id: run_id.into(),
        }
    }

    /// Span tagging every event inside it with the run id and `stage`.
    pub fn span(&self, stage: Stage) -> tracing::Span {
        tracing::info_span!("stage", run_id = %self.run_id, stage = %stage)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_serializes_to_one_line() {
        let event = LogEvent::new(Level::Info, event_names::INFER_FINISHED, "inference finished")
            .with_run("run-12345", Stage::Infer)
            .with_field("strategy", "enumeration")
            .with_field("work", 5625u64);

        let json = event.to_jsonl();
        assert!(!json.contains('\n'));
        assert!(json.contains(r#""event":"infer.finished""#));
        assert!(json.contains(r#""level":"info""#));
        assert!(json.contains(r#""stage":"infer""#));
        assert!(json.contains(r#""run_id":"run-12345""#));
        assert!(json.contains(r#""work":5625"#));
    }

    #[test]
    fn optional_parts_are_omitted() {
        let json = LogEvent::new(Level::Warn, "x", "").to_jsonl();
        assert!(!json.contains("fields"));
        assert!(!json.contains("run_id"));
        assert!(!json.contains("stage"));
        assert!(!json.contains("message"));
    }

    #[test]
    fn stage_names_round_trip() {
        for stage in [
            Stage::Init,
            Stage::Build,
            Stage::Validate,
            Stage::Evidence,
            Stage::Infer,
            Stage::Decide,
            Stage::Report,
        ] {
            assert_eq!(stage.to_string().parse::<Stage>(), Ok(stage));
        }
        assert!("scan".parse::<Stage>().is_err());
        assert_eq!(serde_json::to_string(&Stage::Decide).unwrap(), "\"decide\"");
        assert_eq!(Level::from(tracing::Level::DEBUG), Level::Debug);
    }
}

//! Model snapshots for query reports and reproducibility.
//!
//! A snapshot pins the exact model a query ran against: two reports with the
//! same `definition_hash` were computed from identical tables and ordering.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::definition::ModelDefinition;
use crate::resolve::ConfigSource;

/// A frozen summary of the model used for a query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelSnapshot {
    /// When this snapshot was taken.
    pub timestamp: DateTime<Utc>,

    pub model_name: String,

    pub schema_version: String,

    /// Where the model came from.
    pub source: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,

    /// SHA-256 of the canonical JSON encoding of the definition.
    pub definition_hash: String,

    pub node_count: usize,

    pub arc_count: usize,
}

impl ModelSnapshot {
    /// Create a snapshot of a definition.
    pub fn new(
        def: &ModelDefinition,
        source: ConfigSource,
        path: Option<&std::path::Path>,
    ) -> Result<Self, serde_json::Error> {
        Ok(ModelSnapshot {
            timestamp: Utc::now(),
            model_name: def.name.clone(),
            schema_version: def.schema_version.clone(),
            source: source.to_string(),
            path: path.map(|p| p.display().to_string()),
            definition_hash: definition_hash(def)?,
            node_count: def.nodes.len(),
            arc_count: def.arcs.len(),
        })
    }
}

/// SHA-256 hex digest of the canonical JSON encoding.
pub fn definition_hash(def: &ModelDefinition) -> Result<String, serde_json::Error> {
    let canonical = serde_json::to_string(def)?;
    Ok(hash_content(&canonical))
}

fn hash_content(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    hex::encode(hasher.finalize())
}

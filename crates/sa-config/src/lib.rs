//! Strategic allocation configuration loading and validation.
//!
//! This crate provides:
//! - Typed Rust structs for the serializable model definition
//! - Inference engine settings
//! - Model path resolution (CLI → env → XDG → built-in)
//! - Semantic validation of definitions
//! - Model snapshots for reproducible query reports

pub mod definition;
pub mod load;
pub mod resolve;
pub mod settings;
pub mod snapshot;
pub mod validate;

pub use definition::{
    ArcDefinition, ModelDefinition, NodeDefinition, SliceDefinition, TableDefinition,
    VariableDefinition, VariableKind,
};
pub use load::{load_definition, parse_definition, DefinitionFormat};
pub use resolve::{resolve_model_path, ConfigSource, ModelPath};
pub use settings::{EngineSettings, StrategyKind};
pub use snapshot::ModelSnapshot;
pub use validate::{validate_definition, ValidationError, ValidationResult};

/// Schema version for model definition files.
pub const CONFIG_SCHEMA_VERSION: &str = sa_common::SCHEMA_VERSION;

//! Locating and loading the model a command runs against.

use std::path::Path;

use tracing::info;

use sa_common::Result;
use sa_config::{
    load_definition, resolve_model_path, ConfigSource, EngineSettings, ModelDefinition,
    ModelSnapshot,
};

use super::allocation::build_allocation_model;
use super::diagram::InfluenceDiagram;
use crate::logging::event_names;

/// A built diagram together with where it came from.
#[derive(Debug)]
pub struct LoadedModel {
    pub diagram: InfluenceDiagram,
    pub snapshot: ModelSnapshot,
    /// Settings declared by the definition, or defaults.
    pub settings: EngineSettings,
}

/// Resolve, read and build the model.
///
/// Falls back to the built-in allocation model when no file is found.
pub fn load_model(cli_path: Option<&Path>) -> Result<LoadedModel> {
    let resolved = resolve_model_path(cli_path);
    match resolved.path {
        Some(path) => {
            let definition = load_definition(&path)?;
            let diagram = InfluenceDiagram::from_definition(&definition)?;
            let snapshot = ModelSnapshot::new(&definition, resolved.source, Some(&path))?;
            info!(
                event = event_names::CONFIG_LOADED,
                path = %path.display(),
                source = %resolved.source,
                model = diagram.name(),
                "model definition loaded"
            );
            Ok(LoadedModel {
                diagram,
                snapshot,
                settings: definition.inference.unwrap_or_default(),
            })
        }
        None => {
            let diagram = build_allocation_model()?;
            let definition = ModelDefinition::from(&diagram);
            let snapshot = ModelSnapshot::new(&definition, ConfigSource::BuiltinDefault, None)?;
            info!(
                event = event_names::CONFIG_DEFAULT_USED,
                model = diagram.name(),
                "using built-in model"
            );
            Ok(LoadedModel {
                diagram,
                snapshot,
                settings: EngineSettings::default(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sa_common::Error;

    #[test]
    fn explicit_file_is_loaded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.json");
        let exported = ModelDefinition::from(&build_allocation_model().unwrap());
        std::fs::write(&path, serde_json::to_string(&exported).unwrap()).unwrap();

        let loaded = load_model(Some(&path)).unwrap();
        assert_eq!(loaded.diagram.nodes().len(), 11);
        assert_eq!(loaded.snapshot.source, ConfigSource::CliArgument.to_string());
        assert_eq!(loaded.snapshot.definition_hash.len(), 64);
        assert!(loaded.diagram.validate().is_empty());
    }

    #[test]
    fn missing_explicit_file_is_an_io_error() {
        let err = load_model(Some(Path::new("/nonexistent/model.json"))).unwrap_err();
        assert!(matches!(err, Error::Io(_)));
    }
}

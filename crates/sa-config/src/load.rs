//! Reading model definitions from disk.

use std::path::Path;

use crate::definition::ModelDefinition;
use crate::validate::validate_definition;
use sa_common::{Error, Result};

/// On-disk encoding of a definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DefinitionFormat {
    Json,
    Yaml,
}

impl DefinitionFormat {
    /// Infer the format from a file extension; anything but `.yaml`/`.yml` is JSON.
    pub fn from_path(path: &Path) -> Self {
        match path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .as_deref()
        {
            Some("yaml") | Some("yml") => DefinitionFormat::Yaml,
            _ => DefinitionFormat::Json,
        }
    }
}

/// Parse and semantically validate a definition from text.
pub fn parse_definition(text: &str, format: DefinitionFormat) -> Result<ModelDefinition> {
    let def: ModelDefinition = match format {
        DefinitionFormat::Json => serde_json::from_str(text)?,
        DefinitionFormat::Yaml => serde_yaml::from_str(text)?,
    };
    validate_definition(&def)?;
    Ok(def)
}

/// Load, parse and validate a definition file.
pub fn load_definition(path: &Path) -> Result<ModelDefinition> {
    let text = std::fs::read_to_string(path).map_err(|e| {
        Error::Io(std::io::Error::new(
            e.kind(),
            format!("{}: {}", path.display(), e),
        ))
    })?;
    parse_definition(&text, DefinitionFormat::from_path(path))
}

//! Model path resolution and discovery.
//!
//! Resolution order: CLI argument → environment variables → XDG paths →
//! system config → built-in model.

use std::path::{Path, PathBuf};

/// Discovered model file path.
#[derive(Debug, Clone, Default)]
pub struct ModelPath {
    /// Path to the model definition (None means the built-in model).
    pub path: Option<PathBuf>,

    /// Where the path came from (for diagnostics).
    pub source: ConfigSource,
}

/// Where a model definition was found.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ConfigSource {
    /// Explicitly provided via CLI argument.
    CliArgument,

    /// Set via environment variable.
    Environment,

    /// Found in XDG config directory.
    XdgConfig,

    /// Found in /etc/strategic-allocation/.
    SystemConfig,

    /// Using the built-in model.
    #[default]
    BuiltinDefault,
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigSource::CliArgument => write!(f, "CLI argument"),
            ConfigSource::Environment => write!(f, "environment variable"),
            ConfigSource::XdgConfig => write!(f, "XDG config"),
            ConfigSource::SystemConfig => write!(f, "system config"),
            ConfigSource::BuiltinDefault => write!(f, "builtin default"),
        }
    }
}

/// Environment variable names.
const ENV_MODEL_PATH: &str = "SA_MODEL";
const ENV_CONFIG_DIR: &str = "SA_CONFIG_DIR";

/// Candidate model file names, in lookup order.
const MODEL_FILENAMES: [&str; 3] = ["model.json", "model.yaml", "model.yml"];

/// Application name for XDG directories.
const APP_NAME: &str = "strategic-allocation";

/// Resolve the model definition path.
///
/// An explicit CLI path is returned even when it does not exist so that the
/// loader reports the missing file instead of silently falling back.
///
/// 1. Explicit CLI path (if provided)
/// 2. SA_MODEL environment variable
/// 3. SA_CONFIG_DIR environment variable + model file name
/// 4. XDG config directory (~/.config/strategic-allocation/)
/// 5. System config (/etc/strategic-allocation/)
/// 6. Built-in model (None)
pub fn resolve_model_path(cli_path: Option<&Path>) -> ModelPath {
    resolve_with(
        cli_path,
        std::env::var_os(ENV_MODEL_PATH).map(PathBuf::from),
        std::env::var_os(ENV_CONFIG_DIR).map(PathBuf::from),
        xdg_config_dir(),
        Some(system_config_dir()),
    )
}

fn resolve_with(
    cli_path: Option<&Path>,
    env_path: Option<PathBuf>,
    env_dir: Option<PathBuf>,
    xdg_dir: Option<PathBuf>,
    system_dir: Option<PathBuf>,
) -> ModelPath {
    if let Some(path) = cli_path {
        return ModelPath {
            path: Some(path.to_path_buf()),
            source: ConfigSource::CliArgument,
        };
    }

    if let Some(path) = env_path.filter(|p| p.exists()) {
        return ModelPath {
            path: Some(path),
            source: ConfigSource::Environment,
        };
    }

    let candidates = [
        (env_dir, ConfigSource::Environment),
        (xdg_dir, ConfigSource::XdgConfig),
        (system_dir, ConfigSource::SystemConfig),
    ];
    for (dir, source) in candidates {
        if let Some(path) = dir.and_then(|d| find_model_file(&d)) {
            return ModelPath {
                path: Some(path),
                source,
            };
        }
    }

    ModelPath::default()
}

fn find_model_file(dir: &Path) -> Option<PathBuf> {
    MODEL_FILENAMES
        .iter()
        .map(|name| dir.join(name))
        .find(|p| p.is_file())
}

/// Get the XDG config directory for strategic-allocation.
pub fn xdg_config_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join(APP_NAME))
}

/// Get the system config directory.
pub fn system_config_dir() -> PathBuf {
    PathBuf::from("/etc").join(APP_NAME)
}

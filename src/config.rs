//! Application configuration
//!
//! Configuration is loaded from multiple sources with the following priority (lowest to highest):
//! 1. `config/default.toml` (version controlled)
//! 2. `config/user.toml` (gitignored, user overrides)
//! 3. Environment variables (`GRIT_SECTION__KEY`)

use figment::{Figment, providers::{Format, Toml, Env}};
use grit_col::MaterialDb;
use grit_physics::{InteractionMatrix, PhysicsConfig};
use serde::{Serialize, Deserialize};
use std::path::{Path, PathBuf};

/// Main application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Physics world configuration
    #[serde(default)]
    pub physics: PhysicsConfig,
    /// Where collision resources and material tables live
    #[serde(default)]
    pub resources: ResourceConfig,
    /// Debug configuration
    #[serde(default)]
    pub debug: DebugConfig,
}

impl AppConfig {
    /// Load configuration from default locations
    ///
    /// Priority (lowest to highest):
    /// 1. `config/default.toml`
    /// 2. `config/user.toml`
    /// 3. Environment variables (`GRIT_*`)
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from("config")
    }

    /// Load configuration from a specific config directory
    pub fn load_from<P: AsRef<Path>>(config_dir: P) -> Result<Self, ConfigError> {
        let config_dir = config_dir.as_ref();
        let default_path = config_dir.join("default.toml");
        let user_path = config_dir.join("user.toml");

        let mut figment = Figment::new();

        if default_path.exists() {
            figment = figment.merge(Toml::file(&default_path));
        }

        // Load user config (optional)
        if user_path.exists() {
            figment = figment.merge(Toml::file(&user_path));
        }

        // Environment variables override everything
        // GRIT_PHYSICS__MAX_STEPS=5 -> physics.max_steps = 5
        figment = figment.merge(Env::prefixed("GRIT_").split("__"));

        figment.extract().map_err(ConfigError::from)
    }
}

/// Resource locations
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceConfig {
    /// Directory that resource names are resolved against
    pub root: PathBuf,
    /// RON material database, if any
    pub materials: Option<PathBuf>,
    /// RON interaction matrix, if any
    pub interactions: Option<PathBuf>,
}

impl Default for ResourceConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("."),
            materials: None,
            interactions: None,
        }
    }
}

impl ResourceConfig {
    /// The configured material database, or one holding only the fallback
    pub fn load_materials(&self) -> Result<MaterialDb, ConfigError> {
        match &self.materials {
            Some(path) => MaterialDb::load(path).map_err(|e| ConfigError {
                message: format!("{}: {}", path.display(), e),
            }),
            None => Ok(MaterialDb::new()),
        }
    }

    /// The configured interaction matrix, or a single frictionless group
    pub fn load_interactions(&self) -> Result<InteractionMatrix, ConfigError> {
        match &self.interactions {
            Some(path) => InteractionMatrix::load(path).map_err(|e| ConfigError {
                message: format!("{}: {}", path.display(), e),
            }),
            None => Ok(InteractionMatrix::default()),
        }
    }
}

/// Debug configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DebugConfig {
    /// Log level (error, warn, info, debug, trace)
    pub log_level: String,
}

impl Default for DebugConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

/// Configuration error
#[derive(Debug)]
pub struct ConfigError {
    message: String,
}

impl From<figment::Error> for ConfigError {
    fn from(e: figment::Error) -> Self {
        ConfigError {
            message: e.to_string(),
        }
    }
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Configuration error: {}", self.message)
    }
}

impl std::error::Error for ConfigError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.physics.max_steps, 20);
        assert_eq!(config.physics.gravity, [0.0, 0.0, -9.807]);
        assert_eq!(config.debug.log_level, "info");
        assert!(config.resources.materials.is_none());
    }

    #[test]
    fn test_config_serialization() {
        let config = AppConfig::default();
        let toml = toml::to_string(&config).unwrap();
        assert!(toml.contains("step_size"));
        assert!(toml.contains("root"));
    }

    #[test]
    fn test_missing_tables_give_defaults() {
        let resources = ResourceConfig::default();
        assert_eq!(resources.load_materials().unwrap().len(), 1);
        assert_eq!(resources.load_interactions().unwrap().groups(), 1);
    }

    #[test]
    fn test_bad_material_path() {
        let resources = ResourceConfig {
            materials: Some(PathBuf::from("/no/such/materials.ron")),
            ..ResourceConfig::default()
        };
        let err = resources.load_materials().unwrap_err();
        assert!(err.to_string().contains("materials.ron"));
    }
}

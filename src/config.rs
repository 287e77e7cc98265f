//! YAML configuration
//!
//! ```yaml
//! channel_capacity: 512
//! handle_timeout_ms: 5000
//! database: /var/lib/tandem/tandem.db
//! log_level: debug
//! palette:
//!   node_tools:
//!     - { id: create-class, child_kind: class, label: Class }
//!   edge_tools:
//!     - { id: create-reference, label: references }
//! ```
//!
//! Every key is optional.

use crate::event::DEFAULT_CHANNEL_CAPACITY;
use crate::project::{ProcessorSettings, ProjectServices};
use crate::representation::diagram::ToolPalette;
use crate::representation::DefaultRepresentationEventProcessorFactory;
use crate::storage::EditingContextManager;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid config: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("channel_capacity must be positive")]
    ZeroCapacity,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TandemConfig {
    pub channel_capacity: usize,
    pub handle_timeout_ms: Option<u64>,
    pub database: Option<PathBuf>,
    pub log_level: String,
    pub palette: ToolPalette,
}

impl Default for TandemConfig {
    fn default() -> Self {
        Self {
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
            handle_timeout_ms: None,
            database: None,
            log_level: "info".to_string(),
            palette: ToolPalette::standard(),
        }
    }
}

impl TandemConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&text)
    }

    pub fn from_yaml_str(text: &str) -> Result<Self, ConfigError> {
        // An empty document deserializes to null
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        let config: Self = serde_yaml::from_str(text)?;
        if config.channel_capacity == 0 {
            return Err(ConfigError::ZeroCapacity);
        }
        Ok(config)
    }

    pub fn processor_settings(&self) -> ProcessorSettings {
        ProcessorSettings {
            channel_capacity: self.channel_capacity,
            handle_timeout: self.handle_timeout_ms.map(Duration::from_millis),
        }
    }

    /// Project services over `editing_context_manager`, with this config's
    /// palette and stream settings applied
    pub fn services(&self, editing_context_manager: Arc<dyn EditingContextManager>) -> ProjectServices {
        let services = ProjectServices::new(editing_context_manager);
        let factory = DefaultRepresentationEventProcessorFactory::new(services.object_service.clone())
            .with_palette(self.palette.clone())
            .with_capacity(self.channel_capacity);
        services
            .with_factory(Arc::new(factory))
            .with_settings(self.processor_settings())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::InMemoryEditingContextManager;

    #[test]
    fn empty_document_uses_defaults() {
        let config = TandemConfig::from_yaml_str("").unwrap();
        assert_eq!(config, TandemConfig::default());
        assert_eq!(config.channel_capacity, 256);
        assert_eq!(config.log_level, "info");
        assert!(config.palette.node_tool("create-class").is_some());
    }

    #[test]
    fn partial_document_keeps_other_defaults() {
        let config = TandemConfig::from_yaml_str(
            "channel_capacity: 8\nhandle_timeout_ms: 250\nlog_level: debug\n",
        )
        .unwrap();

        assert_eq!(config.channel_capacity, 8);
        assert_eq!(config.log_level, "debug");
        assert!(config.database.is_none());

        let settings = config.processor_settings();
        assert_eq!(settings.channel_capacity, 8);
        assert_eq!(settings.handle_timeout, Some(Duration::from_millis(250)));
    }

    #[test]
    fn custom_palette_replaces_standard() {
        let config = TandemConfig::from_yaml_str(
            r#"
palette:
  node_tools:
    - { id: create-state, child_kind: state, label: State }
"#,
        )
        .unwrap();

        assert!(config.palette.node_tool("create-state").is_some());
        assert!(config.palette.node_tool("create-class").is_none());
        assert!(config.palette.edge_tools.is_empty());
    }

    #[test]
    fn zero_capacity_is_rejected() {
        let result = TandemConfig::from_yaml_str("channel_capacity: 0");
        assert!(matches!(result, Err(ConfigError::ZeroCapacity)));
    }

    #[test]
    fn malformed_yaml_is_an_error() {
        let result = TandemConfig::from_yaml_str("channel_capacity: [1, 2");
        assert!(matches!(result, Err(ConfigError::Yaml(_))));
    }

    #[test]
    fn load_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tandem.yaml");
        std::fs::write(&path, "database: /tmp/tandem-test.db\n").unwrap();

        let config = TandemConfig::load(&path).unwrap();
        assert_eq!(config.database, Some(PathBuf::from("/tmp/tandem-test.db")));

        let missing = TandemConfig::load(dir.path().join("missing.yaml"));
        assert!(matches!(missing, Err(ConfigError::Io(_))));
    }

    #[test]
    fn services_carry_settings() {
        let config = TandemConfig::from_yaml_str("channel_capacity: 16").unwrap();
        let services = config.services(Arc::new(InMemoryEditingContextManager::new()));
        assert_eq!(services.settings.channel_capacity, 16);
    }
}

//! Engine configuration.
//!
//! Defaults match the Camunda 7 modeler. A YAML file can override any field:
//!
//! ```yaml
//! template_attribute: "camunda:modelerTemplate"
//! version_attribute: "camunda:modelerTemplateVersion"
//! error_id_prefix: "Error_"
//! entry_id_prefix: "custom-entry"
//! default_group:
//!   id: custom-properties
//!   label: Custom properties
//! ```

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Environment variable naming a YAML config file.
pub const CONFIG_ENV: &str = "ELEMENT_TEMPLATES_CONFIG";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupConfig {
    pub id: String,
    pub label: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TemplateConfig {
    /// Marker attribute holding the applied template id.
    pub template_attribute: String,
    /// Marker attribute holding the applied template version.
    pub version_attribute: String,
    /// Prefix of synthesized `bpmn:Error` ids.
    pub error_id_prefix: String,
    /// Prefix of UI entry ids.
    pub entry_id_prefix: String,
    /// Group receiving properties without a declared group.
    pub default_group: GroupConfig,
}

impl Default for TemplateConfig {
    fn default() -> Self {
        Self {
            template_attribute: "camunda:modelerTemplate".to_string(),
            version_attribute: "camunda:modelerTemplateVersion".to_string(),
            error_id_prefix: "Error_".to_string(),
            entry_id_prefix: "custom-entry".to_string(),
            default_group: GroupConfig {
                id: "custom-properties".to_string(),
                label: "Custom properties".to_string(),
            },
        }
    }
}

impl TemplateConfig {
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml).context("parsing template config YAML")
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading template config {}", path.display()))?;
        Self::from_yaml(&text)
    }

    /// Load from the file named by `ELEMENT_TEMPLATES_CONFIG`, or defaults
    /// when the variable is unset.
    pub fn from_env() -> Result<Self> {
        match std::env::var_os(CONFIG_ENV) {
            Some(path) => {
                let config = Self::load(&path)?;
                tracing::info!(path = ?path, "loaded element template config");
                Ok(config)
            }
            None => Ok(Self::default()),
        }
    }
}

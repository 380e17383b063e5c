//! Language settings pushed by the host.

use crate::error::Result;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use yamlscope_schema::ValidationOptions;
use yamlscope_yaml::{ParseOptions, YamlVersion};

/// One `schemas` entry: a schema URI, the resources it governs and
/// optionally its inline content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchemaConfiguration {
    pub uri: String,
    #[serde(default)]
    pub file_match: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<Value>,
}

/// Settings object the host pushes on every configuration change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LanguageSettings {
    pub validate: bool,
    pub hover: bool,
    pub completion: bool,
    pub schemas: Vec<SchemaConfiguration>,
    /// `"!Tag"` or `"!Tag scalar|sequence|mapping"`.
    pub custom_tags: Vec<String>,
    pub is_kubernetes: bool,
    pub yaml_version: YamlVersion,
    /// Quiet period after the last edit before validation runs.
    pub debounce_ms: u64,
    /// Inactivity after which the host drops the service instance.
    pub idle_timeout_secs: u64,
}

impl Default for LanguageSettings {
    fn default() -> Self {
        Self {
            validate: true,
            hover: true,
            completion: true,
            schemas: Vec::new(),
            custom_tags: Vec::new(),
            is_kubernetes: false,
            yaml_version: YamlVersion::default(),
            debounce_ms: 500,
            idle_timeout_secs: 120,
        }
    }
}

impl LanguageSettings {
    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn parse_options(&self) -> ParseOptions {
        ParseOptions::from_settings(&self.custom_tags, self.yaml_version)
    }

    pub fn validation_options(&self) -> ValidationOptions {
        ValidationOptions {
            kubernetes: self.is_kubernetes,
        }
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }
}

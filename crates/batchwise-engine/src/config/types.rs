//! Serde types for YAML job definitions.

use std::time::Duration;

use batchwise_types::error::ErrorKind;
use serde::{Deserialize, Deserializer, Serialize};

use crate::retry::{Backoff, RetryPolicy};

const DEFAULT_MAX_BACKOFF_MS: u64 = 60_000;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobConfig {
    pub version: String,
    pub job: String,
    pub steps: Vec<StepConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepConfig {
    pub name: String,
    pub chunk_size: usize,
    pub reader: ComponentConfig,
    #[serde(deserialize_with = "component_or_name")]
    pub processor: ComponentConfig,
    pub writer: ComponentConfig,
    #[serde(default)]
    pub fault_tolerance: Option<FaultToleranceConfig>,
}

impl StepConfig {
    /// Retry policy for this step, [`RetryPolicy::none`] when not configured.
    #[must_use]
    pub fn retry_policy(&self) -> RetryPolicy {
        self.fault_tolerance
            .as_ref()
            .map_or_else(RetryPolicy::none, FaultToleranceConfig::to_policy)
    }
}

/// A reader, processor, or writer reference with its opaque settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentConfig {
    #[serde(rename = "use")]
    pub use_ref: String,
    #[serde(default)]
    pub config: serde_json::Value,
}

impl ComponentConfig {
    #[must_use]
    pub fn named(use_ref: impl Into<String>) -> Self {
        Self {
            use_ref: use_ref.into(),
            config: serde_json::Value::Null,
        }
    }
}

/// Accepts `processor: name` as shorthand for `processor: { use: name }`.
fn component_or_name<'de, D>(deserializer: D) -> Result<ComponentConfig, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Reference {
        Name(String),
        Component(ComponentConfig),
    }

    Ok(match Reference::deserialize(deserializer)? {
        Reference::Name(name) => ComponentConfig::named(name),
        Reference::Component(component) => component,
    })
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FaultToleranceConfig {
    pub retry_limit: u32,
    #[serde(default)]
    pub retry_on: Vec<ErrorKind>,
    #[serde(default = "default_reprocess_same_item")]
    pub reprocess_same_item: bool,
    #[serde(default)]
    pub backoff_ms: u64,
    #[serde(default)]
    pub max_backoff_ms: Option<u64>,
}

fn default_reprocess_same_item() -> bool {
    true
}

impl FaultToleranceConfig {
    #[must_use]
    pub fn to_policy(&self) -> RetryPolicy {
        let backoff = if self.backoff_ms == 0 {
            Backoff::NONE
        } else {
            Backoff::exponential(
                Duration::from_millis(self.backoff_ms),
                Duration::from_millis(self.max_backoff_ms.unwrap_or(DEFAULT_MAX_BACKOFF_MS)),
            )
        };
        RetryPolicy::new(self.retry_limit)
            .retry_on_all(self.retry_on.iter().copied())
            .reprocess_same_item(self.reprocess_same_item)
            .with_backoff(backoff)
    }
}

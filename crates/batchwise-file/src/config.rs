//! Typed settings for the file readers and writers, decoded from the
//! opaque `config` block of a component reference.

use batchwise_engine::config::ComponentConfig;
use batchwise_types::error::BatchError;
use serde::de::DeserializeOwned;
use serde::Deserialize;

fn default_delimiter() -> char {
    ','
}

fn delimiter_byte(delimiter: char) -> Result<u8, BatchError> {
    u8::try_from(delimiter)
        .ok()
        .filter(u8::is_ascii)
        .ok_or_else(|| {
            BatchError::configuration(
                "INVALID_DELIMITER",
                format!("delimiter '{delimiter}' must be a single ASCII character"),
            )
        })
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DelimitedReaderConfig {
    /// Single input file.
    #[serde(default)]
    pub path: Option<String>,
    /// File-name pattern matched when the step starts, e.g. `input/data*.csv`.
    #[serde(default)]
    pub resources: Option<String>,
    #[serde(default)]
    pub lines_to_skip: usize,
    pub names: Vec<String>,
    #[serde(default = "default_delimiter")]
    pub delimiter: char,
}

impl DelimitedReaderConfig {
    /// # Errors
    ///
    /// Returns a `configuration` error for a non-ASCII delimiter.
    pub fn delimiter_byte(&self) -> Result<u8, BatchError> {
        delimiter_byte(self.delimiter)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DelimitedWriterConfig {
    pub path: String,
    pub names: Vec<String>,
    /// Literal first line of the output.
    #[serde(default)]
    pub header: Option<String>,
    #[serde(default)]
    pub append: bool,
    #[serde(default = "default_delimiter")]
    pub delimiter: char,
}

impl DelimitedWriterConfig {
    /// # Errors
    ///
    /// Returns a `configuration` error for a non-ASCII delimiter.
    pub fn delimiter_byte(&self) -> Result<u8, BatchError> {
        delimiter_byte(self.delimiter)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct XmlWriterConfig {
    pub path: String,
    pub root_tag: String,
    pub item_tag: String,
}

/// Decode a component's `config` block. A missing block decodes as `{}`.
///
/// # Errors
///
/// Returns a `configuration` error naming the component on any mismatch.
pub fn decode<C: DeserializeOwned>(component: &ComponentConfig, role: &str) -> Result<C, BatchError> {
    let value = if component.config.is_null() {
        serde_json::Value::Object(serde_json::Map::new())
    } else {
        component.config.clone()
    };
    serde_json::from_value(value).map_err(|e| {
        BatchError::configuration(
            "INVALID_COMPONENT_CONFIG",
            format!("{role} '{}': {e}", component.use_ref),
        )
    })
}

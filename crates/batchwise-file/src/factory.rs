//! Construction of file readers and writers from component references.

use batchwise_engine::config::ComponentConfig;
use batchwise_engine::item::{ItemReader, ItemWriter};
use batchwise_types::error::BatchError;
use batchwise_types::resource::Resource;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::aggregator::DelimitedLineAggregator;
use crate::config::{decode, DelimitedReaderConfig, DelimitedWriterConfig, XmlWriterConfig};
use crate::mapper::DelimitedLineMapper;
use crate::reader::FlatFileItemReader;
use crate::resources::PatternReader;
use crate::writer::FlatFileItemWriter;
use crate::xml::XmlItemWriter;

/// `use:` name of the delimited text reader and writer.
pub const DELIMITED: &str = "delimited";
/// `use:` name of the XML writer.
pub const XML: &str = "xml";

fn require_names(names: &[String], role: &str) -> Result<(), BatchError> {
    if names.is_empty() || names.iter().any(|n| n.trim().is_empty()) {
        return Err(BatchError::configuration(
            "INVALID_COMPONENT_CONFIG",
            format!("{role} '{DELIMITED}': names must be a non-empty list of field names"),
        ));
    }
    Ok(())
}

/// Build the reader a step's `reader:` block names.
///
/// # Errors
///
/// Returns a `configuration` error for an unknown reader or invalid settings.
pub fn build_reader<T>(component: &ComponentConfig) -> Result<Box<dyn ItemReader<T>>, BatchError>
where
    T: DeserializeOwned + Send + 'static,
{
    match component.use_ref.as_str() {
        DELIMITED => {
            let config: DelimitedReaderConfig = decode(component, "reader")?;
            require_names(&config.names, "reader")?;
            let mapper = DelimitedLineMapper::new(&config.names).delimiter(config.delimiter_byte()?);
            let reader = FlatFileItemReader::new(mapper).lines_to_skip(config.lines_to_skip);
            match (config.path, config.resources) {
                (Some(path), None) => Ok(Box::new(reader.with_resource(Resource::new(path)))),
                (None, Some(pattern)) => Ok(Box::new(PatternReader::new(pattern, reader))),
                _ => Err(BatchError::configuration(
                    "INVALID_COMPONENT_CONFIG",
                    format!("reader '{DELIMITED}': set exactly one of 'path' or 'resources'"),
                )),
            }
        }
        other => Err(BatchError::configuration(
            "UNKNOWN_READER",
            format!("unknown reader '{other}', expected '{DELIMITED}'"),
        )),
    }
}

/// Build the writer a step's `writer:` block names.
///
/// # Errors
///
/// Returns a `configuration` error for an unknown writer or invalid settings.
pub fn build_writer<T>(component: &ComponentConfig) -> Result<Box<dyn ItemWriter<T>>, BatchError>
where
    T: Serialize + Send + 'static,
{
    match component.use_ref.as_str() {
        DELIMITED => {
            let config: DelimitedWriterConfig = decode(component, "writer")?;
            require_names(&config.names, "writer")?;
            let aggregator =
                DelimitedLineAggregator::new(&config.names).delimiter(config.delimiter_byte()?);
            let mut writer =
                FlatFileItemWriter::new(config.path, aggregator).append(config.append);
            if let Some(header) = config.header {
                writer = writer.header(header);
            }
            Ok(Box::new(writer))
        }
        XML => {
            let config: XmlWriterConfig = decode(component, "writer")?;
            Ok(Box::new(XmlItemWriter::new(
                config.path,
                config.root_tag,
                config.item_tag,
            )))
        }
        other => Err(BatchError::configuration(
            "UNKNOWN_WRITER",
            format!("unknown writer '{other}', expected '{DELIMITED}' or '{XML}'"),
        )),
    }
}

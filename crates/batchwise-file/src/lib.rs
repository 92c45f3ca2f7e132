//! Local file collaborators for batchwise steps: a delimited text reader
//! over one file or a file-name pattern, and delimited text and XML
//! writers. [`factory`] builds them from a step's component references.

pub mod aggregator;
pub mod config;
pub mod factory;
pub mod mapper;
pub mod reader;
pub mod resources;
pub mod writer;
pub mod xml;

pub use aggregator::DelimitedLineAggregator;
pub use factory::{build_reader, build_writer};
pub use mapper::DelimitedLineMapper;
pub use reader::FlatFileItemReader;
pub use resources::{expand_resources, PatternReader};
pub use writer::FlatFileItemWriter;
pub use xml::XmlItemWriter;

//! Record to delimited line serialization.

use std::marker::PhantomData;

use batchwise_types::error::BatchError;
use serde::Serialize;
use serde_json::Value;

/// Renders the named fields of a record, in a configured order, as one
/// delimited line.
///
/// Fields are looked up by their serialized names. Values are written
/// with `csv` quoting, so a field containing the delimiter round-trips
/// through [`DelimitedLineMapper`](crate::mapper::DelimitedLineMapper).
#[derive(Debug, Clone)]
pub struct DelimitedLineAggregator<T> {
    names: Vec<String>,
    delimiter: u8,
    _record: PhantomData<fn(&T)>,
}

fn field_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        other => other.to_string(),
    }
}

impl<T: Serialize> DelimitedLineAggregator<T> {
    #[must_use]
    pub fn new<S: AsRef<str>>(names: &[S]) -> Self {
        Self {
            names: names.iter().map(|n| n.as_ref().to_string()).collect(),
            delimiter: b',',
            _record: PhantomData,
        }
    }

    #[must_use]
    pub fn delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = delimiter;
        self
    }

    fn fields(&self, item: &T) -> Result<Vec<String>, BatchError> {
        let value = serde_json::to_value(item)
            .map_err(|e| BatchError::sink("SERIALIZE_FAILED", e.to_string()))?;
        let Value::Object(map) = value else {
            return Err(BatchError::sink(
                "NOT_A_RECORD",
                "delimited output requires records with named fields",
            ));
        };
        self.names
            .iter()
            .map(|name| {
                map.get(name).map(field_text).ok_or_else(|| {
                    BatchError::sink("UNKNOWN_FIELD", format!("record has no field '{name}'"))
                })
            })
            .collect()
    }

    /// Render `items` as newline-terminated lines, in order.
    ///
    /// # Errors
    ///
    /// Returns a `sink` error if any record cannot be rendered; nothing is
    /// returned for the other records in that case.
    pub fn render(&self, items: &[T]) -> Result<Vec<u8>, BatchError> {
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .delimiter(self.delimiter)
            .terminator(csv::Terminator::Any(b'\n'))
            .from_writer(Vec::new());
        for item in items {
            writer
                .write_record(self.fields(item)?)
                .map_err(|e| BatchError::sink("SERIALIZE_FAILED", e.to_string()))?;
        }
        writer
            .into_inner()
            .map_err(|e| BatchError::sink("SERIALIZE_FAILED", e.to_string()))
    }

    /// Render one record as a line without terminator.
    ///
    /// # Errors
    ///
    /// Returns a `sink` error if the record cannot be rendered.
    pub fn aggregate(&self, item: &T) -> Result<String, BatchError> {
        let bytes = self.render(std::slice::from_ref(item))?;
        let line = String::from_utf8(bytes)
            .map_err(|e| BatchError::sink("SERIALIZE_FAILED", e.to_string()))?;
        Ok(line.trim_end_matches('\n').to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use batchwise_types::error::ErrorKind;

    #[derive(Serialize)]
    struct Profile {
        id: Option<String>,
        email: Option<String>,
        brand: Option<String>,
    }

    fn profile(id: &str, email: Option<&str>, brand: &str) -> Profile {
        Profile {
            id: Some(id.into()),
            email: email.map(Into::into),
            brand: Some(brand.into()),
        }
    }

    #[test]
    fn test_fields_follow_configured_order() {
        let aggregator = DelimitedLineAggregator::new(&["brand", "id", "email"]);
        let line = aggregator
            .aggregate(&profile("1", Some("a@b.c"), "acme"))
            .unwrap();
        assert_eq!(line, "acme,1,a@b.c");
    }

    #[test]
    fn test_missing_value_is_empty_field() {
        let aggregator = DelimitedLineAggregator::new(&["id", "email", "brand"]);
        assert_eq!(
            aggregator.aggregate(&profile("1", None, "acme")).unwrap(),
            "1,,acme"
        );
    }

    #[test]
    fn test_delimiter_in_value_is_quoted() {
        let aggregator = DelimitedLineAggregator::new(&["brand", "id"]);
        assert_eq!(
            aggregator.aggregate(&profile("1", None, "acme, inc")).unwrap(),
            "\"acme, inc\",1"
        );
    }

    #[test]
    fn test_render_chunk_in_order() {
        let aggregator = DelimitedLineAggregator::new(&["id"]).delimiter(b'|');
        let bytes = aggregator
            .render(&[profile("1", None, "x"), profile("2", None, "y")])
            .unwrap();
        assert_eq!(String::from_utf8(bytes).unwrap(), "1\n2\n");
    }

    #[test]
    fn test_unknown_field_is_sink_error() {
        let aggregator = DelimitedLineAggregator::new(&["id", "phone"]);
        let err = aggregator.aggregate(&profile("1", None, "x")).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Sink);
        assert_eq!(err.code, "UNKNOWN_FIELD");
    }

    #[test]
    fn test_non_record_rejected() {
        let aggregator = DelimitedLineAggregator::<u32>::new(&["id"]);
        assert_eq!(aggregator.aggregate(&5).unwrap_err().code, "NOT_A_RECORD");
    }
}

//! Delimited line to record mapping.

use std::marker::PhantomData;

use batchwise_types::error::BatchError;
use csv::StringRecord;
use serde::de::DeserializeOwned;

/// Maps one delimited line onto `T` by position, using a fixed ordered
/// list of field names.
///
/// Fields are split with the `csv` tokenizer, so quoted fields may contain
/// the delimiter. Empty fields deserialize to `None` for optional fields.
#[derive(Debug, Clone)]
pub struct DelimitedLineMapper<T> {
    names: StringRecord,
    delimiter: u8,
    _record: PhantomData<fn() -> T>,
}

impl<T: DeserializeOwned> DelimitedLineMapper<T> {
    #[must_use]
    pub fn new<S: AsRef<str>>(names: &[S]) -> Self {
        Self {
            names: names.iter().map(AsRef::as_ref).collect(),
            delimiter: b',',
            _record: PhantomData,
        }
    }

    #[must_use]
    pub fn delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = delimiter;
        self
    }

    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        self.names.iter().collect()
    }

    /// # Errors
    ///
    /// Returns a `parse` error (`FIELD_COUNT_MISMATCH`) when the line does not
    /// have exactly one field per name, or (`INVALID_FIELD`) when a field
    /// does not deserialize into `T`.
    pub fn map_line(&self, line: &str, line_number: u64) -> Result<T, BatchError> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .delimiter(self.delimiter)
            .from_reader(line.as_bytes());

        let mut record = StringRecord::new();
        let read = reader.read_record(&mut record).map_err(|e| {
            BatchError::parse("INVALID_LINE", format!("line {line_number}: {e}"))
        })?;
        let found = if read { record.len() } else { 0 };
        if found != self.names.len() {
            return Err(BatchError::parse(
                "FIELD_COUNT_MISMATCH",
                format!(
                    "line {line_number}: expected {} fields, found {found}",
                    self.names.len()
                ),
            )
            .with_details(serde_json::json!({
                "line_number": line_number,
                "line": line,
                "expected": self.names.len(),
                "found": found,
            })));
        }

        record.deserialize(Some(&self.names)).map_err(|e| {
            BatchError::parse("INVALID_FIELD", format!("line {line_number}: {e}"))
                .with_details(serde_json::json!({ "line_number": line_number, "line": line }))
        })
    }
}

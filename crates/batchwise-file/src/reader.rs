//! Flat file reader: one record per line, with header lines skipped.

use std::fs::File;
use std::io::{BufRead, BufReader};

use batchwise_engine::item::{ItemReader, ResourceItemReader};
use batchwise_types::error::BatchError;
use batchwise_types::resource::Resource;
use serde::de::DeserializeOwned;

use crate::mapper::DelimitedLineMapper;

/// Reads records lazily from a delimited text file.
///
/// Blank lines are ignored. A line that is not valid UTF-8 or fails to map
/// stays pending and is re-mapped by the next `read` until
/// [`discard_failed`](ItemReader::discard_failed) drops it.
pub struct FlatFileItemReader<T> {
    mapper: DelimitedLineMapper<T>,
    lines_to_skip: usize,
    resource: Option<Resource>,
    input: Option<BufReader<File>>,
    line_number: u64,
    pending: Option<(u64, Vec<u8>)>,
}

impl<T: DeserializeOwned> FlatFileItemReader<T> {
    #[must_use]
    pub fn new(mapper: DelimitedLineMapper<T>) -> Self {
        Self {
            mapper,
            lines_to_skip: 0,
            resource: None,
            input: None,
            line_number: 0,
            pending: None,
        }
    }

    #[must_use]
    pub fn lines_to_skip(mut self, lines_to_skip: usize) -> Self {
        self.lines_to_skip = lines_to_skip;
        self
    }

    /// Resource bound by `open`.
    #[must_use]
    pub fn with_resource(mut self, resource: Resource) -> Self {
        self.resource = Some(resource);
        self
    }

    fn io_error(&self, code: &str, err: &std::io::Error) -> BatchError {
        let location = self
            .resource
            .as_ref()
            .map_or_else(|| "<unbound>".to_string(), ToString::to_string);
        BatchError::resource(code, format!("{location}: {err}"))
    }

    /// Next physical line without its terminator, or `None` at end of file.
    fn next_raw_line(&mut self) -> Result<Option<Vec<u8>>, BatchError> {
        let Some(input) = self.input.as_mut() else {
            return Ok(None);
        };
        let mut buf = Vec::new();
        match input.read_until(b'\n', &mut buf) {
            Ok(0) => return Ok(None),
            Ok(_) => {}
            Err(e) => return Err(self.io_error("READ_FAILED", &e)),
        }
        self.line_number += 1;
        if buf.last() == Some(&b'\n') {
            buf.pop();
            if buf.last() == Some(&b'\r') {
                buf.pop();
            }
        }
        Ok(Some(buf))
    }

    fn next_line(&mut self) -> Result<Option<(u64, Vec<u8>)>, BatchError> {
        while let Some(line) = self.next_raw_line()? {
            if !line.iter().all(u8::is_ascii_whitespace) {
                return Ok(Some((self.line_number, line)));
            }
        }
        Ok(None)
    }

    fn map_raw(&self, raw: &[u8], line_number: u64) -> Result<T, BatchError> {
        let line = std::str::from_utf8(raw).map_err(|e| {
            BatchError::parse("INVALID_ENCODING", format!("line {line_number}: {e}")).with_details(
                serde_json::json!({
                    "line_number": line_number,
                    "line": String::from_utf8_lossy(raw),
                }),
            )
        })?;
        self.mapper.map_line(line, line_number)
    }
}

impl<T: DeserializeOwned> ItemReader<T> for FlatFileItemReader<T> {
    fn open(&mut self) -> Result<(), BatchError> {
        let resource = self.resource.clone().ok_or_else(|| {
            BatchError::resource("NO_RESOURCE", "flat file reader has no resource to open")
        })?;
        self.open_resource(&resource)
    }

    fn read(&mut self) -> Result<Option<T>, BatchError> {
        let (line_number, line) = match self.pending.take() {
            Some(pending) => pending,
            None => match self.next_line()? {
                Some(next) => next,
                None => return Ok(None),
            },
        };
        match self.map_raw(&line, line_number) {
            Ok(record) => Ok(Some(record)),
            Err(err) => {
                self.pending = Some((line_number, line));
                Err(err)
            }
        }
    }

    fn discard_failed(&mut self) {
        if let Some((line_number, _)) = self.pending.take() {
            tracing::debug!(line_number, "Discarded unmappable line");
        }
    }

    fn close(&mut self) -> Result<(), BatchError> {
        self.input = None;
        self.pending = None;
        Ok(())
    }
}

impl<T: DeserializeOwned> ResourceItemReader<T> for FlatFileItemReader<T> {
    fn open_resource(&mut self, resource: &Resource) -> Result<(), BatchError> {
        self.resource = Some(resource.clone());
        self.pending = None;
        self.line_number = 0;
        let file = File::open(resource.path()).map_err(|e| self.io_error("OPEN_FAILED", &e))?;
        self.input = Some(BufReader::new(file));

        for _ in 0..self.lines_to_skip {
            if self.next_raw_line()?.is_none() {
                break;
            }
        }
        tracing::debug!(resource = %resource, skipped = self.line_number, "Opened flat file");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;
    use batchwise_engine::{RetryPolicy, Step, StepBuilder, VecWriter};
    use batchwise_types::error::ErrorKind;
    use batchwise_types::state::StepStatus;
    use serde::Deserialize;

    #[derive(Debug, PartialEq, Deserialize)]
    struct Pair {
        key: String,
        value: u32,
    }

    fn file_with(contents: &str) -> tempfile::NamedTempFile {
        file_with_bytes(contents.as_bytes())
    }

    fn file_with_bytes(contents: &[u8]) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents).unwrap();
        file
    }

    fn reader(file: &tempfile::NamedTempFile, skip: usize) -> FlatFileItemReader<Pair> {
        FlatFileItemReader::new(DelimitedLineMapper::new(&["key", "value"]))
            .lines_to_skip(skip)
            .with_resource(Resource::new(file.path()))
    }

    fn drain(reader: &mut FlatFileItemReader<Pair>) -> Vec<Pair> {
        let mut items = Vec::new();
        while let Some(item) = reader.read().unwrap() {
            items.push(item);
        }
        items
    }

    #[test]
    fn test_skips_header_lines() {
        let file = file_with("key,value\na,1\nb,2\n");
        let mut reader = reader(&file, 1);
        reader.open().unwrap();
        let items = drain(&mut reader);
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].key, "a");
        assert_eq!(items[1].value, 2);
    }

    #[test]
    fn test_reopen_restarts_and_reskips() {
        let file = file_with("key,value\na,1\n");
        let mut reader = reader(&file, 1);
        reader.open().unwrap();
        assert_eq!(drain(&mut reader).len(), 1);
        reader.open().unwrap();
        assert_eq!(drain(&mut reader).len(), 1);
    }

    #[test]
    fn test_blank_lines_ignored() {
        let file = file_with("a,1\n\n   \nb,2");
        let mut reader = reader(&file, 0);
        reader.open().unwrap();
        assert_eq!(drain(&mut reader).len(), 2);
    }

    #[test]
    fn test_failed_line_stays_pending_until_discarded() {
        let file = file_with("a,1\nbroken\nc,3\n");
        let mut reader = reader(&file, 0);
        reader.open().unwrap();
        assert_eq!(reader.read().unwrap().unwrap().key, "a");

        let first = reader.read().unwrap_err();
        let second = reader.read().unwrap_err();
        assert_eq!(first, second);
        assert_eq!(first.code, "FIELD_COUNT_MISMATCH");
        assert!(first.message.contains("line 2"));

        reader.discard_failed();
        assert_eq!(reader.read().unwrap().unwrap().key, "c");
        assert!(reader.read().unwrap().is_none());
    }

    #[test]
    fn test_invalid_utf8_line_is_a_pending_parse_error() {
        let file = file_with_bytes(b"a,1\n\xff\xfe,2\nc,3\n");
        let mut reader = reader(&file, 0);
        reader.open().unwrap();
        assert_eq!(reader.read().unwrap().unwrap().key, "a");

        let first = reader.read().unwrap_err();
        assert_eq!(first.kind, ErrorKind::Parse);
        assert_eq!(first.code, "INVALID_ENCODING");
        assert!(first.message.contains("line 2"), "{}", first.message);
        assert_eq!(reader.read().unwrap_err(), first);

        reader.discard_failed();
        assert_eq!(reader.read().unwrap().unwrap().key, "c");
        assert!(reader.read().unwrap().is_none());
    }

    fn key_of(pair: &Pair) -> Result<String, BatchError> {
        Ok(pair.key.clone())
    }

    const UNDECODABLE: &[u8] = b"a,1\n\xff\xfe,2\nc,3\n";

    #[test]
    fn test_undecodable_line_fails_step_without_parse_retry() {
        let file = file_with_bytes(UNDECODABLE);
        let writer = VecWriter::new();
        let log = writer.log();
        let mut step = StepBuilder::new("decode")
            .chunk(10)
            .reader(reader(&file, 0))
            .processor(key_of)
            .writer(writer)
            .fault_tolerant(RetryPolicy::new(2).retry_on(ErrorKind::Resource))
            .build()
            .unwrap();

        let execution = step.execute();
        assert_eq!(execution.status, StepStatus::Failed);
        let error = execution.error.unwrap();
        assert_eq!(error.kind, ErrorKind::Parse);
        assert_eq!(error.code, "INVALID_ENCODING");
        assert_eq!(execution.counts.retry_count, 0);
        assert!(log.items().is_empty());
    }

    #[test]
    fn test_undecodable_line_skipped_under_parse_policy() {
        let file = file_with_bytes(UNDECODABLE);
        let writer = VecWriter::new();
        let log = writer.log();
        let mut step = StepBuilder::new("decode")
            .chunk(10)
            .reader(reader(&file, 0))
            .processor(key_of)
            .writer(writer)
            .fault_tolerant(
                RetryPolicy::new(2)
                    .retry_on(ErrorKind::Parse)
                    .reprocess_same_item(false),
            )
            .build()
            .unwrap();

        let execution = step.execute();
        assert_eq!(execution.status, StepStatus::Completed);
        assert_eq!(execution.counts.skip_count, 1);
        assert_eq!(log.items(), vec!["a".to_string(), "c".to_string()]);
    }

    #[test]
    fn test_invalid_utf8_in_skipped_header_is_ignored() {
        let file = file_with_bytes(b"k\xe9y,value\r\na,1\r\n");
        let mut reader = reader(&file, 1);
        reader.open().unwrap();
        assert_eq!(
            drain(&mut reader),
            vec![Pair {
                key: "a".into(),
                value: 1
            }]
        );
    }

    #[test]
    fn test_line_numbers_count_skipped_header() {
        let file = file_with("key,value\nbroken\n");
        let mut reader = reader(&file, 1);
        reader.open().unwrap();
        let err = reader.read().unwrap_err();
        assert!(err.message.contains("line 2"), "{}", err.message);
    }

    #[test]
    fn test_missing_file_is_resource_error() {
        let mut reader = FlatFileItemReader::<Pair>::new(DelimitedLineMapper::new(&["key", "value"]))
            .with_resource(Resource::from("/nonexistent/batchwise.csv"));
        let err = reader.open().unwrap_err();
        assert_eq!(err.kind, ErrorKind::Resource);
        assert_eq!(err.code, "OPEN_FAILED");
    }

    #[test]
    fn test_open_without_resource_fails() {
        let mut reader =
            FlatFileItemReader::<Pair>::new(DelimitedLineMapper::new(&["key", "value"]));
        assert_eq!(reader.open().unwrap_err().code, "NO_RESOURCE");
    }

    #[test]
    fn test_header_longer_than_file() {
        let file = file_with("only header\n");
        let mut reader = reader(&file, 3);
        reader.open().unwrap();
        assert!(reader.read().unwrap().is_none());
    }
}

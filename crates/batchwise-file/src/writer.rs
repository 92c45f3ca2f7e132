//! Flat file writer with an optional custom header line.

use std::fs::{File, OpenOptions};
use std::io::{self, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use batchwise_engine::item::ItemWriter;
use batchwise_types::error::BatchError;
use serde::Serialize;

use crate::aggregator::DelimitedLineAggregator;

/// Writes each chunk as delimited lines, one `write` call per chunk.
///
/// A chunk is rendered completely in memory before anything reaches the
/// file, so a record that fails to render leaves the file untouched. A
/// failed write is truncated back to the length before the chunk. The
/// header, when configured, is written once per open: ahead of the first
/// chunk, or alone on close if no chunk was written.
pub struct FlatFileItemWriter<T> {
    path: PathBuf,
    aggregator: DelimitedLineAggregator<T>,
    header: Option<String>,
    append: bool,
    file: Option<File>,
    header_written: bool,
}

/// Output that can be cut back to an earlier length.
pub(crate) trait OutputFile: Write {
    fn len(&self) -> io::Result<u64>;

    /// Drop everything past `len` and continue writing from there.
    fn truncate_to(&mut self, len: u64) -> io::Result<()>;
}

impl OutputFile for File {
    fn len(&self) -> io::Result<u64> {
        Ok(self.metadata()?.len())
    }

    fn truncate_to(&mut self, len: u64) -> io::Result<()> {
        self.set_len(len)?;
        self.seek(SeekFrom::Start(len)).map(|_| ())
    }
}

/// Write `bytes` in full, or leave `out` at its prior length.
///
/// The returned error is always the write error; a failed rollback is only
/// logged.
pub(crate) fn write_all_or_rollback<F: OutputFile + ?Sized>(
    out: &mut F,
    bytes: &[u8],
) -> io::Result<()> {
    let start = out.len()?;
    let Err(err) = out.write_all(bytes).and_then(|()| out.flush()) else {
        return Ok(());
    };
    if let Err(rollback) = out.truncate_to(start) {
        tracing::warn!(
            length = start,
            error = %rollback,
            "Could not truncate output after a failed write"
        );
    }
    Err(err)
}

pub(crate) fn create_parent_dir(path: &Path) -> Result<(), BatchError> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => std::fs::create_dir_all(parent)
            .map_err(|e| {
                BatchError::resource("OPEN_FAILED", format!("{}: {e}", parent.display()))
            }),
        _ => Ok(()),
    }
}

impl<T: Serialize> FlatFileItemWriter<T> {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>, aggregator: DelimitedLineAggregator<T>) -> Self {
        Self {
            path: path.into(),
            aggregator,
            header: None,
            append: false,
            file: None,
            header_written: false,
        }
    }

    #[must_use]
    pub fn header(mut self, header: impl Into<String>) -> Self {
        self.header = Some(header.into());
        self
    }

    /// Append to an existing file instead of truncating it on open.
    #[must_use]
    pub fn append(mut self, append: bool) -> Self {
        self.append = append;
        self
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn sink_error(&self, err: &std::io::Error) -> BatchError {
        BatchError::sink("WRITE_FAILED", format!("{}: {err}", self.path.display()))
    }

    fn pending_header(&self) -> Option<&str> {
        if self.header_written {
            None
        } else {
            self.header.as_deref()
        }
    }
}

impl<T: Serialize> ItemWriter<T> for FlatFileItemWriter<T> {
    fn open(&mut self) -> Result<(), BatchError> {
        create_parent_dir(&self.path)?;
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .append(self.append)
            .truncate(!self.append)
            .open(&self.path)
            .map_err(|e| {
                BatchError::resource("OPEN_FAILED", format!("{}: {e}", self.path.display()))
            })?;
        self.file = Some(file);
        self.header_written = false;
        tracing::debug!(path = %self.path.display(), append = self.append, "Opened flat file output");
        Ok(())
    }

    fn write(&mut self, chunk: &[T]) -> Result<(), BatchError> {
        let mut buf = Vec::new();
        if let Some(header) = self.pending_header() {
            buf.extend_from_slice(header.as_bytes());
            buf.push(b'\n');
        }
        buf.extend(self.aggregator.render(chunk)?);

        let Some(file) = self.file.as_mut() else {
            return Err(BatchError::sink("NOT_OPEN", "flat file writer is not open"));
        };
        write_all_or_rollback(file, &buf).map_err(|e| self.sink_error(&e))?;
        self.header_written = true;
        Ok(())
    }

    fn close(&mut self) -> Result<(), BatchError> {
        let Some(mut file) = self.file.take() else {
            return Ok(());
        };
        let mut result = Ok(());
        if let Some(header) = self.pending_header() {
            result = writeln!(file, "{header}");
        }
        result
            .and_then(|()| file.sync_all())
            .map_err(|e| {
                BatchError::resource("CLOSE_FAILED", format!("{}: {e}", self.path.display()))
            })?;
        self.header_written = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use batchwise_types::error::ErrorKind;

    #[derive(Serialize)]
    struct Line {
        id: u32,
        name: String,
    }

    fn line(id: u32, name: &str) -> Line {
        Line {
            id,
            name: name.into(),
        }
    }

    fn writer(path: &Path) -> FlatFileItemWriter<Line> {
        FlatFileItemWriter::new(path, DelimitedLineAggregator::new(&["id", "name"]))
    }

    #[test]
    fn test_header_written_once_before_records() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.csv");
        let mut w = writer(&path).header("id_column,name_column");
        w.open().unwrap();
        w.write(&[line(1, "a"), line(2, "b")]).unwrap();
        w.write(&[line(3, "c"), line(4, "d")]).unwrap();
        w.write(&[line(5, "e")]).unwrap();
        w.close().unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(
            contents,
            "id_column,name_column\n1,a\n2,b\n3,c\n4,d\n5,e\n"
        );
        assert_eq!(contents.matches("id_column").count(), 1);
    }

    #[test]
    fn test_header_alone_when_no_chunk_written() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.csv");
        let mut w = writer(&path).header("h");
        w.open().unwrap();
        w.close().unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "h\n");
    }

    #[test]
    fn test_open_truncates_by_default() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.csv");
        std::fs::write(&path, "stale\n").unwrap();
        let mut w = writer(&path);
        w.open().unwrap();
        w.write(&[line(1, "a")]).unwrap();
        w.close().unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "1,a\n");
    }

    #[test]
    fn test_append_keeps_existing_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.csv");
        std::fs::write(&path, "0,z\n").unwrap();
        let mut w = writer(&path).append(true);
        w.open().unwrap();
        w.write(&[line(1, "a")]).unwrap();
        w.close().unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "0,z\n1,a\n");
    }

    #[test]
    fn test_creates_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/data/out.csv");
        let mut w = writer(&path);
        w.open().unwrap();
        w.close().unwrap();
        assert!(path.exists());
    }

    #[test]
    fn test_render_failure_leaves_file_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.csv");
        let mut w = FlatFileItemWriter::new(
            &path,
            DelimitedLineAggregator::<Line>::new(&["id", "missing"]),
        )
        .header("h");
        w.open().unwrap();
        let err = w.write(&[line(1, "a")]).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Sink);
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "");
    }

    /// In-memory output accepting `budget` more bytes before failing.
    struct ShortFile {
        data: Vec<u8>,
        budget: usize,
    }

    impl Write for ShortFile {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            if self.budget == 0 {
                return Err(io::Error::new(io::ErrorKind::Other, "no space left"));
            }
            let n = buf.len().min(self.budget);
            self.data.extend_from_slice(&buf[..n]);
            self.budget -= n;
            Ok(n)
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl OutputFile for ShortFile {
        fn len(&self) -> io::Result<u64> {
            Ok(self.data.len() as u64)
        }

        fn truncate_to(&mut self, len: u64) -> io::Result<()> {
            self.data.truncate(usize::try_from(len).unwrap());
            Ok(())
        }
    }

    #[test]
    fn test_partial_write_rolled_back() {
        let mut out = ShortFile {
            data: b"h\n".to_vec(),
            budget: 4,
        };
        let err = write_all_or_rollback(&mut out, b"r1\nr2\nr3\n").unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::Other);
        assert_eq!(out.data, b"h\n");
    }

    #[test]
    fn test_rewrite_after_rollback_appears_once() {
        let mut out = ShortFile {
            data: Vec::new(),
            budget: 5,
        };
        let chunk = b"h\nr1\nr2\nr3\n";
        assert!(write_all_or_rollback(&mut out, chunk).is_err());
        out.budget = usize::MAX;
        write_all_or_rollback(&mut out, chunk).unwrap();
        assert_eq!(out.data, chunk);
    }

    #[test]
    fn test_file_truncate_resumes_at_length() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.csv");
        std::fs::write(&path, "0,z\n").unwrap();
        let mut file = OpenOptions::new().append(true).open(&path).unwrap();
        file.write_all(b"1,partial").unwrap();
        file.truncate_to(4).unwrap();
        file.write_all(b"1,a\n").unwrap();
        drop(file);
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "0,z\n1,a\n");
    }

    #[test]
    fn test_write_before_open_fails() {
        let dir = tempfile::tempdir().unwrap();
        let mut w = writer(&dir.path().join("out.csv"));
        assert_eq!(w.write(&[line(1, "a")]).unwrap_err().code, "NOT_OPEN");
    }
}

//! XML document writer: one element per record inside a root element.

use std::fs::File;
use std::path::{Path, PathBuf};

use batchwise_engine::item::ItemWriter;
use batchwise_types::error::BatchError;
use serde::Serialize;

use crate::writer::{create_parent_dir, write_all_or_rollback};

const XML_DECLARATION: &str = r#"<?xml version="1.0" encoding="UTF-8"?>"#;

/// Writes records as `<item_tag>` elements of a `<root_tag>` document.
///
/// `open` writes the declaration and the root start tag, `close` the root
/// end tag. Each chunk is serialized fully before it is written, a failed
/// write is truncated back, and elements appear in chunk order.
pub struct XmlItemWriter<T> {
    path: PathBuf,
    root_tag: String,
    item_tag: String,
    file: Option<File>,
    _record: std::marker::PhantomData<fn(&T)>,
}

impl<T: Serialize> XmlItemWriter<T> {
    #[must_use]
    pub fn new(
        path: impl Into<PathBuf>,
        root_tag: impl Into<String>,
        item_tag: impl Into<String>,
    ) -> Self {
        Self {
            path: path.into(),
            root_tag: root_tag.into(),
            item_tag: item_tag.into(),
            file: None,
            _record: std::marker::PhantomData,
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn render(&self, chunk: &[T]) -> Result<String, BatchError> {
        let mut out = String::new();
        for item in chunk {
            let element = quick_xml::se::to_string_with_root(&self.item_tag, item)
                .map_err(|e| BatchError::sink("SERIALIZE_FAILED", e.to_string()))?;
            out.push_str("  ");
            out.push_str(&element);
            out.push('\n');
        }
        Ok(out)
    }

    fn write_raw(&mut self, text: &str, code: &str) -> Result<(), BatchError> {
        let Some(file) = self.file.as_mut() else {
            return Err(BatchError::sink("NOT_OPEN", "xml writer is not open"));
        };
        write_all_or_rollback(file, text.as_bytes()).map_err(|e| {
            let message = format!("{}: {e}", self.path.display());
            if code == "WRITE_FAILED" {
                BatchError::sink(code, message)
            } else {
                BatchError::resource(code, message)
            }
        })
    }
}

impl<T: Serialize> ItemWriter<T> for XmlItemWriter<T> {
    fn open(&mut self) -> Result<(), BatchError> {
        create_parent_dir(&self.path)?;
        let file = File::create(&self.path).map_err(|e| {
            BatchError::resource("OPEN_FAILED", format!("{}: {e}", self.path.display()))
        })?;
        self.file = Some(file);
        let prolog = format!("{XML_DECLARATION}\n<{}>\n", self.root_tag);
        self.write_raw(&prolog, "OPEN_FAILED")?;
        tracing::debug!(path = %self.path.display(), root = %self.root_tag, "Opened xml output");
        Ok(())
    }

    fn write(&mut self, chunk: &[T]) -> Result<(), BatchError> {
        let rendered = self.render(chunk)?;
        self.write_raw(&rendered, "WRITE_FAILED")
    }

    fn close(&mut self) -> Result<(), BatchError> {
        if self.file.is_none() {
            return Ok(());
        }
        let epilog = format!("</{}>\n", self.root_tag);
        let result = self.write_raw(&epilog, "CLOSE_FAILED");
        self.file = None;
        result
    }
}

//! Resource locator expansion for file-name wildcards.

use std::path::{Path, PathBuf};

use batchwise_engine::item::{ItemReader, ResourceItemReader};
use batchwise_engine::multi::MultiResourceReader;
use batchwise_types::error::BatchError;
use batchwise_types::resource::Resource;
use regex::Regex;
use walkdir::WalkDir;

fn has_wildcard(s: &str) -> bool {
    s.contains(['*', '?'])
}

/// Translate a file-name glob (`*`, `?`) into an anchored regex.
fn glob_to_regex(pattern: &str) -> Result<Regex, BatchError> {
    let mut re = String::with_capacity(pattern.len() + 8);
    re.push('^');
    for c in pattern.chars() {
        match c {
            '*' => re.push_str(".*"),
            '?' => re.push('.'),
            c => re.push_str(&regex::escape(c.encode_utf8(&mut [0u8; 4]))),
        }
    }
    re.push('$');
    Regex::new(&re).map_err(|e| {
        BatchError::configuration("INVALID_PATTERN", format!("pattern '{pattern}': {e}"))
    })
}

/// Expand `pattern` into the files it names, sorted by path.
///
/// A pattern without wildcards names exactly one resource, whether or not
/// it exists. Wildcards are only honoured in the file-name component; a
/// missing parent directory or no match yields an empty list.
///
/// # Errors
///
/// Returns a `configuration` error for wildcards in a directory component
/// and a `resource` error if the parent directory cannot be listed.
pub fn expand_resources(pattern: &str) -> Result<Vec<Resource>, BatchError> {
    if !has_wildcard(pattern) {
        return Ok(vec![Resource::new(pattern)]);
    }

    let path = Path::new(pattern);
    let file_pattern = path
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| {
            BatchError::configuration(
                "INVALID_PATTERN",
                format!("pattern '{pattern}' has no file name"),
            )
        })?;
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    if has_wildcard(&parent.to_string_lossy()) {
        return Err(BatchError::configuration(
            "INVALID_PATTERN",
            format!("pattern '{pattern}': wildcards are only supported in the file name"),
        ));
    }
    if !parent.is_dir() {
        tracing::warn!(pattern, "Resource directory does not exist, no resources matched");
        return Ok(Vec::new());
    }

    let matcher = glob_to_regex(file_pattern)?;
    let mut resources = Vec::new();
    for entry in WalkDir::new(&parent).min_depth(1).max_depth(1) {
        let entry = entry.map_err(|e| {
            BatchError::resource(
                "LIST_FAILED",
                format!("cannot list {}: {e}", parent.display()),
            )
        })?;
        if !entry.file_type().is_file() {
            continue;
        }
        let matched = entry
            .file_name()
            .to_str()
            .is_some_and(|name| matcher.is_match(name));
        if matched {
            resources.push(Resource::new(entry.path()));
        }
    }
    resources.sort();

    tracing::debug!(pattern, matched = resources.len(), "Expanded resource pattern");
    Ok(resources)
}

/// Multi-resource reader whose resources are matched against a pattern
/// each time it is opened, so files created by an earlier step are seen.
pub struct PatternReader<D> {
    pattern: String,
    inner: MultiResourceReader<D>,
}

impl<D> PatternReader<D> {
    #[must_use]
    pub fn new(pattern: impl Into<String>, delegate: D) -> Self {
        Self {
            pattern: pattern.into(),
            inner: MultiResourceReader::new(Vec::new(), delegate),
        }
    }

    #[must_use]
    pub fn pattern(&self) -> &str {
        &self.pattern
    }
}

impl<T, D> ItemReader<T> for PatternReader<D>
where
    D: ResourceItemReader<T>,
{
    fn open(&mut self) -> Result<(), BatchError> {
        let resources = expand_resources(&self.pattern)?;
        tracing::info!(
            pattern = %self.pattern,
            resources = resources.len(),
            "Resolved input resources"
        );
        self.inner.set_resources(resources);
        ItemReader::<T>::open(&mut self.inner)
    }

    fn read(&mut self) -> Result<Option<T>, BatchError> {
        ItemReader::<T>::read(&mut self.inner)
    }

    fn discard_failed(&mut self) {
        ItemReader::<T>::discard_failed(&mut self.inner);
    }

    fn close(&mut self) -> Result<(), BatchError> {
        ItemReader::<T>::close(&mut self.inner)
    }
}

//! Input/output resource locators.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Named location of an ordered, finite sequence of raw lines.
///
/// The locator is only a name; the reader bound to it owns the cursor.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Resource(PathBuf);

impl Resource {
    #[must_use]
    pub fn new(location: impl Into<PathBuf>) -> Self {
        Self(location.into())
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.0
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.display())
    }
}

impl From<&str> for Resource {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<PathBuf> for Resource {
    fn from(value: PathBuf) -> Self {
        Self(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resources_sort_by_path() {
        let mut resources = vec![
            Resource::from("input/inputData2.csv"),
            Resource::from("input/inputData10.csv"),
            Resource::from("input/inputData1.csv"),
        ];
        resources.sort();
        let names: Vec<String> = resources.iter().map(ToString::to_string).collect();
        assert_eq!(
            names,
            vec![
                "input/inputData1.csv",
                "input/inputData10.csv",
                "input/inputData2.csv"
            ]
        );
    }
}

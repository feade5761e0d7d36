//! Names the registry must never track

use std::collections::BTreeSet;

/// Static set of cluster names excluded from every registry operation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DenyList {
    names: BTreeSet<String>,
}

impl DenyList {
    /// Exact-match membership test
    pub fn contains(&self, name: &str) -> bool {
        self.names.contains(name)
    }

    /// Denied names in sorted order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }

    /// Number of denied names
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Whether nothing is denied
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

impl<S: Into<String>> FromIterator<S> for DenyList {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self {
            names: iter.into_iter().map(Into::into).collect(),
        }
    }
}

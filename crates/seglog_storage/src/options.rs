//! Engine initialization options.

use crate::error::{StorageError, StorageResult};
use std::collections::BTreeMap;

/// Option naming the storage location (required by file-backed engines).
pub const OPTION_PATH: &str = "path";

/// Option controlling whether commits are fsynced (`true` by default).
pub const OPTION_SYNC: &str = "sync";

/// Option selecting the engine implementation in [`crate::open`].
pub const OPTION_ENGINE: &str = "engine";

/// Named options supplied when initializing an engine.
///
/// Options are an ordered string map. Engines read the keys they understand
/// and ignore the rest, so backend-specific options pass through untouched.
///
/// # Example
///
/// ```rust
/// use seglog_storage::{Options, OPTION_PATH};
///
/// let options = Options::new().with(OPTION_PATH, "/tmp/seglog.db");
/// assert_eq!(options.get(OPTION_PATH), Some("/tmp/seglog.db"));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Options {
    values: BTreeMap<String, String>,
}

impl Options {
    /// Creates an empty option set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets an option, returning the updated set.
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.set(name, value);
        self
    }

    /// Sets an option in place, replacing any previous value.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.values.insert(name.into(), value.into());
    }

    /// Returns the raw value of an option.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(String::as_str)
    }

    /// Returns the value of a required option.
    ///
    /// An empty value counts as missing.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::MissingOption`] if the option is absent or empty.
    pub fn require(&self, name: &str) -> StorageResult<&str> {
        match self.get(name) {
            Some(value) if !value.is_empty() => Ok(value),
            _ => Err(StorageError::missing_option(name)),
        }
    }

    /// Parses a boolean option.
    ///
    /// Accepts `true/false`, `yes/no`, `on/off` and `1/0`, case-insensitively.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::InvalidOption`] if the value is not a boolean.
    pub fn get_bool(&self, name: &str) -> StorageResult<Option<bool>> {
        let Some(raw) = self.get(name) else {
            return Ok(None);
        };

        match raw.to_ascii_lowercase().as_str() {
            "true" | "yes" | "on" | "1" => Ok(Some(true)),
            "false" | "no" | "off" | "0" => Ok(Some(false)),
            _ => Err(StorageError::invalid_option(
                name,
                format!("expected a boolean, got {raw:?}"),
            )),
        }
    }

    /// Returns the number of options set.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns `true` if no options are set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Iterates over options in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl<K, V> FromIterator<(K, V)> for Options
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            values: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn require_present() {
        let options = Options::new().with(OPTION_PATH, "/data/store.db");
        assert_eq!(options.require(OPTION_PATH).unwrap(), "/data/store.db");
    }

    #[test]
    fn require_missing_fails() {
        let options = Options::new();
        let err = options.require(OPTION_PATH).unwrap_err();
        assert!(matches!(err, StorageError::MissingOption { ref option } if option == "path"));
    }

    #[test]
    fn require_empty_counts_as_missing() {
        let options = Options::new().with(OPTION_PATH, "");
        assert!(matches!(
            options.require(OPTION_PATH),
            Err(StorageError::MissingOption { .. })
        ));
    }

    #[test]
    fn bool_parsing() {
        let options: Options = [("a", "TRUE"), ("b", "off"), ("c", "1"), ("d", "maybe")]
            .into_iter()
            .collect();

        assert_eq!(options.get_bool("a").unwrap(), Some(true));
        assert_eq!(options.get_bool("b").unwrap(), Some(false));
        assert_eq!(options.get_bool("c").unwrap(), Some(true));
        assert_eq!(options.get_bool("missing").unwrap(), None);
        assert!(matches!(
            options.get_bool("d"),
            Err(StorageError::InvalidOption { .. })
        ));
    }

    #[test]
    fn unknown_options_pass_through() {
        let options = Options::new()
            .with(OPTION_PATH, "x")
            .with("backend.page_size", "4096");
        assert_eq!(options.len(), 2);
        assert_eq!(options.get("backend.page_size"), Some("4096"));
        let names: Vec<_> = options.iter().map(|(k, _)| k).collect();
        assert_eq!(names, vec!["backend.page_size", "path"]);
    }
}

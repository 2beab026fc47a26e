//! Store-relative destination names.
//!
//! Valid path names:
//! - Must be non-empty
//! - Must not contain NUL or a backslash
//! - Must not contain a `..` component
//! - A leading `/` is stripped; the name is always relative to the store root
//! - Components between slashes must be non-empty

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// A validated, store-relative name for a file inside a storage backend.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PathName(String);

impl PathName {
    /// Validate and normalize a name.
    ///
    /// ```
    /// use tapr_types::PathName;
    ///
    /// assert_eq!(PathName::new("/vol1.tar").unwrap().as_str(), "vol1.tar");
    /// assert!(PathName::new("").is_err());
    /// assert!(PathName::new("a/../b").is_err());
    /// ```
    pub fn new(name: impl Into<String>) -> Result<Self, TypeError> {
        let name = name.into();
        let trimmed = name.trim_start_matches('/');

        let invalid = |reason: &str| TypeError::InvalidPathName {
            name: name.clone(),
            reason: reason.into(),
        };

        if trimmed.is_empty() {
            return Err(invalid("must not be empty"));
        }
        if trimmed.contains('\0') || trimmed.contains('\\') {
            return Err(invalid("contains a forbidden character"));
        }
        for component in trimmed.split('/') {
            match component {
                "" => return Err(invalid("contains an empty component")),
                "." | ".." => return Err(invalid("contains a relative component")),
                _ => {}
            }
        }

        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Iterate over the slash-separated components.
    pub fn components(&self) -> impl Iterator<Item = &str> {
        self.0.split('/')
    }
}

impl TryFrom<String> for PathName {
    type Error = TypeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<PathName> for String {
    fn from(value: PathName) -> Self {
        value.0
    }
}

impl AsRef<str> for PathName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for PathName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PathName({:?})", self.0)
    }
}

impl fmt::Display for PathName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

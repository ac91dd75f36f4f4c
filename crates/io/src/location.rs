use std::fmt::{Display, Formatter};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Invalid location `{value}`: {reason}")]
pub struct InvalidLocationError {
    pub value: String,
    pub reason: String,
}

impl InvalidLocationError {
    #[must_use]
    pub fn new(value: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            reason: reason.into(),
        }
    }
}

/// An absolute storage location: either an absolute path (`/data/db1`) or a
/// URI with a scheme (`file:/data/db1`, `s3://bucket/db1`).
///
/// Locations are kept verbatim. Child locations are built by plain string
/// concatenation with a single `/`, never by path normalization, so
/// `Location("/a/").child("t")` is `/a//t`. Callers that want a canonical
/// form call [`Location::without_trailing_slash`] once when accepting input.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Location(String);

impl Location {
    /// Parse and validate a location.
    ///
    /// # Errors
    /// Fails if the value is empty, relative, or has a malformed scheme.
    pub fn parse(value: impl Into<String>) -> Result<Self, InvalidLocationError> {
        let value = value.into();
        if value.is_empty() {
            return Err(InvalidLocationError::new(value, "Location must not be empty"));
        }
        if value.starts_with('/') {
            return Ok(Self(value));
        }
        match url::Url::parse(&value) {
            Ok(_) => Ok(Self(value)),
            Err(e) => Err(InvalidLocationError::new(
                value,
                format!("Location must be an absolute path or a URI with a scheme ({e})"),
            )),
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Append `/segment` to this location.
    pub fn push(&mut self, segment: &str) -> &mut Self {
        self.0.push('/');
        self.0.push_str(segment);
        self
    }

    /// A copy of this location with `/segment` appended.
    #[must_use]
    pub fn child(&self, segment: &str) -> Self {
        let mut child = self.clone();
        child.push(segment);
        child
    }

    /// Strip trailing `/` without removing the root of a path or the
    /// authority of a URI, so `/` and `file:///` stay unchanged.
    pub fn without_trailing_slash(&mut self) -> &mut Self {
        let min_len = self.root_len();
        while self.0.len() > min_len && self.0.ends_with('/') {
            self.0.pop();
        }
        self
    }

    /// Length of the prefix that trailing-slash removal must keep.
    fn root_len(&self) -> usize {
        if self.0.starts_with('/') {
            return 1;
        }
        let Some((scheme, rest)) = self.0.split_once(':') else {
            return 1;
        };
        let prefix = scheme.len() + 1;
        if let Some(after_slashes) = rest.strip_prefix("//") {
            match after_slashes.find('/').unwrap_or(after_slashes.len()) {
                // `file:///` has an empty authority, its root is the third slash
                0 => prefix + 3,
                authority => prefix + 2 + authority,
            }
        } else if rest.starts_with('/') {
            prefix + 1
        } else {
            prefix
        }
    }

    /// Last `/`-separated segment.
    #[must_use]
    pub fn file_name(&self) -> &str {
        self.0.rsplit('/').next().unwrap_or_default()
    }

    /// `true` if `self` equals `parent` or lies below it.
    #[must_use]
    pub fn is_sublocation_of(&self, parent: &Location) -> bool {
        let parent = parent.0.trim_end_matches('/');
        self.0 == parent
            || self
                .0
                .strip_prefix(parent)
                .is_some_and(|rest| rest.starts_with('/'))
    }

    /// Scheme of a URI location, `None` for plain absolute paths.
    #[must_use]
    pub fn scheme(&self) -> Option<&str> {
        if self.0.starts_with('/') {
            None
        } else {
            self.0.split_once(':').map(|(scheme, _)| scheme)
        }
    }
}

impl Display for Location {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

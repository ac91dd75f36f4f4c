use std::fmt::{Display, Formatter};

use super::InvalidIdentifier;

/// Validate a single namespace or table name token.
///
/// # Errors
/// Fails with the offending token unless it matches `[A-Za-z0-9_]+`.
pub fn validate_identifier(token: &str) -> Result<(), InvalidIdentifier> {
    if lazy_regex::regex_is_match!(r"^[A-Za-z0-9_]+$", token) {
        Ok(())
    } else {
        Err(InvalidIdentifier::new(token))
    }
}

/// How validated identifiers are turned into catalog keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct IdentifierPolicy {
    pub case_sensitive: bool,
}

impl IdentifierPolicy {
    #[must_use]
    pub fn normalize(&self, token: &str) -> String {
        if self.case_sensitive {
            token.to_string()
        } else {
            token.to_lowercase()
        }
    }

    /// Validate and normalize a name.
    pub fn validated(&self, token: &str) -> Result<String, InvalidIdentifier> {
        validate_identifier(token)?;
        Ok(self.normalize(token))
    }
}

/// A table reference as supplied by a caller. The namespace is optional;
/// unqualified references resolve against the session's active namespace.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TableIdent {
    pub namespace: Option<String>,
    pub name: String,
}

impl TableIdent {
    #[must_use]
    pub fn new(namespace: Option<&str>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.map(ToString::to_string),
            name: name.into(),
        }
    }

    #[must_use]
    pub fn unqualified(name: impl Into<String>) -> Self {
        Self {
            namespace: None,
            name: name.into(),
        }
    }

    #[must_use]
    pub fn qualified(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: Some(namespace.into()),
            name: name.into(),
        }
    }

    /// Parse `table` or `namespace.table`.
    ///
    /// Only the split is checked here; the components are validated by the
    /// catalog operation that receives the identifier.
    ///
    /// # Errors
    /// Fails quoting the whole input if it has more than two parts or an
    /// empty part.
    pub fn parse(value: &str) -> Result<Self, InvalidIdentifier> {
        let parts = value.split('.').collect::<Vec<_>>();
        match parts.as_slice() {
            [name] if !name.is_empty() => Ok(Self::unqualified(*name)),
            [namespace, name] if !namespace.is_empty() && !name.is_empty() => {
                Ok(Self::qualified(*namespace, *name))
            }
            _ => Err(InvalidIdentifier::new(value)),
        }
    }
}

impl Display for TableIdent {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match &self.namespace {
            Some(namespace) => write!(f, "{namespace}.{}", self.name),
            None => write!(f, "{}", self.name),
        }
    }
}

/// A fully resolved, normalized table name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct QualifiedTableName {
    pub namespace: String,
    pub name: String,
}

impl QualifiedTableName {
    #[must_use]
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }
}

impl Display for QualifiedTableName {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.namespace, self.name)
    }
}

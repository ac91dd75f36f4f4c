use std::fmt::{Display, Formatter};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum_macros::Display)]
pub enum ErrorKind {
    NotFound,
    PermissionDenied,
    InvalidLocation,
    UnsupportedScheme,
    Unexpected,
}

impl From<std::io::ErrorKind> for ErrorKind {
    fn from(kind: std::io::ErrorKind) -> Self {
        match kind {
            std::io::ErrorKind::NotFound => ErrorKind::NotFound,
            std::io::ErrorKind::PermissionDenied => ErrorKind::PermissionDenied,
            _ => ErrorKind::Unexpected,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub struct IOError {
    kind: ErrorKind,
    message: String,
    location: String,
    #[source]
    source: Option<Box<dyn std::error::Error + Send + Sync + 'static>>,
}

impl IOError {
    #[must_use]
    pub fn new(kind: ErrorKind, message: impl Into<String>, location: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            location: location.into(),
            source: None,
        }
    }

    pub(crate) fn from_std(
        err: std::io::Error,
        operation: &str,
        location: impl Into<String>,
    ) -> Self {
        Self::new(err.kind().into(), format!("Failed to {operation}"), location).set_source(err)
    }

    #[must_use]
    pub fn set_source(mut self, source: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }
}

impl Display for IOError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({}): {}", self.message, self.kind, self.location)?;
        if let Some(source) = &self.source {
            write!(f, ": {source}")?;
        }
        Ok(())
    }
}

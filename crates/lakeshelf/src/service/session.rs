use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// State owned by a single caller of the catalog.
///
/// Sessions are created by [`crate::Catalog::new_session`] and switched with
/// [`crate::Catalog::use_namespace`]. The active namespace is read at call
/// time by every operation receiving an unqualified name.
#[derive(Debug, Clone)]
pub struct Session {
    session_id: Uuid,
    active_namespace: String,
    cancellation_token: CancellationToken,
}

impl Session {
    pub(crate) fn new(active_namespace: String) -> Self {
        Self {
            session_id: Uuid::now_v7(),
            active_namespace,
            cancellation_token: CancellationToken::new(),
        }
    }

    /// Replace the token that cancels storage calls issued on behalf of this session.
    #[must_use]
    pub fn with_cancellation_token(mut self, cancellation_token: CancellationToken) -> Self {
        self.cancellation_token = cancellation_token;
        self
    }

    #[must_use]
    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    #[must_use]
    pub fn active_namespace(&self) -> &str {
        &self.active_namespace
    }

    #[must_use]
    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancellation_token
    }

    pub(crate) fn set_active_namespace(&mut self, namespace: String) {
        tracing::debug!(
            session_id = %self.session_id,
            from = %self.active_namespace,
            to = %namespace,
            "Switching active namespace"
        );
        self.active_namespace = namespace;
    }

    /// The single resolution rule for namespace references: an explicit
    /// namespace wins, otherwise the active namespace at call time.
    #[must_use]
    pub fn resolve_namespace<'a>(&'a self, explicit: Option<&'a str>) -> &'a str {
        explicit.unwrap_or(&self.active_namespace)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_namespace() {
        let mut session = Session::new("default".to_string());
        assert_eq!(session.resolve_namespace(None), "default");
        assert_eq!(session.resolve_namespace(Some("db1")), "db1");

        session.set_active_namespace("db2".to_string());
        assert_eq!(session.resolve_namespace(None), "db2");
        assert_eq!(session.resolve_namespace(Some("db1")), "db1");
    }

    #[test]
    fn test_sessions_are_independent() {
        let mut first = Session::new("default".to_string());
        let second = Session::new("default".to_string());
        first.set_active_namespace("db1".to_string());
        assert_eq!(second.active_namespace(), "default");
        assert_ne!(first.session_id(), second.session_id());
    }

    #[test]
    fn test_custom_cancellation_token() {
        let token = CancellationToken::new();
        let session = Session::new("default".to_string()).with_cancellation_token(token.clone());
        token.cancel();
        assert!(session.cancellation_token().is_cancelled());
    }
}

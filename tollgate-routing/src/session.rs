//! Named connection registry and request-scoped routing sessions.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;

use tracing::{debug, error};

use tollgate_core::constants::{PRIMARY_BIND, REPLICA_BIND};
use tollgate_core::error::{GuardError, Result};

/// Pending-routing state of a [`RoutingSession`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BindState {
    /// The next resolution uses the default bind
    Default,
    /// The next resolution uses the named bind, then reverts to `Default`
    Pending(String),
}

/// Process-wide named connections.
///
/// `C` is whatever a connection handle is for the caller, typically an
/// `Arc<dyn AuthoritativeStore>` over a pooled database connection.
#[derive(Clone)]
pub struct Binds<C> {
    connections: HashMap<String, C>,
    default_bind: String,
}

impl<C: Clone> Binds<C> {
    /// Creates a registry whose default bind is `primary`.
    pub fn new(primary: C) -> Self {
        let mut connections = HashMap::new();
        connections.insert(PRIMARY_BIND.to_string(), primary);
        Self {
            connections,
            default_bind: PRIMARY_BIND.to_string(),
        }
    }

    /// Adds (or replaces) the connection for `name`.
    pub fn with_bind(mut self, name: impl Into<String>, connection: C) -> Self {
        self.connections.insert(name.into(), connection);
        self
    }

    /// Adds the read replica.
    pub fn with_replica(self, connection: C) -> Self {
        self.with_bind(REPLICA_BIND, connection)
    }

    /// Name of the default bind.
    pub fn default_bind(&self) -> &str {
        &self.default_bind
    }

    /// Returns true if `name` has a connection.
    pub fn contains(&self, name: &str) -> bool {
        self.connections.contains_key(name)
    }

    /// Returns the connection for `name`.
    ///
    /// An unconfigured name is a fatal configuration error.
    pub fn get(&self, name: &str) -> Result<C> {
        self.connections.get(name).cloned().ok_or_else(|| {
            error!(bind = name, "No connection configured for bind");
            GuardError::UnknownBind(name.to_string())
        })
    }

    /// Starts a request-scoped session in the `Default` state.
    pub fn session(&self) -> RoutingSession<'_, C> {
        RoutingSession {
            binds: self,
            state: BindState::Default,
        }
    }

    /// Runs `query` against the connection for `name`.
    pub async fn run_on_bind<F, Fut, T>(&self, name: &str, query: F) -> Result<T>
    where
        F: FnOnce(C) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let connection = self.session().using_bind(name).resolve()?;
        query(connection).await
    }

    /// Runs `query` against the read replica.
    pub async fn with_read_replica<F, Fut, T>(&self, query: F) -> Result<T>
    where
        F: FnOnce(C) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        self.run_on_bind(REPLICA_BIND, query).await
    }
}

impl<C> fmt::Debug for Binds<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<_> = self.connections.keys().collect();
        names.sort();
        f.debug_struct("Binds")
            .field("default_bind", &self.default_bind)
            .field("binds", &names)
            .finish()
    }
}

/// Request-scoped routing over a [`Binds`] registry.
///
/// `using_bind` marks only the very next [`RoutingSession::resolve`]. The
/// marker is consumed whether or not that resolution succeeds, so a replica
/// marker can never leak onto a later write.
pub struct RoutingSession<'a, C> {
    binds: &'a Binds<C>,
    state: BindState,
}

impl<'a, C: Clone> RoutingSession<'a, C> {
    /// Routes the next resolution to `name`.
    pub fn using_bind(&mut self, name: impl Into<String>) -> &mut Self {
        self.state = BindState::Pending(name.into());
        self
    }

    /// Current routing state.
    pub fn state(&self) -> &BindState {
        &self.state
    }

    /// Bind the next resolution would use, without consuming the marker.
    pub fn bind_name(&self) -> &str {
        match &self.state {
            BindState::Default => self.binds.default_bind(),
            BindState::Pending(name) => name.as_str(),
        }
    }

    /// Resolves the connection for this query and resets to `Default`.
    pub fn resolve(&mut self) -> Result<C> {
        match std::mem::replace(&mut self.state, BindState::Default) {
            BindState::Default => self.binds.get(self.binds.default_bind()),
            BindState::Pending(name) => {
                debug!(bind = %name, "Routing query to alternate bind");
                self.binds.get(&name)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn binds() -> Binds<&'static str> {
        Binds::new("primary-conn")
            .with_replica("replica-conn")
            .with_bind("reporting", "reporting-conn")
    }

    #[test]
    fn test_default_resolution() {
        let binds = binds();
        let mut session = binds.session();
        assert_eq!(session.state(), &BindState::Default);
        assert_eq!(session.resolve().unwrap(), "primary-conn");
        assert_eq!(session.resolve().unwrap(), "primary-conn");
    }

    #[test]
    fn test_using_bind_affects_exactly_one_query() {
        let binds = binds();
        let mut session = binds.session();

        session.using_bind(REPLICA_BIND);
        assert_eq!(session.state(), &BindState::Pending("replica".into()));
        assert_eq!(session.bind_name(), "replica");

        assert_eq!(session.resolve().unwrap(), "replica-conn");
        assert_eq!(session.state(), &BindState::Default);
        assert_eq!(session.resolve().unwrap(), "primary-conn");
    }

    #[test]
    fn test_chained_using_bind() {
        let binds = binds();
        let mut session = binds.session();
        assert_eq!(session.using_bind("reporting").resolve().unwrap(), "reporting-conn");
        assert_eq!(session.resolve().unwrap(), "primary-conn");
    }

    #[test]
    fn test_last_marker_wins() {
        let binds = binds();
        let mut session = binds.session();
        session.using_bind("reporting").using_bind(REPLICA_BIND);
        assert_eq!(session.resolve().unwrap(), "replica-conn");
    }

    #[test]
    fn test_unknown_bind_is_fatal_and_still_consumed() {
        let binds = binds();
        let mut session = binds.session();

        let err = session.using_bind("analytics").resolve().unwrap_err();
        assert!(matches!(err, GuardError::UnknownBind(ref name) if name == "analytics"));
        assert!(err.is_config_error());
        assert!(!err.is_recoverable());

        // The failed marker does not stick
        assert_eq!(session.state(), &BindState::Default);
        assert_eq!(session.resolve().unwrap(), "primary-conn");
    }

    #[test]
    fn test_sessions_are_independent() {
        let binds = binds();
        let mut a = binds.session();
        let mut b = binds.session();

        a.using_bind(REPLICA_BIND);
        assert_eq!(b.resolve().unwrap(), "primary-conn");
        assert_eq!(a.resolve().unwrap(), "replica-conn");
    }

    #[test]
    fn test_debug_lists_bind_names() {
        let rendered = format!("{:?}", binds());
        assert!(rendered.contains("primary"));
        assert!(rendered.contains("replica"));
        assert!(!rendered.contains("replica-conn"));
    }

    #[tokio::test]
    async fn test_with_read_replica() {
        let binds = binds();
        let used = binds
            .with_read_replica(|conn| async move { Ok(conn) })
            .await
            .unwrap();
        assert_eq!(used, "replica-conn");
    }

    #[tokio::test]
    async fn test_run_on_named_bind() {
        let binds = binds();
        let used = binds
            .run_on_bind("reporting", |conn| async move { Ok(conn) })
            .await
            .unwrap();
        assert_eq!(used, "reporting-conn");

        let missing = binds.run_on_bind("analytics", |conn| async move { Ok(conn) }).await;
        assert!(matches!(missing, Err(GuardError::UnknownBind(ref name)) if name == "analytics"));
    }

    #[tokio::test]
    async fn test_with_read_replica_without_replica() {
        let binds = Binds::new("primary-conn");
        let result = binds.with_read_replica(|conn| async move { Ok(conn) }).await;
        assert!(matches!(result, Err(GuardError::UnknownBind(_))));
    }
}

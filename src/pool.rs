//! A fixed set of sessions loaned out one at a time.

use crate::backend::DatabaseBackend;
use crate::error::{QueryError, Result};
use crate::schema::SchemaRegistry;
use crate::session::Session;
use parking_lot::RwLock;
use std::collections::VecDeque;
use std::sync::{Arc, Weak};
use tracing::{debug, warn};

/// Idle sessions sharing one schema registry.
pub struct SessionPool<B: DatabaseBackend> {
    idle: RwLock<VecDeque<Session<B>>>,
    registry: Arc<SchemaRegistry>,
}

impl<B: DatabaseBackend> SessionPool<B> {
    /// Open `size` connections to `url`.
    pub async fn create(size: usize, url: &str) -> Result<Arc<Self>> {
        Self::create_with_registry(size, url, Arc::new(SchemaRegistry::new())).await
    }

    pub async fn create_with_registry(
        size: usize,
        url: &str,
        registry: Arc<SchemaRegistry>,
    ) -> Result<Arc<Self>> {
        let mut idle = VecDeque::with_capacity(size);
        for _ in 0..size {
            let backend = B::connect(url).await.map_err(|err| {
                warn!(error = %err, "pool connection failed");
                err
            })?;
            idle.push_back(Session::with_registry(backend, Arc::clone(&registry)));
        }

        debug!(size, "session pool created");

        Ok(Arc::new(Self {
            idle: RwLock::new(idle),
            registry,
        }))
    }

    pub fn registry(&self) -> &Arc<SchemaRegistry> {
        &self.registry
    }

    /// Loan the first idle session, or an empty one when none is idle.
    pub fn get_session(self: &Arc<Self>) -> PooledSession<B> {
        let session = self.idle.write().pop_front();
        if session.is_none() {
            debug!("session pool exhausted");
        }

        PooledSession {
            pool: Arc::downgrade(self),
            session,
        }
    }

    fn release_session(&self, session: Session<B>) {
        self.idle.write().push_back(session);
    }

    /// Number of idle sessions.
    pub fn size(&self) -> usize {
        self.idle.read().len()
    }
}

/// A session on loan from a [`SessionPool`].
///
/// Dropping it hands a still-connected session back to the pool, provided
/// the pool is alive. A session cloned out of the loan is never returned:
/// the clone keeps the connection and the pool shrinks by one.
pub struct PooledSession<B: DatabaseBackend> {
    pool: Weak<SessionPool<B>>,
    session: Option<Session<B>>,
}

impl<B: DatabaseBackend> PooledSession<B> {
    /// An empty placeholder that holds no connection.
    pub fn empty() -> Self {
        Self {
            pool: Weak::new(),
            session: None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.session.is_none()
    }

    pub async fn is_connected(&self) -> bool {
        match &self.session {
            Some(session) => session.is_connected().await,
            None => false,
        }
    }

    pub fn session(&self) -> Result<&Session<B>> {
        self.session
            .as_ref()
            .ok_or_else(|| QueryError::Connection("no idle session in pool".to_string()))
    }
}

impl<B: DatabaseBackend> Drop for PooledSession<B> {
    fn drop(&mut self) {
        let Some(session) = self.session.take() else {
            return;
        };

        match self.pool.upgrade() {
            None => debug!("pool gone, closing session"),
            Some(_) if !session.is_sole_owner() => {
                warn!("loaned session still cloned, not returned to pool")
            }
            Some(pool) if session.try_is_connected() => pool.release_session(session),
            Some(_) => debug!("discarding disconnected session"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::tests::MockBackend;

    #[tokio::test]
    async fn test_loan_and_return() {
        let pool = SessionPool::<MockBackend>::create(2, "mock://db").await.unwrap();
        assert_eq!(pool.size(), 2);

        let first = pool.get_session();
        let second = pool.get_session();
        assert_eq!(pool.size(), 0);
        assert!(first.is_connected().await);

        let third = pool.get_session();
        assert!(third.is_empty());
        assert!(!third.is_connected().await);
        assert!(third.session().is_err());

        drop(first);
        assert_eq!(pool.size(), 1);
        drop(second);
        drop(third);
        assert_eq!(pool.size(), 2);
    }

    #[tokio::test]
    async fn test_disconnected_session_not_returned() {
        let pool = SessionPool::<MockBackend>::create(1, "mock://db").await.unwrap();

        let loaned = pool.get_session();
        loaned.session().unwrap().backend().write().await.connected = false;
        drop(loaned);

        assert_eq!(pool.size(), 0);
    }

    #[tokio::test]
    async fn test_cloned_session_not_returned() {
        let pool = SessionPool::<MockBackend>::create(1, "mock://db").await.unwrap();

        let loaned = pool.get_session();
        let kept = loaned.session().unwrap().clone();
        drop(loaned);

        assert_eq!(pool.size(), 0);
        assert!(pool.get_session().is_empty());
        assert!(kept.is_connected().await);
    }

    #[tokio::test]
    async fn test_outlives_pool() {
        let pool = SessionPool::<MockBackend>::create(1, "mock://db").await.unwrap();
        let loaned = pool.get_session();
        drop(pool);
        assert!(loaned.is_connected().await);
        drop(loaned);
    }

    #[tokio::test]
    async fn test_create_fails_on_bad_url() {
        let result = SessionPool::<MockBackend>::create(3, "bogus://db").await;
        assert!(matches!(result, Err(QueryError::Connection(_))));
    }

    #[tokio::test]
    async fn test_sessions_share_registry() {
        let pool = SessionPool::<MockBackend>::create(2, "mock://db").await.unwrap();
        let a = pool.get_session();
        let b = pool.get_session();
        assert!(Arc::ptr_eq(
            a.session().unwrap().registry(),
            b.session().unwrap().registry()
        ));
        assert!(Arc::ptr_eq(a.session().unwrap().registry(), pool.registry()));
    }
}

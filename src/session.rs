use crate::backend::{DatabaseBackend, QueryResult};
use crate::ddl;
use crate::dml;
use crate::dql::QueryFrom;
use crate::error::Result;
use crate::expr::Expr;
use crate::meta::Persistent;
use crate::schema::SchemaRegistry;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, instrument, warn};

/// A database connection paired with the constraint registry used to
/// define its tables.
pub struct Session<B: DatabaseBackend> {
    backend: Arc<RwLock<B>>,
    registry: Arc<SchemaRegistry>,
}

impl<B: DatabaseBackend> Session<B> {
    /// Wrap a connected backend with a fresh registry
    pub fn new(backend: B) -> Self {
        Self::with_registry(backend, Arc::new(SchemaRegistry::new()))
    }

    /// Wrap a connected backend, sharing `registry` with other sessions
    pub fn with_registry(backend: B, registry: Arc<SchemaRegistry>) -> Self {
        Self {
            backend: Arc::new(RwLock::new(backend)),
            registry,
        }
    }

    /// Open a connection to `url`
    #[instrument(level = "debug")]
    pub async fn connect(url: &str) -> Result<Self> {
        match B::connect(url).await {
            Ok(backend) => Ok(Self::new(backend)),
            Err(err) => {
                warn!(error = %err, "connection failed");
                Err(err)
            }
        }
    }

    /// Open a connection to `url`, handing the failure message to `on_error`
    /// instead of returning it.
    pub async fn connect_or_report<F>(url: &str, on_error: F) -> Option<Self>
    where
        F: FnOnce(&str),
    {
        match Self::connect(url).await {
            Ok(session) => Some(session),
            Err(err) => {
                on_error(&err.to_string());
                None
            }
        }
    }

    pub fn registry(&self) -> &Arc<SchemaRegistry> {
        &self.registry
    }

    pub fn backend(&self) -> &Arc<RwLock<B>> {
        &self.backend
    }

    /// Register configuration assignments for `T`
    pub fn configure<T: Persistent>(&self, exprs: &[Expr<T>]) -> Result<()> {
        self.registry.configure(exprs)
    }

    /// Create the table of `T` with its registered constraints
    #[instrument(level = "debug", skip(self), fields(table = T::descriptor().table_name()))]
    pub async fn create_table<T: Persistent>(&self) -> Result<()> {
        let mut backend = self.backend.write().await;
        let sql = self
            .registry
            .create_table_sql_with::<T, _>(|kind| backend.column_type(kind))?;
        backend.execute(&sql).await?;
        info!(sql = %sql, "table created");
        Ok(())
    }

    /// Register `exprs` and create the table of `T`
    pub async fn create_table_with<T: Persistent>(&self, exprs: &[Expr<T>]) -> Result<()> {
        self.configure(exprs)?;
        self.create_table::<T>().await
    }

    #[instrument(level = "debug", skip(self), fields(table = T::descriptor().table_name()))]
    pub async fn drop_table<T: Persistent>(&self) -> Result<()> {
        let sql = ddl::drop_table::<T>();
        self.backend.write().await.execute(&sql).await?;
        info!("table dropped");
        Ok(())
    }

    /// Insert `object` as one row
    #[instrument(level = "debug", skip_all, fields(table = T::descriptor().table_name()))]
    pub async fn persist<T: Persistent>(&self, object: &T) -> Result<u64> {
        let mut backend = self.backend.write().await;
        let statement = dml::insert(object, |index, kind| backend.placeholder(index, kind));
        backend.execute_with(&statement.sql, &statement.params).await
    }

    /// Insert each object with its own statement, in order. Stops at the
    /// first failure; rows already inserted stay.
    pub async fn persist_all<'a, T, I>(&self, objects: I) -> Result<u64>
    where
        T: Persistent + 'a,
        I: IntoIterator<Item = &'a T>,
    {
        let mut affected = 0;
        for object in objects {
            affected += self.persist(object).await?;
        }
        Ok(affected)
    }

    /// Every object matching `query`
    #[instrument(level = "debug", skip_all, fields(table = T::descriptor().table_name()))]
    pub async fn objects<T>(&self, query: &QueryFrom<T>) -> Result<Vec<T>>
    where
        T: Persistent + Default,
    {
        let sql = query.build()?;
        let rows = self.backend.write().await.query(&sql).await?;
        debug!(rows = rows.len(), "fetched");

        let descriptor = T::descriptor();
        rows.iter().map(|row| descriptor.from_row(row)).collect()
    }

    /// First object matching `query`. Without an explicit limit the query is
    /// restricted to one row.
    pub async fn object<T>(&self, query: &QueryFrom<T>) -> Result<Option<T>>
    where
        T: Persistent + Default,
    {
        let objects = if query.has_limit() {
            self.objects(query).await?
        } else {
            self.objects(&query.clone().limit(1)).await?
        };
        Ok(objects.into_iter().next())
    }

    /// Number of rows matching `query`
    #[instrument(level = "debug", skip_all, fields(table = T::descriptor().table_name()))]
    pub async fn count<T: Persistent>(&self, query: &QueryFrom<T>) -> Result<i64> {
        let sql = query.build_count()?;
        self.backend.write().await.query_scalar(&sql).await
    }

    /// Execute raw SQL
    pub async fn execute(&self, sql: &str) -> Result<u64> {
        self.backend.write().await.execute(sql).await
    }

    /// Query with raw SQL
    pub async fn query(&self, sql: &str) -> Result<QueryResult> {
        self.backend.write().await.query(sql).await
    }

    /// Check if connected
    pub async fn is_connected(&self) -> bool {
        self.backend.read().await.is_connected()
    }

    /// Whether no clone of this session shares its backend.
    pub(crate) fn is_sole_owner(&self) -> bool {
        Arc::strong_count(&self.backend) == 1
    }

    /// Non-blocking connection check; false while the backend is locked.
    pub(crate) fn try_is_connected(&self) -> bool {
        self.backend
            .try_read()
            .map(|backend| backend.is_connected())
            .unwrap_or(false)
    }
}

impl<B: DatabaseBackend> Clone for Session<B> {
    fn clone(&self) -> Self {
        Self {
            backend: Arc::clone(&self.backend),
            registry: Arc::clone(&self.registry),
        }
    }
}

impl<B: DatabaseBackend> std::fmt::Debug for Session<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("registry", &self.registry)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::backend::QueryRow;
    use crate::dql::query_from;
    use crate::error::QueryError;
    use crate::expr::{not_null, primary_key};
    use async_trait::async_trait;
    use serde_json::Value;

    /// Records statements and answers queries with canned rows.
    pub(crate) struct MockBackend {
        pub executed: Vec<(String, Vec<Value>)>,
        pub rows: QueryResult,
        pub connected: bool,
    }

    impl MockBackend {
        pub(crate) fn new() -> Self {
            Self {
                executed: Vec::new(),
                rows: Vec::new(),
                connected: true,
            }
        }
    }

    #[async_trait]
    impl DatabaseBackend for MockBackend {
        async fn connect(url: &str) -> Result<Self> {
            if url.starts_with("mock://") {
                Ok(Self::new())
            } else {
                Err(QueryError::Connection(format!("unsupported url: {}", url)))
            }
        }

        async fn execute(&mut self, sql: &str) -> Result<u64> {
            self.executed.push((sql.to_string(), Vec::new()));
            Ok(1)
        }

        async fn execute_with(&mut self, sql: &str, params: &[Value]) -> Result<u64> {
            self.executed.push((sql.to_string(), params.to_vec()));
            Ok(1)
        }

        async fn query(&mut self, sql: &str) -> Result<QueryResult> {
            self.executed.push((sql.to_string(), Vec::new()));
            Ok(self.rows.clone())
        }

        fn is_connected(&self) -> bool {
            self.connected
        }

        async fn close(self) -> Result<()> {
            Ok(())
        }
    }

    #[derive(Debug, Default, PartialEq)]
    struct Person {
        id: i32,
        name: String,
    }

    crate::declare_persistent!(Person => PersonFields { id, name });

    fn person_row(id: i64) -> QueryRow {
        let mut row = QueryRow::new();
        row.insert("id".to_string(), Value::from(id));
        row.insert("name".to_string(), Value::from(format!("name {}", id)));
        row
    }

    async fn executed(session: &Session<MockBackend>) -> Vec<String> {
        session
            .backend()
            .read()
            .await
            .executed
            .iter()
            .map(|(sql, _)| sql.clone())
            .collect()
    }

    #[tokio::test]
    async fn test_create_table_uses_registry() {
        let session = Session::new(MockBackend::new());
        let f = Person::fields();

        session
            .create_table_with(&[f.id.assign(primary_key()), f.name.assign(not_null())])
            .await
            .unwrap();
        session.create_table::<Person>().await.unwrap();

        let statements = executed(&session).await;
        assert_eq!(statements.len(), 2);
        assert_eq!(statements[0], statements[1]);
        assert_eq!(
            statements[0],
            "CREATE TABLE IF NOT EXISTS Person (id INTEGER, name VARCHAR NOT NULL, PRIMARY KEY (id))"
        );
    }

    #[tokio::test]
    async fn test_persist_binds_values() {
        let session = Session::new(MockBackend::new());
        let people = vec![
            Person { id: 1, name: "a".to_string() },
            Person { id: 2, name: String::new() },
        ];

        assert_eq!(session.persist_all(&people).await.unwrap(), 2);

        let backend = session.backend().read().await;
        assert_eq!(backend.executed.len(), 2);
        assert_eq!(backend.executed[0].0, "INSERT INTO Person (id, name) VALUES (?, ?)");
        assert_eq!(backend.executed[0].1, vec![Value::from(1), Value::from("a")]);
        assert_eq!(backend.executed[1].1, vec![Value::from(2), Value::Null]);
    }

    #[tokio::test]
    async fn test_objects_and_object() {
        let session = Session::new(MockBackend::new());
        session.backend().write().await.rows = vec![person_row(3), person_row(4)];

        let f = Person::fields();
        let query = query_from::<Person>().where_clause(f.id.gt(2));

        let people = session.objects(&query).await.unwrap();
        assert_eq!(people.len(), 2);
        assert_eq!(people[1], Person { id: 4, name: "name 4".to_string() });

        let first = query.object(&session).await.unwrap();
        assert_eq!(first.map(|p| p.id), Some(3));

        let statements = executed(&session).await;
        assert_eq!(
            statements[1],
            "SELECT id, name FROM Person WHERE id > 2 LIMIT 1"
        );
    }

    #[tokio::test]
    async fn test_object_on_empty_result() {
        let session = Session::new(MockBackend::new());
        let found = session.object(&query_from::<Person>()).await.unwrap();
        assert!(found.is_none());
    }

    #[tokio::test]
    async fn test_invalid_query_emits_nothing() {
        let session = Session::new(MockBackend::new());
        let f = Person::fields();
        let query = query_from::<Person>().where_clause(f.id.assign(not_null()));

        assert!(session.objects(&query).await.is_err());
        assert!(executed(&session).await.is_empty());
    }

    #[tokio::test]
    async fn test_connect_or_report() {
        let mut reported = None;
        let session =
            Session::<MockBackend>::connect_or_report("bogus://nowhere", |msg| {
                reported = Some(msg.to_string())
            })
            .await;

        assert!(session.is_none());
        assert!(reported.unwrap().contains("unsupported url"));

        let session = Session::<MockBackend>::connect("mock://db").await.unwrap();
        assert!(session.is_connected().await);
    }
}

//! The entity store: save / load / list / remove / native over a pool.
//!
//! Each pooled operation takes one connection from the pool and returns it
//! when done. The `*_in` variants run on any [`GenericClient`] instead, which
//! is how operations join a transaction.

use crate::builder::{self, Statement, truncate_sql};
use crate::client::GenericClient;
use crate::codec::Codec;
use crate::compile::BuildContext;
use crate::config::StoreConfig;
use crate::entity::{Entity, EntityName};
use crate::error::{StoreError, StoreResult};
use crate::pool::create_pool_from;
use crate::query::{NativeQuery, Query};
use crate::reconnect::Backoff;
use crate::value::{Fields, Value, row_fields};
use deadpool_postgres::Pool;
use tokio_postgres::Row;
use uuid::Uuid;

/// Entity persistence over a PostgreSQL connection pool.
#[derive(Clone)]
pub struct Store {
    pool: Pool,
    config: StoreConfig,
    cx: BuildContext,
    codec: Codec,
    backoff: Backoff,
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store")
            .field("pool", &self.pool.status())
            .field("cx", &self.cx)
            .field("codec", &self.codec)
            .field("backoff", &self.backoff)
            .finish()
    }
}

impl Store {
    /// Wrap an existing pool.
    pub fn new(pool: Pool, config: StoreConfig) -> Self {
        let cx = config.build_context();
        let codec = config.codec();
        let backoff = config.backoff();
        Self {
            pool,
            config,
            cx,
            codec,
            backoff,
        }
    }

    /// Build the pool from `config` and wrap it.
    pub fn connect(config: StoreConfig) -> StoreResult<Self> {
        let pool = create_pool_from(&config)?;
        Ok(Self::new(pool, config))
    }

    pub fn pool(&self) -> &Pool {
        &self.pool
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    pub fn context(&self) -> &BuildContext {
        &self.cx
    }

    /// Close the pool. Pooled operations fail afterwards.
    pub fn close(&self) {
        tracing::info!(target: "pgentity.store", "closing connection pool");
        self.pool.close();
    }

    async fn connection(&self) -> StoreResult<deadpool_postgres::Client> {
        let pool = &self.pool;
        self.backoff
            .retry(|| async move { pool.get().await.map_err(StoreError::from) })
            .await
    }

    // ===== pooled operations =====

    /// Insert or update an entity and return it as stored.
    pub async fn save(&self, entity: Entity, query: &Query) -> StoreResult<Entity> {
        let conn = self.connection().await?;
        self.save_in(&conn, entity, query).await
    }

    /// Load the first entity matching `query`.
    pub async fn load(&self, name: &EntityName, query: &Query) -> StoreResult<Option<Entity>> {
        let conn = self.connection().await?;
        self.load_in(&conn, name, query).await
    }

    /// List the entities matching `query`.
    pub async fn list(&self, name: &EntityName, query: &Query) -> StoreResult<Vec<Entity>> {
        let conn = self.connection().await?;
        self.list_in(&conn, name, query).await
    }

    /// Remove one entity (or every match with `all$`).
    ///
    /// Returns the removed entity when `load$` is set and a single row was
    /// removed.
    pub async fn remove(&self, name: &EntityName, query: &Query) -> StoreResult<Option<Entity>> {
        let conn = self.connection().await?;
        self.remove_in(&conn, name, query).await
    }

    /// Run raw SQL and return the rows keyed by column name.
    pub async fn native(&self, native: &NativeQuery) -> StoreResult<Vec<Fields>> {
        let conn = self.connection().await?;
        self.native_in(&conn, native).await
    }

    // ===== client operations =====

    pub async fn save_in(
        &self,
        conn: &impl GenericClient,
        entity: Entity,
        query: &Query,
    ) -> StoreResult<Entity> {
        let name = entity.name().clone();
        let table = entity.table_name();
        let mut row = self.codec.entity_to_row(&entity)?;

        // An entity that already has an id is always updated by id.
        if let (Some(targets), None) = (query.upsert_fields(), entity.id()) {
            if !query.auto_increment {
                row.insert("id".to_string(), new_id(&entity));
            }
            return self.upsert_row(conn, &name, &table, &row, targets).await;
        }

        let Some(id) = entity.id().cloned() else {
            if !query.auto_increment {
                row.insert("id".to_string(), new_id(&entity));
            }
            let stmt = builder::insert(&self.cx, &table, &row);
            let saved = self.first_entity(conn, &name, &stmt).await?;
            tracing::debug!(target: "pgentity.store", table = %table, "inserted entity");
            return saved.ok_or_else(|| StoreError::Other(format!("insert into {table} returned no row")));
        };

        let hints = &self.codec.hint_column;
        let stmt = if !query.merge {
            let columns = self.table_columns(conn, &table).await?;
            builder::fill_missing(&mut row, &columns, self.cx.mapper.as_ref());
            builder::update(&self.cx, &table, &row, &id)
        } else if row.contains_key(hints) {
            builder::update_merging_hints(&self.cx, &table, &row, &id, hints)
        } else {
            builder::update(&self.cx, &table, &row, &id)
        };
        if let Some(updated) = self.first_entity(conn, &name, &stmt).await? {
            tracing::debug!(target: "pgentity.store", table = %table, "updated entity");
            return Ok(updated);
        }

        tracing::debug!(
            target: "pgentity.store",
            table = %table,
            "update matched no row, inserting"
        );
        row.insert("id".to_string(), id);
        let stmt = builder::insert(&self.cx, &table, &row);
        self.first_entity(conn, &name, &stmt)
            .await?
            .ok_or_else(|| StoreError::Other(format!("insert into {table} returned no row")))
    }

    async fn upsert_row(
        &self,
        conn: &impl GenericClient,
        name: &EntityName,
        table: &str,
        row: &Fields,
        targets: &[String],
    ) -> StoreResult<Entity> {
        let stmt = builder::upsert(&self.cx, table, row, targets);
        if let Some(saved) = self.first_entity(conn, name, &stmt).await? {
            return Ok(saved);
        }

        // DO NOTHING fired: the conflicting row is the stored one.
        let existing = targets.iter().fold(Query::new(), |q, target| {
            q.eq(target.clone(), row.get(target).cloned().unwrap_or(Value::Null))
        });
        let stmt = builder::select_one(&self.cx, table, &existing)?;
        self.first_entity(conn, name, &stmt)
            .await?
            .ok_or_else(|| StoreError::Other(format!("upsert into {table} returned no row")))
    }

    pub async fn load_in(
        &self,
        conn: &impl GenericClient,
        name: &EntityName,
        query: &Query,
    ) -> StoreResult<Option<Entity>> {
        let stmt = match &query.native {
            Some(native) => builder::native(&self.cx, native)?,
            None => builder::select_one(&self.cx, &name.table_name(), query)?,
        };
        self.first_entity(conn, name, &stmt).await
    }

    pub async fn list_in(
        &self,
        conn: &impl GenericClient,
        name: &EntityName,
        query: &Query,
    ) -> StoreResult<Vec<Entity>> {
        let stmt = match &query.native {
            Some(native) => builder::native(&self.cx, native)?,
            None => builder::select(&self.cx, &name.table_name(), query)?,
        };
        let rows = self.fetch(conn, &stmt).await?;
        rows.iter().map(|row| self.to_entity(name, row)).collect()
    }

    pub async fn remove_in(
        &self,
        conn: &impl GenericClient,
        name: &EntityName,
        query: &Query,
    ) -> StoreResult<Option<Entity>> {
        let table = name.table_name();

        if let Some(native) = &query.native {
            let stmt = builder::native(&self.cx, native)?;
            let count = self.execute(conn, &stmt).await?;
            tracing::debug!(target: "pgentity.store", table = %table, count, "native remove");
            return Ok(None);
        }

        if query.all {
            let stmt = builder::delete_all(&self.cx, &table, query)?;
            let count = self.execute(conn, &stmt).await?;
            tracing::debug!(target: "pgentity.store", table = %table, count, "removed entities");
            return Ok(None);
        }

        let stmt = builder::select_ids(&self.cx, &table, query, Some(1))?;
        let ids = self
            .fetch(conn, &stmt)
            .await?
            .iter()
            .map(|row| {
                row.try_get::<_, Value>(0)
                    .map_err(|e| StoreError::decode("id", e.to_string()))
            })
            .collect::<StoreResult<Vec<_>>>()?;
        if ids.is_empty() {
            return Ok(None);
        }

        let stmt = builder::delete_by_ids(&self.cx, &table, &ids);
        let removed = self.first_entity(conn, name, &stmt).await?;
        tracing::debug!(
            target: "pgentity.store",
            table = %table,
            found = removed.is_some(),
            "removed entity"
        );
        Ok(if query.load { removed } else { None })
    }

    pub async fn native_in(
        &self,
        conn: &impl GenericClient,
        native: &NativeQuery,
    ) -> StoreResult<Vec<Fields>> {
        let stmt = builder::native(&self.cx, native)?;
        self.fetch(conn, &stmt).await?.iter().map(row_fields).collect()
    }

    // ===== helpers =====

    async fn table_columns(&self, conn: &impl GenericClient, table: &str) -> StoreResult<Vec<String>> {
        let stmt = builder::table_columns(&self.cx, table);
        self.fetch(conn, &stmt)
            .await?
            .iter()
            .map(|row| {
                row.try_get::<_, String>(0)
                    .map_err(|e| StoreError::decode("column_name", e.to_string()))
            })
            .collect()
    }

    async fn first_entity(
        &self,
        conn: &impl GenericClient,
        name: &EntityName,
        stmt: &Statement,
    ) -> StoreResult<Option<Entity>> {
        let rows = self.fetch(conn, stmt).await?;
        rows.first().map(|row| self.to_entity(name, row)).transpose()
    }

    fn to_entity(&self, name: &EntityName, row: &Row) -> StoreResult<Entity> {
        let fields = row_fields(row)?;
        self.codec
            .row_to_entity(name, fields, self.cx.mapper.as_ref())
    }

    async fn fetch(&self, conn: &impl GenericClient, stmt: &Statement) -> StoreResult<Vec<Row>> {
        self.log_statement(stmt);
        let result = self.with_timeout(stmt.fetch_all(conn)).await;
        self.log_failure(stmt, &result);
        result
    }

    async fn execute(&self, conn: &impl GenericClient, stmt: &Statement) -> StoreResult<u64> {
        self.log_statement(stmt);
        let result = self.with_timeout(stmt.execute(conn)).await;
        self.log_failure(stmt, &result);
        result
    }

    async fn with_timeout<T>(
        &self,
        fut: impl std::future::Future<Output = StoreResult<T>>,
    ) -> StoreResult<T> {
        match self.config.timeout() {
            Some(limit) => tokio::time::timeout(limit, fut)
                .await
                .map_err(|_| StoreError::Timeout(limit))?,
            None => fut.await,
        }
    }

    fn log_statement(&self, stmt: &Statement) {
        let sql = truncate_sql(&stmt.text, self.config.logging.max_sql_length);
        tracing::debug!(
            target: "pgentity.sql",
            kind = ?stmt.kind,
            param_count = stmt.values.len(),
            sql = %sql,
            "executing statement"
        );
    }

    fn log_failure<T>(&self, stmt: &Statement, result: &StoreResult<T>) {
        if let Err(err) = result {
            let sql = truncate_sql(&stmt.text, self.config.logging.max_sql_length);
            tracing::error!(
                target: "pgentity.sql",
                kind = ?stmt.kind,
                sql = %sql,
                error = %err,
                "statement failed"
            );
        }
    }
}

/// Id for a new entity: the requested one, else a random UUID.
fn new_id(entity: &Entity) -> Value {
    entity
        .new_id()
        .cloned()
        .unwrap_or_else(|| Value::Text(Uuid::new_v4().to_string()))
}

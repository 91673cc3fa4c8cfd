//! SQLite-backed durable store.
//!
//! Split into focused submodules:
//! - `users` / `chats`: identity records and their metadata JSON
//! - `messages`: append-only transcript and participant links
//! - `projects`: project records and the project audit trail
//! - `memory`: per-user and per-chat memory fields
//! - `onboarding`: typed access to `metadata.onboarding` and `metadata.group_info`
//! - `adapter`: the `ChatStore` implementation the gateway talks to

mod adapter;
mod chats;
mod memory;
mod messages;
mod onboarding;
mod projects;
mod users;

use parley_core::{
    config::{shellexpand, MemoryConfig},
    error::ParleyError,
    model::merge_json,
};
use serde_json::Value;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::str::FromStr;
use tracing::{info, warn};

/// Durable store backed by SQLite.
#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

/// Tables that carry a `metadata` JSON column.
#[derive(Debug, Clone, Copy)]
pub(crate) enum MetadataTable {
    Users,
    Chats,
}

impl MetadataTable {
    fn name(self) -> &'static str {
        match self {
            Self::Users => "users",
            Self::Chats => "chats",
        }
    }
}

impl SqliteStore {
    /// Open (or create) the database file, running migrations on first use.
    pub async fn new(config: &MemoryConfig) -> Result<Self, ParleyError> {
        let db_path = shellexpand(&config.db_path);

        if let Some(parent) = std::path::Path::new(&db_path).parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| ParleyError::Store(format!("failed to create data dir: {e}")))?;
        }

        let opts = SqliteConnectOptions::from_str(&format!("sqlite:{db_path}"))
            .map_err(|e| ParleyError::Store(format!("invalid db path: {e}")))?
            .create_if_missing(true)
            .foreign_keys(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal);

        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(opts)
            .await
            .map_err(|e| ParleyError::Store(format!("failed to connect to sqlite: {e}")))?;

        Self::run_migrations(&pool).await?;

        info!("Store initialized at {db_path}");

        Ok(Self { pool })
    }

    /// In-memory database on a single connection. Used by tests and by
    /// `parley status` dry runs.
    pub async fn open_in_memory() -> Result<Self, ParleyError> {
        let opts = SqliteConnectOptions::from_str("sqlite::memory:")
            .map_err(|e| ParleyError::Store(format!("invalid db path: {e}")))?
            .foreign_keys(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(opts)
            .await
            .map_err(|e| ParleyError::Store(format!("failed to open sqlite: {e}")))?;
        Self::run_migrations(&pool).await?;
        Ok(Self { pool })
    }

    /// Cheap reachability probe.
    pub async fn ping(&self) -> Result<(), ParleyError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| ParleyError::Store(format!("ping failed: {e}")))?;
        Ok(())
    }

    /// Run SQL migrations, tracking which have already been applied.
    async fn run_migrations(pool: &SqlitePool) -> Result<(), ParleyError> {
        sqlx::raw_sql(
            "CREATE TABLE IF NOT EXISTS _migrations (
                name TEXT PRIMARY KEY,
                applied_at TEXT NOT NULL DEFAULT (datetime('now'))
            );",
        )
        .execute(pool)
        .await
        .map_err(|e| ParleyError::Store(format!("failed to create migrations table: {e}")))?;

        let migrations: &[(&str, &str)] =
            &[
                ("001_init", include_str!("../../migrations/001_init.sql")),
                (
                    "002_external_ids",
                    include_str!("../../migrations/002_external_ids.sql"),
                ),
            ];

        for (name, sql) in migrations {
            let applied: Option<(String,)> =
                sqlx::query_as("SELECT name FROM _migrations WHERE name = ?")
                    .bind(name)
                    .fetch_optional(pool)
                    .await
                    .map_err(|e| {
                        ParleyError::Store(format!("failed to check migration {name}: {e}"))
                    })?;

            if applied.is_some() {
                continue;
            }

            sqlx::raw_sql(sql)
                .execute(pool)
                .await
                .map_err(|e| ParleyError::Store(format!("migration {name} failed: {e}")))?;

            sqlx::query("INSERT INTO _migrations (name) VALUES (?)")
                .bind(name)
                .execute(pool)
                .await
                .map_err(|e| {
                    ParleyError::Store(format!("failed to record migration {name}: {e}"))
                })?;
        }
        Ok(())
    }

    /// Read a row's metadata JSON. Unparseable metadata reads as `{}`.
    pub(crate) async fn read_metadata(
        &self,
        table: MetadataTable,
        id: &str,
    ) -> Result<Value, ParleyError> {
        let sql = format!("SELECT metadata FROM {} WHERE id = ?", table.name());
        let row: Option<(String,)> = sqlx::query_as(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| ParleyError::Store(format!("read metadata failed: {e}")))?;

        let Some((raw,)) = row else {
            return Err(ParleyError::Store(format!(
                "{} row {id} not found",
                table.name()
            )));
        };
        Ok(parse_json_object(&raw))
    }

    pub(crate) async fn write_metadata(
        &self,
        table: MetadataTable,
        id: &str,
        metadata: &Value,
    ) -> Result<(), ParleyError> {
        let sql = format!(
            "UPDATE {} SET metadata = ?, updated_at = datetime('now') WHERE id = ?",
            table.name()
        );
        sqlx::query(&sql)
            .bind(metadata.to_string())
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| ParleyError::Store(format!("write metadata failed: {e}")))?;
        Ok(())
    }

    /// Read-merge-write. Objects merge recursively; `null` deletes a key.
    pub(crate) async fn merge_metadata(
        &self,
        table: MetadataTable,
        id: &str,
        patch: &Value,
    ) -> Result<Value, ParleyError> {
        let mut metadata = self.read_metadata(table, id).await?;
        merge_json(&mut metadata, patch);
        self.write_metadata(table, id, &metadata).await?;
        Ok(metadata)
    }
}

/// Parse a stored JSON column, falling back to an empty object.
pub(crate) fn parse_json_object(raw: &str) -> Value {
    match serde_json::from_str::<Value>(raw) {
        Ok(v) if v.is_object() => v,
        Ok(_) | Err(_) => {
            if !raw.trim().is_empty() {
                warn!("store: discarding malformed JSON column");
            }
            Value::Object(Default::default())
        }
    }
}

//! SQLite connection pool factory, migration runner, and the `db` core module.

use std::str::FromStr;
use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;

use bookshelf_kernel::settings::DatabaseSettings;
use bookshelf_kernel::{InitCtx, Migration, Module};

const MIGRATIONS_TABLE: &str = r#"
    CREATE TABLE IF NOT EXISTS schema_migrations (
        module TEXT NOT NULL,
        id TEXT NOT NULL,
        applied_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
        PRIMARY KEY (module, id)
    );
"#;

fn connect_options(url: &str) -> anyhow::Result<SqliteConnectOptions> {
    let options = SqliteConnectOptions::from_str(url)
        .with_context(|| format!("invalid database url '{url}'"))?
        .foreign_keys(true);
    Ok(options)
}

fn pool_options(settings: &DatabaseSettings) -> SqlitePoolOptions {
    SqlitePoolOptions::new()
        .max_connections(settings.max_connections)
        .acquire_timeout(Duration::from_millis(settings.acquire_timeout_ms))
}

/// Open a pool against `settings.url` and verify one connection.
pub async fn connect(settings: &DatabaseSettings) -> anyhow::Result<SqlitePool> {
    let pool = pool_options(settings)
        .connect_with(connect_options(&settings.url)?)
        .await
        .with_context(|| format!("failed to open database '{}'", settings.url))?;

    tracing::info!(
        target: "bookshelf-db",
        url = %settings.url,
        max_connections = settings.max_connections,
        "database pool ready"
    );
    Ok(pool)
}

/// Build a pool that opens connections on first use.
pub fn connect_lazy(settings: &DatabaseSettings) -> anyhow::Result<SqlitePool> {
    Ok(pool_options(settings).connect_lazy_with(connect_options(&settings.url)?))
}

/// Single-connection in-memory database for tests and throwaway runs.
///
/// Every SQLite in-memory connection is its own database, so the pool is
/// pinned to one connection that is never recycled.
pub async fn connect_in_memory() -> anyhow::Result<SqlitePool> {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect_with(connect_options("sqlite::memory:")?)
        .await
        .context("failed to open in-memory database")?;
    Ok(pool)
}

/// Apply every migration not yet recorded in `schema_migrations`.
///
/// Each migration runs in its own transaction together with its bookkeeping
/// row. Returns the number of migrations applied by this call.
pub async fn run_migrations(
    pool: &SqlitePool,
    migrations: &[(String, Migration)],
) -> anyhow::Result<usize> {
    sqlx::raw_sql(MIGRATIONS_TABLE)
        .execute(pool)
        .await
        .context("failed to create schema_migrations table")?;

    let mut applied = 0;
    for (module, migration) in migrations {
        let already: Option<(String,)> =
            sqlx::query_as("SELECT id FROM schema_migrations WHERE module = ? AND id = ?")
                .bind(module)
                .bind(migration.id)
                .fetch_optional(pool)
                .await
                .context("failed to read schema_migrations")?;

        if already.is_some() {
            tracing::debug!(
                target: "bookshelf-db",
                %module,
                id = migration.id,
                "migration already applied"
            );
            continue;
        }

        let mut tx = pool.begin().await.context("failed to open migration transaction")?;
        sqlx::raw_sql(migration.up)
            .execute(&mut *tx)
            .await
            .with_context(|| format!("migration {module}/{} failed", migration.id))?;
        sqlx::query("INSERT INTO schema_migrations (module, id) VALUES (?, ?)")
            .bind(module)
            .bind(migration.id)
            .execute(&mut *tx)
            .await
            .with_context(|| format!("failed to record migration {module}/{}", migration.id))?;
        tx.commit()
            .await
            .with_context(|| format!("failed to commit migration {module}/{}", migration.id))?;

        tracing::info!(target: "bookshelf-db", %module, id = migration.id, "migration applied");
        applied += 1;
    }

    Ok(applied)
}

/// Core module owning the shared pool: checks connectivity on init and closes
/// the pool on shutdown.
pub struct DatabaseModule {
    pool: SqlitePool,
}

impl DatabaseModule {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Module for DatabaseModule {
    fn name(&self) -> &'static str {
        "db"
    }

    async fn init(&self, _ctx: &InitCtx<'_>) -> anyhow::Result<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .context("database connectivity check failed")?;
        tracing::info!(target: "bookshelf-db", "database reachable");
        Ok(())
    }

    async fn stop(&self) -> anyhow::Result<()> {
        self.pool.close().await;
        tracing::info!(target: "bookshelf-db", "database pool closed");
        Ok(())
    }
}

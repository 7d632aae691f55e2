//! Per-module SQL migrations with a bookkeeping table.

use sqlx::SqlitePool;
use time::OffsetDateTime;

use crate::{DbError, DbResult};

const BOOKKEEPING_DDL: &str = r#"
    CREATE TABLE IF NOT EXISTS _migrations (
        module     TEXT NOT NULL,
        id         TEXT NOT NULL,
        applied_at TEXT NOT NULL,
        PRIMARY KEY (module, id)
    )
"#;

/// Migration definition contributed by a module.
#[derive(Debug, Clone)]
pub struct Migration {
    pub id: &'static str,
    pub up: &'static str,
}

/// Run pending migrations in the order given, each in its own transaction.
pub(crate) async fn apply(pool: &SqlitePool, migrations: &[(String, Migration)]) -> DbResult<usize> {
    sqlx::query(BOOKKEEPING_DDL).execute(pool).await?;

    let mut applied = 0;
    for (module, migration) in migrations {
        let mut tx = pool.begin().await?;

        let seen: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM _migrations WHERE module = ? AND id = ?")
                .bind(module)
                .bind(migration.id)
                .fetch_one(&mut *tx)
                .await?;
        if seen > 0 {
            tracing::debug!(target: "bookshelf-db", %module, id = migration.id, "migration already applied");
            continue;
        }

        sqlx::raw_sql(migration.up)
            .execute(&mut *tx)
            .await
            .map_err(|source| DbError::Migration {
                module: module.clone(),
                id: migration.id.to_string(),
                source,
            })?;

        sqlx::query("INSERT INTO _migrations (module, id, applied_at) VALUES (?, ?, ?)")
            .bind(module)
            .bind(migration.id)
            .bind(OffsetDateTime::now_utc())
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        tracing::info!(target: "bookshelf-db", %module, id = migration.id, "migration applied");
        applied += 1;
    }

    Ok(applied)
}

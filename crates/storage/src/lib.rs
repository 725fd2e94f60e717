use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    Pool, Row, Sqlite,
};
use std::{
    fs,
    path::{Path, PathBuf},
    str::FromStr,
};
use tracing::debug;

use shared::domain::Credential;

#[derive(Clone)]
pub struct Storage {
    pool: Pool<Sqlite>,
}

#[derive(Debug, Clone)]
pub struct StoredCredential {
    pub id: i64,
    pub credential: Credential,
    pub created_at: DateTime<Utc>,
}

impl Storage {
    pub async fn new(database_url: &str) -> Result<Self> {
        ensure_sqlite_parent_dir_exists(database_url)?;

        let connect_options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(connect_options)
            .await?;
        sqlx::migrate!("./migrations").run(&pool).await?;
        Ok(Self { pool })
    }

    pub async fn health_check(&self) -> Result<()> {
        let _: i64 = sqlx::query_scalar("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .context("sqlite ping failed")?;
        Ok(())
    }

    /// Writes `value` into the named slot, replacing whatever was there.
    /// Returns only once the row is committed.
    pub async fn put_staging_slot(&self, key: &str, value: &str) -> Result<()> {
        sqlx::query(
            "INSERT INTO staging_slots (slot_key, slot_value, updated_at) VALUES (?, ?, ?)
             ON CONFLICT(slot_key) DO UPDATE SET
                slot_value = excluded.slot_value,
                updated_at = excluded.updated_at",
        )
        .bind(key)
        .bind(value)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .with_context(|| format!("failed to write staging slot '{key}'"))?;
        debug!(slot = key, bytes = value.len(), "staging slot written");
        Ok(())
    }

    pub async fn staging_slot(&self, key: &str) -> Result<Option<String>> {
        let row = sqlx::query("SELECT slot_value FROM staging_slots WHERE slot_key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await
            .with_context(|| format!("failed to read staging slot '{key}'"))?;
        Ok(row.map(|r| r.get::<String, _>(0)))
    }

    /// Clears the slot only while it still holds `expected`. Returns whether a
    /// row was deleted.
    pub async fn remove_staging_slot_if(&self, key: &str, expected: &str) -> Result<bool> {
        let result =
            sqlx::query("DELETE FROM staging_slots WHERE slot_key = ? AND slot_value = ?")
                .bind(key)
                .bind(expected)
                .execute(&self.pool)
                .await
                .with_context(|| format!("failed to clear staging slot '{key}'"))?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn insert_credential(&self, credential: &Credential) -> Result<i64> {
        let rec = sqlx::query(
            "INSERT INTO credentials (website, username, password, created_at)
             VALUES (?, ?, ?, ?) RETURNING id",
        )
        .bind(&credential.website)
        .bind(&credential.username)
        .bind(&credential.password)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await
        .context("failed to insert credential")?;
        Ok(rec.get::<i64, _>(0))
    }

    /// All stored credentials in insertion order.
    pub async fn list_credentials(&self) -> Result<Vec<StoredCredential>> {
        let rows = sqlx::query(
            "SELECT id, website, username, password, created_at FROM credentials ORDER BY id ASC",
        )
        .fetch_all(&self.pool)
        .await
        .context("failed to list credentials")?;

        rows.into_iter()
            .map(|row| -> Result<StoredCredential> {
                Ok(StoredCredential {
                    id: row.try_get("id")?,
                    credential: Credential {
                        website: row.try_get("website")?,
                        username: row.try_get("username")?,
                        password: row.try_get("password")?,
                    },
                    created_at: row.try_get("created_at")?,
                })
            })
            .collect()
    }
}

fn ensure_sqlite_parent_dir_exists(database_url: &str) -> Result<()> {
    let Some(path) = sqlite_path(database_url) else {
        return Ok(());
    };

    let Some(parent) = path.parent() else {
        return Ok(());
    };

    fs::create_dir_all(parent).with_context(|| {
        format!(
            "failed to create parent directory '{}' for database url '{database_url}'",
            parent.display()
        )
    })?;

    Ok(())
}

fn sqlite_path(database_url: &str) -> Option<PathBuf> {
    if database_url == "sqlite::memory:" || !database_url.starts_with("sqlite:") {
        return None;
    }

    let path = database_url
        .trim_start_matches("sqlite://")
        .trim_start_matches("sqlite:")
        .split('?')
        .next()
        .unwrap_or_default();

    if path.is_empty() {
        return None;
    }

    Some(Path::new(path).to_path_buf())
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;

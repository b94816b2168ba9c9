//! # ll-store-sqlite Implementation
//!
//! Durable document store on SQLite. Every document is one row holding its JSON
//! body and a revision counter; guarded writes compare that counter in the
//! `UPDATE ... WHERE` clause, so the check and the write are a single statement.

use std::str::FromStr;

use async_trait::async_trait;
use ll_core::traits::{Collection, Document, DocumentStore, WriteOutcome};
use serde_json::Value;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::Row;
use tracing::{debug, info};
use uuid::Uuid;

const SCHEMA: &str = "CREATE TABLE IF NOT EXISTS documents (
    collection TEXT NOT NULL,
    id         TEXT NOT NULL,
    revision   INTEGER NOT NULL,
    body       TEXT NOT NULL,
    PRIMARY KEY (collection, id)
)";

pub struct SqliteDocumentStore {
    pool: SqlitePool,
}

impl SqliteDocumentStore {
    /// Opens (or creates) the database at `url` and makes sure the table exists.
    ///
    /// # Developer Note
    /// Every connection to `sqlite::memory:` gets its own private database, so an
    /// in-memory store is pinned to a single pooled connection.
    pub async fn connect(url: &str) -> anyhow::Result<Self> {
        let options = SqliteConnectOptions::from_str(url)?.create_if_missing(true);
        let max_connections = if url.contains(":memory:") { 1 } else { 5 };
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await?;
        sqlx::query(SCHEMA).execute(&pool).await?;
        info!(url, "sqlite document store ready");
        Ok(Self { pool })
    }

    async fn read(&self, collection: Collection, id: &str) -> anyhow::Result<Option<Document>> {
        let row = sqlx::query("SELECT id, revision, body FROM documents WHERE collection = ? AND id = ?")
            .bind(collection.as_str())
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(|row| to_document(&row)).transpose()
    }
}

fn to_document(row: &SqliteRow) -> anyhow::Result<Document> {
    let revision: i64 = row.try_get("revision")?;
    let body: String = row.try_get("body")?;
    Ok(Document {
        id: row.try_get("id")?,
        revision: u64::try_from(revision)?,
        fields: serde_json::from_str(&body)?,
    })
}

#[async_trait]
impl DocumentStore for SqliteDocumentStore {
    async fn list(&self, collection: Collection) -> anyhow::Result<Vec<Document>> {
        let rows = sqlx::query("SELECT id, revision, body FROM documents WHERE collection = ?")
            .bind(collection.as_str())
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(to_document).collect()
    }

    async fn get(&self, collection: Collection, id: &str) -> anyhow::Result<Option<Document>> {
        self.read(collection, id).await
    }

    async fn create(&self, collection: Collection, fields: Value) -> anyhow::Result<Document> {
        if !fields.is_object() {
            anyhow::bail!("{collection} document must be a JSON object");
        }
        let id = Uuid::new_v4().simple().to_string();
        sqlx::query("INSERT INTO documents (collection, id, revision, body) VALUES (?, ?, 1, ?)")
            .bind(collection.as_str())
            .bind(&id)
            .bind(serde_json::to_string(&fields)?)
            .execute(&self.pool)
            .await?;
        debug!(%collection, %id, "document created");
        Ok(Document {
            id,
            revision: 1,
            fields,
        })
    }

    /// # Developer Note
    /// Unguarded writes still go through the revision check: they retry against
    /// the fresh revision instead of reporting `Stale`, so a merge never drops a
    /// concurrent write to another key.
    async fn update(
        &self,
        collection: Collection,
        id: &str,
        patch: Value,
        expected_revision: Option<u64>,
    ) -> anyhow::Result<WriteOutcome> {
        let Value::Object(patch) = patch else {
            anyhow::bail!("patch must be a JSON object");
        };
        loop {
            // 1. Read the current body
            let Some(mut doc) = self.read(collection, id).await? else {
                return Ok(WriteOutcome::Missing);
            };
            if let Some(expected) = expected_revision {
                if doc.revision != expected {
                    return Ok(WriteOutcome::Stale {
                        current: doc.revision,
                    });
                }
            }

            // 2. Merge top-level keys
            match &mut doc.fields {
                Value::Object(base) => base.extend(patch.clone()),
                _ => anyhow::bail!("{collection} document {id} is not a JSON object"),
            }

            // 3. Write only if nobody else did in between
            let read_revision = doc.revision;
            let written = sqlx::query(
                "UPDATE documents SET revision = ?, body = ? WHERE collection = ? AND id = ? AND revision = ?",
            )
            .bind(i64::try_from(read_revision + 1)?)
            .bind(serde_json::to_string(&doc.fields)?)
            .bind(collection.as_str())
            .bind(id)
            .bind(i64::try_from(read_revision)?)
            .execute(&self.pool)
            .await?
            .rows_affected();

            if written == 1 {
                doc.revision = read_revision + 1;
                debug!(%collection, id, revision = doc.revision, "document updated");
                return Ok(WriteOutcome::Applied(doc));
            }
            debug!(%collection, id, read_revision, "revision moved during update, re-reading");
        }
    }

    async fn delete(&self, collection: Collection, id: &str) -> anyhow::Result<bool> {
        let removed = sqlx::query("DELETE FROM documents WHERE collection = ? AND id = ?")
            .bind(collection.as_str())
            .bind(id)
            .execute(&self.pool)
            .await?
            .rows_affected();
        Ok(removed > 0)
    }
}

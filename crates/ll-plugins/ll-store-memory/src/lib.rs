//! # ll-store-memory Implementation
//!
//! In-process document store. Nothing survives a restart; it backs development
//! runs and the test suites.

use async_trait::async_trait;
use dashmap::DashMap;
use ll_core::traits::{Collection, Document, DocumentStore, WriteOutcome};
use serde_json::Value;
use tracing::debug;
use uuid::Uuid;

#[derive(Default)]
pub struct MemoryDocumentStore {
    documents: DashMap<(Collection, String), Document>,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Replaces the top-level keys of `target` with those of `patch`.
fn merge(target: &mut Value, patch: Value) -> anyhow::Result<()> {
    match (target, patch) {
        (Value::Object(base), Value::Object(patch)) => {
            base.extend(patch);
            Ok(())
        }
        (_, patch) => anyhow::bail!("patch must be a JSON object, got {patch}"),
    }
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn list(&self, collection: Collection) -> anyhow::Result<Vec<Document>> {
        Ok(self
            .documents
            .iter()
            .filter(|entry| entry.key().0 == collection)
            .map(|entry| entry.value().clone())
            .collect())
    }

    async fn get(&self, collection: Collection, id: &str) -> anyhow::Result<Option<Document>> {
        Ok(self
            .documents
            .get(&(collection, id.to_string()))
            .map(|entry| entry.value().clone()))
    }

    async fn create(&self, collection: Collection, fields: Value) -> anyhow::Result<Document> {
        if !fields.is_object() {
            anyhow::bail!("{collection} document must be a JSON object");
        }
        let doc = Document {
            id: Uuid::new_v4().simple().to_string(),
            revision: 1,
            fields,
        };
        self.documents
            .insert((collection, doc.id.clone()), doc.clone());
        debug!(%collection, id = %doc.id, "document created");
        Ok(doc)
    }

    /// # Developer Note
    /// The revision check and the merge both happen while holding the shard's
    /// write lock from `get_mut`, which is what makes the guarded write atomic.
    async fn update(
        &self,
        collection: Collection,
        id: &str,
        patch: Value,
        expected_revision: Option<u64>,
    ) -> anyhow::Result<WriteOutcome> {
        let Some(mut entry) = self.documents.get_mut(&(collection, id.to_string())) else {
            return Ok(WriteOutcome::Missing);
        };
        let doc = entry.value_mut();
        if let Some(expected) = expected_revision {
            if doc.revision != expected {
                return Ok(WriteOutcome::Stale {
                    current: doc.revision,
                });
            }
        }
        merge(&mut doc.fields, patch)?;
        doc.revision += 1;
        debug!(%collection, id, revision = doc.revision, "document updated");
        Ok(WriteOutcome::Applied(doc.clone()))
    }

    async fn delete(&self, collection: Collection, id: &str) -> anyhow::Result<bool> {
        Ok(self
            .documents
            .remove(&(collection, id.to_string()))
            .is_some())
    }
}

//! # Entity Store
//!
//! Typed create/read/update/delete over the [`DocumentStore`] port.
//!
//! Writes go through [`Patch`] structs only, so a transition can touch exactly the
//! fields it names. Guarded writes carry the revision the caller read; if anything
//! else wrote the document in between, the write is refused with `Conflict`.

use std::ops::Deref;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::{AppError, Result};
use crate::models::{Notification, Offer, Post, ServiceRequest, ToolRequest, User};
use crate::traits::{Collection, Document, DocumentStore, WriteOutcome};

/// Binds a model to the collection it lives in.
pub trait Entity: Serialize + DeserializeOwned + Send + Sync {
    const COLLECTION: Collection;
    /// Human name used in `NotFound` errors and logs
    const KIND: &'static str;

    fn id(&self) -> &str;
}

macro_rules! entity {
    ($ty:ty, $collection:expr, $kind:literal) => {
        impl Entity for $ty {
            const COLLECTION: Collection = $collection;
            const KIND: &'static str = $kind;

            fn id(&self) -> &str {
                &self.id
            }
        }
    };
}

entity!(User, Collection::Users, "user");
entity!(Post, Collection::Posts, "post");
entity!(ServiceRequest, Collection::ServiceRequests, "service request");
entity!(Offer, Collection::Offers, "offer");
entity!(Notification, Collection::Notifications, "notification");
entity!(ToolRequest, Collection::ToolRequests, "tool request");

/// A partial update that is only valid for entity `T`.
pub trait Patch<T: Entity>: Serialize + Sync {}

/// An entity together with the revision it was read at.
#[derive(Debug, Clone, PartialEq)]
pub struct Versioned<T> {
    pub entity: T,
    pub revision: u64,
}

impl<T> Versioned<T> {
    pub fn into_inner(self) -> T {
        self.entity
    }
}

impl<T> Deref for Versioned<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.entity
    }
}

fn decode<T: Entity>(doc: Document) -> Result<Versioned<T>> {
    let Document { id, revision, fields } = doc;
    let mut fields = match fields {
        Value::Object(map) => map,
        other => {
            return Err(AppError::Internal(format!(
                "{} document {id} is not an object: {other}",
                T::KIND
            )))
        }
    };
    fields.insert("id".to_string(), Value::String(id.clone()));
    let entity = serde_json::from_value(Value::Object(fields))
        .map_err(|e| AppError::Internal(format!("corrupt {} document {id}: {e}", T::KIND)))?;
    Ok(Versioned { entity, revision })
}

fn encode<S: Serialize>(value: &S) -> Result<Value> {
    let mut value = serde_json::to_value(value)?;
    if let Value::Object(map) = &mut value {
        map.remove("id");
    }
    Ok(value)
}

#[derive(Clone)]
pub struct EntityStore {
    gateway: Arc<dyn DocumentStore>,
}

impl EntityStore {
    pub fn new(gateway: Arc<dyn DocumentStore>) -> Self {
        Self { gateway }
    }

    pub async fn find<T: Entity>(&self, id: &str) -> Result<Option<Versioned<T>>> {
        debug!(collection = %T::COLLECTION, id, "read");
        match self.gateway.get(T::COLLECTION, id).await? {
            Some(doc) => decode(doc).map(Some),
            None => Ok(None),
        }
    }

    /// Like [`find`](Self::find) but a missing document is a `NotFound` error.
    pub async fn get<T: Entity>(&self, id: &str) -> Result<Versioned<T>> {
        self.find(id)
            .await?
            .ok_or_else(|| AppError::not_found(T::KIND, id))
    }

    /// Current snapshot of a collection. Call again for a fresh one.
    pub async fn list<T: Entity>(&self) -> Result<Vec<Versioned<T>>> {
        self.list_where(|_: &T| true).await
    }

    /// Snapshot filtered client-side by `keep`.
    pub async fn list_where<T, F>(&self, keep: F) -> Result<Vec<Versioned<T>>>
    where
        T: Entity,
        F: Fn(&T) -> bool,
    {
        debug!(collection = %T::COLLECTION, "scan");
        let docs = self.gateway.list(T::COLLECTION).await?;
        let mut out = Vec::with_capacity(docs.len());
        for doc in docs {
            let item = decode::<T>(doc)?;
            if keep(&item.entity) {
                out.push(item);
            }
        }
        Ok(out)
    }

    /// Persists a new entity. Its `id` field is ignored; the store assigns one.
    pub async fn create<T: Entity>(&self, draft: &T) -> Result<Versioned<T>> {
        let doc = self.gateway.create(T::COLLECTION, encode(draft)?).await?;
        decode(doc)
    }

    /// Compare-and-swap: applies `patch` only if the document is still at `current.revision`.
    pub async fn commit<T, P>(&self, current: &Versioned<T>, patch: &P) -> Result<Versioned<T>>
    where
        T: Entity,
        P: Patch<T>,
    {
        self.write(current.entity.id(), patch, Some(current.revision))
            .await
    }

    /// Re-reads `id`, lets `decide` check its preconditions against the fresh copy
    /// and produce a patch, then commits that patch guarded by the revision read.
    pub async fn transition<T, P, F>(&self, id: &str, decide: F) -> Result<Versioned<T>>
    where
        T: Entity,
        P: Patch<T>,
        F: FnOnce(&T) -> Result<P>,
    {
        let current = self.get::<T>(id).await?;
        let patch = decide(&current.entity)?;
        self.commit(&current, &patch).await
    }

    /// Unguarded write for derived fields that are recomputed from scratch.
    pub async fn overwrite<T, P>(&self, id: &str, patch: &P) -> Result<Versioned<T>>
    where
        T: Entity,
        P: Patch<T>,
    {
        self.write(id, patch, None).await
    }

    /// Hard removal; `NotFound` if nothing was there.
    pub async fn remove<T: Entity>(&self, id: &str) -> Result<()> {
        if self.gateway.delete(T::COLLECTION, id).await? {
            Ok(())
        } else {
            Err(AppError::not_found(T::KIND, id))
        }
    }

    async fn write<T, P>(&self, id: &str, patch: &P, expected: Option<u64>) -> Result<Versioned<T>>
    where
        T: Entity,
        P: Patch<T>,
    {
        let outcome = self
            .gateway
            .update(T::COLLECTION, id, encode(patch)?, expected)
            .await?;
        match outcome {
            WriteOutcome::Applied(doc) => decode(doc),
            WriteOutcome::Missing => Err(AppError::not_found(T::KIND, id)),
            WriteOutcome::Stale { current } => {
                warn!(
                    collection = %T::COLLECTION,
                    id,
                    expected = ?expected,
                    current,
                    "lost write race"
                );
                Err(AppError::Conflict(format!(
                    "{} {id} was changed by someone else",
                    T::KIND
                )))
            }
        }
    }
}

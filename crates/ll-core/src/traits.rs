//! # Core Traits (Ports)
//!
//! Any plugin must implement these traits to be used by the binary.
//! The engine never talks to a database or an identity service directly.

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Named collections in the document store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Collection {
    Users,
    Posts,
    ServiceRequests,
    Offers,
    Notifications,
    ToolRequests,
}

impl Collection {
    pub const ALL: [Collection; 6] = [
        Collection::Users,
        Collection::Posts,
        Collection::ServiceRequests,
        Collection::Offers,
        Collection::Notifications,
        Collection::ToolRequests,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Collection::Users => "users",
            Collection::Posts => "posts",
            Collection::ServiceRequests => "serviceRequests",
            Collection::Offers => "offers",
            Collection::Notifications => "notifications",
            Collection::ToolRequests => "toolRequests",
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A stored document: store-assigned id, revision counter, and a JSON object of fields.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub id: String,
    /// Starts at 1 on create and increases by one on every applied update
    pub revision: u64,
    pub fields: Value,
}

/// Result of a (possibly guarded) update.
#[derive(Debug, Clone, PartialEq)]
pub enum WriteOutcome {
    Applied(Document),
    Missing,
    /// The expected revision no longer matches; nothing was written
    Stale { current: u64 },
}

/// Persistence gateway: collection-scoped CRUD over JSON documents.
///
/// Implementations must make each single-document update atomic; nothing else
/// (ordering, filtering, multi-document transactions) is assumed.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Returns every document of a collection, in no particular order.
    async fn list(&self, collection: Collection) -> anyhow::Result<Vec<Document>>;

    async fn get(&self, collection: Collection, id: &str) -> anyhow::Result<Option<Document>>;

    /// Stores `fields` under a fresh, never reused id.
    async fn create(&self, collection: Collection, fields: Value) -> anyhow::Result<Document>;

    /// Merges the top-level keys of `patch` into the document.
    /// With `expected_revision` set, the write only applies if the stored revision matches.
    async fn update(
        &self,
        collection: Collection,
        id: &str,
        patch: Value,
        expected_revision: Option<u64>,
    ) -> anyhow::Result<WriteOutcome>;

    /// Hard removal. Returns false when nothing was stored under `id`.
    async fn delete(&self, collection: Collection, id: &str) -> anyhow::Result<bool>;
}

/// An authenticated principal supplied by the identity provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub uid: String,
    pub email: String,
}

/// A signed-in session: bearer token plus the principal it stands for.
#[derive(Debug, Clone, Serialize)]
pub struct Session {
    pub token: String,
    pub principal: Principal,
}

/// Identity contract. Credentials never reach the engine; only principals do.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Creates credentials for a new principal.
    async fn register(&self, email: &str, password: &str) -> anyhow::Result<Principal>;

    /// Drops the credentials and live sessions of a principal whose User never got created.
    async fn unregister(&self, principal: &Principal) -> anyhow::Result<()>;

    /// Verifies credentials and opens a session. `None` on bad credentials.
    async fn sign_in(&self, email: &str, password: &str) -> anyhow::Result<Option<Session>>;

    /// Resolves a bearer token to its principal, if the session is live.
    async fn principal_for(&self, token: &str) -> anyhow::Result<Option<Principal>>;

    async fn sign_out(&self, token: &str) -> anyhow::Result<()>;
}

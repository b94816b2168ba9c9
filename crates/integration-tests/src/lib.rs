//! Shared fixtures for the cross-crate test suites.
//!
//! A [`World`] is one marketplace over a fresh document store plus shortcuts for
//! the users, posts, requests and offers most scenarios start from.
//!
//! [`Interleaved`] and [`Gate`] wrap a gateway so concurrent operations actually
//! overlap: the in-process stores finish every call on its first poll otherwise.

use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::Notify;

use ll_core::models::{
    Category, NewOffer, NewPost, NewServiceRequest, NewUser, Notification, Offer, OfferStatus,
    Post, ServiceRequest, User,
};
use ll_core::traits::{Collection, Document, DocumentStore, WriteOutcome};
use ll_core::{Marketplace, Result};
use ll_store_memory::MemoryDocumentStore;
use ll_store_sqlite::SqliteDocumentStore;

pub struct World {
    pub market: Marketplace,
    /// The raw gateway, for staging states the engine API cannot reach directly
    pub gateway: Arc<dyn DocumentStore>,
}

impl World {
    pub fn new(gateway: Arc<dyn DocumentStore>) -> Self {
        Self {
            market: Marketplace::new(gateway.clone()),
            gateway,
        }
    }

    pub fn memory() -> Self {
        Self::new(Arc::new(MemoryDocumentStore::new()))
    }

    /// In-memory store that yields to the scheduler before every call.
    pub fn interleaved() -> Self {
        Self::new(Arc::new(Interleaved::new(Arc::new(MemoryDocumentStore::new()))))
    }

    pub async fn sqlite() -> anyhow::Result<Self> {
        let store = SqliteDocumentStore::connect("sqlite::memory:").await?;
        Ok(Self::new(Arc::new(store)))
    }

    /// Registers `name@example.com`.
    pub async fn user(&self, name: &str) -> Result<User> {
        self.market
            .catalog
            .register_user(NewUser {
                email: format!("{}@example.com", name.to_lowercase()),
                name: name.to_string(),
            })
            .await
    }

    pub async fn admin(&self) -> Result<User> {
        self.market
            .moderation
            .bootstrap_admin("admin@example.com", "Admin User")
            .await
    }

    pub async fn post(&self, owner: &User, title: &str, category: Category) -> Result<Post> {
        self.market
            .catalog
            .create_post(
                &owner.id,
                NewPost {
                    title: title.to_string(),
                    description: format!("{title} done right"),
                    category,
                    price: 50.0,
                    price_unit: "per job".into(),
                    location: "Los Angeles".into(),
                    availability: "24/7".into(),
                },
            )
            .await
    }

    pub async fn request(&self, requester: &User, post: Option<&Post>) -> Result<ServiceRequest> {
        self.market
            .workflow
            .submit_request(
                &requester.id,
                NewServiceRequest {
                    post_id: post.map(|p| p.id.clone()),
                    service_type: None,
                    description: "Kitchen sink leaks".into(),
                    location: "Los Angeles".into(),
                    budget: Some(60.0),
                },
            )
            .await
    }

    pub async fn offer(&self, request: &ServiceRequest, offerer: &User, price: f64) -> Result<Offer> {
        self.market
            .workflow
            .submit_offer(
                &request.id,
                &offerer.id,
                NewOffer {
                    message: "can do Tuesday".into(),
                    price,
                },
            )
            .await
    }

    /// Drives a fresh offer on `request` all the way to `completed`.
    pub async fn completed_offer(
        &self,
        request: &ServiceRequest,
        requester: &User,
        offerer: &User,
    ) -> Result<Offer> {
        let offer = self.offer(request, offerer, 40.0).await?;
        self.market.workflow.accept_offer(&offer.id, &requester.id).await?;
        self.market.workflow.mark_completed(&offer.id, &requester.id).await
    }

    pub async fn inbox(&self, user: &User) -> Result<Vec<Notification>> {
        self.market.notifications.list_for_user(&user.id, false).await
    }

    /// Offers on `request` that are accepted or completed.
    pub async fn engaged_offers(&self, request_id: &str) -> Result<usize> {
        Ok(self
            .market
            .workflow
            .offers_for_request(request_id)
            .await?
            .iter()
            .filter(|o| matches!(o.status, OfferStatus::Accepted | OfferStatus::Completed))
            .count())
    }
}

/// Yields before each gateway call so sibling futures get scheduled between them.
pub struct Interleaved {
    inner: Arc<dyn DocumentStore>,
}

impl Interleaved {
    pub fn new(inner: Arc<dyn DocumentStore>) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl DocumentStore for Interleaved {
    async fn list(&self, collection: Collection) -> anyhow::Result<Vec<Document>> {
        tokio::task::yield_now().await;
        self.inner.list(collection).await
    }

    async fn get(&self, collection: Collection, id: &str) -> anyhow::Result<Option<Document>> {
        tokio::task::yield_now().await;
        self.inner.get(collection, id).await
    }

    async fn create(&self, collection: Collection, fields: Value) -> anyhow::Result<Document> {
        tokio::task::yield_now().await;
        self.inner.create(collection, fields).await
    }

    async fn update(
        &self,
        collection: Collection,
        id: &str,
        patch: Value,
        expected_revision: Option<u64>,
    ) -> anyhow::Result<WriteOutcome> {
        tokio::task::yield_now().await;
        self.inner
            .update(collection, id, patch, expected_revision)
            .await
    }

    async fn delete(&self, collection: Collection, id: &str) -> anyhow::Result<bool> {
        tokio::task::yield_now().await;
        self.inner.delete(collection, id).await
    }
}

/// Gateway calls a [`Gate`] can hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Get,
    Update,
}

/// One parked call: `reached` fires when it arrives, `release` lets it through.
#[derive(Clone, Default)]
pub struct Hold {
    reached: Arc<Notify>,
    release: Arc<Notify>,
}

impl Hold {
    pub async fn reached(&self) {
        self.reached.notified().await;
    }

    pub fn release(&self) {
        self.release.notify_one();
    }
}

/// Parks the next matching gateway call until the test releases it, so a test
/// can run another operation to completion inside a chosen window.
pub struct Gate {
    inner: Arc<dyn DocumentStore>,
    armed: Mutex<Option<(Step, Collection, Hold)>>,
}

impl Gate {
    pub fn new(inner: Arc<dyn DocumentStore>) -> Self {
        Self {
            inner,
            armed: Mutex::new(None),
        }
    }

    /// Arms the gate for the next `step` on `collection`. Replaces any unfired hold.
    pub fn hold(&self, step: Step, collection: Collection) -> Hold {
        let hold = Hold::default();
        *self.armed.lock().unwrap_or_else(PoisonError::into_inner) =
            Some((step, collection, hold.clone()));
        hold
    }

    async fn pass(&self, step: Step, collection: Collection) {
        let fired = {
            let mut armed = self.armed.lock().unwrap_or_else(PoisonError::into_inner);
            match armed.take() {
                Some((s, c, hold)) if s == step && c == collection => Some(hold),
                other => {
                    *armed = other;
                    None
                }
            }
        };
        if let Some(hold) = fired {
            hold.reached.notify_one();
            hold.release.notified().await;
        }
    }
}

#[async_trait]
impl DocumentStore for Gate {
    async fn list(&self, collection: Collection) -> anyhow::Result<Vec<Document>> {
        self.inner.list(collection).await
    }

    async fn get(&self, collection: Collection, id: &str) -> anyhow::Result<Option<Document>> {
        self.pass(Step::Get, collection).await;
        self.inner.get(collection, id).await
    }

    async fn create(&self, collection: Collection, fields: Value) -> anyhow::Result<Document> {
        self.inner.create(collection, fields).await
    }

    async fn update(
        &self,
        collection: Collection,
        id: &str,
        patch: Value,
        expected_revision: Option<u64>,
    ) -> anyhow::Result<WriteOutcome> {
        self.pass(Step::Update, collection).await;
        self.inner
            .update(collection, id, patch, expected_revision)
            .await
    }

    async fn delete(&self, collection: Collection, id: &str) -> anyhow::Result<bool> {
        self.inner.delete(collection, id).await
    }
}

//! # Request/Offer Workflow Engine
//!
//! ```text
//! ServiceRequest: pending -> closed (an offer was accepted) -> fulfilled (it was completed)
//! Offer:          pending -> accepted -> completed -> rated (terminal)
//!                 pending -> rejected (terminal)
//! ```
//!
//! Decisions on an offer first commit a revision-guarded write on the parent request,
//! then a revision-guarded write on the offer itself. The request revision is the
//! arbiter: when two decisions race on one request, the later one fails with
//! `Conflict` instead of both succeeding. A decision interrupted between the two
//! writes leaves the request pointing at the offer and can simply be issued again.
//!
//! An accept whose offer write loses to a rejection after its close went through
//! reopens the request at the revision it wrote. If anyone touched the request
//! since, the reopen is refused and that later writer owns the outcome.

use std::collections::HashSet;

use chrono::Utc;
use tracing::{info, warn};

use crate::error::{AppError, Result};
use crate::models::{
    Category, NewOffer, NewServiceRequest, NotificationKind, Offer, OfferStatus, Post,
    RequestStatus, ServiceRequest, User,
};
use crate::notify::Notifier;
use crate::patch::{OfferRating, OfferStatusChange, PostRating, RequestDecision};
use crate::policy::{authorize, load_actor, Action, Target};
use crate::store::{EntityStore, Versioned};
use crate::validate;

#[derive(Clone)]
pub struct Workflow {
    store: EntityStore,
    notifier: Notifier,
}

/// An offer together with its parent request, both read for one decision.
struct Engagement {
    offer: Versioned<Offer>,
    request: Versioned<ServiceRequest>,
}

impl Workflow {
    pub fn new(store: EntityStore, notifier: Notifier) -> Self {
        Self { store, notifier }
    }

    /// Opens a pending request, optionally aimed at a listed post.
    pub async fn submit_request(
        &self,
        actor_id: &str,
        input: NewServiceRequest,
    ) -> Result<ServiceRequest> {
        let actor = load_actor(&self.store, actor_id).await?;
        authorize(Action::SubmitRequest, &actor, Target::None)?;
        let description = validate::required("description", &input.description)?;
        let location = validate::required("location", &input.location)?;
        let budget = input
            .budget
            .map(|b| validate::amount("budget", b))
            .transpose()?;

        let post = match input.post_id.as_deref() {
            Some(post_id) => Some(self.listed_post(post_id, &actor).await?),
            None => None,
        };

        let now = Utc::now();
        let draft = ServiceRequest {
            id: String::new(),
            post_id: post.as_ref().map(|p| p.id.clone()),
            requester_user_id: actor.id.clone(),
            service_type: input
                .service_type
                .or(post.as_ref().map(|p| p.category))
                .unwrap_or(Category::Other),
            description,
            location,
            budget,
            status: RequestStatus::Pending,
            accepted_offer_id: None,
            submitted_at: now,
            updated_at: now,
        };
        let request = self.store.create(&draft).await?.into_inner();
        info!(request = %request.id, requester = %actor.id, post = ?request.post_id, "service request submitted");

        if let Some(post) = post {
            self.notifier
                .dispatch(
                    &post.owner_user_id,
                    NotificationKind::Request,
                    format!("New service request for: {}", post.title),
                )
                .await?;
        }
        Ok(request)
    }

    async fn listed_post(&self, post_id: &str, requester: &User) -> Result<Post> {
        let post = self.store.get::<Post>(post_id).await?.into_inner();
        if post.deleted {
            return Err(AppError::invalid_state(format!(
                "post {post_id} is no longer listed"
            )));
        }
        if post.owner_user_id == requester.id {
            return Err(AppError::Conflict(
                "you cannot request your own service".to_string(),
            ));
        }
        Ok(post)
    }

    /// Places a pending offer on an open request and tells the request's target party.
    pub async fn submit_offer(
        &self,
        request_id: &str,
        actor_id: &str,
        input: NewOffer,
    ) -> Result<Offer> {
        let actor = load_actor(&self.store, actor_id).await?;
        authorize(Action::SubmitOffer, &actor, Target::None)?;
        let price = validate::amount("price", input.price)?;

        let request = self.store.get::<ServiceRequest>(request_id).await?;
        if request.requester_user_id == actor.id {
            return Err(AppError::Conflict(
                "you cannot make an offer on your own request".to_string(),
            ));
        }
        self.ensure_open(&request, None).await?;
        // Orders this offer against any accept racing on the same request.
        let request = self
            .store
            .commit(&request, &RequestDecision::touch())
            .await?;

        let draft = Offer {
            id: String::new(),
            request_id: request.id.clone(),
            offerer_user_id: actor.id.clone(),
            message: input.message.trim().to_string(),
            price,
            status: OfferStatus::Pending,
            rating: None,
            review: None,
            submitted_at: Utc::now(),
        };
        let offer = self.store.create(&draft).await?.into_inner();
        info!(offer = %offer.id, request = %request.id, offerer = %actor.id, "offer submitted");

        let (recipient, message) = self.offer_recipient(&request, &actor).await?;
        self.notifier
            .dispatch(&recipient, NotificationKind::Offer, message)
            .await?;
        Ok(offer)
    }

    /// The owner of the targeted post hears about new offers; for free-standing
    /// requests, or when the offer comes from that owner, the requester does.
    async fn offer_recipient(
        &self,
        request: &ServiceRequest,
        offerer: &User,
    ) -> Result<(String, String)> {
        if let Some(post_id) = request.post_id.as_deref() {
            if let Some(post) = self.store.find::<Post>(post_id).await? {
                if post.owner_user_id != offerer.id {
                    return Ok((
                        post.owner_user_id.clone(),
                        format!("New offer for your service: {}", post.title),
                    ));
                }
            }
        }
        Ok((
            request.requester_user_id.clone(),
            "New offer on your service request".to_string(),
        ))
    }

    /// Fails unless the request is pending and none of its offers (other than `except`) is engaged.
    async fn ensure_open(&self, request: &ServiceRequest, except: Option<&str>) -> Result<()> {
        if request.status != RequestStatus::Pending || request.accepted_offer_id.is_some() {
            return Err(AppError::invalid_state(format!(
                "request {} already has an accepted offer",
                request.id
            )));
        }
        let engaged = self
            .store
            .list_where(|o: &Offer| {
                o.request_id == request.id
                    && o.status.is_engaged()
                    && Some(o.id.as_str()) != except
            })
            .await?;
        if !engaged.is_empty() {
            return Err(AppError::invalid_state(format!(
                "request {} already has an accepted offer",
                request.id
            )));
        }
        Ok(())
    }

    /// Reads the request before the offer snapshot the decision acts on. A decision
    /// that finished in between shows in the offer; one still in flight has touched,
    /// or will touch, the request and so makes one of the two request writes stale.
    async fn engagement(&self, offer_id: &str, actor_id: &str, action: Action) -> Result<Engagement> {
        let actor = load_actor(&self.store, actor_id).await?;
        let request_id = self.store.get::<Offer>(offer_id).await?.into_inner().request_id;
        let request = self.store.get::<ServiceRequest>(&request_id).await?;
        authorize(action, &actor, Target::Request(&request.entity))?;
        let offer = self.store.get::<Offer>(offer_id).await?;
        Ok(Engagement { offer, request })
    }

    /// First accept wins; the request closes and every sibling offer becomes moot.
    pub async fn accept_offer(&self, offer_id: &str, actor_id: &str) -> Result<Offer> {
        let Engagement { offer, request } = self
            .engagement(offer_id, actor_id, Action::DecideOffer)
            .await?;
        if offer.status != OfferStatus::Pending {
            return Err(AppError::invalid_state(format!(
                "offer {offer_id} is already {}",
                offer.status
            )));
        }

        let resuming = request.status == RequestStatus::Closed
            && request.accepted_offer_id.as_deref() == Some(offer_id);
        if !resuming {
            self.ensure_open(&request, Some(offer_id)).await?;
        }
        // Re-closing on resume bumps the revision so a reopen racing with us goes stale.
        let closed = self
            .store
            .commit(&request, &RequestDecision::close(offer_id))
            .await?;

        let accepted = match self
            .store
            .commit(
                &offer,
                &OfferStatusChange {
                    status: OfferStatus::Accepted,
                },
            )
            .await
        {
            Ok(accepted) => accepted.into_inner(),
            Err(err @ AppError::Conflict(_)) => {
                self.reopen(&closed, offer_id).await;
                return Err(err);
            }
            Err(err) => return Err(err),
        };
        info!(offer = %accepted.id, request = %request.id, resumed = resuming, "offer accepted");

        self.notifier
            .dispatch(
                &accepted.offerer_user_id,
                NotificationKind::OfferAccepted,
                "Your offer has been accepted!".to_string(),
            )
            .await?;
        Ok(accepted)
    }

    /// Undoes our close once the offer is known to be rejected. A racing accept of the
    /// same offer may have won instead, and then the close must stand. A stale reopen
    /// means a later decision already owns the request.
    async fn reopen(&self, closed: &Versioned<ServiceRequest>, offer_id: &str) {
        match self.store.find::<Offer>(offer_id).await {
            Ok(Some(offer)) if offer.status == OfferStatus::Rejected => {}
            Ok(_) => return,
            Err(err) => {
                warn!(request = %closed.id, offer = offer_id, %err, "request left closed after lost accept");
                return;
            }
        }
        match self.store.commit(closed, &RequestDecision::reopen()).await {
            Ok(_) => info!(request = %closed.id, offer = offer_id, "request reopened after lost accept"),
            Err(err) => warn!(request = %closed.id, offer = offer_id, %err, "request left closed after lost accept"),
        }
    }

    pub async fn reject_offer(&self, offer_id: &str, actor_id: &str) -> Result<Offer> {
        let Engagement { offer, request } = self
            .engagement(offer_id, actor_id, Action::DecideOffer)
            .await?;
        if offer.status != OfferStatus::Pending {
            return Err(AppError::invalid_state(format!(
                "offer {offer_id} is already {}",
                offer.status
            )));
        }
        if request.status != RequestStatus::Pending {
            return Err(AppError::invalid_state(format!(
                "request {} already has an accepted offer",
                request.id
            )));
        }
        self.store
            .commit(&request, &RequestDecision::touch())
            .await?;

        let rejected = self
            .store
            .commit(
                &offer,
                &OfferStatusChange {
                    status: OfferStatus::Rejected,
                },
            )
            .await?
            .into_inner();
        info!(offer = %rejected.id, request = %request.id, "offer rejected");

        self.notifier
            .dispatch(
                &rejected.offerer_user_id,
                NotificationKind::OfferRejected,
                "Your offer has been rejected.".to_string(),
            )
            .await?;
        Ok(rejected)
    }

    /// Accepted → completed; the request becomes fulfilled.
    pub async fn mark_completed(&self, offer_id: &str, actor_id: &str) -> Result<Offer> {
        let Engagement { offer, request } = self
            .engagement(offer_id, actor_id, Action::CompleteOffer)
            .await?;
        if offer.status != OfferStatus::Accepted {
            return Err(AppError::invalid_state(format!(
                "offer {offer_id} is {}, only accepted offers can be completed",
                offer.status
            )));
        }
        if request.accepted_offer_id.as_deref() != Some(offer_id) {
            return Err(AppError::invalid_state(format!(
                "offer {offer_id} is not the accepted offer of request {}",
                request.id
            )));
        }
        if request.status == RequestStatus::Closed {
            self.store.commit(&request, &RequestDecision::fulfil()).await?;
        }

        let completed = self
            .store
            .commit(
                &offer,
                &OfferStatusChange {
                    status: OfferStatus::Completed,
                },
            )
            .await?
            .into_inner();
        info!(offer = %completed.id, request = %request.id, "offer completed");

        self.notifier
            .dispatch(
                &completed.offerer_user_id,
                NotificationKind::OfferCompleted,
                "Your service was marked as completed.".to_string(),
            )
            .await?;
        Ok(completed)
    }

    /// Sets the one-time rating on a completed offer. Terminal.
    pub async fn rate_offer(
        &self,
        offer_id: &str,
        actor_id: &str,
        rating: i64,
        review: Option<String>,
    ) -> Result<Offer> {
        let rating = validate::rating(rating)?;
        let review = validate::review(review)?;
        let Engagement { offer, request } = self
            .engagement(offer_id, actor_id, Action::RateOffer)
            .await?;
        if offer.status != OfferStatus::Completed {
            return Err(AppError::invalid_state(format!(
                "offer {offer_id} is {}, only completed offers can be rated",
                offer.status
            )));
        }
        if offer.rating.is_some() {
            return Err(AppError::invalid_state(format!(
                "offer {offer_id} was already rated"
            )));
        }

        let rated = self
            .store
            .commit(&offer, &OfferRating { rating, review })
            .await?
            .into_inner();
        info!(offer = %rated.id, rating, "offer rated");

        if let Some(post_id) = request.post_id.as_deref() {
            // Derived value; the next rating recomputes it from scratch.
            if let Err(err) = self.refresh_post_rating(post_id).await {
                warn!(post = post_id, %err, "post rating not refreshed");
            }
        }

        self.notifier
            .dispatch(
                &rated.offerer_user_id,
                NotificationKind::OfferRated,
                format!("You received a {rating}/5 rating."),
            )
            .await?;
        Ok(rated)
    }

    /// Post rating = mean of all rated offers on requests aimed at the post, one decimal.
    async fn refresh_post_rating(&self, post_id: &str) -> Result<()> {
        if self.store.find::<Post>(post_id).await?.is_none() {
            return Ok(());
        }
        let request_ids: HashSet<String> = self
            .store
            .list_where(|r: &ServiceRequest| r.post_id.as_deref() == Some(post_id))
            .await?
            .into_iter()
            .map(|r| r.entity.id)
            .collect();
        let ratings: Vec<u8> = self
            .store
            .list_where(|o: &Offer| request_ids.contains(&o.request_id))
            .await?
            .into_iter()
            .filter_map(|o| o.entity.rating)
            .collect();
        if ratings.is_empty() {
            return Ok(());
        }
        let mean = ratings.iter().map(|&r| f64::from(r)).sum::<f64>() / ratings.len() as f64;
        let rating = (mean * 10.0).round() / 10.0;
        self.store
            .overwrite::<Post, _>(post_id, &PostRating { rating })
            .await?;
        Ok(())
    }

    // ── Read accessors ──────────────────────────────────────────────────────

    pub async fn get_request(&self, request_id: &str) -> Result<ServiceRequest> {
        Ok(self.store.get::<ServiceRequest>(request_id).await?.into_inner())
    }

    /// All requests, newest first.
    pub async fn list_requests(&self) -> Result<Vec<ServiceRequest>> {
        let mut requests: Vec<ServiceRequest> = self
            .store
            .list::<ServiceRequest>()
            .await?
            .into_iter()
            .map(Versioned::into_inner)
            .collect();
        requests.sort_by(|a, b| b.submitted_at.cmp(&a.submitted_at));
        Ok(requests)
    }

    /// Requests opened by one user, newest first.
    pub async fn requests_by(&self, requester_id: &str) -> Result<Vec<ServiceRequest>> {
        let mut requests: Vec<ServiceRequest> = self
            .store
            .list_where(|r: &ServiceRequest| r.requester_user_id == requester_id)
            .await?
            .into_iter()
            .map(Versioned::into_inner)
            .collect();
        requests.sort_by(|a, b| b.submitted_at.cmp(&a.submitted_at));
        Ok(requests)
    }

    pub async fn get_offer(&self, offer_id: &str) -> Result<Offer> {
        Ok(self.store.get::<Offer>(offer_id).await?.into_inner())
    }

    /// Offers on one request in submission order.
    pub async fn offers_for_request(&self, request_id: &str) -> Result<Vec<Offer>> {
        let mut offers: Vec<Offer> = self
            .store
            .list_where(|o: &Offer| o.request_id == request_id)
            .await?
            .into_iter()
            .map(Versioned::into_inner)
            .collect();
        offers.sort_by(|a, b| a.submitted_at.cmp(&b.submitted_at));
        Ok(offers)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::{Collection, Document, MockDocumentStore, WriteOutcome};
    use serde_json::{json, Value};
    use std::sync::Arc;

    fn workflow(gateway: MockDocumentStore) -> Workflow {
        let store = EntityStore::new(Arc::new(gateway));
        Workflow::new(store.clone(), Notifier::new(store))
    }

    fn doc(id: &str, fields: Value) -> Document {
        Document {
            id: id.into(),
            revision: 1,
            fields,
        }
    }

    fn fixture(collection: Collection, id: &str) -> Document {
        match collection {
            Collection::Users => doc(
                id,
                json!({
                    "email": format!("{id}@example.com"),
                    "name": id,
                    "role": "user",
                    "blocked": false,
                    "points": 0
                }),
            ),
            Collection::ServiceRequests => doc(
                id,
                json!({
                    "postId": null,
                    "requesterUserId": "requester",
                    "serviceType": "repair",
                    "description": "leaking tap",
                    "location": "Durban",
                    "budget": 300.0,
                    "status": "pending",
                    "acceptedOfferId": null,
                    "submittedAt": "2024-05-01T10:00:00Z",
                    "updatedAt": "2024-05-01T10:00:00Z"
                }),
            ),
            _ => doc(
                id,
                json!({
                    "requestId": "r1",
                    "offererUserId": "offerer",
                    "message": "can do Tuesday",
                    "price": 40.0,
                    "status": "pending",
                    "rating": null,
                    "review": null,
                    "submittedAt": "2024-05-01T11:00:00Z"
                }),
            ),
        }
    }

    #[tokio::test]
    async fn out_of_range_rating_fails_before_any_read() {
        // No expectations: any gateway call would panic.
        let flow = workflow(MockDocumentStore::new());
        for stars in [0, 6] {
            let err = flow.rate_offer("o1", "requester", stars, None).await.unwrap_err();
            assert!(matches!(err, AppError::Validation(_)));
        }
    }

    #[tokio::test]
    async fn offering_on_own_request_is_conflict() {
        let mut gateway = MockDocumentStore::new();
        gateway
            .expect_get()
            .returning(|collection, id| Ok(Some(fixture(collection, id))));
        gateway.expect_update().never();
        gateway.expect_create().never();

        let input = NewOffer {
            message: "I'll do it myself".into(),
            price: 10.0,
        };
        let err = workflow(gateway)
            .submit_offer("r1", "requester", input)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[tokio::test]
    async fn failed_notification_keeps_committed_rejection() {
        let mut gateway = MockDocumentStore::new();
        gateway
            .expect_get()
            .returning(|collection, id| Ok(Some(fixture(collection, id))));
        gateway
            .expect_update()
            .times(2)
            .returning(|collection, id, patch, _| {
                let mut fields = fixture(collection, id).fields;
                if let (Value::Object(base), Value::Object(patch)) = (&mut fields, patch) {
                    base.extend(patch);
                }
                Ok(WriteOutcome::Applied(Document {
                    id: id.into(),
                    revision: 2,
                    fields,
                }))
            });
        gateway
            .expect_create()
            .withf(|collection, _| *collection == Collection::Notifications)
            .returning(|_, _| Err(anyhow::anyhow!("quota exceeded")));

        let err = workflow(gateway)
            .reject_offer("o1", "requester")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Internal(msg) if msg.contains("quota exceeded")));
    }

    #[tokio::test]
    async fn stranger_cannot_accept() {
        let mut gateway = MockDocumentStore::new();
        gateway
            .expect_get()
            .returning(|collection, id| Ok(Some(fixture(collection, id))));
        gateway.expect_update().never();

        let err = workflow(gateway)
            .accept_offer("o1", "stranger")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Authorization(_)));
    }
}

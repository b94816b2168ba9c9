//! # Authorization Policy
//!
//! One decision function keyed by (action, actor, target). Engine operations call
//! [`authorize`] instead of comparing roles and ids inline, and UI collaborators can
//! call [`evaluate`] to decide which controls to show, so the two never drift apart.

use tracing::warn;

use crate::error::{AppError, Result};
use crate::models::{Notification, Post, ServiceRequest, User};
use crate::store::EntityStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    SubmitRequest,
    SubmitOffer,
    /// Accept or reject an offer
    DecideOffer,
    CompleteOffer,
    RateOffer,
    CreatePost,
    EditPost,
    DeletePost,
    RestorePost,
    /// Like, favorite, report
    ReactToPost,
    SubmitToolRequest,
    ReadNotification,
    /// Any admin-only user or tool-request operation
    Moderate,
}

#[derive(Debug, Clone, Copy)]
pub enum Target<'a> {
    None,
    Request(&'a ServiceRequest),
    Post(&'a Post),
    Notification(&'a Notification),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny(&'static str),
}

pub fn evaluate(action: Action, actor: &User, target: Target<'_>) -> Decision {
    use Action::*;

    // Blocked accounts keep read access and can still clear their inbox.
    if actor.blocked && action != ReadNotification {
        return Decision::Deny("account is blocked");
    }

    match (action, target) {
        (SubmitRequest | SubmitOffer | CreatePost | ReactToPost | SubmitToolRequest, _) => {
            Decision::Allow
        }
        (DecideOffer | CompleteOffer | RateOffer, Target::Request(request)) => {
            if request.requester_user_id == actor.id {
                Decision::Allow
            } else {
                Decision::Deny("only the requester can act on offers")
            }
        }
        (EditPost | DeletePost, Target::Post(post)) => {
            if post.owner_user_id == actor.id || actor.is_admin() {
                Decision::Allow
            } else {
                Decision::Deny("only the owner or an admin can change this post")
            }
        }
        (RestorePost | Moderate, _) => {
            if actor.is_admin() {
                Decision::Allow
            } else {
                Decision::Deny("admin role required")
            }
        }
        (ReadNotification, Target::Notification(notification)) => {
            if notification.recipient_user_id == actor.id {
                Decision::Allow
            } else {
                Decision::Deny("notification belongs to another user")
            }
        }
        _ => Decision::Deny("action does not apply to this target"),
    }
}

/// Loads the acting user fresh for this call, so a block or role change applies immediately.
pub async fn load_actor(store: &EntityStore, actor_id: &str) -> Result<User> {
    match store.find::<User>(actor_id).await? {
        Some(user) => Ok(user.into_inner()),
        None => {
            warn!(actor = actor_id, "unknown actor");
            Err(AppError::Authorization("unknown actor".to_string()))
        }
    }
}

/// [`evaluate`], turned into an `Authorization` error on deny.
pub fn authorize(action: Action, actor: &User, target: Target<'_>) -> Result<()> {
    match evaluate(action, actor, target) {
        Decision::Allow => Ok(()),
        Decision::Deny(reason) => {
            warn!(actor = %actor.id, ?action, reason, "authorization denied");
            Err(AppError::Authorization(reason.to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Category, NotificationKind, RequestStatus, Role};
    use chrono::Utc;
    use std::collections::BTreeSet;

    fn user(id: &str, role: Role) -> User {
        User {
            id: id.into(),
            email: format!("{id}@example.com"),
            name: id.into(),
            role,
            blocked: false,
            badges: BTreeSet::new(),
            points: 0,
        }
    }

    fn request(requester: &str) -> ServiceRequest {
        ServiceRequest {
            id: "r1".into(),
            post_id: None,
            requester_user_id: requester.into(),
            service_type: Category::Repair,
            description: "leaking tap".into(),
            location: "Durban".into(),
            budget: Some(300.0),
            status: RequestStatus::Pending,
            accepted_offer_id: None,
            submitted_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn post(owner: &str) -> Post {
        Post {
            id: "p1".into(),
            owner_user_id: owner.into(),
            title: "Plumbing Repair".into(),
            description: "Fix leaks".into(),
            category: Category::Repair,
            price: 50.0,
            price_unit: "per job".into(),
            location: "Los Angeles".into(),
            availability: "24/7".into(),
            rating: 0.0,
            likes: BTreeSet::new(),
            favorites: BTreeSet::new(),
            reports: BTreeSet::new(),
            deleted: false,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn only_requester_decides_offers() {
        let r = request("req");
        let requester = user("req", Role::User);
        let stranger = user("other", Role::User);
        let admin = user("root", Role::Admin);

        assert_eq!(
            evaluate(Action::DecideOffer, &requester, Target::Request(&r)),
            Decision::Allow
        );
        assert!(matches!(
            evaluate(Action::DecideOffer, &stranger, Target::Request(&r)),
            Decision::Deny(_)
        ));
        // Admins moderate, they do not run other people's engagements.
        assert!(matches!(
            evaluate(Action::RateOffer, &admin, Target::Request(&r)),
            Decision::Deny(_)
        ));
    }

    #[test]
    fn owner_or_admin_deletes_posts_but_only_admin_restores() {
        let p = post("owner");
        let owner = user("owner", Role::User);
        let admin = user("root", Role::Admin);
        let stranger = user("x", Role::User);

        assert_eq!(evaluate(Action::DeletePost, &owner, Target::Post(&p)), Decision::Allow);
        assert_eq!(evaluate(Action::DeletePost, &admin, Target::Post(&p)), Decision::Allow);
        assert!(authorize(Action::DeletePost, &stranger, Target::Post(&p)).is_err());
        assert!(authorize(Action::RestorePost, &owner, Target::Post(&p)).is_err());
        assert!(authorize(Action::RestorePost, &admin, Target::Post(&p)).is_ok());
    }

    #[test]
    fn blocked_actor_is_denied_everything_but_inbox() {
        let mut blocked = user("b", Role::Admin);
        blocked.blocked = true;
        let note = Notification {
            id: "n1".into(),
            recipient_user_id: "b".into(),
            message: "hi".into(),
            kind: NotificationKind::Offer,
            read: false,
            created_at: Utc::now(),
        };

        assert_eq!(
            authorize(Action::SubmitRequest, &blocked, Target::None),
            Err(AppError::Authorization("account is blocked".into()))
        );
        assert!(authorize(Action::Moderate, &blocked, Target::None).is_err());
        assert!(authorize(Action::ReadNotification, &blocked, Target::Notification(&note)).is_ok());
    }

    #[test]
    fn mismatched_target_is_denied() {
        let actor = user("a", Role::User);
        assert!(matches!(
            evaluate(Action::DecideOffer, &actor, Target::None),
            Decision::Deny(_)
        ));
    }
}

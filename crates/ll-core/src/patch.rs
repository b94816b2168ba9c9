//! Per-transition write structs.
//!
//! Each struct lists exactly the fields one operation may change. There is no
//! generic "update anything" path, so protected fields such as `status` can only
//! move through the operation that owns them.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::models::{
    Notification, Offer, OfferStatus, Post, PostEdit, RequestStatus, ServiceRequest, ToolRequest,
    ToolRequestStatus, User, UserEdit, UserId,
};
use crate::store::Patch;

/// Touches a request on every offer decision; optionally closes, reopens or fulfils it.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestDecision {
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<RequestStatus>,
    /// Outer `None` leaves the field alone; `Some(None)` clears it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub accepted_offer_id: Option<Option<String>>,
}

impl RequestDecision {
    /// Bumps the request revision without changing its state.
    pub fn touch() -> Self {
        Self {
            updated_at: Utc::now(),
            status: None,
            accepted_offer_id: None,
        }
    }

    pub fn close(offer_id: &str) -> Self {
        Self {
            updated_at: Utc::now(),
            status: Some(RequestStatus::Closed),
            accepted_offer_id: Some(Some(offer_id.to_string())),
        }
    }

    /// Undoes a close whose offer write lost its race.
    pub fn reopen() -> Self {
        Self {
            updated_at: Utc::now(),
            status: Some(RequestStatus::Pending),
            accepted_offer_id: Some(None),
        }
    }

    pub fn fulfil() -> Self {
        Self {
            updated_at: Utc::now(),
            status: Some(RequestStatus::Fulfilled),
            accepted_offer_id: None,
        }
    }
}

impl Patch<ServiceRequest> for RequestDecision {}

#[derive(Debug, Serialize)]
pub struct OfferStatusChange {
    pub status: OfferStatus,
}

impl Patch<Offer> for OfferStatusChange {}

#[derive(Debug, Serialize)]
pub struct OfferRating {
    pub rating: u8,
    pub review: Option<String>,
}

impl Patch<Offer> for OfferRating {}

impl Patch<Post> for PostEdit {}

#[derive(Debug, Serialize)]
pub struct PostVisibility {
    pub deleted: bool,
}

impl Patch<Post> for PostVisibility {}

#[derive(Debug, Serialize)]
pub struct PostLikes {
    pub likes: BTreeSet<UserId>,
}

impl Patch<Post> for PostLikes {}

#[derive(Debug, Serialize)]
pub struct PostFavorites {
    pub favorites: BTreeSet<UserId>,
}

impl Patch<Post> for PostFavorites {}

#[derive(Debug, Serialize)]
pub struct PostReports {
    pub reports: BTreeSet<UserId>,
}

impl Patch<Post> for PostReports {}

#[derive(Debug, Serialize)]
pub struct PostRating {
    pub rating: f64,
}

impl Patch<Post> for PostRating {}

impl Patch<User> for UserEdit {}

#[derive(Debug, Serialize)]
pub struct UserBlock {
    pub blocked: bool,
}

impl Patch<User> for UserBlock {}

#[derive(Debug, Serialize)]
pub struct UserBadges {
    pub badges: BTreeSet<String>,
}

impl Patch<User> for UserBadges {}

#[derive(Debug, Serialize)]
pub struct UserPoints {
    pub points: i64,
}

impl Patch<User> for UserPoints {}

#[derive(Debug, Serialize)]
pub struct ToolRequestResolution {
    pub status: ToolRequestStatus,
}

impl Patch<ToolRequest> for ToolRequestResolution {}

#[derive(Debug, Serialize)]
pub struct NotificationRead {
    pub read: bool,
}

impl Patch<Notification> for NotificationRead {}

//! # Domain Models
//!
//! These structs represent the core entities of the linklocal marketplace.
//! Identifiers are opaque strings assigned by the document store at creation time.
//! Field names serialize in camelCase, which is the shape stored in the document store.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::AppError;

pub type UserId = String;
pub type PostId = String;
pub type RequestId = String;
pub type OfferId = String;
pub type NotificationId = String;
pub type ToolRequestId = String;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Admin,
}

/// A registered marketplace member.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: UserId,
    /// Unique across users, compared case-insensitively
    pub email: String,
    pub name: String,
    pub role: Role,
    pub blocked: bool,
    #[serde(default)]
    pub badges: BTreeSet<String>,
    /// Reward balance; never negative
    pub points: i64,
}

impl User {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

/// Service categories offered in the marketplace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Cleaning,
    Repair,
    Tutoring,
    Gardening,
    Other,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Cleaning => "cleaning",
            Category::Repair => "repair",
            Category::Tutoring => "tutoring",
            Category::Gardening => "gardening",
            Category::Other => "other",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "cleaning" => Ok(Category::Cleaning),
            "repair" => Ok(Category::Repair),
            "tutoring" => Ok(Category::Tutoring),
            "gardening" => Ok(Category::Gardening),
            "other" => Ok(Category::Other),
            other => Err(AppError::validation(format!("unknown category '{other}'"))),
        }
    }
}

/// A published service offering.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Post {
    pub id: PostId,
    pub owner_user_id: UserId,
    pub title: String,
    pub description: String,
    pub category: Category,
    pub price: f64,
    /// e.g. "per hour", "per job"
    pub price_unit: String,
    pub location: String,
    pub availability: String,
    /// Mean of the ratings left on completed engagements for this post
    pub rating: f64,
    #[serde(default)]
    pub likes: BTreeSet<UserId>,
    #[serde(default)]
    pub favorites: BTreeSet<UserId>,
    #[serde(default)]
    pub reports: BTreeSet<UserId>,
    /// Soft-delete flag; deleted posts leave discovery but stay admin-visible
    pub deleted: bool,
    pub created_at: DateTime<Utc>,
}

impl Post {
    pub fn like_count(&self) -> usize {
        self.likes.len()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestStatus {
    /// Collecting offers
    Pending,
    /// An offer was accepted; no further offers are taken
    Closed,
    /// The accepted offer was completed
    Fulfilled,
}

/// A request by one user for a service, optionally targeting a specific Post.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceRequest {
    pub id: RequestId,
    pub post_id: Option<PostId>,
    pub requester_user_id: UserId,
    pub service_type: Category,
    pub description: String,
    pub location: String,
    pub budget: Option<f64>,
    pub status: RequestStatus,
    /// Set when the request closes; names the one offer that won
    pub accepted_offer_id: Option<OfferId>,
    pub submitted_at: DateTime<Utc>,
    /// Bumped by every offer decision so concurrent decisions on one request serialize
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OfferStatus {
    Pending,
    Accepted,
    Rejected,
    Completed,
}

impl OfferStatus {
    /// True for the statuses of which at most one offer per request may hold.
    pub fn is_engaged(&self) -> bool {
        matches!(self, OfferStatus::Accepted | OfferStatus::Completed)
    }
}

impl fmt::Display for OfferStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            OfferStatus::Pending => "pending",
            OfferStatus::Accepted => "accepted",
            OfferStatus::Rejected => "rejected",
            OfferStatus::Completed => "completed",
        };
        f.write_str(s)
    }
}

/// A bid by a third party against a ServiceRequest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Offer {
    pub id: OfferId,
    pub request_id: RequestId,
    pub offerer_user_id: UserId,
    pub message: String,
    pub price: f64,
    pub status: OfferStatus,
    /// 1..=5, set once after completion
    pub rating: Option<u8>,
    pub review: Option<String>,
    pub submitted_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    Request,
    Offer,
    OfferAccepted,
    OfferRejected,
    OfferCompleted,
    OfferRated,
    ToolRequest,
}

/// A fan-out record addressed to one user, created only as a side effect of a transition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: NotificationId,
    pub recipient_user_id: UserId,
    pub message: String,
    #[serde(rename = "type")]
    pub kind: NotificationKind,
    pub read: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolRequestStatus {
    Pending,
    Approved,
    Denied,
}

/// A user's request for the platform to add a tool; resolved by an admin.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolRequest {
    pub id: ToolRequestId,
    pub requester_user_id: UserId,
    pub tool_name: String,
    pub description: String,
    pub status: ToolRequestStatus,
    pub submitted_at: DateTime<Utc>,
}

// ── Operation inputs ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewUser {
    pub email: String,
    pub name: String,
}

/// Admin-side profile edit. Absent fields stay untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserEdit {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewPost {
    pub title: String,
    pub description: String,
    pub category: Category,
    pub price: f64,
    pub price_unit: String,
    pub location: String,
    pub availability: String,
}

/// Owner-side post edit. Absent fields stay untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostEdit {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<Category>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price_unit: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub availability: Option<String>,
}

/// Discovery filter: free-text term over title/description plus optional category.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PostQuery {
    pub term: Option<String>,
    pub category: Option<Category>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewServiceRequest {
    pub post_id: Option<PostId>,
    /// Defaults to the targeted post's category, or `other` for free-standing requests
    pub service_type: Option<Category>,
    pub description: String,
    pub location: String,
    pub budget: Option<f64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewOffer {
    pub message: String,
    pub price: f64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewToolRequest {
    pub tool_name: String,
    pub description: String,
}

/// Admin search results across the three moderated collections.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminSearch {
    pub users: Vec<User>,
    pub posts: Vec<Post>,
    pub tool_requests: Vec<ToolRequest>,
}

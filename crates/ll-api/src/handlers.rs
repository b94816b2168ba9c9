//! # ll-api Handlers
//!
//! Thin translation between HTTP and the engine: every handler resolves the
//! caller, calls exactly one engine operation and serializes its result.

use std::sync::Arc;

use actix_web::{web, HttpResponse};
use ll_core::models::{
    NewOffer, NewPost, NewServiceRequest, NewToolRequest, NewUser, Post, PostEdit, PostQuery,
    UserEdit,
};
use ll_core::traits::IdentityProvider;
use ll_core::{validate, AppError, Marketplace, Reaction};
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::auth::CurrentUser;
use crate::error::ApiError;

/// The engine and the identity plugin, shared by every worker.
pub struct AppState {
    pub market: Marketplace,
    pub identity: Arc<dyn IdentityProvider>,
}

type Reply = Result<HttpResponse, ApiError>;

/// A post as the UI sees it, with the derived like count alongside the raw sets.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PostView {
    #[serde(flatten)]
    pub post: Post,
    pub like_count: usize,
}

impl From<Post> for PostView {
    fn from(post: Post) -> Self {
        let like_count = post.like_count();
        Self { post, like_count }
    }
}

fn posts_view(posts: Vec<Post>) -> Vec<PostView> {
    posts.into_iter().map(PostView::from).collect()
}

// ── Auth ────────────────────────────────────────────────────────────────────

#[derive(Deserialize)]
pub struct RegisterBody {
    pub email: String,
    pub password: String,
    pub name: String,
}

#[derive(Deserialize)]
pub struct LoginBody {
    pub email: String,
    pub password: String,
}

/// Creates credentials, then the marketplace User they sign in as.
///
/// # Developer Note
/// Sign-in maps a principal onto a User by email, so credentials are only minted
/// for an email no User holds yet, and are withdrawn again if the User cannot be
/// created.
pub async fn register(data: web::Data<AppState>, body: web::Json<RegisterBody>) -> Reply {
    let body = body.into_inner();
    let email = data.market.catalog.email_available(&body.email).await?;
    validate::required("name", &body.name)?;

    let principal = data
        .identity
        .register(&email, &body.password)
        .await
        .map_err(|e| AppError::validation(e.to_string()))?;
    let created = data
        .market
        .catalog
        .register_user(NewUser {
            email,
            name: body.name,
        })
        .await;
    match created {
        Ok(user) => Ok(HttpResponse::Created().json(user)),
        Err(err) => {
            if let Err(cleanup) = data.identity.unregister(&principal).await {
                error!(uid = %principal.uid, %cleanup, "orphan credentials left behind");
            }
            Err(err.into())
        }
    }
}

pub async fn login(data: web::Data<AppState>, body: web::Json<LoginBody>) -> Reply {
    match data.identity.sign_in(&body.email, &body.password).await? {
        Some(session) => Ok(HttpResponse::Ok().json(session)),
        None => Err(ApiError::Unauthenticated),
    }
}

pub async fn logout(data: web::Data<AppState>, me: CurrentUser) -> Reply {
    data.identity.sign_out(&me.token).await?;
    info!(user = %me.user.id, "signed out");
    Ok(HttpResponse::NoContent().finish())
}

pub async fn me(me: CurrentUser) -> Reply {
    Ok(HttpResponse::Ok().json(me.user))
}

pub async fn my_posts(data: web::Data<AppState>, me: CurrentUser) -> Reply {
    let posts = data.market.catalog.posts_by(&me.user.id).await?;
    Ok(HttpResponse::Ok().json(posts_view(posts)))
}

pub async fn my_requests(data: web::Data<AppState>, me: CurrentUser) -> Reply {
    let requests = data.market.workflow.requests_by(&me.user.id).await?;
    Ok(HttpResponse::Ok().json(requests))
}

// ── Posts ───────────────────────────────────────────────────────────────────

pub async fn discover_posts(data: web::Data<AppState>, query: web::Query<PostQuery>) -> Reply {
    let posts = data.market.catalog.discover_posts(&query).await?;
    Ok(HttpResponse::Ok().json(posts_view(posts)))
}

pub async fn create_post(
    data: web::Data<AppState>,
    me: CurrentUser,
    body: web::Json<NewPost>,
) -> Reply {
    let post = data
        .market
        .catalog
        .create_post(&me.user.id, body.into_inner())
        .await?;
    Ok(HttpResponse::Created().json(PostView::from(post)))
}

pub async fn get_post(data: web::Data<AppState>, path: web::Path<String>) -> Reply {
    let post = data.market.catalog.get_post(&path).await?;
    Ok(HttpResponse::Ok().json(PostView::from(post)))
}

pub async fn update_post(
    data: web::Data<AppState>,
    me: CurrentUser,
    path: web::Path<String>,
    body: web::Json<PostEdit>,
) -> Reply {
    let post = data
        .market
        .catalog
        .update_post(&path, &me.user.id, body.into_inner())
        .await?;
    Ok(HttpResponse::Ok().json(PostView::from(post)))
}

pub async fn delete_post(
    data: web::Data<AppState>,
    me: CurrentUser,
    path: web::Path<String>,
) -> Reply {
    let post = data.market.moderation.delete_post(&path, &me.user.id).await?;
    Ok(HttpResponse::Ok().json(PostView::from(post)))
}

async fn react(data: &AppState, me: &CurrentUser, post_id: &str, reaction: Reaction) -> Reply {
    let post = data
        .market
        .catalog
        .react(post_id, &me.user.id, reaction)
        .await?;
    Ok(HttpResponse::Ok().json(PostView::from(post)))
}

pub async fn like_post(data: web::Data<AppState>, me: CurrentUser, path: web::Path<String>) -> Reply {
    react(&data, &me, &path, Reaction::Like).await
}

pub async fn favorite_post(
    data: web::Data<AppState>,
    me: CurrentUser,
    path: web::Path<String>,
) -> Reply {
    react(&data, &me, &path, Reaction::Favorite).await
}

pub async fn report_post(
    data: web::Data<AppState>,
    me: CurrentUser,
    path: web::Path<String>,
) -> Reply {
    react(&data, &me, &path, Reaction::Report).await
}

// ── Requests & offers ───────────────────────────────────────────────────────

pub async fn list_requests(data: web::Data<AppState>, _me: CurrentUser) -> Reply {
    Ok(HttpResponse::Ok().json(data.market.workflow.list_requests().await?))
}

pub async fn submit_request(
    data: web::Data<AppState>,
    me: CurrentUser,
    body: web::Json<NewServiceRequest>,
) -> Reply {
    let request = data
        .market
        .workflow
        .submit_request(&me.user.id, body.into_inner())
        .await?;
    Ok(HttpResponse::Created().json(request))
}

pub async fn get_request(
    data: web::Data<AppState>,
    _me: CurrentUser,
    path: web::Path<String>,
) -> Reply {
    Ok(HttpResponse::Ok().json(data.market.workflow.get_request(&path).await?))
}

pub async fn list_offers(
    data: web::Data<AppState>,
    _me: CurrentUser,
    path: web::Path<String>,
) -> Reply {
    Ok(HttpResponse::Ok().json(data.market.workflow.offers_for_request(&path).await?))
}

pub async fn submit_offer(
    data: web::Data<AppState>,
    me: CurrentUser,
    path: web::Path<String>,
    body: web::Json<NewOffer>,
) -> Reply {
    let offer = data
        .market
        .workflow
        .submit_offer(&path, &me.user.id, body.into_inner())
        .await?;
    Ok(HttpResponse::Created().json(offer))
}

pub async fn accept_offer(
    data: web::Data<AppState>,
    me: CurrentUser,
    path: web::Path<String>,
) -> Reply {
    let offer = data.market.workflow.accept_offer(&path, &me.user.id).await?;
    Ok(HttpResponse::Ok().json(offer))
}

pub async fn reject_offer(
    data: web::Data<AppState>,
    me: CurrentUser,
    path: web::Path<String>,
) -> Reply {
    let offer = data.market.workflow.reject_offer(&path, &me.user.id).await?;
    Ok(HttpResponse::Ok().json(offer))
}

pub async fn complete_offer(
    data: web::Data<AppState>,
    me: CurrentUser,
    path: web::Path<String>,
) -> Reply {
    let offer = data.market.workflow.mark_completed(&path, &me.user.id).await?;
    Ok(HttpResponse::Ok().json(offer))
}

#[derive(Deserialize)]
pub struct RateBody {
    pub rating: i64,
    pub review: Option<String>,
}

pub async fn rate_offer(
    data: web::Data<AppState>,
    me: CurrentUser,
    path: web::Path<String>,
    body: web::Json<RateBody>,
) -> Reply {
    let RateBody { rating, review } = body.into_inner();
    let offer = data
        .market
        .workflow
        .rate_offer(&path, &me.user.id, rating, review)
        .await?;
    Ok(HttpResponse::Ok().json(offer))
}

// ── Notifications ───────────────────────────────────────────────────────────

#[derive(Deserialize)]
pub struct InboxQuery {
    #[serde(default)]
    pub unread: bool,
}

pub async fn notifications(
    data: web::Data<AppState>,
    me: CurrentUser,
    query: web::Query<InboxQuery>,
) -> Reply {
    let inbox = data
        .market
        .notifications
        .list_for_user(&me.user.id, query.unread)
        .await?;
    Ok(HttpResponse::Ok().json(inbox))
}

pub async fn mark_read(
    data: web::Data<AppState>,
    me: CurrentUser,
    path: web::Path<String>,
) -> Reply {
    let note = data
        .market
        .notifications
        .mark_read(&path, &me.user.id)
        .await?;
    Ok(HttpResponse::Ok().json(note))
}

pub async fn mark_all_read(data: web::Data<AppState>, me: CurrentUser) -> Reply {
    let updated = data.market.notifications.mark_all_read(&me.user.id).await?;
    Ok(HttpResponse::Ok().json(serde_json::json!({ "updated": updated })))
}

// ── Tool requests ───────────────────────────────────────────────────────────

pub async fn submit_tool_request(
    data: web::Data<AppState>,
    me: CurrentUser,
    body: web::Json<NewToolRequest>,
) -> Reply {
    let request = data
        .market
        .moderation
        .submit_tool_request(&me.user.id, body.into_inner())
        .await?;
    Ok(HttpResponse::Created().json(request))
}

// ── Admin ───────────────────────────────────────────────────────────────────

pub async fn admin_users(data: web::Data<AppState>, me: CurrentUser) -> Reply {
    Ok(HttpResponse::Ok().json(data.market.moderation.list_users(&me.user.id).await?))
}

pub async fn admin_update_user(
    data: web::Data<AppState>,
    me: CurrentUser,
    path: web::Path<String>,
    body: web::Json<UserEdit>,
) -> Reply {
    let user = data
        .market
        .moderation
        .update_user(&path, &me.user.id, body.into_inner())
        .await?;
    Ok(HttpResponse::Ok().json(user))
}

pub async fn admin_delete_user(
    data: web::Data<AppState>,
    me: CurrentUser,
    path: web::Path<String>,
) -> Reply {
    data.market.moderation.delete_user(&path, &me.user.id).await?;
    Ok(HttpResponse::NoContent().finish())
}

pub async fn admin_block_user(
    data: web::Data<AppState>,
    me: CurrentUser,
    path: web::Path<String>,
) -> Reply {
    let user = data.market.moderation.block_user(&path, &me.user.id).await?;
    Ok(HttpResponse::Ok().json(user))
}

pub async fn admin_unblock_user(
    data: web::Data<AppState>,
    me: CurrentUser,
    path: web::Path<String>,
) -> Reply {
    let user = data.market.moderation.unblock_user(&path, &me.user.id).await?;
    Ok(HttpResponse::Ok().json(user))
}

#[derive(Deserialize)]
pub struct BadgeBody {
    pub badge: String,
}

pub async fn admin_assign_badge(
    data: web::Data<AppState>,
    me: CurrentUser,
    path: web::Path<String>,
    body: web::Json<BadgeBody>,
) -> Reply {
    let user = data
        .market
        .moderation
        .assign_badge(&path, &me.user.id, &body.badge)
        .await?;
    Ok(HttpResponse::Ok().json(user))
}

#[derive(Deserialize)]
pub struct PointsBody {
    pub amount: i64,
}

pub async fn admin_grant_points(
    data: web::Data<AppState>,
    me: CurrentUser,
    path: web::Path<String>,
    body: web::Json<PointsBody>,
) -> Reply {
    let user = data
        .market
        .moderation
        .grant_points(&path, &me.user.id, body.amount)
        .await?;
    Ok(HttpResponse::Ok().json(user))
}

pub async fn admin_posts(data: web::Data<AppState>, me: CurrentUser) -> Reply {
    let posts = data.market.catalog.list_all_posts(&me.user.id).await?;
    Ok(HttpResponse::Ok().json(posts_view(posts)))
}

pub async fn admin_repost(
    data: web::Data<AppState>,
    me: CurrentUser,
    path: web::Path<String>,
) -> Reply {
    let post = data.market.moderation.repost(&path, &me.user.id).await?;
    Ok(HttpResponse::Ok().json(PostView::from(post)))
}

pub async fn admin_tool_requests(data: web::Data<AppState>, me: CurrentUser) -> Reply {
    let requests = data.market.moderation.list_tool_requests(&me.user.id).await?;
    Ok(HttpResponse::Ok().json(requests))
}

#[derive(Deserialize)]
pub struct ResolveBody {
    pub approved: bool,
}

pub async fn admin_resolve_tool_request(
    data: web::Data<AppState>,
    me: CurrentUser,
    path: web::Path<String>,
    body: web::Json<ResolveBody>,
) -> Reply {
    let request = data
        .market
        .moderation
        .resolve_tool_request(&path, &me.user.id, body.approved)
        .await?;
    Ok(HttpResponse::Ok().json(request))
}

#[derive(Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    pub term: String,
}

pub async fn admin_search(
    data: web::Data<AppState>,
    me: CurrentUser,
    query: web::Query<SearchQuery>,
) -> Reply {
    let results = data
        .market
        .moderation
        .admin_search(&me.user.id, &query.term)
        .await?;
    Ok(HttpResponse::Ok().json(results))
}

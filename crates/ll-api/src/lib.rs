//! # ll-api
//!
//! The JSON surface of linklocal: routes UI collaborators call to drive the engine.

pub mod auth;
pub mod error;
pub mod handlers;
pub mod middleware;

use actix_web::web;

/// Configures every route of the marketplace API.
///
/// # Developer Note
/// Routes hang off one empty scope so the binary can nest the whole surface
/// under a prefix without touching the paths below.
pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("")
            // Identity
            .route("/auth/register", web::post().to(handlers::register))
            .route("/auth/login", web::post().to(handlers::login))
            .route("/auth/logout", web::post().to(handlers::logout))
            .route("/me", web::get().to(handlers::me))
            .route("/me/posts", web::get().to(handlers::my_posts))
            .route("/me/requests", web::get().to(handlers::my_requests))
            // Posts
            .route("/posts", web::get().to(handlers::discover_posts))
            .route("/posts", web::post().to(handlers::create_post))
            .route("/posts/{id}", web::get().to(handlers::get_post))
            .route("/posts/{id}", web::patch().to(handlers::update_post))
            .route("/posts/{id}", web::delete().to(handlers::delete_post))
            .route("/posts/{id}/like", web::post().to(handlers::like_post))
            .route("/posts/{id}/favorite", web::post().to(handlers::favorite_post))
            .route("/posts/{id}/report", web::post().to(handlers::report_post))
            // Requests and offers
            .route("/requests", web::get().to(handlers::list_requests))
            .route("/requests", web::post().to(handlers::submit_request))
            .route("/requests/{id}", web::get().to(handlers::get_request))
            .route("/requests/{id}/offers", web::get().to(handlers::list_offers))
            .route("/requests/{id}/offers", web::post().to(handlers::submit_offer))
            .route("/offers/{id}/accept", web::post().to(handlers::accept_offer))
            .route("/offers/{id}/reject", web::post().to(handlers::reject_offer))
            .route("/offers/{id}/complete", web::post().to(handlers::complete_offer))
            .route("/offers/{id}/rate", web::post().to(handlers::rate_offer))
            // Inbox
            .route("/notifications", web::get().to(handlers::notifications))
            .route("/notifications/read-all", web::post().to(handlers::mark_all_read))
            .route("/notifications/{id}/read", web::post().to(handlers::mark_read))
            // Tool requests
            .route("/tool-requests", web::post().to(handlers::submit_tool_request))
            // Moderation
            .route("/admin/users", web::get().to(handlers::admin_users))
            .route("/admin/users/{id}", web::patch().to(handlers::admin_update_user))
            .route("/admin/users/{id}", web::delete().to(handlers::admin_delete_user))
            .route("/admin/users/{id}/block", web::post().to(handlers::admin_block_user))
            .route("/admin/users/{id}/unblock", web::post().to(handlers::admin_unblock_user))
            .route("/admin/users/{id}/badges", web::post().to(handlers::admin_assign_badge))
            .route("/admin/users/{id}/points", web::post().to(handlers::admin_grant_points))
            .route("/admin/posts", web::get().to(handlers::admin_posts))
            .route("/admin/posts/{id}/repost", web::post().to(handlers::admin_repost))
            .route("/admin/tool-requests", web::get().to(handlers::admin_tool_requests))
            .route(
                "/admin/tool-requests/{id}/resolve",
                web::post().to(handlers::admin_resolve_tool_request),
            )
            .route("/admin/search", web::get().to(handlers::admin_search)),
    );
}

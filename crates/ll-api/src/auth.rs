//! Bearer-token identity for handlers.

use actix_web::dev::Payload;
use actix_web::http::header::AUTHORIZATION;
use actix_web::{web, FromRequest, HttpRequest};
use futures_util::future::LocalBoxFuture;
use ll_core::error::AppError;
use ll_core::models::User;
use ll_core::traits::IdentityProvider;

use crate::error::ApiError;
use crate::handlers::AppState;

/// The signed-in user behind the request's `Authorization: Bearer` token.
///
/// # Developer Note
/// The User is looked up on every request rather than cached in the session, so
/// a role change or block takes effect on the very next call.
pub struct CurrentUser {
    pub user: User,
    pub token: String,
}

fn bearer_token(req: &HttpRequest) -> Option<String> {
    let value = req.headers().get(AUTHORIZATION)?.to_str().ok()?;
    let token = value.strip_prefix("Bearer ")?.trim();
    (!token.is_empty()).then(|| token.to_string())
}

impl FromRequest for CurrentUser {
    type Error = ApiError;
    type Future = LocalBoxFuture<'static, Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        let state = req.app_data::<web::Data<AppState>>().cloned();
        let token = bearer_token(req);
        Box::pin(async move {
            let state = state.ok_or_else(|| {
                ApiError::App(AppError::Internal("application state is not registered".into()))
            })?;
            let token = token.ok_or(ApiError::Unauthenticated)?;
            let principal = state
                .identity
                .principal_for(&token)
                .await?
                .ok_or(ApiError::Unauthenticated)?;
            let user = match state.market.catalog.resolve_principal(&principal).await {
                Ok(user) => user,
                Err(AppError::NotFound { .. }) => return Err(ApiError::Unauthenticated),
                Err(err) => return Err(err.into()),
            };
            Ok(CurrentUser { user, token })
        })
    }
}

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post, put};
use axum::Router;

use crate::accounts::domain::MAX_AVATAR_BYTES;
use crate::auth::handlers;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(handlers::register))
        .route("/auth/login", post(handlers::login))
        .route("/auth/logout", post(handlers::logout))
        .route("/auth/reset-password", post(handlers::reset_password))
        .route("/auth/me", get(handlers::me))
        .route(
            "/profile",
            put(handlers::update_profile)
                .delete(handlers::delete_account)
                .layer(DefaultBodyLimit::max(MAX_AVATAR_BYTES + 1024 * 1024)),
        )
        .route("/profile/password", post(handlers::change_password))
}

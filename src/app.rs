use std::sync::Arc;

use axum::routing::get;
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::accounts::SqliteAccountRepository;
use crate::config::Config;
use crate::graphql::build_schema;
use crate::problems::SqliteProblemRepository;
use crate::routes;
use crate::state::{AppState, DbPool};
use crate::storage::MediaStore;

/// Wire repositories, media store and schema around an already migrated pool.
pub fn build_state(pool: DbPool, config: Config) -> AppState {
    AppState {
        problems: Arc::new(SqliteProblemRepository::new(pool.clone())),
        accounts: Arc::new(SqliteAccountRepository::new(pool.clone())),
        media: MediaStore::new(config.uploads_path()),
        graphql_schema: build_schema(),
        db: pool,
        config,
    }
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(routes::home::index))
        .route("/media/{file}", get(routes::media::serve))
        .merge(routes::auth::router())
        .merge(routes::problems::router())
        .merge(routes::graphql::router())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

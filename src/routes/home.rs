use axum::extract::State;
use axum::Json;
use serde::Serialize;

use crate::accounts::Identity;
use crate::error::AppResult;
use crate::extractors::MaybeUser;
use crate::state::AppState;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceInfo {
    pub name: &'static str,
    pub version: &'static str,
    pub problem_count: u64,
    pub user: Option<Identity>,
}

/// GET /: service banner, report count and the caller's identity if signed in
pub async fn index(
    State(state): State<AppState>,
    MaybeUser(user): MaybeUser,
) -> AppResult<Json<ServiceInfo>> {
    let problem_count = state.problems.count().await?;

    Ok(Json(ServiceInfo {
        name: env!("CARGO_PKG_NAME"),
        version: env!("CARGO_PKG_VERSION"),
        problem_count,
        user,
    }))
}

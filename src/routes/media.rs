use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};

use crate::error::AppResult;
use crate::state::AppState;

/// GET /media/{file}: uploaded photos, videos and avatars
pub async fn serve(State(state): State<AppState>, Path(name): Path<String>) -> AppResult<Response> {
    match state.media.load(&name).await? {
        Some(bytes) => {
            let mime = mime_guess::from_path(&name).first_or_octet_stream();
            Ok((
                StatusCode::OK,
                [
                    (header::CONTENT_TYPE, mime.as_ref().to_string()),
                    (header::CACHE_CONTROL, "public, max-age=86400".to_string()),
                ],
                bytes,
            )
                .into_response())
        }
        None => Ok(StatusCode::NOT_FOUND.into_response()),
    }
}

use axum::extract::{DefaultBodyLimit, Multipart, Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post, put};
use axum::{Json, Router};
use serde::Deserialize;

use crate::error::AppResult;
use crate::extractors::CurrentUser;
use crate::problems::domain::{MAX_MEDIA_BYTES, MAX_MEDIA_ITEMS};
use crate::problems::service::{self, Dashboard};
use crate::problems::{
    FeedFilter, Media, MediaKind, Problem, ProblemDraft, ProblemError, ProblemId, ProblemStatus,
};
use crate::routes::forms::MultipartForm;
use crate::state::AppState;

// Room for every attachment plus the text fields
const CREATE_BODY_LIMIT: usize = MAX_MEDIA_ITEMS * MAX_MEDIA_BYTES + 1024 * 1024;

pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/api/problems",
            get(list_problems)
                .post(create_problem)
                .layer(DefaultBodyLimit::max(CREATE_BODY_LIMIT)),
        )
        .route("/api/problems/{id}", get(get_problem))
        .route("/api/problems/{id}/status", put(update_status))
        .route("/api/problems/{id}/comments", post(add_comment))
        .route("/api/dashboard", get(dashboard))
}

// --- Request types ---

#[derive(Deserialize, Default)]
pub struct FeedQuery {
    pub q: Option<String>,
    pub search: Option<String>,
    pub status: Option<String>,
}

#[derive(Deserialize)]
pub struct StatusRequest {
    pub status: String,
}

#[derive(Deserialize)]
pub struct CommentRequest {
    pub text: String,
}

/// Blank means "no status filter"
fn parse_status_filter(raw: Option<&str>) -> AppResult<Option<ProblemStatus>> {
    match raw.map(str::trim) {
        None | Some("") | Some("all") => Ok(None),
        Some(s) => Ok(Some(s.parse::<ProblemStatus>()?)),
    }
}

impl FeedQuery {
    fn into_filter(self) -> AppResult<FeedFilter> {
        let status = parse_status_filter(self.status.as_deref())?;
        Ok(FeedFilter::new(self.q.or(self.search), status))
    }
}

// --- Handlers ---

async fn list_problems(
    State(state): State<AppState>,
    Query(query): Query<FeedQuery>,
) -> AppResult<Json<Vec<Problem>>> {
    let filter = query.into_filter()?;
    Ok(Json(service::feed(state.problems.as_ref(), &filter).await?))
}

async fn get_problem(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<Problem>> {
    let problem = service::get(state.problems.as_ref(), &ProblemId::new(id)).await?;
    Ok(Json(problem))
}

async fn create_problem(
    State(state): State<AppState>,
    CurrentUser(author): CurrentUser,
    multipart: Multipart,
) -> AppResult<(StatusCode, Json<Problem>)> {
    let (fields, uploads) = MultipartForm::read(multipart).await?.take_files("media");

    if uploads.len() > MAX_MEDIA_ITEMS {
        return Err(ProblemError::TooManyMedia.into());
    }
    let kinds = uploads
        .iter()
        .map(|u| MediaKind::check_upload(&u.content_type, u.len()))
        .collect::<Result<Vec<_>, _>>()?;

    let mut media = Vec::with_capacity(uploads.len());
    for (upload, kind) in uploads.iter().zip(kinds) {
        media.push(Media {
            id: uuid::Uuid::now_v7().to_string(),
            kind,
            url: state.media.save(upload).await?,
        });
    }

    let field = |name: &str| fields.get(name).cloned().unwrap_or_default();
    let draft = ProblemDraft {
        title: field("title"),
        description: field("description"),
        location: field("location"),
        media: media.clone(),
    };

    match service::create(state.problems.as_ref(), &author, draft).await {
        Ok(problem) => Ok((StatusCode::CREATED, Json(problem))),
        Err(e) => {
            for item in &media {
                if let Err(err) = state.media.remove(&item.url).await {
                    tracing::warn!("Could not remove orphaned upload {}: {}", item.url, err);
                }
            }
            Err(e)
        }
    }
}

async fn update_status(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
    Path(id): Path<String>,
    Json(req): Json<StatusRequest>,
) -> AppResult<Json<Problem>> {
    let status: ProblemStatus = req.status.parse()?;
    let problem =
        service::update_status(state.problems.as_ref(), &ProblemId::new(id), status, &actor)
            .await?;
    Ok(Json(problem))
}

async fn add_comment(
    State(state): State<AppState>,
    CurrentUser(author): CurrentUser,
    Path(id): Path<String>,
    Json(req): Json<CommentRequest>,
) -> AppResult<(StatusCode, Json<Problem>)> {
    let (problem, _) =
        service::add_comment(state.problems.as_ref(), &ProblemId::new(id), &req.text, &author)
            .await?;
    Ok((StatusCode::CREATED, Json(problem)))
}

#[derive(Deserialize, Default)]
pub struct DashboardQuery {
    pub status: Option<String>,
}

async fn dashboard(
    State(state): State<AppState>,
    CurrentUser(viewer): CurrentUser,
    Query(query): Query<DashboardQuery>,
) -> AppResult<Json<Dashboard>> {
    let status = parse_status_filter(query.status.as_deref())?;
    let view = service::dashboard(state.problems.as_ref(), &viewer, status).await?;
    Ok(Json(view))
}

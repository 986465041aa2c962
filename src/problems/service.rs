// Report use-cases shared by the REST routes and the GraphQL schema
use chrono::Utc;
use serde::Serialize;

use crate::accounts::{Capability, Identity};
use crate::error::{AppError, AppResult};
use crate::problems::domain::*;
use crate::problems::repository::ProblemRepository;

pub async fn create(
    repo: &dyn ProblemRepository,
    author: &Identity,
    draft: ProblemDraft,
) -> AppResult<Problem> {
    let problem = Problem::open(draft, author, Utc::now())?;
    repo.insert(&problem).await?;

    tracing::info!(
        "Problem {} reported by {} with {} media item(s)",
        problem.id,
        author.email,
        problem.media.len()
    );
    Ok(problem)
}

pub async fn get(repo: &dyn ProblemRepository, id: &ProblemId) -> AppResult<Problem> {
    repo.get(id).await?.ok_or_else(|| ProblemError::NotFound.into())
}

pub async fn feed(repo: &dyn ProblemRepository, filter: &FeedFilter) -> AppResult<Vec<Problem>> {
    Ok(filter.apply(repo.list().await?))
}

pub async fn update_status(
    repo: &dyn ProblemRepository,
    id: &ProblemId,
    status: ProblemStatus,
    actor: &Identity,
) -> AppResult<Problem> {
    // Checked before lookup: citizens get 403 even for unknown ids
    if !actor.can(Capability::UpdateStatus) {
        return Err(ProblemError::NotAgent.into());
    }

    let change = repo
        .set_status(id, status, Utc::now())
        .await?
        .ok_or(ProblemError::NotFound)?;

    if change.is_reset() {
        tracing::info!(
            "Problem {} reset from {} to pending by {}",
            id,
            change.from,
            actor.email
        );
    } else {
        tracing::info!(
            "Problem {} moved {} -> {} by {}",
            id,
            change.from,
            change.to,
            actor.email
        );
    }
    get(repo, id).await
}

/// Append a comment; returns the updated report and the stored comment
pub async fn add_comment(
    repo: &dyn ProblemRepository,
    id: &ProblemId,
    text: &str,
    author: &Identity,
) -> AppResult<(Problem, Comment)> {
    let comment = Comment::new(text, author, Utc::now())?;
    let comment = repo
        .append_comment(id, comment)
        .await?
        .ok_or(ProblemError::NotFound)?;

    tracing::debug!("Comment added to problem {} by {}", id, author.email);
    Ok((get(repo, id).await?, comment))
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Dashboard {
    pub stats: StatusCounts,
    pub problems: Vec<Problem>,
}

/// Agent overview: counts over every report, list narrowed by `status`
pub async fn dashboard(
    repo: &dyn ProblemRepository,
    viewer: &Identity,
    status: Option<ProblemStatus>,
) -> AppResult<Dashboard> {
    if !viewer.can(Capability::ViewDashboard) {
        return Err(AppError::Forbidden(
            "Only municipality agents can view the dashboard".to_string(),
        ));
    }

    let problems = repo.list().await?;
    let stats = StatusCounts::tally(&problems);
    let problems = FeedFilter::new(None, status).apply(problems);
    Ok(Dashboard { stats, problems })
}

use async_graphql::*;

use crate::graphql::types::{DashboardStats, ProblemNode, Status, UserNode};
use crate::graphql::{problems, require_viewer, Viewer};
use crate::problems::service;
use crate::problems::{FeedFilter, ProblemId};

/// GraphQL Query root
pub struct QueryRoot;

#[Object]
impl QueryRoot {
    /// Reports, most recently updated first, narrowed by free-text search
    /// over title, description and location and by status
    async fn problems(
        &self,
        ctx: &Context<'_>,
        search: Option<String>,
        status: Option<Status>,
    ) -> Result<Vec<ProblemNode>> {
        let repo = problems(ctx)?;
        let filter = FeedFilter::new(search, status.map(Into::into));
        let found = service::feed(repo.as_ref(), &filter)
            .await
            .map_err(|e| e.extend())?;
        Ok(found.into_iter().map(Into::into).collect())
    }

    /// A single report, or null when the id is unknown
    async fn problem(&self, ctx: &Context<'_>, id: ID) -> Result<Option<ProblemNode>> {
        let repo = problems(ctx)?;
        let found = repo
            .get(&ProblemId::new(id.0))
            .await
            .map_err(|e| crate::error::AppError::from(e).extend())?;
        Ok(found.map(Into::into))
    }

    /// Per-status counts (agents only)
    async fn dashboard_stats(&self, ctx: &Context<'_>) -> Result<DashboardStats> {
        let repo = problems(ctx)?;
        let viewer = require_viewer(ctx)?;
        let view = service::dashboard(repo.as_ref(), viewer, None)
            .await
            .map_err(|e| e.extend())?;
        Ok(view.stats.into())
    }

    /// The signed-in identity
    async fn me(&self, ctx: &Context<'_>) -> Option<UserNode> {
        ctx.data_opt::<Viewer>()
            .and_then(|viewer| viewer.0.clone())
            .map(Into::into)
    }
}

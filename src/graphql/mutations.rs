use async_graphql::*;

use crate::graphql::types::{CommentNode, ProblemNode, Status};
use crate::graphql::{problems, require_viewer};
use crate::problems::service;
use crate::problems::ProblemId;

/// GraphQL Mutation root
pub struct MutationRoot;

#[Object]
impl MutationRoot {
    /// Move a report to another status (agents only)
    async fn update_problem_status(
        &self,
        ctx: &Context<'_>,
        id: ID,
        status: Status,
    ) -> Result<ProblemNode> {
        let repo = problems(ctx)?;
        let viewer = require_viewer(ctx)?;
        let problem = service::update_status(
            repo.as_ref(),
            &ProblemId::new(id.0),
            status.into(),
            viewer,
        )
        .await
        .map_err(|e| e.extend())?;
        Ok(problem.into())
    }

    /// Append a comment to a report; returns the new comment
    async fn add_comment(
        &self,
        ctx: &Context<'_>,
        problem_id: ID,
        text: String,
    ) -> Result<CommentNode> {
        let repo = problems(ctx)?;
        let viewer = require_viewer(ctx)?;
        let (_, comment) =
            service::add_comment(repo.as_ref(), &ProblemId::new(problem_id.0), &text, viewer)
                .await
                .map_err(|e| e.extend())?;
        Ok(comment.into())
    }
}

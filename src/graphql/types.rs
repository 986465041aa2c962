use async_graphql::*;
use chrono::{DateTime, Utc};

use crate::accounts::{Identity, Role};
use crate::problems::{Comment, Media, MediaKind, Problem, ProblemStatus, StatusCounts};

/// Triage state of a report
#[derive(Clone, Copy, Debug, Enum, Eq, PartialEq)]
#[graphql(name = "ProblemStatus")]
pub enum Status {
    /// Reported, nobody has looked yet
    Pending,
    /// An agent has seen it
    Watched,
    /// Under observation
    Observed,
    /// Resolved
    Success,
}

impl From<ProblemStatus> for Status {
    fn from(status: ProblemStatus) -> Self {
        match status {
            ProblemStatus::Pending => Status::Pending,
            ProblemStatus::Watched => Status::Watched,
            ProblemStatus::Observed => Status::Observed,
            ProblemStatus::Success => Status::Success,
        }
    }
}

impl From<Status> for ProblemStatus {
    fn from(status: Status) -> Self {
        match status {
            Status::Pending => ProblemStatus::Pending,
            Status::Watched => ProblemStatus::Watched,
            Status::Observed => ProblemStatus::Observed,
            Status::Success => ProblemStatus::Success,
        }
    }
}

#[derive(Clone, Copy, Debug, Enum, Eq, PartialEq)]
pub enum MediaType {
    Image,
    Video,
}

#[derive(Clone, Copy, Debug, Enum, Eq, PartialEq)]
pub enum UserRole {
    Citizen,
    Agent,
}

/// A photo or video attached to a report
#[derive(Clone, Debug, SimpleObject)]
#[graphql(name = "Media")]
pub struct MediaNode {
    pub id: ID,
    pub kind: MediaType,
    pub url: String,
}

impl From<Media> for MediaNode {
    fn from(media: Media) -> Self {
        Self {
            id: ID(media.id),
            kind: match media.kind {
                MediaKind::Image => MediaType::Image,
                MediaKind::Video => MediaType::Video,
            },
            url: media.url,
        }
    }
}

#[derive(Clone, Debug, SimpleObject)]
#[graphql(name = "Comment")]
pub struct CommentNode {
    pub id: ID,
    pub text: String,
    pub author_id: String,
    pub author_name: String,
    pub created_at: DateTime<Utc>,
}

impl From<Comment> for CommentNode {
    fn from(comment: Comment) -> Self {
        Self {
            id: ID(comment.id),
            text: comment.text,
            author_id: comment.author_id,
            author_name: comment.author_name,
            created_at: comment.created_at,
        }
    }
}

/// A citizen-submitted report of a municipal problem
#[derive(Clone, Debug, SimpleObject)]
#[graphql(name = "Problem", complex)]
pub struct ProblemNode {
    pub id: ID,
    pub title: String,
    pub description: String,
    pub location: String,
    pub status: Status,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub author_id: String,
    pub author_name: String,
    pub media: Vec<MediaNode>,
    pub comments: Vec<CommentNode>,
}

#[ComplexObject]
impl ProblemNode {
    /// Human label for the status ("Under Observation", "Resolved", ...)
    async fn status_label(&self) -> String {
        ProblemStatus::from(self.status).label().to_string()
    }

    async fn comment_count(&self) -> usize {
        self.comments.len()
    }
}

impl From<Problem> for ProblemNode {
    fn from(problem: Problem) -> Self {
        Self {
            id: ID(problem.id.0),
            title: problem.title,
            description: problem.description,
            location: problem.location,
            status: problem.status.into(),
            created_at: problem.created_at,
            updated_at: problem.updated_at,
            author_id: problem.author_id,
            author_name: problem.author_name,
            media: problem.media.into_iter().map(Into::into).collect(),
            comments: problem.comments.into_iter().map(Into::into).collect(),
        }
    }
}

#[derive(Clone, Debug, SimpleObject)]
#[graphql(name = "User")]
pub struct UserNode {
    pub id: ID,
    pub name: String,
    pub email: String,
    pub role: UserRole,
    pub avatar: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<Identity> for UserNode {
    fn from(identity: Identity) -> Self {
        Self {
            id: ID(identity.id),
            name: identity.name,
            email: identity.email.as_str().to_string(),
            role: match identity.role {
                Role::Citizen => UserRole::Citizen,
                Role::Agent => UserRole::Agent,
            },
            avatar: identity.avatar,
            created_at: identity.created_at,
        }
    }
}

/// Per-status counts for the agent dashboard
#[derive(Clone, Copy, Debug, SimpleObject)]
pub struct DashboardStats {
    pub total: usize,
    pub pending: usize,
    pub watched: usize,
    pub observed: usize,
    pub resolved: usize,
}

impl From<StatusCounts> for DashboardStats {
    fn from(counts: StatusCounts) -> Self {
        Self {
            total: counts.total,
            pending: counts.pending,
            watched: counts.watched,
            observed: counts.observed,
            resolved: counts.resolved,
        }
    }
}

// Report domain - pure types and transitions, no I/O
use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::accounts::{Capability, Identity};

pub const MAX_TITLE_LEN: usize = 200;
pub const MAX_COMMENT_LEN: usize = 1000;
pub const MAX_MEDIA_ITEMS: usize = 3;
pub const MAX_MEDIA_BYTES: usize = 5 * 1024 * 1024;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProblemId(pub String);

impl ProblemId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn generate() -> Self {
        Self(uuid::Uuid::now_v7().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProblemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Triage state. Any state may move to any other, pending included.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProblemStatus {
    Pending,
    Watched,
    Observed,
    Success,
}

impl ProblemStatus {
    pub const ALL: [ProblemStatus; 4] = [
        Self::Pending,
        Self::Watched,
        Self::Observed,
        Self::Success,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Watched => "watched",
            Self::Observed => "observed",
            Self::Success => "success",
        }
    }

    /// Human label shown to citizens
    pub fn label(&self) -> &'static str {
        match self {
            Self::Pending => "Pending",
            Self::Watched => "Watched",
            Self::Observed => "Under Observation",
            Self::Success => "Resolved",
        }
    }
}

impl fmt::Display for ProblemStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProblemStatus {
    type Err = ProblemError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ProblemError::UnknownStatus(s.to_string()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Image,
    Video,
}

impl MediaKind {
    /// Classify an upload by content type. Anything that is not an image or
    /// a video is refused.
    pub fn from_mime(mime: &str) -> Option<Self> {
        let mime = mime.trim().to_ascii_lowercase();
        if mime.starts_with("image/") {
            Some(Self::Image)
        } else if mime.starts_with("video/") {
            Some(Self::Video)
        } else {
            None
        }
    }

    /// Validate an upload destined for a report and classify it
    pub fn check_upload(mime: &str, len: usize) -> Result<Self, ProblemError> {
        let kind = Self::from_mime(mime).ok_or(ProblemError::UnsupportedMedia)?;
        if len > MAX_MEDIA_BYTES {
            return Err(ProblemError::MediaTooLarge);
        }
        Ok(kind)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Image => "image",
            Self::Video => "video",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "image" => Some(Self::Image),
            "video" => Some(Self::Video),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Media {
    pub id: String,
    pub kind: MediaKind,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    pub id: String,
    pub text: String,
    pub author_id: String,
    pub author_name: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Problem {
    pub id: ProblemId,
    pub title: String,
    pub description: String,
    pub location: String,
    pub status: ProblemStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub author_id: String,
    pub author_name: String,
    pub media: Vec<Media>,
    pub comments: Vec<Comment>,
}

/// Citizen-supplied fields of a new report, before validation
#[derive(Debug, Clone, Default)]
pub struct ProblemDraft {
    pub title: String,
    pub description: String,
    pub location: String,
    pub media: Vec<Media>,
}

/// Record of an accepted status change
#[derive(Debug, Clone, PartialEq)]
pub struct StatusChange {
    pub from: ProblemStatus,
    pub to: ProblemStatus,
    pub at: DateTime<Utc>,
}

impl Comment {
    /// A validated comment by `author`; the text is trimmed.
    pub fn new(text: &str, author: &Identity, now: DateTime<Utc>) -> Result<Self, ProblemError> {
        if !author.can(Capability::Comment) {
            return Err(ProblemError::NotPermitted);
        }

        let text = text.trim();
        if text.is_empty() {
            return Err(ProblemError::EmptyComment);
        }
        if text.chars().count() > MAX_COMMENT_LEN {
            return Err(ProblemError::CommentTooLong);
        }

        Ok(Self {
            id: uuid::Uuid::now_v7().to_string(),
            text: text.to_string(),
            author_id: author.id.clone(),
            author_name: author.name.clone(),
            created_at: now.trunc_subsecs(6),
        })
    }
}

impl StatusChange {
    pub fn is_reset(&self) -> bool {
        self.to == ProblemStatus::Pending && self.from != ProblemStatus::Pending
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ProblemError {
    NotFound,
    NotAgent,
    NotPermitted,
    MissingField(&'static str),
    TitleTooLong,
    EmptyComment,
    CommentTooLong,
    TooManyMedia,
    UnsupportedMedia,
    MediaTooLarge,
    UnknownStatus(String),
}

impl fmt::Display for ProblemError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound => write!(f, "Problem not found"),
            Self::NotAgent => write!(f, "Only municipality agents can update problem status"),
            Self::NotPermitted => write!(f, "You are not allowed to do that"),
            Self::MissingField(field) => write!(f, "The {} is required", field),
            Self::TitleTooLong => write!(f, "Title must be {} characters or less", MAX_TITLE_LEN),
            Self::EmptyComment => write!(f, "Comment cannot be empty"),
            Self::CommentTooLong => write!(
                f,
                "Comment must be {} characters or less",
                MAX_COMMENT_LEN
            ),
            Self::TooManyMedia => write!(
                f,
                "You can upload up to {} photos or videos",
                MAX_MEDIA_ITEMS
            ),
            Self::UnsupportedMedia => write!(f, "Only photos and videos can be attached"),
            Self::MediaTooLarge => write!(f, "Each file must be 5 MB or less"),
            Self::UnknownStatus(s) => write!(f, "Unknown status: {}", s),
        }
    }
}

impl std::error::Error for ProblemError {}

fn required(value: &str, field: &'static str) -> Result<String, ProblemError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(ProblemError::MissingField(field));
    }
    Ok(value.to_string())
}

impl Problem {
    /// Open a new report. Always starts pending with no comments.
    pub fn open(
        draft: ProblemDraft,
        author: &Identity,
        now: DateTime<Utc>,
    ) -> Result<Self, ProblemError> {
        if !author.can(Capability::ReportProblem) {
            return Err(ProblemError::NotPermitted);
        }

        let title = required(&draft.title, "title")?;
        if title.chars().count() > MAX_TITLE_LEN {
            return Err(ProblemError::TitleTooLong);
        }
        let description = required(&draft.description, "description")?;
        let location = required(&draft.location, "location")?;
        if draft.media.len() > MAX_MEDIA_ITEMS {
            return Err(ProblemError::TooManyMedia);
        }

        let now = now.trunc_subsecs(6);
        Ok(Self {
            id: ProblemId::generate(),
            title,
            description,
            location,
            status: ProblemStatus::Pending,
            created_at: now,
            updated_at: now,
            author_id: author.id.clone(),
            author_name: author.name.clone(),
            media: draft.media,
            comments: Vec::new(),
        })
    }

    /// Move to `status`. Only agents may triage; nothing else changes.
    pub fn transition(
        &mut self,
        status: ProblemStatus,
        actor: &Identity,
        now: DateTime<Utc>,
    ) -> Result<StatusChange, ProblemError> {
        if !actor.can(Capability::UpdateStatus) {
            return Err(ProblemError::NotAgent);
        }

        let change = StatusChange {
            from: self.status,
            to: status,
            at: self.touch(now),
        };
        self.status = status;
        Ok(change)
    }

    /// Append a comment and bump `updated_at`.
    pub fn add_comment(
        &mut self,
        text: &str,
        author: &Identity,
        now: DateTime<Utc>,
    ) -> Result<Comment, ProblemError> {
        let mut comment = Comment::new(text, author, now)?;

        // Comments stay ordered even if the clock steps backwards
        let floor = self
            .comments
            .last()
            .map(|c| c.created_at)
            .unwrap_or(self.created_at);
        comment.created_at = comment.created_at.max(floor);

        self.touch(comment.created_at);
        self.comments.push(comment.clone());
        Ok(comment)
    }

    /// Refresh `updated_at`, never moving it backwards.
    fn touch(&mut self, now: DateTime<Utc>) -> DateTime<Utc> {
        self.updated_at = now.trunc_subsecs(6).max(self.updated_at);
        self.updated_at
    }
}

/// Feed predicate: substring search AND optional status equality
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeedFilter {
    pub search: Option<String>,
    pub status: Option<ProblemStatus>,
}

impl FeedFilter {
    pub fn new(search: Option<String>, status: Option<ProblemStatus>) -> Self {
        Self { search, status }
    }

    pub fn accepts(&self, problem: &Problem) -> bool {
        let matches_search = match self.search.as_deref().map(str::trim) {
            None | Some("") => true,
            Some(needle) => {
                let needle = needle.to_lowercase();
                [&problem.title, &problem.description, &problem.location]
                    .iter()
                    .any(|field| field.to_lowercase().contains(&needle))
            }
        };
        let matches_status = self.status.map_or(true, |s| problem.status == s);
        matches_search && matches_status
    }

    /// O(n) scan, order preserved
    pub fn apply(&self, problems: Vec<Problem>) -> Vec<Problem> {
        problems.into_iter().filter(|p| self.accepts(p)).collect()
    }
}

/// Per-status counts for the agent dashboard
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusCounts {
    pub total: usize,
    pub pending: usize,
    pub watched: usize,
    pub observed: usize,
    pub resolved: usize,
}

impl StatusCounts {
    pub fn tally<'a>(problems: impl IntoIterator<Item = &'a Problem>) -> Self {
        problems
            .into_iter()
            .fold(Self::default(), |mut counts, problem| {
                counts.total += 1;
                match problem.status {
                    ProblemStatus::Pending => counts.pending += 1,
                    ProblemStatus::Watched => counts.watched += 1,
                    ProblemStatus::Observed => counts.observed += 1,
                    ProblemStatus::Success => counts.resolved += 1,
                }
                counts
            })
    }
}

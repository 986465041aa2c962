pub mod domain;
pub mod repository;
pub mod service;

pub use domain::{
    Comment, FeedFilter, Media, MediaKind, Problem, ProblemDraft, ProblemError, ProblemId,
    ProblemStatus, StatusCounts,
};
pub use repository::{DynProblemRepository, ProblemRepository, SqliteProblemRepository};

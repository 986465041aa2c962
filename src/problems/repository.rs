// Report persistence - all problems/media/comments side effects go through here
use async_trait::async_trait;
use chrono::{DateTime, SubsecRound, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::collections::HashMap;
use std::sync::Arc;

use crate::db::{from_db_time, is_unique_violation, to_db_time, RepositoryError};
use crate::problems::domain::*;
use crate::state::DbPool;

#[async_trait]
pub trait ProblemRepository: Send + Sync {
    /// Insert a new report with its media and comments
    async fn insert(&self, problem: &Problem) -> Result<(), RepositoryError>;

    async fn get(&self, id: &ProblemId) -> Result<Option<Problem>, RepositoryError>;

    /// All reports, most recently updated first
    async fn list(&self) -> Result<Vec<Problem>, RepositoryError>;

    /// Set the status and refresh updated_at in one write transaction.
    /// Returns None when the report does not exist.
    async fn set_status(
        &self,
        id: &ProblemId,
        status: ProblemStatus,
        now: DateTime<Utc>,
    ) -> Result<Option<StatusChange>, RepositoryError>;

    /// Store one comment and bump updated_at in one write transaction.
    /// The comment's timestamp is raised to the stored updated_at when
    /// the clock lags. Returns None when the report does not exist.
    async fn append_comment(
        &self,
        id: &ProblemId,
        comment: Comment,
    ) -> Result<Option<Comment>, RepositoryError>;

    async fn count(&self) -> Result<u64, RepositoryError>;
}

pub struct SqliteProblemRepository {
    pool: DbPool,
}

impl SqliteProblemRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

const PROBLEM_COLUMNS: &str =
    "id, title, description, location, status, created_at, updated_at, author_id, author_name";

fn problem_from_row(row: &Row<'_>) -> Result<Problem, RepositoryError> {
    let status: String = row.get(4)?;
    let created_at: String = row.get(5)?;
    let updated_at: String = row.get(6)?;
    Ok(Problem {
        id: ProblemId::new(row.get::<_, String>(0)?),
        title: row.get(1)?,
        description: row.get(2)?,
        location: row.get(3)?,
        status: status
            .parse()
            .map_err(|_| RepositoryError::Corrupt(format!("bad status {:?}", status)))?,
        created_at: from_db_time(&created_at)?,
        updated_at: from_db_time(&updated_at)?,
        author_id: row.get(7)?,
        author_name: row.get(8)?,
        media: Vec::new(),
        comments: Vec::new(),
    })
}

/// Load media for the given reports (all reports when `only` is None)
fn load_media(
    conn: &Connection,
    only: Option<&str>,
) -> Result<HashMap<String, Vec<Media>>, RepositoryError> {
    let mut stmt = conn.prepare(
        "SELECT problem_id, id, kind, url FROM problem_media
         WHERE ?1 IS NULL OR problem_id = ?1
         ORDER BY problem_id, position",
    )?;
    let mut rows = stmt.query(params![only])?;

    let mut media: HashMap<String, Vec<Media>> = HashMap::new();
    while let Some(row) = rows.next()? {
        let problem_id: String = row.get(0)?;
        let kind: String = row.get(2)?;
        media.entry(problem_id).or_default().push(Media {
            id: row.get(1)?,
            kind: MediaKind::parse(&kind)
                .ok_or_else(|| RepositoryError::Corrupt(format!("bad media kind {:?}", kind)))?,
            url: row.get(3)?,
        });
    }
    Ok(media)
}

fn load_comments(
    conn: &Connection,
    only: Option<&str>,
) -> Result<HashMap<String, Vec<Comment>>, RepositoryError> {
    let mut stmt = conn.prepare(
        "SELECT problem_id, id, text, author_id, author_name, created_at FROM problem_comments
         WHERE ?1 IS NULL OR problem_id = ?1
         ORDER BY problem_id, created_at, rowid",
    )?;
    let mut rows = stmt.query(params![only])?;

    let mut comments: HashMap<String, Vec<Comment>> = HashMap::new();
    while let Some(row) = rows.next()? {
        let problem_id: String = row.get(0)?;
        let created_at: String = row.get(5)?;
        comments.entry(problem_id).or_default().push(Comment {
            id: row.get(1)?,
            text: row.get(2)?,
            author_id: row.get(3)?,
            author_name: row.get(4)?,
            created_at: from_db_time(&created_at)?,
        });
    }
    Ok(comments)
}

fn insert_comments(
    conn: &Connection,
    problem_id: &ProblemId,
    comments: &[Comment],
) -> Result<(), RepositoryError> {
    for comment in comments {
        conn.execute(
            "INSERT INTO problem_comments (id, problem_id, text, author_id, author_name, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                comment.id,
                problem_id.as_str(),
                comment.text,
                comment.author_id,
                comment.author_name,
                to_db_time(&comment.created_at),
            ],
        )?;
    }
    Ok(())
}

/// Run `f` inside an IMMEDIATE transaction, rolling back on error
fn in_transaction<T>(
    conn: &Connection,
    f: impl FnOnce() -> Result<T, RepositoryError>,
) -> Result<T, RepositoryError> {
    conn.execute("BEGIN IMMEDIATE", [])?;

    match f() {
        Ok(value) => {
            conn.execute("COMMIT", [])?;
            Ok(value)
        }
        Err(e) => {
            conn.execute("ROLLBACK", [])?;
            Err(e)
        }
    }
}

#[async_trait]
impl ProblemRepository for SqliteProblemRepository {
    async fn insert(&self, problem: &Problem) -> Result<(), RepositoryError> {
        let conn = self.pool.get()?;

        in_transaction(&conn, || {
            let result = conn.execute(
                "INSERT INTO problems (id, title, description, location, status, created_at, updated_at, author_id, author_name)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    problem.id.as_str(),
                    problem.title,
                    problem.description,
                    problem.location,
                    problem.status.as_str(),
                    to_db_time(&problem.created_at),
                    to_db_time(&problem.updated_at),
                    problem.author_id,
                    problem.author_name,
                ],
            );
            match result {
                Ok(_) => {}
                Err(e) if is_unique_violation(&e) => {
                    return Err(RepositoryError::Conflict(format!(
                        "problem {} already exists",
                        problem.id
                    )))
                }
                Err(e) => return Err(e.into()),
            }

            for (position, media) in problem.media.iter().enumerate() {
                conn.execute(
                    "INSERT INTO problem_media (id, problem_id, kind, url, position)
                     VALUES (?1, ?2, ?3, ?4, ?5)",
                    params![
                        media.id,
                        problem.id.as_str(),
                        media.kind.as_str(),
                        media.url,
                        position as i64,
                    ],
                )?;
            }

            insert_comments(&conn, &problem.id, &problem.comments)
        })
    }

    async fn get(&self, id: &ProblemId) -> Result<Option<Problem>, RepositoryError> {
        let conn = self.pool.get()?;

        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM problems WHERE id = ?1",
            PROBLEM_COLUMNS
        ))?;
        let mut rows = stmt.query(params![id.as_str()])?;
        let mut problem = match rows.next()? {
            Some(row) => problem_from_row(row)?,
            None => return Ok(None),
        };

        let mut media = load_media(&conn, Some(id.as_str()))?;
        let mut comments = load_comments(&conn, Some(id.as_str()))?;
        problem.media = media.remove(id.as_str()).unwrap_or_default();
        problem.comments = comments.remove(id.as_str()).unwrap_or_default();
        Ok(Some(problem))
    }

    async fn list(&self) -> Result<Vec<Problem>, RepositoryError> {
        let conn = self.pool.get()?;

        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM problems ORDER BY updated_at DESC, created_at DESC",
            PROBLEM_COLUMNS
        ))?;
        let mut rows = stmt.query([])?;
        let mut problems = Vec::new();
        while let Some(row) = rows.next()? {
            problems.push(problem_from_row(row)?);
        }

        let mut media = load_media(&conn, None)?;
        let mut comments = load_comments(&conn, None)?;
        for problem in &mut problems {
            problem.media = media.remove(problem.id.as_str()).unwrap_or_default();
            problem.comments = comments.remove(problem.id.as_str()).unwrap_or_default();
        }
        Ok(problems)
    }

    async fn set_status(
        &self,
        id: &ProblemId,
        status: ProblemStatus,
        now: DateTime<Utc>,
    ) -> Result<Option<StatusChange>, RepositoryError> {
        let conn = self.pool.get()?;

        in_transaction(&conn, || {
            let current = conn
                .query_row(
                    "SELECT status, updated_at FROM problems WHERE id = ?1",
                    params![id.as_str()],
                    |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)),
                )
                .optional()?;
            let Some((from, updated_at)) = current else {
                return Ok(None);
            };

            let from: ProblemStatus = from
                .parse()
                .map_err(|_| RepositoryError::Corrupt(format!("bad status {:?}", from)))?;
            let at = now.trunc_subsecs(6).max(from_db_time(&updated_at)?);

            conn.execute(
                "UPDATE problems SET status = ?1, updated_at = ?2 WHERE id = ?3",
                params![status.as_str(), to_db_time(&at), id.as_str()],
            )?;
            Ok(Some(StatusChange {
                from,
                to: status,
                at,
            }))
        })
    }

    async fn append_comment(
        &self,
        id: &ProblemId,
        comment: Comment,
    ) -> Result<Option<Comment>, RepositoryError> {
        let conn = self.pool.get()?;

        in_transaction(&conn, || {
            let updated_at = conn
                .query_row(
                    "SELECT updated_at FROM problems WHERE id = ?1",
                    params![id.as_str()],
                    |row| row.get::<_, String>(0),
                )
                .optional()?;
            let Some(updated_at) = updated_at else {
                return Ok(None);
            };

            // updated_at is never earlier than the newest stored comment
            let mut comment = comment;
            comment.created_at = comment
                .created_at
                .trunc_subsecs(6)
                .max(from_db_time(&updated_at)?);

            conn.execute(
                "UPDATE problems SET updated_at = ?1 WHERE id = ?2",
                params![to_db_time(&comment.created_at), id.as_str()],
            )?;
            insert_comments(&conn, id, std::slice::from_ref(&comment))?;
            Ok(Some(comment))
        })
    }

    async fn count(&self) -> Result<u64, RepositoryError> {
        let conn = self.pool.get()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM problems", [], |row| row.get(0))?;
        Ok(count as u64)
    }
}

/// Type alias for Arc-wrapped repository (for AppState)
pub type DynProblemRepository = Arc<dyn ProblemRepository>;

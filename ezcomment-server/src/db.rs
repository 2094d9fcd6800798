//! Persistence operations for the `ezcomment` table. Every other module
//! goes through here; nothing else issues SQL.

use anyhow::Context;
use chrono::{TimeZone, Utc};
use ezcomment_api::{
    AuthorId, Comment, CommentId, CommentThread, ContentId, LanguageId, SortColumn, SortDir,
    Status, StatusFilter,
};
use futures::TryStreamExt;
use sqlx::Row;
use std::collections::HashMap;

const COMMENT_COLUMNS: &str = "id, created, contentobject_id, user_id, name, email, url, \
                               text, title, parent_comment_id, status";

pub struct NewComment<'a> {
    pub content_id: ContentId,
    pub parent: Option<CommentId>,
    pub language_id: LanguageId,
    pub author: AuthorId,
    pub name: &'a str,
    pub email: &'a str,
    pub text: &'a str,
    pub status: Status,
    pub session_key: &'a str,
    pub ip: &'a str,
}

/// Deletion target did not exist.
#[derive(Debug, Eq, PartialEq)]
pub struct CommentNotFound(pub CommentId);

pub async fn insert_comment(
    conn: &mut sqlx::SqliteConnection,
    comment: NewComment<'_>,
) -> anyhow::Result<CommentId> {
    let now = Utc::now().timestamp();
    let res = sqlx::query(
        "INSERT INTO ezcomment
            (language_id, created, modified, user_id, session_key, ip,
             contentobject_id, parent_comment_id, name, email, url, text, status, title)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, '', ?, ?, '')",
    )
    .bind(comment.language_id.0)
    .bind(now)
    .bind(now)
    .bind(comment.author.0)
    .bind(comment.session_key)
    .bind(comment.ip)
    .bind(comment.content_id.0)
    .bind(comment.parent.map_or(0, |p| p.0))
    .bind(comment.name)
    .bind(comment.email)
    .bind(comment.text)
    .bind(comment.status.as_db())
    .execute(&mut *conn)
    .await
    .context("inserting comment")?;
    Ok(CommentId(res.last_insert_rowid()))
}

/// Conditional status update: only touches the row if it is still Waiting.
/// A single atomic statement, so two moderators racing on the same link get
/// at most one effective transition between them.
pub async fn update_status_if_waiting(
    conn: &mut sqlx::SqliteConnection,
    id: CommentId,
    status: Status,
) -> anyhow::Result<u64> {
    let res = sqlx::query("UPDATE ezcomment SET status = ? WHERE id = ? AND status = ?")
        .bind(status.as_db())
        .bind(id.0)
        .bind(Status::Waiting.as_db())
        .execute(&mut *conn)
        .await
        .with_context(|| format!("updating status of waiting comment {:?}", id))?;
    Ok(res.rows_affected())
}

/// Unconditional status update, for the administrative surface. No
/// prior-status check: an admin may re-reject an already accepted comment.
pub async fn force_update_status(
    conn: &mut sqlx::SqliteConnection,
    id: CommentId,
    status: Status,
) -> anyhow::Result<u64> {
    let res = sqlx::query("UPDATE ezcomment SET status = ? WHERE id = ?")
        .bind(status.as_db())
        .bind(id.0)
        .execute(&mut *conn)
        .await
        .with_context(|| format!("force-updating status of comment {:?}", id))?;
    Ok(res.rows_affected())
}

pub async fn comment_exists(
    conn: &mut sqlx::SqliteConnection,
    id: CommentId,
) -> anyhow::Result<bool> {
    Ok(sqlx::query("SELECT id FROM ezcomment WHERE id = ?")
        .bind(id.0)
        .fetch_optional(&mut *conn)
        .await
        .with_context(|| format!("checking existence of comment {:?}", id))?
        .is_some())
}

pub async fn delete_by_id(
    conn: &mut sqlx::SqliteConnection,
    id: CommentId,
) -> anyhow::Result<Result<(), CommentNotFound>> {
    let res = sqlx::query("DELETE FROM ezcomment WHERE id = ?")
        .bind(id.0)
        .execute(&mut *conn)
        .await
        .with_context(|| format!("deleting comment {:?}", id))?;
    Ok(match res.rows_affected() {
        0 => Err(CommentNotFound(id)),
        _ => Ok(()),
    })
}

/// The moderation precondition as one existence query: the comment must
/// belong to the content item, carry the submitting session's key, and still
/// be Waiting. Checked as a whole so no partial condition can be probed.
pub async fn waiting_comment_matches(
    conn: &mut sqlx::SqliteConnection,
    content_id: ContentId,
    session_key: &str,
    id: CommentId,
) -> anyhow::Result<bool> {
    Ok(sqlx::query(
        "SELECT id FROM ezcomment
         WHERE contentobject_id = ? AND session_key = ? AND status = ? AND id = ?",
    )
    .bind(content_id.0)
    .bind(session_key)
    .bind(Status::Waiting.as_db())
    .bind(id.0)
    .fetch_optional(&mut *conn)
    .await
    .with_context(|| format!("matching waiting comment {:?}", id))?
    .is_some())
}

pub async fn count_comments(
    conn: &mut sqlx::SqliteConnection,
    content_id: Option<ContentId>,
    status: StatusFilter,
) -> anyhow::Result<i64> {
    let mut sql = String::from("SELECT COUNT(*) AS cnt FROM ezcomment WHERE 1 = 1");
    if content_id.is_some() {
        sql.push_str(" AND contentobject_id = ?");
    }
    if status.as_db().is_some() {
        sql.push_str(" AND status = ?");
    }
    let mut query = sqlx::query(&sql);
    if let Some(content_id) = content_id {
        query = query.bind(content_id.0);
    }
    if let Some(status) = status.as_db() {
        query = query.bind(status);
    }
    query
        .fetch_one(&mut *conn)
        .await
        .context("counting comments")?
        .try_get("cnt")
        .context("retrieving the cnt field")
}

/// Top-level comments for a content item, optionally with their replies
/// attached. Replies are matched to parents through a map, one pass over
/// each result set, and keep the requested sort order within each parent.
pub async fn list_threaded(
    conn: &mut sqlx::SqliteConnection,
    content_id: ContentId,
    status: Status,
    sort: SortColumn,
    dir: SortDir,
    include_replies: bool,
) -> anyhow::Result<Vec<CommentThread>> {
    let order = format!(
        "{col} {dir}, id {dir}",
        col = sort.sql_column(),
        dir = dir.sql_keyword()
    );

    let sql = format!(
        "SELECT {COMMENT_COLUMNS} FROM ezcomment
         WHERE contentobject_id = ? AND status = ? AND parent_comment_id = 0
         ORDER BY {order}"
    );
    let mut parents = Vec::new();
    {
        let mut rows = sqlx::query(&sql)
            .bind(content_id.0)
            .bind(status.as_db())
            .fetch(&mut *conn);
        while let Some(row) = rows.try_next().await.context("querying parent comments")? {
            parents.push(comment_from_row(&row)?);
        }
    }

    let mut replies_by_parent: HashMap<CommentId, Vec<Comment>> = HashMap::new();
    if include_replies {
        let sql = format!(
            "SELECT {COMMENT_COLUMNS} FROM ezcomment
             WHERE contentobject_id = ? AND status = ? AND parent_comment_id != 0
             ORDER BY {order}"
        );
        let mut rows = sqlx::query(&sql)
            .bind(content_id.0)
            .bind(status.as_db())
            .fetch(&mut *conn);
        while let Some(row) = rows.try_next().await.context("querying reply comments")? {
            let reply = comment_from_row(&row)?;
            if let Some(parent) = reply.parent {
                replies_by_parent.entry(parent).or_default().push(reply);
            }
        }
    }

    Ok(parents
        .into_iter()
        .map(|comment| {
            let replies = replies_by_parent.remove(&comment.id).unwrap_or_default();
            CommentThread { comment, replies }
        })
        .collect())
}

/// Global feed across all content, newest first.
pub async fn list_recent(
    conn: &mut sqlx::SqliteConnection,
    limit: i64,
    offset: i64,
    status: StatusFilter,
) -> anyhow::Result<Vec<Comment>> {
    let mut sql = format!("SELECT {COMMENT_COLUMNS} FROM ezcomment");
    if status.as_db().is_some() {
        sql.push_str(" WHERE status = ?");
    }
    sql.push_str(" ORDER BY created DESC, id DESC LIMIT ? OFFSET ?");
    let mut query = sqlx::query(&sql);
    if let Some(status) = status.as_db() {
        query = query.bind(status);
    }
    let rows = query
        .bind(limit)
        .bind(offset)
        .fetch_all(&mut *conn)
        .await
        .context("querying recent comments")?;
    rows.iter().map(comment_from_row).collect()
}

/// Latest accepted comments of one author.
pub async fn list_recent_by_author(
    conn: &mut sqlx::SqliteConnection,
    author: AuthorId,
    limit: i64,
) -> anyhow::Result<Vec<Comment>> {
    let sql = format!(
        "SELECT {COMMENT_COLUMNS} FROM ezcomment
         WHERE status = ? AND user_id = ?
         ORDER BY created DESC, id DESC LIMIT ?"
    );
    let rows = sqlx::query(&sql)
        .bind(Status::Accepted.as_db())
        .bind(author.0)
        .bind(limit)
        .fetch_all(&mut *conn)
        .await
        .with_context(|| format!("querying recent comments of {:?}", author))?;
    rows.iter().map(comment_from_row).collect()
}

/// Maps a locale code to the CMS's internal language id. An unknown locale
/// resolves to `LanguageId::UNRESOLVED`, never an error.
pub async fn resolve_language_id(
    conn: &mut sqlx::SqliteConnection,
    locale: &str,
) -> anyhow::Result<LanguageId> {
    let row = sqlx::query("SELECT id FROM ezcontent_language WHERE locale = ?")
        .bind(locale)
        .fetch_optional(&mut *conn)
        .await
        .with_context(|| format!("resolving language id for {:?}", locale))?;
    Ok(match row {
        Some(row) => LanguageId(row.try_get("id").context("retrieving the id field")?),
        None => LanguageId::UNRESOLVED,
    })
}

fn comment_from_row(row: &sqlx::sqlite::SqliteRow) -> anyhow::Result<Comment> {
    let created: i64 = row.try_get("created").context("retrieving the created field")?;
    let parent: i64 = row
        .try_get("parent_comment_id")
        .context("retrieving the parent_comment_id field")?;
    let status: i64 = row.try_get("status").context("retrieving the status field")?;
    Ok(Comment {
        id: CommentId(row.try_get("id").context("retrieving the id field")?),
        content_id: ContentId(
            row.try_get("contentobject_id")
                .context("retrieving the contentobject_id field")?,
        ),
        parent: (parent != 0).then_some(CommentId(parent)),
        author: AuthorId(row.try_get("user_id").context("retrieving the user_id field")?),
        name: row.try_get("name").context("retrieving the name field")?,
        email: row.try_get("email").context("retrieving the email field")?,
        url: row.try_get("url").context("retrieving the url field")?,
        title: row.try_get("title").context("retrieving the title field")?,
        text: row.try_get("text").context("retrieving the text field")?,
        status: Status::try_from(status)?,
        created: Utc
            .timestamp_opt(created, 0)
            .single()
            .context("created timestamp out of range")?,
    })
}

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    Json,
};
use ezcomment_api::{
    AuthorId, Comment, CommentId, CommentThread, ContentId, SortColumn, SortDir, Status,
};

use crate::{
    config::Config,
    db,
    extractors::{AdminAuth, ClientIp, ClientSession, DbConn, Identity, RequestLocale},
    intake::{self, CommentPayload, SubmissionMeta},
    moderation::{Moderation, ModerationAction},
    Error,
};

#[derive(Debug, serde::Deserialize)]
pub struct ListParams {
    #[serde(default)]
    pub sort: SortColumn,
    #[serde(default)]
    pub order: SortDir,
}

#[derive(Debug, serde::Serialize)]
pub struct CommentList {
    pub content_id: ContentId,
    pub comments: Vec<CommentThread>,
    pub reply: bool,
}

/// Published comments of one content item, threaded when replies are
/// enabled for the deployment.
pub async fn get_comments(
    State(config): State<Arc<Config>>,
    Path(content_id): Path<i64>,
    Query(params): Query<ListParams>,
    mut conn: DbConn,
) -> Result<Json<CommentList>, Error> {
    let content_id = ContentId(content_id);
    let comments = db::list_threaded(
        &mut conn,
        content_id,
        Status::Accepted,
        params.sort,
        params.order,
        config.comment_reply,
    )
    .await?;
    Ok(Json(CommentList {
        content_id,
        comments,
        reply: config.comment_reply,
    }))
}

#[derive(Debug, serde::Serialize)]
pub struct SubmittedComment {
    pub id: CommentId,
    pub message: String,
}

pub async fn add_comment(
    State(config): State<Arc<Config>>,
    State(moderation): State<Arc<Moderation>>,
    Path(content_id): Path<i64>,
    Identity(user): Identity,
    ClientSession(session_id): ClientSession,
    ClientIp(client_ip): ClientIp,
    RequestLocale(locale): RequestLocale,
    mut conn: DbConn,
    Json(payload): Json<CommentPayload>,
) -> Result<Json<SubmittedComment>, Error> {
    let submission = intake::authorize_submission(&config, user, &payload)?;
    let id = intake::submit(
        &mut conn,
        &config,
        &moderation,
        &submission,
        payload.parent,
        &SubmissionMeta {
            content_id: ContentId(content_id),
            session_id: &session_id,
            locale: &locale,
            client_ip: &client_ip,
        },
    )
    .await?;
    let message = if moderation.enabled() {
        "Your comment will be reviewed before publication"
    } else {
        "Your comment has been added"
    };
    Ok(Json(SubmittedComment {
        id,
        message: message.to_string(),
    }))
}

#[derive(Debug, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModerateParams {
    pub content_id: ContentId,
    pub session_hash: String,
    pub action: ModerationAction,
    pub comment_id: CommentId,
}

/// The endpoint behind the emailed approve/reject links. Every failing
/// precondition collapses into the same refusal response.
pub async fn moderate(
    State(moderation): State<Arc<Moderation>>,
    Query(params): Query<ModerateParams>,
    mut conn: DbConn,
) -> Result<String, Error> {
    if moderation
        .can_act_on(
            &mut conn,
            params.content_id,
            &params.session_hash,
            params.comment_id,
        )
        .await?
    {
        let applied = match params.action {
            ModerationAction::Approve => moderation.approve(&mut conn, params.comment_id).await?,
            ModerationAction::Reject => moderation.reject(&mut conn, params.comment_id).await?,
        };
        if applied {
            return Ok(match params.action {
                ModerationAction::Approve => String::from("Comment published"),
                ModerationAction::Reject => String::from("Comment rejected"),
            });
        }
    }
    Err(Error::moderation_refused())
}

#[derive(Debug, serde::Deserialize)]
pub struct RecentParams {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
    pub status: Option<Status>,
}

/// Latest comments across all content.
pub async fn recent_comments(
    Query(params): Query<RecentParams>,
    mut conn: DbConn,
) -> Result<Json<Vec<Comment>>, Error> {
    let limit = params.limit.unwrap_or(5).clamp(1, 100);
    let offset = params.offset.unwrap_or(0).max(0);
    Ok(Json(
        db::list_recent(&mut conn, limit, offset, params.status.into()).await?,
    ))
}

#[derive(Debug, serde::Deserialize)]
pub struct AuthorParams {
    pub limit: Option<i64>,
}

pub async fn comments_by_author(
    Path(author_id): Path<i64>,
    Query(params): Query<AuthorParams>,
    mut conn: DbConn,
) -> Result<Json<Vec<Comment>>, Error> {
    let limit = params.limit.unwrap_or(5).clamp(1, 100);
    Ok(Json(
        db::list_recent_by_author(&mut conn, AuthorId(author_id), limit).await?,
    ))
}

#[derive(Debug, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CountParams {
    pub content_id: Option<ContentId>,
    pub status: Option<Status>,
}

#[derive(Debug, serde::Serialize)]
pub struct CommentCount {
    pub count: i64,
}

pub async fn count_comments(
    Query(params): Query<CountParams>,
    mut conn: DbConn,
) -> Result<Json<CommentCount>, Error> {
    let count = db::count_comments(&mut conn, params.content_id, params.status.into()).await?;
    Ok(Json(CommentCount { count }))
}

#[derive(Debug, serde::Deserialize)]
pub struct SetStatus {
    pub status: i64,
}

/// Administrative status override. No Waiting precondition: an admin may
/// pull back an already published comment.
pub async fn set_status(
    AdminAuth: AdminAuth,
    Path(comment_id): Path<i64>,
    mut conn: DbConn,
    Json(body): Json<SetStatus>,
) -> Result<(), Error> {
    let status = Status::try_from(body.status)?;
    let affected = db::force_update_status(&mut conn, CommentId(comment_id), status).await?;
    if affected == 0 {
        return Err(Error::comment_not_found(CommentId(comment_id)));
    }
    Ok(())
}

pub async fn delete_comment(
    AdminAuth: AdminAuth,
    Path(comment_id): Path<i64>,
    mut conn: DbConn,
) -> Result<(), Error> {
    db::delete_by_id(&mut conn, CommentId(comment_id))
        .await?
        .map_err(|db::CommentNotFound(id)| Error::comment_not_found(id))
}

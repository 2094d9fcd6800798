//! Submission intake: one authorization decision resolving who is posting,
//! then persist the comment and hand the moderation workflow its turn.

use ezcomment_api::{AuthorId, CommentId, ContentId, Error as ApiError, Submission};

use crate::config::Config;
use crate::db::{self, NewComment};
use crate::moderation::Moderation;

/// Attributes of the signed-in user, as supplied by the identity provider.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct AuthenticatedUser {
    pub id: AuthorId,
    pub name: String,
    pub email: String,
}

/// Author-supplied fields of a submission request. Name and email are only
/// meaningful for anonymous submissions; signed-in users are identified by
/// the identity provider instead.
#[derive(Clone, Debug, serde::Deserialize)]
pub struct CommentPayload {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    pub message: String,
    #[serde(default)]
    pub parent: Option<CommentId>,
}

/// Request metadata from the session and locale collaborators.
pub struct SubmissionMeta<'a> {
    pub content_id: ContentId,
    pub session_id: &'a str,
    pub locale: &'a str,
    pub client_ip: &'a str,
}

/// The single point deciding how a visitor may post: signed-in users submit
/// under their own identity, everyone else is admitted only when anonymous
/// posting is enabled.
pub fn authorize_submission(
    config: &Config,
    user: Option<AuthenticatedUser>,
    payload: &CommentPayload,
) -> Result<Submission, ApiError> {
    match user {
        Some(user) => Ok(Submission::Authenticated {
            author: user.id,
            name: user.name,
            email: user.email,
            message: payload.message.clone(),
        }),
        None if config.anonymous_access => Ok(Submission::Anonymous {
            name: payload.name.clone().unwrap_or_default(),
            email: payload.email.clone().unwrap_or_default(),
            message: payload.message.clone(),
        }),
        None => Err(ApiError::PermissionDenied),
    }
}

/// Persists an authorized submission and, when moderation is on, sends the
/// notification carrying the approve/reject links. Returns the new id.
pub async fn submit(
    conn: &mut sqlx::SqliteConnection,
    config: &Config,
    moderation: &Moderation,
    submission: &Submission,
    parent: Option<CommentId>,
    meta: &SubmissionMeta<'_>,
) -> anyhow::Result<CommentId> {
    let language_id = db::resolve_language_id(&mut *conn, meta.locale).await?;
    let parent = if config.comment_reply { parent } else { None };
    let comment_id = db::insert_comment(
        &mut *conn,
        NewComment {
            content_id: meta.content_id,
            parent,
            language_id,
            author: submission.author(),
            name: submission.name(),
            email: submission.email(),
            text: submission.message(),
            status: moderation.initial_status(),
            session_key: meta.session_id,
            ip: meta.client_ip,
        },
    )
    .await?;
    if moderation.enabled() {
        moderation
            .issue_moderation_email(submission, meta.content_id, meta.session_id, comment_id)
            .await?;
    }
    Ok(comment_id)
}

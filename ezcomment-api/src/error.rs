use serde_json::json;

use crate::CommentId;

#[derive(Debug, Eq, PartialEq, thiserror::Error)]
pub enum Error {
    #[error("Unknown error: {0}")]
    Unknown(String),

    #[error("Permission denied")]
    PermissionDenied,

    #[error("Comment {0:?} does not exist")]
    CommentNotFound(CommentId),

    /// Deliberately carries no detail: the moderation endpoint must not tell
    /// a link-prober which precondition failed.
    #[error("Moderation request refused")]
    ModerationRefused,

    #[error("Invalid comment status {0}")]
    InvalidStatus(i64),
}

impl Error {
    pub fn status_code(&self) -> http::StatusCode {
        use http::StatusCode;
        match self {
            Error::Unknown(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Error::PermissionDenied => StatusCode::FORBIDDEN,
            Error::CommentNotFound(_) => StatusCode::NOT_FOUND,
            Error::ModerationRefused => StatusCode::NOT_ACCEPTABLE,
            Error::InvalidStatus(_) => StatusCode::BAD_REQUEST,
        }
    }

    pub fn contents(&self) -> Vec<u8> {
        serde_json::to_vec(&match self {
            Error::Unknown(msg) => json!({
                "message": msg,
                "type": "unknown",
            }),
            Error::PermissionDenied => json!({
                "message": "permission denied",
                "type": "permission-denied",
            }),
            Error::CommentNotFound(id) => json!({
                "message": "comment does not exist",
                "type": "comment-not-found",
                "commentId": id,
            }),
            Error::ModerationRefused => json!({
                "message": "an unexpected error has occurred, please contact the webmaster",
                "type": "moderation-refused",
            }),
            Error::InvalidStatus(s) => json!({
                "message": "invalid comment status",
                "type": "invalid-status",
                "status": s,
            }),
        })
        .expect("serializing error contents")
    }
}

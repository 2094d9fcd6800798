use chrono::Utc;

mod error;
mod submission;

pub use error::Error;
pub use submission::Submission;

pub type Time = chrono::DateTime<Utc>;

/// User id recorded for comments posted without an authenticated user.
pub const ANONYMOUS_AUTHOR: AuthorId = AuthorId(10);

#[derive(
    Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, serde::Deserialize, serde::Serialize,
)]
pub struct CommentId(pub i64);

#[derive(
    Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, serde::Deserialize, serde::Serialize,
)]
pub struct ContentId(pub i64);

#[derive(
    Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, serde::Deserialize, serde::Serialize,
)]
pub struct AuthorId(pub i64);

/// Internal language id of the CMS. 0 means the locale could not be resolved.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct LanguageId(pub i64);

impl LanguageId {
    pub const UNRESOLVED: LanguageId = LanguageId(0);
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Waiting,
    Accepted,
    Rejected,
}

impl Status {
    pub fn as_db(self) -> i64 {
        match self {
            Status::Waiting => 0,
            Status::Accepted => 1,
            Status::Rejected => 2,
        }
    }
}

impl TryFrom<i64> for Status {
    type Error = Error;

    fn try_from(value: i64) -> Result<Status, Error> {
        match value {
            0 => Ok(Status::Waiting),
            1 => Ok(Status::Accepted),
            2 => Ok(Status::Rejected),
            _ => Err(Error::InvalidStatus(value)),
        }
    }
}

/// Status filter for counting and listing. `Any` replaces the magic values
/// the listing operations used to take for "do not filter".
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum StatusFilter {
    Any,
    Only(Status),
}

impl StatusFilter {
    pub fn as_db(self) -> Option<i64> {
        match self {
            StatusFilter::Any => None,
            StatusFilter::Only(s) => Some(s.as_db()),
        }
    }
}

impl From<Option<Status>> for StatusFilter {
    fn from(s: Option<Status>) -> StatusFilter {
        s.map_or(StatusFilter::Any, StatusFilter::Only)
    }
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SortColumn {
    #[default]
    Created,
    Author,
}

impl SortColumn {
    pub fn sql_column(self) -> &'static str {
        match self {
            SortColumn::Created => "created",
            SortColumn::Author => "name",
        }
    }
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDir {
    Asc,
    #[default]
    Desc,
}

impl SortDir {
    pub fn sql_keyword(self) -> &'static str {
        match self {
            SortDir::Asc => "ASC",
            SortDir::Desc => "DESC",
        }
    }
}

/// A stored comment, as returned by the listing operations. The capability
/// and audit columns (session key, submitter ip) never leave the store.
#[derive(Clone, Debug, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct Comment {
    pub id: CommentId,
    pub content_id: ContentId,

    /// None for top-level comments.
    pub parent: Option<CommentId>,

    pub author: AuthorId,
    pub name: String,
    pub email: String,
    pub url: String,
    pub title: String,
    pub text: String,

    pub status: Status,
    pub created: Time,
}

/// A top-level comment together with its direct replies, in listing order.
#[derive(Clone, Debug, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct CommentThread {
    pub comment: Comment,
    pub replies: Vec<Comment>,
}

use crate::{AuthorId, ANONYMOUS_AUTHOR};

/// A comment submission, resolved once at the authorization boundary.
/// Anonymous and authenticated submissions carry different fields; the
/// variant fixes which, instead of the intake code re-checking the
/// authentication state at every use site.
#[derive(Clone, Debug, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
pub enum Submission {
    Anonymous {
        name: String,
        email: String,
        message: String,
    },
    Authenticated {
        author: AuthorId,
        name: String,
        email: String,
        message: String,
    },
}

impl Submission {
    pub fn author(&self) -> AuthorId {
        match self {
            Submission::Anonymous { .. } => ANONYMOUS_AUTHOR,
            Submission::Authenticated { author, .. } => *author,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Submission::Anonymous { name, .. } => name,
            Submission::Authenticated { name, .. } => name,
        }
    }

    pub fn email(&self) -> &str {
        match self {
            Submission::Anonymous { email, .. } => email,
            Submission::Authenticated { email, .. } => email,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            Submission::Anonymous { message, .. } => message,
            Submission::Authenticated { message, .. } => message,
        }
    }
}

//! The moderation workflow: decide whether a fresh submission needs
//! moderation, notify the moderator with approve/reject links, and apply
//! the Waiting -> Accepted/Rejected transition when a link is followed.

use std::sync::Arc;

use anyhow::Context;
use async_trait::async_trait;
use ezcomment_api::{CommentId, ContentId, Status, Submission};

use crate::{config::Config, db, token::TokenCodec};

#[derive(Clone, Copy, Debug, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ModerationAction {
    Approve,
    Reject,
}

impl ModerationAction {
    pub fn target_status(self) -> Status {
        match self {
            ModerationAction::Approve => Status::Accepted,
            ModerationAction::Reject => Status::Rejected,
        }
    }

    fn tag(self) -> &'static str {
        match self {
            ModerationAction::Approve => "approve",
            ModerationAction::Reject => "reject",
        }
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct OutgoingEmail {
    pub subject: String,
    pub from: String,
    pub to: String,
    pub body: String,
}

/// Mail dispatch boundary. Failures propagate to the caller untouched.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, mail: OutgoingEmail) -> anyhow::Result<()>;
}

/// Mailer that writes the message to the log instead of a transport, for
/// deployments where delivery is wired up out-of-process.
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, mail: OutgoingEmail) -> anyhow::Result<()> {
        tracing::info!(
            to = %mail.to,
            from = %mail.from,
            subject = %mail.subject,
            body = %mail.body,
            "outgoing moderation email"
        );
        Ok(())
    }
}

pub struct EmailContext<'a> {
    pub name: &'a str,
    pub email: &'a str,
    pub comment: &'a str,
    pub approve_url: &'a str,
    pub reject_url: &'a str,
}

/// Rendering boundary for the notification body.
pub trait BodyTemplate: Send + Sync {
    fn render(&self, ctx: &EmailContext<'_>) -> String;
}

pub struct PlainTextBody;

impl BodyTemplate for PlainTextBody {
    fn render(&self, ctx: &EmailContext<'_>) -> String {
        format!(
            "{} <{}> submitted a comment awaiting moderation:\n\n\
             {}\n\n\
             Approve: {}\n\
             Reject: {}\n",
            ctx.name, ctx.email, ctx.comment, ctx.approve_url, ctx.reject_url
        )
    }
}

pub struct Moderation {
    enabled: bool,
    subject: String,
    from: String,
    to: String,
    moderation_url: String,
    codec: TokenCodec,
    mailer: Arc<dyn Mailer>,
    template: Arc<dyn BodyTemplate>,
}

impl Moderation {
    pub fn new(
        config: &Config,
        codec: TokenCodec,
        mailer: Arc<dyn Mailer>,
        template: Arc<dyn BodyTemplate>,
    ) -> Moderation {
        Moderation {
            enabled: config.moderation,
            subject: config.moderate_subject.clone(),
            from: config.moderate_from.clone(),
            to: config.moderate_to.clone(),
            moderation_url: config.moderation_url.clone(),
            codec,
            mailer,
            template,
        }
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    /// Status a fresh submission starts in: held for moderation when
    /// moderation is on, published immediately otherwise.
    pub fn initial_status(&self) -> Status {
        if self.enabled {
            Status::Waiting
        } else {
            Status::Accepted
        }
    }

    /// Checks every precondition for acting on a moderation link: the token
    /// decodes, the decoded session matches the comment's stored session
    /// key, the comment belongs to the content item, and it is still
    /// Waiting. One combined query, so there is no window between checking
    /// and acting, and no caller learns which condition failed.
    pub async fn can_act_on(
        &self,
        conn: &mut sqlx::SqliteConnection,
        content_id: ContentId,
        token: &str,
        comment_id: CommentId,
    ) -> anyhow::Result<bool> {
        let session = match self.codec.decode(token) {
            Some(session) => session,
            None => return Ok(false),
        };
        db::waiting_comment_matches(&mut *conn, content_id, &session, comment_id).await
    }

    /// Applies the transition. True iff this call was the one that moved
    /// the comment out of Waiting.
    async fn apply(
        &self,
        conn: &mut sqlx::SqliteConnection,
        action: ModerationAction,
        comment_id: CommentId,
    ) -> anyhow::Result<bool> {
        let affected =
            db::update_status_if_waiting(&mut *conn, comment_id, action.target_status()).await?;
        Ok(affected > 0)
    }

    pub async fn approve(
        &self,
        conn: &mut sqlx::SqliteConnection,
        comment_id: CommentId,
    ) -> anyhow::Result<bool> {
        self.apply(conn, ModerationAction::Approve, comment_id).await
    }

    pub async fn reject(
        &self,
        conn: &mut sqlx::SqliteConnection,
        comment_id: CommentId,
    ) -> anyhow::Result<bool> {
        self.apply(conn, ModerationAction::Reject, comment_id).await
    }

    fn moderation_link(
        &self,
        content_id: ContentId,
        token: &str,
        action: ModerationAction,
        comment_id: CommentId,
    ) -> String {
        format!(
            "{}?contentId={}&sessionHash={}&action={}&commentId={}",
            self.moderation_url,
            content_id.0,
            token,
            action.tag(),
            comment_id.0
        )
    }

    /// Composes and dispatches the notification for a submission held in
    /// Waiting: one approve link and one reject link, both carrying the
    /// encrypted session token.
    pub async fn issue_moderation_email(
        &self,
        submission: &Submission,
        content_id: ContentId,
        session_id: &str,
        comment_id: CommentId,
    ) -> anyhow::Result<()> {
        let token = self
            .codec
            .encode(session_id)
            .context("encoding session token for moderation links")?;
        let approve_url =
            self.moderation_link(content_id, &token, ModerationAction::Approve, comment_id);
        let reject_url =
            self.moderation_link(content_id, &token, ModerationAction::Reject, comment_id);
        let body = self.template.render(&EmailContext {
            name: submission.name(),
            email: submission.email(),
            comment: submission.message(),
            approve_url: &approve_url,
            reject_url: &reject_url,
        });
        self.mailer
            .send(OutgoingEmail {
                subject: self.subject.clone(),
                from: self.from.clone(),
                to: self.to.clone(),
                body,
            })
            .await
            .context("dispatching moderation email")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil;
    use ezcomment_api::Status;

    #[test]
    fn initial_status_follows_configuration() {
        let (moderation, _) = testutil::moderation(&testutil::config(true, true));
        assert_eq!(moderation.initial_status(), Status::Waiting);
        let (moderation, _) = testutil::moderation(&testutil::config(false, true));
        assert_eq!(moderation.initial_status(), Status::Accepted);
    }

    #[tokio::test]
    async fn approve_then_reject_applies_only_the_first() {
        let pool = testutil::pool().await;
        let mut conn = pool.acquire().await.unwrap();
        let (moderation, _) = testutil::moderation(&testutil::config(true, true));
        let id = testutil::seed_comment(&mut conn, 9, None, Status::Waiting, "a", "abc").await;
        let token = testutil::codec().encode("abc").unwrap();

        assert!(moderation.can_act_on(&mut conn, ContentId(9), &token, id).await.unwrap());
        assert!(moderation.approve(&mut conn, id).await.unwrap());

        // The link is still valid crypto-wise, but the comment left Waiting.
        assert!(!moderation.can_act_on(&mut conn, ContentId(9), &token, id).await.unwrap());
        assert!(!moderation.reject(&mut conn, id).await.unwrap());

        let accepted = db::list_recent(
            &mut conn,
            10,
            0,
            ezcomment_api::StatusFilter::Only(Status::Accepted),
        )
        .await
        .unwrap();
        assert_eq!(accepted.iter().map(|c| c.id).collect::<Vec<_>>(), vec![id]);
    }

    #[tokio::test]
    async fn can_act_on_rejects_each_failing_precondition() {
        let pool = testutil::pool().await;
        let mut conn = pool.acquire().await.unwrap();
        let (moderation, _) = testutil::moderation(&testutil::config(true, true));
        let id = testutil::seed_comment(&mut conn, 9, None, Status::Waiting, "a", "abc").await;
        let token = testutil::codec().encode("abc").unwrap();

        // Wrong content item.
        assert!(!moderation.can_act_on(&mut conn, ContentId(10), &token, id).await.unwrap());
        // Session mismatch.
        let other = testutil::codec().encode("not-abc").unwrap();
        assert!(!moderation.can_act_on(&mut conn, ContentId(9), &other, id).await.unwrap());
        // Forged or corrupted token.
        assert!(!moderation
            .can_act_on(&mut conn, ContentId(9), "garbage-token", id)
            .await
            .unwrap());
        // Wrong comment id.
        assert!(!moderation
            .can_act_on(&mut conn, ContentId(9), &token, CommentId(id.0 + 1))
            .await
            .unwrap());
        // Not Waiting anymore.
        moderation.approve(&mut conn, id).await.unwrap();
        assert!(!moderation.can_act_on(&mut conn, ContentId(9), &token, id).await.unwrap());
    }

    #[tokio::test]
    async fn moderation_email_carries_both_links() {
        let (moderation, outbox) = testutil::moderation(&testutil::config(true, true));
        let submission = Submission::Anonymous {
            name: "Alice".into(),
            email: "alice@example.com".into(),
            message: "first!".into(),
        };
        moderation
            .issue_moderation_email(&submission, ContentId(12), "sess-1", CommentId(3))
            .await
            .unwrap();

        let sent = outbox.sent();
        assert_eq!(sent.len(), 1);
        let mail = &sent[0];
        assert_eq!(mail.subject, "moderation needed");
        assert_eq!(mail.to, "mod@example.com");
        assert!(mail.body.contains("first!"));
        assert!(mail.body.contains("action=approve&commentId=3"));
        assert!(mail.body.contains("action=reject&commentId=3"));
        assert!(mail.body.contains("contentId=12"));

        // The embedded token decodes back to the submitting session.
        let hash = mail
            .body
            .split("sessionHash=")
            .nth(1)
            .and_then(|rest| rest.split('&').next())
            .unwrap();
        assert_eq!(testutil::codec().decode(hash).as_deref(), Some("sess-1"));
    }

    #[tokio::test]
    async fn empty_session_cannot_issue_links() {
        let (moderation, outbox) = testutil::moderation(&testutil::config(true, true));
        let submission = Submission::Anonymous {
            name: "Alice".into(),
            email: "alice@example.com".into(),
            message: "hi".into(),
        };
        let res = moderation
            .issue_moderation_email(&submission, ContentId(1), "", CommentId(1))
            .await;
        assert!(res.is_err());
        assert!(outbox.sent().is_empty());
    }
}

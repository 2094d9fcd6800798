//! Shared fixtures for the in-crate tests: an in-memory database with the
//! migrations applied, seeding shortcuts, and a mail outbox.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use ezcomment_api::{AuthorId, CommentId, ContentId, LanguageId, Status};

use crate::config::Config;
use crate::db::{self, NewComment};
use crate::moderation::{Mailer, Moderation, OutgoingEmail, PlainTextBody};
use crate::token::TokenCodec;

const SECRET: &str = "test secret, kept well away from production";

pub fn codec() -> TokenCodec {
    TokenCodec::new(SECRET)
}

pub fn config(moderation: bool, anonymous_access: bool) -> Config {
    Config {
        anonymous_access,
        moderation,
        comment_reply: true,
        moderate_subject: "moderation needed".into(),
        moderate_from: "no-reply@example.com".into(),
        moderate_to: "mod@example.com".into(),
        moderation_url: "http://localhost:3000/comments/moderate".into(),
        admin_token: Some("admin-token".into()),
    }
}

/// Mailer that records everything it is asked to send.
#[derive(Clone, Default)]
pub struct MockMailer {
    sent: Arc<Mutex<Vec<OutgoingEmail>>>,
}

impl MockMailer {
    pub fn sent(&self) -> Vec<OutgoingEmail> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Mailer for MockMailer {
    async fn send(&self, mail: OutgoingEmail) -> anyhow::Result<()> {
        self.sent.lock().unwrap().push(mail);
        Ok(())
    }
}

pub fn moderation(config: &Config) -> (Moderation, MockMailer) {
    let outbox = MockMailer::default();
    let moderation = Moderation::new(
        config,
        codec(),
        Arc::new(outbox.clone()),
        Arc::new(PlainTextBody),
    );
    (moderation, outbox)
}

pub async fn state(config: Config) -> (crate::extractors::AppState, MockMailer) {
    let (moderation, outbox) = moderation(&config);
    let state = crate::extractors::AppState {
        db: crate::extractors::DbPool::new(pool().await),
        config: Arc::new(config),
        moderation: Arc::new(moderation),
    };
    (state, outbox)
}

pub async fn pool() -> sqlx::SqlitePool {
    let pool = sqlx::sqlite::SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("opening in-memory database");
    crate::MIGRATOR
        .run(&pool)
        .await
        .expect("applying migrations");
    pool
}

pub async fn seed_comment(
    conn: &mut sqlx::SqliteConnection,
    content_id: i64,
    parent: Option<CommentId>,
    status: Status,
    name: &str,
    session_key: &str,
) -> CommentId {
    db::insert_comment(
        conn,
        NewComment {
            content_id: ContentId(content_id),
            parent,
            language_id: LanguageId::UNRESOLVED,
            author: AuthorId(1),
            name,
            email: "someone@example.com",
            text: "a comment",
            status,
            session_key,
            ip: "127.0.0.1",
        },
    )
    .await
    .expect("seeding comment")
}

/// Inserts with an explicit creation timestamp, for ordering tests.
pub async fn insert_at(
    conn: &mut sqlx::SqliteConnection,
    content_id: i64,
    parent: i64,
    status: Status,
    name: &str,
    session_key: &str,
    created: i64,
) -> CommentId {
    let res = sqlx::query(
        "INSERT INTO ezcomment
            (language_id, created, modified, user_id, session_key, ip,
             contentobject_id, parent_comment_id, name, email, url, text, status, title)
         VALUES (0, ?, ?, 1, ?, '127.0.0.1', ?, ?, ?, 'someone@example.com', '', 'a comment', ?, '')",
    )
    .bind(created)
    .bind(created)
    .bind(session_key)
    .bind(content_id)
    .bind(parent)
    .bind(name)
    .bind(status.as_db())
    .execute(conn)
    .await
    .expect("seeding comment with explicit timestamp");
    CommentId(res.last_insert_rowid())
}

pub async fn insert_by(
    conn: &mut sqlx::SqliteConnection,
    content_id: i64,
    author: AuthorId,
    status: Status,
    name: &str,
    created: i64,
) -> CommentId {
    let res = sqlx::query(
        "INSERT INTO ezcomment
            (language_id, created, modified, user_id, session_key, ip,
             contentobject_id, parent_comment_id, name, email, url, text, status, title)
         VALUES (0, ?, ?, ?, 's', '127.0.0.1', ?, 0, ?, 'someone@example.com', '', 'a comment', ?, '')",
    )
    .bind(created)
    .bind(created)
    .bind(author.0)
    .bind(content_id)
    .bind(name)
    .bind(status.as_db())
    .execute(conn)
    .await
    .expect("seeding authored comment");
    CommentId(res.last_insert_rowid())
}

pub async fn seed_language(conn: &mut sqlx::SqliteConnection, id: i64, locale: &str) {
    sqlx::query("INSERT INTO ezcontent_language (id, locale, name) VALUES (?, ?, ?)")
        .bind(id)
        .bind(locale)
        .bind(locale)
        .execute(conn)
        .await
        .expect("seeding language");
}

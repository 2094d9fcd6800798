use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use axum::routing::{delete, get, put};
use axum::Router;
use structopt::StructOpt;

mod config;
mod db;
mod error;
mod extractors;
mod handlers;
mod intake;
mod moderation;
#[cfg(test)]
mod testutil;
mod token;

pub use error::Error;

use config::Config;
use extractors::{AppState, DbPool};
use moderation::{LogMailer, Moderation, PlainTextBody};
use token::TokenCodec;

static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!();

#[derive(Debug, StructOpt)]
#[structopt(
    name = "ezcomment-server",
    about = "Threaded comments with email moderation"
)]
struct Opt {
    /// Address to listen on
    #[structopt(long, default_value = "127.0.0.1:3000")]
    bind: SocketAddr,

    /// Secret the moderation-link tokens are encrypted with
    #[structopt(long, env = "EZCOMMENT_SECRET", hide_env_values = true)]
    secret: String,

    /// Bearer token granting access to the administrative routes
    #[structopt(long, env = "EZCOMMENT_ADMIN_TOKEN", hide_env_values = true)]
    admin_token: Option<String>,

    /// Hold new comments for moderation and email approve/reject links
    #[structopt(long)]
    moderate: bool,

    /// Refuse comments from visitors who are not signed in
    #[structopt(long)]
    no_anonymous: bool,

    /// Do not thread replies
    #[structopt(long)]
    no_replies: bool,

    /// Subject line of the moderation notification
    #[structopt(long, default_value = "New comment awaiting moderation")]
    moderate_subject: String,

    /// Sender address of the moderation notification
    #[structopt(long, default_value = "no-reply@localhost")]
    moderate_from: String,

    /// Moderator address the notification goes to
    #[structopt(long, default_value = "webmaster@localhost")]
    moderate_to: String,

    /// Absolute URL of the moderation endpoint, as reachable from the
    /// moderator's mailbox
    #[structopt(long, default_value = "http://127.0.0.1:3000/comments/moderate")]
    moderation_url: String,
}

pub fn app(state: AppState) -> Router {
    Router::new()
        .route(
            "/content/:content_id/comments",
            get(handlers::get_comments).post(handlers::add_comment),
        )
        .route("/comments/moderate", get(handlers::moderate))
        .route("/comments/recent", get(handlers::recent_comments))
        .route("/comments/count", get(handlers::count_comments))
        .route("/users/:author_id/comments", get(handlers::comments_by_author))
        .route("/comments/:comment_id/status", put(handlers::set_status))
        .route("/comments/:comment_id", delete(handlers::delete_comment))
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .with_state(state)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let opt = Opt::from_args();
    let bind = opt.bind;

    let db_url = std::env::var("DATABASE_URL").context("DATABASE_URL must be set")?;
    let pool = sqlx::sqlite::SqlitePoolOptions::new()
        .connect(&db_url)
        .await
        .with_context(|| format!("Error opening database {:?}", db_url))?;
    MIGRATOR.run(&pool).await.context("applying migrations")?;

    let codec = TokenCodec::new(&opt.secret);
    let config = Config {
        anonymous_access: !opt.no_anonymous,
        moderation: opt.moderate,
        comment_reply: !opt.no_replies,
        moderate_subject: opt.moderate_subject,
        moderate_from: opt.moderate_from,
        moderate_to: opt.moderate_to,
        moderation_url: opt.moderation_url,
        admin_token: opt.admin_token,
    };
    let moderation = Moderation::new(&config, codec, Arc::new(LogMailer), Arc::new(PlainTextBody));
    let state = AppState {
        db: DbPool::new(pool),
        config: Arc::new(config),
        moderation: Arc::new(moderation),
    };

    tracing::info!("listening on {}", bind);
    axum::Server::bind(&bind)
        .serve(app(state).into_make_service())
        .await
        .context("serving axum webserver")
}

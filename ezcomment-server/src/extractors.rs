//! Request extractors. The identity, session and client-address
//! collaborators are the fronting CMS, which authenticates the visitor and
//! forwards what this service needs as request headers:
//! `x-session-id` (the visitor's session identifier), `x-remote-user-id` /
//! `x-remote-user-name` / `x-remote-user-email` (set only for signed-in
//! users), and the usual `x-forwarded-for`.

use std::ops::{Deref, DerefMut};
use std::sync::Arc;

use anyhow::Context;
use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{self, request},
};
use ezcomment_api::AuthorId;

use crate::{config::Config, intake::AuthenticatedUser, moderation::Moderation, Error};

#[derive(Clone, axum::extract::FromRef)]
pub struct AppState {
    pub db: DbPool,
    pub config: Arc<Config>,
    pub moderation: Arc<Moderation>,
}

#[derive(Clone)]
pub struct DbPool(sqlx::SqlitePool);

impl DbPool {
    pub fn new(pool: sqlx::SqlitePool) -> DbPool {
        DbPool(pool)
    }

    pub async fn acquire(&self) -> Result<DbConn, Error> {
        Ok(DbConn(
            self.0.acquire().await.context("acquiring db connection")?,
        ))
    }
}

pub struct DbConn(sqlx::pool::PoolConnection<sqlx::Sqlite>);

#[async_trait]
impl FromRequestParts<AppState> for DbConn {
    type Rejection = Error;

    async fn from_request_parts(
        _req: &mut request::Parts,
        state: &AppState,
    ) -> Result<DbConn, Error> {
        state.db.acquire().await
    }
}

impl Deref for DbConn {
    type Target = sqlx::SqliteConnection;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl DerefMut for DbConn {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.0
    }
}

/// Bearer-token gate for the administrative routes. With no admin token
/// configured these routes are unreachable.
pub struct AdminAuth;

#[async_trait]
impl FromRequestParts<AppState> for AdminAuth {
    type Rejection = Error;

    async fn from_request_parts(
        req: &mut request::Parts,
        state: &AppState,
    ) -> Result<AdminAuth, Error> {
        let header = req
            .headers
            .get(http::header::AUTHORIZATION)
            .ok_or(Error::permission_denied())?;
        let header = header.to_str().map_err(|_| Error::permission_denied())?;
        let mut parts = header.split(' ');
        if !parts
            .next()
            .ok_or(Error::permission_denied())?
            .eq_ignore_ascii_case("bearer")
        {
            return Err(Error::permission_denied());
        }
        let token = parts.next().ok_or(Error::permission_denied())?;
        if parts.next().is_some() {
            return Err(Error::permission_denied());
        }
        match &state.config.admin_token {
            Some(admin) if admin == token => Ok(AdminAuth),
            _ => Err(Error::permission_denied()),
        }
    }
}

fn header_string(req: &request::Parts, name: &str) -> Result<Option<String>, Error> {
    match req.headers.get(name) {
        None => Ok(None),
        Some(value) => Ok(Some(
            value
                .to_str()
                .map_err(|_| Error::permission_denied())?
                .to_string(),
        )),
    }
}

/// The submitting browser session, later used as the moderation capability.
pub struct ClientSession(pub String);

#[async_trait]
impl<S: Sync> FromRequestParts<S> for ClientSession {
    type Rejection = Error;

    async fn from_request_parts(
        req: &mut request::Parts,
        _state: &S,
    ) -> Result<ClientSession, Error> {
        match header_string(req, "x-session-id")? {
            Some(session) if !session.is_empty() => Ok(ClientSession(session)),
            _ => Err(Error::permission_denied()),
        }
    }
}

/// Signed-in user attributes, or None for an anonymous visitor.
pub struct Identity(pub Option<AuthenticatedUser>);

#[async_trait]
impl<S: Sync> FromRequestParts<S> for Identity {
    type Rejection = Error;

    async fn from_request_parts(req: &mut request::Parts, _state: &S) -> Result<Identity, Error> {
        let id = match header_string(req, "x-remote-user-id")? {
            None => return Ok(Identity(None)),
            Some(id) => id.parse::<i64>().map_err(|_| Error::permission_denied())?,
        };
        let name = header_string(req, "x-remote-user-name")?.unwrap_or_default();
        let email = header_string(req, "x-remote-user-email")?.unwrap_or_default();
        Ok(Identity(Some(AuthenticatedUser {
            id: AuthorId(id),
            name,
            email,
        })))
    }
}

/// The request locale, taken from the first Accept-Language tag. The store
/// resolves it to a language id, unresolved locales included.
pub struct RequestLocale(pub String);

#[async_trait]
impl<S: Sync> FromRequestParts<S> for RequestLocale {
    type Rejection = Error;

    async fn from_request_parts(
        req: &mut request::Parts,
        _state: &S,
    ) -> Result<RequestLocale, Error> {
        let accept = header_string(req, "accept-language")?.unwrap_or_default();
        let first = accept
            .split(',')
            .next()
            .unwrap_or("")
            .split(';')
            .next()
            .unwrap_or("")
            .trim();
        Ok(RequestLocale(first.to_string()))
    }
}

/// Submitter network address, for the audit column. Empty when the proxy
/// did not forward one.
pub struct ClientIp(pub String);

#[async_trait]
impl<S: Sync> FromRequestParts<S> for ClientIp {
    type Rejection = Error;

    async fn from_request_parts(req: &mut request::Parts, _state: &S) -> Result<ClientIp, Error> {
        let forwarded = header_string(req, "x-forwarded-for")?.unwrap_or_default();
        let first = forwarded.split(',').next().unwrap_or("").trim();
        Ok(ClientIp(first.to_string()))
    }
}

//! Identity supplied by the authenticating proxy in front of the blog.
//!
//! [`attach_identity`] turns the trusted headers into a [`User`], records
//! the profile so `createdBy` can be resolved later and stores it as a
//! request extension. Handlers take it through the [`CurrentUser`]
//! extractor and pass it on explicitly.

use std::convert::Infallible;

use axum::{
    extract::{FromRequestParts, OptionalFromRequestParts, Request, State},
    http::{request::Parts, HeaderMap, HeaderName},
    middleware::Next,
    response::Response,
};
use blog_core::{config, BlogConfigSnapshot, BlogError, User, UserId};

use crate::{AppState, BlogAxumError};

/// Names of the headers carrying the upstream identity.
#[derive(Debug, Clone)]
pub struct IdentityHeaders {
    pub user_id: HeaderName,
    pub full_name: HeaderName,
    pub email: HeaderName,
}

impl IdentityHeaders {
    pub fn from_snapshot(snapshot: &BlogConfigSnapshot) -> anyhow::Result<Self> {
        Ok(Self {
            user_id: header(snapshot, config::AUTH_USER_HEADER, "x-user-id")?,
            full_name: header(snapshot, config::AUTH_NAME_HEADER, "x-user-name")?,
            email: header(snapshot, config::AUTH_EMAIL_HEADER, "x-user-email")?,
        })
    }

    /// `Ok(None)` when no identity was supplied.
    pub fn user_from(&self, headers: &HeaderMap) -> Result<Option<User>, BlogError> {
        let Some(id) = read(headers, &self.user_id)? else {
            return Ok(None);
        };
        let id = UserId::new(id)?;

        let full_name = read(headers, &self.full_name)?.unwrap_or_else(|| id.to_string());
        let mut user = User::new(id, full_name);
        if let Some(email) = read(headers, &self.email)? {
            user = user.with_email(email);
        }
        Ok(Some(user))
    }
}

fn header(snapshot: &BlogConfigSnapshot, key: &str, default: &str) -> anyhow::Result<HeaderName> {
    let name = snapshot.get_or(key, default).to_ascii_lowercase();
    HeaderName::from_bytes(name.as_bytes())
        .map_err(|e| anyhow::anyhow!("invalid header name for {key}: {e}"))
}

fn read(headers: &HeaderMap, name: &HeaderName) -> Result<Option<String>, BlogError> {
    match headers.get(name) {
        None => Ok(None),
        Some(value) => {
            let value = value
                .to_str()
                .map_err(|_| BlogError::bad_request(format!("Invalid {name} header")))?
                .trim();
            Ok((!value.is_empty()).then(|| value.to_string()))
        }
    }
}

pub async fn attach_identity(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, BlogAxumError> {
    if let Some(user) = state.identity.user_from(req.headers())? {
        let user = state.blog.identify(user).await?;
        tracing::debug!(user_id = %user.id, "identity attached");
        req.extensions_mut().insert(CurrentUser(user));
    }
    Ok(next.run(req).await)
}

/// The acting user. Rejects with 401 when the request carries no identity.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub User);

impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = BlogAxumError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<CurrentUser>()
            .cloned()
            .ok_or_else(|| BlogError::not_authenticated("Not authenticated").into())
    }
}

impl<S> OptionalFromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        _state: &S,
    ) -> Result<Option<Self>, Self::Rejection> {
        Ok(parts.extensions.get::<CurrentUser>().cloned())
    }
}

use axum::{
    extract::{FromRef, FromRequestParts},
    http::{header::AUTHORIZATION, request::Parts, HeaderMap},
};

use crate::{
    auth::{SessionClaims, TokenService},
    ids::UserId,
    AppError, AppResult,
};

/// Identity of the caller for one request.
///
/// Only produced from verified claims, either by the axum extractor below or
/// from claims the [`TokenService`] returned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionContext {
    user_id: UserId,
    nickname: String,
    email: String,
}

impl SessionContext {
    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    pub fn nickname(&self) -> &str {
        &self.nickname
    }

    pub fn email(&self) -> &str {
        &self.email
    }
}

impl From<SessionClaims> for SessionContext {
    fn from(claims: SessionClaims) -> Self {
        Self {
            user_id: claims.user_id,
            nickname: claims.nickname,
            email: claims.email,
        }
    }
}

impl<S> FromRequestParts<S> for SessionContext
where
    TokenService: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let tokens = TokenService::from_ref(state);
        let token = bearer_token(&parts.headers)?;
        let claims = tokens.verify(token)?;
        Ok(claims.into())
    }
}

/// `Ok(None)` when no Authorization header was sent.
fn bearer_token(headers: &HeaderMap) -> AppResult<Option<&str>> {
    let Some(header) = headers.get(AUTHORIZATION) else {
        return Ok(None);
    };

    let header = header.to_str().map_err(|_| AppError::MalformedToken)?;
    let Some((scheme, token)) = header.split_once(' ') else {
        return Err(AppError::MalformedToken);
    };
    if !scheme.eq_ignore_ascii_case("bearer") {
        return Err(AppError::MalformedToken);
    }

    Ok(Some(token.trim()))
}

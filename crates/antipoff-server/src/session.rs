//! Cookie sessions.
//!
//! Login sets two HttpOnly cookies holding signed tokens: a short-lived
//! access token and a longer-lived refresh token. The extractors below turn
//! them back into a [`User`] for handlers.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use tracing::debug;

use antipoff_shared::constants::{ACCESS_TOKEN_COOKIE, REFRESH_TOKEN_COOKIE};
use antipoff_shared::token::{Claims, TokenKind, TokenSigner};
use antipoff_shared::TokenError;
use antipoff_store::User;

use crate::api::AppState;
use crate::config::ServerConfig;
use crate::error::ServerError;

#[derive(Debug, Clone)]
pub struct SessionKeys {
    signer: TokenSigner,
    access_ttl: chrono::Duration,
    refresh_ttl: chrono::Duration,
    cookie_secure: bool,
}

impl SessionKeys {
    pub fn from_config(config: &ServerConfig) -> Result<Self, TokenError> {
        Ok(Self {
            signer: TokenSigner::new(config.secret_key.as_bytes(), config.algorithm)?,
            access_ttl: config.access_token_ttl,
            refresh_ttl: config.refresh_token_ttl,
            cookie_secure: config.cookie_secure,
        })
    }

    /// Issue a fresh access/refresh pair for `user_id` and store both in `jar`.
    pub fn set_tokens(&self, jar: CookieJar, user_id: i64) -> Result<CookieJar, ServerError> {
        let access = self.signer.issue(user_id, TokenKind::Access, self.access_ttl)?;
        let refresh = self.signer.issue(user_id, TokenKind::Refresh, self.refresh_ttl)?;

        Ok(jar
            .add(self.cookie(ACCESS_TOKEN_COOKIE, access))
            .add(self.cookie(REFRESH_TOKEN_COOKIE, refresh)))
    }

    /// Remove both session cookies.
    pub fn clear_tokens(jar: CookieJar) -> CookieJar {
        jar.remove(Cookie::build(ACCESS_TOKEN_COOKIE).path("/"))
            .remove(Cookie::build(REFRESH_TOKEN_COOKIE).path("/"))
    }

    pub fn verify(&self, token: &str, kind: TokenKind) -> Result<Claims, TokenError> {
        self.signer.verify(token, kind)
    }

    fn cookie(&self, name: &'static str, value: String) -> Cookie<'static> {
        Cookie::build((name, value))
            .path("/")
            .http_only(true)
            .same_site(SameSite::Lax)
            .secure(self.cookie_secure)
            .build()
    }
}

/// Resolve the user named by the token in `cookie`, which must be of `kind`.
async fn session_user(
    parts: &Parts,
    state: &AppState,
    cookie: &str,
    kind: TokenKind,
) -> Result<User, ServerError> {
    let jar = CookieJar::from_headers(&parts.headers);
    let token = jar
        .get(cookie)
        .map(|c| c.value().to_owned())
        .ok_or_else(|| ServerError::Unauthorized("Token not found".into()))?;

    let claims = state.session.verify(&token, kind).map_err(|e| {
        debug!(error = %e, ?kind, "Rejected session token");
        ServerError::from(e)
    })?;
    let user_id = claims.user_id()?;

    let user = state
        .identity
        .find_by_id(user_id)
        .await?
        .ok_or_else(|| ServerError::Unauthorized("User not found".into()))?;

    if !user.is_active {
        return Err(ServerError::Unauthorized("User is inactive".into()));
    }
    Ok(user)
}

/// The logged-in user, from a valid access token.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub User);

impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = ServerError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        session_user(parts, state, ACCESS_TOKEN_COOKIE, TokenKind::Access)
            .await
            .map(CurrentUser)
    }
}

/// A logged-in user holding the admin role.
#[derive(Debug, Clone)]
pub struct AdminUser(pub User);

impl FromRequestParts<AppState> for AdminUser {
    type Rejection = ServerError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let CurrentUser(user) = CurrentUser::from_request_parts(parts, state).await?;
        if !state.identity.is_admin(&user).await? {
            return Err(ServerError::Forbidden("Insufficient permissions".into()));
        }
        Ok(AdminUser(user))
    }
}

/// The user named by a valid refresh token.
#[derive(Debug, Clone)]
pub struct RefreshUser(pub User);

impl FromRequestParts<AppState> for RefreshUser {
    type Rejection = ServerError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        session_user(parts, state, REFRESH_TOKEN_COOKIE, TokenKind::Refresh)
            .await
            .map(RefreshUser)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keys() -> SessionKeys {
        SessionKeys::from_config(&ServerConfig::default()).unwrap()
    }

    #[test]
    fn test_set_tokens_adds_both_cookies() {
        let keys = keys();
        let jar = keys.set_tokens(CookieJar::new(), 42).unwrap();

        let access = jar.get(ACCESS_TOKEN_COOKIE).unwrap();
        let refresh = jar.get(REFRESH_TOKEN_COOKIE).unwrap();
        assert_eq!(access.http_only(), Some(true));
        assert_eq!(access.same_site(), Some(SameSite::Lax));
        assert_eq!(access.path(), Some("/"));

        let claims = keys.verify(access.value(), TokenKind::Access).unwrap();
        assert_eq!(claims.user_id().unwrap(), 42);
        let claims = keys.verify(refresh.value(), TokenKind::Refresh).unwrap();
        assert_eq!(claims.user_id().unwrap(), 42);
    }

    #[test]
    fn test_refresh_token_is_not_an_access_token() {
        let keys = keys();
        let jar = keys.set_tokens(CookieJar::new(), 1).unwrap();
        let refresh = jar.get(REFRESH_TOKEN_COOKIE).unwrap();
        assert!(matches!(
            keys.verify(refresh.value(), TokenKind::Access),
            Err(TokenError::WrongKind)
        ));
    }

    #[test]
    fn test_clear_tokens_removes_cookies() {
        let keys = keys();
        let jar = keys.set_tokens(CookieJar::new(), 1).unwrap();
        let jar = SessionKeys::clear_tokens(jar);
        assert!(jar.get(ACCESS_TOKEN_COOKIE).is_none());
        assert!(jar.get(REFRESH_TOKEN_COOKIE).is_none());
    }

    #[test]
    fn test_secure_flag_follows_config() {
        let config = ServerConfig {
            cookie_secure: true,
            ..ServerConfig::default()
        };
        let keys = SessionKeys::from_config(&config).unwrap();
        let jar = keys.set_tokens(CookieJar::new(), 1).unwrap();
        assert_eq!(jar.get(ACCESS_TOKEN_COOKIE).unwrap().secure(), Some(true));
    }
}

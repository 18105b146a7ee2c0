//! Account endpoints: register, login, logout, refresh and user listings.

use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use axum_extra::extract::cookie::CookieJar;
use tracing::info;

use antipoff_shared::dto::{LoginResponse, MessageResponse, UserAuth, UserInfo, UserRegister};

use crate::api::AppState;
use crate::error::ServerError;
use crate::identity::user_info;
use crate::session::{AdminUser, CurrentUser, RefreshUser, SessionKeys};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/register/", post(register))
        .route("/login/", post(login))
        .route("/logout", post(logout))
        .route("/refresh", post(refresh))
        .route("/me/", get(me))
        .route("/all_users/", get(all_users))
}

async fn register(
    State(state): State<AppState>,
    Json(request): Json<UserRegister>,
) -> Result<Json<MessageResponse>, ServerError> {
    state.identity.register(&request).await?;
    Ok(Json(MessageResponse::new("You have successfully registered!")))
}

async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(request): Json<UserAuth>,
) -> Result<(CookieJar, Json<LoginResponse>), ServerError> {
    let user = state
        .identity
        .authenticate(&request.email, &request.password)
        .await?
        .ok_or_else(|| ServerError::Unauthorized("Invalid email or password".into()))?;

    if !user.is_active {
        return Err(ServerError::Unauthorized("User is inactive".into()));
    }

    let jar = state.session.set_tokens(jar, user.id)?;
    info!(user_id = user.id, "User logged in");

    Ok((
        jar,
        Json(LoginResponse {
            ok: true,
            message: "Authorization successful!".into(),
        }),
    ))
}

async fn logout(jar: CookieJar) -> (CookieJar, Json<MessageResponse>) {
    (
        SessionKeys::clear_tokens(jar),
        Json(MessageResponse::new("User successfully logged out")),
    )
}

async fn refresh(
    State(state): State<AppState>,
    RefreshUser(user): RefreshUser,
    jar: CookieJar,
) -> Result<(CookieJar, Json<MessageResponse>), ServerError> {
    let jar = state.session.set_tokens(jar, user.id)?;
    Ok((jar, Json(MessageResponse::new("Tokens successfully refreshed"))))
}

async fn me(CurrentUser(user): CurrentUser) -> Json<UserInfo> {
    Json(user_info(&user))
}

async fn all_users(
    State(state): State<AppState>,
    _admin: AdminUser,
) -> Result<Json<Vec<UserInfo>>, ServerError> {
    let users = state.identity.list_all_users().await?;
    Ok(Json(users.iter().map(user_info).collect()))
}

// src/handlers/auth.rs
use axum::{extract::State, http::header, http::StatusCode, response::IntoResponse, Json};
use chrono::{Duration, Utc};
use serde_json::json;
use uuid::Uuid;

use crate::auth::{
    clear_session_cookie, create_session_token, hash_password, session_cookie, verify_password,
    AuthUser,
};
use crate::models::{
    LoginResponse, LoginSchema, PublicUser, RegisterSchema, StatusResponse, User,
};
use crate::routes::AppState;
use crate::validation::{JsonBody, ValidatedJson};
use crate::AppError;

// --- 1. 用户注册 ---
pub async fn register_handler(
    State(state): State<AppState>,
    ValidatedJson(payload): ValidatedJson<RegisterSchema>,
) -> Result<impl IntoResponse, AppError> {
    let taken = sqlx::query_scalar::<_, i32>("SELECT id FROM users WHERE username = $1")
        .bind(&payload.username)
        .fetch_optional(&state.db)
        .await?
        .is_some();
    if taken {
        return Err(AppError::Conflict("Username already exists".into()));
    }

    let hashed_password = hash_password(&payload.password).await?;

    // 并发注册同名用户时由唯一约束兜底 (Database -> 409)
    let mut tx = state.db.begin().await?;
    sqlx::query("INSERT INTO users (username, password_hash) VALUES ($1, $2)")
        .bind(&payload.username)
        .bind(hashed_password)
        .execute(&mut *tx)
        .await?;
    tx.commit().await?;

    tracing::info!("Registered user {}", payload.username);
    Ok((
        StatusCode::CREATED,
        Json(json!({"message": "User registered successfully"})),
    ))
}

// --- 2. 用户登录: 写入 sessions 并下发 cookie ---
pub async fn login_handler(
    State(state): State<AppState>,
    JsonBody(payload): JsonBody<LoginSchema>,
) -> Result<impl IntoResponse, AppError> {
    let invalid = || AppError::Auth("Invalid username or password".into());

    let user = sqlx::query_as::<_, User>(
        "SELECT id, username, password_hash, created_at FROM users WHERE username = $1",
    )
    .bind(&payload.username)
    .fetch_optional(&state.db)
    .await?;

    let Some(user) = user else {
        tracing::warn!("Login attempt for unknown user {:?}", payload.username);
        return Err(invalid());
    };
    if !verify_password(&payload.password, &user.password_hash).await {
        tracing::warn!("Wrong password for user {}", user.username);
        return Err(invalid());
    }

    let session_id = Uuid::new_v4();
    let ttl = Duration::hours(state.config.session_ttl_hours);
    let expires_at = Utc::now() + ttl;

    let mut tx = state.db.begin().await?;
    sqlx::query("DELETE FROM sessions WHERE user_id = $1 AND expires_at <= NOW()")
        .bind(user.id)
        .execute(&mut *tx)
        .await?;
    sqlx::query("INSERT INTO sessions (id, user_id, expires_at) VALUES ($1, $2, $3)")
        .bind(session_id)
        .bind(user.id)
        .bind(expires_at)
        .execute(&mut *tx)
        .await?;
    tx.commit().await?;

    let public = PublicUser::from(&user);
    let token = create_session_token(&state.config.jwt_secret, &public, session_id, expires_at)?;
    let cookie = session_cookie(&token, ttl.num_seconds(), state.config.cookie_secure);

    tracing::info!("User {} logged in", public.username);
    Ok((
        [(header::SET_COOKIE, cookie)],
        Json(LoginResponse {
            message: "Logged in successfully",
            user: public,
        }),
    ))
}

// --- 3. 登出: 删除会话并清除 cookie ---
pub async fn logout_handler(
    user: AuthUser,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    let mut tx = state.db.begin().await?;
    sqlx::query("DELETE FROM sessions WHERE id = $1 AND user_id = $2")
        .bind(user.session_id)
        .bind(user.id)
        .execute(&mut *tx)
        .await?;
    tx.commit().await?;

    tracing::info!("User {} logged out", user.username);
    Ok((
        [(header::SET_COOKIE, clear_session_cookie(state.config.cookie_secure))],
        Json(json!({"message": "Logged out successfully"})),
    ))
}

// --- 4. 登录状态 (未登录不报错) ---
pub async fn status_handler(auth: Option<AuthUser>) -> Json<StatusResponse> {
    Json(StatusResponse {
        is_authenticated: auth.is_some(),
        user: auth.map(|u| u.public()),
    })
}

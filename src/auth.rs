// src/auth.rs
use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use axum::{async_trait, extract::FromRequestParts, http::request::Parts, RequestPartsExt};
use axum_extra::TypedHeader;
use chrono::{DateTime, Utc};
use headers::Cookie;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use rand_core::OsRng;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{models::PublicUser, routes::AppState, AppError};

pub const SESSION_COOKIE: &str = "daybook_session";

// --- 1. 密码处理 (Argon2) ---
// 哈希计算较重, 放到阻塞线程池里执行

pub async fn hash_password(password: &str) -> Result<String, AppError> {
    let password = password.to_owned();
    tokio::task::spawn_blocking(move || {
        let salt = SaltString::generate(&mut OsRng);
        Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map(|hash| hash.to_string())
    })
    .await
    .map_err(|e| {
        tracing::error!("Hashing task failed: {}", e);
        AppError::Internal
    })?
    .map_err(|e| {
        tracing::error!("Password hashing failed: {}", e);
        AppError::Internal
    })
}

pub async fn verify_password(password: &str, password_hash: &str) -> bool {
    let password = password.to_owned();
    let password_hash = password_hash.to_owned();
    tokio::task::spawn_blocking(move || {
        let parsed_hash = match PasswordHash::new(&password_hash) {
            Ok(h) => h,
            Err(_) => return false,
        };
        Argon2::default()
            .verify_password(password.as_bytes(), &parsed_hash)
            .is_ok()
    })
    .await
    .unwrap_or(false)
}

// --- 2. 会话令牌 (JWT, 放在 HttpOnly cookie 里) ---

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: i32, // 用户 ID
    pub username: String,
    pub sid: Uuid, // sessions 表主键, 登出后失效
    pub exp: usize,
}

pub fn create_session_token(
    secret: &str,
    user: &PublicUser,
    session_id: Uuid,
    expires_at: DateTime<Utc>,
) -> Result<String, AppError> {
    let claims = Claims {
        sub: user.id,
        username: user.username.clone(),
        sid: session_id,
        exp: expires_at.timestamp().max(0) as usize,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| {
        tracing::error!("Failed to sign session token: {}", e);
        AppError::Internal
    })
}

pub fn decode_session_token(secret: &str, token: &str) -> Result<Claims, AppError> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::new(Algorithm::HS256),
    )
    .map(|data| data.claims)
    .map_err(|e| {
        tracing::warn!("Session token rejected: {}", e);
        AppError::Auth("Session expired or invalid".into())
    })
}

pub fn session_cookie(token: &str, max_age_secs: i64, secure: bool) -> String {
    let mut cookie = format!(
        "{SESSION_COOKIE}={token}; HttpOnly; Path=/; Max-Age={max_age_secs}; SameSite=Lax"
    );
    if secure {
        cookie.push_str("; Secure");
    }
    cookie
}

pub fn clear_session_cookie(secure: bool) -> String {
    session_cookie("", 0, secure)
}

// --- 3. 核心：认证提取器 (AuthUser Extractor) ---
// Handler 通过 (user: AuthUser) 拿到当前登录用户, 所有查询都以 user.id 过滤

#[derive(Debug, Clone)]
pub struct AuthUser {
    pub id: i32,
    pub username: String,
    pub session_id: Uuid,
}

impl AuthUser {
    pub fn public(&self) -> PublicUser {
        PublicUser {
            id: self.id,
            username: self.username.clone(),
        }
    }
}

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        // 1. 从 Cookie 中取出会话令牌
        let TypedHeader(cookies) = parts
            .extract::<TypedHeader<Cookie>>()
            .await
            .map_err(|_| AppError::Auth("Login required".into()))?;
        let token = cookies
            .get(SESSION_COOKIE)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| AppError::Auth("Login required".into()))?;

        // 2. 验证签名与过期时间
        let claims = decode_session_token(&state.config.jwt_secret, token)?;

        // 3. 会话必须仍在库中 (登出会删除)
        let user = sqlx::query_as::<_, (i32, String)>(
            "SELECT u.id, u.username FROM sessions s
             JOIN users u ON u.id = s.user_id
             WHERE s.id = $1 AND s.user_id = $2 AND s.expires_at > NOW()",
        )
        .bind(claims.sid)
        .bind(claims.sub)
        .fetch_optional(&state.db)
        .await?
        .ok_or_else(|| AppError::Auth("Session expired or invalid".into()))?;

        Ok(AuthUser {
            id: user.0,
            username: user.1,
            session_id: claims.sid,
        })
    }
}

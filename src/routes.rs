// src/routes.rs
use std::sync::Arc;

use axum::{
    extract::DefaultBodyLimit,
    http::{header::CONTENT_TYPE, HeaderValue, Method},
    routing::{delete, get, post, put},
    Router,
};
use sqlx::PgPool;
use tower_http::{cors::CorsLayer, services::ServeDir, trace::TraceLayer};

use crate::{config::Config, handlers::*, uploads::ImageStore};

#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub config: Arc<Config>,
    pub images: ImageStore,
}

pub fn app(state: AppState, cors_origin: HeaderValue) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(cors_origin)
        .allow_credentials(true)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([CONTENT_TYPE]);

    let body_limit = DefaultBodyLimit::max(state.config.max_upload_bytes);
    let uploads = ServeDir::new(state.images.dir());

    Router::new()
        // 认证
        .route("/api/register", post(register_handler))
        .route("/api/login", post(login_handler))
        .route("/api/logout", post(logout_handler))
        .route("/api/status", get(status_handler))
        // 日记
        .route("/api/entries/last", get(last_entry_handler))
        .route(
            "/api/entries/:date",
            get(get_entry_handler).post(save_entry_handler),
        )
        // 笔记 / 提醒 / 待办
        .route("/api/notes/:date", get(get_note_handler).post(save_note_handler))
        .route(
            "/api/reminders/:date",
            get(get_reminder_handler).post(save_reminder_handler),
        )
        .route("/api/todos/:date", get(get_todos_handler).post(save_todos_handler))
        .route(
            "/api/reminders/month/:year/:month",
            get(reminders_for_month_handler),
        )
        .route("/api/todos/month/:year/:month", get(todos_for_month_handler))
        // 搜索与筛选
        .route("/api/search", get(search_handler))
        .route("/api/diary_entries_filtered", get(diary_entries_filtered_handler))
        .route("/api/notes_filtered", get(notes_filtered_handler))
        .route("/api/reminders_filtered", get(reminders_filtered_handler))
        .route("/api/todos_filtered", get(todos_filtered_handler))
        // 标签
        .route("/api/tags", get(list_tags_handler))
        .route(
            "/api/tags/rename",
            put(rename_tag_handler).delete(delete_rename_tag_handler),
        )
        .route("/api/tags/:name", delete(delete_tag_handler))
        // 导入导出
        .route("/api/export", get(export_handler))
        .route("/api/import", post(import_handler))
        // 图片静态文件
        .nest_service("/uploads", uploads)
        .layer(body_limit)
        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

#[cfg(test)]
mod tests {
    use axum::{body::to_bytes, http::StatusCode, Router};
    use tower::ServiceExt;

    use crate::test_support::{self, json_request, request, send};

    fn test_app(upload_dir: &std::path::Path) -> Router {
        test_support::app(test_support::lazy_state(upload_dir))
    }

    fn get(uri: &str) -> axum::http::Request<axum::body::Body> {
        request("GET", uri, None)
    }

    fn post_json(uri: &str, body: &str) -> axum::http::Request<axum::body::Body> {
        json_request("POST", uri, None, body)
    }

    #[tokio::test]
    async fn protected_routes_require_a_session() {
        let dir = tempfile::tempdir().unwrap();
        for uri in [
            "/api/entries/2024-05-01",
            "/api/entries/last",
            "/api/notes/2024-05-01",
            "/api/todos/month/2024/12",
            "/api/search?query=hi",
            "/api/tags",
            "/api/diary_entries_filtered?tags=a,b",
            "/api/export",
        ] {
            let (status, body) = send(test_app(dir.path()), get(uri)).await;
            assert_eq!(status, StatusCode::UNAUTHORIZED, "{uri}");
            assert_eq!(body["status"], "error");
        }

        let (status, _) = send(
            test_app(dir.path()),
            post_json("/api/notes/2024-05-01", r#"{"text":"hi"}"#),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn tag_named_rename_has_a_delete_route() {
        let dir = tempfile::tempdir().unwrap();
        let (status, _) = send(
            test_app(dir.path()),
            request("DELETE", "/api/tags/rename", None),
        )
        .await;
        // 路由命中后才会走到认证
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, _) = send(
            test_app(dir.path()),
            json_request("PUT", "/api/tags/rename", None, "{}"),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn forged_session_cookie_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let (status, body) = send(
            test_app(dir.path()),
            request("GET", "/api/notes/2024-05-01", Some("daybook_session=not.a.jwt")),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["message"], "Session expired or invalid");
    }

    #[tokio::test]
    async fn status_without_session_is_anonymous() {
        let dir = tempfile::tempdir().unwrap();
        let (status, body) = send(test_app(dir.path()), get("/api/status")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, serde_json::json!({"is_authenticated": false}));
    }

    #[tokio::test]
    async fn logout_requires_a_session() {
        let dir = tempfile::tempdir().unwrap();
        let (status, _) = send(test_app(dir.path()), post_json("/api/logout", "{}")).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn register_rejects_missing_fields() {
        let dir = tempfile::tempdir().unwrap();
        let (status, body) = send(
            test_app(dir.path()),
            post_json("/api/register", r#"{"username":"alice"}"#),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["message"]
            .as_str()
            .unwrap()
            .contains("Username and password are required"));
    }

    #[tokio::test]
    async fn login_rejects_malformed_json() {
        let dir = tempfile::tempdir().unwrap();
        let (status, body) =
            send(test_app(dir.path()), post_json("/api/login", "{not json")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["status"], "error");
    }

    #[tokio::test]
    async fn uploads_are_served_from_the_image_store() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("pic.png"), b"img").unwrap();

        let response = test_app(dir.path())
            .oneshot(get("/uploads/pic.png"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&bytes[..], b"img");
    }
}

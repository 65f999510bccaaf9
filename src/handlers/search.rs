// src/handlers/search.rs
use axum::{
    extract::{Query, State},
    Json,
};

use crate::auth::AuthUser;
use crate::models::{DiaryEntry, Note, Reminder, SearchQuery, SearchResult, TodoItem};
use crate::routes::AppState;
use crate::AppError;

/// 转义 LIKE 通配符, 让查询词按字面匹配
fn like_pattern(query: &str) -> String {
    let mut escaped = String::with_capacity(query.len() + 2);
    escaped.push('%');
    for c in query.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped.push('%');
    escaped
}

// --- 统一搜索: 日记 (正文 + 单个标签)、笔记、提醒、待办 ---
pub async fn search_handler(
    user: AuthUser,
    State(state): State<AppState>,
    Query(params): Query<SearchQuery>,
) -> Result<Json<Vec<SearchResult>>, AppError> {
    let query = params.query.trim();
    if query.is_empty() {
        return Ok(Json(Vec::new()));
    }
    let pattern = like_pattern(query);

    let diary = sqlx::query_as::<_, DiaryEntry>(
        "SELECT date, text, image_url, tags FROM diary_entries
         WHERE user_id = $1
           AND (text ILIKE $2
                OR EXISTS (SELECT 1 FROM jsonb_array_elements_text(tags) AS t(tag)
                           WHERE t.tag ILIKE $2))
         ORDER BY date",
    )
    .bind(user.id)
    .bind(&pattern)
    .fetch_all(&state.db)
    .await?;

    let notes = sqlx::query_as::<_, Note>(
        "SELECT date, text FROM notes WHERE user_id = $1 AND text ILIKE $2 ORDER BY date",
    )
    .bind(user.id)
    .bind(&pattern)
    .fetch_all(&state.db)
    .await?;

    let reminders = sqlx::query_as::<_, Reminder>(
        "SELECT date, text, time FROM reminders
         WHERE user_id = $1 AND text ILIKE $2 ORDER BY date",
    )
    .bind(user.id)
    .bind(&pattern)
    .fetch_all(&state.db)
    .await?;

    let todos = sqlx::query_as::<_, TodoItem>(
        "SELECT id, date, text, completed FROM todo_items
         WHERE user_id = $1 AND text ILIKE $2 ORDER BY date, id",
    )
    .bind(user.id)
    .bind(&pattern)
    .fetch_all(&state.db)
    .await?;

    let results = diary
        .into_iter()
        .map(SearchResult::Diary)
        .chain(notes.into_iter().map(SearchResult::Note))
        .chain(reminders.into_iter().map(SearchResult::Reminder))
        .chain(todos.into_iter().map(SearchResult::Todo))
        .collect();

    Ok(Json(results))
}

// src/handlers/listing.rs
//! `/api/*_filtered`: 按日期闭区间筛选并排序。
//! 排序方向无法作为参数绑定, 只能拼进 SQL, 所以只接受 `SortOrder` 的两个常量。

use axum::{
    extract::{Query, State},
    Json,
};
use sqlx::types::Json as Jsonb;

use crate::auth::AuthUser;
use crate::dates::{DateRange, SortOrder};
use crate::models::{DiaryEntry, FilterQuery, Note, Reminder, TodoItem};
use crate::routes::AppState;
use crate::{tags, AppError};

fn parse_filter(query: &FilterQuery) -> Result<(DateRange, SortOrder), AppError> {
    let range = DateRange::from_params(query.start_date.as_deref(), query.end_date.as_deref())?;
    let order = SortOrder::from_param(query.sort_order.as_deref());
    Ok((range, order))
}

// 日记: 额外支持标签筛选, 条目必须包含全部给定标签 (JSONB 精确包含)
pub async fn diary_entries_filtered_handler(
    user: AuthUser,
    State(state): State<AppState>,
    Query(query): Query<FilterQuery>,
) -> Result<Json<Vec<DiaryEntry>>, AppError> {
    let (range, order) = parse_filter(&query)?;
    let required_tags = tags::parse_filter(query.tags.as_deref());

    let entries = sqlx::query_as::<_, DiaryEntry>(&format!(
        "SELECT date, text, image_url, tags FROM diary_entries
         WHERE user_id = $1
           AND ($2::varchar IS NULL OR date >= $2)
           AND ($3::varchar IS NULL OR date <= $3)
           AND tags @> $4
         ORDER BY date {}",
        order.as_sql()
    ))
    .bind(user.id)
    .bind(range.start)
    .bind(range.end)
    .bind(Jsonb(required_tags))
    .fetch_all(&state.db)
    .await?;

    Ok(Json(entries))
}

pub async fn notes_filtered_handler(
    user: AuthUser,
    State(state): State<AppState>,
    Query(query): Query<FilterQuery>,
) -> Result<Json<Vec<Note>>, AppError> {
    let (range, order) = parse_filter(&query)?;

    let notes = sqlx::query_as::<_, Note>(&format!(
        "SELECT date, text FROM notes
         WHERE user_id = $1
           AND ($2::varchar IS NULL OR date >= $2)
           AND ($3::varchar IS NULL OR date <= $3)
         ORDER BY date {}",
        order.as_sql()
    ))
    .bind(user.id)
    .bind(range.start)
    .bind(range.end)
    .fetch_all(&state.db)
    .await?;

    Ok(Json(notes))
}

pub async fn reminders_filtered_handler(
    user: AuthUser,
    State(state): State<AppState>,
    Query(query): Query<FilterQuery>,
) -> Result<Json<Vec<Reminder>>, AppError> {
    let (range, order) = parse_filter(&query)?;

    let reminders = sqlx::query_as::<_, Reminder>(&format!(
        "SELECT date, text, time FROM reminders
         WHERE user_id = $1
           AND ($2::varchar IS NULL OR date >= $2)
           AND ($3::varchar IS NULL OR date <= $3)
         ORDER BY date {}",
        order.as_sql()
    ))
    .bind(user.id)
    .bind(range.start)
    .bind(range.end)
    .fetch_all(&state.db)
    .await?;

    Ok(Json(reminders))
}

pub async fn todos_filtered_handler(
    user: AuthUser,
    State(state): State<AppState>,
    Query(query): Query<FilterQuery>,
) -> Result<Json<Vec<TodoItem>>, AppError> {
    let (range, order) = parse_filter(&query)?;

    let todos = sqlx::query_as::<_, TodoItem>(&format!(
        "SELECT id, date, text, completed FROM todo_items
         WHERE user_id = $1
           AND ($2::varchar IS NULL OR date >= $2)
           AND ($3::varchar IS NULL OR date <= $3)
         ORDER BY date {}, id",
        order.as_sql()
    ))
    .bind(user.id)
    .bind(range.start)
    .bind(range.end)
    .fetch_all(&state.db)
    .await?;

    Ok(Json(todos))
}

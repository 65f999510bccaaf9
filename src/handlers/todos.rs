// src/handlers/todos.rs
use std::collections::HashSet;

use axum::{
    extract::{Path, State},
    Json,
};
use validator::Validate;

use crate::auth::AuthUser;
use crate::dates::{month_bounds_from_path, parse_date};
use crate::models::{TodoItem, TodoSchema};
use crate::routes::AppState;
use crate::validation::JsonBody;
use crate::AppError;

pub async fn get_todos_handler(
    user: AuthUser,
    State(state): State<AppState>,
    Path(date): Path<String>,
) -> Result<Json<Vec<TodoItem>>, AppError> {
    let date = parse_date(&date)?;

    let todos = sqlx::query_as::<_, TodoItem>(
        "SELECT id, date, text, completed FROM todo_items
         WHERE user_id = $1 AND date = $2 ORDER BY id",
    )
    .bind(user.id)
    .bind(&date)
    .fetch_all(&state.db)
    .await?;

    Ok(Json(todos))
}

/// 整体替换某天的待办列表: 先删后插。
/// 同一天的两个并发保存不会合并, 以最后提交的为准。
pub async fn save_todos_handler(
    user: AuthUser,
    State(state): State<AppState>,
    Path(date): Path<String>,
    JsonBody(items): JsonBody<Vec<TodoSchema>>,
) -> Result<Json<Vec<TodoItem>>, AppError> {
    let date = parse_date(&date)?;

    let mut seen = HashSet::new();
    for item in &items {
        item.validate()?;
        if !seen.insert(item.id.as_str()) {
            return Err(AppError::BadRequest(format!(
                "Duplicate todo id '{}'",
                item.id
            )));
        }
    }

    let mut tx = state.db.begin().await?;

    sqlx::query("DELETE FROM todo_items WHERE user_id = $1 AND date = $2")
        .bind(user.id)
        .bind(&date)
        .execute(&mut *tx)
        .await?;

    for item in &items {
        // 同一 id 之前挂在别的日期下时, 挪到这一天
        sqlx::query(
            "INSERT INTO todo_items (user_id, id, date, text, completed)
             VALUES ($1, $2, $3, $4, $5)
             ON CONFLICT (user_id, id) DO UPDATE SET
                date = EXCLUDED.date,
                text = EXCLUDED.text,
                completed = EXCLUDED.completed",
        )
        .bind(user.id)
        .bind(&item.id)
        .bind(&date)
        .bind(&item.text)
        .bind(item.completed)
        .execute(&mut *tx)
        .await?;
    }

    let todos = sqlx::query_as::<_, TodoItem>(
        "SELECT id, date, text, completed FROM todo_items
         WHERE user_id = $1 AND date = $2 ORDER BY id",
    )
    .bind(user.id)
    .bind(&date)
    .fetch_all(&mut *tx)
    .await?;

    tx.commit().await?;

    Ok(Json(todos))
}

pub async fn todos_for_month_handler(
    user: AuthUser,
    State(state): State<AppState>,
    Path((year, month)): Path<(String, String)>,
) -> Result<Json<Vec<TodoItem>>, AppError> {
    let (start, end) = month_bounds_from_path(&year, &month)?;

    let todos = sqlx::query_as::<_, TodoItem>(
        "SELECT id, date, text, completed FROM todo_items
         WHERE user_id = $1 AND date >= $2 AND date < $3
         ORDER BY date, id",
    )
    .bind(user.id)
    .bind(start)
    .bind(end)
    .fetch_all(&state.db)
    .await?;

    Ok(Json(todos))
}

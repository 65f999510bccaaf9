// src/handlers/reminders.rs
use axum::{
    extract::{Path, State},
    Json,
};

use crate::auth::AuthUser;
use crate::dates::{month_bounds_from_path, parse_date, parse_time};
use crate::models::{Reminder, ReminderSchema};
use crate::routes::AppState;
use crate::validation::JsonBody;
use crate::AppError;

pub async fn get_reminder_handler(
    user: AuthUser,
    State(state): State<AppState>,
    Path(date): Path<String>,
) -> Result<Json<Reminder>, AppError> {
    let date = parse_date(&date)?;

    let reminder = sqlx::query_as::<_, Reminder>(
        "SELECT date, text, time FROM reminders WHERE user_id = $1 AND date = $2",
    )
    .bind(user.id)
    .bind(&date)
    .fetch_optional(&state.db)
    .await?;

    Ok(Json(reminder.unwrap_or_else(Reminder::placeholder)))
}

pub async fn save_reminder_handler(
    user: AuthUser,
    State(state): State<AppState>,
    Path(date): Path<String>,
    JsonBody(body): JsonBody<ReminderSchema>,
) -> Result<Json<Reminder>, AppError> {
    let date = parse_date(&date)?;
    let time = parse_time(body.time.as_deref())?;

    let mut tx = state.db.begin().await?;
    let reminder = sqlx::query_as::<_, Reminder>(
        "INSERT INTO reminders (user_id, date, text, time) VALUES ($1, $2, $3, $4)
         ON CONFLICT (user_id, date) DO UPDATE SET text = EXCLUDED.text, time = EXCLUDED.time
         RETURNING date, text, time",
    )
    .bind(user.id)
    .bind(&date)
    .bind(body.text.unwrap_or_default())
    .bind(time)
    .fetch_one(&mut *tx)
    .await?;
    tx.commit().await?;

    Ok(Json(reminder))
}

/// 某月的全部提醒, 半开区间 `[start, end)`
pub async fn reminders_for_month_handler(
    user: AuthUser,
    State(state): State<AppState>,
    Path((year, month)): Path<(String, String)>,
) -> Result<Json<Vec<Reminder>>, AppError> {
    let (start, end) = month_bounds_from_path(&year, &month)?;

    let reminders = sqlx::query_as::<_, Reminder>(
        "SELECT date, text, time FROM reminders
         WHERE user_id = $1 AND date >= $2 AND date < $3
         ORDER BY date",
    )
    .bind(user.id)
    .bind(start)
    .bind(end)
    .fetch_all(&state.db)
    .await?;

    Ok(Json(reminders))
}

// src/handlers/notes.rs
use axum::{
    extract::{Path, State},
    Json,
};

use crate::auth::AuthUser;
use crate::dates::parse_date;
use crate::models::{Note, NoteSchema};
use crate::routes::AppState;
use crate::validation::JsonBody;
use crate::AppError;

pub async fn get_note_handler(
    user: AuthUser,
    State(state): State<AppState>,
    Path(date): Path<String>,
) -> Result<Json<Note>, AppError> {
    let date = parse_date(&date)?;

    let note = sqlx::query_as::<_, Note>(
        "SELECT date, text FROM notes WHERE user_id = $1 AND date = $2",
    )
    .bind(user.id)
    .bind(&date)
    .fetch_optional(&state.db)
    .await?;

    Ok(Json(note.unwrap_or_else(Note::placeholder)))
}

pub async fn save_note_handler(
    user: AuthUser,
    State(state): State<AppState>,
    Path(date): Path<String>,
    JsonBody(body): JsonBody<NoteSchema>,
) -> Result<Json<Note>, AppError> {
    let date = parse_date(&date)?;

    let mut tx = state.db.begin().await?;
    let note = sqlx::query_as::<_, Note>(
        "INSERT INTO notes (user_id, date, text) VALUES ($1, $2, $3)
         ON CONFLICT (user_id, date) DO UPDATE SET text = EXCLUDED.text
         RETURNING date, text",
    )
    .bind(user.id)
    .bind(&date)
    .bind(body.text.unwrap_or_default())
    .fetch_one(&mut *tx)
    .await?;
    tx.commit().await?;

    Ok(Json(note))
}

// src/handlers/transfer.rs
//! JSON 导出 / 导入。导入时先在内存里校验出一份计划 (非法 JSON 直接 400, 不碰数据库),
//! 再在一个事务里逐条 upsert; 任何数据库错误都会回滚整个导入。

use axum::{
    extract::{multipart::MultipartRejection, Multipart, State},
    Json,
};
use axum_extra::extract::Query;
use serde::de::DeserializeOwned;
use sqlx::{types::Json as Jsonb, PgConnection};

use crate::auth::AuthUser;
use crate::dates::{parse_date, parse_time, DateRange};
use crate::models::{
    DiaryEntry, ExportDocument, ExportQuery, ImportCounts, ImportDiaryEntry, ImportDocument,
    ImportNote, ImportReminder, ImportResponse, ImportTodo, Note, Reminder, TodoItem,
    IMAGE_URL_MAX, TODO_ID_MAX, TODO_TEXT_MAX,
};
use crate::routes::AppState;
use crate::{tags, AppError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DataKind {
    DiaryEntries,
    Notes,
    Reminders,
    Todos,
}

impl DataKind {
    const ALL: [DataKind; 4] = [
        DataKind::DiaryEntries,
        DataKind::Notes,
        DataKind::Reminders,
        DataKind::Todos,
    ];

    fn from_name(name: &str) -> Option<Self> {
        match name {
            "diary_entries" => Some(DataKind::DiaryEntries),
            "notes" => Some(DataKind::Notes),
            "reminders" => Some(DataKind::Reminders),
            "todos" => Some(DataKind::Todos),
            _ => None,
        }
    }
}

/// 未指定类型时导出全部; 未知名称忽略
fn requested_kinds(values: &[String]) -> Vec<DataKind> {
    let names: Vec<&str> = values
        .iter()
        .flat_map(|v| v.split(','))
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .collect();
    if names.is_empty() {
        return DataKind::ALL.to_vec();
    }
    DataKind::ALL
        .into_iter()
        .filter(|kind| names.iter().any(|n| DataKind::from_name(n) == Some(*kind)))
        .collect()
}

// --- 1. 导出 ---
pub async fn export_handler(
    user: AuthUser,
    State(state): State<AppState>,
    Query(query): Query<ExportQuery>,
) -> Result<Json<ExportDocument>, AppError> {
    let range = DateRange::from_params(query.start_date.as_deref(), query.end_date.as_deref())?;
    let mut document = ExportDocument::default();

    for kind in requested_kinds(&query.data_types) {
        match kind {
            DataKind::DiaryEntries => {
                let rows = sqlx::query_as::<_, DiaryEntry>(
                    "SELECT date, text, image_url, tags FROM diary_entries
                     WHERE user_id = $1
                       AND ($2::varchar IS NULL OR date >= $2)
                       AND ($3::varchar IS NULL OR date <= $3)
                     ORDER BY date",
                )
                .bind(user.id)
                .bind(&range.start)
                .bind(&range.end)
                .fetch_all(&state.db)
                .await?;
                document.diary_entries = Some(rows);
            }
            DataKind::Notes => {
                let rows = sqlx::query_as::<_, Note>(
                    "SELECT date, text FROM notes
                     WHERE user_id = $1
                       AND ($2::varchar IS NULL OR date >= $2)
                       AND ($3::varchar IS NULL OR date <= $3)
                     ORDER BY date",
                )
                .bind(user.id)
                .bind(&range.start)
                .bind(&range.end)
                .fetch_all(&state.db)
                .await?;
                document.notes = Some(rows);
            }
            DataKind::Reminders => {
                let rows = sqlx::query_as::<_, Reminder>(
                    "SELECT date, text, time FROM reminders
                     WHERE user_id = $1
                       AND ($2::varchar IS NULL OR date >= $2)
                       AND ($3::varchar IS NULL OR date <= $3)
                     ORDER BY date",
                )
                .bind(user.id)
                .bind(&range.start)
                .bind(&range.end)
                .fetch_all(&state.db)
                .await?;
                document.reminders = Some(rows);
            }
            DataKind::Todos => {
                let rows = sqlx::query_as::<_, TodoItem>(
                    "SELECT id, date, text, completed FROM todo_items
                     WHERE user_id = $1
                       AND ($2::varchar IS NULL OR date >= $2)
                       AND ($3::varchar IS NULL OR date <= $3)
                     ORDER BY date, id",
                )
                .bind(user.id)
                .bind(&range.start)
                .bind(&range.end)
                .fetch_all(&state.db)
                .await?;
                document.todos = Some(rows);
            }
        }
    }

    Ok(Json(document))
}

// --- 2. 导入 ---

#[derive(Debug, Default)]
struct ImportPlan {
    diary_entries: Vec<DiaryEntry>,
    notes: Vec<Note>,
    reminders: Vec<Reminder>,
    todos: Vec<TodoItem>,
    skipped: ImportCounts,
}

impl ImportPlan {
    fn counts(&self) -> ImportCounts {
        ImportCounts {
            diary_entries: self.diary_entries.len() as u32,
            notes: self.notes.len() as u32,
            reminders: self.reminders.len() as u32,
            todos: self.todos.len() as u32,
        }
    }
}

fn valid_date(date: Option<&str>) -> Option<String> {
    date.and_then(|d| parse_date(d).ok())
}

fn fits(value: &str, max: usize) -> bool {
    value.chars().count() <= max
}

/// 单条解码; 字段类型不对返回 None
fn decode_item<T: DeserializeOwned>(value: serde_json::Value) -> Option<T> {
    serde_json::from_value(value).ok()
}

fn plan_diary_entry(item: ImportDiaryEntry) -> Option<DiaryEntry> {
    let date = valid_date(item.date.as_deref())?;
    let image_url = item.image_url.filter(|url| !url.is_empty());
    if image_url.as_deref().is_some_and(|url| !fits(url, IMAGE_URL_MAX)) {
        return None;
    }
    Some(DiaryEntry {
        date: Some(date),
        text: item.text.unwrap_or_default(),
        image_url,
        tags: Jsonb(tags::normalize(item.tags.unwrap_or_default())),
    })
}

fn plan_note(item: ImportNote) -> Option<Note> {
    Some(Note {
        date: Some(valid_date(item.date.as_deref())?),
        text: item.text.unwrap_or_default(),
    })
}

fn plan_reminder(item: ImportReminder) -> Option<Reminder> {
    let date = valid_date(item.date.as_deref())?;
    let time = parse_time(item.time.as_deref()).ok()?;
    Some(Reminder {
        date: Some(date),
        text: item.text.unwrap_or_default(),
        time,
    })
}

fn plan_todo(item: ImportTodo) -> Option<TodoItem> {
    let id = item
        .id
        .filter(|id| !id.is_empty() && fits(id, TODO_ID_MAX))?;
    let date = valid_date(item.date.as_deref())?;
    let text = item.text.unwrap_or_default();
    if !fits(&text, TODO_TEXT_MAX) {
        return None;
    }
    Some(TodoItem {
        id,
        date,
        text,
        completed: item.completed.unwrap_or(false),
    })
}

/// 把一节里的每条原始 JSON 解码并校验, 不合格的只计数
fn plan_section<I, T>(
    section: Option<Vec<serde_json::Value>>,
    plan_one: impl Fn(I) -> Option<T>,
    accepted: &mut Vec<T>,
    skipped: &mut u32,
) where
    I: DeserializeOwned,
{
    for value in section.unwrap_or_default() {
        match decode_item::<I>(value).and_then(&plan_one) {
            Some(item) => accepted.push(item),
            None => *skipped += 1,
        }
    }
}

/// 缺少日期 (待办还需要 id)、字段类型不对或超出列宽的条目跳过
fn plan_import(document: ImportDocument) -> ImportPlan {
    let mut plan = ImportPlan::default();

    plan_section(
        document.diary_entries,
        plan_diary_entry,
        &mut plan.diary_entries,
        &mut plan.skipped.diary_entries,
    );
    plan_section(
        document.notes,
        plan_note,
        &mut plan.notes,
        &mut plan.skipped.notes,
    );
    plan_section(
        document.reminders,
        plan_reminder,
        &mut plan.reminders,
        &mut plan.skipped.reminders,
    );
    plan_section(
        document.todos,
        plan_todo,
        &mut plan.todos,
        &mut plan.skipped.todos,
    );

    plan
}

async fn apply_import(
    conn: &mut PgConnection,
    user_id: i32,
    plan: &ImportPlan,
) -> Result<(), sqlx::Error> {
    for entry in &plan.diary_entries {
        sqlx::query(
            "INSERT INTO diary_entries (user_id, date, text, image_url, tags)
             VALUES ($1, $2, $3, $4, $5)
             ON CONFLICT (user_id, date) DO UPDATE SET
                text = EXCLUDED.text,
                image_url = EXCLUDED.image_url,
                tags = EXCLUDED.tags",
        )
        .bind(user_id)
        .bind(&entry.date)
        .bind(&entry.text)
        .bind(&entry.image_url)
        .bind(&entry.tags)
        .execute(&mut *conn)
        .await?;
    }

    for note in &plan.notes {
        sqlx::query(
            "INSERT INTO notes (user_id, date, text) VALUES ($1, $2, $3)
             ON CONFLICT (user_id, date) DO UPDATE SET text = EXCLUDED.text",
        )
        .bind(user_id)
        .bind(&note.date)
        .bind(&note.text)
        .execute(&mut *conn)
        .await?;
    }

    for reminder in &plan.reminders {
        sqlx::query(
            "INSERT INTO reminders (user_id, date, text, time) VALUES ($1, $2, $3, $4)
             ON CONFLICT (user_id, date) DO UPDATE SET
                text = EXCLUDED.text,
                time = EXCLUDED.time",
        )
        .bind(user_id)
        .bind(&reminder.date)
        .bind(&reminder.text)
        .bind(&reminder.time)
        .execute(&mut *conn)
        .await?;
    }

    for todo in &plan.todos {
        sqlx::query(
            "INSERT INTO todo_items (user_id, id, date, text, completed)
             VALUES ($1, $2, $3, $4, $5)
             ON CONFLICT (user_id, id) DO UPDATE SET
                date = EXCLUDED.date,
                text = EXCLUDED.text,
                completed = EXCLUDED.completed",
        )
        .bind(user_id)
        .bind(&todo.id)
        .bind(&todo.date)
        .bind(&todo.text)
        .bind(todo.completed)
        .execute(&mut *conn)
        .await?;
    }

    Ok(())
}

async fn read_import_file(mut multipart: Multipart) -> Result<Vec<u8>, AppError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(format!("Invalid multipart payload: {e}")))?
    {
        if field.name() != Some("file") {
            continue;
        }
        if field.file_name() == Some("") {
            return Err(AppError::BadRequest("No selected file".into()));
        }
        let bytes = field
            .bytes()
            .await
            .map_err(|e| AppError::BadRequest(format!("Invalid multipart payload: {e}")))?;
        return Ok(bytes.to_vec());
    }
    Err(AppError::BadRequest("No file part in the request".into()))
}

fn import_failed(e: sqlx::Error) -> AppError {
    AppError::Import(e.to_string())
}

pub async fn import_handler(
    user: AuthUser,
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<ImportResponse>, AppError> {
    let multipart = multipart.map_err(|rejection| AppError::BadRequest(rejection.body_text()))?;
    let bytes = read_import_file(multipart).await?;

    let document: ImportDocument = serde_json::from_slice(&bytes).map_err(|e| {
        tracing::warn!("Rejected import file from user {}: {}", user.id, e);
        AppError::BadRequest("Invalid JSON file".into())
    })?;
    let plan = plan_import(document);

    let mut tx = state.db.begin().await.map_err(import_failed)?;
    apply_import(&mut tx, user.id, &plan)
        .await
        .map_err(import_failed)?;
    tx.commit().await.map_err(import_failed)?;

    let imported_counts = plan.counts();
    tracing::info!(
        "User {} imported {:?} (skipped {:?})",
        user.id,
        imported_counts,
        plan.skipped
    );
    Ok(Json(ImportResponse {
        message: "Data imported successfully",
        imported_counts,
        skipped_counts: plan.skipped,
    }))
}

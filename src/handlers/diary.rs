// src/handlers/diary.rs
use axum::{
    body::Bytes,
    extract::{multipart::MultipartRejection, Multipart, Path, State},
    Json,
};
use serde_json::json;
use sqlx::types::Json as Jsonb;

use crate::auth::AuthUser;
use crate::dates::parse_date;
use crate::models::DiaryEntry;
use crate::routes::AppState;
use crate::{tags, AppError};

const ENTRY_COLUMNS: &str = "date, text, image_url, tags";

// --- 1. 按日期读取 (不存在返回空占位) ---
pub async fn get_entry_handler(
    user: AuthUser,
    State(state): State<AppState>,
    Path(date): Path<String>,
) -> Result<Json<DiaryEntry>, AppError> {
    let date = parse_date(&date)?;

    let entry = sqlx::query_as::<_, DiaryEntry>(&format!(
        "SELECT {ENTRY_COLUMNS} FROM diary_entries WHERE user_id = $1 AND date = $2"
    ))
    .bind(user.id)
    .bind(&date)
    .fetch_optional(&state.db)
    .await?;

    Ok(Json(entry.unwrap_or_else(DiaryEntry::placeholder)))
}

// --- 2. 最近一篇日记 ---
pub async fn last_entry_handler(
    user: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<serde_json::Value>, AppError> {
    let entry = sqlx::query_as::<_, DiaryEntry>(&format!(
        "SELECT {ENTRY_COLUMNS} FROM diary_entries WHERE user_id = $1
         ORDER BY date DESC LIMIT 1"
    ))
    .bind(user.id)
    .fetch_optional(&state.db)
    .await?;

    let body = match entry {
        Some(entry) => serde_json::to_value(entry).map_err(|e| {
            tracing::error!("Failed to serialise diary entry: {}", e);
            AppError::Internal
        })?,
        None => json!({"text": "", "imageUrl": null, "tags": [], "date": null}),
    };
    Ok(Json(body))
}

// --- 3. 保存 (multipart: text, image, tags) ---

struct UploadedImage {
    file_name: Option<String>,
    bytes: Bytes,
}

struct DiaryForm {
    text: String,
    tags: Vec<String>,
    image: Option<UploadedImage>,
}

/// 保存时对图片的处理: 有新图片则替换; 没有新图片且正文为空则清除 (连同文件); 否则保留
#[derive(Debug, PartialEq, Eq)]
enum ImageAction<T> {
    Store(T),
    Clear,
    Keep,
}

fn image_action<T>(upload: Option<T>, text: &str) -> ImageAction<T> {
    match upload {
        Some(upload) => ImageAction::Store(upload),
        None if text.is_empty() => ImageAction::Clear,
        None => ImageAction::Keep,
    }
}

fn bad_multipart(e: impl std::fmt::Display) -> AppError {
    AppError::BadRequest(format!("Invalid multipart payload: {e}"))
}

async fn read_diary_form(mut multipart: Multipart) -> Result<DiaryForm, AppError> {
    let mut form = DiaryForm {
        text: String::new(),
        tags: Vec::new(),
        image: None,
    };

    while let Some(field) = multipart.next_field().await.map_err(bad_multipart)? {
        match field.name() {
            Some("text") => form.text = field.text().await.map_err(bad_multipart)?,
            Some("tags") => {
                let raw = field.text().await.map_err(bad_multipart)?;
                form.tags = tags::parse_field(&raw);
            }
            Some("image") => {
                let file_name = field.file_name().map(str::to_string);
                let bytes = field.bytes().await.map_err(bad_multipart)?;
                // 浏览器在未选择文件时也会发送一个空的 file part
                if !bytes.is_empty() {
                    form.image = Some(UploadedImage { file_name, bytes });
                }
            }
            _ => {}
        }
    }
    Ok(form)
}

pub async fn save_entry_handler(
    user: AuthUser,
    State(state): State<AppState>,
    Path(date): Path<String>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<DiaryEntry>, AppError> {
    let date = parse_date(&date)?;
    let multipart = multipart.map_err(|rejection| AppError::BadRequest(rejection.body_text()))?;
    let DiaryForm {
        text,
        tags: entry_tags,
        image,
    } = read_diary_form(multipart).await?;

    let mut tx = state.db.begin().await?;

    let existing_image: Option<String> = sqlx::query_scalar::<_, Option<String>>(
        "SELECT image_url FROM diary_entries WHERE user_id = $1 AND date = $2 FOR UPDATE",
    )
    .bind(user.id)
    .bind(&date)
    .fetch_optional(&mut *tx)
    .await?
    .flatten();

    // 文件操作先于提交; 失败则整个保存失败
    let mut stored_image = None;
    let image_url = match image_action(image, &text) {
        ImageAction::Store(image) => {
            let url = state
                .images
                .save(image.file_name.as_deref(), &image.bytes)
                .await?;
            stored_image = Some(url.clone());
            Some(url)
        }
        ImageAction::Clear => {
            if let Some(old) = &existing_image {
                state.images.remove(old).await?;
            }
            None
        }
        ImageAction::Keep => existing_image,
    };

    let persisted = async {
        let entry = sqlx::query_as::<_, DiaryEntry>(&format!(
            "INSERT INTO diary_entries (user_id, date, text, image_url, tags)
             VALUES ($1, $2, $3, $4, $5)
             ON CONFLICT (user_id, date) DO UPDATE SET
                text = EXCLUDED.text,
                image_url = EXCLUDED.image_url,
                tags = EXCLUDED.tags
             RETURNING {ENTRY_COLUMNS}"
        ))
        .bind(user.id)
        .bind(&date)
        .bind(&text)
        .bind(&image_url)
        .bind(Jsonb(&entry_tags))
        .fetch_one(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok::<_, sqlx::Error>(entry)
    }
    .await;

    match persisted {
        Ok(entry) => Ok(Json(entry)),
        Err(e) => {
            // 行没写进去, 刚上传的文件也不要留下
            if let Some(url) = stored_image {
                if let Err(cleanup) = state.images.remove(&url).await {
                    tracing::warn!("Failed to clean up orphaned image {}: {}", url, cleanup);
                }
            }
            Err(e.into())
        }
    }
}

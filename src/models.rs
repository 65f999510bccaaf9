// src/models.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{types::Json, FromRow};
use validator::Validate;

// --- 1. 用户与认证 ---
#[derive(Debug, FromRow, Serialize)]
pub struct User {
    pub id: i32,
    pub username: String,
    #[serde(skip)]
    pub password_hash: String,
    pub created_at: Option<DateTime<Utc>>,
}

/// 对外暴露的用户信息 (不含密码哈希)
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct PublicUser {
    pub id: i32,
    pub username: String,
}

impl From<&User> for PublicUser {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            username: user.username.clone(),
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct RegisterSchema {
    #[serde(default)]
    #[validate(length(min = 1, max = 80, message = "Username and password are required"))]
    pub username: String,
    #[serde(default)]
    #[validate(length(min = 1, message = "Username and password are required"))]
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginSchema {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub message: &'static str,
    pub user: PublicUser,
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub is_authenticated: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<PublicUser>,
}

// --- 2. 日记 ---
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct DiaryEntry {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    pub text: String,
    #[serde(rename = "imageUrl")]
    pub image_url: Option<String>,
    pub tags: Json<Vec<String>>,
}

impl DiaryEntry {
    pub fn placeholder() -> Self {
        Self {
            date: None,
            text: String::new(),
            image_url: None,
            tags: Json(Vec::new()),
        }
    }
}

// --- 3. 笔记 ---
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Note {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    pub text: String,
}

impl Note {
    pub fn placeholder() -> Self {
        Self {
            date: None,
            text: String::new(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct NoteSchema {
    #[serde(default)]
    pub text: Option<String>,
}

// --- 4. 提醒 ---
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Reminder {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    pub text: String,
    pub time: Option<String>,
}

impl Reminder {
    pub fn placeholder() -> Self {
        Self {
            date: None,
            text: String::new(),
            time: None,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ReminderSchema {
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub time: Option<String>,
}

// --- 5. 待办 ---
// 与 todo_items / diary_entries 的列宽一致
pub const TODO_ID_MAX: usize = 36;
pub const TODO_TEXT_MAX: usize = 255;
pub const IMAGE_URL_MAX: usize = 255;

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct TodoItem {
    pub id: String,
    pub date: String,
    pub text: String,
    pub completed: bool,
}

#[derive(Debug, Deserialize, Validate)]
pub struct TodoSchema {
    #[validate(length(min = 1, max = 36, message = "Todo id must be 1-36 characters"))]
    pub id: String,
    #[serde(default)]
    #[validate(length(max = 255, message = "Todo text is limited to 255 characters"))]
    pub text: String,
    #[serde(default)]
    pub completed: bool,
}

// --- 6. 查询参数 ---
#[derive(Debug, Deserialize)]
pub struct FilterQuery {
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub sort_order: Option<String>,
    /// 逗号分隔, 仅日记使用
    pub tags: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    pub query: String,
}

#[derive(Debug, Deserialize)]
pub struct ExportQuery {
    #[serde(default, alias = "data_types[]")]
    pub data_types: Vec<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
}

/// 搜索结果: 在原记录上附加 `type` 字段
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum SearchResult {
    Diary(DiaryEntry),
    Note(Note),
    Reminder(Reminder),
    Todo(TodoItem),
}

// --- 7. 标签 ---
#[derive(Debug, Deserialize, Validate)]
pub struct RenameTagSchema {
    #[serde(default)]
    #[validate(length(min = 1, message = "Old tag and new tag are required"))]
    pub old_tag: String,
    #[serde(default)]
    #[validate(length(min = 1, message = "Old tag and new tag are required"))]
    pub new_tag: String,
}

#[derive(Debug, Serialize)]
pub struct TagUpdateResponse {
    pub message: String,
    pub updated_count: u64,
}

// --- 8. 导入/导出 ---
#[derive(Debug, Default, Serialize)]
pub struct ExportDocument {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diary_entries: Option<Vec<DiaryEntry>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<Vec<Note>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reminders: Option<Vec<Reminder>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub todos: Option<Vec<TodoItem>>,
}

/// 导入文件的结构与导出一致, 所有字段都可能缺失。
/// 各条目先保留为原始 JSON, 逐条解码, 单条类型不对只跳过该条。
#[derive(Debug, Default, Deserialize)]
pub struct ImportDocument {
    #[serde(default)]
    pub diary_entries: Option<Vec<serde_json::Value>>,
    #[serde(default)]
    pub notes: Option<Vec<serde_json::Value>>,
    #[serde(default)]
    pub reminders: Option<Vec<serde_json::Value>>,
    #[serde(default)]
    pub todos: Option<Vec<serde_json::Value>>,
}

#[derive(Debug, Deserialize)]
pub struct ImportDiaryEntry {
    pub date: Option<String>,
    pub text: Option<String>,
    #[serde(rename = "imageUrl")]
    pub image_url: Option<String>,
    pub tags: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
pub struct ImportNote {
    pub date: Option<String>,
    pub text: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ImportReminder {
    pub date: Option<String>,
    pub text: Option<String>,
    pub time: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ImportTodo {
    pub id: Option<String>,
    pub date: Option<String>,
    pub text: Option<String>,
    pub completed: Option<bool>,
}

#[derive(Debug, Default, Clone, Copy, Serialize, PartialEq)]
pub struct ImportCounts {
    pub diary_entries: u32,
    pub notes: u32,
    pub reminders: u32,
    pub todos: u32,
}

#[derive(Debug, Serialize)]
pub struct ImportResponse {
    pub message: &'static str,
    pub imported_counts: ImportCounts,
    pub skipped_counts: ImportCounts,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn placeholders_match_wire_shape() {
        assert_eq!(
            serde_json::to_value(Note::placeholder()).unwrap(),
            json!({"text": ""})
        );
        assert_eq!(
            serde_json::to_value(Reminder::placeholder()).unwrap(),
            json!({"text": "", "time": null})
        );
        assert_eq!(
            serde_json::to_value(DiaryEntry::placeholder()).unwrap(),
            json!({"text": "", "imageUrl": null, "tags": []})
        );
    }

    #[test]
    fn search_results_carry_their_kind() {
        let note = Note {
            date: Some("2024-05-01".into()),
            text: "hi".into(),
        };
        assert_eq!(
            serde_json::to_value(SearchResult::Note(note)).unwrap(),
            json!({"type": "note", "date": "2024-05-01", "text": "hi"})
        );

        let todo = TodoItem {
            id: "a".into(),
            date: "2024-05-01".into(),
            text: "milk".into(),
            completed: false,
        };
        let value = serde_json::to_value(SearchResult::Todo(todo)).unwrap();
        assert_eq!(value["type"], "todo");
        assert_eq!(value["id"], "a");
    }

    #[test]
    fn import_document_tolerates_missing_and_null_sections() {
        let doc: ImportDocument = serde_json::from_str(
            r#"{"notes": null, "todos": [{"text": "no id", "date": "2024-01-01"}]}"#,
        )
        .unwrap();
        assert!(doc.diary_entries.is_none());
        assert!(doc.notes.is_none());
        let todos = doc.todos.unwrap();
        assert_eq!(todos.len(), 1);
        let todo: ImportTodo = serde_json::from_value(todos[0].clone()).unwrap();
        assert!(todo.id.is_none());
    }

    #[test]
    fn import_sections_keep_mistyped_items_raw() {
        let doc: ImportDocument =
            serde_json::from_str(r#"{"todos": [{"id": "a", "completed": "yes"}, 7]}"#).unwrap();
        assert_eq!(doc.todos.unwrap().len(), 2);
    }

    #[test]
    fn export_omits_unrequested_kinds() {
        let doc = ExportDocument {
            notes: Some(vec![]),
            ..Default::default()
        };
        assert_eq!(serde_json::to_value(doc).unwrap(), json!({"notes": []}));
    }

    #[test]
    fn register_requires_both_fields() {
        let schema: RegisterSchema = serde_json::from_str(r#"{"username": "alice"}"#).unwrap();
        let err = schema.validate().unwrap_err();
        assert!(err.to_string().contains("Username and password are required"));
    }
}

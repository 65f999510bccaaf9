// src/handlers/tags.rs
use axum::{
    extract::{Path, State},
    Json,
};
use sqlx::types::Json as Jsonb;

use crate::auth::AuthUser;
use crate::models::{RenameTagSchema, TagUpdateResponse};
use crate::routes::AppState;
use crate::validation::ValidatedJson;
use crate::{tags, AppError};

// --- 1. 当前用户用过的全部标签 ---
pub async fn list_tags_handler(
    user: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<Vec<String>>, AppError> {
    let rows = sqlx::query_as::<_, (String, Jsonb<serde_json::Value>)>(
        "SELECT date, tags FROM diary_entries WHERE user_id = $1",
    )
    .bind(user.id)
    .fetch_all(&state.db)
    .await?;

    // 个别条目的标签格式不对只跳过该条, 不影响整个列表
    let lists = rows.into_iter().filter_map(|(date, Jsonb(raw))| {
        let decoded = tags::decode(raw);
        if decoded.is_none() {
            tracing::warn!("Skipping malformed tags on diary entry {}", date);
        }
        decoded
    });

    Ok(Json(tags::collect_distinct(lists)))
}

/// 对包含 `tag` 的每篇日记应用 `edit`, 返回被修改的条目数
async fn rewrite_entries_with_tag<F>(
    state: &AppState,
    user_id: i32,
    tag: &str,
    edit: F,
) -> Result<u64, AppError>
where
    F: Fn(&[String]) -> Option<Vec<String>>,
{
    let mut tx = state.db.begin().await?;

    let rows = sqlx::query_as::<_, (String, Jsonb<Vec<String>>)>(
        "SELECT date, tags FROM diary_entries
         WHERE user_id = $1 AND tags @> $2
         FOR UPDATE",
    )
    .bind(user_id)
    .bind(Jsonb(vec![tag.to_string()]))
    .fetch_all(&mut *tx)
    .await?;

    let mut updated_count = 0;
    for (date, Jsonb(current)) in rows {
        let Some(updated) = edit(&current) else {
            continue;
        };
        sqlx::query("UPDATE diary_entries SET tags = $1 WHERE user_id = $2 AND date = $3")
            .bind(Jsonb(updated))
            .bind(user_id)
            .bind(&date)
            .execute(&mut *tx)
            .await?;
        updated_count += 1;
    }

    tx.commit().await?;
    Ok(updated_count)
}

// --- 2. 重命名标签 (PUT /api/tags/rename) ---
pub async fn rename_tag_handler(
    user: AuthUser,
    State(state): State<AppState>,
    ValidatedJson(body): ValidatedJson<RenameTagSchema>,
) -> Result<Json<TagUpdateResponse>, AppError> {
    if body.old_tag == body.new_tag {
        return Err(AppError::BadRequest(
            "New tag cannot be the same as old tag".into(),
        ));
    }

    let updated_count = rewrite_entries_with_tag(&state, user.id, &body.old_tag, |current| {
        tags::rename(current, &body.old_tag, &body.new_tag)
    })
    .await?;

    tracing::info!(
        "User {} renamed tag {:?} -> {:?} on {} entries",
        user.id,
        body.old_tag,
        body.new_tag,
        updated_count
    );
    Ok(Json(TagUpdateResponse {
        message: format!(
            "Renamed {} occurrences of tag \"{}\" to \"{}\"",
            updated_count, body.old_tag, body.new_tag
        ),
        updated_count,
    }))
}

// --- 3. 删除标签 (DELETE /api/tags/:name) ---
async fn delete_tag(
    state: &AppState,
    user: &AuthUser,
    name: &str,
) -> Result<Json<TagUpdateResponse>, AppError> {
    let updated_count =
        rewrite_entries_with_tag(state, user.id, name, |current| tags::remove(current, name))
            .await?;

    tracing::info!(
        "User {} removed tag {:?} from {} entries",
        user.id,
        name,
        updated_count
    );
    Ok(Json(TagUpdateResponse {
        message: format!("Removed tag \"{}\" from {} entries", name, updated_count),
        updated_count,
    }))
}

pub async fn delete_tag_handler(
    user: AuthUser,
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<TagUpdateResponse>, AppError> {
    delete_tag(&state, &user, &name).await
}

// 静态路由 /api/tags/rename 优先于 /api/tags/:name, 名为 "rename" 的标签走这里
pub async fn delete_rename_tag_handler(
    user: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<TagUpdateResponse>, AppError> {
    delete_tag(&state, &user, "rename").await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{self, request, send};
    use axum::http::StatusCode;
    use sqlx::PgPool;

    async fn insert_entry(pool: &PgPool, user_id: i32, date: &str, entry_tags: &[&str]) {
        let entry_tags: Vec<String> = entry_tags.iter().map(|t| t.to_string()).collect();
        sqlx::query("INSERT INTO diary_entries (user_id, date, text, tags) VALUES ($1, $2, '', $3)")
            .bind(user_id)
            .bind(date)
            .bind(Jsonb(entry_tags))
            .execute(pool)
            .await
            .unwrap();
    }

    async fn tags_on(pool: &PgPool, user_id: i32, date: &str) -> Vec<String> {
        let Jsonb(current) = sqlx::query_scalar::<_, Jsonb<Vec<String>>>(
            "SELECT tags FROM diary_entries WHERE user_id = $1 AND date = $2",
        )
        .bind(user_id)
        .bind(date)
        .fetch_one(pool)
        .await
        .unwrap();
        current
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn rename_merges_into_existing_tag(pool: PgPool) {
        let dir = tempfile::tempdir().unwrap();
        let state = test_support::state(pool.clone(), dir.path());
        let (user, _) = test_support::sign_in(&pool, "alice").await;
        let (bob, _) = test_support::sign_in(&pool, "bob").await;

        insert_entry(&pool, user.id, "2024-05-01", &["old", "new"]).await;
        insert_entry(&pool, user.id, "2024-05-02", &["x", "old"]).await;
        insert_entry(&pool, user.id, "2024-05-03", &["y"]).await;
        insert_entry(&pool, bob.id, "2024-05-01", &["old"]).await;

        let Json(response) = rename_tag_handler(
            user.clone(),
            State(state.clone()),
            ValidatedJson(RenameTagSchema {
                old_tag: "old".into(),
                new_tag: "new".into(),
            }),
        )
        .await
        .unwrap();
        assert_eq!(response.updated_count, 2);

        assert_eq!(tags_on(&pool, user.id, "2024-05-01").await, ["new"]);
        assert_eq!(tags_on(&pool, user.id, "2024-05-02").await, ["new", "x"]);
        assert_eq!(tags_on(&pool, user.id, "2024-05-03").await, ["y"]);
        assert_eq!(tags_on(&pool, bob.id, "2024-05-01").await, ["old"]);

        let Json(listed) = list_tags_handler(user, State(state)).await.unwrap();
        assert_eq!(listed, ["new", "x", "y"]);
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn rename_to_same_tag_is_rejected(pool: PgPool) {
        let dir = tempfile::tempdir().unwrap();
        let state = test_support::state(pool.clone(), dir.path());
        let (user, _) = test_support::sign_in(&pool, "alice").await;

        let err = rename_tag_handler(
            user,
            State(state),
            ValidatedJson(RenameTagSchema {
                old_tag: "a".into(),
                new_tag: "a".into(),
            }),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn tag_named_rename_can_be_deleted(pool: PgPool) {
        let dir = tempfile::tempdir().unwrap();
        let state = test_support::state(pool.clone(), dir.path());
        let (user, cookie) = test_support::sign_in(&pool, "alice").await;
        insert_entry(&pool, user.id, "2024-05-01", &["rename", "x"]).await;

        let (status, body) = send(
            test_support::app(state.clone()),
            request("DELETE", "/api/tags/rename", Some(&cookie)),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["updated_count"], 1);

        let (status, body) = send(
            test_support::app(state),
            request("GET", "/api/tags", Some(&cookie)),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, serde_json::json!(["x"]));
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn delete_reports_touched_entries(pool: PgPool) {
        let dir = tempfile::tempdir().unwrap();
        let state = test_support::state(pool.clone(), dir.path());
        let (user, cookie) = test_support::sign_in(&pool, "alice").await;
        insert_entry(&pool, user.id, "2024-05-01", &["gone", "kept"]).await;
        insert_entry(&pool, user.id, "2024-05-02", &["gone"]).await;
        insert_entry(&pool, user.id, "2024-05-03", &["kept"]).await;

        let (status, body) = send(
            test_support::app(state),
            request("DELETE", "/api/tags/gone", Some(&cookie)),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["updated_count"], 2);
        assert_eq!(tags_on(&pool, user.id, "2024-05-01").await, ["kept"]);
        assert!(tags_on(&pool, user.id, "2024-05-02").await.is_empty());
    }
}

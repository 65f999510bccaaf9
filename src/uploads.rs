// src/uploads.rs
use std::{
    io,
    path::{Path, PathBuf},
};

use uuid::Uuid;

/// 图片对外的 URL 前缀, 由 `ServeDir` 提供
pub const URL_PREFIX: &str = "/uploads/";

const MAX_EXTENSION_LEN: usize = 8;

/// 日记图片的文件存储, 文件名由服务端生成
#[derive(Debug, Clone)]
pub struct ImageStore {
    dir: PathBuf,
}

impl ImageStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub async fn ensure_dir(&self) -> io::Result<()> {
        tokio::fs::create_dir_all(&self.dir).await
    }

    /// 写入图片并返回引用 (`/uploads/<name>`)
    pub async fn save(&self, original_name: Option<&str>, bytes: &[u8]) -> io::Result<String> {
        let name = match original_name.and_then(sanitized_extension) {
            Some(ext) => format!("{}.{}", Uuid::new_v4(), ext),
            None => Uuid::new_v4().to_string(),
        };
        tokio::fs::write(self.dir.join(&name), bytes).await?;
        tracing::debug!("Stored image {}", name);
        Ok(format!("{URL_PREFIX}{name}"))
    }

    /// 删除引用指向的文件; 文件已不存在不算错误
    pub async fn remove(&self, url: &str) -> io::Result<()> {
        let Some(name) = file_name_from_url(url) else {
            tracing::warn!("Refusing to delete unsafe image reference {:?}", url);
            return Ok(());
        };
        match tokio::fs::remove_file(self.dir.join(name)).await {
            Ok(()) => {
                tracing::debug!("Removed image {}", name);
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e),
        }
    }
}

fn sanitized_extension(original_name: &str) -> Option<String> {
    let (_, ext) = original_name.rsplit_once('.')?;
    let valid = !ext.is_empty()
        && ext.len() <= MAX_EXTENSION_LEN
        && ext.chars().all(|c| c.is_ascii_alphanumeric());
    valid.then(|| ext.to_ascii_lowercase())
}

/// 引用的最后一段必须是普通文件名, 防止 `../` 之类的路径逃逸
fn file_name_from_url(url: &str) -> Option<&str> {
    let name = url.rsplit('/').next()?;
    let safe = !name.is_empty()
        && name != "."
        && name != ".."
        && !name.contains('\\')
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_'));
    safe.then_some(name)
}

//! アップロード画像の保存

use std::path::PathBuf;

use crate::pipeline::{PredictError, Result};

/// 保存した画像の情報
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredImage {
    pub filename: String,
    pub filepath: String,
}

/// 画像ディレクトリへの書き込み
#[derive(Debug, Clone)]
pub struct ImageStore {
    dir: PathBuf,
}

impl ImageStore {
    pub fn new<P: Into<PathBuf>>(dir: P) -> Self {
        Self { dir: dir.into() }
    }

    /// 元のバイト列をそのまま `<uuid>.png` として保存
    pub fn save(&self, bytes: &[u8]) -> Result<StoredImage> {
        std::fs::create_dir_all(&self.dir).map_err(|e| {
            PredictError::Storage(format!(
                "画像ディレクトリを作成できません: {}: {}",
                self.dir.display(),
                e
            ))
        })?;

        let filename = format!("{}.png", uuid::Uuid::new_v4());
        let path = self.dir.join(&filename);
        std::fs::write(&path, bytes).map_err(|e| {
            PredictError::Storage(format!("画像を保存できません: {}: {}", path.display(), e))
        })?;

        Ok(StoredImage {
            filename,
            filepath: path.to_string_lossy().to_string(),
        })
    }
}

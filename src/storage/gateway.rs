//! 予測・画像レコードの保存先
//!
//! 追記のみ。コアはこのストアを読み取らない。

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Mutex;

use crate::pipeline::{Label, PredictError, Result};

/// レコードID（1始まり）
pub type RecordId = u64;

/// 予測レコード
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionRecord {
    pub id: RecordId,
    pub label: Label,
    pub confidence: f64,
    pub image_path: String,
    pub user_id: i64,
    /// 保存時刻（RFC3339）
    pub timestamp: String,
}

/// アップロード画像レコード
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageRecord {
    pub id: RecordId,
    pub filename: String,
    pub filepath: String,
    /// アップロード時刻（RFC3339）
    pub uploaded_at: String,
    /// 0 = nopub, 1 = pub
    pub label_index: u8,
}

/// 永続化ゲートウェイ
pub trait PersistenceGateway: Send + Sync {
    fn store_prediction(
        &self,
        label: Label,
        confidence: f64,
        image_path: &str,
        user_id: i64,
    ) -> Result<RecordId>;

    fn store_image(
        &self,
        filename: &str,
        filepath: &str,
        uploaded_at: DateTime<Utc>,
        label_index: u8,
    ) -> Result<RecordId>;
}

/// メモリ上のゲートウェイ（テスト・組み込み用）
#[derive(Debug, Default)]
pub struct MemoryGateway {
    predictions: Mutex<Vec<PredictionRecord>>,
    images: Mutex<Vec<ImageRecord>>,
}

impl MemoryGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn predictions(&self) -> Vec<PredictionRecord> {
        self.predictions
            .lock()
            .map(|records| records.clone())
            .unwrap_or_default()
    }

    pub fn images(&self) -> Vec<ImageRecord> {
        self.images
            .lock()
            .map(|records| records.clone())
            .unwrap_or_default()
    }
}

fn poisoned() -> PredictError {
    PredictError::Storage("レコードのロックが破損しています".to_string())
}

impl PersistenceGateway for MemoryGateway {
    fn store_prediction(
        &self,
        label: Label,
        confidence: f64,
        image_path: &str,
        user_id: i64,
    ) -> Result<RecordId> {
        let mut records = self.predictions.lock().map_err(|_| poisoned())?;
        let id = records.len() as RecordId + 1;
        records.push(PredictionRecord {
            id,
            label,
            confidence,
            image_path: image_path.to_string(),
            user_id,
            timestamp: Utc::now().to_rfc3339(),
        });
        Ok(id)
    }

    fn store_image(
        &self,
        filename: &str,
        filepath: &str,
        uploaded_at: DateTime<Utc>,
        label_index: u8,
    ) -> Result<RecordId> {
        let mut records = self.images.lock().map_err(|_| poisoned())?;
        let id = records.len() as RecordId + 1;
        records.push(ImageRecord {
            id,
            filename: filename.to_string(),
            filepath: filepath.to_string(),
            uploaded_at: uploaded_at.to_rfc3339(),
            label_index,
        });
        Ok(id)
    }
}

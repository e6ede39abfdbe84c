use serde::{Deserialize, Serialize};

use crate::pipeline::{Label, PredictionResult};
use crate::storage::RecordId;

/// base64画像の入力
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageInput {
    pub image: String,
}

/// 推論の応答
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictOut {
    pub result: Label,
    pub confidence: f64,
}

impl From<PredictionResult> for PredictOut {
    fn from(prediction: PredictionResult) -> Self {
        Self {
            result: prediction.label,
            confidence: prediction.confidence,
        }
    }
}

/// 画像アップロードの応答
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadOut {
    pub filename: String,
    pub label: Label,
    pub confidence: f64,
}

/// クライアントから送られる予測結果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionCreate {
    pub label: Label,
    pub confidence: f64,
    pub image_path: String,
    pub user_id: i64,
}

/// 保存済みの予測結果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionOut {
    pub id: RecordId,
    #[serde(flatten)]
    pub prediction: PredictionCreate,
}

/// 稼働状態
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthOut {
    pub ready: bool,
}

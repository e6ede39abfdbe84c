//! モデルメタデータの定義
//!
//! tar.gz形式のモデルアーカイブに `metadata.json` として同梱されます。

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// モデルメタデータ
///
/// tar.gz形式で保存される情報：
/// - metadata.json: このメタデータ（JSON形式）
/// - model.bin: モデルの重み（バイナリ）
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ModelMetadata {
    /// クラスラベル（モデル出力の順）
    /// 例: ["nopub", "pub"]
    pub class_labels: Vec<String>,

    /// モデル入力サイズ（CNNへの入力解像度、通常100x100）
    pub model_input_size: u32,

    /// 隠れ層の次元
    pub hidden_size: u32,

    /// 学習時のドロップアウト率
    #[serde(default)]
    pub dropout: f64,

    /// アーカイブの作成時刻（ISO8601形式）
    pub created_at: String,

    /// 任意のメモ
    #[serde(default)]
    pub notes: Option<String>,
}

impl ModelMetadata {
    /// 新しいメタデータを作成
    pub fn new(
        class_labels: Vec<String>,
        model_input_size: u32,
        hidden_size: u32,
        dropout: f64,
        notes: Option<String>,
    ) -> Self {
        let created_at = chrono::Local::now().to_rfc3339();

        Self {
            class_labels,
            model_input_size,
            hidden_size,
            dropout,
            created_at,
            notes,
        }
    }

    /// メタデータをJSON文字列に変換
    pub fn to_json_string(&self) -> Result<String> {
        serde_json::to_string_pretty(self).context("Failed to serialize metadata to JSON")
    }

    /// JSON文字列からメタデータを生成
    pub fn from_json_string(json: &str) -> Result<Self> {
        serde_json::from_str(json).context("Failed to deserialize metadata from JSON")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_optional_fields_default() {
        let json = r#"{
            "class_labels": ["nopub", "pub"],
            "model_input_size": 100,
            "hidden_size": 256,
            "created_at": "2024-05-01T10:00:00+02:00"
        }"#;
        let metadata = ModelMetadata::from_json_string(json).unwrap();
        assert_eq!(metadata.class_labels, vec!["nopub", "pub"]);
        assert_eq!(metadata.dropout, 0.0);
        assert!(metadata.notes.is_none());
    }

    #[test]
    fn test_missing_required_field_is_error() {
        let json = r#"{ "class_labels": ["nopub", "pub"] }"#;
        assert!(ModelMetadata::from_json_string(json).is_err());
    }
}

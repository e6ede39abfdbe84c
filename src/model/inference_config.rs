//! モデルメタデータを使用した推論設定
//!
//! 保存されたモデルメタデータを読み込み、サーバ側の設定と矛盾がないか確認します。

use crate::model::model_metadata::ModelMetadata;
use crate::pipeline::{Label, PredictError};

/// モデルメタデータから推論用情報を取得
#[derive(Debug, Clone, PartialEq)]
pub struct InferenceConfig {
    /// クラスラベル（モデル出力の順）
    pub class_labels: Vec<String>,

    /// モデル入力解像度
    pub model_input_size: usize,

    /// 隠れ層の次元
    pub hidden_size: usize,
}

impl InferenceConfig {
    /// メタデータからInferenceConfigを作成
    pub fn from_metadata(metadata: &ModelMetadata) -> Self {
        Self {
            class_labels: metadata.class_labels.clone(),
            model_input_size: metadata.model_input_size as usize,
            hidden_size: metadata.hidden_size as usize,
        }
    }

    pub fn num_classes(&self) -> usize {
        self.class_labels.len()
    }

    /// サーバ設定と照合する
    ///
    /// クラス順は `[nopub, pub]` 固定、入力サイズは設定値と一致している必要がある。
    pub fn validate(&self, expected_image_size: usize) -> Result<(), PredictError> {
        let expected_labels: Vec<&str> = Label::CLASS_ORDER.iter().map(|l| l.as_str()).collect();
        if self.class_labels != expected_labels {
            return Err(PredictError::Config(format!(
                "クラスラベルが一致しません: [{}] (期待: [{}])",
                self.class_labels.join(", "),
                expected_labels.join(", ")
            )));
        }

        if self.model_input_size != expected_image_size {
            return Err(PredictError::Config(format!(
                "モデル入力サイズが設定と一致しません: {} (設定: {})",
                self.model_input_size, expected_image_size
            )));
        }

        Ok(())
    }

    /// 設定情報をログに出力
    pub fn print_info(&self) {
        log::info!("=== 推論設定 ===");
        log::info!("クラスラベル: {}", self.class_labels.join(", "));
        log::info!(
            "モデル入力サイズ: {}x{}",
            self.model_input_size,
            self.model_input_size
        );
        log::info!("総クラス数: {}", self.num_classes());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(labels: &[&str], size: usize) -> InferenceConfig {
        InferenceConfig {
            class_labels: labels.iter().map(|s| s.to_string()).collect(),
            model_input_size: size,
            hidden_size: 256,
        }
    }

    #[test]
    fn test_validate_accepts_matching_model() {
        assert!(config(&["nopub", "pub"], 100).validate(100).is_ok());
    }

    #[test]
    fn test_validate_rejects_swapped_labels() {
        let err = config(&["pub", "nopub"], 100).validate(100).unwrap_err();
        assert!(matches!(err, PredictError::Config(_)));
    }

    #[test]
    fn test_validate_rejects_extra_class() {
        let err = config(&["nopub", "pub", "other"], 100)
            .validate(100)
            .unwrap_err();
        assert!(matches!(err, PredictError::Config(_)));
    }

    #[test]
    fn test_validate_rejects_size_mismatch() {
        let err = config(&["nopub", "pub"], 64).validate(100).unwrap_err();
        assert!(matches!(err, PredictError::Config(_)));
    }

    #[test]
    fn test_metadata_checked_against_app_config() {
        let metadata = ModelMetadata::new(
            vec!["nopub".to_string(), "pub".to_string()],
            64,
            256,
            0.5,
            None,
        );
        let app_config = crate::model::AppConfig::default();

        let err = InferenceConfig::from_metadata(&metadata)
            .validate(app_config.model.image_size)
            .unwrap_err();
        assert!(matches!(err, PredictError::Config(_)));
    }
}

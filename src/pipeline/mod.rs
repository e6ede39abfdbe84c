//! 画像から予測結果までの推論パイプライン
//!
//! デコード → 前処理 → 推論 → 解釈 の一方向の流れ。各段は前段の出力を1つだけ受け取る。

pub mod decoder;
pub mod error;
pub mod interpreter;
pub mod preprocessor;

pub use decoder::{decode_base64, decode_bytes, strip_data_uri, ImageBuffer};
pub use error::{PredictError, Result};
pub use interpreter::{interpret, Label, PredictionResult, ScoreVector};
pub use preprocessor::{preprocess, InputTensor, DEFAULT_IMAGE_SIZE};

use crate::ml::Classifier;

/// パイプライン本体
///
/// 状態は入力サイズのみ。分類器は呼び出し側から参照で渡す。
#[derive(Debug, Clone, Copy)]
pub struct Pipeline {
    image_size: usize,
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::new(DEFAULT_IMAGE_SIZE)
    }
}

impl Pipeline {
    pub fn new(image_size: usize) -> Self {
        Self { image_size }
    }

    /// デコード済み画像を分類
    pub fn predict_image(
        &self,
        classifier: &dyn Classifier,
        image: ImageBuffer,
    ) -> Result<PredictionResult> {
        let tensor = preprocess(image, self.image_size)?;
        let scores = classifier.infer(&tensor)?;
        Ok(interpret(scores))
    }

    /// アップロードされたバイト列を分類
    pub fn predict_bytes(
        &self,
        classifier: &dyn Classifier,
        bytes: &[u8],
    ) -> Result<PredictionResult> {
        let image = decode_bytes(bytes)?;
        self.predict_image(classifier, image)
    }

    /// base64文字列を分類
    pub fn predict_base64(
        &self,
        classifier: &dyn Classifier,
        encoded: &str,
    ) -> Result<PredictionResult> {
        let image = decode_base64(encoded)?;
        self.predict_image(classifier, image)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use base64::{engine::general_purpose, Engine as _};
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// 固定スコアを返す分類器
    pub(crate) struct FixedClassifier {
        pub scores: ScoreVector,
        pub calls: AtomicUsize,
    }

    impl FixedClassifier {
        pub(crate) fn new(score_nopub: f32, score_pub: f32) -> Self {
            Self {
                scores: ScoreVector::new(score_nopub, score_pub),
                calls: AtomicUsize::new(0),
            }
        }
    }

    impl Classifier for FixedClassifier {
        fn infer(&self, tensor: &InputTensor) -> Result<ScoreVector> {
            assert_eq!(tensor.shape(), [1, 100, 100, 3]);
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.scores)
        }
    }

    #[test]
    fn test_data_uri_single_pixel_scenario() {
        let classifier = FixedClassifier::new(0.3, 0.7);
        let png = crate::pipeline::decoder::tests::encode_png(1, 1);
        let input = format!(
            "data:image/png;base64,{}",
            general_purpose::STANDARD.encode(png)
        );

        let result = Pipeline::default()
            .predict_base64(&classifier, &input)
            .unwrap();
        assert_eq!(result.label, Label::Pub);
        assert!((0.0..=100.0).contains(&result.confidence));
        assert_eq!(classifier.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_decode_failure_never_reaches_classifier() {
        let classifier = FixedClassifier::new(0.1, 0.9);
        let err = Pipeline::default()
            .predict_bytes(&classifier, &[])
            .unwrap_err();

        assert!(matches!(err, PredictError::Decode(_)));
        assert_eq!(classifier.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_preprocess_failure_never_reaches_classifier() {
        let classifier = FixedClassifier::new(0.1, 0.9);
        let gray = ImageBuffer::from_raw(2, 2, 1, vec![0; 4]).unwrap();
        let err = Pipeline::default()
            .predict_image(&classifier, gray)
            .unwrap_err();

        assert!(matches!(err, PredictError::Preprocess(_)));
        assert_eq!(classifier.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_tie_through_pipeline() {
        let classifier = FixedClassifier::new(0.5, 0.5);
        let png = crate::pipeline::decoder::tests::encode_png(8, 8);
        let result = Pipeline::default().predict_bytes(&classifier, &png).unwrap();
        assert_eq!(result.label, Label::Nopub);
        assert_eq!(result.confidence, 50.0);
    }
}

//! 分類器の抽象と、起動時に一度だけ設定される共有ハンドル

use std::sync::{Arc, OnceLock};

use crate::pipeline::{InputTensor, PredictError, Result, ScoreVector};

/// テンソルからクラススコアを求めるもの
///
/// 読み込み後は不変で、複数スレッドから同時に呼ばれる。
pub trait Classifier: Send + Sync {
    /// `[nopub, pub]` の順でスコアを返す
    fn infer(&self, tensor: &InputTensor) -> Result<ScoreVector>;
}

/// 読み込み済み分類器の置き場所
///
/// 起動処理がモデルを読み込んだ後に一度だけ `install` する。
/// 再読み込み・差し替えはできない。
#[derive(Default)]
pub struct ClassifierSlot {
    inner: OnceLock<Arc<dyn Classifier>>,
}

impl ClassifierSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// 分類器を設定（2回目以降はエラー）
    pub fn install(&self, classifier: Arc<dyn Classifier>) -> Result<()> {
        self.inner
            .set(classifier)
            .map_err(|_| PredictError::Config("モデルは既に読み込まれています".to_string()))?;
        log::info!("分類器の準備が完了しました");
        Ok(())
    }

    pub fn is_ready(&self) -> bool {
        self.inner.get().is_some()
    }

    /// 分類器を取得（未設定なら `ModelUnavailable`）
    pub fn get(&self) -> Result<Arc<dyn Classifier>> {
        self.inner.get().cloned().ok_or_else(|| {
            PredictError::ModelUnavailable("起動処理でモデルが読み込まれていません".to_string())
        })
    }
}

impl Classifier for ClassifierSlot {
    fn infer(&self, tensor: &InputTensor) -> Result<ScoreVector> {
        self.get()?.infer(tensor)
    }
}

impl std::fmt::Debug for ClassifierSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClassifierSlot")
            .field("ready", &self.is_ready())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::tests::FixedClassifier;
    use crate::pipeline::{preprocess, ImageBuffer};

    fn tensor() -> InputTensor {
        preprocess(ImageBuffer::from_raw(1, 1, 3, vec![1, 2, 3]).unwrap(), 100).unwrap()
    }

    #[test]
    fn test_get_before_install_is_model_unavailable() {
        let slot = ClassifierSlot::new();
        assert!(!slot.is_ready());
        assert!(matches!(slot.get(), Err(PredictError::ModelUnavailable(_))));
        assert!(matches!(
            slot.infer(&tensor()),
            Err(PredictError::ModelUnavailable(_))
        ));
    }

    #[test]
    fn test_install_once() {
        let slot = ClassifierSlot::new();
        slot.install(Arc::new(FixedClassifier::new(0.2, 0.8))).unwrap();
        assert!(slot.is_ready());

        let scores = slot.infer(&tensor()).unwrap();
        assert_eq!(scores.as_array(), [0.2, 0.8]);

        // 差し替えは拒否され、最初の分類器が残る
        let err = slot
            .install(Arc::new(FixedClassifier::new(0.9, 0.1)))
            .unwrap_err();
        assert!(matches!(err, PredictError::Config(_)));
        assert_eq!(slot.infer(&tensor()).unwrap().as_array(), [0.2, 0.8]);
    }
}

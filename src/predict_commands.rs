//! 推論・保存のコマンド
//!
//! HTTP層から呼ばれる同期処理。推論はCPU負荷が高いので、呼び出し側は
//! ブロッキング用スレッドで実行すること。

use chrono::Utc;

use crate::pipeline::Result;
use crate::types::{ImageInput, PredictOut, PredictionCreate, PredictionOut, UploadOut};
use crate::AppState;

/// アップロードされた画像を分類
pub fn predict_upload(state: &AppState, bytes: &[u8]) -> Result<PredictOut> {
    let prediction = state
        .pipeline()
        .predict_bytes(state.classifier(), bytes)?;
    log::info!(
        "推論結果: {} ({:.2}%)",
        prediction.label,
        prediction.confidence
    );
    Ok(prediction.into())
}

/// base64画像を分類
pub fn predict_base64(state: &AppState, input: &ImageInput) -> Result<PredictOut> {
    let prediction = state
        .pipeline()
        .predict_base64(state.classifier(), &input.image)?;
    log::info!(
        "推論結果: {} ({:.2}%)",
        prediction.label,
        prediction.confidence
    );
    Ok(prediction.into())
}

/// 画像を分類し、元画像とレコードを保存
///
/// 分類に失敗した場合は何も保存しない。
pub fn upload_image(state: &AppState, bytes: &[u8]) -> Result<UploadOut> {
    let prediction = state
        .pipeline()
        .predict_bytes(state.classifier(), bytes)?;

    let stored = state.image_store().save(bytes)?;
    let id = match state.gateway().store_image(
        &stored.filename,
        &stored.filepath,
        Utc::now(),
        prediction.label.index() as u8,
    ) {
        Ok(id) => id,
        Err(e) => {
            // レコードのない画像は残さない
            if let Err(remove_err) = std::fs::remove_file(&stored.filepath) {
                log::warn!(
                    "保存済み画像を削除できません: {}: {}",
                    stored.filepath,
                    remove_err
                );
            }
            return Err(e);
        }
    };
    log::info!(
        "画像を保存しました: id={} {} -> {} ({:.2}%)",
        id,
        stored.filepath,
        prediction.label,
        prediction.confidence
    );

    Ok(UploadOut {
        filename: stored.filename,
        label: prediction.label,
        confidence: prediction.confidence,
    })
}

/// クライアントが確定した予測結果を保存
pub fn save_prediction(state: &AppState, prediction: PredictionCreate) -> Result<PredictionOut> {
    let id = state.gateway().store_prediction(
        prediction.label,
        prediction.confidence,
        &prediction.image_path,
        prediction.user_id,
    )?;
    log::info!(
        "予測結果を保存しました: id={} user={} label={}",
        id,
        prediction.user_id,
        prediction.label
    );
    Ok(PredictionOut { id, prediction })
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::ml::ClassifierSlot;
    use crate::pipeline::decoder::tests::encode_png;
    use crate::pipeline::tests::FixedClassifier;
    use crate::pipeline::{Label, Pipeline, PredictError};
    use crate::storage::{ImageStore, MemoryGateway, PersistenceGateway, RecordId};
    use base64::{engine::general_purpose, Engine as _};
    use std::sync::Arc;

    pub(crate) fn test_state(
        image_dir: &std::path::Path,
        scores: Option<(f32, f32)>,
    ) -> (AppState, Arc<MemoryGateway>) {
        let slot = Arc::new(ClassifierSlot::new());
        if let Some((nopub, pub_score)) = scores {
            slot.install(Arc::new(FixedClassifier::new(nopub, pub_score)))
                .unwrap();
        }
        let gateway = Arc::new(MemoryGateway::new());
        let state = AppState::new(
            Pipeline::default(),
            slot,
            gateway.clone(),
            ImageStore::new(image_dir),
        );
        (state, gateway)
    }

    /// 書き込みが常に失敗するゲートウェイ
    struct BrokenGateway;

    impl PersistenceGateway for BrokenGateway {
        fn store_prediction(&self, _: Label, _: f64, _: &str, _: i64) -> Result<RecordId> {
            Err(PredictError::Storage("ディスクがいっぱいです".to_string()))
        }

        fn store_image(
            &self,
            _: &str,
            _: &str,
            _: chrono::DateTime<Utc>,
            _: u8,
        ) -> Result<RecordId> {
            Err(PredictError::Storage("ディスクがいっぱいです".to_string()))
        }
    }

    fn file_count(dir: &std::path::Path) -> usize {
        std::fs::read_dir(dir).map(|d| d.count()).unwrap_or(0)
    }

    #[test]
    fn test_predict_upload() {
        let dir = tempfile::tempdir().unwrap();
        let (state, gateway) = test_state(dir.path(), Some((0.2, 0.8)));

        let out = predict_upload(&state, &encode_png(16, 9)).unwrap();
        assert_eq!(out.result, Label::Pub);
        assert_eq!(out.confidence, 80.0);
        // 推論だけでは何も保存しない
        assert!(gateway.images().is_empty());
        assert_eq!(file_count(dir.path()), 0);
    }

    #[test]
    fn test_predict_base64() {
        let dir = tempfile::tempdir().unwrap();
        let (state, _) = test_state(dir.path(), Some((0.5, 0.5)));

        let input = ImageInput {
            image: format!(
                "data:image/png;base64,{}",
                general_purpose::STANDARD.encode(encode_png(1, 1))
            ),
        };
        let out = predict_base64(&state, &input).unwrap();
        assert_eq!(out.result, Label::Nopub);
        assert_eq!(out.confidence, 50.0);
    }

    #[test]
    fn test_upload_image_persists() {
        let dir = tempfile::tempdir().unwrap();
        let (state, gateway) = test_state(dir.path(), Some((0.1, 0.9)));
        let png = encode_png(4, 4);

        let out = upload_image(&state, &png).unwrap();
        assert_eq!(out.label, Label::Pub);

        let images = gateway.images();
        assert_eq!(images.len(), 1);
        assert_eq!(images[0].filename, out.filename);
        assert_eq!(images[0].label_index, 1);
        assert_eq!(std::fs::read(&images[0].filepath).unwrap(), png);
    }

    #[test]
    fn test_empty_upload_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let (state, gateway) = test_state(dir.path(), Some((0.1, 0.9)));

        let err = upload_image(&state, &[]).unwrap_err();
        assert!(matches!(err, PredictError::Decode(_)));
        assert!(gateway.images().is_empty());
        assert!(gateway.predictions().is_empty());
        assert_eq!(file_count(dir.path()), 0);
    }

    #[test]
    fn test_failed_record_removes_stored_image() {
        let dir = tempfile::tempdir().unwrap();
        let slot = Arc::new(ClassifierSlot::new());
        slot.install(Arc::new(FixedClassifier::new(0.1, 0.9)))
            .unwrap();
        let state = AppState::new(
            Pipeline::default(),
            slot,
            Arc::new(BrokenGateway),
            ImageStore::new(dir.path()),
        );

        let err = upload_image(&state, &encode_png(4, 4)).unwrap_err();
        assert!(matches!(err, PredictError::Storage(_)));
        assert_eq!(file_count(dir.path()), 0);
    }

    #[test]
    fn test_model_not_loaded() {
        let dir = tempfile::tempdir().unwrap();
        let (state, gateway) = test_state(dir.path(), None);

        let err = upload_image(&state, &encode_png(2, 2)).unwrap_err();
        assert!(matches!(err, PredictError::ModelUnavailable(_)));
        assert!(gateway.images().is_empty());
    }

    #[test]
    fn test_save_prediction() {
        let dir = tempfile::tempdir().unwrap();
        let (state, gateway) = test_state(dir.path(), None);

        let saved = save_prediction(
            &state,
            PredictionCreate {
                label: Label::Pub,
                confidence: 88.8,
                image_path: "image/abc.png".to_string(),
                user_id: 7,
            },
        )
        .unwrap();

        assert_eq!(saved.id, 1);
        let records = gateway.predictions();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].user_id, 7);
        assert_eq!(records[0].image_path, "image/abc.png");
    }
}

//! モデル推論機能

use anyhow::Result;
use std::path::Path;
use std::sync::{Arc, Mutex};

use burn::{
    backend::Wgpu,
    module::Module,
    record::{BinBytesRecorder, FullPrecisionSettings, Recorder},
    tensor::{backend::Backend, Tensor},
};
use burn_ndarray::{NdArray, NdArrayDevice};
use burn_wgpu::WgpuDevice;

use crate::ml::{Classifier, ModelConfig, PubClassifier, MIN_IMAGE_SIZE};
use crate::model::{load_model_with_metadata, AppConfig, DeviceType, InferenceConfig};
use crate::pipeline::{InputTensor, PredictError, ScoreVector};

/// 推論エンジン
///
/// モデルはロック越しに保持するが、ロックはパラメータ参照の複製にしか使わない。
/// 順伝播そのものはロック外で行うため、複数リクエストの推論は並行して進む。
pub struct InferenceEngine<B: Backend> {
    model: Mutex<PubClassifier<B>>,
    config: InferenceConfig,
    device: B::Device,
}

impl<B: Backend> InferenceEngine<B> {
    /// モデルを読み込んで推論エンジンを初期化
    pub fn load<P: AsRef<Path>>(model_path: P, image_size: usize, device: B::Device) -> Result<Self> {
        let model_path = model_path.as_ref();
        log::info!("モデルを読み込みます: {}", model_path.display());

        // メタデータとモデルバイナリを読み込む
        let (metadata, model_binary) = load_model_with_metadata(model_path)?;
        let config = InferenceConfig::from_metadata(&metadata);
        config.validate(image_size)?;
        if config.model_input_size < MIN_IMAGE_SIZE {
            return Err(PredictError::Config(format!(
                "モデル入力サイズが小さすぎます: {} (最小{})",
                config.model_input_size, MIN_IMAGE_SIZE
            ))
            .into());
        }
        config.print_info();

        let model_config = ModelConfig {
            num_classes: config.num_classes(),
            hidden_size: config.hidden_size,
            dropout: 0.0, // 推論時はドロップアウトなし
            image_size: config.model_input_size,
        };
        let model = model_config.init::<B>(&device);

        // モデルの重みを復元
        let recorder = BinBytesRecorder::<FullPrecisionSettings>::default();
        let record = Recorder::<B>::load(&recorder, model_binary, &device)
            .map_err(|e| anyhow::anyhow!("モデル重みの読み込みエラー: {:?}", e))?;
        let model = model.load_record(record);

        log::info!("モデルの読み込みが完了しました");

        Ok(Self {
            model: Mutex::new(model),
            config,
            device,
        })
    }

    fn snapshot(&self) -> std::result::Result<PubClassifier<B>, PredictError> {
        let model = self
            .model
            .lock()
            .map_err(|_| PredictError::Inference("モデルのロックが破損しています".to_string()))?;
        Ok(model.clone())
    }
}

impl<B: Backend> Classifier for InferenceEngine<B> {
    fn infer(&self, tensor: &InputTensor) -> crate::pipeline::Result<ScoreVector> {
        let size = self.config.model_input_size;
        if tensor.size() != size {
            return Err(PredictError::Inference(format!(
                "入力テンソルの形状が不正です: {:?} (期待: [1, {}, {}, 3])",
                tensor.shape(),
                size,
                size
            )));
        }

        let model = self.snapshot()?;

        // NHWC [1, size, size, 3] -> NCHW [1, 3, size, size]
        let input = Tensor::<B, 1>::from_floats(tensor.as_slice(), &self.device)
            .reshape([1, size, size, 3])
            .permute([0, 3, 1, 2]);

        let scores = model
            .predict_proba(input)
            .into_data()
            .to_vec::<f32>()
            .map_err(|e| PredictError::Inference(format!("推論結果の取得エラー: {:?}", e)))?;

        ScoreVector::try_from(scores)
    }
}

/// 設定に従ってバックエンドを選び、分類器を読み込む
pub fn load_classifier(config: &AppConfig, model_path: &Path) -> Result<Arc<dyn Classifier>> {
    let image_size = config.model.image_size;
    log::info!("使用デバイス: {}", config.device_type);

    let classifier: Arc<dyn Classifier> = match config.device_type {
        DeviceType::Wgpu => Arc::new(InferenceEngine::<Wgpu>::load(
            model_path,
            image_size,
            WgpuDevice::default(),
        )?),
        DeviceType::Cpu => Arc::new(InferenceEngine::<NdArray>::load(
            model_path,
            image_size,
            NdArrayDevice::Cpu,
        )?),
    };

    Ok(classifier)
}

mod types;
mod predict_commands;

pub mod pipeline;
pub mod ml;
pub mod model;
pub mod storage;
pub mod server;

pub use types::{HealthOut, ImageInput, PredictOut, PredictionCreate, PredictionOut, UploadOut};

use std::sync::Arc;

use actix_web::web;

use ml::{Classifier, ClassifierSlot};
use model::AppConfig;
use pipeline::Pipeline;
use storage::{CsvGateway, ImageStore, PersistenceGateway};

/// リクエスト間で共有する状態
pub struct AppState {
    pipeline: Pipeline,
    classifier: Arc<ClassifierSlot>, // 起動時に一度だけ設定される
    gateway: Arc<dyn PersistenceGateway>,
    images: ImageStore,
}

impl AppState {
    pub fn new(
        pipeline: Pipeline,
        classifier: Arc<ClassifierSlot>,
        gateway: Arc<dyn PersistenceGateway>,
        images: ImageStore,
    ) -> Self {
        Self {
            pipeline,
            classifier,
            gateway,
            images,
        }
    }

    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    pub fn classifier(&self) -> &dyn Classifier {
        self.classifier.as_ref()
    }

    /// モデルが読み込み済みか
    pub fn is_ready(&self) -> bool {
        self.classifier.is_ready()
    }

    pub fn gateway(&self) -> &dyn PersistenceGateway {
        self.gateway.as_ref()
    }

    pub fn image_store(&self) -> &ImageStore {
        &self.images
    }
}

/// ログ出力の初期化（RUST_LOG 未指定時は info）
pub fn setup_logging() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();
}

/// モデルを読み込んでサーバを起動する
///
/// モデルが読めない場合は起動しない。
pub async fn run(config: AppConfig) -> anyhow::Result<()> {
    config.display();

    let slot = Arc::new(ClassifierSlot::new());

    #[cfg(feature = "ml")]
    {
        let model_path = config.model_path()?;
        let classifier = ml::load_classifier(&config, &model_path)?;
        slot.install(classifier)?;
        log::info!("モデルを読み込みました: {}", model_path.display());
    }
    #[cfg(not(feature = "ml"))]
    {
        log::warn!("ml 機能が無効です。推論エンドポイントは 503 を返します");
    }

    let gateway = CsvGateway::open(&config.storage.data_dir)?;
    let images = ImageStore::new(&config.storage.image_dir);

    let state = web::Data::new(AppState::new(
        Pipeline::new(config.model.image_size),
        slot,
        Arc::new(gateway),
        images,
    ));

    server::serve(state, &config.server).await
}

//! モデルアーカイブの書き出し
//!
//! 学習は行わない。初期化済み（未学習）のモデルをアーカイブ化して、
//! 開発環境でサーバを起動できるようにするためのもの。

use anyhow::Result;
use std::path::{Path, PathBuf};

use burn::{
    module::Module,
    record::{BinBytesRecorder, FullPrecisionSettings, Recorder},
    tensor::backend::Backend,
};

use crate::ml::{ModelConfig, PubClassifier, CLASS_NAMES, MIN_IMAGE_SIZE, NUM_CLASSES};
use crate::model::{save_model_with_metadata, ModelMetadata};

/// モデルの重みとメタデータをtar.gzに書き出す
pub fn write_model_archive<B: Backend>(
    model: PubClassifier<B>,
    config: &ModelConfig,
    output_path: &Path,
    notes: Option<String>,
) -> Result<PathBuf> {
    if config.num_classes != NUM_CLASSES {
        anyhow::bail!(
            "クラス数が不正です: {} (期待: {})",
            config.num_classes,
            NUM_CLASSES
        );
    }
    if config.image_size < MIN_IMAGE_SIZE {
        anyhow::bail!(
            "入力サイズが小さすぎます: {} (最小{})",
            config.image_size,
            MIN_IMAGE_SIZE
        );
    }

    // CompactRecorderはf16で保存してしまうのでFullPrecisionSettingsを使う
    let recorder = BinBytesRecorder::<FullPrecisionSettings>::default();
    let model_binary = Recorder::<B>::record(&recorder, model.into_record(), ())
        .map_err(|e| anyhow::anyhow!("モデル重みの書き出しエラー: {:?}", e))?;

    let metadata = ModelMetadata::new(
        CLASS_NAMES.iter().map(|s| s.to_string()).collect(),
        config.image_size as u32,
        config.hidden_size as u32,
        config.dropout,
        notes,
    );

    let path = save_model_with_metadata(output_path, &metadata, &model_binary)?;
    log::info!(
        "モデルを保存しました: {} ({} バイト)",
        path.display(),
        model_binary.len()
    );
    Ok(path)
}

/// 初期化しただけのモデルをアーカイブ化する
pub fn init_model_archive<B: Backend>(
    config: &ModelConfig,
    device: &B::Device,
    output_path: &Path,
    notes: Option<String>,
) -> Result<PathBuf> {
    let model = config.init::<B>(device);
    write_model_archive(model, config, output_path, notes)
}

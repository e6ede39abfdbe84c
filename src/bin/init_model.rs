//! 初期化済み（未学習）モデルのアーカイブを作成するツール
//!
//! 使い方: init_model [出力パス] [画像サイズ]

use burn_ndarray::{NdArray, NdArrayDevice};
use pub_detector_lib::ml::{init_model_archive, ModelConfig};
use pub_detector_lib::model::{print_metadata_info, load_metadata};
use std::path::PathBuf;

fn main() -> anyhow::Result<()> {
    pub_detector_lib::setup_logging();

    let args: Vec<String> = std::env::args().collect();
    let output_path = if args.len() > 1 {
        PathBuf::from(&args[1])
    } else {
        PathBuf::from("models/pub_classifier.tar.gz")
    };
    let image_size = match args.get(2) {
        Some(raw) => raw
            .parse::<usize>()
            .map_err(|e| anyhow::anyhow!("画像サイズが不正です: {} ({})", raw, e))?,
        None => 100,
    };

    let config = ModelConfig::new().with_image_size(image_size);
    let path = init_model_archive::<NdArray>(
        &config,
        &NdArrayDevice::Cpu,
        &output_path,
        Some("initialized without training".to_string()),
    )?;

    println!("✓ モデルを作成しました: {}", path.display());
    print_metadata_info(&load_metadata(&path)?);
    Ok(())
}

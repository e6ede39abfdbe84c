//! モデルアーカイブのメタデータを表示するツール
//!
//! 使い方: model_info [モデルパス]

use pub_detector_lib::model::{load_metadata, print_metadata_info, AppConfig, InferenceConfig};
use std::path::PathBuf;

fn main() {
    pub_detector_lib::setup_logging();

    let config = match AppConfig::load_or_default() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("✗ 設定の読み込みエラー: {:#}", e);
            std::process::exit(1);
        }
    };

    // 引数がなければ設定ファイルのモデルパスを使う
    let args: Vec<String> = std::env::args().collect();
    let model_path = if args.len() > 1 {
        PathBuf::from(&args[1])
    } else {
        PathBuf::from(&config.model.model_path)
    };

    match load_metadata(&model_path) {
        Ok(metadata) => {
            println!("✓ モデルメタデータ読み込み成功: {}", model_path.display());
            print_metadata_info(&metadata);

            // サーバと同じ入力サイズで照合する
            let inference_config = InferenceConfig::from_metadata(&metadata);
            if let Err(e) = inference_config.validate(config.model.image_size) {
                eprintln!("✗ このモデルは現在の設定では使えません: {}", e);
                std::process::exit(1);
            }
            println!("✓ 設定と一致しています (入力サイズ {})", config.model.image_size);
        }
        Err(e) => {
            eprintln!("✗ エラー: {:#}", e);
            std::process::exit(1);
        }
    }
}

//! アプリケーション設定管理モジュール
//!
//! 計算デバイス、モデルファイル、サーバ、保存先の設定をJSON形式で保存・読み込みします。
//! 一部の値は環境変数で上書きできます。

use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::pipeline::{PredictError, DEFAULT_IMAGE_SIZE};

/// 設定ファイルのパスを指定する環境変数
pub const CONFIG_PATH_ENV: &str = "PUB_DETECTOR_CONFIG";

/// モデルファイルのパスを上書きする環境変数
pub const MODEL_PATH_ENV: &str = "PUB_DETECTOR_MODEL_PATH";

/// 計算デバイスの種類
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum DeviceType {
    /// WGPU (GPU) バックエンド
    Wgpu,
    /// NdArray (CPU) バックエンド
    #[default]
    Cpu,
}

impl std::fmt::Display for DeviceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeviceType::Wgpu => write!(f, "WGPU (GPU)"),
            DeviceType::Cpu => write!(f, "CPU (NdArray)"),
        }
    }
}

/// モデル設定
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelSettings {
    /// 使用するモデルファイル（tar.gz）のパス
    pub model_path: String,
    /// モデル入力サイズ（正方形）
    pub image_size: usize,
}

impl Default for ModelSettings {
    fn default() -> Self {
        Self {
            model_path: "models/pub_classifier.tar.gz".to_string(),
            image_size: DEFAULT_IMAGE_SIZE,
        }
    }
}

/// HTTPサーバ設定
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    /// ワーカー数（未指定ならCPUコア数）
    pub workers: Option<usize>,
    /// アップロードの最大サイズ（バイト）
    pub max_upload_bytes: usize,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8000,
            workers: None,
            max_upload_bytes: 10 * 1024 * 1024,
        }
    }
}

/// 保存先設定
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
    /// アップロード画像の保存ディレクトリ
    pub image_dir: String,
    /// 予測・画像レコード（CSV）の保存ディレクトリ
    pub data_dir: String,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            image_dir: "image".to_string(),
            data_dir: "data".to_string(),
        }
    }
}

/// アプリケーション設定
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// 計算デバイスの種類
    pub device_type: DeviceType,
    /// モデル設定
    pub model: ModelSettings,
    /// サーバ設定
    pub server: ServerSettings,
    /// 保存先設定
    pub storage: StorageSettings,
}

impl AppConfig {
    /// 設定ファイルのデフォルトパス
    pub fn default_path() -> PathBuf {
        std::env::var_os(CONFIG_PATH_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("config.json"))
    }

    /// 設定を読み込む
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("設定ファイルを読み込めません: {}", path.display()))?;
        let config: AppConfig = serde_json::from_str(&content)
            .with_context(|| format!("設定ファイルの形式が不正です: {}", path.display()))?;
        Ok(config)
    }

    /// デフォルトパスから設定を読み込み、環境変数の上書きを適用する
    ///
    /// ファイルが存在しない場合はデフォルト設定。存在するのに読めない場合はエラー。
    pub fn load_or_default() -> anyhow::Result<Self> {
        let path = Self::default_path();
        let mut config = if path.exists() {
            let config = Self::load(&path)?;
            log::info!("設定ファイルを読み込みました: {}", path.display());
            config
        } else {
            log::info!(
                "設定ファイルが存在しません ({})。デフォルト設定を使用します",
                path.display()
            );
            Self::default()
        };
        config.apply_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// 環境変数などからの上書きを適用
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(model_path) = lookup(MODEL_PATH_ENV).filter(|p| !p.trim().is_empty()) {
            log::info!("{} によりモデルパスを上書き: {}", MODEL_PATH_ENV, model_path);
            self.model.model_path = model_path;
        }
    }

    /// 設定を保存する
    pub fn save<P: AsRef<Path>>(&self, path: P) -> anyhow::Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    /// モデルファイルのパスを確認して返す
    ///
    /// 未設定・存在しない場合は暗黙の代替を使わずエラーにする。
    pub fn model_path(&self) -> Result<PathBuf, PredictError> {
        let raw = self.model.model_path.trim();
        if raw.is_empty() {
            return Err(PredictError::Config(format!(
                "model_path が設定されていません（config.json または {}）",
                MODEL_PATH_ENV
            )));
        }

        let path = PathBuf::from(raw);
        if !path.is_file() {
            return Err(PredictError::Config(format!(
                "モデルファイルが見つかりません: {}",
                path.display()
            )));
        }
        Ok(path)
    }

    /// 設定情報をログに出力
    pub fn display(&self) {
        log::info!("=== アプリケーション設定 ===");
        log::info!("計算デバイス: {}", self.device_type);
        log::info!("モデルパス: {}", self.model.model_path);
        log::info!(
            "モデル入力サイズ: {}x{}",
            self.model.image_size,
            self.model.image_size
        );
        log::info!("待ち受け: {}:{}", self.server.host, self.server.port);
        log::info!("画像保存先: {}", self.storage.image_dir);
        log::info!("レコード保存先: {}", self.storage.data_dir);
    }
}

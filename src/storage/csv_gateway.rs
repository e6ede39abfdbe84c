//! CSVファイルへの追記によるゲートウェイ
//!
//! `predictions.csv` と `images.csv` にレコードを1行ずつ追記します。
//! IDは起動時に既存行数から再開します。

use anyhow::Context;
use chrono::{DateTime, Utc};
use csv::{ReaderBuilder, WriterBuilder};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::pipeline::{Label, PredictError, Result};
use crate::storage::gateway::{ImageRecord, PersistenceGateway, PredictionRecord, RecordId};

const PREDICTIONS_FILE: &str = "predictions.csv";
const IMAGES_FILE: &str = "images.csv";

#[derive(Debug)]
struct Counters {
    next_prediction_id: RecordId,
    next_image_id: RecordId,
}

/// CSVゲートウェイ
#[derive(Debug)]
pub struct CsvGateway {
    predictions_path: PathBuf,
    images_path: PathBuf,
    counters: Mutex<Counters>,
}

impl CsvGateway {
    /// 保存ディレクトリを開く（なければ作成）
    pub fn open<P: AsRef<Path>>(data_dir: P) -> anyhow::Result<Self> {
        let data_dir = data_dir.as_ref();
        std::fs::create_dir_all(data_dir)
            .with_context(|| format!("保存ディレクトリを作成できません: {}", data_dir.display()))?;

        let predictions_path = data_dir.join(PREDICTIONS_FILE);
        let images_path = data_dir.join(IMAGES_FILE);

        let counters = Counters {
            next_prediction_id: count_records(&predictions_path)? + 1,
            next_image_id: count_records(&images_path)? + 1,
        };
        log::info!(
            "レコード保存先: {} (予測 {} 件, 画像 {} 件)",
            data_dir.display(),
            counters.next_prediction_id - 1,
            counters.next_image_id - 1
        );

        Ok(Self {
            predictions_path,
            images_path,
            counters: Mutex::new(counters),
        })
    }

    /// 保存済みの予測レコードを読み込む
    pub fn predictions(&self) -> anyhow::Result<Vec<PredictionRecord>> {
        read_records(&self.predictions_path)
    }

    /// 保存済みの画像レコードを読み込む
    pub fn images(&self) -> anyhow::Result<Vec<ImageRecord>> {
        read_records(&self.images_path)
    }
}

fn count_records(path: &Path) -> anyhow::Result<RecordId> {
    if !path.exists() {
        return Ok(0);
    }
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .from_path(path)
        .with_context(|| format!("CSVを開けません: {}", path.display()))?;

    let mut count = 0;
    for record in reader.records() {
        record.with_context(|| format!("CSVの読み込みエラー: {}", path.display()))?;
        count += 1;
    }
    Ok(count)
}

fn read_records<T: DeserializeOwned>(path: &Path) -> anyhow::Result<Vec<T>> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let mut reader = ReaderBuilder::new().has_headers(true).from_path(path)?;
    let mut records = Vec::new();
    for record in reader.deserialize() {
        records.push(record?);
    }
    Ok(records)
}

/// 1レコードを追記（新規ファイルならヘッダも書く）
fn append_record<T: Serialize>(path: &Path, record: &T) -> Result<()> {
    let is_new = std::fs::metadata(path).map(|m| m.len() == 0).unwrap_or(true);

    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| PredictError::Storage(format!("{}: {}", path.display(), e)))?;

    let mut writer = WriterBuilder::new().has_headers(is_new).from_writer(file);
    writer
        .serialize(record)
        .map_err(|e| PredictError::Storage(format!("CSV書き込みエラー: {}", e)))?;
    writer
        .flush()
        .map_err(|e| PredictError::Storage(format!("CSVフラッシュエラー: {}", e)))?;
    Ok(())
}

fn poisoned() -> PredictError {
    PredictError::Storage("レコードのロックが破損しています".to_string())
}

impl PersistenceGateway for CsvGateway {
    fn store_prediction(
        &self,
        label: Label,
        confidence: f64,
        image_path: &str,
        user_id: i64,
    ) -> Result<RecordId> {
        // IDの採番と追記を同じロック内で行い、行の順序とIDを一致させる
        let mut counters = self.counters.lock().map_err(|_| poisoned())?;
        let id = counters.next_prediction_id;

        let record = PredictionRecord {
            id,
            label,
            confidence,
            image_path: image_path.to_string(),
            user_id,
            timestamp: Utc::now().to_rfc3339(),
        };
        append_record(&self.predictions_path, &record)?;

        counters.next_prediction_id += 1;
        log::debug!("予測レコードを保存: id={} label={}", id, label);
        Ok(id)
    }

    fn store_image(
        &self,
        filename: &str,
        filepath: &str,
        uploaded_at: DateTime<Utc>,
        label_index: u8,
    ) -> Result<RecordId> {
        let mut counters = self.counters.lock().map_err(|_| poisoned())?;
        let id = counters.next_image_id;

        let record = ImageRecord {
            id,
            filename: filename.to_string(),
            filepath: filepath.to_string(),
            uploaded_at: uploaded_at.to_rfc3339(),
            label_index,
        };
        append_record(&self.images_path, &record)?;

        counters.next_image_id += 1;
        log::debug!("画像レコードを保存: id={} file={}", id, filename);
        Ok(id)
    }
}

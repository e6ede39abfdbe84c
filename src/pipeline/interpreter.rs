//! 推論結果の解釈

use serde::{Deserialize, Serialize};

use super::error::{PredictError, Result};

/// 分類ラベル
///
/// 並び順はモデル出力のクラス順 `[nopub, pub]` と一致する。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Label {
    Nopub,
    Pub,
}

impl Label {
    /// モデル出力でのクラス順
    pub const CLASS_ORDER: [Label; 2] = [Label::Nopub, Label::Pub];

    /// クラスインデックス（nopub = 0, pub = 1）
    pub fn index(self) -> usize {
        match self {
            Label::Nopub => 0,
            Label::Pub => 1,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Label::Nopub => "nopub",
            Label::Pub => "pub",
        }
    }
}

impl std::fmt::Display for Label {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// クラスごとのスコア `[nopub, pub]`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoreVector([f32; 2]);

impl ScoreVector {
    pub fn new(score_nopub: f32, score_pub: f32) -> Self {
        Self([score_nopub, score_pub])
    }

    pub fn nopub(&self) -> f32 {
        self.0[0]
    }

    pub fn pub_score(&self) -> f32 {
        self.0[1]
    }

    pub fn as_array(&self) -> [f32; 2] {
        self.0
    }
}

impl TryFrom<Vec<f32>> for ScoreVector {
    type Error = PredictError;

    fn try_from(scores: Vec<f32>) -> Result<Self> {
        match scores.as_slice() {
            [nopub, pub_score] => Ok(Self::new(*nopub, *pub_score)),
            _ => Err(PredictError::Inference(format!(
                "スコア数が不正です: {} (期待: 2)",
                scores.len()
            ))),
        }
    }
}

/// 最終的な予測結果
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PredictionResult {
    pub label: Label,
    /// 百分率、小数点以下2桁に丸め済み
    pub confidence: f64,
}

/// スコアからラベルと信頼度を決める
///
/// `pub` のスコアが厳密に大きい場合のみ `pub`、同点は `nopub`。
pub fn interpret(scores: ScoreVector) -> PredictionResult {
    let score_nopub = scores.nopub() as f64;
    let score_pub = scores.pub_score() as f64;

    let label = if score_pub > score_nopub {
        Label::Pub
    } else {
        Label::Nopub
    };
    let confidence = round2(score_pub.max(score_nopub) * 100.0);

    PredictionResult { label, confidence }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

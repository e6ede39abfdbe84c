//! 推論パイプラインのエラー定義

use thiserror::Error;

/// パイプライン各段のエラー
///
/// どの段も失敗時は即座にこの型で返す。ラベルや信頼度を捏造して返すことはない。
#[derive(Error, Debug)]
pub enum PredictError {
    /// 画像バイト列が壊れている・読めない
    #[error("画像のデコードに失敗しました: {0}")]
    Decode(String),

    /// 形状・チャンネル数が不正
    #[error("画像の前処理に失敗しました: {0}")]
    Preprocess(String),

    /// モデルの読み込み完了前に推論が呼ばれた（起動順序のバグ）
    #[error("モデルが利用できません: {0}")]
    ModelUnavailable(String),

    /// 推論処理そのものの失敗
    #[error("推論エラー: {0}")]
    Inference(String),

    /// 設定値が不正、またはモデルファイルが見つからない
    #[error("設定エラー: {0}")]
    Config(String),

    /// 記録の保存に失敗
    #[error("保存エラー: {0}")]
    Storage(String),
}

impl PredictError {
    /// クライアント側の入力が原因かどうか
    pub fn is_client_error(&self) -> bool {
        matches!(self, PredictError::Decode(_) | PredictError::Preprocess(_))
    }
}

pub type Result<T> = std::result::Result<T, PredictError>;

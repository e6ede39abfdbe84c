//! 前処理（リサイズ・正規化）

use image::imageops::FilterType;

use super::decoder::ImageBuffer;
use super::error::{PredictError, Result};

/// モデル入力の既定サイズ（正方形）
pub const DEFAULT_IMAGE_SIZE: usize = 100;

/// リサイズに使うフィルタ
///
/// 信頼度はリサイズ方式に敏感なので、常に同じバイリニア補間を使う。
pub const RESIZE_FILTER: FilterType = FilterType::Triangle;

/// 正規化済みのモデル入力
///
/// 形状は `[1, size, size, 3]`（NHWC）、値は [0, 1]。
#[derive(Debug, Clone, PartialEq)]
pub struct InputTensor {
    size: usize,
    data: Vec<f32>,
}

impl InputTensor {
    /// `[batch, height, width, channels]`
    pub fn shape(&self) -> [usize; 4] {
        [1, self.size, self.size, 3]
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// NHWC順に平坦化された値
    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }
}

/// 画像を `size x size` にリサイズし、[0, 1] に正規化する
pub fn preprocess(image: ImageBuffer, size: usize) -> Result<InputTensor> {
    if size == 0 {
        return Err(PredictError::Preprocess(
            "出力サイズが0です".to_string(),
        ));
    }
    if image.is_empty() {
        return Err(PredictError::Preprocess(format!(
            "画像の面積が0です: {}x{}",
            image.width(),
            image.height()
        )));
    }
    // グレースケールやアルファ付きを暗黙に変形せず拒否する
    if image.channels() != 3 {
        return Err(PredictError::Preprocess(format!(
            "チャンネル数が不正です: {} (期待: 3)",
            image.channels()
        )));
    }

    let (width, height) = (image.width(), image.height());
    let rgb = image::RgbImage::from_raw(width, height, image.into_raw()).ok_or_else(|| {
        PredictError::Preprocess(format!("ピクセル数が一致しません: {}x{}", width, height))
    })?;

    let resized = image::imageops::resize(&rgb, size as u32, size as u32, RESIZE_FILTER);

    let data: Vec<f32> = resized
        .into_raw()
        .into_iter()
        .map(|v| v as f32 / 255.0)
        .collect();

    Ok(InputTensor { size, data })
}

//! 画像デコード
//!
//! アップロードされたバイト列、またはbase64文字列（data URIヘッダ付きも可）を
//! RGBのピクセルグリッドに変換します。

use base64::{engine::general_purpose, Engine as _};

use super::error::{PredictError, Result};

/// デコード済みの画像（高さ × 幅 × チャンネル、各8bit）
///
/// デコード後は変更されない。前処理に渡された時点で消費される。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageBuffer {
    width: u32,
    height: u32,
    channels: u8,
    pixels: Vec<u8>,
}

impl ImageBuffer {
    /// 生のピクセル列から作成（行優先、チャンネルはインターリーブ）
    ///
    /// ピクセル数が `width * height * channels` と一致しない場合は `None`。
    pub fn from_raw(width: u32, height: u32, channels: u8, pixels: Vec<u8>) -> Option<Self> {
        let expected = width as usize * height as usize * channels as usize;
        if pixels.len() != expected {
            return None;
        }
        Some(Self {
            width,
            height,
            channels,
            pixels,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn channels(&self) -> u8 {
        self.channels
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    pub(crate) fn into_raw(self) -> Vec<u8> {
        self.pixels
    }
}

impl From<image::RgbImage> for ImageBuffer {
    fn from(img: image::RgbImage) -> Self {
        let (width, height) = img.dimensions();
        Self {
            width,
            height,
            channels: 3,
            pixels: img.into_raw(),
        }
    }
}

/// バイト列をデコード
///
/// PNG / JPEG など `image` クレートが扱える形式に対応。
/// グレースケールやアルファ付き画像はRGBに変換される。
pub fn decode_bytes(bytes: &[u8]) -> Result<ImageBuffer> {
    if bytes.is_empty() {
        return Err(PredictError::Decode("画像データが空です".to_string()));
    }

    let img = image::load_from_memory(bytes)
        .map_err(|e| PredictError::Decode(e.to_string()))?
        .to_rgb8();

    // デコーダがエラーを返さずに空の画像を返すケースを明示的に弾く
    if img.width() == 0 || img.height() == 0 {
        return Err(PredictError::Decode(format!(
            "デコード結果が空の画像です: {}x{}",
            img.width(),
            img.height()
        )));
    }

    Ok(ImageBuffer::from(img))
}

/// base64文字列をデコード
pub fn decode_base64(encoded: &str) -> Result<ImageBuffer> {
    let payload = strip_data_uri(encoded.trim());
    log::debug!(
        "base64画像を受信 (先頭): {}",
        payload.chars().take(100).collect::<String>()
    );

    // 改行などで折り返された base64 も受け付ける
    let compact: String = payload
        .chars()
        .filter(|c| !c.is_ascii_whitespace())
        .collect();
    let bytes = general_purpose::STANDARD
        .decode(compact)
        .map_err(|e| PredictError::Decode(format!("base64の解析に失敗: {}", e)))?;

    decode_bytes(&bytes)
}

/// 先頭の `data:image/<subtype>;base64,` を取り除く
///
/// subtypeは1文字以上の英字。パターンに一致しなければそのまま返す。
pub fn strip_data_uri(input: &str) -> &str {
    const PREFIX: &str = "data:image/";
    const MARKER: &str = ";base64,";

    let Some(rest) = input.strip_prefix(PREFIX) else {
        return input;
    };
    let Some(end) = rest.find(MARKER) else {
        return input;
    };

    let subtype = &rest[..end];
    if subtype.is_empty() || !subtype.chars().all(|c| c.is_ascii_alphabetic()) {
        return input;
    }

    &rest[end + MARKER.len()..]
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use image::ImageEncoder;

    /// テスト用にPNGをメモリ上でエンコード
    pub(crate) fn encode_png(width: u32, height: u32) -> Vec<u8> {
        let img = image::RgbImage::from_fn(width, height, |x, y| {
            image::Rgb([(x * 7 % 256) as u8, (y * 13 % 256) as u8, 128])
        });
        let mut png_data = Vec::new();
        let encoder = image::codecs::png::PngEncoder::new(&mut png_data);
        encoder
            .write_image(img.as_raw(), width, height, image::ExtendedColorType::Rgb8)
            .unwrap();
        png_data
    }

    #[test]
    fn test_png_round_trip_keeps_dimensions() {
        for (w, h) in [(1, 1), (3, 5), (64, 17)] {
            let decoded = decode_bytes(&encode_png(w, h)).unwrap();
            assert_eq!(decoded.width(), w);
            assert_eq!(decoded.height(), h);
            assert_eq!(decoded.channels(), 3);
            assert_eq!(decoded.pixels().len(), (w * h * 3) as usize);
        }
    }

    #[test]
    fn test_png_round_trip_is_lossless() {
        let img = image::RgbImage::from_pixel(2, 2, image::Rgb([10, 200, 30]));
        let mut png_data = Vec::new();
        image::codecs::png::PngEncoder::new(&mut png_data)
            .write_image(img.as_raw(), 2, 2, image::ExtendedColorType::Rgb8)
            .unwrap();

        let decoded = decode_bytes(&png_data).unwrap();
        assert_eq!(decoded.pixels(), img.as_raw().as_slice());
    }

    #[test]
    fn test_grayscale_is_converted_to_rgb() {
        let gray = image::GrayImage::from_pixel(4, 4, image::Luma([90]));
        let mut png_data = Vec::new();
        image::codecs::png::PngEncoder::new(&mut png_data)
            .write_image(gray.as_raw(), 4, 4, image::ExtendedColorType::L8)
            .unwrap();

        let decoded = decode_bytes(&png_data).unwrap();
        assert_eq!(decoded.channels(), 3);
        assert_eq!(&decoded.pixels()[..3], &[90, 90, 90]);
    }

    #[test]
    fn test_empty_bytes_is_decode_error() {
        assert!(matches!(decode_bytes(&[]), Err(PredictError::Decode(_))));
    }

    #[test]
    fn test_garbage_bytes_is_decode_error() {
        let err = decode_bytes(b"definitely not an image").unwrap_err();
        assert!(matches!(err, PredictError::Decode(_)));
    }

    #[test]
    fn test_strip_data_uri() {
        assert_eq!(strip_data_uri("data:image/png;base64,iVBOR"), "iVBOR");
        assert_eq!(strip_data_uri("data:image/jpeg;base64,/9j/"), "/9j/");
        assert_eq!(strip_data_uri("iVBOR"), "iVBOR");
        // subtypeが英字以外を含む場合は取り除かない
        assert_eq!(
            strip_data_uri("data:image/svg+xml;base64,PHN2"),
            "data:image/svg+xml;base64,PHN2"
        );
        assert_eq!(strip_data_uri("data:image/;base64,AA"), "data:image/;base64,AA");
    }

    #[test]
    fn test_decode_base64_with_data_uri() {
        let encoded = general_purpose::STANDARD.encode(encode_png(1, 1));
        let decoded = decode_base64(&format!("data:image/png;base64,{}", encoded)).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (1, 1));
    }

    #[test]
    fn test_decode_base64_without_prefix() {
        let encoded = general_purpose::STANDARD.encode(encode_png(2, 3));
        let decoded = decode_base64(&encoded).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (2, 3));
    }

    #[test]
    fn test_decode_base64_wrapped_lines() {
        let encoded = general_purpose::STANDARD.encode(encode_png(4, 2));
        let wrapped = encoded
            .as_bytes()
            .chunks(16)
            .map(|line| std::str::from_utf8(line).unwrap())
            .collect::<Vec<_>>()
            .join("\r\n");
        assert!(wrapped.contains('\n'));

        let decoded = decode_base64(&format!("data:image/png;base64,{}\n", wrapped)).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (4, 2));
    }

    #[test]
    fn test_malformed_base64_is_decode_error() {
        let err = decode_base64("data:image/png;base64,@@@not-base64@@@").unwrap_err();
        assert!(matches!(err, PredictError::Decode(_)));
    }

    #[test]
    fn test_from_raw_rejects_length_mismatch() {
        assert!(ImageBuffer::from_raw(2, 2, 3, vec![0; 11]).is_none());
        assert!(ImageBuffer::from_raw(2, 2, 1, vec![0; 4]).is_some());
    }
}

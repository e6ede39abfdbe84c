//! 機械学習モデルの共通定義
//!
//! 広告画像（pub / nopub）分類用のCNNモデルと関連する設定を提供します。

use burn::{
    config::Config,
    module::Module,
    nn::{
        conv::{Conv2d, Conv2dConfig},
        pool::{AdaptiveAvgPool2d, AdaptiveAvgPool2dConfig, MaxPool2d, MaxPool2dConfig},
        Dropout, DropoutConfig, Linear, LinearConfig, Relu,
    },
    tensor::{activation::softmax, backend::Backend, Tensor},
};

/// クラス数
pub const NUM_CLASSES: usize = 2;

/// クラス名の定義（モデル出力の順）
pub const CLASS_NAMES: [&str; NUM_CLASSES] = ["nopub", "pub"];

/// 受け付ける最小の入力サイズ
///
/// 最終畳み込み後の特徴マップがプーリング出力 (4x4) 以上残る大きさ。
pub const MIN_IMAGE_SIZE: usize = 30;

/// 全結合層に渡す前の空間サイズ（適応平均プーリングの出力）
const POOLED_SIZE: usize = 4;

/// 最終畳み込み層のチャネル数
const FEATURE_CHANNELS: usize = 128;

/// モデル設定
#[derive(Config, Debug)]
pub struct ModelConfig {
    /// 分類クラス数
    #[config(default = 2)]
    pub num_classes: usize,
    /// 隠れ層の次元
    #[config(default = 256)]
    pub hidden_size: usize,
    /// ドロップアウト率
    #[config(default = 0.5)]
    pub dropout: f64,
    /// 入力画像サイズ（正方形）
    #[config(default = 100)]
    pub image_size: usize,
}

impl ModelConfig {
    /// モデルを初期化
    pub fn init<B: Backend>(&self, device: &B::Device) -> PubClassifier<B> {
        let d = FEATURE_CHANNELS * POOLED_SIZE * POOLED_SIZE;

        log::debug!(
            "[Model] 入力: {}x{}, 特徴次元: {}, FC: {} -> {} -> {}",
            self.image_size,
            self.image_size,
            d,
            d,
            self.hidden_size,
            self.num_classes
        );

        PubClassifier {
            conv1: Conv2dConfig::new([3, 32], [3, 3])
                .with_stride([1, 1])
                .init(device),
            pool1: MaxPool2dConfig::new([2, 2])
                .with_strides([2, 2])
                .init(),

            conv2: Conv2dConfig::new([32, 64], [3, 3])
                .with_stride([1, 1])
                .init(device),
            pool2: MaxPool2dConfig::new([2, 2])
                .with_strides([2, 2])
                .init(),

            conv3: Conv2dConfig::new([64, FEATURE_CHANNELS], [3, 3])
                .with_stride([1, 1])
                .init(device),
            // 入力サイズに関わらず全結合層の次元を固定する
            pool3: AdaptiveAvgPool2dConfig::new([POOLED_SIZE, POOLED_SIZE]).init(),

            dropout: DropoutConfig::new(self.dropout).init(),
            fc1: LinearConfig::new(d, self.hidden_size).init(device),
            fc2: LinearConfig::new(self.hidden_size, self.num_classes).init(device),

            activation: Relu::new(),
        }
    }
}

/// 広告画像分類用CNNモデル
///
/// # アーキテクチャ
/// - {Conv 3x3 (no padding) + ReLU + MaxPool 2x2} x 2層
/// - Conv 3x3 + ReLU
/// - AdaptiveAvgPool -> 128 x 4 x 4
/// - Flatten + Dropout
/// - FC: 2048 -> hidden + ReLU
/// - FC: hidden -> num_classes
/// - Softmax (分類時)
///
/// ドロップアウトは自動微分バックエンド以外では恒等写像なので、推論は決定的。
#[derive(Module, Debug)]
pub struct PubClassifier<B: Backend> {
    conv1: Conv2d<B>, // 3 -> 32
    pool1: MaxPool2d,
    conv2: Conv2d<B>, // 32 -> 64
    pool2: MaxPool2d,
    conv3: Conv2d<B>, // 64 -> 128
    pool3: AdaptiveAvgPool2d,

    dropout: Dropout,
    fc1: Linear<B>,
    fc2: Linear<B>,

    activation: Relu,
}

impl<B: Backend> PubClassifier<B> {
    /// 順伝播
    ///
    /// # 引数
    /// - `images`: バッチ画像 [batch_size, 3, size, size]
    ///
    /// # 戻り値
    /// - クラスごとのロジット [batch_size, num_classes]
    pub fn forward(&self, images: Tensor<B, 4>) -> Tensor<B, 2> {
        let [batch_size, _, _, _] = images.dims();

        let x = self.conv1.forward(images);
        let x = self.activation.forward(x);
        let x = self.pool1.forward(x);

        let x = self.conv2.forward(x);
        let x = self.activation.forward(x);
        let x = self.pool2.forward(x);

        let x = self.conv3.forward(x);
        let x = self.activation.forward(x);
        let x = self.pool3.forward(x);

        // Flatten
        let [_, c, h, w] = x.dims();
        let x = x.reshape([batch_size, c * h * w]);
        let x = self.dropout.forward(x);

        let x = self.fc1.forward(x);
        let x = self.activation.forward(x);

        self.fc2.forward(x)
    }

    /// クラスごとの確率 [batch_size, num_classes]
    pub fn predict_proba(&self, images: Tensor<B, 4>) -> Tensor<B, 2> {
        softmax(self.forward(images), 1)
    }
}

//! フォールバック分類器
//!
//! 照合エンジンが候補を返せなかったときに使う外部分類器の境界。
//! 分類器の実装（外部APIなど）はこのクレートの外に置く。

use image::RgbImage;
use sku_matcher_common::Prediction;

pub use sku_matcher_common::{sanitize_fallback_predictions, NO_MATCH_LABEL};

pub trait FallbackClassifier: Send + Sync {
    /// 画像を `labels` のいずれか（または `NO_MATCH_LABEL`）に分類する
    ///
    /// 戻り値はそのまま使わず、`sanitize_fallback_predictions` で整形される。
    fn classify(&self, image: &RgbImage, labels: &[String]) -> Vec<Prediction>;
}

impl<F> FallbackClassifier for F
where
    F: Fn(&RgbImage, &[String]) -> Vec<Prediction> + Send + Sync,
{
    fn classify(&self, image: &RgbImage, labels: &[String]) -> Vec<Prediction> {
        self(image, labels)
    }
}

//! 特徴抽出モジュール
//!
//! - `orb`: キーポイント記述子（構造の手がかり）
//! - `hue`: 色相ヒストグラム（色の手がかり）
//! - `matching`: 記述子・ヒストグラムの類似度

pub mod hue;
pub mod matching;
pub mod orb;

pub use hue::HueExtractor;
pub use orb::{Descriptor, OrbExtractor, DESCRIPTOR_BYTES};

use crate::config::MatcherSettings;
use crate::preprocess;
use image::RgbImage;

/// 画像1枚分の記述子集合
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DescriptorSet(Vec<Descriptor>);

impl DescriptorSet {
    pub fn new(descriptors: Vec<Descriptor>) -> Self {
        Self(descriptors)
    }

    pub fn as_slice(&self) -> &[Descriptor] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// L1 正規化済みの色相ヒストグラム
#[derive(Debug, Clone, PartialEq)]
pub struct HueHistogram(Vec<f32>);

impl HueHistogram {
    pub fn from_bins(bins: Vec<f32>) -> Self {
        Self(bins)
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// 1 - Bhattacharyya距離（0.0-1.0）
    pub fn similarity(&self, other: &HueHistogram) -> f64 {
        matching::hue_similarity(&self.0, &other.0)
    }
}

/// 画像1枚から抽出した特徴
#[derive(Debug, Clone, Default)]
pub struct ImageFeatures {
    pub descriptors: DescriptorSet,
    /// マスクで全画素が除外された場合は `None`
    pub hue: Option<HueHistogram>,
}

/// 設定に従って両方の特徴を抽出する
#[derive(Debug, Clone)]
pub struct FeatureExtractor {
    orb: OrbExtractor,
    hue: HueExtractor,
}

impl FeatureExtractor {
    pub fn from_settings(settings: &MatcherSettings) -> Self {
        Self {
            orb: OrbExtractor::new(settings.orb_nfeatures),
            hue: HueExtractor::new(
                settings.hue_hist_bins,
                settings.hue_sat_min,
                settings.hue_val_min,
            ),
        }
    }

    /// 前処理済みの画像から特徴を抽出
    pub fn extract(&self, prepared: &RgbImage) -> ImageFeatures {
        let gray = preprocess::to_gray(prepared);
        let descriptors = self.orb.detect_and_compute(&gray);

        ImageFeatures {
            descriptors: DescriptorSet::new(descriptors),
            hue: self.hue.extract(prepared),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn test_blank_image_has_no_features() {
        let extractor = FeatureExtractor::from_settings(&MatcherSettings::default());
        let img = RgbImage::from_pixel(120, 120, Rgb([255, 255, 255]));
        let features = extractor.extract(&img);
        assert!(features.descriptors.is_empty());
        assert!(features.hue.is_none());
    }

    #[test]
    fn test_colored_image_has_histogram_with_configured_bins() {
        let settings = MatcherSettings { hue_hist_bins: 24, ..Default::default() };
        let extractor = FeatureExtractor::from_settings(&settings);
        let img = RgbImage::from_pixel(64, 64, Rgb([200, 40, 40]));
        let hist = extractor.extract(&img).hue.unwrap();
        assert_eq!(hist.len(), 24);
        assert!((hist.similarity(&hist) - 1.0).abs() < 1e-6);
    }
}

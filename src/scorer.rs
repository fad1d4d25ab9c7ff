//! 類似度スコアリング
//!
//! クエリの特徴を参照インデックスの各SKUと比較し、
//! キーポイント信頼度と色相信頼度を合成した候補を返す。

use crate::config::MatcherSettings;
use crate::features::{matching, ImageFeatures};
use crate::index::{GalleryEntry, ReferenceIndex};
use rayon::prelude::*;
use tracing::debug;

/// SKU 1件分のスコア
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredCandidate {
    pub sku: String,
    pub label: String,
    /// max(keypoint, hue_scale × hue)
    pub confidence: f64,
    pub keypoint_confidence: f64,
    pub hue_confidence: f64,
}

/// 参照画像ごとのキーポイント信頼度の最大値
pub fn keypoint_score(query: &ImageFeatures, entry: &GalleryEntry, ratio: f32) -> f64 {
    let q = query.descriptors.as_slice();
    if q.is_empty() {
        return 0.0;
    }

    entry
        .descriptor_sets
        .iter()
        .map(|set| matching::keypoint_confidence(q, set.as_slice(), ratio))
        .fold(0.0, f64::max)
}

/// 参照画像ごとの色相類似度の最大値（クエリにヒストグラムがなければ0）
pub fn hue_score(query: &ImageFeatures, entry: &GalleryEntry) -> f64 {
    let Some(q) = query.hue.as_ref() else {
        return 0.0;
    };

    entry
        .hue_histograms
        .iter()
        .map(|hist| q.similarity(hist))
        .fold(0.0, f64::max)
}

pub fn score_entry(
    query: &ImageFeatures,
    entry: &GalleryEntry,
    settings: &MatcherSettings,
) -> ScoredCandidate {
    let keypoint = keypoint_score(query, entry, settings.orb_ratio_test);
    let hue = hue_score(query, entry);
    let confidence = keypoint.max(settings.hue_scale * hue).clamp(0.0, 1.0);

    ScoredCandidate {
        sku: entry.sku.clone(),
        label: entry.label.clone(),
        confidence,
        keypoint_confidence: keypoint,
        hue_confidence: hue,
    }
}

/// 全SKUを並列にスコアリング（信頼度0の候補は除外、インデックス順）
pub fn score_all(
    query: &ImageFeatures,
    index: &ReferenceIndex,
    settings: &MatcherSettings,
) -> Vec<ScoredCandidate> {
    let candidates: Vec<ScoredCandidate> = index
        .entries()
        .par_iter()
        .map(|entry| score_entry(query, entry, settings))
        .filter(|c| c.confidence > 0.0)
        .collect();

    for c in &candidates {
        debug!(
            "候補 {} ({}): {:.3} [kp {:.3}, hue {:.3}]",
            c.sku, c.label, c.confidence, c.keypoint_confidence, c.hue_confidence
        );
    }

    candidates
}

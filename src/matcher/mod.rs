//! 商品照合エンジン
//!
//! カタログ・参照インデックス・設定をまとめて保持し、
//! クエリ画像から予測を返す。構築後は不変なのでスレッド間で共有できる。

mod cache;

pub use cache::MatcherCache;

use crate::config::MatcherSettings;
use crate::decision::{self, Decision};
use crate::error::Result;
use crate::fallback::{sanitize_fallback_predictions, FallbackClassifier};
use crate::features::FeatureExtractor;
use crate::index::{BuildProgress, BuildReport, ReferenceIndex};
use crate::preprocess;
use crate::scorer;
use image::RgbImage;
use sku_matcher_common::{canonicalize_label, Catalog, Prediction};
use std::sync::Arc;
use tracing::{debug, info, warn};

#[derive(Debug, Clone)]
pub struct ProductMatcher {
    settings: Arc<MatcherSettings>,
    catalog: Arc<Catalog>,
    index: Arc<ReferenceIndex>,
    extractor: FeatureExtractor,
}

impl ProductMatcher {
    pub fn new(settings: MatcherSettings, catalog: Catalog, index: ReferenceIndex) -> Self {
        let extractor = FeatureExtractor::from_settings(&settings);
        Self {
            settings: Arc::new(settings),
            catalog: Arc::new(catalog),
            index: Arc::new(index),
            extractor,
        }
    }

    /// カタログを読み込み、参照インデックスを構築する
    pub fn build(settings: MatcherSettings) -> Result<(Self, BuildReport)> {
        Self::build_with_progress(settings, |_| {})
    }

    pub fn build_with_progress<F>(settings: MatcherSettings, on_progress: F) -> Result<(Self, BuildReport)>
    where
        F: Fn(BuildProgress) + Sync,
    {
        let (catalog, catalog_issue) = load_catalog(&settings);
        let (index, mut report) = ReferenceIndex::build_with_progress(&settings, &catalog, on_progress)?;
        report.catalog_issue = catalog_issue;

        info!("照合エンジン準備完了: {} SKU", index.len());
        Ok((Self::new(settings, catalog, index), report))
    }

    pub fn settings(&self) -> &MatcherSettings {
        &self.settings
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn index(&self) -> &ReferenceIndex {
        &self.index
    }

    /// デコード済みの画像に判定ポリシーまで適用
    pub fn decide_image(&self, image: &RgbImage) -> Decision {
        self.decide_prepared(&preprocess::prepare(image, &self.settings))
    }

    fn decide_prepared(&self, prepared: &RgbImage) -> Decision {
        if self.index.is_empty() {
            return Decision::Rejected(decision::Rejection::NoCandidates);
        }

        let features = self.extractor.extract(prepared);
        debug!(
            "クエリ特徴: 記述子 {}, ヒストグラム {}",
            features.descriptors.len(),
            if features.hue.is_some() { "あり" } else { "なし" }
        );

        let candidates = scorer::score_all(&features, &self.index, &self.settings);
        let decision = decision::decide(candidates, &self.settings);
        if let Decision::Rejected(reason) = &decision {
            debug!("棄却: {}", reason);
        }
        decision
    }

    pub fn decide_bytes(&self, bytes: &[u8]) -> Result<Decision> {
        let image = preprocess::decode_image(bytes)?;
        Ok(self.decide_image(&image))
    }

    pub fn predict_image(&self, image: &RgbImage) -> Vec<Prediction> {
        self.decide_image(image).into_predictions()
    }

    /// クエリ画像のバイト列から予測（該当なしは空）
    ///
    /// デコードできない入力のみ `Err`（`MatcherError::ImageDecode`）。
    pub fn predict_bytes(&self, bytes: &[u8]) -> Result<Vec<Prediction>> {
        Ok(self.decide_bytes(bytes)?.into_predictions())
    }

    /// 照合結果が空ならフォールバック分類器に問い合わせる
    ///
    /// 分類器には照合と同じ前処理済みの画像を渡す。
    pub fn predict_with_fallback(
        &self,
        bytes: &[u8],
        fallback: Option<&dyn FallbackClassifier>,
    ) -> Result<Vec<Prediction>> {
        let image = preprocess::decode_image(bytes)?;
        let prepared = preprocess::prepare(&image, &self.settings);
        let predictions = self.decide_prepared(&prepared).into_predictions();
        if !predictions.is_empty() {
            return Ok(predictions);
        }

        let Some(classifier) = fallback else {
            return Ok(predictions);
        };

        let labels = self.candidate_labels();
        if labels.is_empty() {
            return Ok(predictions);
        }

        let raw = classifier.classify(&prepared, &labels);
        let sanitized = sanitize_fallback_predictions(
            raw,
            self.settings.fallback_min_confidence,
            self.settings.top_k,
        );
        debug!("フォールバック: {} 件", sanitized.len());
        Ok(sanitized)
    }

    /// フォールバック分類器に渡すラベル一覧（カタログ優先、なければインデックスから）
    pub fn candidate_labels(&self) -> Vec<String> {
        let labels = self.catalog.labels();
        if !labels.is_empty() {
            return labels;
        }

        let mut seen = std::collections::HashSet::new();
        self.index
            .entries()
            .iter()
            .map(|e| {
                if self.settings.canonicalize_labels {
                    canonicalize_label(&e.label)
                } else {
                    e.label.clone()
                }
            })
            .filter(|label| seen.insert(label.clone()))
            .collect()
    }
}

/// カタログを読み込む（失敗時は空のカタログとその理由）
fn load_catalog(settings: &MatcherSettings) -> (Catalog, Option<String>) {
    let path = settings.catalog_csv_path.as_path();
    if !path.is_file() {
        warn!("カタログが見つかりません（ラベルはSKUを使用）: {}", path.display());
        return (Catalog::default(), Some(format!("見つかりません: {}", path.display())));
    }

    match Catalog::from_csv(path) {
        Ok(catalog) => {
            info!("カタログ読み込み: {} 件", catalog.len());
            (catalog, None)
        }
        Err(e) => {
            warn!("カタログを読み込めません（ラベルはSKUを使用）: {}", e);
            (Catalog::default(), Some(e.to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::{DescriptorSet, HueHistogram};
    use crate::index::GalleryEntry;
    use image::Rgb;

    fn assert_send_sync<T: Send + Sync>() {}

    fn red_hist(bins: usize) -> HueHistogram {
        let mut v = vec![0.0f32; bins];
        v[0] = 1.0;
        HueHistogram::from_bins(v)
    }

    fn matcher_with(entries: Vec<GalleryEntry>, catalog: Catalog) -> ProductMatcher {
        ProductMatcher::new(
            MatcherSettings::default(),
            catalog,
            ReferenceIndex::from_entries(entries),
        )
    }

    fn red_entry(sku: &str, label: &str) -> GalleryEntry {
        GalleryEntry {
            sku: sku.into(),
            label: label.into(),
            descriptor_sets: vec![DescriptorSet::default()],
            hue_histograms: vec![red_hist(60)],
        }
    }

    #[test]
    fn test_matcher_is_send_sync() {
        assert_send_sync::<ProductMatcher>();
        assert_send_sync::<MatcherCache>();
    }

    #[test]
    fn test_empty_index_predicts_nothing() {
        let matcher = matcher_with(vec![], Catalog::default());
        let img = RgbImage::from_pixel(50, 50, Rgb([200, 0, 0]));
        assert_eq!(
            matcher.decide_image(&img).rejection(),
            Some(decision::Rejection::NoCandidates)
        );
    }

    #[test]
    fn test_hue_only_match() {
        let matcher = matcher_with(vec![red_entry("1", "Red Can")], Catalog::default());
        let img = RgbImage::from_pixel(80, 80, Rgb([220, 0, 0]));
        let predictions = matcher.predict_image(&img);
        assert_eq!(predictions.len(), 1);
        assert_eq!(predictions[0].label, "Red Can");
        assert!((predictions[0].confidence - 0.23).abs() < 1e-6);
    }

    #[test]
    fn test_predict_bytes_rejects_garbage() {
        let matcher = matcher_with(vec![], Catalog::default());
        let err = matcher.predict_bytes(b"garbage").unwrap_err();
        assert!(err.is_client_error());
    }

    #[test]
    fn test_fallback_used_only_when_empty() {
        let catalog = Catalog::from_csv_str("sku,name\n1,Red Can\n2,Blue Can\n").unwrap();
        let matcher = matcher_with(vec![red_entry("1", "Red Can")], catalog);

        let classifier = |_: &RgbImage, labels: &[String]| -> Vec<Prediction> {
            assert_eq!(labels, ["Red Can".to_string(), "Blue Can".to_string()]);
            vec![
                Prediction::new("unknown", 0.99),
                Prediction::new("Blue Can", 0.8),
                Prediction::new("Red Can", 0.1),
            ]
        };

        let mut blue = Vec::new();
        image::DynamicImage::ImageRgb8(RgbImage::from_pixel(40, 40, Rgb([0, 0, 220])))
            .write_to(&mut std::io::Cursor::new(&mut blue), image::ImageFormat::Png)
            .unwrap();
        let predictions = matcher.predict_with_fallback(&blue, Some(&classifier)).unwrap();
        assert_eq!(predictions.len(), 1);
        assert_eq!(predictions[0].label, "Blue Can");

        let mut red = Vec::new();
        image::DynamicImage::ImageRgb8(RgbImage::from_pixel(40, 40, Rgb([220, 0, 0])))
            .write_to(&mut std::io::Cursor::new(&mut red), image::ImageFormat::Png)
            .unwrap();
        let predictions = matcher.predict_with_fallback(&red, Some(&classifier)).unwrap();
        assert_eq!(predictions[0].label, "Red Can");
        assert!((predictions[0].confidence - 0.23).abs() < 1e-6);

        assert!(matcher.predict_with_fallback(&blue, None).unwrap().is_empty());
    }

    #[test]
    fn test_candidate_labels_from_index_when_catalog_empty() {
        let matcher = matcher_with(
            vec![red_entry("1", "Can Dataset"), red_entry("2", "Can Variant 3")],
            Catalog::default(),
        );
        assert_eq!(matcher.candidate_labels(), vec!["Can".to_string()]);
    }
}

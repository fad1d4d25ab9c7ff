//! 参照インデックス
//!
//! 参照画像ルート直下のSKUフォルダごとに、画像ごとの記述子集合と
//! 色相ヒストグラムを保持する。構築後は不変で、`Arc` で共有する。

mod report;
pub mod scan;

pub use report::{BuildReport, RootIssue, SkipReason, SkippedImage, SparseImage};
pub use scan::{scan_reference_root, SkuFolder};

use crate::config::MatcherSettings;
use crate::error::{MatcherError, Result};
use crate::features::{DescriptorSet, FeatureExtractor, HueHistogram};
use crate::preprocess;
use rayon::prelude::*;
use sha2::{Digest, Sha256};
use sku_matcher_common::Catalog;
use std::path::Path;
use tracing::{debug, info, warn};

/// SKU 1件分の参照特徴
#[derive(Debug, Clone, PartialEq)]
pub struct GalleryEntry {
    pub sku: String,
    /// カタログ上の名前（未登録ならSKU）
    pub label: String,
    /// 参照画像ごとの記述子集合（記述子が少ない画像は含まない）
    pub descriptor_sets: Vec<DescriptorSet>,
    /// 参照画像ごとの色相ヒストグラム
    pub hue_histograms: Vec<HueHistogram>,
}

impl GalleryEntry {
    fn is_usable(&self) -> bool {
        !self.descriptor_sets.is_empty() || !self.hue_histograms.is_empty()
    }
}

/// 構築の進捗通知
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildProgress {
    /// 走査完了。処理対象の画像枚数
    Started { total_images: usize },
    /// 画像1枚の処理完了（成功・スキップを問わない）
    ImageDone,
}

#[derive(Debug, Clone, Default)]
pub struct ReferenceIndex {
    entries: Vec<GalleryEntry>,
}

/// SKUフォルダ1件の処理結果
struct SkuOutcome {
    entry: GalleryEntry,
    skipped: Vec<SkippedImage>,
    sparse: Vec<SparseImage>,
    images: usize,
}

impl ReferenceIndex {
    pub fn empty() -> Self {
        Self::default()
    }

    /// 構築済みのエントリから作る（使える特徴がないエントリは捨てる）
    pub fn from_entries(entries: Vec<GalleryEntry>) -> Self {
        Self {
            entries: entries.into_iter().filter(GalleryEntry::is_usable).collect(),
        }
    }

    pub fn build(settings: &MatcherSettings, catalog: &Catalog) -> Result<(Self, BuildReport)> {
        Self::build_with_progress(settings, catalog, |_| {})
    }

    /// 参照画像ルートからインデックスを構築
    ///
    /// 読めない画像やルートの不備は `BuildReport` に記録して続行する。
    /// それ以外のIOエラーのみ `Err` になる。
    pub fn build_with_progress<F>(
        settings: &MatcherSettings,
        catalog: &Catalog,
        on_progress: F,
    ) -> Result<(Self, BuildReport)>
    where
        F: Fn(BuildProgress) + Sync,
    {
        let root = settings.reference_images_dir.as_path();
        let mut report = BuildReport {
            root: root.to_path_buf(),
            ..Default::default()
        };

        let folders = match scan_reference_root(root) {
            Ok(folders) => folders,
            Err(MatcherError::FolderNotFound(path)) => {
                warn!("参照画像フォルダが見つかりません: {}", path);
                report.root_issue = Some(RootIssue::Missing);
                on_progress(BuildProgress::Started { total_images: 0 });
                return Ok((Self::empty(), report));
            }
            Err(MatcherError::NotADirectory(path)) => {
                warn!("参照画像のパスがフォルダではありません: {}", path);
                report.root_issue = Some(RootIssue::NotADirectory);
                on_progress(BuildProgress::Started { total_images: 0 });
                return Ok((Self::empty(), report));
            }
            Err(e) => return Err(e),
        };

        let total_images = folders.iter().map(|f| f.images.len()).sum();
        on_progress(BuildProgress::Started { total_images });

        let extractor = FeatureExtractor::from_settings(settings);

        // par_iter().collect() は入力順を保つ
        let outcomes: Vec<SkuOutcome> = folders
            .par_iter()
            .map(|folder| index_folder(folder, settings, catalog, &extractor, &on_progress))
            .collect();

        let mut entries = Vec::with_capacity(outcomes.len());
        for outcome in outcomes {
            report.skipped_images.extend(outcome.skipped);
            report.sparse_images.extend(outcome.sparse);

            if outcome.entry.is_usable() {
                report.indexed_images += outcome.images;
                entries.push(outcome.entry);
            } else {
                warn!("使える参照画像がないためSKUを除外: {}", outcome.entry.sku);
                report.dropped_skus.push(outcome.entry.sku);
            }
        }

        report.indexed_skus = entries.len();
        if entries.is_empty() {
            warn!("インデックス可能なSKUがありません: {}", root.display());
            report.root_issue = Some(RootIssue::NoIndexableSkus);
        }

        info!(
            "インデックス構築完了: {} SKU / {} 画像 (スキップ {}, 記述子不足 {})",
            report.indexed_skus,
            report.indexed_images,
            report.skipped_images.len(),
            report.sparse_images.len()
        );

        Ok((Self { entries }, report))
    }

    pub fn entries(&self) -> &[GalleryEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, sku: &str) -> Option<&GalleryEntry> {
        self.entries.iter().find(|e| e.sku == sku)
    }

    /// インデックス内容の SHA-256（16進）
    ///
    /// 同じ入力から構築したインデックスは同じ値になる。
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update((self.entries.len() as u64).to_le_bytes());

        for entry in &self.entries {
            hash_str(&mut hasher, &entry.sku);
            hash_str(&mut hasher, &entry.label);

            hasher.update((entry.descriptor_sets.len() as u64).to_le_bytes());
            for set in &entry.descriptor_sets {
                hasher.update((set.len() as u64).to_le_bytes());
                for descriptor in set.as_slice() {
                    hasher.update(descriptor);
                }
            }

            hasher.update((entry.hue_histograms.len() as u64).to_le_bytes());
            for hist in &entry.hue_histograms {
                hasher.update((hist.len() as u64).to_le_bytes());
                for bin in hist.as_slice() {
                    hasher.update(bin.to_bits().to_le_bytes());
                }
            }
        }

        hex::encode(hasher.finalize())
    }
}

fn hash_str(hasher: &mut Sha256, s: &str) {
    hasher.update((s.len() as u64).to_le_bytes());
    hasher.update(s.as_bytes());
}

fn index_folder<F>(
    folder: &SkuFolder,
    settings: &MatcherSettings,
    catalog: &Catalog,
    extractor: &FeatureExtractor,
    on_progress: &F,
) -> SkuOutcome
where
    F: Fn(BuildProgress) + Sync,
{
    let mut outcome = SkuOutcome {
        entry: GalleryEntry {
            sku: folder.sku.clone(),
            label: catalog.label_for(&folder.sku).to_string(),
            descriptor_sets: Vec::new(),
            hue_histograms: Vec::new(),
        },
        skipped: Vec::new(),
        sparse: Vec::new(),
        images: 0,
    };

    for path in &folder.images {
        let result = index_image(path, settings, extractor);
        on_progress(BuildProgress::ImageDone);

        let (descriptors, hue) = match result {
            Ok(features) => features,
            Err(reason) => {
                warn!("参照画像をスキップ: {} ({:?})", path.display(), reason);
                outcome.skipped.push(SkippedImage {
                    sku: folder.sku.clone(),
                    path: path.clone(),
                    reason,
                });
                continue;
            }
        };

        let mut used = false;
        if !descriptors.is_empty() && descriptors.len() >= settings.min_ref_descriptors {
            outcome.entry.descriptor_sets.push(descriptors);
            used = true;
        } else {
            debug!(
                "記述子不足: {} ({} < {})",
                path.display(),
                descriptors.len(),
                settings.min_ref_descriptors
            );
            outcome.sparse.push(SparseImage {
                sku: folder.sku.clone(),
                path: path.clone(),
                descriptors: descriptors.len(),
            });
        }

        if let Some(hist) = hue {
            outcome.entry.hue_histograms.push(hist);
            used = true;
        }

        if used {
            outcome.images += 1;
        }
    }

    debug!(
        "SKU {}: 記述子集合 {}, ヒストグラム {}",
        folder.sku,
        outcome.entry.descriptor_sets.len(),
        outcome.entry.hue_histograms.len()
    );
    outcome
}

fn index_image(
    path: &Path,
    settings: &MatcherSettings,
    extractor: &FeatureExtractor,
) -> std::result::Result<(DescriptorSet, Option<HueHistogram>), SkipReason> {
    let bytes = std::fs::read(path).map_err(|e| SkipReason::Unreadable(e.to_string()))?;
    let image = preprocess::decode_image(&bytes).map_err(|e| SkipReason::Undecodable(e.to_string()))?;
    let prepared = preprocess::prepare(&image, settings);
    let features = extractor.extract(&prepared);
    Ok((features.descriptors, features.hue))
}

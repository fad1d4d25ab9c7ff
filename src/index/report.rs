//! インデックス構築レポート
//!
//! 読み込めなかった画像や除外したSKUを記録し、
//! ログだけに頼らずに縮退の経緯を確認できるようにする。

use serde::Serialize;
use std::path::PathBuf;

/// 画像をスキップした理由
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum SkipReason {
    /// ファイルを読めない
    Unreadable(String),
    /// 画像としてデコードできない
    Undecodable(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedImage {
    pub sku: String,
    pub path: PathBuf,
    pub reason: SkipReason,
}

/// 記述子が少なすぎて記述子集合から外した画像（色相ヒストグラムは使用する）
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SparseImage {
    pub sku: String,
    pub path: PathBuf,
    pub descriptors: usize,
}

/// 参照画像ルートの問題（いずれも空のインデックスになる）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RootIssue {
    Missing,
    NotADirectory,
    NoIndexableSkus,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct BuildReport {
    pub root: PathBuf,
    pub root_issue: Option<RootIssue>,
    /// カタログを読み込めなかった場合の理由（ラベルはSKUで代用）
    pub catalog_issue: Option<String>,
    pub skipped_images: Vec<SkippedImage>,
    pub sparse_images: Vec<SparseImage>,
    /// 使える参照画像が1枚もなかったSKU
    pub dropped_skus: Vec<String>,
    pub indexed_skus: usize,
    pub indexed_images: usize,
}

impl BuildReport {
    /// 縮退が一切なかったか
    pub fn is_clean(&self) -> bool {
        self.root_issue.is_none()
            && self.catalog_issue.is_none()
            && self.skipped_images.is_empty()
            && self.sparse_images.is_empty()
            && self.dropped_skus.is_empty()
    }
}

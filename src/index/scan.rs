use crate::error::{MatcherError, Result};
use std::path::{Path, PathBuf};
use tracing::warn;
use walkdir::WalkDir;

/// 参照画像として扱う拡張子（大文字小文字は区別しない）
const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png"];

/// SKUごとの参照画像フォルダ
#[derive(Debug, Clone)]
pub struct SkuFolder {
    /// フォルダ名 = SKU
    pub sku: String,
    /// ファイル名順
    pub images: Vec<PathBuf>,
}

/// 参照画像ルート直下のSKUフォルダを名前順に列挙
pub fn scan_reference_root(root: &Path) -> Result<Vec<SkuFolder>> {
    if !root.exists() {
        return Err(MatcherError::FolderNotFound(root.display().to_string()));
    }
    if !root.is_dir() {
        return Err(MatcherError::NotADirectory(root.display().to_string()));
    }

    let mut folders = Vec::new();
    for entry in WalkDir::new(root)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.map_err(|err| warn!("フォルダを読めません: {}", err)).ok())
    {
        let path = entry.path();
        if !path.is_dir() {
            continue;
        }

        let sku = entry.file_name().to_string_lossy().to_string();
        folders.push(SkuFolder {
            sku,
            images: scan_images(path),
        });
    }

    Ok(folders)
}

/// フォルダ直下の画像ファイルを名前順に列挙（再帰しない）
fn scan_images(folder: &Path) -> Vec<PathBuf> {
    WalkDir::new(folder)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.map_err(|err| warn!("ファイルを読めません: {}", err)).ok())
        .map(|e| e.into_path())
        .filter(|p| p.is_file() && is_image_path(p))
        .collect()
}

fn is_image_path(path: &Path) -> bool {
    path.extension()
        .map(|ext| ext.to_string_lossy().to_lowercase())
        .map(|ext| IMAGE_EXTENSIONS.contains(&ext.as_str()))
        .unwrap_or(false)
}

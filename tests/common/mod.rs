//! 統合テスト用の合成ギャラリー

#![allow(dead_code)]

use image::{Rgb, RgbImage};
use sku_matcher::MatcherSettings;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// 色相ファミリーごとの明るさの異なるブロック模様（ORBのコーナーが出る）
pub fn textured(seed: u32, base: [u8; 3]) -> RgbImage {
    let mut state = seed.wrapping_mul(2_654_435_761).wrapping_add(1);
    let mut cells = [[0u8; 24]; 24];
    for row in cells.iter_mut() {
        for cell in row.iter_mut() {
            state ^= state << 13;
            state ^= state >> 17;
            state ^= state << 5;
            *cell = (state % 4) as u8;
        }
    }

    RgbImage::from_fn(384, 384, |x, y| {
        let level = cells[(y / 16) as usize][(x / 16) as usize];
        let scale = [1.0f32, 0.75, 0.5, 0.3][level as usize];
        Rgb([
            (base[0] as f32 * scale) as u8,
            (base[1] as f32 * scale) as u8,
            (base[2] as f32 * scale) as u8,
        ])
    })
}

pub fn png_bytes(img: &RgbImage) -> Vec<u8> {
    let mut bytes = Vec::new();
    image::DynamicImage::ImageRgb8(img.clone())
        .write_to(&mut std::io::Cursor::new(&mut bytes), image::ImageFormat::Png)
        .unwrap();
    bytes
}

pub struct Gallery {
    pub dir: TempDir,
}

impl Gallery {
    pub fn new() -> Self {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join("images")).unwrap();
        Self { dir }
    }

    pub fn images_dir(&self) -> PathBuf {
        self.dir.path().join("images")
    }

    pub fn catalog_path(&self) -> PathBuf {
        self.dir.path().join("catalog.csv")
    }

    pub fn write_catalog(&self, csv: &str) {
        fs::write(self.catalog_path(), csv).unwrap();
    }

    pub fn add_image(&self, sku: &str, name: &str, img: &RgbImage) -> PathBuf {
        let sku_dir = self.images_dir().join(sku);
        fs::create_dir_all(&sku_dir).unwrap();
        let path = sku_dir.join(name);
        img.save(&path).unwrap();
        path
    }

    pub fn add_file(&self, sku: &str, name: &str, bytes: &[u8]) -> PathBuf {
        let sku_dir = self.images_dir().join(sku);
        fs::create_dir_all(&sku_dir).unwrap();
        let path = sku_dir.join(name);
        fs::write(&path, bytes).unwrap();
        path
    }

    pub fn settings(&self) -> MatcherSettings {
        settings_for(&self.images_dir(), &self.catalog_path())
    }
}

pub fn settings_for(images: &Path, catalog: &Path) -> MatcherSettings {
    MatcherSettings {
        reference_images_dir: images.to_path_buf(),
        catalog_csv_path: catalog.to_path_buf(),
        min_ref_descriptors: 0,
        ..Default::default()
    }
}

pub const APPLE: [u8; 3] = [230, 40, 40];
pub const BANANA: [u8; 3] = [240, 220, 30];

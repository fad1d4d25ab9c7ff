//! 画像前処理モジュール
//!
//! 参照画像とクエリ画像に全く同じ変換を適用することで、
//! スコアの比較可能性を保つ。
//!
//! 1. デコード（EXIFの向き補正を含む）
//! 2. 長辺の上限への縮小（面積平均補間、拡大はしない）
//! 3. 中央切り出し（背景の影響を抑える）

mod exif;

use crate::config::MatcherSettings;
use crate::error::{MatcherError, Result};
use image::{imageops, GrayImage, RgbImage};

/// バイト列を RGB 画像にデコード
pub fn decode_image(bytes: &[u8]) -> Result<RgbImage> {
    if bytes.is_empty() {
        return Err(MatcherError::ImageDecode("空のデータです".into()));
    }

    let image = image::load_from_memory(bytes)
        .map_err(|e| MatcherError::ImageDecode(e.to_string()))?;

    let image = match exif::read_orientation(bytes) {
        Some(orientation) => exif::apply_orientation(image, orientation),
        None => image,
    };

    Ok(image.to_rgb8())
}

/// 長辺が `max_side_px` 以下になるよう縮小
///
/// `max_side_px <= 0` または既に収まっている場合はそのまま返す。
pub fn resize_max_side(image: &RgbImage, max_side_px: i64) -> RgbImage {
    let (w, h) = image.dimensions();
    let max_side = w.max(h) as i64;
    if max_side_px <= 0 || max_side <= max_side_px || w == 0 || h == 0 {
        return image.clone();
    }

    let scale = max_side_px as f64 / max_side as f64;
    let new_w = ((w as f64 * scale).round() as u32).max(1);
    let new_h = ((h as f64 * scale).round() as u32).max(1);
    resize_area(image, new_w, new_h)
}

/// 中央の `frac x frac` の領域を切り出す
///
/// `frac <= 0` または `frac >= 1` の場合はそのまま返す。
pub fn center_crop(image: &RgbImage, frac: f64) -> RgbImage {
    if !(frac > 0.0 && frac < 1.0) {
        return image.clone();
    }

    let (w, h) = image.dimensions();
    if w == 0 || h == 0 {
        return image.clone();
    }

    let new_w = ((w as f64 * frac).round() as u32).max(1);
    let new_h = ((h as f64 * frac).round() as u32).max(1);
    if new_w >= w && new_h >= h {
        return image.clone();
    }

    let x0 = w.saturating_sub(new_w) / 2;
    let y0 = h.saturating_sub(new_h) / 2;
    let cropped = imageops::crop_imm(image, x0, y0, new_w.min(w), new_h.min(h)).to_image();
    if cropped.width() == 0 || cropped.height() == 0 {
        return image.clone();
    }
    cropped
}

/// 設定に従って縮小→中央切り出し
pub fn prepare(image: &RgbImage, settings: &MatcherSettings) -> RgbImage {
    let resized = resize_max_side(image, settings.max_query_side_px);
    center_crop(&resized, settings.center_crop_frac)
}

/// グレースケール変換
pub fn to_gray(image: &RgbImage) -> GrayImage {
    imageops::grayscale(image)
}

/// 面積平均による縮小
fn resize_area(image: &RgbImage, new_w: u32, new_h: u32) -> RgbImage {
    let (w, h) = image.dimensions();
    let x_weights = area_weights(w, new_w);
    let y_weights = area_weights(h, new_h);

    // 横方向
    let mut tmp = vec![0f32; (new_w * h * 3) as usize];
    for y in 0..h {
        for (dx, weights) in x_weights.iter().enumerate() {
            let mut acc = [0f32; 3];
            for &(sx, wgt) in weights {
                let p = image.get_pixel(sx, y);
                for c in 0..3 {
                    acc[c] += p[c] as f32 * wgt;
                }
            }
            let base = ((y * new_w + dx as u32) * 3) as usize;
            tmp[base..base + 3].copy_from_slice(&acc);
        }
    }

    // 縦方向
    let mut out = RgbImage::new(new_w, new_h);
    for (dy, weights) in y_weights.iter().enumerate() {
        for dx in 0..new_w {
            let mut acc = [0f32; 3];
            for &(sy, wgt) in weights {
                let base = ((sy * new_w + dx) * 3) as usize;
                for c in 0..3 {
                    acc[c] += tmp[base + c] * wgt;
                }
            }
            let px = out.get_pixel_mut(dx, dy as u32);
            for c in 0..3 {
                px[c] = acc[c].round().clamp(0.0, 255.0) as u8;
            }
        }
    }

    out
}

/// 出力画素ごとの (入力画素, 重み) の一覧。重みの合計は 1
fn area_weights(src: u32, dst: u32) -> Vec<Vec<(u32, f32)>> {
    let scale = src as f64 / dst as f64;
    (0..dst)
        .map(|d| {
            let start = d as f64 * scale;
            let end = (start + scale).min(src as f64);
            let span = (end - start).max(f64::EPSILON);

            let mut weights = Vec::new();
            let mut s = start.floor() as u32;
            while (s as f64) < end && s < src {
                let covered = ((s + 1) as f64).min(end) - (s as f64).max(start);
                if covered > 1e-9 {
                    weights.push((s, (covered / span) as f32));
                }
                s += 1;
            }
            weights
        })
        .collect()
}

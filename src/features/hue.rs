//! 色相ヒストグラム
//!
//! 彩度・明度の低い画素（背景の白・黒・灰色や影）を除外し、
//! 残りの画素の色相分布を L1 正規化して返す。

use super::HueHistogram;
use image::RgbImage;

/// 8bit HSV の色相の範囲 [0, 180)
const HUE_RANGE: usize = 180;

#[derive(Debug, Clone)]
pub struct HueExtractor {
    bins: usize,
    sat_min: u8,
    val_min: u8,
}

impl HueExtractor {
    pub fn new(bins: usize, sat_min: u8, val_min: u8) -> Self {
        Self {
            bins: bins.max(1),
            sat_min,
            val_min,
        }
    }

    /// マスクに1画素も残らなければ `None`
    pub fn extract(&self, image: &RgbImage) -> Option<HueHistogram> {
        let mut counts = vec![0u32; self.bins];
        let mut total = 0u64;

        for pixel in image.pixels() {
            let (h, s, v) = rgb_to_hsv(pixel[0], pixel[1], pixel[2]);
            if s < self.sat_min || v < self.val_min {
                continue;
            }
            let bin = (h as usize * self.bins / HUE_RANGE).min(self.bins - 1);
            counts[bin] += 1;
            total += 1;
        }

        if total == 0 {
            return None;
        }

        let bins = counts
            .into_iter()
            .map(|c| (c as f64 / total as f64) as f32)
            .collect();
        Some(HueHistogram::from_bins(bins))
    }
}

/// RGB → HSV（H: 0-179, S/V: 0-255）
pub fn rgb_to_hsv(r: u8, g: u8, b: u8) -> (u8, u8, u8) {
    let (rf, gf, bf) = (r as f32, g as f32, b as f32);
    let v = rf.max(gf).max(bf);
    let min = rf.min(gf).min(bf);
    let diff = v - min;

    let s = if v > 0.0 { diff * 255.0 / v } else { 0.0 };

    let h = if diff == 0.0 {
        0.0
    } else if v == rf {
        60.0 * (gf - bf) / diff
    } else if v == gf {
        120.0 + 60.0 * (bf - rf) / diff
    } else {
        240.0 + 60.0 * (rf - gf) / diff
    };
    let h = if h < 0.0 { h + 360.0 } else { h };

    let mut h8 = (h / 2.0).round() as u32;
    if h8 >= HUE_RANGE as u32 {
        h8 -= HUE_RANGE as u32;
    }

    (h8 as u8, s.round() as u8, v as u8)
}

//! ORB (Oriented FAST and Rotated BRIEF) 特徴抽出
//!
//! - 画像ピラミッド（8段・倍率1.2）の各段で FAST-9 コーナーを検出
//! - Harris 応答で順位付けし、3x3 の非極大抑制
//! - 輝度重心による方向推定
//! - 平滑化画像上で回転BRIEF（256ビット）を計算

use image::{imageops, GrayImage};

/// 記述子のバイト数（256ビット）
pub const DESCRIPTOR_BYTES: usize = 32;

pub type Descriptor = [u8; DESCRIPTOR_BYTES];

/// FAST の円周（半径3、16点）
const FAST_CIRCLE: [(i32, i32); 16] = [
    (0, -3), (1, -3), (2, -2), (3, -1), (3, 0), (3, 1), (2, 2), (1, 3),
    (0, 3), (-1, 3), (-2, 2), (-3, 1), (-3, 0), (-3, -1), (-2, -2), (-1, -3),
];

/// BRIEF のサンプリング点の範囲（パッチ半径15の内側）
const PATTERN_RADIUS: f64 = 13.0;

const HARRIS_K: f32 = 0.04;

lazy_static::lazy_static! {
    /// 固定シードで生成した 256 組の比較点
    static ref BRIEF_PATTERN: Vec<[(i32, i32); 2]> = build_pattern(0x9E37_79B9_7F4A_7C15);
}

#[derive(Debug, Clone)]
pub struct OrbExtractor {
    n_features: usize,
    scale_factor: f32,
    n_levels: usize,
    edge_threshold: u32,
    fast_threshold: u8,
    patch_size: u32,
}

impl OrbExtractor {
    pub fn new(n_features: usize) -> Self {
        Self {
            n_features,
            scale_factor: 1.2,
            n_levels: 8,
            edge_threshold: 31,
            fast_threshold: 20,
            patch_size: 31,
        }
    }

    /// キーポイントを検出し、その記述子を返す（最大 `n_features` 個）
    pub fn detect_and_compute(&self, gray: &GrayImage) -> Vec<Descriptor> {
        let pyramid = self.build_pyramid(gray);
        if pyramid.is_empty() {
            return Vec::new();
        }

        let budgets = self.level_budgets(pyramid.len());
        let half_patch = (self.patch_size / 2) as i32;

        let mut descriptors = Vec::new();

        for (level, budget) in pyramid.iter().zip(budgets) {
            if budget == 0 {
                continue;
            }

            let corners = self.detect_level(level, budget);
            if corners.is_empty() {
                continue;
            }

            let smoothed = imageops::blur(level, 2.0);
            for (x, y, _) in corners {
                let angle = intensity_centroid_angle(level, x, y, half_patch);
                descriptors.push(rotated_brief(&smoothed, x, y, angle));
            }
        }

        descriptors
    }

    /// 画像ピラミッドを構築（端の余白を取れない大きさになったら打ち切る）
    fn build_pyramid(&self, gray: &GrayImage) -> Vec<GrayImage> {
        let min_side = 2 * self.edge_threshold + 1;
        let mut pyramid = Vec::with_capacity(self.n_levels);

        for level in 0..self.n_levels {
            let scale = self.scale_factor.powi(level as i32);
            let w = (gray.width() as f32 / scale).round() as u32;
            let h = (gray.height() as f32 / scale).round() as u32;
            if w < min_side || h < min_side {
                break;
            }

            let image = if level == 0 {
                gray.clone()
            } else {
                imageops::resize(gray, w, h, imageops::FilterType::Triangle)
            };
            pyramid.push(image);
        }

        pyramid
    }

    /// 各段の特徴点数の上限（面積比で配分し、端数は最終段へ）
    fn level_budgets(&self, levels: usize) -> Vec<usize> {
        let factor = 1.0 / self.scale_factor as f64;
        let mut desired = self.n_features as f64 * (1.0 - factor)
            / (1.0 - factor.powi(levels as i32));

        let mut budgets = Vec::with_capacity(levels);
        let mut assigned = 0usize;
        for _ in 0..levels.saturating_sub(1) {
            let n = (desired.round() as usize).min(self.n_features - assigned);
            budgets.push(n);
            assigned += n;
            desired *= factor;
        }
        budgets.push(self.n_features - assigned);
        budgets
    }

    /// 1段分のコーナー検出 → (x, y, Harris応答) を応答の降順で最大 `budget` 件
    fn detect_level(&self, image: &GrayImage, budget: usize) -> Vec<(u32, u32, f32)> {
        let (w, h) = image.dimensions();
        let border = self.edge_threshold;
        if w <= 2 * border || h <= 2 * border {
            return Vec::new();
        }

        let mut corners = Vec::new();
        for y in border..h - border {
            for x in border..w - border {
                if is_fast_corner(image, x, y, self.fast_threshold) {
                    corners.push((x, y, harris_response(image, x, y)));
                }
            }
        }

        let mut kept = non_max_suppression(&corners, w, h);
        kept.sort_by(|a, b| b.2.total_cmp(&a.2));
        kept.truncate(budget);
        kept
    }
}

/// FAST-9: 円周16点のうち連続9点が中心より閾値以上明るい/暗い
fn is_fast_corner(image: &GrayImage, x: u32, y: u32, threshold: u8) -> bool {
    let center = image.get_pixel(x, y)[0];
    let bright = center.saturating_add(threshold);
    let dark = center.saturating_sub(threshold);

    // 上下左右の4点で早期棄却
    let cardinal = [0usize, 4, 8, 12].map(|i| circle_pixel(image, x, y, i));
    let bright_count = cardinal.iter().filter(|&&p| p > bright).count();
    let dark_count = cardinal.iter().filter(|&&p| p < dark).count();
    if bright_count < 2 && dark_count < 2 {
        return false;
    }

    let mut run_bright = 0;
    let mut run_dark = 0;
    for i in 0..FAST_CIRCLE.len() + 9 {
        let p = circle_pixel(image, x, y, i % FAST_CIRCLE.len());
        if p > bright {
            run_bright += 1;
            run_dark = 0;
        } else if p < dark {
            run_dark += 1;
            run_bright = 0;
        } else {
            run_bright = 0;
            run_dark = 0;
        }
        if run_bright >= 9 || run_dark >= 9 {
            return true;
        }
    }
    false
}

fn circle_pixel(image: &GrayImage, x: u32, y: u32, i: usize) -> u8 {
    let (dx, dy) = FAST_CIRCLE[i];
    image.get_pixel((x as i32 + dx) as u32, (y as i32 + dy) as u32)[0]
}

/// 7x7 窓の Harris コーナー応答
fn harris_response(image: &GrayImage, x: u32, y: u32) -> f32 {
    let mut a = 0f32;
    let mut b = 0f32;
    let mut c = 0f32;

    for dy in -3i32..=3 {
        for dx in -3i32..=3 {
            let px = (x as i32 + dx) as u32;
            let py = (y as i32 + dy) as u32;
            let ix = image.get_pixel(px + 1, py)[0] as f32 - image.get_pixel(px - 1, py)[0] as f32;
            let iy = image.get_pixel(px, py + 1)[0] as f32 - image.get_pixel(px, py - 1)[0] as f32;
            a += ix * ix;
            b += iy * iy;
            c += ix * iy;
        }
    }

    a * b - c * c - HARRIS_K * (a + b) * (a + b)
}

/// 3x3 近傍で応答が最大のコーナーだけを残す
fn non_max_suppression(corners: &[(u32, u32, f32)], w: u32, h: u32) -> Vec<(u32, u32, f32)> {
    let mut response_map = vec![f32::NEG_INFINITY; (w * h) as usize];
    for &(x, y, r) in corners {
        response_map[(y * w + x) as usize] = r;
    }

    corners
        .iter()
        .copied()
        .filter(|&(x, y, r)| {
            for ny in y.saturating_sub(1)..=(y + 1).min(h - 1) {
                for nx in x.saturating_sub(1)..=(x + 1).min(w - 1) {
                    if (nx, ny) != (x, y) && response_map[(ny * w + nx) as usize] > r {
                        return false;
                    }
                }
            }
            true
        })
        .collect()
}

/// 円形パッチの輝度重心から方向を求める
fn intensity_centroid_angle(image: &GrayImage, x: u32, y: u32, half_patch: i32) -> f32 {
    let (w, h) = (image.width() as i32, image.height() as i32);
    let (cx, cy) = (x as i32, y as i32);
    let mut m01 = 0f32;
    let mut m10 = 0f32;

    for dy in -half_patch..=half_patch {
        for dx in -half_patch..=half_patch {
            if dx * dx + dy * dy > half_patch * half_patch {
                continue;
            }
            let (px, py) = (cx + dx, cy + dy);
            if px < 0 || py < 0 || px >= w || py >= h {
                continue;
            }
            let intensity = image.get_pixel(px as u32, py as u32)[0] as f32;
            m10 += dx as f32 * intensity;
            m01 += dy as f32 * intensity;
        }
    }

    if m10 == 0.0 && m01 == 0.0 {
        0.0
    } else {
        m01.atan2(m10)
    }
}

/// 方向に合わせて比較点を回転させた BRIEF 記述子
fn rotated_brief(smoothed: &GrayImage, x: u32, y: u32, angle: f32) -> Descriptor {
    let (cos, sin) = (angle.cos(), angle.sin());
    let (w, h) = (smoothed.width() as i32, smoothed.height() as i32);
    let sample = |(dx, dy): (i32, i32)| -> u8 {
        let rx = (dx as f32 * cos - dy as f32 * sin).round() as i32;
        let ry = (dx as f32 * sin + dy as f32 * cos).round() as i32;
        let px = (x as i32 + rx).clamp(0, w - 1) as u32;
        let py = (y as i32 + ry).clamp(0, h - 1) as u32;
        smoothed.get_pixel(px, py)[0]
    };

    let mut descriptor = [0u8; DESCRIPTOR_BYTES];
    for (bit, &[p1, p2]) in BRIEF_PATTERN.iter().enumerate() {
        if sample(p1) < sample(p2) {
            descriptor[bit / 8] |= 1 << (bit % 8);
        }
    }
    descriptor
}

/// 中心寄りの分布で 256 組の比較点を生成（同じ点の組は作らない）
fn build_pattern(seed: u64) -> Vec<[(i32, i32); 2]> {
    let mut state = seed;
    let mut next_unit = move || -> f64 {
        // xorshift64*
        state ^= state >> 12;
        state ^= state << 25;
        state ^= state >> 27;
        let v = state.wrapping_mul(0x2545_F491_4F6C_DD1D);
        (v >> 11) as f64 / (1u64 << 53) as f64
    };
    let mut coord = move || -> i32 {
        // 一様乱数4個の和で正規分布を近似（σ ≈ 半径/2.5）
        let sum: f64 = (0..4).map(|_| next_unit() * 2.0 - 1.0).sum();
        (sum / 4.0 * PATTERN_RADIUS * 1.6)
            .round()
            .clamp(-PATTERN_RADIUS, PATTERN_RADIUS) as i32
    };

    let mut pattern = Vec::with_capacity(DESCRIPTOR_BYTES * 8);
    while pattern.len() < DESCRIPTOR_BYTES * 8 {
        let p1 = (coord(), coord());
        let p2 = (coord(), coord());
        if p1 != p2 {
            pattern.push([p1, p2]);
        }
    }
    pattern
}

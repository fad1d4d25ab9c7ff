//! 記述子・ヒストグラムの類似度計算

use super::orb::Descriptor;

/// 2つの記述子のハミング距離（最大256）
#[inline]
pub fn hamming_distance(a: &Descriptor, b: &Descriptor) -> u32 {
    a.iter()
        .zip(b.iter())
        .map(|(&x, &y)| (x ^ y).count_ones())
        .sum()
}

/// k=2 最近傍 + 比率テストを通過した対応の、参照側のユニーク数
///
/// 参照側の記述子が2個未満だと第2近傍が取れないため、常に0になる。
pub fn count_good_unique_matches(
    query: &[Descriptor],
    reference: &[Descriptor],
    ratio: f32,
) -> usize {
    if query.is_empty() || reference.len() < 2 {
        return 0;
    }

    let mut matched = vec![false; reference.len()];
    for q in query {
        let mut best = u32::MAX;
        let mut second = u32::MAX;
        let mut best_idx = 0usize;

        for (idx, r) in reference.iter().enumerate() {
            let d = hamming_distance(q, r);
            if d < best {
                second = best;
                best = d;
                best_idx = idx;
            } else if d < second {
                second = d;
            }
        }

        if (best as f32) < ratio * second as f32 {
            matched[best_idx] = true;
        }
    }

    matched.into_iter().filter(|&m| m).count()
}

/// 参照画像1枚に対するキーポイント信頼度
///
/// ユニーク対応数 ÷ min(クエリ記述子数, 参照記述子数)（分母は最低1）
pub fn keypoint_confidence(query: &[Descriptor], reference: &[Descriptor], ratio: f32) -> f64 {
    let good = count_good_unique_matches(query, reference, ratio);
    let denom = query.len().min(reference.len()).max(1);
    good as f64 / denom as f64
}

/// Bhattacharyya 距離（0: 同一分布、1: 重なりなし）
pub fn bhattacharyya_distance(a: &[f32], b: &[f32]) -> f64 {
    if a.is_empty() || a.len() != b.len() {
        return 1.0;
    }

    let sum_a: f64 = a.iter().map(|&v| v as f64).sum();
    let sum_b: f64 = b.iter().map(|&v| v as f64).sum();
    let denom = (sum_a * sum_b).sqrt();
    if denom <= 0.0 {
        return 1.0;
    }

    let overlap: f64 = a
        .iter()
        .zip(b)
        .map(|(&x, &y)| (x as f64 * y as f64).sqrt())
        .sum();

    (1.0 - overlap / denom).max(0.0).sqrt()
}

/// 色相の類似度 = 1 - 距離（0.0-1.0）
pub fn hue_similarity(a: &[f32], b: &[f32]) -> f64 {
    (1.0 - bhattacharyya_distance(a, b)).clamp(0.0, 1.0)
}

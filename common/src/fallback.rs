//! フォールバック分類器の出力整形
//!
//! 照合エンジンが空の結果を返したときに呼ばれる外部分類器の応答を、
//! エンジンと同じ形に揃える。

use crate::types::Prediction;

/// 「該当なし」を表すラベル
pub const NO_MATCH_LABEL: &str = "unknown";

/// フォールバック分類器の生の予測を整形
///
/// - 「該当なし」ラベルと空ラベルを除外
/// - 信頼度を 0.0-1.0 に丸め、`min_confidence` 未満を除外
/// - 信頼度の降順に並べ、`top_k` 件に制限
/// - 検出枠は常に `None`
pub fn sanitize_fallback_predictions(
    raw: Vec<Prediction>,
    min_confidence: f64,
    top_k: usize,
) -> Vec<Prediction> {
    let mut predictions: Vec<Prediction> = raw
        .into_iter()
        .filter(|p| !p.label.trim().is_empty() && p.label != NO_MATCH_LABEL)
        .map(|p| {
            let confidence = if p.confidence.is_finite() {
                p.confidence.clamp(0.0, 1.0)
            } else {
                0.0
            };
            Prediction::new(p.label, confidence)
        })
        .filter(|p| p.confidence >= min_confidence)
        .collect();

    predictions.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
    predictions.truncate(top_k.max(1));
    predictions
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::BoundingBox;

    #[test]
    fn test_drops_sentinel_and_low_confidence() {
        let raw = vec![
            Prediction::new(NO_MATCH_LABEL, 0.99),
            Prediction::new("Apple", 0.2),
            Prediction::new("Banana", 0.6),
        ];
        let out = sanitize_fallback_predictions(raw, 0.35, 3);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].label, "Banana");
    }

    #[test]
    fn test_sorted_and_capped() {
        let raw = vec![
            Prediction::new("A", 0.5),
            Prediction::new("B", 0.9),
            Prediction::new("C", 0.7),
        ];
        let out = sanitize_fallback_predictions(raw, 0.0, 2);
        let labels: Vec<_> = out.iter().map(|p| p.label.as_str()).collect();
        assert_eq!(labels, vec!["B", "C"]);
    }

    #[test]
    fn test_confidence_clamped_and_box_cleared() {
        let mut p = Prediction::new("A", 1.7);
        p.bbox = Some(BoundingBox { x: 1, y: 2, w: 3, h: 4 });
        let out = sanitize_fallback_predictions(vec![p, Prediction::new("B", f64::NAN)], 0.1, 3);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].confidence, 1.0);
        assert!(out[0].bbox.is_none());
    }
}

//! 判定ポリシー
//!
//! 1. ラベル正規化（有効時）
//! 2. ラベルごとに最大信頼度で統合
//! 3. 信頼度の降順に安定ソート
//! 4. 棄却ゲート（最低信頼度 → キーポイント信頼度 → 1位と2位の差）
//! 5. 上位 `top_k` 件を予測として返す

use crate::config::MatcherSettings;
use crate::scorer::ScoredCandidate;
use serde::Serialize;
use sku_matcher_common::{canonicalize_label, Prediction};
use std::collections::HashMap;
use std::fmt;

/// 棄却理由
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Rejection {
    /// 信頼度が0より大きい候補がない
    NoCandidates,
    /// 1位の信頼度が `min_confidence` 未満
    LowConfidence,
    /// 1位のキーポイント信頼度が `min_top_keypoint_confidence` 未満
    WeakKeypointEvidence,
    /// 1位と2位の差が `min_score_margin` 未満
    AmbiguousMargin,
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Rejection::NoCandidates => "候補なし",
            Rejection::LowConfidence => "信頼度不足",
            Rejection::WeakKeypointEvidence => "キーポイント一致不足",
            Rejection::AmbiguousMargin => "上位候補の差が小さい",
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Decision {
    Accepted(Vec<Prediction>),
    Rejected(Rejection),
}

impl Decision {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Decision::Accepted(_))
    }

    pub fn rejection(&self) -> Option<Rejection> {
        match self {
            Decision::Rejected(r) => Some(*r),
            Decision::Accepted(_) => None,
        }
    }

    /// 棄却時は空のリスト
    pub fn into_predictions(self) -> Vec<Prediction> {
        match self {
            Decision::Accepted(predictions) => predictions,
            Decision::Rejected(_) => Vec::new(),
        }
    }
}

/// ラベルごとに統合した候補を信頼度の降順で返す
///
/// 同じラベルでは信頼度が最大の候補を残す（同点は先に現れた方）。
/// 降順ソートは安定なので、同点の候補は初出順を保つ。
pub fn rank_candidates(
    candidates: Vec<ScoredCandidate>,
    canonicalize: bool,
) -> Vec<ScoredCandidate> {
    let mut merged: Vec<ScoredCandidate> = Vec::with_capacity(candidates.len());
    let mut positions: HashMap<String, usize> = HashMap::new();

    for mut candidate in candidates {
        if canonicalize {
            candidate.label = canonicalize_label(&candidate.label);
        }

        match positions.get(&candidate.label) {
            Some(&pos) => {
                if candidate.confidence > merged[pos].confidence {
                    merged[pos] = candidate;
                }
            }
            None => {
                positions.insert(candidate.label.clone(), merged.len());
                merged.push(candidate);
            }
        }
    }

    merged.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
    merged
}

/// 候補一覧に判定ポリシーを適用
pub fn decide(candidates: Vec<ScoredCandidate>, settings: &MatcherSettings) -> Decision {
    let ranked = rank_candidates(candidates, settings.canonicalize_labels);

    let Some(top) = ranked.first() else {
        return Decision::Rejected(Rejection::NoCandidates);
    };

    if top.confidence < settings.min_confidence {
        return Decision::Rejected(Rejection::LowConfidence);
    }

    if top.keypoint_confidence < settings.min_top_keypoint_confidence {
        return Decision::Rejected(Rejection::WeakKeypointEvidence);
    }

    if let Some(second) = ranked.get(1) {
        if top.confidence - second.confidence < settings.min_score_margin {
            return Decision::Rejected(Rejection::AmbiguousMargin);
        }
    }

    Decision::Accepted(
        ranked
            .into_iter()
            .take(settings.top_k)
            .map(|c| Prediction::new(c.label, c.confidence))
            .collect(),
    )
}

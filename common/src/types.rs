//! 照合結果の型定義

use serde::{Deserialize, Serialize};

/// 検出枠（照合エンジンは位置推定を行わないため常に `None`）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: i32,
    pub y: i32,
    pub w: i32,
    pub h: i32,
}

/// 予測結果1件
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    /// 表示ラベル（カタログ名、なければSKU）
    pub label: String,
    /// 信頼度 (0.0-1.0)
    pub confidence: f64,
    /// 常に null
    #[serde(rename = "box", default)]
    pub bbox: Option<BoundingBox>,
}

impl Prediction {
    pub fn new(label: impl Into<String>, confidence: f64) -> Self {
        Self {
            label: label.into(),
            confidence,
            bbox: None,
        }
    }
}

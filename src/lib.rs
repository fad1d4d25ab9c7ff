//! 参照画像ギャラリーによる商品SKU照合エンジン
//!
//! ## 処理フロー
//! 1. 前処理（デコード・縮小・中央切り出し）
//! 2. 特徴抽出（ORB記述子・色相ヒストグラム）
//! 3. 参照インデックスとのスコアリング
//! 4. 判定ポリシー（ラベル統合・順位付け・棄却ゲート）

pub mod cli;
pub mod config;
pub mod decision;
pub mod error;
pub mod fallback;
pub mod features;
pub mod index;
pub mod matcher;
pub mod preprocess;
pub mod scorer;

pub use config::{MatcherConfig, MatcherSettings};
pub use decision::{Decision, Rejection};
pub use error::{MatcherError, Result};
pub use fallback::FallbackClassifier;
pub use index::{BuildReport, ReferenceIndex};
pub use matcher::{MatcherCache, ProductMatcher};
pub use sku_matcher_common::{Catalog, Prediction};

//! SKU Matcher Common Library
//!
//! 照合エンジン本体とCLIで共有される、画像処理に依存しない型とユーティリティ

pub mod types;
pub mod catalog;
pub mod label;
pub mod error;
pub mod fallback;

pub use types::{BoundingBox, Prediction};
pub use catalog::Catalog;
pub use label::canonicalize_label;
pub use error::{Error, Result};
pub use fallback::{sanitize_fallback_predictions, NO_MATCH_LABEL};

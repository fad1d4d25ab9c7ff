use crate::error::{MatcherError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// 環境変数による上書きのプレフィックス（例: `SKU_MATCHER_TOP_K=5`）
pub const ENV_PREFIX: &str = "SKU_MATCHER_";

/// 設定ファイル・環境変数から読み込む生の設定値
///
/// 範囲外の値もそのまま保持し、[`MatcherConfig::validate`] で一括して検証・丸めを行う。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatcherConfig {
    pub catalog_csv_path: PathBuf,
    pub reference_images_dir: PathBuf,
    pub max_query_side_px: i64,
    pub top_k: i64,
    pub min_confidence: f64,
    pub orb_nfeatures: i64,
    pub orb_ratio_test: f64,
    pub min_ref_descriptors: i64,
    pub hue_hist_bins: i64,
    pub hue_sat_min: i64,
    pub hue_val_min: i64,
    pub hue_scale: f64,
    pub center_crop_frac: f64,
    pub min_top_keypoint_confidence: f64,
    pub min_score_margin: f64,
    pub canonicalize_labels: bool,
    pub fallback_min_confidence: f64,
}

impl Default for MatcherConfig {
    fn default() -> Self {
        Self {
            catalog_csv_path: PathBuf::from("data/catalog.csv"),
            reference_images_dir: PathBuf::from("data/images"),
            max_query_side_px: 640,
            top_k: 3,
            min_confidence: 0.15,
            orb_nfeatures: 800,
            orb_ratio_test: 0.8,
            min_ref_descriptors: 100,
            hue_hist_bins: 60,
            hue_sat_min: 50,
            hue_val_min: 50,
            hue_scale: 0.23,
            center_crop_frac: 0.7,
            min_top_keypoint_confidence: 0.0,
            min_score_margin: 0.0,
            canonicalize_labels: true,
            fallback_min_confidence: 0.35,
        }
    }
}

impl MatcherConfig {
    /// 設定を読み込む
    ///
    /// `path` 指定時はそのファイル（存在しなければエラー）、
    /// 未指定時は `~/.config/sku-matcher/config.json`（なければ既定値）。
    /// 最後に環境変数の上書きを適用する。
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(p) => {
                if !p.exists() {
                    return Err(MatcherError::FileNotFound(p.display().to_string()));
                }
                Self::from_file(p)?
            }
            None => match Self::config_path() {
                Ok(p) if p.exists() => Self::from_file(&p)?,
                _ => Self::default(),
            },
        };

        config.apply_overrides(std::env::vars())?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: MatcherConfig = serde_json::from_str(&content)?;
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn config_path() -> Result<PathBuf> {
        let home = dirs::home_dir()
            .ok_or_else(|| MatcherError::Config("ホームディレクトリが見つかりません".into()))?;
        Ok(home.join(".config").join("sku-matcher").join("config.json"))
    }

    /// `SKU_MATCHER_<FIELD>` 形式の変数で上書き（該当しない変数は無視）
    pub fn apply_overrides<I>(&mut self, vars: I) -> Result<()>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        for (key, value) in vars {
            let Some(field) = key.strip_prefix(ENV_PREFIX) else {
                continue;
            };
            let value = value.trim();

            match field.to_ascii_lowercase().as_str() {
                "catalog_csv_path" => self.catalog_csv_path = PathBuf::from(value),
                "reference_images_dir" => self.reference_images_dir = PathBuf::from(value),
                "max_query_side_px" => self.max_query_side_px = parse_var(&key, value)?,
                "top_k" => self.top_k = parse_var(&key, value)?,
                "min_confidence" => self.min_confidence = parse_var(&key, value)?,
                "orb_nfeatures" => self.orb_nfeatures = parse_var(&key, value)?,
                "orb_ratio_test" => self.orb_ratio_test = parse_var(&key, value)?,
                "min_ref_descriptors" => self.min_ref_descriptors = parse_var(&key, value)?,
                "hue_hist_bins" => self.hue_hist_bins = parse_var(&key, value)?,
                "hue_sat_min" => self.hue_sat_min = parse_var(&key, value)?,
                "hue_val_min" => self.hue_val_min = parse_var(&key, value)?,
                "hue_scale" => self.hue_scale = parse_var(&key, value)?,
                "center_crop_frac" => self.center_crop_frac = parse_var(&key, value)?,
                "min_top_keypoint_confidence" => {
                    self.min_top_keypoint_confidence = parse_var(&key, value)?
                }
                "min_score_margin" => self.min_score_margin = parse_var(&key, value)?,
                "canonicalize_labels" => self.canonicalize_labels = parse_bool(&key, value)?,
                "fallback_min_confidence" => {
                    self.fallback_min_confidence = parse_var(&key, value)?
                }
                _ => {}
            }
        }
        Ok(())
    }

    /// 設定を検証し、不変の [`MatcherSettings`] を生成
    ///
    /// 数値でない値（NaN・無限大）や空のパスはエラー、
    /// 範囲外の数値は各項目の許容範囲に丸める。
    pub fn validate(&self) -> Result<MatcherSettings> {
        let floats = [
            ("min_confidence", self.min_confidence),
            ("orb_ratio_test", self.orb_ratio_test),
            ("hue_scale", self.hue_scale),
            ("center_crop_frac", self.center_crop_frac),
            ("min_top_keypoint_confidence", self.min_top_keypoint_confidence),
            ("min_score_margin", self.min_score_margin),
            ("fallback_min_confidence", self.fallback_min_confidence),
        ];
        for (name, value) in floats {
            if !value.is_finite() {
                return Err(MatcherError::Config(format!(
                    "{} が数値ではありません: {}",
                    name, value
                )));
            }
        }

        if self.catalog_csv_path.as_os_str().is_empty() {
            return Err(MatcherError::Config("catalog_csv_path が空です".into()));
        }
        if self.reference_images_dir.as_os_str().is_empty() {
            return Err(MatcherError::Config("reference_images_dir が空です".into()));
        }

        Ok(self.clamped())
    }

    fn clamped(&self) -> MatcherSettings {
        MatcherSettings {
            catalog_csv_path: self.catalog_csv_path.clone(),
            reference_images_dir: self.reference_images_dir.clone(),
            max_query_side_px: self.max_query_side_px.max(0),
            top_k: self.top_k.max(1) as usize,
            min_confidence: self.min_confidence.max(0.0),
            orb_nfeatures: self.orb_nfeatures.max(50) as usize,
            orb_ratio_test: self.orb_ratio_test.clamp(0.1, 0.99) as f32,
            min_ref_descriptors: self.min_ref_descriptors.max(0) as usize,
            hue_hist_bins: self.hue_hist_bins.max(8) as usize,
            hue_sat_min: self.hue_sat_min.clamp(0, 255) as u8,
            hue_val_min: self.hue_val_min.clamp(0, 255) as u8,
            hue_scale: self.hue_scale.clamp(0.0, 1.0),
            center_crop_frac: self.center_crop_frac.clamp(0.0, 1.0),
            min_top_keypoint_confidence: self.min_top_keypoint_confidence.max(0.0),
            min_score_margin: self.min_score_margin.max(0.0),
            canonicalize_labels: self.canonicalize_labels,
            fallback_min_confidence: self.fallback_min_confidence.clamp(0.0, 1.0),
        }
    }
}

/// 検証済みの不変設定（起動時に一度だけ生成し、共有する）
#[derive(Debug, Clone, PartialEq)]
pub struct MatcherSettings {
    pub catalog_csv_path: PathBuf,
    pub reference_images_dir: PathBuf,
    /// 0 は縮小しない
    pub max_query_side_px: i64,
    pub top_k: usize,
    pub min_confidence: f64,
    pub orb_nfeatures: usize,
    pub orb_ratio_test: f32,
    pub min_ref_descriptors: usize,
    pub hue_hist_bins: usize,
    pub hue_sat_min: u8,
    pub hue_val_min: u8,
    pub hue_scale: f64,
    pub center_crop_frac: f64,
    pub min_top_keypoint_confidence: f64,
    pub min_score_margin: f64,
    pub canonicalize_labels: bool,
    pub fallback_min_confidence: f64,
}

impl Default for MatcherSettings {
    fn default() -> Self {
        MatcherConfig::default().clamped()
    }
}

fn parse_var<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .parse()
        .map_err(|_| MatcherError::Config(format!("{} の値が不正です: {}", key, value)))
}

fn parse_bool(key: &str, value: &str) -> Result<bool> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(MatcherError::Config(format!("{} の値が不正です: {}", key, value))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_defaults_validate() {
        let settings = MatcherConfig::default().validate().unwrap();
        assert_eq!(settings.max_query_side_px, 640);
        assert_eq!(settings.top_k, 3);
        assert_eq!(settings.orb_nfeatures, 800);
        assert_eq!(settings.min_ref_descriptors, 100);
        assert_eq!(settings.hue_hist_bins, 60);
        assert_eq!(settings.hue_sat_min, 50);
        assert!((settings.hue_scale - 0.23).abs() < 1e-12);
        assert!((settings.center_crop_frac - 0.7).abs() < 1e-12);
        assert!(settings.canonicalize_labels);
        assert_eq!(settings, MatcherSettings::default());
    }

    #[test]
    fn test_clamping() {
        let config = MatcherConfig {
            top_k: 0,
            orb_nfeatures: 10,
            orb_ratio_test: 1.5,
            hue_hist_bins: 2,
            hue_sat_min: 300,
            hue_val_min: -5,
            hue_scale: 2.0,
            center_crop_frac: -0.5,
            max_query_side_px: -1,
            min_ref_descriptors: -3,
            ..Default::default()
        };
        let s = config.validate().unwrap();
        assert_eq!(s.top_k, 1);
        assert_eq!(s.orb_nfeatures, 50);
        assert!((s.orb_ratio_test - 0.99).abs() < 1e-6);
        assert_eq!(s.hue_hist_bins, 8);
        assert_eq!(s.hue_sat_min, 255);
        assert_eq!(s.hue_val_min, 0);
        assert_eq!(s.hue_scale, 1.0);
        assert_eq!(s.center_crop_frac, 0.0);
        assert_eq!(s.max_query_side_px, 0);
        assert_eq!(s.min_ref_descriptors, 0);
    }

    #[test]
    fn test_ratio_lower_clamp() {
        let config = MatcherConfig { orb_ratio_test: 0.0, ..Default::default() };
        let s = config.validate().unwrap();
        assert!((s.orb_ratio_test - 0.1).abs() < 1e-6);
    }

    #[test]
    fn test_nan_is_config_error() {
        let config = MatcherConfig { min_confidence: f64::NAN, ..Default::default() };
        let err = config.validate().unwrap_err();
        assert!(matches!(err, MatcherError::Config(_)));
        assert!(err.to_string().contains("min_confidence"));
    }

    #[test]
    fn test_empty_path_is_config_error() {
        let config = MatcherConfig {
            reference_images_dir: PathBuf::new(),
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(MatcherError::Config(_))));
    }

    #[test]
    fn test_apply_overrides() {
        let mut config = MatcherConfig::default();
        config
            .apply_overrides(vars(&[
                ("SKU_MATCHER_TOP_K", "5"),
                ("SKU_MATCHER_MIN_CONFIDENCE", " 0.3 "),
                ("SKU_MATCHER_REFERENCE_IMAGES_DIR", "/srv/images"),
                ("SKU_MATCHER_CANONICALIZE_LABELS", "off"),
                ("PATH", "/usr/bin"),
                ("SKU_MATCHER_UNKNOWN_FIELD", "x"),
            ]))
            .unwrap();
        assert_eq!(config.top_k, 5);
        assert!((config.min_confidence - 0.3).abs() < 1e-12);
        assert_eq!(config.reference_images_dir, PathBuf::from("/srv/images"));
        assert!(!config.canonicalize_labels);
    }

    #[test]
    fn test_apply_overrides_invalid_value() {
        let mut config = MatcherConfig::default();
        let err = config
            .apply_overrides(vars(&[("SKU_MATCHER_TOP_K", "three")]))
            .unwrap_err();
        assert!(matches!(err, MatcherError::Config(_)));
        assert!(err.to_string().contains("SKU_MATCHER_TOP_K"));
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: MatcherConfig = serde_json::from_str(r#"{"top_k": 7}"#).unwrap();
        assert_eq!(config.top_k, 7);
        assert_eq!(config.orb_nfeatures, 800);
    }

    #[test]
    fn test_save_and_load_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");
        let config = MatcherConfig { hue_hist_bins: 32, ..Default::default() };
        config.save(&path).unwrap();

        let loaded = MatcherConfig::from_file(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_load_missing_explicit_path() {
        let result = MatcherConfig::load(Some(Path::new("/nonexistent/config.json")));
        assert!(matches!(result, Err(MatcherError::FileNotFound(_))));
    }
}

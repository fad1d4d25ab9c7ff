//! ラベル正規化モジュール
//!
//! 同じ商品がデータセット名やバリアント番号付きで複数登録されている場合に、
//! 末尾の `Dataset` / `Variant N` を取り除いて一つの候補にまとめる。

use regex::Regex;

lazy_static::lazy_static! {
    // 末尾の "Dataset" / "Variant 2" / "(variant_3)" などを繰り返し除去
    // 語の途中（"Bigdataset" など）は対象外: 直前に区切り文字か先頭が必要
    static ref VARIANT_SUFFIX_RE: Regex = Regex::new(
        r"(?i)(?:(?:^|[\s_\-()\[\]]+)(?:dataset|variant[\s_\-]*\d+)[\s_\-()\[\]]*)+$"
    ).unwrap();
}

/// ラベルを正規化
///
/// 除去した結果が空になる場合は元のラベルを返す。
pub fn canonicalize_label(label: &str) -> String {
    let stripped = VARIANT_SUFFIX_RE.replace(label, "");
    let stripped = stripped.trim();
    if stripped.is_empty() {
        label.trim().to_string()
    } else {
        stripped.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_label_unchanged() {
        assert_eq!(canonicalize_label("Apple"), "Apple");
        assert_eq!(canonicalize_label("Coca Cola 500ml"), "Coca Cola 500ml");
    }

    #[test]
    fn test_strip_dataset_suffix() {
        assert_eq!(canonicalize_label("Apple Dataset"), "Apple");
        assert_eq!(canonicalize_label("Apple dataset"), "Apple");
        assert_eq!(canonicalize_label("Apple_DATASET"), "Apple");
    }

    #[test]
    fn test_strip_variant_suffix() {
        assert_eq!(canonicalize_label("Apple Variant 2"), "Apple");
        assert_eq!(canonicalize_label("Apple (variant 12)"), "Apple");
        assert_eq!(canonicalize_label("Apple-Variant_3"), "Apple");
    }

    #[test]
    fn test_strip_stacked_suffixes() {
        assert_eq!(canonicalize_label("Apple Dataset Variant 2"), "Apple");
    }

    #[test]
    fn test_suffix_only_in_middle_kept() {
        assert_eq!(canonicalize_label("Variant 2 Cola"), "Variant 2 Cola");
        assert_eq!(canonicalize_label("Datasets"), "Datasets");
    }

    #[test]
    fn test_suffix_inside_word_kept() {
        assert_eq!(canonicalize_label("Bigdataset"), "Bigdataset");
        assert_eq!(canonicalize_label("Metadataset"), "Metadataset");
        assert_eq!(canonicalize_label("Covariant 2"), "Covariant 2");
        assert_eq!(canonicalize_label("Invariant3"), "Invariant3");
        // 区切りがあれば除去される
        assert_eq!(canonicalize_label("Bigdataset Variant 2"), "Bigdataset");
    }

    #[test]
    fn test_variant_without_number_kept() {
        assert_eq!(canonicalize_label("Apple Variant"), "Apple Variant");
    }

    #[test]
    fn test_label_that_is_only_suffix_kept() {
        assert_eq!(canonicalize_label("Dataset"), "Dataset");
    }
}

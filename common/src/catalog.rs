//! 商品カタログモジュール
//!
//! `sku,name,...` 形式のCSVを読み込み、SKU → 表示ラベルの対応を提供する。
//! 名前が空の行や、カタログに存在しないSKUはSKUそのものをラベルとする。

use crate::error::{Error, Result};
use std::collections::HashMap;
use std::path::Path;

/// カタログ全体
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    /// SKU → ラベル
    labels: HashMap<String, String>,
    /// ファイル上の出現順（フォールバック用ラベル一覧の順序を保つ）
    order: Vec<String>,
}

impl Catalog {
    /// CSVファイルから読み込み
    pub fn from_csv(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_csv_str(&content)
    }

    /// CSV文字列から読み込み
    ///
    /// ヘッダー行の `sku` / `name` 列を大文字小文字を区別せずに探す。
    /// `sku` 列がなければエラー、`name` 列がなければ全件SKUをラベルとする。
    pub fn from_csv_str(content: &str) -> Result<Self> {
        let content = content.trim_start_matches('\u{feff}');
        let mut lines = split_csv_records(content)
            .into_iter()
            .filter(|l| !l.trim().is_empty());

        let header = lines
            .next()
            .ok_or_else(|| Error::Catalog("ヘッダー行がありません".into()))?;
        let columns: Vec<String> = parse_csv_line(header)
            .into_iter()
            .map(|c| c.trim().to_lowercase())
            .collect();

        let sku_col = columns
            .iter()
            .position(|c| c == "sku")
            .ok_or_else(|| Error::Catalog(format!("sku列がありません: {}", header)))?;
        let name_col = columns.iter().position(|c| c == "name");

        let mut catalog = Self::default();
        for line in lines {
            let fields = parse_csv_line(line);
            let sku = fields.get(sku_col).map(|s| s.trim()).unwrap_or("");
            if sku.is_empty() {
                continue;
            }
            let name = name_col
                .and_then(|i| fields.get(i))
                .map(|s| s.trim())
                .unwrap_or("");

            let label = if name.is_empty() { sku } else { name };
            catalog.insert(sku.to_string(), label.to_string());
        }

        Ok(catalog)
    }

    fn insert(&mut self, sku: String, label: String) {
        if !self.labels.contains_key(&sku) {
            self.order.push(sku.clone());
        }
        self.labels.insert(sku, label);
    }

    /// SKUのラベルを取得（未登録ならSKUそのもの）
    pub fn label_for<'a>(&'a self, sku: &'a str) -> &'a str {
        self.labels.get(sku).map(|s| s.as_str()).unwrap_or(sku)
    }

    /// 重複を除いたラベル一覧（出現順）
    pub fn labels(&self) -> Vec<String> {
        let mut seen = std::collections::HashSet::new();
        self.order
            .iter()
            .filter_map(|sku| self.labels.get(sku))
            .filter(|label| seen.insert(label.as_str()))
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

/// CSVをレコードに分割（クォート内の改行はレコードの区切りにしない）
fn split_csv_records(content: &str) -> Vec<&str> {
    let mut records = Vec::new();
    let mut start = 0;
    let mut in_quotes = false;

    for (i, c) in content.char_indices() {
        match c {
            // "" エスケープは2回反転するので状態は変わらない
            '"' => in_quotes = !in_quotes,
            '\n' if !in_quotes => {
                records.push(&content[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    if start < content.len() {
        records.push(&content[start..]);
    }

    records
}

/// CSVの1行をフィールドに分割（ダブルクォートと "" エスケープに対応）
fn parse_csv_line(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '"' if in_quotes && chars.peek() == Some(&'"') => {
                field.push('"');
                chars.next();
            }
            '"' => in_quotes = !in_quotes,
            ',' if !in_quotes => {
                fields.push(std::mem::take(&mut field));
            }
            '\r' if !in_quotes => {}
            _ => field.push(c),
        }
    }
    fields.push(field);

    fields
}

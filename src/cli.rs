use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "sku-match")]
#[command(about = "参照画像ギャラリーによる商品SKU照合ツール", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// 詳細ログを出力
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// 設定ファイル（省略時: ~/.config/sku-matcher/config.json）
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// 参照画像フォルダ（設定を上書き）
    #[arg(long, global = true)]
    pub images: Option<PathBuf>,

    /// カタログCSV（設定を上書き）
    #[arg(long, global = true)]
    pub catalog: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// 参照インデックスを構築してレポートを表示
    Index {
        /// レポートをJSONで出力
        #[arg(long)]
        json: bool,
    },

    /// 画像ファイルを照合
    Predict {
        /// クエリ画像
        #[arg(required = true, value_name = "IMAGE")]
        files: Vec<PathBuf>,
    },

    /// 設定を表示/初期化
    Config {
        /// 有効な設定を表示
        #[arg(long)]
        show: bool,

        /// デフォルト設定を書き出す
        #[arg(long)]
        init: bool,
    },
}

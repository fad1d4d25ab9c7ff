use thiserror::Error;

#[derive(Error, Debug)]
pub enum MatcherError {
    #[error("設定エラー: {0}")]
    Config(String),

    /// クエリ画像として解釈できない（クライアント側の誤り）
    #[error("画像デコードエラー: {0}")]
    ImageDecode(String),

    #[error("ファイルが見つかりません: {0}")]
    FileNotFound(String),

    #[error("フォルダが見つかりません: {0}")]
    FolderNotFound(String),

    #[error("フォルダではありません: {0}")]
    NotADirectory(String),

    #[error("JSON解析エラー: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("IOエラー: {0}")]
    Io(#[from] std::io::Error),
}

impl MatcherError {
    /// 呼び出し側の入力に起因するエラーか
    pub fn is_client_error(&self) -> bool {
        matches!(self, MatcherError::ImageDecode(_))
    }
}

pub type Result<T> = std::result::Result<T, MatcherError>;

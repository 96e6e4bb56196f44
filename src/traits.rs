use async_trait::async_trait;

use crate::error::ScraperError;

/// 認証と文書取得を担うトランスポート
///
/// Fast (HTTPセッション) と Visual (ブラウザ自動化) の2実装がある。
#[async_trait]
pub trait Transport: Send + Sync {
    /// ログイン実行
    async fn authenticate(&mut self) -> Result<(), ScraperError>;

    /// 文書を取得
    ///
    /// ログインページへ戻された場合は1回だけ再ログインして取り直す。
    /// 再ログインにも失敗したら `Ok(None)`。
    async fn fetch(&mut self, url: &str) -> Result<Option<String>, ScraperError>;

    /// リソース解放
    async fn close(&mut self) -> Result<(), ScraperError>;
}

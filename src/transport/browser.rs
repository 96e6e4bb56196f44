use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::Local;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::page::ScreenshotParams;
use chromiumoxide::Page;
use futures::StreamExt;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

use crate::config::HarvestConfig;
use crate::error::ScraperError;
use crate::traits::Transport;

const USERNAME_SELECTOR: &str = "input[name='Uname']";
const PASSWORD_SELECTOR: &str = "input[name='password']";
const LOGGED_IN_MARKER: &str = "Logout";

/// ログインフォーム待機のタイムアウト（ミリ秒）
const FORM_WAIT_TIMEOUT_MS: u64 = 5000;
/// ページ安定待機のタイムアウト（ミリ秒）
const PAGE_SETTLE_TIMEOUT_MS: u64 = 15000;
const POLL_INTERVAL_MS: u64 = 250;

/// Visualモード: ブラウザ自動化
///
/// ブラウザは初回利用時に起動し、`close()` まで保持する。
pub struct BrowserTransport {
    config: HarvestConfig,
    browser: Option<Browser>,
    page: Option<Arc<Page>>,
    handler_task: Option<JoinHandle<()>>,
}

impl BrowserTransport {
    pub fn new(config: HarvestConfig) -> Self {
        Self {
            config,
            browser: None,
            page: None,
            handler_task: None,
        }
    }

    /// ブラウザを保持しているか
    pub fn is_open(&self) -> bool {
        self.browser.is_some()
    }

    fn get_page(&self) -> Result<Arc<Page>, ScraperError> {
        self.page
            .clone()
            .ok_or_else(|| ScraperError::BrowserInit("ブラウザが初期化されていません".into()))
    }

    /// ブラウザを起動 (起動済みなら何もしない)
    async fn ensure_browser(&mut self) -> Result<(), ScraperError> {
        if self.page.is_some() {
            return Ok(());
        }
        info!("ブラウザを起動中...");

        let mut builder = BrowserConfig::builder()
            .window_size(1280, 800)
            .request_timeout(self.config.timeout);

        if let Some(chrome_path) = &self.config.chrome_path {
            builder = builder.chrome_executable(chrome_path);
        }
        if !self.config.headless {
            builder = builder.with_head();
        }
        builder = builder
            .no_sandbox()
            .arg("--disable-blink-features=AutomationControlled")
            .arg("--disable-dev-shm-usage");

        let browser_config = builder
            .build()
            .map_err(|e| ScraperError::BrowserInit(format!("ブラウザ設定エラー: {}", e)))?;

        let (browser, mut handler) = Browser::launch(browser_config)
            .await
            .map_err(|e| ScraperError::BrowserInit(e.to_string()))?;

        // ブラウザイベントハンドラをバックグラウンドで実行
        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                debug!("ブラウザイベント: {:?}", event);
            }
        });

        let page = browser
            .new_page("about:blank")
            .await
            .map_err(|e| ScraperError::BrowserInit(e.to_string()))?;

        self.browser = Some(browser);
        self.page = Some(Arc::new(page));
        self.handler_task = Some(handler_task);
        info!("ブラウザ起動完了");
        Ok(())
    }

    /// セレクタの要素が現れるまで待機
    async fn wait_for_selector(&self, page: &Page, selector: &str) -> Result<(), ScraperError> {
        let timeout = Duration::from_millis(FORM_WAIT_TIMEOUT_MS);
        let start = Instant::now();

        loop {
            if page.find_element(selector).await.is_ok() {
                return Ok(());
            }
            if start.elapsed() > timeout {
                return Err(ScraperError::Timeout(format!(
                    "{} が{}ms以内に表示されませんでした",
                    selector, FORM_WAIT_TIMEOUT_MS
                )));
            }
            sleep(Duration::from_millis(POLL_INTERVAL_MS)).await;
        }
    }

    /// document.readyState が complete になるまで待機
    ///
    /// タイムアウトしても失敗にはしない。
    async fn wait_settled(&self, page: &Page) {
        let timeout = Duration::from_millis(PAGE_SETTLE_TIMEOUT_MS);
        let start = Instant::now();

        while start.elapsed() < timeout {
            match page.evaluate("document.readyState").await {
                Ok(state) => {
                    if state.into_value::<String>().unwrap_or_default() == "complete" {
                        debug!("ページ読み込み完了 ({:?})", start.elapsed());
                        return;
                    }
                }
                Err(e) => debug!("readyState 確認エラー: {}", e),
            }
            sleep(Duration::from_millis(POLL_INTERVAL_MS)).await;
        }
        warn!("ページ読み込み待機タイムアウト ({:?})、続行します", start.elapsed());
    }

    async fn fill_login_form(&self, page: &Page) -> Result<(), ScraperError> {
        page.goto(self.config.login_url())
            .await
            .map_err(|e| ScraperError::Navigation(e.to_string()))?;

        self.wait_for_selector(page, USERNAME_SELECTOR).await?;

        page.find_element(USERNAME_SELECTOR)
            .await
            .map_err(|e| ScraperError::ElementNotFound(format!("ユーザー名入力欄: {}", e)))?
            .click()
            .await
            .map_err(|e| ScraperError::Login(format!("ユーザー名入力欄クリック: {}", e)))?
            .type_str(&self.config.username)
            .await
            .map_err(|e| ScraperError::Login(format!("ユーザー名入力: {}", e)))?;

        // Enterで送信
        page.find_element(PASSWORD_SELECTOR)
            .await
            .map_err(|e| ScraperError::ElementNotFound(format!("パスワード入力欄: {}", e)))?
            .click()
            .await
            .map_err(|e| ScraperError::Login(format!("パスワード入力欄クリック: {}", e)))?
            .type_str(&self.config.password)
            .await
            .map_err(|e| ScraperError::Login(format!("パスワード入力: {}", e)))?
            .press_key("Enter")
            .await
            .map_err(|e| ScraperError::Login(format!("ログイン送信: {}", e)))?;

        Ok(())
    }

    async fn is_logged_in(&self, page: &Page) -> bool {
        let content = page.content().await.unwrap_or_default();
        if content.contains(LOGGED_IN_MARKER) {
            return true;
        }
        let url = current_url(page).await.to_ascii_lowercase();
        url.contains("dashboard") || url.contains("invoice")
    }

    /// 診断用スクリーンショットを出力ディレクトリに保存
    async fn save_diagnostic(&self, page: &Page, name: &str) {
        let timestamp = Local::now().format("%Y%m%d_%H%M%S");
        let path: PathBuf = self
            .config
            .output_dir
            .join(format!("{}_{}.png", name, timestamp));

        if let Err(e) = std::fs::create_dir_all(&self.config.output_dir) {
            warn!("出力ディレクトリ作成失敗: {}", e);
            return;
        }
        match page
            .save_screenshot(ScreenshotParams::builder().full_page(true).build(), &path)
            .await
        {
            Ok(_) => info!("スクリーンショット保存: {}", path.display()),
            Err(e) => warn!("スクリーンショット保存失敗: {}", e),
        }
    }

    async fn navigate(&self, page: &Page, url: &str) -> Result<String, ScraperError> {
        page.goto(url)
            .await
            .map_err(|e| ScraperError::Navigation(e.to_string()))?;
        Ok(current_url(page).await)
    }
}

async fn current_url(page: &Page) -> String {
    page.url().await.ok().flatten().unwrap_or_default()
}

#[async_trait]
impl Transport for BrowserTransport {
    async fn authenticate(&mut self) -> Result<(), ScraperError> {
        info!("ログイン中 (Visual)...");
        self.ensure_browser().await?;
        let page = self.get_page()?;

        if let Err(e) = self.fill_login_form(&page).await {
            error!("ログインフォーム操作失敗 (Visual): {}", e);
            self.save_diagnostic(&page, "login_failed").await;
            return Err(e);
        }

        if let Err(e) = page.wait_for_navigation().await {
            debug!("ログイン後の wait_for_navigation: {}", e);
        }
        self.wait_settled(&page).await;

        if self.is_logged_in(&page).await {
            info!("ログイン成功 (Visual)");
            return Ok(());
        }

        warn!("ログイン確認失敗 (Visual)");
        self.save_diagnostic(&page, "login_verification_failed").await;
        Err(ScraperError::Login("ログイン後の確認に失敗しました".into()))
    }

    async fn fetch(&mut self, url: &str) -> Result<Option<String>, ScraperError> {
        // 初回はブラウザ起動とログインから
        if self.page.is_none() {
            if let Err(e) = self.authenticate().await {
                warn!("取得前のログイン失敗: {}", e);
                return Ok(None);
            }
        }
        let page = self.get_page()?;

        let final_url = self.navigate(&page, url).await?;
        if self.config.looks_like_login(&final_url) {
            info!("ログインページへリダイレクトされました (Visual)");
            if let Err(e) = self.authenticate().await {
                warn!("再ログイン失敗: {}", e);
                return Ok(None);
            }
            let final_url = self.navigate(&page, url).await?;
            if self.config.looks_like_login(&final_url) {
                return Ok(None);
            }
        }

        let content = page
            .content()
            .await
            .map_err(|e| ScraperError::Navigation(e.to_string()))?;
        Ok(Some(content))
    }

    async fn close(&mut self) -> Result<(), ScraperError> {
        if self.browser.is_none() {
            return Ok(());
        }
        info!("ブラウザを終了中...");

        self.page = None;
        if let Some(mut browser) = self.browser.take() {
            if let Err(e) = browser.close().await {
                debug!("ブラウザ終了エラー: {}", e);
            }
            if let Err(e) = browser.wait().await {
                debug!("ブラウザ終了待機エラー: {}", e);
            }
        }
        if let Some(task) = self.handler_task.take() {
            task.abort();
        }

        info!("ブラウザ終了");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_browser_transport_new() {
        let config = HarvestConfig::new("http://127.0.0.1:1", "user", "pass");
        let transport = BrowserTransport::new(config);
        assert!(!transport.is_open());
        assert!(transport.page.is_none());
    }

    #[tokio::test]
    async fn test_close_without_browser_is_noop() {
        let config = HarvestConfig::new("http://127.0.0.1:1", "user", "pass");
        let mut transport = BrowserTransport::new(config);
        transport.close().await.unwrap();
        assert!(!transport.is_open());
    }
}

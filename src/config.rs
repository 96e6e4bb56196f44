use std::path::PathBuf;
use std::time::Duration;

use tracing::{error, warn};
use url::Url;

use crate::error::ScraperError;

/// 巡回開始時の請求書ID (チェックポイントが無い場合)
pub const DEFAULT_STARTING_INVOICE_ID: u64 = 158_696;
/// 連続ブランクがこの件数に達したら停止
pub const DEFAULT_BLANK_LIMIT: u64 = 1000;

const LOGIN_PATH: &str = "/index.php";
const INVOICE_PATH: &str = "/invoiceDetail.php";

#[derive(Debug, Clone)]
pub struct HarvestConfig {
    pub base_url: String,
    pub username: String,
    pub password: String,
    pub starting_invoice_id: u64,
    /// チェックポイント・データセット・スクリーンショットの保存先
    pub output_dir: PathBuf,
    pub headless: bool,
    /// Chrome実行ファイル (未指定ならchromiumoxideの自動検出)
    pub chrome_path: Option<PathBuf>,
    pub timeout: Duration,
    pub fast_delay: Duration,
    pub visual_delay: Duration,
    pub blank_limit: u64,
}

impl Default for HarvestConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            username: String::new(),
            password: String::new(),
            starting_invoice_id: DEFAULT_STARTING_INVOICE_ID,
            output_dir: PathBuf::from("./output"),
            headless: false,
            chrome_path: None,
            timeout: Duration::from_secs(60),
            fast_delay: Duration::from_millis(500),
            visual_delay: Duration::from_secs(1),
            blank_limit: DEFAULT_BLANK_LIMIT,
        }
    }
}

impl HarvestConfig {
    pub fn new(
        base_url: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            base_url: base_url.into(),
            username: username.into(),
            password: password.into(),
            ..Default::default()
        }
    }

    /// 環境変数から設定を読み込む
    ///
    /// `TARGET_URL` が無くてもエラーにはしない。エンジンは起動時に
    /// [`HarvestConfig::validate`] で拒否する。
    pub fn from_env() -> Self {
        let mut config = Self::default();

        match std::env::var("TARGET_URL") {
            Ok(url) => config.base_url = url,
            Err(_) => error!("環境変数 TARGET_URL が未設定です"),
        }
        config.username = std::env::var("SCRAPER_USERNAME").unwrap_or_default();
        config.password = std::env::var("SCRAPER_PASSWORD").unwrap_or_default();

        if let Ok(raw) = std::env::var("STARTING_INVOICE_ID") {
            match raw.trim().parse() {
                Ok(id) => config.starting_invoice_id = id,
                Err(e) => warn!("STARTING_INVOICE_ID が不正です {:?}: {}", raw, e),
            }
        }
        if let Ok(dir) = std::env::var("SCRAPER_OUTPUT_DIR") {
            config.output_dir = PathBuf::from(dir);
        }
        if let Ok(raw) = std::env::var("SCRAPER_HEADLESS") {
            config.headless = matches!(raw.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes");
        }
        config.chrome_path = std::env::var("CHROME_PATH")
            .or_else(|_| std::env::var("CHROMIUM_PATH"))
            .ok()
            .map(PathBuf::from);

        config
    }

    pub fn with_output_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.output_dir = path.into();
        self
    }

    pub fn with_headless(mut self, headless: bool) -> Self {
        self.headless = headless;
        self
    }

    pub fn with_starting_invoice_id(mut self, id: u64) -> Self {
        self.starting_invoice_id = id;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Fast / Visual 各モードのID間スリープ
    pub fn with_delays(mut self, fast: Duration, visual: Duration) -> Self {
        self.fast_delay = fast;
        self.visual_delay = visual;
        self
    }

    pub fn with_blank_limit(mut self, limit: u64) -> Self {
        self.blank_limit = limit;
        self
    }

    pub fn validate(&self) -> Result<(), ScraperError> {
        if self.base_url.trim().is_empty() {
            return Err(ScraperError::Config("TARGET_URL が設定されていません".into()));
        }
        Url::parse(self.base_url.trim())
            .map_err(|e| ScraperError::Config(format!("TARGET_URL が不正です: {}", e)))?;
        Ok(())
    }

    fn base(&self) -> &str {
        self.base_url.trim().trim_end_matches('/')
    }

    pub fn login_url(&self) -> String {
        format!("{}{}", self.base(), LOGIN_PATH)
    }

    pub fn invoice_url(&self, invoice_id: u64) -> String {
        format!("{}{}?invoiceId={}", self.base(), INVOICE_PATH, invoice_id)
    }

    pub fn checkpoint_path(&self) -> PathBuf {
        self.output_dir.join("scraper_state.json")
    }

    pub fn dataset_path(&self) -> PathBuf {
        self.output_dir.join("leads.json")
    }

    /// 最終URLがログインページらしいか判定
    ///
    /// パスに `login` を含むか、このポータルのログインURLのパスと一致すれば真。
    /// 請求書詳細ページは除外する。
    pub fn looks_like_login(&self, url: &str) -> bool {
        let path = lowercase_path(url);
        if path.contains(&INVOICE_PATH.to_ascii_lowercase()) {
            return false;
        }
        path.contains("login") || path == lowercase_path(&self.login_url())
    }
}

fn lowercase_path(url: &str) -> String {
    Url::parse(url)
        .map(|u| u.path().to_ascii_lowercase())
        .unwrap_or_else(|_| url.to_ascii_lowercase())
}

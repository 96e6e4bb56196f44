use std::sync::Arc;

use async_trait::async_trait;
use reqwest::cookie::{CookieStore, Jar};
use reqwest::Client;
use tracing::{debug, info, warn};
use url::Url;

use crate::config::HarvestConfig;
use crate::error::ScraperError;
use crate::traits::Transport;

/// ログイン成功とみなすセッションクッキー名
const SESSION_COOKIES: [&str; 2] = ["session_username", "PHPSESSID"];
/// ログイン後のページに出る文字列
const LOGGED_IN_MARKER: &str = "Logout";

/// Fastモード: クッキー付きHTTPセッション
pub struct SessionTransport {
    config: HarvestConfig,
    client: Client,
    jar: Arc<Jar>,
}

impl SessionTransport {
    pub fn new(config: HarvestConfig) -> Result<Self, ScraperError> {
        let jar = Arc::new(Jar::default());
        let client = Client::builder()
            .cookie_provider(jar.clone())
            .timeout(config.timeout)
            .build()?;

        Ok(Self { config, client, jar })
    }

    /// ポータルに対してセッションクッキーを保持しているか
    fn has_session_cookie(&self) -> bool {
        let Ok(url) = Url::parse(&self.config.login_url()) else {
            return false;
        };
        let Some(header) = self.jar.cookies(&url) else {
            return false;
        };
        let Ok(cookies) = header.to_str() else {
            return false;
        };

        cookies
            .split(';')
            .filter_map(|pair| pair.trim().split('=').next())
            .any(|name| SESSION_COOKIES.contains(&name))
    }

    async fn get(&self, url: &str) -> Result<(String, String), ScraperError> {
        let response = self.client.get(url).send().await?;
        let final_url = response.url().to_string();
        let body = response.text().await?;
        Ok((final_url, body))
    }
}

#[async_trait]
impl Transport for SessionTransport {
    async fn authenticate(&mut self) -> Result<(), ScraperError> {
        info!("ログイン中 (Fast)...");

        let form = [
            ("Uname", self.config.username.as_str()),
            ("password", self.config.password.as_str()),
            ("login", "Login"),
        ];
        let response = self
            .client
            .post(self.config.login_url())
            .form(&form)
            .send()
            .await?;
        let body = response.text().await?;

        if self.has_session_cookie() || body.contains(LOGGED_IN_MARKER) {
            info!("ログイン成功 (Fast)");
            Ok(())
        } else {
            Err(ScraperError::Login(
                "セッションクッキーもログアウトリンクも見つかりません".into(),
            ))
        }
    }

    async fn fetch(&mut self, url: &str) -> Result<Option<String>, ScraperError> {
        let (final_url, body) = self.get(url).await?;
        if !self.config.looks_like_login(&final_url) {
            return Ok(Some(body));
        }

        info!("ログインページへリダイレクトされました (Fast)");
        if let Err(e) = self.authenticate().await {
            warn!("再ログイン失敗: {}", e);
            return Ok(None);
        }

        let (final_url, body) = self.get(url).await?;
        if self.config.looks_like_login(&final_url) {
            debug!("再ログイン後もログインページのまま: {}", final_url);
            return Ok(None);
        }
        Ok(Some(body))
    }

    async fn close(&mut self) -> Result<(), ScraperError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_transport_new() {
        let config = HarvestConfig::new("http://127.0.0.1:1", "user", "pass");
        let transport = SessionTransport::new(config).unwrap();
        assert!(!transport.has_session_cookie());
    }
}

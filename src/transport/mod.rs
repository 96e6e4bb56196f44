//! トランスポート実装
//!
//! - Fast: reqwest によるクッキー付きセッション
//! - Visual: chromiumoxide によるブラウザ自動化

mod browser;
mod session;

pub use browser::BrowserTransport;
pub use session::SessionTransport;

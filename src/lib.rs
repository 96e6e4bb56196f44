//! 請求書ポータル巡回スクレイパー
//!
//! - 請求書IDを連番で巡回し、請求先の連絡先レコードを抽出
//! - メールアドレスで重複排除
//! - チェックポイントを毎ID保存し、中断後に再開できる
//! - Fast (HTTPセッション) / Visual (ブラウザ自動化) の2モード
//!
//! # 使用例
//!
//! ```rust,ignore
//! use invoice_harvester::{HarvestConfig, Harvester, Mode};
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = HarvestConfig::new("https://portal.example.com", "user", "pass")
//!         .with_output_dir("./output");
//!
//!     let harvester = Harvester::new(config).unwrap();
//!     harvester.start(Mode::Fast).await.unwrap();
//!
//!     tokio::signal::ctrl_c().await.unwrap();
//!     harvester.stop();
//!     harvester.wait().await;
//!     println!("{:?}", harvester.status());
//! }
//! ```

pub mod config;
pub mod dedup;
pub mod engine;
pub mod error;
pub mod extract;
pub mod service;
pub mod store;
pub mod traits;
pub mod transport;
pub mod types;

// 主要な型をリエクスポート
pub use config::HarvestConfig;
pub use engine::{Harvester, StartOutcome};
pub use error::ScraperError;
pub use extract::extract_record;
pub use service::{ControlRequest, ControlResponse, ControlService};
pub use store::PersistenceStore;
pub use traits::Transport;
pub use transport::{BrowserTransport, SessionTransport};
pub use types::{Checkpoint, Mode, PageOutcome, Record, StatusSnapshot};

//! 巡回エンジン
//!
//! 請求書IDを1つずつ進めながら取得・抽出・重複排除・チェックポイント保存を行う。
//! ワーカーは常に1つで、取得は逐次。停止要求はループ先頭でのみ確認するため、
//! 実行中のネットワーク操作は中断されない。

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{error, info, warn};

use crate::config::HarvestConfig;
use crate::dedup::DedupSet;
use crate::error::ScraperError;
use crate::extract::extract_record;
use crate::store::PersistenceStore;
use crate::traits::Transport;
use crate::transport::{BrowserTransport, SessionTransport};
use crate::types::{Checkpoint, Mode, PageOutcome, Record, StatusSnapshot};

/// この件数の新規レコードごとにデータセットを保存
const DATASET_FLUSH_EVERY: usize = 10;

/// 外部からロックなしで読めるエンジン状態
#[derive(Debug, Default)]
struct EngineStatus {
    running: AtomicBool,
    visual: AtomicBool,
    current_id: AtomicU64,
    total_records: AtomicU64,
    blank_count: AtomicU64,
}

impl EngineStatus {
    fn snapshot(&self) -> StatusSnapshot {
        StatusSnapshot {
            is_running: self.running.load(Ordering::SeqCst),
            current_id: self.current_id.load(Ordering::SeqCst),
            total_records: self.total_records.load(Ordering::SeqCst),
            blank_count: self.blank_count.load(Ordering::SeqCst),
            visual_mode: self.visual.load(Ordering::SeqCst),
        }
    }

    fn mode(&self) -> Mode {
        Mode::from_visual(self.visual.load(Ordering::SeqCst))
    }
}

/// 受理済みレコードと既出メール
#[derive(Debug, Default)]
struct Ledger {
    records: Vec<Record>,
    seen: DedupSet,
}

/// start() の結果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    Started(Mode),
    AlreadyRunning,
}

struct Shared {
    config: HarvestConfig,
    store: PersistenceStore,
    status: EngineStatus,
    ledger: Mutex<Ledger>,
    fast: Mutex<Box<dyn Transport>>,
    visual: Mutex<Box<dyn Transport>>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

/// 巡回エンジン本体
///
/// `Clone` は同じエンジンへのハンドルを複製する。
#[derive(Clone)]
pub struct Harvester {
    shared: Arc<Shared>,
}

impl Harvester {
    /// 標準のトランスポート (reqwest / chromiumoxide) で作成
    pub fn new(config: HarvestConfig) -> Result<Self, ScraperError> {
        if let Err(e) = config.validate() {
            error!("{}", e);
        }
        let fast = SessionTransport::new(config.clone())?;
        let visual = BrowserTransport::new(config.clone());
        Ok(Self::with_transports(config, Box::new(fast), Box::new(visual)))
    }

    /// 任意のトランスポートで作成
    ///
    /// チェックポイントとデータセットをここで読み込む。
    pub fn with_transports(
        config: HarvestConfig,
        fast: Box<dyn Transport>,
        visual: Box<dyn Transport>,
    ) -> Self {
        let store = PersistenceStore::new(&config);
        let checkpoint = store.load_checkpoint();
        let (records, seen) = store.load_dataset();

        let status = EngineStatus::default();
        status
            .current_id
            .store(checkpoint.last_invoice_id, Ordering::SeqCst);
        status
            .total_records
            .store(checkpoint.total_records, Ordering::SeqCst);

        Self {
            shared: Arc::new(Shared {
                config,
                store,
                status,
                ledger: Mutex::new(Ledger { records, seen }),
                fast: Mutex::new(fast),
                visual: Mutex::new(visual),
                worker: Mutex::new(None),
            }),
        }
    }

    pub fn config(&self) -> &HarvestConfig {
        &self.shared.config
    }

    pub fn status(&self) -> StatusSnapshot {
        self.shared.status.snapshot()
    }

    pub fn is_running(&self) -> bool {
        self.shared.status.running.load(Ordering::SeqCst)
    }

    pub fn mode(&self) -> Mode {
        self.shared.status.mode()
    }

    /// 受理済みレコードの複製
    ///
    /// 巡回中でもレコード追加の合間に読める。
    pub async fn records(&self) -> Vec<Record> {
        self.shared.ledger.lock().await.records.clone()
    }

    /// モード切替
    ///
    /// Fastへの切替ではブラウザを解放してからフラグを切り替える。
    /// 取得中ならその完了を待つ。
    pub async fn set_mode(&self, mode: Mode) {
        if mode == Mode::Fast {
            let mut visual = self.shared.visual.lock().await;
            if let Err(e) = visual.close().await {
                warn!("ブラウザ解放に失敗: {}", e);
            }
            self.shared.status.visual.store(false, Ordering::SeqCst);
        } else {
            self.shared.status.visual.store(true, Ordering::SeqCst);
        }
        info!("{}モードに切替", mode.label());
    }

    /// 停止要求 (次のループ先頭で反映)
    pub fn stop(&self) {
        self.shared.status.running.store(false, Ordering::SeqCst);
    }

    /// ワーカーをバックグラウンドで起動
    pub async fn start(&self, mode: Mode) -> Result<StartOutcome, ScraperError> {
        self.shared.config.validate()?;
        if !self.claim() {
            info!("既に実行中です");
            return Ok(StartOutcome::AlreadyRunning);
        }
        self.set_mode(mode).await;

        let engine = self.clone();
        let handle = tokio::spawn(async move { engine.drive().await });
        *self.shared.worker.lock().await = Some(handle);

        Ok(StartOutcome::Started(mode))
    }

    /// 呼び出し元のタスクで巡回を最後まで実行
    pub async fn run(&self, mode: Mode) -> Result<StartOutcome, ScraperError> {
        self.shared.config.validate()?;
        if !self.claim() {
            info!("既に実行中です");
            return Ok(StartOutcome::AlreadyRunning);
        }
        self.set_mode(mode).await;
        self.drive().await;
        Ok(StartOutcome::Started(mode))
    }

    /// start() で起動したワーカーの終了を待つ
    pub async fn wait(&self) {
        let handle = self.shared.worker.lock().await.take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                error!("ワーカータスク異常終了: {}", e);
            }
        }
    }

    fn claim(&self) -> bool {
        self.shared
            .status
            .running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }

    fn transport(&self, mode: Mode) -> &Mutex<Box<dyn Transport>> {
        match mode {
            Mode::Fast => &self.shared.fast,
            Mode::Visual => &self.shared.visual,
        }
    }

    fn delay(&self) -> Duration {
        match self.mode() {
            Mode::Fast => self.shared.config.fast_delay,
            Mode::Visual => self.shared.config.visual_delay,
        }
    }

    /// 実行フラグは後始末がすべて終わってから下ろす
    async fn drive(&self) {
        let status = &self.shared.status;
        let mode = self.mode();
        info!("{}モードで巡回開始...", mode.label());

        let login = self.transport(mode).lock().await.authenticate().await;
        if let Err(e) = login {
            error!("初回ログイン失敗のため停止: {}", e);
            self.close_transports().await;
            status.running.store(false, Ordering::SeqCst);
            return;
        }

        status.blank_count.store(0, Ordering::SeqCst);

        let mut last_processed = None;
        if let Err(e) = self.walk(&mut last_processed).await {
            error!("巡回ループで予期しないエラー: {}", e);
        }

        {
            let ledger = self.shared.ledger.lock().await;
            self.shared.store.flush_dataset(&ledger.records);
        }
        let checkpoint = Checkpoint {
            last_invoice_id: last_processed
                .unwrap_or_else(|| status.current_id.load(Ordering::SeqCst)),
            total_records: status.total_records.load(Ordering::SeqCst),
        };
        if let Err(e) = self.shared.store.save_checkpoint(&checkpoint) {
            error!("チェックポイント保存エラー: {}", e);
        }
        self.close_transports().await;

        status.running.store(false, Ordering::SeqCst);
        info!("巡回停止");
    }

    /// メインループ。Err はループを止める致命的エラー。
    async fn walk(&self, last_processed: &mut Option<u64>) -> Result<(), ScraperError> {
        let status = &self.shared.status;
        let blank_limit = self.shared.config.blank_limit;
        let mut accepted_this_run = 0usize;

        loop {
            if !status.running.load(Ordering::SeqCst) {
                info!("停止要求を受信");
                return Ok(());
            }
            if status.blank_count.load(Ordering::SeqCst) >= blank_limit {
                info!("連続ブランクが{}件に達したため停止", blank_limit);
                return Ok(());
            }

            let invoice_id = status.current_id.load(Ordering::SeqCst);
            info!("請求書ID {} を処理中", invoice_id);

            match self.scrape_invoice(invoice_id).await {
                PageOutcome::Record(record) => {
                    status.blank_count.store(0, Ordering::SeqCst);
                    let mut ledger = self.shared.ledger.lock().await;
                    if ledger.seen.is_duplicate(&record.email) {
                        info!("重複メールのためスキップ: {}", record.email);
                    } else {
                        ledger.seen.insert(&record.email);
                        ledger.records.push(record);
                        accepted_this_run += 1;
                        status.total_records.fetch_add(1, Ordering::SeqCst);
                        if accepted_this_run % DATASET_FLUSH_EVERY == 0 {
                            self.shared.store.flush_dataset(&ledger.records);
                        }
                    }
                }
                PageOutcome::Blank => {
                    let blanks = status.blank_count.fetch_add(1, Ordering::SeqCst) + 1;
                    info!("ブランク/無効なレコード (連続{}件)", blanks);
                }
            }

            status.current_id.store(invoice_id + 1, Ordering::SeqCst);
            *last_processed = Some(invoice_id);
            self.shared.store.save_checkpoint(&Checkpoint {
                last_invoice_id: invoice_id,
                total_records: status.total_records.load(Ordering::SeqCst),
            })?;

            sleep(self.delay()).await;
        }
    }

    /// 取得・解析の失敗はすべてブランク扱い
    async fn scrape_invoice(&self, invoice_id: u64) -> PageOutcome {
        let url = self.shared.config.invoice_url(invoice_id);
        match self.fetch_document(&url).await {
            Ok(Some(html)) => extract_record(&html),
            Ok(None) => PageOutcome::Blank,
            Err(e) => {
                warn!("請求書ID {} の取得エラー: {}", invoice_id, e);
                PageOutcome::Blank
            }
        }
    }

    /// 現在のモードのトランスポートで取得
    ///
    /// ロック取得中にモードが変わった場合は新しいモードで取り直す。
    async fn fetch_document(&self, url: &str) -> Result<Option<String>, ScraperError> {
        loop {
            let mode = self.mode();
            let mut transport = self.transport(mode).lock().await;
            if self.mode() != mode {
                continue;
            }
            return transport.fetch(url).await;
        }
    }

    async fn close_transports(&self) {
        for transport in [&self.shared.fast, &self.shared.visual] {
            if let Err(e) = transport.lock().await.close().await {
                warn!("トランスポート終了エラー: {}", e);
            }
        }
    }
}

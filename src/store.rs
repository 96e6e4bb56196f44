//! チェックポイントとデータセットのファイル永続化

use std::path::{Path, PathBuf};

use tracing::{error, info, warn};

use crate::config::HarvestConfig;
use crate::dedup::DedupSet;
use crate::error::ScraperError;
use crate::types::{Checkpoint, Record};

/// 出力ディレクトリ配下のJSONファイルを読み書きする
#[derive(Debug, Clone)]
pub struct PersistenceStore {
    checkpoint_path: PathBuf,
    dataset_path: PathBuf,
    starting_invoice_id: u64,
}

impl PersistenceStore {
    pub fn new(config: &HarvestConfig) -> Self {
        Self {
            checkpoint_path: config.checkpoint_path(),
            dataset_path: config.dataset_path(),
            starting_invoice_id: config.starting_invoice_id,
        }
    }

    pub fn checkpoint_path(&self) -> &Path {
        &self.checkpoint_path
    }

    pub fn dataset_path(&self) -> &Path {
        &self.dataset_path
    }

    /// 保存済みチェックポイント。無い・読めない場合は開始IDから。
    pub fn load_checkpoint(&self) -> Checkpoint {
        let fallback = Checkpoint {
            last_invoice_id: self.starting_invoice_id,
            total_records: 0,
        };
        if !self.checkpoint_path.exists() {
            return fallback;
        }

        match read_json::<Checkpoint>(&self.checkpoint_path) {
            Ok(checkpoint) => {
                info!("請求書ID {} から再開します", checkpoint.last_invoice_id);
                checkpoint
            }
            Err(e) => {
                error!("チェックポイント読み込みエラー: {}", e);
                fallback
            }
        }
    }

    /// チェックポイントを上書き保存 (非アトミック)
    pub fn save_checkpoint(&self, checkpoint: &Checkpoint) -> Result<(), ScraperError> {
        ensure_parent(&self.checkpoint_path)?;
        let json = serde_json::to_string(checkpoint)?;
        std::fs::write(&self.checkpoint_path, json)?;
        Ok(())
    }

    /// データセットを読み込み、メール重複集合を同時に再構築する
    pub fn load_dataset(&self) -> (Vec<Record>, DedupSet) {
        if !self.dataset_path.exists() {
            return (Vec::new(), DedupSet::default());
        }

        match read_json::<Vec<Record>>(&self.dataset_path) {
            Ok(records) => {
                let seen = DedupSet::from_records(&records);
                info!("既存レコード {} 件を読み込みました", records.len());
                (records, seen)
            }
            Err(e) => {
                error!("既存データ読み込みエラー: {}", e);
                (Vec::new(), DedupSet::default())
            }
        }
    }

    /// データセット全体を上書き保存する。空なら何もしない。
    pub fn save_dataset(&self, records: &[Record]) -> Result<(), ScraperError> {
        if records.is_empty() {
            return Ok(());
        }
        ensure_parent(&self.dataset_path)?;
        let json = serde_json::to_string_pretty(records)?;
        std::fs::write(&self.dataset_path, json)?;
        info!(
            "{} 件を {} に保存しました",
            records.len(),
            self.dataset_path.display()
        );
        Ok(())
    }

    /// ループ内の定期保存用。失敗はログのみ。
    pub fn flush_dataset(&self, records: &[Record]) {
        if let Err(e) = self.save_dataset(records) {
            warn!("データ保存エラー: {}", e);
        }
    }
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, ScraperError> {
    let raw = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&raw)?)
}

fn ensure_parent(path: &Path) -> Result<(), ScraperError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}

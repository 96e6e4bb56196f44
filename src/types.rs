//! 巡回エンジンの型定義

use serde::{Deserialize, Serialize};

/// 請求書ページから抽出した連絡先レコード
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    #[serde(rename = "Invoice #")]
    pub invoice_number: String,
    #[serde(rename = "Date")]
    pub date: String,
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "Email")]
    pub email: String,
    #[serde(rename = "Company")]
    pub company: String,
    #[serde(rename = "Address")]
    pub address: String,
    /// 予約フィールド (常に空)
    #[serde(rename = "Phone #", default)]
    pub phone: String,
}

/// 1ページ分の抽出結果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageOutcome {
    Record(Record),
    /// このIDには使えるレコードが無い
    Blank,
}

impl PageOutcome {
    pub fn is_blank(&self) -> bool {
        matches!(self, PageOutcome::Blank)
    }
}

/// 再開用チェックポイント
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub last_invoice_id: u64,
    #[serde(default)]
    pub total_records: u64,
}

/// 取得モード
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Mode {
    /// HTTPセッション
    #[default]
    Fast,
    /// ブラウザ自動化
    Visual,
}

impl Mode {
    pub fn from_visual(visual: bool) -> Self {
        if visual {
            Mode::Visual
        } else {
            Mode::Fast
        }
    }

    pub fn is_visual(self) -> bool {
        self == Mode::Visual
    }

    pub fn label(self) -> &'static str {
        match self {
            Mode::Fast => "Fast",
            Mode::Visual => "Visual",
        }
    }
}

/// status() の戻り値
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusSnapshot {
    pub is_running: bool,
    pub current_id: u64,
    pub total_records: u64,
    pub blank_count: u64,
    pub visual_mode: bool,
}

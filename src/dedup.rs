use std::collections::HashSet;

use crate::types::Record;

/// 既出メールアドレスの集合
///
/// 永続化はせず、読み込んだデータセットから再構築する。空のメールは対象外。
#[derive(Debug, Clone, Default)]
pub struct DedupSet {
    emails: HashSet<String>,
}

impl DedupSet {
    pub fn from_records(records: &[Record]) -> Self {
        let mut set = Self::default();
        for record in records {
            set.insert(&record.email);
        }
        set
    }

    pub fn is_duplicate(&self, email: &str) -> bool {
        !email.is_empty() && self.emails.contains(email)
    }

    /// 空でなければ追加する
    pub fn insert(&mut self, email: &str) {
        if !email.is_empty() {
            self.emails.insert(email.to_string());
        }
    }

    pub fn len(&self) -> usize {
        self.emails.len()
    }

    pub fn is_empty(&self) -> bool {
        self.emails.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(email: &str) -> Record {
        Record {
            invoice_number: "1".into(),
            date: String::new(),
            name: String::new(),
            email: email.into(),
            company: String::new(),
            address: String::new(),
            phone: String::new(),
        }
    }

    #[test]
    fn test_rebuild_skips_empty_emails() {
        let set = DedupSet::from_records(&[record("a@x.com"), record(""), record("a@x.com")]);
        assert_eq!(set.len(), 1);
        assert!(set.is_duplicate("a@x.com"));
        assert!(!set.is_duplicate(""));
    }

    #[test]
    fn test_empty_email_never_duplicate() {
        let mut set = DedupSet::default();
        set.insert("");
        assert!(set.is_empty());
        assert!(!set.is_duplicate(""));
    }
}

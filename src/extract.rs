//! 請求書ページのHTMLからレコードを抽出する
//!
//! ラベル文字列を含むテキストを探し、そのセル (`td`) の右隣のセルの値を読む。

use scraper::{ElementRef, Html};

use crate::types::{PageOutcome, Record};

const INVOICE_LABEL: &str = "Invoice #";
const DATE_LABEL: &str = "Date:";
const COMPANY_LABEL: &str = "Company :";
const NAME_LABEL: &str = "Name:";
const EMAIL_LABEL: &str = "Email:";
const ADDRESS_LABEL: &str = "Address:";

/// HTMLを解析して1件のレコード、またはブランクを返す
///
/// 請求書番号が空なら他の項目があってもブランク扱い。
pub fn extract_record(html: &str) -> PageOutcome {
    let document = Html::parse_document(html);

    let invoice_number = labeled_value(&document, INVOICE_LABEL);
    if invoice_number.is_empty() {
        return PageOutcome::Blank;
    }

    PageOutcome::Record(Record {
        invoice_number,
        date: labeled_value(&document, DATE_LABEL),
        name: labeled_value(&document, NAME_LABEL),
        email: labeled_value(&document, EMAIL_LABEL),
        company: labeled_value(&document, COMPANY_LABEL),
        address: labeled_value(&document, ADDRESS_LABEL),
        phone: String::new(),
    })
}

/// ラベルを含む最初のテキストノード → 親の `td` → 次の兄弟 `td` のテキスト
fn labeled_value(document: &Html, label: &str) -> String {
    let label_node = document.root_element().descendants().find(|node| {
        node.value()
            .as_text()
            .map(|text| text.contains(label))
            .unwrap_or(false)
    });
    let Some(label_node) = label_node else {
        return String::new();
    };

    let cell = label_node
        .ancestors()
        .filter_map(ElementRef::wrap)
        .find(|el| el.value().name() == "td");
    let Some(cell) = cell else {
        return String::new();
    };

    cell.next_siblings()
        .filter_map(ElementRef::wrap)
        .find(|el| el.value().name() == "td")
        .map(|value_cell| cell_text(&value_cell))
        .unwrap_or_default()
}

fn cell_text(cell: &ElementRef<'_>) -> String {
    cell.text()
        .map(str::trim)
        .filter(|piece| !piece.is_empty())
        .collect::<String>()
}

use invoice_harvester::{extract_record, PageOutcome};

const INVOICE_HTML: &str = r#"<!DOCTYPE html>
<html>
<head><title>Invoice Detail</title></head>
<body>
  <div class="header"><a href="logout.php">Logout</a></div>
  <table class="invoice-meta">
    <tr>
      <td><strong>Invoice #</strong></td>
      <td> 158696 </td>
    </tr>
    <tr>
      <td><strong>Date:</strong></td>
      <td>24-02-2025</td>
    </tr>
  </table>
  <h3>Bill To</h3>
  <table class="bill-to">
    <tr><td>Company :</td><td>JMV Graphix</td></tr>
    <tr><td>Name:</td><td>John</td></tr>
    <tr><td>Email:</td><td>jmvgraphix@mediacombb.net</td></tr>
    <tr>
      <td>Address:</td>
      <td>
        154 N Long St<br>
        Fremont, OH 43420
      </td>
    </tr>
  </table>
</body>
</html>"#;

#[test]
fn extracts_all_labeled_fields() {
    let record = match extract_record(INVOICE_HTML) {
        PageOutcome::Record(record) => record,
        PageOutcome::Blank => panic!("expected a record"),
    };

    assert_eq!(record.invoice_number, "158696");
    assert_eq!(record.date, "24-02-2025");
    assert_eq!(record.company, "JMV Graphix");
    assert_eq!(record.name, "John");
    assert_eq!(record.email, "jmvgraphix@mediacombb.net");
    assert!(record.address.contains("154 N Long St"));
    assert_eq!(record.phone, "");
}

#[test]
fn missing_invoice_label_yields_blank() {
    let html = INVOICE_HTML.replace("Invoice #", "Order No");
    assert_eq!(extract_record(&html), PageOutcome::Blank);
}

#[test]
fn portal_error_page_yields_blank() {
    let html = r#"<html><body><div class="alert">Invoice not found</div></body></html>"#;
    assert!(extract_record(html).is_blank());
}

//! SessionTransport をモックポータル (wiremock) に対して検証する

use invoice_harvester::{HarvestConfig, ScraperError, SessionTransport, Transport};
use wiremock::matchers::{body_string_contains, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const INVOICE_PAGE: &str = r#"<html><body><table>
    <tr><td>Invoice #</td><td>158696</td></tr>
    <tr><td>Email:</td><td>jmvgraphix@mediacombb.net</td></tr>
</table></body></html>"#;

const LOGIN_PAGE: &str = r#"<html><body><form method="post">
    <input name="Uname"><input name="password" type="password">
</form></body></html>"#;

fn transport_for(server: &MockServer) -> SessionTransport {
    let config = HarvestConfig::new(server.uri(), "user", "secret");
    SessionTransport::new(config).expect("client builds")
}

async fn mount_login_ok(server: &MockServer, expected_calls: u64) {
    Mock::given(method("POST"))
        .and(path("/index.php"))
        .and(body_string_contains("Uname=user"))
        .and(body_string_contains("password=secret"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("set-cookie", "PHPSESSID=abc123; Path=/")
                .set_body_string("<html>Welcome</html>"),
        )
        .expect(expected_calls)
        .mount(server)
        .await;
}

#[tokio::test]
async fn authenticate_succeeds_with_session_cookie() {
    let server = MockServer::start().await;
    mount_login_ok(&server, 1).await;

    let mut transport = transport_for(&server);
    transport.authenticate().await.expect("login ok");
}

#[tokio::test]
async fn authenticate_succeeds_with_logout_marker() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/index.php"))
        .respond_with(
            ResponseTemplate::new(200).set_body_string(r#"<a href="logout.php">Logout</a>"#),
        )
        .mount(&server)
        .await;

    let mut transport = transport_for(&server);
    transport.authenticate().await.expect("login ok");
}

#[tokio::test]
async fn authenticate_fails_without_marker() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/index.php"))
        .respond_with(ResponseTemplate::new(200).set_body_string("Invalid credentials"))
        .mount(&server)
        .await;

    let mut transport = transport_for(&server);
    let result = transport.authenticate().await;
    assert!(matches!(result, Err(ScraperError::Login(_))));
}

#[tokio::test]
async fn fetch_returns_document() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/invoiceDetail.php"))
        .and(query_param("invoiceId", "158696"))
        .respond_with(ResponseTemplate::new(200).set_body_string(INVOICE_PAGE))
        .mount(&server)
        .await;

    let mut transport = transport_for(&server);
    let url = format!("{}/invoiceDetail.php?invoiceId=158696", server.uri());
    let document = transport.fetch(&url).await.expect("fetch ok");
    assert_eq!(document.as_deref(), Some(INVOICE_PAGE));
}

#[tokio::test]
async fn fetch_relogs_once_after_login_redirect() {
    let server = MockServer::start().await;
    let login_url = format!("{}/index.php", server.uri());

    // 1回目はセッション切れでログインページへ
    Mock::given(method("GET"))
        .and(path("/invoiceDetail.php"))
        .respond_with(ResponseTemplate::new(302).insert_header("location", login_url.as_str()))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/invoiceDetail.php"))
        .respond_with(ResponseTemplate::new(200).set_body_string(INVOICE_PAGE))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/index.php"))
        .respond_with(ResponseTemplate::new(200).set_body_string(LOGIN_PAGE))
        .mount(&server)
        .await;
    mount_login_ok(&server, 1).await;

    let mut transport = transport_for(&server);
    let url = format!("{}/invoiceDetail.php?invoiceId=158696", server.uri());
    let document = transport.fetch(&url).await.expect("fetch ok");
    assert_eq!(document.as_deref(), Some(INVOICE_PAGE));
}

#[tokio::test]
async fn fetch_gives_up_when_relogin_fails() {
    let server = MockServer::start().await;
    let login_url = format!("{}/index.php", server.uri());

    Mock::given(method("GET"))
        .and(path("/invoiceDetail.php"))
        .respond_with(ResponseTemplate::new(302).insert_header("location", login_url.as_str()))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/index.php"))
        .respond_with(ResponseTemplate::new(200).set_body_string(LOGIN_PAGE))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/index.php"))
        .respond_with(ResponseTemplate::new(200).set_body_string("Invalid credentials"))
        .expect(1)
        .mount(&server)
        .await;

    let mut transport = transport_for(&server);
    let url = format!("{}/invoiceDetail.php?invoiceId=1", server.uri());
    let document = transport.fetch(&url).await.expect("no transport error");
    assert!(document.is_none());
}

#[tokio::test]
async fn fetch_relogs_when_portal_lives_under_base_path() {
    let server = MockServer::start().await;
    let base = format!("{}/portal", server.uri());
    let login_url = format!("{}/index.php", base);

    Mock::given(method("GET"))
        .and(path("/portal/invoiceDetail.php"))
        .respond_with(ResponseTemplate::new(302).insert_header("location", login_url.as_str()))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/portal/invoiceDetail.php"))
        .respond_with(ResponseTemplate::new(200).set_body_string(INVOICE_PAGE))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/portal/index.php"))
        .respond_with(ResponseTemplate::new(200).set_body_string(LOGIN_PAGE))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/portal/index.php"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("set-cookie", "PHPSESSID=abc123; Path=/")
                .set_body_string("<html>Welcome</html>"),
        )
        .expect(1)
        .mount(&server)
        .await;

    let config = HarvestConfig::new(base.as_str(), "user", "secret");
    let mut transport = SessionTransport::new(config).expect("client builds");
    let url = format!("{}/invoiceDetail.php?invoiceId=158696", base);
    let document = transport.fetch(&url).await.expect("fetch ok");
    assert_eq!(document.as_deref(), Some(INVOICE_PAGE));
}

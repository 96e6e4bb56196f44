use invoice_harvester::{HarvestConfig, Harvester, Mode};

#[tokio::main]
async fn main() {
    // ログ設定
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,invoice_harvester=debug".into()),
        )
        .init();

    // 環境変数から設定を取得 (TARGET_URL, SCRAPER_USERNAME, SCRAPER_PASSWORD, ...)
    let config = HarvestConfig::from_env();
    let visual = std::env::args().any(|arg| arg == "--visual");

    let harvester = Harvester::new(config).expect("Failed to create harvester");

    println!("=== Invoice Harvester ===");

    match harvester.start(Mode::from_visual(visual)).await {
        Ok(outcome) => println!("起動: {:?}", outcome),
        Err(e) => {
            eprintln!("エラー: {}", e);
            return;
        }
    }

    // Ctrl-C で停止要求
    let stopper = harvester.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            println!("停止要求を送信...");
            stopper.stop();
        }
    });

    harvester.wait().await;

    let status = harvester.status();
    println!(
        "終了: current_id={}, total_records={}, blank_count={}",
        status.current_id, status.total_records, status.blank_count
    );
}

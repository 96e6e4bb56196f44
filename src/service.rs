use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use serde::{Deserialize, Serialize};
use tower::Service;
use tracing::info;

use crate::engine::{Harvester, StartOutcome};
use crate::error::ScraperError;
use crate::types::{Mode, StatusSnapshot};

/// 制御リクエスト
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ControlRequest {
    Start { visual_mode: bool },
    SetMode { visual_mode: bool },
    Stop,
    Status,
}

/// 制御レスポンス
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ControlResponse {
    Message(String),
    Status(StatusSnapshot),
}

impl ControlResponse {
    pub fn message(&self) -> Option<&str> {
        match self {
            ControlResponse::Message(message) => Some(message),
            ControlResponse::Status(_) => None,
        }
    }
}

/// tower::Serviceを実装したエンジン制御サービス
///
/// HTTPなどの外部インターフェースはこのサービスに要求を流す。
#[derive(Clone)]
pub struct ControlService {
    harvester: Harvester,
}

impl ControlService {
    pub fn new(harvester: Harvester) -> Self {
        Self { harvester }
    }

    pub fn harvester(&self) -> &Harvester {
        &self.harvester
    }
}

impl Service<ControlRequest> for ControlService {
    type Response = ControlResponse;
    type Error = ScraperError;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: ControlRequest) -> Self::Future {
        info!("制御リクエスト受信: {:?}", req);
        let harvester = self.harvester.clone();

        Box::pin(async move {
            let response = match req {
                ControlRequest::Start { visual_mode } => {
                    match harvester.start(Mode::from_visual(visual_mode)).await? {
                        StartOutcome::Started(mode) => ControlResponse::Message(format!(
                            "Scraper started in {} mode",
                            mode.label()
                        )),
                        StartOutcome::AlreadyRunning => {
                            ControlResponse::Message("Scraper is already running".into())
                        }
                    }
                }
                ControlRequest::SetMode { visual_mode } => {
                    let mode = Mode::from_visual(visual_mode);
                    harvester.set_mode(mode).await;
                    ControlResponse::Message(format!("Switched to {} mode", mode.label()))
                }
                ControlRequest::Stop => {
                    harvester.stop();
                    ControlResponse::Message("Stopping scraper...".into())
                }
                ControlRequest::Status => ControlResponse::Status(harvester.status()),
            };
            Ok(response)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_control_request_json() {
        let req: ControlRequest =
            serde_json::from_str(r#"{"Start":{"visual_mode":true}}"#).unwrap();
        assert_eq!(req, ControlRequest::Start { visual_mode: true });
    }

    #[test]
    fn test_response_message() {
        let resp = ControlResponse::Message("Stopping scraper...".into());
        assert_eq!(resp.message(), Some("Stopping scraper..."));
    }
}

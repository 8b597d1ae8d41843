#![allow(dead_code)]

use paysession::application::orchestrator::SessionOrchestrator;
use paysession::config::{AppConfig, OrchestratorSettings};
use paysession::domain::session::{CustomerId, SessionKind};
use paysession::infrastructure::headless::ScriptedFlow;
use paysession::infrastructure::in_memory::InMemorySecretFetcher;
use std::collections::HashMap;
use std::net::TcpListener;
use std::time::Duration;
use wiremock::MockServer;

/// Path prefix the secret endpoints are mounted under on the mock backend.
pub const API_PREFIX: &str = "/api/payment/stripe";

/// The base URL pointing at `API_PREFIX` on a mock backend.
pub fn base_url(server: &MockServer) -> String {
    format!("{}{API_PREFIX}", server.uri())
}

/// The full mock path of one endpoint, e.g. `endpoint_path("create-setup-intent")`.
pub fn endpoint_path(endpoint: &str) -> String {
    format!("{API_PREFIX}/{endpoint}")
}

/// A loopback URL nothing listens on.
pub fn unreachable_base_url() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{addr}")
}

pub fn config(pairs: &[(&str, &str)]) -> AppConfig {
    let map: HashMap<String, String> = pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    AppConfig::from_lookup(|key| map.get(key).cloned()).unwrap()
}

pub fn customer() -> CustomerId {
    CustomerId::new("cus_xxx").unwrap()
}

pub fn orchestrator(
    kind: SessionKind,
    fetcher: InMemorySecretFetcher,
    flow: ScriptedFlow,
) -> SessionOrchestrator {
    orchestrator_with(kind, fetcher, flow, OrchestratorSettings::default())
}

pub fn orchestrator_with(
    kind: SessionKind,
    fetcher: InMemorySecretFetcher,
    flow: ScriptedFlow,
    settings: OrchestratorSettings,
) -> SessionOrchestrator {
    SessionOrchestrator::new(kind, customer(), Box::new(fetcher), Box::new(flow), settings)
}

/// Polls until the orchestrator reaches a state matching `pred`.
pub async fn wait_for_state<F>(orchestrator: &SessionOrchestrator, pred: F)
where
    F: Fn(&paysession::domain::session::FlowState) -> bool,
{
    for _ in 0..500 {
        if pred(&orchestrator.state()) {
            return;
        }
        tokio::time::sleep(Duration::from_millis(2)).await;
    }
    panic!("orchestrator stuck in {}", orchestrator.state());
}

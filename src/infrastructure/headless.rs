//! Headless stand-ins for the UI runtime and the provider flow.
//!
//! `HeadlessHost` answers the surface query without a window system and
//! `ScriptedFlow` plays back a fixed outcome. Together they let the CLI and the
//! tests drive a full session cycle.

use crate::domain::outcome::{CompletionPayload, FlowOutcome, OutcomeReporter};
use crate::domain::ports::{ExternalFlow, PresentationHost};
use crate::domain::presentation::{FlowRequest, Surface};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tracing::debug;

const HEADLESS_SURFACE: &str = "headless";

#[derive(Debug, Clone)]
pub struct HeadlessHost {
    available: Arc<AtomicBool>,
}

impl HeadlessHost {
    pub fn available() -> Self {
        Self {
            available: Arc::new(AtomicBool::new(true)),
        }
    }

    pub fn unavailable() -> Self {
        Self {
            available: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Simulates the app moving to or from the background.
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }
}

impl PresentationHost for HeadlessHost {
    fn current_surface(&self) -> Option<Surface> {
        self.available
            .load(Ordering::SeqCst)
            .then(|| Surface::new(HEADLESS_SURFACE))
    }
}

#[derive(Debug, Clone)]
enum Script {
    Report(FlowOutcome),
    /// Keeps the reporter without ever reporting.
    Hold,
    /// Drops the reporter without reporting.
    Drop,
}

/// A provider flow that reports a predetermined outcome.
///
/// The outcome is delivered from a spawned task, after an optional delay, the
/// same way a real SDK calls back asynchronously. Clones share the launch log.
#[derive(Debug, Clone)]
pub struct ScriptedFlow {
    script: Script,
    delay: Duration,
    launches: Arc<Mutex<Vec<FlowRequest>>>,
    held: Arc<Mutex<Vec<OutcomeReporter>>>,
}

impl ScriptedFlow {
    fn scripted(script: Script) -> Self {
        Self {
            script,
            delay: Duration::ZERO,
            launches: Arc::default(),
            held: Arc::default(),
        }
    }

    pub fn reporting(outcome: FlowOutcome) -> Self {
        Self::scripted(Script::Report(outcome))
    }

    pub fn completing(payload: Option<CompletionPayload>) -> Self {
        Self::reporting(FlowOutcome::Completed(payload))
    }

    pub fn canceling() -> Self {
        Self::reporting(FlowOutcome::Canceled)
    }

    pub fn failing(reason: impl Into<String>) -> Self {
        Self::reporting(FlowOutcome::Failed(reason.into()))
    }

    /// Never reports; the reporters are kept for [`ScriptedFlow::held_reporter`].
    pub fn silent() -> Self {
        Self::scripted(Script::Hold)
    }

    /// Drops the reporter without reporting, like a flow torn down mid-way.
    pub fn abandoning() -> Self {
        Self::scripted(Script::Drop)
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn launches(&self) -> Vec<FlowRequest> {
        self.launches
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn launch_count(&self) -> usize {
        self.launches
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// The raw secrets handed to each launch, in order.
    pub fn launched_secrets(&self) -> Vec<String> {
        self.launches()
            .iter()
            .map(|request| request.secret.expose().to_string())
            .collect()
    }

    /// A reporter kept by a silent flow, to report (or misreport) by hand.
    pub fn held_reporter(&self, index: usize) -> Option<OutcomeReporter> {
        self.held
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(index)
            .cloned()
    }
}

impl ExternalFlow for ScriptedFlow {
    fn launch(&self, request: FlowRequest, reporter: OutcomeReporter) {
        debug!(
            presentation = %request.presentation,
            kind = %request.kind,
            secret = %request.secret,
            "Scripted flow launched"
        );
        self.launches
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(request);

        match &self.script {
            Script::Report(outcome) => {
                let outcome = outcome.clone();
                let delay = self.delay;
                tokio::spawn(async move {
                    if !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }
                    let _ = reporter.report(outcome);
                });
            }
            Script::Hold => self
                .held
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(reporter),
            Script::Drop => drop(reporter),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::presentation::SheetConfiguration;
    use crate::domain::session::{ClientSecret, PresentationId, SessionKind};

    fn request(presentation: u64) -> FlowRequest {
        FlowRequest {
            presentation: PresentationId(presentation),
            kind: SessionKind::Payment,
            secret: ClientSecret::new("pi_1_secret_2").unwrap(),
            surface: Surface::new("test"),
            sheet: SheetConfiguration::default(),
        }
    }

    #[test]
    fn test_headless_host_availability() {
        let host = HeadlessHost::available();
        assert_eq!(host.current_surface(), Some(Surface::new("headless")));

        host.set_available(false);
        assert_eq!(host.current_surface(), None);
        assert_eq!(HeadlessHost::unavailable().current_surface(), None);
    }

    #[tokio::test]
    async fn test_scripted_flow_reports_outcome() {
        let flow = ScriptedFlow::failing("declined");
        let (reporter, rx) = OutcomeReporter::channel(PresentationId(1));

        flow.launch(request(1), reporter);

        assert_eq!(rx.await.unwrap(), FlowOutcome::Failed("declined".into()));
        assert_eq!(flow.launched_secrets(), vec!["pi_1_secret_2".to_string()]);
    }

    #[tokio::test]
    async fn test_silent_flow_holds_reporter() {
        let flow = ScriptedFlow::silent();
        let (reporter, rx) = OutcomeReporter::channel(PresentationId(1));

        flow.launch(request(1), reporter);
        flow.held_reporter(0)
            .unwrap()
            .report(FlowOutcome::Canceled)
            .unwrap();

        assert_eq!(rx.await.unwrap(), FlowOutcome::Canceled);
        assert!(flow.held_reporter(1).is_none());
    }
}

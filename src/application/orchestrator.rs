use super::result_handler::ResultHandler;
use crate::config::OrchestratorSettings;
use crate::domain::outcome::{FlowOutcome, OutcomeReporter, WeakReporter};
use crate::domain::ports::{ExternalFlowBox, PresentationHost, SecretFetcherBox};
use crate::domain::presentation::FlowRequest;
use crate::domain::session::{CustomerId, FlowState, PresentationId, Session, SessionKind};
use crate::error::{Result, SessionError};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tokio::time::timeout;
use tracing::{debug, info, instrument, warn};

/// Drives one provider flow: fetch a secret, present the flow, record the outcome.
///
/// The orchestrator exclusively owns its [`Session`]. Every transition happens
/// under a mutex that is never held across an `.await`, so transitions are
/// serialized even when the outcome arrives from another task. Share it through
/// an `Arc` when the host needs to call [`SessionOrchestrator::dismiss`] while a
/// presentation is awaited.
pub struct SessionOrchestrator {
    kind: SessionKind,
    customer: CustomerId,
    fetcher: SecretFetcherBox,
    flow: ExternalFlowBox,
    settings: OrchestratorSettings,
    handler: ResultHandler,
    session: Mutex<Session>,
    active: Mutex<Option<WeakReporter>>,
    presentations: AtomicU64,
}

impl SessionOrchestrator {
    /// Creates an idle orchestrator for `kind`.
    ///
    /// # Arguments
    ///
    /// * `customer` - The customer secrets are requested for.
    /// * `fetcher` - Source of client secrets.
    /// * `flow` - The provider flow presented once a secret is available.
    /// * `settings` - Watchdog timeouts and sheet configuration.
    pub fn new(
        kind: SessionKind,
        customer: CustomerId,
        fetcher: SecretFetcherBox,
        flow: ExternalFlowBox,
        settings: OrchestratorSettings,
    ) -> Self {
        Self {
            kind,
            customer,
            fetcher,
            flow,
            settings,
            handler: ResultHandler::new(),
            session: Mutex::new(Session::new(kind)),
            active: Mutex::new(None),
            presentations: AtomicU64::new(0),
        }
    }

    pub fn kind(&self) -> SessionKind {
        self.kind
    }

    /// A snapshot of the session for rendering.
    pub fn session(&self) -> Session {
        self.lock().clone()
    }

    pub fn state(&self) -> FlowState {
        self.lock().state().clone()
    }

    pub fn external_id(&self) -> Option<String> {
        self.lock().external_id().map(str::to_string)
    }

    /// Fetches a fresh client secret. Idle -> Fetching -> Ready.
    ///
    /// Rejected with [`SessionError::InvalidState`] unless the session is idle,
    /// which includes a second call while a fetch is still in flight. On any
    /// failure, including the watchdog expiring, the session returns to idle.
    #[instrument(skip_all, fields(kind = %self.kind))]
    pub async fn fetch(&self) -> Result<()> {
        self.lock().begin_fetch()?;
        let mut guard = FetchGuard {
            session: &self.session,
            armed: true,
        };

        debug!(customer = %self.customer, "Requesting client secret");
        let waited = timeout(
            self.settings.fetch_timeout,
            self.fetcher.fetch(self.kind, &self.customer),
        )
        .await;
        let fetched = match waited {
            Ok(result) => result,
            Err(_) => Err(SessionError::Network(format!(
                "secret request timed out after {}s",
                self.settings.fetch_timeout.as_secs_f32()
            ))),
        };
        guard.armed = false;

        let mut session = self.lock();
        match fetched {
            Ok(secret) => {
                let redacted = secret.redacted();
                session.complete_fetch(secret)?;
                info!(secret = %redacted, "Session ready");
                Ok(())
            }
            Err(e) => {
                session.abort_fetch();
                warn!(error = %e, "Secret fetch failed");
                Err(e)
            }
        }
    }

    /// Presents the provider flow on the host's surface and waits for its outcome.
    ///
    /// Returns the terminal state for a completed or canceled flow and
    /// [`SessionError::SdkFailure`] when the flow reports a failure. The
    /// presentation resolves as canceled when the host is dismissed, the
    /// watchdog expires, the flow drops its reporter, or this future is dropped.
    ///
    /// A failed flow leaves the session in [`FlowState::Failed`] rather than
    /// idle. Call [`SessionOrchestrator::retry`] (or `reset` then `fetch`)
    /// before presenting again; the spent secret is never reused.
    #[instrument(skip_all, fields(kind = %self.kind))]
    pub async fn present(&self, host: &dyn PresentationHost) -> Result<FlowState> {
        self.lock().check_presentable()?;

        // Queried without holding the session lock; the host may call back in.
        let Some(surface) = host.current_surface() else {
            warn!("No presentation host available");
            return Err(SessionError::NoHost);
        };

        let presentation = PresentationId(self.presentations.fetch_add(1, Ordering::Relaxed) + 1);
        let (reporter, mut outcome_rx) = OutcomeReporter::channel(presentation);
        let secret = {
            let mut session = self.lock();
            let secret = session.begin_presentation(presentation)?;
            // Registered before the session lock is released, so a dismissal
            // that observes Presenting always finds the reporter.
            *self.active() = Some(reporter.downgrade());
            secret
        };
        let mut guard = PresentationGuard {
            orchestrator: self,
            presentation,
            armed: true,
        };

        info!(%presentation, surface = %surface.id, "Presenting flow");
        self.flow.launch(
            FlowRequest {
                presentation,
                kind: self.kind,
                secret,
                surface,
                sheet: self.settings.sheet.clone(),
            },
            reporter,
        );

        let waited = timeout(self.settings.presentation_timeout, &mut outcome_rx).await;
        let outcome = match waited {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(_)) => {
                warn!(%presentation, "Flow ended without reporting an outcome");
                FlowOutcome::Canceled
            }
            Err(_) => {
                warn!(
                    %presentation,
                    timeout_secs = self.settings.presentation_timeout.as_secs(),
                    "Presentation watchdog expired"
                );
                // Loses to an outcome the flow managed to report first.
                let _ = self.resolve_active(FlowOutcome::Canceled);
                outcome_rx.await.unwrap_or(FlowOutcome::Canceled)
            }
        };
        guard.armed = false;
        self.active().take();

        let state = self
            .handler
            .apply(&mut self.lock(), presentation, outcome)?;
        match state {
            FlowState::Failed(reason) => Err(SessionError::SdkFailure(reason)),
            state => Ok(state),
        }
    }

    /// Signals that the host was dismissed before the flow reported.
    ///
    /// Resolves the in-flight presentation as canceled. Returns `false` when
    /// nothing was presenting or the flow had already reported. Once the session
    /// is observably presenting, a dismissal is never lost.
    pub fn dismiss(&self) -> bool {
        let resolved = self.resolve_active(FlowOutcome::Canceled).unwrap_or(false);
        if resolved {
            info!(kind = %self.kind, "Host dismissed; presentation canceled");
        }
        resolved
    }

    /// Terminal, ready or idle -> idle. Discards any unused secret.
    pub fn reset(&self) -> Result<()> {
        let mut session = self.lock();
        session.reset()?;
        debug!(kind = %self.kind, "Session reset");
        Ok(())
    }

    /// Resets the session and fetches a fresh secret.
    pub async fn retry(&self) -> Result<()> {
        self.reset()?;
        self.fetch().await
    }

    fn resolve_active(&self, outcome: FlowOutcome) -> Result<bool> {
        let active = self.active().clone();
        match active {
            Some(reporter) => reporter.report(outcome).map(|()| true),
            None => Ok(false),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Session> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn active(&self) -> MutexGuard<'_, Option<WeakReporter>> {
        self.active.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Returns the session to idle if a fetch future is dropped mid-flight.
struct FetchGuard<'a> {
    session: &'a Mutex<Session>,
    armed: bool,
}

impl Drop for FetchGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            warn!("Secret fetch abandoned");
            self.session
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .abort_fetch();
        }
    }
}

/// Cancels the presentation if the `present` future is dropped before an outcome.
struct PresentationGuard<'a> {
    orchestrator: &'a SessionOrchestrator,
    presentation: PresentationId,
    armed: bool,
}

impl Drop for PresentationGuard<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        warn!(presentation = %self.presentation, "Presentation abandoned");
        self.orchestrator.active().take();
        let _ = self.orchestrator.handler.apply(
            &mut self.orchestrator.lock(),
            self.presentation,
            FlowOutcome::Canceled,
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::headless::{HeadlessHost, ScriptedFlow};
    use crate::infrastructure::in_memory::InMemorySecretFetcher;

    fn orchestrator(fetcher: InMemorySecretFetcher, flow: ScriptedFlow) -> SessionOrchestrator {
        SessionOrchestrator::new(
            SessionKind::CardSetup,
            CustomerId::new("cus_test").unwrap(),
            Box::new(fetcher),
            Box::new(flow),
            OrchestratorSettings::default(),
        )
    }

    #[tokio::test]
    async fn test_fetch_then_present_completes() {
        let flow = ScriptedFlow::completing(None);
        let orch = orchestrator(InMemorySecretFetcher::with_secret("seti_1_secret"), flow.clone());

        orch.fetch().await.unwrap();
        assert_eq!(orch.state(), FlowState::Ready);

        let state = orch.present(&HeadlessHost::available()).await.unwrap();
        assert_eq!(state, FlowState::Completed);
        assert_eq!(flow.launched_secrets(), vec!["seti_1_secret".to_string()]);
        assert!(orch.session().secret().is_none());
    }

    #[tokio::test]
    async fn test_failed_fetch_returns_to_idle() {
        let fetcher = InMemorySecretFetcher::new();
        fetcher.push_err(SessionError::Server { status: 500 });
        let orch = orchestrator(fetcher, ScriptedFlow::canceling());

        assert_eq!(orch.fetch().await, Err(SessionError::Server { status: 500 }));
        assert_eq!(orch.state(), FlowState::Idle);
    }

    #[tokio::test]
    async fn test_sdk_failure_is_reported_and_retry_allowed() {
        let fetcher = InMemorySecretFetcher::with_secrets(["sec_a", "sec_b"]);
        let flow = ScriptedFlow::failing("authentication required");
        let orch = orchestrator(fetcher, flow.clone());

        orch.fetch().await.unwrap();
        let err = orch.present(&HeadlessHost::available()).await.unwrap_err();
        assert_eq!(err, SessionError::SdkFailure("authentication required".into()));
        assert_eq!(orch.state(), FlowState::Failed("authentication required".into()));

        orch.retry().await.unwrap();
        assert_eq!(orch.state(), FlowState::Ready);
        assert_eq!(orch.session().secret().unwrap().expose(), "sec_b");
    }

    #[tokio::test]
    async fn test_dismiss_without_presentation_is_noop() {
        let orch = orchestrator(
            InMemorySecretFetcher::with_secret("sec_1"),
            ScriptedFlow::canceling(),
        );
        assert!(!orch.dismiss());
        assert_eq!(orch.state(), FlowState::Idle);
    }
}

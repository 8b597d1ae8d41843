use super::session::PresentationId;
use crate::error::{Result, SessionError};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::oneshot;
use tracing::warn;

/// Data a completed flow may hand back, e.g. the bank accounts a user linked.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CompletionPayload {
    pub account_ids: Vec<String>,
}

impl CompletionPayload {
    pub fn with_account(account_id: impl Into<String>) -> Self {
        Self {
            account_ids: vec![account_id.into()],
        }
    }

    /// The identifier recorded on the session: the first non-empty account id.
    pub fn external_id(&self) -> Option<&str> {
        self.account_ids
            .iter()
            .map(|id| id.trim())
            .find(|id| !id.is_empty())
    }
}

/// Terminal result of a presented provider flow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlowOutcome {
    Completed(Option<CompletionPayload>),
    Canceled,
    Failed(String),
}

struct ReporterSlot {
    presentation: PresentationId,
    sender: Mutex<Option<oneshot::Sender<FlowOutcome>>>,
}

/// Single-resolution channel from the provider flow back to the orchestrator.
///
/// Clones share one slot: the first [`OutcomeReporter::report`] is delivered and
/// every later call is rejected with [`SessionError::DuplicateOutcome`].
#[derive(Clone)]
pub struct OutcomeReporter {
    slot: Arc<ReporterSlot>,
}

/// Weak handle the orchestrator keeps so a dropped reporter closes the channel.
#[derive(Clone)]
pub(crate) struct WeakReporter {
    slot: std::sync::Weak<ReporterSlot>,
}

impl OutcomeReporter {
    pub fn channel(presentation: PresentationId) -> (Self, oneshot::Receiver<FlowOutcome>) {
        let (tx, rx) = oneshot::channel();
        let reporter = Self {
            slot: Arc::new(ReporterSlot {
                presentation,
                sender: Mutex::new(Some(tx)),
            }),
        };
        (reporter, rx)
    }

    pub fn presentation(&self) -> PresentationId {
        self.slot.presentation
    }

    pub fn report(&self, outcome: FlowOutcome) -> Result<()> {
        let presentation = self.slot.presentation;
        let sender = self
            .slot
            .sender
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();

        let Some(sender) = sender else {
            warn!(%presentation, ?outcome, "Rejected duplicate outcome callback");
            return Err(SessionError::DuplicateOutcome { presentation });
        };

        sender.send(outcome).map_err(|outcome| {
            warn!(%presentation, ?outcome, "Outcome arrived after the presentation was resolved");
            SessionError::DuplicateOutcome { presentation }
        })
    }

    pub(crate) fn downgrade(&self) -> WeakReporter {
        WeakReporter {
            slot: Arc::downgrade(&self.slot),
        }
    }
}

impl std::fmt::Debug for OutcomeReporter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OutcomeReporter")
            .field("presentation", &self.slot.presentation)
            .finish()
    }
}

impl WeakReporter {
    /// Reports through the live reporter, if the flow still holds one.
    pub(crate) fn report(&self, outcome: FlowOutcome) -> Result<()> {
        match self.slot.upgrade() {
            Some(slot) => OutcomeReporter { slot }.report(outcome),
            None => Ok(()),
        }
    }
}

use crate::domain::outcome::FlowOutcome;
use crate::domain::session::{FlowState, PresentationId, Session};
use crate::error::{Result, SessionError};
use tracing::{info, warn};

/// Applies the outcome of a presentation to its session.
///
/// An outcome is accepted only while its presentation is the one in flight, so
/// a duplicate callback can never overwrite the first result.
#[derive(Debug, Default, Clone, Copy)]
pub struct ResultHandler;

impl ResultHandler {
    pub fn new() -> Self {
        Self
    }

    pub fn apply(
        &self,
        session: &mut Session,
        presentation: PresentationId,
        outcome: FlowOutcome,
    ) -> Result<FlowState> {
        if !session.is_presenting(presentation) {
            warn!(
                kind = %session.kind,
                %presentation,
                state = %session.state(),
                "Ignoring outcome for a presentation that is not in flight"
            );
            return Err(SessionError::DuplicateOutcome { presentation });
        }

        match outcome {
            FlowOutcome::Completed(payload) => {
                let external_id = payload
                    .as_ref()
                    .and_then(|p| p.external_id())
                    .map(str::to_string);
                info!(
                    kind = %session.kind,
                    %presentation,
                    external_id = external_id.as_deref().unwrap_or("-"),
                    "Flow completed"
                );
                session.settle(FlowState::Completed, external_id);
            }
            FlowOutcome::Canceled => {
                info!(kind = %session.kind, %presentation, "Flow canceled");
                session.settle(FlowState::Canceled, None);
            }
            FlowOutcome::Failed(reason) => {
                warn!(kind = %session.kind, %presentation, %reason, "Flow failed");
                session.settle(FlowState::Failed(reason), None);
            }
        }

        Ok(session.state().clone())
    }
}

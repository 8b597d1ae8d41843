use super::outcome::OutcomeReporter;
use super::presentation::{FlowRequest, Surface};
use super::session::{ClientSecret, CustomerId, SessionKind};
use crate::error::Result;
use async_trait::async_trait;

/// Obtains a short-lived client secret from the secret-issuing backend.
#[async_trait]
pub trait SecretFetcher: Send + Sync {
    async fn fetch(&self, kind: SessionKind, customer: &CustomerId) -> Result<ClientSecret>;
}

/// The opaque provider flow (financial connections sheet, payment sheet).
///
/// `launch` must not block: the flow reports its outcome later through the
/// reporter, exactly once.
pub trait ExternalFlow: Send + Sync {
    fn launch(&self, request: FlowRequest, reporter: OutcomeReporter);
}

/// The surrounding UI runtime.
pub trait PresentationHost: Send + Sync {
    /// The surface to present on, or `None` when the app cannot display one.
    fn current_surface(&self) -> Option<Surface>;
}

pub type SecretFetcherBox = Box<dyn SecretFetcher>;
pub type ExternalFlowBox = Box<dyn ExternalFlow>;

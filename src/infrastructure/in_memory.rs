use crate::domain::ports::SecretFetcher;
use crate::domain::session::{ClientSecret, CustomerId, SessionKind};
use crate::error::{Result, SessionError};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::Notify;

/// A secret fetcher that answers from a scripted queue instead of the network.
///
/// Used for tests and for local simulation with a statically configured secret.
/// Each `fetch` pops the next response; an exhausted queue answers with a
/// network error. Clones share the queue and the request log.
#[derive(Default, Clone)]
pub struct InMemorySecretFetcher {
    responses: Arc<Mutex<VecDeque<Result<ClientSecret>>>>,
    requests: Arc<Mutex<Vec<(SessionKind, String)>>>,
    gate: Option<Arc<Notify>>,
}

impl InMemorySecretFetcher {
    /// Creates a fetcher with no scripted responses.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_secret(secret: impl Into<String>) -> Self {
        Self::with_secrets([secret])
    }

    pub fn with_secrets<I, S>(secrets: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let fetcher = Self::new();
        for secret in secrets {
            fetcher.push_ok(secret);
        }
        fetcher
    }

    /// Holds every fetch until [`InMemorySecretFetcher::release`] is called.
    pub fn gated(mut self) -> Self {
        self.gate = Some(Arc::new(Notify::new()));
        self
    }

    /// Lets one held fetch proceed.
    pub fn release(&self) {
        if let Some(gate) = &self.gate {
            gate.notify_one();
        }
    }

    pub fn push_ok(&self, secret: impl Into<String>) {
        self.queue().push_back(ClientSecret::new(secret));
    }

    pub fn push_err(&self, error: SessionError) {
        self.queue().push_back(Err(error));
    }

    /// The `(kind, customer id)` pairs fetched so far.
    pub fn requests(&self) -> Vec<(SessionKind, String)> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn queue(&self) -> std::sync::MutexGuard<'_, VecDeque<Result<ClientSecret>>> {
        self.responses.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl SecretFetcher for InMemorySecretFetcher {
    async fn fetch(&self, kind: SessionKind, customer: &CustomerId) -> Result<ClientSecret> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((kind, customer.as_str().to_string()));

        if let Some(gate) = &self.gate {
            gate.notified().await;
        }

        self.queue().pop_front().unwrap_or_else(|| {
            Err(SessionError::Network(format!(
                "no scripted secret left for {kind}"
            )))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_in_memory_fetcher_pops_in_order() {
        let fetcher = InMemorySecretFetcher::with_secrets(["sec_1", "sec_2"]);
        let customer = CustomerId::new("cus_1").unwrap();

        let first = fetcher.fetch(SessionKind::Payment, &customer).await.unwrap();
        let second = fetcher.fetch(SessionKind::Payment, &customer).await.unwrap();
        assert_eq!(first.expose(), "sec_1");
        assert_eq!(second.expose(), "sec_2");

        let exhausted = fetcher.fetch(SessionKind::Payment, &customer).await;
        assert!(matches!(exhausted, Err(SessionError::Network(_))));

        assert_eq!(fetcher.requests().len(), 3);
        assert_eq!(
            fetcher.requests()[0],
            (SessionKind::Payment, "cus_1".to_string())
        );
    }

    #[tokio::test]
    async fn test_in_memory_fetcher_scripted_error() {
        let fetcher = InMemorySecretFetcher::new();
        fetcher.push_err(SessionError::Parse("missing clientSecret".into()));
        fetcher.push_ok("");

        let customer = CustomerId::new("cus_1").unwrap();
        assert!(matches!(
            fetcher.fetch(SessionKind::BankLink, &customer).await,
            Err(SessionError::Parse(_))
        ));
        // An empty secret is rejected the same way the HTTP decoder rejects it.
        assert!(matches!(
            fetcher.fetch(SessionKind::BankLink, &customer).await,
            Err(SessionError::Parse(_))
        ));
    }
}

use crate::error::{Result, SessionError};
use serde::{Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// The kind of provider flow a session drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum SessionKind {
    /// Bank-account linkage through the financial-data-aggregation flow.
    BankLink,
    /// Saving a card for later use through the payment sheet.
    CardSetup,
    /// Card or wallet payment through the payment sheet.
    Payment,
}

impl SessionKind {
    pub const ALL: [SessionKind; 3] = [
        SessionKind::BankLink,
        SessionKind::CardSetup,
        SessionKind::Payment,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SessionKind::BankLink => "bank-link",
            SessionKind::CardSetup => "card-setup",
            SessionKind::Payment => "payment",
        }
    }
}

impl fmt::Display for SessionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SessionKind {
    type Err = SessionError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "bank-link" | "bank_link" => Ok(SessionKind::BankLink),
            "card-setup" | "card_setup" => Ok(SessionKind::CardSetup),
            "payment" => Ok(SessionKind::Payment),
            other => Err(SessionError::InvalidInput(format!(
                "unknown session kind '{other}' (expected bank-link, card-setup or payment)"
            ))),
        }
    }
}

/// A short-lived, provider-issued token authorizing one session operation.
///
/// Formatting never reveals more than the first four characters. The raw value
/// is only reachable through [`ClientSecret::expose`].
#[derive(Clone, PartialEq, Eq)]
pub struct ClientSecret(String);

impl ClientSecret {
    const VISIBLE_PREFIX: usize = 4;

    pub fn new(value: impl Into<String>) -> Result<Self> {
        let value = value.into();
        if value.trim().is_empty() {
            return Err(SessionError::Parse("client secret is empty".to_string()));
        }
        Ok(Self(value))
    }

    /// Returns the raw secret for handing to the provider flow.
    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn redacted(&self) -> String {
        let prefix: String = self.0.chars().take(Self::VISIBLE_PREFIX).collect();
        format!("{prefix}****")
    }
}

impl fmt::Debug for ClientSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ClientSecret").field(&self.redacted()).finish()
    }
}

impl fmt::Display for ClientSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.redacted())
    }
}

impl Serialize for ClientSecret {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.redacted())
    }
}

/// The provider-side customer the secret is issued for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CustomerId(String);

impl CustomerId {
    pub fn new(value: impl Into<String>) -> Result<Self> {
        let value = value.into();
        if value.trim().is_empty() {
            return Err(SessionError::InvalidInput(
                "customer id must not be empty".to_string(),
            ));
        }
        Ok(Self(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CustomerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifies a single presentation attempt of an orchestrator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct PresentationId(pub u64);

impl fmt::Display for PresentationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum FlowState {
    #[default]
    Idle,
    Fetching,
    Ready,
    Presenting {
        presentation: PresentationId,
    },
    Completed,
    Canceled,
    Failed(String),
}

impl FlowState {
    /// Completed, Canceled and Failed end a presentation and require a reset.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            FlowState::Completed | FlowState::Canceled | FlowState::Failed(_)
        )
    }
}

impl fmt::Display for FlowState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FlowState::Idle => f.write_str("idle"),
            FlowState::Fetching => f.write_str("fetching"),
            FlowState::Ready => f.write_str("ready"),
            FlowState::Presenting { .. } => f.write_str("presenting"),
            FlowState::Completed => f.write_str("completed"),
            FlowState::Canceled => f.write_str("canceled"),
            FlowState::Failed(reason) => write!(f, "failed: {reason}"),
        }
    }
}

impl Serialize for FlowState {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(self)
    }
}

/// The state of one provider flow, exclusively owned by its orchestrator.
///
/// Transitions are methods that validate the current state and leave the
/// session untouched when they are rejected.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Session {
    pub kind: SessionKind,
    secret: Option<ClientSecret>,
    state: FlowState,
    external_id: Option<String>,
}

impl Session {
    pub fn new(kind: SessionKind) -> Self {
        Self {
            kind,
            secret: None,
            state: FlowState::Idle,
            external_id: None,
        }
    }

    pub fn state(&self) -> &FlowState {
        &self.state
    }

    pub fn secret(&self) -> Option<&ClientSecret> {
        self.secret.as_ref()
    }

    pub fn external_id(&self) -> Option<&str> {
        self.external_id.as_deref()
    }

    /// Idle -> Fetching.
    pub fn begin_fetch(&mut self) -> Result<()> {
        match self.state {
            FlowState::Idle => {
                self.state = FlowState::Fetching;
                Ok(())
            }
            _ => Err(self.invalid("fetch")),
        }
    }

    /// Fetching -> Ready, storing the freshly issued secret.
    pub fn complete_fetch(&mut self, secret: ClientSecret) -> Result<()> {
        match self.state {
            FlowState::Fetching => {
                self.secret = Some(secret);
                self.state = FlowState::Ready;
                Ok(())
            }
            _ => Err(self.invalid("store a fetched secret")),
        }
    }

    /// Fetching -> Idle after a failed or abandoned fetch.
    pub fn abort_fetch(&mut self) {
        if self.state == FlowState::Fetching {
            self.state = FlowState::Idle;
        }
    }

    /// Checks that a presentation may start, without changing anything.
    pub fn check_presentable(&self) -> Result<()> {
        match self.state {
            FlowState::Ready if self.secret.is_some() => Ok(()),
            FlowState::Ready => Err(self.invalid("present without a secret")),
            FlowState::Presenting { .. } => Err(SessionError::AlreadyPresenting),
            _ => Err(self.invalid("present")),
        }
    }

    /// Ready -> Presenting. Hands the secret out; it cannot be presented twice.
    pub fn begin_presentation(&mut self, presentation: PresentationId) -> Result<ClientSecret> {
        self.check_presentable()?;
        let secret = self
            .secret
            .take()
            .ok_or_else(|| self.invalid("present without a secret"))?;
        self.state = FlowState::Presenting { presentation };
        Ok(secret)
    }

    /// Whether `presentation` is the one currently awaiting an outcome.
    pub fn is_presenting(&self, presentation: PresentationId) -> bool {
        matches!(self.state, FlowState::Presenting { presentation: current } if current == presentation)
    }

    /// Presenting -> terminal. Only the result handler settles a presentation.
    pub(crate) fn settle(&mut self, terminal: FlowState, external_id: Option<String>) {
        debug_assert!(terminal.is_terminal());
        self.state = terminal;
        self.external_id = external_id;
    }

    /// Terminal, Ready or Idle -> Idle, discarding any unused secret.
    pub fn reset(&mut self) -> Result<()> {
        match self.state {
            FlowState::Fetching | FlowState::Presenting { .. } => Err(self.invalid("reset")),
            _ => {
                self.secret = None;
                self.external_id = None;
                self.state = FlowState::Idle;
                Ok(())
            }
        }
    }

    fn invalid(&self, operation: &'static str) -> SessionError {
        SessionError::InvalidState {
            operation,
            state: self.state.clone(),
        }
    }
}

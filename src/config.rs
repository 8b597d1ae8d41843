//! Runtime configuration loaded from the environment.
//!
//! An optional `.env` file in the working directory is loaded first, then the
//! `PAYSESSION_*` variables are read. Endpoints, customer ids and merchant
//! settings are never compiled in.

use crate::domain::presentation::{SheetConfiguration, WalletConfiguration};
use crate::domain::session::SessionKind;
use crate::error::{Result, SessionError};
use reqwest::Url;
use std::time::Duration;

pub const ENV_BASE_URL: &str = "PAYSESSION_BASE_URL";
pub const ENV_BANK_LINK_PATH: &str = "PAYSESSION_BANK_LINK_PATH";
pub const ENV_CARD_SETUP_PATH: &str = "PAYSESSION_CARD_SETUP_PATH";
pub const ENV_PAYMENT_PATH: &str = "PAYSESSION_PAYMENT_PATH";
pub const ENV_FETCH_METHOD: &str = "PAYSESSION_FETCH_METHOD";
pub const ENV_CUSTOMER_ID: &str = "PAYSESSION_CUSTOMER_ID";
pub const ENV_FETCH_TIMEOUT: &str = "PAYSESSION_FETCH_TIMEOUT_SECS";
pub const ENV_PRESENTATION_TIMEOUT: &str = "PAYSESSION_PRESENTATION_TIMEOUT_SECS";
pub const ENV_MERCHANT_NAME: &str = "PAYSESSION_MERCHANT_DISPLAY_NAME";
pub const ENV_WALLET_MERCHANT_ID: &str = "PAYSESSION_APPLE_PAY_MERCHANT_ID";
pub const ENV_WALLET_COUNTRY: &str = "PAYSESSION_APPLE_PAY_COUNTRY";

pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(15);
pub const DEFAULT_PRESENTATION_TIMEOUT: Duration = Duration::from_secs(30 * 60);
const DEFAULT_WALLET_COUNTRY: &str = "US";

/// HTTP method used against the secret endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FetchMethod {
    #[default]
    Get,
    Post,
}

impl std::str::FromStr for FetchMethod {
    type Err = SessionError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "get" => Ok(FetchMethod::Get),
            "post" => Ok(FetchMethod::Post),
            other => Err(SessionError::Config(format!(
                "{ENV_FETCH_METHOD} must be 'get' or 'post', got '{other}'"
            ))),
        }
    }
}

/// Endpoint paths relative to the base URL, one per session kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointPaths {
    pub bank_link: String,
    pub card_setup: String,
    pub payment: String,
}

impl Default for EndpointPaths {
    fn default() -> Self {
        Self {
            bank_link: "create-link-session".to_string(),
            card_setup: "create-setup-intent".to_string(),
            payment: "create-payment-intent".to_string(),
        }
    }
}

impl EndpointPaths {
    pub fn for_kind(&self, kind: SessionKind) -> &str {
        match kind {
            SessionKind::BankLink => &self.bank_link,
            SessionKind::CardSetup => &self.card_setup,
            SessionKind::Payment => &self.payment,
        }
    }
}

/// Per-orchestrator settings derived from [`AppConfig`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrchestratorSettings {
    pub fetch_timeout: Duration,
    pub presentation_timeout: Duration,
    pub sheet: SheetConfiguration,
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self {
            fetch_timeout: DEFAULT_FETCH_TIMEOUT,
            presentation_timeout: DEFAULT_PRESENTATION_TIMEOUT,
            sheet: SheetConfiguration::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub base_url: Option<Url>,
    pub paths: EndpointPaths,
    pub method: FetchMethod,
    pub customer_id: Option<String>,
    pub fetch_timeout: Duration,
    pub presentation_timeout: Duration,
    pub merchant_display_name: Option<String>,
    pub wallet: Option<WalletConfiguration>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            paths: EndpointPaths::default(),
            method: FetchMethod::default(),
            customer_id: None,
            fetch_timeout: DEFAULT_FETCH_TIMEOUT,
            presentation_timeout: DEFAULT_PRESENTATION_TIMEOUT,
            merchant_display_name: None,
            wallet: None,
        }
    }
}

impl AppConfig {
    /// Loads `.env` (if present) and reads configuration from the process environment.
    pub fn from_env() -> Result<Self> {
        // A missing .env file is fine; the process environment still applies.
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let value = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let base_url = value(ENV_BASE_URL).map(|raw| parse_base_url(&raw)).transpose()?;

        let defaults = EndpointPaths::default();
        let paths = EndpointPaths {
            bank_link: value(ENV_BANK_LINK_PATH).unwrap_or(defaults.bank_link),
            card_setup: value(ENV_CARD_SETUP_PATH).unwrap_or(defaults.card_setup),
            payment: value(ENV_PAYMENT_PATH).unwrap_or(defaults.payment),
        };

        let method = value(ENV_FETCH_METHOD)
            .map(|raw| raw.parse::<FetchMethod>())
            .transpose()?
            .unwrap_or_default();

        let fetch_timeout = value(ENV_FETCH_TIMEOUT)
            .map(|raw| parse_secs(ENV_FETCH_TIMEOUT, &raw))
            .transpose()?
            .unwrap_or(DEFAULT_FETCH_TIMEOUT);
        let presentation_timeout = value(ENV_PRESENTATION_TIMEOUT)
            .map(|raw| parse_secs(ENV_PRESENTATION_TIMEOUT, &raw))
            .transpose()?
            .unwrap_or(DEFAULT_PRESENTATION_TIMEOUT);

        let wallet = value(ENV_WALLET_MERCHANT_ID).map(|merchant_id| WalletConfiguration {
            merchant_id,
            country_code: value(ENV_WALLET_COUNTRY)
                .unwrap_or_else(|| DEFAULT_WALLET_COUNTRY.to_string())
                .to_ascii_uppercase(),
        });

        Ok(Self {
            base_url,
            paths,
            method,
            customer_id: value(ENV_CUSTOMER_ID),
            fetch_timeout,
            presentation_timeout,
            merchant_display_name: value(ENV_MERCHANT_NAME),
            wallet,
        })
    }

    /// The secret endpoint for `kind`.
    pub fn endpoint(&self, kind: SessionKind) -> Result<Url> {
        let base = self.base_url.as_ref().ok_or_else(|| {
            SessionError::Config(format!(
                "no secret endpoint configured; set {ENV_BASE_URL}"
            ))
        })?;
        let path = self.paths.for_kind(kind).trim_start_matches('/');
        base.join(path).map_err(|e| {
            SessionError::Config(format!("invalid endpoint path for {kind} '{path}': {e}"))
        })
    }

    /// Sheet options for `kind`. Only card setup accepts delayed payment methods.
    pub fn sheet(&self, kind: SessionKind) -> SheetConfiguration {
        SheetConfiguration {
            merchant_display_name: self.merchant_display_name.clone(),
            wallet: match kind {
                SessionKind::Payment => self.wallet.clone(),
                _ => None,
            },
            allows_delayed_payment_methods: kind == SessionKind::CardSetup,
        }
    }

    pub fn orchestrator_settings(&self, kind: SessionKind) -> OrchestratorSettings {
        OrchestratorSettings {
            fetch_timeout: self.fetch_timeout,
            presentation_timeout: self.presentation_timeout,
            sheet: self.sheet(kind),
        }
    }
}

fn parse_base_url(raw: &str) -> Result<Url> {
    let mut url = Url::parse(raw)
        .map_err(|e| SessionError::Config(format!("{ENV_BASE_URL} is not a valid URL: {e}")))?;
    if url.query().is_some() || url.fragment().is_some() {
        return Err(SessionError::Config(format!(
            "{ENV_BASE_URL} must not carry a query or fragment, got '{raw}'"
        )));
    }
    // A trailing slash makes `Url::join` append rather than replace the last segment.
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }

    let loopback = matches!(
        url.host_str(),
        Some("localhost") | Some("127.0.0.1") | Some("[::1]")
    );
    let scheme = url.scheme().to_string();
    match scheme.as_str() {
        "https" => Ok(url),
        "http" if loopback => Ok(url),
        scheme => Err(SessionError::Config(format!(
            "{ENV_BASE_URL} must use https (got '{scheme}' for a non-loopback host)"
        ))),
    }
}

fn parse_secs(key: &str, raw: &str) -> Result<Duration> {
    match raw.parse::<u64>() {
        Ok(0) => Err(SessionError::Config(format!("{key} must be greater than zero"))),
        Ok(secs) => Ok(Duration::from_secs(secs)),
        Err(_) => Err(SessionError::Config(format!(
            "{key} must be a whole number of seconds, got '{raw}'"
        ))),
    }
}

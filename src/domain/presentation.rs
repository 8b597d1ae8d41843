use super::session::{ClientSecret, PresentationId, SessionKind};

/// A display surface supplied by the host UI runtime, e.g. a root view controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Surface {
    pub id: String,
}

impl Surface {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }
}

/// Wallet (Apple Pay) settings for the payment sheet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalletConfiguration {
    pub merchant_id: String,
    pub country_code: String,
}

/// Options the provider's sheet is configured with before it is presented.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SheetConfiguration {
    pub merchant_display_name: Option<String>,
    pub wallet: Option<WalletConfiguration>,
    pub allows_delayed_payment_methods: bool,
}

/// Everything the provider flow needs to start one presentation.
#[derive(Debug, Clone)]
pub struct FlowRequest {
    pub presentation: PresentationId,
    pub kind: SessionKind,
    pub secret: ClientSecret,
    pub surface: Surface,
    pub sheet: SheetConfiguration,
}

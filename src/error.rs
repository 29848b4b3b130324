use thiserror::Error;

/// Step of the portal session an [`ExtractionError::SessionFailure`] came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStage {
    Login,
    Navigate,
    Harvest,
}

impl std::fmt::Display for SessionStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionStage::Login => write!(f, "logging in"),
            SessionStage::Navigate => write!(f, "opening the academic register"),
            SessionStage::Harvest => write!(f, "reading the register"),
        }
    }
}

/// Why an extraction produced no snapshot.
///
/// The portal gives no reliable way to tell a wrong password from a layout
/// change or an outage, so all of those end up as `SessionFailure`.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ExtractionError {
    #[error("browser driver unavailable: {0}")]
    DriverUnavailable(String),

    #[error("portal session failed while {stage}: {reason}")]
    SessionFailure { stage: SessionStage, reason: String },
}

impl ExtractionError {
    pub fn session(stage: SessionStage, err: anyhow::Error) -> Self {
        Self::SessionFailure {
            stage,
            reason: format!("{err:#}"),
        }
    }
}

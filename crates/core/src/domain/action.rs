// Disruption Action Vocabulary

use serde::{Deserialize, Serialize};

use super::error::DomainError;

/// Lifecycle action applied to a target. Closed set; unknown actions are
/// rejected at the string boundary by `FromStr`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Stop,
    Start,
    Restart,
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Action::Stop => write!(f, "stop"),
            Action::Start => write!(f, "start"),
            Action::Restart => write!(f, "restart"),
        }
    }
}

impl std::str::FromStr for Action {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "stop" => Ok(Action::Stop),
            "start" => Ok(Action::Start),
            "restart" => Ok(Action::Restart),
            other => Err(DomainError::UnknownAction(other.to_string())),
        }
    }
}

/// Outcome contract every capability adapter returns. Transient; the sole
/// input to audit-log classification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionResult {
    pub success: bool,
    pub message: String,
}

impl ActionResult {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
        }
    }
}

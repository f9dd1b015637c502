use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Which side of a flow contract a value failed against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ValidationStage {
    /// Caller-supplied input; rejected before any provider call is made.
    Input,
    /// Provider-produced output; a contract violation on the provider side.
    Output,
}

impl std::fmt::Display for ValidationStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValidationStage::Input => write!(f, "input"),
            ValidationStage::Output => write!(f, "output"),
        }
    }
}

/// Error taxonomy shared by the flow and dispatch layers.
#[derive(Debug, Clone, Error)]
pub enum FlowError {
    #[error("{stage} validation failed: {detail}")]
    Validation {
        stage: ValidationStage,
        detail: String,
    },
    /// Transport failure, non-2xx provider response, or malformed payload.
    #[error("provider call failed: {0}")]
    Provider(String),
    /// The provider answered successfully but returned no usable content.
    #[error("generation produced no usable content: {0}")]
    Generation(String),
    /// A single recipient's channel write failed. Isolated and counted by
    /// the dispatcher, never surfaced as a whole-batch failure.
    #[error("delivery failed: {0}")]
    Delivery(String),
}

impl FlowError {
    pub fn input_validation(detail: impl Into<String>) -> Self {
        FlowError::Validation {
            stage: ValidationStage::Input,
            detail: detail.into(),
        }
    }

    pub fn output_validation(detail: impl Into<String>) -> Self {
        FlowError::Validation {
            stage: ValidationStage::Output,
            detail: detail.into(),
        }
    }

    pub fn is_caller_error(&self) -> bool {
        matches!(
            self,
            FlowError::Validation {
                stage: ValidationStage::Input,
                ..
            }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_stage() {
        let err = FlowError::input_validation("missing field `title`");
        assert_eq!(
            format!("{}", err),
            "input validation failed: missing field `title`"
        );
        let err = FlowError::output_validation("bad shape");
        assert_eq!(format!("{}", err), "output validation failed: bad shape");
    }

    #[test]
    fn caller_error_only_for_input_stage() {
        assert!(FlowError::input_validation("x").is_caller_error());
        assert!(!FlowError::output_validation("x").is_caller_error());
        assert!(!FlowError::Provider("down".into()).is_caller_error());
        assert!(!FlowError::Generation("empty".into()).is_caller_error());
    }
}

//! Side-effecting flows with no generative call: password reset and the
//! install prompt. Both talk only to external collaborators.
//!
//! The password-reset reply is deliberately identical for every internal
//! outcome (account found, not found, lookup failed): a distinguishable
//! reply would let a caller enumerate which addresses have accounts.

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{error, info, warn};

use crate::dispatch::{NotificationRecord, NotificationStore};
use crate::error::FlowError;
use crate::schema::ShapeContract;

use super::{Flow, FlowContract};

pub const PASSWORD_RESET: &str = "password_reset";
pub const INSTALL_PROMPT: &str = "install_prompt";

const RESET_SUBJECT: &str = "Reset your password";

/// An account resolved by the identity provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountRef {
    pub uid: String,
    pub email: String,
}

/// Identity provider boundary: resolve an account by email and mint a
/// reset link. Never used to authenticate the caller of this core.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn find_account_by_email(&self, email: &str) -> Result<Option<AccountRef>, FlowError>;
    async fn mint_reset_link(&self, email: &str) -> Result<String, FlowError>;
}

/// Outbound email boundary.
#[async_trait]
pub trait MailTransport: Send + Sync {
    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<(), FlowError>;
}

/// Run a non-critical operation, logging and swallowing its error.
/// Failing silently is preferable to surfacing a non-essential failure to
/// the end user; making the policy a named function keeps it visible and
/// testable.
pub async fn best_effort<T>(
    context: &str,
    work: impl Future<Output = Result<T, FlowError>>,
) -> Option<T> {
    match work.await {
        Ok(value) => Some(value),
        Err(e) => {
            warn!(error = %e, "best-effort operation `{}` failed", context);
            None
        }
    }
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct PasswordResetInput {
    pub email: String,
}

/// The success-shaped reply every reset request receives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct AccountFlowReply {
    pub success: bool,
    pub message: String,
}

impl AccountFlowReply {
    fn generic_reset() -> Self {
        Self {
            success: true,
            message: "If an account exists for that address, a reset link has been sent.".into(),
        }
    }
}

pub struct PasswordResetFlow {
    contract: FlowContract,
    identity: Arc<dyn IdentityProvider>,
    mail: Arc<dyn MailTransport>,
}

impl PasswordResetFlow {
    pub fn new(
        identity: Arc<dyn IdentityProvider>,
        mail: Arc<dyn MailTransport>,
    ) -> Result<Self, FlowError> {
        Ok(Self {
            contract: FlowContract::new(
                PASSWORD_RESET,
                Some(ShapeContract::of::<PasswordResetInput>("password_reset_input")?),
                ShapeContract::of::<AccountFlowReply>("account_flow_reply")?,
            ),
            identity,
            mail,
        })
    }

    /// Typed entry point. Every internal outcome collapses into the same
    /// generic reply; only `run` can reject a malformed request.
    #[tracing::instrument(name = "password_reset_run", skip(self, email))]
    pub async fn request_reset(&self, email: &str) -> AccountFlowReply {
        match self.identity.find_account_by_email(email).await {
            Ok(Some(account)) => {
                let delivery = async {
                    let link = self.identity.mint_reset_link(&account.email).await?;
                    let body = format!(
                        "A password reset was requested for your account.\n\n\
                         Follow this link to choose a new password: {link}\n\n\
                         If you did not request this, you can ignore this message."
                    );
                    self.mail.send(&account.email, RESET_SUBJECT, &body).await
                };
                if let Err(e) = delivery.await {
                    error!(error = %e, "password reset delivery failed");
                }
            }
            Ok(None) => {
                info!("password reset requested for unknown address");
            }
            Err(e) => {
                error!(error = %e, "identity lookup failed during password reset");
            }
        }
        AccountFlowReply::generic_reset()
    }
}

#[async_trait]
impl Flow for PasswordResetFlow {
    fn name(&self) -> &str {
        self.contract.name()
    }

    fn contract(&self) -> &FlowContract {
        &self.contract
    }

    async fn run(&self, input: Value) -> Result<Value, FlowError> {
        self.contract.validate_input(&input)?;
        let request: PasswordResetInput = serde_json::from_value(input)
            .map_err(|e| FlowError::input_validation(format!("password reset input: {e}")))?;
        let reply = self.request_reset(&request.email).await;
        let output = serde_json::to_value(reply)
            .map_err(|e| FlowError::output_validation(format!("reset reply: {e}")))?;
        self.contract.validate_output(&output)?;
        Ok(output)
    }
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct InstallPromptInput {
    pub recipient_id: String,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct InstallPromptReply {
    pub acknowledged: bool,
}

/// Nudges a member to install the app by writing one in-app notification.
/// Non-critical: the write runs under `best_effort` and the flow always
/// acknowledges.
pub struct InstallPromptFlow {
    contract: FlowContract,
    store: Arc<dyn NotificationStore>,
}

impl InstallPromptFlow {
    pub fn new(store: Arc<dyn NotificationStore>) -> Result<Self, FlowError> {
        Ok(Self {
            contract: FlowContract::new(
                INSTALL_PROMPT,
                Some(ShapeContract::of::<InstallPromptInput>("install_prompt_input")?),
                ShapeContract::of::<InstallPromptReply>("install_prompt_reply")?,
            ),
            store,
        })
    }

    pub async fn prompt_install(&self, recipient_id: &str) {
        let payload = crate::dispatch::NotificationPayload {
            recipient_id: recipient_id.to_string(),
            title: "Get the app".into(),
            body: "Install the congregation app for sermons, events and daily verses.".into(),
            link: Some("/install".into()),
        };
        best_effort(
            "install prompt notification",
            self.store.create(NotificationRecord::from_payload(&payload)),
        )
        .await;
    }
}

#[async_trait]
impl Flow for InstallPromptFlow {
    fn name(&self) -> &str {
        self.contract.name()
    }

    fn contract(&self) -> &FlowContract {
        &self.contract
    }

    async fn run(&self, input: Value) -> Result<Value, FlowError> {
        self.contract.validate_input(&input)?;
        let request: InstallPromptInput = serde_json::from_value(input)
            .map_err(|e| FlowError::input_validation(format!("install prompt input: {e}")))?;
        self.prompt_install(&request.recipient_id).await;
        let output = serde_json::json!({ "acknowledged": true });
        self.contract.validate_output(&output)?;
        Ok(output)
    }
}

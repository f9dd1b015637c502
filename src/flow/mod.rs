pub mod account;
pub mod artwork;
pub mod generate;
pub mod narrate;

#[cfg(test)]
mod flow_test;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::config::CoreConfig;
use crate::dispatch::NotificationStore;
use crate::error::FlowError;
use crate::model::ModelInvoker;
use crate::schema::ShapeContract;
use crate::template::PromptSet;

use account::{IdentityProvider, MailTransport};

/// The immutable binding of a flow name to its input/output shapes. Each
/// flow instance holds exactly one contract for its lifetime.
#[derive(Debug)]
pub struct FlowContract {
    name: String,
    input_shape: Option<ShapeContract>,
    output_shape: ShapeContract,
}

impl FlowContract {
    pub fn new(name: &str, input_shape: Option<ShapeContract>, output_shape: ShapeContract) -> Self {
        Self {
            name: name.to_string(),
            input_shape,
            output_shape,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Validates caller input. A flow with no input shape accepts anything.
    pub fn validate_input(&self, value: &Value) -> Result<(), FlowError> {
        match &self.input_shape {
            Some(shape) => shape.validate_input(value),
            None => Ok(()),
        }
    }

    pub fn validate_output(&self, value: &Value) -> Result<(), FlowError> {
        self.output_shape.validate_output(value)
    }

    /// The raw output schema, passed to the provider as a response hint.
    pub fn output_schema(&self) -> &Value {
        self.output_shape.schema_json()
    }
}

/// A named, single-entry pipeline. Implementations are stateless and
/// re-entrant; concurrency is achieved by running independent executions.
#[async_trait]
pub trait Flow: Send + Sync {
    fn name(&self) -> &str;
    fn contract(&self) -> &FlowContract;
    async fn run(&self, input: Value) -> Result<Value, FlowError>;
}

/// Explicit flow mapping, constructed once at startup and passed by
/// handle to whatever consumes it. No ambient global lookup.
#[derive(Default)]
pub struct FlowRegistry {
    flows: HashMap<String, Arc<dyn Flow>>,
}

impl FlowRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, flow: Arc<dyn Flow>) {
        self.flows.insert(flow.name().to_string(), flow);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Flow>> {
        self.flows.get(name).cloned()
    }

    pub fn flow_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.flows.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub async fn run(&self, name: &str, input: Value) -> Result<Value, FlowError> {
        match self.flows.get(name) {
            Some(flow) => flow.run(input).await,
            None => Err(FlowError::input_validation(format!("unknown flow `{name}`"))),
        }
    }

    /// The full pipeline set of the congregation platform, wired to one
    /// invoker and one set of external collaborators.
    pub fn standard(
        config: &CoreConfig,
        invoker: Arc<dyn ModelInvoker>,
        identity: Arc<dyn IdentityProvider>,
        mail: Arc<dyn MailTransport>,
        store: Arc<dyn NotificationStore>,
    ) -> Result<Self, FlowError> {
        let prompts = Arc::new(default_prompts()?);
        let mut registry = Self::new();
        registry.register(Arc::new(generate::daily_verse(
            config,
            invoker.clone(),
            prompts.clone(),
        )?));
        registry.register(Arc::new(generate::sermon_summary(
            config,
            invoker.clone(),
            prompts.clone(),
        )?));
        registry.register(Arc::new(generate::blog_post(
            config,
            invoker.clone(),
            prompts.clone(),
        )?));
        registry.register(Arc::new(generate::partner_suggestions(
            config,
            invoker.clone(),
            prompts.clone(),
        )?));
        registry.register(Arc::new(narrate::SummarizeAndReadFlow::new(
            config,
            invoker.clone(),
            prompts.clone(),
        )?));
        registry.register(Arc::new(artwork::ArtworkFlow::new(config, invoker, prompts)?));
        registry.register(Arc::new(account::PasswordResetFlow::new(identity, mail)?));
        registry.register(Arc::new(account::InstallPromptFlow::new(store)?));
        Ok(registry)
    }
}

/// Every prompt template the standard flows render, registered once.
pub fn default_prompts() -> Result<PromptSet, FlowError> {
    let mut prompts = PromptSet::new();
    generate::register_prompts(&mut prompts)?;
    narrate::register_prompts(&mut prompts)?;
    artwork::register_prompts(&mut prompts)?;
    Ok(prompts)
}

//! Media-generation flow: one image request, returns only the media URL.
//! Any accompanying text from the provider is discarded.

use std::sync::Arc;

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::config::CoreConfig;
use crate::error::FlowError;
use crate::model::{ModelInvoker, ModelRequest};
use crate::schema::ShapeContract;
use crate::template::PromptSet;

use super::{Flow, FlowContract};

pub const ARTWORK: &str = "artwork";

const ARTWORK_PROMPT: &str = "Create uplifting artwork for a sermon titled \"{{title}}\". \
Warm colors, no text in the image.";

pub(crate) fn register_prompts(prompts: &mut PromptSet) -> Result<(), FlowError> {
    prompts.register(ARTWORK, ARTWORK_PROMPT)
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct ArtworkInput {
    pub title: String,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct ArtworkOutput {
    /// Generated image as a data URI.
    pub artwork_url: String,
}

pub struct ArtworkFlow {
    contract: FlowContract,
    model_id: String,
    invoker: Arc<dyn ModelInvoker>,
    prompts: Arc<PromptSet>,
}

impl ArtworkFlow {
    pub fn new(
        config: &CoreConfig,
        invoker: Arc<dyn ModelInvoker>,
        prompts: Arc<PromptSet>,
    ) -> Result<Self, FlowError> {
        Ok(Self {
            contract: FlowContract::new(
                ARTWORK,
                Some(ShapeContract::of::<ArtworkInput>("artwork_input")?),
                ShapeContract::of::<ArtworkOutput>("artwork_output")?,
            ),
            model_id: config.image_model.clone(),
            invoker,
            prompts,
        })
    }
}

#[async_trait]
impl Flow for ArtworkFlow {
    fn name(&self) -> &str {
        self.contract.name()
    }

    fn contract(&self) -> &FlowContract {
        &self.contract
    }

    #[tracing::instrument(name = "artwork_flow_run", skip(self, input))]
    async fn run(&self, input: Value) -> Result<Value, FlowError> {
        self.contract.validate_input(&input)?;
        let prompt = self.prompts.render(ARTWORK, &input)?;

        let response = self
            .invoker
            .invoke(ModelRequest::image(&self.model_id, prompt))
            .await?;
        let media = response.require_media()?;

        let output = json!({ "artwork_url": media.url });
        self.contract.validate_output(&output)?;
        Ok(output)
    }
}

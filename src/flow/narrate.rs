//! Two-stage generate-then-transform flow: summarize a sermon, then read
//! the summary aloud. Stage 2 (the costlier audio call) never starts
//! before stage 1's text exists, and a missing audio payload fails the
//! whole flow; a text-only result is never silently substituted.

use std::sync::Arc;

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::audio::{AudioParams, decode_data_uri, encode_wav_base64};
use crate::config::CoreConfig;
use crate::error::FlowError;
use crate::model::{ModelInvoker, ModelRequest};
use crate::schema::ShapeContract;
use crate::template::PromptSet;

use super::{Flow, FlowContract};

pub const SUMMARIZE_AND_READ: &str = "summarize_and_read";

const SPOKEN_SUMMARY_PROMPT: &str = "Summarize this sermon in a warm, spoken style suitable \
for listening, in at most 200 words.\n\nTitle: {{title}}\n\n{{content}}";

pub(crate) fn register_prompts(prompts: &mut PromptSet) -> Result<(), FlowError> {
    prompts.register(SUMMARIZE_AND_READ, SPOKEN_SUMMARY_PROMPT)
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct SermonReadingInput {
    pub title: String,
    pub content: String,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct SermonReadingOutput {
    pub summary: String,
    /// WAV audio of the summary as a `data:audio/wav;base64,` URI.
    pub audio_url: String,
}

pub struct SummarizeAndReadFlow {
    contract: FlowContract,
    text_model: String,
    tts_model: String,
    voice: String,
    invoker: Arc<dyn ModelInvoker>,
    prompts: Arc<PromptSet>,
}

impl SummarizeAndReadFlow {
    pub fn new(
        config: &CoreConfig,
        invoker: Arc<dyn ModelInvoker>,
        prompts: Arc<PromptSet>,
    ) -> Result<Self, FlowError> {
        Ok(Self {
            contract: FlowContract::new(
                SUMMARIZE_AND_READ,
                Some(ShapeContract::of::<SermonReadingInput>("sermon_reading_input")?),
                ShapeContract::of::<SermonReadingOutput>("sermon_reading_output")?,
            ),
            text_model: config.text_model.clone(),
            tts_model: config.tts_model.clone(),
            voice: config.voice.clone(),
            invoker,
            prompts,
        })
    }
}

#[async_trait]
impl Flow for SummarizeAndReadFlow {
    fn name(&self) -> &str {
        self.contract.name()
    }

    fn contract(&self) -> &FlowContract {
        &self.contract
    }

    #[tracing::instrument(name = "summarize_and_read_run", skip(self, input))]
    async fn run(&self, input: Value) -> Result<Value, FlowError> {
        self.contract.validate_input(&input)?;
        let prompt = self.prompts.render(SUMMARIZE_AND_READ, &input)?;

        // Stage 1: plain-text summary. Aborting here when the model gives
        // nothing avoids the costlier audio call entirely.
        let stage_one = self
            .invoker
            .invoke(ModelRequest::text(&self.text_model, prompt))
            .await?;
        let summary = stage_one.require_text()?.to_string();

        // Stage 2: read the stage-1 summary aloud.
        let stage_two = self
            .invoker
            .invoke(ModelRequest::audio(&self.tts_model, summary.clone(), &self.voice))
            .await?;
        let media = stage_two.require_media()?;

        let pcm = decode_data_uri(&media.url)?;
        let wav = encode_wav_base64(&pcm, &AudioParams::default())?;

        let output = json!({
            "summary": summary,
            "audio_url": format!("data:audio/wav;base64,{wav}"),
        });
        self.contract.validate_output(&output)?;
        Ok(output)
    }
}

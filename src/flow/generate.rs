//! Single-prompt structured flows: validate input, render the prompt,
//! make one structured-JSON model call, validate the output against the
//! flow's contract. A failed generation surfaces as an error, never as a
//! fabricated or empty devotional default.

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

pub const DAILY_VERSE: &str = "daily_verse";
pub const SERMON_SUMMARY: &str = "sermon_summary";
pub const BLOG_POST: &str = "blog_post";
pub const PARTNER_SUGGESTIONS: &str = "partner_suggestions";

const DAILY_VERSE_PROMPT: &str = "You pick encouraging scripture for a church congregation. \
Choose one Bible verse for today and write a two-sentence reflection on it. \
Respond as JSON with verse_text, reference and reflection.";

const SERMON_SUMMARY_PROMPT: &str = "Summarize the following sermon in three short paragraphs \
for the congregation newsletter. Respond as JSON with a single summary field.\n\n\
Title: {{title}}\n\n{{content}}";

const BLOG_POST_PROMPT: &str = "Write a blog post for the church website about {{topic}}.\
{{#if scripture}} Ground it in {{scripture}}.{{/if}} \
Respond as JSON with title and content.";

const PARTNER_SUGGESTIONS_PROMPT: &str = "Suggest three prayer partners for {{member_name}}, \
whose interests are: {{#each interests}}{{this}}{{#unless @last}}, {{/unless}}{{/each}}. \
Respond as JSON with a suggestions array of name/reason pairs.";

pub(crate) fn register_prompts(prompts: &mut PromptSet) -> Result<(), FlowError> {
    prompts.register(DAILY_VERSE, DAILY_VERSE_PROMPT)?;
    prompts.register(SERMON_SUMMARY, SERMON_SUMMARY_PROMPT)?;
    prompts.register(BLOG_POST, BLOG_POST_PROMPT)?;
    prompts.register(PARTNER_SUGGESTIONS, PARTNER_SUGGESTIONS_PROMPT)?;
    Ok(())
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct DailyVerseOutput {
    pub verse_text: String,
    pub reference: String,
    pub reflection: String,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct SermonSummaryInput {
    pub title: String,
    pub content: String,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct SermonSummaryOutput {
    pub summary: String,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct BlogPostInput {
    pub topic: String,
    /// Required but nullable: templates render in strict mode, so the key
    /// must be present even when there is no scripture anchor.
    #[schemars(required)]
    pub scripture: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct BlogPostOutput {
    pub title: String,
    pub content: String,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct PartnerSuggestionsInput {
    pub member_name: String,
    pub interests: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct PartnerSuggestion {
    pub name: String,
    pub reason: String,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct PartnerSuggestionsOutput {
    pub suggestions: Vec<PartnerSuggestion>,
}

/// One fixed prompt-to-structured-output pipeline. All four generative
/// text flows of the platform are instances of this type with different
/// contracts and templates.
pub struct StructuredFlow {
    contract: FlowContract,
    template: String,
    model_id: String,
    invoker: Arc<dyn ModelInvoker>,
    prompts: Arc<PromptSet>,
}

impl StructuredFlow {
    pub fn new(
        contract: FlowContract,
        template: &str,
        model_id: &str,
        invoker: Arc<dyn ModelInvoker>,
        prompts: Arc<PromptSet>,
    ) -> Self {
        Self {
            contract,
            template: template.to_string(),
            model_id: model_id.to_string(),
            invoker,
            prompts,
        }
    }
}

#[async_trait]
impl Flow for StructuredFlow {
    fn name(&self) -> &str {
        self.contract.name()
    }

    fn contract(&self) -> &FlowContract {
        &self.contract
    }

    #[tracing::instrument(name = "structured_flow_run", skip(self, input), fields(flow = %self.contract.name()))]
    async fn run(&self, input: Value) -> Result<Value, FlowError> {
        self.contract.validate_input(&input)?;
        let bindings = if input.is_null() { json!({}) } else { input };
        let prompt = self.prompts.render(&self.template, &bindings)?;

        let request =
            ModelRequest::structured(&self.model_id, prompt, self.contract.output_schema().clone());
        let response = self.invoker.invoke(request).await?;

        let text = response.require_text()?;
        let value: Value = serde_json::from_str(text)
            .map_err(|e| FlowError::Provider(format!("model output is not valid JSON: {e}")))?;
        self.contract.validate_output(&value)?;
        Ok(value)
    }
}

pub fn daily_verse(
    config: &CoreConfig,
    invoker: Arc<dyn ModelInvoker>,
    prompts: Arc<PromptSet>,
) -> Result<StructuredFlow, FlowError> {
    Ok(StructuredFlow::new(
        FlowContract::new(
            DAILY_VERSE,
            None,
            ShapeContract::of::<DailyVerseOutput>("daily_verse_output")?,
        ),
        DAILY_VERSE,
        &config.text_model,
        invoker,
        prompts,
    ))
}

pub fn sermon_summary(
    config: &CoreConfig,
    invoker: Arc<dyn ModelInvoker>,
    prompts: Arc<PromptSet>,
) -> Result<StructuredFlow, FlowError> {
    Ok(StructuredFlow::new(
        FlowContract::new(
            SERMON_SUMMARY,
            Some(ShapeContract::of::<SermonSummaryInput>("sermon_summary_input")?),
            ShapeContract::of::<SermonSummaryOutput>("sermon_summary_output")?,
        ),
        SERMON_SUMMARY,
        &config.text_model,
        invoker,
        prompts,
    ))
}

pub fn blog_post(
    config: &CoreConfig,
    invoker: Arc<dyn ModelInvoker>,
    prompts: Arc<PromptSet>,
) -> Result<StructuredFlow, FlowError> {
    Ok(StructuredFlow::new(
        FlowContract::new(
            BLOG_POST,
            Some(ShapeContract::of::<BlogPostInput>("blog_post_input")?),
            ShapeContract::of::<BlogPostOutput>("blog_post_output")?,
        ),
        BLOG_POST,
        &config.text_model,
        invoker,
        prompts,
    ))
}

pub fn partner_suggestions(
    config: &CoreConfig,
    invoker: Arc<dyn ModelInvoker>,
    prompts: Arc<PromptSet>,
) -> Result<StructuredFlow, FlowError> {
    Ok(StructuredFlow::new(
        FlowContract::new(
            PARTNER_SUGGESTIONS,
            Some(ShapeContract::of::<PartnerSuggestionsInput>(
                "partner_suggestions_input",
            )?),
            ShapeContract::of::<PartnerSuggestionsOutput>("partner_suggestions_output")?,
        ),
        PARTNER_SUGGESTIONS,
        &config.text_model,
        invoker,
        prompts,
    ))
}

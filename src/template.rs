use handlebars::Handlebars;
use serde_json::Value;

use crate::error::FlowError;

/// The process-wide set of prompt templates.
///
/// Templates are registered once at startup and the set is immutable
/// afterwards; flows hold it behind an `Arc`. Rendering runs in strict
/// mode: an unbound placeholder fails the render rather than silently
/// inserting an empty string, so a malformed prompt never reaches a paid
/// provider call. Conditional spans use `{{#if field}}...{{/if}}` over
/// field truthiness; values are substituted verbatim.
pub struct PromptSet {
    registry: Handlebars<'static>,
}

impl PromptSet {
    pub fn new() -> Self {
        let mut registry = Handlebars::new();
        registry.set_strict_mode(true);
        // prompts are plain text, not HTML; values go in untouched
        registry.register_escape_fn(handlebars::no_escape);
        Self { registry }
    }

    pub fn register(&mut self, name: &str, body: &str) -> Result<(), FlowError> {
        self.registry
            .register_template_string(name, body)
            .map_err(|e| FlowError::input_validation(format!("template `{name}`: {e}")))
    }

    pub fn has(&self, name: &str) -> bool {
        self.registry.has_template(name)
    }

    pub fn render(&self, name: &str, bindings: &Value) -> Result<String, FlowError> {
        self.registry
            .render(name, bindings)
            .map_err(|e| FlowError::input_validation(format!("rendering `{name}`: {e}")))
    }
}

impl Default for PromptSet {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sermon_set() -> PromptSet {
        let mut prompts = PromptSet::new();
        prompts
            .register(
                "summary",
                "Summarize the sermon titled \"{{title}}\".\n\n{{content}}",
            )
            .unwrap();
        prompts
            .register(
                "blog",
                "Write a blog post about {{topic}}.{{#if scripture}} Anchor it in {{scripture}}.{{/if}}",
            )
            .unwrap();
        prompts
    }

    #[test]
    fn renders_bound_placeholders_verbatim() {
        let prompts = sermon_set();
        let text = prompts
            .render(
                "summary",
                &json!({
                    "title": "Grace & Truth <Part 1>",
                    "content": "\"I am the way\" (John 14:6); faith > fear & doubt"
                }),
            )
            .unwrap();
        assert_eq!(
            text,
            "Summarize the sermon titled \"Grace & Truth <Part 1>\".\n\n\
             \"I am the way\" (John 14:6); faith > fear & doubt"
        );
    }

    #[test]
    fn unbound_placeholder_fails_fast() {
        let prompts = sermon_set();
        let err = prompts
            .render("summary", &json!({"title": "On Hope"}))
            .unwrap_err();
        assert!(err.is_caller_error(), "got {err:?}");
    }

    #[test]
    fn conditional_span_follows_field_truthiness() {
        let prompts = sermon_set();
        let with = prompts
            .render("blog", &json!({"topic": "grace", "scripture": "Eph 2:8"}))
            .unwrap();
        assert_eq!(with, "Write a blog post about grace. Anchor it in Eph 2:8.");

        // a null binding counts as absent, not as an unbound placeholder
        let without = prompts
            .render("blog", &json!({"topic": "grace", "scripture": null}))
            .unwrap();
        assert_eq!(without, "Write a blog post about grace.");
    }

    #[test]
    fn unknown_template_is_an_error() {
        let prompts = sermon_set();
        assert!(!prompts.has("missing"));
        assert!(prompts.render("missing", &json!({})).is_err());
    }
}

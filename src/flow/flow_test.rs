use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use serde_json::{Value, json};

use crate::config::CoreConfig;
use crate::dispatch::{NotificationRecord, NotificationStore};
use crate::error::FlowError;
use crate::flow::account::{AccountRef, IdentityProvider, MailTransport};
use crate::flow::{FlowRegistry, default_prompts, generate, narrate};
use crate::model::{MediaPayload, ModelInvoker, ModelRequest, ModelResponse};

/// Scripted invoker: pops one canned result per call and records every
/// request it saw.
struct StubInvoker {
    responses: Mutex<VecDeque<Result<ModelResponse, FlowError>>>,
    calls: AtomicUsize,
    requests: Mutex<Vec<ModelRequest>>,
}

impl StubInvoker {
    fn new(responses: Vec<Result<ModelResponse, FlowError>>) -> Arc<Self> {
        Arc::new(Self {
            responses: Mutex::new(responses.into()),
            calls: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
        })
    }

    fn text(text: &str) -> Result<ModelResponse, FlowError> {
        Ok(ModelResponse {
            text: Some(text.to_string()),
            media: None,
        })
    }

    fn media(url: &str, mime_type: &str) -> Result<ModelResponse, FlowError> {
        Ok(ModelResponse {
            text: None,
            media: Some(MediaPayload {
                url: url.to_string(),
                mime_type: mime_type.to_string(),
            }),
        })
    }

    fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ModelInvoker for StubInvoker {
    async fn invoke(&self, request: ModelRequest) -> Result<ModelResponse, FlowError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push(request);
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(FlowError::Provider("stub exhausted".into())))
    }
}

struct NullIdentity;

#[async_trait]
impl IdentityProvider for NullIdentity {
    async fn find_account_by_email(&self, _email: &str) -> Result<Option<AccountRef>, FlowError> {
        Ok(None)
    }
    async fn mint_reset_link(&self, _email: &str) -> Result<String, FlowError> {
        Ok("https://example.org/reset".into())
    }
}

struct NullMail;

#[async_trait]
impl MailTransport for NullMail {
    async fn send(&self, _to: &str, _subject: &str, _body: &str) -> Result<(), FlowError> {
        Ok(())
    }
}

struct NullStore;

#[async_trait]
impl NotificationStore for NullStore {
    async fn create(&self, _record: NotificationRecord) -> Result<(), FlowError> {
        Ok(())
    }
}

fn registry_with(invoker: Arc<StubInvoker>) -> FlowRegistry {
    FlowRegistry::standard(
        &CoreConfig::for_tests(),
        invoker,
        Arc::new(NullIdentity),
        Arc::new(NullMail),
        Arc::new(NullStore),
    )
    .expect("registry builds")
}

#[tokio::test]
async fn standard_registry_lists_every_flow() {
    let registry = registry_with(StubInvoker::new(vec![]));
    assert_eq!(
        registry.flow_names(),
        vec![
            "artwork",
            "blog_post",
            "daily_verse",
            "install_prompt",
            "partner_suggestions",
            "password_reset",
            "sermon_summary",
            "summarize_and_read",
        ]
    );
}

#[tokio::test]
async fn unknown_flow_is_a_caller_error() {
    let registry = registry_with(StubInvoker::new(vec![]));
    let err = registry.run("sermon_remix", Value::Null).await.unwrap_err();
    assert!(err.is_caller_error());
}

#[tokio::test]
async fn daily_verse_returns_contract_conformant_output() {
    let invoker = StubInvoker::new(vec![StubInvoker::text(
        r#"{"verse_text": "Be strong and courageous.", "reference": "Joshua 1:9", "reflection": "Courage comes from trust."}"#,
    )]);
    let registry = registry_with(invoker.clone());

    let output = registry
        .run(generate::DAILY_VERSE, Value::Null)
        .await
        .unwrap();
    assert_eq!(output["reference"], json!("Joshua 1:9"));

    let flow = registry.get(generate::DAILY_VERSE).unwrap();
    assert!(flow.contract().validate_output(&output).is_ok());
    assert_eq!(invoker.call_count(), 1);
}

#[tokio::test]
async fn structured_request_carries_the_output_schema_hint() {
    let invoker = StubInvoker::new(vec![StubInvoker::text(r#"{"summary": "Grace, briefly."}"#)]);
    let registry = registry_with(invoker.clone());

    registry
        .run(
            generate::SERMON_SUMMARY,
            json!({"title": "On Grace", "content": "Ephesians 2 tells us..."}),
        )
        .await
        .unwrap();

    let requests = invoker.requests.lock().unwrap();
    assert!(requests[0].wants_structured_json());
    assert!(requests[0].prompt.contains("On Grace"));
}

#[tokio::test]
async fn malformed_input_is_rejected_before_any_model_call() {
    let invoker = StubInvoker::new(vec![]);
    let registry = registry_with(invoker.clone());

    let err = registry
        .run(generate::SERMON_SUMMARY, json!({"title": "missing content"}))
        .await
        .unwrap_err();
    assert!(err.is_caller_error());
    assert_eq!(invoker.call_count(), 0, "no paid call for malformed input");
}

#[tokio::test]
async fn output_violating_the_contract_is_a_typed_error_not_a_value() {
    let invoker = StubInvoker::new(vec![StubInvoker::text(
        r#"{"verse_text": "Be strong.", "reference": 7}"#,
    )]);
    let registry = registry_with(invoker);

    let err = registry
        .run(generate::DAILY_VERSE, Value::Null)
        .await
        .unwrap_err();
    assert!(matches!(err, FlowError::Validation { .. }));
    assert!(!err.is_caller_error());
}

#[tokio::test]
async fn non_json_model_output_is_a_provider_error() {
    let invoker = StubInvoker::new(vec![StubInvoker::text("Here is your verse: ...")]);
    let registry = registry_with(invoker);

    let err = registry
        .run(generate::DAILY_VERSE, Value::Null)
        .await
        .unwrap_err();
    assert!(matches!(err, FlowError::Provider(_)));
}

#[tokio::test]
async fn empty_summary_skips_the_audio_stage() {
    let invoker = StubInvoker::new(vec![StubInvoker::text("   ")]);
    let registry = registry_with(invoker.clone());

    let err = registry
        .run(
            narrate::SUMMARIZE_AND_READ,
            json!({"title": "On Hope", "content": "Romans 15:13 ..."}),
        )
        .await
        .unwrap_err();

    assert!(matches!(err, FlowError::Generation(_)));
    assert_eq!(invoker.call_count(), 1, "stage 2 must never start");
}

#[tokio::test]
async fn summarize_and_read_produces_wav_audio() {
    // 0,1,2,3 is two frames of 16-bit mono PCM
    let invoker = StubInvoker::new(vec![
        StubInvoker::text("A short spoken summary."),
        StubInvoker::media("data:audio/L16;rate=24000;base64,AAECAw==", "audio/L16"),
    ]);
    let registry = registry_with(invoker.clone());

    let output = registry
        .run(
            narrate::SUMMARIZE_AND_READ,
            json!({"title": "On Hope", "content": "Romans 15:13 ..."}),
        )
        .await
        .unwrap();

    assert_eq!(output["summary"], json!("A short spoken summary."));
    let audio_url = output["audio_url"].as_str().unwrap();
    assert!(audio_url.starts_with("data:audio/wav;base64,"));
    assert_eq!(invoker.call_count(), 2);

    // stage 2 received stage 1's output as its prompt, with the voice knob
    let requests = invoker.requests.lock().unwrap();
    assert_eq!(requests[1].prompt, "A short spoken summary.");
    assert!(requests[1].config.as_ref().unwrap().voice.is_some());
}

#[tokio::test]
async fn missing_audio_media_fails_the_whole_flow() {
    let invoker = StubInvoker::new(vec![
        StubInvoker::text("A short spoken summary."),
        StubInvoker::text("(no audio, just text)"),
    ]);
    let registry = registry_with(invoker);

    let err = registry
        .run(
            narrate::SUMMARIZE_AND_READ,
            json!({"title": "On Hope", "content": "..."}),
        )
        .await
        .unwrap_err();
    assert!(
        matches!(err, FlowError::Generation(_)),
        "text-only fallback must never be substituted"
    );
}

#[tokio::test]
async fn artwork_returns_only_the_media_url() {
    let invoker = StubInvoker::new(vec![Ok(ModelResponse {
        text: Some("Here is your artwork!".into()),
        media: Some(MediaPayload {
            url: "data:image/png;base64,QQ==".into(),
            mime_type: "image/png".into(),
        }),
    })]);
    let registry = registry_with(invoker);

    let output = registry
        .run("artwork", json!({"title": "Hope"}))
        .await
        .unwrap();
    assert_eq!(output, json!({"artwork_url": "data:image/png;base64,QQ=="}));
}

#[tokio::test]
async fn artwork_without_media_fails() {
    let invoker = StubInvoker::new(vec![StubInvoker::text("no image today")]);
    let registry = registry_with(invoker);

    let err = registry
        .run("artwork", json!({"title": "Hope"}))
        .await
        .unwrap_err();
    assert!(matches!(err, FlowError::Generation(_)));
}

#[tokio::test]
async fn provider_failure_propagates_untouched() {
    let invoker = StubInvoker::new(vec![Err(FlowError::Provider("503 from upstream".into()))]);
    let registry = registry_with(invoker);

    let err = registry
        .run(generate::DAILY_VERSE, Value::Null)
        .await
        .unwrap_err();
    assert!(matches!(err, FlowError::Provider(_)));
}

#[test]
fn default_prompts_cover_every_generative_template() {
    let prompts = default_prompts().unwrap();
    for name in [
        generate::DAILY_VERSE,
        generate::SERMON_SUMMARY,
        generate::BLOG_POST,
        generate::PARTNER_SUGGESTIONS,
        narrate::SUMMARIZE_AND_READ,
        "artwork",
    ] {
        assert!(prompts.has(name), "missing template `{name}`");
    }
}

//! End-to-end generation scenarios against a scripted model

use pretty_assertions::assert_eq;
use std::sync::Arc;
use std::time::Duration;
use wf_cache::ResultCache;
use wf_core::{
    EngineConfig, EngineError, FailureCategory, GenerationEvent, GenerationOrchestrator, GenerationState, ModelError,
};
use wf_artifact::{extract_code, InteractivityLevel};
use wf_validation::InteractivityValidator;
use wf_test_utils::{
    fenced, Reply, ScriptedModelClient, INTERACTIVE_COMPONENT, STATIC_COMPONENT, SYNTAX_BROKEN, UNREPAIRABLE_STATIC,
    UNSAFE_COMPONENT,
};

const MODEL: &str = "test-model";

fn setup(client: ScriptedModelClient, config: EngineConfig) -> (Arc<GenerationOrchestrator>, Arc<ScriptedModelClient>) {
    let client = Arc::new(client);
    let cache = Arc::new(ResultCache::new(config.cache_capacity));
    let orchestrator = Arc::new(GenerationOrchestrator::new(client.clone(), cache, config));
    (orchestrator, client)
}

fn config() -> EngineConfig {
    EngineConfig::new().with_model(MODEL)
}

fn state_changes(events: &mut tokio::sync::broadcast::Receiver<GenerationEvent>) -> Vec<GenerationState> {
    let mut states = Vec::new();
    while let Ok(event) = events.try_recv() {
        if let GenerationEvent::StateChanged { state, .. } = event {
            states.push(state);
        }
    }
    states
}

#[tokio::test(start_paused = true)]
async fn static_first_attempt_is_retried_once() {
    let client = ScriptedModelClient::new()
        .with_text(fenced(STATIC_COMPONENT))
        .with_text(fenced(INTERACTIVE_COMPONENT));
    let (orch, client) = setup(client, config());
    let mut events = orch.events();

    let started = tokio::time::Instant::now();
    let result = orch.generate("Create a button").await.unwrap();

    assert!(started.elapsed() >= Duration::from_millis(1000));
    assert_eq!(result.retry_count, 1);
    assert_eq!(result.interactivity.level, InteractivityLevel::Interactive);
    assert!(result.compile_ok);
    assert!(!result.cache_hit);

    assert_eq!(
        state_changes(&mut events),
        vec![
            GenerationState::Generating,
            GenerationState::Validating,
            GenerationState::Retrying,
            GenerationState::Generating,
            GenerationState::Validating,
            GenerationState::Compiled,
        ]
    );

    let prompts = client.prompts();
    assert_eq!(prompts.len(), 2);
    assert_eq!(prompts[0], "Create a button");
    assert!(prompts[1].starts_with("Create a button"));
    assert!(prompts[1].contains("useState hook"));
    assert_eq!(orch.cache().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn repeated_prompt_hits_cache() {
    let client = ScriptedModelClient::new().with_text(fenced(INTERACTIVE_COMPONENT));
    let (orch, client) = setup(client, config());

    let first = orch.generate("Create a button").await.unwrap();
    let second = orch.generate("Create a button").await.unwrap();

    assert!(second.cache_hit);
    assert_eq!(second.code, first.code);
    assert_eq!(second.retry_count, 0);
    assert_eq!(client.calls(), 1);
    assert_eq!(orch.cache_stats().entries[0].hit_count, 1);
}

#[tokio::test(start_paused = true)]
async fn unsafe_code_is_rejected_and_not_cached() {
    let client = ScriptedModelClient::new().with_text(fenced(UNSAFE_COMPONENT));
    let (orch, _) = setup(client, config());

    let err = orch.generate("Build a calculator").await.unwrap_err();
    assert!(matches!(err, EngineError::Safety(_)));

    let snapshot = orch.snapshot();
    assert_eq!(snapshot.state, GenerationState::Error);
    assert_eq!(snapshot.failure, Some(FailureCategory::Safety));
    let result = snapshot.result.unwrap();
    assert!(!result.compile_ok);
    assert!(result.compile_errors.iter().any(|e| e.contains("eval(")));
    assert!(orch.cache().is_empty());
}

#[tokio::test(start_paused = true)]
async fn exhausted_retries_fall_back_to_repair() {
    let client = ScriptedModelClient::new().with_fallback(Reply::Text(fenced(STATIC_COMPONENT)));
    let (orch, client) = setup(client, config());

    let started = tokio::time::Instant::now();
    let result = orch.generate("Landing page hero").await.unwrap();

    assert_eq!(client.calls(), 3);
    assert!(started.elapsed() >= Duration::from_millis(3000));
    assert_eq!(result.retry_count, 2);
    assert_eq!(result.interactivity.level, InteractivityLevel::Partial);
    assert!(result.code.contains("setAutoCount"));

    let snapshot = orch.snapshot();
    assert!(snapshot
        .diagnostics
        .iter()
        .any(|d| d.contains("raised interactivity from static")));
    assert_eq!(orch.cache().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn unrepairable_static_reports_limited_success() {
    let client = ScriptedModelClient::new().with_fallback(Reply::Text(fenced(UNREPAIRABLE_STATIC)));
    let (orch, client) = setup(client, config());

    let result = orch.generate("A static page").await.unwrap();

    assert_eq!(client.calls(), 3);
    assert_eq!(result.retry_count, 2);
    assert!(result.compile_ok);
    assert_eq!(result.interactivity.level, InteractivityLevel::Static);
    assert!(orch.snapshot().diagnostics.iter().any(|d| d.contains("limited success")));
    assert_eq!(orch.snapshot().state, GenerationState::Compiled);
    assert!(orch.cache().is_empty());
}

#[tokio::test(start_paused = true)]
async fn cache_keeps_the_fifty_most_recent_prompts() {
    let client = ScriptedModelClient::new().with_fallback(Reply::Text(fenced(INTERACTIVE_COMPONENT)));
    let (orch, _) = setup(client, config());

    for i in 0..52 {
        orch.generate(&format!("Prompt number {i}")).await.unwrap();
    }

    let cache = orch.cache();
    assert_eq!(cache.len(), 50);
    assert!(cache.get("Prompt number 0", MODEL).is_none());
    assert!(cache.get("Prompt number 1", MODEL).is_none());
    assert!(cache.get("Prompt number 2", MODEL).is_some());
    assert!(cache.get("Prompt number 51", MODEL).is_some());
}

#[tokio::test(start_paused = true)]
async fn syntax_errors_surface_as_compile_failures() {
    let client = ScriptedModelClient::new().with_text(fenced(SYNTAX_BROKEN));
    let (orch, _) = setup(client, config());

    let err = orch.generate("Counter").await.unwrap_err();
    assert!(matches!(err, EngineError::Compile(_)));

    let snapshot = orch.snapshot();
    assert_eq!(snapshot.failure, Some(FailureCategory::Syntax));
    assert!(!snapshot.result.unwrap().compile_errors.is_empty());
    assert!(orch.cache().is_empty());
}

#[tokio::test(start_paused = true)]
async fn model_errors_are_not_retried() {
    let client = ScriptedModelClient::new()
        .with_error(ModelError::Network("connection reset".to_string()))
        .with_fallback(Reply::Text(fenced(INTERACTIVE_COMPONENT)));
    let (orch, client) = setup(client, config());

    let err = orch.generate("Create a button").await.unwrap_err();
    assert!(matches!(err, EngineError::Model(ModelError::Network(_))));
    assert_eq!(client.calls(), 1);
    assert_eq!(orch.snapshot().failure, Some(FailureCategory::Network));
    assert!(!orch.snapshot().suggestions.is_empty());
}

#[tokio::test(start_paused = true)]
async fn cancel_returns_to_idle() {
    let client = ScriptedModelClient::new()
        .with_text(fenced(INTERACTIVE_COMPONENT))
        .with_delay(Duration::from_secs(10));
    let (orch, _) = setup(client, config());
    let mut snapshots = orch.subscribe();

    let task = tokio::spawn({
        let orch = orch.clone();
        async move { orch.generate("Create a button").await }
    });

    snapshots
        .wait_for(|s| s.state == GenerationState::Generating)
        .await
        .unwrap();
    assert!(orch.cancel());

    let outcome = task.await.unwrap();
    assert!(matches!(outcome, Err(EngineError::Cancelled)));
    assert_eq!(orch.snapshot().state, GenerationState::Idle);
    assert!(orch.snapshot().result.is_none());
    assert!(orch.cache().is_empty());
    assert!(!orch.cancel());
}

#[tokio::test(start_paused = true)]
async fn newer_generation_supersedes_older() {
    let client = ScriptedModelClient::new()
        .with_fallback(Reply::Text(fenced(INTERACTIVE_COMPONENT)))
        .with_delay(Duration::from_secs(5));
    let (orch, _) = setup(client, config());
    let mut snapshots = orch.subscribe();

    let first = tokio::spawn({
        let orch = orch.clone();
        async move { orch.generate("First prompt").await }
    });
    snapshots
        .wait_for(|s| s.generation_id == 1 && s.state == GenerationState::Generating)
        .await
        .unwrap();

    let second = orch.generate("Second prompt").await.unwrap();
    let first = first.await.unwrap();

    assert!(matches!(first, Err(EngineError::Cancelled)));
    assert!(second.compile_ok);

    let snapshot = orch.snapshot();
    assert_eq!(snapshot.generation_id, 2);
    assert_eq!(snapshot.prompt.as_deref(), Some("Second prompt"));
    assert_eq!(snapshot.state, GenerationState::Compiled);
    assert!(orch.cache().get("First prompt", MODEL).is_none());
}

#[tokio::test(start_paused = true)]
async fn streaming_publishes_chunks_and_interim_assessment() {
    let text = fenced(INTERACTIVE_COMPONENT);
    let client = ScriptedModelClient::new()
        .with_reply(Reply::chunked(&text, 64))
        .with_chunk_delay(Duration::from_millis(400));
    let (orch, _) = setup(client, config().with_streaming(true));
    let mut events = orch.events();

    let result = orch.generate("Create a button").await.unwrap();
    assert_eq!(result.interactivity.level, InteractivityLevel::Interactive);

    let mut streamed = String::new();
    let mut states = Vec::new();
    while let Ok(event) = events.try_recv() {
        match event {
            GenerationEvent::Chunk { text, .. } => streamed.push_str(&text),
            GenerationEvent::StateChanged { state, .. } => states.push(state),
            GenerationEvent::Diagnostic { .. } => {}
        }
    }
    assert_eq!(streamed, text);
    assert_eq!(
        states,
        vec![GenerationState::Streaming, GenerationState::Validating, GenerationState::Compiled]
    );

    let snapshot = orch.snapshot();
    assert_eq!(snapshot.streamed_bytes, text.len());
    assert!(snapshot.interim.is_some());
}

#[tokio::test(start_paused = true)]
async fn fast_stream_gets_one_assessment_of_the_full_buffer() {
    let text = fenced(INTERACTIVE_COMPONENT);
    let client = ScriptedModelClient::new()
        .with_reply(Reply::chunked(&text, 64))
        .with_chunk_delay(Duration::from_millis(50));
    let (orch, _) = setup(client, config().with_streaming(true));

    orch.generate("Create a button").await.unwrap();

    let snapshot = orch.snapshot();
    assert_eq!(snapshot.interim_passes, 1);
    assert_eq!(
        snapshot.interim,
        Some(InteractivityValidator::new().assess(&extract_code(&text)))
    );
}

#[tokio::test(start_paused = true)]
async fn regenerate_bypasses_and_refreshes_cache() {
    let client = ScriptedModelClient::new().with_fallback(Reply::Text(fenced(INTERACTIVE_COMPONENT)));
    let (orch, client) = setup(client, config());

    orch.generate("Create a button").await.unwrap();
    let regenerated = orch.regenerate_with_enhancements().await.unwrap();

    assert!(!regenerated.cache_hit);
    assert_eq!(regenerated.retry_count, 0);
    assert_eq!(client.calls(), 2);

    let prompts = client.prompts();
    assert!(prompts[1].starts_with("Create a button"));
    assert!(prompts[1].contains("not interactive enough"));

    assert_eq!(orch.snapshot().prompt.as_deref(), Some("Create a button"));
    assert_eq!(orch.cache().len(), 1);
}

#[tokio::test]
async fn regenerate_without_history_is_configuration_error() {
    let (orch, client) = setup(ScriptedModelClient::new(), config());
    let err = orch.regenerate_with_enhancements().await.unwrap_err();
    assert!(matches!(err, EngineError::Configuration(_)));
    assert_eq!(client.calls(), 0);
}

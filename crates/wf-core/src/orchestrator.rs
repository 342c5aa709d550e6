//! Generation orchestrator
//!
//! Drives one prompt through the state machine:
//! - cache lookup, then a streamed or single model call
//! - extraction and interactivity assessment
//! - up to two enhanced retries with capped backoff, then auto-repair
//! - safety and syntax checks, caching of non-static results
//!
//! One generation is active at a time. Its [`CancellationToken`] owns the
//! model call and every timer; a newer generation or [`GenerationOrchestrator::cancel`]
//! fires it, and any later publication from the old generation is discarded.

use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::model::{ChatRequest, ModelClient};
use crate::prompts;
use crate::state::{GenerationEvent, GenerationSnapshot, GenerationState};
use futures::StreamExt;
use parking_lot::Mutex;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, watch};
use tokio_util::sync::CancellationToken;
use wf_artifact::{extract_code, GenerationRequest, GenerationResult, InteractivityAssessment};
use wf_cache::{CacheStats, ResultCache};
use wf_validation::{AutoRepairEngine, CodeSafetyValidator, InteractivityValidator, RepairAction, SyntaxChecker};

/// Automatic retries before auto-repair
pub const MAX_RETRIES: u8 = 2;

/// Quiet period before re-validating the stream buffer
pub const STREAM_DEBOUNCE: Duration = Duration::from_millis(300);

const BACKOFF_BASE_MS: u64 = 1000;
const BACKOFF_CAP_MS: u64 = 3000;
const EVENT_CAPACITY: usize = 256;

/// Backoff before retry number `retry_count + 1`: `min(1000 * 2^n, 3000)` ms
#[must_use]
pub fn backoff_delay(retry_count: u8) -> Duration {
    let factor = 1_u64 << u32::from(retry_count.min(16));
    Duration::from_millis(BACKOFF_BASE_MS.saturating_mul(factor).min(BACKOFF_CAP_MS))
}

struct ActiveGeneration {
    id: u64,
    token: CancellationToken,
}

/// Prompt-to-component state machine
pub struct GenerationOrchestrator {
    client: Arc<dyn ModelClient>,
    cache: Arc<ResultCache>,
    config: EngineConfig,
    safety: CodeSafetyValidator,
    interactivity: InteractivityValidator,
    repair: AutoRepairEngine,
    syntax: SyntaxChecker,
    snapshot: watch::Sender<GenerationSnapshot>,
    events: broadcast::Sender<GenerationEvent>,
    active: Mutex<Option<ActiveGeneration>>,
    next_id: AtomicU64,
}

impl fmt::Debug for GenerationOrchestrator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GenerationOrchestrator")
            .field("model", &self.config.model)
            .field("state", &self.snapshot.borrow().state)
            .field("cache_size", &self.cache.len())
            .finish_non_exhaustive()
    }
}

impl GenerationOrchestrator {
    /// Create orchestrator over a model client and a shared cache
    #[must_use]
    pub fn new(client: Arc<dyn ModelClient>, cache: Arc<ResultCache>, config: EngineConfig) -> Self {
        let (snapshot, _) = watch::channel(GenerationSnapshot::idle());
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            client,
            cache,
            config,
            safety: CodeSafetyValidator::new(),
            interactivity: InteractivityValidator::new(),
            repair: AutoRepairEngine::new(),
            syntax: SyntaxChecker::new(),
            snapshot,
            events,
            active: Mutex::new(None),
            next_id: AtomicU64::new(0),
        }
    }

    /// Configuration in use
    #[inline]
    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Shared result cache
    #[inline]
    #[must_use]
    pub fn cache(&self) -> &Arc<ResultCache> {
        &self.cache
    }

    /// Latest snapshot
    #[must_use]
    pub fn snapshot(&self) -> GenerationSnapshot {
        self.snapshot.borrow().clone()
    }

    /// Receiver notified on every snapshot change
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<GenerationSnapshot> {
        self.snapshot.subscribe()
    }

    /// Receiver of transitions, chunks and diagnostics
    #[must_use]
    pub fn events(&self) -> broadcast::Receiver<GenerationEvent> {
        self.events.subscribe()
    }

    /// Cache inspection
    #[must_use]
    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// Drop every cached result
    pub fn clear_cache(&self) {
        self.cache.clear();
    }

    /// Generate with the configured model and streaming mode
    ///
    /// # Errors
    /// See [`Self::generate_request`]
    pub async fn generate(&self, prompt: &str) -> Result<GenerationResult, EngineError> {
        let request = GenerationRequest::new(prompt, self.config.model.as_str()).with_streaming(self.config.streaming);
        self.generate_request(request).await
    }

    /// Run a generation request to completion
    ///
    /// Supersedes any generation in flight.
    ///
    /// # Errors
    /// - `EngineError::Configuration` for an empty model or prompt; nothing starts
    /// - `EngineError::Model` when the model call fails
    /// - `EngineError::Safety` / `EngineError::Compile` when the final code is rejected
    /// - `EngineError::Cancelled` when cancelled or superseded
    pub async fn generate_request(&self, request: GenerationRequest) -> Result<GenerationResult, EngineError> {
        check_request(&request)?;
        let model_prompt = request.prompt.clone();
        self.run(request, model_prompt, true).await
    }

    /// Regenerate the current prompt with an enhancement prompt
    ///
    /// Purges the cache entry for the original prompt and restarts with
    /// `retry_count = 0`.
    ///
    /// # Errors
    /// `EngineError::Configuration` when there is no previous result, otherwise
    /// as [`Self::generate_request`]
    pub async fn regenerate_with_enhancements(&self) -> Result<GenerationResult, EngineError> {
        let snapshot = self.snapshot();
        let (Some(prompt), Some(model), Some(previous)) = (snapshot.prompt, snapshot.model, snapshot.result) else {
            return Err(EngineError::Configuration("no previous generation to enhance".to_string()));
        };

        let request = GenerationRequest::new(prompt, model).with_streaming(self.config.streaming);
        check_request(&request)?;

        self.cache.remove(&request.prompt, &request.model);
        let enhanced = prompts::enhancement_prompt(&request.prompt, &previous.interactivity);
        tracing::info!(prompt = %request.prompt, "Regenerating with enhancements");
        self.run(request, enhanced, false).await
    }

    /// Cancel the generation in flight and return to `Idle`
    ///
    /// Returns whether a generation was active.
    pub fn cancel(&self) -> bool {
        let mut active = self.active.lock();
        let Some(generation) = active.take() else {
            return false;
        };
        generation.token.cancel();

        self.snapshot.send_modify(|s| {
            s.state = GenerationState::Idle;
            s.interim = None;
        });
        let _ = self.events.send(GenerationEvent::StateChanged {
            generation_id: generation.id,
            state: GenerationState::Idle,
        });
        tracing::info!(generation_id = generation.id, "Generation cancelled");
        true
    }

    async fn run(
        &self,
        request: GenerationRequest,
        model_prompt: String,
        use_cache: bool,
    ) -> Result<GenerationResult, EngineError> {
        let (id, token) = self.begin(&request);
        tracing::info!(generation_id = id, model = %request.model, streaming = request.streaming, "Starting generation");

        match self.drive(id, &token, &request, model_prompt, use_cache).await {
            Ok(result) => {
                self.finish(id);
                Ok(result)
            }
            Err(EngineError::Cancelled) => {
                tracing::debug!(generation_id = id, "Discarded cancelled generation");
                Err(EngineError::Cancelled)
            }
            Err(error) => {
                self.fail(id, &error);
                self.finish(id);
                Err(error)
            }
        }
    }

    async fn drive(
        &self,
        id: u64,
        token: &CancellationToken,
        request: &GenerationRequest,
        mut model_prompt: String,
        use_cache: bool,
    ) -> Result<GenerationResult, EngineError> {
        if use_cache {
            if let Some(entry) = self.cache.get(&request.prompt, &request.model) {
                let result = GenerationResult {
                    code: entry.code,
                    compile_ok: true,
                    compile_errors: Vec::new(),
                    interactivity: entry.interactivity,
                    retry_count: 0,
                    cache_hit: true,
                };
                let published = result.clone();
                self.update(id, move |s| {
                    s.state = GenerationState::Compiled;
                    s.result = Some(published);
                })?;
                tracing::info!(generation_id = id, hits = entry.hit_count, "Served from cache");
                return Ok(result);
            }
        }

        let mut retry_count = 0_u8;
        let (code, assessment) = loop {
            let output = self.call_model(id, token, request, &model_prompt).await?;

            self.transition(id, GenerationState::Validating)?;
            let code = extract_code(&output);
            let assessment = self.interactivity.assess(&code);
            let candidate = GenerationResult::candidate(code.as_str(), assessment.clone(), retry_count);
            self.update(id, move |s| s.result = Some(candidate))?;

            if !assessment.level.is_static() {
                break (code, assessment);
            }

            if retry_count >= MAX_RETRIES {
                break self.auto_repair(id, &code, &assessment)?;
            }

            self.transition(id, GenerationState::Retrying)?;
            self.diagnostic(
                id,
                format!(
                    "Attempt {} produced static code ({}); retrying with {} missing patterns",
                    retry_count + 1,
                    assessment.summary(),
                    assessment.missing_patterns.len()
                ),
            )?;
            model_prompt = prompts::enhancement_prompt(&request.prompt, &assessment);

            let delay = backoff_delay(retry_count);
            let delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
            tracing::debug!(generation_id = id, delay_ms, "Backing off before retry");
            tokio::select! {
                biased;
                () = token.cancelled() => return Err(EngineError::Cancelled),
                () = tokio::time::sleep(delay) => {}
            }
            retry_count += 1;
        };

        self.safety.validate(&code).into_result()?;
        self.syntax.check(&code)?;

        let mut result = GenerationResult::candidate(code, assessment, retry_count);
        result.compile_ok = true;

        self.commit(id, request, &result)?;
        tracing::info!(
            generation_id = id,
            retries = result.retry_count,
            interactivity = %result.interactivity.summary(),
            "Generation compiled"
        );
        Ok(result)
    }

    async fn call_model(
        &self,
        id: u64,
        token: &CancellationToken,
        request: &GenerationRequest,
        prompt: &str,
    ) -> Result<String, EngineError> {
        let chat = ChatRequest {
            model: request.model.clone(),
            messages: prompts::build_messages(prompt),
            temperature: self.config.temperature,
            max_tokens: self.config.max_tokens,
            stream: request.streaming,
        };

        if !request.streaming {
            self.transition(id, GenerationState::Generating)?;
            return tokio::select! {
                biased;
                () = token.cancelled() => Err(EngineError::Cancelled),
                reply = self.client.complete(&chat) => reply.map_err(EngineError::from),
            };
        }

        self.update(id, |s| {
            s.state = GenerationState::Streaming;
            s.streamed_bytes = 0;
            s.interim = None;
            s.interim_passes = 0;
        })?;

        let mut chunks = tokio::select! {
            biased;
            () = token.cancelled() => return Err(EngineError::Cancelled),
            stream = self.client.stream(&chat) => stream?,
        };

        let mut buffer = String::new();
        let debounce = tokio::time::sleep(STREAM_DEBOUNCE);
        tokio::pin!(debounce);
        let mut revalidate = false;

        loop {
            tokio::select! {
                biased;
                () = token.cancelled() => return Err(EngineError::Cancelled),
                next = chunks.next() => match next {
                    Some(Ok(text)) => {
                        buffer.push_str(&text);
                        let len = buffer.len();
                        self.update(id, move |s| s.streamed_bytes = len)?;
                        let _ = self.events.send(GenerationEvent::Chunk { generation_id: id, text });
                        debounce.as_mut().reset(tokio::time::Instant::now() + STREAM_DEBOUNCE);
                        revalidate = true;
                    }
                    Some(Err(e)) => return Err(e.into()),
                    None => break,
                },
                () = &mut debounce, if revalidate => {
                    revalidate = false;
                    self.publish_interim(id, &buffer)?;
                }
            }
        }

        // Tail that arrived inside the debounce window
        if revalidate {
            self.publish_interim(id, &buffer)?;
        }

        Ok(buffer)
    }

    fn publish_interim(&self, id: u64, buffer: &str) -> Result<(), EngineError> {
        let interim = self.interactivity.assess(&extract_code(buffer));
        tracing::trace!(generation_id = id, score = interim.score, "Interim stream assessment");
        self.update(id, move |s| {
            s.interim = Some(interim);
            s.interim_passes += 1;
        })
    }

    fn auto_repair(
        &self,
        id: u64,
        code: &str,
        before: &InteractivityAssessment,
    ) -> Result<(String, InteractivityAssessment), EngineError> {
        let outcome = self.repair.repair(code);
        let after = self.interactivity.assess(&outcome.code);

        let message = match outcome.skipped {
            Some(reason) => format!(
                "Retries exhausted and auto-repair was skipped ({reason}); result remains {}, limited success",
                after.summary()
            ),
            None if after.level.is_static() => format!(
                "Retries exhausted; auto-repair applied {} but the result remains {}, limited success",
                describe_actions(&outcome.actions),
                after.summary()
            ),
            None => format!(
                "Retries exhausted; auto-repair applied {} and raised interactivity from {} to {}",
                describe_actions(&outcome.actions),
                before.summary(),
                after.summary()
            ),
        };
        tracing::info!(generation_id = id, applied = outcome.applied(), "{message}");
        self.diagnostic(id, message)?;

        let candidate = GenerationResult::candidate(outcome.code.as_str(), after.clone(), MAX_RETRIES);
        self.update(id, move |s| s.result = Some(candidate))?;
        Ok((outcome.code, after))
    }

    fn begin(&self, request: &GenerationRequest) -> (u64, CancellationToken) {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        let token = CancellationToken::new();

        let mut active = self.active.lock();
        if let Some(previous) = active.replace(ActiveGeneration {
            id,
            token: token.clone(),
        }) {
            previous.token.cancel();
            tracing::debug!(superseded = previous.id, by = id, "Superseded generation in flight");
        }
        self.snapshot
            .send_replace(GenerationSnapshot::started(id, &request.prompt, &request.model));
        (id, token)
    }

    fn finish(&self, id: u64) {
        let mut active = self.active.lock();
        if active.as_ref().is_some_and(|a| a.id == id) {
            *active = None;
        }
    }

    fn fail(&self, id: u64, error: &EngineError) {
        let category = error.category();
        let messages = error.messages();
        let description = error.to_string();

        let updated = self.update(id, move |s| {
            s.state = GenerationState::Error;
            s.error = Some(description);
            s.failure = Some(category);
            s.suggestions = category.suggestions().iter().map(|text| (*text).to_string()).collect();
            if let Some(result) = s.result.as_mut() {
                result.compile_ok = false;
                result.compile_errors = messages;
            }
        });
        if updated.is_ok() {
            tracing::warn!(generation_id = id, error = %error, "Generation failed");
        }
    }

    fn transition(&self, id: u64, state: GenerationState) -> Result<(), EngineError> {
        self.update(id, move |s| s.state = state)
    }

    fn diagnostic(&self, id: u64, message: String) -> Result<(), EngineError> {
        let event = GenerationEvent::Diagnostic {
            generation_id: id,
            message: message.clone(),
        };
        self.update(id, move |s| s.diagnostics.push(message))?;
        let _ = self.events.send(event);
        Ok(())
    }

    /// Cache a compiled result and publish it, only while `id` is still active
    fn commit(&self, id: u64, request: &GenerationRequest, result: &GenerationResult) -> Result<(), EngineError> {
        let active = self.active.lock();
        if !active.as_ref().is_some_and(|a| a.id == id) {
            return Err(EngineError::Cancelled);
        }

        if result.is_cacheable() {
            self.cache
                .set(&request.prompt, &request.model, result.code.as_str(), result.interactivity.clone());
        }

        let published = result.clone();
        self.publish(id, move |s| {
            s.state = GenerationState::Compiled;
            s.result = Some(published);
        });
        drop(active);
        Ok(())
    }

    /// Apply `f` to the snapshot if `id` is still the active generation
    fn update(&self, id: u64, f: impl FnOnce(&mut GenerationSnapshot)) -> Result<(), EngineError> {
        let active = self.active.lock();
        if !active.as_ref().is_some_and(|a| a.id == id) {
            return Err(EngineError::Cancelled);
        }
        self.publish(id, f);
        drop(active);
        Ok(())
    }

    /// Caller holds the `active` lock
    fn publish(&self, id: u64, f: impl FnOnce(&mut GenerationSnapshot)) {
        let mut changed = None;
        self.snapshot.send_modify(|s| {
            let before = s.state;
            f(s);
            if s.state != before {
                changed = Some(s.state);
            }
        });

        if let Some(state) = changed {
            tracing::debug!(generation_id = id, %state, "State changed");
            let _ = self.events.send(GenerationEvent::StateChanged {
                generation_id: id,
                state,
            });
        }
    }
}

fn check_request(request: &GenerationRequest) -> Result<(), EngineError> {
    if request.model.trim().is_empty() {
        return Err(EngineError::Configuration("model is not set".to_string()));
    }
    if request.prompt.trim().is_empty() {
        return Err(EngineError::Configuration("prompt is empty".to_string()));
    }
    Ok(())
}

fn describe_actions(actions: &[RepairAction]) -> String {
    actions.iter().map(ToString::to_string).collect::<Vec<_>>().join(", ")
}

//! Civic pipeline: runs one chat turn end to end.
//!
//! Stages, strictly in order:
//! 1. Context initializer (history lookup)
//! 2. Need classifier (model, then rules)
//! 3. Resource searcher (search, parse, supplement, or static fallback)
//! 4. Resource verifier (optional)
//! 5. Response assembler, then the turn is persisted
//!
//! Every stage degrades locally. Only an invalid request or a crashed run
//! reaches the boundary, and both become a safe response with `success: false`.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::{Mutex, OwnedMutexGuard, mpsc};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::config::CivicConfig;
use crate::error::{ConfigError, PipelineError};
use crate::llm::provider::LlmProvider;
use crate::pipeline::classifier::NeedClassifier;
use crate::pipeline::context::ContextInitializer;
use crate::pipeline::events::{PipelineEvents, StepTimer};
use crate::pipeline::parser::ResourceParser;
use crate::pipeline::response::{CATASTROPHIC_RESPONSE, FALLBACK_RESPONSE, ResponseAssembler};
use crate::pipeline::rules::RulesEngine;
use crate::pipeline::sanitizer::UrlSanitizer;
use crate::pipeline::search::ResourceSearcher;
use crate::pipeline::types::{ChatRequest, ChatResponse, SessionState};
use crate::pipeline::verifier::ResourceVerifier;
use crate::search::SearchProvider;
use crate::store::{HistoryStore, TurnRecord};

/// External collaborators. Any of them may be absent.
#[derive(Clone, Default)]
pub struct PipelineDeps {
    pub llm: Option<Arc<dyn LlmProvider>>,
    pub search: Option<Arc<dyn SearchProvider>>,
    pub store: Option<Arc<dyn HistoryStore>>,
}

/// Which collaborators are configured.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct CollaboratorStatus {
    pub language_model: bool,
    pub search: bool,
    pub history_store: bool,
}

/// Per-session run locks. Turns for one session run one at a time, in arrival order.
#[derive(Default)]
struct SessionLocks {
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl SessionLocks {
    async fn acquire(&self, session_id: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().await;
            locks.entry(session_id.to_string()).or_default().clone()
        };
        lock.lock_owned().await
    }

    /// Forget the session once no run holds or waits on its lock.
    async fn release(&self, session_id: &str) {
        let mut locks = self.locks.lock().await;
        if let Some(lock) = locks.get(session_id)
            && Arc::strong_count(lock) == 1
        {
            locks.remove(session_id);
        }
    }

    #[cfg(test)]
    async fn tracked(&self) -> usize {
        self.locks.lock().await.len()
    }
}

struct Stages {
    config: CivicConfig,
    context: ContextInitializer,
    classifier: NeedClassifier,
    searcher: ResourceSearcher,
    verifier: Option<ResourceVerifier>,
    assembler: ResponseAssembler,
    sanitizer: UrlSanitizer,
    store: Option<Arc<dyn HistoryStore>>,
    status: CollaboratorStatus,
    sessions: SessionLocks,
}

/// The referral pipeline. Cheap to clone; clones share stages.
#[derive(Clone)]
pub struct CivicPipeline {
    stages: Arc<Stages>,
}

impl CivicPipeline {
    pub fn new(config: CivicConfig, deps: PipelineDeps) -> Result<Self, ConfigError> {
        let region = config.region.clone();
        let status = CollaboratorStatus {
            language_model: deps.llm.is_some(),
            search: deps.search.is_some(),
            history_store: deps.store.is_some(),
        };

        let sanitizer = UrlSanitizer::new(&region);
        let parser = ResourceParser::new(
            config.max_parsed_resources,
            config.description_cap,
            region.default_location.clone(),
            region.name.clone(),
        );

        let verifier = if config.verify_resources {
            Some(ResourceVerifier::new(
                region.clone(),
                deps.llm.clone(),
                config.narrative_verification,
                config.url_check_timeout,
                config.llm_timeout,
            )?)
        } else {
            None
        };

        let stages = Stages {
            context: ContextInitializer::new(
                deps.store.clone(),
                config.history_limit,
                config.store_timeout,
            ),
            classifier: NeedClassifier::new(
                deps.llm.clone(),
                RulesEngine::default_rules(),
                config.classifier_history_turns,
                config.llm_timeout,
            ),
            searcher: ResourceSearcher::new(
                deps.search.clone(),
                parser,
                sanitizer.clone(),
                region.search_locale.clone(),
                config.max_search_queries,
                config.search_timeout,
            ),
            verifier,
            assembler: ResponseAssembler::new(config.clarification.clone()),
            sanitizer,
            store: deps.store,
            status,
            sessions: SessionLocks::default(),
            config,
        };

        info!(
            language_model = status.language_model,
            search = status.search,
            history_store = status.history_store,
            "Civic pipeline ready"
        );
        Ok(Self {
            stages: Arc::new(stages),
        })
    }

    pub fn collaborators(&self) -> CollaboratorStatus {
        self.stages.status
    }

    pub fn config(&self) -> &CivicConfig {
        &self.stages.config
    }

    pub fn sanitizer(&self) -> &UrlSanitizer {
        &self.stages.sanitizer
    }

    /// Handle one chat request. Always returns a response.
    pub async fn handle(&self, request: ChatRequest) -> ChatResponse {
        self.handle_with_events(request, PipelineEvents::new()).await
    }

    /// Same as `handle`, forwarding progress lines to `progress`.
    pub async fn handle_streaming(
        &self,
        request: ChatRequest,
        progress: mpsc::UnboundedSender<String>,
    ) -> ChatResponse {
        self.handle_with_events(request, PipelineEvents::with_progress(progress))
            .await
    }

    async fn handle_with_events(&self, request: ChatRequest, events: PipelineEvents) -> ChatResponse {
        let session_id = request
            .session_id
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        let location = self.stages.config.region.name.clone();

        // Held from context load through persistence.
        let turn_guard = self.stages.sessions.acquire(&session_id).await;

        let pipeline = self.clone();
        let task_session = session_id.clone();
        let task = tokio::spawn(async move {
            let _turn_guard = turn_guard;
            pipeline.run(request.message, task_session, events).await
        });

        let outcome = task.await;
        self.stages.sessions.release(&session_id).await;

        match outcome {
            Ok(Ok(response)) => response,
            Ok(Err(e @ PipelineError::InvalidRequest(_))) => {
                warn!(session_id = %session_id, error = %e, "Rejected request");
                ChatResponse::failure(session_id, FALLBACK_RESPONSE, e.to_string(), location)
            }
            Ok(Err(e)) => {
                error!(session_id = %session_id, error = %e, "Pipeline failed");
                ChatResponse::failure(session_id, CATASTROPHIC_RESPONSE, e.to_string(), location)
            }
            Err(join_error) => {
                let e = PipelineError::TaskFailed(join_error.to_string());
                error!(session_id = %session_id, error = %e, "Pipeline task crashed");
                ChatResponse::failure(session_id, CATASTROPHIC_RESPONSE, e.to_string(), location)
            }
        }
    }

    /// Run all stages for one message.
    pub async fn run(
        &self,
        message: String,
        session_id: String,
        events: PipelineEvents,
    ) -> Result<ChatResponse, PipelineError> {
        if message.trim().is_empty() {
            return Err(PipelineError::InvalidRequest("message is empty".to_string()));
        }

        let s = &self.stages;
        info!(session_id = %session_id, chars = message.len(), "Processing chat turn");
        let mut timer = StepTimer::start();
        let mut state = SessionState::new(message, session_id, s.config.region.name.clone());

        timer.step("initialize_context");
        s.context.initialize(&mut state).await;

        timer.step("decide_strategy");
        events.progress("Analyzing your request");
        let classification = s.classifier.classify(&state, &events).await;
        state.apply(&classification);

        timer.step("search_resources");
        s.searcher.search(&mut state, &events).await;

        timer.step("verify_resources");
        if let Some(verifier) = &s.verifier {
            verifier.verify(&mut state, &events).await;
        }

        timer.step("generate_response");
        s.assembler.assemble(&mut state);
        self.persist(&state).await;

        let (total_ms, timings) = timer.finish(&state.session_id);
        state.execution_time_ms = total_ms;
        state.step_timings = timings;

        Ok(ChatResponse::from_state(state, events.snapshot()))
    }

    /// Save the exchange. Failure is logged and ignored.
    async fn persist(&self, state: &SessionState) {
        let Some(store) = &self.stages.store else {
            return;
        };

        let record = TurnRecord {
            session_id: state.session_id.clone(),
            user_message: state.user_message.clone(),
            agent_response: state.civic_response.clone(),
            need_category: state.need_category,
            urgency_level: state.urgency_level,
            search_performed: state.search_performed,
            search_query: state.search_query.clone(),
            resources_count: state.resources_found.len(),
            created_at: chrono::Utc::now(),
        };

        let timeout = self.stages.config.store_timeout;
        match tokio::time::timeout(timeout, store.append_turn(&record)).await {
            Ok(Ok(())) => debug!(session_id = %state.session_id, "Turn saved"),
            Ok(Err(e)) => {
                warn!(session_id = %state.session_id, error = %e, "Could not save turn");
            }
            Err(_) => {
                warn!(session_id = %state.session_id, ?timeout, "Saving turn timed out");
            }
        }
    }
}

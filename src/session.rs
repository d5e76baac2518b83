use std::collections::VecDeque;

use serde_json::{Map, Value};
use tracing::{debug, instrument, warn};

use crate::drafts::DraftStore;
use crate::observability::EditorMetrics;
use crate::pipeline::PipelineDocument;
use crate::schema::{BuiltinSchemas, SchemaService};
use crate::store::PipelineStore;
use crate::studio::state::DEFAULT_MAX_WARNINGS;
use crate::studio::{Action, Effect, EditorSnapshot, EditorState, is_stale_completion, reduce};
use crate::validation::{ValidationReport, validate_stage_patch};

#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Run I/O effects as soon as they are emitted. When off, effects wait
    /// in the outbox until `flush` or `run_next_effect`.
    pub auto_flush: bool,
    pub max_warnings: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            auto_flush: true,
            max_warnings: DEFAULT_MAX_WARNINGS,
        }
    }
}

/// Owns one editor's state. Every mutation goes through the action queue,
/// one action at a time, and I/O results come back as actions.
pub struct EditorSession<S, D> {
    state: EditorState,
    store: S,
    drafts: D,
    schemas: Box<dyn SchemaService>,
    config: SessionConfig,
    queue: VecDeque<Action>,
    outbox: VecDeque<Effect>,
    metrics: EditorMetrics,
}

impl<S: PipelineStore, D: DraftStore> EditorSession<S, D> {
    pub fn new(store: S, drafts: D) -> Self {
        Self::with_config(store, drafts, SessionConfig::default())
    }

    pub fn with_config(store: S, drafts: D, config: SessionConfig) -> Self {
        Self {
            state: EditorState::with_max_warnings(config.max_warnings),
            store,
            drafts,
            schemas: Box::new(BuiltinSchemas),
            config,
            queue: VecDeque::new(),
            outbox: VecDeque::new(),
            metrics: EditorMetrics::new(),
        }
    }

    pub fn with_schemas(mut self, schemas: impl SchemaService + 'static) -> Self {
        self.schemas = Box::new(schemas);
        self
    }

    pub fn state(&self) -> &EditorState {
        &self.state
    }

    pub fn snapshot(&self) -> EditorSnapshot {
        self.state.snapshot()
    }

    pub fn metrics(&self) -> EditorMetrics {
        self.metrics.clone()
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn drafts(&self) -> &D {
        &self.drafts
    }

    pub fn pending_effects(&self) -> impl Iterator<Item = &Effect> {
        self.outbox.iter()
    }

    #[instrument(skip(self, action), fields(action = action.kind()))]
    pub fn dispatch(&mut self, action: Action) {
        self.queue.push_back(action);
        self.drain();
        if self.config.auto_flush {
            self.flush();
        }
    }

    /// Validates `patch` against the stage type's schema and dispatches it
    /// only when it is clean.
    pub fn update_stage_checked(
        &mut self,
        stage_id: &str,
        patch: Map<String, Value>,
    ) -> ValidationReport {
        let stage_type = self
            .state
            .pipeline()
            .find_stage(stage_id)
            .map(|stage| stage.stage_type.clone());
        let report = match stage_type {
            Some(stage_type) => validate_stage_patch(&stage_type, &patch, self.schemas.as_ref()),
            None => ValidationReport::default(),
        };
        if report.is_ok() {
            self.dispatch(Action::UpdateStage {
                stage_id: stage_id.to_string(),
                patch,
            });
        } else {
            debug!(stage_id, errors = report.errors.len(), "Stage update failed validation");
        }
        report
    }

    /// Runs every queued effect, including effects produced by their
    /// completions. Returns how many ran.
    pub fn flush(&mut self) -> usize {
        let mut executed = 0;
        while self.run_next_effect() {
            executed += 1;
        }
        executed
    }

    pub fn run_next_effect(&mut self) -> bool {
        let Some(effect) = self.outbox.pop_front() else {
            return false;
        };
        self.metrics.record_effect(effect.kind());
        if let Some(completion) = self.execute(effect) {
            self.queue.push_back(completion);
            self.drain();
        }
        true
    }

    fn drain(&mut self) {
        while let Some(action) = self.queue.pop_front() {
            if is_stale_completion(&self.state, &action) {
                self.metrics.record_stale_completion();
            }
            let effects = {
                let _timer = self.metrics.start_action(action.kind());
                reduce(&mut self.state, action)
            };
            for effect in effects {
                self.enqueue(effect);
            }
        }
    }

    fn enqueue(&mut self, effect: Effect) {
        if let Effect::CancelInFlight { epoch } = effect {
            let before = self.outbox.len();
            self.outbox.retain(|queued| {
                queued
                    .request()
                    .is_none_or(|request| request.epoch > epoch)
            });
            debug!(
                epoch,
                cancelled = before - self.outbox.len(),
                "Cancelled queued requests"
            );
            self.metrics.record_effect(effect.kind());
            return;
        }
        self.outbox.push_back(effect);
    }

    fn execute(&mut self, effect: Effect) -> Option<Action> {
        match effect {
            Effect::FetchPipeline {
                request,
                pipeline_id,
                git_details,
            } => match self.store.fetch(&pipeline_id, git_details.as_ref()) {
                Ok(remote) => {
                    let draft = self.load_draft(&pipeline_id);
                    Some(Action::FetchSucceeded {
                        request,
                        remote,
                        draft,
                        git_details,
                    })
                }
                Err(err) => {
                    self.metrics.record_fetch_failure();
                    Some(Action::FetchFailed {
                        request,
                        message: err.to_string(),
                    })
                }
            },
            Effect::SavePipeline {
                request,
                pipeline_id,
                document,
                git_details,
            } => match self
                .store
                .save(&pipeline_id, &document, git_details.as_ref())
            {
                Ok(()) => {
                    self.metrics.record_save(true);
                    Some(Action::SaveSucceeded { request })
                }
                Err(err) => {
                    self.metrics.record_save(false);
                    Some(Action::SaveFailed {
                        request,
                        message: err.to_string(),
                    })
                }
            },
            Effect::CacheDraft {
                pipeline_id,
                document,
            } => {
                if let Err(err) = self.drafts.store(&pipeline_id, &document) {
                    warn!(pipeline = %pipeline_id, "Failed to cache draft: {err:#}");
                }
                None
            }
            Effect::ClearDraft { pipeline_id } => {
                if let Err(err) = self.drafts.discard(&pipeline_id) {
                    warn!(pipeline = %pipeline_id, "Failed to clear draft: {err:#}");
                }
                None
            }
            Effect::CancelInFlight { .. } => None,
        }
    }

    fn load_draft(&self, pipeline_id: &str) -> Option<PipelineDocument> {
        match self.drafts.load(pipeline_id) {
            Ok(draft) => draft.map(|draft| draft.document),
            Err(err) => {
                warn!(pipeline = pipeline_id, "Ignoring unreadable draft: {err:#}");
                None
            }
        }
    }
}

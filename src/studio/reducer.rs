use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use crate::pipeline::{PipelineDocument, StageNode, merge_spec};
use crate::yaml::{from_yaml, to_yaml};

use super::action::{Action, Effect};
use super::state::{
    DrawerType, EditorError, EditorMode, EditorState, EditorWarning, GitDetails, PendingSave,
    Selection, ViewMode,
};

/// Applies one action. Never panics and never fails: problems end up in
/// `error` or `warnings`, and I/O is returned as effects.
pub fn reduce(state: &mut EditorState, action: Action) -> Vec<Effect> {
    if is_stale_completion(state, &action) {
        debug!(action = action.kind(), epoch = state.epoch, "Dropping stale completion");
        return Vec::new();
    }

    match action {
        Action::Initialize {
            pipeline_id,
            git_details,
        } => initialize(state, pipeline_id, git_details),
        Action::InitializeNew { document } => initialize_new(state, document),
        Action::FetchSucceeded {
            remote,
            draft,
            git_details,
            ..
        } => fetch_succeeded(state, remote, draft, git_details),
        Action::FetchFailed { message, .. } => {
            state.pending_fetch = None;
            state.is_loading = false;
            warn!(pipeline = ?state.pipeline_id, %message, "Pipeline fetch failed");
            state.error = Some(EditorError::FetchFailed(message));
            Vec::new()
        }
        Action::OpenDrawer { drawer, data } => open_drawer(state, drawer, data),
        Action::CloseDrawer => {
            if matches!(state.mode, EditorMode::VisualDrawerOpen { .. }) {
                state.mode = EditorMode::VisualClosed;
            }
            Vec::new()
        }
        Action::SwitchToYaml => switch_to_yaml(state),
        Action::EditYaml { text } => edit_yaml(state, text),
        Action::SwitchToVisual => switch_to_visual(state),
        Action::SelectStage { stage_id } => select_stage(state, stage_id),
        Action::SelectStep { step_id } => select_step(state, step_id),
        Action::SelectSection { section_id } => {
            state.selection.section_id = section_id;
            Vec::new()
        }
        Action::ClearSelection => {
            state.selection = Selection::default();
            Vec::new()
        }
        Action::UpdateStage { stage_id, patch } => update_stage(state, stage_id, patch),
        Action::AddStage { stage, index } => add_stage(state, stage, index),
        Action::RemoveStage { stage_id } => remove_stage(state, stage_id),
        Action::UpdatePipeline { document } => update_pipeline(state, document),
        Action::UpdateGitDetails { git_details } => {
            state.git_details = Some(git_details);
            Vec::new()
        }
        Action::DiscardChanges => discard_changes(state),
        Action::Save => save(state),
        Action::SaveSucceeded { .. } => save_succeeded(state),
        Action::SaveFailed { message, .. } => {
            state.pending_save = None;
            warn!(pipeline = ?state.pipeline_id, %message, "Pipeline save failed");
            state.error = Some(EditorError::SaveFailed(message));
            Vec::new()
        }
        Action::DismissError => {
            state.error = None;
            Vec::new()
        }
        Action::Unmount => {
            let effects = begin_epoch(state);
            reset(state);
            effects
        }
    }
}

/// True for a completion that no longer matches an outstanding request,
/// either because it was superseded or because its epoch was cancelled.
pub fn is_stale_completion(state: &EditorState, action: &Action) -> bool {
    match action {
        Action::FetchSucceeded { request, .. } | Action::FetchFailed { request, .. } => {
            state.pending_fetch != Some(*request)
        }
        Action::SaveSucceeded { request } | Action::SaveFailed { request, .. } => {
            state.pending_save.as_ref().map(|pending| pending.request) != Some(*request)
        }
        _ => false,
    }
}

fn begin_epoch(state: &mut EditorState) -> Vec<Effect> {
    let previous = state.epoch;
    state.epoch += 1;
    let had_fetch = state.pending_fetch.take().is_some();
    let had_save = state.pending_save.take().is_some();
    if had_fetch || had_save {
        debug!(epoch = previous, "Cancelling in-flight requests");
        vec![Effect::CancelInFlight { epoch: previous }]
    } else {
        Vec::new()
    }
}

fn reset(state: &mut EditorState) {
    let fresh = EditorState::with_max_warnings(state.max_warnings);
    *state = EditorState {
        epoch: state.epoch,
        next_sequence: state.next_sequence,
        ..fresh
    };
}

fn initialize(
    state: &mut EditorState,
    pipeline_id: String,
    git_details: Option<GitDetails>,
) -> Vec<Effect> {
    let mut effects = begin_epoch(state);
    reset(state);
    state.pipeline_id = Some(pipeline_id.clone());
    state.git_details = git_details.clone();
    state.is_loading = true;
    let request = state.next_request();
    state.pending_fetch = Some(request);
    effects.push(Effect::FetchPipeline {
        request,
        pipeline_id,
        git_details,
    });
    effects
}

fn initialize_new(state: &mut EditorState, document: PipelineDocument) -> Vec<Effect> {
    let effects = begin_epoch(state);
    reset(state);
    let identifier = document.identifier().to_string();
    state.pipeline_id = (!identifier.is_empty()).then_some(identifier);
    state.original_pipeline = document.clone();
    state.pipeline = document;
    state.is_initialized = true;
    effects
}

fn fetch_succeeded(
    state: &mut EditorState,
    remote: PipelineDocument,
    draft: Option<PipelineDocument>,
    git_details: Option<GitDetails>,
) -> Vec<Effect> {
    state.pending_fetch = None;
    let had_draft = draft.is_some();
    state.pipeline = draft.unwrap_or_else(|| remote.clone());
    state.original_pipeline = remote;
    state.is_dirty = state.pipeline != state.original_pipeline;
    let mut effects = Vec::new();
    if state.is_dirty {
        info!(pipeline = ?state.pipeline_id, "Recovered unsaved draft");
    } else if had_draft {
        debug!(pipeline = ?state.pipeline_id, "Draft matches remote; discarding");
        effects.extend(clear_draft(state));
    }
    if git_details.is_some() {
        state.git_details = git_details;
    }
    state.is_loading = false;
    state.is_initialized = true;
    state.error = None;
    state.revision += 1;
    reconcile_selection(state);
    effects
}

fn ignored(state: &mut EditorState, action: &'static str) -> Vec<Effect> {
    let view = state.view();
    warn!(action, ?view, "Action not available in the current view");
    state.warn(EditorWarning::IgnoredInView { action, view });
    Vec::new()
}

fn open_drawer(state: &mut EditorState, drawer: DrawerType, data: Value) -> Vec<Effect> {
    if state.view() == ViewMode::Yaml {
        return ignored(state, "open_drawer");
    }
    state.mode = EditorMode::VisualDrawerOpen { drawer, data };
    Vec::new()
}

fn switch_to_yaml(state: &mut EditorState) -> Vec<Effect> {
    if state.view() == ViewMode::Yaml {
        return Vec::new();
    }
    match to_yaml(&state.pipeline) {
        Ok(text) => state.mode = EditorMode::YamlEditing { text },
        Err(err) => {
            warn!(error = %err, "Could not render pipeline as YAML");
            state.error = Some(EditorError::SerializeFailed(err.to_string()));
        }
    }
    Vec::new()
}

fn edit_yaml(state: &mut EditorState, text: String) -> Vec<Effect> {
    let EditorMode::YamlEditing { text: current } = &mut state.mode else {
        return ignored(state, "edit_yaml");
    };
    if *current == text {
        return Vec::new();
    }
    let parsed = from_yaml(&text).ok();
    *current = text;
    state.revision += 1;
    if matches!(state.error, Some(EditorError::InvalidYaml(_))) {
        state.error = None;
    }
    // Text that does not parse yet is still an unsaved change, but only a
    // parsed document can be cached.
    match parsed {
        Some(document) if document == state.original_pipeline => {
            state.is_dirty = false;
            clear_draft(state)
        }
        Some(document) => {
            state.is_dirty = true;
            cache_draft(state, document)
        }
        None => {
            state.is_dirty = true;
            Vec::new()
        }
    }
}

fn switch_to_visual(state: &mut EditorState) -> Vec<Effect> {
    let EditorMode::YamlEditing { text } = &state.mode else {
        return Vec::new();
    };
    match from_yaml(text) {
        Ok(parsed) => {
            state.mode = EditorMode::VisualClosed;
            if matches!(state.error, Some(EditorError::InvalidYaml(_))) {
                state.error = None;
            }
            if parsed != state.pipeline {
                state.pipeline = parsed;
                let effects = mark_changed(state);
                reconcile_selection(state);
                effects
            } else {
                state.is_dirty = state.pipeline != state.original_pipeline;
                Vec::new()
            }
        }
        Err(err) => {
            warn!(error = %err, "YAML does not parse; staying in YAML view");
            state.error = Some(EditorError::invalid_yaml(err));
            Vec::new()
        }
    }
}

fn select_stage(state: &mut EditorState, stage_id: String) -> Vec<Effect> {
    if state.view() == ViewMode::Yaml {
        return ignored(state, "select_stage");
    }
    if state.pipeline.contains_stage(&stage_id) {
        state.selection = Selection {
            stage_id: Some(stage_id),
            step_id: None,
            section_id: None,
        };
    } else {
        warn!(%stage_id, "Selected stage does not exist; clearing selection");
        state.selection = Selection::default();
        state.warn(EditorWarning::StaleStage { stage_id });
    }
    Vec::new()
}

fn select_step(state: &mut EditorState, step_id: String) -> Vec<Effect> {
    if state.view() == ViewMode::Yaml {
        return ignored(state, "select_step");
    }
    match state.pipeline.stage_of_step(&step_id).map(str::to_string) {
        Some(stage_id) => {
            state.selection = Selection {
                stage_id: Some(stage_id),
                step_id: Some(step_id),
                section_id: None,
            };
        }
        None => {
            warn!(%step_id, "Selected step does not exist; clearing selection");
            state.selection = Selection::default();
            state.warn(EditorWarning::StaleStep { step_id });
        }
    }
    Vec::new()
}

fn update_stage(
    state: &mut EditorState,
    stage_id: String,
    patch: Map<String, Value>,
) -> Vec<Effect> {
    if state.view() == ViewMode::Yaml {
        return ignored(state, "update_stage");
    }
    match state.pipeline.find_stage_mut(&stage_id) {
        Some(stage) => {
            merge_spec(&mut stage.spec, patch);
            mark_changed(state)
        }
        None => {
            warn!(%stage_id, "Dropping update for a stage that no longer exists");
            state.warn(EditorWarning::StaleStage { stage_id });
            Vec::new()
        }
    }
}

fn add_stage(state: &mut EditorState, stage: StageNode, index: Option<usize>) -> Vec<Effect> {
    if state.view() == ViewMode::Yaml {
        return ignored(state, "add_stage");
    }
    if state.pipeline.contains_stage(&stage.identifier) {
        warn!(stage_id = %stage.identifier, "Stage identifier already in use");
        state.warn(EditorWarning::DuplicateStage {
            stage_id: stage.identifier,
        });
        return Vec::new();
    }
    state.pipeline.add_stage(stage, index);
    mark_changed(state)
}

fn remove_stage(state: &mut EditorState, stage_id: String) -> Vec<Effect> {
    if state.view() == ViewMode::Yaml {
        return ignored(state, "remove_stage");
    }
    if state.pipeline.remove_stage(&stage_id).is_none() {
        warn!(%stage_id, "Cannot remove a stage that does not exist");
        state.warn(EditorWarning::StaleStage { stage_id });
        return Vec::new();
    }
    let effects = mark_changed(state);
    if state.selection.stage_id.as_deref() == Some(stage_id.as_str()) {
        state.selection = Selection::default();
    }
    effects
}

fn update_pipeline(state: &mut EditorState, document: PipelineDocument) -> Vec<Effect> {
    if state.view() == ViewMode::Yaml {
        return ignored(state, "update_pipeline");
    }
    if document == state.pipeline {
        return Vec::new();
    }
    state.pipeline = document;
    let effects = mark_changed(state);
    reconcile_selection(state);
    effects
}

fn discard_changes(state: &mut EditorState) -> Vec<Effect> {
    state.pipeline = state.original_pipeline.clone();
    state.mode = EditorMode::VisualClosed;
    state.is_dirty = false;
    state.revision += 1;
    if matches!(state.error, Some(EditorError::InvalidYaml(_))) {
        state.error = None;
    }
    reconcile_selection(state);
    clear_draft(state)
}

fn save(state: &mut EditorState) -> Vec<Effect> {
    let pipeline_id = match state.pipeline_id.clone() {
        Some(pipeline_id) if state.is_initialized => pipeline_id,
        _ => {
            warn!("Save requested before a pipeline was loaded");
            state.warn(EditorWarning::NotInitialized { action: "save" });
            state.error = Some(EditorError::NotInitialized);
            return Vec::new();
        }
    };
    if state.pending_save.is_some() {
        debug!(%pipeline_id, "Save already in flight; ignoring");
        return Vec::new();
    }

    let mut effects = Vec::new();
    if let EditorMode::YamlEditing { text } = &state.mode {
        match from_yaml(text) {
            Ok(parsed) => {
                if parsed != state.pipeline {
                    state.pipeline = parsed;
                    effects.extend(mark_changed(state));
                    reconcile_selection(state);
                }
            }
            Err(err) => {
                warn!(error = %err, "Cannot save: YAML does not parse");
                state.error = Some(EditorError::invalid_yaml(err));
                return Vec::new();
            }
        }
    }

    let request = state.next_request();
    let document = state.pipeline.clone();
    state.pending_save = Some(PendingSave {
        request,
        revision: state.revision,
        document: document.clone(),
    });
    state.error = None;
    effects.push(Effect::SavePipeline {
        request,
        pipeline_id,
        document,
        git_details: state.git_details.clone(),
    });
    effects
}

fn save_succeeded(state: &mut EditorState) -> Vec<Effect> {
    let Some(pending) = state.pending_save.take() else {
        return Vec::new();
    };
    state.original_pipeline = pending.document;
    if state.revision == pending.revision {
        state.is_dirty = false;
        return clear_draft(state);
    }
    // The editor moved on while the save was in flight; compare against
    // what the store now holds.
    state.is_dirty = state.pipeline != state.original_pipeline;
    if state.is_dirty {
        info!(pipeline = ?state.pipeline_id, "Pipeline changed while saving; keeping edits dirty");
        let document = state.pipeline.clone();
        cache_draft(state, document)
    } else {
        clear_draft(state)
    }
}

fn mark_changed(state: &mut EditorState) -> Vec<Effect> {
    state.is_dirty = true;
    state.revision += 1;
    let document = state.pipeline.clone();
    cache_draft(state, document)
}

fn cache_draft(state: &EditorState, document: PipelineDocument) -> Vec<Effect> {
    match &state.pipeline_id {
        Some(pipeline_id) => vec![Effect::CacheDraft {
            pipeline_id: pipeline_id.clone(),
            document,
        }],
        None => Vec::new(),
    }
}

fn clear_draft(state: &EditorState) -> Vec<Effect> {
    match &state.pipeline_id {
        Some(pipeline_id) => vec![Effect::ClearDraft {
            pipeline_id: pipeline_id.clone(),
        }],
        None => Vec::new(),
    }
}

fn reconcile_selection(state: &mut EditorState) {
    if let Some(stage_id) = state.selection.stage_id.clone()
        && !state.pipeline.contains_stage(&stage_id)
    {
        warn!(%stage_id, "Selected stage disappeared; clearing selection");
        state.selection = Selection::default();
        state.warn(EditorWarning::StaleStage { stage_id });
        return;
    }
    if let Some(step_id) = state.selection.step_id.clone()
        && !state.pipeline.contains_step(&step_id)
    {
        warn!(%step_id, "Selected step disappeared");
        state.selection.step_id = None;
        state.warn(EditorWarning::StaleStep { step_id });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn loaded() -> EditorState {
        let mut document = PipelineDocument::new("demo", "Demo");
        document.add_stage(StageNode::new("s1", "One", "Custom"), None);
        let mut state = EditorState::new();
        reduce(&mut state, Action::InitializeNew { document });
        state
    }

    #[test]
    fn drawer_cannot_open_over_yaml() {
        let mut state = loaded();
        reduce(&mut state, Action::SwitchToYaml);
        reduce(
            &mut state,
            Action::OpenDrawer {
                drawer: DrawerType::AddStep,
                data: json!({}),
            },
        );
        assert_eq!(state.view(), ViewMode::Yaml);
        assert!(!state.drawer().is_open);
        assert!(matches!(
            state.warnings().last(),
            Some(EditorWarning::IgnoredInView { action: "open_drawer", .. })
        ));
    }

    #[test]
    fn switching_to_yaml_closes_drawer() {
        let mut state = loaded();
        reduce(
            &mut state,
            Action::OpenDrawer {
                drawer: DrawerType::StageConfig,
                data: json!({"stageId": "s1"}),
            },
        );
        reduce(&mut state, Action::SwitchToYaml);
        reduce(&mut state, Action::SwitchToVisual);
        assert_eq!(state.mode(), &EditorMode::VisualClosed);
    }

    #[test]
    fn warnings_are_bounded() {
        let mut state = EditorState::with_max_warnings(3);
        for idx in 0..5 {
            reduce(
                &mut state,
                Action::SelectStage {
                    stage_id: format!("gone{idx}"),
                },
            );
        }
        let kept: Vec<_> = state.warnings().cloned().collect();
        assert_eq!(kept.len(), 3);
        assert_eq!(
            kept[0],
            EditorWarning::StaleStage {
                stage_id: "gone2".into()
            }
        );
    }

    #[test]
    fn duplicate_stage_is_rejected() {
        let mut state = loaded();
        let effects = reduce(
            &mut state,
            Action::AddStage {
                stage: StageNode::new("s1", "Again", "Custom"),
                index: None,
            },
        );
        assert!(effects.is_empty());
        assert!(!state.is_dirty());
        assert_eq!(state.pipeline().stage_ids(), vec!["s1"]);
    }

    #[test]
    fn save_before_initialize_sets_error() {
        let mut state = EditorState::new();
        let effects = reduce(&mut state, Action::Save);
        assert!(effects.is_empty());
        assert_eq!(state.error(), Some(&EditorError::NotInitialized));
    }
}

use serde_json::{Map, Value};

use crate::pipeline::{PipelineDocument, StageNode};

use super::state::{DrawerType, GitDetails, RequestId};

#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    Initialize {
        pipeline_id: String,
        git_details: Option<GitDetails>,
    },
    InitializeNew {
        document: PipelineDocument,
    },
    FetchSucceeded {
        request: RequestId,
        remote: PipelineDocument,
        draft: Option<PipelineDocument>,
        git_details: Option<GitDetails>,
    },
    FetchFailed {
        request: RequestId,
        message: String,
    },
    OpenDrawer {
        drawer: DrawerType,
        data: Value,
    },
    CloseDrawer,
    SwitchToYaml,
    EditYaml {
        text: String,
    },
    SwitchToVisual,
    SelectStage {
        stage_id: String,
    },
    SelectStep {
        step_id: String,
    },
    SelectSection {
        section_id: Option<String>,
    },
    ClearSelection,
    UpdateStage {
        stage_id: String,
        patch: Map<String, Value>,
    },
    AddStage {
        stage: StageNode,
        index: Option<usize>,
    },
    RemoveStage {
        stage_id: String,
    },
    UpdatePipeline {
        document: PipelineDocument,
    },
    UpdateGitDetails {
        git_details: GitDetails,
    },
    DiscardChanges,
    Save,
    SaveSucceeded {
        request: RequestId,
    },
    SaveFailed {
        request: RequestId,
        message: String,
    },
    DismissError,
    Unmount,
}

impl Action {
    pub fn kind(&self) -> &'static str {
        match self {
            Action::Initialize { .. } => "initialize",
            Action::InitializeNew { .. } => "initialize_new",
            Action::FetchSucceeded { .. } => "fetch_succeeded",
            Action::FetchFailed { .. } => "fetch_failed",
            Action::OpenDrawer { .. } => "open_drawer",
            Action::CloseDrawer => "close_drawer",
            Action::SwitchToYaml => "switch_to_yaml",
            Action::EditYaml { .. } => "edit_yaml",
            Action::SwitchToVisual => "switch_to_visual",
            Action::SelectStage { .. } => "select_stage",
            Action::SelectStep { .. } => "select_step",
            Action::SelectSection { .. } => "select_section",
            Action::ClearSelection => "clear_selection",
            Action::UpdateStage { .. } => "update_stage",
            Action::AddStage { .. } => "add_stage",
            Action::RemoveStage { .. } => "remove_stage",
            Action::UpdatePipeline { .. } => "update_pipeline",
            Action::UpdateGitDetails { .. } => "update_git_details",
            Action::DiscardChanges => "discard_changes",
            Action::Save => "save",
            Action::SaveSucceeded { .. } => "save_succeeded",
            Action::SaveFailed { .. } => "save_failed",
            Action::DismissError => "dismiss_error",
            Action::Unmount => "unmount",
        }
    }
}

/// Work the reducer asks its owner to perform. Completions come back as
/// `*Succeeded` / `*Failed` actions carrying the same `RequestId`.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    FetchPipeline {
        request: RequestId,
        pipeline_id: String,
        git_details: Option<GitDetails>,
    },
    SavePipeline {
        request: RequestId,
        pipeline_id: String,
        document: PipelineDocument,
        git_details: Option<GitDetails>,
    },
    CacheDraft {
        pipeline_id: String,
        document: PipelineDocument,
    },
    ClearDraft {
        pipeline_id: String,
    },
    CancelInFlight {
        epoch: u64,
    },
}

impl Effect {
    pub fn kind(&self) -> &'static str {
        match self {
            Effect::FetchPipeline { .. } => "fetch_pipeline",
            Effect::SavePipeline { .. } => "save_pipeline",
            Effect::CacheDraft { .. } => "cache_draft",
            Effect::ClearDraft { .. } => "clear_draft",
            Effect::CancelInFlight { .. } => "cancel_in_flight",
        }
    }

    pub fn request(&self) -> Option<RequestId> {
        match self {
            Effect::FetchPipeline { request, .. } | Effect::SavePipeline { request, .. } => {
                Some(*request)
            }
            _ => None,
        }
    }
}

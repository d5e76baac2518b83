use std::collections::VecDeque;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::pipeline::PipelineDocument;
use crate::yaml::DocumentError;

pub const DEFAULT_MAX_WARNINGS: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ViewMode {
    Visual,
    Yaml,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DrawerType {
    StageConfig,
    StepConfig,
    AddStep,
    AddCommand,
    PipelineVariables,
    PipelineNotifications,
    Templates,
    ExecutionStrategy,
    FlowControl,
    AdvancedOptions,
    PolicySets,
    ConfigureService,
    ProvisionerStepConfig,
    AddProvisionerStep,
    TemplateInputs,
}

/// View and drawer as one value, so a drawer can never be open over the
/// YAML editor.
#[derive(Debug, Clone, PartialEq)]
pub enum EditorMode {
    VisualClosed,
    VisualDrawerOpen { drawer: DrawerType, data: Value },
    YamlEditing { text: String },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DrawerState {
    pub is_open: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub drawer_type: Option<DrawerType>,
    #[serde(skip_serializing_if = "Value::is_null")]
    pub data: Value,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Selection {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stage_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub step_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub section_id: Option<String>,
}

impl Selection {
    pub fn is_empty(&self) -> bool {
        self.stage_id.is_none() && self.step_id.is_none() && self.section_id.is_none()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GitDetails {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repo_identifier: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub commit_message: Option<String>,
}

/// Correlates an async completion with the request that produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct RequestId {
    pub epoch: u64,
    pub sequence: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PendingSave {
    pub request: RequestId,
    pub revision: u64,
    pub document: PipelineDocument,
}

/// User-visible failures, held in state rather than returned.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "kind", content = "message")]
pub enum EditorError {
    #[error("{0}")]
    InvalidYaml(String),
    #[error("{0}")]
    SerializeFailed(String),
    #[error("failed to load pipeline: {0}")]
    FetchFailed(String),
    #[error("failed to save pipeline: {0}")]
    SaveFailed(String),
    #[error("editor has no pipeline loaded")]
    NotInitialized,
}

impl EditorError {
    pub(crate) fn invalid_yaml(err: DocumentError) -> Self {
        EditorError::InvalidYaml(err.to_string())
    }
}

/// Diagnostics for dropped or reset transitions. Never shown as errors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum EditorWarning {
    StaleStage { stage_id: String },
    StaleStep { step_id: String },
    DuplicateStage { stage_id: String },
    IgnoredInView { action: &'static str, view: ViewMode },
    NotInitialized { action: &'static str },
}

#[derive(Debug, Clone)]
pub struct EditorState {
    pub(crate) pipeline: PipelineDocument,
    pub(crate) original_pipeline: PipelineDocument,
    pub(crate) pipeline_id: Option<String>,
    pub(crate) git_details: Option<GitDetails>,
    pub(crate) mode: EditorMode,
    pub(crate) selection: Selection,
    pub(crate) is_dirty: bool,
    pub(crate) is_loading: bool,
    pub(crate) is_initialized: bool,
    pub(crate) error: Option<EditorError>,
    pub(crate) warnings: VecDeque<EditorWarning>,
    pub(crate) max_warnings: usize,
    pub(crate) epoch: u64,
    pub(crate) next_sequence: u64,
    pub(crate) revision: u64,
    pub(crate) pending_fetch: Option<RequestId>,
    pub(crate) pending_save: Option<PendingSave>,
}

impl Default for EditorState {
    fn default() -> Self {
        Self::new()
    }
}

impl EditorState {
    pub fn new() -> Self {
        Self::with_max_warnings(DEFAULT_MAX_WARNINGS)
    }

    pub fn with_max_warnings(max_warnings: usize) -> Self {
        Self {
            pipeline: PipelineDocument::default(),
            original_pipeline: PipelineDocument::default(),
            pipeline_id: None,
            git_details: None,
            mode: EditorMode::VisualClosed,
            selection: Selection::default(),
            is_dirty: false,
            is_loading: false,
            is_initialized: false,
            error: None,
            warnings: VecDeque::new(),
            max_warnings: max_warnings.max(1),
            epoch: 0,
            next_sequence: 0,
            revision: 0,
            pending_fetch: None,
            pending_save: None,
        }
    }

    pub fn pipeline(&self) -> &PipelineDocument {
        &self.pipeline
    }

    pub fn original_pipeline(&self) -> &PipelineDocument {
        &self.original_pipeline
    }

    pub fn pipeline_id(&self) -> Option<&str> {
        self.pipeline_id.as_deref()
    }

    pub fn git_details(&self) -> Option<&GitDetails> {
        self.git_details.as_ref()
    }

    pub fn mode(&self) -> &EditorMode {
        &self.mode
    }

    pub fn view(&self) -> ViewMode {
        match self.mode {
            EditorMode::YamlEditing { .. } => ViewMode::Yaml,
            _ => ViewMode::Visual,
        }
    }

    pub fn drawer(&self) -> DrawerState {
        match &self.mode {
            EditorMode::VisualDrawerOpen { drawer, data } => DrawerState {
                is_open: true,
                drawer_type: Some(*drawer),
                data: data.clone(),
            },
            _ => DrawerState {
                is_open: false,
                drawer_type: None,
                data: Value::Null,
            },
        }
    }

    pub fn yaml_text(&self) -> Option<&str> {
        match &self.mode {
            EditorMode::YamlEditing { text } => Some(text),
            _ => None,
        }
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    pub fn selected_stage(&self) -> Option<&str> {
        self.selection.stage_id.as_deref()
    }

    pub fn selected_step(&self) -> Option<&str> {
        self.selection.step_id.as_deref()
    }

    pub fn is_dirty(&self) -> bool {
        self.is_dirty
    }

    pub fn is_loading(&self) -> bool {
        self.is_loading
    }

    pub fn is_initialized(&self) -> bool {
        self.is_initialized
    }

    pub fn is_saving(&self) -> bool {
        self.pending_save.is_some()
    }

    pub fn error(&self) -> Option<&EditorError> {
        self.error.as_ref()
    }

    pub fn warnings(&self) -> impl Iterator<Item = &EditorWarning> {
        self.warnings.iter()
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn pending_fetch(&self) -> Option<RequestId> {
        self.pending_fetch
    }

    pub fn pending_save(&self) -> Option<&PendingSave> {
        self.pending_save.as_ref()
    }

    pub fn snapshot(&self) -> EditorSnapshot {
        EditorSnapshot {
            pipeline_id: self.pipeline_id.clone(),
            view: self.view(),
            drawer: self.drawer(),
            selection: self.selection.clone(),
            is_dirty: self.is_dirty,
            is_loading: self.is_loading,
            is_initialized: self.is_initialized,
            is_saving: self.is_saving(),
            stage_ids: self.pipeline.stage_ids(),
            error: self.error.clone(),
            warnings: self.warnings.iter().cloned().collect(),
        }
    }

    pub(crate) fn next_request(&mut self) -> RequestId {
        self.next_sequence += 1;
        RequestId {
            epoch: self.epoch,
            sequence: self.next_sequence,
        }
    }

    pub(crate) fn warn(&mut self, warning: EditorWarning) {
        if self.warnings.len() >= self.max_warnings {
            self.warnings.pop_front();
        }
        self.warnings.push_back(warning);
    }
}

/// Serializable summary of the editor, for the CLI and diagnostics.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EditorSnapshot {
    pub pipeline_id: Option<String>,
    pub view: ViewMode,
    pub drawer: DrawerState,
    pub selection: Selection,
    pub is_dirty: bool,
    pub is_loading: bool,
    pub is_initialized: bool,
    pub is_saving: bool,
    pub stage_ids: Vec<String>,
    pub error: Option<EditorError>,
    pub warnings: Vec<EditorWarning>,
}

use std::path::Path;

use anyhow::{Context, Result, bail};
use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::{info, warn};

use crate::drafts::DraftStore;
use crate::extensions::Registries;
use crate::modules::new_stage;
use crate::session::EditorSession;
use crate::store::PipelineStore;
use crate::studio::{Action, DrawerType, GitDetails};

/// A recorded editing session: which pipeline to open and the user actions
/// to replay against it.
#[derive(Debug, Deserialize)]
pub struct EditScript {
    pub pipeline: String,
    #[serde(default)]
    pub git: Option<GitDetails>,
    #[serde(default)]
    pub steps: Vec<ScriptStep>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ScriptStep {
    SelectStage {
        stage: String,
    },
    SelectStep {
        step: String,
    },
    OpenDrawer {
        drawer: DrawerType,
        #[serde(default)]
        data: Value,
    },
    CloseDrawer,
    SwitchToYaml,
    EditYaml {
        text: String,
    },
    SwitchToVisual,
    UpdateStage {
        stage: String,
        spec: Map<String, Value>,
    },
    AddStage {
        #[serde(rename = "type")]
        stage_type: String,
        identifier: String,
        name: String,
        #[serde(default)]
        index: Option<usize>,
    },
    RemoveStage {
        stage: String,
    },
    Save,
    DiscardChanges,
}

impl EditScript {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read edit script: {}", path.display()))?;
        let script: EditScript = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse edit script YAML: {}", path.display()))?;
        if script.pipeline.trim().is_empty() {
            bail!("Edit script {} does not name a pipeline", path.display());
        }
        Ok(script)
    }

    /// Opens the pipeline and replays every step in order. Stops at the
    /// first stage update that fails schema validation.
    pub fn run<S, D>(&self, session: &mut EditorSession<S, D>, registries: &Registries) -> Result<()>
    where
        S: PipelineStore,
        D: DraftStore,
    {
        session.dispatch(Action::Initialize {
            pipeline_id: self.pipeline.clone(),
            git_details: self.git.clone(),
        });
        session.flush();
        if let Some(error) = session.state().error() {
            bail!("Failed to open pipeline '{}': {error}", self.pipeline);
        }

        for (index, step) in self.steps.iter().enumerate() {
            apply_step(session, registries, step.clone())
                .with_context(|| format!("Script step {} failed", index + 1))?;
        }
        session.flush();
        info!(
            pipeline = %self.pipeline,
            steps = self.steps.len(),
            dirty = session.state().is_dirty(),
            "Edit script finished"
        );
        Ok(())
    }
}

fn apply_step<S, D>(
    session: &mut EditorSession<S, D>,
    registries: &Registries,
    step: ScriptStep,
) -> Result<()>
where
    S: PipelineStore,
    D: DraftStore,
{
    let action = match step {
        ScriptStep::SelectStage { stage } => Action::SelectStage { stage_id: stage },
        ScriptStep::SelectStep { step } => Action::SelectStep { step_id: step },
        ScriptStep::OpenDrawer { drawer, data } => Action::OpenDrawer { drawer, data },
        ScriptStep::CloseDrawer => Action::CloseDrawer,
        ScriptStep::SwitchToYaml => Action::SwitchToYaml,
        ScriptStep::EditYaml { text } => Action::EditYaml { text },
        ScriptStep::SwitchToVisual => Action::SwitchToVisual,
        ScriptStep::UpdateStage { stage, spec } => {
            let report = session.update_stage_checked(&stage, spec);
            for warning in &report.warnings {
                warn!(stage = %stage, "{warning}");
            }
            if !report.is_ok() {
                bail!(
                    "Update for stage '{stage}' rejected: {}",
                    report.errors.join("; ")
                );
            }
            return Ok(());
        }
        ScriptStep::AddStage {
            stage_type,
            identifier,
            name,
            index,
        } => Action::AddStage {
            stage: new_stage(registries, &stage_type, identifier, name),
            index,
        },
        ScriptStep::RemoveStage { stage } => Action::RemoveStage { stage_id: stage },
        ScriptStep::Save => Action::Save,
        ScriptStep::DiscardChanges => Action::DiscardChanges,
    };
    session.dispatch(action);
    Ok(())
}

use anyhow::{Context, Result, bail};
use serde_json::{Value, json};
use std::fs;
use std::path::{Path, PathBuf};

use crate::extensions::{Registries, StageType};
use crate::modules::new_stage;
use crate::pipeline::{PipelineDocument, StageNode, Variable, merge_spec};
use crate::validation::is_valid_identifier;
use crate::yaml::to_yaml;

pub const PRESETS: &[&str] = &["deploy", "build", "approval", "empty"];

/// Builds a starter pipeline. Stages start from the registered module's
/// default spec, so presets stay in step with the stage picker.
pub fn generate_preset(name: &str, identifier: &str, display_name: &str) -> Result<PipelineDocument> {
    if !is_valid_identifier(identifier) {
        bail!("'{identifier}' is not a valid pipeline identifier");
    }
    if display_name.trim().is_empty() {
        bail!("Pipeline name cannot be empty");
    }

    let registries = Registries::with_defaults();
    let mut document = PipelineDocument::new(identifier, display_name);
    match name {
        "deploy" => {
            document.add_stage(deploy_stage(&registries), None);
            document.pipeline.variables.push(Variable {
                name: "image_tag".into(),
                variable_type: "String".into(),
                value: Value::String("<+input>".into()),
            });
        }
        "build" => document.add_stage(build_stage(&registries), None),
        "approval" => {
            document.add_stage(
                new_stage(&registries, StageType::APPROVAL, "approve", "Approve"),
                None,
            );
            document.add_stage(deploy_stage(&registries), None);
        }
        "empty" => {}
        other => bail!(
            "Unknown preset '{other}' (expected one of: {})",
            PRESETS.join(", ")
        ),
    }
    Ok(document)
}

pub fn write_preset(document: &PipelineDocument, destination: &Path) -> Result<PathBuf> {
    let rendered = to_yaml(document)?;
    if let Some(parent) = destination.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }
    fs::write(destination, rendered)
        .with_context(|| format!("Failed to write pipeline: {}", destination.display()))?;

    Ok(destination.to_path_buf())
}

fn deploy_stage(registries: &Registries) -> StageNode {
    with_steps(
        new_stage(registries, StageType::DEPLOYMENT, "deploy", "Deploy"),
        json!([step("rollout", "Rollout Deployment", "K8sRollingDeploy", json!({"skipDryRun": false}))]),
    )
}

fn build_stage(registries: &Registries) -> StageNode {
    with_steps(
        new_stage(registries, StageType::CI, "build", "Build"),
        json!([step(
            "run_tests",
            "Run Tests",
            "Run",
            json!({"shell": "Sh", "command": "cargo test"})
        )]),
    )
}

fn with_steps(mut stage: StageNode, steps: Value) -> StageNode {
    let patch = json!({"execution": {"steps": steps}});
    if let Value::Object(patch) = patch {
        merge_spec(&mut stage.spec, patch);
    }
    stage
}

fn step(identifier: &str, name: &str, step_type: &str, spec: Value) -> Value {
    json!({"step": {
        "identifier": identifier,
        "name": name,
        "type": step_type,
        "timeout": "10m",
        "spec": spec
    }})
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::BuiltinSchemas;
    use crate::validation::validate_pipeline;

    #[test]
    fn every_preset_validates() {
        let registries = Registries::with_defaults();
        for preset in PRESETS {
            let document = generate_preset(preset, "starter", "Starter").unwrap();
            let report = validate_pipeline(&document, &registries, &BuiltinSchemas);
            assert!(report.is_ok(), "{preset}: {:?}", report.errors);
        }
    }

    #[test]
    fn deploy_preset_keeps_default_spec() {
        let document = generate_preset("deploy", "starter", "Starter").unwrap();
        let stage = document.find_stage("deploy").unwrap();
        assert_eq!(stage.spec["deploymentType"], "Kubernetes");
        assert!(stage.contains_step("rollout"));
        assert_eq!(stage.spec["execution"]["rollbackSteps"], json!([]));
    }

    #[test]
    fn approval_preset_orders_gate_first() {
        let document = generate_preset("approval", "starter", "Starter").unwrap();
        assert_eq!(document.stage_ids(), vec!["approve", "deploy"]);
    }

    #[test]
    fn rejects_unknown_preset_and_bad_identifier() {
        assert!(generate_preset("nightly", "starter", "Starter").is_err());
        assert!(generate_preset("empty", "9lives", "Starter").is_err());
    }
}

//! Built-in product modules. Each one registers its own handlers against the
//! injected [`Registries`]; modules never reach into each other's renderers.

pub mod cd;
pub mod ci;
pub mod flags;
pub mod platform;

use serde_json::Value;
use tracing::debug;

use crate::extensions::{Registries, StageProps, StageType};
use crate::pipeline::StageNode;
use crate::registry::Fragment;

/// Metadata key holding the spec a freshly added stage starts with.
pub const DEFAULT_SPEC: &str = "defaultSpec";

pub fn register_defaults(registries: &mut Registries) {
    cd::register(registries);
    ci::register(registries);
    flags::register(registries);
    platform::register(registries);
    debug!(
        stages = registries.stages.len(),
        resources = registries.resources.len(),
        templates = registries.templates.len(),
        artifact_sources = registries.artifact_sources.len(),
        "Registered default extensions"
    );
}

/// Builds a stage the way the stage picker does: the handler's default
/// spec when one is registered, an empty spec otherwise.
pub fn new_stage(
    registries: &Registries,
    stage_type: &str,
    identifier: impl Into<String>,
    name: impl Into<String>,
) -> StageNode {
    let stage = StageNode::new(identifier, name, stage_type);
    let default_spec = registries
        .stages
        .get(&StageType::from(stage_type))
        .and_then(|handler| handler.metadata.get(DEFAULT_SPEC).cloned());
    match default_spec {
        Some(Value::Object(spec)) => stage.with_spec(spec),
        _ => stage,
    }
}

/// Common body for stage renderers: header facts followed by the step list,
/// with the selected step marked.
pub(crate) fn stage_fragment(icon: &str, props: &StageProps, facts: &[(&str, &str)]) -> Fragment {
    let stage = &props.stage;
    let mut fragment = Fragment::new(format!("{} ({})", stage.name, stage.identifier)).with_icon(icon);
    fragment.push(format!("type: {}", stage.stage_type));
    for (field, label) in facts {
        if let Some(value) = stage.spec.get(*field).and_then(describe_value) {
            fragment.push(format!("{label}: {value}"));
        }
    }
    let steps = stage.step_ids();
    if steps.is_empty() {
        fragment.push("steps: none");
    } else {
        fragment.push(format!("steps: {}", steps.len()));
        for step in steps {
            let marker = if props.selected_step.as_deref() == Some(step.as_str()) {
                ">"
            } else {
                "-"
            };
            fragment.push(format!("{marker} {step}"));
        }
    }
    if props.read_only {
        fragment.push("(read only)");
    }
    fragment
}

fn describe_value(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => Some(text.clone()),
        Value::Bool(flag) => Some(flag.to_string()),
        Value::Number(number) => Some(number.to_string()),
        Value::Object(map) => map
            .get("serviceRef")
            .or_else(|| map.get("environmentRef"))
            .or_else(|| map.get("type"))
            .and_then(Value::as_str)
            .map(str::to_string),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_stage_uses_registered_default_spec() {
        let registries = Registries::with_defaults();
        let stage = new_stage(&registries, StageType::DEPLOYMENT, "deploy", "Deploy");
        assert!(stage.spec.contains_key("execution"));
        assert_eq!(
            stage.spec.get("deploymentType").and_then(Value::as_str),
            Some("Kubernetes")
        );
    }

    #[test]
    fn new_stage_for_unknown_type_is_empty() {
        let registries = Registries::with_defaults();
        let stage = new_stage(&registries, "Mystery", "m", "M");
        assert!(stage.spec.is_empty());
        assert_eq!(stage.stage_type, "Mystery");
    }
}

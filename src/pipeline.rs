use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub type StageSpec = Map<String, Value>;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PipelineDocument {
    pub pipeline: PipelineConfig,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineConfig {
    pub name: String,
    pub identifier: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_identifier: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub org_identifier: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub tags: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub variables: Vec<Variable>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub stages: Vec<StageElement>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Variable {
    pub name: String,
    #[serde(rename = "type")]
    pub variable_type: String,
    #[serde(default)]
    pub value: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StageElement {
    Stage { stage: StageNode },
    Parallel { parallel: Vec<StageElement> },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageNode {
    pub identifier: String,
    pub name: String,
    #[serde(rename = "type")]
    pub stage_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub spec: StageSpec,
}

impl StageNode {
    pub fn new(
        identifier: impl Into<String>,
        name: impl Into<String>,
        stage_type: impl Into<String>,
    ) -> Self {
        Self {
            identifier: identifier.into(),
            name: name.into(),
            stage_type: stage_type.into(),
            description: None,
            spec: StageSpec::new(),
        }
    }

    pub fn with_spec(mut self, spec: StageSpec) -> Self {
        self.spec = spec;
        self
    }

    /// Step and step-group identifiers found anywhere in the stage spec, in
    /// document order.
    pub fn step_ids(&self) -> Vec<String> {
        let mut ids = Vec::new();
        for value in self.spec.values() {
            collect_step_ids(value, &mut ids);
        }
        ids
    }

    pub fn contains_step(&self, step_id: &str) -> bool {
        self.step_ids().iter().any(|id| id == step_id)
    }
}

fn collect_step_ids(value: &Value, ids: &mut Vec<String>) {
    match value {
        Value::Object(map) => {
            for key in ["step", "stepGroup"] {
                if let Some(id) = map
                    .get(key)
                    .and_then(|node| node.get("identifier"))
                    .and_then(Value::as_str)
                {
                    ids.push(id.to_string());
                }
            }
            for child in map.values() {
                collect_step_ids(child, ids);
            }
        }
        Value::Array(items) => {
            for item in items {
                collect_step_ids(item, ids);
            }
        }
        _ => {}
    }
}

impl PipelineDocument {
    pub fn new(identifier: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            pipeline: PipelineConfig {
                identifier: identifier.into(),
                name: name.into(),
                ..PipelineConfig::default()
            },
        }
    }

    pub fn identifier(&self) -> &str {
        &self.pipeline.identifier
    }

    /// All stages, depth-first through parallel groups.
    pub fn stages(&self) -> Vec<&StageNode> {
        let mut out = Vec::new();
        flatten(&self.pipeline.stages, &mut out);
        out
    }

    pub fn stage_ids(&self) -> Vec<String> {
        self.stages()
            .into_iter()
            .map(|stage| stage.identifier.clone())
            .collect()
    }

    pub fn find_stage(&self, stage_id: &str) -> Option<&StageNode> {
        self.stages()
            .into_iter()
            .find(|stage| stage.identifier == stage_id)
    }

    pub fn find_stage_mut(&mut self, stage_id: &str) -> Option<&mut StageNode> {
        find_in_mut(&mut self.pipeline.stages, stage_id)
    }

    pub fn contains_stage(&self, stage_id: &str) -> bool {
        self.find_stage(stage_id).is_some()
    }

    /// Identifier of the stage that owns `step_id`.
    pub fn stage_of_step(&self, step_id: &str) -> Option<&str> {
        self.stages()
            .into_iter()
            .find(|stage| stage.contains_step(step_id))
            .map(|stage| stage.identifier.as_str())
    }

    pub fn contains_step(&self, step_id: &str) -> bool {
        self.stage_of_step(step_id).is_some()
    }

    /// Inserts at the top level; `index` past the end appends.
    pub fn add_stage(&mut self, stage: StageNode, index: Option<usize>) {
        let stages = &mut self.pipeline.stages;
        let position = index.unwrap_or(stages.len()).min(stages.len());
        stages.insert(position, StageElement::Stage { stage });
    }

    /// Removes the stage wherever it sits. Parallel groups left empty are
    /// removed too.
    pub fn remove_stage(&mut self, stage_id: &str) -> Option<StageNode> {
        remove_from(&mut self.pipeline.stages, stage_id)
    }
}

fn flatten<'a>(elements: &'a [StageElement], out: &mut Vec<&'a StageNode>) {
    for element in elements {
        match element {
            StageElement::Stage { stage } => out.push(stage),
            StageElement::Parallel { parallel } => flatten(parallel, out),
        }
    }
}

fn find_in_mut<'a>(elements: &'a mut [StageElement], stage_id: &str) -> Option<&'a mut StageNode> {
    for element in elements {
        match element {
            StageElement::Stage { stage } if stage.identifier == stage_id => return Some(stage),
            StageElement::Stage { .. } => {}
            StageElement::Parallel { parallel } => {
                if let Some(found) = find_in_mut(parallel, stage_id) {
                    return Some(found);
                }
            }
        }
    }
    None
}

fn remove_from(elements: &mut Vec<StageElement>, stage_id: &str) -> Option<StageNode> {
    for idx in 0..elements.len() {
        let hit = match &mut elements[idx] {
            StageElement::Stage { stage } => stage.identifier == stage_id,
            StageElement::Parallel { parallel } => {
                if let Some(stage) = remove_from(parallel, stage_id) {
                    if parallel.is_empty() {
                        elements.remove(idx);
                    }
                    return Some(stage);
                }
                false
            }
        };
        if hit && let StageElement::Stage { stage } = elements.remove(idx) {
            return Some(stage);
        }
    }
    None
}

/// JSON merge patch: objects merge recursively, `null` removes a key and
/// any other value replaces what was there. Keys missing from `patch` stay.
pub fn merge_spec(target: &mut Map<String, Value>, patch: Map<String, Value>) {
    for (key, value) in patch {
        match value {
            Value::Null => {
                target.remove(&key);
            }
            Value::Object(patch_map) => match target.get_mut(&key) {
                Some(Value::Object(existing)) => merge_spec(existing, patch_map),
                _ => {
                    let mut fresh = Map::new();
                    merge_spec(&mut fresh, patch_map);
                    target.insert(key, Value::Object(fresh));
                }
            },
            other => {
                target.insert(key, other);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn spec(value: Value) -> StageSpec {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    fn sample() -> PipelineDocument {
        let mut doc = PipelineDocument::new("demo", "Demo");
        doc.add_stage(
            StageNode::new("build", "Build", "CI").with_spec(spec(json!({
                "execution": {"steps": [
                    {"step": {"identifier": "compile", "name": "Compile", "type": "Run"}},
                    {"parallel": [
                        {"step": {"identifier": "lint", "name": "Lint", "type": "Run"}},
                        {"stepGroup": {"identifier": "checks", "name": "Checks", "steps": [
                            {"step": {"identifier": "unit", "name": "Unit", "type": "Run"}}
                        ]}}
                    ]}
                ]}
            }))),
            None,
        );
        doc.pipeline.stages.push(StageElement::Parallel {
            parallel: vec![
                StageElement::Stage {
                    stage: StageNode::new("qa", "QA", "Deployment"),
                },
                StageElement::Stage {
                    stage: StageNode::new("prod", "Prod", "Deployment"),
                },
            ],
        });
        doc
    }

    #[test]
    fn step_ids_walk_nested_groups() {
        let doc = sample();
        let build = doc.find_stage("build").unwrap();
        assert_eq!(build.step_ids(), vec!["compile", "lint", "checks", "unit"]);
        assert_eq!(doc.stage_of_step("unit"), Some("build"));
        assert!(!doc.contains_step("missing"));
    }

    #[test]
    fn stages_flatten_parallel_groups() {
        let doc = sample();
        assert_eq!(doc.stage_ids(), vec!["build", "qa", "prod"]);
        assert!(doc.contains_stage("prod"));
    }

    #[test]
    fn removing_last_parallel_member_drops_group() {
        let mut doc = sample();
        assert!(doc.remove_stage("qa").is_some());
        assert!(doc.remove_stage("prod").is_some());
        assert_eq!(doc.pipeline.stages.len(), 1);
        assert!(doc.remove_stage("prod").is_none());
    }

    #[test]
    fn add_stage_clamps_index() {
        let mut doc = sample();
        doc.add_stage(StageNode::new("first", "First", "Custom"), Some(0));
        doc.add_stage(StageNode::new("last", "Last", "Custom"), Some(99));
        assert_eq!(doc.stage_ids(), vec!["first", "build", "qa", "prod", "last"]);
    }

    #[test]
    fn merge_keeps_unrelated_fields() {
        let mut target = spec(json!({
            "deploymentType": "Kubernetes",
            "service": {"serviceRef": "api", "inputs": {"tag": "v1"}},
            "timeout": "10m"
        }));
        merge_spec(
            &mut target,
            spec(json!({"service": {"inputs": {"tag": "v2"}}, "timeout": null})),
        );
        assert_eq!(
            Value::Object(target),
            json!({
                "deploymentType": "Kubernetes",
                "service": {"serviceRef": "api", "inputs": {"tag": "v2"}}
            })
        );
    }
}

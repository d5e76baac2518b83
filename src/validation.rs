use std::collections::HashSet;

use serde::Serialize;
use serde_json::{Map, Value};

use crate::extensions::{Registries, StageType};
use crate::pipeline::{PipelineDocument, StageElement, StageNode};
use crate::schema::SchemaService;

const MAX_IDENTIFIER_LEN: usize = 128;

#[derive(Debug, Default, Serialize)]
pub struct ValidationReport {
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl ValidationReport {
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn merge(&mut self, other: ValidationReport) {
        self.errors.extend(other.errors);
        self.warnings.extend(other.warnings);
    }
}

pub fn is_valid_identifier(identifier: &str) -> bool {
    let mut chars = identifier.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    (first.is_ascii_alphabetic() || first == '_')
        && identifier.len() <= MAX_IDENTIFIER_LEN
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$')
}

/// Checks that need nothing beyond the document itself.
pub fn validate_structure(document: &PipelineDocument) -> ValidationReport {
    let mut report = ValidationReport::default();
    let pipeline = &document.pipeline;

    if !is_valid_identifier(&pipeline.identifier) {
        report.errors.push(format!(
            "Pipeline identifier '{}' is not a valid identifier",
            pipeline.identifier
        ));
    }
    if pipeline.name.trim().is_empty() {
        report.errors.push("Pipeline name cannot be empty".into());
    }
    if pipeline.stages.is_empty() {
        report
            .warnings
            .push("Pipeline does not contain any stages".into());
    }
    report.merge(validate_parallel_groups(&pipeline.stages));

    let mut seen = HashSet::new();
    for (idx, stage) in document.stages().into_iter().enumerate() {
        if !is_valid_identifier(&stage.identifier) {
            report.errors.push(format!(
                "Stage {} has an invalid identifier '{}'",
                idx + 1,
                stage.identifier
            ));
        }
        if !seen.insert(stage.identifier.as_str()) {
            report.errors.push(format!(
                "Duplicate stage identifier '{}'",
                stage.identifier
            ));
        }
        if stage.name.trim().is_empty() {
            report
                .errors
                .push(format!("Stage '{}' has an empty name", stage.identifier));
        }
        report.merge(validate_step_ids(stage));
    }

    let mut variables = HashSet::new();
    for variable in &pipeline.variables {
        if !variables.insert(variable.name.as_str()) {
            report
                .errors
                .push(format!("Duplicate pipeline variable '{}'", variable.name));
        }
    }

    report
}

/// Structural checks plus stage-type lookups and per-type schemas.
pub fn validate_pipeline(
    document: &PipelineDocument,
    registries: &Registries,
    schemas: &dyn SchemaService,
) -> ValidationReport {
    let mut report = validate_structure(document);
    for stage in document.stages() {
        report.merge(validate_stage(stage, registries, schemas));
    }
    report
}

fn validate_stage(
    stage: &StageNode,
    registries: &Registries,
    schemas: &dyn SchemaService,
) -> ValidationReport {
    let mut report = ValidationReport::default();
    if !registries
        .stages
        .contains(&StageType::from(stage.stage_type.as_str()))
    {
        report.warnings.push(format!(
            "Stage '{}' has type '{}' which no module handles",
            stage.identifier, stage.stage_type
        ));
    }
    if let Some(schema) = schemas.stage_schema(&stage.stage_type) {
        report.errors.extend(
            schema
                .check_spec(&stage.spec)
                .into_iter()
                .map(|problem| format!("Stage '{}': {problem}", stage.identifier)),
        );
    }
    report
}

/// Validates an update before it is dispatched to the editor.
pub fn validate_stage_patch(
    stage_type: &str,
    patch: &Map<String, Value>,
    schemas: &dyn SchemaService,
) -> ValidationReport {
    let mut report = ValidationReport::default();
    match schemas.stage_schema(stage_type) {
        Some(schema) => report.errors.extend(schema.check_patch(patch)),
        None => report.warnings.push(format!(
            "No input schema for stage type '{stage_type}'; update not checked"
        )),
    }
    report
}

fn validate_parallel_groups(elements: &[StageElement]) -> ValidationReport {
    let mut report = ValidationReport::default();
    for element in elements {
        if let StageElement::Parallel { parallel } = element {
            if parallel.is_empty() {
                report
                    .errors
                    .push("Parallel stage group cannot be empty".into());
            }
            report.merge(validate_parallel_groups(parallel));
        }
    }
    report
}

fn validate_step_ids(stage: &StageNode) -> ValidationReport {
    let mut report = ValidationReport::default();
    let mut seen = HashSet::new();
    for step in stage.step_ids() {
        if !is_valid_identifier(&step) {
            report.errors.push(format!(
                "Stage '{}' has a step with invalid identifier '{}'",
                stage.identifier, step
            ));
        }
        if !seen.insert(step.clone()) {
            report.errors.push(format!(
                "Stage '{}' has duplicate step identifier '{}'",
                stage.identifier, step
            ));
        }
    }
    report
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identifier_rules() {
        assert!(is_valid_identifier("deploy_prod"));
        assert!(is_valid_identifier("_x$1"));
        assert!(!is_valid_identifier("1stage"));
        assert!(!is_valid_identifier("has-dash"));
        assert!(!is_valid_identifier(""));
        assert!(!is_valid_identifier(&"a".repeat(129)));
        assert!(is_valid_identifier(&"a".repeat(128)));
    }
}

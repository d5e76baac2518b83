use pipeline_studio::extensions::Registries;
use pipeline_studio::pipeline::{PipelineDocument, StageElement, StageNode};
use pipeline_studio::schema::BuiltinSchemas;
use pipeline_studio::validation::{validate_pipeline, validate_structure};
use pipeline_studio::yaml::from_yaml;
use serde_json::{Value, json};

fn stage(identifier: &str, stage_type: &str, spec: Value) -> StageNode {
    let spec = match spec {
        Value::Object(map) => map,
        _ => Default::default(),
    };
    StageNode::new(identifier, identifier, stage_type).with_spec(spec)
}

#[test]
fn duplicate_stage_identifiers_are_errors() {
    let mut document = PipelineDocument::new("demo", "Demo");
    document.add_stage(stage("build", "Custom", json!({"execution": {}})), None);
    document.pipeline.stages.push(StageElement::Parallel {
        parallel: vec![StageElement::Stage {
            stage: stage("build", "Custom", json!({"execution": {}})),
        }],
    });

    let report = validate_structure(&document);
    assert!(!report.is_ok());
    assert!(report.errors.iter().any(|error| error.contains("'build'")));
}

#[test]
fn duplicate_step_identifiers_within_stage_are_errors() {
    let mut document = PipelineDocument::new("demo", "Demo");
    document.add_stage(
        stage(
            "build",
            "CI",
            json!({"execution": {"steps": [
                {"step": {"identifier": "test", "type": "Run"}},
                {"stepGroup": {"identifier": "group", "steps": [
                    {"step": {"identifier": "test", "type": "Run"}}
                ]}}
            ]}}),
        ),
        None,
    );
    let report = validate_structure(&document);
    assert!(report.errors.iter().any(|error| error.contains("'test'")));
}

#[test]
fn empty_pipeline_only_warns() {
    let report = validate_structure(&PipelineDocument::new("demo", "Demo"));
    assert!(report.is_ok());
    assert_eq!(report.warnings.len(), 1);
}

#[test]
fn unknown_stage_type_warns_and_schema_errors_fail() {
    let registries = Registries::with_defaults();
    let document = from_yaml(
        r#"
pipeline:
  name: Release
  identifier: release
  stages:
    - stage:
        identifier: mystery
        name: Mystery
        type: Quantum
        spec: {}
    - stage:
        identifier: ship
        name: Ship
        type: Deployment
        spec:
          deploymentType: 3
          execution:
            steps: []
"#,
    )
    .unwrap();

    let report = validate_pipeline(&document, &registries, &BuiltinSchemas);
    assert!(
        report
            .warnings
            .iter()
            .any(|warning| warning.contains("Quantum"))
    );
    assert_eq!(
        report.errors,
        vec!["Stage 'ship': Deployment stage field 'deploymentType' must be a string"]
    );
}

#[test]
fn runtime_inputs_pass_schema_checks() {
    let registries = Registries::with_defaults();
    let mut document = PipelineDocument::new("chained", "Chained");
    document.add_stage(
        stage(
            "child",
            "Pipeline",
            json!({"org": "<+input>", "project": "core", "pipeline": "<+input>"}),
        ),
        None,
    );
    let report = validate_pipeline(&document, &registries, &BuiltinSchemas);
    assert!(report.is_ok(), "{:?}", report.errors);
}

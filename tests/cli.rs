use std::fs;
use std::path::Path;

use assert_cmd::Command;
use tempfile::tempdir;

fn studio() -> Command {
    Command::cargo_bin("pipeline-studio").expect("binary present")
}

fn stdout_of(command: &mut Command) -> String {
    let output = command.assert().success().get_output().stdout.clone();
    String::from_utf8(output).expect("utf8 stdout")
}

fn new_pipeline(preset: &str, identifier: &str, output: &Path) {
    studio()
        .args(["new", "--preset", preset, "--identifier", identifier, "--name"])
        .arg(identifier.to_uppercase())
        .arg("--output")
        .arg(output)
        .assert()
        .success();
}

#[test]
fn types_lists_resources_by_category() {
    let stdout = stdout_of(studio().args(["types", "--kind", "resources"]));
    assert!(stdout.contains("Available resource handlers:"));
    assert!(stdout.contains("Project resources:"));
    assert!(stdout.contains("PIPELINE: Pipelines"));
    assert!(!stdout.contains("Available stage handlers:"));
}

#[test]
fn generated_pipelines_validate() {
    let temp = tempdir().unwrap();
    for preset in ["deploy", "build", "approval"] {
        new_pipeline(preset, preset, &temp.path().join(format!("{preset}.yaml")));
    }

    let pattern = temp.path().join("*.yaml");
    studio()
        .arg("validate")
        .arg(pattern.to_str().unwrap())
        .assert()
        .success();
}

#[test]
fn validate_fails_on_duplicate_stages() {
    let temp = tempdir().unwrap();
    let path = temp.path().join("broken.yaml");
    fs::write(
        &path,
        r#"pipeline:
  name: Broken
  identifier: broken
  stages:
    - stage:
        identifier: twice
        name: One
        type: Custom
        spec:
          execution:
            steps: []
    - stage:
        identifier: twice
        name: Two
        type: Custom
        spec:
          execution:
            steps: []
"#,
    )
    .unwrap();

    studio()
        .arg("validate")
        .arg(path.to_str().unwrap())
        .assert()
        .failure();
}

#[test]
fn validate_fails_when_nothing_matches() {
    let temp = tempdir().unwrap();
    let pattern = temp.path().join("*.yaml");
    studio()
        .arg("validate")
        .arg(pattern.to_str().unwrap())
        .assert()
        .failure();
}

#[test]
fn show_renders_known_and_unknown_stages() {
    let temp = tempdir().unwrap();
    let path = temp.path().join("mixed.yaml");
    fs::write(
        &path,
        r#"pipeline:
  name: Mixed
  identifier: mixed
  stages:
    - stage:
        identifier: ship
        name: Ship
        type: Deployment
        spec:
          deploymentType: Kubernetes
          execution:
            steps:
              - step:
                  identifier: rollout
                  name: Rollout
                  type: K8sRollingDeploy
    - stage:
        identifier: odd
        name: Odd
        type: Quantum
"#,
    )
    .unwrap();

    let stdout = stdout_of(studio().arg("show").arg(&path).args(["--step", "rollout"]));
    assert!(stdout.contains("[cd-main] Ship (ship)"));
    assert!(stdout.contains("deployment type: Kubernetes"));
    assert!(stdout.contains("> rollout"));
    assert!(stdout.contains("No stage handler registered"));

    studio()
        .arg("show")
        .arg(&path)
        .args(["--stage", "missing"])
        .assert()
        .failure();
}

#[test]
fn convert_to_json() {
    let temp = tempdir().unwrap();
    let path = temp.path().join("build.yaml");
    new_pipeline("build", "build", &path);

    let stdout = stdout_of(studio().arg("convert").arg(&path).args(["--to", "json"]));
    let value: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(value["pipeline"]["identifier"], "build");
    assert_eq!(value["pipeline"]["stages"][0]["stage"]["type"], "CI");
}

#[test]
fn edit_script_saves_changes() {
    let temp = tempdir().unwrap();
    let store = temp.path().join("store");
    let drafts = temp.path().join("drafts");
    new_pipeline("deploy", "checkout", &store.join("checkout.yaml"));

    let script = temp.path().join("script.yaml");
    fs::write(
        &script,
        r#"pipeline: checkout
steps:
  - action: select_stage
    stage: deploy
  - action: open_drawer
    drawer: StageConfig
    data:
      stageId: deploy
  - action: update_stage
    stage: deploy
    spec:
      deploymentType: NativeHelm
  - action: close_drawer
  - action: add_stage
    type: Approval
    identifier: gate
    name: Gate
    index: 0
  - action: save
"#,
    )
    .unwrap();
    let metrics = temp.path().join("metrics.json");

    let stdout = stdout_of(
        studio()
            .arg("edit")
            .arg("--store")
            .arg(&store)
            .arg("--drafts")
            .arg(&drafts)
            .arg("--script")
            .arg(&script)
            .arg("--metrics-json")
            .arg(&metrics),
    );
    let snapshot: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(snapshot["isDirty"], false);
    assert_eq!(snapshot["drawer"]["isOpen"], false);
    assert_eq!(snapshot["selection"]["stageId"], "deploy");
    assert_eq!(snapshot["stageIds"], serde_json::json!(["gate", "deploy"]));

    let saved = fs::read_to_string(store.join("checkout.yaml")).unwrap();
    assert!(saved.contains("NativeHelm"));
    assert!(saved.contains("identifier: gate"));
    assert!(!drafts.join("checkout.draft.yaml").exists());

    let metrics: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&metrics).unwrap()).unwrap();
    assert_eq!(metrics["saves_succeeded"], 1);
}

#[test]
fn edit_script_rejects_invalid_update() {
    let temp = tempdir().unwrap();
    let store = temp.path().join("store");
    new_pipeline("deploy", "checkout", &store.join("checkout.yaml"));

    let script = temp.path().join("script.yaml");
    fs::write(
        &script,
        "pipeline: checkout\nsteps:\n  - action: update_stage\n    stage: deploy\n    spec:\n      execution: null\n",
    )
    .unwrap();

    studio()
        .arg("edit")
        .arg("--store")
        .arg(&store)
        .arg("--script")
        .arg(&script)
        .assert()
        .failure();
}

#[test]
fn drafts_list_and_discard() {
    let temp = tempdir().unwrap();
    let store = temp.path().join("store");
    let drafts = temp.path().join("drafts");
    new_pipeline("build", "nightly", &store.join("nightly.yaml"));

    let script = temp.path().join("script.yaml");
    fs::write(
        &script,
        "pipeline: nightly\nsteps:\n  - action: remove_stage\n    stage: build\n",
    )
    .unwrap();
    studio()
        .arg("edit")
        .arg("--store")
        .arg(&store)
        .arg("--drafts")
        .arg(&drafts)
        .arg("--script")
        .arg(&script)
        .assert()
        .success();

    let listing = stdout_of(studio().args(["drafts", "list", "--drafts"]).arg(&drafts));
    assert!(listing.starts_with("nightly\t"));
    assert!(listing.contains("0 stage(s)"));

    studio()
        .args(["drafts", "discard", "--drafts"])
        .arg(&drafts)
        .arg("nightly")
        .assert()
        .success();
    assert!(!drafts.join("nightly.draft.yaml").exists());
}

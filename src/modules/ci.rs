use serde_json::json;

use crate::extensions::{Registries, StageProps, StageType};
use crate::registry::Handler;

use super::{DEFAULT_SPEC, stage_fragment};

pub fn register(registries: &mut Registries) {
    registries.stages.register(
        StageType::from(StageType::CI),
        Handler::new("ci-main", "Build", |props: &StageProps| {
            stage_fragment(
                "ci-main",
                props,
                &[("cloneCodebase", "clone codebase"), ("platform", "platform")],
            )
        })
        .with_category("Build")
        .with_metadata(
            DEFAULT_SPEC,
            json!({
                "cloneCodebase": true,
                "platform": {"os": "Linux", "arch": "Amd64"},
                "runtime": {"type": "Cloud", "spec": {}},
                "execution": {"steps": []}
            }),
        ),
    );

    registries.stages.register(
        StageType::from(StageType::SECURITY_TESTS),
        Handler::new("sto-color-filled", "Security Tests", |props: &StageProps| {
            stage_fragment("sto-color-filled", props, &[("cloneCodebase", "clone codebase")])
        })
        .with_category("Build")
        .with_metadata(
            DEFAULT_SPEC,
            json!({"cloneCodebase": true, "execution": {"steps": []}}),
        ),
    );
}

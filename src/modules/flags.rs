use serde_json::json;

use crate::extensions::{Registries, ResourceProps, ResourceType, StageProps, StageType};
use crate::registry::{Fragment, Handler};

use super::{DEFAULT_SPEC, stage_fragment};

pub fn register(registries: &mut Registries) {
    registries.stages.register(
        StageType::from(StageType::FEATURE_FLAG),
        Handler::new("cf-main", "Feature Flag", |props: &StageProps| {
            stage_fragment("cf-main", props, &[])
        })
        .with_category("Release")
        .with_metadata(DEFAULT_SPEC, json!({"execution": {"steps": []}})),
    );

    registries.resources.register(
        ResourceType::FeatureFlag,
        Handler::new("nav-cf", "Feature Flags", |props: &ResourceProps| {
            let mut fragment = Fragment::new(format!("Feature Flags in {}", props.scope))
                .with_icon("nav-cf");
            for identifier in &props.identifiers {
                fragment.push(identifier.clone());
            }
            fragment
        })
        .with_category("Project resources")
        .with_permission_label("ff_featureflag_view", "View")
        .with_permission_label("ff_featureflag_edit", "Create / Edit")
        .with_permission_label("ff_featureflag_toggle", "Toggle")
        .with_permission_label("ff_featureflag_delete", "Delete"),
    );
}

use serde_json::json;

use crate::extensions::{ArtifactSourceProps, ArtifactSourceType, Registries, StageProps, StageType};
use crate::registry::{Fragment, Handler};

use super::{DEFAULT_SPEC, stage_fragment};

pub fn register(registries: &mut Registries) {
    registries.stages.register(
        StageType::from(StageType::DEPLOYMENT),
        Handler::new("cd-main", "Deploy", |props: &StageProps| {
            stage_fragment(
                "cd-main",
                props,
                &[
                    ("deploymentType", "deployment type"),
                    ("service", "service"),
                    ("environment", "environment"),
                ],
            )
        })
        .with_category("Deploy")
        .with_metadata(
            DEFAULT_SPEC,
            json!({
                "deploymentType": "Kubernetes",
                "service": {"serviceRef": ""},
                "environment": {"environmentRef": "", "deployToAll": false},
                "execution": {"steps": [], "rollbackSteps": []}
            }),
        ),
    );

    registries.stages.register(
        StageType::from(StageType::CUSTOM),
        Handler::new("custom-stage", "Custom Stage", |props: &StageProps| {
            stage_fragment("custom-stage", props, &[("environment", "environment")])
        })
        .with_category("Deploy")
        .with_metadata(DEFAULT_SPEC, json!({"execution": {"steps": []}})),
    );

    let sources = [
        (ArtifactSourceType::DockerRegistry, "service-dockerhub", "Docker Registry"),
        (ArtifactSourceType::Gcr, "service-gcp", "GCR"),
        (ArtifactSourceType::Ecr, "ecr-step", "ECR"),
        (ArtifactSourceType::ArtifactoryRegistry, "service-artifactory", "Artifactory"),
        (ArtifactSourceType::Nexus3Registry, "service-nexus", "Nexus3"),
        (ArtifactSourceType::AmazonS3, "service-service-s3", "Amazon S3"),
        (ArtifactSourceType::CustomArtifact, "custom-artifact", "Custom"),
    ];
    for (source, icon, label) in sources {
        registries.artifact_sources.register(
            source,
            Handler::new(icon, label, move |props: &ArtifactSourceProps| {
                render_artifact_source(source, icon, props)
            })
            .with_category(if source == ArtifactSourceType::CustomArtifact {
                "Custom"
            } else {
                "Registries"
            }),
        );
    }
}

fn render_artifact_source(
    source: ArtifactSourceType,
    icon: &str,
    props: &ArtifactSourceProps,
) -> Fragment {
    let mut fragment = Fragment::new(props.identifier.clone()).with_icon(icon);
    fragment.push(format!("source: {source}"));
    match &props.connector_ref {
        Some(connector) => fragment.push(format!("connector: {connector}")),
        None if source != ArtifactSourceType::CustomArtifact => fragment.push("connector: <missing>"),
        None => {}
    }
    for key in ["imagePath", "repository", "bucketName", "tag"] {
        if let Some(value) = props.spec.get(key).and_then(|v| v.as_str()) {
            fragment.push(format!("{key}: {value}"));
        }
    }
    fragment
}

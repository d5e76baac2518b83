use serde_json::json;

use crate::extensions::{
    Registries, ResourceProps, ResourceType, StageProps, StageType, TemplateProps, TemplateType,
};
use crate::registry::{Fragment, Handler};

use super::{DEFAULT_SPEC, stage_fragment};

const PROJECT_RESOURCES: &str = "Project resources";
const SHARED_RESOURCES: &str = "Shared resources";
const ADMINISTRATIVE: &str = "Administrative functions";

pub fn register(registries: &mut Registries) {
    register_stages(registries);
    register_resources(registries);
    register_templates(registries);
}

fn register_stages(registries: &mut Registries) {
    registries.stages.register(
        StageType::from(StageType::APPROVAL),
        Handler::new("approval-stage-icon", "Approval", |props: &StageProps| {
            stage_fragment("approval-stage-icon", props, &[])
        })
        .with_category("Approval")
        .with_metadata(
            DEFAULT_SPEC,
            json!({
                "execution": {"steps": [{"step": {
                    "identifier": "approval",
                    "name": "Approval",
                    "type": "HarnessApproval",
                    "timeout": "1d",
                    "spec": {"approvalMessage": "Please review and approve", "includePipelineExecutionHistory": true}
                }}]}
            }),
        ),
    );

    registries.stages.register(
        StageType::from(StageType::PIPELINE),
        Handler::new("chained-pipeline", "Pipeline", |props: &StageProps| {
            stage_fragment(
                "chained-pipeline",
                props,
                &[("org", "org"), ("project", "project"), ("pipeline", "pipeline")],
            )
        })
        .with_category("Pipeline")
        .with_metadata(
            DEFAULT_SPEC,
            json!({"org": "", "project": "", "pipeline": "", "inputs": {}}),
        ),
    );
}

fn register_resources(registries: &mut Registries) {
    let resources = [
        (
            ResourceType::Pipeline,
            "pipeline-deployment",
            "Pipelines",
            PROJECT_RESOURCES,
            &[
                ("core_pipeline_view", "View"),
                ("core_pipeline_edit", "Create / Edit"),
                ("core_pipeline_delete", "Delete"),
                ("core_pipeline_execute", "Execute"),
            ][..],
        ),
        (
            ResourceType::Service,
            "services",
            "Services",
            PROJECT_RESOURCES,
            &[
                ("core_service_view", "View"),
                ("core_service_edit", "Create / Edit"),
                ("core_service_delete", "Delete"),
                ("core_service_access", "Access"),
            ][..],
        ),
        (
            ResourceType::Environment,
            "environments",
            "Environments",
            PROJECT_RESOURCES,
            &[
                ("core_environment_view", "View"),
                ("core_environment_edit", "Create / Edit"),
                ("core_environment_delete", "Delete"),
                ("core_environment_access", "Access"),
            ][..],
        ),
        (
            ResourceType::Connector,
            "res-connectors",
            "Connectors",
            SHARED_RESOURCES,
            &[
                ("core_connector_view", "View"),
                ("core_connector_edit", "Create / Edit"),
                ("core_connector_delete", "Delete"),
                ("core_connector_access", "Access"),
            ][..],
        ),
        (
            ResourceType::Secret,
            "res-secrets",
            "Secrets",
            SHARED_RESOURCES,
            &[
                ("core_secret_view", "View"),
                ("core_secret_edit", "Create / Edit"),
                ("core_secret_delete", "Delete"),
                ("core_secret_access", "Access"),
            ][..],
        ),
        (
            ResourceType::Template,
            "templates",
            "Templates",
            SHARED_RESOURCES,
            &[
                ("core_template_view", "View"),
                ("core_template_edit", "Create / Edit"),
                ("core_template_delete", "Delete"),
                ("core_template_access", "Access"),
                ("core_template_copy", "Copy"),
            ][..],
        ),
        (
            ResourceType::Delegate,
            "res-delegates",
            "Delegates",
            SHARED_RESOURCES,
            &[
                ("core_delegate_view", "View"),
                ("core_delegate_edit", "Create / Edit"),
                ("core_delegate_delete", "Delete"),
            ][..],
        ),
        (
            ResourceType::User,
            "res-users",
            "Users",
            ADMINISTRATIVE,
            &[
                ("core_user_view", "View"),
                ("core_user_manage", "Manage"),
                ("core_user_invite", "Invite"),
            ][..],
        ),
        (
            ResourceType::UserGroup,
            "res-userGroups",
            "User Groups",
            ADMINISTRATIVE,
            &[
                ("core_usergroup_view", "View"),
                ("core_usergroup_manage", "Manage"),
            ][..],
        ),
        (
            ResourceType::Role,
            "res-roles",
            "Roles",
            ADMINISTRATIVE,
            &[
                ("core_role_view", "View"),
                ("core_role_edit", "Create / Edit"),
                ("core_role_delete", "Delete"),
            ][..],
        ),
        (
            ResourceType::ResourceGroup,
            "res-resourceGroups",
            "Resource Groups",
            ADMINISTRATIVE,
            &[
                ("core_resourcegroup_view", "View"),
                ("core_resourcegroup_edit", "Create / Edit"),
                ("core_resourcegroup_delete", "Delete"),
            ][..],
        ),
    ];

    for (resource, icon, label, category, permissions) in resources {
        let mut handler = Handler::new(icon, label, move |props: &ResourceProps| {
            render_resource(label, icon, props)
        })
        .with_category(category);
        for (permission, permission_label) in permissions {
            handler = handler.with_permission_label(*permission, *permission_label);
        }
        registries.resources.register(resource, handler);
    }
}

fn render_resource(label: &str, icon: &str, props: &ResourceProps) -> Fragment {
    let mut fragment = Fragment::new(format!("{label} in {}", props.scope)).with_icon(icon);
    if props.identifiers.is_empty() {
        fragment.push("All");
    } else {
        for identifier in &props.identifiers {
            fragment.push(identifier.clone());
        }
    }
    fragment
}

fn register_templates(registries: &mut Registries) {
    let templates = [
        (TemplateType::Step, "step", "Step", "Pipeline building blocks"),
        (TemplateType::StepGroup, "step-group", "Step Group", "Pipeline building blocks"),
        (TemplateType::Stage, "template-stage", "Stage", "Pipeline building blocks"),
        (TemplateType::Pipeline, "pipeline", "Pipeline", "Pipeline building blocks"),
        (TemplateType::MonitoredService, "cv-main", "Monitored Service", "Verification"),
    ];
    for (template, icon, label, category) in templates {
        registries.templates.register(
            template,
            Handler::new(icon, label, move |props: &TemplateProps| {
                Fragment::new(format!("{} ({})", props.name, props.identifier))
                    .with_icon(icon)
                    .line(format!("kind: {template}"))
                    .line(format!("version: {}", props.version_label))
            })
            .with_category(category),
        );
    }
}

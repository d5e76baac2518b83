//! Registry key types, the props each registry's renderers receive, and the
//! `Registries` bundle handed to the application at bootstrap.

use std::fmt;
use std::str::FromStr;

use anyhow::{Result, anyhow};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::pipeline::StageNode;
use crate::registry::ExtensionRegistry;

macro_rules! string_enum {
    ($name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub enum $name {
            $(#[serde(rename = $text)] $variant),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = anyhow::Error;

            fn from_str(value: &str) -> Result<Self> {
                $name::ALL
                    .iter()
                    .copied()
                    .find(|candidate| candidate.as_str().eq_ignore_ascii_case(value))
                    .ok_or_else(|| anyhow!("Unknown {} '{}'", stringify!($name), value))
            }
        }
    };
}

string_enum!(ResourceType {
    Pipeline => "PIPELINE",
    Connector => "CONNECTOR",
    Secret => "SECRET",
    Template => "TEMPLATE",
    Service => "SERVICE",
    Environment => "ENVIRONMENT",
    FeatureFlag => "FEATURE_FLAG",
    Delegate => "DELEGATE",
    User => "USER",
    UserGroup => "USERGROUP",
    Role => "ROLE",
    ResourceGroup => "RESOURCEGROUP",
});

string_enum!(TemplateType {
    Step => "Step",
    Stage => "Stage",
    Pipeline => "Pipeline",
    StepGroup => "StepGroup",
    MonitoredService => "MonitoredService",
});

string_enum!(ArtifactSourceType {
    DockerRegistry => "DockerRegistry",
    Gcr => "Gcr",
    Ecr => "Ecr",
    ArtifactoryRegistry => "ArtifactoryRegistry",
    Nexus3Registry => "Nexus3Registry",
    AmazonS3 => "AmazonS3",
    CustomArtifact => "CustomArtifact",
});

/// Stage types are open-ended: documents may carry types no module has
/// registered, so the key is a string rather than a closed enum.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StageType(String);

impl StageType {
    pub const DEPLOYMENT: &'static str = "Deployment";
    pub const CUSTOM: &'static str = "Custom";
    pub const CI: &'static str = "CI";
    pub const SECURITY_TESTS: &'static str = "SecurityTests";
    pub const FEATURE_FLAG: &'static str = "FeatureFlag";
    pub const APPROVAL: &'static str = "Approval";
    pub const PIPELINE: &'static str = "Pipeline";

    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for StageType {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Scope {
    pub account_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub org_identifier: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_identifier: Option<String>,
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.org_identifier, &self.project_identifier) {
            (Some(org), Some(project)) => write!(f, "project {org}/{project}"),
            (Some(org), None) => write!(f, "organization {org}"),
            _ => write!(f, "account {}", self.account_id),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ResourceProps {
    pub scope: Scope,
    pub identifiers: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct StageProps {
    pub stage: StageNode,
    pub selected_step: Option<String>,
    pub read_only: bool,
}

impl StageProps {
    pub fn new(stage: StageNode) -> Self {
        Self {
            stage,
            selected_step: None,
            read_only: false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct TemplateProps {
    pub identifier: String,
    pub name: String,
    pub version_label: String,
}

#[derive(Debug, Clone, Default)]
pub struct ArtifactSourceProps {
    pub identifier: String,
    pub connector_ref: Option<String>,
    pub spec: Map<String, Value>,
}

pub type ResourceRegistry = ExtensionRegistry<ResourceType, ResourceProps>;
pub type StageRegistry = ExtensionRegistry<StageType, StageProps>;
pub type TemplateRegistry = ExtensionRegistry<TemplateType, TemplateProps>;
pub type ArtifactSourceRegistry = ExtensionRegistry<ArtifactSourceType, ArtifactSourceProps>;

/// One registry per extension point. Constructed explicitly and passed to
/// whatever needs lookups; there is no process-wide instance.
#[derive(Debug)]
pub struct Registries {
    pub resources: ResourceRegistry,
    pub stages: StageRegistry,
    pub templates: TemplateRegistry,
    pub artifact_sources: ArtifactSourceRegistry,
}

impl Default for Registries {
    fn default() -> Self {
        Self::new()
    }
}

impl Registries {
    pub fn new() -> Self {
        Self {
            resources: ExtensionRegistry::new("resource"),
            stages: ExtensionRegistry::new("stage"),
            templates: ExtensionRegistry::new("template"),
            artifact_sources: ExtensionRegistry::new("artifact source"),
        }
    }

    pub fn with_defaults() -> Self {
        let mut registries = Self::new();
        crate::modules::register_defaults(&mut registries);
        registries
    }
}

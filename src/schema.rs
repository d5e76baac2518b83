use std::collections::HashMap;

use once_cell::sync::Lazy;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::extensions::StageType;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
    String,
    Number,
    Boolean,
    Object,
    Array,
}

impl FieldKind {
    fn matches(self, value: &Value) -> bool {
        if is_runtime_input(value) {
            return true;
        }
        match self {
            FieldKind::String => value.is_string(),
            FieldKind::Number => value.is_number(),
            FieldKind::Boolean => value.is_boolean(),
            FieldKind::Object => value.is_object(),
            FieldKind::Array => value.is_array(),
        }
    }
}

/// `<+input>` and other `<+...>` expressions are resolved at execution time
/// and stand in for a value of any kind.
pub fn is_runtime_input(value: &Value) -> bool {
    value
        .as_str()
        .map(|text| text.trim_start().starts_with("<+"))
        .unwrap_or(false)
}

#[derive(Debug, Clone, Serialize)]
pub struct FieldSchema {
    pub name: &'static str,
    pub kind: FieldKind,
    pub required: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct StageSchema {
    pub stage_type: &'static str,
    pub fields: Vec<FieldSchema>,
}

impl StageSchema {
    fn field(&self, name: &str) -> Option<&FieldSchema> {
        self.fields.iter().find(|field| field.name == name)
    }

    /// Problems with a complete stage spec.
    pub fn check_spec(&self, spec: &Map<String, Value>) -> Vec<String> {
        let mut problems = Vec::new();
        for field in &self.fields {
            match spec.get(field.name) {
                None | Some(Value::Null) if field.required => problems.push(format!(
                    "{} stage requires '{}'",
                    self.stage_type, field.name
                )),
                Some(value) if !value.is_null() && !field.kind.matches(value) => {
                    problems.push(kind_mismatch(self.stage_type, field))
                }
                _ => {}
            }
        }
        problems
    }

    /// Problems with a merge patch. Absent fields are fine; `null` may not
    /// clear a required field.
    pub fn check_patch(&self, patch: &Map<String, Value>) -> Vec<String> {
        let mut problems = Vec::new();
        for (key, value) in patch {
            let Some(field) = self.field(key) else {
                continue;
            };
            if value.is_null() {
                if field.required {
                    problems.push(format!(
                        "{} stage field '{}' is required and cannot be removed",
                        self.stage_type, field.name
                    ));
                }
            } else if !field.kind.matches(value) {
                problems.push(kind_mismatch(self.stage_type, field));
            }
        }
        problems
    }
}

fn kind_mismatch(stage_type: &str, field: &FieldSchema) -> String {
    format!(
        "{} stage field '{}' must be {}",
        stage_type,
        field.name,
        match field.kind {
            FieldKind::String => "a string",
            FieldKind::Number => "a number",
            FieldKind::Boolean => "a boolean",
            FieldKind::Object => "an object",
            FieldKind::Array => "an array",
        }
    )
}

/// Supplies the input schema for a stage type.
pub trait SchemaService {
    fn stage_schema(&self, stage_type: &str) -> Option<&StageSchema>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct BuiltinSchemas;

static BUILTIN: Lazy<HashMap<&'static str, StageSchema>> = Lazy::new(|| {
    use FieldKind::*;

    let schema = |stage_type: &'static str, fields: &[(&'static str, FieldKind, bool)]| {
        (
            stage_type,
            StageSchema {
                stage_type,
                fields: fields
                    .iter()
                    .map(|&(name, kind, required)| FieldSchema {
                        name,
                        kind,
                        required,
                    })
                    .collect(),
            },
        )
    };

    HashMap::from([
        schema(
            StageType::DEPLOYMENT,
            &[
                ("deploymentType", String, true),
                ("service", Object, false),
                ("environment", Object, false),
                ("execution", Object, true),
            ],
        ),
        schema(
            StageType::CUSTOM,
            &[("environment", Object, false), ("execution", Object, true)],
        ),
        schema(
            StageType::CI,
            &[
                ("cloneCodebase", Boolean, false),
                ("platform", Object, false),
                ("runtime", Object, false),
                ("execution", Object, true),
            ],
        ),
        schema(
            StageType::SECURITY_TESTS,
            &[("cloneCodebase", Boolean, false), ("execution", Object, true)],
        ),
        schema(StageType::FEATURE_FLAG, &[("execution", Object, true)]),
        schema(StageType::APPROVAL, &[("execution", Object, true)]),
        schema(
            StageType::PIPELINE,
            &[
                ("org", String, true),
                ("project", String, true),
                ("pipeline", String, true),
                ("inputs", Object, false),
            ],
        ),
    ])
});

impl SchemaService for BuiltinSchemas {
    fn stage_schema(&self, stage_type: &str) -> Option<&StageSchema> {
        BUILTIN.get(stage_type)
    }
}

use thiserror::Error;

use crate::pipeline::PipelineDocument;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DocumentError {
    #[error("pipeline document is empty")]
    Empty,
    #[error("invalid pipeline YAML at line {line}, column {column}: {message}")]
    YamlAt {
        line: usize,
        column: usize,
        message: String,
    },
    #[error("invalid pipeline YAML: {0}")]
    Yaml(String),
    #[error("invalid pipeline JSON at line {line}, column {column}: {message}")]
    Json {
        line: usize,
        column: usize,
        message: String,
    },
    #[error("failed to serialize pipeline: {0}")]
    Serialize(String),
}

impl From<serde_yaml::Error> for DocumentError {
    fn from(err: serde_yaml::Error) -> Self {
        match err.location() {
            Some(location) => DocumentError::YamlAt {
                line: location.line(),
                column: location.column(),
                message: err.to_string(),
            },
            None => DocumentError::Yaml(err.to_string()),
        }
    }
}

impl From<serde_json::Error> for DocumentError {
    fn from(err: serde_json::Error) -> Self {
        DocumentError::Json {
            line: err.line(),
            column: err.column(),
            message: err.to_string(),
        }
    }
}

pub fn from_yaml(text: &str) -> Result<PipelineDocument, DocumentError> {
    if text.trim().is_empty() {
        return Err(DocumentError::Empty);
    }
    Ok(serde_yaml::from_str(text)?)
}

pub fn to_yaml(document: &PipelineDocument) -> Result<String, DocumentError> {
    serde_yaml::to_string(document).map_err(|err| DocumentError::Serialize(err.to_string()))
}

pub fn from_json(text: &str) -> Result<PipelineDocument, DocumentError> {
    if text.trim().is_empty() {
        return Err(DocumentError::Empty);
    }
    Ok(serde_json::from_str(text)?)
}

pub fn to_json(document: &PipelineDocument) -> Result<String, DocumentError> {
    serde_json::to_string_pretty(document).map_err(|err| DocumentError::Serialize(err.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
pipeline:
  name: Payments
  identifier: payments
  projectIdentifier: checkout
  stages:
    - stage:
        identifier: build
        name: Build
        type: CI
        spec:
          cloneCodebase: true
          execution:
            steps:
              - step:
                  identifier: test
                  name: Test
                  type: Run
                  spec:
                    command: cargo test
    - parallel:
        - stage:
            identifier: qa
            name: QA
            type: Deployment
            spec:
              deploymentType: Kubernetes
              execution:
                steps: []
"#;

    #[test]
    fn parses_nested_document() {
        let doc = from_yaml(SAMPLE).unwrap();
        assert_eq!(doc.identifier(), "payments");
        assert_eq!(doc.stage_ids(), vec!["build", "qa"]);
        assert_eq!(doc.stage_of_step("test"), Some("build"));
    }

    #[test]
    fn yaml_and_json_agree() {
        let doc = from_yaml(SAMPLE).unwrap();
        let json = to_json(&doc).unwrap();
        assert_eq!(from_json(&json).unwrap(), doc);
        let yaml = to_yaml(&doc).unwrap();
        assert_eq!(from_yaml(&yaml).unwrap(), doc);
    }

    #[test]
    fn reports_location_of_syntax_errors() {
        let err = from_yaml("pipeline:\n  name: [unclosed\n").unwrap_err();
        assert!(matches!(err, DocumentError::YamlAt { .. } | DocumentError::Yaml(_)));
        assert!(err.to_string().starts_with("invalid pipeline YAML"));
    }

    #[test]
    fn blank_input_is_empty() {
        assert_eq!(from_yaml("  \n").unwrap_err(), DocumentError::Empty);
        assert_eq!(from_json("").unwrap_err(), DocumentError::Empty);
    }
}

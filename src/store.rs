use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, info};

use crate::pipeline::PipelineDocument;
use crate::studio::GitDetails;
use crate::validation::validate_structure;
use crate::yaml::{DocumentError, from_yaml, to_yaml};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("pipeline '{0}' not found")]
    NotFound(String),
    #[error("failed to access pipeline storage at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error(transparent)]
    Document(#[from] DocumentError),
    #[error("pipeline rejected: {}", .0.join("; "))]
    Rejected(Vec<String>),
}

/// Where pipelines are fetched from and saved to.
pub trait PipelineStore {
    fn fetch(
        &self,
        pipeline_id: &str,
        git_details: Option<&GitDetails>,
    ) -> Result<PipelineDocument, StoreError>;

    fn save(
        &self,
        pipeline_id: &str,
        document: &PipelineDocument,
        git_details: Option<&GitDetails>,
    ) -> Result<(), StoreError>;
}

/// Stores each pipeline as `<root>/[<branch>/]<id>.yaml`.
#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolves the file for a pipeline. Identifiers and branch components
    /// that could leave `root` are rejected.
    pub fn path_for(
        &self,
        pipeline_id: &str,
        git_details: Option<&GitDetails>,
    ) -> Result<PathBuf, StoreError> {
        let mut problems = Vec::new();
        if !is_plain_segment(pipeline_id) {
            problems.push(format!("invalid pipeline identifier '{pipeline_id}'"));
        }
        let branch = git_details.and_then(|git| git.branch.as_deref());
        if let Some(branch) = branch
            && !branch.split('/').all(is_plain_segment)
        {
            problems.push(format!("invalid branch '{branch}'"));
        }
        if !problems.is_empty() {
            return Err(StoreError::Rejected(problems));
        }

        let mut path = self.root.clone();
        if let Some(branch) = branch {
            path.extend(branch.split('/'));
        }
        path.push(format!("{pipeline_id}.yaml"));
        Ok(path)
    }
}

fn is_plain_segment(segment: &str) -> bool {
    !segment.is_empty()
        && !segment.starts_with('.')
        && !segment.contains(['/', '\\', ':', '\0'])
}

impl PipelineStore for FileStore {
    fn fetch(
        &self,
        pipeline_id: &str,
        git_details: Option<&GitDetails>,
    ) -> Result<PipelineDocument, StoreError> {
        let path = self.path_for(pipeline_id, git_details)?;
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                return Err(StoreError::NotFound(pipeline_id.to_string()));
            }
            Err(source) => return Err(StoreError::Io { path, source }),
        };
        debug!(path = %path.display(), "Fetched pipeline");
        Ok(from_yaml(&content)?)
    }

    fn save(
        &self,
        pipeline_id: &str,
        document: &PipelineDocument,
        git_details: Option<&GitDetails>,
    ) -> Result<(), StoreError> {
        let mut problems = Vec::new();
        if document.identifier() != pipeline_id {
            problems.push(format!(
                "document identifier '{}' does not match pipeline '{}'",
                document.identifier(),
                pipeline_id
            ));
        }
        problems.extend(validate_structure(document).errors);
        if !problems.is_empty() {
            return Err(StoreError::Rejected(problems));
        }

        let path = self.path_for(pipeline_id, git_details)?;
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).map_err(|source| StoreError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        let rendered = to_yaml(document)?;
        fs::write(&path, rendered).map_err(|source| StoreError::Io {
            path: path.clone(),
            source,
        })?;
        info!(
            pipeline = pipeline_id,
            path = %path.display(),
            commit_message = git_details.and_then(|git| git.commit_message.as_deref()),
            "Pipeline saved"
        );
        Ok(())
    }
}

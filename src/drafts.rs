use std::fs::{self, File};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::warn;

use crate::pipeline::PipelineDocument;

const DRAFT_SUFFIX: &str = ".draft.yaml";

/// Unsaved editor contents kept for recovery after the editor goes away.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Draft {
    pub pipeline_id: String,
    pub saved_at: DateTime<Utc>,
    pub content_hash: String,
    pub document: PipelineDocument,
}

impl Draft {
    pub fn new(pipeline_id: impl Into<String>, document: PipelineDocument) -> Result<Self> {
        Ok(Self {
            pipeline_id: pipeline_id.into(),
            saved_at: Utc::now(),
            content_hash: content_hash(&document)?,
            document,
        })
    }

    pub fn is_intact(&self) -> bool {
        content_hash(&self.document).is_ok_and(|hash| hash == self.content_hash)
    }
}

pub trait DraftStore {
    fn load(&self, pipeline_id: &str) -> Result<Option<Draft>>;
    fn store(&self, pipeline_id: &str, document: &PipelineDocument) -> Result<()>;
    fn discard(&self, pipeline_id: &str) -> Result<()>;
}

/// Sha256 over the document's JSON form.
pub fn content_hash(document: &PipelineDocument) -> Result<String> {
    let serialized =
        serde_json::to_vec(document).context("Failed to serialize draft for hashing")?;
    let mut hasher = Sha256::new();
    hasher.update(serialized);
    Ok(format!("{:x}", hasher.finalize()))
}

#[derive(Debug, Clone)]
pub struct DraftCache {
    root: PathBuf,
}

impl DraftCache {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn path_for(&self, pipeline_id: &str) -> Result<PathBuf> {
        if pipeline_id.is_empty()
            || pipeline_id.contains(['/', '\\'])
            || pipeline_id.starts_with('.')
        {
            bail!("Invalid pipeline identifier for draft cache: '{pipeline_id}'");
        }
        Ok(self.root.join(format!("{pipeline_id}{DRAFT_SUFFIX}")))
    }

    pub fn list(&self) -> Result<Vec<Draft>> {
        let entries = match fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => {
                return Err(err).with_context(|| {
                    format!("Failed to read draft directory: {}", self.root.display())
                });
            }
        };
        let mut drafts = Vec::new();
        for entry in entries {
            let path = entry?.path();
            let is_draft = path
                .file_name()
                .and_then(|name| name.to_str())
                .is_some_and(|name| name.ends_with(DRAFT_SUFFIX));
            if !is_draft {
                continue;
            }
            match read_draft(&path) {
                Ok(draft) => drafts.push(draft),
                Err(err) => warn!(path = %path.display(), "Skipping unreadable draft: {err:#}"),
            }
        }
        drafts.sort_by(|a, b| a.pipeline_id.cmp(&b.pipeline_id));
        Ok(drafts)
    }
}

fn read_draft(path: &Path) -> Result<Draft> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read draft: {}", path.display()))?;
    let draft: Draft = serde_yaml::from_str(&content)
        .with_context(|| format!("Failed to parse draft: {}", path.display()))?;
    Ok(draft)
}

impl DraftStore for DraftCache {
    fn load(&self, pipeline_id: &str) -> Result<Option<Draft>> {
        let path = self.path_for(pipeline_id)?;
        if !path.exists() {
            return Ok(None);
        }
        let draft = read_draft(&path)?;
        if !draft.is_intact() {
            warn!(
                pipeline = pipeline_id,
                path = %path.display(),
                "Draft content hash mismatch; ignoring"
            );
            return Ok(None);
        }
        Ok(Some(draft))
    }

    fn store(&self, pipeline_id: &str, document: &PipelineDocument) -> Result<()> {
        let path = self.path_for(pipeline_id)?;
        fs::create_dir_all(&self.root).with_context(|| {
            format!("Failed to create draft directory: {}", self.root.display())
        })?;
        let draft = Draft::new(pipeline_id, document.clone())?;
        let file = File::create(&path)
            .with_context(|| format!("Failed to create draft: {}", path.display()))?;
        serde_yaml::to_writer(file, &draft)
            .with_context(|| format!("Failed to write draft: {}", path.display()))?;
        Ok(())
    }

    fn discard(&self, pipeline_id: &str) -> Result<()> {
        let path = self.path_for(pipeline_id)?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => {
                Err(err).with_context(|| format!("Failed to remove draft: {}", path.display()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn rejects_path_like_identifiers() {
        let cache = DraftCache::new("/tmp/drafts");
        assert!(cache.path_for("../escape").is_err());
        assert!(cache.path_for("").is_err());
        assert!(cache.path_for("demo").is_ok());
    }

    #[test]
    fn tampered_draft_is_ignored() {
        let temp = tempdir().unwrap();
        let cache = DraftCache::new(temp.path());
        let document = PipelineDocument::new("demo", "Demo");
        cache.store("demo", &document).unwrap();

        let path = temp.path().join("demo.draft.yaml");
        let content = fs::read_to_string(&path).unwrap();
        fs::write(&path, content.replace("name: Demo", "name: Tampered")).unwrap();

        assert!(cache.load("demo").unwrap().is_none());
    }

    #[test]
    fn content_hash_tracks_document() {
        let document = PipelineDocument::new("demo", "Demo");
        let draft = Draft::new("demo", document.clone()).unwrap();
        assert_eq!(draft.content_hash, content_hash(&document).unwrap());
        assert_eq!(draft.content_hash.len(), 64);
        assert!(draft.is_intact());

        let blank = Draft {
            content_hash: String::new(),
            ..draft
        };
        assert!(!blank.is_intact());
    }

    #[test]
    fn discard_missing_draft_is_ok() {
        let temp = tempdir().unwrap();
        let cache = DraftCache::new(temp.path());
        cache.discard("nothing").unwrap();
        assert!(cache.list().unwrap().is_empty());
    }
}

//! Attachment staging for the next outgoing message

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::error::{ChatError, Result};
use crate::model::{new_id, Attachment, ContentRef};

/// File types the composer offers by default
pub static DEFAULT_ACCEPTED_EXTENSIONS: Lazy<Vec<String>> = Lazy::new(|| {
    ["pdf", "doc", "docx", "txt", "rtf", "jpg", "jpeg", "png"]
        .iter()
        .map(|ext| ext.to_string())
        .collect()
});

/// A file handle as delivered by a picker, a paste or a drop
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawFile {
    pub name: String,
    pub byte_size: u64,
    pub mime_type: String,
    pub content: ContentRef,
}

impl RawFile {
    /// In-memory file; the MIME type is guessed from the name
    pub fn from_bytes(name: impl Into<String>, bytes: impl Into<Arc<[u8]>>) -> Self {
        let name = name.into();
        let bytes: Arc<[u8]> = bytes.into();
        Self {
            mime_type: guess_mime_type(&name),
            byte_size: bytes.len() as u64,
            content: ContentRef::Bytes(bytes),
            name,
        }
    }
}

/// Anything that can hand over raw files for staging
pub trait FileSource {
    fn files(&self) -> Result<Vec<RawFile>>;
}

impl FileSource for Vec<RawFile> {
    fn files(&self) -> Result<Vec<RawFile>> {
        Ok(self.clone())
    }
}

/// Files picked by path (command line, `/attach`, or a path dropped onto
/// the terminal)
#[derive(Debug, Clone)]
pub struct PathFileSource {
    paths: Vec<PathBuf>,
    accepted_extensions: Vec<String>,
}

impl PathFileSource {
    pub fn new<I, P>(paths: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        Self {
            paths: paths.into_iter().map(Into::into).collect(),
            accepted_extensions: Vec::new(),
        }
    }

    /// Only accept files with these extensions; an empty list accepts all
    pub fn with_accepted_extensions(mut self, extensions: &[String]) -> Self {
        self.accepted_extensions = extensions.iter().map(|ext| ext.to_lowercase()).collect();
        self
    }

    fn is_accepted(&self, path: &Path) -> bool {
        if self.accepted_extensions.is_empty() {
            return true;
        }
        path.extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| self.accepted_extensions.contains(&ext.to_lowercase()))
            .unwrap_or(false)
    }
}

impl FileSource for PathFileSource {
    fn files(&self) -> Result<Vec<RawFile>> {
        let mut files = Vec::with_capacity(self.paths.len());

        for path in &self.paths {
            let metadata = std::fs::metadata(path).map_err(|e| ChatError::io(path, e))?;
            if !metadata.is_file() {
                return Err(ChatError::io(
                    path,
                    std::io::Error::new(std::io::ErrorKind::InvalidInput, "not a regular file"),
                ));
            }

            if !self.is_accepted(path) {
                warn!(path = %path.display(), "Skipping file with unsupported extension");
                continue;
            }

            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| path.display().to_string());
            let resolved = path.canonicalize().unwrap_or_else(|_| path.clone());

            files.push(RawFile {
                mime_type: guess_mime_type(&name),
                byte_size: metadata.len(),
                content: ContentRef::Path(resolved),
                name,
            });
        }

        Ok(files)
    }
}

fn guess_mime_type(name: &str) -> String {
    mime_guess::from_path(name)
        .first_or_octet_stream()
        .to_string()
}

/// Limits applied to the staged set. `None` means unlimited.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AttachmentPolicy {
    pub max_count: Option<usize>,
    pub max_total_bytes: Option<u64>,
}

/// Holds the attachments staged for the next submission
#[derive(Debug, Clone, Default)]
pub struct AttachmentRegistry {
    staged: Vec<Attachment>,
    policy: AttachmentPolicy,
}

impl AttachmentRegistry {
    pub fn new(policy: AttachmentPolicy) -> Self {
        Self {
            staged: Vec::new(),
            policy,
        }
    }

    /// Stage a batch of files. The batch is staged whole or not at all.
    pub fn stage(&mut self, files: Vec<RawFile>) -> Result<Vec<Attachment>> {
        self.check_policy(&files)?;

        let created: Vec<Attachment> = files
            .into_iter()
            .map(|file| Attachment {
                id: new_id(),
                name: file.name,
                byte_size: file.byte_size,
                mime_type: file.mime_type,
                content_ref: file.content,
            })
            .collect();

        for attachment in &created {
            debug!(id = %attachment.id, name = %attachment.name, size = attachment.byte_size, "Staged attachment");
        }
        self.staged.extend(created.iter().cloned());

        Ok(created)
    }

    /// Stage everything a file source produces
    pub fn stage_from(&mut self, source: &dyn FileSource) -> Result<Vec<Attachment>> {
        let files = source.files()?;
        self.stage(files)
    }

    /// Remove a staged attachment. Unknown ids are ignored.
    pub fn unstage(&mut self, attachment_id: &str) -> Option<Attachment> {
        let index = self.staged.iter().position(|a| a.id == attachment_id)?;
        let removed = self.staged.remove(index);
        debug!(id = %removed.id, name = %removed.name, "Unstaged attachment");
        Some(removed)
    }

    /// Hand over the staged set and start again from empty
    pub fn drain(&mut self) -> Vec<Attachment> {
        std::mem::take(&mut self.staged)
    }

    pub fn staged(&self) -> &[Attachment] {
        &self.staged
    }

    pub fn len(&self) -> usize {
        self.staged.len()
    }

    pub fn is_empty(&self) -> bool {
        self.staged.is_empty()
    }

    pub fn total_bytes(&self) -> u64 {
        self.staged.iter().map(|a| a.byte_size).sum()
    }

    pub fn policy(&self) -> &AttachmentPolicy {
        &self.policy
    }

    fn check_policy(&self, incoming: &[RawFile]) -> Result<()> {
        if let Some(max_count) = self.policy.max_count {
            let count = self.staged.len() + incoming.len();
            if count > max_count {
                return Err(ChatError::AttachmentLimit {
                    reason: format!("{} files staged, at most {} allowed", count, max_count),
                });
            }
        }

        if let Some(max_bytes) = self.policy.max_total_bytes {
            let total = self.total_bytes() + incoming.iter().map(|f| f.byte_size).sum::<u64>();
            if total > max_bytes {
                return Err(ChatError::AttachmentLimit {
                    reason: format!("{} bytes staged, at most {} allowed", total, max_bytes),
                });
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn raw(name: &str, size: usize) -> RawFile {
        RawFile::from_bytes(name, vec![0u8; size])
    }

    #[test]
    fn stage_appends_and_returns_new_attachments() {
        let mut registry = AttachmentRegistry::default();
        let first = registry.stage(vec![raw("a.pdf", 3)]).unwrap();
        let second = registry.stage(vec![raw("b.png", 4), raw("c.txt", 5)]).unwrap();

        assert_eq!(first.len(), 1);
        assert_eq!(second.len(), 2);
        assert_eq!(registry.len(), 3);
        assert_eq!(registry.total_bytes(), 12);
        assert_eq!(registry.staged()[1].mime_type, "image/png");
        assert_ne!(first[0].id, second[0].id);
    }

    #[test]
    fn unstage_unknown_id_is_a_no_op() {
        let mut registry = AttachmentRegistry::default();
        registry.stage(vec![raw("a.pdf", 3)]).unwrap();

        assert!(registry.unstage("missing").is_none());
        assert_eq!(registry.len(), 1);

        let id = registry.staged()[0].id.clone();
        assert_eq!(registry.unstage(&id).map(|a| a.name), Some("a.pdf".to_string()));
        assert!(registry.is_empty());
    }

    #[test]
    fn drain_resets_the_staged_set() {
        let mut registry = AttachmentRegistry::default();
        registry.stage(vec![raw("a.pdf", 3), raw("b.pdf", 3)]).unwrap();

        let drained = registry.drain();
        assert_eq!(drained.len(), 2);
        assert!(registry.is_empty());

        registry.stage(vec![raw("c.pdf", 1)]).unwrap();
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.staged()[0].name, "c.pdf");
    }

    #[test]
    fn count_limit_rejects_whole_batch() {
        let mut registry = AttachmentRegistry::new(AttachmentPolicy {
            max_count: Some(2),
            max_total_bytes: None,
        });
        registry.stage(vec![raw("a.pdf", 1)]).unwrap();

        let err = registry
            .stage(vec![raw("b.pdf", 1), raw("c.pdf", 1)])
            .unwrap_err();
        assert!(matches!(err, ChatError::AttachmentLimit { .. }));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn byte_limit_counts_already_staged_files() {
        let mut registry = AttachmentRegistry::new(AttachmentPolicy {
            max_count: None,
            max_total_bytes: Some(10),
        });
        registry.stage(vec![raw("a.pdf", 8)]).unwrap();

        assert!(registry.stage(vec![raw("b.pdf", 3)]).is_err());
        assert!(registry.stage(vec![raw("b.pdf", 2)]).is_ok());
    }

    #[test]
    fn path_source_reads_metadata_and_guesses_mime() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lease.pdf");
        std::fs::File::create(&path)
            .unwrap()
            .write_all(b"%PDF-1.4 test")
            .unwrap();

        let files = PathFileSource::new([&path]).files().unwrap();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].name, "lease.pdf");
        assert_eq!(files[0].byte_size, 13);
        assert_eq!(files[0].mime_type, "application/pdf");
    }

    #[test]
    fn path_source_skips_unaccepted_extensions() {
        let dir = tempfile::tempdir().unwrap();
        let accepted = dir.path().join("notes.txt");
        let rejected = dir.path().join("script.sh");
        std::fs::write(&accepted, "hello").unwrap();
        std::fs::write(&rejected, "echo hi").unwrap();

        let files = PathFileSource::new([&accepted, &rejected])
            .with_accepted_extensions(&DEFAULT_ACCEPTED_EXTENSIONS)
            .files()
            .unwrap();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].name, "notes.txt");
    }

    #[test]
    fn path_source_reports_missing_files() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing.pdf");

        let err = PathFileSource::new([&missing]).files().unwrap_err();
        assert!(matches!(err, ChatError::Io { .. }));
    }

    #[test]
    fn stage_from_source_uses_registry_policy() {
        let mut registry = AttachmentRegistry::new(AttachmentPolicy {
            max_count: Some(1),
            max_total_bytes: None,
        });
        let source = vec![raw("a.pdf", 1), raw("b.pdf", 1)];
        assert!(registry.stage_from(&source).is_err());
        assert!(registry.is_empty());
    }
}

//! # The Reaper: Job Acceptance
//!
//! Applies a job to the real document: execute against the open text,
//! replace, move the cursor, retire. The remaining jobs of the file are then
//! reconciled with the patched text, and the document is saved last. Once
//! the replace went through the job is retired, whether or not the save
//! succeeds.

pub mod workspace;

pub use workspace::{DiskWorkspace, WorkspaceError};

use async_trait::async_trait;
use common::{FileIdentity, JobHash, Position, Range};
use registry::{ChangeReport, Job, JobOutput, JobRegistry, RegistryError};
use tracing::{info, warn};

/// Errors from the accept command.
#[derive(Debug, thiserror::Error)]
pub enum AcceptError {
    #[error("job {0} not found")]
    JobNotFound(JobHash),
    #[error("no open document for {0}")]
    NoOpenDocument(FileIdentity),
    #[error(transparent)]
    Registry(#[from] RegistryError),
    #[error("editor host failed: {0:#}")]
    Host(anyhow::Error),
    /// The edit is in the document and the job is retired; only the save
    /// failed.
    #[error("job {} applied but not saved: {error:#}", .accepted.job.hash)]
    NotSaved {
        accepted: Box<Accepted>,
        error: anyhow::Error,
    },
}

/// The editor side of the accept command.
#[async_trait(?Send)]
pub trait EditorHost {
    /// Text of the open document for `file`; `None` when it is not open.
    fn document_text(&self, file: &FileIdentity) -> Option<String>;

    async fn replace(&self, file: &FileIdentity, range: Range, text: &str) -> anyhow::Result<()>;

    async fn save(&self, file: &FileIdentity) -> anyhow::Result<()>;

    fn set_cursor(&self, file: &FileIdentity, position: Position);
}

/// Outcome of a successful [`accept`].
#[derive(Debug)]
pub struct Accepted {
    pub job: Job,
    pub output: JobOutput,
    /// What happened to the file's other jobs once the text changed.
    pub siblings: ChangeReport,
}

/// Accepts the job `hash` into the open document.
///
/// # Errors
/// - `AcceptError::JobNotFound` if the job is not active
/// - `AcceptError::NoOpenDocument` if no open document matches the job's file
/// - `AcceptError::Registry` if execution fails (stale or out-of-range job)
/// - `AcceptError::Host` if the editor cannot apply the edit
/// - `AcceptError::NotSaved` if the edit was applied but saving failed
pub async fn accept(
    registry: &JobRegistry,
    host: &dyn EditorHost,
    hash: &JobHash,
    save_on_accept: bool,
) -> Result<Accepted, AcceptError> {
    let job = registry.job(hash).ok_or(AcceptError::JobNotFound(*hash))?;
    let text = host
        .document_text(&job.file)
        .ok_or_else(|| AcceptError::NoOpenDocument(job.file.clone()))?;
    let output = registry.execute(hash, &text)?;

    host.replace(&job.file, output.range, &output.text)
        .await
        .map_err(AcceptError::Host)?;
    host.set_cursor(&job.file, output.position);

    let job = match registry.retire(hash) {
        Ok(job) => job,
        Err(RegistryError::JobNotFound(h)) => return Err(AcceptError::JobNotFound(h)),
        Err(e) => return Err(e.into()),
    };
    info!(job = %hash, file = %job.file, "job accepted");

    let siblings = match host.document_text(&job.file) {
        Some(patched) => registry.on_external_file_changed(&job.file, &patched)?,
        None => ChangeReport::default(),
    };
    let accepted = Accepted {
        job,
        output,
        siblings,
    };

    if save_on_accept {
        if let Err(error) = host.save(&accepted.job.file).await {
            warn!(job = %hash, file = %accepted.job.file, error = %error, "accepted job not saved");
            return Err(AcceptError::NotSaved {
                accepted: Box::new(accepted),
                error,
            });
        }
    }
    Ok(accepted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use anatomist::RepairPass;
    use bus::MessageBus;
    use std::fs;
    use std::rc::Rc;

    const TEXT: &str = "let a = 1;  \nlet b = 2;\t\n";

    fn registry() -> JobRegistry {
        let registry = JobRegistry::new(Rc::new(MessageBus::new()));
        registry.register_pass(Rc::new(RepairPass::new()));
        registry
    }

    #[tokio::test(flavor = "current_thread")]
    async fn test_accept_patches_saves_and_retires() {
        let tmp = tempfile::tempdir().unwrap();
        fs::write(tmp.path().join("a.ts"), TEXT).unwrap();
        let workspace = DiskWorkspace::new(tmp.path()).unwrap();
        let file = FileIdentity::new("a.ts");
        let registry = registry();

        let text = workspace.open_document(&file).await.unwrap();
        let hashes = registry.analyze(&file, &text).unwrap();
        assert_eq!(hashes.len(), 2);

        let accepted = accept(&registry, &workspace, &hashes[0], true).await.unwrap();
        assert_eq!(accepted.job.hash, hashes[0]);
        assert_eq!(accepted.siblings.refreshed, vec![hashes[1]]);

        let on_disk = fs::read_to_string(tmp.path().join("a.ts")).unwrap();
        assert_eq!(on_disk, "let a = 1;\nlet b = 2;\t\n");
        assert_eq!(workspace.cursor(&file), Some(Position::new(0, 10)));
        assert!(registry.job(&hashes[0]).is_none());
        assert!(!registry.is_rejected(&hashes[0]));

        // The sibling still applies to the patched text.
        accept(&registry, &workspace, &hashes[1], false).await.unwrap();
        assert_eq!(workspace.document_text(&file).unwrap(), "let a = 1;\nlet b = 2;\n");
        assert!(registry.is_empty());
    }

    #[tokio::test(flavor = "current_thread")]
    async fn test_accept_without_save_leaves_disk_alone() {
        let tmp = tempfile::tempdir().unwrap();
        fs::write(tmp.path().join("a.ts"), TEXT).unwrap();
        let workspace = DiskWorkspace::new(tmp.path()).unwrap();
        let file = FileIdentity::new("a.ts");
        let registry = registry();

        let text = workspace.open_document(&file).await.unwrap();
        let hashes = registry.analyze(&file, &text).unwrap();
        accept(&registry, &workspace, &hashes[0], false).await.unwrap();

        assert_eq!(fs::read_to_string(tmp.path().join("a.ts")).unwrap(), TEXT);
        assert!(workspace.is_dirty(&file));
    }

    /// Disk workspace whose saves always fail.
    struct FullDisk(DiskWorkspace);

    #[async_trait(?Send)]
    impl EditorHost for FullDisk {
        fn document_text(&self, file: &FileIdentity) -> Option<String> {
            self.0.document_text(file)
        }

        async fn replace(&self, file: &FileIdentity, range: Range, text: &str) -> anyhow::Result<()> {
            self.0.replace(file, range, text).await
        }

        async fn save(&self, _file: &FileIdentity) -> anyhow::Result<()> {
            anyhow::bail!("disk full")
        }

        fn set_cursor(&self, file: &FileIdentity, position: Position) {
            self.0.set_cursor(file, position)
        }
    }

    #[tokio::test(flavor = "current_thread")]
    async fn test_failed_save_still_retires() {
        let tmp = tempfile::tempdir().unwrap();
        fs::write(tmp.path().join("a.ts"), TEXT).unwrap();
        let host = FullDisk(DiskWorkspace::new(tmp.path()).unwrap());
        let file = FileIdentity::new("a.ts");
        let registry = registry();

        let text = host.0.open_document(&file).await.unwrap();
        let hashes = registry.analyze(&file, &text).unwrap();

        let err = accept(&registry, &host, &hashes[0], true).await.unwrap_err();
        let (accepted, error) = match err {
            AcceptError::NotSaved { accepted, error } => (accepted, error),
            other => panic!("unexpected error {other:?}"),
        };
        assert_eq!(accepted.job.hash, hashes[0]);
        assert_eq!(accepted.siblings.refreshed, vec![hashes[1]]);
        assert_eq!(error.to_string(), "disk full");

        assert_eq!(host.document_text(&file).unwrap(), "let a = 1;\nlet b = 2;\t\n");
        assert_eq!(fs::read_to_string(tmp.path().join("a.ts")).unwrap(), TEXT);
        assert!(registry.job(&hashes[0]).is_none());

        let again = accept(&registry, &host, &hashes[0], true).await.unwrap_err();
        assert!(matches!(again, AcceptError::JobNotFound(_)));
    }

    #[tokio::test(flavor = "current_thread")]
    async fn test_accept_failures() {
        let tmp = tempfile::tempdir().unwrap();
        let workspace = DiskWorkspace::new(tmp.path()).unwrap();
        let file = FileIdentity::new("a.ts");
        let registry = registry();
        let hashes = registry.analyze(&file, TEXT).unwrap();

        let err = accept(&registry, &workspace, &hashes[0], false).await.unwrap_err();
        assert!(matches!(err, AcceptError::NoOpenDocument(_)));

        registry.reject(&hashes[0]).unwrap();
        let err = accept(&registry, &workspace, &hashes[0], false).await.unwrap_err();
        assert!(matches!(err, AcceptError::JobNotFound(_)));
    }
}

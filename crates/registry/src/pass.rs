//! Analysis pass seam.
//!
//! A pass decides *what* to change (`analyze`) and knows how to carry out
//! the edits it proposed (`execute`). The registry stores what `analyze`
//! returns and calls back into `execute` when a job's output is needed.

use crate::job::{Job, JobOutput, Proposal};
use common::{FileIdentity, JobKind, TranslateError};

#[derive(Debug, thiserror::Error)]
pub enum PassError {
    /// The text no longer matches the checksum the job was derived from.
    #[error("text checksum {actual} does not match basis {expected}")]
    Stale { expected: String, actual: String },
    #[error("range does not fit the current text: {0}")]
    InvalidRange(#[from] TranslateError),
    #[error("payload does not belong to a {0} pass")]
    PayloadMismatch(JobKind),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub trait AnalysisPass {
    /// The job kind this pass proposes and executes.
    fn kind(&self) -> JobKind;

    fn name(&self) -> &str;

    fn analyze(&self, file: &FileIdentity, text: &str) -> Result<Vec<Proposal>, PassError>;

    fn execute(&self, job: &Job, text: &str) -> Result<JobOutput, PassError>;
}

/// Fails with [`PassError::Stale`] unless `text` hashes to `basis`.
pub fn ensure_basis(basis: &str, text: &str) -> Result<(), PassError> {
    let actual = forge::content_checksum(text);
    if actual == basis {
        Ok(())
    } else {
        Err(PassError::Stale {
            expected: basis.to_string(),
            actual,
        })
    }
}

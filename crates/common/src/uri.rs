//! Synthetic URIs exposed by the virtual filesystem.
//!
//! - `jobs://jobs/<jobHash>.<ext>`: a job's proposed output.
//! - `jobs://files/<fileHash>.<ext>`: read-only mirror of the original file,
//!   the left side of a diff view.

use crate::{FileHash, JobHash};
use std::fmt;
use std::str::FromStr;

pub const SCHEME: &str = "jobs";

const JOBS_AUTHORITY: &str = "jobs";
const FILES_AUTHORITY: &str = "files";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UriError {
    #[error("unsupported scheme in `{0}`")]
    Scheme(String),
    #[error("unknown authority in `{0}`")]
    Authority(String),
    #[error("malformed digest in `{0}`")]
    Digest(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ShadowUri {
    Job { hash: JobHash, extension: String },
    File { hash: FileHash, extension: String },
}

impl ShadowUri {
    pub fn job(hash: JobHash, extension: impl Into<String>) -> Self {
        ShadowUri::Job {
            hash,
            extension: extension.into(),
        }
    }

    pub fn file(hash: FileHash, extension: impl Into<String>) -> Self {
        ShadowUri::File {
            hash,
            extension: extension.into(),
        }
    }

    pub fn job_hash(&self) -> Option<JobHash> {
        match self {
            ShadowUri::Job { hash, .. } => Some(*hash),
            ShadowUri::File { .. } => None,
        }
    }

    pub fn file_hash(&self) -> Option<FileHash> {
        match self {
            ShadowUri::File { hash, .. } => Some(*hash),
            ShadowUri::Job { .. } => None,
        }
    }

    pub fn extension(&self) -> &str {
        match self {
            ShadowUri::Job { extension, .. } | ShadowUri::File { extension, .. } => extension,
        }
    }
}

impl fmt::Display for ShadowUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (authority, hex) = match self {
            ShadowUri::Job { hash, .. } => (JOBS_AUTHORITY, hash.to_hex()),
            ShadowUri::File { hash, .. } => (FILES_AUTHORITY, hash.to_hex()),
        };
        write!(f, "{SCHEME}://{authority}/{hex}")?;
        match self.extension() {
            "" => Ok(()),
            ext => write!(f, ".{ext}"),
        }
    }
}

impl FromStr for ShadowUri {
    type Err = UriError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let rest = s
            .strip_prefix(SCHEME)
            .and_then(|r| r.strip_prefix("://"))
            .ok_or_else(|| UriError::Scheme(s.to_string()))?;
        let (authority, name) = rest
            .split_once('/')
            .ok_or_else(|| UriError::Authority(s.to_string()))?;
        let (hex, extension) = name.split_once('.').unwrap_or((name, ""));
        let digest_err = |_| UriError::Digest(s.to_string());
        match authority {
            JOBS_AUTHORITY => Ok(ShadowUri::job(hex.parse().map_err(digest_err)?, extension)),
            FILES_AUTHORITY => Ok(ShadowUri::file(hex.parse().map_err(digest_err)?, extension)),
            _ => Err(UriError::Authority(s.to_string())),
        }
    }
}

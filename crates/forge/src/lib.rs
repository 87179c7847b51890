//! # The Forge: Job Identity Engine
//!
//! Computes the deterministic identity of a proposed edit. A job hash is a
//! keyed BLAKE3 digest over the job kind, the file identity, and the edit
//! parameters, in that order:
//!
//! ```text
//! job_hash = BLAKE3-derive-key(JOB_CONTEXT,
//!              kind_tag ‖ len(file) ‖ file ‖ (len(param) ‖ param)*)
//! ```
//!
//! Every variable-length field is length-prefixed (u64 LE), so `("ab", "c")`
//! and `("a", "bc")` never collide. Nothing process-local (addresses, random
//! state, counters) feeds the digest, which makes re-analysis of an
//! unchanged file reproduce the same hashes across restarts.
//!
//! ## Example
//! ```
//! use common::{FileIdentity, JobKind};
//! use forge::JobHasher;
//!
//! let file = FileIdentity::new("src/a.ts");
//! let a = JobHasher::new(JobKind::ReorderDeclarations, &file).str("foo").usize(2).finish();
//! let b = JobHasher::new(JobKind::ReorderDeclarations, &file).str("foo").usize(2).finish();
//! assert_eq!(a, b);
//! ```

use common::{FileHash, FileIdentity, JobHash, JobKind, Position, Range};

const JOB_CONTEXT: &str = "jobs workspace 2024-06 job identity v1";
const FILE_CONTEXT: &str = "jobs workspace 2024-06 file identity v1";

/// Incremental builder for a [`JobHash`].
pub struct JobHasher {
    hasher: blake3::Hasher,
}

impl JobHasher {
    pub fn new(kind: JobKind, file: &FileIdentity) -> Self {
        let mut hasher = blake3::Hasher::new_derive_key(JOB_CONTEXT);
        hasher.update(&[kind.tag()]);
        Self { hasher }.str(file.as_str())
    }

    /// Hashes a length-prefixed UTF-8 string.
    pub fn str(mut self, value: &str) -> Self {
        self.hasher.update(&(value.len() as u64).to_le_bytes());
        self.hasher.update(value.as_bytes());
        self
    }

    pub fn usize(mut self, value: usize) -> Self {
        self.hasher.update(&(value as u64).to_le_bytes());
        self
    }

    pub fn position(self, pos: Position) -> Self {
        self.usize(pos.line).usize(pos.column)
    }

    pub fn range(self, range: Range) -> Self {
        self.position(range.start).position(range.end)
    }

    pub fn finish(self) -> JobHash {
        JobHash::from(self.hasher.finalize())
    }
}

/// Key of the file record for `file`.
pub fn file_hash(file: &FileIdentity) -> FileHash {
    let mut hasher = blake3::Hasher::new_derive_key(FILE_CONTEXT);
    hasher.update(file.as_str().as_bytes());
    FileHash::from(hasher.finalize())
}

/// BLAKE3 checksum (hex) of a text blob; the basis a job was derived from.
pub fn content_checksum(text: &str) -> String {
    blake3::hash(text.as_bytes()).to_hex().to_string()
}

//! Job records and the proposals analysis passes emit.

use common::{FileIdentity, JobHash, JobKind, Position, Range, ShadowUri};
use forge::JobHasher;
use serde::{Deserialize, Serialize};

/// Data needed to execute a reorder: where every top-level declaration sits
/// and which one moves in front of which.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReorderPayload {
    /// Checksum of the text the declarations were found in.
    pub basis: String,
    /// Declaration spans in source order. `end` is the position just past
    /// the declaration's last character.
    pub declarations: Vec<Range>,
    pub from: usize,
    pub to: usize,
    pub moved: String,
    pub anchor: String,
}

/// A range replacement produced by a repair engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepairPayload {
    pub basis: String,
    /// Span replaced by `replacement` (end exclusive).
    pub edit: Range,
    pub replacement: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum JobPayload {
    Reorder(ReorderPayload),
    Repair(RepairPayload),
}

impl JobPayload {
    pub fn kind(&self) -> JobKind {
        match self {
            JobPayload::Reorder(_) => JobKind::ReorderDeclarations,
            JobPayload::Repair(_) => JobKind::RepairCode,
        }
    }

    /// Checksum of the text this payload was derived from.
    pub fn basis(&self) -> &str {
        match self {
            JobPayload::Reorder(p) => &p.basis,
            JobPayload::Repair(p) => &p.basis,
        }
    }

    /// Feeds the defining edit parameters into `hasher`.
    ///
    /// The basis checksum and declaration spans are facts about the current
    /// text and stay out of the identity.
    fn identify(&self, hasher: JobHasher) -> JobHasher {
        match self {
            JobPayload::Reorder(p) => hasher
                .str(&p.moved)
                .str(&p.anchor)
                .usize(p.from)
                .usize(p.to),
            JobPayload::Repair(p) => hasher.range(p.edit).str(&p.replacement),
        }
    }
}

/// An edit proposed by an analysis pass, not yet registered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Proposal {
    pub file: FileIdentity,
    /// Span the job annotates; drives lookup-by-range.
    pub range: Range,
    pub title: String,
    pub payload: JobPayload,
}

impl Proposal {
    pub fn kind(&self) -> JobKind {
        self.payload.kind()
    }

    pub fn hash(&self) -> JobHash {
        self.payload
            .identify(JobHasher::new(self.kind(), &self.file))
            .finish()
    }
}

/// One proposed, not-yet-applied edit. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Job {
    pub hash: JobHash,
    pub file: FileIdentity,
    pub kind: JobKind,
    pub range: Range,
    pub title: String,
    pub payload: JobPayload,
}

impl Job {
    pub fn uri(&self) -> ShadowUri {
        ShadowUri::job(self.hash, self.file.extension().unwrap_or_default())
    }
}

impl From<Proposal> for Job {
    fn from(proposal: Proposal) -> Self {
        Job {
            hash: proposal.hash(),
            kind: proposal.kind(),
            file: proposal.file,
            range: proposal.range,
            title: proposal.title,
            payload: proposal.payload,
        }
    }
}

/// Result of executing a job against the current text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobOutput {
    /// Full replacement text for `range`.
    pub text: String,
    /// Range of the current text that `text` replaces.
    pub range: Range,
    /// Suggested cursor position after the replacement.
    pub position: Position,
}

//! Trailing-whitespace repair: one job per offending line.

use crate::declarations::split_lines;
use common::position::char_to_byte;
use common::{FileIdentity, JobKind, LineIndex, Position, Range};
use registry::{ensure_basis, AnalysisPass, Job, JobOutput, JobPayload, PassError, Proposal, RepairPayload};

pub const TITLE: &str = "Remove trailing whitespace";

#[derive(Debug, Default)]
pub struct RepairPass;

impl RepairPass {
    pub fn new() -> Self {
        Self
    }
}

/// Replaces the chars `start..end` of `text` with `replacement`.
pub(crate) fn splice(text: &str, start: usize, end: usize, replacement: &str) -> Option<String> {
    let (start, end) = (char_to_byte(text, start)?, char_to_byte(text, end)?);
    let mut out = String::with_capacity(text.len() - (end - start) + replacement.len());
    out.push_str(&text[..start]);
    out.push_str(replacement);
    out.push_str(&text[end..]);
    Some(out)
}

impl AnalysisPass for RepairPass {
    fn kind(&self) -> JobKind {
        JobKind::RepairCode
    }

    fn name(&self) -> &str {
        "repair"
    }

    fn analyze(&self, file: &FileIdentity, text: &str) -> Result<Vec<Proposal>, PassError> {
        let basis = forge::content_checksum(text);
        let (_, lines) = split_lines(text);
        Ok(lines
            .iter()
            .enumerate()
            .filter_map(|(n, line)| {
                let len = line.chars().count();
                let kept = line.trim_end_matches([' ', '\t']).chars().count();
                (kept < len).then(|| {
                    let edit = Range::new(Position::new(n, kept), Position::new(n, len));
                    Proposal {
                        file: file.clone(),
                        range: edit,
                        title: TITLE.to_string(),
                        payload: JobPayload::Repair(RepairPayload {
                            basis: basis.clone(),
                            edit,
                            replacement: String::new(),
                        }),
                    }
                })
            })
            .collect())
    }

    fn execute(&self, job: &Job, text: &str) -> Result<JobOutput, PassError> {
        let JobPayload::Repair(p) = &job.payload else {
            return Err(PassError::PayloadMismatch(self.kind()));
        };
        ensure_basis(&p.basis, text)?;

        let index = LineIndex::new(text);
        let start = index.position_to_offset(p.edit.start)?;
        let end = index.position_to_offset(p.edit.end)?;
        let text = splice(text, start, end, &p.replacement).ok_or_else(|| {
            PassError::Other(anyhow::anyhow!("edit {start}..{end} splits a character"))
        })?;

        Ok(JobOutput {
            text,
            range: index.full_range(),
            position: p.edit.start,
        })
    }
}

//! Declaration reordering.
//!
//! A declaration that is mentioned by an earlier declaration's body is
//! proposed to move in front of the earliest such declaration. Mentions are
//! found with one Aho-Corasick automaton over all declaration names, checked
//! for whole-word boundaries.

use crate::declarations::{self, is_ident_char, Declaration};
use aho_corasick::AhoCorasick;
use common::{FileIdentity, JobKind, LineIndex, Position};
use registry::{ensure_basis, AnalysisPass, Job, JobOutput, JobPayload, PassError, Proposal, ReorderPayload};
use std::collections::HashSet;

#[derive(Debug, Default)]
pub struct ReorderPass;

impl ReorderPass {
    pub fn new() -> Self {
        Self
    }
}

/// For every declaration, the set of declaration indices its body mentions.
fn mentions(decls: &[Declaration], lines: &[&str]) -> Result<Vec<HashSet<usize>>, PassError> {
    let names: Vec<&str> = decls.iter().map(|d| d.name.as_str()).collect();
    let automaton = AhoCorasick::new(&names)
        .map_err(|e| PassError::Other(anyhow::anyhow!("automaton build failed: {e}")))?;

    Ok(decls
        .iter()
        .map(|decl| {
            let body = lines[decl.first_line()..=decl.last_line()].join("\n");
            let mut found = HashSet::new();
            for m in automaton.find_overlapping_iter(&body) {
                let before = body[..m.start()].chars().next_back();
                let after = body[m.end()..].chars().next();
                if before.is_some_and(is_ident_char) || after.is_some_and(is_ident_char) {
                    continue;
                }
                let name = names[m.pattern().as_usize()];
                // Every declaration with that name, duplicates included.
                found.extend(
                    names
                        .iter()
                        .enumerate()
                        .filter(|(_, n)| **n == name)
                        .map(|(k, _)| k),
                );
            }
            found
        })
        .collect())
}

impl AnalysisPass for ReorderPass {
    fn kind(&self) -> JobKind {
        JobKind::ReorderDeclarations
    }

    fn name(&self) -> &str {
        "reorder"
    }

    fn analyze(&self, file: &FileIdentity, text: &str) -> Result<Vec<Proposal>, PassError> {
        let decls = declarations::scan(text);
        if decls.len() < 2 {
            return Ok(Vec::new());
        }
        let (_, lines) = declarations::split_lines(text);
        let mentions = mentions(&decls, &lines)?;
        let basis = forge::content_checksum(text);
        let spans: Vec<_> = decls.iter().map(|d| d.range).collect();

        let mut proposals = Vec::new();
        for (j, moved) in decls.iter().enumerate().skip(1) {
            let Some(i) = (0..j).find(|&i| decls[i].name != moved.name && mentions[i].contains(&j))
            else {
                continue;
            };
            let anchor = &decls[i];
            proposals.push(Proposal {
                file: file.clone(),
                range: moved.range,
                title: format!("Move {} before {}", moved.name, anchor.name),
                payload: JobPayload::Reorder(ReorderPayload {
                    basis: basis.clone(),
                    declarations: spans.clone(),
                    from: j,
                    to: i,
                    moved: moved.name.clone(),
                    anchor: anchor.name.clone(),
                }),
            });
        }
        Ok(proposals)
    }

    /// Rebuilds the whole text with declaration `from` placed in front of
    /// declaration `to`. The blank lines that preceded the moved declaration
    /// travel with it; every other line keeps its content.
    fn execute(&self, job: &Job, text: &str) -> Result<JobOutput, PassError> {
        let JobPayload::Reorder(p) = &job.payload else {
            return Err(PassError::PayloadMismatch(self.kind()));
        };
        ensure_basis(&p.basis, text)?;

        let index = LineIndex::new(text);
        for span in &p.declarations {
            index.position_to_offset(span.start)?;
            index.position_to_offset(span.end)?;
        }
        let (Some(target), Some(moved), Some(previous)) = (
            p.declarations.get(p.to),
            p.declarations.get(p.from),
            p.from.checked_sub(1).and_then(|k| p.declarations.get(k)),
        ) else {
            return Err(PassError::Other(anyhow::anyhow!(
                "declaration index out of range: move {} before {}",
                p.from,
                p.to
            )));
        };
        if p.to >= p.from {
            return Err(PassError::Other(anyhow::anyhow!(
                "declaration {} does not precede {}",
                p.to,
                p.from
            )));
        }

        let (separator, lines) = declarations::split_lines(text);
        let (to, gap, from, last) = (
            target.start.line,
            previous.end.line + 1,
            moved.start.line,
            moved.end.line,
        );
        let reordered: Vec<&str> = lines[..to]
            .iter()
            .chain(&lines[from..=last])
            .chain(&lines[gap..from])
            .chain(&lines[to..gap])
            .chain(&lines[last + 1..])
            .copied()
            .collect();

        Ok(JobOutput {
            text: reordered.join(separator.as_str()),
            range: index.full_range(),
            position: Position::new(to, 0),
        })
    }
}

//! # The Registry: Job Ledger
//!
//! Owns every proposed edit in a session. Jobs come in through
//! [`JobRegistry::ingest_jobs`] (directly, or via [`JobRegistry::analyze`]
//! which runs the registered passes first) and leave through exactly one of
//! three doors:
//!
//! - **reject**: the hash is remembered and never ingested again.
//! - **retire**: the job was accepted and applied; its cached output goes.
//! - **invalidate**: the text moved on and the job no longer applies.
//!
//! The registry never talks to the virtual filesystem or the diagnostics
//! collection directly; every side effect is a [`Message`] on the bus,
//! published after the state borrow is released.

pub mod diagnostics;
pub mod host;
pub mod intake;
pub mod job;
pub mod materialize;
pub mod pass;

pub use diagnostics::{Diagnostic, DiagnosticsCollection, Severity};
pub use host::DocumentHost;
pub use job::{Job, JobOutput, JobPayload, Proposal, RepairPayload, ReorderPayload};
pub use materialize::Materializer;
pub use pass::{ensure_basis, AnalysisPass, PassError};

use bus::{Message, MessageBus};
use common::{FileHash, FileIdentity, JobHash, JobKind, Permission, Position, TranslateError};
use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::rc::Rc;
use tracing::{debug, info, warn};

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("job {0} not found")]
    JobNotFound(JobHash),
    #[error("file {0} is not registered")]
    FileNotRegistered(FileIdentity),
    #[error("proposal for {found} cannot be ingested under {expected}")]
    FileMismatch {
        expected: FileIdentity,
        found: FileIdentity,
    },
    #[error("no analysis pass registered for {0}")]
    NoPassForKind(JobKind),
    #[error("range of job {hash} no longer fits the text: {source}")]
    InvalidRange {
        hash: JobHash,
        source: TranslateError,
    },
    #[error("job {hash} was derived from different text")]
    StaleJob { hash: JobHash },
    #[error("analysis pass failed: {0}")]
    Pass(#[from] PassError),
}

/// What [`JobRegistry::on_external_file_changed`] did to the file's jobs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeReport {
    /// Re-proposed under the same hash; record replaced, cached output dropped.
    pub refreshed: Vec<JobHash>,
    /// No longer proposed; removed.
    pub invalidated: Vec<JobHash>,
    /// Proposed for the first time by the re-run.
    pub added: Vec<JobHash>,
}

impl ChangeReport {
    pub fn is_empty(&self) -> bool {
        self.refreshed.is_empty() && self.invalidated.is_empty() && self.added.is_empty()
    }
}

#[derive(Default)]
struct RegistryState {
    files: HashMap<FileHash, FileIdentity>,
    file_jobs: HashMap<FileHash, HashSet<JobHash>>,
    jobs: HashMap<JobHash, Job>,
    rejected: HashSet<JobHash>,
}

impl RegistryState {
    fn take(&mut self, hash: &JobHash) -> Option<Job> {
        let job = self.jobs.remove(hash)?;
        if let Some(set) = self.file_jobs.get_mut(&forge::file_hash(&job.file)) {
            set.remove(hash);
        }
        Some(job)
    }

    fn insert(&mut self, key: FileHash, job: Job) {
        self.file_jobs.entry(key).or_default().insert(job.hash);
        self.jobs.insert(job.hash, job);
    }

    /// Clones only the jobs of `file` that pass `keep`.
    fn jobs_of(&self, file: &FileIdentity, keep: impl Fn(&Job) -> bool) -> Vec<Job> {
        self.file_jobs
            .get(&forge::file_hash(file))
            .into_iter()
            .flatten()
            .filter_map(|hash| self.jobs.get(hash))
            .filter(|job| keep(*job))
            .cloned()
            .collect()
    }
}

pub struct JobRegistry {
    state: RefCell<RegistryState>,
    passes: RefCell<Vec<Rc<dyn AnalysisPass>>>,
    bus: Rc<MessageBus>,
}

impl JobRegistry {
    pub fn new(bus: Rc<MessageBus>) -> Self {
        Self {
            state: RefCell::new(RegistryState::default()),
            passes: RefCell::new(Vec::new()),
            bus,
        }
    }

    pub fn bus(&self) -> &Rc<MessageBus> {
        &self.bus
    }

    /// Installs `pass`, replacing any pass previously registered for its kind.
    pub fn register_pass(&self, pass: Rc<dyn AnalysisPass>) {
        let mut passes = self.passes.borrow_mut();
        passes.retain(|p| p.kind() != pass.kind());
        debug!(kind = %pass.kind(), pass = pass.name(), "pass registered");
        passes.push(pass);
    }

    fn pass_for(&self, kind: JobKind) -> Option<Rc<dyn AnalysisPass>> {
        self.passes.borrow().iter().find(|p| p.kind() == kind).cloned()
    }

    /// Idempotent; returns the file's key either way.
    pub fn register_file(&self, file: &FileIdentity) -> FileHash {
        let key = forge::file_hash(file);
        self.state
            .borrow_mut()
            .files
            .entry(key)
            .or_insert_with(|| file.clone());
        key
    }

    pub fn file(&self, key: &FileHash) -> Option<FileIdentity> {
        self.state.borrow().files.get(key).cloned()
    }

    pub fn files(&self) -> Vec<FileIdentity> {
        let mut files: Vec<_> = self.state.borrow().files.values().cloned().collect();
        files.sort();
        files
    }

    /// Registers the proposals for `file`.
    ///
    /// Every proposal is validated before anything is stored, so a rejected
    /// batch leaves the registry untouched. Already-active hashes are kept
    /// as they are and rejected hashes are skipped.
    ///
    /// # Returns
    /// Hashes of the jobs active for the proposals, in proposal order and
    /// without duplicates. Rejected proposals are not included.
    pub fn ingest_jobs(
        &self,
        file: &FileIdentity,
        proposals: Vec<Proposal>,
    ) -> Result<Vec<JobHash>, RegistryError> {
        let key = forge::file_hash(file);
        let (active, added) = {
            let mut state = self.state.borrow_mut();
            if !state.files.contains_key(&key) {
                return Err(RegistryError::FileNotRegistered(file.clone()));
            }
            if let Some(p) = proposals.iter().find(|p| &p.file != file) {
                return Err(RegistryError::FileMismatch {
                    expected: file.clone(),
                    found: p.file.clone(),
                });
            }

            let mut active = Vec::new();
            let mut added = 0;
            for proposal in proposals {
                let job = Job::from(proposal);
                if state.rejected.contains(&job.hash) {
                    debug!(job = %job.hash, "skipping rejected job");
                    continue;
                }
                if active.contains(&job.hash) {
                    continue;
                }
                active.push(job.hash);
                if !state.jobs.contains_key(&job.hash) {
                    added += 1;
                    state.insert(key, job);
                }
            }
            (active, added)
        };

        info!(file = %file, active = active.len(), added, "jobs ingested");
        self.bus
            .publish(&Message::DiagnosticsStale { file: file.clone() });
        Ok(active)
    }

    /// Registers `file` and ingests whatever every registered pass proposes
    /// for `text`.
    pub fn analyze(&self, file: &FileIdentity, text: &str) -> Result<Vec<JobHash>, RegistryError> {
        self.register_file(file);
        let passes: Vec<_> = self.passes.borrow().clone();
        let mut proposals = Vec::new();
        for pass in passes {
            let found = pass.analyze(file, text)?;
            debug!(pass = pass.name(), file = %file, proposals = found.len(), "analysis done");
            proposals.extend(found);
        }
        self.ingest_jobs(file, proposals)
    }

    /// Active jobs of `file` whose range contains `position` (both ends
    /// inclusive), ordered by range start then title.
    pub fn lookup_by_range(&self, file: &FileIdentity, position: Position) -> Vec<Job> {
        let mut jobs = self
            .state
            .borrow()
            .jobs_of(file, |job| job.range.contains(position));
        sort_jobs(&mut jobs);
        jobs
    }

    /// Every active job of `file`, ordered like [`Self::lookup_by_range`].
    pub fn jobs_for_file(&self, file: &FileIdentity) -> Vec<Job> {
        let mut jobs = self.state.borrow().jobs_of(file, |_| true);
        sort_jobs(&mut jobs);
        jobs
    }

    pub fn job(&self, hash: &JobHash) -> Option<Job> {
        self.state.borrow().jobs.get(hash).cloned()
    }

    pub fn is_rejected(&self, hash: &JobHash) -> bool {
        self.state.borrow().rejected.contains(hash)
    }

    pub fn len(&self) -> usize {
        self.state.borrow().jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Discards a job for good. Its hash is never ingested again.
    pub fn reject(&self, hash: &JobHash) -> Result<Job, RegistryError> {
        let job = {
            let mut state = self.state.borrow_mut();
            let job = state
                .take(hash)
                .ok_or(RegistryError::JobNotFound(*hash))?;
            state.rejected.insert(*hash);
            job
        };
        info!(job = %hash, title = %job.title, "job rejected");
        self.bus.publish(&Message::ChangePermissions {
            uri: job.uri(),
            permission: Some(Permission::ReadOnly),
        });
        self.bus.publish(&Message::DiagnosticsStale {
            file: job.file.clone(),
        });
        Ok(job)
    }

    /// Removes a job that has been applied and drops its cached output.
    ///
    /// The hash may be proposed again later, against different text, so
    /// nothing computed for it survives.
    pub fn retire(&self, hash: &JobHash) -> Result<Job, RegistryError> {
        let job = self
            .state
            .borrow_mut()
            .take(hash)
            .ok_or(RegistryError::JobNotFound(*hash))?;
        info!(job = %hash, title = %job.title, "job retired");
        self.bus.publish(&Message::ChangePermissions {
            uri: job.uri(),
            permission: Some(Permission::ReadOnly),
        });
        self.bus.publish(&Message::DeleteFile { uri: job.uri() });
        self.bus.publish(&Message::DiagnosticsStale {
            file: job.file.clone(),
        });
        Ok(job)
    }

    /// Removes a job that no longer applies and drops its cached output.
    pub fn invalidate(&self, hash: &JobHash) -> Result<Job, RegistryError> {
        let job = self
            .state
            .borrow_mut()
            .take(hash)
            .ok_or(RegistryError::JobNotFound(*hash))?;
        warn!(job = %hash, title = %job.title, "job invalidated");
        self.bus.publish(&Message::DeleteFile { uri: job.uri() });
        self.bus.publish(&Message::DiagnosticsStale {
            file: job.file.clone(),
        });
        Ok(job)
    }

    /// Computes the job's output against `text` with the pass of its kind.
    pub fn execute(&self, hash: &JobHash, text: &str) -> Result<JobOutput, RegistryError> {
        let job = self.job(hash).ok_or(RegistryError::JobNotFound(*hash))?;
        let pass = self
            .pass_for(job.kind)
            .ok_or(RegistryError::NoPassForKind(job.kind))?;
        pass.execute(&job, text).map_err(|e| match e {
            PassError::Stale { .. } => RegistryError::StaleJob { hash: *hash },
            PassError::InvalidRange(source) => RegistryError::InvalidRange {
                hash: *hash,
                source,
            },
            other => RegistryError::Pass(other),
        })
    }

    /// Reconciles the jobs of `file` with text that changed underneath them.
    ///
    /// Jobs whose basis still matches `new_text` are left alone. For the
    /// rest, the pass of their kind re-analyses `new_text`: a job proposed
    /// again under the same hash is refreshed, any other stale job is
    /// invalidated, and proposals not seen before are ingested.
    pub fn on_external_file_changed(
        &self,
        file: &FileIdentity,
        new_text: &str,
    ) -> Result<ChangeReport, RegistryError> {
        let key = forge::file_hash(file);
        if !self.state.borrow().files.contains_key(&key) {
            return Ok(ChangeReport::default());
        }

        let checksum = forge::content_checksum(new_text);
        let stale = self
            .state
            .borrow()
            .jobs_of(file, |job| job.payload.basis() != checksum);
        if stale.is_empty() {
            return Ok(ChangeReport::default());
        }

        let mut kinds: Vec<JobKind> = stale.iter().map(|job| job.kind).collect();
        kinds.sort();
        kinds.dedup();

        let mut fresh: HashMap<JobHash, Proposal> = HashMap::new();
        let mut order = Vec::new();
        for kind in kinds {
            let Some(pass) = self.pass_for(kind) else {
                continue;
            };
            match pass.analyze(file, new_text) {
                Ok(proposals) => {
                    for proposal in proposals {
                        let hash = proposal.hash();
                        if fresh.insert(hash, proposal).is_none() {
                            order.push(hash);
                        }
                    }
                }
                Err(e) => warn!(pass = pass.name(), file = %file, error = %e, "re-analysis failed"),
            }
        }

        let mut report = ChangeReport::default();
        {
            let mut state = self.state.borrow_mut();
            for job in &stale {
                state.take(&job.hash);
                match fresh.remove(&job.hash) {
                    Some(proposal) => {
                        state.insert(key, Job::from(proposal));
                        report.refreshed.push(job.hash);
                    }
                    None => report.invalidated.push(job.hash),
                }
            }
            for hash in order {
                let Some(proposal) = fresh.remove(&hash) else {
                    continue;
                };
                if state.rejected.contains(&hash) || state.jobs.contains_key(&hash) {
                    continue;
                }
                state.insert(key, Job::from(proposal));
                report.added.push(hash);
            }
        }

        info!(
            file = %file,
            refreshed = report.refreshed.len(),
            invalidated = report.invalidated.len(),
            added = report.added.len(),
            "file changed externally"
        );
        for job in &stale {
            self.bus.publish(&Message::DeleteFile { uri: job.uri() });
        }
        self.bus
            .publish(&Message::DiagnosticsStale { file: file.clone() });
        Ok(report)
    }

    /// Forgets every job, file record, rejection, and pass.
    pub fn dispose(&self) {
        *self.state.borrow_mut() = RegistryState::default();
        self.passes.borrow_mut().clear();
    }
}

fn sort_jobs(jobs: &mut [Job]) {
    jobs.sort_by(|a, b| {
        a.range
            .start
            .cmp(&b.range.start)
            .then_with(|| a.title.cmp(&b.title))
    });
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use common::{LineIndex, Range};

    /// Proposes `TODO` → `DONE` on every line that contains the marker.
    pub struct MarkerPass;

    impl AnalysisPass for MarkerPass {
        fn kind(&self) -> JobKind {
            JobKind::RepairCode
        }

        fn name(&self) -> &str {
            "marker"
        }

        fn analyze(&self, file: &FileIdentity, text: &str) -> Result<Vec<Proposal>, PassError> {
            let basis = forge::content_checksum(text);
            Ok(text
                .lines()
                .enumerate()
                .filter_map(|(line, content)| {
                    let column = content.find("TODO")?;
                    let edit = Range::new(Position::new(line, column), Position::new(line, column + 4));
                    Some(Proposal {
                        file: file.clone(),
                        range: edit,
                        title: format!("Resolve marker on line {}", line + 1),
                        payload: JobPayload::Repair(RepairPayload {
                            basis: basis.clone(),
                            edit,
                            replacement: "DONE".into(),
                        }),
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
            let chars: Vec<char> = text.chars().collect();
            let mut out: String = chars[..start].iter().collect();
            out.push_str(&p.replacement);
            out.extend(&chars[end..]);
            Ok(JobOutput {
                text: out,
                range: index.full_range(),
                position: p.edit.start,
            })
        }
    }

    /// Bus tap recording every published message.
    pub fn record(bus: &MessageBus) -> Rc<RefCell<Vec<Message>>> {
        let log = Rc::new(RefCell::new(Vec::new()));
        let sink = log.clone();
        bus.subscribe(move |message| {
            sink.borrow_mut().push(message.clone());
            Ok(())
        });
        log
    }

    pub fn registry() -> Rc<JobRegistry> {
        let registry = Rc::new(JobRegistry::new(Rc::new(MessageBus::new())));
        registry.register_pass(Rc::new(MarkerPass));
        registry
    }
}

#[cfg(test)]
mod tests {
    use super::testing::{record, registry, MarkerPass};
    use super::*;
    use bus::MessageKind;
    use common::Range;

    const TEXT: &str = "let a = 1; // TODO\nlet b = 2;\nTODO: rename\n";

    fn file() -> FileIdentity {
        FileIdentity::new("src/a.ts")
    }

    fn proposals(text: &str) -> Vec<Proposal> {
        MarkerPass.analyze(&file(), text).unwrap()
    }

    fn kinds(log: &RefCell<Vec<Message>>) -> Vec<MessageKind> {
        log.borrow().iter().map(Message::kind).collect()
    }

    #[test]
    fn test_ingest_requires_registered_file() {
        let registry = registry();
        let err = registry.ingest_jobs(&file(), proposals(TEXT)).unwrap_err();
        assert!(matches!(err, RegistryError::FileNotRegistered(_)));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_ingest_rejects_foreign_proposal_without_mutation() {
        let registry = registry();
        registry.register_file(&file());
        let mut batch = proposals(TEXT);
        batch.push(MarkerPass.analyze(&FileIdentity::new("b.ts"), "TODO").unwrap().remove(0));

        let err = registry.ingest_jobs(&file(), batch).unwrap_err();
        assert!(matches!(err, RegistryError::FileMismatch { .. }));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_ingest_is_idempotent() {
        let registry = registry();
        let log = record(registry.bus());
        registry.register_file(&file());

        let first = registry.ingest_jobs(&file(), proposals(TEXT)).unwrap();
        let second = registry.ingest_jobs(&file(), proposals(TEXT)).unwrap();

        assert_eq!(first.len(), 2);
        assert_eq!(second, first);
        assert_eq!(registry.len(), 2);
        assert_eq!(kinds(&log), vec![MessageKind::DiagnosticsStale; 2]);
    }

    #[test]
    fn test_ingest_returns_each_active_hash_once() {
        let registry = registry();
        registry.register_file(&file());
        let mut batch = proposals(TEXT);
        batch.push(batch[0].clone());

        let hashes = registry.ingest_jobs(&file(), batch).unwrap();
        assert_eq!(hashes.len(), 2);
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_register_file_is_idempotent() {
        let registry = registry();
        let a = registry.register_file(&file());
        let b = registry.register_file(&FileIdentity::new("src\\a.ts"));
        assert_eq!(a, b);
        assert_eq!(registry.files(), vec![file()]);
        assert_eq!(registry.file(&a), Some(file()));
    }

    #[test]
    fn test_lookup_by_range_is_inclusive() {
        let registry = registry();
        registry.analyze(&file(), TEXT).unwrap();

        // First marker spans (0,14)..(0,18).
        assert_eq!(registry.lookup_by_range(&file(), Position::new(0, 14)).len(), 1);
        assert_eq!(registry.lookup_by_range(&file(), Position::new(0, 18)).len(), 1);
        assert!(registry.lookup_by_range(&file(), Position::new(0, 19)).is_empty());
        assert!(registry.lookup_by_range(&file(), Position::new(1, 0)).is_empty());
        assert!(registry
            .lookup_by_range(&FileIdentity::new("unknown.ts"), Position::new(0, 14))
            .is_empty());
    }

    #[test]
    fn test_reject_is_terminal() {
        let registry = registry();
        let hashes = registry.analyze(&file(), TEXT).unwrap();
        let log = record(registry.bus());

        let job = registry.reject(&hashes[0]).unwrap();
        assert_eq!(
            kinds(&log),
            vec![MessageKind::ChangePermissions, MessageKind::DiagnosticsStale]
        );
        match &log.borrow()[0] {
            Message::ChangePermissions { uri, permission } => {
                assert_eq!(uri, &job.uri());
                assert_eq!(*permission, Some(Permission::ReadOnly));
            }
            other => panic!("unexpected message {other:?}"),
        }

        assert!(registry.is_rejected(&hashes[0]));
        assert!(matches!(
            registry.reject(&hashes[0]),
            Err(RegistryError::JobNotFound(_))
        ));
        let again = registry.ingest_jobs(&file(), proposals(TEXT)).unwrap();
        assert_eq!(again, vec![hashes[1]]);
        assert!(registry.job(&hashes[0]).is_none());
    }

    #[test]
    fn test_retire_allows_future_proposals() {
        let registry = registry();
        let hashes = registry.analyze(&file(), TEXT).unwrap();

        let log = record(registry.bus());

        let job = registry.retire(&hashes[0]).unwrap();
        assert_eq!(
            kinds(&log),
            vec![
                MessageKind::ChangePermissions,
                MessageKind::DeleteFile,
                MessageKind::DiagnosticsStale
            ]
        );
        assert_eq!(log.borrow()[1], Message::DeleteFile { uri: job.uri() });
        assert!(!registry.is_rejected(&hashes[0]));
        assert!(matches!(
            registry.retire(&hashes[0]),
            Err(RegistryError::JobNotFound(_))
        ));
        assert_eq!(registry.ingest_jobs(&file(), proposals(TEXT)).unwrap(), hashes);
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_overlapping_jobs_reject_independently() {
        let registry = registry();
        registry.register_file(&file());
        let mut batch = proposals("TODO");
        let mut wider = batch[0].clone();
        wider.range = Range::new(Position::new(0, 0), Position::new(0, 10));
        wider.title = "Another fix".into();
        if let JobPayload::Repair(p) = &mut wider.payload {
            p.replacement = "FIXME".into();
        }
        batch.push(wider);
        let hashes = registry.ingest_jobs(&file(), batch).unwrap();
        assert_eq!(hashes.len(), 2);

        registry.reject(&hashes[0]).unwrap();
        let left = registry.lookup_by_range(&file(), Position::new(0, 2));
        assert_eq!(left.len(), 1);
        assert_eq!(left[0].hash, hashes[1]);
    }

    #[test]
    fn test_execute_errors() {
        let registry = registry();
        let hashes = registry.analyze(&file(), TEXT).unwrap();

        let out = registry.execute(&hashes[0], TEXT).unwrap();
        assert_eq!(out.text, TEXT.replacen("TODO", "DONE", 1));
        assert_eq!(out.position, Position::new(0, 14));

        assert!(matches!(
            registry.execute(&hashes[0], "changed"),
            Err(RegistryError::StaleJob { .. })
        ));

        let unknown = JobHash::from(blake3::hash(b"unknown"));
        assert!(matches!(
            registry.execute(&unknown, TEXT),
            Err(RegistryError::JobNotFound(_))
        ));

        registry.dispose();
        assert!(registry.is_empty());
    }

    #[test]
    fn test_execute_without_pass() {
        let registry = JobRegistry::new(Rc::new(MessageBus::new()));
        registry.register_file(&file());
        let hashes = registry.ingest_jobs(&file(), proposals(TEXT)).unwrap();
        assert!(matches!(
            registry.execute(&hashes[0], TEXT),
            Err(RegistryError::NoPassForKind(JobKind::RepairCode))
        ));
    }

    #[test]
    fn test_external_change_refreshes_invalidates_and_adds() {
        let registry = registry();
        let before = "TODO one\nplain\nTODO two\n";
        let hashes = registry.analyze(&file(), before).unwrap();
        let log = record(registry.bus());

        // Line 0 keeps its marker, line 2 loses it, line 1 gains one.
        let after = "TODO one!\nTODO plain\ndone two\n";
        let report = registry.on_external_file_changed(&file(), after).unwrap();

        assert_eq!(report.refreshed, vec![hashes[0]]);
        assert_eq!(report.invalidated, vec![hashes[1]]);
        assert_eq!(report.added.len(), 1);
        assert_eq!(registry.len(), 2);

        let refreshed = registry.job(&hashes[0]).unwrap();
        assert_eq!(refreshed.payload.basis(), forge::content_checksum(after));
        assert!(registry.execute(&hashes[0], after).is_ok());
        assert!(!registry.is_rejected(&hashes[1]));

        assert_eq!(
            kinds(&log),
            vec![
                MessageKind::DeleteFile,
                MessageKind::DeleteFile,
                MessageKind::DiagnosticsStale
            ]
        );
    }

    #[test]
    fn test_external_change_with_same_text_is_noop() {
        let registry = registry();
        registry.analyze(&file(), TEXT).unwrap();
        let log = record(registry.bus());

        let report = registry.on_external_file_changed(&file(), TEXT).unwrap();
        assert!(report.is_empty());
        assert!(log.borrow().is_empty());
    }

    #[test]
    fn test_invalidate_deletes_cached_output() {
        let registry = registry();
        let hashes = registry.analyze(&file(), TEXT).unwrap();
        let log = record(registry.bus());

        let job = registry.invalidate(&hashes[1]).unwrap();
        assert_eq!(log.borrow()[0], Message::DeleteFile { uri: job.uri() });
        assert!(!registry.is_rejected(&hashes[1]));
    }
}

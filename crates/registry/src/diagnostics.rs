//! Per-file diagnostics mirroring the registry's active jobs.
//!
//! Rebuilt from scratch on every `DiagnosticsStale` for the named file; the
//! collection never patches individual entries.

use crate::{Job, JobRegistry};
use bus::{MessageBus, MessageKind, Subscription};
use common::{FileIdentity, JobHash, JobKind, Range};
use serde::Serialize;
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::{Rc, Weak};
use tracing::trace;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Hint,
    Warning,
}

impl From<JobKind> for Severity {
    fn from(kind: JobKind) -> Self {
        match kind {
            JobKind::ReorderDeclarations => Severity::Hint,
            JobKind::RepairCode => Severity::Warning,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    pub hash: JobHash,
    pub title: String,
    pub range: Range,
    pub severity: Severity,
}

impl From<&Job> for Diagnostic {
    fn from(job: &Job) -> Self {
        Diagnostic {
            hash: job.hash,
            title: job.title.clone(),
            range: job.range,
            severity: job.kind.into(),
        }
    }
}

#[derive(Default)]
pub struct DiagnosticsCollection {
    entries: RefCell<BTreeMap<FileIdentity, Vec<Diagnostic>>>,
}

impl DiagnosticsCollection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribes the collection to `DiagnosticsStale` on `bus`.
    ///
    /// Holds only weak references; once the registry or the collection is
    /// dropped the handler does nothing.
    pub fn attach(
        self: &Rc<Self>,
        registry: &Rc<JobRegistry>,
        bus: &MessageBus,
    ) -> Subscription {
        let collection: Weak<Self> = Rc::downgrade(self);
        let registry: Weak<JobRegistry> = Rc::downgrade(registry);
        bus.subscribe_to(&[MessageKind::DiagnosticsStale], move |message| {
            let bus::Message::DiagnosticsStale { file } = message else {
                return Ok(());
            };
            if let (Some(collection), Some(registry)) = (collection.upgrade(), registry.upgrade()) {
                collection.refresh(file, &registry);
            }
            Ok(())
        })
    }

    pub fn refresh(&self, file: &FileIdentity, registry: &JobRegistry) {
        let diagnostics: Vec<Diagnostic> = registry
            .jobs_for_file(file)
            .iter()
            .map(Diagnostic::from)
            .collect();
        trace!(file = %file, count = diagnostics.len(), "diagnostics refreshed");
        let mut entries = self.entries.borrow_mut();
        if diagnostics.is_empty() {
            entries.remove(file);
        } else {
            entries.insert(file.clone(), diagnostics);
        }
    }

    pub fn get(&self, file: &FileIdentity) -> Vec<Diagnostic> {
        self.entries.borrow().get(file).cloned().unwrap_or_default()
    }

    pub fn files(&self) -> Vec<FileIdentity> {
        self.entries.borrow().keys().cloned().collect()
    }

    pub fn clear(&self) {
        self.entries.borrow_mut().clear();
    }
}

//! # The Substrate: Session Wiring
//!
//! One [`Session`] owns one bus and everything attached to it. Sessions
//! share nothing, so several can live side by side (one per workspace, or
//! one per test). All session work runs inside a `tokio::task::LocalSet`.

use anyhow::{bail, Context};
use bus::MessageBus;
use bytes::Bytes;
use common::{FileIdentity, ShadowUri};
use registry::{intake, AnalysisPass, DiagnosticsCollection, DocumentHost, JobRegistry, Materializer};
use shadow::{ChangeKind, ShadowFs};
use std::rc::Rc;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tracing::debug;

/// How long [`Session::read_resolved`] waits for content to be materialised.
pub const DEFAULT_RESOLVE_TIMEOUT: Duration = Duration::from_secs(5);

pub struct Session {
    bus: Rc<MessageBus>,
    registry: Rc<JobRegistry>,
    shadow: Rc<ShadowFs>,
    diagnostics: Rc<DiagnosticsCollection>,
    // Bus handlers hold it weakly.
    materializer: Rc<Materializer>,
}

impl Session {
    /// Builds and wires a session. `host` supplies document text for
    /// materialisation; `passes` are registered in order.
    pub fn new(host: Rc<dyn DocumentHost>, passes: Vec<Rc<dyn AnalysisPass>>) -> Self {
        let bus = Rc::new(MessageBus::new());
        let registry = Rc::new(JobRegistry::new(bus.clone()));
        for pass in passes {
            registry.register_pass(pass);
        }
        let shadow = Rc::new(ShadowFs::new(bus.clone()));
        let diagnostics = Rc::new(DiagnosticsCollection::new());
        let materializer = Materializer::new(&registry, host);

        shadow.attach();
        diagnostics.attach(&registry, &bus);
        materializer.attach(&bus);
        intake::attach(&registry);
        debug!(subscribers = bus.subscriber_count(), "session wired");

        Self {
            bus,
            registry,
            shadow,
            diagnostics,
            materializer,
        }
    }

    pub fn bus(&self) -> &Rc<MessageBus> {
        &self.bus
    }

    pub fn registry(&self) -> &Rc<JobRegistry> {
        &self.registry
    }

    pub fn shadow(&self) -> &Rc<ShadowFs> {
        &self.shadow
    }

    pub fn diagnostics(&self) -> &Rc<DiagnosticsCollection> {
        &self.diagnostics
    }

    pub fn materializer(&self) -> &Rc<Materializer> {
        &self.materializer
    }

    /// URI of the read-only mirror of `file`, the left side of a diff.
    pub fn original_uri(&self, file: &FileIdentity) -> ShadowUri {
        ShadowUri::file(forge::file_hash(file), file.extension().unwrap_or_default())
    }

    /// Reads `uri`, waiting for materialisation when the first read misses.
    ///
    /// # Errors
    /// Fails when nothing is written to `uri` within `timeout` (the job went
    /// stale, or the document could not be opened).
    pub async fn read_resolved(&self, uri: &ShadowUri, timeout: Duration) -> anyhow::Result<Bytes> {
        if self.shadow.exists(uri) {
            return Ok(self.shadow.read(uri));
        }
        let mut changes = self.shadow.watch();
        self.shadow.read(uri);

        let wait = async {
            loop {
                match changes.recv().await {
                    Ok(change) if &change.uri == uri && change.kind != ChangeKind::Deleted => {
                        return Ok(());
                    }
                    Ok(_) | Err(RecvError::Lagged(_)) => {
                        if self.shadow.exists(uri) {
                            return Ok(());
                        }
                    }
                    Err(RecvError::Closed) => bail!("filesystem closed"),
                }
            }
        };
        tokio::time::timeout(timeout, wait)
            .await
            .with_context(|| format!("{uri} was not materialised within {timeout:?}"))??;
        Ok(self.shadow.read(uri))
    }

    /// Drops every bus subscription, job, and cached entry.
    pub fn dispose(&self) {
        self.bus.dispose_all();
        self.registry.dispose();
        self.shadow.dispose();
        self.diagnostics.clear();
        debug!("session disposed");
    }
}

//! Lazy computation of synthetic file content.
//!
//! The virtual filesystem answers a read miss with a placeholder and a
//! `ReadingFileFailed` message. The materializer picks that up on the next
//! tick, computes the real content, and publishes it back as `WriteFile`.
//! When nothing can be written, a `DeleteFile` settles the pending read so
//! a later read asks again. Handlers run inside a `tokio::task::LocalSet`.

use crate::{DocumentHost, JobRegistry, RegistryError};
use anyhow::Context;
use bus::{Message, MessageBus, MessageKind, Subscription, WriteOptions};
use bytes::Bytes;
use common::ShadowUri;
use std::rc::{Rc, Weak};
use tracing::{debug, info, warn};

pub struct Materializer {
    registry: Weak<JobRegistry>,
    host: Rc<dyn DocumentHost>,
}

impl Materializer {
    pub fn new(registry: &Rc<JobRegistry>, host: Rc<dyn DocumentHost>) -> Rc<Self> {
        Rc::new(Self {
            registry: Rc::downgrade(registry),
            host,
        })
    }

    /// Subscribes to `ReadingFileFailed`; each miss is served by a task
    /// spawned with [`tokio::task::spawn_local`].
    pub fn attach(self: &Rc<Self>, bus: &MessageBus) -> Subscription {
        let weak: Weak<Self> = Rc::downgrade(self);
        bus.subscribe_to(&[MessageKind::ReadingFileFailed], move |message| {
            let Message::ReadingFileFailed { uri } = message else {
                return Ok(());
            };
            let Some(this) = weak.upgrade() else {
                return Ok(());
            };
            let uri = uri.clone();
            tokio::task::spawn_local(async move {
                if let Err(e) = this.materialize(&uri).await {
                    warn!(uri = %uri, error = ?e, "materialisation failed");
                    this.release(&uri);
                }
            });
            Ok(())
        })
    }

    fn release(&self, uri: &ShadowUri) {
        if let Some(registry) = self.registry.upgrade() {
            registry
                .bus()
                .publish(&Message::DeleteFile { uri: uri.clone() });
        }
    }

    /// Computes the content behind `uri` and publishes it as `WriteFile`.
    ///
    /// A job that went away in the meantime is not an error. A job whose
    /// range or basis no longer fits the document is invalidated.
    pub async fn materialize(&self, uri: &ShadowUri) -> anyhow::Result<()> {
        let registry = self
            .registry
            .upgrade()
            .context("job registry has been dropped")?;

        match uri {
            ShadowUri::Job { hash, .. } => {
                let Some(job) = registry.job(hash) else {
                    debug!(job = %hash, "job gone before materialisation");
                    self.release(uri);
                    return Ok(());
                };
                let text = self
                    .host
                    .open(&job.file)
                    .await
                    .with_context(|| format!("failed to open {}", job.file))?;

                match registry.execute(hash, &text) {
                    Ok(output) => {
                        info!(job = %hash, uri = %uri, "job materialised");
                        registry.bus().publish(&Message::WriteFile {
                            uri: uri.clone(),
                            content: Bytes::from(output.text),
                            options: WriteOptions::upsert(),
                        });
                        Ok(())
                    }
                    Err(e @ (RegistryError::StaleJob { .. } | RegistryError::InvalidRange { .. })) => {
                        warn!(job = %hash, error = %e, "job out of date");
                        registry.invalidate(hash)?;
                        Ok(())
                    }
                    Err(RegistryError::JobNotFound(_)) => {
                        debug!(job = %hash, "job closed while its document was opening");
                        self.release(uri);
                        Ok(())
                    }
                    Err(e) => Err(e.into()),
                }
            }
            ShadowUri::File { hash, .. } => {
                let file = registry
                    .file(hash)
                    .with_context(|| format!("no file registered under {hash}"))?;
                let text = self
                    .host
                    .open(&file)
                    .await
                    .with_context(|| format!("failed to open {file}"))?;
                debug!(file = %file, uri = %uri, "original mirrored");
                registry.bus().publish(&Message::WriteFile {
                    uri: uri.clone(),
                    content: Bytes::from(text),
                    options: WriteOptions::upsert().read_only(),
                });
                Ok(())
            }
        }
    }
}

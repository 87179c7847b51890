//! # The Shadow: Virtual Diff Filesystem
//!
//! Serves synthetic URIs whose content is "the file after applying this
//! job". Nothing is computed here: a read miss publishes
//! `ReadingFileFailed` and returns [`LOADING_PLACEHOLDER`]; the real bytes
//! arrive later as a `WriteFile` message. The URI stays pending until a
//! write or delete settles it, and further misses on a pending URI do not
//! publish again.
//!
//! ## Deferred application
//! `WriteFile`, `DeleteFile`, and `ChangePermissions` messages are applied
//! on the next tick of the local task set, never inside `publish`. Callers
//! that need the effect await [`ShadowFs::watch`].

use bus::{Message, MessageBus, MessageKind, Subscription, WriteOptions};
use bytes::Bytes;
use common::{Permission, ShadowUri};
use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::rc::{Rc, Weak};
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::sync::broadcast;
use tracing::{debug, trace, warn};

/// Content returned for an entry that has not been computed yet.
pub const LOADING_PLACEHOLDER: &str = "LOADING…";

const CHANGE_CAPACITY: usize = 256;

/// Errors from virtual filesystem operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ShadowError {
    #[error("file not found: {0}")]
    FileNotFound(ShadowUri),
    #[error("file exists: {0}")]
    FileExists(ShadowUri),
    #[error("no permissions to write {0}")]
    NoPermissions(ShadowUri),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Created,
    Changed,
    Deleted,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileChange {
    pub uri: ShadowUri,
    pub kind: ChangeKind,
}

/// Metadata for the host's stat protocol. Times are milliseconds since the
/// Unix epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileStat {
    pub size: u64,
    pub ctime: u64,
    pub mtime: u64,
    pub permission: Option<Permission>,
    /// `true` when no entry exists yet and the values are stand-ins.
    pub provisional: bool,
}

#[derive(Debug, Clone)]
struct Entry {
    content: Bytes,
    permission: Option<Permission>,
    ctime: u64,
    mtime: u64,
}

impl Entry {
    fn stat(&self) -> FileStat {
        FileStat {
            size: self.content.len() as u64,
            ctime: self.ctime,
            mtime: self.mtime,
            permission: self.permission,
            provisional: false,
        }
    }
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}

pub struct ShadowFs {
    entries: RefCell<HashMap<ShadowUri, Entry>>,
    /// Missed reads whose content has been requested but not written yet.
    pending: RefCell<HashSet<ShadowUri>>,
    changes: broadcast::Sender<FileChange>,
    bus: Rc<MessageBus>,
}

impl ShadowFs {
    pub fn new(bus: Rc<MessageBus>) -> Self {
        let (changes, _) = broadcast::channel(CHANGE_CAPACITY);
        Self {
            entries: RefCell::new(HashMap::new()),
            pending: RefCell::new(HashSet::new()),
            changes,
            bus,
        }
    }

    /// Subscribes to the filesystem messages on the bus. Each one is applied
    /// by a task spawned with [`tokio::task::spawn_local`], so this must be
    /// used inside a `LocalSet`.
    pub fn attach(self: &Rc<Self>) -> Subscription {
        const KINDS: &[MessageKind] = &[
            MessageKind::WriteFile,
            MessageKind::DeleteFile,
            MessageKind::ChangePermissions,
        ];
        let weak: Weak<Self> = Rc::downgrade(self);
        self.bus.subscribe_to(KINDS, move |message| {
            let weak = weak.clone();
            let message = message.clone();
            tokio::task::spawn_local(async move {
                if let Some(fs) = weak.upgrade() {
                    fs.apply(&message);
                }
            });
            Ok(())
        })
    }

    /// Applies a bus message. Failures are logged.
    fn apply(&self, message: &Message) {
        let result = match message {
            Message::WriteFile {
                uri,
                content,
                options,
            } => self.write(uri, content.clone(), *options),
            Message::DeleteFile { uri } => self.delete(uri),
            Message::ChangePermissions { uri, permission } => {
                self.change_permissions(uri, *permission)
            }
            _ => return,
        };
        match result {
            Ok(()) => trace!(kind = %message.kind(), "deferred message applied"),
            // Jobs that were never opened have nothing cached.
            Err(ShadowError::FileNotFound(uri)) if message.kind() != MessageKind::WriteFile => {
                debug!(uri = %uri, kind = %message.kind(), "nothing cached")
            }
            Err(e) => warn!(kind = %message.kind(), error = %e, "deferred message failed"),
        }
    }

    /// Subscribes to change notifications. Only changes made after the call
    /// are received.
    pub fn watch(&self) -> broadcast::Receiver<FileChange> {
        self.changes.subscribe()
    }

    fn notify(&self, uri: &ShadowUri, kind: ChangeKind) {
        trace!(uri = %uri, ?kind, "file change");
        // No receivers is fine.
        let _ = self.changes.send(FileChange {
            uri: uri.clone(),
            kind,
        });
    }

    /// Never fails: a missing entry gets a provisional stat so the host can
    /// open the URI before its content exists.
    pub fn stat(&self, uri: &ShadowUri) -> FileStat {
        match self.entries.borrow().get(uri) {
            Some(entry) => entry.stat(),
            None => {
                let now = now_millis();
                FileStat {
                    size: 0,
                    ctime: now,
                    mtime: now,
                    permission: None,
                    provisional: true,
                }
            }
        }
    }

    /// Cached content, or the placeholder. Only the first miss on a URI
    /// requests computation.
    pub fn read(&self, uri: &ShadowUri) -> Bytes {
        if let Some(entry) = self.entries.borrow().get(uri) {
            return entry.content.clone();
        }
        let first = self.pending.borrow_mut().insert(uri.clone());
        if first {
            debug!(uri = %uri, "read miss");
            self.bus
                .publish(&Message::ReadingFileFailed { uri: uri.clone() });
        } else {
            trace!(uri = %uri, "read miss, already requested");
        }
        Bytes::from_static(LOADING_PLACEHOLDER.as_bytes())
    }

    pub fn exists(&self, uri: &ShadowUri) -> bool {
        self.entries.borrow().contains_key(uri)
    }

    /// `true` between a read miss and the write or delete that settles it.
    pub fn is_pending(&self, uri: &ShadowUri) -> bool {
        self.pending.borrow().contains(uri)
    }

    pub fn write(
        &self,
        uri: &ShadowUri,
        content: Bytes,
        options: WriteOptions,
    ) -> Result<(), ShadowError> {
        let kind = {
            let mut entries = self.entries.borrow_mut();
            let now = now_millis();
            match entries.get_mut(uri) {
                None if !options.create => return Err(ShadowError::FileNotFound(uri.clone())),
                None => {
                    entries.insert(
                        uri.clone(),
                        Entry {
                            content,
                            permission: options.permission,
                            ctime: now,
                            mtime: now,
                        },
                    );
                    ChangeKind::Created
                }
                Some(_) if options.create && !options.overwrite => {
                    return Err(ShadowError::FileExists(uri.clone()))
                }
                Some(entry) if entry.permission == Some(Permission::ReadOnly) => {
                    return Err(ShadowError::NoPermissions(uri.clone()))
                }
                Some(entry) => {
                    entry.content = content;
                    entry.mtime = now;
                    entry.permission = options.permission;
                    ChangeKind::Changed
                }
            }
        };
        self.pending.borrow_mut().remove(uri);
        self.notify(uri, kind);
        Ok(())
    }

    /// Also settles a pending read, so the next miss requests content again.
    pub fn delete(&self, uri: &ShadowUri) -> Result<(), ShadowError> {
        self.pending.borrow_mut().remove(uri);
        self.entries
            .borrow_mut()
            .remove(uri)
            .ok_or_else(|| ShadowError::FileNotFound(uri.clone()))?;
        self.notify(uri, ChangeKind::Deleted);
        Ok(())
    }

    pub fn rename(&self, from: &ShadowUri, to: &ShadowUri, overwrite: bool) -> Result<(), ShadowError> {
        {
            let mut entries = self.entries.borrow_mut();
            if !entries.contains_key(from) {
                return Err(ShadowError::FileNotFound(from.clone()));
            }
            match entries.get(to) {
                Some(_) if !overwrite => return Err(ShadowError::FileExists(to.clone())),
                Some(existing) if existing.permission == Some(Permission::ReadOnly) => {
                    return Err(ShadowError::NoPermissions(to.clone()))
                }
                _ => {}
            }
            if let Some(entry) = entries.remove(from) {
                entries.insert(to.clone(), entry);
            }
        }
        self.pending.borrow_mut().remove(to);
        self.notify(from, ChangeKind::Deleted);
        self.notify(to, ChangeKind::Created);
        Ok(())
    }

    pub fn change_permissions(
        &self,
        uri: &ShadowUri,
        permission: Option<Permission>,
    ) -> Result<(), ShadowError> {
        {
            let mut entries = self.entries.borrow_mut();
            let entry = entries
                .get_mut(uri)
                .ok_or_else(|| ShadowError::FileNotFound(uri.clone()))?;
            entry.permission = permission;
            entry.mtime = now_millis();
        }
        self.notify(uri, ChangeKind::Changed);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drops every cached entry and pending read without notifications.
    pub fn dispose(&self) {
        self.entries.borrow_mut().clear();
        self.pending.borrow_mut().clear();
    }
}

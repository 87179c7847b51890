//! # The Bus: Lifecycle Message Channel
//!
//! Synchronous publish/subscribe between the job registry, the virtual
//! filesystem, and the diagnostics collection. None of those components hold
//! a reference to one another; everything they need to tell each other goes
//! through a [`Message`].
//!
//! ## Delivery contract
//! - `publish` invokes every handler subscribed at the time of the call, in
//!   subscription order, and returns after the last one.
//! - A handler that returns `Err` or panics is logged and skipped; delivery
//!   continues and nothing reaches the publisher.
//! - Handlers may publish, subscribe, or unsubscribe while a publish is in
//!   flight. Subscriptions made mid-publish see the next message, not this one;
//!   handlers unsubscribed mid-publish are not invoked again.
//!
//! The bus is single-threaded (`Rc`/`RefCell`); effects that must not run
//! inline are deferred by the handlers themselves.

use bytes::Bytes;
use common::{FileIdentity, Permission, ShadowUri};
use std::cell::{Cell, RefCell};
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::rc::Rc;
use tracing::{error, trace};

/// Flags accompanying a write request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriteOptions {
    pub create: bool,
    pub overwrite: bool,
    pub permission: Option<Permission>,
}

impl WriteOptions {
    /// `create: true, overwrite: true`, writable.
    pub const fn upsert() -> Self {
        Self {
            create: true,
            overwrite: true,
            permission: None,
        }
    }

    pub const fn read_only(mut self) -> Self {
        self.permission = Some(Permission::ReadOnly);
        self
    }
}

/// Lifecycle events. Closed set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    WriteFile {
        uri: ShadowUri,
        content: Bytes,
        options: WriteOptions,
    },
    DeleteFile {
        uri: ShadowUri,
    },
    ChangePermissions {
        uri: ShadowUri,
        permission: Option<Permission>,
    },
    ReadingFileFailed {
        uri: ShadowUri,
    },
    CreateJobRequest {
        file: FileIdentity,
        text: String,
    },
    DiagnosticsStale {
        file: FileIdentity,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKind {
    WriteFile,
    DeleteFile,
    ChangePermissions,
    ReadingFileFailed,
    CreateJobRequest,
    DiagnosticsStale,
}

impl Message {
    pub fn kind(&self) -> MessageKind {
        match self {
            Message::WriteFile { .. } => MessageKind::WriteFile,
            Message::DeleteFile { .. } => MessageKind::DeleteFile,
            Message::ChangePermissions { .. } => MessageKind::ChangePermissions,
            Message::ReadingFileFailed { .. } => MessageKind::ReadingFileFailed,
            Message::CreateJobRequest { .. } => MessageKind::CreateJobRequest,
            Message::DiagnosticsStale { .. } => MessageKind::DiagnosticsStale,
        }
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MessageKind::WriteFile => "write-file",
            MessageKind::DeleteFile => "delete-file",
            MessageKind::ChangePermissions => "change-permissions",
            MessageKind::ReadingFileFailed => "reading-file-failed",
            MessageKind::CreateJobRequest => "create-job-request",
            MessageKind::DiagnosticsStale => "diagnostics-stale",
        };
        f.write_str(name)
    }
}

type Handler = Rc<dyn Fn(&Message) -> anyhow::Result<()>>;

/// Handle returned by [`MessageBus::subscribe`]; pass it back to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Subscription(u64);

/// Outcome of one [`MessageBus::publish`] call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Delivery {
    pub delivered: usize,
    pub failed: usize,
}

#[derive(Default)]
pub struct MessageBus {
    handlers: RefCell<Vec<(Subscription, Handler)>>,
    next_id: Cell<u64>,
}

impl MessageBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe<F>(&self, handler: F) -> Subscription
    where
        F: Fn(&Message) -> anyhow::Result<()> + 'static,
    {
        let id = self.next_id.get();
        self.next_id.set(id + 1);
        let subscription = Subscription(id);
        self.handlers
            .borrow_mut()
            .push((subscription, Rc::new(handler)));
        subscription
    }

    /// Subscribes a handler that only sees the listed message kinds.
    pub fn subscribe_to<F>(&self, kinds: &'static [MessageKind], handler: F) -> Subscription
    where
        F: Fn(&Message) -> anyhow::Result<()> + 'static,
    {
        self.subscribe(move |message| {
            if kinds.contains(&message.kind()) {
                handler(message)
            } else {
                Ok(())
            }
        })
    }

    /// Returns `false` if the subscription was already gone.
    pub fn unsubscribe(&self, subscription: Subscription) -> bool {
        let mut handlers = self.handlers.borrow_mut();
        let before = handlers.len();
        handlers.retain(|(s, _)| *s != subscription);
        handlers.len() != before
    }

    fn is_subscribed(&self, subscription: Subscription) -> bool {
        self.handlers.borrow().iter().any(|(s, _)| *s == subscription)
    }

    pub fn subscriber_count(&self) -> usize {
        self.handlers.borrow().len()
    }

    /// Drops every subscription. The bus stays usable but silent.
    pub fn dispose_all(&self) {
        self.handlers.borrow_mut().clear();
    }

    pub fn publish(&self, message: &Message) -> Delivery {
        // Snapshot so handlers can (un)subscribe without a live borrow.
        let handlers: Vec<(Subscription, Handler)> = self.handlers.borrow().clone();
        let kind = message.kind();
        trace!(%kind, subscribers = handlers.len(), "publish");

        let mut delivery = Delivery::default();
        for (subscription, handler) in handlers {
            if !self.is_subscribed(subscription) {
                continue;
            }
            match catch_unwind(AssertUnwindSafe(|| handler(message))) {
                Ok(Ok(())) => delivery.delivered += 1,
                Ok(Err(e)) => {
                    delivery.failed += 1;
                    error!(%kind, subscription = subscription.0, error = ?e, "bus handler failed");
                }
                Err(_) => {
                    delivery.failed += 1;
                    error!(%kind, subscription = subscription.0, "bus handler panicked");
                }
            }
        }
        delivery
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stale(file: &str) -> Message {
        Message::DiagnosticsStale {
            file: FileIdentity::new(file),
        }
    }

    #[test]
    fn test_delivery_in_subscription_order() {
        let bus = MessageBus::new();
        let log = Rc::new(RefCell::new(Vec::new()));
        for n in 0..3 {
            let log = log.clone();
            bus.subscribe(move |_| {
                log.borrow_mut().push(n);
                Ok(())
            });
        }

        let delivery = bus.publish(&stale("a.ts"));
        assert_eq!(delivery.delivered, 3);
        assert_eq!(*log.borrow(), vec![0, 1, 2]);
    }

    #[test]
    fn test_failing_handler_does_not_stop_delivery() {
        let bus = MessageBus::new();
        let reached = Rc::new(Cell::new(0));

        bus.subscribe(|_| anyhow::bail!("boom"));
        bus.subscribe(|_| panic!("handler panic"));
        let r = reached.clone();
        bus.subscribe(move |_| {
            r.set(r.get() + 1);
            Ok(())
        });

        let delivery = bus.publish(&stale("a.ts"));
        assert_eq!(delivery, Delivery { delivered: 1, failed: 2 });
        assert_eq!(reached.get(), 1);
    }

    #[test]
    fn test_unsubscribe() {
        let bus = MessageBus::new();
        let hits = Rc::new(Cell::new(0));
        let h = hits.clone();
        let sub = bus.subscribe(move |_| {
            h.set(h.get() + 1);
            Ok(())
        });

        bus.publish(&stale("a.ts"));
        assert!(bus.unsubscribe(sub));
        assert!(!bus.unsubscribe(sub));
        bus.publish(&stale("a.ts"));
        assert_eq!(hits.get(), 1);
    }

    #[test]
    fn test_filtered_subscription() {
        let bus = MessageBus::new();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let s = seen.clone();
        bus.subscribe_to(&[MessageKind::DeleteFile], move |m| {
            s.borrow_mut().push(m.kind());
            Ok(())
        });

        bus.publish(&stale("a.ts"));
        bus.publish(&Message::DeleteFile {
            uri: ShadowUri::job(blake3::hash(b"j").into(), "ts"),
        });
        assert_eq!(*seen.borrow(), vec![MessageKind::DeleteFile]);
    }

    #[test]
    fn test_reentrant_publish_and_subscribe() {
        let bus = Rc::new(MessageBus::new());
        let inner_hits = Rc::new(Cell::new(0));

        let weak = Rc::downgrade(&bus);
        let hits = inner_hits.clone();
        bus.subscribe(move |message| {
            let Some(bus) = weak.upgrade() else {
                return Ok(());
            };
            if let Message::DiagnosticsStale { file } = message {
                if file.as_str() == "outer.ts" {
                    let hits = hits.clone();
                    bus.subscribe(move |_| {
                        hits.set(hits.get() + 1);
                        Ok(())
                    });
                    bus.publish(&stale("inner.ts"));
                }
            }
            Ok(())
        });

        bus.publish(&stale("outer.ts"));
        // The late subscriber only saw the nested message.
        assert_eq!(inner_hits.get(), 1);
        assert_eq!(bus.subscriber_count(), 2);
    }

    #[test]
    fn test_handler_unsubscribed_mid_publish_is_skipped() {
        let bus = Rc::new(MessageBus::new());
        let victim = Rc::new(Cell::new(None));
        let hits = Rc::new(Cell::new(0));

        let weak = Rc::downgrade(&bus);
        let target = victim.clone();
        bus.subscribe(move |_| {
            if let (Some(bus), Some(sub)) = (weak.upgrade(), target.get()) {
                bus.unsubscribe(sub);
            }
            Ok(())
        });
        let h = hits.clone();
        victim.set(Some(bus.subscribe(move |_| {
            h.set(h.get() + 1);
            Ok(())
        })));

        let delivery = bus.publish(&stale("a.ts"));
        assert_eq!(hits.get(), 0);
        assert_eq!(delivery, Delivery { delivered: 1, failed: 0 });
        assert_eq!(bus.subscriber_count(), 1);
    }

    #[test]
    fn test_dispose_all() {
        let bus = MessageBus::new();
        bus.subscribe(|_| Ok(()));
        bus.subscribe(|_| Ok(()));
        bus.dispose_all();
        assert_eq!(bus.subscriber_count(), 0);
        assert_eq!(bus.publish(&stale("a.ts")), Delivery::default());
    }
}

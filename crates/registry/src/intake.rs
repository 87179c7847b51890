//! Ingestion driver for `CreateJobRequest` messages.

use crate::JobRegistry;
use bus::{Message, MessageKind, Subscription};
use std::rc::{Rc, Weak};

/// Runs every registered pass over the requested text and ingests the result.
pub fn attach(registry: &Rc<JobRegistry>) -> Subscription {
    let weak: Weak<JobRegistry> = Rc::downgrade(registry);
    registry
        .bus()
        .subscribe_to(&[MessageKind::CreateJobRequest], move |message| {
            let Message::CreateJobRequest { file, text } = message else {
                return Ok(());
            };
            let Some(registry) = weak.upgrade() else {
                return Ok(());
            };
            registry.analyze(file, text)?;
            Ok(())
        })
}

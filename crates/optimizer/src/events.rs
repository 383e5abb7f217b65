//! Notification channel from the queue engine to its observer.
//!
//! An [`EventChannel`] has at most one live [`Subscription`]. Subscribing again
//! replaces the previous subscriber, whose stream then ends, so an observer can
//! never end up with two delivery paths for the same events.

use std::sync::{Arc, Mutex, MutexGuard};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::job::{DeliveryReport, JobState};
use crate::queue::BatchId;

/// Something that happened to a job
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum JobEvent {
    /// Progress tick while the job is processing
    Progress {
        batch: BatchId,
        index: usize,
        percent: f64,
    },
    /// Final event for a job; nothing follows it for this index
    Complete {
        batch: BatchId,
        index: usize,
        state: JobState,
        #[serde(skip_serializing_if = "Option::is_none")]
        detail: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        delivery: Option<DeliveryReport>,
    },
}

impl JobEvent {
    pub fn batch(&self) -> BatchId {
        match self {
            JobEvent::Progress { batch, .. } | JobEvent::Complete { batch, .. } => *batch,
        }
    }

    pub fn index(&self) -> usize {
        match self {
            JobEvent::Progress { index, .. } | JobEvent::Complete { index, .. } => *index,
        }
    }

    pub fn is_complete(&self) -> bool {
        matches!(self, JobEvent::Complete { .. })
    }
}

/// Single-subscriber event channel
#[derive(Debug, Clone, Default)]
pub struct EventChannel {
    subscriber: Arc<Mutex<Option<mpsc::UnboundedSender<JobEvent>>>>,
}

impl EventChannel {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self) -> MutexGuard<'_, Option<mpsc::UnboundedSender<JobEvent>>> {
        // Slot is only ever replaced whole, poisoning carries no torn state
        self.subscriber.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Become the one active subscriber, ending any previous subscription
    pub fn subscribe(&self) -> Subscription {
        let (tx, rx) = mpsc::unbounded_channel();
        *self.slot() = Some(tx);
        Subscription { rx, batch: None }
    }

    /// Drop the active subscriber; later events are discarded
    pub fn unsubscribe(&self) {
        self.slot().take();
    }

    pub fn has_subscriber(&self) -> bool {
        self.slot().as_ref().is_some_and(|tx| !tx.is_closed())
    }

    /// Deliver an event to the subscriber, if any
    ///
    /// Never blocks: the queue to the subscriber is unbounded.
    pub fn emit(&self, event: JobEvent) {
        let mut slot = self.slot();
        if let Some(tx) = slot.as_ref() {
            if tx.send(event).is_err() {
                // Receiver dropped: treat as unsubscribed
                slot.take();
            }
        }
    }
}

/// Receiving end of an [`EventChannel`]
#[derive(Debug)]
pub struct Subscription {
    rx: mpsc::UnboundedReceiver<JobEvent>,
    batch: Option<BatchId>,
}

impl Subscription {
    /// Only yield events belonging to `batch`
    pub fn for_batch(mut self, batch: BatchId) -> Self {
        self.batch = Some(batch);
        self
    }

    /// Next event, or `None` once the subscription has been replaced or
    /// the channel dropped
    pub async fn recv(&mut self) -> Option<JobEvent> {
        loop {
            let event = self.rx.recv().await?;
            match self.batch {
                Some(batch) if event.batch() != batch => continue,
                _ => return Some(event),
            }
        }
    }

    /// Non-blocking variant of [`recv`](Self::recv)
    pub fn try_recv(&mut self) -> Option<JobEvent> {
        loop {
            let event = self.rx.try_recv().ok()?;
            match self.batch {
                Some(batch) if event.batch() != batch => continue,
                _ => return Some(event),
            }
        }
    }
}

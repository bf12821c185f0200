//! Persist batches and the queues that carry them.

use crate::model::entity::DepartmentEntity;
use crate::model::relationship::RelationshipChange;
use log::warn;
use serde::{Deserialize, Serialize};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Mutex, PoisonError};

/// Which workflow produced a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchKind {
    Create,
    Update,
}

impl BatchKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Update => "update",
        }
    }
}

/// Unit of change handed to downstream persistence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistBatch {
    pub kind: BatchKind,
    /// User uuid from the originating request, if any.
    pub requested_by: Option<String>,
    pub entities: Vec<DepartmentEntity>,
    /// Active declarations first, then deactivations.
    pub relationships: Vec<RelationshipChange>,
}

/// Fire-and-forget outbound queue.
pub trait ChangeQueue {
    /// Hands `batch` to downstream persistence.
    ///
    /// Must not block on the consumer. Delivery is best-effort: a lost batch
    /// is logged by the implementation and never surfaced to the caller.
    fn enqueue(&self, batch: PersistBatch);
}

impl<Q: ChangeQueue + ?Sized> ChangeQueue for &Q {
    fn enqueue(&self, batch: PersistBatch) {
        (**self).enqueue(batch);
    }
}

/// Producer half of an in-process channel queue.
#[derive(Debug, Clone)]
pub struct ChannelQueue {
    sender: Sender<PersistBatch>,
}

/// Consumer half of an in-process channel queue.
#[derive(Debug)]
pub struct BatchReceiver {
    receiver: Receiver<PersistBatch>,
}

/// Creates a connected unbounded queue pair.
pub fn channel_queue() -> (ChannelQueue, BatchReceiver) {
    let (sender, receiver) = mpsc::channel();
    (ChannelQueue { sender }, BatchReceiver { receiver })
}

impl ChangeQueue for ChannelQueue {
    fn enqueue(&self, batch: PersistBatch) {
        let kind = batch.kind;
        if self.sender.send(batch).is_err() {
            warn!(
                "event=batch_enqueue module=publish status=dropped kind={} reason=receiver_closed",
                kind.as_str()
            );
        }
    }
}

impl BatchReceiver {
    /// Takes every batch currently queued without waiting.
    pub fn drain(&self) -> Vec<PersistBatch> {
        self.receiver.try_iter().collect()
    }
}

/// Keeps published batches in memory, in publish order.
#[derive(Debug, Default)]
pub struct RecordingQueue {
    batches: Mutex<Vec<PersistBatch>>,
}

impl RecordingQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every batch enqueued so far.
    pub fn batches(&self) -> Vec<PersistBatch> {
        self.batches
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl ChangeQueue for RecordingQueue {
    fn enqueue(&self, batch: PersistBatch) {
        self.batches
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(batch);
    }
}

//! # Pending Message Queues
//!
//! Messages posted on a channel that is still negotiating are parked here,
//! one FIFO per channel. Each queue sits in the bucket of the gate the
//! channel is waiting on; a queue moves between buckets when its channel
//! advances and is drained in order once the channel opens.

use crate::domain::entities::PendingMessage;
use crate::domain::errors::QueueError;
use crate::domain::port_id::ChannelId;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};

/// Gate a queued channel is waiting on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum QueueBucket {
    AwaitingConsent,
    AwaitingSecret,
    AwaitingActivation,
}

#[derive(Debug)]
struct BucketQueue {
    bucket: QueueBucket,
    messages: VecDeque<PendingMessage>,
}

/// Per-channel FIFOs keyed by channel id.
///
/// A channel has at most one queue, in exactly one bucket.
#[derive(Debug, Default)]
pub struct PendingQueueStore {
    queues: HashMap<ChannelId, BucketQueue>,
}

impl PendingQueueStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty queue for `channel_id` in `bucket`.
    pub fn register(&mut self, channel_id: ChannelId, bucket: QueueBucket) -> Result<(), QueueError> {
        if let Some(existing) = self.queues.get(&channel_id) {
            return Err(QueueError::AlreadyPending {
                channel_id,
                bucket: existing.bucket,
            });
        }
        self.queues.insert(
            channel_id,
            BucketQueue {
                bucket,
                messages: VecDeque::new(),
            },
        );
        Ok(())
    }

    /// Bucket currently holding `channel_id`, if any.
    #[must_use]
    pub fn bucket_of(&self, channel_id: ChannelId) -> Option<QueueBucket> {
        self.queues.get(&channel_id).map(|q| q.bucket)
    }

    /// Append a message. Returns the queue length afterwards.
    pub fn enqueue(
        &mut self,
        channel_id: ChannelId,
        bucket: QueueBucket,
        message: PendingMessage,
    ) -> Result<usize, QueueError> {
        let queue = self.queue_in(channel_id, bucket)?;
        queue.messages.push_back(message);
        Ok(queue.messages.len())
    }

    /// Move a queue from one bucket to another, keeping its contents.
    pub fn transfer(
        &mut self,
        channel_id: ChannelId,
        from: QueueBucket,
        to: QueueBucket,
    ) -> Result<usize, QueueError> {
        let queue = self.queue_in(channel_id, from)?;
        queue.bucket = to;
        Ok(queue.messages.len())
    }

    /// Remove the queue and return its messages in arrival order.
    pub fn drain(
        &mut self,
        channel_id: ChannelId,
        bucket: QueueBucket,
    ) -> Result<Vec<PendingMessage>, QueueError> {
        self.queue_in(channel_id, bucket)?;
        Ok(self
            .queues
            .remove(&channel_id)
            .map(|q| Vec::from(q.messages))
            .unwrap_or_default())
    }

    /// Drop the queue wherever it is. Returns how many messages were lost.
    pub fn discard(&mut self, channel_id: ChannelId) -> usize {
        self.queues
            .remove(&channel_id)
            .map_or(0, |q| q.messages.len())
    }

    /// Messages queued across all channels.
    #[must_use]
    pub fn total_messages(&self) -> usize {
        self.queues.values().map(|q| q.messages.len()).sum()
    }

    fn queue_in(
        &mut self,
        channel_id: ChannelId,
        bucket: QueueBucket,
    ) -> Result<&mut BucketQueue, QueueError> {
        let queue = self
            .queues
            .get_mut(&channel_id)
            .ok_or(QueueError::NotPending(channel_id))?;
        if queue.bucket != bucket {
            return Err(QueueError::BucketMismatch {
                channel_id,
                expected: bucket,
                actual: queue.bucket,
            });
        }
        Ok(queue)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::port_id::PortId;
    use shared_types::Message;

    fn msg(data: &str) -> PendingMessage {
        PendingMessage {
            source_port: PortId::new(0),
            message: Message::new(data),
        }
    }

    fn payloads(messages: &[PendingMessage]) -> Vec<&str> {
        messages.iter().map(|m| m.message.data.as_str()).collect()
    }

    #[test]
    fn test_fifo_order_survives_transfer() {
        let mut store = PendingQueueStore::new();
        let id = ChannelId::new(1);
        store.register(id, QueueBucket::AwaitingConsent).unwrap();
        store.enqueue(id, QueueBucket::AwaitingConsent, msg("a")).unwrap();
        store.enqueue(id, QueueBucket::AwaitingConsent, msg("b")).unwrap();

        let len = store
            .transfer(id, QueueBucket::AwaitingConsent, QueueBucket::AwaitingActivation)
            .unwrap();
        assert_eq!(len, 2);
        store.enqueue(id, QueueBucket::AwaitingActivation, msg("c")).unwrap();

        let drained = store.drain(id, QueueBucket::AwaitingActivation).unwrap();
        assert_eq!(payloads(&drained), vec!["a", "b", "c"]);
        assert_eq!(store.bucket_of(id), None);
    }

    #[test]
    fn test_enqueue_into_wrong_bucket_fails() {
        let mut store = PendingQueueStore::new();
        let id = ChannelId::new(2);
        store.register(id, QueueBucket::AwaitingSecret).unwrap();

        let err = store
            .enqueue(id, QueueBucket::AwaitingConsent, msg("x"))
            .unwrap_err();
        assert_eq!(
            err,
            QueueError::BucketMismatch {
                channel_id: id,
                expected: QueueBucket::AwaitingConsent,
                actual: QueueBucket::AwaitingSecret,
            }
        );
        assert_eq!(store.total_messages(), 0);
    }

    #[test]
    fn test_unregistered_channel() {
        let mut store = PendingQueueStore::new();
        let id = ChannelId::new(3);
        assert_eq!(
            store.enqueue(id, QueueBucket::AwaitingSecret, msg("x")),
            Err(QueueError::NotPending(id))
        );
        assert!(store.drain(id, QueueBucket::AwaitingSecret).is_err());
        assert_eq!(store.discard(id), 0);
    }

    #[test]
    fn test_double_register_fails() {
        let mut store = PendingQueueStore::new();
        let id = ChannelId::new(4);
        store.register(id, QueueBucket::AwaitingConsent).unwrap();
        assert!(matches!(
            store.register(id, QueueBucket::AwaitingSecret),
            Err(QueueError::AlreadyPending { .. })
        ));
    }

    #[test]
    fn test_discard_and_counts() {
        let mut store = PendingQueueStore::new();
        store.register(ChannelId::new(1), QueueBucket::AwaitingConsent).unwrap();
        store.register(ChannelId::new(2), QueueBucket::AwaitingActivation).unwrap();
        store.register(ChannelId::new(3), QueueBucket::AwaitingActivation).unwrap();
        store
            .enqueue(ChannelId::new(2), QueueBucket::AwaitingActivation, msg("a"))
            .unwrap();
        store
            .enqueue(ChannelId::new(2), QueueBucket::AwaitingActivation, msg("b"))
            .unwrap();

        assert_eq!(store.total_messages(), 2);
        assert_eq!(store.bucket_of(ChannelId::new(1)), Some(QueueBucket::AwaitingConsent));
        assert_eq!(store.bucket_of(ChannelId::new(3)), Some(QueueBucket::AwaitingActivation));

        assert_eq!(store.discard(ChannelId::new(2)), 2);
        assert_eq!(store.bucket_of(ChannelId::new(2)), None);
        assert_eq!(store.total_messages(), 0);
    }
}

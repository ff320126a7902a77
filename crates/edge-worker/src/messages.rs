//! Typed control channel between the hosting application and the worker.

use edge_cache::PartitionSet;
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, oneshot};

/// Messages sent by the hosting application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ControlMessage {
    /// Activate the installed version immediately.
    SkipWaiting,
    /// Ask for the current partition names.
    GetCacheInfo,
}

/// Messages sent by the worker, as replies or broadcasts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WorkerMessage {
    /// Reply to [`ControlMessage::GetCacheInfo`].
    CacheInfo(PartitionSet),
    /// Broadcast after deferred work finishes.
    SyncCompleted {
        /// Milliseconds since the Unix epoch.
        timestamp: i64,
    },
}

/// A control message and the channel its reply goes to.
#[derive(Debug)]
pub struct Envelope {
    pub message: ControlMessage,
    pub reply: Option<oneshot::Sender<WorkerMessage>>,
}

/// Sending half of the control channel, held by the host.
#[derive(Debug, Clone)]
pub struct ControlSender {
    tx: mpsc::Sender<Envelope>,
}

/// Receiving half of the control channel, drained by the worker.
#[derive(Debug)]
pub struct ControlReceiver {
    rx: mpsc::Receiver<Envelope>,
}

/// Create a bounded control channel.
pub fn control_channel(buffer: usize) -> (ControlSender, ControlReceiver) {
    let (tx, rx) = mpsc::channel(buffer);
    (ControlSender { tx }, ControlReceiver { rx })
}

/// The worker side of the channel has shut down.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("control channel closed")]
pub struct ChannelClosed;

impl ControlSender {
    /// Send a message without waiting for a reply.
    pub async fn send(&self, message: ControlMessage) -> Result<(), ChannelClosed> {
        self.tx
            .send(Envelope {
                message,
                reply: None,
            })
            .await
            .map_err(|_| ChannelClosed)
    }

    /// Send a message and wait for its reply.
    ///
    /// Returns `Ok(None)` when the message produces no reply.
    pub async fn request(&self, message: ControlMessage) -> Result<Option<WorkerMessage>, ChannelClosed> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(Envelope {
                message,
                reply: Some(reply_tx),
            })
            .await
            .map_err(|_| ChannelClosed)?;

        // A dropped reply sender means the message had nothing to say.
        Ok(reply_rx.await.ok())
    }
}

impl ControlReceiver {
    /// Wait for the next message. `None` once every sender is dropped.
    pub async fn recv(&mut self) -> Option<Envelope> {
        self.rx.recv().await
    }
}

#[cfg(test)]
mod tests {
    use edge_core::WorkerConfig;

    use super::*;

    // === Wire Format Tests ===

    #[test]
    fn test_control_message_wire_format() {
        let msg: ControlMessage = serde_json::from_str(r#"{"type":"SKIP_WAITING"}"#).unwrap();
        assert_eq!(msg, ControlMessage::SkipWaiting);

        let msg: ControlMessage = serde_json::from_str(r#"{"type":"GET_CACHE_INFO"}"#).unwrap();
        assert_eq!(msg, ControlMessage::GetCacheInfo);
    }

    #[test]
    fn test_unknown_control_message_rejected() {
        assert!(serde_json::from_str::<ControlMessage>(r#"{"type":"CLAIM"}"#).is_err());
    }

    #[test]
    fn test_cache_info_wire_format() {
        let info = WorkerMessage::CacheInfo(PartitionSet::from_config(&WorkerConfig::new("5")));
        let json = serde_json::to_value(&info).unwrap();

        assert_eq!(json["type"], "CACHE_INFO");
        assert_eq!(json["staticPartition"], "static-v5");
        assert_eq!(json["dynamicPartition"], "dynamic-v5");
        assert_eq!(json["imagePartition"], "image-v5");
    }

    #[test]
    fn test_sync_completed_wire_format() {
        let json = serde_json::to_string(&WorkerMessage::SyncCompleted { timestamp: 42 }).unwrap();
        assert_eq!(json, r#"{"type":"SYNC_COMPLETED","timestamp":42}"#);
    }

    // === Channel Tests ===

    #[tokio::test]
    async fn test_request_reply() {
        let (sender, mut receiver) = control_channel(4);

        let responder = tokio::spawn(async move {
            let envelope = receiver.recv().await.unwrap();
            assert_eq!(envelope.message, ControlMessage::GetCacheInfo);
            let _ = envelope
                .reply
                .unwrap()
                .send(WorkerMessage::SyncCompleted { timestamp: 1 });
        });

        let reply = sender.request(ControlMessage::GetCacheInfo).await.unwrap();
        assert_eq!(reply, Some(WorkerMessage::SyncCompleted { timestamp: 1 }));
        responder.await.unwrap();
    }

    #[tokio::test]
    async fn test_dropped_reply_is_none() {
        let (sender, mut receiver) = control_channel(4);

        tokio::spawn(async move {
            let envelope = receiver.recv().await.unwrap();
            drop(envelope);
        });

        let reply = sender.request(ControlMessage::SkipWaiting).await.unwrap();
        assert!(reply.is_none());
    }

    #[tokio::test]
    async fn test_send_after_close() {
        let (sender, receiver) = control_channel(1);
        drop(receiver);
        assert_eq!(sender.send(ControlMessage::SkipWaiting).await, Err(ChannelClosed));
    }
}

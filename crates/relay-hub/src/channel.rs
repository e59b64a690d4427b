//! Topic fan-out (Section 4.6, C6).
//!
//! Each conversation gets its own broadcast channel, created lazily on first
//! subscribe. Messages published to a topic reach every socket currently
//! subscribed to it without the publisher needing to know who they are —
//! the counterpart to the registry's user-addressed delivery in
//! [`crate::registry`].

use dashmap::DashMap;
use tokio::sync::broadcast;

use relay_types::{Hex, OutboundFrame};

const CHANNEL_CAPACITY: usize = 256;

/// A conversation hex, used as the broadcast-channel key.
pub type Topic = Hex;

/// Holds one lazily-created broadcast channel per topic.
pub struct ChannelHub {
    channels: DashMap<Topic, broadcast::Sender<OutboundFrame>>,
}

impl ChannelHub {
    pub fn new() -> Self {
        ChannelHub { channels: DashMap::new() }
    }

    /// Subscribes to `topic`, creating its channel if this is the first
    /// subscriber.
    pub fn subscribe(&self, topic: &Topic) -> broadcast::Receiver<OutboundFrame> {
        self.channels
            .entry(topic.clone())
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0)
            .subscribe()
    }

    /// Publishes `frame` to every current subscriber of `topic`. A topic
    /// with no subscribers (or none left) is not an error — the send result
    /// is simply discarded, same as the registry's delivery to a closed
    /// socket.
    pub fn publish(&self, topic: &Topic, frame: OutboundFrame) {
        if let Some(sender) = self.channels.get(topic) {
            let _ = sender.send(frame);
        }
    }

    /// Drops a topic's channel once nothing references it. Calling this
    /// while subscribers remain is harmless; they keep their existing
    /// receiver, and the next `subscribe` simply creates a fresh channel.
    pub fn evict_if_idle(&self, topic: &Topic) {
        if let Some(entry) = self.channels.get(topic) {
            if entry.receiver_count() == 0 {
                let sender = entry.clone();
                drop(entry);
                self.channels.remove_if(topic, |_, s| s.receiver_count() == 0 && s.same_channel(&sender));
            }
        }
    }
}

impl Default for ChannelHub {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_frame() -> OutboundFrame {
        OutboundFrame::system("hi", 1000)
    }

    #[tokio::test]
    async fn subscribers_to_the_same_topic_both_receive_a_publish() {
        let hub = ChannelHub::new();
        let topic = "conv1".to_string();
        let mut a = hub.subscribe(&topic);
        let mut b = hub.subscribe(&topic);

        hub.publish(&topic, sample_frame());

        assert!(a.recv().await.is_ok());
        assert!(b.recv().await.is_ok());
    }

    #[tokio::test]
    async fn publish_to_a_topic_with_no_subscribers_does_not_panic() {
        let hub = ChannelHub::new();
        hub.publish(&"nobody-home".to_string(), sample_frame());
    }

    #[tokio::test]
    async fn publish_does_not_cross_topics() {
        let hub = ChannelHub::new();
        let mut a = hub.subscribe(&"conv1".to_string());
        let mut b = hub.subscribe(&"conv2".to_string());

        hub.publish(&"conv1".to_string(), sample_frame());

        assert!(a.try_recv().is_ok());
        assert!(b.try_recv().is_err());
    }

    #[tokio::test]
    async fn evict_if_idle_removes_a_channel_with_no_subscribers() {
        let hub = ChannelHub::new();
        let topic = "conv1".to_string();
        {
            let _subscriber = hub.subscribe(&topic);
        }
        hub.evict_if_idle(&topic);
        assert_eq!(hub.channels.len(), 0);
    }
}

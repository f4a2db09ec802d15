use std::collections::HashMap;
use std::pin::Pin;
use std::sync::Mutex;
use std::task::{Context, Poll};

use futures::Stream;
use tokio::sync::mpsc;
use tracing::{debug, trace};
use tusker_core::{Envelope, Error, Payload, Result, Topic};

type Subscribers = HashMap<Topic, Vec<mpsc::UnboundedSender<Envelope>>>;

/// In-process publish/subscribe bus over the fixed `/elephant/*` topics.
///
/// Every subscriber owns an unbounded queue, so `publish` never waits on a
/// slow reader. Subscribers whose receiving end was dropped are pruned on the
/// next publish to that topic.
pub struct MessageBus {
    subscribers: Mutex<Subscribers>,
}

impl Default for MessageBus {
    fn default() -> Self {
        Self::new()
    }
}

impl MessageBus {
    pub fn new() -> Self {
        Self {
            subscribers: Mutex::new(HashMap::new()),
        }
    }

    /// Deliver `payload` to every current subscriber of `topic`.
    ///
    /// Returns how many subscribers received it. Publishing to a topic with no
    /// subscribers is a no-op; a payload of the wrong kind is rejected.
    pub fn publish(&self, topic: Topic, payload: Payload) -> Result<usize> {
        if payload.kind() != topic.kind() {
            return Err(Error::Validation(format!(
                "{} carries {:?} payloads, got {:?}",
                topic,
                topic.kind(),
                payload.kind()
            )));
        }

        let envelope = Envelope {
            topic,
            payload,
            published_at_ms: chrono::Utc::now().timestamp_millis(),
        };

        let mut subscribers = self.subscribers.lock().unwrap_or_else(|e| e.into_inner());
        let Some(senders) = subscribers.get_mut(&topic) else {
            trace!(topic = %topic, "Publish with no subscribers");
            return Ok(0);
        };

        let before = senders.len();
        senders.retain(|tx| tx.send(envelope.clone()).is_ok());
        if senders.len() < before {
            debug!(topic = %topic, pruned = before - senders.len(), "Pruned dead subscribers");
        }
        Ok(senders.len())
    }

    pub fn subscribe(&self, topic: Topic) -> Subscription {
        self.subscribe_many(&[topic])
    }

    /// One queue fed by several topics. Ordering holds per publisher and topic.
    pub fn subscribe_many(&self, topics: &[Topic]) -> Subscription {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut subscribers = self.subscribers.lock().unwrap_or_else(|e| e.into_inner());
        for topic in topics {
            subscribers.entry(*topic).or_default().push(tx.clone());
        }
        Subscription { rx }
    }

    pub fn subscriber_count(&self, topic: Topic) -> usize {
        let subscribers = self.subscribers.lock().unwrap_or_else(|e| e.into_inner());
        subscribers
            .get(&topic)
            .map(|senders| senders.iter().filter(|tx| !tx.is_closed()).count())
            .unwrap_or(0)
    }

    /// Drop every subscriber. Receivers drain what is queued and then end.
    pub fn close(&self) {
        let mut subscribers = self.subscribers.lock().unwrap_or_else(|e| e.into_inner());
        subscribers.clear();
    }
}

/// The receiving end of a subscription. Only sees messages published after it
/// was created.
pub struct Subscription {
    rx: mpsc::UnboundedReceiver<Envelope>,
}

impl Subscription {
    /// Wait for the next message. `None` once the bus has been closed.
    pub async fn recv(&mut self) -> Option<Envelope> {
        self.rx.recv().await
    }

    pub fn try_recv(&mut self) -> Option<Envelope> {
        self.rx.try_recv().ok()
    }
}

impl Stream for Subscription {
    type Item = Envelope;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Envelope>> {
        self.get_mut().rx.poll_recv(cx)
    }
}

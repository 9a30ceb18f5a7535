//! Topic-based event bus implementation.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tokio::sync::broadcast;

use super::types::{DispatchEvent, ScheduleEvent};

/// Topics for event routing
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Serialize, Deserialize, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum Topic {
    /// Action resolution (phases, missing performers, handler failures)
    Dispatch,
    /// Delayed actions (scheduling, cancellation, pause/resume)
    Schedule,
}

/// Event wrapper that carries the topic and typed event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Event {
    Dispatch(DispatchEvent),
    Schedule(ScheduleEvent),
}

impl Event {
    pub fn topic(&self) -> Topic {
        match self {
            Event::Dispatch(_) => Topic::Dispatch,
            Event::Schedule(_) => Topic::Schedule,
        }
    }
}

impl From<DispatchEvent> for Event {
    fn from(event: DispatchEvent) -> Self {
        Event::Dispatch(event)
    }
}

impl From<ScheduleEvent> for Event {
    fn from(event: ScheduleEvent) -> Self {
        Event::Schedule(event)
    }
}

/// Topic-based event bus
///
/// Allows consumers to subscribe to specific topics and only receive
/// events they care about. Cloning shares the underlying channels.
#[derive(Clone)]
pub struct EventBus {
    dispatch: broadcast::Sender<Event>,
    schedule: broadcast::Sender<Event>,
}

impl EventBus {
    /// Creates a new event bus with default capacity for each topic
    pub fn new() -> Self {
        Self::with_capacity(100)
    }

    /// Creates a new event bus with specified capacity per topic
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            dispatch: broadcast::channel(capacity).0,
            schedule: broadcast::channel(capacity).0,
        }
    }

    fn sender(&self, topic: Topic) -> &broadcast::Sender<Event> {
        match topic {
            Topic::Dispatch => &self.dispatch,
            Topic::Schedule => &self.schedule,
        }
    }

    /// Publish an event to its corresponding topic
    pub fn publish(&self, event: impl Into<Event>) {
        let event = event.into();
        let topic = event.topic();

        if self.sender(topic).send(event).is_err() {
            // No subscribers for this topic - this is normal, not an error
            tracing::trace!("No subscribers for topic {}", topic);
        }
    }

    /// Subscribe to a specific topic
    ///
    /// Returns a receiver that will only receive events for that topic.
    pub fn subscribe(&self, topic: Topic) -> broadcast::Receiver<Event> {
        self.sender(topic).subscribe()
    }

    /// Subscribe to multiple topics
    ///
    /// Returns receivers for each requested topic.
    pub fn subscribe_multiple(
        &self,
        topics: &[Topic],
    ) -> HashMap<Topic, broadcast::Receiver<Event>> {
        topics
            .iter()
            .map(|&topic| (topic, self.subscribe(topic)))
            .collect()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn routes_events_by_topic() {
        let bus = EventBus::with_capacity(4);
        let mut dispatch = bus.subscribe(Topic::Dispatch);
        let mut schedule = bus.subscribe(Topic::Schedule);

        bus.publish(ScheduleEvent::Paused);
        bus.publish(DispatchEvent::ActionCompleted {
            action: "Strike".into(),
            depth: 0,
        });

        assert_eq!(
            schedule.recv().await.unwrap(),
            Event::Schedule(ScheduleEvent::Paused)
        );
        assert_eq!(dispatch.recv().await.unwrap().topic(), Topic::Dispatch);
        assert!(schedule.try_recv().is_err());
    }

    #[test]
    fn publishing_without_subscribers_is_silent() {
        let bus = EventBus::default();
        bus.publish(ScheduleEvent::Resumed);
    }
}

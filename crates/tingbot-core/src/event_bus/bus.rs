//! Event Bus implementation.
//!
//! Topic-keyed publish/subscribe. Handlers registered on a topic are called
//! synchronously on the publishing task, in registration order. Every
//! publication is also forwarded to a broadcast channel for async consumers.

use parking_lot::RwLock;
use std::sync::Arc;
use tokio::sync::broadcast;
use uuid::Uuid;

use super::events::{BacklightEvent, BacklightTopic, ButtonEvent, TingbotEvent};

/// Subscription handle for unsubscribing from events
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(Uuid);

impl SubscriptionId {
    /// Create a new unique subscription ID
    fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl std::fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Sub({})", &self.0.to_string()[..8])
    }
}

/// Type alias for event handler functions
type EventHandler = Arc<dyn Fn(TingbotEvent) + Send + Sync>;

struct Registration {
    id: SubscriptionId,
    topic: String,
    once: bool,
    handler: EventHandler,
}

/// A publication as seen by broadcast receivers
#[derive(Debug, Clone, PartialEq)]
pub struct Published {
    pub topic: String,
    pub event: TingbotEvent,
}

/// Configuration for the event bus
#[derive(Debug, Clone)]
pub struct EventBusConfig {
    /// Channel capacity for broadcast.
    pub channel_capacity: usize,
}

impl Default for EventBusConfig {
    fn default() -> Self {
        Self {
            channel_capacity: 1024,
        }
    }
}

/// Topic event bus shared by the controller components and the application
pub struct EventBus {
    /// Broadcast channel sender
    sender: broadcast::Sender<Published>,
    /// Registered handlers, in registration order
    handlers: RwLock<Vec<Registration>>,
    /// Configuration
    config: EventBusConfig,
}

impl EventBus {
    /// Create a new event bus with default configuration
    pub fn new() -> Self {
        Self::with_config(EventBusConfig::default())
    }

    /// Create a new event bus with custom configuration
    pub fn with_config(config: EventBusConfig) -> Self {
        let (sender, _) = broadcast::channel(config.channel_capacity);
        Self {
            sender,
            handlers: RwLock::new(Vec::new()),
            config,
        }
    }

    /// Publish an event on a single topic
    ///
    /// Returns the number of handlers that were called. Handlers run after
    /// the registry lock is released, so they may publish, subscribe or
    /// unsubscribe themselves. Once-handlers are removed before they run.
    pub fn publish(&self, topic: &str, event: &TingbotEvent) -> usize {
        let matched: Vec<EventHandler> = {
            let mut handlers = self.handlers.write();
            let matched = handlers
                .iter()
                .filter(|r| r.topic == topic)
                .map(|r| r.handler.clone())
                .collect();
            handlers.retain(|r| !(r.once && r.topic == topic));
            matched
        };

        for handler in &matched {
            handler(event.clone());
        }

        // Err only means nobody holds a receiver
        let _ = self.sender.send(Published {
            topic: topic.to_string(),
            event: event.clone(),
        });

        matched.len()
    }

    /// Publish a backlight value on one of the backlight topics
    pub fn emit_backlight(&self, topic: BacklightTopic, value: u32) {
        let event = TingbotEvent::Backlight(BacklightEvent { value });
        self.publish(topic.as_str(), &event);
    }

    /// Publish a button transition on all of its topics, in order
    pub fn emit_button(&self, button: ButtonEvent) {
        let topics = button.topics();
        let event = TingbotEvent::Button(button);
        for topic in &topics {
            self.publish(topic, &event);
        }
    }

    /// Subscribe to a topic until unsubscribed
    pub fn subscribe<F>(&self, topic: impl Into<String>, handler: F) -> SubscriptionId
    where
        F: Fn(TingbotEvent) + Send + Sync + 'static,
    {
        self.register(topic.into(), false, Arc::new(handler))
    }

    /// Subscribe to the next event on a topic only
    pub fn subscribe_once<F>(&self, topic: impl Into<String>, handler: F) -> SubscriptionId
    where
        F: Fn(TingbotEvent) + Send + Sync + 'static,
    {
        self.register(topic.into(), true, Arc::new(handler))
    }

    fn register(&self, topic: String, once: bool, handler: EventHandler) -> SubscriptionId {
        let id = SubscriptionId::new();
        tracing::debug!("Subscription {} added for '{}'", id, topic);
        self.handlers.write().push(Registration {
            id,
            topic,
            once,
            handler,
        });
        id
    }

    /// Get a receiver for manual event polling
    ///
    /// This is useful for async contexts where you want to receive events
    /// in a tokio task.
    pub fn receiver(&self) -> broadcast::Receiver<Published> {
        self.sender.subscribe()
    }

    /// Unsubscribe from events
    ///
    /// Returns true if the subscription was found and removed.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut handlers = self.handlers.write();
        let before = handlers.len();
        handlers.retain(|r| r.id != id);
        let removed = handlers.len() != before;
        if removed {
            tracing::debug!("Subscription {} removed", id);
        }
        removed
    }

    /// Get the number of active subscriptions
    pub fn subscriber_count(&self) -> usize {
        self.handlers.read().len()
    }

    /// Get the current configuration
    pub fn config(&self) -> &EventBusConfig {
        &self.config
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("subscribers", &self.subscriber_count())
            .field("config", &self.config)
            .finish()
    }
}

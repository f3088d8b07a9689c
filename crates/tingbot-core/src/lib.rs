//! # Tingbot Core
//!
//! Core types for the Tingbot controller: the error hierarchy, the typed
//! button and backlight events, and the topic event bus they travel on.

pub mod error;
pub mod event_bus;

pub use error::{ButtonError, Error, HardwareError, Result};

pub use event_bus::{
    BacklightEvent, BacklightTopic, ButtonEvent, ButtonName, Direction, EventBus, EventBusConfig,
    Published, SubscriptionId, TingbotEvent,
};

//! # Event Bus Module
//!
//! Topic-addressed publish/subscribe between the hardware components and the
//! application.
//!
//! ## Overview
//!
//! - Components publish typed events; the topic strings are derived from the
//!   event fields (`button#1:down`, `button-left`, `backlight:tween`, ...)
//! - Subscribers register a handler on one exact topic, either persistently
//!   or for a single delivery
//! - Async consumers can also poll a broadcast receiver
//!
//! ## Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use tingbot_core::event_bus::{EventBus, TingbotEvent};
//!
//! let bus = Arc::new(EventBus::new());
//!
//! let subscription = bus.subscribe("button-left:up", |event| {
//!     if let TingbotEvent::Button(button) = event {
//!         println!("left released after {:?}", button.changed - button.changed_before);
//!     }
//! });
//!
//! bus.subscribe_once("backlight:tweendone", |event| println!("{}", event.description()));
//!
//! bus.unsubscribe(subscription);
//! ```

mod bus;
mod events;

pub use bus::*;
pub use events::*;

//! Event type definitions for the event bus.
//!
//! Events are typed; the string topics subscribers listen on are derived
//! from the structured fields at publish time. Events serialize to flat
//! JSON objects tagged with a `type` field.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Root event enum for all controller events
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum TingbotEvent {
    /// Backlight brightness changes
    Backlight(BacklightEvent),
    /// Button press/release transitions
    Button(ButtonEvent),
}

impl TingbotEvent {
    /// Get a short description of this event for logging
    pub fn description(&self) -> String {
        match self {
            TingbotEvent::Backlight(e) => format!("Backlight {}", e.value),
            TingbotEvent::Button(e) => format!("Button {} {}", e.name, e.direction),
        }
    }

    /// Serialize to the JSON payload shape
    pub fn to_json(&self) -> serde_json::Value {
        // plain data, serialization cannot fail
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

impl From<BacklightEvent> for TingbotEvent {
    fn from(event: BacklightEvent) -> Self {
        TingbotEvent::Backlight(event)
    }
}

impl From<ButtonEvent> for TingbotEvent {
    fn from(event: ButtonEvent) -> Self {
        TingbotEvent::Button(event)
    }
}

/// Which backlight topic an event is published on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BacklightTopic {
    /// `backlight`: a new value was settled.
    Changed,
    /// `backlight:tween`: an intermediate animation step was written.
    Tween,
    /// `backlight:tweendone`: an animation reached its target.
    TweenDone,
}

impl BacklightTopic {
    /// Topic string for subscriptions
    pub fn as_str(&self) -> &'static str {
        match self {
            BacklightTopic::Changed => "backlight",
            BacklightTopic::Tween => "backlight:tween",
            BacklightTopic::TweenDone => "backlight:tweendone",
        }
    }
}

impl std::fmt::Display for BacklightTopic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Backlight payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BacklightEvent {
    /// PWM duty value.
    pub value: u32,
}

/// Button travel direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Released
    Up,
    /// Pressed
    Down,
}

impl Direction {
    /// Direction for a logical pressed state
    pub fn from_isdown(isdown: bool) -> Self {
        if isdown {
            Direction::Down
        } else {
            Direction::Up
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Up => "up",
            Direction::Down => "down",
        }
    }
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The four buttons along the top of the board, left to right
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ButtonName {
    Left,
    CenterLeft,
    CenterRight,
    Right,
}

impl ButtonName {
    /// All buttons in index order
    pub const ALL: [ButtonName; 4] = [
        ButtonName::Left,
        ButtonName::CenterLeft,
        ButtonName::CenterRight,
        ButtonName::Right,
    ];

    /// Button at the given index, if any
    pub fn from_number(number: usize) -> Option<Self> {
        Self::ALL.get(number).copied()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ButtonName::Left => "left",
            ButtonName::CenterLeft => "center-left",
            ButtonName::CenterRight => "center-right",
            ButtonName::Right => "right",
        }
    }
}

impl std::fmt::Display for ButtonName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Button transition payload
///
/// A snapshot of the button state right after a transition was recorded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ButtonEvent {
    /// Index 0..=3, left to right.
    pub number: usize,
    /// BCM GPIO pin.
    pub pin: u8,
    pub name: ButtonName,
    pub isdown: bool,
    pub direction: Direction,
    /// Raw sample that triggered the transition, if the hardware gave one.
    pub value: Option<i64>,
    /// Time of this transition.
    pub changed: DateTime<Utc>,
    /// Time of the transition before this one.
    #[serde(rename = "changedBefore")]
    pub changed_before: DateTime<Utc>,
}

impl ButtonEvent {
    /// Topics a transition is published on, in publish order
    ///
    /// Any button, by index, by name, and by pin, each once on its own and
    /// once suffixed with the direction.
    pub fn topics(&self) -> [String; 8] {
        let direction = self.direction;
        let number = format!("button#{}", self.number);
        let name = format!("button-{}", self.name);
        let pin = format!("button/{}", self.pin);
        let number_dir = format!("{number}:{direction}");
        let name_dir = format!("{name}:{direction}");
        let pin_dir = format!("{pin}:{direction}");
        [
            "button".to_string(),
            format!("button:{direction}"),
            number,
            number_dir,
            name,
            name_dir,
            pin,
            pin_dir,
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_button() -> ButtonEvent {
        let now = Utc::now();
        ButtonEvent {
            number: 1,
            pin: 23,
            name: ButtonName::CenterLeft,
            isdown: true,
            direction: Direction::Down,
            value: Some(0),
            changed: now,
            changed_before: now,
        }
    }

    #[test]
    fn test_button_topics_order() {
        let topics = sample_button().topics();
        assert_eq!(
            topics,
            [
                "button",
                "button:down",
                "button#1",
                "button#1:down",
                "button-center-left",
                "button-center-left:down",
                "button/23",
                "button/23:down",
            ]
        );
    }

    #[test]
    fn test_backlight_payload_shape() {
        let event = TingbotEvent::from(BacklightEvent { value: 1200 });
        assert_eq!(
            event.to_json(),
            serde_json::json!({ "type": "backlight", "value": 1200 })
        );
    }

    #[test]
    fn test_button_payload_shape() {
        let json = TingbotEvent::from(sample_button()).to_json();
        assert_eq!(json["type"], "button");
        assert_eq!(json["number"], 1);
        assert_eq!(json["pin"], 23);
        assert_eq!(json["name"], "center-left");
        assert_eq!(json["isdown"], true);
        assert_eq!(json["direction"], "down");
        assert_eq!(json["value"], 0);
        assert!(json["changed"].is_string());
        assert!(json["changedBefore"].is_string());
    }

    #[test]
    fn test_button_name_lookup() {
        assert_eq!(ButtonName::from_number(3), Some(ButtonName::Right));
        assert_eq!(ButtonName::from_number(4), None);
        assert_eq!(Direction::from_isdown(false).to_string(), "up");
    }
}

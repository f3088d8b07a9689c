use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tingbot_core::{ButtonError, ButtonEvent, EventBus, Published, TingbotEvent};
use tingbot_hardware::{ButtonTracker, RecordingActuator};
use tingbot_settings::ButtonSettings;
use tokio::sync::broadcast;

async fn tracker() -> (ButtonTracker, Arc<RecordingActuator>, Arc<EventBus>) {
    let actuator = Arc::new(RecordingActuator::new());
    let bus = Arc::new(EventBus::new());
    let tracker = ButtonTracker::new(&ButtonSettings::default(), actuator.clone(), bus.clone()).await;
    (tracker, actuator, bus)
}

/// Wait for up to `count` publications
async fn collect(receiver: &mut broadcast::Receiver<Published>, count: usize) -> Vec<Published> {
    let mut seen = Vec::new();
    while seen.len() < count {
        match tokio::time::timeout(Duration::from_secs(1), receiver.recv()).await {
            Ok(Ok(published)) => seen.push(published),
            _ => break,
        }
    }
    seen
}

async fn assert_quiet(receiver: &mut broadcast::Receiver<Published>) {
    let next = tokio::time::timeout(Duration::from_millis(100), receiver.recv()).await;
    assert!(next.is_err(), "unexpected event: {:?}", next);
}

fn button(published: &Published) -> ButtonEvent {
    match &published.event {
        TingbotEvent::Button(event) => event.clone(),
        other => panic!("expected a button event, got {:?}", other),
    }
}

/// Payload with timestamps cleared, for comparing separate runs
fn timeless(mut event: ButtonEvent) -> ButtonEvent {
    event.changed = chrono::DateTime::UNIX_EPOCH;
    event.changed_before = chrono::DateTime::UNIX_EPOCH;
    event
}

#[tokio::test]
async fn test_press_fans_out_on_eight_topics() {
    let (_tracker, actuator, bus) = tracker().await;
    let mut receiver = bus.receiver();

    // active low: pulling pin 23 low presses center-left
    assert!(actuator.drive(23, false));
    let published = collect(&mut receiver, 8).await;

    let topics: Vec<&str> = published.iter().map(|p| p.topic.as_str()).collect();
    assert_eq!(
        topics,
        vec![
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

    let first = &published[0].event;
    assert!(published.iter().all(|p| &p.event == first));

    let event = button(&published[0]);
    assert_eq!(event.number, 1);
    assert_eq!(event.pin, 23);
    assert!(event.isdown);
    assert_eq!(event.value, Some(0));

    let json = first.to_json();
    assert_eq!(json["type"], "button");
    assert_eq!(json["name"], "center-left");
    assert_eq!(json["direction"], "down");

    assert_quiet(&mut receiver).await;
}

#[tokio::test]
async fn test_repeated_level_is_debounced() {
    let (tracker, actuator, bus) = tracker().await;
    let mut receiver = bus.receiver();

    actuator.drive(17, false);
    assert_eq!(collect(&mut receiver, 8).await.len(), 8);

    // same level again, with and without a fresh sample
    actuator.drive(17, false);
    actuator.emit_edge(17, None);
    assert_quiet(&mut receiver).await;
    assert_eq!(tracker.handle_edge(17, None).await, Ok(false));

    actuator.drive(17, true);
    let released = collect(&mut receiver, 8).await;
    assert_eq!(released.len(), 8);
    assert_eq!(released[1].topic, "button:up");

    let left = tracker.state(0).expect("valid button");
    assert!(!left.isdown);
    assert!(left.changed >= left.changed_before);
}

#[tokio::test]
async fn test_simulation_matches_hardware() {
    let (simulated, _, sim_bus) = tracker().await;
    let (wired, actuator, wired_bus) = tracker().await;
    let mut sim_events = sim_bus.receiver();
    let mut wired_events = wired_bus.receiver();

    assert_eq!(simulated.simulate_down(2), Ok(true));
    assert_eq!(simulated.simulate_up(2), Ok(true));

    actuator.drive(24, false);
    let mut from_wire = collect(&mut wired_events, 8).await;
    actuator.drive(24, true);
    from_wire.extend(collect(&mut wired_events, 8).await);

    let from_sim = collect(&mut sim_events, 16).await;
    assert_eq!(from_sim.len(), 16);
    assert_eq!(from_wire.len(), 16);

    for (sim, wire) in from_sim.iter().zip(&from_wire) {
        assert_eq!(sim.topic, wire.topic);
        assert_eq!(timeless(button(sim)), timeless(button(wire)));
    }

    drop(wired);
}

#[tokio::test]
async fn test_invalid_simulation_leaves_state_alone() {
    let (tracker, _, bus) = tracker().await;
    let mut receiver = bus.receiver();
    let before = tracker.states();

    assert_eq!(
        tracker.simulate_down(7),
        Err(ButtonError::InvalidArgument { number: 7, max: 3 })
    );
    assert!(tracker.simulate_up(4).is_err());

    assert_eq!(tracker.states(), before);
    assert_quiet(&mut receiver).await;
}

#[tokio::test]
async fn test_once_subscription_fires_once() {
    let (tracker, _, bus) = tracker().await;

    let presses = Arc::new(AtomicUsize::new(0));
    let p = presses.clone();
    bus.subscribe_once("button-right:down", move |_| {
        p.fetch_add(1, Ordering::SeqCst);
    });

    tracker.simulate_down(3).expect("valid button");
    tracker.simulate_up(3).expect("valid button");
    tracker.simulate_down(3).expect("valid button");
    assert_eq!(presses.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_transition_from_handler_waits_for_fan_out() {
    let (tracker, _, bus) = tracker().await;
    let tracker = Arc::new(tracker);
    let mut receiver = bus.receiver();

    // release left as soon as its press is seen
    let inner = tracker.clone();
    bus.subscribe_once("button:down", move |_| {
        assert_eq!(inner.simulate_up(0), Ok(true));
        assert!(!inner.state(0).expect("valid button").isdown);
    });

    let seen = Arc::new(parking_lot::Mutex::new(Vec::new()));
    let s = seen.clone();
    bus.subscribe("button-left:down", move |event| s.lock().push(("down", event)));
    let s = seen.clone();
    bus.subscribe("button-left:up", move |event| s.lock().push(("up", event)));

    assert_eq!(tracker.simulate_down(0), Ok(true));

    let published = collect(&mut receiver, 16).await;
    let topics: Vec<&str> = published.iter().map(|p| p.topic.as_str()).collect();
    assert_eq!(
        topics,
        vec![
            "button",
            "button:down",
            "button#0",
            "button#0:down",
            "button-left",
            "button-left:down",
            "button/17",
            "button/17:down",
            "button",
            "button:up",
            "button#0",
            "button#0:up",
            "button-left",
            "button-left:up",
            "button/17",
            "button/17:up",
        ]
    );
    assert!(published[..8].iter().all(|p| button(p).isdown));
    assert!(published[8..].iter().all(|p| !button(p).isdown));

    let order: Vec<&str> = seen.lock().iter().map(|(label, _)| *label).collect();
    assert_eq!(order, vec!["down", "up"]);
    assert!(!tracker.state(0).expect("valid button").isdown);
}

#[tokio::test]
async fn test_shutdown_stops_listening() {
    let (tracker, actuator, bus) = tracker().await;
    assert!(tracker.is_listening());
    let mut receiver = bus.receiver();

    tracker.shutdown();
    tokio::task::yield_now().await;
    assert!(!tracker.is_listening());

    actuator.drive(14, false);
    assert_quiet(&mut receiver).await;
}

//! Integration tests for the layout automation context

use std::cell::Cell;
use std::rc::Rc;
use std::thread;

use cake_layout::{
    config::{short_string, RouteConfig},
    hal::{mock_registry, with_mock_devices, MockClock, MockDisplay},
    Clock, DeviceValue, Direction, EventData, EventKind, EventQueue, Layout, LayoutConfig,
    LayoutError, MoveProfile, Speed,
};

fn run_until_idle(layout: &mut Layout, clock: &mut MockClock, display: &mut MockDisplay) {
    layout.pump(clock.now_ms(), display);
    while let Some(due) = layout.devices().next_deadline() {
        clock.set(due);
        layout.pump(clock.now_ms(), display);
    }
}

fn count_callbacks(layout: &mut Layout) -> Rc<Cell<u32>> {
    let calls = Rc::new(Cell::new(0));
    let seen = Rc::clone(&calls);
    layout
        .orchestrator_mut()
        .set_callback(move || seen.set(seen.get() + 1));
    calls
}

// ============================================================================
// Transit sequence
// ============================================================================

#[test]
fn full_sequence_from_restart_transit() {
    let mut layout = with_mock_devices(&LayoutConfig::default()).unwrap();
    let calls = count_callbacks(&mut layout);
    let mut clock = MockClock::new();
    let mut display = MockDisplay::new();

    // play the operator: run whatever is current until nothing is
    let mut runs = Vec::new();
    while let Some(key) = layout
        .orchestrator()
        .current_transit()
        .map(|t| t.key().to_string())
    {
        runs.push(key);
        assert!(layout.run_current(clock.now_ms()).unwrap());
        run_until_idle(&mut layout, &mut clock, &mut display);
        assert!(layout.is_idle());
    }

    assert_eq!(runs, ["MD", "R1", "R2", "R3", "MU"]);
    assert_eq!(calls.get(), 4);
    assert_eq!(
        display.completions,
        ["R1", "R2", "R3", "MU"].map(|k| Some(k.to_string()))
    );
    // one motor completion per transit, M0 included
    assert_eq!(display.count("L1", EventKind::ActionDone), 11);
    assert_eq!(layout.routes().current_route_name(), Some("Main"));
    assert!(layout.orchestrator().next_transit_name().is_none());
}

#[test]
fn restart_after_sequence_end() {
    let mut layout = with_mock_devices(&LayoutConfig::default()).unwrap();
    let mut clock = MockClock::new();
    let mut display = MockDisplay::new();

    layout.run_transit("M0", 0).unwrap();
    run_until_idle(&mut layout, &mut clock, &mut display);
    assert!(layout.orchestrator().current_transit().is_none());

    layout.orchestrator_mut().restart("MD").unwrap();
    assert_eq!(
        layout.orchestrator().current_transit().map(|t| t.key()),
        Some("MD")
    );
}

#[test]
fn transit_waits_for_slow_sector() {
    let mut layout = with_mock_devices(&LayoutConfig::default()).unwrap();
    let mut clock = MockClock::new();
    let mut display = MockDisplay::new();

    // Coach needs the plate to swing from M to C
    layout.run_transit("C1", 0).unwrap();
    run_until_idle(&mut layout, &mut clock, &mut display);

    let plate_done = display
        .events
        .iter()
        .zip(&display.sources)
        .position(|(r, s)| s == "S1" && r.kind == EventKind::ActionDone)
        .unwrap();
    let motor_init = display
        .events
        .iter()
        .zip(&display.sources)
        .position(|(r, s)| s == "L1" && r.kind == EventKind::ActionInit)
        .unwrap();
    assert!(motor_init > plate_done);
}

// ============================================================================
// Motor through the layout
// ============================================================================

#[test]
fn ramped_move_ends_stopped() {
    let mut layout = with_mock_devices(&LayoutConfig::default()).unwrap();
    let mut clock = MockClock::new();
    let mut display = MockDisplay::new();

    layout
        .move_motor(33, MoveProfile::ramped(Speed::Medium), 0)
        .unwrap();
    run_until_idle(&mut layout, &mut clock, &mut display);

    let motor = layout.devices().motor_id().unwrap();
    let last = display
        .events
        .iter()
        .rev()
        .find(|r| r.source == motor)
        .unwrap();
    assert_eq!(last.kind, EventKind::ActionDone);
    assert_eq!(last.data, EventData::Direction(Direction::Stopped));
    // ramps only ever slow the move down
    assert!(clock.now_ms() > 33 * 64 * 10);
}

#[test]
fn second_move_supersedes_first() {
    let mut layout = with_mock_devices(&LayoutConfig::default()).unwrap();
    let mut clock = MockClock::new();
    let mut display = MockDisplay::new();

    layout
        .move_motor(10, MoveProfile::cruise(Speed::Slow), 0)
        .unwrap();
    clock.set(100);
    layout.pump(100, &mut display);
    layout
        .move_motor(-1, MoveProfile::cruise(Speed::Fast), 100)
        .unwrap();
    run_until_idle(&mut layout, &mut clock, &mut display);

    assert_eq!(display.count("L1", EventKind::ActionInit), 2);
    assert_eq!(display.count("L1", EventKind::ActionDone), 1);
    assert_eq!(clock.now_ms(), 100 + 64 * 4);
}

// ============================================================================
// Construction
// ============================================================================

#[test]
fn unregistered_route_device_is_device_not_found() {
    let config = LayoutConfig::default()
        .with_relays(&["R1", "R2", "R3", "R4"])
        .with_route(RouteConfig::new("Yard").with_command("R4", DeviceValue::Level(1)));
    let devices = mock_registry(&LayoutConfig::default(), EventQueue::shared()).unwrap();

    let err = Layout::new(&config, devices).unwrap_err();
    assert_eq!(err, LayoutError::DeviceNotFound(short_string("R4")));
    assert!(!err.is_recoverable());
}

#[cfg(feature = "toml")]
#[test]
fn shipped_layout_file_is_the_builtin_layout() {
    let text = include_str!("../layouts/blackwater.toml");
    let config = LayoutConfig::from_toml_str(text).unwrap();
    assert_eq!(config, LayoutConfig::default());
}

// ============================================================================
// Producers
// ============================================================================

#[test]
fn inputs_report_from_other_threads() {
    let mut layout = with_mock_devices(&LayoutConfig::default()).unwrap();
    let encoder = layout.event_source("QUI").unwrap();
    let button = layout.event_source("SW1").unwrap();

    let turns = thread::spawn(move || {
        for step in [1, 1, -1, 1, -1, -1, 1, 1] {
            encoder.rotated(step).unwrap();
        }
    });
    let presses = thread::spawn(move || {
        for _ in 0..4 {
            button.switched(true).unwrap();
            button.switched(false).unwrap();
        }
    });
    turns.join().unwrap();
    presses.join().unwrap();

    let mut display = MockDisplay::new();
    assert_eq!(layout.pump(0, &mut display), 16);
    assert_eq!(display.count("QUI", EventKind::Quadrature), 8);
    assert_eq!(display.count("SW1", EventKind::Switch), 8);
    // MD is current but idle; the inputs did not start it
    assert!(layout.is_idle());
}

#[test]
fn full_queue_rejects_and_recovers() {
    let mut layout = with_mock_devices(&LayoutConfig::default()).unwrap();
    let button = layout.event_source("SW1").unwrap();

    for _ in 0..16 {
        button.switched(true).unwrap();
    }
    let err = button.switched(true).unwrap_err();
    assert_eq!(err, LayoutError::QueueFull);
    assert!(err.is_recoverable());

    let mut display = MockDisplay::new();
    assert_eq!(layout.pump(0, &mut display), 16);
    assert!(button.switched(true).is_ok());
}

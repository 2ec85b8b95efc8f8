//! Mock implementations for testing without hardware.
//!
//! This module provides test doubles for the bridge, pins, servo, clock
//! and display, enabling development and testing on desktop without a
//! layout attached.
//!
//! # Available Mocks
//!
//! | Mock | Trait | Purpose |
//! |------|-------|---------|
//! | [`MockPhases`] | [`PhaseDriver`] | Records coil duty writes |
//! | [`MockPin`] | `OutputPin` + `StatefulOutputPin` | Relay output, can be made to fail |
//! | [`MockServo`] | `SetDutyCycle` | Sector servo pulse, can be made to fail |
//! | [`MockClock`] | [`Clock`] | Controllable time source |
//! | [`MockDisplay`] | [`EventDisplay`] | Records shown events |
//!
//! [`mock_registry`] and [`with_mock_devices`] build a complete simulated
//! layout from a [`LayoutConfig`].
//!
//! # Example
//!
//! ```rust
//! use cake_layout::config::LayoutConfig;
//! use cake_layout::hal::{with_mock_devices, MockClock, MockDisplay};
//! use cake_layout::traits::Clock;
//!
//! let mut layout = with_mock_devices(&LayoutConfig::default()).unwrap();
//! let mut clock = MockClock::new();
//! let mut display = MockDisplay::new();
//!
//! layout.set_route("Main", clock.now_ms()).unwrap();
//! while let Some(due) = layout.devices().next_deadline() {
//!     clock.set(due);
//!     layout.pump(clock.now_ms(), &mut display);
//! }
//! assert!(layout.routes().get("Main").unwrap().is_route_set(layout.devices()));
//! ```
//!
//! [`PhaseDriver`]: crate::traits::PhaseDriver
//! [`Clock`]: crate::traits::Clock
//! [`EventDisplay`]: crate::traits::EventDisplay

use alloc::boxed::Box;
use alloc::string::String;
use alloc::sync::Arc;
use alloc::vec::Vec;

use embedded_hal::digital::{self, ErrorType, OutputPin, StatefulOutputPin};
use embedded_hal::pwm::{self, SetDutyCycle};

use crate::config::LayoutConfig;
use crate::devices::{InputDevice, Relay, SectorPlate};
use crate::error::LayoutError;
use crate::event::{EventKind, EventQueue, EventReport};
use crate::layout::Layout;
use crate::motor::LinearMotor;
use crate::registry::DeviceRegistry;
use crate::traits::{Clock, EventDisplay, PhaseDriver};

// ============================================================================
// Hardware Mocks
// ============================================================================

/// Error returned by a mock told to fail.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MockHalError;

impl digital::Error for MockHalError {
    fn kind(&self) -> digital::ErrorKind {
        digital::ErrorKind::Other
    }
}

impl pwm::Error for MockHalError {
    fn kind(&self) -> pwm::ErrorKind {
        pwm::ErrorKind::Other
    }
}

/// Mock motor bridge for testing.
///
/// Records the last duty row and counts writes. Use the public fields to
/// inspect state after test operations.
///
/// # Example
///
/// ```rust
/// use cake_layout::hal::MockPhases;
/// use cake_layout::traits::PhaseDriver;
///
/// let mut phases = MockPhases::new();
/// phases.set_duties([1, 2, 3, 4]).unwrap();
///
/// assert_eq!(phases.duties, [1, 2, 3, 4]);
/// assert_eq!(phases.writes, 1);
///
/// phases.fail = true;
/// assert!(phases.set_duties([0; 4]).is_err());
/// assert_eq!(phases.writes, 1);
/// ```
#[derive(Debug, Default)]
pub struct MockPhases {
    /// Last duty row written (A1, A2, B1, B2).
    pub duties: [u16; 4],
    /// Number of successful writes.
    pub writes: usize,
    /// Fail every write while set.
    pub fail: bool,
}

impl MockPhases {
    /// Creates a new mock bridge with all duties at zero.
    pub fn new() -> Self {
        Self::default()
    }
}

impl PhaseDriver for MockPhases {
    type Error = MockHalError;

    fn set_duties(&mut self, duties: [u16; 4]) -> Result<(), MockHalError> {
        if self.fail {
            return Err(MockHalError);
        }
        self.duties = duties;
        self.writes += 1;
        Ok(())
    }
}

/// Mock output pin for testing relays.
///
/// # Example
///
/// ```rust
/// use cake_layout::hal::MockPin;
/// use embedded_hal::digital::{OutputPin, StatefulOutputPin};
///
/// let mut pin = MockPin::new();
/// pin.set_high().unwrap();
/// assert!(pin.is_set_high().unwrap());
/// assert_eq!(pin.writes, 1);
/// ```
#[derive(Debug, Default)]
pub struct MockPin {
    /// Current output level.
    pub high: bool,
    /// Number of successful level writes.
    pub writes: usize,
    /// Fail every access while set.
    pub fail: bool,
}

impl MockPin {
    /// Creates a new mock pin, low.
    pub fn new() -> Self {
        Self::default()
    }

    fn write(&mut self, high: bool) -> Result<(), MockHalError> {
        if self.fail {
            return Err(MockHalError);
        }
        self.high = high;
        self.writes += 1;
        Ok(())
    }
}

impl ErrorType for MockPin {
    type Error = MockHalError;
}

impl OutputPin for MockPin {
    fn set_low(&mut self) -> Result<(), MockHalError> {
        self.write(false)
    }

    fn set_high(&mut self) -> Result<(), MockHalError> {
        self.write(true)
    }
}

impl StatefulOutputPin for MockPin {
    fn is_set_high(&mut self) -> Result<bool, MockHalError> {
        if self.fail {
            return Err(MockHalError);
        }
        Ok(self.high)
    }

    fn is_set_low(&mut self) -> Result<bool, MockHalError> {
        self.is_set_high().map(|high| !high)
    }
}

/// Mock servo PWM channel.
///
/// Full scale is one 20 ms frame in microseconds, so the duty value is
/// the pulse width.
///
/// # Example
///
/// ```rust
/// use cake_layout::hal::MockServo;
/// use embedded_hal::pwm::SetDutyCycle;
///
/// let mut servo = MockServo::new();
/// servo.set_duty_cycle_fraction(1520, 20_000).unwrap();
/// assert_eq!(servo.pulse_us(), Some(1520));
///
/// servo.set_duty_cycle_fully_off().unwrap();
/// assert_eq!(servo.pulse_us(), None);
/// ```
#[derive(Debug, Default)]
pub struct MockServo {
    /// Current duty value (microseconds of a 20 ms frame).
    pub duty: u16,
    /// Number of successful duty writes.
    pub writes: usize,
    /// Fail every write while set.
    pub fail: bool,
}

impl MockServo {
    /// Creates a new mock servo, de-energised.
    pub fn new() -> Self {
        Self::default()
    }

    /// Pulse width being generated, or `None` when off.
    pub fn pulse_us(&self) -> Option<u16> {
        (self.duty != 0).then_some(self.duty)
    }
}

impl pwm::ErrorType for MockServo {
    type Error = MockHalError;
}

impl SetDutyCycle for MockServo {
    fn max_duty_cycle(&self) -> u16 {
        20_000
    }

    fn set_duty_cycle(&mut self, duty: u16) -> Result<(), MockHalError> {
        if self.fail {
            return Err(MockHalError);
        }
        self.duty = duty;
        self.writes += 1;
        Ok(())
    }
}

/// Mock clock for testing.
///
/// Provides a controllable time source for testing time-dependent behavior.
///
/// # Example
///
/// ```rust
/// use cake_layout::hal::MockClock;
/// use cake_layout::traits::Clock;
///
/// let mut clock = MockClock::new();
/// assert_eq!(clock.now_ms(), 0);
///
/// clock.set(1000);
/// assert_eq!(clock.now_ms(), 1000);
///
/// clock.advance(500);
/// assert_eq!(clock.now_ms(), 1500);
/// ```
#[derive(Debug)]
pub struct MockClock {
    current_ms: u64,
}

impl MockClock {
    /// Creates a new mock clock starting at 0ms.
    pub fn new() -> Self {
        Self { current_ms: 0 }
    }

    /// Sets the current time in milliseconds.
    pub fn set(&mut self, ms: u64) {
        self.current_ms = ms;
    }

    /// Advances the clock by the given duration.
    pub fn advance(&mut self, ms: u64) {
        self.current_ms += ms;
    }
}

impl Default for MockClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MockClock {
    fn now_ms(&self) -> u64 {
        self.current_ms
    }
}

// ============================================================================
// Display Mock
// ============================================================================

/// Mock display for testing.
///
/// Records every event it is shown, with the device name resolved, and
/// every transit completion.
#[derive(Debug, Default)]
pub struct MockDisplay {
    /// Events shown, oldest first.
    pub events: Vec<EventReport>,
    /// Device names of the events shown.
    pub sources: Vec<String>,
    /// Next transit named at each non-chaining completion.
    pub completions: Vec<Option<String>>,
}

impl MockDisplay {
    /// Creates a new mock display.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of shown events of `kind` from device `name`.
    pub fn count(&self, name: &str, kind: EventKind) -> usize {
        self.events
            .iter()
            .zip(&self.sources)
            .filter(|(r, s)| r.kind == kind && s.as_str() == name)
            .count()
    }

    /// Forgets everything recorded so far.
    pub fn clear(&mut self) {
        self.events.clear();
        self.sources.clear();
        self.completions.clear();
    }
}

impl EventDisplay for MockDisplay {
    fn show_event(&mut self, report: &EventReport, devices: &DeviceRegistry) {
        self.events.push(*report);
        self.sources
            .push(String::from(devices.name(report.source).unwrap_or("?")));
    }

    fn transit_done(&mut self, next: Option<&str>) {
        self.completions.push(next.map(String::from));
    }
}

// ============================================================================
// Simulated layout
// ============================================================================

/// Registers mock hardware for every device in `config`.
///
/// The motor is registered first, then the sector plate, the relays
/// and the two inputs.
pub fn mock_registry(
    config: &LayoutConfig,
    queue: Arc<EventQueue>,
) -> Result<DeviceRegistry, LayoutError> {
    let mut devices = DeviceRegistry::new(queue);
    devices.register(&config.motor, Box::new(LinearMotor::new(MockPhases::new())))?;
    devices.register(
        &config.sector.name,
        Box::new(SectorPlate::from_config(MockServo::new(), &config.sector)?),
    )?;
    for relay in &config.relays {
        devices.register(relay, Box::new(Relay::new(MockPin::new())))?;
    }
    devices.register(&config.encoder, Box::new(InputDevice::encoder()))?;
    devices.register(&config.button, Box::new(InputDevice::button()))?;
    Ok(devices)
}

/// Builds a complete layout on mock hardware.
pub fn with_mock_devices(config: &LayoutConfig) -> Result<Layout, LayoutError> {
    let devices = mock_registry(config, EventQueue::shared())?;
    Layout::new(config, devices)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{DeviceId, EventData};

    // =========================================================================
    // Pin / Servo Tests
    // =========================================================================

    #[test]
    fn mock_pin_fails_on_demand() {
        let mut pin = MockPin::new();
        pin.set_high().unwrap();
        pin.fail = true;
        assert_eq!(pin.set_low(), Err(MockHalError));
        assert_eq!(pin.is_set_high(), Err(MockHalError));
        assert!(pin.high);
        assert_eq!(pin.writes, 1);
    }

    #[test]
    fn mock_pin_stateful_reads() {
        let mut pin = MockPin::new();
        assert_eq!(pin.is_set_low(), Ok(true));
        pin.set_high().unwrap();
        assert_eq!(pin.is_set_low(), Ok(false));
    }

    #[test]
    fn mock_servo_fraction_is_pulse() {
        let mut servo = MockServo::new();
        servo.set_duty_cycle_fraction(1845, 20_000).unwrap();
        assert_eq!(servo.pulse_us(), Some(1845));
        servo.fail = true;
        assert!(servo.set_duty_cycle_fully_off().is_err());
        assert_eq!(servo.pulse_us(), Some(1845));
    }

    // =========================================================================
    // MockDisplay Tests
    // =========================================================================

    #[test]
    fn mock_display_records_names() {
        let queue = EventQueue::shared();
        let devices = mock_registry(&LayoutConfig::default(), queue).unwrap();
        let r1 = devices.lookup("R1").unwrap();

        let mut display = MockDisplay::new();
        display.show_event(
            &EventReport::new(r1, EventKind::ActionDone, EventData::None),
            &devices,
        );
        display.show_event(
            &EventReport::new(DeviceId::from_index(99), EventKind::ActionDone, EventData::None),
            &devices,
        );
        display.transit_done(Some("R1"));

        assert_eq!(display.count("R1", EventKind::ActionDone), 1);
        assert_eq!(display.sources[1], "?");
        assert_eq!(display.completions, [Some(String::from("R1"))]);

        display.clear();
        assert!(display.events.is_empty());
    }

    // =========================================================================
    // Registry Tests
    // =========================================================================

    #[test]
    fn mock_registry_has_every_device() {
        let config = LayoutConfig::default();
        let devices = mock_registry(&config, EventQueue::shared()).unwrap();
        assert_eq!(
            devices.names().collect::<Vec<_>>(),
            ["L1", "S1", "R1", "R2", "R3", "QUI", "SW1"]
        );
        assert!(devices.motor_id().is_ok());
    }
}

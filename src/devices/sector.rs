//! Servo-driven sector plate.
//!
//! The plate pivots at one end to line its track up with one of several
//! roads. A hobby servo on a 50 Hz PWM output moves it; the pulse width
//! is stepped from the old position to the new one over the travel
//! time, then held at the target for [`SETTLE`] ticks to absorb
//! overshoot before the servo is de-energised.

use alloc::vec::Vec;

use embedded_hal::pwm::SetDutyCycle;

use crate::config::SectorConfig;
use crate::error::LayoutError;
use crate::event::{DeviceKind, DeviceState, DeviceValue, EventData, EventKind, EventSource};
use crate::traits::Device;

/// Ticks held at the target pulse before a move completes.
pub const SETTLE: i32 = 5;

/// Tick period in milliseconds.
pub const TICK_MS: u64 = 20;

/// Normal travel time in milliseconds.
pub const TRAVEL_MS: u64 = 2000;

/// Pulse change (µs) above which travel time is doubled.
pub const LONG_THRESHOLD_US: i32 = 500;

/// Servo frame period in microseconds (50 Hz).
pub const FRAME_US: u16 = 20_000;

/// Sector plate on one PWM channel.
pub struct SectorPlate<S: SetDutyCycle> {
    servo: S,
    positions: Vec<(char, u16)>,
    value: char,
    target: char,
    last_us: i32,
    target_us: i32,
    steps: i32,
    state: DeviceState,
    next_tick: Option<u64>,
}

impl<S: SetDutyCycle> SectorPlate<S> {
    /// Creates a plate assumed to sit at `default_position`, servo off.
    ///
    /// The state is [`Unknown`](DeviceState::Unknown) until the first
    /// move, so the first command always drives the servo.
    ///
    /// # Errors
    ///
    /// [`LayoutError::InvalidConfig`] if `default_position` is not one of
    /// `positions`.
    pub fn new(
        mut servo: S,
        positions: &[(char, u16)],
        default_position: char,
    ) -> Result<Self, LayoutError> {
        let default_us = positions
            .iter()
            .find(|(label, _)| *label == default_position)
            .map(|(_, us)| i32::from(*us))
            .ok_or_else(|| {
                LayoutError::InvalidConfig(crate::config::long_string(
                    "sector default position is not defined",
                ))
            })?;
        if servo.set_duty_cycle_fully_off().is_err() {
            log::warn!("sector: initial servo write failed");
        }
        Ok(Self {
            servo,
            positions: positions.to_vec(),
            value: default_position,
            target: default_position,
            last_us: default_us,
            target_us: default_us,
            steps: -1,
            state: DeviceState::Unknown,
            next_tick: None,
        })
    }

    /// Creates a plate from its configuration.
    pub fn from_config(servo: S, config: &SectorConfig) -> Result<Self, LayoutError> {
        Self::new(servo, &config.positions, config.default_position)
    }

    /// Position being moved to (equal to the value when at rest).
    pub fn target(&self) -> char {
        self.target
    }

    /// Pulse width most recently driven, in microseconds.
    pub fn pulse_us(&self) -> i32 {
        self.last_us
    }

    /// The servo channel.
    pub fn servo(&self) -> &S {
        &self.servo
    }

    /// Mutable access to the servo channel.
    pub fn servo_mut(&mut self) -> &mut S {
        &mut self.servo
    }

    fn pulse_for(&self, label: char) -> Option<i32> {
        self.positions
            .iter()
            .find(|(l, _)| *l == label)
            .map(|(_, us)| i32::from(*us))
    }

    fn drive(&mut self, pulse_us: i32) -> Result<(), S::Error> {
        let pulse = pulse_us.clamp(0, i32::from(FRAME_US)) as u16;
        self.servo.set_duty_cycle_fraction(pulse, FRAME_US)
    }

    fn fault(&mut self, events: &EventSource) -> LayoutError {
        self.next_tick = None;
        self.steps = -1;
        self.state = DeviceState::Unknown;
        if let Err(e) = self.servo.set_duty_cycle_fully_off() {
            log::warn!("sector: servo release after fault failed: {:?}", e);
        }
        if let Err(e) = events.report(
            EventKind::ActionError,
            EventData::State(DeviceState::Unknown),
        ) {
            log::warn!("sector: fault not reported: {}", e);
        }
        LayoutError::HardwareFault(Default::default())
    }

    fn tick(&mut self, events: &EventSource) -> Result<(), LayoutError> {
        if self.steps > SETTLE {
            self.last_us += (self.target_us - self.last_us).div_euclid(self.steps - SETTLE);
            if self.drive(self.last_us).is_err() {
                return Err(self.fault(events));
            }
        } else if self.steps == SETTLE {
            if self.drive(self.target_us).is_err() {
                return Err(self.fault(events));
            }
        } else if self.steps == 0 {
            self.last_us = self.target_us;
            self.value = self.target;
            self.state = DeviceState::Set;
            if self.servo.set_duty_cycle_fully_off().is_err() {
                log::warn!("sector: servo release failed");
            }
            self.steps -= 1;
            self.next_tick = None;
            return events.report(EventKind::ActionDone, EventData::State(DeviceState::Set));
        }
        self.steps -= 1;
        Ok(())
    }
}

impl<S: SetDutyCycle> Device for SectorPlate<S> {
    fn kind(&self) -> DeviceKind {
        DeviceKind::Sector
    }

    fn state(&self) -> DeviceState {
        self.state
    }

    /// The position reached, or `None` while the plate is moving.
    fn value(&self) -> Option<DeviceValue> {
        match self.state {
            DeviceState::Indeterminate => None,
            _ => Some(DeviceValue::Position(self.value)),
        }
    }

    fn set_value(
        &mut self,
        value: DeviceValue,
        now_ms: u64,
        events: &EventSource,
    ) -> Result<(), LayoutError> {
        let (label, target_us) = match value {
            DeviceValue::Position(label) => match self.pulse_for(label) {
                Some(us) => (label, us),
                None => return Err(reject(value, events)),
            },
            DeviceValue::Level(_) => return Err(reject(value, events)),
        };

        if self.state != DeviceState::Unknown && self.target == label {
            return Ok(());
        }

        let travel = if (target_us - self.last_us).abs() > LONG_THRESHOLD_US {
            TRAVEL_MS * 2
        } else {
            TRAVEL_MS
        };
        self.target = label;
        self.target_us = target_us;
        self.steps = SETTLE + (travel / TICK_MS) as i32;
        if self.drive(self.last_us).is_err() {
            return Err(self.fault(events));
        }
        self.state = DeviceState::Indeterminate;
        // a move already under way keeps its tick phase
        if self.next_tick.is_none() {
            self.next_tick = Some(now_ms + TICK_MS);
        }
        events.report(
            EventKind::ActionInit,
            EventData::State(DeviceState::Indeterminate),
        )
    }

    fn next_deadline(&self) -> Option<u64> {
        self.next_tick
    }

    fn update(&mut self, now_ms: u64, events: &EventSource) -> Result<(), LayoutError> {
        while let Some(due) = self.next_tick {
            if due > now_ms {
                break;
            }
            self.tick(events)?;
            if self.next_tick.is_some() {
                self.next_tick = Some(due + TICK_MS);
            }
        }
        Ok(())
    }
}

fn reject(value: DeviceValue, events: &EventSource) -> LayoutError {
    if let Err(e) = events.report(EventKind::ActionError, EventData::Value(value)) {
        log::warn!("sector: rejection not reported: {}", e);
    }
    LayoutError::InvalidValue {
        device: Default::default(),
        value,
    }
}

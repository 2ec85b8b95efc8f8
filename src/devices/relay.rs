//! Track power relay.
//!
//! Photovoltaic relays take up to 5 ms to turn on and 0.5 ms to turn
//! off; a change is reported complete after [`RELAY_SETTLE_MS`].

use embedded_hal::digital::{PinState, StatefulOutputPin};

use crate::error::LayoutError;
use crate::event::{DeviceKind, DeviceState, DeviceValue, EventData, EventKind, EventSource};
use crate::traits::Device;

/// Time allowed for a relay to change, in milliseconds.
pub const RELAY_SETTLE_MS: u64 = 10;

/// A relay on one output pin: level 1 energises the track section.
pub struct Relay<P: StatefulOutputPin> {
    pin: P,
    level: u8,
    state: DeviceState,
    settle_at: Option<u64>,
}

impl<P: StatefulOutputPin> Relay<P> {
    /// Takes the pin and drives it off. The state stays
    /// [`Unknown`](DeviceState::Unknown) until the first command.
    pub fn new(mut pin: P) -> Self {
        if pin.set_low().is_err() {
            log::warn!("relay: initial pin write failed");
        }
        Self {
            pin,
            level: 0,
            state: DeviceState::Unknown,
            settle_at: None,
        }
    }

    /// Commanded level.
    pub fn level(&self) -> u8 {
        self.level
    }

    /// The output pin.
    pub fn pin(&self) -> &P {
        &self.pin
    }

    /// Mutable access to the output pin.
    pub fn pin_mut(&mut self) -> &mut P {
        &mut self.pin
    }

    fn fault(&mut self, events: &EventSource) -> LayoutError {
        self.settle_at = None;
        self.state = DeviceState::Unknown;
        if let Err(e) = events.report(
            EventKind::ActionError,
            EventData::State(DeviceState::Unknown),
        ) {
            log::warn!("relay: fault not reported: {}", e);
        }
        LayoutError::HardwareFault(Default::default())
    }
}

impl<P: StatefulOutputPin> Device for Relay<P> {
    fn kind(&self) -> DeviceKind {
        DeviceKind::Relay
    }

    fn state(&self) -> DeviceState {
        self.state
    }

    /// The commanded level, or `None` while the contacts are settling.
    fn value(&self) -> Option<DeviceValue> {
        match self.state {
            DeviceState::Indeterminate => None,
            _ => Some(DeviceValue::Level(self.level)),
        }
    }

    fn set_value(
        &mut self,
        value: DeviceValue,
        now_ms: u64,
        events: &EventSource,
    ) -> Result<(), LayoutError> {
        let level = match value {
            DeviceValue::Level(level @ (0 | 1)) => level,
            other => {
                events.report(EventKind::ActionError, EventData::Value(other))?;
                return Err(LayoutError::InvalidValue {
                    device: Default::default(),
                    value: other,
                });
            }
        };

        let current = match self.pin.is_set_high() {
            Ok(high) => u8::from(high),
            Err(_) => return Err(self.fault(events)),
        };

        if level == current {
            self.level = level;
            self.settle_at = None;
            self.state = DeviceState::from_level(level == 1);
            return events.report(EventKind::ActionDone, EventData::Value(value));
        }

        events.report(
            EventKind::ActionInit,
            EventData::Value(DeviceValue::Level(current)),
        )?;
        if self.pin.set_state(PinState::from(level == 1)).is_err() {
            return Err(self.fault(events));
        }
        self.level = level;
        self.state = DeviceState::Indeterminate;
        self.settle_at = Some(now_ms + RELAY_SETTLE_MS);
        Ok(())
    }

    fn next_deadline(&self) -> Option<u64> {
        self.settle_at
    }

    fn update(&mut self, now_ms: u64, events: &EventSource) -> Result<(), LayoutError> {
        match self.settle_at {
            Some(due) if due <= now_ms => {
                self.settle_at = None;
                self.state = DeviceState::from_level(self.level == 1);
                events.report(
                    EventKind::ActionDone,
                    EventData::Value(DeviceValue::Level(self.level)),
                )
            }
            _ => Ok(()),
        }
    }
}

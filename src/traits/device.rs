//! The device capability interface.
//!
//! Every registered device (motor, relays, sector plate, inputs) is a
//! [`Device`] trait object. Devices never run on their own: the consumer
//! asks each one for its next timer deadline and calls
//! [`update`](Device::update) when it falls due. Progress is reported as
//! events through the [`EventSource`] handed in with each call.

use crate::error::LayoutError;
use crate::event::{DeviceKind, DeviceState, DeviceValue, EventSource};
use crate::traits::{Direction, Speed};

/// Kinematic parameters for one motor move.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MoveProfile {
    /// Ramp up from rest at the fixed acceleration rate.
    pub accelerate: bool,
    /// Ramp down into the stop at the fixed deceleration rate.
    pub brake: bool,
    /// Cruise speed.
    pub speed: Speed,
}

impl MoveProfile {
    /// Constant-speed move with no ramps.
    pub const fn cruise(speed: Speed) -> Self {
        Self {
            accelerate: false,
            brake: false,
            speed,
        }
    }

    /// Move that ramps up and down.
    pub const fn ramped(speed: Speed) -> Self {
        Self {
            accelerate: true,
            brake: true,
            speed,
        }
    }
}

/// A registered layout device.
///
/// Only [`kind`](Self::kind) and [`state`](Self::state) are required.
/// Output devices override [`value`](Self::value) and
/// [`set_value`](Self::set_value); timed devices override
/// [`next_deadline`](Self::next_deadline) and [`update`](Self::update).
pub trait Device {
    /// Device class, used to decode this device's event payloads.
    fn kind(&self) -> DeviceKind;

    /// Coarse current state.
    fn state(&self) -> DeviceState;

    /// Current value, if the device has one a route can check.
    fn value(&self) -> Option<DeviceValue> {
        None
    }

    /// Command a new value.
    ///
    /// A command issued while a previous one is still settling
    /// supersedes it.
    ///
    /// # Errors
    ///
    /// [`LayoutError::NotSettable`] by default. Implementations also
    /// report an `ActionError` event for rejected values and hardware
    /// faults.
    fn set_value(
        &mut self,
        value: DeviceValue,
        now_ms: u64,
        events: &EventSource,
    ) -> Result<(), LayoutError> {
        let _ = (value, now_ms, events);
        Err(LayoutError::NotSettable(Default::default()))
    }

    /// Earliest time this device's timer wants to fire, if armed.
    fn next_deadline(&self) -> Option<u64> {
        None
    }

    /// Run every timer expiry due at or before `now_ms`.
    fn update(&mut self, now_ms: u64, events: &EventSource) -> Result<(), LayoutError> {
        let _ = (now_ms, events);
        Ok(())
    }

    /// The motor capability, for the one device that has it.
    fn as_motion(&mut self) -> Option<&mut dyn Motion> {
        None
    }
}

/// Motion capability of the linear motor.
pub trait Motion {
    /// Start a move of `cycles` (signed; positive is down).
    ///
    /// Reports `ActionInit` with direction and speed, then `ActionDone`
    /// with [`Direction::Stopped`] when the last micro-step has run.
    /// Calling this mid-move supersedes the current move; a superseded
    /// move never reports `ActionDone`. Zero cycles stops at once and
    /// reports `ActionDone` without scheduling any step.
    fn move_by(
        &mut self,
        cycles: i32,
        profile: MoveProfile,
        now_ms: u64,
        events: &EventSource,
    ) -> Result<(), LayoutError>;

    /// Current direction of travel.
    fn direction(&self) -> Direction;

    /// Speed of the current or last move.
    fn speed(&self) -> Speed;

    /// True while a move is in progress.
    fn is_moving(&self) -> bool {
        self.direction() != Direction::Stopped
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{DeviceId, EventQueue};
    use alloc::sync::Arc;

    struct Lamp;

    impl Device for Lamp {
        fn kind(&self) -> DeviceKind {
            DeviceKind::Switch
        }

        fn state(&self) -> DeviceState {
            DeviceState::Unknown
        }
    }

    #[test]
    fn defaults_are_inert() {
        let queue = EventQueue::shared();
        let source = EventSource::new(DeviceId::from_index(0), Arc::clone(&queue));
        let mut lamp = Lamp;

        assert_eq!(lamp.value(), None);
        assert_eq!(lamp.next_deadline(), None);
        assert!(lamp.update(100, &source).is_ok());
        assert!(lamp.as_motion().is_none());
        assert!(matches!(
            lamp.set_value(DeviceValue::Level(1), 0, &source),
            Err(LayoutError::NotSettable(_))
        ));
        assert!(queue.try_next().is_none());
    }

    #[test]
    fn profile_constructors() {
        let p = MoveProfile::ramped(Speed::Slow);
        assert!(p.accelerate && p.brake);
        assert_eq!(MoveProfile::cruise(Speed::Fast).speed, Speed::Fast);
        assert_eq!(MoveProfile::default().speed, Speed::Medium);
    }
}

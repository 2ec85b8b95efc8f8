//! Error type shared by the registry, devices, routes and transits.
//!
//! Only registry and configuration failures are true program errors.
//! Failures local to one device's action are also reported on the event
//! queue as [`EventKind::ActionError`] so the consumer sees them through
//! the same channel as successes.
//!
//! [`EventKind::ActionError`]: crate::event::EventKind::ActionError

use crate::config::{LongString, ShortString};
use crate::event::DeviceValue;

/// Errors raised by the layout core.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum LayoutError {
    /// The event queue is at capacity; the report was not enqueued.
    ///
    /// Recoverable: the producer decides whether to retry or drop.
    #[error("event queue full")]
    QueueFull,

    /// No device is registered under this name.
    #[error("device not found: {0}")]
    DeviceNotFound(ShortString),

    /// A device with this name is already registered.
    #[error("duplicate device name: {0}")]
    DuplicateDevice(ShortString),

    /// A second linear motor was registered.
    #[error("layout already has a linear motor")]
    DuplicateMotor,

    /// The layout has no linear motor to move.
    #[error("no linear motor registered")]
    NoMotor,

    /// No route is configured under this name.
    #[error("route not found: {0}")]
    RouteNotFound(ShortString),

    /// No transit is configured under this name.
    #[error("transit not found: {0}")]
    TransitNotFound(ShortString),

    /// The device has no settable value.
    #[error("device {0} does not accept values")]
    NotSettable(ShortString),

    /// The device rejected the value (wrong kind, out of range, unknown position).
    #[error("device {device} rejected value {value}")]
    InvalidValue {
        /// Device name.
        device: ShortString,
        /// The rejected value.
        value: DeviceValue,
    },

    /// A pin or PWM write failed.
    #[error("hardware write failed on {0}")]
    HardwareFault(ShortString),

    /// A route command failed; earlier commands stay applied.
    #[error("route {route} stopped at device {device}")]
    RouteCommandFailure {
        /// Route name.
        route: ShortString,
        /// Device whose command failed.
        device: ShortString,
    },

    /// The layout configuration is inconsistent.
    #[error("invalid layout configuration: {0}")]
    InvalidConfig(LongString),
}

impl LayoutError {
    /// Returns true for errors a caller may retry or drop without
    /// treating the layout as misconfigured.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            LayoutError::QueueFull
                | LayoutError::HardwareFault(_)
                | LayoutError::InvalidValue { .. }
                | LayoutError::RouteCommandFailure { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::short_string;
    use alloc::string::ToString;

    #[test]
    fn display_names_the_device() {
        let err = LayoutError::DeviceNotFound(short_string("R9"));
        assert_eq!(err.to_string(), "device not found: R9");

        let err = LayoutError::InvalidValue {
            device: short_string("S1"),
            value: DeviceValue::Position('X'),
        };
        assert_eq!(err.to_string(), "device S1 rejected value 'X'");
    }

    #[test]
    fn recoverable_classification() {
        assert!(LayoutError::QueueFull.is_recoverable());
        assert!(LayoutError::HardwareFault(short_string("R1")).is_recoverable());
        assert!(!LayoutError::DeviceNotFound(short_string("R1")).is_recoverable());
        assert!(!LayoutError::DuplicateMotor.is_recoverable());
    }
}

//! Operator inputs: rotary encoder and push button.
//!
//! Inputs have no timer and no settable value. Their interrupt handlers
//! hold an [`EventSource`](crate::event::EventSource) taken from the
//! registry and report through it directly:
//!
//! ```rust
//! use cake_layout::{DeviceRegistry, EventQueue, EventKind, EventData, DeviceKind};
//! use cake_layout::devices::InputDevice;
//!
//! let queue = EventQueue::shared();
//! let mut devices = DeviceRegistry::new(queue.clone());
//! let id = devices.register("QUI", Box::new(InputDevice::encoder())).unwrap();
//!
//! let knob = devices.source(id).unwrap();
//! std::thread::spawn(move || knob.rotated(-1)).join().unwrap().unwrap();
//!
//! let report = queue.try_next().unwrap();
//! assert_eq!(report.kind, EventKind::Quadrature);
//! assert_eq!(report.data, EventData::Rotation(-1));
//! ```

use crate::event::{DeviceKind, DeviceState};
use crate::traits::Device;

/// Registry entry for an encoder or a button.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct InputDevice {
    kind: DeviceKind,
}

impl InputDevice {
    /// Creates an input of the given kind.
    pub const fn new(kind: DeviceKind) -> Self {
        Self { kind }
    }

    /// Rotary encoder (reports `Quadrature` events).
    pub const fn encoder() -> Self {
        Self::new(DeviceKind::Quadrature)
    }

    /// Push button (reports `Switch` events; pressed is active low on the pin).
    pub const fn button() -> Self {
        Self::new(DeviceKind::Switch)
    }
}

impl Device for InputDevice {
    fn kind(&self) -> DeviceKind {
        self.kind
    }

    fn state(&self) -> DeviceState {
        DeviceState::Unknown
    }
}

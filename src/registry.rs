//! Device registry: the name → device directory.
//!
//! The registry is an explicit context owned by the event consumer. It
//! is filled once at startup and never shrinks; every device gets a
//! [`DeviceId`] and an [`EventSource`] bound to the shared queue.
//!
//! # Example
//!
//! ```rust
//! use cake_layout::{DeviceRegistry, EventQueue, DeviceValue};
//! use cake_layout::devices::Relay;
//! use cake_layout::hal::MockPin;
//!
//! let queue = EventQueue::shared();
//! let mut devices = DeviceRegistry::new(queue.clone());
//! devices.register("R1", Box::new(Relay::new(MockPin::new()))).unwrap();
//!
//! devices.set_value("R1", DeviceValue::Level(1), 0).unwrap();
//! assert_eq!(devices.value("R1").unwrap(), None); // contacts settling
//!
//! devices.update(devices.next_deadline().unwrap()).unwrap();
//! assert_eq!(devices.value("R1").unwrap(), Some(DeviceValue::Level(1)));
//! assert!(devices.lookup("R9").is_err());
//! ```

use alloc::boxed::Box;
use alloc::sync::Arc;
use alloc::vec::Vec;

use crate::config::{short_string, ShortString};
use crate::error::LayoutError;
use crate::event::{DeviceId, DeviceKind, DeviceState, DeviceValue, EventQueue, EventSource};
use crate::traits::{Device, MoveProfile};

struct Entry {
    name: ShortString,
    device: Box<dyn Device>,
    source: EventSource,
}

/// Directory of every device on the layout.
pub struct DeviceRegistry {
    entries: Vec<Entry>,
    queue: Arc<EventQueue>,
    motor: Option<DeviceId>,
}

impl DeviceRegistry {
    /// Creates an empty registry reporting into `queue`.
    pub fn new(queue: Arc<EventQueue>) -> Self {
        Self {
            entries: Vec::new(),
            queue,
            motor: None,
        }
    }

    /// Adds a device under a unique name.
    ///
    /// # Errors
    ///
    /// - [`LayoutError::DuplicateDevice`] if the name is taken
    /// - [`LayoutError::DuplicateMotor`] for a second linear motor
    pub fn register(
        &mut self,
        name: &str,
        device: Box<dyn Device>,
    ) -> Result<DeviceId, LayoutError> {
        if self.find(name).is_some() {
            return Err(LayoutError::DuplicateDevice(short_string(name)));
        }
        let kind = device.kind();
        if kind == DeviceKind::LinearMotor && self.motor.is_some() {
            return Err(LayoutError::DuplicateMotor);
        }

        let id = DeviceId::from_index(self.entries.len());
        if kind == DeviceKind::LinearMotor {
            self.motor = Some(id);
        }
        self.entries.push(Entry {
            name: short_string(name),
            device,
            source: EventSource::new(id, Arc::clone(&self.queue)),
        });
        log::debug!("registered {} '{}' as #{}", kind.tag(), name, id.index());
        Ok(id)
    }

    fn find(&self, name: &str) -> Option<DeviceId> {
        self.entries
            .iter()
            .position(|e| e.name == name)
            .map(DeviceId::from_index)
    }

    /// Resolves a device name.
    ///
    /// # Errors
    ///
    /// [`LayoutError::DeviceNotFound`] if no device has this name.
    pub fn lookup(&self, name: &str) -> Result<DeviceId, LayoutError> {
        self.find(name)
            .ok_or_else(|| LayoutError::DeviceNotFound(short_string(name)))
    }

    /// Device name for an id.
    pub fn name(&self, id: DeviceId) -> Option<&str> {
        self.entries.get(id.index()).map(|e| e.name.as_str())
    }

    /// Device kind for an id.
    pub fn kind(&self, id: DeviceId) -> Option<DeviceKind> {
        self.entries.get(id.index()).map(|e| e.device.kind())
    }

    /// Producer handle for a device, e.g. for an input interrupt handler.
    pub fn source(&self, id: DeviceId) -> Option<EventSource> {
        self.entries.get(id.index()).map(|e| e.source.clone())
    }

    /// The shared event queue.
    pub fn queue(&self) -> &Arc<EventQueue> {
        &self.queue
    }

    /// Number of registered devices.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True if nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Device names in registration order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.name.as_str())
    }

    /// A registered device.
    pub fn device(&self, id: DeviceId) -> Option<&dyn Device> {
        self.entries.get(id.index()).map(|e| e.device.as_ref())
    }

    fn entry_mut(&mut self, name: &str) -> Result<&mut Entry, LayoutError> {
        let id = self.lookup(name)?;
        Ok(&mut self.entries[id.index()])
    }

    // ========================================================================
    // Values
    // ========================================================================

    /// Current value of a named device.
    pub fn value(&self, name: &str) -> Result<Option<DeviceValue>, LayoutError> {
        let id = self.lookup(name)?;
        Ok(self.entries[id.index()].device.value())
    }

    /// Current state of a named device.
    pub fn state(&self, name: &str) -> Result<DeviceState, LayoutError> {
        let id = self.lookup(name)?;
        Ok(self.entries[id.index()].device.state())
    }

    /// Commands a named device.
    pub fn set_value(
        &mut self,
        name: &str,
        value: DeviceValue,
        now_ms: u64,
    ) -> Result<(), LayoutError> {
        let entry = self.entry_mut(name)?;
        entry
            .device
            .set_value(value, now_ms, &entry.source)
            .map_err(|e| attribute(e, &entry.name))
    }

    // ========================================================================
    // Motor
    // ========================================================================

    /// Id of the linear motor.
    pub fn motor_id(&self) -> Result<DeviceId, LayoutError> {
        self.motor.ok_or(LayoutError::NoMotor)
    }

    /// Busy while the motor is moving, otherwise Stopped.
    pub fn motor_state(&self) -> Result<DeviceState, LayoutError> {
        let id = self.motor_id()?;
        Ok(self.entries[id.index()].device.state())
    }

    /// Starts (or supersedes) a motor move.
    pub fn move_motor(
        &mut self,
        cycles: i32,
        profile: MoveProfile,
        now_ms: u64,
    ) -> Result<(), LayoutError> {
        let id = self.motor_id()?;
        let Entry {
            name,
            device,
            source,
        } = &mut self.entries[id.index()];
        let motion = device.as_motion().ok_or(LayoutError::NoMotor)?;
        motion
            .move_by(cycles, profile, now_ms, source)
            .map_err(|e| attribute(e, name))
    }

    // ========================================================================
    // Timers
    // ========================================================================

    /// Earliest armed timer across all devices.
    pub fn next_deadline(&self) -> Option<u64> {
        self.entries
            .iter()
            .filter_map(|e| e.device.next_deadline())
            .min()
    }

    /// Fires every device timer due at or before `now_ms`.
    ///
    /// Every device is updated even if an earlier one fails; the first
    /// error is returned.
    pub fn update(&mut self, now_ms: u64) -> Result<(), LayoutError> {
        let mut first_err = None;
        for entry in self.entries.iter_mut() {
            let due = entry.device.next_deadline().is_some_and(|d| d <= now_ms);
            if !due {
                continue;
            }
            if let Err(e) = entry.device.update(now_ms, &entry.source) {
                let e = attribute(e, &entry.name);
                log::warn!("{}: {}", entry.name, e);
                first_err.get_or_insert(e);
            }
        }
        first_err.map_or(Ok(()), Err)
    }
}

impl core::fmt::Debug for DeviceRegistry {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}

/// Fills in the device name on errors raised by anonymous devices.
fn attribute(err: LayoutError, name: &ShortString) -> LayoutError {
    match err {
        LayoutError::NotSettable(n) if n.is_empty() => LayoutError::NotSettable(name.clone()),
        LayoutError::HardwareFault(n) if n.is_empty() => LayoutError::HardwareFault(name.clone()),
        LayoutError::InvalidValue { device, value } if device.is_empty() => {
            LayoutError::InvalidValue {
                device: name.clone(),
                value,
            }
        }
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::devices::{InputDevice, Relay};
    use crate::event::{EventData, EventKind};
    use crate::hal::{MockPhases, MockPin};
    use crate::motor::LinearMotor;
    use crate::traits::Speed;

    fn registry() -> (Arc<EventQueue>, DeviceRegistry) {
        let queue = EventQueue::shared();
        let mut devices = DeviceRegistry::new(Arc::clone(&queue));
        devices
            .register("L1", Box::new(LinearMotor::new(MockPhases::new())))
            .unwrap();
        devices
            .register("R1", Box::new(Relay::new(MockPin::new())))
            .unwrap();
        devices
            .register("SW1", Box::new(InputDevice::new(DeviceKind::Switch)))
            .unwrap();
        (queue, devices)
    }

    // =========================================================================
    // Registration
    // =========================================================================

    #[test]
    fn lookup_by_name() {
        let (_, devices) = registry();
        assert_eq!(devices.len(), 3);
        let r1 = devices.lookup("R1").unwrap();
        assert_eq!(devices.name(r1), Some("R1"));
        assert_eq!(devices.kind(r1), Some(DeviceKind::Relay));
        assert_eq!(devices.names().collect::<Vec<_>>(), ["L1", "R1", "SW1"]);
    }

    #[test]
    fn unknown_name_is_not_found() {
        let (_, devices) = registry();
        assert_eq!(
            devices.lookup("R9"),
            Err(LayoutError::DeviceNotFound(short_string("R9")))
        );
        assert!(devices.value("R9").is_err());
    }

    #[test]
    fn duplicate_name_rejected() {
        let (_, mut devices) = registry();
        let err = devices
            .register("R1", Box::new(Relay::new(MockPin::new())))
            .unwrap_err();
        assert_eq!(err, LayoutError::DuplicateDevice(short_string("R1")));
        assert_eq!(devices.len(), 3);
    }

    #[test]
    fn second_motor_rejected() {
        let (_, mut devices) = registry();
        let err = devices
            .register("L2", Box::new(LinearMotor::new(MockPhases::new())))
            .unwrap_err();
        assert_eq!(err, LayoutError::DuplicateMotor);
    }

    #[test]
    fn no_motor_registered() {
        let queue = EventQueue::shared();
        let mut devices = DeviceRegistry::new(queue);
        assert_eq!(devices.motor_id(), Err(LayoutError::NoMotor));
        assert_eq!(
            devices.move_motor(1, MoveProfile::default(), 0),
            Err(LayoutError::NoMotor)
        );
    }

    // =========================================================================
    // Access
    // =========================================================================

    #[test]
    fn inputs_are_not_settable() {
        let (_, mut devices) = registry();
        let err = devices
            .set_value("SW1", DeviceValue::Level(1), 0)
            .unwrap_err();
        assert_eq!(err, LayoutError::NotSettable(short_string("SW1")));
    }

    #[test]
    fn invalid_value_names_the_device() {
        let (_, mut devices) = registry();
        let err = devices
            .set_value("R1", DeviceValue::Position('M'), 0)
            .unwrap_err();
        assert_eq!(
            err,
            LayoutError::InvalidValue {
                device: short_string("R1"),
                value: DeviceValue::Position('M'),
            }
        );
    }

    #[test]
    fn source_reports_as_device() {
        let (queue, devices) = registry();
        let sw = devices.lookup("SW1").unwrap();
        devices.source(sw).unwrap().switched(true).unwrap();
        let report = queue.try_next().unwrap();
        assert_eq!(report.source, sw);
        assert_eq!(report.kind, EventKind::Switch);
    }

    #[test]
    fn move_motor_and_timers() {
        let (queue, mut devices) = registry();
        assert_eq!(devices.next_deadline(), None);
        assert_eq!(devices.motor_state(), Ok(DeviceState::Stopped));

        devices
            .move_motor(1, MoveProfile::cruise(Speed::Fast), 0)
            .unwrap();
        assert_eq!(devices.motor_state(), Ok(DeviceState::Busy));
        assert_eq!(devices.next_deadline(), Some(4));

        let init = queue.try_next().unwrap();
        assert_eq!(init.kind, EventKind::ActionInit);

        // nothing due yet
        devices.update(3).unwrap();
        assert!(queue.try_next().is_none());

        // one cycle is 64 micro-steps at 4 ms
        devices.update(64 * 4).unwrap();
        let done = queue.try_next().unwrap();
        assert_eq!(done.kind, EventKind::ActionDone);
        assert_eq!(done.data, EventData::Direction(crate::traits::Direction::Stopped));
        assert_eq!(devices.next_deadline(), None);
    }
}

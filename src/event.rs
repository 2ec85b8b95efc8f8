//! Event reports and the bounded event queue.
//!
//! Every device reports asynchronous progress as an [`EventReport`]:
//! the reporting device, what happened, and a payload whose meaning
//! depends on the kind of device. Any number of producers (timer
//! callbacks, input interrupts) may enqueue; exactly one consumer
//! dequeues, in strict insertion order.
//!
//! # Capacity
//!
//! The queue holds [`EVENT_QUEUE_CAPACITY`] reports. A full queue is a
//! visible failure ([`LayoutError::QueueFull`]), never a silent drop,
//! and a producer is never blocked.
//!
//! ```rust
//! use cake_layout::event::{EventQueue, EventReport, EventKind, EventData, DeviceId};
//!
//! let queue = EventQueue::new();
//! let report = EventReport::new(DeviceId::from_index(0), EventKind::Switch, EventData::Switch(true));
//!
//! for _ in 0..queue.capacity() {
//!     queue.report(report).unwrap();
//! }
//! assert!(queue.report(report).is_err());
//!
//! assert_eq!(queue.try_next(), Some(report));
//! assert!(queue.report(report).is_ok());
//! ```

use alloc::sync::Arc;
use core::fmt;

use heapless::mpmc::MpMcQueue;

use crate::error::LayoutError;
use crate::traits::{Direction, Speed};

/// Number of reports the event queue can hold.
pub const EVENT_QUEUE_CAPACITY: usize = 16;

// ============================================================================
// Identity and classification
// ============================================================================

/// Opaque handle to a registered device.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DeviceId(u16);

impl DeviceId {
    /// Builds an id from a registry slot index.
    pub const fn from_index(index: usize) -> Self {
        Self(index as u16)
    }

    /// The registry slot index.
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

/// The class of a device, used to decode its event payloads.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum DeviceKind {
    /// The magnetic linear stepper motor.
    LinearMotor,
    /// A track power relay pair.
    Relay,
    /// The servo-driven sector plate.
    Sector,
    /// Rotary encoder rotation input.
    Quadrature,
    /// Push button input.
    Switch,
}

impl DeviceKind {
    /// Single character type tag.
    pub const fn tag(self) -> char {
        match self {
            DeviceKind::LinearMotor => 'l',
            DeviceKind::Relay => 'r',
            DeviceKind::Sector => 's',
            DeviceKind::Quadrature => 'q',
            DeviceKind::Switch => 'u',
        }
    }
}

/// What a report is about.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EventKind {
    /// An action was initiated; a further event follows.
    ActionInit,
    /// The assigned action completed.
    ActionDone,
    /// The assigned action failed.
    ActionError,
    /// One detent of rotary encoder rotation.
    Quadrature,
    /// Push button pressed or released.
    Switch,
}

// ============================================================================
// Values and states
// ============================================================================

/// A value a route can command and read back.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(untagged))]
pub enum DeviceValue {
    /// Binary output level: 0 off, 1 on.
    Level(u8),
    /// Named mechanical position, e.g. a sector plate alignment.
    Position(char),
}

impl fmt::Display for DeviceValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceValue::Level(level) => write!(f, "{}", level),
            DeviceValue::Position(pos) => write!(f, "'{}'", pos),
        }
    }
}

/// Coarse device state.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum DeviceState {
    /// Off / false.
    Unset,
    /// On / true, or a multi-position move completed.
    Set,
    /// Not yet known (start of day).
    #[default]
    Unknown,
    /// Action in progress.
    Indeterminate,
    /// Motor at rest.
    Stopped,
    /// Motor moving.
    Busy,
}

impl DeviceState {
    /// State matching a binary level.
    pub const fn from_level(level: bool) -> Self {
        if level {
            DeviceState::Set
        } else {
            DeviceState::Unset
        }
    }
}

/// Device-specific event payload.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EventData {
    /// No payload.
    None,
    /// Motor started a move.
    Motion {
        /// Direction of travel.
        direction: Direction,
        /// Speed class.
        speed: Speed,
    },
    /// Motor direction after an action (stopped on completion).
    Direction(Direction),
    /// A device value, or the command that was rejected.
    Value(DeviceValue),
    /// Device state after an action step.
    State(DeviceState),
    /// Encoder rotation: +1 clockwise, -1 counter-clockwise.
    Rotation(i8),
    /// Push button level: true when pressed.
    Switch(bool),
}

/// One event, produced by a device and consumed exactly once.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EventReport {
    /// The reporting device.
    pub source: DeviceId,
    /// What happened.
    pub kind: EventKind,
    /// Payload, interpreted according to the source's [`DeviceKind`].
    pub data: EventData,
}

impl EventReport {
    /// Creates a report.
    pub const fn new(source: DeviceId, kind: EventKind, data: EventData) -> Self {
        Self { source, kind, data }
    }

    /// True for an `ActionDone` report from `device`.
    pub fn is_done_from(&self, device: DeviceId) -> bool {
        self.source == device && self.kind == EventKind::ActionDone
    }
}

// ============================================================================
// Queue
// ============================================================================

/// Bounded multi-producer, single-consumer FIFO of event reports.
///
/// Producers never block: [`report`](Self::report) either enqueues or
/// fails with [`LayoutError::QueueFull`]. With the `std` feature the
/// consumer can block in [`next_event`](Self::next_event) instead of
/// polling.
pub struct EventQueue {
    ring: MpMcQueue<EventReport, EVENT_QUEUE_CAPACITY>,
    #[cfg(feature = "std")]
    wake_lock: std::sync::Mutex<()>,
    #[cfg(feature = "std")]
    wake: std::sync::Condvar,
}

impl EventQueue {
    /// Creates an empty queue.
    pub const fn new() -> Self {
        Self {
            ring: MpMcQueue::new(),
            #[cfg(feature = "std")]
            wake_lock: std::sync::Mutex::new(()),
            #[cfg(feature = "std")]
            wake: std::sync::Condvar::new(),
        }
    }

    /// Creates an empty queue ready to share between producers.
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Maximum number of pending reports.
    pub const fn capacity(&self) -> usize {
        EVENT_QUEUE_CAPACITY
    }

    /// Appends a report.
    ///
    /// # Errors
    ///
    /// [`LayoutError::QueueFull`] if [`EVENT_QUEUE_CAPACITY`] reports are
    /// already pending. The report is returned to nobody; the caller
    /// decides whether to retry or log the loss.
    pub fn report(&self, report: EventReport) -> Result<(), LayoutError> {
        self.ring
            .enqueue(report)
            .map_err(|_| LayoutError::QueueFull)?;
        #[cfg(feature = "std")]
        {
            // Taking the lock orders this notify after any consumer that
            // has checked the ring but not yet started waiting.
            drop(self.wake_lock.lock());
            self.wake.notify_one();
        }
        Ok(())
    }

    /// Removes the oldest report without waiting.
    pub fn try_next(&self) -> Option<EventReport> {
        self.ring.dequeue()
    }

    /// Removes the oldest report, blocking until one is available.
    #[cfg(feature = "std")]
    pub fn next_event(&self) -> EventReport {
        let mut guard = self
            .wake_lock
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        loop {
            if let Some(report) = self.ring.dequeue() {
                return report;
            }
            guard = self
                .wake
                .wait(guard)
                .unwrap_or_else(std::sync::PoisonError::into_inner);
        }
    }

    /// Removes the oldest report, blocking for at most `timeout`.
    ///
    /// Returns `None` if nothing arrived in time.
    #[cfg(feature = "std")]
    pub fn next_event_timeout(&self, timeout: std::time::Duration) -> Option<EventReport> {
        let deadline = std::time::Instant::now() + timeout;
        let mut guard = self
            .wake_lock
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        loop {
            if let Some(report) = self.ring.dequeue() {
                return Some(report);
            }
            let now = std::time::Instant::now();
            if now >= deadline {
                return None;
            }
            guard = self
                .wake
                .wait_timeout(guard, deadline - now)
                .map(|(guard, _)| guard)
                .unwrap_or_else(|poisoned| poisoned.into_inner().0);
        }
    }
}

impl Default for EventQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for EventQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventQueue")
            .field("capacity", &EVENT_QUEUE_CAPACITY)
            .finish_non_exhaustive()
    }
}

/// Producer handle bound to one device.
///
/// Cheap to clone and safe to move into interrupt or timer threads.
#[derive(Clone)]
pub struct EventSource {
    id: DeviceId,
    queue: Arc<EventQueue>,
}

impl EventSource {
    /// Creates a handle that reports as `id` into `queue`.
    pub fn new(id: DeviceId, queue: Arc<EventQueue>) -> Self {
        Self { id, queue }
    }

    /// The device this handle reports for.
    pub fn id(&self) -> DeviceId {
        self.id
    }

    /// Enqueues an event from this device.
    pub fn report(&self, kind: EventKind, data: EventData) -> Result<(), LayoutError> {
        self.queue.report(EventReport::new(self.id, kind, data))
    }

    /// Reports one encoder detent (+1 clockwise, -1 counter-clockwise).
    pub fn rotated(&self, step: i8) -> Result<(), LayoutError> {
        self.report(EventKind::Quadrature, EventData::Rotation(step.signum()))
    }

    /// Reports a push button level change.
    pub fn switched(&self, pressed: bool) -> Result<(), LayoutError> {
        self.report(EventKind::Switch, EventData::Switch(pressed))
    }
}

impl fmt::Debug for EventSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventSource").field("id", &self.id).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(n: u16) -> EventReport {
        EventReport::new(
            DeviceId::from_index(n as usize),
            EventKind::ActionDone,
            EventData::None,
        )
    }

    // =========================================================================
    // Capacity
    // =========================================================================

    #[test]
    fn sixteen_fit_seventeenth_fails() {
        let queue = EventQueue::new();
        for n in 0..16 {
            assert!(queue.report(report(n)).is_ok());
        }
        assert_eq!(queue.report(report(16)), Err(LayoutError::QueueFull));

        // one dequeue frees one slot
        assert_eq!(queue.try_next(), Some(report(0)));
        assert!(queue.report(report(17)).is_ok());
        assert_eq!(queue.report(report(18)), Err(LayoutError::QueueFull));
    }

    #[test]
    fn strict_fifo_order() {
        let queue = EventQueue::new();
        for n in 0..10 {
            queue.report(report(n)).unwrap();
        }
        for n in 0..10 {
            assert_eq!(queue.try_next(), Some(report(n)));
        }
        assert_eq!(queue.try_next(), None);
    }

    #[test]
    fn empty_queue_yields_none() {
        let queue = EventQueue::new();
        assert!(queue.try_next().is_none());
    }

    // =========================================================================
    // Sources
    // =========================================================================

    #[test]
    fn source_tags_reports_with_its_id() {
        let queue = EventQueue::shared();
        let source = EventSource::new(DeviceId::from_index(3), Arc::clone(&queue));

        source.rotated(5).unwrap();
        source.switched(true).unwrap();

        let first = queue.try_next().unwrap();
        assert_eq!(first.source, DeviceId::from_index(3));
        assert_eq!(first.kind, EventKind::Quadrature);
        assert_eq!(first.data, EventData::Rotation(1));

        let second = queue.try_next().unwrap();
        assert_eq!(second.data, EventData::Switch(true));
    }

    #[test]
    fn is_done_from_checks_source_and_kind() {
        let motor = DeviceId::from_index(0);
        let done = EventReport::new(motor, EventKind::ActionDone, EventData::None);
        let init = EventReport::new(motor, EventKind::ActionInit, EventData::None);
        let other = EventReport::new(DeviceId::from_index(1), EventKind::ActionDone, EventData::None);

        assert!(done.is_done_from(motor));
        assert!(!init.is_done_from(motor));
        assert!(!other.is_done_from(motor));
    }

    #[test]
    fn device_value_display() {
        use alloc::string::ToString;
        assert_eq!(DeviceValue::Level(1).to_string(), "1");
        assert_eq!(DeviceValue::Position('M').to_string(), "'M'");
    }

    #[test]
    fn kind_tags() {
        assert_eq!(DeviceKind::LinearMotor.tag(), 'l');
        assert_eq!(DeviceKind::Relay.tag(), 'r');
        assert_eq!(DeviceKind::Sector.tag(), 's');
        assert_eq!(DeviceKind::Quadrature.tag(), 'q');
        assert_eq!(DeviceKind::Switch.tag(), 'u');
    }

    // =========================================================================
    // Blocking consumer
    // =========================================================================

    #[cfg(feature = "std")]
    #[test]
    fn blocking_consumer_wakes_for_threaded_producers() {
        let queue = EventQueue::shared();
        let producers: std::vec::Vec<_> = (0..4u16)
            .map(|p| {
                let source = EventSource::new(DeviceId::from_index(p as usize), Arc::clone(&queue));
                std::thread::spawn(move || {
                    for _ in 0..3 {
                        while source.switched(true).is_err() {
                            std::thread::yield_now();
                        }
                    }
                })
            })
            .collect();

        let mut per_source = [0usize; 4];
        for _ in 0..12 {
            let report = queue.next_event();
            per_source[report.source.index()] += 1;
        }
        for handle in producers {
            handle.join().unwrap();
        }
        assert_eq!(per_source, [3, 3, 3, 3]);
        assert!(queue.try_next().is_none());
    }

    #[cfg(feature = "std")]
    #[test]
    fn timeout_returns_none_when_idle() {
        let queue = EventQueue::new();
        let got = queue.next_event_timeout(std::time::Duration::from_millis(5));
        assert!(got.is_none());
    }
}

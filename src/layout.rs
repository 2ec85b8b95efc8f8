//! The running layout: devices, routes and transits behind one consumer.
//!
//! [`Layout`] owns every piece of mutable state the consumer loop
//! touches. Producers (device timers, input interrupts) only hold
//! [`EventSource`]s onto the shared queue; everything else happens in
//! [`Layout::pump`] or [`Layout::wait_and_dispatch`] on one thread.

use alloc::sync::Arc;

use crate::config::{short_string, LayoutConfig};
use crate::error::LayoutError;
use crate::event::{DeviceState, EventQueue, EventReport, EventSource};
use crate::orchestrator::TransitOrchestrator;
use crate::registry::DeviceRegistry;
use crate::route::RouteTable;
use crate::traits::{EventDisplay, MoveProfile};
use crate::transit::TransitOutcome;

/// Layout automation context.
///
/// # Example
///
/// ```rust
/// use cake_layout::config::LayoutConfig;
/// use cake_layout::hal::{with_mock_devices, LogDisplay};
///
/// let mut layout = with_mock_devices(&LayoutConfig::default()).unwrap();
/// assert_eq!(layout.orchestrator().current_transit().map(|t| t.key()), Some("MD"));
///
/// let mut display = LogDisplay::new();
/// layout.run_current(0).unwrap();
/// while let Some(due) = layout.devices().next_deadline() {
///     layout.pump(due, &mut display);
/// }
/// // Main Down finished; Decouple Loco waits for the operator
/// assert_eq!(layout.orchestrator().current_transit().map(|t| t.key()), Some("R1"));
/// assert!(layout.is_idle());
/// ```
pub struct Layout {
    devices: DeviceRegistry,
    routes: RouteTable,
    orchestrator: TransitOrchestrator,
    queue: Arc<EventQueue>,
}

impl Layout {
    /// Builds the layout over registered devices.
    ///
    /// The restart transit is made current but not run.
    ///
    /// # Errors
    ///
    /// - [`LayoutError::InvalidConfig`] if the configuration is inconsistent
    /// - [`LayoutError::DeviceNotFound`] if a route names an unregistered device
    /// - [`LayoutError::NoMotor`] if no linear motor is registered
    pub fn new(config: &LayoutConfig, devices: DeviceRegistry) -> Result<Self, LayoutError> {
        config.validate()?;
        for route in &config.routes {
            for (device, _) in &route.commands {
                devices.lookup(device)?;
            }
        }
        devices.motor_id()?;

        let routes = RouteTable::from_config(config);
        let mut orchestrator = TransitOrchestrator::from_config(config);
        orchestrator.set_transit(Some(&config.restart_transit));
        let queue = Arc::clone(devices.queue());

        log::info!(
            "layout ready: {} devices, {} routes",
            devices.len(),
            routes.len()
        );
        Ok(Self {
            devices,
            routes,
            orchestrator,
            queue,
        })
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    /// The device registry.
    pub fn devices(&self) -> &DeviceRegistry {
        &self.devices
    }

    /// Mutable access to the device registry.
    pub fn devices_mut(&mut self) -> &mut DeviceRegistry {
        &mut self.devices
    }

    /// The route table.
    pub fn routes(&self) -> &RouteTable {
        &self.routes
    }

    /// The transit orchestrator.
    pub fn orchestrator(&self) -> &TransitOrchestrator {
        &self.orchestrator
    }

    /// Mutable access to the orchestrator (callback, selection).
    pub fn orchestrator_mut(&mut self) -> &mut TransitOrchestrator {
        &mut self.orchestrator
    }

    /// The shared event queue.
    pub fn queue(&self) -> &Arc<EventQueue> {
        &self.queue
    }

    /// Producer handle for a named device, e.g. an input for its
    /// interrupt handler.
    pub fn event_source(&self, name: &str) -> Result<EventSource, LayoutError> {
        let id = self.devices.lookup(name)?;
        self.devices
            .source(id)
            .ok_or_else(|| LayoutError::DeviceNotFound(short_string(name)))
    }

    // ========================================================================
    // Commands
    // ========================================================================

    /// Makes `key` current and runs it.
    pub fn run_transit(&mut self, key: &str, now_ms: u64) -> Result<(), LayoutError> {
        if self.orchestrator.set_transit(Some(key)).is_none() {
            return Err(LayoutError::TransitNotFound(short_string(key)));
        }
        self.run_current(now_ms).map(|_| ())
    }

    /// Runs the current transit; `false` if there is none.
    pub fn run_current(&mut self, now_ms: u64) -> Result<bool, LayoutError> {
        self.orchestrator
            .run_current(&mut self.routes, &mut self.devices, now_ms)
    }

    /// Issues a route by name outside any transit.
    pub fn set_route(&mut self, name: &str, now_ms: u64) -> Result<(), LayoutError> {
        self.routes.set_route_by_name(name, &mut self.devices, now_ms)
    }

    /// Starts a motor move outside any transit.
    pub fn move_motor(
        &mut self,
        cycles: i32,
        profile: MoveProfile,
        now_ms: u64,
    ) -> Result<(), LayoutError> {
        self.devices.move_motor(cycles, profile, now_ms)
    }

    /// True if the motor is stopped and no device timer is armed.
    pub fn is_idle(&self) -> bool {
        !matches!(self.devices.motor_state(), Ok(DeviceState::Busy))
            && self.devices.next_deadline().is_none()
    }

    // ========================================================================
    // Consumer
    // ========================================================================

    /// Hands one event to the orchestrator.
    ///
    /// Errors are logged and absorbed so that one failed device cannot
    /// stop the layout; `None` means the event raised one.
    pub fn dispatch(&mut self, report: &EventReport, now_ms: u64) -> Option<TransitOutcome> {
        match self
            .orchestrator
            .process_event(report, &mut self.routes, &mut self.devices, now_ms)
        {
            Ok(outcome) => Some(outcome),
            Err(e) => {
                log::warn!(
                    "event from {} absorbed: {}",
                    self.devices.name(report.source).unwrap_or("?"),
                    e
                );
                None
            }
        }
    }

    /// Dispatches one report and shows it.
    pub fn handle_report<D: EventDisplay + ?Sized>(
        &mut self,
        report: &EventReport,
        now_ms: u64,
        display: &mut D,
    ) {
        let outcome = self.dispatch(report, now_ms);
        display.show_event(report, &self.devices);
        if outcome == Some(TransitOutcome::Done) {
            display.transit_done(self.orchestrator.current_transit().map(|t| t.key()));
        }
    }

    /// Fires due device timers, then drains the queue.
    ///
    /// Returns the number of events processed.
    pub fn pump<D: EventDisplay + ?Sized>(&mut self, now_ms: u64, display: &mut D) -> usize {
        if let Err(e) = self.devices.update(now_ms) {
            log::debug!("device update at {} ms: {}", now_ms, e);
        }
        let mut processed = 0;
        while let Some(report) = self.queue.try_next() {
            self.handle_report(&report, now_ms, display);
            processed += 1;
        }
        processed
    }

    /// Blocks until an event arrives or the next device timer is due,
    /// then pumps.
    ///
    /// With no timer armed this waits for an event indefinitely.
    #[cfg(feature = "std")]
    pub fn wait_and_dispatch<C, D>(&mut self, clock: &C, display: &mut D) -> usize
    where
        C: crate::traits::Clock + ?Sized,
        D: EventDisplay + ?Sized,
    {
        let first = match self.devices.next_deadline() {
            Some(due) => {
                let wait = due.saturating_sub(clock.now_ms());
                self.queue
                    .next_event_timeout(std::time::Duration::from_millis(wait))
            }
            None => Some(self.queue.next_event()),
        };

        let now_ms = clock.now_ms();
        let mut processed = 0;
        if let Some(report) = first {
            self.handle_report(&report, now_ms, display);
            processed += 1;
        }
        processed + self.pump(now_ms, display)
    }
}

impl core::fmt::Debug for Layout {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Layout")
            .field("devices", &self.devices)
            .field("route", &self.routes.current_route_name())
            .field("orchestrator", &self.orchestrator)
            .finish()
    }
}

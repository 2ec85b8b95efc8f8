//! Transit: one automated phase of movement.
//!
//! A transit establishes its route, waits until every route device
//! reads back its target, moves the motor and then hands over to the
//! next transit. It advances only on events.
//!
//! ```text
//!            run()              route reads set          motor ActionDone
//!   Idle ───────────▶ AwaitingRoute ───────────▶ Running ───────────────▶ Idle
//!                                   (move_motor)          (Chaining | Done)
//! ```

use crate::config::{short_string, ShortString, TransitConfig};
use crate::error::LayoutError;
use crate::event::EventReport;
use crate::registry::DeviceRegistry;
use crate::route::RouteTable;
use crate::traits::MoveProfile;

/// Where a transit is in its cycle.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum TransitState {
    /// Nothing pending.
    #[default]
    Idle,
    /// Route issued; waiting for every device to read back.
    AwaitingRoute,
    /// Motor move issued; waiting for the motor to finish.
    Running,
}

/// Result of feeding one event to a transit.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TransitOutcome {
    /// Not active.
    Idle,
    /// Still waiting for the route.
    AwaitingRoute,
    /// Motor still moving.
    Running,
    /// Finished; run the next transit now.
    Chaining,
    /// Finished; wait for the operator before the next transit.
    Done,
}

/// One phase: a route to establish, then a motor move.
#[derive(Clone, Debug, PartialEq)]
pub struct Transit {
    key: ShortString,
    name: ShortString,
    route: ShortString,
    cycles: i32,
    profile: MoveProfile,
    next: Option<ShortString>,
    chain: bool,
    state: TransitState,
    route_index: Option<usize>,
}

impl Transit {
    /// Creates an idle transit that does not move the motor.
    pub fn new(key: &str, name: &str, route: &str) -> Self {
        Self {
            key: short_string(key),
            name: short_string(name),
            route: short_string(route),
            cycles: 0,
            profile: MoveProfile::default(),
            next: None,
            chain: false,
            state: TransitState::Idle,
            route_index: None,
        }
    }

    /// Builds an idle transit from its configuration.
    pub fn from_config(config: &TransitConfig) -> Self {
        Self {
            key: config.key.clone(),
            name: config.name.clone(),
            route: config.route.clone(),
            cycles: config.cycles,
            profile: config.profile(),
            next: config.next.clone(),
            chain: config.chain,
            state: TransitState::Idle,
            route_index: None,
        }
    }

    /// Sets the move.
    pub fn with_move(mut self, cycles: i32, profile: MoveProfile) -> Self {
        self.cycles = cycles;
        self.profile = profile;
        self
    }

    /// Sets the following transit and whether it runs automatically.
    pub fn with_next(mut self, key: &str, chain: bool) -> Self {
        self.next = Some(short_string(key));
        self.chain = chain;
        self
    }

    /// Lookup key.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Display name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Route established before the move.
    pub fn route_name(&self) -> &str {
        &self.route
    }

    /// Signed travel in cycles.
    pub fn cycles(&self) -> i32 {
        self.cycles
    }

    /// Ramps and speed of the move.
    pub fn profile(&self) -> MoveProfile {
        self.profile
    }

    /// Key of the following transit.
    pub fn next(&self) -> Option<&str> {
        self.next.as_deref()
    }

    /// Whether the following transit runs without waiting.
    pub fn chain(&self) -> bool {
        self.chain
    }

    /// Current state.
    pub fn state(&self) -> TransitState {
        self.state
    }

    /// Drops back to idle without touching the hardware.
    pub fn reset(&mut self) {
        self.state = TransitState::Idle;
    }

    fn route_index(&mut self, routes: &RouteTable) -> Result<usize, LayoutError> {
        if let Some(index) = self.route_index {
            return Ok(index);
        }
        let index = routes
            .index_of(&self.route)
            .ok_or_else(|| LayoutError::RouteNotFound(self.route.clone()))?;
        self.route_index = Some(index);
        Ok(index)
    }

    /// Issues the route and starts waiting for it.
    ///
    /// Safe to call again; the route is reissued and the wait restarts.
    ///
    /// # Errors
    ///
    /// The route's error. The state is left unchanged.
    pub fn run(
        &mut self,
        routes: &mut RouteTable,
        devices: &mut DeviceRegistry,
        now_ms: u64,
    ) -> Result<(), LayoutError> {
        let index = self.route_index(routes)?;
        log::info!("transit {} ({}): route {}", self.key, self.name, self.route);
        routes.set_route_at(index, devices, now_ms)?;
        self.state = TransitState::AwaitingRoute;
        Ok(())
    }

    /// Advances on one event.
    ///
    /// While awaiting the route, any event triggers a read-back of every
    /// route device. While running, only `ActionDone` from the motor
    /// counts; everything else is ignored.
    ///
    /// # Errors
    ///
    /// A move the motor refused. The transit is then idle.
    pub fn handle_event(
        &mut self,
        report: &EventReport,
        routes: &RouteTable,
        devices: &mut DeviceRegistry,
        now_ms: u64,
    ) -> Result<TransitOutcome, LayoutError> {
        match self.state {
            TransitState::Idle => Ok(TransitOutcome::Idle),
            TransitState::AwaitingRoute => {
                let index = self.route_index(routes)?;
                let set = routes
                    .route_at(index)
                    .is_some_and(|route| route.is_route_set(devices));
                if !set {
                    return Ok(TransitOutcome::AwaitingRoute);
                }
                if let Err(e) = devices.move_motor(self.cycles, self.profile, now_ms) {
                    log::warn!("transit {}: motor refused move: {}", self.key, e);
                    self.state = TransitState::Idle;
                    return Err(e);
                }
                log::info!("transit {}: route {} set, moving {}", self.key, self.route, self.cycles);
                self.state = TransitState::Running;
                Ok(TransitOutcome::Running)
            }
            TransitState::Running => {
                let motor = devices.motor_id()?;
                if !report.is_done_from(motor) {
                    return Ok(TransitOutcome::Running);
                }
                self.state = TransitState::Idle;
                if self.chain {
                    Ok(TransitOutcome::Chaining)
                } else {
                    Ok(TransitOutcome::Done)
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LayoutConfig;
    use crate::event::{DeviceId, EventData, EventKind, EventQueue};
    use crate::hal::mock_registry;
    use crate::traits::{Direction, Speed};
    use alloc::boxed::Box;
    use alloc::vec::Vec;

    struct Rig {
        routes: RouteTable,
        devices: DeviceRegistry,
        now: u64,
    }

    impl Rig {
        fn new() -> Self {
            let config = LayoutConfig::default();
            Self {
                routes: RouteTable::from_config(&config),
                devices: mock_registry(&config, EventQueue::shared()).unwrap(),
                now: 0,
            }
        }

        /// Fires timers and feeds every event to `transit` until nothing
        /// is left to do. Returns the outcomes in order.
        fn drive(&mut self, transit: &mut Transit) -> Vec<TransitOutcome> {
            let mut outcomes = Vec::new();
            loop {
                while let Some(report) = self.devices.queue().try_next() {
                    outcomes.push(
                        transit
                            .handle_event(&report, &self.routes, &mut self.devices, self.now)
                            .unwrap(),
                    );
                }
                match self.devices.next_deadline() {
                    Some(due) => {
                        self.now = due;
                        self.devices.update(due).unwrap();
                    }
                    None => return outcomes,
                }
            }
        }
    }

    fn main_down() -> Transit {
        Transit::from_config(LayoutConfig::default().transit("MD").unwrap())
    }

    // =========================================================================
    // Construction
    // =========================================================================

    #[test]
    fn from_config_copies_parameters() {
        let t = main_down();
        assert_eq!(t.key(), "MD");
        assert_eq!(t.name(), "Main Down");
        assert_eq!(t.route_name(), "Main");
        assert_eq!(t.cycles(), 33);
        assert_eq!(
            t.profile(),
            MoveProfile {
                accelerate: false,
                brake: true,
                speed: Speed::Medium,
            }
        );
        assert_eq!(t.next(), Some("R1"));
        assert!(!t.chain());
        assert_eq!(t.state(), TransitState::Idle);
    }

    #[test]
    fn idle_ignores_events() {
        let mut rig = Rig::new();
        let mut t = main_down();
        let report = EventReport::new(DeviceId::from_index(0), EventKind::ActionDone, EventData::None);
        assert_eq!(
            t.handle_event(&report, &rig.routes, &mut rig.devices, 0),
            Ok(TransitOutcome::Idle)
        );
    }

    // =========================================================================
    // Sequencing
    // =========================================================================

    #[test]
    fn route_then_move_then_done() {
        let mut rig = Rig::new();
        let mut t = main_down();

        t.run(&mut rig.routes, &mut rig.devices, 0).unwrap();
        assert_eq!(t.state(), TransitState::AwaitingRoute);

        let outcomes = rig.drive(&mut t);
        assert_eq!(outcomes.last(), Some(&TransitOutcome::Done));
        assert_eq!(
            outcomes.iter().filter(|o| **o == TransitOutcome::Done).count(),
            1
        );
        // the move started only once the route read back
        let first_running = outcomes
            .iter()
            .position(|o| *o == TransitOutcome::Running)
            .unwrap();
        assert!(outcomes[..first_running]
            .iter()
            .all(|o| *o == TransitOutcome::AwaitingRoute));

        assert_eq!(t.state(), TransitState::Idle);
        assert!(rig.routes.get("Main").unwrap().is_route_set(&rig.devices));
        assert_eq!(rig.devices.motor_state(), Ok(crate::event::DeviceState::Stopped));
    }

    #[test]
    fn chaining_transit_reports_chaining() {
        let mut rig = Rig::new();
        let mut t = Transit::new("T", "Test", "Coach")
            .with_move(-2, MoveProfile::cruise(Speed::Fast))
            .with_next("MD", true);

        t.run(&mut rig.routes, &mut rig.devices, 0).unwrap();
        let outcomes = rig.drive(&mut t);
        assert_eq!(outcomes.last(), Some(&TransitOutcome::Chaining));
    }

    #[test]
    fn running_ignores_other_sources() {
        let mut rig = Rig::new();
        let mut t = main_down();
        t.run(&mut rig.routes, &mut rig.devices, 0).unwrap();

        // settle the route but stop before the motor finishes
        while t.state() != TransitState::Running {
            let report = match rig.devices.queue().try_next() {
                Some(r) => r,
                None => {
                    let due = rig.devices.next_deadline().unwrap();
                    rig.devices.update(due).unwrap();
                    continue;
                }
            };
            t.handle_event(&report, &rig.routes, &mut rig.devices, 0).unwrap();
        }

        let r1 = rig.devices.lookup("R1").unwrap();
        let stray = EventReport::new(r1, EventKind::ActionDone, EventData::None);
        assert_eq!(
            t.handle_event(&stray, &rig.routes, &mut rig.devices, 0),
            Ok(TransitOutcome::Running)
        );
        let motor = rig.devices.motor_id().unwrap();
        let init = EventReport::new(motor, EventKind::ActionInit, EventData::None);
        assert_eq!(
            t.handle_event(&init, &rig.routes, &mut rig.devices, 0),
            Ok(TransitOutcome::Running)
        );
        let done = EventReport::new(
            motor,
            EventKind::ActionDone,
            EventData::Direction(Direction::Stopped),
        );
        assert_eq!(
            t.handle_event(&done, &rig.routes, &mut rig.devices, 0),
            Ok(TransitOutcome::Done)
        );
    }

    #[test]
    fn unknown_route_leaves_transit_idle() {
        let mut rig = Rig::new();
        let mut t = Transit::new("X", "Nowhere", "Siding");
        assert_eq!(
            t.run(&mut rig.routes, &mut rig.devices, 0),
            Err(LayoutError::RouteNotFound(short_string("Siding")))
        );
        assert_eq!(t.state(), TransitState::Idle);
    }

    #[test]
    fn motor_refusal_returns_to_idle() {
        let config = LayoutConfig::default();
        let mut routes = RouteTable::from_config(&config);
        // a layout without a motor
        let mut devices = DeviceRegistry::new(EventQueue::shared());
        devices
            .register(
                "S1",
                Box::new(
                    crate::devices::SectorPlate::from_config(
                        crate::hal::MockServo::new(),
                        &config.sector,
                    )
                    .unwrap(),
                ),
            )
            .unwrap();
        for relay in ["R1", "R2", "R3"] {
            devices
                .register(relay, Box::new(crate::devices::Relay::new(crate::hal::MockPin::new())))
                .unwrap();
        }

        let mut t = main_down();
        t.run(&mut routes, &mut devices, 0).unwrap();
        let mut result = Ok(TransitOutcome::AwaitingRoute);
        while result == Ok(TransitOutcome::AwaitingRoute) {
            let report = match devices.queue().try_next() {
                Some(r) => r,
                None => {
                    let due = devices.next_deadline().unwrap();
                    devices.update(due).unwrap();
                    continue;
                }
            };
            result = t.handle_event(&report, &routes, &mut devices, 0);
        }
        assert_eq!(result, Err(LayoutError::NoMotor));
        assert_eq!(t.state(), TransitState::Idle);
    }
}

//! Linear motor motion engine.
//!
//! The linear motor is a two-phase stepper laid flat along the track. A
//! DRV8833 dual H-bridge drives its coils from four PWM inputs; each
//! micro-step writes one row of [`PWM_TABLE`] to them. Four full steps
//! (64 micro-steps) make one cycle, the unit of travel.
//!
//! Each step is scheduled individually: after writing a row the motor
//! computes the delay to the next step from the cruise speed and the
//! acceleration and braking ramps (see [`ramp`]), so speed changes are
//! realised by stretching the step period rather than by a fixed-rate
//! timer.
//!
//! # Example
//!
//! ```rust
//! use cake_layout::motor::LinearMotor;
//! use cake_layout::hal::MockPhases;
//! use cake_layout::traits::{Device, Motion, MoveProfile, Speed, Direction};
//! use cake_layout::{EventQueue, EventSource, DeviceId, EventKind};
//!
//! let queue = EventQueue::shared();
//! let events = EventSource::new(DeviceId::from_index(0), queue.clone());
//! let mut motor = LinearMotor::new(MockPhases::new());
//!
//! motor.move_by(1, MoveProfile::cruise(Speed::Fast), 0, &events).unwrap();
//! assert_eq!(motor.direction(), Direction::Down);
//!
//! // Drive the step timer to completion
//! while let Some(due) = motor.next_deadline() {
//!     motor.update(due, &events).unwrap();
//! }
//! assert_eq!(motor.phases().writes, 1 + 64);
//! assert_eq!(queue.try_next().unwrap().kind, EventKind::ActionInit);
//! assert_eq!(queue.try_next().unwrap().kind, EventKind::ActionDone);
//! ```

use crate::error::LayoutError;
use crate::event::{DeviceKind, DeviceState, EventData, EventKind, EventSource};
use crate::traits::{Device, Direction, Motion, MoveProfile, PhaseDriver, Speed};

/// Micro-step duty table for the DRV8833 inputs A1, A2, B1, B2.
///
/// The inputs are active low, so each value is `65535 - duty`. Only one
/// input of each bridge carries PWM at a time; its partner is held at
/// full scale. Row 0 is the idle phasing written at power-up.
#[rustfmt::skip]
pub const PWM_TABLE: [[u16; 4]; 64] = [
    [19195, 65535, 19195, 65535],
    [14876, 65535, 23960, 65535],
    [11045, 65535, 29126, 65535],
    [7738, 65535, 34642, 65535],
    [4989, 65535, 40456, 65535],
    [2822, 65535, 46511, 65535],
    [1259, 65535, 52750, 65535],
    [316, 65535, 59111, 65535],
    [0, 65535, 65535, 65535],
    [316, 65535, 65535, 59111],
    [1259, 65535, 65535, 52750],
    [2822, 65535, 65535, 46511],
    [4989, 65535, 65535, 40456],
    [7738, 65535, 65535, 34642],
    [11045, 65535, 65535, 29126],
    [14876, 65535, 65535, 23960],
    [19195, 65535, 65535, 19195],
    [23960, 65535, 65535, 14876],
    [29126, 65535, 65535, 11045],
    [34642, 65535, 65535, 7738],
    [40456, 65535, 65535, 4989],
    [46511, 65535, 65535, 2822],
    [52750, 65535, 65535, 1259],
    [59111, 65535, 65535, 316],
    [65535, 65535, 65535, 0],
    [65535, 59111, 65535, 316],
    [65535, 52750, 65535, 1259],
    [65535, 46511, 65535, 2822],
    [65535, 40456, 65535, 4989],
    [65535, 34642, 65535, 7738],
    [65535, 29126, 65535, 11045],
    [65535, 23960, 65535, 14876],
    [65535, 19195, 65535, 19195],
    [65535, 14876, 65535, 23960],
    [65535, 11045, 65535, 29126],
    [65535, 7738, 65535, 34642],
    [65535, 4989, 65535, 40456],
    [65535, 2822, 65535, 46511],
    [65535, 1259, 65535, 52750],
    [65535, 316, 65535, 59111],
    [65535, 0, 65535, 65535],
    [65535, 316, 59111, 65535],
    [65535, 1259, 52750, 65535],
    [65535, 2822, 46511, 65535],
    [65535, 4989, 40456, 65535],
    [65535, 7738, 34642, 65535],
    [65535, 11045, 29126, 65535],
    [65535, 14876, 23960, 65535],
    [65535, 19195, 19195, 65535],
    [65535, 23960, 14876, 65535],
    [65535, 29126, 11045, 65535],
    [65535, 34642, 7738, 65535],
    [65535, 40456, 4989, 65535],
    [65535, 46511, 2822, 65535],
    [65535, 52750, 1259, 65535],
    [65535, 59111, 316, 65535],
    [65535, 65535, 0, 65535],
    [59111, 65535, 316, 65535],
    [52750, 65535, 1259, 65535],
    [46511, 65535, 2822, 65535],
    [40456, 65535, 4989, 65535],
    [34642, 65535, 7738, 65535],
    [29126, 65535, 11045, 65535],
    [23960, 65535, 14876, 65535],
];

/// Micro-steps per full step.
pub const MICRO_STEPS_PER_STEP: u32 = (PWM_TABLE.len() / 4) as u32;

/// Full steps per cycle.
pub const STEPS_PER_CYCLE: u32 = 4;

/// Micro-steps per cycle: one pass through the table.
pub const MICRO_STEPS_PER_CYCLE: u32 = MICRO_STEPS_PER_STEP * STEPS_PER_CYCLE;

/// Acceleration in micro-steps per second squared.
pub const ACCEL_RATE: f64 = 4.0;

/// Deceleration in micro-steps per second squared.
pub const DECEL_RATE: f64 = 6.0;

/// Step period computation.
///
/// Kept free of motor state so the kinematics can be checked on their own.
pub mod ramp {
    use super::{ACCEL_RATE, DECEL_RATE};
    use crate::traits::MoveProfile;

    /// Ramp bookkeeping carried from one step to the next.
    #[derive(Clone, Copy, Debug, Default, PartialEq)]
    pub struct RampState {
        /// Time to stop from the previous step's remaining count, in seconds.
        pub brake_time: Option<f64>,
        /// Time spent accelerating so far, in seconds.
        pub accel_time: f64,
    }

    /// Seconds to stop from `remaining` micro-steps at the braking rate.
    fn stop_time(remaining: u64) -> f64 {
        libm::sqrt(2.0 * remaining as f64 / DECEL_RATE)
    }

    fn to_ms(seconds: f64) -> u32 {
        let ms = libm::round(seconds * 1000.0);
        if ms <= 0.0 {
            0
        } else {
            ms as u32
        }
    }

    /// Delay in milliseconds until the next micro-step.
    ///
    /// `total` is the length of the move and `remaining` the micro-steps
    /// still to run, counting the one being scheduled. Returns the delay
    /// and the bookkeeping for the following step.
    ///
    /// The delay is never shorter than the speed's base delay. While the
    /// braking curve is slower than cruise the motor is braking and the
    /// acceleration curve is neither consulted nor advanced.
    ///
    /// ```
    /// use cake_layout::motor::ramp::{next_delay_ms, RampState};
    /// use cake_layout::traits::{MoveProfile, Speed};
    ///
    /// let cruise = MoveProfile::cruise(Speed::Medium);
    /// let (delay, _) = next_delay_ms(&cruise, 64, 64, RampState::default());
    /// assert_eq!(delay, 10);
    ///
    /// // First accelerating step: sqrt(2 * 1 / 4) s
    /// let launch = MoveProfile { accelerate: true, ..cruise };
    /// let (delay, state) = next_delay_ms(&launch, 640, 640, RampState::default());
    /// assert_eq!(delay, 707);
    /// assert!(state.accel_time > 0.7);
    /// ```
    pub fn next_delay_ms(
        profile: &MoveProfile,
        total: u64,
        remaining: u64,
        state: RampState,
    ) -> (u32, RampState) {
        let base = profile.speed.base_delay_ms();
        let mut delay = base;
        let mut next = state;
        let mut braking = false;

        if profile.brake {
            let t0 = state.brake_time.unwrap_or_else(|| stop_time(remaining));
            let t1 = stop_time(remaining.saturating_sub(1));
            next.brake_time = Some(t1);
            let brake_ms = to_ms(t0 - t1);
            braking = brake_ms > base;
            delay = delay.max(brake_ms);
        }

        if !braking && profile.accelerate {
            let progress = total.saturating_sub(remaining) + 1;
            let t1 = libm::sqrt(2.0 * progress as f64 / ACCEL_RATE);
            delay = delay.max(to_ms(t1 - state.accel_time));
            next.accel_time = t1;
        }

        (delay, next)
    }
}

/// Magnetic linear stepper motor.
///
/// Generic over the bridge driver so the same engine runs against real
/// PWM channels ([`PwmPhases`](crate::hal::PwmPhases)) or a recording
/// mock.
pub struct LinearMotor<P: PhaseDriver> {
    phases: P,
    direction: Direction,
    profile: MoveProfile,
    micro_step: usize,
    remaining: u64,
    total: u64,
    ramp: ramp::RampState,
    next_step_at: Option<u64>,
}

impl<P: PhaseDriver> LinearMotor<P> {
    /// Creates a stopped motor and writes the idle phasing.
    pub fn new(mut phases: P) -> Self {
        if phases.set_duties(PWM_TABLE[0]).is_err() {
            log::warn!("linear motor: initial phase write failed");
        }
        Self {
            phases,
            direction: Direction::Stopped,
            profile: MoveProfile::default(),
            micro_step: 0,
            remaining: 0,
            total: 0,
            ramp: ramp::RampState::default(),
            next_step_at: None,
        }
    }

    /// Index of the current row in [`PWM_TABLE`].
    pub fn micro_step(&self) -> usize {
        self.micro_step
    }

    /// Micro-steps left in the current move.
    pub fn remaining(&self) -> u64 {
        self.remaining
    }

    /// Micro-steps in the current (or last) move.
    pub fn total(&self) -> u64 {
        self.total
    }

    /// The bridge driver.
    pub fn phases(&self) -> &P {
        &self.phases
    }

    /// Mutable access to the bridge driver.
    pub fn phases_mut(&mut self) -> &mut P {
        &mut self.phases
    }

    fn halt(&mut self) {
        self.direction = Direction::Stopped;
        self.remaining = 0;
        self.next_step_at = None;
    }

    fn schedule_next(&mut self, from_ms: u64) {
        let (delay, ramp) =
            ramp::next_delay_ms(&self.profile, self.total, self.remaining, self.ramp);
        self.ramp = ramp;
        self.next_step_at = Some(from_ms + u64::from(delay));
    }

    fn advance(&mut self) {
        let len = PWM_TABLE.len() as isize;
        let step = isize::from(self.direction.step());
        self.micro_step = (self.micro_step as isize + step).rem_euclid(len) as usize;
    }
}

impl<P: PhaseDriver> Motion for LinearMotor<P> {
    fn move_by(
        &mut self,
        cycles: i32,
        profile: MoveProfile,
        now_ms: u64,
        events: &EventSource,
    ) -> Result<(), LayoutError> {
        if cycles == 0 {
            if self.next_step_at.is_some() {
                log::debug!("linear motor: move cancelled with {} to go", self.remaining);
            }
            self.halt();
            return events.report(
                EventKind::ActionDone,
                EventData::Direction(Direction::Stopped),
            );
        }

        if self.is_moving() {
            log::debug!(
                "linear motor: superseding move with {} to go",
                self.remaining
            );
        }
        self.direction = Direction::for_cycles(cycles);
        self.profile = profile;
        self.total = u64::from(cycles.unsigned_abs()) * u64::from(MICRO_STEPS_PER_CYCLE);
        self.remaining = self.total;
        self.ramp = ramp::RampState::default();
        self.schedule_next(now_ms);

        events.report(
            EventKind::ActionInit,
            EventData::Motion {
                direction: self.direction,
                speed: profile.speed,
            },
        )
    }

    fn direction(&self) -> Direction {
        self.direction
    }

    fn speed(&self) -> Speed {
        self.profile.speed
    }
}

impl<P: PhaseDriver> Device for LinearMotor<P> {
    fn kind(&self) -> DeviceKind {
        DeviceKind::LinearMotor
    }

    fn state(&self) -> DeviceState {
        if self.direction == Direction::Stopped {
            DeviceState::Stopped
        } else {
            DeviceState::Busy
        }
    }

    fn next_deadline(&self) -> Option<u64> {
        self.next_step_at
    }

    /// Runs every step due by `now_ms`, each scheduled from the previous
    /// step's deadline so a late call does not stretch the trajectory.
    fn update(&mut self, now_ms: u64, events: &EventSource) -> Result<(), LayoutError> {
        while let Some(due) = self.next_step_at {
            if due > now_ms {
                break;
            }
            self.advance();
            if self.phases.set_duties(PWM_TABLE[self.micro_step]).is_err() {
                self.halt();
                if let Err(e) = events.report(
                    EventKind::ActionError,
                    EventData::Direction(Direction::Stopped),
                ) {
                    log::warn!("linear motor: fault not reported: {}", e);
                }
                return Err(LayoutError::HardwareFault(Default::default()));
            }

            self.remaining -= 1;
            if self.remaining > 0 {
                self.schedule_next(due);
            } else {
                self.halt();
                return events.report(
                    EventKind::ActionDone,
                    EventData::Direction(Direction::Stopped),
                );
            }
        }
        Ok(())
    }

    fn as_motion(&mut self) -> Option<&mut dyn Motion> {
        Some(self)
    }
}

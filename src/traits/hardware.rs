//! Hardware abstraction traits for the motor bridge and time source.
//!
//! # Key Traits
//!
//! | Trait | Purpose |
//! |-------|---------|
//! | [`PhaseDriver`] | Four-channel PWM bridge feeding the linear motor coils |
//! | [`Clock`] | Time source for `no_std` environments |
//!
//! Relays and the sector servo use the `embedded-hal` 1.0 traits
//! directly (`StatefulOutputPin`, `SetDutyCycle`), so any HAL crate's
//! pins plug straight in.
//!
//! # Example
//!
//! ```rust
//! use cake_layout::traits::{PhaseDriver, Direction};
//! use cake_layout::hal::MockPhases;
//!
//! let mut phases = MockPhases::new();
//! phases.set_duties([19195, 65535, 19195, 65535]).unwrap();
//! assert_eq!(phases.duties, [19195, 65535, 19195, 65535]);
//!
//! assert_eq!(Direction::for_cycles(-3), Direction::Up);
//! ```

/// Direction of linear motor travel.
///
/// Down is the positive direction: it advances the micro-step index.
///
/// # Default
///
/// Defaults to [`Stopped`](Self::Stopped).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum Direction {
    /// Travelling down the layout (positive cycles).
    Down,
    /// Travelling up the layout (negative cycles).
    Up,
    /// Not moving.
    #[default]
    Stopped,
}

impl Direction {
    /// Returns the direction as a lowercase string.
    ///
    /// # Examples
    ///
    /// ```
    /// use cake_layout::Direction;
    ///
    /// assert_eq!(Direction::Down.as_str(), "down");
    /// assert_eq!(Direction::Up.as_str(), "up");
    /// assert_eq!(Direction::Stopped.as_str(), "stopped");
    /// ```
    #[inline]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Direction::Down => "down",
            Direction::Up => "up",
            Direction::Stopped => "stopped",
        }
    }

    /// Direction of a signed move: positive is down, negative is up.
    #[inline]
    pub const fn for_cycles(cycles: i32) -> Self {
        if cycles > 0 {
            Direction::Down
        } else if cycles < 0 {
            Direction::Up
        } else {
            Direction::Stopped
        }
    }

    /// Signed micro-step increment for one step in this direction.
    #[inline]
    pub const fn step(&self) -> i8 {
        match self {
            Direction::Down => 1,
            Direction::Up => -1,
            Direction::Stopped => 0,
        }
    }
}

/// Linear motor cruise speed.
///
/// A closed set: an out-of-range speed cannot be expressed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum Speed {
    /// 40 micro-steps per second.
    Slow,
    /// 96 micro-steps per second.
    #[default]
    Medium,
    /// 248 micro-steps per second.
    Fast,
}

impl Speed {
    /// Cruise rate in micro-steps per second.
    #[inline]
    pub const fn micro_steps_per_second(&self) -> u32 {
        match self {
            Speed::Slow => 40,
            Speed::Medium => 96,
            Speed::Fast => 248,
        }
    }

    /// Nominal delay between micro-steps at cruise, in milliseconds.
    ///
    /// ```
    /// use cake_layout::traits::Speed;
    ///
    /// assert_eq!(Speed::Slow.base_delay_ms(), 25);
    /// assert_eq!(Speed::Medium.base_delay_ms(), 10);
    /// assert_eq!(Speed::Fast.base_delay_ms(), 4);
    /// ```
    #[inline]
    pub const fn base_delay_ms(&self) -> u32 {
        let rate = self.micro_steps_per_second();
        (1000 + rate / 2) / rate
    }

    /// Returns the speed as a lowercase string.
    #[inline]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Speed::Slow => "slow",
            Speed::Medium => "medium",
            Speed::Fast => "fast",
        }
    }
}

/// Four-channel bridge driving the linear motor's two coils.
///
/// Each micro-step writes one row of the waveform table: duty values
/// for A1, A2, B1 and B2, full scale `u16::MAX`.
///
/// # Implementation Notes
///
/// - Called from the step timer; must not block
/// - All four channels should change together
///
/// # Example Implementation
///
/// ```rust,ignore
/// use cake_layout::traits::PhaseDriver;
///
/// struct MyBridge { /* four PWM channels */ }
///
/// impl PhaseDriver for MyBridge {
///     type Error = ();
///
///     fn set_duties(&mut self, duties: [u16; 4]) -> Result<(), ()> {
///         // Write each channel's compare register...
///         Ok(())
///     }
/// }
/// ```
pub trait PhaseDriver {
    /// Error type for bridge writes.
    type Error;

    /// Write the four coil duty values for one micro-step.
    fn set_duties(&mut self, duties: [u16; 4]) -> Result<(), Self::Error>;
}

/// Time source trait for `no_std` compatibility.
///
/// Provides monotonic time in milliseconds for device timers.
/// On desktop, this wraps `std::time::Instant` ([`StdClock`]). On
/// embedded, use a hardware timer.
///
/// # Example
///
/// ```rust
/// use cake_layout::traits::Clock;
/// use cake_layout::hal::MockClock;
///
/// let mut clock = MockClock::new();
/// assert_eq!(clock.now_ms(), 0);
///
/// clock.advance(100);
/// assert_eq!(clock.now_ms(), 100);
/// ```
///
/// [`StdClock`]: crate::hal::StdClock
pub trait Clock {
    /// Returns current time in milliseconds since an arbitrary epoch.
    ///
    /// Must be monotonically increasing.
    fn now_ms(&self) -> u64;
}

#[cfg(test)]
mod tests {
    use super::*;

    // =========================================================================
    // Direction Tests
    // =========================================================================

    #[test]
    fn direction_default() {
        assert_eq!(Direction::default(), Direction::Stopped);
    }

    #[test]
    fn direction_for_cycles() {
        assert_eq!(Direction::for_cycles(33), Direction::Down);
        assert_eq!(Direction::for_cycles(-32), Direction::Up);
        assert_eq!(Direction::for_cycles(0), Direction::Stopped);
    }

    #[test]
    fn direction_step_sign() {
        assert_eq!(Direction::Down.step(), 1);
        assert_eq!(Direction::Up.step(), -1);
        assert_eq!(Direction::Stopped.step(), 0);
    }

    // =========================================================================
    // Speed Tests
    // =========================================================================

    #[test]
    fn speed_default_is_medium() {
        assert_eq!(Speed::default(), Speed::Medium);
    }

    #[test]
    fn speed_rates() {
        assert_eq!(Speed::Slow.micro_steps_per_second(), 40);
        assert_eq!(Speed::Medium.micro_steps_per_second(), 96);
        assert_eq!(Speed::Fast.micro_steps_per_second(), 248);
    }

    #[test]
    fn speed_base_delays_round() {
        // 1000/96 = 10.4, 1000/248 = 4.03
        assert_eq!(Speed::Slow.base_delay_ms(), 25);
        assert_eq!(Speed::Medium.base_delay_ms(), 10);
        assert_eq!(Speed::Fast.base_delay_ms(), 4);
    }
}

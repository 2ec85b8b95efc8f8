//! Hardware Abstraction Layer implementations.
//!
//! This module contains concrete implementations of the traits
//! defined in [`crate::traits`].
//!
//! # Available Implementations
//!
//! - `mock`: Test implementations for desktop development
//! - `pwm`: Motor bridge over any four `embedded-hal` PWM channels
//! - `log_display`: Event display that writes to the `log` facade
//! - `clock`: `Instant`-based clock (requires `std` feature)

pub mod log_display;
pub mod mock;
pub mod pwm;

#[cfg(feature = "std")]
pub mod clock;

pub use log_display::LogDisplay;
pub use mock::*;
pub use pwm::{PhaseError, PwmPhases};

#[cfg(feature = "std")]
pub use clock::StdClock;

//! Trait definitions for hardware abstraction, devices and display.
//!
//! This module defines the core abstractions that allow the layout to:
//! - Run on different hardware (a microcontroller, or desktop mocks)
//! - Treat the motor, relays, sector plate and inputs uniformly
//! - Show events on any kind of display
//!
//! # Submodules
//!
//! - `hardware`: Motor bridge, clock, direction and speed
//! - `device`: The [`Device`] capability interface and [`Motion`]
//! - `display`: The [`EventDisplay`] consumer

pub mod device;
pub mod display;
pub mod hardware;

pub use device::*;
pub use display::*;
pub use hardware::*;

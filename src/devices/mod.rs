//! Route and input device drivers.
//!
//! - [`Relay`]: track section power on an output pin
//! - [`SectorPlate`]: servo-positioned sector plate
//! - [`InputDevice`]: encoder and button registry entries
//!
//! The linear motor lives in [`crate::motor`].

pub mod input;
pub mod relay;
pub mod sector;

pub use input::InputDevice;
pub use relay::{Relay, RELAY_SETTLE_MS};
pub use sector::SectorPlate;

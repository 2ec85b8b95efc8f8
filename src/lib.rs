//! # cake-layout
//!
//! Automation core for a small model railway: a stepper-driven
//! traverser, a servo-driven sector plate, relay-switched track sections,
//! and an operator with one knob and one button.
//!
//! ## Features
//!
//! - **Event queue**: bounded, multi-producer queue of device reports; drivers never block
//! - **Linear motor**: table-driven micro-stepping with square-root acceleration and braking ramps
//! - **Routes**: ordered relay and sector settings, confirmed by reading every device back
//! - **Transits**: route, then move, then hand over to the next phase, driven only by events
//! - **Simulation**: mock hardware for every device, with deterministic simulated time
//!
//! ## Architecture
//!
//! The crate is structured to allow testing on desktop without hardware:
//!
//! - `event` - Event reports and the shared queue
//! - `registry` - Named devices and their event sources
//! - `motor` - Linear motor and ramp engine
//! - `devices` - Relays, sector plate and inputs
//! - `route`, `transit`, `orchestrator` - Automation state machines
//! - `layout` - Application context owning all of the above
//! - `hal` - Concrete implementations (mock for testing, PWM bridge for hardware)
//!
//! ## Example
//!
//! ```rust
//! use cake_layout::{
//!     config::LayoutConfig,
//!     hal::{with_mock_devices, MockClock, MockDisplay},
//!     traits::Clock,
//! };
//!
//! let mut layout = with_mock_devices(&LayoutConfig::default()).unwrap();
//! let mut clock = MockClock::new();
//! let mut display = MockDisplay::new();
//!
//! // Run "Main Down": set the Main route, then move the traverser
//! layout.run_transit("MD", clock.now_ms()).unwrap();
//!
//! // Drive simulated time through every device timer
//! while let Some(due) = layout.devices().next_deadline() {
//!     clock.set(due);
//!     layout.pump(clock.now_ms(), &mut display);
//! }
//!
//! assert_eq!(display.completions, [Some(String::from("R1"))]);
//! ```

#![cfg_attr(not(feature = "std"), no_std)]
#![warn(missing_docs)]

extern crate alloc;

/// Layout description: devices, routes and transits.
pub mod config;
/// Concrete drivers for relays, the sector plate and inputs.
pub mod devices;
/// Error type shared by every layout operation.
pub mod error;
/// Event reports and the bounded event queue.
pub mod event;
/// Hardware abstraction layer with mock implementations for testing.
pub mod hal;
/// Application context tying devices, routes and transits together.
pub mod layout;
/// Linear motor micro-stepping and ramp engine.
pub mod motor;
/// Transit sequencing and the completion callback.
pub mod orchestrator;
/// Named device registry.
pub mod registry;
/// Routes and the route table.
pub mod route;
/// Core traits for hardware abstraction and devices.
pub mod traits;
/// Single transit state machine.
pub mod transit;

// Re-exports for convenience
pub use config::LayoutConfig;
pub use error::LayoutError;
pub use event::{
    DeviceId, DeviceKind, DeviceState, DeviceValue, EventData, EventKind, EventQueue, EventReport,
    EventSource, EVENT_QUEUE_CAPACITY,
};
pub use layout::Layout;
pub use orchestrator::TransitOrchestrator;
pub use registry::DeviceRegistry;
pub use route::{Route, RouteCommand, RouteTable};
pub use traits::{
    // Hardware
    Clock,
    Device,
    Direction,
    // Display
    EventDisplay,
    Motion,
    MoveProfile,
    PhaseDriver,
    Speed,
};
pub use transit::{Transit, TransitOutcome, TransitState};

//! Display abstraction for layout events.
//!
//! The display is a second, read-only consumer: it is shown every report
//! the consumer loop dequeues, after the orchestrator has seen it, and
//! never produces events of its own.

use crate::event::EventReport;
use crate::registry::DeviceRegistry;

/// Display trait for rendering layout events.
///
/// Implementors decode the report with the registry (device name and
/// kind) and render it however suits the hardware: an OLED status line,
/// a log record, or a recording for tests.
///
/// # Example
///
/// ```ignore
/// use cake_layout::traits::EventDisplay;
/// use cake_layout::{EventReport, DeviceRegistry};
///
/// struct MyScreen { /* ... */ }
///
/// impl EventDisplay for MyScreen {
///     fn show_event(&mut self, report: &EventReport, devices: &DeviceRegistry) {
///         // Draw the device name and its new state...
///     }
///
///     fn transit_done(&mut self, next: Option<&str>) {
///         // Prompt the operator for the next transit...
///     }
/// }
/// ```
pub trait EventDisplay {
    /// Shows one dequeued event.
    fn show_event(&mut self, report: &EventReport, devices: &DeviceRegistry);

    /// A non-chaining transit finished; `next` is the transit now waiting.
    fn transit_done(&mut self, next: Option<&str>);
}

impl<D: EventDisplay + ?Sized> EventDisplay for &mut D {
    fn show_event(&mut self, report: &EventReport, devices: &DeviceRegistry) {
        (**self).show_event(report, devices)
    }

    fn transit_done(&mut self, next: Option<&str>) {
        (**self).transit_done(next)
    }
}

//! Display that writes each event to the `log` facade.

use crate::event::{DeviceKind, EventData, EventKind, EventReport};
use crate::registry::DeviceRegistry;
use crate::traits::EventDisplay;

/// Logs one line per event at `info`, decoded by device kind.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogDisplay;

impl LogDisplay {
    /// Creates the display.
    pub const fn new() -> Self {
        Self
    }
}

fn verb(kind: EventKind) -> &'static str {
    match kind {
        EventKind::ActionInit => "started",
        EventKind::ActionDone => "done",
        EventKind::ActionError => "FAILED",
        EventKind::Quadrature => "turned",
        EventKind::Switch => "button",
    }
}

impl EventDisplay for LogDisplay {
    fn show_event(&mut self, report: &EventReport, devices: &DeviceRegistry) {
        let name = devices.name(report.source).unwrap_or("?");
        let kind = devices.kind(report.source);
        let what = verb(report.kind);

        match (kind, report.data) {
            (Some(DeviceKind::LinearMotor), EventData::Motion { direction, speed }) => {
                log::info!("{} {} {} at {} speed", name, what, direction.as_str(), speed.as_str())
            }
            (Some(DeviceKind::LinearMotor), EventData::Direction(direction)) => {
                log::info!("{} {}: {}", name, what, direction.as_str())
            }
            (Some(DeviceKind::Relay), EventData::Value(value)) => {
                log::info!("{} {}: {}", name, what, value)
            }
            (Some(DeviceKind::Sector), EventData::State(state)) => {
                log::info!("{} {}: {:?}", name, what, state)
            }
            (Some(DeviceKind::Sector), EventData::Value(value)) => {
                log::info!("{} {}: rejected {}", name, what, value)
            }
            (Some(DeviceKind::Quadrature), EventData::Rotation(step)) => {
                log::info!("{} {} {}", name, what, if step > 0 { "clockwise" } else { "anticlockwise" })
            }
            (Some(DeviceKind::Switch), EventData::Switch(pressed)) => {
                log::info!("{} {} {}", name, what, if pressed { "pressed" } else { "released" })
            }
            (_, data) => log::info!("{} {}: {:?}", name, what, data),
        }
    }

    fn transit_done(&mut self, next: Option<&str>) {
        match next {
            Some(next) => log::info!("transit complete; press to run {}", next),
            None => log::info!("transit complete; end of sequence"),
        }
    }
}

//! Layout configuration: devices, routes and transits.
//!
//! Uses `heapless::String` for names so the same types work on `no_std`
//! targets, and serde (feature `serde`) so a layout can be described in a
//! TOML file (feature `toml`).
//!
//! [`LayoutConfig::default`] is the complete Blackwater Mud Pie layout.
//!
//! # Example
//!
//! ```rust
//! use cake_layout::config::{LayoutConfig, RouteConfig, TransitConfig};
//! use cake_layout::event::DeviceValue;
//! use cake_layout::traits::Speed;
//!
//! // Use the built-in layout
//! let config = LayoutConfig::default();
//! assert!(config.validate().is_ok());
//!
//! // Or extend it
//! let config = LayoutConfig::default()
//!     .with_route(
//!         RouteConfig::new("Spur")
//!             .with_command("S1", DeviceValue::Position('C'))
//!             .with_command("R3", DeviceValue::Level(1)),
//!     )
//!     .with_transit(
//!         TransitConfig::new("SP", "Spur Shunt", "Spur")
//!             .with_cycles(-3)
//!             .with_speed(Speed::Slow),
//!     );
//! assert!(config.validate().is_ok());
//! ```

use alloc::format;
use alloc::vec;
use alloc::vec::Vec;

use heapless::String as HString;

use crate::error::LayoutError;
use crate::event::DeviceValue;
use crate::traits::{MoveProfile, Speed};

/// Maximum length for short config strings (device, route and transit names)
pub const MAX_SHORT_STRING: usize = 64;

/// Maximum length for longer config strings (diagnostic messages, paths)
pub const MAX_LONG_STRING: usize = 128;

/// Type alias for short config strings
pub type ShortString = HString<MAX_SHORT_STRING>;

/// Type alias for longer config strings
pub type LongString = HString<MAX_LONG_STRING>;

/// Name of the route that de-energises every track section.
pub const CLEAR_ROUTE: &str = "_";

// ============================================================================
// Helper for creating heapless strings
// ============================================================================

fn utf8_prefix(s: &str, max: usize) -> &str {
    let take = s.len().min(max);
    let valid_end = s
        .char_indices()
        .take_while(|(i, c)| i + c.len_utf8() <= take)
        .last()
        .map(|(i, c)| i + c.len_utf8())
        .unwrap_or(0);
    &s[..valid_end]
}

/// Create a ShortString from a &str, truncating if too long
pub fn short_string(s: &str) -> ShortString {
    let mut hs = ShortString::new();
    let _ = hs.push_str(utf8_prefix(s, MAX_SHORT_STRING));
    hs
}

/// Create a LongString from a &str, truncating if too long
pub fn long_string(s: &str) -> LongString {
    let mut hs = LongString::new();
    let _ = hs.push_str(utf8_prefix(s, MAX_LONG_STRING));
    hs
}

fn invalid(message: &str) -> LayoutError {
    LayoutError::InvalidConfig(long_string(message))
}

// ============================================================================
// Main Config
// ============================================================================

/// Complete layout configuration.
///
/// Supplied wholesale at startup and immutable afterwards.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct LayoutConfig {
    /// Linear motor device name
    pub motor: ShortString,
    /// Sector plate
    pub sector: SectorConfig,
    /// Track power relay names
    pub relays: Vec<ShortString>,
    /// Rotary encoder input name
    pub encoder: ShortString,
    /// Push button input name
    pub button: ShortString,
    /// Routes, in configuration order
    pub routes: Vec<RouteConfig>,
    /// Transits, in configuration order
    pub transits: Vec<TransitConfig>,
    /// Transit to activate when a chain has run to its end
    pub restart_transit: ShortString,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            motor: short_string("L1"),
            sector: SectorConfig::default(),
            relays: vec![short_string("R1"), short_string("R2"), short_string("R3")],
            encoder: short_string("QUI"),
            button: short_string("SW1"),
            routes: blackwater_routes(),
            transits: blackwater_transits(),
            restart_transit: short_string("MD"),
        }
    }
}

impl LayoutConfig {
    /// Set the motor name
    pub fn with_motor(mut self, name: &str) -> Self {
        self.motor = short_string(name);
        self
    }

    /// Set the sector plate configuration
    pub fn with_sector(mut self, sector: SectorConfig) -> Self {
        self.sector = sector;
        self
    }

    /// Replace the relay list
    pub fn with_relays(mut self, names: &[&str]) -> Self {
        self.relays = names.iter().map(|n| short_string(n)).collect();
        self
    }

    /// Add or replace a route
    pub fn with_route(mut self, route: RouteConfig) -> Self {
        match self.routes.iter_mut().find(|r| r.name == route.name) {
            Some(existing) => *existing = route,
            None => self.routes.push(route),
        }
        self
    }

    /// Add or replace a transit
    pub fn with_transit(mut self, transit: TransitConfig) -> Self {
        match self.transits.iter_mut().find(|t| t.key == transit.key) {
            Some(existing) => *existing = transit,
            None => self.transits.push(transit),
        }
        self
    }

    /// Set the restart transit
    pub fn with_restart_transit(mut self, key: &str) -> Self {
        self.restart_transit = short_string(key);
        self
    }

    /// Route by name
    pub fn route(&self, name: &str) -> Option<&RouteConfig> {
        self.routes.iter().find(|r| r.name == name)
    }

    /// Transit by key
    pub fn transit(&self, key: &str) -> Option<&TransitConfig> {
        self.transits.iter().find(|t| t.key == key)
    }

    /// All device names, motor first.
    pub fn device_names(&self) -> Vec<&str> {
        let mut names = vec![self.motor.as_str(), self.sector.name.as_str()];
        names.extend(self.relays.iter().map(|r| r.as_str()));
        names.push(self.encoder.as_str());
        names.push(self.button.as_str());
        names
    }

    /// Check the configuration is internally consistent.
    ///
    /// # Errors
    ///
    /// [`LayoutError::InvalidConfig`] naming the first problem found.
    pub fn validate(&self) -> Result<(), LayoutError> {
        let names = self.device_names();
        for (i, name) in names.iter().enumerate() {
            if name.is_empty() {
                return Err(invalid("empty device name"));
            }
            if names[..i].contains(name) {
                return Err(invalid(&format!("duplicate device name {}", name)));
            }
        }

        self.sector.validate()?;

        for (i, route) in self.routes.iter().enumerate() {
            if self.routes[..i].iter().any(|r| r.name == route.name) {
                return Err(invalid(&format!("duplicate route {}", route.name)));
            }
            for (device, value) in &route.commands {
                self.validate_command(&route.name, device, *value)?;
            }
        }

        for (i, transit) in self.transits.iter().enumerate() {
            if self.transits[..i].iter().any(|t| t.key == transit.key) {
                return Err(invalid(&format!("duplicate transit {}", transit.key)));
            }
            if self.route(&transit.route).is_none() {
                return Err(invalid(&format!(
                    "transit {} uses unknown route {}",
                    transit.key, transit.route
                )));
            }
            if let Some(next) = &transit.next {
                if self.transit(next).is_none() {
                    return Err(invalid(&format!(
                        "transit {} continues to unknown transit {}",
                        transit.key, next
                    )));
                }
            }
        }

        if self.transit(&self.restart_transit).is_none() {
            return Err(invalid(&format!(
                "unknown restart transit {}",
                self.restart_transit
            )));
        }
        Ok(())
    }

    fn validate_command(
        &self,
        route: &str,
        device: &str,
        value: DeviceValue,
    ) -> Result<(), LayoutError> {
        if self.relays.iter().any(|r| r == device) {
            return match value {
                DeviceValue::Level(0 | 1) => Ok(()),
                other => Err(invalid(&format!(
                    "route {} sets relay {} to {}",
                    route, device, other
                ))),
            };
        }
        if self.motor == device {
            return Err(invalid(&format!(
                "route {} commands motor {}, which only transits move",
                route, device
            )));
        }
        if self.sector.name == device {
            return match value {
                DeviceValue::Position(pos) if self.sector.pulse_us(pos).is_some() => Ok(()),
                other => Err(invalid(&format!(
                    "route {} sets sector {} to {}",
                    route, device, other
                ))),
            };
        }
        Err(invalid(&format!(
            "route {} names {} which is not a relay or sector",
            route, device
        )))
    }

    /// Parse and validate a TOML layout description.
    #[cfg(feature = "toml")]
    pub fn from_toml_str(text: &str) -> Result<Self, LayoutError> {
        use alloc::string::ToString;

        let config: Self = toml::from_str(text).map_err(|e| invalid(&e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a TOML layout file.
    #[cfg(feature = "toml")]
    pub fn load(path: impl AsRef<std::path::Path>) -> Result<Self, LayoutError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| invalid(&format!("{}: {}", path.display(), e)))?;
        Self::from_toml_str(&text)
    }
}

// ============================================================================
// Sector Config
// ============================================================================

/// Servo-driven sector plate configuration
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SectorConfig {
    /// Device name
    pub name: ShortString,
    /// Position label to servo pulse width in microseconds
    pub positions: Vec<(char, u16)>,
    /// Position assumed at start of day
    pub default_position: char,
}

impl Default for SectorConfig {
    fn default() -> Self {
        Self {
            name: short_string("S1"),
            positions: vec![('M', 1245), ('L', 1520), ('C', 1845)],
            default_position: 'M',
        }
    }
}

impl SectorConfig {
    /// Set the device name
    pub fn with_name(mut self, name: &str) -> Self {
        self.name = short_string(name);
        self
    }

    /// Add or replace a position
    pub fn with_position(mut self, label: char, pulse_us: u16) -> Self {
        match self.positions.iter_mut().find(|(l, _)| *l == label) {
            Some(entry) => entry.1 = pulse_us,
            None => self.positions.push((label, pulse_us)),
        }
        self
    }

    /// Set the start-of-day position
    pub fn with_default_position(mut self, label: char) -> Self {
        self.default_position = label;
        self
    }

    /// Pulse width for a position label
    pub fn pulse_us(&self, label: char) -> Option<u16> {
        self.positions
            .iter()
            .find(|(l, _)| *l == label)
            .map(|(_, us)| *us)
    }

    fn validate(&self) -> Result<(), LayoutError> {
        if self.positions.is_empty() {
            return Err(invalid("sector has no positions"));
        }
        if self.pulse_us(self.default_position).is_none() {
            return Err(invalid(&format!(
                "sector default position '{}' is not defined",
                self.default_position
            )));
        }
        if let Some((label, us)) = self
            .positions
            .iter()
            .find(|(_, us)| !(500..=2500).contains(us))
        {
            return Err(invalid(&format!(
                "sector position '{}' pulse {}us out of range",
                label, us
            )));
        }
        Ok(())
    }
}

// ============================================================================
// Route Config
// ============================================================================

/// Ordered device settings that energise one track path
///
/// Relay-clearing commands must precede relay-setting commands so two
/// paths are never energised at once.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RouteConfig {
    /// Route name
    pub name: ShortString,
    /// `(device, value)` commands, applied in order
    pub commands: Vec<(ShortString, DeviceValue)>,
}

impl RouteConfig {
    /// Create an empty route
    pub fn new(name: &str) -> Self {
        Self {
            name: short_string(name),
            commands: Vec::new(),
        }
    }

    /// Append a command
    pub fn with_command(mut self, device: &str, value: DeviceValue) -> Self {
        self.commands.push((short_string(device), value));
        self
    }
}

// ============================================================================
// Transit Config
// ============================================================================

/// One automated phase: set a route, then move the motor
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TransitConfig {
    /// Short key, e.g. `"MD"`
    pub key: ShortString,
    /// Display name
    pub name: ShortString,
    /// Route to establish first
    pub route: ShortString,
    /// Signed travel in cycles (positive = down)
    pub cycles: i32,
    /// Ramp up from rest
    #[cfg_attr(feature = "serde", serde(default))]
    pub accelerate: bool,
    /// Ramp down into the stop
    #[cfg_attr(feature = "serde", serde(default))]
    pub brake: bool,
    /// Cruise speed
    #[cfg_attr(feature = "serde", serde(default))]
    pub speed: Speed,
    /// Transit that follows this one
    #[cfg_attr(feature = "serde", serde(default))]
    pub next: Option<ShortString>,
    /// Run `next` immediately instead of waiting for the operator
    #[cfg_attr(feature = "serde", serde(default = "chain_by_default"))]
    pub chain: bool,
}

impl TransitConfig {
    /// Create a zero-length transit with default speed
    pub fn new(key: &str, name: &str, route: &str) -> Self {
        Self {
            key: short_string(key),
            name: short_string(name),
            route: short_string(route),
            cycles: 0,
            accelerate: false,
            brake: false,
            speed: Speed::default(),
            next: None,
            chain: true,
        }
    }

    /// Set the travel
    pub fn with_cycles(mut self, cycles: i32) -> Self {
        self.cycles = cycles;
        self
    }

    /// Set the ramp flags
    pub fn with_ramps(mut self, accelerate: bool, brake: bool) -> Self {
        self.accelerate = accelerate;
        self.brake = brake;
        self
    }

    /// Set the speed
    pub fn with_speed(mut self, speed: Speed) -> Self {
        self.speed = speed;
        self
    }

    /// Set the following transit
    pub fn with_next(mut self, key: &str) -> Self {
        self.next = Some(short_string(key));
        self
    }

    /// Set whether the following transit runs automatically
    pub fn with_chain(mut self, chain: bool) -> Self {
        self.chain = chain;
        self
    }

    /// Kinematic parameters for the motor move
    pub fn profile(&self) -> MoveProfile {
        MoveProfile {
            accelerate: self.accelerate,
            brake: self.brake,
            speed: self.speed,
        }
    }
}

#[cfg(feature = "serde")]
fn chain_by_default() -> bool {
    true
}

// ============================================================================
// Blackwater Mud Pie
// ============================================================================

fn route(name: &str, sector: char, relays: [(&str, u8); 3]) -> RouteConfig {
    relays.iter().fold(
        RouteConfig::new(name).with_command("S1", DeviceValue::Position(sector)),
        |r, (relay, level)| r.with_command(relay, DeviceValue::Level(*level)),
    )
}

fn blackwater_routes() -> Vec<RouteConfig> {
    vec![
        route("Main", 'M', [("R2", 0), ("R3", 0), ("R1", 1)]),
        route("MainX", 'M', [("R1", 0), ("R3", 0), ("R2", 1)]),
        route("RR", 'M', [("R1", 0), ("R2", 0), ("R3", 1)]),
        route("Coach", 'C', [("R1", 0), ("R3", 0), ("R2", 1)]),
        route("CoachX", 'C', [("R2", 0), ("R3", 0), ("R1", 1)]),
        route("Loco", 'L', [("R1", 0), ("R2", 0), ("R3", 1)]),
        route("LocoX", 'L', [("R3", 0), ("R2", 0), ("R1", 1)]),
        route(CLEAR_ROUTE, 'M', [("R1", 0), ("R2", 0), ("R3", 0)]),
    ]
}

#[allow(clippy::too_many_arguments)]
fn transit(
    key: &str,
    name: &str,
    route: &str,
    accelerate: bool,
    brake: bool,
    speed: Speed,
    cycles: i32,
    next: Option<&str>,
    chain: bool,
) -> TransitConfig {
    let t = TransitConfig::new(key, name, route)
        .with_ramps(accelerate, brake)
        .with_speed(speed)
        .with_cycles(cycles)
        .with_chain(chain);
    match next {
        Some(next) => t.with_next(next),
        None => t,
    }
}

fn blackwater_transits() -> Vec<TransitConfig> {
    use Speed::{Fast, Medium, Slow};
    vec![
        transit("MD", "Main Down", "Main", false, true, Medium, 33, Some("R1"), false),
        transit("R1", "Decouple Loco", "MainX", true, true, Slow, 10, Some("R2"), false),
        transit("R2", "Run Round", "RR", true, true, Slow, -32, Some("R3"), false),
        transit("R3", "Couple Loco", "MainX", true, true, Slow, 10, Some("MU"), false),
        transit("MU", "Main Up", "Main", true, false, Medium, -30, Some("C1"), true),
        transit("C1", "Coaches -> CS", "Coach", false, false, Fast, 9, Some("C2"), true),
        transit("C2", "Decouple Loco", "CoachX", false, false, Fast, -2, Some("L1"), true),
        transit("L1", "Loco -> LS", "Loco", false, false, Fast, 5, Some("C3"), true),
        transit("C3", "Coaches -> SP", "Coach", false, false, Medium, -10, Some("L2"), true),
        transit("L2", "Loco -> SP", "Loco", false, false, Medium, -4, Some("M0"), true),
        transit("M0", "Park", "Main", false, false, Slow, 0, None, true),
    ]
}

// ============================================================================
// Tests
// ============================================================================

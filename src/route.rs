//! Routes: ordered device settings that energise one track path.
//!
//! A route is issued command by command in its stored order and is
//! checked by reading every device back. Devices do not report "route
//! complete"; a route is established when every device reads its
//! target value.

use alloc::vec::Vec;

use crate::config::{short_string, LayoutConfig, RouteConfig, ShortString, CLEAR_ROUTE};
use crate::error::LayoutError;
use crate::event::DeviceValue;
use crate::registry::DeviceRegistry;

/// One `(device, value)` setting.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RouteCommand {
    /// Device name.
    pub device: ShortString,
    /// Target value.
    pub value: DeviceValue,
}

/// A named, ordered list of device settings.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Route {
    name: ShortString,
    commands: Vec<RouteCommand>,
}

impl Route {
    /// Creates an empty route.
    pub fn new(name: &str) -> Self {
        Self {
            name: short_string(name),
            commands: Vec::new(),
        }
    }

    /// Builds a route from its configuration.
    pub fn from_config(config: &RouteConfig) -> Self {
        Self {
            name: config.name.clone(),
            commands: config
                .commands
                .iter()
                .map(|(device, value)| RouteCommand {
                    device: device.clone(),
                    value: *value,
                })
                .collect(),
        }
    }

    /// Appends a command.
    pub fn with_command(mut self, device: &str, value: DeviceValue) -> Self {
        self.commands.push(RouteCommand {
            device: short_string(device),
            value,
        });
        self
    }

    /// Route name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Commands in issue order.
    pub fn commands(&self) -> &[RouteCommand] {
        &self.commands
    }

    /// Issues every command in order.
    ///
    /// Commands are sent even if an earlier issue of this or another
    /// route is still settling; devices retarget. Stops at the first
    /// failing command; earlier commands stay applied.
    ///
    /// # Errors
    ///
    /// [`LayoutError::RouteCommandFailure`] naming the failing device.
    pub fn set_route(&self, devices: &mut DeviceRegistry, now_ms: u64) -> Result<(), LayoutError> {
        log::info!("setting route {}", self.name);
        for cmd in &self.commands {
            if let Err(e) = devices.set_value(&cmd.device, cmd.value, now_ms) {
                log::warn!("route {}: {} <- {} failed: {}", self.name, cmd.device, cmd.value, e);
                return Err(LayoutError::RouteCommandFailure {
                    route: self.name.clone(),
                    device: cmd.device.clone(),
                });
            }
        }
        Ok(())
    }

    /// True only if every device currently reads its target value.
    ///
    /// A device that is still settling, or is not registered, makes
    /// this false.
    pub fn is_route_set(&self, devices: &DeviceRegistry) -> bool {
        self.commands
            .iter()
            .all(|cmd| matches!(devices.value(&cmd.device), Ok(Some(v)) if v == cmd.value))
    }
}

/// The layout's routes, in configuration order.
#[derive(Clone, Debug, Default)]
pub struct RouteTable {
    routes: Vec<Route>,
    current: Option<usize>,
}

impl RouteTable {
    /// Creates a table.
    pub fn new(routes: Vec<Route>) -> Self {
        Self {
            routes,
            current: None,
        }
    }

    /// Builds the table from a layout configuration.
    pub fn from_config(config: &LayoutConfig) -> Self {
        Self::new(config.routes.iter().map(Route::from_config).collect())
    }

    /// Route by name.
    pub fn get(&self, name: &str) -> Option<&Route> {
        self.index_of(name).map(|i| &self.routes[i])
    }

    /// Position of a route.
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.routes.iter().position(|r| r.name == name)
    }

    /// Route at a position.
    pub fn route_at(&self, index: usize) -> Option<&Route> {
        self.routes.get(index)
    }

    /// Every route, including the clearing route.
    pub fn iter(&self) -> impl Iterator<Item = &Route> {
        self.routes.iter()
    }

    /// Names an operator may select (the clearing route is hidden).
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.routes
            .iter()
            .map(Route::name)
            .filter(|name| *name != CLEAR_ROUTE)
    }

    /// Issues a route by name and records it as current.
    pub fn set_route_by_name(
        &mut self,
        name: &str,
        devices: &mut DeviceRegistry,
        now_ms: u64,
    ) -> Result<(), LayoutError> {
        let index = self
            .index_of(name)
            .ok_or_else(|| LayoutError::RouteNotFound(short_string(name)))?;
        self.set_route_at(index, devices, now_ms)
    }

    /// Issues the route at `index` and records it as current.
    ///
    /// The clearing route leaves no current route; so does a route that
    /// fails part way.
    pub fn set_route_at(
        &mut self,
        index: usize,
        devices: &mut DeviceRegistry,
        now_ms: u64,
    ) -> Result<(), LayoutError> {
        let route = self
            .routes
            .get(index)
            .ok_or_else(|| LayoutError::RouteNotFound(ShortString::new()))?;
        self.current = None;
        route.set_route(devices, now_ms)?;
        if route.name != CLEAR_ROUTE {
            self.current = Some(index);
        }
        Ok(())
    }

    /// Name of the last route issued, if any.
    pub fn current_route_name(&self) -> Option<&str> {
        self.current.map(|i| self.routes[i].name())
    }

    /// Number of routes.
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    /// True if there are no routes.
    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

//! Transit orchestrator: runs the layout's transits in sequence.
//!
//! The orchestrator holds the current transit and feeds it every event
//! the consumer dequeues. When a transit finishes it either runs the
//! next one at once (chaining) or activates it and calls the completion
//! callback, leaving the operator to start it.

use alloc::boxed::Box;
use alloc::vec::Vec;

use crate::config::{short_string, LayoutConfig, ShortString};
use crate::error::LayoutError;
use crate::event::EventReport;
use crate::registry::DeviceRegistry;
use crate::route::RouteTable;
use crate::transit::{Transit, TransitOutcome};

/// Called when a non-chaining transit completes.
pub type CompletionCallback = Box<dyn FnMut()>;

/// Sequences transits on completion events.
///
/// # Example
///
/// ```rust
/// use cake_layout::config::LayoutConfig;
/// use cake_layout::orchestrator::TransitOrchestrator;
///
/// let mut orchestrator = TransitOrchestrator::from_config(&LayoutConfig::default());
/// assert_eq!(orchestrator.set_transit(Some("MD")).map(|t| t.name()), Some("Main Down"));
/// assert_eq!(orchestrator.next_transit_name(), Some("R1"));
///
/// orchestrator.set_transit(Some("Nowhere"));
/// assert!(orchestrator.current_transit().is_none());
/// ```
pub struct TransitOrchestrator {
    transits: Vec<Transit>,
    current: Option<usize>,
    next: Option<ShortString>,
    on_complete: Option<CompletionCallback>,
}

impl TransitOrchestrator {
    /// Creates an orchestrator with no current transit.
    pub fn new(transits: Vec<Transit>) -> Self {
        Self {
            transits,
            current: None,
            next: None,
            on_complete: None,
        }
    }

    /// Builds the transit table from a layout configuration.
    pub fn from_config(config: &LayoutConfig) -> Self {
        Self::new(config.transits.iter().map(Transit::from_config).collect())
    }

    // ========================================================================
    // Selection
    // ========================================================================

    /// Makes `key` the current transit and returns it.
    ///
    /// `None` or an unknown key leaves no current transit and no next.
    pub fn set_transit(&mut self, key: Option<&str>) -> Option<&Transit> {
        let index = key.and_then(|key| self.position(key));
        match (key, index) {
            (Some(key), None) => log::warn!("unknown transit {}", key),
            (None, _) => log::debug!("no current transit"),
            _ => {}
        }
        self.current = index;
        self.next = index.and_then(|i| self.transits[i].next().map(short_string));
        let transit = &self.transits[index?];
        log::info!("transit {} ({}) is current", transit.key(), transit.name());
        Some(transit)
    }

    /// Activates `key` as the transit to run next, typically once the
    /// sequence has ended.
    ///
    /// # Errors
    ///
    /// [`LayoutError::TransitNotFound`] if no transit has that key.
    pub fn restart(&mut self, key: &str) -> Result<(), LayoutError> {
        let index = self
            .position(key)
            .ok_or_else(|| LayoutError::TransitNotFound(short_string(key)))?;
        self.transits[index].reset();
        self.set_transit(Some(key));
        Ok(())
    }

    fn position(&self, key: &str) -> Option<usize> {
        self.transits.iter().position(|t| t.key() == key)
    }

    /// The current transit.
    pub fn current_transit(&self) -> Option<&Transit> {
        self.current.map(|i| &self.transits[i])
    }

    /// Key of the transit that follows the current one.
    pub fn next_transit_name(&self) -> Option<&str> {
        self.next.as_deref()
    }

    /// Transit by key.
    pub fn transit(&self, key: &str) -> Option<&Transit> {
        self.position(key).map(|i| &self.transits[i])
    }

    /// Every transit key, in configuration order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.transits.iter().map(Transit::key)
    }

    // ========================================================================
    // Completion callback
    // ========================================================================

    /// Sets the callback for non-chaining completions.
    pub fn set_callback(&mut self, callback: impl FnMut() + 'static) {
        self.on_complete = Some(Box::new(callback));
    }

    /// Removes the callback.
    pub fn clear_callback(&mut self) {
        self.on_complete = None;
    }

    // ========================================================================
    // Running
    // ========================================================================

    /// Runs the current transit.
    ///
    /// Returns `false` if there is no current transit.
    pub fn run_current(
        &mut self,
        routes: &mut RouteTable,
        devices: &mut DeviceRegistry,
        now_ms: u64,
    ) -> Result<bool, LayoutError> {
        let Some(index) = self.current else {
            return Ok(false);
        };
        self.transits[index].run(routes, devices, now_ms)?;
        Ok(true)
    }

    /// Feeds one event to the current transit and reacts to its outcome.
    ///
    /// With no current transit the event is absorbed.
    pub fn process_event(
        &mut self,
        report: &EventReport,
        routes: &mut RouteTable,
        devices: &mut DeviceRegistry,
        now_ms: u64,
    ) -> Result<TransitOutcome, LayoutError> {
        let Some(index) = self.current else {
            log::debug!("no transit; absorbed {:?} from {:?}", report.kind, report.source);
            return Ok(TransitOutcome::Idle);
        };

        let outcome = self.transits[index].handle_event(report, routes, devices, now_ms)?;
        match outcome {
            TransitOutcome::Chaining => {
                let next = self.next.clone();
                if self.set_transit(next.as_deref()).is_some() {
                    self.run_current(routes, devices, now_ms)?;
                } else {
                    log::info!("transit sequence ended");
                }
            }
            TransitOutcome::Done => {
                let next = self.next.clone();
                self.set_transit(next.as_deref());
                match self.on_complete.as_mut() {
                    Some(callback) => callback(),
                    None => log::debug!("transit done; no completion callback"),
                }
            }
            _ => {}
        }
        Ok(outcome)
    }
}

impl core::fmt::Debug for TransitOrchestrator {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("TransitOrchestrator")
            .field("transits", &self.transits.len())
            .field("current", &self.current_transit().map(Transit::key))
            .field("next", &self.next)
            .field("callback", &self.on_complete.is_some())
            .finish()
    }
}

//! Simulated clock and per-component contexts.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use crate::config::SchedulingConfig;
use crate::EPSILON;

/// Shared handle to the simulated clock.
///
/// All clones observe the same time. The clock is advanced only by the driver of the simulation.
#[derive(Clone, Debug, Default)]
pub struct SimulationClock {
    time: Rc<Cell<f64>>,
}

impl SimulationClock {
    /// Creates a clock set to zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the current simulated time.
    pub fn time(&self) -> f64 {
        self.time.get()
    }

    /// Moves the clock to the specified time.
    ///
    /// Panics if the time goes backwards.
    pub fn set_time(&self, time: f64) {
        assert!(
            time >= self.time.get() - EPSILON,
            "simulated time can't go backwards: {} -> {}",
            self.time.get(),
            time
        );
        self.time.set(time);
    }
}

/// A facade for accessing the simulated time and run-wide constants from scheduling components.
///
/// The name of the context is used as a log target.
#[derive(Clone, Debug)]
pub struct SchedulingContext {
    name: String,
    clock: SimulationClock,
    min_time_between_events: f64,
}

impl SchedulingContext {
    /// Returns the name of component associated with this context.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the current simulated time.
    pub fn time(&self) -> f64 {
        self.clock.time()
    }

    /// Returns the minimum allowed distance between the current time and a predicted event.
    pub fn min_time_between_events(&self) -> f64 {
        self.min_time_between_events
    }

    /// Returns the clock shared by this context.
    pub fn clock(&self) -> &SimulationClock {
        &self.clock
    }
}

/// Owns the clock of a single simulation run and creates contexts for its components.
pub struct Environment {
    clock: SimulationClock,
    min_time_between_events: f64,
    names: RefCell<Vec<String>>,
}

impl Environment {
    /// Creates an environment with the clock set to zero.
    pub fn new(min_time_between_events: f64) -> Self {
        Self {
            clock: SimulationClock::new(),
            min_time_between_events,
            names: RefCell::new(Vec::new()),
        }
    }

    /// Creates an environment using the constants from the config.
    pub fn from_config(config: &SchedulingConfig) -> Self {
        Self::new(config.min_time_between_events)
    }

    /// Creates a new context with specified name.
    pub fn create_context<S>(&self, name: S) -> SchedulingContext
    where
        S: AsRef<str>,
    {
        self.names.borrow_mut().push(name.as_ref().to_owned());
        SchedulingContext {
            name: name.as_ref().to_owned(),
            clock: self.clock.clone(),
            min_time_between_events: self.min_time_between_events,
        }
    }

    /// Returns the names of all created contexts in creation order.
    pub fn context_names(&self) -> Vec<String> {
        self.names.borrow().clone()
    }

    /// Returns the current simulated time.
    pub fn time(&self) -> f64 {
        self.clock.time()
    }

    /// Advances the simulated time.
    pub fn set_time(&self, time: f64) {
        self.clock.set_time(time);
    }

    /// Returns the shared clock.
    pub fn clock(&self) -> &SimulationClock {
        &self.clock
    }

    /// Returns the minimum distance between the current time and a predicted event.
    pub fn min_time_between_events(&self) -> f64 {
        self.min_time_between_events
    }
}

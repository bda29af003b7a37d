//! In-process entity state bus.
//!
//! Apps publish the latest state of named entities and fire change events;
//! other apps (and tests) read states back or subscribe to the event stream.

#![warn(missing_docs, clippy::pedantic)]

mod bus;
mod state;

pub use bus::{StateBus, StateEvent};
pub use state::{EntityState, StateValue};

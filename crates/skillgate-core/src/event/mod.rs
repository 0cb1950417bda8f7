//! Event bus for skill and lifecycle events.
//!
//! Provides an `EventBus` that distributes `BusEvent` messages to all
//! subscribers via a `tokio::sync::broadcast` channel.

pub mod bus;

pub use bus::EventBus;

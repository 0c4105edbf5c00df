//! Testing utilities
//!
//! A recording broker double so the agent core can be exercised without a
//! running MQTT broker.

pub mod mocks;

pub use mocks::*;

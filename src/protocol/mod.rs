//! Wire protocol for agent messaging
//!
//! Topic naming, payload shapes and the argument validation applied before
//! anything reaches the broker.

pub mod messages;
pub mod topics;
pub mod validation;

pub use messages::*;
pub use topics::*;
pub use validation::*;

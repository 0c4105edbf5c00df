//! Agent client core
//!
//! The handler registry, the connection state machine, the dispatcher that
//! serves the broker's callbacks, the publisher for outgoing envelopes and the
//! [`AgentClient`] facade tying them together.

pub mod client;
pub mod dispatcher;
pub mod publisher;
pub mod registry;
pub mod state;

pub use client::AgentClient;
pub use dispatcher::{Dispatcher, Route};
pub use publisher::Publisher;
pub use registry::{
    ActionHandler, AnyActionHandler, HandlerError, HandlerRegistry, HandlerResult, MethodHandler,
    Resolved,
};
pub use state::{ConnectionEvent, ConnectionState, ConnectionTracker};

//! The IRC core of the chat runtime: line parser, command dispatcher,
//! receive pump, send queue, and rate-limit scheduler, plus the transport
//! collaborator and the event interface subscribers implement.
//! [`crate::core::ChatCore`] is the facade that wires these together;
//! nothing in this module touches auth or the channel registry directly
//! except through their trait interfaces.

pub mod dispatcher;
pub mod events;
pub mod parser;
pub mod pump;
pub mod queue;
pub mod scheduler;
pub mod transport;

pub use dispatcher::{dispatch, DispatchOutcome};
pub use events::CoreEventHandler;
pub use parser::parse_line;
pub use queue::SendQueue;
pub use scheduler::Scheduler;
pub use transport::{Transport, WebSocketTransport};

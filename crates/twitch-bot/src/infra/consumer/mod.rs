pub mod consumer;
pub mod router;

pub use consumer::Consumer;
pub use router::command_handler;
pub use router::message_handler;
pub use router::{BaseRouter, Route};

pub mod handlers;
pub mod middleware;
pub mod router;
pub mod traits;

pub use handlers::message_handler;
pub use handlers::command_handler;
pub use router::{BaseRouter, Route};

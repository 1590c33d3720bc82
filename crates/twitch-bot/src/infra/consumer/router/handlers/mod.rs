pub mod command_handler;
pub mod message_handler;

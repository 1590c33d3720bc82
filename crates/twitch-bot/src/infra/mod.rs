pub mod config;
pub mod consumer;
pub mod fetchers;
pub mod logging;
pub mod signal;

pub use config::Config;
pub use fetchers::TwitchFetcher;
pub use logging::LogGuard;
pub use signal::UnixSignalHandler;

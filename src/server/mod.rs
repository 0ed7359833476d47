//! Server module for kryptos
//!
//! Contains server configuration, start-up wiring, and the run loop.
//!
//! # Module Structure
//!
//! - `config`: Configuration structures for all server components
//! - `loader`: Configuration loading from files and environment
//! - `init`: Engine assembly and the HTTP run loop

pub mod config;
mod init;
mod loader;

// Re-export public API
pub use config::AppConfig;
pub use init::run;
pub use loader::load_config;

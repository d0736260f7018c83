//! Configuration management
//!
//! Node settings loaded from a TOML file, overridden by environment
//! variables and finally by command-line flags. Passed explicitly to the
//! node; there is no process-wide instance.

pub mod settings;

pub use settings::{Config, DEFAULT_LISTEN_ADDR, PROTOCOL_VERSION};

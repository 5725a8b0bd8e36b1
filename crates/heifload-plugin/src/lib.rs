//! Heifload Plugin - host procedure glue
//!
//! Installs the `file-heif-load` procedure with the host, validates incoming
//! calls and maps pipeline outcomes onto the host's status codes.
//!
//! # Module Structure
//!
//! - `plugin` - Start-up: logging, configuration and codec wiring
//! - `procedure` - Procedure descriptor, registration, argument parsing
//! - `status` - Status codes and return values
//! - `runner` - Call entry point and user-visible error reporting
//! - `logging` - Subscriber setup for the `tracing` output

#![warn(missing_docs)]

pub mod logging;
pub mod plugin;
pub mod procedure;
pub mod runner;
pub mod status;

pub use plugin::{load_config, Plugin, StartupOptions};
pub use procedure::{query, LoadRequest, Param, Registry, LOAD_PROC};
pub use runner::{run, Environment, HostImage, MessageSink, RunOutput};
pub use status::{PdbStatus, ReturnValues};

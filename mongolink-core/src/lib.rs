//! # mongolink-core
//!
//! Builds MongoDB connection URIs from a small configuration enum and wraps
//! the official driver with lifecycle observers.
//!
//! This crate provides:
//! - URI construction for remote clusters, local hosts and raw strings
//! - A default option set with all-or-nothing overrides
//! - TOML configuration with environment variable expansion
//! - Lifecycle events (`connecting`, `connected`, `open`, `disconnected`, `error`)
//! - An opt-in process termination hook
//!
//! ## Example
//!
//! ```rust,ignore
//! use mongolink_core::{ConnectionTarget, Connector, TerminationHook, build_uri};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let target = ConnectionTarget::local("localhost", None, "mydatabase");
//!
//!     let connection = Connector::new(build_uri(&target))
//!         .on_error(|err| eprintln!("fatal: {err}"))
//!         .connect()
//!         .await?;
//!
//!     let _guard = TerminationHook::new(connection.clone()).install()?;
//!
//!     if let Some(err) = connection.fatal_error().await {
//!         return Err(err.to_string().into());
//!     }
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod config;
pub mod env;
pub mod error;
pub mod lifecycle;
pub mod logging;
pub mod options;
pub mod shutdown;
pub mod uri;

pub use client::{Connection, Connector, DEFAULT_DATABASE, connect, connect_target};
pub use config::{ConnectConfig, OptionsSection};
pub use env::{EnvExpander, EnvSource, MapEnvSource, StdEnvSource};
pub use error::{ConnectError, ConnectResult};
pub use lifecycle::{
    ConnectionState, FnObserver, LifecycleEvent, LifecycleMonitor, LifecycleObserver,
    LoggingObserver,
};
pub use options::{ConnectOptions, IpFamily};
pub use shutdown::{TerminationGuard, TerminationHook};
pub use uri::{ConnectionTarget, DEFAULT_PORT, build_uri, redact_uri};

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::client::{Connection, Connector, connect, connect_target};
    pub use crate::config::ConnectConfig;
    pub use crate::error::{ConnectError, ConnectResult};
    pub use crate::lifecycle::{ConnectionState, LifecycleEvent, LifecycleObserver};
    pub use crate::options::{ConnectOptions, IpFamily};
    pub use crate::shutdown::TerminationHook;
    pub use crate::uri::{ConnectionTarget, build_uri};
}

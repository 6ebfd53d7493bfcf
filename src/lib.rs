//! # Mongolink
//!
//! Turn a database description into a MongoDB connection string, open the
//! connection and observe its lifecycle.
//!
//! Mongolink provides:
//! - Connection URIs for remote SRV clusters, local hosts or raw strings
//! - Default connection options that caller overrides replace wholesale
//! - Lifecycle observers for `connected`, `open`, `disconnected` and `error`
//! - An opt-in hook that closes the connection when the process is interrupted
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use mongolink::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), mongolink::ConnectError> {
//!     let target = ConnectionTarget::remote("user", "p@ss/word", "cluster0.example.net", "app");
//!     let connection = connect_target(&target, None).await?;
//!
//!     let _guard = TerminationHook::new(connection.clone()).install()?;
//!     let orders = connection.prepare_collection("orders").await?;
//!
//!     Ok(())
//! }
//! ```

#![cfg_attr(docsrs, feature(doc_cfg))]
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

/// URI construction.
pub mod uri {
    pub use mongolink_core::uri::*;
}

/// Connection options.
pub mod options {
    pub use mongolink_core::options::*;
}

/// Configuration files and environment expansion.
pub mod config {
    pub use mongolink_core::config::*;
    pub use mongolink_core::env::*;
}

/// Lifecycle events and observers.
pub mod lifecycle {
    pub use mongolink_core::lifecycle::*;
}

/// Logging setup.
pub mod logging {
    pub use mongolink_core::logging::*;
}

/// Prelude module for convenient imports.
pub mod prelude {
    pub use mongolink_core::prelude::*;
}

// Re-export key types at the crate root
pub use mongolink_core::{
    ConnectConfig, ConnectError, ConnectOptions, ConnectResult, Connection, ConnectionState,
    ConnectionTarget, Connector, IpFamily, LifecycleEvent, LifecycleObserver, TerminationGuard,
    TerminationHook, build_uri, connect, connect_target,
};

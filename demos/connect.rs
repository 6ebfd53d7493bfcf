//! Connects using a configuration file and waits until interrupted.
//!
//! ```bash
//! MONGOLINK_LOG_FORMAT=pretty cargo run --example connect --features tracing-subscriber -- mongolink.toml
//! ```
//!
//! Without an argument it connects to `mongodb://localhost:27017/mydatabase`.

use mongolink::prelude::*;

#[tokio::main]
async fn main() -> Result<(), ConnectError> {
    mongolink::logging::init();

    let (target, options) = match std::env::args().nth(1) {
        Some(path) => {
            let config = ConnectConfig::load(path)?;
            let options = config.options.clone().map(ConnectOptions::from);
            (config.database, options)
        }
        None => (ConnectionTarget::local("localhost", None, "mydatabase"), None),
    };

    let mut connector = Connector::from_target(&target);
    if let Some(options) = options {
        connector = connector.options(options);
    }
    let connection = connector.connect().await?;

    let _guard = TerminationHook::new(connection.clone()).install()?;

    if let Some(err) = connection.fatal_error().await {
        tracing::error!(error = %err, "Connection lost");
        std::process::exit(1);
    }
    Ok(())
}

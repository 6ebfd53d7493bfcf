//! Opening connections and the connection handle.

use std::fmt;
use std::sync::Arc;

use bson::{Document, doc};
use mongodb::error::ErrorKind;
use mongodb::options::ClientOptions;
use mongodb::{Client, Collection, Database, IndexModel};
use tracing::{debug, info};

use crate::error::{ConnectError, ConnectResult};
use crate::lifecycle::{
    ConnectionState, FnObserver, LifecycleEvent, LifecycleMonitor, LifecycleObserver,
    LoggingObserver,
};
use crate::options::ConnectOptions;
use crate::uri::{ConnectionTarget, build_uri, redact_uri};

/// Database used when the URI does not name one.
pub const DEFAULT_DATABASE: &str = "test";

/// Server error code for "collection already exists".
const NAMESPACE_EXISTS: i32 = 48;

/// Open a connection to `uri` and wait until the server answers.
///
/// `None` uses [`ConnectOptions::defaults`]; any supplied options replace
/// the defaults entirely.
pub async fn connect(uri: impl Into<String>, options: Option<ConnectOptions>) -> ConnectResult<Connection> {
    let mut connector = Connector::new(uri);
    if let Some(options) = options {
        connector = connector.options(options);
    }
    connector.connect().await
}

/// Build the URI for `target` and [`connect`] to it.
pub async fn connect_target(
    target: &ConnectionTarget,
    options: Option<ConnectOptions>,
) -> ConnectResult<Connection> {
    connect(build_uri(target), options).await
}

/// Builder for a [`Connection`].
///
/// Every connector logs lifecycle events through [`LoggingObserver`];
/// further observers run after it in registration order.
pub struct Connector {
    uri: String,
    options: Option<ConnectOptions>,
    observers: Vec<Arc<dyn LifecycleObserver>>,
}

impl fmt::Debug for Connector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connector")
            .field("uri", &redact_uri(&self.uri))
            .field("options", &self.options)
            .field("observers", &self.observers.len())
            .finish()
    }
}

impl Connector {
    /// Connector for a URI.
    pub fn new(uri: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            options: None,
            observers: vec![Arc::new(LoggingObserver)],
        }
    }

    /// Connector for a target.
    pub fn from_target(target: &ConnectionTarget) -> Self {
        Self::new(build_uri(target))
    }

    /// Use these options instead of the defaults.
    pub fn options(mut self, options: ConnectOptions) -> Self {
        self.options = Some(options);
        self
    }

    /// Register an observer.
    pub fn observer(mut self, observer: Arc<dyn LifecycleObserver>) -> Self {
        self.observers.push(observer);
        self
    }

    /// Register a closure for every event.
    pub fn on_event<F>(self, f: F) -> Self
    where
        F: Fn(&LifecycleEvent) + Send + Sync + 'static,
    {
        self.observer(Arc::new(FnObserver::new(move |_: &str, event: &LifecycleEvent| f(event))))
    }

    /// Register a closure for fatal errors only.
    pub fn on_error<F>(self, f: F) -> Self
    where
        F: Fn(&ConnectError) + Send + Sync + 'static,
    {
        self.on_event(move |event| {
            if let LifecycleEvent::Error(err) = event {
                f(err);
            }
        })
    }

    /// Create the client with observers attached, without waiting for a
    /// server.
    pub async fn create(self) -> ConnectResult<Connection> {
        let options = ConnectOptions::resolve(self.options);
        let monitor = Arc::new(LifecycleMonitor::new(redact_uri(&self.uri), self.observers));

        let mut client_options = match ClientOptions::parse(&self.uri).await {
            Ok(parsed) => parsed,
            Err(e) => {
                let message = format!("failed to parse URI: {}", e);
                monitor.fail(ConnectError::config(message.clone()));
                return Err(ConnectError::config(message));
            }
        };

        options.apply_to(&mut client_options);
        client_options.sdam_event_handler = Some(monitor.clone());

        let database_name = client_options
            .default_database
            .clone()
            .unwrap_or_else(|| DEFAULT_DATABASE.to_string());

        monitor.starting();
        let client = match Client::with_options(client_options) {
            Ok(client) => client,
            Err(e) => {
                monitor.fail(ConnectError::Driver(e.clone()));
                return Err(ConnectError::Driver(e));
            }
        };
        let database = client.database(&database_name);

        debug!(
            uri = %monitor.uri(),
            database = %database_name,
            "MongoDB client created"
        );

        Ok(Connection {
            inner: Arc::new(Inner {
                client,
                database,
                options,
                monitor,
            }),
        })
    }

    /// Create the client and wait until the server answers a ping.
    ///
    /// Resolves once the driver reports success. Failure is returned as an
    /// error and also reported to observers; it is not retried.
    pub async fn connect(self) -> ConnectResult<Connection> {
        let connection = self.create().await?;
        connection.establish().await?;
        Ok(connection)
    }
}

struct Inner {
    client: Client,
    database: Database,
    options: ConnectOptions,
    monitor: Arc<LifecycleMonitor>,
}

/// Handle to an open connection.
///
/// Clones share the same driver client and lifecycle state.
#[derive(Clone)]
pub struct Connection {
    inner: Arc<Inner>,
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("uri", &self.uri())
            .field("database", &self.inner.database.name())
            .field("state", &self.state())
            .finish()
    }
}

impl Connection {
    async fn establish(&self) -> ConnectResult<()> {
        let ping = self
            .inner
            .client
            .database("admin")
            .run_command(doc! { "ping": 1 }, None)
            .await;

        match ping {
            Ok(_) => {
                self.inner.monitor.opened();
                Ok(())
            }
            Err(e) => {
                self.inner.monitor.fail(ConnectError::Driver(e.clone()));
                Err(ConnectError::Driver(e))
            }
        }
    }

    /// The connection URI with the password masked.
    pub fn uri(&self) -> &str {
        self.inner.monitor.uri()
    }

    /// Effective options.
    pub fn options(&self) -> &ConnectOptions {
        &self.inner.options
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ConnectionState {
        self.inner.monitor.state()
    }

    /// The underlying driver client.
    pub fn client(&self) -> &Client {
        &self.inner.client
    }

    /// The default database.
    pub fn database(&self) -> &Database {
        &self.inner.database
    }

    /// A typed collection in the default database.
    pub fn collection<T>(&self, name: &str) -> Collection<T>
    where
        T: Send + Sync,
    {
        self.inner.database.collection(name)
    }

    /// A collection in the default database, created first when
    /// `auto_create` is enabled.
    pub async fn prepare_collection(&self, name: &str) -> ConnectResult<Collection<Document>> {
        if self.inner.options.creates_collections() {
            let existing = self
                .inner
                .database
                .list_collection_names(doc! { "name": name })
                .await?;

            if existing.is_empty() {
                debug!(collection = %name, "Creating collection");
                match self.inner.database.create_collection(name, None).await {
                    Ok(()) => {}
                    Err(e) if is_namespace_exists(&e) => {}
                    Err(e) => return Err(e.into()),
                }
            }
        }

        Ok(self.inner.database.collection(name))
    }

    /// Build indexes on a collection unless `auto_index` is disabled.
    ///
    /// Returns the names of the indexes built.
    pub async fn ensure_indexes(
        &self,
        collection: &str,
        indexes: Vec<IndexModel>,
    ) -> ConnectResult<Vec<String>> {
        if !self.inner.options.builds_indexes() {
            debug!(collection = %collection, "auto_index disabled, skipping index build");
            return Ok(Vec::new());
        }
        if indexes.is_empty() {
            return Ok(Vec::new());
        }

        let result = self
            .inner
            .database
            .collection::<Document>(collection)
            .create_indexes(indexes, None)
            .await?;

        Ok(result.index_names)
    }

    /// Check if the server answers a ping.
    pub async fn is_healthy(&self) -> bool {
        self.inner
            .database
            .run_command(doc! { "ping": 1 }, None)
            .await
            .is_ok()
    }

    /// Wait for the first fatal error on this connection.
    ///
    /// Resolves immediately if one already happened.
    pub async fn fatal_error(&self) -> Option<Arc<ConnectError>> {
        self.inner.monitor.fatal_error().await
    }

    /// Close the connection, waiting for sessions and cursors to be
    /// released.
    pub async fn close(&self) {
        self.inner.client.clone().shutdown().await;
        self.inner.monitor.closed();
        info!(uri = %self.uri(), "MongoDB connection closed");
    }

    /// Close the connection without waiting for in-flight operations.
    pub async fn close_immediately(&self) {
        self.inner.client.clone().shutdown_immediate().await;
        self.inner.monitor.closed();
        info!(uri = %self.uri(), "MongoDB connection force-closed");
    }
}

fn is_namespace_exists(err: &mongodb::error::Error) -> bool {
    matches!(err.kind.as_ref(), ErrorKind::Command(command) if command.code == NAMESPACE_EXISTS)
}

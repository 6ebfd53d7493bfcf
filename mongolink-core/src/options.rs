//! Connection options.
//!
//! Options are all-or-nothing: when a caller supplies a [`ConnectOptions`]
//! value it replaces [`ConnectOptions::defaults`] entirely. Fields that the
//! caller leaves unset stay unset, even if the default set would have given
//! them a value.

use std::time::Duration;

use mongodb::options::ClientOptions;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// IP address family for resolving hosts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum IpFamily {
    /// IPv4.
    #[default]
    V4,
    /// IPv6.
    V6,
}

impl TryFrom<u8> for IpFamily {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            4 => Ok(Self::V4),
            6 => Ok(Self::V6),
            other => Err(format!("unsupported IP family {}, expected 4 or 6", other)),
        }
    }
}

impl From<IpFamily> for u8 {
    fn from(family: IpFamily) -> Self {
        match family {
            IpFamily::V4 => 4,
            IpFamily::V6 => 6,
        }
    }
}

/// Options handed to the driver when a connection is created.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectOptions {
    /// Create collections before first use.
    pub auto_create: Option<bool>,
    /// Build indexes when collections are prepared.
    pub auto_index: Option<bool>,
    /// Timeout for establishing a socket.
    pub connect_timeout: Option<Duration>,
    /// Inactivity timeout for an open socket.
    pub socket_timeout: Option<Duration>,
    /// IP family used for host resolution.
    pub family: Option<IpFamily>,
    /// Timeout for selecting a server.
    pub server_selection_timeout: Option<Duration>,
    /// Application name reported to the server.
    pub app_name: Option<String>,
    /// Maximum connection pool size.
    pub max_pool_size: Option<u32>,
}

impl ConnectOptions {
    /// Empty options with every field unset.
    pub fn new() -> Self {
        Self::default()
    }

    /// The default option set used when the caller supplies none.
    pub fn defaults() -> Self {
        Self {
            auto_create: Some(true),
            auto_index: Some(true),
            connect_timeout: Some(Duration::from_secs(10)),
            socket_timeout: Some(Duration::from_secs(45)),
            family: Some(IpFamily::V4),
            server_selection_timeout: None,
            app_name: None,
            max_pool_size: None,
        }
    }

    /// Pick the effective options: the supplied set if any, otherwise the
    /// defaults. The two are never merged.
    pub fn resolve(supplied: Option<ConnectOptions>) -> Self {
        supplied.unwrap_or_else(Self::defaults)
    }

    /// Enable or disable automatic collection creation.
    pub fn auto_create(mut self, enabled: bool) -> Self {
        self.auto_create = Some(enabled);
        self
    }

    /// Enable or disable automatic index builds.
    pub fn auto_index(mut self, enabled: bool) -> Self {
        self.auto_index = Some(enabled);
        self
    }

    /// Set the connection timeout.
    pub fn connect_timeout(mut self, duration: Duration) -> Self {
        self.connect_timeout = Some(duration);
        self
    }

    /// Set the socket timeout.
    pub fn socket_timeout(mut self, duration: Duration) -> Self {
        self.socket_timeout = Some(duration);
        self
    }

    /// Set the IP family.
    pub fn family(mut self, family: IpFamily) -> Self {
        self.family = Some(family);
        self
    }

    /// Set the server selection timeout.
    pub fn server_selection_timeout(mut self, duration: Duration) -> Self {
        self.server_selection_timeout = Some(duration);
        self
    }

    /// Set the application name.
    pub fn app_name(mut self, name: impl Into<String>) -> Self {
        self.app_name = Some(name.into());
        self
    }

    /// Set the maximum pool size.
    pub fn max_pool_size(mut self, size: u32) -> Self {
        self.max_pool_size = Some(size);
        self
    }

    /// Whether collections should be created on preparation.
    pub fn creates_collections(&self) -> bool {
        self.auto_create.unwrap_or(false)
    }

    /// Whether indexes should be built. Unset counts as enabled.
    pub fn builds_indexes(&self) -> bool {
        self.auto_index.unwrap_or(true)
    }

    /// Copy the options the driver understands onto its client options.
    pub fn apply_to(&self, options: &mut ClientOptions) {
        if let Some(connect_timeout) = self.connect_timeout {
            options.connect_timeout = Some(connect_timeout);
        }

        if let Some(selection_timeout) = self.server_selection_timeout {
            options.server_selection_timeout = Some(selection_timeout);
        }

        if let Some(ref app_name) = self.app_name {
            options.app_name = Some(app_name.clone());
        }

        if let Some(max_pool) = self.max_pool_size {
            options.max_pool_size = Some(max_pool);
        }

        // mongodb 2.x exposes neither a socket timeout nor an address family
        if self.socket_timeout.is_some() || self.family.is_some() {
            debug!(
                socket_timeout = ?self.socket_timeout,
                family = ?self.family,
                "Options not enforced by the driver, passing through"
            );
        }
    }
}

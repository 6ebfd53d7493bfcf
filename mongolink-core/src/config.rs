//! File-based connection configuration.
//!
//! ```toml
//! # Any of the three target shapes works here:
//! # database = "mongodb://localhost:27017/app"
//! [database]
//! username = "${DB_USER}"
//! password = "${DB_PASSWORD}"
//! cluster = "cluster0.example.mongodb.net"
//! dbname = "app"
//!
//! # A literal `$` needs no escaping; write `$${` for a literal `${`.
//! # Optional. When present it replaces the default options entirely.
//! [options]
//! connect_timeout_ms = 5000
//! family = 4
//! ```

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::env::{EnvExpander, EnvSource};
use crate::error::ConnectResult;
use crate::options::{ConnectOptions, IpFamily};
use crate::uri::{ConnectionTarget, build_uri};

/// Connection configuration as written in a TOML file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectConfig {
    /// Where to connect.
    pub database: ConnectionTarget,
    /// Option overrides.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<OptionsSection>,
}

/// The `[options]` table. Durations are in milliseconds.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OptionsSection {
    /// Create collections before first use.
    #[serde(default)]
    pub auto_create: Option<bool>,
    /// Build indexes when collections are prepared.
    #[serde(default)]
    pub auto_index: Option<bool>,
    /// Connection timeout in milliseconds.
    #[serde(default)]
    pub connect_timeout_ms: Option<u64>,
    /// Socket inactivity timeout in milliseconds.
    #[serde(default)]
    pub socket_timeout_ms: Option<u64>,
    /// IP family, `4` or `6`.
    #[serde(default)]
    pub family: Option<IpFamily>,
    /// Server selection timeout in milliseconds.
    #[serde(default)]
    pub server_selection_timeout_ms: Option<u64>,
    /// Application name reported to the server.
    #[serde(default)]
    pub app_name: Option<String>,
    /// Maximum connection pool size.
    #[serde(default)]
    pub max_pool_size: Option<u32>,
}

impl From<OptionsSection> for ConnectOptions {
    fn from(section: OptionsSection) -> Self {
        ConnectOptions {
            auto_create: section.auto_create,
            auto_index: section.auto_index,
            connect_timeout: section.connect_timeout_ms.map(Duration::from_millis),
            socket_timeout: section.socket_timeout_ms.map(Duration::from_millis),
            family: section.family,
            server_selection_timeout: section
                .server_selection_timeout_ms
                .map(Duration::from_millis),
            app_name: section.app_name,
            max_pool_size: section.max_pool_size,
        }
    }
}

impl ConnectConfig {
    /// Parse a configuration from TOML text without expanding variables.
    pub fn from_toml_str(content: &str) -> ConnectResult<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Load a configuration file and expand environment variables.
    pub fn load(path: impl AsRef<Path>) -> ConnectResult<Self> {
        let path = path.as_ref();
        debug!(path = %path.display(), "Loading connection config");

        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)?.expand_with(&EnvExpander::new())
    }

    /// Expand variable references in every string field of the target and
    /// in the application name.
    pub fn expand_with<S: EnvSource>(self, expander: &EnvExpander<S>) -> ConnectResult<Self> {
        let database = match self.database {
            ConnectionTarget::Raw(uri) => ConnectionTarget::Raw(expander.expand(&uri)?),
            ConnectionTarget::Remote {
                username,
                password,
                cluster,
                dbname,
            } => ConnectionTarget::Remote {
                username: expander.expand(&username)?,
                password: expander.expand(&password)?,
                cluster: expander.expand(&cluster)?,
                dbname: expander.expand(&dbname)?,
            },
            ConnectionTarget::Local {
                hostname,
                port,
                dbname,
            } => ConnectionTarget::Local {
                hostname: expander.expand(&hostname)?,
                port,
                dbname: expander.expand(&dbname)?,
            },
        };

        let options = match self.options {
            Some(mut section) => {
                if let Some(name) = section.app_name.take() {
                    section.app_name = Some(expander.expand(&name)?);
                }
                Some(section)
            }
            None => None,
        };

        Ok(Self { database, options })
    }

    /// Connection URI for the configured target.
    pub fn uri(&self) -> String {
        build_uri(&self.database)
    }

    /// Options to connect with: the `[options]` table if present, the
    /// defaults otherwise.
    pub fn resolved_options(&self) -> ConnectOptions {
        ConnectOptions::resolve(self.options.clone().map(ConnectOptions::from))
    }
}

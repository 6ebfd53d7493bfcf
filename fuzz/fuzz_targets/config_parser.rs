//! Fuzz target for the connection config parser.
//!
//! Feeds arbitrary TOML text to the parser and expands variables against a
//! fixed environment. Neither step may panic.
//!
//! Run with:
//! ```bash
//! cargo +nightly fuzz run fuzz_config_parser
//! ```

#![no_main]

use libfuzzer_sys::fuzz_target;
use mongolink_core::{ConnectConfig, EnvExpander, MapEnvSource};

fuzz_target!(|data: &[u8]| {
    if let Ok(input) = std::str::from_utf8(data) {
        if let Ok(config) = ConnectConfig::from_toml_str(input) {
            let expander = EnvExpander::with_source(MapEnvSource::new().set("DB_USER", "fuzz"));
            if let Ok(config) = config.expand_with(&expander) {
                let _ = config.uri();
                let _ = config.resolved_options();
            }
        }
    }
});

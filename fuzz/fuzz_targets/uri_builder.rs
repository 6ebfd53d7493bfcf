//! Fuzz target for URI construction.
//!
//! Run with:
//! ```bash
//! cargo +nightly fuzz run fuzz_uri_builder
//! ```

#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use mongolink_core::{ConnectionTarget, build_uri, redact_uri};

#[derive(Debug, Arbitrary)]
enum FuzzTarget {
    Raw(String),
    Remote {
        username: String,
        password: String,
        cluster: String,
        dbname: String,
    },
    Local {
        hostname: String,
        port: Option<u16>,
        dbname: String,
    },
}

fuzz_target!(|input: FuzzTarget| {
    let target = match input {
        FuzzTarget::Raw(uri) => {
            // Raw strings pass through untouched
            assert_eq!(build_uri(&ConnectionTarget::raw(uri.clone())), uri);
            return;
        }
        FuzzTarget::Remote {
            username,
            password,
            cluster,
            dbname,
        } => {
            let uri = build_uri(&ConnectionTarget::remote(
                username.clone(),
                password.clone(),
                cluster.clone(),
                dbname.clone(),
            ));
            let credentials = &uri["mongodb+srv://".len()..uri.len() - cluster.len() - dbname.len()
                - "@/?retryWrites=true&w=majority".len()];
            // Encoded credentials never contain delimiters
            assert!(!credentials.contains('@'));
            assert!(!credentials.contains('/'));
            assert_eq!(credentials.matches(':').count(), 1);
            ConnectionTarget::remote(username, password, cluster, dbname)
        }
        FuzzTarget::Local {
            hostname,
            port,
            dbname,
        } => ConnectionTarget::local(hostname, port, dbname),
    };

    let _ = redact_uri(&build_uri(&target));
});

//! Process termination hook.
//!
//! Nothing is registered implicitly. A caller that wants the process to
//! close its connection and exit on Ctrl-C opts in with
//! [`TerminationHook::install`]:
//!
//! ```rust,ignore
//! let connection = mongolink_core::connect("mongodb://localhost:27017/app", None).await?;
//! let _guard = TerminationHook::new(connection.clone()).install()?;
//! ```
//!
//! Shutdown is blunt: the connection is force-closed without waiting for
//! in-flight operations and the process exits with status 0.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::client::Connection;
use crate::error::{ConnectError, ConnectResult};

/// Set while a hook is installed.
static INSTALLED: AtomicBool = AtomicBool::new(false);

type ExitFn = Box<dyn FnOnce(i32) + Send>;

/// Closes a connection and exits when the process is asked to terminate.
pub struct TerminationHook {
    connection: Connection,
    exit: ExitFn,
}

impl TerminationHook {
    /// Hook for `connection` that exits through [`std::process::exit`].
    pub fn new(connection: Connection) -> Self {
        Self {
            connection,
            exit: Box::new(|code| std::process::exit(code)),
        }
    }

    /// Replace the exit function.
    pub fn with_exit<F>(mut self, exit: F) -> Self
    where
        F: FnOnce(i32) + Send + 'static,
    {
        self.exit = Box::new(exit);
        self
    }

    /// Listen for Ctrl-C in a background task.
    ///
    /// Must be called from within a Tokio runtime. Only one hook can be
    /// installed at a time; the slot frees up when the returned guard is
    /// dropped.
    pub fn install(self) -> ConnectResult<TerminationGuard> {
        let runtime = Handle::try_current().map_err(|e| {
            ConnectError::config(format!("termination hook needs a Tokio runtime: {}", e))
        })?;

        if INSTALLED
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(ConnectError::config("termination hook already installed"));
        }

        let handle = runtime.spawn(self.run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!(error = %e, "Failed to listen for termination signal");
                std::future::pending::<()>().await;
            }
        }));

        Ok(TerminationGuard { handle })
    }

    /// Wait for `signal`, then close the connection and exit with status 0.
    pub async fn run_until<F>(self, signal: F)
    where
        F: Future<Output = ()>,
    {
        signal.await;

        info!(uri = %self.connection.uri(), "Termination signal received, closing MongoDB connection");
        self.connection.close_immediately().await;
        info!("MongoDB connection closed due to application termination");

        (self.exit)(0);
    }
}

/// Keeps a termination hook installed. Dropping it removes the hook.
#[derive(Debug)]
pub struct TerminationGuard {
    handle: JoinHandle<()>,
}

impl TerminationGuard {
    /// Remove the hook.
    pub fn disarm(self) {
        drop(self);
    }
}

impl Drop for TerminationGuard {
    fn drop(&mut self) {
        self.handle.abort();
        INSTALLED.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::Connector;
    use crate::lifecycle::ConnectionState;
    use std::sync::mpsc;
    use parking_lot::Mutex;
    use tokio::sync::oneshot;

    // Installation state is process-wide; tests that install take turns.
    static INSTALL_LOCK: Mutex<()> = Mutex::new(());

    async fn unreachable_connection() -> Connection {
        Connector::new("mongodb://127.0.0.1:1/app")
            .create()
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_signal_closes_and_exits_zero() {
        let connection = unreachable_connection().await;
        let (code_tx, code_rx) = mpsc::channel();
        let (signal_tx, signal_rx) = oneshot::channel::<()>();

        let hook = TerminationHook::new(connection.clone()).with_exit(move |code| {
            code_tx.send(code).unwrap();
        });
        let task = tokio::spawn(hook.run_until(async {
            let _ = signal_rx.await;
        }));

        assert!(code_rx.try_recv().is_err());
        signal_tx.send(()).unwrap();
        task.await.unwrap();

        assert_eq!(code_rx.recv().unwrap(), 0);
        assert_eq!(connection.state(), ConnectionState::Disconnected);
    }

    #[test]
    fn test_install_outside_runtime_fails_cleanly() {
        let _lock = INSTALL_LOCK.lock();
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        let connection = runtime.block_on(unreachable_connection());

        let err = TerminationHook::new(connection.clone())
            .with_exit(|_| {})
            .install()
            .unwrap_err();
        assert!(err.is_config_error());
        assert!(err.to_string().contains("Tokio runtime"));

        // The failed attempt must not hold the slot.
        runtime.block_on(async {
            let guard = TerminationHook::new(connection)
                .with_exit(|_| {})
                .install()
                .unwrap();
            guard.disarm();
        });
    }

    #[tokio::test]
    async fn test_single_installation() {
        let _lock = INSTALL_LOCK.lock();
        let connection = unreachable_connection().await;

        let guard = TerminationHook::new(connection.clone())
            .with_exit(|_| {})
            .install()
            .unwrap();
        let second = TerminationHook::new(connection.clone())
            .with_exit(|_| {})
            .install();
        assert!(second.unwrap_err().is_config_error());

        guard.disarm();
        let again = TerminationHook::new(connection)
            .with_exit(|_| {})
            .install()
            .unwrap();
        drop(again);
    }
}

//! Pluggable request logging.
//!
//! The connection never logs on its own. When a `Logger` is attached it
//! receives one line before each request and one after each response.

use tracing::Level;

/// Receives leveled text messages from a connection.
pub trait Logger: Send + Sync {
    fn log(&self, level: Level, message: &str);
}

/// Forwards messages to the `tracing` macros.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingLogger;

impl Logger for TracingLogger {
    fn log(&self, level: Level, message: &str) {
        if level == Level::ERROR {
            tracing::error!(target: "docdb_core::connection", "{message}");
        } else if level == Level::WARN {
            tracing::warn!(target: "docdb_core::connection", "{message}");
        } else if level == Level::INFO {
            tracing::info!(target: "docdb_core::connection", "{message}");
        } else if level == Level::DEBUG {
            tracing::debug!(target: "docdb_core::connection", "{message}");
        } else {
            tracing::trace!(target: "docdb_core::connection", "{message}");
        }
    }
}

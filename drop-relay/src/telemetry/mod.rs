//! Transfer audit trail.
//!
//! The relay reports two events per transfer: file metadata announced by
//! the Sender and transfer completion. Recording is fire-and-forget; a
//! failing store is logged and never slows down or fails a transfer.

mod sqlite;

pub use sqlite::SqliteTelemetry;

use crate::config::TelemetryConfig;
use crate::error::TelemetryError;
use async_trait::async_trait;
use drop_types::SessionToken;
use std::net::SocketAddr;
use std::sync::Arc;

/// Trait for telemetry backends.
#[async_trait]
pub trait TelemetrySink: Send + Sync {
    /// Sender announced file metadata.
    async fn record_file_info(
        &self,
        token: &SessionToken,
        name: &str,
        size: u64,
        source: SocketAddr,
    ) -> Result<(), TelemetryError>;

    /// EOF was relayed to the Receiver.
    ///
    /// `name` and `size` are absent if the Sender never sent `fileinfo`;
    /// `dest` is absent if no Receiver was bound at the time.
    async fn record_transfer_complete(
        &self,
        token: &SessionToken,
        name: Option<&str>,
        size: Option<u64>,
        dest: Option<SocketAddr>,
    ) -> Result<(), TelemetryError>;
}

/// Sink that discards every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopTelemetry;

#[async_trait]
impl TelemetrySink for NoopTelemetry {
    async fn record_file_info(
        &self,
        _token: &SessionToken,
        _name: &str,
        _size: u64,
        _source: SocketAddr,
    ) -> Result<(), TelemetryError> {
        Ok(())
    }

    async fn record_transfer_complete(
        &self,
        _token: &SessionToken,
        _name: Option<&str>,
        _size: Option<u64>,
        _dest: Option<SocketAddr>,
    ) -> Result<(), TelemetryError> {
        Ok(())
    }
}

/// Build the sink selected by configuration.
pub async fn open(config: &TelemetryConfig) -> crate::error::Result<Arc<dyn TelemetrySink>> {
    if !config.enabled {
        tracing::info!("Telemetry disabled");
        return Ok(Arc::new(NoopTelemetry));
    }
    let sink = SqliteTelemetry::new(&config.database).await?;
    tracing::info!("Telemetry recording to {}", config.database.display());
    Ok(Arc::new(sink))
}

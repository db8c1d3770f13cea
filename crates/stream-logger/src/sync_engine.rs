//! One sync cycle: drain every registered stream's buffer to the endpoint.

use crate::scheduler::Scheduler;
use crate::{Logger, LoggerError, LoggerResult};
use remote_endpoint::{DataPoint, RemoteEndpoint};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// State guarded by the sync lock. Held for a whole cycle, so cycles never
/// overlap and the store is never closed under one.
pub(crate) struct SyncState {
    pub(crate) endpoint: Option<Arc<dyn RemoteEndpoint>>,
    pub(crate) scheduler: Scheduler,
}

impl SyncState {
    pub(crate) fn new() -> Self {
        Self {
            endpoint: None,
            scheduler: Scheduler::new(),
        }
    }
}

/// What a completed cycle uploaded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncReport {
    /// Streams that had pending points and were uploaded.
    pub streams_synced: usize,
    pub points_uploaded: usize,
}

/// Result of [`Logger::sync`] when it does not return an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    Completed(SyncReport),
    /// The cycle failed and the failure handler chose not to surface it.
    Suppressed,
}

/// Called with the logger and the error when a cycle fails. Returning
/// `true` surfaces the error to the caller of `sync`, `false` swallows it.
pub type SyncFailureHandler = Arc<dyn Fn(&Logger, &LoggerError) -> bool + Send + Sync>;

impl Logger {
    /// Run one sync cycle now.
    ///
    /// Streams are drained in registration order. A failure aborts the rest
    /// of the cycle, leaves every unacknowledged point buffered and goes to
    /// the failure handler, if one is installed.
    ///
    /// # Panics
    ///
    /// A panic raised by the failure handler is not caught.
    pub fn sync(&self) -> LoggerResult<SyncOutcome> {
        let result = {
            let mut state = self.shared.sync.lock();
            self.run_cycle(&mut state)
        };

        match result {
            Ok(report) => Ok(SyncOutcome::Completed(report)),
            Err(LoggerError::Closed) => Err(LoggerError::Closed),
            Err(err) => self.handle_sync_failure(err),
        }
    }

    fn run_cycle(&self, state: &mut SyncState) -> LoggerResult<SyncReport> {
        let endpoint = self.endpoint_locked(state)?;
        endpoint.ping().map_err(LoggerError::unreachable)?;

        let streams = self.with_store(|store| Ok(store.registry.names()))?;
        let mut report = SyncReport::default();

        for name in streams {
            if !endpoint.stream_exists(&name)? {
                return Err(LoggerError::StreamMissingRemotely(name));
            }

            let pending = self.with_store(|store| Ok(store.db.pending_points_for_stream(&name)?))?;
            let Some(through) = pending.last().map(|point| point.timestamp) else {
                continue;
            };

            let batch = pending
                .into_iter()
                .map(|point| DataPoint::from_json(point.timestamp, point.payload))
                .collect::<Result<Vec<_>, _>>()?;

            endpoint.append_data_points(&name, &batch)?;

            let deleted = self.with_store(|store| Ok(store.db.delete_pending_points_through(&name, through)?))?;
            debug!(stream = %name, uploaded = batch.len(), deleted, "Synced stream");

            report.streams_synced += 1;
            report.points_uploaded += batch.len();
        }

        let now = self.shared.clock.now();
        self.with_store(|store| store.config.set_last_sync_time(&store.db, now))?;

        info!(
            streams = report.streams_synced,
            points = report.points_uploaded,
            "Sync cycle complete"
        );
        Ok(report)
    }

    fn handle_sync_failure(&self, err: LoggerError) -> LoggerResult<SyncOutcome> {
        match &self.shared.on_sync_fail {
            Some(handler) if !handler(self, &err) => {
                warn!(error = %err, "Sync failed, suppressed by failure handler");
                Ok(SyncOutcome::Suppressed)
            }
            _ => Err(err),
        }
    }

    /// A cycle started by the scheduler. Errors have nowhere to go, so they
    /// are logged.
    pub(crate) fn run_scheduled_cycle(&self) {
        match self.sync() {
            Ok(_) => {}
            Err(LoggerError::Closed) => debug!("Skipping scheduled sync, logger is closed"),
            Err(err) => warn!(error = %err, transient = err.is_transient(), "Scheduled sync failed"),
        }
    }

    /// The cached endpoint, connecting first if there is none.
    pub(crate) fn endpoint_locked(&self, state: &mut SyncState) -> LoggerResult<Arc<dyn RemoteEndpoint>> {
        if let Some(endpoint) = &state.endpoint {
            return Ok(endpoint.clone());
        }

        let settings = self.with_store(|store| Ok(store.config.connection_settings()))?;
        let endpoint = self
            .shared
            .connector
            .connect(&settings)
            .map_err(LoggerError::unreachable)?;
        debug!(url = %settings.endpoint_url, "Connected to remote endpoint");
        state.endpoint = Some(endpoint.clone());
        Ok(endpoint)
    }
}

//! The logger handle, its builder and the configuration accessors.

use crate::config::DEFAULT_ENDPOINT_URL;
use crate::registry::resolve_remote_schema;
use crate::store::LocalStore;
use crate::sync_engine::{SyncFailureHandler, SyncState};
use crate::{Clock, JsonSchemaValidator, LoggerError, LoggerResult, SchemaValidator, SystemClock};
use logger_database::{Database, RegisteredStream, StoredConfig};
use parking_lot::Mutex;
use remote_endpoint::{HttpConnector, RemoteConnector};
use serde_json::Value;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Runs once, right after a store is created.
pub type CreateCallback = Box<dyn FnOnce(&Logger) -> LoggerResult<()> + Send>;

/// State shared by every clone of a [`Logger`].
///
/// Two locks: `store` is held briefly by ingestion, queries and config
/// access; `sync` is held for a whole sync cycle and for scheduler
/// transitions. When both are needed, `sync` is taken first.
pub(crate) struct Shared {
    /// `None` once the logger is closed.
    pub(crate) store: Mutex<Option<LocalStore>>,
    pub(crate) sync: Mutex<SyncState>,
    pub(crate) connector: Box<dyn RemoteConnector>,
    pub(crate) validator: Box<dyn SchemaValidator>,
    pub(crate) clock: Arc<dyn Clock>,
    pub(crate) on_sync_fail: Option<SyncFailureHandler>,
}

/// Offline-first data point logger.
///
/// Values are validated and buffered in a local SQLite store, then uploaded
/// by [`Logger::sync`] or by the background scheduler started with
/// [`Logger::start`]. Cloning yields another handle to the same logger.
#[derive(Clone)]
pub struct Logger {
    pub(crate) shared: Arc<Shared>,
}

impl fmt::Debug for Logger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Logger").finish_non_exhaustive()
    }
}

enum StoreLocation {
    File(PathBuf),
    Memory,
}

/// Configures and opens a [`Logger`].
pub struct LoggerBuilder {
    location: StoreLocation,
    credential: Option<String>,
    default_endpoint_url: String,
    on_create: Option<CreateCallback>,
    on_sync_fail: Option<SyncFailureHandler>,
    connector: Box<dyn RemoteConnector>,
    validator: Box<dyn SchemaValidator>,
    clock: Arc<dyn Clock>,
}

impl LoggerBuilder {
    fn new(location: StoreLocation) -> Self {
        Self {
            location,
            credential: None,
            default_endpoint_url: DEFAULT_ENDPOINT_URL.to_string(),
            on_create: None,
            on_sync_fail: None,
            connector: Box::new(HttpConnector::default()),
            validator: Box::new(JsonSchemaValidator::new()),
            clock: Arc::new(SystemClock),
        }
    }

    /// Credential written to the store on open, before `on_create` runs.
    pub fn credential(mut self, credential: impl Into<String>) -> Self {
        self.credential = Some(credential.into());
        self
    }

    /// Endpoint URL stored when the store is first created.
    pub fn default_endpoint_url(mut self, url: impl Into<String>) -> Self {
        self.default_endpoint_url = url.into();
        self
    }

    /// Run `callback` once, when this open creates the store.
    pub fn on_create(mut self, callback: impl FnOnce(&Logger) -> LoggerResult<()> + Send + 'static) -> Self {
        self.on_create = Some(Box::new(callback));
        self
    }

    /// Route failed sync cycles to `handler`.
    pub fn on_sync_fail(mut self, handler: impl Fn(&Logger, &LoggerError) -> bool + Send + Sync + 'static) -> Self {
        self.on_sync_fail = Some(Arc::new(handler));
        self
    }

    pub fn connector(mut self, connector: impl RemoteConnector + 'static) -> Self {
        self.connector = Box::new(connector);
        self
    }

    pub fn validator(mut self, validator: impl SchemaValidator + 'static) -> Self {
        self.validator = Box::new(validator);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Open the store, creating it if needed.
    pub fn open(self) -> LoggerResult<Logger> {
        if self.default_endpoint_url.trim().is_empty() {
            return Err(LoggerError::InvalidConfig("endpoint URL must not be empty".to_string()));
        }

        let db = match &self.location {
            StoreLocation::File(path) => Database::open(path)?,
            StoreLocation::Memory => Database::open_in_memory()?,
        };
        let created = db.ensure_config(&StoredConfig::with_endpoint_url(&self.default_endpoint_url))?;
        if let Some(credential) = &self.credential {
            db.set_credential(credential)?;
        }
        let store = LocalStore::load(db)?;

        let logger = Logger {
            shared: Arc::new(Shared {
                store: Mutex::new(Some(store)),
                sync: Mutex::new(SyncState::new()),
                connector: self.connector,
                validator: self.validator,
                clock: self.clock,
                on_sync_fail: self.on_sync_fail,
            }),
        };

        if created {
            info!("Created logger store");
            if let Some(on_create) = self.on_create {
                on_create(&logger)?;
            }
        }
        Ok(logger)
    }
}

impl Logger {
    /// Builder for a logger backed by the SQLite file at `path`.
    pub fn builder(path: impl Into<PathBuf>) -> LoggerBuilder {
        LoggerBuilder::new(StoreLocation::File(path.into()))
    }

    /// Builder for a logger whose store lives only in memory.
    pub fn in_memory() -> LoggerBuilder {
        LoggerBuilder::new(StoreLocation::Memory)
    }

    /// Open the store at `path` with default settings.
    pub fn open(path: impl Into<PathBuf>) -> LoggerResult<Self> {
        Self::builder(path).open()
    }

    pub(crate) fn from_shared(shared: Arc<Shared>) -> Self {
        Self { shared }
    }

    pub(crate) fn with_store<T>(&self, f: impl FnOnce(&mut LocalStore) -> LoggerResult<T>) -> LoggerResult<T> {
        let mut guard = self.shared.store.lock();
        let store = guard.as_mut().ok_or(LoggerError::Closed)?;
        f(store)
    }

    // ==========================================
    // Streams
    // ==========================================

    /// Register a stream, checking it against the remote endpoint.
    ///
    /// An existing remote stream is mirrored with its remote schema as-is and
    /// `schema` is ignored. A missing one is created from `schema`; without
    /// a schema the stream cannot be created and `NotFound` is returned.
    pub fn register(&self, name: &str, schema: Option<Value>) -> LoggerResult<()> {
        let schema = {
            let mut state = self.shared.sync.lock();
            let endpoint = self.endpoint_locked(&mut state)?;
            resolve_remote_schema(endpoint.as_ref(), self.shared.validator.as_ref(), name, schema)?
        };
        self.store_stream(name, schema)
    }

    /// Register or overwrite a stream locally, without asking the endpoint.
    pub fn register_without_verification(&self, name: &str, schema: Option<Value>) -> LoggerResult<()> {
        if let Some(schema) = &schema {
            self.shared
                .validator
                .check_schema(schema)
                .map_err(|message| LoggerError::InvalidSchema {
                    stream: name.to_string(),
                    message,
                })?;
        }
        self.store_stream(name, schema)
    }

    fn store_stream(&self, name: &str, schema: Option<Value>) -> LoggerResult<()> {
        self.with_store(|store| store.registry.register(&store.db, RegisteredStream::new(name, schema)))?;
        info!(stream = %name, "Registered stream");
        Ok(())
    }

    /// Whether the logger tracks `name`.
    pub fn contains(&self, name: &str) -> LoggerResult<bool> {
        self.with_store(|store| Ok(store.registry.contains(name)))
    }

    /// Registered streams in registration order.
    pub fn streams(&self) -> LoggerResult<Vec<RegisteredStream>> {
        self.with_store(|store| Ok(store.registry.streams().to_vec()))
    }

    // ==========================================
    // Buffer
    // ==========================================

    /// Number of buffered points across all streams.
    pub fn pending_count(&self) -> LoggerResult<u64> {
        self.with_store(|store| Ok(store.db.count_pending_points()?))
    }

    pub fn pending_count_for(&self, name: &str) -> LoggerResult<u64> {
        self.with_store(|store| Ok(store.db.count_pending_points_for_stream(name)?))
    }

    // ==========================================
    // Remote
    // ==========================================

    /// Connect to the endpoint unless a connection is already cached.
    pub fn connect(&self) -> LoggerResult<()> {
        let mut state = self.shared.sync.lock();
        self.endpoint_locked(&mut state).map(|_| ())
    }

    /// Identity the endpoint reports for the credential.
    pub fn device_name(&self) -> LoggerResult<String> {
        let endpoint = {
            let mut state = self.shared.sync.lock();
            self.endpoint_locked(&mut state)?
        };
        endpoint.ping().map_err(LoggerError::unreachable)
    }

    // ==========================================
    // Background sync
    // ==========================================

    /// Start syncing every sync period.
    ///
    /// Connects first so a bad credential or URL fails here. Starting a
    /// running logger logs a warning and does nothing.
    pub fn start(&self) -> LoggerResult<()> {
        let mut state = self.shared.sync.lock();
        self.endpoint_locked(&mut state)?;

        if state.scheduler.is_running() {
            warn!("Start called on a logger that is already syncing");
            return Ok(());
        }

        let period = self.with_store(|store| store.config.sync_period())?;
        state.scheduler.arm(Arc::downgrade(&self.shared), period)?;
        info!(period_secs = period.as_secs_f64(), "Started background sync");
        Ok(())
    }

    /// Stop background sync. A cycle already running finishes.
    pub fn stop(&self) {
        if self.shared.sync.lock().scheduler.disarm() {
            info!("Stopped background sync");
        }
    }

    pub fn is_running(&self) -> bool {
        self.shared.sync.lock().scheduler.is_running()
    }

    /// Stop background sync and close the store.
    ///
    /// Waits for a running cycle to finish. Every later operation returns
    /// [`LoggerError::Closed`]; closing twice is a no-op.
    pub fn close(&self) -> LoggerResult<()> {
        let mut state = self.shared.sync.lock();
        state.scheduler.shutdown();
        state.endpoint = None;

        let Some(store) = self.shared.store.lock().take() else {
            return Ok(());
        };
        store.db.close()?;
        info!("Closed logger");
        Ok(())
    }

    // ==========================================
    // Configuration
    // ==========================================

    pub fn credential(&self) -> LoggerResult<String> {
        self.with_store(|store| Ok(store.config.credential().to_string()))
    }

    /// Store a new credential. The next connect uses it.
    pub fn set_credential(&self, credential: &str) -> LoggerResult<()> {
        let mut state = self.shared.sync.lock();
        self.with_store(|store| store.config.set_credential(&store.db, credential))?;
        state.endpoint = None;
        Ok(())
    }

    pub fn endpoint_url(&self) -> LoggerResult<String> {
        self.with_store(|store| Ok(store.config.endpoint_url().to_string()))
    }

    /// Store a new endpoint URL. The next connect uses it.
    pub fn set_endpoint_url(&self, url: &str) -> LoggerResult<()> {
        let mut state = self.shared.sync.lock();
        self.with_store(|store| store.config.set_endpoint_url(&store.db, url))?;
        state.endpoint = None;
        Ok(())
    }

    /// Time of the last successful sync in seconds since the epoch, 0 if never.
    pub fn last_sync_time(&self) -> LoggerResult<f64> {
        self.with_store(|store| Ok(store.config.last_sync_time()))
    }

    pub fn sync_period(&self) -> LoggerResult<Duration> {
        self.with_store(|store| store.config.sync_period())
    }

    /// Store a new sync period. A running scheduler is rearmed with it
    /// without running an extra cycle.
    pub fn set_sync_period(&self, period: Duration) -> LoggerResult<()> {
        let mut state = self.shared.sync.lock();
        self.with_store(|store| store.config.set_sync_period(&store.db, period))?;

        match state.scheduler.period() {
            Some(current) if current != period => {
                state.scheduler.arm(Arc::downgrade(&self.shared), period)?;
                info!(period_secs = period.as_secs_f64(), "Rescheduled background sync");
            }
            _ => {}
        }
        Ok(())
    }

    /// Application data stored alongside the logger configuration.
    pub fn user_data(&self) -> LoggerResult<Value> {
        self.with_store(|store| Ok(store.config.user_data().clone()))
    }

    pub fn set_user_data(&self, data: Value) -> LoggerResult<()> {
        self.with_store(|store| store.config.set_user_data(&store.db, data))
    }
}

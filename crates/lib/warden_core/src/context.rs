//! Shared handles constructed once at startup.

use std::sync::Arc;

use crate::auth::AuthSettings;
use crate::geo::{GeoLocator, NoopLocator};
use crate::ledger::{LedgerBackend, MemoryLedger};
use crate::records::{MemoryRecordStore, RecordStore};

/// Store handles and settings passed by reference into every auth service
/// constructor.
#[derive(Clone)]
pub struct AuthContext {
    pub records: Arc<dyn RecordStore>,
    pub ledger: Arc<dyn LedgerBackend>,
    pub geo: Arc<dyn GeoLocator>,
    pub settings: AuthSettings,
}

impl AuthContext {
    pub fn new(
        records: Arc<dyn RecordStore>,
        ledger: Arc<dyn LedgerBackend>,
        geo: Arc<dyn GeoLocator>,
        settings: AuthSettings,
    ) -> Self {
        Self {
            records,
            ledger,
            geo,
            settings,
        }
    }

    /// Context over in-memory stores and no geolocation.
    pub fn in_memory(settings: AuthSettings) -> Self {
        Self::new(
            Arc::new(MemoryRecordStore::new()),
            Arc::new(MemoryLedger::new()),
            Arc::new(NoopLocator),
            settings,
        )
    }
}

impl std::fmt::Debug for AuthContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthContext")
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

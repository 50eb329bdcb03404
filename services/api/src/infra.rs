use chrono::NaiveDate;
use grant_portal::portal::{
    MemoryBlobs, MemoryDocuments, MemoryIdentity, PortalPlatform, SystemClock,
};
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// In-process stand-ins for the managed identity, document, and blob services.
#[derive(Default, Clone)]
pub(crate) struct InProcessPlatform {
    pub(crate) identity: MemoryIdentity,
    pub(crate) documents: MemoryDocuments,
    pub(crate) blobs: MemoryBlobs,
}

impl InProcessPlatform {
    pub(crate) fn platform(&self) -> PortalPlatform {
        PortalPlatform {
            identity: Arc::new(self.identity.clone()),
            tokens: Arc::new(self.identity.clone()),
            documents: Arc::new(self.documents.clone()),
            blobs: Arc::new(self.blobs.clone()),
            clock: Arc::new(SystemClock),
        }
    }
}

pub(crate) fn parse_date(raw: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|err| format!("failed to parse '{raw}' as YYYY-MM-DD ({err})"))
}

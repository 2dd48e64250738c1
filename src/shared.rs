//! Serialised access to one dashboard from several actors
use super::dashboard::{Dashboard, DashboardSnapshot};
use super::error::DashboardError;
use super::events::ExportFormat;
use super::metrics::MetricPatch;
use super::product::{ProductId, ProductPatch};
use parking_lot::Mutex;
use std::sync::Arc;

/// Cloneable handle that runs every operation under one lock, so a patch is
/// applied as a whole and nothing can land between a confirm's diff and its
/// promotion of the working set.
#[derive(Clone)]
pub struct SharedDashboard {
    inner: Arc<Mutex<Dashboard>>,
}

impl SharedDashboard {
    pub fn new(dashboard: Dashboard) -> Self {
        Self {
            inner: Arc::new(Mutex::new(dashboard)),
        }
    }

    /// Runs `f` with exclusive access. Keep it short; every other caller waits.
    pub fn with<T>(&self, f: impl FnOnce(&mut Dashboard) -> T) -> T {
        let mut guard = self.inner.lock();
        f(&mut guard)
    }

    /// A consistent copy taken under the lock.
    pub fn snapshot(&self) -> DashboardSnapshot {
        self.inner.lock().snapshot()
    }

    pub fn stage_product_edit(
        &self,
        id: &ProductId,
        patch: ProductPatch,
    ) -> Result<(), DashboardError> {
        self.inner.lock().stage_product_edit(id, patch)
    }
    pub fn stage_metric_edit(&self, patch: MetricPatch) -> Result<(), DashboardError> {
        self.inner.lock().stage_metric_edit(patch)
    }
    pub fn confirm(&self, reason: &str) -> Result<usize, DashboardError> {
        self.inner.lock().confirm(reason)
    }
    pub fn discard(&self) {
        self.inner.lock().discard()
    }
    pub fn export(&self, format: ExportFormat) -> Result<(), DashboardError> {
        self.inner.lock().export(format)
    }
}

impl std::fmt::Debug for SharedDashboard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedDashboard").finish_non_exhaustive()
    }
}

//! Dashboard store: the single owner of catalog state
//!
//! Edits are staged on a *working* copy of the catalog and only become part of
//! the *confirmed* copy through [`Dashboard::confirm`], which is also the only
//! operation that writes to the audit log. [`Dashboard::discard`] throws the
//! working copy away.
use super::audit::{AuditLog, AuditLogEntry, TimeStamp, diff_entities, diff_fields};
use super::config::DashboardConfig;
use super::error::{DashboardError, ValidationError};
use super::events::{DashboardEvent, ExportFormat, Exporter, NoopNotifier, Notifier};
use super::metrics::{DerivedMetrics, MetricField, MetricOverrides, MetricPatch, compute_metrics};
use super::product::{Product, ProductField, ProductId, ProductPatch, seed_catalog};
use super::role::{Capability, Role};
use super::visibility::{Section, Visibility};
use chrono::{NaiveDate, Utc};
use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};
use rust_decimal::Decimal;
use std::collections::HashSet;
use std::fmt;
use tracing::{debug, info, warn};

// one side of the working/confirmed pair
#[derive(Debug, Clone, PartialEq, Eq)]
struct CatalogState {
    products: Vec<Product>,
    overrides: MetricOverrides,
    derived: DerivedMetrics, // straight from the aggregation engine
    metrics: DerivedMetrics, // derived + overrides, what readers see
}

/// Frozen, read-only copy of everything the presentation layer can show.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DashboardSnapshot {
    pub current_user: String,
    pub role: Role,
    pub admin_mode: bool,
    pub products: Vec<Product>,
    pub metrics: DerivedMetrics,
    pub visibility: Visibility,
    pub has_pending_changes: bool,
    pub audit_log: Vec<AuditLogEntry>, // newest first
    pub taken_at: TimeStamp<Utc>,
}

pub struct Dashboard {
    config: DashboardConfig,
    role: Role,
    admin_mode: bool,
    working: CatalogState,
    confirmed: CatalogState,
    pending: bool,
    visibility: Visibility,
    audit_log: AuditLog,
    rng: Box<dyn RngCore + Send>,
    exporter: Option<Box<dyn Exporter>>,
    notifier: Box<dyn Notifier>,
}

#[derive(Default)]
pub struct DashboardBuilder {
    config: Option<DashboardConfig>,
    seed: Option<Vec<Product>>,
    rng: Option<Box<dyn RngCore + Send>>,
    exporter: Option<Box<dyn Exporter>>,
    notifier: Option<Box<dyn Notifier>>,
}

impl CatalogState {
    fn new(products: Vec<Product>, derived: DerivedMetrics) -> Self {
        Self {
            products,
            overrides: MetricOverrides::default(),
            metrics: derived.clone(),
            derived,
        }
    }
    fn position(&self, id: &ProductId) -> Option<usize> {
        self.products.iter().position(|p| p.id() == id)
    }
    fn refresh(&mut self) {
        self.metrics = self.overrides.overlay(&self.derived);
    }
}

impl DashboardBuilder {
    pub fn set_config(mut self, config: DashboardConfig) -> Self {
        self.config = Some(config);
        self
    }
    /// Replaces the reference catalog. Ids must be unique.
    pub fn set_seed(mut self, products: Vec<Product>) -> Self {
        self.seed = Some(products);
        self
    }
    /// Random source for the synthesized revenue history.
    pub fn set_rng(mut self, rng: impl RngCore + Send + 'static) -> Self {
        self.rng = Some(Box::new(rng));
        self
    }
    pub fn set_exporter(mut self, exporter: impl Exporter + 'static) -> Self {
        self.exporter = Some(Box::new(exporter));
        self
    }
    pub fn set_notifier(mut self, notifier: impl Notifier + 'static) -> Self {
        self.notifier = Some(Box::new(notifier));
        self
    }

    pub fn build(self) -> Result<Dashboard, ValidationError> {
        let config = self.config.unwrap_or_default();
        let products = self.seed.unwrap_or_else(seed_catalog);

        let mut seen = HashSet::new();
        if let Some(dup) = products.iter().find(|p| !seen.insert(p.id())) {
            return Err(ValidationError::DuplicateProductId(dup.id().clone()));
        }

        let mut rng = self
            .rng
            .unwrap_or_else(|| Box::new(StdRng::from_os_rng()));
        let derived = compute_metrics(&products, config.today(), rng.as_mut())?;
        let state = CatalogState::new(products, derived);

        info!(
            user = config.current_user(),
            role = %config.initial_role(),
            products = state.products.len(),
            "dashboard initialised"
        );

        Ok(Dashboard {
            role: config.initial_role(),
            admin_mode: false,
            working: state.clone(),
            confirmed: state,
            pending: false,
            visibility: Visibility::default(),
            audit_log: AuditLog::new(),
            rng,
            exporter: self.exporter,
            notifier: self.notifier.unwrap_or_else(|| Box::new(NoopNotifier)),
            config,
        })
    }
}

impl Dashboard {
    pub fn builder() -> DashboardBuilder {
        DashboardBuilder::default()
    }

    pub fn config(&self) -> &DashboardConfig {
        &self.config
    }
    pub fn current_user(&self) -> &str {
        self.config.current_user()
    }
    pub fn role(&self) -> Role {
        self.role
    }
    pub fn admin_mode(&self) -> bool {
        self.admin_mode
    }
    /// Working product list, including staged edits.
    pub fn products(&self) -> &[Product] {
        &self.working.products
    }
    pub fn product(&self, id: &ProductId) -> Option<&Product> {
        self.working.position(id).map(|i| &self.working.products[i])
    }
    /// Product list as of the last confirm.
    pub fn confirmed_products(&self) -> &[Product] {
        &self.confirmed.products
    }
    /// Effective metrics of the working set.
    pub fn metrics(&self) -> &DerivedMetrics {
        &self.working.metrics
    }
    pub fn visibility(&self) -> &Visibility {
        &self.visibility
    }
    pub fn has_pending_changes(&self) -> bool {
        self.pending
    }
    pub fn audit_log(&self) -> &AuditLog {
        &self.audit_log
    }

    pub fn snapshot(&self) -> DashboardSnapshot {
        DashboardSnapshot {
            current_user: self.config.current_user().to_string(),
            role: self.role,
            admin_mode: self.admin_mode,
            products: self.working.products.clone(),
            metrics: self.working.metrics.clone(),
            visibility: self.visibility.clone(),
            has_pending_changes: self.pending,
            audit_log: self.audit_log.to_vec(),
            taken_at: TimeStamp::new(),
        }
    }

    pub fn set_role(&mut self, role: Role) {
        if !role.allows(Capability::AdminPanel) {
            self.admin_mode = false;
        }
        info!(from = %self.role, to = %role, "role changed");
        self.role = role;
    }

    /// Flips admin mode when the current role may open the admin panel; a no-op
    /// for everyone else. Returns the resulting state.
    pub fn toggle_admin_mode(&mut self) -> bool {
        if self.role.allows(Capability::AdminPanel) {
            self.admin_mode = !self.admin_mode;
        }
        self.admin_mode
    }

    /// Flips one presentation section. Independent of staged changes.
    pub fn toggle_visibility(&mut self, section: Section) -> Result<bool, DashboardError> {
        self.authorize(Capability::ManageVisibility)?;
        let shown = self.visibility.toggle(section);
        debug!(?section, shown, "visibility toggled");
        Ok(shown)
    }

    /// Stage a batch of field updates on one product
    pub fn stage_product_edit(
        &mut self,
        id: &ProductId,
        patch: ProductPatch,
    ) -> Result<(), DashboardError> {
        self.authorize(Capability::EditData)?;

        let index = self
            .working
            .position(id)
            .ok_or_else(|| DashboardError::NotFound(id.clone()))?;

        if patch.is_empty() {
            return Ok(());
        }

        // staging is optimistic: no comparison against the old values here
        let mut products = self.working.products.clone();
        products[index].apply(&patch);
        self.recompute(products)?;
        self.pending = true;

        debug!(product = %id, fields = ?patch.fields(), "product edit staged");
        Ok(())
    }

    /// Stage a single field from raw editor input
    pub fn stage_product_field(
        &mut self,
        id: &ProductId,
        field: ProductField,
        raw: &str,
    ) -> Result<(), DashboardError> {
        let patch = ProductPatch::new().set_raw(field, raw)?;
        self.stage_product_edit(id, patch)
    }

    /// Stage direct overrides of scalar KPIs
    pub fn stage_metric_edit(&mut self, patch: MetricPatch) -> Result<(), DashboardError> {
        self.authorize(Capability::EditData)?;

        if patch.is_empty() {
            return Ok(());
        }

        for (field, value) in patch.iter() {
            self.working
                .overrides
                .pin_scalar(field, &self.working.derived, value);
        }
        self.working.refresh();
        self.pending = true;

        let fields: Vec<MetricField> = patch.iter().map(|(field, _)| field).collect();
        debug!(?fields, "metric edit staged");
        Ok(())
    }

    /// Override one day of the revenue history
    pub fn stage_revenue_point(
        &mut self,
        date: NaiveDate,
        revenue: Decimal,
    ) -> Result<(), DashboardError> {
        self.authorize(Capability::EditData)?;

        if !self
            .working
            .overrides
            .pin_history_point(date, &self.working.derived, revenue)
        {
            return Err(DashboardError::HistoryPointNotFound(date));
        }
        self.working.refresh();
        self.pending = true;

        debug!(%date, %revenue, "revenue point staged");
        Ok(())
    }

    /// Override the breakdown value of one category
    pub fn stage_category_value(
        &mut self,
        category: &str,
        value: Decimal,
    ) -> Result<(), DashboardError> {
        self.authorize(Capability::EditData)?;

        if !self
            .working
            .overrides
            .pin_category(category, &self.working.derived, value)
        {
            return Err(DashboardError::CategoryNotFound(category.to_string()));
        }
        self.working.refresh();
        self.pending = true;

        debug!(category, %value, "category value staged");
        Ok(())
    }

    /// Promote the working set to confirmed and record what changed.
    ///
    /// Returns the number of audit entries appended, which is zero when every
    /// staged value turned out to equal its confirmed value.
    pub fn confirm(&mut self, reason: &str) -> Result<usize, DashboardError> {
        self.authorize(Capability::EditData)?;

        // blank means whitespace only; the reason is recorded as entered
        if reason.trim().is_empty() {
            return Err(self.reject_confirm(ValidationError::ReasonRequired.into()));
        }

        let actor = self.config.current_user().to_string();

        // products pair up by id, in catalog order
        let mut block = Vec::new();
        for working in &self.working.products {
            if let Some(confirmed) = self.confirmed.products.iter().find(|p| p.id() == working.id())
            {
                block.extend(diff_entities(working, confirmed, &actor, Some(reason)));
            }
        }

        // KPIs are only audited where an override was staged or lifted
        let overridden: Vec<MetricField> = MetricField::ALL
            .into_iter()
            .filter(|f| self.working.overrides.scalar(*f) != self.confirmed.overrides.scalar(*f))
            .collect();
        block.extend(diff_fields(
            &self.working.metrics,
            &self.confirmed.metrics,
            overridden.as_slice(),
            &actor,
            Some(reason),
        ));

        let entries = match self.audit_log.prepend(block) {
            Ok(entries) => entries,
            Err(e) => return Err(self.reject_confirm(DashboardError::Seal(e.to_string()))),
        };

        self.confirmed = self.working.clone();
        self.pending = false;

        info!(entries, actor = %actor, reason, "changes confirmed");
        self.notifier.notify(DashboardEvent::Confirmed { entries });
        Ok(entries)
    }

    /// Drop every staged change and return to the last confirmed state. Never audited.
    pub fn discard(&mut self) {
        self.working = self.confirmed.clone();
        self.pending = false;

        info!("staged changes discarded");
        self.notifier.notify(DashboardEvent::Discarded);
    }

    /// Hand a frozen snapshot to the exporter. Exporter failures surface as
    /// events only.
    pub fn export(&mut self, format: ExportFormat) -> Result<(), DashboardError> {
        self.authorize(Capability::Export)?;

        let snapshot = self.snapshot();
        let event = match self.exporter.as_mut() {
            Some(exporter) => match exporter.export(format, &snapshot) {
                Ok(()) => {
                    info!(%format, "export dispatched");
                    DashboardEvent::ExportDispatched { format }
                }
                Err(err) => {
                    warn!(%format, error = %err, "exporter failed");
                    DashboardEvent::ExportFailed {
                        format,
                        message: err.to_string(),
                    }
                }
            },
            None => {
                warn!(%format, "export requested without an exporter");
                DashboardEvent::ExportFailed {
                    format,
                    message: "no exporter registered".to_string(),
                }
            }
        };

        self.notifier.notify(event);
        Ok(())
    }

    fn authorize(&self, capability: Capability) -> Result<(), DashboardError> {
        if self.config.enforce_roles() && !self.role.allows(capability) {
            warn!(role = %self.role, ?capability, "operation refused");
            return Err(DashboardError::Unauthorized {
                role: self.role,
                capability,
            });
        }
        Ok(())
    }

    fn reject_confirm(&mut self, err: DashboardError) -> DashboardError {
        warn!(error = %err, "confirm rejected");
        self.notifier.notify(DashboardEvent::ConfirmRejected {
            message: err.to_string(),
        });
        err
    }

    /// Derives metrics for `products` and installs both in the working set.
    /// On failure the working set is left as it was.
    fn recompute(&mut self, products: Vec<Product>) -> Result<(), ValidationError> {
        let derived = compute_metrics(&products, self.config.today(), self.rng.as_mut())?;
        self.working.products = products;
        self.working.derived = derived;

        let dropped = self.working.overrides.reconcile(&self.working.derived);
        if dropped > 0 {
            debug!(dropped, "metric overrides superseded by recomputation");
        }
        self.working.refresh();
        Ok(())
    }
}

impl fmt::Debug for Dashboard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dashboard")
            .field("user", &self.config.current_user())
            .field("role", &self.role)
            .field("products", &self.working.products.len())
            .field("pending", &self.pending)
            .field("audit_entries", &self.audit_log.len())
            .finish()
    }
}

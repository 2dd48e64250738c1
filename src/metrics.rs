//! Aggregation engine: KPIs and chart series derived from the product catalog
//!
//! Everything here is a pure function of the product list, with one exception:
//! the daily revenue history is a synthesized stand-in (total revenue spread over
//! the trailing window with ±20% noise), so [`compute_metrics`] takes the random
//! source explicitly. Pinned editor overrides are layered on top by
//! [`MetricOverrides`].
use super::error::ValidationError;
use super::product::Product;
use super::utils::round_money;
use chrono::{NaiveDate, TimeDelta};
use rand::Rng;
use rust_decimal::Decimal;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Length of the trailing revenue window, in days, ending today.
pub const HISTORY_DAYS: i64 = 30;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RevenuePoint {
    pub date: NaiveDate,
    pub revenue: Decimal,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DerivedMetrics {
    pub revenue: Decimal,
    pub aov: Decimal,
    pub conversion_rate: Decimal,
    pub revenue_history: Vec<RevenuePoint>,
    // keyed by category; iteration order carries no meaning
    pub category_breakdown: BTreeMap<String, Decimal>,
}

/// Scalar KPI fields, in the order they are audited.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum MetricField {
    Revenue,
    Aov,
    ConversionRate,
}

/// Direct edits to scalar KPIs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetricPatch {
    values: BTreeMap<MetricField, Decimal>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Pinned {
    basis: Decimal, // derived value at the time the override was staged
    value: Decimal,
}

/// Editor overrides layered over derived metrics.
///
/// An override lives as long as the product-derived value it replaced stays the
/// same. Once a recomputation produces a different value, the recomputation
/// wins and the override is dropped by [`MetricOverrides::reconcile`]. History
/// points are pinned against total revenue, since the daily figures are only
/// spread from it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetricOverrides {
    scalars: BTreeMap<MetricField, Pinned>,
    history: BTreeMap<NaiveDate, Pinned>,
    categories: BTreeMap<String, Pinned>,
}

/// Derives the dashboard metrics from `products`.
///
/// An empty catalog yields zeroed KPIs, a window of zero-revenue days and an
/// empty breakdown. The only failure is a figure leaving the range of its type,
/// reported as [`ValidationError::Overflow`]. `rng` only feeds the history
/// noise term.
pub fn compute_metrics<R: Rng + ?Sized>(
    products: &[Product],
    today: NaiveDate,
    rng: &mut R,
) -> Result<DerivedMetrics, ValidationError> {
    let overflow = |figure: &str| ValidationError::Overflow(figure.to_string());

    let mut revenue = Decimal::ZERO;
    let mut total_sales: u64 = 0;
    let mut rate_sum = Decimal::ZERO;
    let mut category_breakdown: BTreeMap<String, Decimal> = BTreeMap::new();

    for product in products {
        let product_revenue = product.revenue().ok_or_else(|| overflow("revenue"))?;
        revenue = revenue
            .checked_add(product_revenue)
            .ok_or_else(|| overflow("revenue"))?;
        total_sales = total_sales
            .checked_add(product.sales())
            .ok_or_else(|| overflow("sales"))?;
        rate_sum = rate_sum
            .checked_add(product.conversion_rate())
            .ok_or_else(|| overflow("conversion rate"))?;

        let category = category_breakdown
            .entry(product.category().to_string())
            .or_insert(Decimal::ZERO);
        *category = category
            .checked_add(product_revenue)
            .ok_or_else(|| overflow("category breakdown"))?;
    }
    for value in category_breakdown.values_mut() {
        *value = round_money(*value);
    }

    let aov = if total_sales > 0 {
        revenue / Decimal::from(total_sales)
    } else {
        Decimal::ZERO
    };

    let conversion_rate = if products.is_empty() {
        Decimal::ZERO
    } else {
        rate_sum / Decimal::from(products.len())
    };

    let daily = revenue / Decimal::from(HISTORY_DAYS);
    let revenue_history = (0..HISTORY_DAYS)
        .map(|i| {
            // factor in [0.8, 1.2] at 4 decimal places
            let factor = Decimal::new(rng.random_range(8_000..=12_000), 4);
            let value = daily
                .checked_mul(factor)
                .ok_or_else(|| overflow("revenue history"))?;
            Ok(RevenuePoint {
                date: today - TimeDelta::days(HISTORY_DAYS - 1 - i),
                revenue: round_money(value),
            })
        })
        .collect::<Result<Vec<_>, ValidationError>>()?;

    tracing::trace!(
        products = products.len(),
        %revenue,
        categories = category_breakdown.len(),
        "metrics recomputed"
    );

    Ok(DerivedMetrics {
        revenue: round_money(revenue),
        aov: round_money(aov),
        conversion_rate: round_money(conversion_rate),
        revenue_history,
        category_breakdown,
    })
}

impl DerivedMetrics {
    pub fn scalar(&self, field: MetricField) -> Decimal {
        match field {
            MetricField::Revenue => self.revenue,
            MetricField::Aov => self.aov,
            MetricField::ConversionRate => self.conversion_rate,
        }
    }
    fn set_scalar(&mut self, field: MetricField, value: Decimal) {
        match field {
            MetricField::Revenue => self.revenue = value,
            MetricField::Aov => self.aov = value,
            MetricField::ConversionRate => self.conversion_rate = value,
        }
    }
    pub fn history_point(&self, date: NaiveDate) -> Option<&RevenuePoint> {
        self.revenue_history.iter().find(|point| point.date == date)
    }
}

impl MetricField {
    pub const ALL: [MetricField; 3] = [
        MetricField::Revenue,
        MetricField::Aov,
        MetricField::ConversionRate,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            MetricField::Revenue => "revenue",
            MetricField::Aov => "aov",
            MetricField::ConversionRate => "conversionRate",
        }
    }
}

impl fmt::Display for MetricField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for MetricField {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        MetricField::ALL
            .into_iter()
            .find(|field| field.label() == s.trim())
            .ok_or_else(|| ValidationError::UnknownField(s.to_string()))
    }
}

impl MetricPatch {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn set(mut self, field: MetricField, value: Decimal) -> Self {
        self.values.insert(field, value);
        self
    }
    pub fn set_revenue(self, value: Decimal) -> Self {
        self.set(MetricField::Revenue, value)
    }
    pub fn set_aov(self, value: Decimal) -> Self {
        self.set(MetricField::Aov, value)
    }
    pub fn set_conversion_rate(self, value: Decimal) -> Self {
        self.set(MetricField::ConversionRate, value)
    }
    pub fn set_raw(self, field: MetricField, raw: &str) -> Result<Self, ValidationError> {
        let value =
            Decimal::from_str(raw.trim()).map_err(|_| ValidationError::MalformedNumber {
                field: field.label().to_string(),
                value: raw.to_string(),
            })?;
        Ok(self.set(field, value))
    }
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
    pub fn iter(&self) -> impl Iterator<Item = (MetricField, Decimal)> + '_ {
        self.values.iter().map(|(field, value)| (*field, *value))
    }
}

impl MetricOverrides {
    pub fn pin_scalar(&mut self, field: MetricField, derived: &DerivedMetrics, value: Decimal) {
        let basis = derived.scalar(field);
        self.scalars.insert(field, Pinned { basis, value });
    }
    /// Returns `false` when `date` is outside the current history window.
    pub fn pin_history_point(
        &mut self,
        date: NaiveDate,
        derived: &DerivedMetrics,
        value: Decimal,
    ) -> bool {
        if derived.history_point(date).is_none() {
            return false;
        }
        let basis = derived.revenue;
        self.history.insert(date, Pinned { basis, value });
        true
    }
    /// Returns `false` when no product carries `category`.
    pub fn pin_category(&mut self, category: &str, derived: &DerivedMetrics, value: Decimal) -> bool {
        let Some(basis) = derived.category_breakdown.get(category).copied() else {
            return false;
        };
        self.categories
            .insert(category.to_string(), Pinned { basis, value });
        true
    }

    /// Drops overrides whose derived basis no longer matches `derived`; returns
    /// how many were dropped.
    pub fn reconcile(&mut self, derived: &DerivedMetrics) -> usize {
        let before = self.len();

        self.scalars
            .retain(|field, pin| pin.basis == derived.scalar(*field));
        self.history.retain(|date, pin| {
            pin.basis == derived.revenue && derived.history_point(*date).is_some()
        });
        self.categories
            .retain(|category, pin| derived.category_breakdown.get(category) == Some(&pin.basis));

        before - self.len()
    }

    /// The effective metrics: `derived` with every surviving override applied.
    pub fn overlay(&self, derived: &DerivedMetrics) -> DerivedMetrics {
        let mut metrics = derived.clone();

        for (field, pin) in &self.scalars {
            metrics.set_scalar(*field, pin.value);
        }
        for point in metrics.revenue_history.iter_mut() {
            if let Some(pin) = self.history.get(&point.date) {
                point.revenue = pin.value;
            }
        }
        for (category, pin) in &self.categories {
            if let Some(value) = metrics.category_breakdown.get_mut(category) {
                *value = pin.value;
            }
        }
        metrics
    }

    pub fn scalar(&self, field: MetricField) -> Option<Decimal> {
        self.scalars.get(&field).map(|pin| pin.value)
    }
    pub fn len(&self) -> usize {
        self.scalars.len() + self.history.len() + self.categories.len()
    }
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::product::seed_catalog;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 15).unwrap()
    }

    fn product(id: &str, category: &str, price: i64, sales: u64) -> Product {
        Product::new(id)
            .set_category(category)
            .set_price(Decimal::from(price))
            .set_sales(sales)
    }

    #[test]
    fn revenue_identity() {
        let products = vec![product("a", "X", 10, 5), product("b", "Y", 20, 2)];
        let metrics = compute_metrics(&products, today(), &mut StdRng::seed_from_u64(1)).unwrap();

        assert_eq!(metrics.revenue, Decimal::from(90));
        // 90 / 7 = 12.857...
        assert_eq!(metrics.aov, Decimal::new(1286, 2));
        assert_eq!(metrics.category_breakdown["X"], Decimal::from(50));
        assert_eq!(metrics.category_breakdown["Y"], Decimal::from(40));
    }

    #[test]
    fn empty_catalog_is_all_zero() {
        let metrics = compute_metrics(&[], today(), &mut StdRng::seed_from_u64(1)).unwrap();

        assert_eq!(metrics.revenue, Decimal::ZERO);
        assert_eq!(metrics.aov, Decimal::ZERO);
        assert_eq!(metrics.conversion_rate, Decimal::ZERO);
        assert_eq!(metrics.revenue_history.len(), HISTORY_DAYS as usize);
        assert!(metrics.revenue_history.iter().all(|p| p.revenue.is_zero()));
        assert!(metrics.category_breakdown.is_empty());
    }

    #[test]
    fn aov_is_zero_without_sales() {
        let products = vec![product("a", "X", 10, 0), product("b", "X", 99, 0)];
        let metrics = compute_metrics(&products, today(), &mut StdRng::seed_from_u64(1)).unwrap();

        assert_eq!(metrics.aov, Decimal::ZERO);
        assert_eq!(metrics.revenue, Decimal::ZERO);
    }

    #[test]
    fn overflowing_figures_are_rejected() {
        let mut rng = StdRng::seed_from_u64(1);

        let sales = vec![product("a", "X", 1, u64::MAX), product("b", "X", 1, 1)];
        assert_eq!(
            compute_metrics(&sales, today(), &mut rng),
            Err(ValidationError::Overflow("sales".to_string()))
        );

        let price = vec![Product::new("a").set_price(Decimal::MAX).set_sales(2)];
        assert_eq!(
            compute_metrics(&price, today(), &mut rng),
            Err(ValidationError::Overflow("revenue".to_string()))
        );

        // each product fits, their total does not
        let half = Decimal::MAX / Decimal::from(2) + Decimal::ONE;
        let total = vec![
            Product::new("a").set_price(half).set_sales(1),
            Product::new("b").set_price(half).set_sales(1),
        ];
        assert_eq!(
            compute_metrics(&total, today(), &mut rng),
            Err(ValidationError::Overflow("revenue".to_string()))
        );
    }

    #[test]
    fn history_spans_trailing_window_ending_today() {
        let metrics = compute_metrics(&seed_catalog(), today(), &mut StdRng::seed_from_u64(7)).unwrap();
        let history = &metrics.revenue_history;

        assert_eq!(history.first().unwrap().date, NaiveDate::from_ymd_opt(2024, 2, 15).unwrap());
        assert_eq!(history.last().unwrap().date, today());
        assert!(history.windows(2).all(|w| w[1].date - w[0].date == TimeDelta::days(1)));

        let daily = metrics.revenue / Decimal::from(HISTORY_DAYS);
        for point in history {
            assert!(point.revenue >= round_money(daily * Decimal::new(8, 1)));
            assert!(point.revenue <= round_money(daily * Decimal::new(12, 1)));
        }
    }

    #[test]
    fn seeded_rng_reproduces_history() {
        let a = compute_metrics(&seed_catalog(), today(), &mut StdRng::seed_from_u64(42)).unwrap();
        let b = compute_metrics(&seed_catalog(), today(), &mut StdRng::seed_from_u64(42)).unwrap();

        assert_eq!(a, b);
    }

    #[test]
    fn reference_catalog_kpis() {
        let metrics = compute_metrics(&seed_catalog(), today(), &mut StdRng::seed_from_u64(3)).unwrap();

        assert_eq!(metrics.revenue, Decimal::new(68702015, 2));
        assert_eq!(metrics.aov, Decimal::new(5982, 2));
        assert_eq!(metrics.conversion_rate, Decimal::new(547, 2));
        assert_eq!(metrics.category_breakdown["Electronics"], Decimal::new(36044263, 2));
        assert_eq!(
            metrics.category_breakdown.values().copied().sum::<Decimal>(),
            metrics.revenue
        );
    }

    #[test]
    fn override_survives_unrelated_recompute() {
        let today = today();
        let mut rng = StdRng::seed_from_u64(5);
        let mut products = seed_catalog();
        let derived = compute_metrics(&products, today, &mut rng).unwrap();

        let mut overrides = MetricOverrides::default();
        overrides.pin_scalar(MetricField::Revenue, &derived, Decimal::from(1));

        // stock does not feed revenue
        products[0].apply(&crate::product::ProductPatch::new().set_stock(1));
        let derived = compute_metrics(&products, today, &mut rng).unwrap();

        assert_eq!(overrides.reconcile(&derived), 0);
        assert_eq!(overrides.overlay(&derived).revenue, Decimal::from(1));
    }

    #[test]
    fn override_yields_to_changed_derivation() {
        let today = today();
        let mut rng = StdRng::seed_from_u64(5);
        let mut products = seed_catalog();
        let derived = compute_metrics(&products, today, &mut rng).unwrap();

        let mut overrides = MetricOverrides::default();
        overrides.pin_scalar(MetricField::Revenue, &derived, Decimal::from(1));
        assert!(overrides.pin_category("Electronics", &derived, Decimal::from(2)));
        assert!(overrides.pin_history_point(today, &derived, Decimal::from(3)));

        products[0].apply(&crate::product::ProductPatch::new().set_sales(0));
        let derived = compute_metrics(&products, today, &mut rng).unwrap();

        assert_eq!(overrides.reconcile(&derived), 3);
        assert!(overrides.is_empty());
        assert_eq!(overrides.overlay(&derived), derived);
    }

    #[test]
    fn unknown_points_are_not_pinned() {
        let derived = compute_metrics(&seed_catalog(), today(), &mut StdRng::seed_from_u64(5)).unwrap();
        let mut overrides = MetricOverrides::default();

        assert!(!overrides.pin_category("Furniture", &derived, Decimal::ONE));
        assert!(!overrides.pin_history_point(
            NaiveDate::from_ymd_opt(2023, 1, 1).unwrap(),
            &derived,
            Decimal::ONE
        ));
        assert!(overrides.is_empty());
    }
}

//! Audit trail: field-level change records and the sealed log that holds them
use super::metrics::{DerivedMetrics, MetricField};
use super::product::{FieldValue, Product, ProductField};
use super::utils::new_audit_id;
use chrono::{DateTime, TimeZone, Utc};
use std::fmt;

#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Clone)]
pub struct TimeStamp<T: TimeZone>(DateTime<T>);

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditAction {
    #[n(0)]
    Update,
}

/// One recorded field change. Entries are only created by a successful
/// confirm and expose no way to change them afterwards.
#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq, Eq)]
pub struct AuditLogEntry {
    #[n(0)]
    id: String, // uuid7, creation-time ordered
    #[n(1)]
    timestamp: TimeStamp<Utc>,
    #[n(2)]
    actor: String,
    #[n(3)]
    action: AuditAction,
    #[n(4)]
    field: String, // "<entity label> - <field label>"
    #[n(5)]
    old_value: FieldValue,
    #[n(6)]
    new_value: FieldValue,
    #[n(7)]
    reason: Option<String>,
}

/// An entity whose attributes can be compared field by field.
///
/// `FIELDS` is the declared diffable surface, in the order entries are emitted.
/// Identity attributes are never part of it.
pub trait Auditable {
    type Field: Copy + 'static;
    const FIELDS: &'static [Self::Field];

    fn audit_label(&self) -> String;
    fn field_label(field: Self::Field) -> &'static str;
    fn audit_value(&self, field: Self::Field) -> FieldValue;
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct SealedEntry {
    entry: AuditLogEntry,
    digest: String, // sha256 of the entry's cbor encoding
}

/// Append-only, newest-first audit log.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuditLog {
    entries: Vec<SealedEntry>,
}

impl TimeStamp<Utc> {
    pub fn new() -> Self {
        Self(Utc::now())
    }
    pub fn to_datetime_utc(&self) -> DateTime<Utc> {
        self.0
    }
}

impl Default for TimeStamp<Utc> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: TimeZone> From<DateTime<T>> for TimeStamp<T> {
    fn from(value: DateTime<T>) -> Self {
        TimeStamp(value)
    }
}

impl<C> minicbor::Encode<C> for TimeStamp<Utc> {
    fn encode<W: minicbor::encode::Write>(
        &self,
        e: &mut minicbor::Encoder<W>,
        _: &mut C,
    ) -> Result<(), minicbor::encode::Error<W::Error>> {
        if let Some(nsec) = self.0.timestamp_nanos_opt() {
            return e.i64(nsec)?.ok();
        }

        Err(minicbor::encode::Error::message(
            "failed to encode timestamp. timestamp_nanos_opt returned None",
        ))
    }
}

impl<'b, C> minicbor::Decode<'b, C> for TimeStamp<Utc> {
    fn decode(d: &mut minicbor::Decoder<'b>, _: &mut C) -> Result<Self, minicbor::decode::Error> {
        let nsecs = d.i64()?;

        Ok(TimeStamp(DateTime::from_timestamp_nanos(nsecs)))
    }
}

impl fmt::Display for AuditAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuditAction::Update => f.write_str("UPDATE"),
        }
    }
}

impl AuditLogEntry {
    pub(crate) fn new(
        actor: &str,
        action: AuditAction,
        field: String,
        old_value: FieldValue,
        new_value: FieldValue,
        reason: Option<&str>,
    ) -> Self {
        Self {
            id: new_audit_id(),
            timestamp: TimeStamp::new(),
            actor: actor.to_string(),
            action,
            field,
            old_value,
            new_value,
            reason: reason.map(str::to_string),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }
    pub fn timestamp(&self) -> &TimeStamp<Utc> {
        &self.timestamp
    }
    pub fn actor(&self) -> &str {
        &self.actor
    }
    pub fn action(&self) -> AuditAction {
        self.action
    }
    pub fn field(&self) -> &str {
        &self.field
    }
    pub fn old_value(&self) -> &FieldValue {
        &self.old_value
    }
    pub fn new_value(&self) -> &FieldValue {
        &self.new_value
    }
    pub fn reason(&self) -> Option<&str> {
        self.reason.as_deref()
    }

    /// Encodes the entry to CBOR and returns `(sha256 hex digest, cbor bytes)`.
    pub fn seal(&self) -> anyhow::Result<(String, Vec<u8>)> {
        let cbor = minicbor::to_vec(self)?;
        let hash = sha256::digest(&cbor);

        Ok((hash, cbor))
    }
}

impl Auditable for Product {
    type Field = ProductField;
    const FIELDS: &'static [ProductField] = &ProductField::ALL;

    fn audit_label(&self) -> String {
        self.name().to_string()
    }
    fn field_label(field: ProductField) -> &'static str {
        field.label()
    }
    fn audit_value(&self, field: ProductField) -> FieldValue {
        self.value_of(field)
    }
}

// only the scalar KPIs; the time series and breakdown are never diffed
impl Auditable for DerivedMetrics {
    type Field = MetricField;
    const FIELDS: &'static [MetricField] = &MetricField::ALL;

    fn audit_label(&self) -> String {
        "Metrics".to_string()
    }
    fn field_label(field: MetricField) -> &'static str {
        field.label()
    }
    fn audit_value(&self, field: MetricField) -> FieldValue {
        FieldValue::Decimal(self.scalar(field))
    }
}

/// Compares two snapshots of the same entity and emits one `Update` entry per
/// declared field that differs.
pub fn diff_entities<T: Auditable>(
    working: &T,
    confirmed: &T,
    actor: &str,
    reason: Option<&str>,
) -> Vec<AuditLogEntry> {
    diff_fields(working, confirmed, T::FIELDS, actor, reason)
}

/// Like [`diff_entities`], restricted to `fields` (emitted in the given order).
pub fn diff_fields<T: Auditable>(
    working: &T,
    confirmed: &T,
    fields: &[T::Field],
    actor: &str,
    reason: Option<&str>,
) -> Vec<AuditLogEntry> {
    let label = working.audit_label();

    fields
        .iter()
        .filter_map(|field| {
            let old_value = confirmed.audit_value(*field);
            let new_value = working.audit_value(*field);
            (old_value != new_value).then(|| {
                AuditLogEntry::new(
                    actor,
                    AuditAction::Update,
                    format!("{label} - {}", T::field_label(*field)),
                    old_value,
                    new_value,
                    reason,
                )
            })
        })
        .collect()
}

impl AuditLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seals every entry of `block` and puts the block in front of the log,
    /// keeping the block's own order. Nothing is added if any entry fails to seal.
    pub fn prepend(&mut self, block: Vec<AuditLogEntry>) -> anyhow::Result<usize> {
        let sealed = block
            .into_iter()
            .map(|entry| {
                let (digest, _) = entry.seal()?;
                Ok(SealedEntry { entry, digest })
            })
            .collect::<anyhow::Result<Vec<_>>>()?;

        let count = sealed.len();
        self.entries.splice(0..0, sealed);
        Ok(count)
    }

    /// Entries, newest first.
    pub fn entries(&self) -> impl Iterator<Item = &AuditLogEntry> + '_ {
        self.entries.iter().map(|sealed| &sealed.entry)
    }
    pub fn get(&self, index: usize) -> Option<&AuditLogEntry> {
        self.entries.get(index).map(|sealed| &sealed.entry)
    }
    pub fn latest(&self) -> Option<&AuditLogEntry> {
        self.get(0)
    }
    pub fn digest(&self, index: usize) -> Option<&str> {
        self.entries.get(index).map(|sealed| sealed.digest.as_str())
    }
    pub fn len(&self) -> usize {
        self.entries.len()
    }
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
    pub fn to_vec(&self) -> Vec<AuditLogEntry> {
        self.entries().cloned().collect()
    }

    /// Re-seals every entry and checks it against the digest recorded on append.
    pub fn verify(&self) -> bool {
        self.entries.iter().all(|sealed| {
            sealed
                .entry
                .seal()
                .map(|(digest, _)| digest == sealed.digest)
                .unwrap_or(false)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    fn headphones() -> Product {
        Product::new("1")
            .set_sku("PRD-001")
            .set_name("Premium Headphones")
            .set_category("Electronics")
            .set_price(Decimal::new(29999, 2))
            .set_stock(150)
            .set_sales(342)
            .set_conversion_rate(Decimal::new(42, 1))
    }

    #[test]
    fn timestamp_encoding() {
        let original = TimeStamp::new();

        let encoding = minicbor::to_vec(original.clone()).unwrap();
        let decode: TimeStamp<Utc> = minicbor::decode(&encoding).unwrap();

        assert_eq!(original, decode);
    }

    #[test]
    fn identical_snapshots_produce_no_entries() {
        let product = headphones();
        assert!(diff_entities(&product, &product.clone(), "a@b", Some("x")).is_empty());
    }

    #[test]
    fn changed_fields_follow_declared_order() {
        let confirmed = headphones();
        let working = headphones()
            .set_conversion_rate(Decimal::new(50, 1))
            .set_sku("PRD-100")
            .set_price(Decimal::new(19999, 2));

        let entries = diff_entities(&working, &confirmed, "admin@dashboard.com", Some("promo"));
        let fields: Vec<_> = entries.iter().map(|e| e.field()).collect();

        assert_eq!(
            fields,
            vec![
                "Premium Headphones - sku",
                "Premium Headphones - price",
                "Premium Headphones - conversionRate"
            ]
        );
        assert_eq!(entries[1].old_value(), &FieldValue::Decimal(Decimal::new(29999, 2)));
        assert_eq!(entries[1].new_value(), &FieldValue::Decimal(Decimal::new(19999, 2)));
        assert!(entries.iter().all(|e| e.action() == AuditAction::Update));
        assert!(entries.iter().all(|e| e.reason() == Some("promo")));
        assert!(entries.iter().all(|e| e.actor() == "admin@dashboard.com"));
    }

    #[test]
    fn restricted_metric_diff() {
        let confirmed = DerivedMetrics::default();
        let working = DerivedMetrics {
            revenue: Decimal::from(5),
            aov: Decimal::from(6),
            ..DerivedMetrics::default()
        };

        let entries = diff_fields(&working, &confirmed, &[MetricField::Aov], "a", None);

        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].field(), "Metrics - aov");
        assert_eq!(entries[0].reason(), None);
    }

    #[test]
    fn blocks_are_prepended_in_order() {
        let confirmed = headphones();
        let mut log = AuditLog::new();

        let first = diff_entities(&headphones().set_stock(1), &confirmed, "a", Some("one"));
        let second = diff_entities(
            &headphones().set_stock(2).set_sales(3),
            &confirmed,
            "a",
            Some("two"),
        );

        assert_eq!(log.prepend(first).unwrap(), 1);
        assert_eq!(log.prepend(second).unwrap(), 2);

        let reasons: Vec<_> = log.entries().map(|e| e.reason().unwrap()).collect();
        assert_eq!(reasons, vec!["two", "two", "one"]);
        assert_eq!(log.get(0).unwrap().field(), "Premium Headphones - stock");
        assert_eq!(log.get(1).unwrap().field(), "Premium Headphones - sales");
        assert!(log.verify());
    }

    #[test]
    fn tampering_is_detected() {
        let mut log = AuditLog::new();
        log.prepend(diff_entities(
            &headphones().set_stock(9),
            &headphones(),
            "a",
            Some("r"),
        ))
        .unwrap();

        log.entries[0].entry.new_value = FieldValue::Count(10);

        assert!(!log.verify());
    }

    #[test]
    fn entry_cbor_roundtrip() {
        let entry = diff_entities(&headphones().set_name("Studio"), &headphones(), "a", Some("r"))
            .remove(0);

        let (digest, cbor) = entry.seal().unwrap();
        let decoded: AuditLogEntry = minicbor::decode(&cbor).unwrap();

        assert_eq!(entry, decoded);
        assert_eq!(decoded.seal().unwrap().0, digest);
        assert_eq!(entry.field(), "Studio - name");
    }
}

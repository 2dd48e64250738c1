//! Product catalog records and staged field edits
use super::error::ValidationError;
use rust_decimal::Decimal;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ProductId(String);

impl ProductId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProductId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ProductId {
    fn from(value: &str) -> Self {
        ProductId::new(value)
    }
}

// The id is fixed at construction; every other attribute is editable through a ProductPatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Product {
    id: ProductId,
    sku: String,
    name: String,
    category: String,
    price: Decimal,
    stock: u64,
    sales: u64,
    conversion_rate: Decimal, // percentage
}

/// The editable attributes of a [`Product`], in the order they are audited.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ProductField {
    Sku,
    Name,
    Category,
    Price,
    Stock,
    Sales,
    ConversionRate,
}

/// Typed value of a single attribute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    Text(String),
    Decimal(Decimal),
    Count(u64),
}

/// A batch of field updates applied to one product in a single step.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProductPatch {
    sku: Option<String>,
    name: Option<String>,
    category: Option<String>,
    price: Option<Decimal>,
    stock: Option<u64>,
    sales: Option<u64>,
    conversion_rate: Option<Decimal>,
}

impl Product {
    pub fn new(id: impl Into<ProductId>) -> Self {
        Self {
            id: id.into(),
            sku: String::new(),
            name: String::new(),
            category: String::new(),
            price: Decimal::ZERO,
            stock: 0,
            sales: 0,
            conversion_rate: Decimal::ZERO,
        }
    }
    pub fn set_sku(mut self, sku: impl Into<String>) -> Self {
        self.sku = sku.into();
        self
    }
    pub fn set_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }
    pub fn set_category(mut self, category: impl Into<String>) -> Self {
        self.category = category.into();
        self
    }
    pub fn set_price(mut self, price: Decimal) -> Self {
        self.price = price;
        self
    }
    pub fn set_stock(mut self, stock: u64) -> Self {
        self.stock = stock;
        self
    }
    pub fn set_sales(mut self, sales: u64) -> Self {
        self.sales = sales;
        self
    }
    pub fn set_conversion_rate(mut self, rate: Decimal) -> Self {
        self.conversion_rate = rate;
        self
    }

    pub fn id(&self) -> &ProductId {
        &self.id
    }
    pub fn sku(&self) -> &str {
        &self.sku
    }
    pub fn name(&self) -> &str {
        &self.name
    }
    pub fn category(&self) -> &str {
        &self.category
    }
    pub fn price(&self) -> Decimal {
        self.price
    }
    pub fn stock(&self) -> u64 {
        self.stock
    }
    pub fn sales(&self) -> u64 {
        self.sales
    }
    pub fn conversion_rate(&self) -> Decimal {
        self.conversion_rate
    }
    /// price × units sold, `None` when the product overflows the decimal range
    pub fn revenue(&self) -> Option<Decimal> {
        self.price.checked_mul(Decimal::from(self.sales))
    }

    pub fn value_of(&self, field: ProductField) -> FieldValue {
        match field {
            ProductField::Sku => FieldValue::Text(self.sku.clone()),
            ProductField::Name => FieldValue::Text(self.name.clone()),
            ProductField::Category => FieldValue::Text(self.category.clone()),
            ProductField::Price => FieldValue::Decimal(self.price),
            ProductField::Stock => FieldValue::Count(self.stock),
            ProductField::Sales => FieldValue::Count(self.sales),
            ProductField::ConversionRate => FieldValue::Decimal(self.conversion_rate),
        }
    }

    pub(crate) fn apply(&mut self, patch: &ProductPatch) {
        if let Some(sku) = &patch.sku {
            self.sku = sku.clone();
        }
        if let Some(name) = &patch.name {
            self.name = name.clone();
        }
        if let Some(category) = &patch.category {
            self.category = category.clone();
        }
        if let Some(price) = patch.price {
            self.price = price;
        }
        if let Some(stock) = patch.stock {
            self.stock = stock;
        }
        if let Some(sales) = patch.sales {
            self.sales = sales;
        }
        if let Some(rate) = patch.conversion_rate {
            self.conversion_rate = rate;
        }
    }
}

impl ProductField {
    pub const ALL: [ProductField; 7] = [
        ProductField::Sku,
        ProductField::Name,
        ProductField::Category,
        ProductField::Price,
        ProductField::Stock,
        ProductField::Sales,
        ProductField::ConversionRate,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            ProductField::Sku => "sku",
            ProductField::Name => "name",
            ProductField::Category => "category",
            ProductField::Price => "price",
            ProductField::Stock => "stock",
            ProductField::Sales => "sales",
            ProductField::ConversionRate => "conversionRate",
        }
    }
    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            ProductField::Price
                | ProductField::Stock
                | ProductField::Sales
                | ProductField::ConversionRate
        )
    }
}

impl FromStr for ProductField {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ProductField::ALL
            .into_iter()
            .find(|field| field.label() == s.trim())
            .ok_or_else(|| ValidationError::UnknownField(s.to_string()))
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Text(text) => f.write_str(text),
            FieldValue::Decimal(value) => write!(f, "{value}"),
            FieldValue::Count(count) => write!(f, "{count}"),
        }
    }
}

// tagged two-element array: [0, text] | [1, decimal as string] | [2, count]
impl<C> minicbor::Encode<C> for FieldValue {
    fn encode<W: minicbor::encode::Write>(
        &self,
        e: &mut minicbor::Encoder<W>,
        _: &mut C,
    ) -> Result<(), minicbor::encode::Error<W::Error>> {
        e.array(2)?;
        match self {
            FieldValue::Text(text) => e.u8(0)?.str(text)?.ok(),
            FieldValue::Decimal(value) => e.u8(1)?.str(&value.to_string())?.ok(),
            FieldValue::Count(count) => e.u8(2)?.u64(*count)?.ok(),
        }
    }
}

impl<'b, C> minicbor::Decode<'b, C> for FieldValue {
    fn decode(d: &mut minicbor::Decoder<'b>, _: &mut C) -> Result<Self, minicbor::decode::Error> {
        if d.array()? != Some(2) {
            return Err(minicbor::decode::Error::message(
                "field value must be a two element array",
            ));
        }
        match d.u8()? {
            0 => Ok(FieldValue::Text(d.str()?.to_owned())),
            1 => Decimal::from_str(d.str()?)
                .map(FieldValue::Decimal)
                .map_err(|_| minicbor::decode::Error::message("malformed decimal field value")),
            2 => Ok(FieldValue::Count(d.u64()?)),
            _ => Err(minicbor::decode::Error::message("unknown field value tag")),
        }
    }
}

impl ProductPatch {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn set_sku(mut self, sku: impl Into<String>) -> Self {
        self.sku = Some(sku.into());
        self
    }
    pub fn set_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
    pub fn set_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }
    pub fn set_price(mut self, price: Decimal) -> Self {
        self.price = Some(price);
        self
    }
    pub fn set_stock(mut self, stock: u64) -> Self {
        self.stock = Some(stock);
        self
    }
    pub fn set_sales(mut self, sales: u64) -> Self {
        self.sales = Some(sales);
        self
    }
    pub fn set_conversion_rate(mut self, rate: Decimal) -> Self {
        self.conversion_rate = Some(rate);
        self
    }
    /// Sets a field from raw editor input. Numeric fields are trimmed and parsed
    /// here, so a malformed number is rejected before anything is staged; text
    /// fields take the input verbatim.
    pub fn set_raw(self, field: ProductField, raw: &str) -> Result<Self, ValidationError> {
        let malformed = || ValidationError::MalformedNumber {
            field: field.label().to_string(),
            value: raw.to_string(),
        };
        let input = if field.is_numeric() { raw.trim() } else { raw };

        let patch = match field {
            ProductField::Sku => self.set_sku(input),
            ProductField::Name => self.set_name(input),
            ProductField::Category => self.set_category(input),
            ProductField::Price => {
                self.set_price(Decimal::from_str(input).map_err(|_| malformed())?)
            }
            ProductField::Stock => self.set_stock(input.parse().map_err(|_| malformed())?),
            ProductField::Sales => self.set_sales(input.parse().map_err(|_| malformed())?),
            ProductField::ConversionRate => {
                self.set_conversion_rate(Decimal::from_str(input).map_err(|_| malformed())?)
            }
        };
        Ok(patch)
    }
    pub fn is_empty(&self) -> bool {
        *self == ProductPatch::default()
    }
    /// Fields this patch touches, in audit order.
    pub fn fields(&self) -> Vec<ProductField> {
        ProductField::ALL
            .into_iter()
            .filter(|field| match field {
                ProductField::Sku => self.sku.is_some(),
                ProductField::Name => self.name.is_some(),
                ProductField::Category => self.category.is_some(),
                ProductField::Price => self.price.is_some(),
                ProductField::Stock => self.stock.is_some(),
                ProductField::Sales => self.sales.is_some(),
                ProductField::ConversionRate => self.conversion_rate.is_some(),
            })
            .collect()
    }
}

fn seed(
    id: &str,
    name: &str,
    category: &str,
    price_cents: i64,
    stock: u64,
    sales: u64,
    rate_tenths: i64,
) -> Product {
    Product::new(id)
        .set_sku(format!("PRD-{:0>3}", id))
        .set_name(name)
        .set_category(category)
        .set_price(Decimal::new(price_cents, 2))
        .set_stock(stock)
        .set_sales(sales)
        .set_conversion_rate(Decimal::new(rate_tenths, 1))
}

/// The ten-record reference catalog a dashboard session starts from.
pub fn seed_catalog() -> Vec<Product> {
    vec![
        seed("1", "Premium Headphones", "Electronics", 29999, 150, 342, 42),
        seed("2", "Wireless Mouse", "Electronics", 4999, 450, 1205, 58),
        seed("3", "Mechanical Keyboard", "Electronics", 15999, 200, 523, 39),
        seed("4", "USB-C Hub", "Accessories", 7999, 320, 892, 61),
        seed("5", "Laptop Stand", "Accessories", 8999, 180, 445, 45),
        seed("6", "Webcam HD", "Electronics", 12999, 95, 278, 32),
        seed("7", "Phone Case", "Accessories", 2499, 800, 2156, 73),
        seed("8", "Screen Protector", "Accessories", 1499, 1200, 3421, 81),
        seed("9", "Bluetooth Speaker", "Electronics", 19999, 125, 389, 47),
        seed("10", "Power Bank", "Accessories", 5999, 550, 1834, 69),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seed_catalog_has_ten_unique_products() {
        let catalog = seed_catalog();
        let mut ids: Vec<_> = catalog.iter().map(|p| p.id().clone()).collect();
        ids.sort();
        ids.dedup();

        assert_eq!(catalog.len(), 10);
        assert_eq!(ids.len(), 10);
        assert_eq!(catalog[0].sku(), "PRD-001");
        assert_eq!(catalog[9].sku(), "PRD-010");
        assert_eq!(catalog[0].price(), Decimal::new(29999, 2));
    }

    #[test]
    fn raw_numeric_input_is_parsed() {
        let patch = ProductPatch::new()
            .set_raw(ProductField::Price, " 12.50 ")
            .unwrap()
            .set_raw(ProductField::Stock, "7")
            .unwrap();

        let mut product = Product::new("x");
        product.apply(&patch);

        assert_eq!(product.price(), Decimal::new(1250, 2));
        assert_eq!(product.stock(), 7);
        assert_eq!(patch.fields(), vec![ProductField::Price, ProductField::Stock]);
    }

    #[test]
    fn malformed_numbers_are_rejected() {
        for (field, raw) in [
            (ProductField::Price, "abc"),
            (ProductField::Stock, "-3"),
            (ProductField::Sales, "1.5"),
            (ProductField::ConversionRate, ""),
        ] {
            let err = ProductPatch::new().set_raw(field, raw).unwrap_err();
            assert!(matches!(err, ValidationError::MalformedNumber { .. }));
        }
    }

    #[test]
    fn text_fields_accept_anything() {
        let patch = ProductPatch::new().set_raw(ProductField::Name, "").unwrap();
        assert!(!patch.is_empty());
    }

    #[test]
    fn only_numeric_input_is_trimmed() {
        let patch = ProductPatch::new()
            .set_raw(ProductField::Name, "  Desk Lamp ")
            .unwrap()
            .set_raw(ProductField::Sales, " 12\n")
            .unwrap();

        let mut product = Product::new("x");
        product.apply(&patch);

        assert_eq!(product.name(), "  Desk Lamp ");
        assert_eq!(product.sales(), 12);
    }

    #[test]
    fn revenue_reports_overflow() {
        let product = Product::new("x").set_price(Decimal::MAX).set_sales(2);
        assert_eq!(product.revenue(), None);
        assert_eq!(
            Product::new("y").set_price(Decimal::new(250, 2)).set_sales(4).revenue(),
            Some(Decimal::from(10))
        );
    }

    #[test]
    fn field_labels_round_trip() {
        for field in ProductField::ALL {
            assert_eq!(field.label().parse::<ProductField>().unwrap(), field);
        }
        assert!("id".parse::<ProductField>().is_err());
    }

    #[test]
    fn field_value_cbor_roundtrip() {
        let value = FieldValue::Decimal(Decimal::new(29999, 2));

        let encoded = minicbor::to_vec(&value).unwrap();
        let decoded: FieldValue = minicbor::decode(&encoded).unwrap();

        assert_eq!(value, decoded);
    }
}

//! Per-size quantity, price and discount of one product, and how they are pushed back to the
//! size-quantity endpoints.

use std::{fmt, str::FromStr, sync::Arc};

use models::{
    size::{Size, SizeId},
    size_quantity::{SizeQuantity, SizeQuantityId, UpsertSizeQuantity},
};
use strum_macros::{Display, EnumString};
use thiserror::Error;
use tracing::{debug, info, warn};

use super::admin_api::{ApiError, SizeQuantityApi};

const KEY_SEPARATOR: &str = "==";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumString, Display)]
#[strum(serialize_all = "lowercase")]
pub enum PricingField {
    Quantity,
    Price,
    Discount,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PricingKeyError {
    #[error("expected 3 or 4 `==` separated parts in {0:?}")]
    Shape(String),
    #[error("unknown field in {0:?}")]
    Field(String),
    #[error("bad id in {0:?}")]
    Id(String),
}

/// Address of one grid input: `field==sizeId==sizeLabel[==rowId]`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PricingKey {
    pub field: PricingField,
    pub size_id: SizeId,
    pub size_label: String,
    pub row_id: Option<SizeQuantityId>,
}

impl fmt::Display for PricingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{KEY_SEPARATOR}{}{KEY_SEPARATOR}{}",
            self.field, self.size_id, self.size_label
        )?;
        if let Some(row_id) = self.row_id {
            write!(f, "{KEY_SEPARATOR}{row_id}")?;
        }
        Ok(())
    }
}

impl FromStr for PricingKey {
    type Err = PricingKeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split(KEY_SEPARATOR).collect();
        let (field, size_id, size_label, row_id) = match parts.as_slice() {
            [field, size_id, label] => (field, size_id, label, None),
            [field, size_id, label, row_id] => (field, size_id, label, Some(row_id)),
            _ => return Err(PricingKeyError::Shape(s.to_string())),
        };

        Ok(Self {
            field: PricingField::from_str(field)
                .map_err(|_| PricingKeyError::Field(s.to_string()))?,
            size_id: size_id
                .parse::<SizeId>()
                .map_err(|_| PricingKeyError::Id(s.to_string()))?,
            size_label: size_label.to_string(),
            row_id: row_id
                .map(|id| id.parse::<SizeQuantityId>())
                .transpose()
                .map_err(|_| PricingKeyError::Id(s.to_string()))?,
        })
    }
}

/// How the product form was opened
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PricingMode {
    Create,
    /// A new variant of an existing main product
    NewVariant,
    Edit { original_size_type: String },
}

/// Which calls a save turns into
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "snake_case")]
pub enum SaveStrategy {
    PostAll,
    PatchExisting,
    ReplaceAll,
}

/// Call a size-quantity failure happened in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "lowercase")]
pub enum SaveStep {
    Load,
    Create,
    Update,
    Delete,
    Recreate,
}

#[derive(Debug, Error)]
pub enum PricingError {
    #[error("invalid pricing key: {0}")]
    Key(#[from] PricingKeyError),
    #[error("size {0} is not part of the selected size type")]
    UnknownSize(SizeId),
    #[error("price and discount follow the most expensive size while dynamic pricing is on")]
    DerivedPrice,
    #[error("per-size price and discount need dynamic pricing")]
    DynamicPricingOff,
    #[error("no size type selected")]
    NoSizeType,
    #[error("quantity missing for {}", .0.join(", "))]
    MissingQuantities(Vec<String>),
    #[error("{field} of size {size:?} is not a number: {value:?}")]
    InvalidNumber {
        field: PricingField,
        size: String,
        value: String,
    },
    #[error("{step} failed: {source}")]
    Api {
        step: SaveStep,
        #[source]
        source: ApiError,
    },
}

impl PricingError {
    /// Toast text
    pub fn user_message(&self) -> String {
        match self {
            Self::Api { source, .. } => source.user_message(),
            other => other.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SizeRow {
    pub size_id: SizeId,
    pub size_label: String,
    pub row_id: Option<SizeQuantityId>,
    pub quantity: String,
    pub price: String,
    pub discount: String,
}

impl SizeRow {
    fn blank(size: &Size) -> Self {
        Self {
            size_id: size.id,
            size_label: size.size.clone(),
            row_id: None,
            quantity: String::new(),
            price: zero(),
            discount: zero(),
        }
    }

    fn slot(&mut self, field: PricingField) -> &mut String {
        match field {
            PricingField::Quantity => &mut self.quantity,
            PricingField::Price => &mut self.price,
            PricingField::Discount => &mut self.discount,
        }
    }

    fn get(&self, field: PricingField) -> &str {
        match field {
            PricingField::Quantity => &self.quantity,
            PricingField::Price => &self.price,
            PricingField::Discount => &self.discount,
        }
    }
}

/// Price and discount shown on the product
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProductPrice {
    pub price: f64,
    pub discount: f64,
}

/// Grid state for one product visit
#[derive(Debug, Clone, PartialEq)]
pub struct VariantPricingGrid {
    custom_product_id: String,
    mode: PricingMode,
    size_type: Option<String>,
    rows: Vec<SizeRow>,
    persisted: Vec<SizeQuantity>,
    dynamic_pricing: bool,
    price: String,
    discount: String,
}

impl VariantPricingGrid {
    pub fn new(custom_product_id: impl Into<String>, mode: PricingMode) -> Self {
        Self {
            custom_product_id: custom_product_id.into(),
            mode,
            size_type: None,
            rows: Vec::new(),
            persisted: Vec::new(),
            dynamic_pricing: false,
            price: zero(),
            discount: zero(),
        }
    }

    /// Rebuild the grid of an existing product from its persisted rows.
    pub fn from_persisted(
        custom_product_id: impl Into<String>,
        size_type: &str,
        sizes: &[Size],
        persisted: Vec<SizeQuantity>,
        dynamic_pricing: bool,
    ) -> Self {
        let mut grid = Self::new(
            custom_product_id,
            PricingMode::Edit {
                original_size_type: size_type.to_string(),
            },
        );
        grid.persisted = persisted;
        grid.dynamic_pricing = dynamic_pricing;
        grid.select_size_type(size_type, sizes);
        grid
    }

    pub fn custom_product_id(&self) -> &str {
        &self.custom_product_id
    }

    pub fn mode(&self) -> &PricingMode {
        &self.mode
    }

    pub fn size_type(&self) -> Option<&str> {
        self.size_type.as_deref()
    }

    pub fn rows(&self) -> &[SizeRow] {
        &self.rows
    }

    pub fn dynamic_pricing(&self) -> bool {
        self.dynamic_pricing
    }

    /// Show one row per size of `name`. Rows already persisted for the product come back with
    /// their ids and values.
    pub fn select_size_type(&mut self, name: &str, sizes: &[Size]) {
        self.rows = sizes
            .iter()
            .filter(|size| size.name == name)
            .map(|size| {
                let mut row = SizeRow::blank(size);
                if let Some(saved) = self.persisted.iter().find(|q| q.size_id == size.id) {
                    row.row_id = Some(saved.id);
                    row.quantity = saved.quantity.to_string();
                    if self.dynamic_pricing {
                        row.price = saved.price.to_string();
                        row.discount = saved.discount.to_string();
                    }
                }
                row
            })
            .collect();
        self.size_type = Some(name.to_string());
        debug!(size_type = %name, rows = self.rows.len(), "Size type selected");
    }

    /// Turning dynamic pricing off zeroes the per-size price and discount. Turning it on brings
    /// back the saved values of persisted rows.
    pub fn set_dynamic_pricing(&mut self, enabled: bool) {
        if enabled == self.dynamic_pricing {
            return;
        }
        self.dynamic_pricing = enabled;
        for row in &mut self.rows {
            let saved = self
                .persisted
                .iter()
                .find(|q| enabled && q.size_id == row.size_id);
            match saved {
                Some(saved) => {
                    row.price = saved.price.to_string();
                    row.discount = saved.discount.to_string();
                }
                None => {
                    row.price = zero();
                    row.discount = zero();
                }
            }
        }
    }

    pub fn key(&self, row: usize, field: PricingField) -> Option<PricingKey> {
        self.rows.get(row).map(|r| PricingKey {
            field,
            size_id: r.size_id,
            size_label: r.size_label.clone(),
            row_id: r.row_id,
        })
    }

    pub fn get(&self, key: &PricingKey) -> Option<&str> {
        self.rows
            .iter()
            .find(|r| r.size_id == key.size_id)
            .map(|r| r.get(key.field))
    }

    pub fn set(&mut self, key: &PricingKey, value: impl Into<String>) -> Result<(), PricingError> {
        if key.field != PricingField::Quantity && !self.dynamic_pricing {
            return Err(PricingError::DynamicPricingOff);
        }
        let row = self
            .rows
            .iter_mut()
            .find(|r| r.size_id == key.size_id)
            .ok_or(PricingError::UnknownSize(key.size_id))?;
        *row.slot(key.field) = value.into();
        Ok(())
    }

    /// Parse and apply a composite key as used by form inputs
    pub fn set_raw(&mut self, key: &str, value: impl Into<String>) -> Result<(), PricingError> {
        let key = key.parse::<PricingKey>()?;
        self.set(&key, value)
    }

    pub fn set_product_price(&mut self, value: impl Into<String>) -> Result<(), PricingError> {
        if self.dynamic_pricing {
            return Err(PricingError::DerivedPrice);
        }
        self.price = value.into();
        Ok(())
    }

    pub fn set_product_discount(&mut self, value: impl Into<String>) -> Result<(), PricingError> {
        if self.dynamic_pricing {
            return Err(PricingError::DerivedPrice);
        }
        self.discount = value.into();
        Ok(())
    }

    /// The row with the highest numeric price. On a tie the earliest row in size order wins;
    /// prices that do not parse are skipped.
    pub fn rollup(&self) -> Option<(&SizeRow, ProductPrice)> {
        let mut best: Option<(&SizeRow, ProductPrice)> = None;
        for row in &self.rows {
            let Some(price) = parse_number(&row.price) else {
                continue;
            };
            if best.is_some_and(|(_, b)| price <= b.price) {
                continue;
            }
            let discount = parse_number(&row.discount).unwrap_or(0.0);
            best = Some((row, ProductPrice { price, discount }));
        }
        best
    }

    /// What the product form displays as price and discount
    pub fn product_price(&self) -> ProductPrice {
        if self.dynamic_pricing {
            return self.rollup().map(|(_, p)| p).unwrap_or(ProductPrice {
                price: 0.0,
                discount: 0.0,
            });
        }
        ProductPrice {
            price: parse_number(&self.price).unwrap_or(0.0),
            discount: parse_number(&self.discount).unwrap_or(0.0),
        }
    }

    /// Labels of sizes still lacking a quantity
    pub fn missing_quantities(&self) -> Vec<&str> {
        self.rows
            .iter()
            .filter(|r| r.quantity.trim().is_empty())
            .map(|r| r.size_label.as_str())
            .collect()
    }

    /// Whether the save action is enabled
    pub fn can_save(&self) -> bool {
        self.size_type.is_some() && !self.rows.is_empty() && self.missing_quantities().is_empty()
    }

    pub fn strategy(&self) -> SaveStrategy {
        match &self.mode {
            PricingMode::Create | PricingMode::NewVariant => SaveStrategy::PostAll,
            PricingMode::Edit { original_size_type }
                if self.size_type.as_deref() == Some(original_size_type.as_str()) =>
            {
                SaveStrategy::PatchExisting
            }
            PricingMode::Edit { .. } => SaveStrategy::ReplaceAll,
        }
    }

    /// Rows to send, paired with their persisted id when there is one
    pub fn upserts(&self) -> Result<Vec<(Option<SizeQuantityId>, UpsertSizeQuantity)>, PricingError> {
        if self.size_type.is_none() {
            return Err(PricingError::NoSizeType);
        }
        let missing = self.missing_quantities();
        if !missing.is_empty() || self.rows.is_empty() {
            return Err(PricingError::MissingQuantities(
                missing.into_iter().map(str::to_string).collect(),
            ));
        }

        self.rows
            .iter()
            .map(|row| {
                let quantity = row.quantity.trim().parse::<u32>().map_err(|_| {
                    invalid(PricingField::Quantity, row, &row.quantity)
                })?;
                let (price, discount) = if self.dynamic_pricing {
                    (
                        parse_number(&row.price)
                            .ok_or_else(|| invalid(PricingField::Price, row, &row.price))?,
                        parse_number(&row.discount)
                            .ok_or_else(|| invalid(PricingField::Discount, row, &row.discount))?,
                    )
                } else {
                    (0.0, 0.0)
                };
                Ok((
                    row.row_id,
                    UpsertSizeQuantity {
                        quantity,
                        size_id: row.size_id,
                        custom_product_id: self.custom_product_id.clone(),
                        price,
                        discount,
                    },
                ))
            })
            .collect()
    }
}

fn zero() -> String {
    "0".to_string()
}

fn parse_number(raw: &str) -> Option<f64> {
    raw.trim().parse::<f64>().ok().filter(|n| n.is_finite())
}

fn invalid(field: PricingField, row: &SizeRow, value: &str) -> PricingError {
    PricingError::InvalidNumber {
        field,
        size: row.size_label.clone(),
        value: value.to_string(),
    }
}

/// Loads and saves product size quantities
pub struct VariantPricingService<A> {
    api: Arc<A>,
}

impl<A: SizeQuantityApi> VariantPricingService<A> {
    pub fn new(api: Arc<A>) -> Self {
        Self { api }
    }

    /// Grid for an existing product, restored from the backend
    pub async fn load(
        &self,
        custom_product_id: &str,
        size_type: &str,
        sizes: &[Size],
        dynamic_pricing: bool,
    ) -> Result<VariantPricingGrid, PricingError> {
        let persisted = self
            .api
            .list_size_quantities(custom_product_id)
            .await
            .map_err(|source| api_error(SaveStep::Load, custom_product_id, source))?;
        Ok(VariantPricingGrid::from_persisted(
            custom_product_id,
            size_type,
            sizes,
            persisted,
            dynamic_pricing,
        ))
    }

    /// Push the grid. Calls are awaited one after another and nothing is rolled back: if the
    /// post after a delete fails, the product is left without size rows until the next save.
    pub async fn save(&self, grid: &VariantPricingGrid) -> Result<SaveStrategy, PricingError> {
        let rows = grid.upserts()?;
        let strategy = grid.strategy();
        let product = grid.custom_product_id();

        match strategy {
            SaveStrategy::PostAll => {
                let body: Vec<_> = rows.into_iter().map(|(_, row)| row).collect();
                self.api
                    .create_size_quantities(&body)
                    .await
                    .map_err(|source| api_error(SaveStep::Create, product, source))?;
            }
            SaveStrategy::PatchExisting => {
                let mut fresh = Vec::new();
                for (row_id, row) in rows {
                    match row_id {
                        Some(id) => self
                            .api
                            .update_size_quantity(id, &row)
                            .await
                            .map_err(|source| api_error(SaveStep::Update, product, source))?,
                        None => fresh.push(row),
                    }
                }
                if !fresh.is_empty() {
                    self.api
                        .create_size_quantities(&fresh)
                        .await
                        .map_err(|source| api_error(SaveStep::Create, product, source))?;
                }
            }
            SaveStrategy::ReplaceAll => {
                self.api
                    .delete_size_quantities(product)
                    .await
                    .map_err(|source| api_error(SaveStep::Delete, product, source))?;
                let body: Vec<_> = rows.into_iter().map(|(_, row)| row).collect();
                self.api
                    .create_size_quantities(&body)
                    .await
                    .map_err(|source| api_error(SaveStep::Recreate, product, source))?;
            }
        }

        info!(
            custom_product_id = %product,
            strategy = %strategy,
            rows = grid.rows().len(),
            "Saved size quantities"
        );
        Ok(strategy)
    }
}

fn api_error(step: SaveStep, custom_product_id: &str, source: ApiError) -> PricingError {
    warn!(
        custom_product_id = %custom_product_id,
        step = %step,
        error = %source,
        "Saving size quantities failed"
    );
    PricingError::Api { step, source }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;

    fn size(id: SizeId, name: &str, label: &str) -> Size {
        Size {
            id,
            name: name.to_string(),
            size: label.to_string(),
            wear_type: None,
            has_size_chart: false,
            custom_size_id: None,
            is_cm: None,
        }
    }

    fn taxonomy() -> Vec<Size> {
        vec![
            size(1, "Letters", "A"),
            size(2, "Letters", "B"),
            size(3, "Letters", "C"),
            size(10, "Numbers", "30"),
            size(11, "Numbers", "32"),
        ]
    }

    fn saved(id: SizeQuantityId, size_id: SizeId, quantity: u32, price: f64) -> SizeQuantity {
        SizeQuantity {
            id,
            quantity,
            size_id,
            custom_product_id: "p-1".to_string(),
            price,
            discount: 5.0,
        }
    }

    fn filled(mode: PricingMode, dynamic: bool) -> VariantPricingGrid {
        let mut grid = VariantPricingGrid::new("p-1", mode);
        grid.set_dynamic_pricing(dynamic);
        grid.select_size_type("Letters", &taxonomy());
        for row in 0..grid.rows().len() {
            let key = grid.key(row, PricingField::Quantity).unwrap();
            grid.set(&key, "4").unwrap();
        }
        grid
    }

    #[derive(Default)]
    struct FakeQuantities {
        calls: Mutex<Vec<String>>,
        fail_create: bool,
    }

    impl FakeQuantities {
        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl SizeQuantityApi for FakeQuantities {
        async fn list_size_quantities(
            &self,
            _custom_product_id: &str,
        ) -> Result<Vec<SizeQuantity>, ApiError> {
            Ok(vec![saved(100, 1, 3, 100.0), saved(101, 2, 0, 90.0)])
        }

        async fn create_size_quantities(
            &self,
            rows: &[UpsertSizeQuantity],
        ) -> Result<(), ApiError> {
            self.calls.lock().unwrap().push(format!("post {}", rows.len()));
            if self.fail_create {
                return Err(ApiError::Http {
                    status: 500,
                    message: None,
                    body: String::new(),
                });
            }
            Ok(())
        }

        async fn update_size_quantity(
            &self,
            id: SizeQuantityId,
            _row: &UpsertSizeQuantity,
        ) -> Result<(), ApiError> {
            self.calls.lock().unwrap().push(format!("patch {id}"));
            Ok(())
        }

        async fn delete_size_quantities(&self, custom_product_id: &str) -> Result<(), ApiError> {
            self.calls
                .lock()
                .unwrap()
                .push(format!("delete {custom_product_id}"));
            Ok(())
        }
    }

    #[test]
    fn test_key_format_and_parse() {
        let key = PricingKey {
            field: PricingField::Discount,
            size_id: 12,
            size_label: "XL".to_string(),
            row_id: Some(99),
        };
        assert_eq!(key.to_string(), "discount==12==XL==99");
        assert_eq!("discount==12==XL==99".parse::<PricingKey>().unwrap(), key);

        let no_row: PricingKey = "quantity==3==M".parse().unwrap();
        assert_eq!(no_row.row_id, None);
        assert_eq!(no_row.field, PricingField::Quantity);

        assert!(matches!(
            "stock==3==M".parse::<PricingKey>(),
            Err(PricingKeyError::Field(_))
        ));
        assert!(matches!(
            "price==x==M".parse::<PricingKey>(),
            Err(PricingKeyError::Id(_))
        ));
        assert!(matches!(
            "price==3".parse::<PricingKey>(),
            Err(PricingKeyError::Shape(_))
        ));
    }

    #[test]
    fn test_rollup_takes_max_price_and_its_discount() {
        let mut grid = filled(PricingMode::Create, true);
        for (label, price, discount) in [("A", "100", "10"), ("B", "250", "25"), ("C", "80", "5")]
        {
            let id = grid.rows().iter().find(|r| r.size_label == label).unwrap().size_id;
            grid.set_raw(&format!("price=={id}=={label}"), price).unwrap();
            grid.set_raw(&format!("discount=={id}=={label}"), discount)
                .unwrap();
        }

        let (row, price) = grid.rollup().unwrap();
        assert_eq!(row.size_label, "B");
        assert_eq!(price, ProductPrice { price: 250.0, discount: 25.0 });
        assert_eq!(grid.product_price().price, 250.0);
    }

    #[test]
    fn test_rollup_tie_goes_to_first_row() {
        let mut grid = filled(PricingMode::Create, true);
        grid.set_raw("price==1==A", "120").unwrap();
        grid.set_raw("discount==1==A", "1").unwrap();
        grid.set_raw("price==2==B", "120").unwrap();
        grid.set_raw("discount==2==B", "2").unwrap();
        grid.set_raw("price==3==C", "abc").unwrap();

        let (row, price) = grid.rollup().unwrap();
        assert_eq!(row.size_label, "A");
        assert_eq!(price.discount, 1.0);
    }

    #[test]
    fn test_product_price_is_derived_under_dynamic_pricing() {
        let mut grid = filled(PricingMode::Create, false);
        grid.set_product_price("75").unwrap();
        assert_eq!(grid.product_price().price, 75.0);
        assert!(matches!(
            grid.set_raw("price==1==A", "10"),
            Err(PricingError::DynamicPricingOff)
        ));

        grid.set_dynamic_pricing(true);
        assert!(matches!(
            grid.set_product_price("80"),
            Err(PricingError::DerivedPrice)
        ));
        grid.set_raw("price==2==B", "60").unwrap();
        assert_eq!(grid.product_price().price, 60.0);

        grid.set_dynamic_pricing(false);
        assert!(grid.rows().iter().all(|r| r.price == "0" && r.discount == "0"));
    }

    #[test]
    fn test_save_needs_every_quantity() {
        let mut grid = VariantPricingGrid::new("p-1", PricingMode::Create);
        assert!(!grid.can_save());
        assert!(matches!(grid.upserts(), Err(PricingError::NoSizeType)));

        grid.select_size_type("Letters", &taxonomy());
        grid.set_raw("quantity==1==A", "2").unwrap();
        assert!(!grid.can_save());
        assert_eq!(grid.missing_quantities(), vec!["B", "C"]);

        grid.set_raw("quantity==2==B", "2").unwrap();
        grid.set_raw("quantity==3==C", "two").unwrap();
        assert!(grid.can_save());
        assert!(matches!(
            grid.upserts(),
            Err(PricingError::InvalidNumber {
                field: PricingField::Quantity,
                ..
            })
        ));
    }

    #[test]
    fn test_unknown_size_is_rejected() {
        let mut grid = filled(PricingMode::Create, false);
        assert!(matches!(
            grid.set_raw("quantity==10==30", "1"),
            Err(PricingError::UnknownSize(10))
        ));
    }

    #[test]
    fn test_strategy_by_mode() {
        assert_eq!(filled(PricingMode::Create, false).strategy(), SaveStrategy::PostAll);
        assert_eq!(
            filled(PricingMode::NewVariant, false).strategy(),
            SaveStrategy::PostAll
        );

        let mut grid = VariantPricingGrid::from_persisted(
            "p-1",
            "Letters",
            &taxonomy(),
            vec![saved(100, 1, 3, 100.0)],
            false,
        );
        assert_eq!(grid.strategy(), SaveStrategy::PatchExisting);
        grid.select_size_type("Numbers", &taxonomy());
        assert_eq!(grid.strategy(), SaveStrategy::ReplaceAll);
    }

    #[test]
    fn test_persisted_rows_restore_ids_and_values() {
        let grid = VariantPricingGrid::from_persisted(
            "p-1",
            "Letters",
            &taxonomy(),
            vec![saved(100, 1, 3, 100.0), saved(101, 2, 7, 140.0)],
            true,
        );
        let rows = grid.rows();
        assert_eq!(rows[0].row_id, Some(100));
        assert_eq!(rows[1].quantity, "7");
        assert_eq!(rows[1].price, "140");
        assert_eq!(rows[2].row_id, None);
        assert_eq!(
            grid.key(0, PricingField::Price).unwrap().to_string(),
            "price==1==A==100"
        );
        assert_eq!(grid.product_price().price, 140.0);
    }

    #[test]
    fn test_enabling_dynamic_pricing_restores_saved_prices() {
        let mut grid = VariantPricingGrid::from_persisted(
            "p-1",
            "Letters",
            &taxonomy(),
            vec![saved(100, 1, 3, 100.0)],
            false,
        );
        assert_eq!(grid.rows()[0].price, "0");

        grid.set_dynamic_pricing(true);
        assert_eq!(grid.rows()[0].price, "100");
        assert_eq!(grid.rows()[0].discount, "5");
        assert_eq!(grid.rows()[1].price, "0");

        grid.set_dynamic_pricing(false);
        assert_eq!(grid.rows()[0].price, "0");
        assert_eq!(grid.rows()[0].discount, "0");
    }

    #[tokio::test]
    async fn test_create_posts_all_rows() {
        let api = Arc::new(FakeQuantities::default());
        let service = VariantPricingService::new(api.clone());

        let strategy = service.save(&filled(PricingMode::Create, false)).await.unwrap();

        assert_eq!(strategy, SaveStrategy::PostAll);
        assert_eq!(api.calls(), vec!["post 3"]);
    }

    #[tokio::test]
    async fn test_edit_same_type_patches_by_row_id() {
        let api = Arc::new(FakeQuantities::default());
        let service = VariantPricingService::new(api.clone());
        let mut grid = service.load("p-1", "Letters", &taxonomy(), false).await.unwrap();
        grid.set_raw("quantity==3==C", "9").unwrap();

        let strategy = service.save(&grid).await.unwrap();

        assert_eq!(strategy, SaveStrategy::PatchExisting);
        assert_eq!(api.calls(), vec!["patch 100", "patch 101", "post 1"]);
    }

    #[tokio::test]
    async fn test_switching_type_deletes_then_posts() {
        let api = Arc::new(FakeQuantities::default());
        let service = VariantPricingService::new(api.clone());
        let mut grid = service.load("p-1", "Letters", &taxonomy(), false).await.unwrap();
        grid.select_size_type("Numbers", &taxonomy());
        grid.set_raw("quantity==10==30", "1").unwrap();
        grid.set_raw("quantity==11==32", "1").unwrap();

        service.save(&grid).await.unwrap();

        assert_eq!(api.calls(), vec!["delete p-1", "post 2"]);
    }

    #[tokio::test]
    async fn test_failed_recreate_is_not_rolled_back() {
        let api = Arc::new(FakeQuantities {
            fail_create: true,
            ..Default::default()
        });
        let service = VariantPricingService::new(api.clone());
        let mut grid = service.load("p-1", "Letters", &taxonomy(), false).await.unwrap();
        grid.select_size_type("Numbers", &taxonomy());
        grid.set_raw("quantity==10==30", "1").unwrap();
        grid.set_raw("quantity==11==32", "1").unwrap();

        let err = service.save(&grid).await.unwrap_err();

        assert!(matches!(
            err,
            PricingError::Api {
                step: SaveStep::Recreate,
                ..
            }
        ));
        assert_eq!(err.user_message(), "Something went wrong");
        assert_eq!(api.calls(), vec!["delete p-1", "post 2"]);
    }
}

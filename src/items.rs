//! Items

use std::{
    fmt::{self, Display, Formatter},
    num::NonZeroU32,
    str::FromStr,
};

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    customization::Customization,
    products::{self, Product, ProductError},
};

/// Identifier of a line in the cart.
///
/// Distinct from any catalog id: the same product can sit on two lines with different
/// customizations.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LineItemId(Uuid);

impl LineItemId {
    /// Generates a fresh random id.
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    /// Wraps an existing UUID.
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the underlying UUID.
    #[must_use]
    pub const fn into_uuid(self) -> Uuid {
        self.0
    }
}

impl Display for LineItemId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        Display::fmt(&self.0, f)
    }
}

impl FromStr for LineItemId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

impl From<Uuid> for LineItemId {
    fn from(value: Uuid) -> Self {
        Self::from_uuid(value)
    }
}

/// One purchasable entry in the cart.
///
/// Deserialized lines go through the same name and price checks as [`Product::new`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "LineItemRecord")]
pub struct LineItem {
    id: LineItemId,
    name: String,
    unit_price: Decimal,
    quantity: NonZeroU32,
    #[serde(skip_serializing_if = "Option::is_none")]
    image_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    customization: Option<Customization>,
}

#[derive(Deserialize)]
struct LineItemRecord {
    id: LineItemId,
    name: String,
    unit_price: Decimal,
    quantity: NonZeroU32,
    #[serde(default)]
    image_url: Option<String>,
    #[serde(default)]
    customization: Option<Customization>,
}

impl TryFrom<LineItemRecord> for LineItem {
    type Error = ProductError;

    fn try_from(record: LineItemRecord) -> Result<Self, Self::Error> {
        products::validate_name(&record.name)?;
        products::validate_price(record.unit_price)?;

        Ok(Self {
            id: record.id,
            name: record.name,
            unit_price: record.unit_price,
            quantity: record.quantity,
            image_url: record.image_url,
            customization: record.customization,
        })
    }
}

impl LineItem {
    /// Creates a line from a product snapshot.
    pub fn new(
        id: LineItemId,
        product: &Product,
        quantity: NonZeroU32,
        customization: Option<Customization>,
    ) -> Self {
        Self {
            id,
            name: product.name().to_string(),
            unit_price: product.price(),
            quantity,
            image_url: product.image_url().map(str::to_string),
            customization,
        }
    }

    /// Returns the line id.
    pub fn id(&self) -> LineItemId {
        self.id
    }

    /// Returns the display name captured at add time.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the unit price captured at add time.
    pub fn unit_price(&self) -> Decimal {
        self.unit_price
    }

    /// Returns the quantity.
    pub fn quantity(&self) -> NonZeroU32 {
        self.quantity
    }

    /// Returns the display image, if any.
    pub fn image_url(&self) -> Option<&str> {
        self.image_url.as_deref()
    }

    /// Returns the customization, if any.
    pub fn customization(&self) -> Option<&Customization> {
        self.customization.as_ref()
    }

    /// Unit price times quantity.
    pub fn line_total(&self) -> Decimal {
        self.unit_price.saturating_mul(Decimal::from(self.quantity.get()))
    }

    pub(crate) fn set_quantity(&mut self, quantity: NonZeroU32) {
        self.quantity = quantity;
    }
}

/// Sum of all line quantities.
pub fn total_items(items: &[LineItem]) -> u64 {
    items
        .iter()
        .map(|item| u64::from(item.quantity().get()))
        .sum()
}

/// Sum of unit price times quantity over all lines.
///
/// Saturates at [`Decimal::MAX`] rather than overflowing.
pub fn total_price(items: &[LineItem]) -> Decimal {
    items
        .iter()
        .map(LineItem::line_total)
        .fold(Decimal::ZERO, Decimal::saturating_add)
}

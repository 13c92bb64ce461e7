//! Products

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised while validating a product snapshot.
#[derive(Debug, Error, PartialEq)]
pub enum ProductError {
    /// The product name was empty or whitespace.
    #[error("product name must not be empty")]
    EmptyName,

    /// The product price was negative.
    #[error("product price {0} must not be negative")]
    NegativePrice(Decimal),

    /// The product price was above [`MAX_UNIT_PRICE`].
    #[error("product price {0} exceeds the maximum of {max}", max = MAX_UNIT_PRICE)]
    PriceTooHigh(Decimal),

    /// The product price could not be read as a decimal number.
    #[error("product price {0:?} is not a number")]
    InvalidPrice(String),
}

/// Highest accepted unit price, in taka.
///
/// Keeps line totals and cart totals well inside the range of [`Decimal`] at any quantity.
pub const MAX_UNIT_PRICE: Decimal = Decimal::from_parts(1_000_000_000, 0, 0, false, 0);

/// Catalog product as seen by the cart at add time.
///
/// The name and price are copied into the line item, so later catalog edits do not reach
/// lines already in the cart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "ProductRecord")]
pub struct Product {
    name: String,
    price: Decimal,
    #[serde(skip_serializing_if = "Option::is_none")]
    image_url: Option<String>,
}

#[derive(Deserialize)]
struct ProductRecord {
    name: String,
    price: Decimal,
    #[serde(default)]
    image_url: Option<String>,
}

impl TryFrom<ProductRecord> for Product {
    type Error = ProductError;

    fn try_from(record: ProductRecord) -> Result<Self, Self::Error> {
        let product = Self::new(record.name, record.price)?;

        Ok(Self {
            image_url: record.image_url,
            ..product
        })
    }
}

impl Product {
    /// Creates a product with the given name and price.
    ///
    /// # Errors
    ///
    /// - [`ProductError::EmptyName`]: the name is blank.
    /// - [`ProductError::NegativePrice`]: the price is below zero.
    /// - [`ProductError::PriceTooHigh`]: the price is above [`MAX_UNIT_PRICE`].
    pub fn new(name: impl Into<String>, price: impl Into<Decimal>) -> Result<Self, ProductError> {
        let name = name.into();
        let price = price.into();

        validate_name(&name)?;
        validate_price(price)?;

        Ok(Self {
            name,
            price,
            image_url: None,
        })
    }

    /// Creates a product from a textual price such as `"150"` or `"499.99"`.
    ///
    /// # Errors
    ///
    /// Returns [`ProductError::InvalidPrice`] if the price does not parse, or any error from
    /// [`Product::new`].
    pub fn parse(name: impl Into<String>, price: &str) -> Result<Self, ProductError> {
        let price = price
            .trim()
            .parse::<Decimal>()
            .map_err(|_parse_error| ProductError::InvalidPrice(price.to_string()))?;

        Self::new(name, price)
    }

    /// Attaches a display image to the product.
    #[must_use]
    pub fn with_image_url(mut self, image_url: impl Into<String>) -> Self {
        self.image_url = Some(image_url.into());
        self
    }

    /// Returns the product name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the product price.
    pub fn price(&self) -> Decimal {
        self.price
    }

    /// Returns the product image, if any.
    pub fn image_url(&self) -> Option<&str> {
        self.image_url.as_deref()
    }
}

pub(crate) fn validate_name(name: &str) -> Result<(), ProductError> {
    if name.trim().is_empty() {
        return Err(ProductError::EmptyName);
    }

    Ok(())
}

pub(crate) fn validate_price(price: Decimal) -> Result<(), ProductError> {
    if price.is_sign_negative() && !price.is_zero() {
        return Err(ProductError::NegativePrice(price));
    }

    if price > MAX_UNIT_PRICE {
        return Err(ProductError::PriceTooHigh(price));
    }

    Ok(())
}

//! Orders
//!
//! Builds the payload the storefront submits at checkout from the cart and the shopper's
//! delivery details.

use std::num::NonZeroU32;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    checkout::{CheckoutSummary, DeliveryPolicy},
    customization::Customization,
    items::LineItem,
};

/// Errors raised while building an order draft.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum OrderError {
    /// The cart has no lines.
    #[error("cannot place an order for an empty cart")]
    EmptyCart,

    /// The customer name was blank.
    #[error("customer name must not be empty")]
    MissingName,

    /// The delivery address was blank.
    #[error("delivery address must not be empty")]
    MissingAddress,

    /// The phone number is not a Bangladeshi mobile number.
    #[error("invalid mobile number {0:?}")]
    InvalidPhone(String),
}

/// How the shopper intends to pay.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    /// Pay the courier on delivery.
    #[default]
    CashOnDelivery,

    /// bKash mobile wallet.
    Bkash,

    /// Nagad mobile wallet.
    Nagad,
}

/// Delivery details of the shopper.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerDetails {
    name: String,
    phone: String,
    address: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    notes: Option<String>,
}

impl CustomerDetails {
    /// Validates the details, normalizing the phone number to its 11-digit local form.
    ///
    /// # Errors
    ///
    /// - [`OrderError::MissingName`]: the name is blank.
    /// - [`OrderError::MissingAddress`]: the address is blank.
    /// - [`OrderError::InvalidPhone`]: the phone is not a valid mobile number.
    pub fn new(name: &str, phone: &str, address: &str) -> Result<Self, OrderError> {
        let name = name.trim();
        let address = address.trim();

        if name.is_empty() {
            return Err(OrderError::MissingName);
        }

        if address.is_empty() {
            return Err(OrderError::MissingAddress);
        }

        Ok(Self {
            name: name.to_string(),
            phone: normalize_phone(phone)?,
            address: address.to_string(),
            email: None,
            notes: None,
        })
    }

    /// Adds a contact email.
    #[must_use]
    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    /// Adds delivery notes.
    #[must_use]
    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    /// Returns the customer name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the normalized phone number.
    pub fn phone(&self) -> &str {
        &self.phone
    }

    /// Returns the delivery address.
    pub fn address(&self) -> &str {
        &self.address
    }
}

/// Normalizes a Bangladeshi mobile number such as `+8801712345678` to `01712345678`.
fn normalize_phone(phone: &str) -> Result<String, OrderError> {
    let digits: String = phone
        .chars()
        .filter(|c| !matches!(c, ' ' | '-' | '+'))
        .collect();

    let local = digits
        .strip_prefix("88")
        .filter(|rest| rest.starts_with("01"))
        .unwrap_or(&digits);

    let mut chars = local.chars();

    let valid = local.len() == 11
        && local.chars().all(|c| c.is_ascii_digit())
        && chars.next() == Some('0')
        && chars.next() == Some('1')
        && chars.next().is_some_and(|operator| ('3'..='9').contains(&operator));

    if valid {
        Ok(local.to_string())
    } else {
        Err(OrderError::InvalidPhone(phone.to_string()))
    }
}

/// One line of an order draft.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLine {
    /// Product name.
    pub name: String,

    /// Unit price at add time.
    pub unit_price: Decimal,

    /// Quantity ordered.
    pub quantity: NonZeroU32,

    /// Unit price times quantity.
    pub line_total: Decimal,

    /// Display image.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,

    /// Customization of the line.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub customization: Option<Customization>,
}

impl From<&LineItem> for OrderLine {
    fn from(item: &LineItem) -> Self {
        Self {
            name: item.name().to_string(),
            unit_price: item.unit_price(),
            quantity: item.quantity(),
            line_total: item.line_total(),
            image_url: item.image_url().map(str::to_string),
            customization: item.customization().cloned(),
        }
    }
}

/// Order ready to submit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderDraft {
    /// Delivery details.
    pub customer: CustomerDetails,

    /// Ordered lines, in cart order.
    pub items: Vec<OrderLine>,

    /// Chosen payment method.
    pub payment_method: PaymentMethod,

    /// Totals including delivery.
    #[serde(flatten)]
    pub summary: CheckoutSummary,
}

impl OrderDraft {
    /// Builds a draft from cart lines.
    ///
    /// # Errors
    ///
    /// Returns [`OrderError::EmptyCart`] if there are no lines.
    pub fn from_items(
        items: &[LineItem],
        customer: CustomerDetails,
        payment_method: PaymentMethod,
        policy: &DeliveryPolicy,
    ) -> Result<Self, OrderError> {
        if items.is_empty() {
            return Err(OrderError::EmptyCart);
        }

        Ok(Self {
            customer,
            items: items.iter().map(OrderLine::from).collect(),
            payment_method,
            summary: CheckoutSummary::from_items(items, policy),
        })
    }
}

#[cfg(test)]
mod tests {
    use testresult::TestResult;

    use crate::{items::LineItemId, products::Product};

    use super::*;

    fn customer() -> TestResult<CustomerDetails> {
        Ok(CustomerDetails::new(
            "Nusrat Jahan",
            "01712-345678",
            "House 12, Road 5, Dhanmondi, Dhaka",
        )?)
    }

    #[test]
    fn phone_numbers_are_normalized() -> TestResult {
        for phone in ["01712345678", "+8801712345678", "8801712345678", "017 1234 5678"] {
            assert_eq!(normalize_phone(phone)?, "01712345678", "input {phone:?}");
        }

        Ok(())
    }

    #[test]
    fn invalid_phone_numbers_are_rejected() {
        for phone in ["0171234567", "02712345678", "01212345678", "0171234567x", ""] {
            assert_eq!(
                normalize_phone(phone),
                Err(OrderError::InvalidPhone(phone.to_string())),
                "input {phone:?}"
            );
        }
    }

    #[test]
    fn blank_fields_are_rejected() {
        assert_eq!(
            CustomerDetails::new(" ", "01712345678", "Dhaka"),
            Err(OrderError::MissingName)
        );
        assert_eq!(
            CustomerDetails::new("Rafi", "01712345678", ""),
            Err(OrderError::MissingAddress)
        );
    }

    #[test]
    fn empty_cart_cannot_be_ordered() -> TestResult {
        let result = OrderDraft::from_items(
            &[],
            customer()?,
            PaymentMethod::default(),
            &DeliveryPolicy::default(),
        );

        assert_eq!(result, Err(OrderError::EmptyCart));

        Ok(())
    }

    #[test]
    fn draft_copies_lines_and_totals() -> TestResult {
        let quantity = NonZeroU32::new(2).ok_or("zero")?;
        let items = [LineItem::new(
            LineItemId::generate(),
            &Product::new("Mug", 150)?,
            quantity,
            None,
        )];

        let draft = OrderDraft::from_items(
            &items,
            customer()?.with_notes("Call before delivery"),
            PaymentMethod::Bkash,
            &DeliveryPolicy::default(),
        )?;

        assert_eq!(draft.items.len(), 1);
        assert_eq!(draft.summary.subtotal, Decimal::from(300));
        assert_eq!(draft.summary.grand_total, Decimal::from(360));

        let json = serde_json::to_value(&draft)?;

        assert_eq!(json["payment_method"], "bkash");
        assert_eq!(json["customer"]["phone"], "01712345678");
        assert_eq!(json["items"][0]["line_total"], "300");
        assert_eq!(json["delivery_fee"], "60");

        Ok(())
    }
}

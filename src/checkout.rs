//! Checkout
//!
//! Totals shown on the cart and checkout pages. Delivery is free once the cart subtotal reaches
//! the threshold, otherwise a flat fee applies.

use rust_decimal::{Decimal, RoundingStrategy, prelude::ToPrimitive};
use rusty_money::{Money, iso};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::items::{LineItem, total_items, total_price};

/// Subtotal at which delivery becomes free, in taka.
pub const FREE_DELIVERY_THRESHOLD: Decimal = Decimal::from_parts(500, 0, 0, false, 0);

/// Flat delivery fee below the threshold, in taka.
pub const FLAT_DELIVERY_FEE: Decimal = Decimal::from_parts(60, 0, 0, false, 0);

/// Delivery pricing rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryPolicy {
    /// Subtotal at or above which delivery is free.
    pub free_threshold: Decimal,

    /// Fee charged below the threshold.
    pub flat_fee: Decimal,
}

impl Default for DeliveryPolicy {
    fn default() -> Self {
        Self {
            free_threshold: FREE_DELIVERY_THRESHOLD,
            flat_fee: FLAT_DELIVERY_FEE,
        }
    }
}

impl DeliveryPolicy {
    /// Delivery fee for the given subtotal.
    pub fn fee_for(&self, subtotal: Decimal) -> Decimal {
        if subtotal >= self.free_threshold {
            Decimal::ZERO
        } else {
            self.flat_fee
        }
    }
}

/// Derived checkout values for a cart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutSummary {
    /// Sum of line quantities.
    pub total_items: u64,

    /// Sum of line totals.
    pub subtotal: Decimal,

    /// Delivery fee under the policy.
    pub delivery_fee: Decimal,

    /// Subtotal plus delivery fee.
    pub grand_total: Decimal,
}

impl CheckoutSummary {
    /// Computes the summary for the given lines.
    pub fn from_items(items: &[LineItem], policy: &DeliveryPolicy) -> Self {
        let subtotal = total_price(items);
        let delivery_fee = policy.fee_for(subtotal);

        Self {
            total_items: total_items(items),
            subtotal,
            delivery_fee,
            grand_total: subtotal.saturating_add(delivery_fee),
        }
    }

    /// Whether the order ships without a delivery fee.
    pub fn has_free_delivery(&self) -> bool {
        self.delivery_fee.is_zero()
    }
}

/// Converts a taka amount to money, rounding half away from zero to whole poisha.
///
/// Amounts beyond the range of `i64` poisha are clamped to it.
pub fn taka(amount: Decimal) -> Money<'static, iso::Currency> {
    let poisha = amount
        .saturating_mul(Decimal::ONE_HUNDRED)
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero);

    let poisha = poisha.to_i64().unwrap_or_else(|| {
        warn!(%amount, "amount exceeds displayable range, clamping");

        if poisha.is_sign_negative() {
            -i64::MAX
        } else {
            i64::MAX
        }
    });

    Money::from_minor(poisha, iso::BDT)
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::OrderStatus;
use crate::error::DomainError;
use crate::ids::{BookId, OrderId, ProfileId};
use crate::money::Money;

/// Where and to whom a line is delivered.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DeliveryDetails {
    pub buyer_name: String,
    #[serde(default)]
    pub buyer_email: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub address1: String,
    #[serde(default)]
    pub address2: String,
    #[serde(default)]
    pub pincode: String,
}

/// One line of a checkout batch: a quantity of one book from one seller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLine {
    pub book_id: BookId,
    pub seller_id: ProfileId,
    pub quantity: u32,
    pub amount: Money,
    #[serde(default)]
    pub delivery: Option<DeliveryDetails>,
}

impl OrderLine {
    /// Checks the line before any money moves.
    pub fn validate(&self) -> Result<(), DomainError> {
        if self.quantity == 0 {
            return Err(DomainError::InvalidQuantity(self.quantity));
        }
        if self.amount.is_negative() {
            return Err(DomainError::InvalidAmount(self.amount.minor_units()));
        }
        Ok(())
    }
}

/// An order as stored in the `order` collection. One per purchased line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub buyer_id: ProfileId,
    pub seller_id: ProfileId,
    pub book_id: BookId,
    pub quantity: u32,
    pub amount: Money,
    pub status: OrderStatus,
    #[serde(default)]
    pub delivery_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub reviewed: bool,
    #[serde(default)]
    pub delivery: Option<DeliveryDetails>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// Creates a pending order for one paid line.
    pub fn place(buyer_id: ProfileId, line: &OrderLine, now: DateTime<Utc>) -> Self {
        Self {
            id: OrderId::new(),
            buyer_id,
            seller_id: line.seller_id,
            book_id: line.book_id,
            quantity: line.quantity,
            amount: line.amount,
            status: OrderStatus::Pending,
            delivery_date: None,
            reviewed: false,
            delivery: line.delivery.clone(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Moves the order to `to`, optionally recording a delivery date.
    pub fn transition(
        &mut self,
        to: OrderStatus,
        delivery_date: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> Result<(), DomainError> {
        if !self.status.can_transition_to(to) {
            return Err(DomainError::InvalidTransition {
                from: self.status,
                to,
            });
        }
        self.status = to;
        if delivery_date.is_some() {
            self.delivery_date = delivery_date;
        }
        self.updated_at = now;
        Ok(())
    }

    /// Flags a pending order whose stock could not be reserved.
    ///
    /// This is the coordinator's exit, not a seller action, so it bypasses
    /// [`OrderStatus::can_transition_to`] but still requires `Pending`.
    pub fn mark_stock_unavailable(&mut self, now: DateTime<Utc>) -> Result<(), DomainError> {
        if self.status != OrderStatus::Pending {
            return Err(DomainError::InvalidTransition {
                from: self.status,
                to: OrderStatus::StockUnavailable,
            });
        }
        self.status = OrderStatus::StockUnavailable;
        self.updated_at = now;
        Ok(())
    }
}

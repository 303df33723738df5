use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use pricetrack_core::money::percent_change;
use pricetrack_core::{DomainError, DomainResult, FieldViolation, ItemId, Price, PriceHistoryId};

pub const NOTES_MAX_LEN: usize = 200;

/// One immutable price transition.
///
/// Records are append-only: they are never edited, and only disappear when
/// the owning item is deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceHistoryRecord {
    pub id: PriceHistoryId,
    pub item_id: ItemId,
    pub serial_number: pricetrack_core::SerialNumber,
    pub old_price: Price,
    pub new_price: Price,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl PriceHistoryRecord {
    pub fn change(&self) -> Decimal {
        self.new_price.as_decimal() - self.old_price.as_decimal()
    }

    pub fn change_percent(&self) -> Decimal {
        percent_change(self.old_price.as_decimal(), self.new_price.as_decimal())
    }

    pub fn direction(&self) -> PriceDirection {
        PriceDirection::between(self.old_price, self.new_price)
    }
}

/// A record not yet written to the ledger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPriceRecord {
    pub item_id: ItemId,
    pub serial_number: pricetrack_core::SerialNumber,
    pub old_price: Price,
    pub new_price: Price,
    pub notes: Option<String>,
}

impl NewPriceRecord {
    /// Stamp the record. The ledger calls this at insertion time.
    pub fn commit(self, id: PriceHistoryId, created_at: DateTime<Utc>) -> PriceHistoryRecord {
        PriceHistoryRecord {
            id,
            item_id: self.item_id,
            serial_number: self.serial_number,
            old_price: self.old_price,
            new_price: self.new_price,
            notes: self.notes,
            created_at,
        }
    }
}

/// Direction of a single price transition.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PriceDirection {
    Up,
    Down,
    Unchanged,
}

impl PriceDirection {
    pub fn between(old: Price, new: Price) -> Self {
        match new.cmp(&old) {
            core::cmp::Ordering::Greater => Self::Up,
            core::cmp::Ordering::Less => Self::Down,
            core::cmp::Ordering::Equal => Self::Unchanged,
        }
    }
}

/// Raw price-update payload.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceUpdateInput {
    pub new_price: Option<Decimal>,
    pub notes: Option<String>,
}

/// Validated price update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PriceUpdate {
    pub new_price: Price,
    pub notes: Option<String>,
}

impl PriceUpdateInput {
    pub fn validate(self) -> DomainResult<PriceUpdate> {
        let mut violations = Vec::new();

        let new_price = match self.new_price.map(Price::new) {
            Some(Ok(p)) => Some(p),
            Some(Err(e)) => {
                violations.extend(
                    e.details()
                        .iter()
                        .map(|v| FieldViolation::new("newPrice", v.message.clone())),
                );
                None
            }
            None => {
                violations.push(FieldViolation::new("newPrice", "new price is required"));
                None
            }
        };
        let notes = crate::item::text(&mut violations, "notes", self.notes, NOTES_MAX_LEN);

        DomainError::check_fields(violations)?;
        match new_price {
            Some(new_price) => Ok(PriceUpdate { new_price, notes }),
            None => Err(DomainError::field("newPrice", "new price is required")),
        }
    }
}

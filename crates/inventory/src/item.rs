use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use pricetrack_core::{
    AggregateRoot, DomainError, DomainResult, FieldViolation, ItemId, Price, SerialNumber,
};
use rust_decimal::Decimal;

use crate::price_history::NewPriceRecord;

pub const ITEM_NAME_MAX_LEN: usize = 100;
pub const CATEGORY_MAX_LEN: usize = 50;
pub const DESCRIPTION_MAX_LEN: usize = 500;

/// A tracked inventory unit.
///
/// `current_price` is owned here but only ever changed together with a new
/// history record (see [`Item::price_change`] / [`Item::apply_price`]).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Item {
    pub id: ItemId,
    pub serial_number: SerialNumber,
    pub item_name: Option<String>,
    pub category: Option<String>,
    pub description: Option<String>,
    pub current_price: Price,
    pub image_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip)]
    pub version: u64,
}

impl AggregateRoot for Item {
    type Id = ItemId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

impl Item {
    /// Materialize a validated creation request.
    pub fn create(new: NewItem, now: DateTime<Utc>) -> Self {
        Self {
            id: ItemId::new(),
            serial_number: new.serial_number,
            item_name: new.item_name,
            category: new.category,
            description: new.description,
            current_price: new.current_price,
            image_url: new.image_url,
            created_at: now,
            updated_at: now,
            version: 1,
        }
    }

    /// Apply a detail patch. Price and serial number are untouched.
    pub fn apply_patch(&mut self, patch: &ItemPatch, now: DateTime<Utc>) {
        if let Some(v) = &patch.item_name {
            self.item_name = v.clone();
        }
        if let Some(v) = &patch.category {
            self.category = v.clone();
        }
        if let Some(v) = &patch.description {
            self.description = v.clone();
        }
        if let Some(v) = &patch.image_url {
            self.image_url = v.clone();
        }
        self.updated_at = now;
        self.version += 1;
    }

    /// Build the ledger entry for moving this item to `new_price`.
    ///
    /// `old_price` is always taken from the current state, never from the caller.
    pub fn price_change(&self, new_price: Price, notes: Option<String>) -> NewPriceRecord {
        NewPriceRecord {
            item_id: self.id,
            serial_number: self.serial_number.clone(),
            old_price: self.current_price,
            new_price,
            notes,
        }
    }

    /// Set the current price. Only valid right after the matching ledger append.
    pub fn apply_price(&mut self, new_price: Price, now: DateTime<Utc>) {
        self.current_price = new_price;
        self.updated_at = now;
        self.version += 1;
    }
}

/// Reduced projection used by autocomplete and volatility rankings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemSummary {
    pub serial_number: SerialNumber,
    pub item_name: Option<String>,
    pub current_price: Price,
}

impl From<&Item> for ItemSummary {
    fn from(item: &Item) -> Self {
        Self {
            serial_number: item.serial_number.clone(),
            item_name: item.item_name.clone(),
            current_price: item.current_price,
        }
    }
}

/// Raw creation payload, as received from a client.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateItemInput {
    #[serde(default)]
    pub serial_number: String,
    pub item_name: Option<String>,
    pub category: Option<String>,
    pub description: Option<String>,
    pub current_price: Option<Decimal>,
    pub image_url: Option<String>,
}

/// Validated creation request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewItem {
    pub serial_number: SerialNumber,
    pub item_name: Option<String>,
    pub category: Option<String>,
    pub description: Option<String>,
    pub current_price: Price,
    pub image_url: Option<String>,
}

impl CreateItemInput {
    /// Validate every field and report all violations at once.
    pub fn validate(self) -> DomainResult<NewItem> {
        let mut violations = Vec::new();

        let serial_number = collect(&mut violations, SerialNumber::parse(&self.serial_number));
        let current_price = match self.current_price {
            Some(p) => collect(&mut violations, Price::new(p).map_err(|e| rename(e, "currentPrice"))),
            None => {
                violations.push(FieldViolation::new("currentPrice", "current price is required"));
                None
            }
        };
        let item_name = text(&mut violations, "itemName", self.item_name, ITEM_NAME_MAX_LEN);
        let category = text(&mut violations, "category", self.category, CATEGORY_MAX_LEN);
        let description = text(&mut violations, "description", self.description, DESCRIPTION_MAX_LEN);
        let image_url = image_url(&mut violations, self.image_url);

        DomainError::check_fields(violations)?;

        match (serial_number, current_price) {
            (Some(serial_number), Some(current_price)) => Ok(NewItem {
                serial_number,
                item_name,
                category,
                description,
                current_price,
                image_url,
            }),
            _ => Err(DomainError::validation("invalid item")),
        }
    }
}

/// Raw detail patch. An absent field is left alone; an explicit `null` clears it.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemPatchInput {
    #[serde(default, deserialize_with = "present")]
    pub item_name: Option<Option<String>>,
    #[serde(default, deserialize_with = "present")]
    pub category: Option<Option<String>>,
    #[serde(default, deserialize_with = "present")]
    pub description: Option<Option<String>>,
    #[serde(default, deserialize_with = "present")]
    pub image_url: Option<Option<String>>,
}

/// Validated detail patch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ItemPatch {
    pub item_name: Option<Option<String>>,
    pub category: Option<Option<String>>,
    pub description: Option<Option<String>>,
    pub image_url: Option<Option<String>>,
}

impl ItemPatchInput {
    pub fn validate(self) -> DomainResult<ItemPatch> {
        let mut violations = Vec::new();

        let item_name = self
            .item_name
            .map(|v| text(&mut violations, "itemName", v, ITEM_NAME_MAX_LEN));
        let category = self
            .category
            .map(|v| text(&mut violations, "category", v, CATEGORY_MAX_LEN));
        let description = self
            .description
            .map(|v| text(&mut violations, "description", v, DESCRIPTION_MAX_LEN));
        let image_url = self.image_url.map(|v| image_url(&mut violations, v));

        DomainError::check_fields(violations)?;

        Ok(ItemPatch {
            item_name,
            category,
            description,
            image_url,
        })
    }
}

fn present<'de, D>(deserializer: D) -> Result<Option<Option<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<String>::deserialize(deserializer).map(Some)
}

fn collect<T>(violations: &mut Vec<FieldViolation>, result: DomainResult<T>) -> Option<T> {
    match result {
        Ok(v) => Some(v),
        Err(e) => {
            violations.extend(e.details().iter().cloned());
            None
        }
    }
}

fn rename(err: DomainError, field: &str) -> DomainError {
    let details = err
        .details()
        .iter()
        .map(|v| FieldViolation::new(field, v.message.clone()))
        .collect();
    match DomainError::check_fields(details) {
        Err(e) => e,
        Ok(()) => err,
    }
}

/// Trim, map empty to `None`, enforce a maximum length in characters.
pub(crate) fn text(
    violations: &mut Vec<FieldViolation>,
    field: &str,
    value: Option<String>,
    max: usize,
) -> Option<String> {
    let value = value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())?;
    if value.chars().count() > max {
        violations.push(FieldViolation::new(
            field,
            format!("must be {max} characters or less"),
        ));
        return None;
    }
    Some(value)
}

fn image_url(violations: &mut Vec<FieldViolation>, value: Option<String>) -> Option<String> {
    let value = value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())?;
    match url::Url::parse(&value) {
        Ok(u) if matches!(u.scheme(), "http" | "https") && u.has_host() => Some(value),
        _ => {
            violations.push(FieldViolation::new("imageUrl", "must be a valid URL"));
            None
        }
    }
}

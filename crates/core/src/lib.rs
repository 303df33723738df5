//! `pricetrack-core`: domain foundation building blocks.
//!
//! This crate contains **pure domain** primitives (no infrastructure concerns).

pub mod aggregate;
pub mod error;
pub mod id;
pub mod money;
pub mod serial;

pub use aggregate::{AggregateRoot, ExpectedVersion};
pub use error::{DomainError, DomainResult, FieldViolation};
pub use id::{ItemId, PriceHistoryId};
pub use money::Price;
pub use serial::SerialNumber;

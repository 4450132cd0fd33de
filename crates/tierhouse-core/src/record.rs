//! Record Data Structure
//!
//! This module defines the core `Record` type - the fundamental unit of data in Tierhouse.
//!
//! ## What is a Record?
//! A record is an immutable, time-stamped billing document. Once ingested its
//! content never changes; only the tier holding it (and that tier's compression)
//! changes as it ages.
//!
//! ## Structure
//! - **id**: unique identifier, stable for the record's lifetime
//! - **customer_id**: opaque reference, never validated against anything external
//! - **issued_at**: logical issuance time, the only input to age computation
//! - **amount** / **currency**: monetary value and ISO-4217 style code
//! - **description**: free text
//! - **line_items**: ordered `{label, quantity, unit_price}` entries
//!
//! ## Validation
//! Records are validated once, at ingestion, with [`Record::validate`]. Tier
//! reads trust what was written and do not re-validate.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::id::RecordId;

/// A single billed line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineItem {
    pub label: String,
    pub quantity: u32,
    pub unit_price: f64,
}

impl LineItem {
    pub fn new(label: impl Into<String>, quantity: u32, unit_price: f64) -> Self {
        Self {
            label: label.into(),
            quantity,
            unit_price,
        }
    }
}

/// An immutable billing record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    /// Unique identifier
    pub id: RecordId,

    /// Opaque customer reference
    pub customer_id: String,

    /// Logical issuance timestamp
    pub issued_at: DateTime<Utc>,

    /// Monetary amount
    pub amount: f64,

    /// Three-letter currency code
    pub currency: String,

    /// Free-text description
    pub description: String,

    /// Ordered line items
    #[serde(default)]
    pub line_items: Vec<LineItem>,
}

impl Record {
    pub fn new(
        id: RecordId,
        customer_id: impl Into<String>,
        issued_at: DateTime<Utc>,
        amount: f64,
        currency: impl Into<String>,
        description: impl Into<String>,
        line_items: Vec<LineItem>,
    ) -> Self {
        Self {
            id,
            customer_id: customer_id.into(),
            issued_at,
            amount,
            currency: currency.into(),
            description: description.into(),
            line_items,
        }
    }

    /// Check the record is fit for ingestion.
    pub fn validate(&self) -> Result<()> {
        if self.customer_id.trim().is_empty() {
            return Err(self.invalid("customer_id is empty"));
        }
        if !self.amount.is_finite() {
            return Err(self.invalid("amount is not a finite number"));
        }
        if self.currency.len() != 3 || !self.currency.bytes().all(|b| b.is_ascii_uppercase()) {
            return Err(self.invalid(&format!(
                "currency {:?} is not a three-letter upper-case code",
                self.currency
            )));
        }
        for (idx, item) in self.line_items.iter().enumerate() {
            if item.label.trim().is_empty() {
                return Err(self.invalid(&format!("line item {} has an empty label", idx)));
            }
            if item.quantity == 0 {
                return Err(self.invalid(&format!("line item {} has zero quantity", idx)));
            }
            if !item.unit_price.is_finite() || item.unit_price < 0.0 {
                return Err(self.invalid(&format!(
                    "line item {} has an invalid unit price {}",
                    idx, item.unit_price
                )));
            }
        }
        Ok(())
    }

    fn invalid(&self, reason: &str) -> Error {
        Error::InvalidRecord(format!("{}: {}", self.id, reason))
    }
}

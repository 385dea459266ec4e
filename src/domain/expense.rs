use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{Cents, OfficeId, VendorId};

pub type ExpenseId = Uuid;

/// An organizational expense paid to a vendor.
/// Expenses are booked independently of the petty-cash chain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Expense {
    pub id: ExpenseId,
    pub office: OfficeId,
    pub vendor: Option<VendorId>,
    pub title: String,
    /// Gross amount in cents (always positive)
    pub amount: Cents,
    /// Withholding tax deducted at source
    pub wht: Cents,
    pub advance_tax: Cents,
    pub date_of_payment: DateTime<Utc>,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Expense {
    pub fn new(
        office: OfficeId,
        title: impl Into<String>,
        amount: Cents,
        date_of_payment: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            office,
            vendor: None,
            title: title.into(),
            amount,
            wht: 0,
            advance_tax: 0,
            date_of_payment,
            description: None,
            created_at: Utc::now(),
        }
    }

    pub fn with_vendor(mut self, vendor: VendorId) -> Self {
        self.vendor = Some(vendor);
        self
    }

    pub fn with_taxes(mut self, wht: Cents, advance_tax: Cents) -> Self {
        self.wht = wht;
        self.advance_tax = advance_tax;
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Amount actually paid out to the vendor after tax deductions.
    pub fn net_payable(&self) -> Cents {
        self.amount - self.wht - self.advance_tax
    }
}

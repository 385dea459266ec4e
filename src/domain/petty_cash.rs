use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{BalanceOutOfRange, Cents, OfficeId};

pub type PettyCashId = Uuid;

/// Position of an entry within its office chain.
/// Entries sharing a payment date are ordered by insertion sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ChainKey {
    pub date_of_payment: DateTime<Utc>,
    pub sequence: i64,
}

impl ChainKey {
    pub fn new(date_of_payment: DateTime<Utc>, sequence: i64) -> Self {
        Self {
            date_of_payment,
            sequence,
        }
    }
}

/// A single petty-cash movement in an office ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PettyCash {
    pub id: PettyCashId,
    /// Monotonically increasing creation sequence, breaks date ties
    pub sequence: i64,
    pub office: OfficeId,
    pub date_of_payment: DateTime<Utc>,
    pub amount_received: Cents,
    pub amount_spent: Cents,
    pub opening_balance: Cents,
    pub closing_balance: Cents,
    /// Mirrors `closing_balance`
    pub remaining_amount: Cents,
    pub title: String,
    pub description: Option<String>,
    /// Reference or cheque number
    pub reference_no: Option<String>,
    pub bank_name: Option<String>,
    /// Blob-store reference of the scanned cheque or receipt
    pub cheque_image: Option<String>,
    /// Reporting tag such as "2024-01"; not used for ordering
    pub month: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PettyCash {
    /// Create a new entry. Sequence and balances are assigned by the ledger.
    pub fn new(
        office: OfficeId,
        title: impl Into<String>,
        date_of_payment: DateTime<Utc>,
        amount_received: Cents,
        amount_spent: Cents,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            sequence: 0,
            office,
            date_of_payment,
            amount_received,
            amount_spent,
            opening_balance: 0,
            closing_balance: 0,
            remaining_amount: 0,
            title: title.into(),
            description: None,
            reference_no: None,
            bank_name: None,
            cheque_image: None,
            month: month_tag(date_of_payment),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn key(&self) -> ChainKey {
        ChainKey::new(self.date_of_payment, self.sequence)
    }

    /// Net effect of this entry on the office balance, or `None` if it does
    /// not fit in `Cents`.
    pub fn net_amount(&self) -> Option<Cents> {
        self.amount_received.checked_sub(self.amount_spent)
    }

    /// Carry `opening` into this entry. Returns true if any balance changed.
    /// Fails without touching the entry if the closing balance overflows.
    pub fn apply_opening(&mut self, opening: Cents) -> Result<bool, BalanceOutOfRange> {
        let closing = self
            .net_amount()
            .and_then(|net| opening.checked_add(net))
            .ok_or(BalanceOutOfRange { id: self.id })?;
        let changed = self.opening_balance != opening
            || self.closing_balance != closing
            || self.remaining_amount != closing;

        self.opening_balance = opening;
        self.closing_balance = closing;
        self.remaining_amount = closing;
        Ok(changed)
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_reference_no(mut self, reference_no: impl Into<String>) -> Self {
        self.reference_no = Some(reference_no.into());
        self
    }

    pub fn with_bank_name(mut self, bank_name: impl Into<String>) -> Self {
        self.bank_name = Some(bank_name.into());
        self
    }

    pub fn with_month(mut self, month: impl Into<String>) -> Self {
        self.month = month.into();
        self
    }
}

/// Default month tag for a payment date.
pub fn month_tag(date: DateTime<Utc>) -> String {
    date.format("%Y-%m").to_string()
}

/// An uploaded file as handed in by a caller.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum FilePayload {
    Present(Upload),
    #[default]
    Absent,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Upload {
    pub file_name: String,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

impl FilePayload {
    pub fn present(file_name: impl Into<String>, bytes: Vec<u8>) -> Self {
        FilePayload::Present(Upload {
            file_name: file_name.into(),
            content_type: None,
            bytes,
        })
    }
}

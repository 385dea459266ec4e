use serde::{Deserialize, Serialize};

use crate::domain::{Cents, ChainViolation, Office};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OfficeSummary {
    pub office: Office,
    pub entry_count: i64,
    pub total_received: Cents,
    pub total_spent: Cents,
    /// Closing balance of the chain tail
    pub current_balance: Cents,
    pub months: Vec<MonthlySummary>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonthlySummary {
    pub month: String,
    pub count: i64,
    pub received: Cents,
    pub spent: Cents,
    pub net: Cents,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Dashboard {
    pub office_count: i64,
    pub vendor_count: i64,
    pub expense_count: i64,
    pub expense_total: Cents,
    pub petty_cash_total: Cents,
    pub offices: Vec<OfficeBalance>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OfficeBalance {
    pub office_name: String,
    pub balance: Cents,
}

/// Result of verifying every office chain.
#[derive(Debug, Clone)]
pub struct IntegrityReport {
    pub offices: Vec<OfficeIntegrity>,
}

#[derive(Debug, Clone)]
pub struct OfficeIntegrity {
    pub office_name: String,
    pub entry_count: usize,
    pub violations: Vec<ChainViolation>,
}

impl IntegrityReport {
    pub fn is_healthy(&self) -> bool {
        self.offices.iter().all(|o| o.violations.is_empty())
    }

    pub fn violation_count(&self) -> usize {
        self.offices.iter().map(|o| o.violations.len()).sum()
    }
}

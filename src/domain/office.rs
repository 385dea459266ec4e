use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type OfficeId = Uuid;

/// An office owns its own petty-cash chain and its expenses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Office {
    pub id: OfficeId,
    pub name: String,
    pub location: Option<String>,
    /// Bumped by every petty-cash mutation in this office
    pub ledger_revision: i64,
    pub created_at: DateTime<Utc>,
}

impl Office {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            location: None,
            ledger_revision: 0,
            created_at: Utc::now(),
        }
    }

    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }
}

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use crate::domain::OfficeId;

/// Office-scoped mutual exclusion for ledger mutations.
///
/// Mutations on the same office queue behind one another; different offices
/// never contend. The guard releases the office when dropped.
#[derive(Default)]
pub struct OfficeLocks {
    offices: Mutex<HashMap<OfficeId, Arc<AsyncMutex<()>>>>,
}

impl OfficeLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn acquire(&self, office: OfficeId) -> OwnedMutexGuard<()> {
        let lock = {
            let mut offices = self
                .offices
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            // Drop entries nobody is holding or waiting on
            offices.retain(|id, lock| *id == office || Arc::strong_count(lock) > 1);
            offices.entry(office).or_default().clone()
        };
        lock.lock_owned().await
    }
}

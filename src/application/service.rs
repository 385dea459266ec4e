use std::sync::Arc;

use anyhow::Context;
use chrono::{DateTime, SubsecRound, Utc};
use sqlx::SqliteConnection;
use tracing::{debug, error, info, warn};

use crate::config::AppConfig;
use crate::domain::{
    AmountInput, Cents, ChainKey, Expense, ExpenseId, FilePayload, Office, OfficeId, PettyCash,
    PettyCashId, Vendor, chain_balance, month_tag, rebalance, verify_chain,
};
use crate::storage::{BlobStore, ExpenseQuery, LocalBlobStore, Repository, chain};

use super::locks::OfficeLocks;
use super::reporting::{
    Dashboard, IntegrityReport, MonthlySummary, OfficeBalance, OfficeIntegrity, OfficeSummary,
};
use super::AppError;

/// Application service providing the back-office operations.
/// This is the primary interface for any client (CLI, API, etc.).
///
/// Petty-cash mutations run under an office lock and inside one storage
/// transaction, so the balance chain is recomputed completely or not at all.
pub struct LedgerService {
    repo: Repository,
    blobs: Arc<dyn BlobStore>,
    locks: OfficeLocks,
    image_folder: String,
}

/// Request to record a new petty-cash entry
#[derive(Debug, Clone)]
pub struct NewPettyCash {
    /// Office name
    pub office: String,
    pub title: String,
    pub date_of_payment: DateTime<Utc>,
    pub amount_received: AmountInput,
    pub amount_spent: AmountInput,
    pub description: Option<String>,
    pub reference_no: Option<String>,
    pub bank_name: Option<String>,
    /// Reporting tag; defaults to the payment month
    pub month: Option<String>,
    pub cheque_image: FilePayload,
    /// Fail the whole call if the image cannot be stored
    pub image_required: bool,
}

impl NewPettyCash {
    pub fn new(
        office: impl Into<String>,
        title: impl Into<String>,
        date_of_payment: DateTime<Utc>,
        amount_received: impl Into<AmountInput>,
        amount_spent: impl Into<AmountInput>,
    ) -> Self {
        Self {
            office: office.into(),
            title: title.into(),
            date_of_payment,
            amount_received: amount_received.into(),
            amount_spent: amount_spent.into(),
            description: None,
            reference_no: None,
            bank_name: None,
            month: None,
            cheque_image: FilePayload::Absent,
            image_required: false,
        }
    }

    pub fn with_image(mut self, image: FilePayload, required: bool) -> Self {
        self.cheque_image = image;
        self.image_required = required;
        self
    }
}

/// Changes to an existing petty-cash entry. `None` leaves a field untouched.
#[derive(Debug, Clone, Default)]
pub struct PettyCashChanges {
    pub title: Option<String>,
    pub date_of_payment: Option<DateTime<Utc>>,
    pub amount_received: Option<AmountInput>,
    pub amount_spent: Option<AmountInput>,
    pub description: Option<String>,
    pub reference_no: Option<String>,
    pub bank_name: Option<String>,
    pub month: Option<String>,
    /// A present payload replaces the current image
    pub cheque_image: FilePayload,
    pub image_required: bool,
}

/// Request to record an expense
#[derive(Debug, Clone)]
pub struct NewExpense {
    pub office: String,
    pub vendor: Option<String>,
    pub title: String,
    pub amount: AmountInput,
    pub wht: AmountInput,
    pub advance_tax: AmountInput,
    pub date_of_payment: DateTime<Utc>,
    pub description: Option<String>,
}

/// Filter for querying expenses
#[derive(Debug, Clone, Default)]
pub struct ExpenseFilter {
    pub office: Option<String>,
    pub from_date: Option<DateTime<Utc>>,
    pub to_date: Option<DateTime<Utc>>,
    pub limit: Option<usize>,
}

impl LedgerService {
    /// Create a new service over an existing repository and blob store.
    pub fn new(repo: Repository, blobs: Arc<dyn BlobStore>) -> Self {
        Self {
            repo,
            blobs,
            locks: OfficeLocks::new(),
            image_folder: "petty-cash".to_string(),
        }
    }

    pub fn with_image_folder(mut self, folder: impl Into<String>) -> Self {
        self.image_folder = folder.into();
        self
    }

    /// Create (if needed) and migrate the configured database.
    pub async fn init(config: &AppConfig) -> Result<Self, AppError> {
        let repo =
            Repository::init(&config.database.url(), &config.database.store_options()).await?;
        Ok(Self::with_config(repo, config))
    }

    /// Connect to an existing database.
    pub async fn connect(config: &AppConfig) -> Result<Self, AppError> {
        let repo =
            Repository::connect(&config.database.url(), &config.database.store_options()).await?;
        Ok(Self::with_config(repo, config))
    }

    fn with_config(repo: Repository, config: &AppConfig) -> Self {
        let blobs = Arc::new(LocalBlobStore::new(config.blob.root.clone()));
        Self::new(repo, blobs).with_image_folder(config.blob.image_folder.clone())
    }

    // ========================
    // Office operations
    // ========================

    pub async fn create_office(
        &self,
        name: &str,
        location: Option<String>,
    ) -> Result<Office, AppError> {
        let name = require_text("office name", name)?;
        if self.repo.get_office_by_name(&name).await?.is_some() {
            return Err(AppError::Conflict(format!("office '{}'", name)));
        }

        let mut office = Office::new(name);
        if let Some(location) = location {
            office = office.with_location(location);
        }

        self.repo.save_office(&office).await?;
        info!(office = %office.name, id = %office.id, "office created");
        Ok(office)
    }

    pub async fn get_office(&self, name: &str) -> Result<Office, AppError> {
        self.repo
            .get_office_by_name(name)
            .await?
            .ok_or_else(|| AppError::OfficeNotFound(name.to_string()))
    }

    pub async fn list_offices(&self) -> Result<Vec<Office>, AppError> {
        Ok(self.repo.list_offices().await?)
    }

    /// Delete an office with its whole petty-cash history and expenses.
    pub async fn delete_office(&self, name: &str) -> Result<Office, AppError> {
        let office = self.get_office(name).await?;

        let images = {
            let _guard = self.locks.acquire(office.id).await;
            let mut tx = self.repo.begin().await?;
            if !chain::touch_office(&mut tx, office.id).await? {
                return Err(AppError::OfficeNotFound(name.to_string()));
            }
            let images = chain::delete_office(&mut tx, office.id).await?;
            tx.commit().await.context("Failed to commit office delete")?;
            images
        };

        for reference in &images {
            self.discard_blob(reference).await;
        }

        info!(office = %office.name, images = images.len(), "office deleted");
        Ok(office)
    }

    // ========================
    // Vendor operations
    // ========================

    pub async fn create_vendor(
        &self,
        name: &str,
        contact: Option<String>,
    ) -> Result<Vendor, AppError> {
        let name = require_text("vendor name", name)?;
        if self.repo.get_vendor_by_name(&name).await?.is_some() {
            return Err(AppError::Conflict(format!("vendor '{}'", name)));
        }

        let mut vendor = Vendor::new(name);
        if let Some(contact) = contact {
            vendor = vendor.with_contact(contact);
        }

        self.repo.save_vendor(&vendor).await?;
        info!(vendor = %vendor.name, "vendor created");
        Ok(vendor)
    }

    pub async fn get_vendor(&self, name: &str) -> Result<Vendor, AppError> {
        self.repo
            .get_vendor_by_name(name)
            .await?
            .ok_or_else(|| AppError::VendorNotFound(name.to_string()))
    }

    pub async fn list_vendors(&self) -> Result<Vec<Vendor>, AppError> {
        Ok(self.repo.list_vendors().await?)
    }

    pub async fn delete_vendor(&self, name: &str) -> Result<Vendor, AppError> {
        let vendor = self.get_vendor(name).await?;
        self.repo.delete_vendor(&vendor).await?;
        info!(vendor = %vendor.name, "vendor deleted");
        Ok(vendor)
    }

    // ========================
    // Expense operations
    // ========================

    pub async fn record_expense(&self, request: NewExpense) -> Result<Expense, AppError> {
        let amount = parse_amount("amount", &request.amount)?;
        let wht = parse_amount("wht", &request.wht)?;
        let advance_tax = parse_amount("advance_tax", &request.advance_tax)?;
        let title = require_text("title", &request.title)?;

        if amount == 0 {
            return Err(AppError::Validation("amount must be positive".to_string()));
        }
        if wht.checked_add(advance_tax).is_none_or(|taxes| taxes > amount) {
            return Err(AppError::Validation(
                "taxes cannot exceed the expense amount".to_string(),
            ));
        }

        let office = self.get_office(&request.office).await?;
        let mut expense = Expense::new(
            office.id,
            title,
            amount,
            request.date_of_payment.trunc_subsecs(6),
        )
        .with_taxes(wht, advance_tax);

        if let Some(vendor_name) = &request.vendor {
            expense = expense.with_vendor(self.get_vendor(vendor_name).await?.id);
        }
        if let Some(description) = request.description {
            expense = expense.with_description(description);
        }

        self.repo.save_expense(&expense).await?;
        info!(office = %office.name, expense = %expense.id, amount, "expense recorded");
        Ok(expense)
    }

    pub async fn get_expense(&self, id: ExpenseId) -> Result<Expense, AppError> {
        self.repo
            .get_expense(id)
            .await?
            .ok_or_else(|| AppError::ExpenseNotFound(id.to_string()))
    }

    pub async fn list_expenses(&self, filter: ExpenseFilter) -> Result<Vec<Expense>, AppError> {
        let office = match &filter.office {
            Some(name) => Some(self.get_office(name).await?.id),
            None => None,
        };

        let query = ExpenseQuery {
            office,
            from_date: filter.from_date,
            to_date: filter.to_date,
            limit: filter.limit,
        };
        Ok(self.repo.list_expenses(&query).await?)
    }

    pub async fn delete_expense(&self, id: ExpenseId) -> Result<(), AppError> {
        if !self.repo.delete_expense(id).await? {
            return Err(AppError::ExpenseNotFound(id.to_string()));
        }
        info!(expense = %id, "expense deleted");
        Ok(())
    }

    // ========================
    // Petty-cash ledger
    // ========================

    /// Record a new petty-cash entry and rebalance the office chain after it.
    pub async fn record_petty_cash(&self, request: NewPettyCash) -> Result<PettyCash, AppError> {
        let received = parse_amount("amount_received", &request.amount_received)?;
        let spent = parse_amount("amount_spent", &request.amount_spent)?;
        let title = require_text("title", &request.title)?;
        let office = self.get_office(&request.office).await?;

        let image = self
            .upload_image(&request.cheque_image, request.image_required)
            .await?;

        let mut entry = PettyCash::new(
            office.id,
            title,
            request.date_of_payment.trunc_subsecs(6),
            received,
            spent,
        );
        if let Some(description) = request.description {
            entry = entry.with_description(description);
        }
        if let Some(reference_no) = request.reference_no {
            entry = entry.with_reference_no(reference_no);
        }
        if let Some(bank_name) = request.bank_name {
            entry = entry.with_bank_name(bank_name);
        }
        if let Some(month) = request.month {
            entry = entry.with_month(month);
        }
        entry.cheque_image = image.clone();

        match self.insert_entry(&mut entry).await {
            Ok(recomputed) => {
                info!(
                    office = %office.name,
                    entry = %entry.id,
                    sequence = entry.sequence,
                    closing = entry.closing_balance,
                    recomputed,
                    "petty-cash entry recorded"
                );
                Ok(entry)
            }
            Err(err) => {
                log_rollback(office.id, "insert", &err);
                if let Some(reference) = image {
                    self.discard_blob(&reference).await;
                }
                Err(err)
            }
        }
    }

    async fn insert_entry(&self, entry: &mut PettyCash) -> Result<usize, AppError> {
        let _guard = self.locks.acquire(entry.office).await;
        let mut tx = self.repo.begin().await?;

        if !chain::touch_office(&mut tx, entry.office).await? {
            return Err(AppError::OfficeNotFound(entry.office.to_string()));
        }
        entry.sequence = chain::next_sequence(&mut tx).await?;
        chain::insert(&mut tx, entry).await?;

        let entries = rebalance_from(&mut tx, entry.office, entry.key()).await?;
        copy_balances(entry, &entries);

        tx.commit().await.context("Failed to commit petty-cash entry")?;
        Ok(entries.len().saturating_sub(1))
    }

    /// Amend an entry. Date and amount changes rebalance the chain from the
    /// earlier of the old and new positions.
    pub async fn amend_petty_cash(
        &self,
        id: PettyCashId,
        changes: PettyCashChanges,
    ) -> Result<PettyCash, AppError> {
        let received = changes
            .amount_received
            .as_ref()
            .map(|a| parse_amount("amount_received", a))
            .transpose()?;
        let spent = changes
            .amount_spent
            .as_ref()
            .map(|a| parse_amount("amount_spent", a))
            .transpose()?;
        let title = changes
            .title
            .as_deref()
            .map(|t| require_text("title", t))
            .transpose()?;

        let current = self
            .repo
            .get_petty_cash(id)
            .await?
            .ok_or_else(|| AppError::TransactionNotFound(id.to_string()))?;

        let new_image = self
            .upload_image(&changes.cheque_image, changes.image_required)
            .await?;

        let amendment = Amendment {
            title,
            date_of_payment: changes.date_of_payment.map(|d| d.trunc_subsecs(6)),
            amount_received: received,
            amount_spent: spent,
            description: changes.description,
            reference_no: changes.reference_no,
            bank_name: changes.bank_name,
            month: changes.month,
            cheque_image: new_image.clone(),
        };

        match self.amend_entry(current.office, id, amendment).await {
            Ok((entry, replaced)) => {
                if let Some(old) = replaced {
                    self.discard_blob(&old).await;
                }
                info!(
                    entry = %entry.id,
                    closing = entry.closing_balance,
                    "petty-cash entry amended"
                );
                Ok(entry)
            }
            Err(err) => {
                log_rollback(current.office, "amend", &err);
                if let Some(reference) = new_image {
                    self.discard_blob(&reference).await;
                }
                Err(err)
            }
        }
    }

    /// Returns the amended entry and the image reference it replaced.
    async fn amend_entry(
        &self,
        office: OfficeId,
        id: PettyCashId,
        amendment: Amendment,
    ) -> Result<(PettyCash, Option<String>), AppError> {
        let _guard = self.locks.acquire(office).await;
        let mut tx = self.repo.begin().await?;

        if !chain::touch_office(&mut tx, office).await? {
            return Err(AppError::OfficeNotFound(office.to_string()));
        }
        let mut entry = chain::fetch(&mut tx, id)
            .await?
            .ok_or_else(|| AppError::TransactionNotFound(id.to_string()))?;

        let old_key = entry.key();
        let replaced = amendment.apply(&mut entry);
        chain::update(&mut tx, &entry).await?;

        let start = old_key.min(entry.key());
        let entries = rebalance_from(&mut tx, office, start).await?;
        copy_balances(&mut entry, &entries);

        tx.commit().await.context("Failed to commit amendment")?;
        Ok((entry, replaced))
    }

    /// Remove an entry and rebalance its successors against its predecessor.
    pub async fn remove_petty_cash(&self, id: PettyCashId) -> Result<PettyCash, AppError> {
        let current = self
            .repo
            .get_petty_cash(id)
            .await?
            .ok_or_else(|| AppError::TransactionNotFound(id.to_string()))?;

        let removed = match self.remove_entry(current.office, id).await {
            Ok(removed) => removed,
            Err(err) => {
                log_rollback(current.office, "remove", &err);
                return Err(err);
            }
        };

        if let Some(reference) = &removed.cheque_image {
            self.discard_blob(reference).await;
        }
        info!(entry = %removed.id, office = %removed.office, "petty-cash entry removed");
        Ok(removed)
    }

    async fn remove_entry(&self, office: OfficeId, id: PettyCashId) -> Result<PettyCash, AppError> {
        let _guard = self.locks.acquire(office).await;
        let mut tx = self.repo.begin().await?;

        if !chain::touch_office(&mut tx, office).await? {
            return Err(AppError::OfficeNotFound(office.to_string()));
        }
        let entry = chain::fetch(&mut tx, id)
            .await?
            .ok_or_else(|| AppError::TransactionNotFound(id.to_string()))?;

        chain::delete(&mut tx, id).await?;
        rebalance_from(&mut tx, office, entry.key()).await?;

        tx.commit().await.context("Failed to commit removal")?;
        Ok(entry)
    }

    /// Re-run the chain recomputation over an office's whole history.
    /// Returns the number of entries whose balances were corrected; a
    /// consistent chain is left untouched.
    pub async fn recompute_office(&self, name: &str) -> Result<usize, AppError> {
        let office = self.get_office(name).await?;
        let _guard = self.locks.acquire(office.id).await;

        let mut entries = self.repo.list_petty_cash(office.id).await?;
        let changed = rebalance(0, &mut entries)?;
        let Some(&first) = changed.first() else {
            debug!(office = %office.name, "chain already consistent");
            return Ok(0);
        };

        let mut tx = self.repo.begin().await?;
        if !chain::touch_office(&mut tx, office.id).await? {
            return Err(AppError::OfficeNotFound(name.to_string()));
        }
        rebalance_from(&mut tx, office.id, entries[first].key()).await?;
        tx.commit().await.context("Failed to commit recomputation")?;

        warn!(office = %office.name, corrected = changed.len(), "office chain recomputed");
        Ok(changed.len())
    }

    pub async fn get_petty_cash(&self, id: PettyCashId) -> Result<PettyCash, AppError> {
        self.repo
            .get_petty_cash(id)
            .await?
            .ok_or_else(|| AppError::TransactionNotFound(id.to_string()))
    }

    /// All entries of an office in chain order.
    pub async fn list_petty_cash(&self, office: &str) -> Result<Vec<PettyCash>, AppError> {
        let office = self.get_office(office).await?;
        Ok(self.repo.list_petty_cash(office.id).await?)
    }

    // ========================
    // Reporting
    // ========================

    pub async fn office_summary(&self, name: &str) -> Result<OfficeSummary, AppError> {
        let office = self.get_office(name).await?;
        let entries = self.repo.list_petty_cash(office.id).await?;
        let months = self.repo.monthly_totals(office.id).await?;

        Ok(OfficeSummary {
            entry_count: entries.len() as i64,
            total_received: checked_total(entries.iter().map(|e| e.amount_received))?,
            total_spent: checked_total(entries.iter().map(|e| e.amount_spent))?,
            current_balance: chain_balance(&entries),
            months: months
                .into_iter()
                .map(|m| MonthlySummary {
                    net: m.received - m.spent,
                    month: m.month,
                    count: m.count,
                    received: m.received,
                    spent: m.spent,
                })
                .collect(),
            office,
        })
    }

    pub async fn dashboard(&self) -> Result<Dashboard, AppError> {
        let offices = self.repo.list_offices().await?;
        let balances = self.repo.current_balances().await?;
        let vendor_count = self.repo.count_vendors().await?;
        let (expense_count, expense_total) = self.repo.expense_totals().await?;

        let offices: Vec<OfficeBalance> = offices
            .into_iter()
            .map(|office| OfficeBalance {
                balance: balances.get(&office.id).copied().unwrap_or(0),
                office_name: office.name,
            })
            .collect();

        Ok(Dashboard {
            office_count: offices.len() as i64,
            vendor_count,
            expense_count,
            expense_total,
            petty_cash_total: checked_total(offices.iter().map(|o| o.balance))?,
            offices,
        })
    }

    /// Verify every office chain without modifying anything.
    pub async fn check_integrity(&self) -> Result<IntegrityReport, AppError> {
        let mut offices = Vec::new();

        for office in self.repo.list_offices().await? {
            let entries = self.repo.list_petty_cash(office.id).await?;
            offices.push(OfficeIntegrity {
                office_name: office.name,
                entry_count: entries.len(),
                violations: verify_chain(&entries),
            });
        }

        Ok(IntegrityReport { offices })
    }

    // ========================
    // Blob handling
    // ========================

    async fn upload_image(
        &self,
        payload: &FilePayload,
        required: bool,
    ) -> Result<Option<String>, AppError> {
        let FilePayload::Present(upload) = payload else {
            return Ok(None);
        };
        if upload.bytes.is_empty() {
            return Err(AppError::Validation(format!(
                "image '{}' is empty",
                upload.file_name
            )));
        }

        match self.blobs.upload(&self.image_folder, upload).await {
            Ok(reference) => Ok(Some(reference)),
            Err(err) if required => Err(AppError::Upload(format!("{:#}", err))),
            Err(err) => {
                warn!(
                    file = %upload.file_name,
                    error = %format!("{:#}", err),
                    "optional image upload failed, continuing without it"
                );
                Ok(None)
            }
        }
    }

    /// Best-effort delete; failures are logged, never surfaced.
    async fn discard_blob(&self, reference: &str) {
        if let Err(err) = self.blobs.delete(reference).await {
            warn!(reference, error = %format!("{:#}", err), "failed to delete blob");
        }
    }
}

/// Validated field changes applied to an entry inside the ledger transaction.
struct Amendment {
    title: Option<String>,
    date_of_payment: Option<DateTime<Utc>>,
    amount_received: Option<Cents>,
    amount_spent: Option<Cents>,
    description: Option<String>,
    reference_no: Option<String>,
    bank_name: Option<String>,
    month: Option<String>,
    cheque_image: Option<String>,
}

impl Amendment {
    /// Apply to `entry`, returning the image reference that was replaced.
    fn apply(self, entry: &mut PettyCash) -> Option<String> {
        if let Some(date) = self.date_of_payment {
            // Keep a derived month tag in step with the date
            if self.month.is_none() && entry.month == month_tag(entry.date_of_payment) {
                entry.month = month_tag(date);
            }
            entry.date_of_payment = date;
        }
        if let Some(received) = self.amount_received {
            entry.amount_received = received;
        }
        if let Some(spent) = self.amount_spent {
            entry.amount_spent = spent;
        }
        if let Some(title) = self.title {
            entry.title = title;
        }
        if let Some(description) = self.description {
            entry.description = Some(description);
        }
        if let Some(reference_no) = self.reference_no {
            entry.reference_no = Some(reference_no);
        }
        if let Some(bank_name) = self.bank_name {
            entry.bank_name = Some(bank_name);
        }
        if let Some(month) = self.month {
            entry.month = month;
        }
        entry.updated_at = Utc::now().trunc_subsecs(6);

        match self.cheque_image {
            Some(reference) => entry.cheque_image.replace(reference),
            None => None,
        }
    }
}

/// Recompute every entry of `office` at or after `start`, seeding the chain
/// with the closing balance of the entry just before it. Only entries whose
/// balances moved are written back.
async fn rebalance_from(
    conn: &mut SqliteConnection,
    office: OfficeId,
    start: ChainKey,
) -> Result<Vec<PettyCash>, AppError> {
    let opening = chain::predecessor(conn, office, start)
        .await?
        .map(|p| p.closing_balance)
        .unwrap_or(0);

    let mut entries = chain::from_key(conn, office, start).await?;
    let changed = rebalance(opening, &mut entries)?;
    for &index in &changed {
        chain::update_balances(conn, &entries[index]).await?;
    }

    debug!(
        office = %office,
        scanned = entries.len(),
        written = changed.len(),
        "chain rebalanced"
    );
    Ok(entries)
}

fn copy_balances(entry: &mut PettyCash, recomputed: &[PettyCash]) {
    if let Some(fresh) = recomputed.iter().find(|e| e.id == entry.id) {
        entry.opening_balance = fresh.opening_balance;
        entry.closing_balance = fresh.closing_balance;
        entry.remaining_amount = fresh.remaining_amount;
    }
}

fn log_rollback(office: OfficeId, operation: &str, err: &AppError) {
    if let AppError::Storage(source) = err {
        error!(office = %office, operation, error = %format!("{:#}", source), "ledger mutation rolled back");
    }
}

/// Sum amounts, failing instead of wrapping when the total leaves `Cents`.
fn checked_total(mut amounts: impl Iterator<Item = Cents>) -> Result<Cents, AppError> {
    amounts
        .try_fold(0 as Cents, Cents::checked_add)
        .ok_or_else(|| AppError::Validation("total out of range".to_string()))
}

fn parse_amount(field: &str, input: &AmountInput) -> Result<Cents, AppError> {
    input
        .to_cents()
        .map_err(|err| AppError::invalid_amount(field, err))
}

fn require_text(field: &str, value: &str) -> Result<String, AppError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(AppError::Validation(format!("{} is required", field)));
    }
    Ok(trimmed.to_string())
}

use std::collections::HashMap;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, Sqlite, SqlitePool, Transaction};
use uuid::Uuid;

use crate::domain::{Cents, Expense, ExpenseId, Office, OfficeId, PettyCash, PettyCashId, Vendor};

use super::{MIGRATION_001_INITIAL, MIGRATION_002_EXPENSES, decode_ts, encode_ts};

pub(crate) const PETTY_CASH_COLUMNS: &str = "id, sequence, office_id, date_of_payment, amount_received, amount_spent, opening_balance, closing_balance, remaining_amount, title, description, reference_no, bank_name, cheque_image, month, created_at, updated_at";

/// Connection settings for the SQLite store.
#[derive(Debug, Clone)]
pub struct StoreOptions {
    pub max_connections: u32,
    pub busy_timeout: Duration,
    pub create_if_missing: bool,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            max_connections: 5,
            busy_timeout: Duration::from_secs(5),
            create_if_missing: false,
        }
    }
}

/// Per-month petty-cash totals for an office.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonthTotals {
    pub month: String,
    pub count: i64,
    pub received: Cents,
    pub spent: Cents,
}

/// Filter for querying expenses
#[derive(Debug, Clone, Default)]
pub struct ExpenseQuery {
    pub office: Option<OfficeId>,
    pub from_date: Option<DateTime<Utc>>,
    pub to_date: Option<DateTime<Utc>>,
    pub limit: Option<usize>,
}

/// Repository for persisting and querying offices, vendors, expenses and
/// petty-cash entries. Chain mutations go through [`super::chain`] inside a
/// transaction obtained from [`Repository::begin`].
#[derive(Clone)]
pub struct Repository {
    pool: SqlitePool,
}

impl Repository {
    /// Create a new repository with the given SQLite connection pool.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Connect to a SQLite database. WAL journaling lets readers proceed while
    /// a ledger mutation holds the write lock.
    pub async fn connect(database_url: &str, options: &StoreOptions) -> Result<Self> {
        let connect_options = SqliteConnectOptions::from_str(database_url)
            .with_context(|| format!("Invalid database URL: {}", database_url))?
            .create_if_missing(options.create_if_missing)
            .journal_mode(SqliteJournalMode::Wal)
            .foreign_keys(true)
            .busy_timeout(options.busy_timeout);

        let pool = SqlitePoolOptions::new()
            .max_connections(options.max_connections)
            .connect_with(connect_options)
            .await
            .context("Failed to connect to database")?;
        Ok(Self::new(pool))
    }

    /// Run database migrations.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::query(MIGRATION_001_INITIAL)
            .execute(&self.pool)
            .await
            .context("Failed to run migration 001")?;

        sqlx::query(MIGRATION_002_EXPENSES)
            .execute(&self.pool)
            .await
            .context("Failed to run migration 002")?;

        Ok(())
    }

    /// Initialize a new database (connect + migrate).
    pub async fn init(database_url: &str, options: &StoreOptions) -> Result<Self> {
        let options = StoreOptions {
            create_if_missing: true,
            ..options.clone()
        };
        let repo = Self::connect(database_url, &options).await?;
        repo.migrate().await?;
        Ok(repo)
    }

    /// Start a transaction. Dropping it without commit rolls everything back.
    pub async fn begin(&self) -> Result<Transaction<'static, Sqlite>> {
        self.pool
            .begin()
            .await
            .context("Failed to begin transaction")
    }

    // ========================
    // Office operations
    // ========================

    pub async fn save_office(&self, office: &Office) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO offices (id, name, location, ledger_revision, created_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(office.id.to_string())
        .bind(&office.name)
        .bind(&office.location)
        .bind(office.ledger_revision)
        .bind(encode_ts(office.created_at))
        .execute(&self.pool)
        .await
        .context("Failed to save office")?;
        Ok(())
    }

    pub async fn get_office_by_name(&self, name: &str) -> Result<Option<Office>> {
        let row = sqlx::query(
            "SELECT id, name, location, ledger_revision, created_at FROM offices WHERE name = ?",
        )
        .bind(name)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to fetch office by name")?;

        row.as_ref().map(Self::row_to_office).transpose()
    }

    pub async fn list_offices(&self) -> Result<Vec<Office>> {
        let rows = sqlx::query(
            "SELECT id, name, location, ledger_revision, created_at FROM offices ORDER BY name",
        )
        .fetch_all(&self.pool)
        .await
        .context("Failed to list offices")?;

        rows.iter().map(Self::row_to_office).collect()
    }

    pub(crate) fn row_to_office(row: &SqliteRow) -> Result<Office> {
        let id_str: String = row.get("id");
        let created_at_str: String = row.get("created_at");

        Ok(Office {
            id: Uuid::parse_str(&id_str).context("Invalid office ID")?,
            name: row.get("name"),
            location: row.get("location"),
            ledger_revision: row.get("ledger_revision"),
            created_at: decode_ts(&created_at_str, "created_at")?,
        })
    }

    // ========================
    // Vendor operations
    // ========================

    pub async fn save_vendor(&self, vendor: &Vendor) -> Result<()> {
        sqlx::query("INSERT INTO vendors (id, name, contact, created_at) VALUES (?, ?, ?, ?)")
            .bind(vendor.id.to_string())
            .bind(&vendor.name)
            .bind(&vendor.contact)
            .bind(encode_ts(vendor.created_at))
            .execute(&self.pool)
            .await
            .context("Failed to save vendor")?;
        Ok(())
    }

    pub async fn get_vendor_by_name(&self, name: &str) -> Result<Option<Vendor>> {
        let row = sqlx::query("SELECT id, name, contact, created_at FROM vendors WHERE name = ?")
            .bind(name)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to fetch vendor by name")?;

        row.as_ref().map(Self::row_to_vendor).transpose()
    }

    pub async fn list_vendors(&self) -> Result<Vec<Vendor>> {
        let rows = sqlx::query("SELECT id, name, contact, created_at FROM vendors ORDER BY name")
            .fetch_all(&self.pool)
            .await
            .context("Failed to list vendors")?;

        rows.iter().map(Self::row_to_vendor).collect()
    }

    pub async fn count_vendors(&self) -> Result<i64> {
        let row = sqlx::query("SELECT COUNT(*) as count FROM vendors")
            .fetch_one(&self.pool)
            .await
            .context("Failed to count vendors")?;
        Ok(row.get("count"))
    }

    /// Delete a vendor, detaching it from any expenses that reference it.
    pub async fn delete_vendor(&self, vendor: &Vendor) -> Result<()> {
        let mut tx = self.begin().await?;
        let id = vendor.id.to_string();

        sqlx::query("UPDATE expenses SET vendor_id = NULL WHERE vendor_id = ?")
            .bind(&id)
            .execute(&mut *tx)
            .await
            .context("Failed to detach vendor from expenses")?;
        sqlx::query("DELETE FROM vendors WHERE id = ?")
            .bind(&id)
            .execute(&mut *tx)
            .await
            .context("Failed to delete vendor")?;

        tx.commit().await.context("Failed to commit vendor delete")?;
        Ok(())
    }

    fn row_to_vendor(row: &SqliteRow) -> Result<Vendor> {
        let id_str: String = row.get("id");
        let created_at_str: String = row.get("created_at");

        Ok(Vendor {
            id: Uuid::parse_str(&id_str).context("Invalid vendor ID")?,
            name: row.get("name"),
            contact: row.get("contact"),
            created_at: decode_ts(&created_at_str, "created_at")?,
        })
    }

    // ========================
    // Expense operations
    // ========================

    pub async fn save_expense(&self, expense: &Expense) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO expenses (id, office_id, vendor_id, title, amount, wht, advance_tax, date_of_payment, description, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(expense.id.to_string())
        .bind(expense.office.to_string())
        .bind(expense.vendor.map(|id| id.to_string()))
        .bind(&expense.title)
        .bind(expense.amount)
        .bind(expense.wht)
        .bind(expense.advance_tax)
        .bind(encode_ts(expense.date_of_payment))
        .bind(&expense.description)
        .bind(encode_ts(expense.created_at))
        .execute(&self.pool)
        .await
        .context("Failed to save expense")?;
        Ok(())
    }

    pub async fn get_expense(&self, id: ExpenseId) -> Result<Option<Expense>> {
        let row = sqlx::query(
            r#"
            SELECT id, office_id, vendor_id, title, amount, wht, advance_tax, date_of_payment, description, created_at
            FROM expenses
            WHERE id = ?
            "#,
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await
        .context("Failed to fetch expense")?;

        row.as_ref().map(Self::row_to_expense).transpose()
    }

    /// List expenses with optional filters, most recent payment first.
    pub async fn list_expenses(&self, filter: &ExpenseQuery) -> Result<Vec<Expense>> {
        let mut query = String::from(
            "SELECT id, office_id, vendor_id, title, amount, wht, advance_tax, date_of_payment, description, created_at FROM expenses WHERE 1=1",
        );

        let office_str = filter.office.map(|id| id.to_string());
        let from_date_str = filter.from_date.map(encode_ts);
        let to_date_str = filter.to_date.map(encode_ts);

        if office_str.is_some() {
            query.push_str(" AND office_id = ?");
        }
        if from_date_str.is_some() {
            query.push_str(" AND date_of_payment >= ?");
        }
        if to_date_str.is_some() {
            query.push_str(" AND date_of_payment <= ?");
        }

        query.push_str(" ORDER BY date_of_payment DESC, created_at DESC");

        if let Some(lim) = filter.limit {
            query.push_str(&format!(" LIMIT {}", lim));
        }

        let mut sql_query = sqlx::query(&query);
        if let Some(ref office) = office_str {
            sql_query = sql_query.bind(office);
        }
        if let Some(ref fd) = from_date_str {
            sql_query = sql_query.bind(fd);
        }
        if let Some(ref td) = to_date_str {
            sql_query = sql_query.bind(td);
        }

        let rows = sql_query
            .fetch_all(&self.pool)
            .await
            .context("Failed to list expenses")?;

        rows.iter().map(Self::row_to_expense).collect()
    }

    pub async fn delete_expense(&self, id: ExpenseId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM expenses WHERE id = ?")
            .bind(id.to_string())
            .execute(&self.pool)
            .await
            .context("Failed to delete expense")?;
        Ok(result.rows_affected() > 0)
    }

    /// Number of expenses and their gross total.
    pub async fn expense_totals(&self) -> Result<(i64, Cents)> {
        let row = sqlx::query(
            "SELECT COUNT(*) as count, COALESCE(SUM(amount), 0) as total FROM expenses",
        )
        .fetch_one(&self.pool)
        .await
        .context("Failed to total expenses")?;

        Ok((row.get("count"), row.get("total")))
    }

    fn row_to_expense(row: &SqliteRow) -> Result<Expense> {
        let id_str: String = row.get("id");
        let office_str: String = row.get("office_id");
        let vendor_str: Option<String> = row.get("vendor_id");
        let date_str: String = row.get("date_of_payment");
        let created_at_str: String = row.get("created_at");

        Ok(Expense {
            id: Uuid::parse_str(&id_str).context("Invalid expense ID")?,
            office: Uuid::parse_str(&office_str).context("Invalid office ID")?,
            vendor: vendor_str
                .map(|s| Uuid::parse_str(&s))
                .transpose()
                .context("Invalid vendor ID")?,
            title: row.get("title"),
            amount: row.get("amount"),
            wht: row.get("wht"),
            advance_tax: row.get("advance_tax"),
            date_of_payment: decode_ts(&date_str, "date_of_payment")?,
            description: row.get("description"),
            created_at: decode_ts(&created_at_str, "created_at")?,
        })
    }

    // ========================
    // Petty-cash reads
    // ========================

    pub async fn get_petty_cash(&self, id: PettyCashId) -> Result<Option<PettyCash>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM petty_cash WHERE id = ?",
            PETTY_CASH_COLUMNS
        ))
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await
        .context("Failed to fetch petty-cash entry")?;

        row.as_ref().map(Self::row_to_petty_cash).transpose()
    }

    /// All entries of an office in chain order.
    pub async fn list_petty_cash(&self, office: OfficeId) -> Result<Vec<PettyCash>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM petty_cash WHERE office_id = ? ORDER BY date_of_payment ASC, sequence ASC",
            PETTY_CASH_COLUMNS
        ))
        .bind(office.to_string())
        .fetch_all(&self.pool)
        .await
        .context("Failed to list petty-cash entries")?;

        rows.iter().map(Self::row_to_petty_cash).collect()
    }

    /// Received and spent totals for an office grouped by month tag.
    pub async fn monthly_totals(&self, office: OfficeId) -> Result<Vec<MonthTotals>> {
        let rows = sqlx::query(
            r#"
            SELECT
                month,
                COUNT(*) as count,
                COALESCE(SUM(amount_received), 0) as received,
                COALESCE(SUM(amount_spent), 0) as spent
            FROM petty_cash
            WHERE office_id = ?
            GROUP BY month
            ORDER BY month
            "#,
        )
        .bind(office.to_string())
        .fetch_all(&self.pool)
        .await
        .context("Failed to compute monthly totals")?;

        Ok(rows
            .iter()
            .map(|row| MonthTotals {
                month: row.get("month"),
                count: row.get("count"),
                received: row.get("received"),
                spent: row.get("spent"),
            })
            .collect())
    }

    /// Closing balance of every office's chain tail in a single query.
    /// Offices with no entries are absent from the map (balance = 0).
    pub async fn current_balances(&self) -> Result<HashMap<OfficeId, Cents>> {
        let rows = sqlx::query(
            r#"
            SELECT office_id, closing_balance
            FROM (
                SELECT
                    office_id,
                    closing_balance,
                    ROW_NUMBER() OVER (
                        PARTITION BY office_id
                        ORDER BY date_of_payment DESC, sequence DESC
                    ) as position
                FROM petty_cash
            )
            WHERE position = 1
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .context("Failed to compute current balances")?;

        let mut balances = HashMap::new();
        for row in rows {
            let office_str: String = row.get("office_id");
            let office = Uuid::parse_str(&office_str).context("Invalid office ID")?;
            balances.insert(office, row.get("closing_balance"));
        }

        Ok(balances)
    }

    pub(crate) fn row_to_petty_cash(row: &SqliteRow) -> Result<PettyCash> {
        let id_str: String = row.get("id");
        let office_str: String = row.get("office_id");
        let date_str: String = row.get("date_of_payment");
        let created_at_str: String = row.get("created_at");
        let updated_at_str: String = row.get("updated_at");

        Ok(PettyCash {
            id: Uuid::parse_str(&id_str).context("Invalid petty-cash ID")?,
            sequence: row.get("sequence"),
            office: Uuid::parse_str(&office_str).context("Invalid office ID")?,
            date_of_payment: decode_ts(&date_str, "date_of_payment")?,
            amount_received: row.get("amount_received"),
            amount_spent: row.get("amount_spent"),
            opening_balance: row.get("opening_balance"),
            closing_balance: row.get("closing_balance"),
            remaining_amount: row.get("remaining_amount"),
            title: row.get("title"),
            description: row.get("description"),
            reference_no: row.get("reference_no"),
            bank_name: row.get("bank_name"),
            cheque_image: row.get("cheque_image"),
            month: row.get("month"),
            created_at: decode_ts(&created_at_str, "created_at")?,
            updated_at: decode_ts(&updated_at_str, "updated_at")?,
        })
    }
}

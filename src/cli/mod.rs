use std::future::Future;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use clap::{Parser, Subcommand};
use serde::Serialize;
use uuid::Uuid;

use crate::application::{
    AppError, ExpenseFilter, LedgerService, NewExpense, NewPettyCash, PettyCashChanges,
};
use crate::auth::{Claims, Role, TokenService};
use crate::config::AppConfig;
use crate::domain::{AmountInput, FilePayload, PettyCash, format_cents};
use crate::telemetry;

/// pettyledger - office petty cash and expenses
#[derive(Parser)]
#[command(name = "pettyledger")]
#[command(about = "Back office for office petty-cash ledgers, vendors and expenses")]
#[command(version)]
pub struct Cli {
    /// Configuration file (TOML)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Database file path (overrides the configuration)
    #[arg(short, long, global = true)]
    pub database: Option<String>,

    /// Access token, checked against the role each command needs
    #[arg(long, global = true)]
    pub token: Option<String>,

    /// Print results as JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize a new database
    Init,

    /// Office management commands
    #[command(subcommand)]
    Office(OfficeCommands),

    /// Vendor management commands
    #[command(subcommand)]
    Vendor(VendorCommands),

    /// Expense commands
    #[command(subcommand)]
    Expense(ExpenseCommands),

    /// Petty-cash ledger commands
    #[command(subcommand)]
    Cash(CashCommands),

    /// Petty-cash summary for one office
    Summary {
        /// Office name
        office: String,
    },

    /// Totals across all offices
    Dashboard,

    /// Verify every office balance chain
    Check,

    /// Access token commands
    #[command(subcommand)]
    Token(TokenCommands),
}

#[derive(Subcommand)]
pub enum OfficeCommands {
    /// Create a new office
    Create {
        /// Office name (must be unique)
        name: String,

        #[arg(short, long)]
        location: Option<String>,
    },

    /// List all offices
    List,

    /// Delete an office with its petty cash and expenses
    Delete {
        name: String,
    },

    /// Recompute an office balance chain from scratch
    Recompute {
        name: String,
    },
}

#[derive(Subcommand)]
pub enum VendorCommands {
    /// Create a new vendor
    Create {
        /// Vendor name (must be unique)
        name: String,

        #[arg(short, long)]
        contact: Option<String>,
    },

    /// List all vendors
    List,

    /// Delete a vendor
    Delete {
        name: String,
    },
}

#[derive(Subcommand)]
pub enum ExpenseCommands {
    /// Record an expense
    Add {
        /// Gross amount (e.g., "1200.00")
        amount: String,

        #[arg(long)]
        office: String,

        #[arg(short, long)]
        title: String,

        #[arg(long)]
        vendor: Option<String>,

        /// Withholding tax
        #[arg(long, default_value = "0")]
        wht: String,

        #[arg(long, default_value = "0")]
        advance_tax: String,

        /// Payment date (YYYY-MM-DD, defaults to now)
        #[arg(long)]
        date: Option<String>,

        #[arg(short, long)]
        description: Option<String>,
    },

    /// List expenses
    List {
        #[arg(long)]
        office: Option<String>,

        /// Filter from date (YYYY-MM-DD)
        #[arg(long)]
        from_date: Option<String>,

        /// Filter to date (YYYY-MM-DD)
        #[arg(long)]
        to_date: Option<String>,

        #[arg(short, long)]
        limit: Option<usize>,
    },

    /// Delete an expense
    Delete {
        id: String,
    },
}

#[derive(Subcommand)]
pub enum CashCommands {
    /// Record a petty-cash movement
    Add {
        #[arg(long)]
        office: String,

        #[arg(short, long)]
        title: String,

        /// Amount received into petty cash
        #[arg(long, default_value = "0")]
        received: String,

        /// Amount spent from petty cash
        #[arg(long, default_value = "0")]
        spent: String,

        /// Payment date (YYYY-MM-DD, defaults to now)
        #[arg(long)]
        date: Option<String>,

        #[arg(short, long)]
        description: Option<String>,

        /// Reference or cheque number
        #[arg(long)]
        reference: Option<String>,

        #[arg(long)]
        bank: Option<String>,

        /// Month tag for reporting (defaults to the payment month)
        #[arg(long)]
        month: Option<String>,

        /// Scanned cheque or receipt image
        #[arg(long)]
        image: Option<PathBuf>,

        /// Fail if the image cannot be stored
        #[arg(long, requires = "image")]
        image_required: bool,
    },

    /// Amend a petty-cash entry
    Amend {
        id: String,

        #[arg(short, long)]
        title: Option<String>,

        #[arg(long)]
        received: Option<String>,

        #[arg(long)]
        spent: Option<String>,

        #[arg(long)]
        date: Option<String>,

        #[arg(short, long)]
        description: Option<String>,

        #[arg(long)]
        reference: Option<String>,

        #[arg(long)]
        bank: Option<String>,

        #[arg(long)]
        month: Option<String>,

        /// Replacement image
        #[arg(long)]
        image: Option<PathBuf>,

        #[arg(long, requires = "image")]
        image_required: bool,
    },

    /// Remove a petty-cash entry
    Remove {
        id: String,
    },

    /// Show an office ledger in chain order
    List {
        office: String,
    },

    /// Show one petty-cash entry
    Show {
        id: String,
    },
}

#[derive(Subcommand)]
pub enum TokenCommands {
    /// Issue a token for a user
    Issue {
        user: String,

        /// Role: viewer, accountant, admin
        #[arg(short, long, default_value = "viewer")]
        role: String,
    },

    /// Verify a token and print its claims
    Verify {
        token: String,
    },
}

impl Commands {
    /// Minimum role a caller needs to run the command.
    fn required_role(&self) -> Option<Role> {
        match self {
            Commands::Init | Commands::Token(_) => None,
            Commands::Summary { .. } | Commands::Dashboard | Commands::Check => Some(Role::Viewer),
            Commands::Office(OfficeCommands::List) | Commands::Vendor(VendorCommands::List) => {
                Some(Role::Viewer)
            }
            Commands::Office(_) | Commands::Vendor(_) => Some(Role::Admin),
            Commands::Expense(ExpenseCommands::List { .. }) => Some(Role::Viewer),
            Commands::Cash(CashCommands::List { .. } | CashCommands::Show { .. }) => {
                Some(Role::Viewer)
            }
            Commands::Expense(_) | Commands::Cash(_) => Some(Role::Accountant),
        }
    }
}

impl Cli {
    fn load_config(&self) -> Result<AppConfig> {
        let mut config = AppConfig::load(self.config.as_deref())?;
        if let Some(database) = &self.database {
            config.database.path = database.clone();
        }
        if self.verbose {
            config.telemetry.log_level = "debug".to_string();
        }
        Ok(config)
    }

    /// Check the caller's token against the command, if one is needed.
    fn authorize(&self, tokens: &TokenService, require_token: bool) -> Result<Option<Claims>> {
        let Some(required) = self.command.required_role() else {
            return Ok(None);
        };

        match &self.token {
            Some(token) => {
                let claims = tokens.verify(token)?;
                claims.require(required)?;
                tracing::debug!(user = %claims.sub, role = %claims.role, "caller authorized");
                Ok(Some(claims))
            }
            None if require_token => Err(AppError::InvalidToken(format!(
                "a token with role '{}' is required",
                required
            ))
            .into()),
            None => Ok(None),
        }
    }

    pub async fn run(self) -> Result<()> {
        let config = self.load_config()?;
        telemetry::init(&config.telemetry);

        if matches!(self.command, Commands::Token(_)) && config.auth.uses_default_secret() {
            tracing::warn!("no auth.secret configured, tokens use the built-in development secret");
        }
        let tokens = TokenService::from_config(&config.auth);
        self.authorize(&tokens, config.auth.require_token)?;

        let timeout = config.operation_timeout();
        let json = self.json;

        match self.command {
            Commands::Init => {
                LedgerService::init(&config).await?;
                println!("Database initialized: {}", config.database.path);
            }

            Commands::Office(cmd) => {
                let service = LedgerService::connect(&config).await?;
                with_timeout(timeout, run_office_command(&service, cmd, json)).await?;
            }

            Commands::Vendor(cmd) => {
                let service = LedgerService::connect(&config).await?;
                with_timeout(timeout, run_vendor_command(&service, cmd, json)).await?;
            }

            Commands::Expense(cmd) => {
                let service = LedgerService::connect(&config).await?;
                with_timeout(timeout, run_expense_command(&service, cmd, json)).await?;
            }

            Commands::Cash(cmd) => {
                let service = LedgerService::connect(&config).await?;
                with_timeout(timeout, run_cash_command(&service, cmd, json)).await?;
            }

            Commands::Summary { office } => {
                let service = LedgerService::connect(&config).await?;
                let summary = with_timeout(timeout, async {
                    service.office_summary(&office).await.map_err(anyhow::Error::from)
                })
                .await?;

                if json {
                    return print_json(&summary);
                }
                println!("Office: {}", summary.office.name);
                println!("  Entries:        {}", summary.entry_count);
                println!("  Received:       {}", format_cents(summary.total_received));
                println!("  Spent:          {}", format_cents(summary.total_spent));
                println!("  Balance:        {}", format_cents(summary.current_balance));
                println!("  Revision:       {}", summary.office.ledger_revision);
                if !summary.months.is_empty() {
                    println!();
                    println!(
                        "{:<10} {:>6} {:>12} {:>12} {:>12}",
                        "MONTH", "COUNT", "RECEIVED", "SPENT", "NET"
                    );
                    println!("{}", "-".repeat(56));
                    for month in &summary.months {
                        println!(
                            "{:<10} {:>6} {:>12} {:>12} {:>12}",
                            month.month,
                            month.count,
                            format_cents(month.received),
                            format_cents(month.spent),
                            format_cents(month.net)
                        );
                    }
                }
            }

            Commands::Dashboard => {
                let service = LedgerService::connect(&config).await?;
                let dashboard = with_timeout(timeout, async {
                    service.dashboard().await.map_err(anyhow::Error::from)
                })
                .await?;

                if json {
                    return print_json(&dashboard);
                }
                println!("Offices:   {}", dashboard.office_count);
                println!("Vendors:   {}", dashboard.vendor_count);
                println!(
                    "Expenses:  {} ({})",
                    dashboard.expense_count,
                    format_cents(dashboard.expense_total)
                );
                println!("Petty cash on hand: {}", format_cents(dashboard.petty_cash_total));
                if !dashboard.offices.is_empty() {
                    println!();
                    println!("{:<24} {:>12}", "OFFICE", "BALANCE");
                    println!("{}", "-".repeat(37));
                    for office in &dashboard.offices {
                        println!(
                            "{:<24} {:>12}",
                            truncate(&office.office_name, 24),
                            format_cents(office.balance)
                        );
                    }
                }
            }

            Commands::Check => {
                let service = LedgerService::connect(&config).await?;
                run_check_command(&service).await?;
            }

            Commands::Token(cmd) => run_token_command(&tokens, cmd, json)?,
        }

        Ok(())
    }
}

/// Bound an operation by the configured timeout. A mutation cut short drops
/// its open transaction, which rolls back.
async fn with_timeout<T>(
    timeout: Option<std::time::Duration>,
    operation: impl Future<Output = Result<T>>,
) -> Result<T> {
    match timeout {
        Some(limit) => tokio::time::timeout(limit, operation)
            .await
            .map_err(|_| anyhow::anyhow!("Operation timed out after {:?}", limit))?,
        None => operation.await,
    }
}

async fn run_office_command(service: &LedgerService, cmd: OfficeCommands, json: bool) -> Result<()> {
    match cmd {
        OfficeCommands::Create { name, location } => {
            let office = service.create_office(&name, location).await?;
            if json {
                return print_json(&office);
            }
            println!("Created office: {} ({})", office.name, office.id);
        }

        OfficeCommands::List => {
            let offices = service.list_offices().await?;
            if json {
                return print_json(&offices);
            }
            if offices.is_empty() {
                println!("No offices found.");
            } else {
                println!("{:<24} {:<24} {:>8}", "NAME", "LOCATION", "REVISION");
                println!("{}", "-".repeat(58));
                for office in offices {
                    println!(
                        "{:<24} {:<24} {:>8}",
                        truncate(&office.name, 24),
                        truncate(office.location.as_deref().unwrap_or(""), 24),
                        office.ledger_revision
                    );
                }
            }
        }

        OfficeCommands::Delete { name } => {
            let office = service.delete_office(&name).await?;
            println!("Deleted office: {}", office.name);
        }

        OfficeCommands::Recompute { name } => {
            let corrected = service.recompute_office(&name).await?;
            if corrected == 0 {
                println!("{}: chain already consistent", name);
            } else {
                println!("{}: corrected {} entries", name, corrected);
            }
        }
    }
    Ok(())
}

async fn run_vendor_command(service: &LedgerService, cmd: VendorCommands, json: bool) -> Result<()> {
    match cmd {
        VendorCommands::Create { name, contact } => {
            let vendor = service.create_vendor(&name, contact).await?;
            if json {
                return print_json(&vendor);
            }
            println!("Created vendor: {}", vendor.name);
        }

        VendorCommands::List => {
            let vendors = service.list_vendors().await?;
            if json {
                return print_json(&vendors);
            }
            if vendors.is_empty() {
                println!("No vendors found.");
            } else {
                println!("{:<24} CONTACT", "NAME");
                println!("{}", "-".repeat(50));
                for vendor in vendors {
                    println!(
                        "{:<24} {}",
                        truncate(&vendor.name, 24),
                        vendor.contact.as_deref().unwrap_or("")
                    );
                }
            }
        }

        VendorCommands::Delete { name } => {
            let vendor = service.delete_vendor(&name).await?;
            println!("Deleted vendor: {}", vendor.name);
        }
    }
    Ok(())
}

async fn run_expense_command(
    service: &LedgerService,
    cmd: ExpenseCommands,
    json: bool,
) -> Result<()> {
    match cmd {
        ExpenseCommands::Add {
            amount,
            office,
            title,
            vendor,
            wht,
            advance_tax,
            date,
            description,
        } => {
            let expense = service
                .record_expense(NewExpense {
                    office,
                    vendor,
                    title,
                    amount: AmountInput::Text(amount),
                    wht: AmountInput::Text(wht),
                    advance_tax: AmountInput::Text(advance_tax),
                    date_of_payment: parse_date_or_now(date)?,
                    description,
                })
                .await?;

            if json {
                return print_json(&expense);
            }
            println!(
                "Recorded expense: {} {} (net {}) ({})",
                expense.title,
                format_cents(expense.amount),
                format_cents(expense.net_payable()),
                expense.id
            );
        }

        ExpenseCommands::List {
            office,
            from_date,
            to_date,
            limit,
        } => {
            let filter = ExpenseFilter {
                office,
                from_date: from_date
                    .map(|s| parse_date(&s))
                    .transpose()
                    .context("Invalid from-date")?,
                to_date: to_date
                    .map(|s| parse_date(&s))
                    .transpose()
                    .context("Invalid to-date")?,
                limit,
            };

            let expenses = service.list_expenses(filter).await?;
            if json {
                return print_json(&expenses);
            }
            if expenses.is_empty() {
                println!("No expenses found.");
            } else {
                println!(
                    "{:<12} {:>12} {:>10} {:>10} TITLE",
                    "DATE", "AMOUNT", "WHT", "ADV. TAX"
                );
                println!("{}", "-".repeat(70));
                for expense in expenses {
                    println!(
                        "{:<12} {:>12} {:>10} {:>10} {}",
                        expense.date_of_payment.format("%Y-%m-%d"),
                        format_cents(expense.amount),
                        format_cents(expense.wht),
                        format_cents(expense.advance_tax),
                        truncate(&expense.title, 30)
                    );
                }
            }
        }

        ExpenseCommands::Delete { id } => {
            let id = parse_id(&id)?;
            service.delete_expense(id).await?;
            println!("Deleted expense: {}", id);
        }
    }
    Ok(())
}

async fn run_cash_command(service: &LedgerService, cmd: CashCommands, json: bool) -> Result<()> {
    match cmd {
        CashCommands::Add {
            office,
            title,
            received,
            spent,
            date,
            description,
            reference,
            bank,
            month,
            image,
            image_required,
        } => {
            let mut request = NewPettyCash::new(
                office,
                title,
                parse_date_or_now(date)?,
                received,
                spent,
            )
            .with_image(read_image(image.as_deref()).await?, image_required);
            request.description = description;
            request.reference_no = reference;
            request.bank_name = bank;
            request.month = month;

            let entry = service.record_petty_cash(request).await?;
            if json {
                return print_json(&entry);
            }
            println!(
                "Recorded: {} opening {} closing {} ({})",
                entry.title,
                format_cents(entry.opening_balance),
                format_cents(entry.closing_balance),
                entry.id
            );
        }

        CashCommands::Amend {
            id,
            title,
            received,
            spent,
            date,
            description,
            reference,
            bank,
            month,
            image,
            image_required,
        } => {
            let changes = PettyCashChanges {
                title,
                date_of_payment: date.map(|d| parse_date(&d)).transpose()?,
                amount_received: received.map(AmountInput::Text),
                amount_spent: spent.map(AmountInput::Text),
                description,
                reference_no: reference,
                bank_name: bank,
                month,
                cheque_image: read_image(image.as_deref()).await?,
                image_required,
            };

            let entry = service.amend_petty_cash(parse_id(&id)?, changes).await?;
            if json {
                return print_json(&entry);
            }
            println!(
                "Amended: {} opening {} closing {}",
                entry.title,
                format_cents(entry.opening_balance),
                format_cents(entry.closing_balance)
            );
        }

        CashCommands::Remove { id } => {
            let removed = service.remove_petty_cash(parse_id(&id)?).await?;
            println!("Removed: {} ({})", removed.title, removed.id);
        }

        CashCommands::List { office } => {
            let entries = service.list_petty_cash(&office).await?;
            if json {
                return print_json(&entries);
            }
            if entries.is_empty() {
                println!("No petty-cash entries for {}.", office);
            } else {
                println!(
                    "{:<12} {:>12} {:>12} {:>12} {:>12} TITLE",
                    "DATE", "OPENING", "RECEIVED", "SPENT", "CLOSING"
                );
                println!("{}", "-".repeat(80));
                for entry in &entries {
                    println!(
                        "{:<12} {:>12} {:>12} {:>12} {:>12} {}",
                        entry.date_of_payment.format("%Y-%m-%d"),
                        format_cents(entry.opening_balance),
                        format_cents(entry.amount_received),
                        format_cents(entry.amount_spent),
                        format_cents(entry.closing_balance),
                        truncate(&entry.title, 24)
                    );
                }
            }
        }

        CashCommands::Show { id } => {
            let entry = service.get_petty_cash(parse_id(&id)?).await?;
            if json {
                return print_json(&entry);
            }
            print_entry(&entry);
        }
    }
    Ok(())
}

fn print_entry(entry: &PettyCash) {
    println!("Petty cash: {}", entry.title);
    println!("  ID:             {}", entry.id);
    println!("  Sequence:       {}", entry.sequence);
    println!("  Date:           {}", entry.date_of_payment.format("%Y-%m-%d"));
    println!("  Month:          {}", entry.month);
    println!("  Opening:        {}", format_cents(entry.opening_balance));
    println!("  Received:       {}", format_cents(entry.amount_received));
    println!("  Spent:          {}", format_cents(entry.amount_spent));
    println!("  Closing:        {}", format_cents(entry.closing_balance));
    if let Some(desc) = &entry.description {
        println!("  Description:    {}", desc);
    }
    if let Some(reference) = &entry.reference_no {
        println!("  Reference:      {}", reference);
    }
    if let Some(bank) = &entry.bank_name {
        println!("  Bank:           {}", bank);
    }
    if let Some(image) = &entry.cheque_image {
        println!("  Image:          {}", image);
    }
}

async fn run_check_command(service: &LedgerService) -> Result<()> {
    println!("Checking petty-cash chains...\n");

    let report = service.check_integrity().await?;

    for office in &report.offices {
        let status = if office.violations.is_empty() {
            "ok"
        } else {
            "BROKEN"
        };
        println!(
            "{:<24} {:>6} entries  {}",
            truncate(&office.office_name, 24),
            office.entry_count,
            status
        );
        for violation in &office.violations {
            println!("    {}", violation);
        }
    }

    println!();
    if report.is_healthy() {
        println!("All chains are consistent.");
    } else {
        println!(
            "{} problem(s) found. Run 'office recompute <name>' to repair.",
            report.violation_count()
        );
    }
    Ok(())
}

fn run_token_command(tokens: &TokenService, cmd: TokenCommands, json: bool) -> Result<()> {
    match cmd {
        TokenCommands::Issue { user, role } => {
            let role = Role::from_str(&role).ok_or_else(|| {
                anyhow::anyhow!(
                    "Invalid role '{}'. Valid roles: viewer, accountant, admin",
                    role
                )
            })?;
            println!("{}", tokens.sign(&user, role)?);
        }

        TokenCommands::Verify { token } => {
            let claims = tokens.verify(&token)?;
            if json {
                return print_json(&claims);
            }
            println!("User:    {}", claims.sub);
            println!("Role:    {}", claims.role);
            if let Some(expires) = DateTime::from_timestamp(claims.exp, 0) {
                println!("Expires: {}", expires.format("%Y-%m-%d %H:%M:%S"));
            }
        }
    }
    Ok(())
}

async fn read_image(path: Option<&Path>) -> Result<FilePayload> {
    let Some(path) = path else {
        return Ok(FilePayload::Absent);
    };

    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("Failed to read image {}", path.display()))?;
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "upload".to_string());

    Ok(FilePayload::present(file_name, bytes))
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn parse_id(id: &str) -> Result<Uuid> {
    Uuid::parse_str(id).context("Invalid ID format (expected UUID)")
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

fn parse_date_or_now(date: Option<String>) -> Result<DateTime<Utc>> {
    match date {
        Some(date_str) => parse_date(&date_str)
            .with_context(|| format!("Invalid date format '{}'. Use YYYY-MM-DD", date_str)),
        None => Ok(Utc::now()),
    }
}

fn parse_date(date_str: &str) -> Result<DateTime<Utc>> {
    let naive_date = NaiveDate::parse_from_str(date_str, "%Y-%m-%d")
        .context("Date must be in YYYY-MM-DD format")?;

    let naive_datetime = naive_date
        .and_hms_opt(0, 0, 0)
        .ok_or_else(|| anyhow::anyhow!("Invalid date"))?;

    Ok(naive_datetime.and_utc())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_date() {
        let date = parse_date("2024-01-07").unwrap();
        assert_eq!(date.to_rfc3339(), "2024-01-07T00:00:00+00:00");
        assert!(parse_date("07/01/2024").is_err());
    }

    #[test]
    fn test_truncate_counts_characters() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("Karachi Head Office", 10), "Karachi...");
        assert_eq!(truncate("Zürich Zürich", 8), "Züric...");
    }

    #[test]
    fn test_required_roles() {
        let cli = Cli::parse_from(["pettyledger", "cash", "list", "Head Office"]);
        assert_eq!(cli.command.required_role(), Some(Role::Viewer));

        let cli = Cli::parse_from([
            "pettyledger", "cash", "add", "--office", "Head Office", "--title", "Float",
            "--received", "1000",
        ]);
        assert_eq!(cli.command.required_role(), Some(Role::Accountant));

        let cli = Cli::parse_from(["pettyledger", "office", "create", "Branch"]);
        assert_eq!(cli.command.required_role(), Some(Role::Admin));

        let cli = Cli::parse_from(["pettyledger", "init"]);
        assert_eq!(cli.command.required_role(), None);
    }

    #[test]
    fn test_authorize_rejects_insufficient_role() {
        let tokens = TokenService::new("secret", 60, "pettyledger");
        let viewer = tokens.sign("sam", Role::Viewer).unwrap();

        let cli = Cli::parse_from([
            "pettyledger", "--token", viewer.as_str(), "office", "delete", "Branch",
        ]);
        assert!(cli.authorize(&tokens, false).is_err());

        let cli = Cli::parse_from(["pettyledger", "--token", viewer.as_str(), "dashboard"]);
        let claims = cli.authorize(&tokens, false).unwrap().unwrap();
        assert_eq!(claims.sub, "sam");
    }

    #[test]
    fn test_authorize_requires_token_when_configured() {
        let tokens = TokenService::new("secret", 60, "pettyledger");

        let cli = Cli::parse_from(["pettyledger", "dashboard"]);
        assert!(cli.authorize(&tokens, true).is_err());
        assert!(cli.authorize(&tokens, false).unwrap().is_none());
    }
}

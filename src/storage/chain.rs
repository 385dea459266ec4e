//! Petty-cash chain access inside a ledger transaction.
//!
//! Every function takes the connection of an open transaction so that a
//! mutation and its downstream recomputation commit or roll back together.

use anyhow::{Context, Result};
use chrono::Utc;
use sqlx::{Row, SqliteConnection};

use crate::domain::{ChainKey, OfficeId, PettyCash, PettyCashId};

use super::encode_ts;
use super::repository::{PETTY_CASH_COLUMNS, Repository};

/// Bump the office's ledger revision. This is the first statement of every
/// chain mutation, so the transaction holds the write lock from the start.
/// Returns false if the office does not exist.
pub async fn touch_office(conn: &mut SqliteConnection, office: OfficeId) -> Result<bool> {
    let result =
        sqlx::query("UPDATE offices SET ledger_revision = ledger_revision + 1 WHERE id = ?")
            .bind(office.to_string())
            .execute(&mut *conn)
            .await
            .context("Failed to bump ledger revision")?;
    Ok(result.rows_affected() > 0)
}

/// Get the next sequence number and increment the counter.
pub async fn next_sequence(conn: &mut SqliteConnection) -> Result<i64> {
    let row = sqlx::query(
        r#"
        UPDATE sequence_counter
        SET value = value + 1
        WHERE name = 'petty_cash_sequence'
        RETURNING value
        "#,
    )
    .fetch_one(&mut *conn)
    .await
    .context("Failed to get next sequence number")?;

    Ok(row.get("value"))
}

pub async fn fetch(conn: &mut SqliteConnection, id: PettyCashId) -> Result<Option<PettyCash>> {
    let row = sqlx::query(&format!(
        "SELECT {} FROM petty_cash WHERE id = ?",
        PETTY_CASH_COLUMNS
    ))
    .bind(id.to_string())
    .fetch_optional(&mut *conn)
    .await
    .context("Failed to fetch petty-cash entry")?;

    row.as_ref().map(Repository::row_to_petty_cash).transpose()
}

/// Latest entry of `office` strictly before `key`.
pub async fn predecessor(
    conn: &mut SqliteConnection,
    office: OfficeId,
    key: ChainKey,
) -> Result<Option<PettyCash>> {
    let date = encode_ts(key.date_of_payment);
    let row = sqlx::query(&format!(
        r#"
        SELECT {}
        FROM petty_cash
        WHERE office_id = ?
          AND (date_of_payment < ? OR (date_of_payment = ? AND sequence < ?))
        ORDER BY date_of_payment DESC, sequence DESC
        LIMIT 1
        "#,
        PETTY_CASH_COLUMNS
    ))
    .bind(office.to_string())
    .bind(&date)
    .bind(&date)
    .bind(key.sequence)
    .fetch_optional(&mut *conn)
    .await
    .context("Failed to fetch predecessor")?;

    row.as_ref().map(Repository::row_to_petty_cash).transpose()
}

/// Entries of `office` at or after `key`, in chain order.
pub async fn from_key(
    conn: &mut SqliteConnection,
    office: OfficeId,
    key: ChainKey,
) -> Result<Vec<PettyCash>> {
    let date = encode_ts(key.date_of_payment);
    let rows = sqlx::query(&format!(
        r#"
        SELECT {}
        FROM petty_cash
        WHERE office_id = ?
          AND (date_of_payment > ? OR (date_of_payment = ? AND sequence >= ?))
        ORDER BY date_of_payment ASC, sequence ASC
        "#,
        PETTY_CASH_COLUMNS
    ))
    .bind(office.to_string())
    .bind(&date)
    .bind(&date)
    .bind(key.sequence)
    .fetch_all(&mut *conn)
    .await
    .context("Failed to fetch successors")?;

    rows.iter().map(Repository::row_to_petty_cash).collect()
}

pub async fn insert(conn: &mut SqliteConnection, entry: &PettyCash) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO petty_cash (id, sequence, office_id, date_of_payment, amount_received, amount_spent, opening_balance, closing_balance, remaining_amount, title, description, reference_no, bank_name, cheque_image, month, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(entry.id.to_string())
    .bind(entry.sequence)
    .bind(entry.office.to_string())
    .bind(encode_ts(entry.date_of_payment))
    .bind(entry.amount_received)
    .bind(entry.amount_spent)
    .bind(entry.opening_balance)
    .bind(entry.closing_balance)
    .bind(entry.remaining_amount)
    .bind(&entry.title)
    .bind(&entry.description)
    .bind(&entry.reference_no)
    .bind(&entry.bank_name)
    .bind(&entry.cheque_image)
    .bind(&entry.month)
    .bind(encode_ts(entry.created_at))
    .bind(encode_ts(entry.updated_at))
    .execute(&mut *conn)
    .await
    .context("Failed to save petty-cash entry")?;
    Ok(())
}

/// Write every mutable column of an entry.
pub async fn update(conn: &mut SqliteConnection, entry: &PettyCash) -> Result<bool> {
    let result = sqlx::query(
        r#"
        UPDATE petty_cash
        SET date_of_payment = ?, amount_received = ?, amount_spent = ?,
            opening_balance = ?, closing_balance = ?, remaining_amount = ?,
            title = ?, description = ?, reference_no = ?, bank_name = ?,
            cheque_image = ?, month = ?, updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(encode_ts(entry.date_of_payment))
    .bind(entry.amount_received)
    .bind(entry.amount_spent)
    .bind(entry.opening_balance)
    .bind(entry.closing_balance)
    .bind(entry.remaining_amount)
    .bind(&entry.title)
    .bind(&entry.description)
    .bind(&entry.reference_no)
    .bind(&entry.bank_name)
    .bind(&entry.cheque_image)
    .bind(&entry.month)
    .bind(encode_ts(entry.updated_at))
    .bind(entry.id.to_string())
    .execute(&mut *conn)
    .await
    .context("Failed to update petty-cash entry")?;
    Ok(result.rows_affected() > 0)
}

/// Write only the balance columns of a recomputed entry.
pub async fn update_balances(conn: &mut SqliteConnection, entry: &PettyCash) -> Result<()> {
    let result = sqlx::query(
        r#"
        UPDATE petty_cash
        SET opening_balance = ?, closing_balance = ?, remaining_amount = ?, updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(entry.opening_balance)
    .bind(entry.closing_balance)
    .bind(entry.remaining_amount)
    .bind(encode_ts(Utc::now()))
    .bind(entry.id.to_string())
    .execute(&mut *conn)
    .await
    .context("Failed to update petty-cash balances")?;

    if result.rows_affected() == 0 {
        anyhow::bail!("Petty-cash entry {} vanished during recomputation", entry.id);
    }
    Ok(())
}

pub async fn delete(conn: &mut SqliteConnection, id: PettyCashId) -> Result<bool> {
    let result = sqlx::query("DELETE FROM petty_cash WHERE id = ?")
        .bind(id.to_string())
        .execute(&mut *conn)
        .await
        .context("Failed to delete petty-cash entry")?;
    Ok(result.rows_affected() > 0)
}

/// Remove an office together with its petty-cash entries and expenses.
/// Returns the blob references that were attached to the removed entries.
pub async fn delete_office(conn: &mut SqliteConnection, office: OfficeId) -> Result<Vec<String>> {
    let office_str = office.to_string();

    let images: Vec<String> = sqlx::query(
        "SELECT cheque_image FROM petty_cash WHERE office_id = ? AND cheque_image IS NOT NULL",
    )
    .bind(&office_str)
    .fetch_all(&mut *conn)
    .await
    .context("Failed to collect attached images")?
    .iter()
    .map(|row| row.get("cheque_image"))
    .collect();

    sqlx::query("DELETE FROM petty_cash WHERE office_id = ?")
        .bind(&office_str)
        .execute(&mut *conn)
        .await
        .context("Failed to delete office petty-cash entries")?;
    sqlx::query("DELETE FROM expenses WHERE office_id = ?")
        .bind(&office_str)
        .execute(&mut *conn)
        .await
        .context("Failed to delete office expenses")?;
    sqlx::query("DELETE FROM offices WHERE id = ?")
        .bind(&office_str)
        .execute(&mut *conn)
        .await
        .context("Failed to delete office")?;

    Ok(images)
}

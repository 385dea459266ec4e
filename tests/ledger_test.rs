mod common;

use std::sync::Arc;

use anyhow::Result;
use common::{balances, parse_date, record, test_service, test_service_with_repo};
use pettyledger::application::{AppError, LedgerService, NewPettyCash, PettyCashChanges};
use pettyledger::domain::{AmountInput, verify_chain};

#[tokio::test]
async fn test_balance_chain_walkthrough() -> Result<()> {
    let (service, _temp) = test_service().await?;
    service.create_office("Head Office", None).await?;

    // First entry opens at zero
    let first = record(&service, "Head Office", "Float", "2024-01-05", "1000", "0").await?;
    assert_eq!(first.opening_balance, 0);
    assert_eq!(first.closing_balance, 100000);
    assert_eq!(first.remaining_amount, 100000);

    // Later entry chains from the previous closing balance
    let spend = record(&service, "Head Office", "Stationery", "2024-01-10", "0", "300").await?;
    assert_eq!(spend.opening_balance, 100000);
    assert_eq!(spend.closing_balance, 70000);

    // Backdated entry slots in between and pushes the later one up
    let topup = record(&service, "Head Office", "Top-up", "2024-01-07", "500", "0").await?;
    assert_eq!(topup.opening_balance, 100000);
    assert_eq!(topup.closing_balance, 150000);
    assert_eq!(
        balances(&service, "Head Office").await?,
        vec![(0, 100000), (100000, 150000), (150000, 120000)]
    );

    // Removing it restores the original chain
    let removed = service.remove_petty_cash(topup.id).await?;
    assert_eq!(removed.id, topup.id);
    assert_eq!(
        balances(&service, "Head Office").await?,
        vec![(0, 100000), (100000, 70000)]
    );

    // Lowering the first receipt shifts every later balance down
    let amended = service
        .amend_petty_cash(
            first.id,
            PettyCashChanges {
                amount_received: Some(AmountInput::from("800")),
                ..Default::default()
            },
        )
        .await?;
    assert_eq!(amended.closing_balance, 80000);
    assert_eq!(
        balances(&service, "Head Office").await?,
        vec![(0, 80000), (80000, 50000)]
    );

    let entries = service.list_petty_cash("Head Office").await?;
    assert!(verify_chain(&entries).is_empty());
    for entry in &entries {
        assert_eq!(entry.remaining_amount, entry.closing_balance);
    }

    Ok(())
}

#[tokio::test]
async fn test_invalid_amount_persists_nothing() -> Result<()> {
    let (service, _temp) = test_service().await?;
    service.create_office("Head Office", None).await?;

    let result = record(&service, "Head Office", "Float", "2024-01-05", "abc", "0").await;
    let err = result.unwrap_err();
    assert!(matches!(
        err.downcast_ref::<AppError>(),
        Some(AppError::Validation(_))
    ));

    let result = service
        .record_petty_cash(NewPettyCash::new(
            "Head Office",
            "Float",
            parse_date("2024-01-05"),
            -50.0,
            0.0,
        ))
        .await;
    assert!(matches!(result, Err(AppError::Validation(_))));

    assert!(service.list_petty_cash("Head Office").await?.is_empty());
    // The ledger was never touched
    assert_eq!(service.get_office("Head Office").await?.ledger_revision, 0);

    Ok(())
}

#[tokio::test]
async fn test_numeric_and_text_amounts_agree() -> Result<()> {
    let (service, _temp) = test_service().await?;
    service.create_office("Head Office", None).await?;

    let numeric = service
        .record_petty_cash(NewPettyCash::new(
            "Head Office",
            "Float",
            parse_date("2024-01-05"),
            1000.5,
            0.0,
        ))
        .await?;
    let text = record(&service, "Head Office", "Float", "2024-01-06", "1000.50", "0").await?;

    assert_eq!(numeric.amount_received, 100050);
    assert_eq!(text.amount_received, 100050);
    assert_eq!(text.closing_balance, 200100);

    // Extra decimals round the same way in both forms
    let numeric = service
        .record_petty_cash(NewPettyCash::new(
            "Head Office",
            "Courier",
            parse_date("2024-01-07"),
            0.0,
            1.999,
        ))
        .await?;
    let text = record(&service, "Head Office", "Courier", "2024-01-08", "0", "1.999").await?;

    assert_eq!(numeric.amount_spent, 200);
    assert_eq!(text.amount_spent, 200);
    assert_eq!(text.closing_balance, 199700);

    Ok(())
}

#[tokio::test]
async fn test_balance_overflow_is_rejected_and_rolled_back() -> Result<()> {
    let (service, _temp) = test_service().await?;
    service.create_office("Head Office", None).await?;
    service.create_office("Branch", None).await?;

    let huge = "50000000000000000";
    record(&service, "Head Office", "Float", "2024-01-05", huge, "0").await?;
    let revision = service.get_office("Head Office").await?.ledger_revision;

    // The new entry itself overflows
    let result = service
        .record_petty_cash(NewPettyCash::new(
            "Head Office",
            "Float",
            parse_date("2024-01-06"),
            huge,
            "0",
        ))
        .await;
    assert!(matches!(result, Err(AppError::Validation(_))));

    // The new entry fits but pushes a later one out of range
    let result = service
        .record_petty_cash(NewPettyCash::new(
            "Head Office",
            "Float",
            parse_date("2024-01-04"),
            huge,
            "0",
        ))
        .await;
    assert!(matches!(result, Err(AppError::Validation(_))));

    assert_eq!(
        balances(&service, "Head Office").await?,
        vec![(0, 5_000_000_000_000_000_000)]
    );
    assert_eq!(
        service.get_office("Head Office").await?.ledger_revision,
        revision
    );

    // Each office is in range on its own, their sum is not
    record(&service, "Branch", "Float", "2024-01-05", huge, "0").await?;
    assert!(matches!(
        service.dashboard().await,
        Err(AppError::Validation(_))
    ));
    assert_eq!(
        service.office_summary("Branch").await?.current_balance,
        5_000_000_000_000_000_000
    );

    Ok(())
}

#[tokio::test]
async fn test_unknown_office_is_not_found() -> Result<()> {
    let (service, _temp) = test_service().await?;

    let result = record(&service, "Nowhere", "Float", "2024-01-05", "10", "0").await;
    assert!(matches!(
        result.unwrap_err().downcast_ref::<AppError>(),
        Some(AppError::OfficeNotFound(_))
    ));

    Ok(())
}

#[tokio::test]
async fn test_same_date_entries_follow_insertion_order() -> Result<()> {
    let (service, _temp) = test_service().await?;
    service.create_office("Head Office", None).await?;

    let a = record(&service, "Head Office", "Float", "2024-01-05", "1000", "0").await?;
    let b = record(&service, "Head Office", "Courier", "2024-01-05", "0", "300").await?;
    let c = record(&service, "Head Office", "Refund", "2024-01-05", "50", "0").await?;

    assert!(a.sequence < b.sequence && b.sequence < c.sequence);
    assert_eq!(c.opening_balance, 70000);
    assert_eq!(c.closing_balance, 75000);

    let ids: Vec<_> = service
        .list_petty_cash("Head Office")
        .await?
        .iter()
        .map(|e| e.id)
        .collect();
    assert_eq!(ids, vec![a.id, b.id, c.id]);

    // An earlier-dated entry goes before all of them regardless of sequence
    let early = record(&service, "Head Office", "Opening", "2024-01-04", "10", "0").await?;
    assert_eq!(early.opening_balance, 0);
    assert_eq!(
        balances(&service, "Head Office").await?,
        vec![(0, 1000), (1000, 101000), (101000, 71000), (71000, 76000)]
    );

    Ok(())
}

#[tokio::test]
async fn test_moving_entry_later_recomputes_skipped_entries() -> Result<()> {
    let (service, _temp) = test_service().await?;
    service.create_office("Head Office", None).await?;

    let float = record(&service, "Head Office", "Float", "2024-01-05", "1000", "0").await?;
    record(&service, "Head Office", "Taxi", "2024-01-07", "0", "200").await?;
    record(&service, "Head Office", "Lunch", "2024-01-10", "0", "300").await?;

    let moved = service
        .amend_petty_cash(
            float.id,
            PettyCashChanges {
                date_of_payment: Some(parse_date("2024-01-12")),
                ..Default::default()
            },
        )
        .await?;

    assert_eq!(moved.opening_balance, -50000);
    assert_eq!(moved.closing_balance, 50000);
    // Month tag follows the date when it was derived from it
    assert_eq!(moved.month, "2024-01");
    assert_eq!(
        balances(&service, "Head Office").await?,
        vec![(0, -20000), (-20000, -50000), (-50000, 50000)]
    );

    // And back again
    service
        .amend_petty_cash(
            float.id,
            PettyCashChanges {
                date_of_payment: Some(parse_date("2024-01-01")),
                ..Default::default()
            },
        )
        .await?;
    assert_eq!(
        balances(&service, "Head Office").await?,
        vec![(0, 100000), (100000, 80000), (80000, 50000)]
    );

    Ok(())
}

#[tokio::test]
async fn test_amend_month_follows_date_unless_overridden() -> Result<()> {
    let (service, _temp) = test_service().await?;
    service.create_office("Head Office", None).await?;

    let entry = record(&service, "Head Office", "Float", "2024-01-31", "100", "0").await?;
    assert_eq!(entry.month, "2024-01");

    let moved = service
        .amend_petty_cash(
            entry.id,
            PettyCashChanges {
                date_of_payment: Some(parse_date("2024-02-01")),
                ..Default::default()
            },
        )
        .await?;
    assert_eq!(moved.month, "2024-02");

    let tagged = service
        .amend_petty_cash(
            entry.id,
            PettyCashChanges {
                month: Some("2024-Q1".to_string()),
                ..Default::default()
            },
        )
        .await?;
    assert_eq!(tagged.month, "2024-Q1");

    // A custom tag is left alone by later date changes
    let moved = service
        .amend_petty_cash(
            entry.id,
            PettyCashChanges {
                date_of_payment: Some(parse_date("2024-03-01")),
                ..Default::default()
            },
        )
        .await?;
    assert_eq!(moved.month, "2024-Q1");

    Ok(())
}

#[tokio::test]
async fn test_amend_and_remove_unknown_entry() -> Result<()> {
    let (service, _temp) = test_service().await?;

    let missing = uuid::Uuid::new_v4();
    let result = service
        .amend_petty_cash(missing, PettyCashChanges::default())
        .await;
    assert!(matches!(result, Err(AppError::TransactionNotFound(_))));

    let result = service.remove_petty_cash(missing).await;
    assert!(matches!(result, Err(AppError::TransactionNotFound(_))));

    Ok(())
}

#[tokio::test]
async fn test_offices_are_isolated() -> Result<()> {
    let (service, _temp) = test_service().await?;
    service.create_office("Head Office", None).await?;
    service.create_office("Branch", Some("Lahore".to_string())).await?;

    record(&service, "Head Office", "Float", "2024-01-05", "1000", "0").await?;
    let branch = record(&service, "Branch", "Float", "2024-01-06", "200", "0").await?;
    assert_eq!(branch.opening_balance, 0);

    // Backdating in one office leaves the other alone
    record(&service, "Head Office", "Top-up", "2024-01-01", "500", "0").await?;
    assert_eq!(balances(&service, "Branch").await?, vec![(0, 20000)]);
    assert_eq!(
        balances(&service, "Head Office").await?,
        vec![(0, 50000), (50000, 150000)]
    );

    let branch_revision = service.get_office("Branch").await?.ledger_revision;
    assert_eq!(branch_revision, 1);
    assert_eq!(service.get_office("Head Office").await?.ledger_revision, 2);

    Ok(())
}

#[tokio::test]
async fn test_recompute_is_idempotent_and_repairs_corruption() -> Result<()> {
    let (service, repo, _temp) = test_service_with_repo().await?;
    service.create_office("Head Office", None).await?;

    record(&service, "Head Office", "Float", "2024-01-05", "1000", "0").await?;
    let middle = record(&service, "Head Office", "Taxi", "2024-01-07", "0", "200").await?;
    record(&service, "Head Office", "Lunch", "2024-01-10", "0", "300").await?;

    // Consistent chain: nothing to do, no writes
    let revision = service.get_office("Head Office").await?.ledger_revision;
    assert_eq!(service.recompute_office("Head Office").await?, 0);
    assert_eq!(
        service.get_office("Head Office").await?.ledger_revision,
        revision
    );
    assert!(service.check_integrity().await?.is_healthy());

    // Break the chain behind the service's back
    let mut tx = repo.begin().await?;
    sqlx::query(
        "UPDATE petty_cash SET opening_balance = 1, closing_balance = 2, remaining_amount = 3 WHERE id = ?",
    )
    .bind(middle.id.to_string())
    .execute(&mut *tx)
    .await?;
    tx.commit().await?;

    let report = service.check_integrity().await?;
    assert!(!report.is_healthy());
    assert!(report.violation_count() >= 2);

    let corrected = service.recompute_office("Head Office").await?;
    assert_eq!(corrected, 1);
    assert!(service.check_integrity().await?.is_healthy());
    assert_eq!(
        balances(&service, "Head Office").await?,
        vec![(0, 100000), (100000, 80000), (80000, 50000)]
    );

    // Running it again changes nothing
    assert_eq!(service.recompute_office("Head Office").await?, 0);

    Ok(())
}

#[tokio::test]
async fn test_concurrent_inserts_keep_chain_consistent() -> Result<()> {
    let (service, _temp) = test_service().await?;
    service.create_office("Head Office", None).await?;
    service.create_office("Branch", None).await?;
    let service = Arc::new(service);

    let mut handles = Vec::new();
    for i in 0..20u32 {
        let service: Arc<LedgerService> = Arc::clone(&service);
        handles.push(tokio::spawn(async move {
            let office = if i % 4 == 0 { "Branch" } else { "Head Office" };
            let date = format!("2024-01-{:02}", 20 - i % 10);
            service
                .record_petty_cash(NewPettyCash::new(
                    office,
                    format!("Entry {}", i),
                    parse_date(&date),
                    "10",
                    "0",
                ))
                .await
        }));
    }
    for handle in handles {
        handle.await??;
    }

    let head = service.list_petty_cash("Head Office").await?;
    let branch = service.list_petty_cash("Branch").await?;
    assert_eq!(head.len(), 15);
    assert_eq!(branch.len(), 5);
    assert!(verify_chain(&head).is_empty());
    assert!(verify_chain(&branch).is_empty());
    assert_eq!(head.last().unwrap().closing_balance, 15000);
    assert_eq!(branch.last().unwrap().closing_balance, 5000);

    // Chain order is (date, sequence)
    for pair in head.windows(2) {
        assert!(pair[0].key() < pair[1].key());
    }

    Ok(())
}

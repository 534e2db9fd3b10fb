//! Database tests

use super::*;
use crate::models::*;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reconcile::{BillingCycle, MatchDecision, Outcome, Reconciler, Tier};
    use chrono::NaiveDate;
    use rusqlite::params;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    const OWNER: &str = "ana@example.com";

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn december() -> BillingCycle {
        "2025-12".parse().unwrap()
    }

    fn statement_rows() -> Vec<NewTransaction> {
        vec![
            NewTransaction::expense(date(2025, 12, 2), "Supermercado", dec!(400.00)),
            NewTransaction::expense(date(2025, 12, 9), "Posto Shell", dec!(250.27)),
            NewTransaction::expense(date(2025, 12, 20), "Restaurante", dec!(474.50)),
        ]
    }

    fn seed_statement(db: &Database) -> ImportSummary {
        db.import_statement(OWNER, Some(december()), &statement_rows())
            .unwrap()
    }

    fn create_bill(db: &Database, day: u32, amount: Decimal) -> Transaction {
        let bill = NewTransaction::expense(date(2026, 1, day), "Pagamento de fatura", amount)
            .flagged_as_bill();
        db.create_transaction(OWNER, &bill).unwrap()
    }

    fn link(db: &Database, bill_id: i64) -> LinkResult {
        let decision = Reconciler::new(db)
            .reconcile(OWNER, december(), Some(bill_id))
            .unwrap();
        db.apply_link(&decision).unwrap()
    }

    #[test]
    fn test_in_memory_db() {
        let db = Database::in_memory().unwrap();
        assert_eq!(db.count_transactions(OWNER).unwrap(), 0);
        assert!(db.list_pending_cycles(OWNER).unwrap().is_empty());
    }

    #[test]
    fn test_schema_has_reconciliation_columns() {
        let db = Database::in_memory().unwrap();
        let conn = db.conn().unwrap();

        let result: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM pragma_table_info('transactions') WHERE name IN ('billing_cycle', 'credit_card_payment_id', 'is_credit_card_payment', 'original_amount', 'expanded_at')",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(result, 5, "transactions should carry the link columns");
    }

    #[test]
    fn test_negative_amount_rejected_by_schema() {
        let db = Database::in_memory().unwrap();
        let conn = db.conn().unwrap();

        let result = conn.execute(
            "INSERT INTO transactions (owner_id, date, description, amount) VALUES (?, '2025-12-01', 'x', -1.0)",
            params![OWNER],
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_create_and_get_transaction() {
        let db = Database::in_memory().unwrap();
        let bill = create_bill(&db, 13, dec!(1124.77));

        assert!(bill.is_credit_card_payment);
        assert_eq!(bill.amount, dec!(1124.77));
        assert_eq!(bill.bill_state, BillState::Plain);
        assert_eq!(bill.card_link, CardLink::Unlinked);

        let fetched = db.get_transaction(OWNER, bill.id).unwrap().unwrap();
        assert_eq!(fetched, bill);

        // Other owners cannot see it
        assert!(db.get_transaction("other@example.com", bill.id).unwrap().is_none());
    }

    #[test]
    fn test_create_requires_description() {
        let db = Database::in_memory().unwrap();
        let tx = NewTransaction::expense(date(2026, 1, 1), "  ", dec!(10));
        assert!(matches!(
            db.create_transaction(OWNER, &tx),
            Err(Error::InvalidData(_))
        ));
    }

    #[test]
    fn test_import_statement_is_idempotent() {
        let db = Database::in_memory().unwrap();

        let first = seed_statement(&db);
        assert_eq!(first.billing_cycle, december());
        assert_eq!(first.imported, 3);
        assert_eq!(first.skipped, 0);

        let second = seed_statement(&db);
        assert_eq!(second.imported, 0);
        assert_eq!(second.skipped, 3);

        let pending = db.pending_rows(OWNER, december()).unwrap();
        assert_eq!(pending.len(), 3);
        assert!(pending.iter().all(|t| t.is_pending()));
    }

    #[test]
    fn test_import_cycle_defaults_to_latest_row() {
        let db = Database::in_memory().unwrap();
        let rows = vec![
            NewTransaction::expense(date(2025, 11, 28), "Farmacia", dec!(30)),
            NewTransaction::expense(date(2025, 12, 3), "Padaria", dec!(12)),
        ];

        let summary = db.import_statement(OWNER, None, &rows).unwrap();
        assert_eq!(summary.billing_cycle, december());
    }

    #[test]
    fn test_import_empty_statement_fails() {
        let db = Database::in_memory().unwrap();
        assert!(matches!(
            db.import_statement(OWNER, None, &[]),
            Err(Error::Import(_))
        ));
    }

    #[test]
    fn test_pending_cycles_and_status() {
        let db = Database::in_memory().unwrap();
        assert_eq!(db.cycle_status(OWNER, december()).unwrap(), CycleStatus::NoData);

        seed_statement(&db);
        let cycles = db.list_pending_cycles(OWNER).unwrap();
        assert_eq!(cycles.len(), 1);
        assert_eq!(cycles[0].billing_cycle, december());
        assert_eq!(cycles[0].transaction_count, 3);
        assert_eq!(cycles[0].total, dec!(1124.77));

        assert_eq!(
            db.cycle_status(OWNER, december()).unwrap(),
            CycleStatus::Pending { count: 3 }
        );
    }

    #[test]
    fn test_link_expands_bill() {
        let db = Database::in_memory().unwrap();
        seed_statement(&db);
        let bill = create_bill(&db, 13, dec!(1124.77));

        let result = link(&db, bill.id);
        assert_eq!(result.linked_count, 3);
        assert_eq!(result.total_linked, 3);
        assert_eq!(result.tier, Some(Tier::ExactMatch));
        assert!(!result.already_linked);

        let bill = db.get_transaction(OWNER, bill.id).unwrap().unwrap();
        assert_eq!(bill.amount, Decimal::ZERO);
        assert_eq!(bill.bill_state.original_amount(), Some(dec!(1124.77)));

        let rows = db.linked_rows(OWNER, bill.id).unwrap();
        assert_eq!(rows.len(), 3);
        assert!(rows.iter().all(|r| r.card_link == CardLink::Linked(bill.id)));

        assert_eq!(
            db.cycle_status(OWNER, december()).unwrap(),
            CycleStatus::Linked {
                bill_id: bill.id,
                count: 3
            }
        );
        assert!(db.list_pending_cycles(OWNER).unwrap().is_empty());
    }

    #[test]
    fn test_link_is_idempotent() {
        let db = Database::in_memory().unwrap();
        seed_statement(&db);
        let bill = create_bill(&db, 13, dec!(1124.77));

        let decision = Reconciler::new(&db)
            .reconcile(OWNER, december(), None)
            .unwrap();
        db.apply_link(&decision).unwrap();

        // Replaying the same decision changes nothing
        let again = db.apply_link(&decision).unwrap();
        assert!(again.already_linked);
        assert_eq!(again.linked_count, 0);
        assert_eq!(again.total_linked, 3);

        // Snapshot taken once
        let bill = db.get_transaction(OWNER, bill.id).unwrap().unwrap();
        assert_eq!(bill.bill_state.original_amount(), Some(dec!(1124.77)));
    }

    #[test]
    fn test_link_and_unlink_round_trip() {
        let db = Database::in_memory().unwrap();
        seed_statement(&db);
        let bill = create_bill(&db, 13, dec!(1124.77));
        let before = db.pending_rows(OWNER, december()).unwrap();

        link(&db, bill.id);
        let unlinked = db.apply_unlink(OWNER, bill.id).unwrap();
        assert_eq!(unlinked.restored_count, 3);
        assert_eq!(unlinked.restored_amount, dec!(1124.77));
        assert_eq!(unlinked.billing_cycle, Some(december()));

        let restored = db.get_transaction(OWNER, bill.id).unwrap().unwrap();
        assert_eq!(restored.amount, dec!(1124.77));
        assert_eq!(restored.bill_state, BillState::Plain);
        assert_eq!(db.pending_rows(OWNER, december()).unwrap(), before);
    }

    #[test]
    fn test_unlink_plain_bill_fails() {
        let db = Database::in_memory().unwrap();
        let bill = create_bill(&db, 13, dec!(100));

        assert!(matches!(
            db.apply_unlink(OWNER, bill.id),
            Err(Error::NotExpanded { bill_id }) if bill_id == bill.id
        ));
        assert!(matches!(
            db.apply_unlink(OWNER, 9999),
            Err(Error::NotFound(_))
        ));
    }

    #[test]
    fn test_cycle_linked_elsewhere_conflicts() {
        let db = Database::in_memory().unwrap();
        seed_statement(&db);
        let first = create_bill(&db, 10, dec!(1124.77));
        let second = create_bill(&db, 13, dec!(1124.77));

        link(&db, first.id);

        // Import one more row so there is something to link
        let late = vec![NewTransaction::expense(date(2025, 12, 30), "Cinema", dec!(40))];
        db.import_statement(OWNER, Some(december()), &late).unwrap();

        let decision = Reconciler::new(&db)
            .reconcile(OWNER, december(), Some(second.id))
            .unwrap();
        assert!(matches!(db.apply_link(&decision), Err(Error::Conflict(_))));
    }

    #[test]
    fn test_bill_holding_other_cycle_conflicts() {
        let db = Database::in_memory().unwrap();
        seed_statement(&db);
        let bill = create_bill(&db, 13, dec!(1124.77));
        link(&db, bill.id);

        let november: BillingCycle = "2025-11".parse().unwrap();
        let rows = vec![NewTransaction::expense(date(2025, 11, 5), "Livraria", dec!(80))];
        db.import_statement(OWNER, Some(november), &rows).unwrap();

        let decision = Reconciler::new(&db)
            .reconcile(OWNER, november, Some(bill.id))
            .unwrap();
        assert!(matches!(db.apply_link(&decision), Err(Error::Conflict(_))));
    }

    #[test]
    fn test_apply_link_requires_chosen_bill() {
        let db = Database::in_memory().unwrap();
        seed_statement(&db);

        let decision = Reconciler::new(&db).reconcile(OWNER, december(), None).unwrap();
        assert_eq!(decision.outcome, Outcome::NoMatch);
        assert!(matches!(db.apply_link(&decision), Err(Error::NoBillChosen)));
    }

    #[test]
    fn test_stale_decision_conflicts() {
        let db = Database::in_memory().unwrap();
        seed_statement(&db);
        let bill = create_bill(&db, 13, dec!(1124.77));

        let decision: MatchDecision = Reconciler::new(&db)
            .reconcile(OWNER, december(), None)
            .unwrap();
        assert_eq!(decision.outcome, Outcome::AutoLink);

        // Rows disappear between decision and apply
        let conn = db.conn().unwrap();
        conn.execute(
            "UPDATE transactions SET archived = 1 WHERE billing_cycle = ?",
            params![december().to_string()],
        )
        .unwrap();
        drop(conn);

        assert!(matches!(db.apply_link(&decision), Err(Error::Conflict(_))));
        let bill = db.get_transaction(OWNER, bill.id).unwrap().unwrap();
        assert_eq!(bill.bill_state, BillState::Plain);
    }

    #[test]
    fn test_archived_and_deleted_rows_are_excluded() {
        let db = Database::in_memory().unwrap();
        seed_statement(&db);
        let pending = db.pending_rows(OWNER, december()).unwrap();

        db.set_transaction_archived(OWNER, pending[0].id, true).unwrap();
        db.delete_transaction(OWNER, pending[1].id).unwrap();

        let remaining = db.pending_rows(OWNER, december()).unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].id, pending[2].id);
        assert_eq!(db.count_transactions(OWNER).unwrap(), 1);

        // Archived bills are not candidates either
        let bill = create_bill(&db, 13, dec!(474.50));
        db.set_transaction_archived(OWNER, bill.id, true).unwrap();
        let candidates = Reconciler::new(&db).find_candidates(OWNER, december()).unwrap();
        assert!(candidates.is_empty());
    }

    #[test]
    fn test_expanded_bill_cannot_be_deleted() {
        let db = Database::in_memory().unwrap();
        seed_statement(&db);
        let bill = create_bill(&db, 13, dec!(1124.77));
        link(&db, bill.id);

        assert!(matches!(
            db.delete_transaction(OWNER, bill.id),
            Err(Error::InvalidData(_))
        ));

        db.apply_unlink(OWNER, bill.id).unwrap();
        db.delete_transaction(OWNER, bill.id).unwrap();
        assert!(db.get_transaction(OWNER, bill.id).unwrap().is_none());
    }

    #[test]
    fn test_concurrent_links_serialize() {
        let db = Database::in_memory().unwrap();
        seed_statement(&db);
        let bill = create_bill(&db, 13, dec!(1124.77));

        let db = &db;
        let results: Vec<Result<LinkResult>> = std::thread::scope(|s| {
            let handles: Vec<_> = (0..2)
                .map(|_| {
                    s.spawn(move || -> Result<LinkResult> {
                        let decision = Reconciler::new(db).reconcile(OWNER, december(), None)?;
                        db.apply_link(&decision)
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        let fresh = results
            .iter()
            .filter(|r| matches!(r, Ok(link) if !link.already_linked))
            .count();
        assert_eq!(fresh, 1, "exactly one writer links: {:?}", results);
        for result in &results {
            match result {
                Ok(link) => assert_eq!(link.bill_id, bill.id),
                Err(e) => assert!(matches!(e, Error::Conflict(_)), "unexpected error: {}", e),
            }
        }

        let bill = db.get_transaction(OWNER, bill.id).unwrap().unwrap();
        assert_eq!(bill.bill_state.original_amount(), Some(dec!(1124.77)));
        assert_eq!(db.linked_rows(OWNER, bill.id).unwrap().len(), 3);
    }

    #[test]
    fn test_concurrent_links_to_different_bills() {
        let db = Database::in_memory().unwrap();
        seed_statement(&db);
        let first = create_bill(&db, 10, dec!(1124.77));
        let second = create_bill(&db, 13, dec!(1124.77));

        // Both decisions are taken before either writer commits
        let decisions: Vec<MatchDecision> = [first.id, second.id]
            .iter()
            .map(|id| {
                Reconciler::new(&db)
                    .reconcile(OWNER, december(), Some(*id))
                    .unwrap()
            })
            .collect();

        let db = &db;
        let results: Vec<Result<LinkResult>> = std::thread::scope(|s| {
            let handles: Vec<_> = decisions
                .iter()
                .map(|decision| s.spawn(move || db.apply_link(decision)))
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        let winners: Vec<i64> = results
            .iter()
            .filter_map(|r| r.as_ref().ok().map(|link| link.bill_id))
            .collect();
        assert_eq!(winners.len(), 1, "exactly one writer links: {:?}", results);
        assert_eq!(
            results
                .iter()
                .filter(|r| matches!(r, Err(Error::Conflict(_))))
                .count(),
            1
        );

        let expanded: Vec<i64> = [first.id, second.id]
            .into_iter()
            .filter(|id| {
                db.get_transaction(OWNER, *id)
                    .unwrap()
                    .unwrap()
                    .bill_state
                    .is_expanded()
            })
            .collect();
        assert_eq!(expanded, winners);
        assert_eq!(
            db.cycle_status(OWNER, december()).unwrap(),
            CycleStatus::Linked {
                bill_id: winners[0],
                count: 3
            }
        );
    }

    #[test]
    fn test_owners_are_isolated() {
        let db = Database::in_memory().unwrap();
        seed_statement(&db);
        let other = "bruno@example.com";

        assert_eq!(db.cycle_status(other, december()).unwrap(), CycleStatus::NoData);

        // Same statement for another owner is not a duplicate
        let summary = db
            .import_statement(other, Some(december()), &statement_rows())
            .unwrap();
        assert_eq!(summary.imported, 3);
    }

    #[test]
    fn test_audit_log() {
        let db = Database::in_memory().unwrap();
        db.log_audit(OWNER, "link", Some("transaction"), Some(1), Some("{}"))
            .unwrap();
        db.log_audit(OWNER, "unlink", Some("transaction"), Some(1), None)
            .unwrap();
        db.log_audit("other@example.com", "link", None, None, None)
            .unwrap();

        let entries = db.list_audit_log(OWNER, 10).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].action, "unlink");
        assert_eq!(entries[1].action, "link");
    }
}

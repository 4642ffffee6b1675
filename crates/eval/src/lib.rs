//! Vantage Ledger calculation engine.
//!
//! Turns a validated rule set plus committed rows into per-entity payout
//! results, persisted as an atomically replaced batch. Money math is
//! `rust_decimal` end to end with half-even rounding at payout
//! boundaries; no float enters the evaluation path.

pub mod aggregate;
pub mod batch;
pub mod component;
pub mod engine;
pub mod numeric;
pub mod types;

pub use batch::transition_batch;
pub use component::evaluate_component;
pub use engine::run;
pub use numeric::{round_money, safe_ratio, select_band, MONEY_SCALE};
pub use types::{EngineError, RunOutcome, TraceEntry};

// ──────────────────────────────────────────────
// End-to-end tests
// ──────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    use rust_decimal::Decimal;
    use vl_core::{BatchState, CommittedDataRow, Entity, Period, TenantContext};
    use vl_storage::{MemoryStore, StorageError, VantageStore};

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn ctx() -> TenantContext {
        TenantContext::new("t1")
    }

    fn period() -> Period {
        Period {
            id: "p1".into(),
            tenant_id: "t1".into(),
            canonical_key: "2024-01".into(),
            label: "January 2024".into(),
            start_date: "2024-01-01".into(),
            end_date: "2024-01-31".into(),
            status: "open".into(),
        }
    }

    fn entity(id: &str, external: &str) -> Entity {
        Entity {
            id: id.into(),
            tenant_id: "t1".into(),
            external_id: external.into(),
            metadata: serde_json::Map::new(),
        }
    }

    fn txn_row(id: &str, entity_id: &str, amount: i64) -> CommittedDataRow {
        CommittedDataRow {
            id: id.into(),
            tenant_id: "t1".into(),
            entity_id: Some(entity_id.into()),
            period_id: Some("p1".into()),
            data_type: "transactions".into(),
            row_data: serde_json::json!({ "amount": amount })
                .as_object()
                .unwrap()
                .clone(),
            metadata: serde_json::Value::Null,
        }
    }

    fn plan_json() -> serde_json::Value {
        serde_json::json!({
            "id": "rs1",
            "tenant_id": "t1",
            "status": "active",
            "components": [
                {
                    "type": "percentage",
                    "id": "comm",
                    "name": "Base Commission",
                    "applied_to": "net_revenue",
                    "rate": "0.05"
                },
                {
                    "type": "tier_lookup",
                    "id": "bonus",
                    "name": "Volume Bonus",
                    "metric": "net_revenue",
                    "tiers": [
                        { "lower": "0", "upper": "60000", "payout": "0" },
                        { "lower": "60000", "upper": null, "payout": "2500" }
                    ]
                }
            ],
            "input_bindings": {
                "metric_derivations": [
                    {
                        "metric": "net_revenue",
                        "source_pattern": "transaction",
                        "operation": { "op": "sum", "field": "amount" }
                    }
                ]
            }
        })
    }

    fn seeded_store() -> MemoryStore {
        let store = MemoryStore::new();
        store.seed_period(period());
        store.seed_entity(entity("e1", "EMP-001"));
        store.seed_entity(entity("e2", "EMP-002"));
        store.seed_rule_set("t1", "rs1", plan_json());
        store.seed_row(txn_row("r1", "e1", 40000));
        store.seed_row(txn_row("r2", "e1", 20000));
        store.seed_row(txn_row("r3", "e2", 10000));
        store
    }

    #[tokio::test]
    async fn run_produces_one_result_per_entity() {
        let store = seeded_store();
        let outcome = run(&store, &ctx(), "p1", "rs1").await.unwrap();

        assert_eq!(outcome.entity_count, 2);
        assert_eq!(outcome.result_count, 2);

        // e1: 60000 revenue -> 3000 commission + 2500 bonus (60000 lands
        // in the upper tier on the inclusive lower bound).
        let e1 = outcome
            .results
            .iter()
            .find(|r| r.external_id == "EMP-001")
            .unwrap();
        assert_eq!(e1.total_payout, dec("5500.00"));

        // e2: 10000 revenue -> 500 commission, no bonus.
        let e2 = outcome
            .results
            .iter()
            .find(|r| r.external_id == "EMP-002")
            .unwrap();
        assert_eq!(e2.total_payout, dec("500.00"));

        assert_eq!(outcome.total_payout, dec("6000.00"));
    }

    #[tokio::test]
    async fn batch_starts_in_draft_and_is_queryable() {
        let store = seeded_store();
        let outcome = run(&store, &ctx(), "p1", "rs1").await.unwrap();

        let batch = store.get_batch(&ctx(), &outcome.batch_id).await.unwrap();
        assert_eq!(batch.state, BatchState::Draft);
        assert_eq!(batch.entity_count, 2);
        assert_eq!(batch.total_payout, dec("6000.00"));

        let results = store.list_results(&ctx(), &outcome.batch_id).await.unwrap();
        assert_eq!(results.len(), 2);
    }

    #[tokio::test]
    async fn rerun_replaces_results_not_duplicates() {
        let store = seeded_store();
        let first = run(&store, &ctx(), "p1", "rs1").await.unwrap();
        let second = run(&store, &ctx(), "p1", "rs1").await.unwrap();

        assert_eq!(first.total_payout, second.total_payout);
        assert!(second
            .log
            .iter()
            .any(|l| l.contains("replaced 2 previous results")));

        // Identical content, traces included; only the batch id differs.
        let strip = |rs: &[vl_storage::CalculationResultRecord]| {
            rs.iter()
                .cloned()
                .map(|mut r| {
                    r.batch_id.clear();
                    r
                })
                .collect::<Vec<_>>()
        };
        assert_eq!(strip(&first.results), strip(&second.results));

        // Only the second batch's results are live.
        let live = store.list_results(&ctx(), &second.batch_id).await.unwrap();
        assert_eq!(live.len(), 2);
        let stale = store.list_results(&ctx(), &first.batch_id).await.unwrap();
        assert!(stale.is_empty());
    }

    #[tokio::test]
    async fn concurrent_run_on_same_key_is_rejected() {
        let store = seeded_store();
        store.try_lock_run(&ctx(), "p1", "rs1").await.unwrap();

        let err = run(&store, &ctx(), "p1", "rs1").await.unwrap_err();
        match err {
            EngineError::Storage(StorageError::RunInProgress { .. }) => {}
            other => panic!("expected RunInProgress, got {other}"),
        }

        store.unlock_run(&ctx(), "p1", "rs1").await.unwrap();
        assert!(run(&store, &ctx(), "p1", "rs1").await.is_ok());
    }

    #[tokio::test]
    async fn entity_without_rows_gets_zero_result() {
        let store = seeded_store();
        store.seed_entity(entity("e3", "EMP-003"));
        let outcome = run(&store, &ctx(), "p1", "rs1").await.unwrap();

        let e3 = outcome
            .results
            .iter()
            .find(|r| r.external_id == "EMP-003")
            .unwrap();
        // Sum over zero rows is zero, so the commission pays zero and the
        // tier lookup lands in the first (zero-payout) band.
        assert_eq!(e3.total_payout, dec("0.00"));
        assert_eq!(e3.components.len(), 2);
    }

    #[tokio::test]
    async fn invalid_plan_aborts_before_any_write() {
        let store = MemoryStore::new();
        store.seed_period(period());
        store.seed_entity(entity("e1", "EMP-001"));
        // Descending tiers fail validation.
        store.seed_rule_set(
            "t1",
            "bad",
            serde_json::json!({
                "id": "bad",
                "tenant_id": "t1",
                "status": "active",
                "components": [{
                    "type": "tier_lookup",
                    "id": "t",
                    "name": "T",
                    "metric": "net_revenue",
                    "tiers": [
                        { "lower": "60000", "upper": null, "payout": "2500" },
                        { "lower": "0", "upper": "60000", "payout": "0" }
                    ]
                }],
                "input_bindings": { "metric_derivations": [] }
            }),
        );

        let err = run(&store, &ctx(), "p1", "bad").await.unwrap_err();
        assert!(matches!(err, EngineError::Plan(_)));
        // Lock must be released after the failed run.
        assert!(!store.run_locked(&ctx(), "p1", "bad").await.unwrap());
    }

    #[tokio::test]
    async fn lifecycle_happy_path_and_rejection() {
        let store = seeded_store();
        let outcome = run(&store, &ctx(), "p1", "rs1").await.unwrap();
        let id = outcome.batch_id.as_str();

        let batch = transition_batch(&store, &ctx(), id, BatchState::Preview)
            .await
            .unwrap();
        assert_eq!(batch.state, BatchState::Preview);

        // Skipping ahead is rejected without mutating state.
        let err = transition_batch(&store, &ctx(), id, BatchState::Posted)
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Lifecycle(_)));
        let batch = store.get_batch(&ctx(), id).await.unwrap();
        assert_eq!(batch.state, BatchState::Preview);

        let batch = transition_batch(&store, &ctx(), id, BatchState::Rejected)
            .await
            .unwrap();
        assert_eq!(batch.state, BatchState::Rejected);
    }

    #[tokio::test]
    async fn transition_blocked_while_run_holds_lock() {
        let store = seeded_store();
        let outcome = run(&store, &ctx(), "p1", "rs1").await.unwrap();

        store.try_lock_run(&ctx(), "p1", "rs1").await.unwrap();
        let err = transition_batch(&store, &ctx(), &outcome.batch_id, BatchState::Preview)
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::BatchBusy { .. }));
    }

    #[tokio::test]
    async fn group_level_rows_join_through_roster() {
        let store = MemoryStore::new();
        store.seed_period(period());
        store.seed_entity(entity("e1", "EMP-001"));
        store.seed_rule_set(
            "t1",
            "rs1",
            serde_json::json!({
                "id": "rs1",
                "tenant_id": "t1",
                "status": "active",
                "components": [{
                    "type": "percentage",
                    "id": "comm",
                    "name": "Store Commission",
                    "applied_to": "net_revenue",
                    "rate": "0.01"
                }],
                "input_bindings": {
                    "group_field": "store",
                    "metric_derivations": [{
                        "metric": "net_revenue",
                        "source_pattern": "store_sales",
                        "operation": { "op": "sum", "field": "amount" }
                    }]
                }
            }),
        );
        store.seed_row(CommittedDataRow {
            id: "roster1".into(),
            tenant_id: "t1".into(),
            entity_id: Some("e1".into()),
            period_id: None,
            data_type: "roster".into(),
            row_data: serde_json::json!({ "store": "4417" })
                .as_object()
                .unwrap()
                .clone(),
            metadata: serde_json::Value::Null,
        });
        store.seed_row(CommittedDataRow {
            id: "s1".into(),
            tenant_id: "t1".into(),
            entity_id: None,
            period_id: Some("p1".into()),
            data_type: "store_sales".into(),
            row_data: serde_json::json!({ "store": 4417, "amount": 125000 })
                .as_object()
                .unwrap()
                .clone(),
            metadata: serde_json::Value::Null,
        });

        let outcome = run(&store, &ctx(), "p1", "rs1").await.unwrap();
        assert_eq!(outcome.results[0].total_payout, dec("1250.00"));
    }
}

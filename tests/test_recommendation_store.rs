mod common;

use std::sync::Arc;

use chrono::Duration;
use common::{backends, draft, plan, step, t0, AUDIT_CAPACITY};
use holistic_planner::application::recommendations::{RecommendationsUseCase, RetryOutcome};
use holistic_planner::domain::error::DomainError;
use holistic_planner::domain::ports::clock::Clock;
use holistic_planner::domain::ports::recommendation_repository::RecommendationRepository;
use holistic_planner::domain::values::audit::PreFilteredSecurity;
use holistic_planner::domain::values::audit::{RejectedSequence, RejectionReason};
use holistic_planner::domain::values::evaluation::InfeasibilityReason;
use holistic_planner::domain::values::recommendation_status::RecommendationStatus;
use holistic_planner::domain::values::trade_side::TradeSide;
use holistic_planner::infrastructure::clock::ManualClock;
use holistic_planner::infrastructure::sqlite::migrations::run_migrations;
use holistic_planner::infrastructure::sqlite::recommendation_repo::SqliteRecommendationRepo;
use rusqlite::Connection;

#[test]
fn test_create_or_update_dedupes_pending() {
    for b in backends() {
        let first = b
            .repo
            .create_or_update(draft("AAPL", TradeSide::Buy, "rebalance", "h1", 0.0))
            .unwrap();
        let mut second = draft("AAPL", TradeSide::Buy, "rebalance", "h1", 0.0);
        second.quantity = 25;
        second.estimated_price = 180.0;
        let again = b.repo.create_or_update(second).unwrap();

        assert_eq!(first, again, "{}", b.name);
        let rec = b.repo.get_recommendation(&first).unwrap().unwrap();
        assert_eq!(rec.quantity, 25, "{}", b.name);
        assert!((rec.estimated_price - 180.0).abs() < 1e-9, "{}", b.name);
        assert_eq!(b.repo.get_pending_recommendations(0).unwrap().len(), 1, "{}", b.name);
    }
}

#[test]
fn test_different_reason_creates_new_record() {
    for b in backends() {
        let a = b
            .repo
            .create_or_update(draft("AAPL", TradeSide::Buy, "rebalance", "h1", 0.0))
            .unwrap();
        let c = b
            .repo
            .create_or_update(draft("AAPL", TradeSide::Buy, "opportunity", "h1", 1.0))
            .unwrap();
        assert_ne!(a, c, "{}", b.name);
    }
}

#[test]
fn test_pending_ordered_by_priority() {
    for b in backends() {
        for (symbol, priority) in [("C", 2.0), ("A", 0.0), ("B", 1.0)] {
            b.repo
                .create_or_update(draft(symbol, TradeSide::Buy, "r", "h1", priority))
                .unwrap();
        }
        let pending = b.repo.get_pending_recommendations(0).unwrap();
        let priorities: Vec<f64> = pending.iter().map(|r| r.priority).collect();
        assert_eq!(priorities, vec![0.0, 1.0, 2.0], "{}", b.name);

        let limited = b.repo.get_pending_recommendations(2).unwrap();
        assert_eq!(limited.len(), 2, "{}", b.name);
        assert_eq!(limited[0].symbol, "A", "{}", b.name);
    }
}

#[test]
fn test_equal_priority_keeps_creation_order() {
    for b in backends() {
        for symbol in ["X", "Y", "Z"] {
            b.repo
                .create_or_update(draft(symbol, TradeSide::Sell, "r", "h1", 0.0))
                .unwrap();
        }
        let symbols: Vec<String> = b
            .repo
            .get_pending_recommendations(0)
            .unwrap()
            .into_iter()
            .map(|r| r.symbol)
            .collect();
        assert_eq!(symbols, vec!["X", "Y", "Z"], "{}", b.name);
    }
}

#[test]
fn test_delete_older_than_boundary() {
    for b in backends() {
        let now = common::t0();
        b.clock.set(now - Duration::hours(25));
        b.repo
            .create_or_update(draft("OLD", TradeSide::Buy, "r", "h1", 0.0))
            .unwrap();
        b.clock.set(now - Duration::hours(1));
        b.repo
            .create_or_update(draft("NEW", TradeSide::Buy, "r", "h1", 1.0))
            .unwrap();
        b.clock.set(now);

        let deleted = b.repo.delete_older_than(Duration::hours(24)).unwrap();
        assert_eq!(deleted, 1, "{}", b.name);
        let left = b.repo.get_pending_recommendations(0).unwrap();
        assert_eq!(left.len(), 1, "{}", b.name);
        assert_eq!(left[0].symbol, "NEW", "{}", b.name);
    }
}

#[test]
fn test_store_empty_plan_dismisses_pending() {
    for b in backends() {
        b.repo
            .create_or_update(draft("AAPL", TradeSide::Buy, "r", "h1", 0.0))
            .unwrap();
        b.repo
            .create_or_update(draft("MSFT", TradeSide::Sell, "r", "h1", 1.0))
            .unwrap();

        let stored = b.repo.store_plan(&plan(vec![]), "h2").unwrap();
        assert_eq!(stored, 0, "{}", b.name);
        assert!(b.repo.get_pending_recommendations(0).unwrap().is_empty(), "{}", b.name);
    }
}

#[test]
fn test_store_plan_replaces_previous_plan() {
    for b in backends() {
        let first = plan(vec![step(1, TradeSide::Buy, "AAA", 1, 10.0, 0.5, 0.55)]);
        b.repo.store_plan(&first, "h1").unwrap();
        let old = b.repo.get_pending_recommendations(0).unwrap();
        assert_eq!(old.len(), 1, "{}", b.name);

        let second = plan(vec![
            step(1, TradeSide::Sell, "BBB", 2, 10.0, 0.5, 0.52),
            step(2, TradeSide::Buy, "CCC", 1, 10.0, 0.52, 0.58),
        ]);
        assert_eq!(b.repo.store_plan(&second, "h2").unwrap(), 2, "{}", b.name);

        let pending = b.repo.get_pending_recommendations(0).unwrap();
        let symbols: Vec<&str> = pending.iter().map(|r| r.symbol.as_str()).collect();
        assert_eq!(symbols, vec!["BBB", "CCC"], "{}", b.name);
        let dismissed = b.repo.get_recommendation(&old[0].uuid).unwrap().unwrap();
        assert_eq!(dismissed.status, RecommendationStatus::Dismissed, "{}", b.name);
    }
}

#[test]
fn test_plan_view_tracks_running_cash() {
    for b in backends() {
        let p = plan(vec![
            step(1, TradeSide::Sell, "AAPL", 2, 170.0, 0.50, 0.53),
            step(2, TradeSide::Buy, "MSFT", 5, 150.0, 0.53, 0.61),
        ]);
        b.repo.store_plan(&p, "h1").unwrap();

        let view = b.repo.get_recommendations_as_plan(None, 1000.0).unwrap();
        assert_eq!(view.steps.len(), 2, "{}", b.name);
        let s1 = &view.steps[0];
        assert_eq!(s1.step, 1);
        assert!((s1.available_cash_before - 1000.0).abs() < 1e-9, "{}", b.name);
        assert!((s1.available_cash_after - 1340.0).abs() < 1e-9, "{}", b.name);
        let s2 = &view.steps[1];
        assert_eq!(s2.step, 2);
        assert!((s2.available_cash_before - 1340.0).abs() < 1e-9, "{}", b.name);
        assert!((s2.available_cash_after - 590.0).abs() < 1e-9, "{}", b.name);

        assert!((view.final_available_cash - 590.0).abs() < 1e-9, "{}", b.name);
        assert!((view.current_score - 0.50).abs() < 1e-9, "{}", b.name);
        assert!((view.end_state_score - 0.61).abs() < 1e-9, "{}", b.name);
        assert!((view.total_score_improvement - 0.11).abs() < 1e-9, "{}", b.name);
        assert_eq!(view.portfolio_hash.as_deref(), Some("h1"));
    }
}

#[test]
fn test_plan_view_flags_emergencies_and_attaches_audit() {
    for b in backends() {
        let mut urgent = step(1, TradeSide::Sell, "AAPL", 2, 170.0, 0.5, 0.6);
        urgent.reason = "Stop loss triggered due to margin call".to_string();
        b.repo.store_plan(&plan(vec![urgent]), "h1").unwrap();
        b.repo
            .store_rejected_sequences(
                "h1",
                vec![RejectedSequence {
                    rank: 2,
                    pattern: "direct_buy".to_string(),
                    sequence_hash: "abc".to_string(),
                    actions: vec![],
                    score: 0.0,
                    feasible: false,
                    reason: RejectionReason::Infeasible(InfeasibilityReason::InsufficientCash),
                }],
            )
            .unwrap();
        b.repo.store_evaluated_count("h1", 17).unwrap();

        let lookup = |hash: &str| -> Result<usize, DomainError> { Ok(b.repo.get_evaluated_count(hash)?.unwrap_or(0)) };
        let view = b.repo.get_recommendations_as_plan(Some(&lookup), 0.0).unwrap();
        assert!(view.steps[0].is_emergency, "{}", b.name);
        assert_eq!(view.evaluated_count, Some(17), "{}", b.name);
        let rejected = view.rejected_sequences.expect("rejected sequences attached");
        assert_eq!(rejected[0].reason.to_string(), "insufficient_cash");
        assert!(view.rejected_opportunities.is_none(), "{}", b.name);
    }
}

fn filtered(symbol: &str) -> PreFilteredSecurity {
    PreFilteredSecurity {
        isin: format!("ISIN-{symbol}"),
        symbol: symbol.to_string(),
        name: symbol.to_string(),
        calculator: "opportunity_buys".to_string(),
        reasons: vec!["dismissed by user".to_string()],
    }
}

#[test]
fn test_plan_view_after_hold_run_keeps_audit() {
    for b in backends() {
        b.repo.store_plan(&plan(vec![step(1, TradeSide::Buy, "AAA", 1, 10.0, 0.5, 0.55)]), "h0").unwrap();
        b.repo.store_pre_filtered_securities("h0", vec![filtered("OLD")]).unwrap();

        b.clock.advance(Duration::minutes(5));
        b.repo.store_pre_filtered_securities("h1", vec![filtered("BBB")]).unwrap();
        b.repo.store_evaluated_count("h1", 0).unwrap();
        b.repo.store_plan(&plan(vec![]), "h1").unwrap();

        let lookup = |hash: &str| -> Result<usize, DomainError> { Ok(b.repo.get_evaluated_count(hash)?.unwrap_or(0)) };
        let view = b.repo.get_recommendations_as_plan(Some(&lookup), 250.0).unwrap();
        assert!(view.steps.is_empty(), "{}", b.name);
        assert_eq!(view.portfolio_hash.as_deref(), Some("h1"), "{}", b.name);
        assert_eq!(view.evaluated_count, Some(0), "{}", b.name);
        let pre = view.pre_filtered_securities.expect("pre-filtered securities attached");
        assert_eq!(pre[0].symbol, "BBB", "{}", b.name);
        assert!((view.final_available_cash - 250.0).abs() < 1e-9, "{}", b.name);
    }
}

#[test]
fn test_plan_view_without_any_audit_is_empty() {
    for b in backends() {
        let view = b.repo.get_recommendations_as_plan(None, 100.0).unwrap();
        assert!(view.steps.is_empty(), "{}", b.name);
        assert!(view.portfolio_hash.is_none(), "{}", b.name);
        assert!(view.pre_filtered_securities.is_none(), "{}", b.name);
        assert!((view.final_available_cash - 100.0).abs() < 1e-9, "{}", b.name);
    }
}

#[test]
fn test_sqlite_failed_plan_write_keeps_previous_plan() {
    let conn = Connection::open_in_memory().unwrap();
    run_migrations(&conn).unwrap();
    conn.execute_batch(
        "CREATE TRIGGER reject_bad BEFORE INSERT ON recommendations
         WHEN NEW.symbol = 'BAD'
         BEGIN SELECT RAISE(ABORT, 'rejected'); END;",
    )
    .unwrap();
    let clock = Arc::new(ManualClock::new(t0()));
    let repo = SqliteRecommendationRepo::new(conn, clock as Arc<dyn Clock>, AUDIT_CAPACITY);

    repo.store_plan(&plan(vec![step(1, TradeSide::Buy, "OLD", 1, 10.0, 0.5, 0.55)]), "h1")
        .unwrap();

    let next = plan(vec![
        step(1, TradeSide::Buy, "GOOD", 1, 10.0, 0.5, 0.52),
        step(2, TradeSide::Buy, "BAD", 1, 10.0, 0.52, 0.6),
    ]);
    let err = repo.store_plan(&next, "h2").unwrap_err();
    match err {
        DomainError::Database(msg) => assert!(msg.contains("plan step 2"), "{msg}"),
        other => panic!("unexpected error: {other}"),
    }

    let pending = repo.get_pending_recommendations(0).unwrap();
    let symbols: Vec<&str> = pending.iter().map(|r| r.symbol.as_str()).collect();
    assert_eq!(symbols, vec!["OLD"]);
}

#[test]
fn test_retry_lifecycle() {
    for b in backends() {
        let uuid = b
            .repo
            .create_or_update(draft("AAPL", TradeSide::Buy, "r", "h1", 0.0))
            .unwrap();
        b.repo.record_failed_attempt(&uuid, "broker timeout").unwrap();

        let rec = b.repo.get_recommendation(&uuid).unwrap().unwrap();
        assert_eq!(rec.retry_count, 1, "{}", b.name);
        assert_eq!(rec.failure_reason.as_deref(), Some("broker timeout"), "{}", b.name);
        assert_eq!(rec.status, RecommendationStatus::Pending, "{}", b.name);
        assert!(rec.last_attempt_at.is_some(), "{}", b.name);
        assert_eq!(
            b.repo
                .find_matching_for_execution("AAPL", TradeSide::Buy, "h1")
                .unwrap()
                .len(),
            1,
            "{}",
            b.name
        );

        b.repo.mark_failed(&uuid, "gave up").unwrap();
        let rec = b.repo.get_recommendation(&uuid).unwrap().unwrap();
        assert_eq!(rec.status, RecommendationStatus::Failed, "{}", b.name);
        assert!(b
            .repo
            .find_matching_for_execution("AAPL", TradeSide::Buy, "h1")
            .unwrap()
            .is_empty());
    }
}

#[test]
fn test_mark_executed_is_terminal() {
    for b in backends() {
        let uuid = b
            .repo
            .create_or_update(draft("AAPL", TradeSide::Buy, "r", "h1", 0.0))
            .unwrap();
        b.repo.mark_executed(&uuid).unwrap();
        let rec = b.repo.get_recommendation(&uuid).unwrap().unwrap();
        assert_eq!(rec.status, RecommendationStatus::Executed, "{}", b.name);
        assert!(rec.executed_at.is_some(), "{}", b.name);
        assert!(b.repo.mark_failed(&uuid, "late").is_err(), "{}", b.name);
        assert!(b.repo.mark_executed("missing").is_err(), "{}", b.name);
    }
}

#[test]
fn test_dismiss_by_portfolio_hash_and_counts() {
    for b in backends() {
        b.repo
            .create_or_update(draft("A", TradeSide::Buy, "r", "h1", 0.0))
            .unwrap();
        b.repo
            .create_or_update(draft("B", TradeSide::Sell, "r", "h1", 1.0))
            .unwrap();
        b.repo
            .create_or_update(draft("C", TradeSide::Sell, "r", "h2", 0.0))
            .unwrap();

        let counts = b.repo.count_pending_by_side().unwrap();
        assert_eq!((counts.buy, counts.sell), (1, 2), "{}", b.name);

        assert_eq!(b.repo.dismiss_all_by_portfolio_hash("h1").unwrap(), 2, "{}", b.name);
        let counts = b.repo.count_pending_by_side().unwrap();
        assert_eq!((counts.buy, counts.sell), (0, 1), "{}", b.name);
        assert_eq!(b.repo.dismiss_all_pending().unwrap(), 1, "{}", b.name);
    }
}

#[test]
fn test_audit_is_bounded_and_prunable() {
    for b in backends() {
        for i in 0..(common::AUDIT_CAPACITY + 1) {
            b.repo.store_evaluated_count(&format!("h{i}"), i).unwrap();
            b.clock.advance(Duration::minutes(1));
        }
        assert_eq!(b.repo.get_evaluated_count("h0").unwrap(), None, "{}", b.name);
        assert_eq!(
            b.repo.get_evaluated_count(&format!("h{}", common::AUDIT_CAPACITY)).unwrap(),
            Some(common::AUDIT_CAPACITY),
            "{}",
            b.name
        );

        b.clock.advance(Duration::hours(25));
        b.repo.store_evaluated_count("fresh", 1).unwrap();
        let pruned = b.repo.prune_audit_older_than(Duration::hours(24)).unwrap();
        assert!(pruned >= 1, "{}", b.name);
        assert_eq!(b.repo.get_evaluated_count("h1").unwrap(), None, "{}", b.name);
        assert_eq!(b.repo.get_evaluated_count("fresh").unwrap(), Some(1), "{}", b.name);
    }
}

#[test]
fn test_use_case_retry_ceiling() {
    for b in backends() {
        let uc = RecommendationsUseCase::new(b.repo.clone(), 2);
        let uuid = b
            .repo
            .create_or_update(draft("AAPL", TradeSide::Buy, "r", "h1", 0.0))
            .unwrap();

        assert_eq!(
            uc.record_failure(&uuid, "timeout").unwrap(),
            RetryOutcome::WillRetry { attempts: 1 },
            "{}",
            b.name
        );
        assert_eq!(
            uc.record_failure(&uuid, "timeout").unwrap(),
            RetryOutcome::GaveUp { attempts: 2 },
            "{}",
            b.name
        );
        assert_eq!(uc.get(&uuid).unwrap().status, RecommendationStatus::Failed);
        assert!(uc.record_failure(&uuid, "again").is_err(), "{}", b.name);
    }
}

#[test]
fn test_use_case_records_execution_and_collects_garbage() {
    for b in backends() {
        let uc = RecommendationsUseCase::new(b.repo.clone(), 3);
        b.repo
            .create_or_update(draft("AAPL", TradeSide::Buy, "r", "h1", 0.0))
            .unwrap();
        b.repo.store_evaluated_count("h1", 5).unwrap();

        assert_eq!(uc.record_execution("AAPL", TradeSide::Buy, "h1").unwrap(), 1, "{}", b.name);
        assert_eq!(uc.record_execution("AAPL", TradeSide::Buy, "h1").unwrap(), 0, "{}", b.name);

        b.clock.advance(Duration::hours(30));
        let gc = uc.collect_garbage(Duration::hours(24)).unwrap();
        assert_eq!(gc.recommendations_deleted, 1, "{}", b.name);
        assert!(gc.audit_entries_pruned >= 1, "{}", b.name);
    }
}

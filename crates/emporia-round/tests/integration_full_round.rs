//! Integration test: full round lifecycle through the registry
//!
//! ENTER → OFFER → MATCH → LEAVE
//!
//! Drives real scheduler tasks under paused time and checks what traders
//! see: receipts, phase errors and the round report.

mod common;

use common::{Market, dec, trader, wait_for, wait_for_round};
use emporia_types::program::test_helpers::holder_keypair;
use emporia_types::{
    EmporiaError, EpochId, ErrorKind, IntentOutcome, ProgramSubmission, RoundPhase, RoundStatus,
};

#[tokio::test(start_paused = true)]
async fn earlier_program_wins_at_epoch_five() {
    let m = Market::new();
    let registry = m.start();
    let (p1, p2) = (trader(1), trader(2));

    let snap = wait_for_round(&registry, &m.name, EpochId(5), RoundPhase::Entering).await;
    assert_eq!(snap.epoch, EpochId(5));
    let r1 = registry.enter(&m.name, p1, vec![m.account]).await.unwrap();
    let r2 = registry.enter(&m.name, p2, vec![m.account]).await.unwrap();
    assert_eq!(r1.epoch, EpochId(5));
    assert!(r2.wait >= r1.wait);

    wait_for(&registry, &m.name, RoundPhase::Offering).await;
    let o1 = registry.offer(&m.name, p1, vec![m.sell(p1, 80)]).await.unwrap();
    let o2 = registry.offer(&m.name, p2, vec![m.sell(p2, 50)]).await.unwrap();
    assert_eq!((o1.admitted.len(), o2.admitted.len()), (1, 1));

    wait_for(&registry, &m.name, RoundPhase::Leaving).await;
    let report = registry.leave(&m.name, p1).await.unwrap();
    assert_eq!(report.epoch, EpochId(5));
    assert_eq!(report.status, RoundStatus::Complete);
    assert_eq!(report.results.len(), 2);

    let first = &report.results[0];
    assert_eq!(first.submitter, p1);
    assert!(first.outcome.is_success());
    assert_eq!(first.intents[0].outcome, IntentOutcome::Applied);

    let second = &report.results[1];
    assert_eq!(second.submitter, p2);
    assert_eq!(second.outcome.kind(), Some(ErrorKind::InsufficientHoldings));
    assert!(second.deltas.is_empty());

    assert_eq!(
        registry.get_holdings(&m.name, m.account, "X").await.unwrap(),
        dec(20)
    );
    assert_eq!(
        registry.get_balance(&m.name, m.account, "USD").await.unwrap(),
        dec(80)
    );
    registry.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn calls_fail_outside_their_phase() {
    let m = Market::new();
    let registry = m.start();
    let t = trader(1);

    wait_for(&registry, &m.name, RoundPhase::Idle).await;
    let err = registry.enter(&m.name, t, vec![]).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::StateError);

    wait_for(&registry, &m.name, RoundPhase::Entering).await;
    registry.enter(&m.name, t, vec![]).await.unwrap();
    let err = registry.offer(&m.name, t, vec![]).await.unwrap_err();
    assert!(matches!(err, EmporiaError::WrongPhase { call: "OFFER", .. }));
    let err = registry.leave(&m.name, t).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::StateError);

    wait_for(&registry, &m.name, RoundPhase::Offering).await;
    let err = registry.enter(&m.name, trader(2), vec![]).await.unwrap_err();
    assert!(matches!(err, EmporiaError::WrongPhase { call: "ENTER", .. }));
    let err = registry.leave(&m.name, t).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::StateError);

    wait_for(&registry, &m.name, RoundPhase::Leaving).await;
    let err = registry.offer(&m.name, t, vec![]).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::StateError);
    registry.leave(&m.name, t).await.unwrap();
    registry.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn unauthorized_programs_never_touch_the_ledger() {
    let m = Market::new();
    let registry = m.start();
    let t = trader(1);
    let (forger, _) = holder_keypair();

    wait_for(&registry, &m.name, RoundPhase::Entering).await;
    registry.enter(&m.name, t, vec![m.account]).await.unwrap();
    wait_for(&registry, &m.name, RoundPhase::Offering).await;

    let forged = Market::with_key(forger).sell(t, 10);
    let wrong_delegate = m.sell(trader(9), 10);
    let undelegated = ProgramSubmission {
        delegations: vec![],
        ..m.sell(t, 10)
    };
    let receipt = registry
        .offer(&m.name, t, vec![forged, wrong_delegate, undelegated])
        .await
        .unwrap();
    assert!(receipt.admitted.is_empty());
    assert_eq!(receipt.rejected.len(), 3);
    assert!(receipt.rejected.iter().all(|r| r.kind == ErrorKind::AuthError));

    wait_for(&registry, &m.name, RoundPhase::Leaving).await;
    let report = registry.leave(&m.name, t).await.unwrap();
    assert_eq!(report.results.len(), 3);
    assert!(report.results.iter().all(|r| r.deltas.is_empty() && r.fuel_used == 0));
    assert_eq!(
        registry.get_holdings(&m.name, m.account, "X").await.unwrap(),
        dec(100)
    );
    assert_eq!(
        registry.get_balance(&m.name, m.account, "USD").await.unwrap(),
        dec(0)
    );
    registry.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn runaway_program_runs_out_of_fuel_alone() {
    let m = Market::new();
    let mut config = m.config();
    config.vm.fuel = 1_000;
    let registry = emporia_round::MarketRegistry::start(&config).unwrap();
    let t = trader(1);

    wait_for(&registry, &m.name, RoundPhase::Entering).await;
    registry.enter(&m.name, t, vec![m.account]).await.unwrap();
    wait_for(&registry, &m.name, RoundPhase::Offering).await;
    let looping = m.program(t, "\"start\" type begin 1 . 0 until");
    let receipt = registry
        .offer(&m.name, t, vec![m.sell(t, 5), looping, m.sell(t, 5)])
        .await
        .unwrap();
    assert_eq!(receipt.admitted.len(), 3);

    wait_for(&registry, &m.name, RoundPhase::Leaving).await;
    let report = registry.leave(&m.name, t).await.unwrap();
    assert_eq!(report.status, RoundStatus::Complete);

    let runaway = &report.results[1];
    assert_eq!(runaway.outcome.kind(), Some(ErrorKind::ResourceExceeded));
    assert_eq!(runaway.fuel_used, 1_000);
    assert!(runaway.screen.starts_with("start1 1 "));
    assert!(runaway.deltas.is_empty());

    assert!(report.results[0].outcome.is_success());
    assert!(report.results[2].outcome.is_success());
    assert_eq!(
        registry.get_holdings(&m.name, m.account, "X").await.unwrap(),
        dec(90)
    );
    registry.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn balances_never_go_negative() {
    let m = Market::new();
    let registry = m.start();
    let traders: Vec<_> = (1..=6).map(trader).collect();

    wait_for(&registry, &m.name, RoundPhase::Entering).await;
    for t in &traders {
        registry.enter(&m.name, *t, vec![m.account]).await.unwrap();
    }
    wait_for(&registry, &m.name, RoundPhase::Offering).await;
    // Alternating oversized sells and buys the account can only partly fund.
    for (i, t) in traders.iter().enumerate() {
        let qty = 40 + 10 * i64::try_from(i).unwrap();
        let batch = vec![m.sell(*t, qty), m.buy(*t, qty), m.sell(*t, 1_000)];
        registry.offer(&m.name, *t, batch).await.unwrap();
    }

    wait_for(&registry, &m.name, RoundPhase::Leaving).await;
    let report = registry.leave(&m.name, traders[0]).await.unwrap();
    assert_eq!(report.status, RoundStatus::Complete);
    assert!(report.results.iter().any(|r| !r.outcome.is_success()));
    for result in &report.results {
        for delta in &result.deltas {
            assert!(delta.after >= dec(0), "negative cell after {delta:?}");
        }
    }

    let held = registry.get_holdings(&m.name, m.account, "X").await.unwrap();
    let cash = registry.get_balance(&m.name, m.account, "USD").await.unwrap();
    assert!(held >= dec(0));
    assert!(cash >= dec(0));
    // One unit price on both sides: the account's value is conserved.
    assert_eq!(held + cash, dec(100));
    registry.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn report_is_retained_into_idle_then_dropped() {
    let m = Market::new();
    let registry = m.start();
    let t = trader(1);

    wait_for(&registry, &m.name, RoundPhase::Leaving).await;
    registry.leave(&m.name, t).await.unwrap();
    let snap = wait_for(&registry, &m.name, RoundPhase::Idle).await;
    assert!(snap.report_available);
    registry.leave(&m.name, t).await.unwrap();

    wait_for(&registry, &m.name, RoundPhase::Entering).await;
    wait_for(&registry, &m.name, RoundPhase::Offering).await;
    wait_for(&registry, &m.name, RoundPhase::Leaving).await;
    let report = registry.leave(&m.name, t).await.unwrap();
    assert_eq!(report.epoch, EpochId(2));
    registry.shutdown().await;
}

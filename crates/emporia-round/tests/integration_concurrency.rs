//! Integration test: concurrent callers and independent markets

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{Market, wait_for};
use emporia_round::MarketRegistry;
use emporia_types::{EmporiaConfig, MarketConfig, MarketName, RoundPhase, TraderId};
use tokio::task::JoinSet;

#[tokio::test(start_paused = true)]
async fn five_hundred_concurrent_enters() {
    let m = Market::new();
    let registry = Arc::new(m.start());
    wait_for(&registry, &m.name, RoundPhase::Entering).await;

    let mut calls = JoinSet::new();
    for n in 0..500u16 {
        let registry = Arc::clone(&registry);
        let market = m.name.clone();
        calls.spawn(async move {
            let mut id = [0u8; 16];
            id[..2].copy_from_slice(&n.to_be_bytes());
            registry.enter(&market, TraderId::from_bytes(id), vec![]).await
        });
    }
    let mut receipts = Vec::new();
    while let Some(joined) = calls.join_next().await {
        receipts.push(joined.unwrap().unwrap());
    }
    assert_eq!(receipts.len(), 500);

    // Replay the receipts in the order the market saw the callers.
    receipts.sort_by_key(|r| r.arrival);
    let arrivals: Vec<usize> = receipts.iter().map(|r| r.arrival).collect();
    assert_eq!(arrivals, (0..500).collect::<Vec<_>>());
    assert!(receipts[0].wait > Duration::ZERO);
    for pair in receipts.windows(2) {
        assert!(
            pair[1].wait >= pair[0].wait,
            "wait decreased at arrival {}",
            pair[1].arrival
        );
    }
    let stagger = common::timing().enter_stagger;
    assert!(receipts[499].wait - receipts[0].wait <= stagger * 499);

    let snap = wait_for(&registry, &m.name, RoundPhase::Offering).await;
    assert_eq!(snap.participants, 500);

    let Ok(registry) = Arc::try_unwrap(registry) else {
        panic!("registry still shared");
    };
    registry.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn full_command_queue_applies_back_pressure() {
    let m = Market::new();
    let mut config = m.config();
    config.command_queue_depth = 1;
    let registry = Arc::new(MarketRegistry::start(&config).unwrap());
    wait_for(&registry, &m.name, RoundPhase::Entering).await;

    let mut calls = JoinSet::new();
    for n in 0..50u8 {
        let registry = Arc::clone(&registry);
        let market = m.name.clone();
        calls.spawn(async move {
            registry
                .enter(&market, TraderId::from_bytes([n; 16]), vec![])
                .await
        });
    }
    while let Some(joined) = calls.join_next().await {
        joined.unwrap().unwrap();
    }
    let snap = registry.snapshot(&m.name).await.unwrap();
    assert_eq!(snap.participants, 50);
}

#[tokio::test(start_paused = true)]
async fn markets_keep_separate_participants() {
    let config = EmporiaConfig {
        markets: vec![MarketConfig::named("a"), MarketConfig::named("b")],
        round: common::timing(),
        ..EmporiaConfig::default()
    };
    let registry = MarketRegistry::start(&config).unwrap();
    let (a, b) = (MarketName::new("a"), MarketName::new("b"));

    wait_for(&registry, &a, RoundPhase::Entering).await;
    wait_for(&registry, &b, RoundPhase::Entering).await;
    registry.enter(&a, TraderId::new(), vec![]).await.unwrap();
    registry.enter(&a, TraderId::new(), vec![]).await.unwrap();
    registry.enter(&b, TraderId::new(), vec![]).await.unwrap();

    assert_eq!(registry.snapshot(&a).await.unwrap().participants, 2);
    assert_eq!(registry.snapshot(&b).await.unwrap().participants, 1);
    registry.shutdown().await;
}

mod common;

use battlepirates_cc::client::HttpRequest;
use battlepirates_cc::operations::*;
use battlepirates_cc::BotError;
use common::*;
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use tokio::time::{Duration, Instant};

/// Server-side view of one account
struct Shop {
    balance: i64,
    slots: i64,
    rolls: VecDeque<u32>,
    next_tx: i64,
    current: u32,
    stored: Vec<Value>,
    deleted: Vec<String>,
}

impl Shop {
    fn new(balance: i64, rolls: &[u32]) -> Arc<Mutex<Self>> {
        Arc::new(Mutex::new(Self {
            balance,
            slots: 10,
            rolls: rolls.iter().copied().collect(),
            next_tx: 100,
            current: 0,
            stored: Vec::new(),
            deleted: Vec::new(),
        }))
    }
}

fn purchase(shop: &mut Shop) -> Value {
    shop.next_tx += 1;
    shop.current = shop.rolls.pop_front().unwrap_or(1);
    json!({ "purchase": { "transactionId": shop.next_tx.to_string(), "items": [{ "crew_id": shop.current }] } })
}

fn serve(shop: &Arc<Mutex<Shop>>, request: &HttpRequest) -> (u16, Value) {
    let mut shop = shop.lock().unwrap();
    let endpoint = request.url.rsplit_once(".test/").map(|(_, e)| e).unwrap_or("");
    match endpoint {
        "player/getCurrencyBalance" => ok(json!({ "balances": { "1": { "amount": shop.balance } } })),
        "api/bm/roguecrew/read" => ok(json!({ "remainingSlots": shop.slots, "items": shop.stored.clone() })),
        "api/bm/roguecrew/create" => {
            shop.balance -= 1000;
            ok(purchase(&mut shop))
        }
        "api/bm/roguecrew/reroll" => {
            shop.balance -= 800;
            ok(purchase(&mut shop))
        }
        "api/bm/roguecrew/accept" => {
            shop.slots -= 1;
            let item = json!({ "id": format!("long-{}", shop.next_tx), "crew_id": shop.current, "fleet_id": "0" });
            shop.stored.push(item.clone());
            ok(json!({ "item": item }))
        }
        "api/bm/roguecrew/delete" => {
            let id = request.form_value("id").unwrap_or_default().to_string();
            shop.slots += 1;
            shop.stored.retain(|c| c["id"] != id.as_str());
            shop.deleted.push(id);
            ok(json!({ "success": true }))
        }
        other => (404, json!({ "error": other })),
    }
}

fn roller_for(shop: &Arc<Mutex<Shop>>) -> (CrewRoller, Arc<FakeTransport>) {
    let server = shop.clone();
    let transport = FakeTransport::new(move |request| serve(&server, request));
    let roller = CrewRoller::new(client_with(test_config(), transport.clone()));
    (roller, transport)
}

#[test]
fn floor_covers_every_worker_twice() {
    assert_eq!(rolling_floor(5, 1000), 10000);
    assert_eq!(rolling_floor(1, 1000), 2000);
    assert_eq!(rolling_floor(25, 1000), 50000);
}

#[tokio::test]
async fn balance_below_floor_blocks_purchase() {
    let shop = Shop::new(9999, &[7]);
    let (roller, transport) = roller_for(&shop);
    roller.refresh().await.unwrap();
    roller.configure_workers(5);

    assert_eq!(roller.floor(), 10000);
    assert!(!roller.can_purchase());
    assert_eq!(roller.worker_state(0), WorkerState::Paused);

    let outcome = roller.roll_crew(0).await.unwrap();
    assert!(outcome.is_none());
    assert!(transport.calls_to("api/bm/roguecrew/create").is_empty());
}

#[tokio::test]
async fn full_storage_blocks_purchase() {
    let shop = Shop::new(100_000, &[7]);
    shop.lock().unwrap().slots = 2;
    let (roller, _) = roller_for(&shop);
    roller.refresh().await.unwrap();
    roller.configure_workers(1);

    assert!(!roller.can_purchase());
}

#[tokio::test(start_paused = true)]
async fn reroll_until_allowed_then_accept() {
    let shop = Shop::new(3000, &[3, 7]);
    let (roller, transport) = roller_for(&shop);
    roller.refresh().await.unwrap();
    roller.configure_workers(1);
    assert_eq!(roller.worker_state(0), WorkerState::Rolling);

    let outcome = roller.roll_crew(0).await.unwrap();
    match outcome {
        Some(RollOutcome::Accepted(crew)) => assert_eq!(crew.crew_id, 7),
        other => panic!("expected an accepted crew, got {other:?}"),
    }

    // Debited locally before any refresh
    assert_eq!(roller.balance(), 1200);

    let stats = roller.stats();
    assert_eq!(stats.accepted_of(7), 1);
    assert_eq!(stats.rolls_of(3), 1);
    assert_eq!(stats.streaks.get(&7), Some(&vec![2]));
    assert_eq!(transport.calls_to("api/bm/roguecrew/reroll").len(), 1);
    assert_eq!(transport.calls_to("api/bm/roguecrew/accept").len(), 1);
    assert!(transport.calls_to("api/bm/roguecrew/delete").is_empty());
}

#[tokio::test(start_paused = true)]
async fn fill_crews_end_to_end() {
    let shop = Shop::new(3000, &[3, 7]);
    let (roller, transport) = roller_for(&shop);
    roller.refresh().await.unwrap();
    roller.configure_workers(1);

    let deadline = Instant::now() + Duration::from_secs(60);
    roller.fill_crews(0, deadline).await.unwrap();

    assert_eq!(roller.balance(), 1200);
    assert_eq!(roller.worker_state(0), WorkerState::Stopped);

    let stats = roller.stats();
    assert_eq!(stats.accepted_of(7), 1);
    assert_eq!(stats.rolls_of(3), 1);
    assert_eq!(stats.discarded, 0);

    // Only one purchase fits the budget; afterwards the worker stays paused
    assert_eq!(transport.calls_to("api/bm/roguecrew/create").len(), 1);
    assert_eq!(shop.lock().unwrap().stored.len(), 1);
}

/// Running out mid-reroll still accepts the current transaction, then
/// deletes the accepted crew.
#[tokio::test(start_paused = true)]
async fn budget_exhaustion_discards_the_accepted_crew() {
    let shop = Shop::new(2900, &[3, 3, 3]);
    let (roller, transport) = roller_for(&shop);
    roller.refresh().await.unwrap();
    roller.configure_workers(1);

    let outcome = roller.roll_crew(0).await.unwrap();
    let crew = match outcome {
        Some(RollOutcome::Discarded(crew)) => crew,
        other => panic!("expected a discarded crew, got {other:?}"),
    };

    // 2900 - 1000 = 1900 is already under the 2000 floor, so no reroll
    assert!(transport.calls_to("api/bm/roguecrew/reroll").is_empty());
    assert_eq!(transport.calls_to("api/bm/roguecrew/accept").len(), 1);
    assert_eq!(shop.lock().unwrap().deleted, vec![crew.id.clone()]);
    assert_eq!(roller.worker_state(0), WorkerState::Paused);

    let stats = roller.stats();
    assert_eq!(stats.discarded, 1);
    assert_eq!(stats.rolls_of(3), 1);
    assert_eq!(stats.accepted_of(3), 0);
}

#[tokio::test(start_paused = true)]
async fn paused_worker_resumes_when_balance_recovers() {
    let shop = Shop::new(1000, &[7]);
    let (roller, transport) = roller_for(&shop);
    roller.refresh().await.unwrap();
    roller.configure_workers(1);
    assert_eq!(roller.worker_state(0), WorkerState::Paused);

    let top_up = shop.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(12)).await;
        top_up.lock().unwrap().balance = 2500;
    });

    roller
        .fill_crews(0, Instant::now() + Duration::from_secs(40))
        .await
        .unwrap();

    assert_eq!(roller.stats().accepted_of(7), 1);
    assert_eq!(transport.calls_to("api/bm/roguecrew/create").len(), 1);
}

#[tokio::test]
async fn purchase_without_items_is_never_accepted() {
    let transport = FakeTransport::new(|request| {
        match request.url.rsplit_once(".test/").map(|(_, e)| e).unwrap_or("") {
            "player/getCurrencyBalance" => ok(json!({ "balances": { "1": { "amount": 100_000 } } })),
            "api/bm/roguecrew/read" => ok(json!({ "remainingSlots": 10, "items": [] })),
            "api/bm/roguecrew/create" => ok(json!({ "purchase": { "transactionId": "5", "items": [] } })),
            _ => ok(json!({ "success": true })),
        }
    });
    let roller = CrewRoller::new(client_with(test_config(), transport.clone()));
    roller.refresh().await.unwrap();
    roller.configure_workers(1);

    let err = roller.roll_crew(0).await.unwrap_err();
    assert!(matches!(err, BotError::Protocol(_)), "{err:?}");
    assert!(transport.calls_to("api/bm/roguecrew/accept").is_empty());
    assert_eq!(roller.stats().total_rolls(), 0);
}

#[tokio::test]
async fn pick_crew_claims_unassigned_crews_once() {
    let shop = Shop::new(0, &[]);
    {
        let mut shop = shop.lock().unwrap();
        shop.stored = vec![
            json!({ "id": "long-a", "crew_id": 7, "fleet_id": "2" }),
            json!({ "id": "long-b", "crew_id": 7, "fleet_id": "0" }),
            json!({ "id": "long-c", "crew_id": "7", "fleet_id": 0 }),
        ];
    }
    let (roller, _) = roller_for(&shop);
    roller.refresh_storage().await.unwrap();

    assert_eq!(roller.pick_crew(7).unwrap().id, "long-b");
    assert_eq!(roller.pick_crew(7).unwrap().id, "long-c");
    assert!(roller.pick_crew(7).is_none());
    assert!(roller.pick_crew(3).is_none());
}

#[tokio::test]
async fn flush_deletes_block_listed_crews_only() {
    let shop = Shop::new(0, &[]);
    {
        let mut shop = shop.lock().unwrap();
        shop.stored = vec![
            json!({ "id": "long-a", "crew_id": 3, "fleet_id": "0" }),
            json!({ "id": "long-b", "crew_id": 7, "fleet_id": "0" }),
            json!({ "id": "long-c", "crew_id": 3, "fleet_id": "0" }),
        ];
    }
    let (roller, _) = roller_for(&shop);

    assert_eq!(roller.flush(true).await.unwrap(), 2);
    assert_eq!(shop.lock().unwrap().deleted, vec!["long-a".to_string(), "long-c".to_string()]);

    assert_eq!(roller.flush(false).await.unwrap(), 1);
    assert!(shop.lock().unwrap().stored.is_empty());
}

#[tokio::test]
async fn flush_skips_crews_claimed_elsewhere() {
    let shop = Shop::new(0, &[]);
    shop.lock().unwrap().stored = vec![json!({ "id": "long-a", "crew_id": 3, "fleet_id": "0" })];
    let (roller, _) = roller_for(&shop);
    roller.refresh_storage().await.unwrap();

    let claimed = roller.pick_crew(3).unwrap();
    assert_eq!(roller.flush(true).await.unwrap(), 0);

    roller.release_crew(&claimed).await.unwrap();
    assert_eq!(shop.lock().unwrap().deleted, vec!["long-a".to_string()]);
}

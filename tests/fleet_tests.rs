mod common;

use battlepirates_cc::client::{HttpMethod, HttpRequest, RequestBody};
use battlepirates_cc::operations::*;
use battlepirates_cc::storage::{Position, PositionCache};
use battlepirates_cc::BotError;
use common::*;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

fn endpoint(request: &HttpRequest) -> &str {
    request.url.rsplit_once(".test/").map(|(_, e)| e).unwrap_or("")
}

fn fleet_ops(transport: Arc<FakeTransport>) -> FleetOperations {
    let config = test_config();
    let home = Position::new(config.base.x, config.base.y);
    FleetOperations::new(client_with(config, transport), Targeting::new(PositionCache::new(home)))
}

/// Fleet "1" starts docked and goes on the map once launched
fn docked_then_launched() -> (Arc<FakeTransport>, Arc<AtomicBool>) {
    let on_map = Arc::new(AtomicBool::new(false));
    let state = on_map.clone();
    let transport = FakeTransport::new(move |request| match (request.method, endpoint(request)) {
        (HttpMethod::Get, "users/4242/dock/base/fleets") => ok(fleet_listing("1", state.load(Ordering::SeqCst))),
        (HttpMethod::Post, "dock/base/fleets/1") => {
            state.store(true, Ordering::SeqCst);
            ok(json!({ "success": true }))
        }
        (_, "updateMapObjects2.php") => ok(json!({ "objects": [{ "data": {}, "actions": [] }] })),
        _ => ok(json!({})),
    });
    (transport, on_map)
}

#[test]
fn move_actions_match_server_syntax() {
    let dest = Position::new(1500, -200);
    assert_eq!(
        move_actions(&MoveMode::Plain, dest, 443.5, 4242, 777),
        r#"[["move",1500,-200,887,4242]]"#
    );
    assert_eq!(
        move_actions(&MoveMode::Dock, dest, 406.0, 4242, 777),
        r#"[["move",1500,-200,812,4242],["dock",777]]"#
    );
    assert_eq!(
        move_actions(&MoveMode::Attack("t-9".to_string()), dest, 400.25, 4242, 777),
        r#"[["move",1500,-200,800.5,4242],["attack",t-9,"platform","kxp"]]"#
    );
}

#[tokio::test]
async fn launch_sends_manifest_and_records_map_id() {
    let (transport, _) = docked_then_launched();
    let fleets = fleet_ops(transport.clone());

    let outcome = fleets.launch("1").await.unwrap();
    assert!(matches!(outcome, LaunchOutcome::Launched(_)));
    assert_eq!(fleets.map_id("1").as_deref(), Some("map-55"));

    let launch = transport
        .requests()
        .into_iter()
        .find(|r| r.method == HttpMethod::Post)
        .unwrap();
    let RequestBody::Json(body) = &launch.body else {
        panic!("launch must send JSON");
    };
    assert_eq!(body["launch"], "worldmap");
    assert_eq!(body["ships"]["1"], json!({ "id": 9001, "dock": "base" }));
    assert_eq!(body["ships"]["2"], json!({ "id": 9002, "dock": "base" }));
    assert!(launch.query_value("h").is_some());
}

#[tokio::test]
async fn launching_a_fleet_on_the_map_is_refused_without_a_call() {
    let (transport, on_map) = docked_then_launched();
    on_map.store(true, Ordering::SeqCst);
    let fleets = fleet_ops(transport.clone());

    let outcome = fleets.launch("1").await.unwrap();
    assert_eq!(outcome, LaunchOutcome::NotLaunchable(NOT_LAUNCHABLE.to_string()));
    assert!(transport.requests().iter().all(|r| r.method == HttpMethod::Get));
}

#[tokio::test]
async fn unknown_fleet_is_not_docked() {
    let (transport, _) = docked_then_launched();
    let fleets = fleet_ops(transport);
    assert!(!fleets.is_docked("99").await.unwrap());
}

#[tokio::test]
async fn move_without_map_id_is_a_protocol_error() {
    let (transport, _) = docked_then_launched();
    let fleets = fleet_ops(transport.clone());

    let err = fleets
        .move_fleet("1", Position::new(0, 0), 443.5, MoveMode::Plain, None)
        .await
        .unwrap_err();
    assert!(matches!(err, BotError::Protocol(_)), "{err:?}");
    assert!(transport.calls_to("updateMapObjects2.php").is_empty());
}

#[tokio::test]
async fn move_applies_clock_offset_and_caches_position() {
    let (transport, _) = docked_then_launched();
    let fleets = fleet_ops(transport.clone());
    fleets.launch("1").await.unwrap();

    let approach = Approach {
        clock: ClockSector::new(6).unwrap(),
        radius: 100.0,
    };
    fleets
        .move_fleet(
            "1",
            Position::new(5000, 5000),
            443.5,
            MoveMode::Attack("77".to_string()),
            Some(approach),
        )
        .await
        .unwrap();

    // (1, 1) normalized times 100, rounded up
    let expected = Position::new(5071, 5071);
    assert_eq!(fleets.position("1"), expected);

    let request = &transport.calls_to("updateMapObjects2.php")[0];
    assert_eq!(request.method, HttpMethod::Get);
    assert_eq!(request.query_value("id"), Some("map-55"));
    assert_eq!(request.query_value("worldindex"), Some("3"));
    assert_eq!(
        request.query_value("actions"),
        Some(r#"[["move",5071,5071,887,4242],["attack",77,"platform","kxp"]]"#)
    );
}

#[tokio::test]
async fn combat_probe_reads_battle_metadata() {
    let in_combat = Arc::new(AtomicBool::new(true));
    let state = in_combat.clone();
    let transport = FakeTransport::new(move |request| match endpoint(request) {
        "users/4242/dock/base/fleets" => ok(fleet_listing("1", true)),
        "updateMapObjects2.php" if state.load(Ordering::SeqCst) => ok(json!({
            "objects": [{
                "data": { "combat_guid": "guid-abc" },
                "actions": [["attack", 31337, "x", "battle-7.test"]]
            }]
        })),
        "updateMapObjects2.php" => ok(json!({ "objects": [{ "data": { "combat_guid": null }, "actions": [] }] })),
        _ => ok(json!({})),
    });
    let fleets = fleet_ops(transport.clone());
    fleets.is_docked("1").await.unwrap();

    let combat = fleets.combat_probe("1", 443.5).await.unwrap().unwrap();
    assert_eq!(combat.combat_guid, "guid-abc");
    assert_eq!(combat.engage_id, 31337);
    assert_eq!(combat.server_url, "battle-7.test");

    in_combat.store(false, Ordering::SeqCst);
    assert!(fleets.combat_probe("1", 443.5).await.unwrap().is_none());

    // Probes target the cached position, home for a fleet never moved
    let probe = &transport.calls_to("updateMapObjects2.php")[0];
    assert_eq!(probe.query_value("actions"), Some(r#"[["move",10000,20000,887,4242]]"#));
}

#[tokio::test]
async fn manage_fleet_nulls_slots_outside_layout() {
    let (transport, _) = docked_then_launched();
    let fleets = fleet_ops(transport.clone());

    fleets.manage_fleet("1", Some("4"), "1").await.unwrap();

    let edit = transport.calls_to("dock/base/fleets/4");
    assert_eq!(edit.len(), 1);
    assert_eq!(edit[0].method, HttpMethod::Put);
    assert_eq!(
        edit[0].body,
        RequestBody::Json(json!({
            "ships": {
                "1": { "id": 9001, "dock": "base" },
                "2": { "id": null }
            }
        }))
    );
}

#[tokio::test(start_paused = true)]
async fn lazy_repair_rebuilds_fleet_one_ship_at_a_time() {
    let repairs = Arc::new(AtomicUsize::new(0));
    let counter = repairs.clone();
    let transport = FakeTransport::new(move |request| match (request.method, endpoint(request)) {
        (HttpMethod::Get, "users/4242/dock/base/fleets") => ok(fleet_listing("1", false)),
        (HttpMethod::Put, "dock/base/repair") => {
            // First ship needs a long repair, the second one is rushable right away
            let remaining = if counter.fetch_add(1, Ordering::SeqCst) == 0 { 900 } else { 120 };
            ok(json!({ "complete_time": 1000 + remaining, "currenttime": 1000 }))
        }
        _ => ok(json!({ "success": true })),
    });
    let fleets = fleet_ops(transport.clone());

    let started = tokio::time::Instant::now();
    fleets.lazy_repair("1", "1", 2).await.unwrap();

    assert_eq!(repairs.load(Ordering::SeqCst), 2);
    assert_eq!(transport.calls_to("dock/base/repair/default").len(), 2);

    let rush = &transport.calls_to("dock/base/repair/default")[0];
    assert_eq!(
        rush.body,
        RequestBody::Json(json!({
            "fleet": "1",
            "seconds": 300,
            "purchase_type": "free",
            "currency_id": 0,
            "quantity": 1
        }))
    );

    let repair = &transport.calls_to("dock/base/repair")[0];
    assert_eq!(repair.body, RequestBody::Json(json!({ "fleet": 1 })));

    // Clear, then one slot, then both slots
    let layouts: Vec<Value> = transport
        .calls_to("dock/base/fleets/1")
        .into_iter()
        .filter(|r| r.method == HttpMethod::Put)
        .map(|r| match r.body {
            RequestBody::Json(body) => body["ships"].clone(),
            other => panic!("unexpected body {other:?}"),
        })
        .collect();
    assert_eq!(layouts.len(), 3);
    assert_eq!(layouts[0]["1"], json!({ "id": null }));
    assert_eq!(layouts[1]["1"]["id"], 9001);
    assert_eq!(layouts[1]["2"], json!({ "id": null }));
    assert_eq!(layouts[2]["2"]["id"], 9002);

    // 600 s waited out for the first ship, plus the fixed pauses
    assert!(started.elapsed() >= std::time::Duration::from_secs(600));
}

#[tokio::test]
async fn repair_rejects_non_numeric_fleet_ids() {
    let (transport, _) = docked_then_launched();
    let fleets = fleet_ops(transport);
    let err = fleets.repair_fleet("gs").await.unwrap_err();
    assert!(matches!(err, BotError::Protocol(_)), "{err:?}");
}

#[tokio::test]
async fn locator_request_is_signed_in_the_body() {
    let transport = FakeTransport::new(|_| ok(json!({ "bookmarks": [{ "id": 5, "x": 1, "y": 2, "level": 13 }] })));
    let fleets = fleet_ops(transport.clone());

    let found = fleets.locator_targets(13, "343").await.unwrap();
    assert_eq!(found.bookmarks.len(), 1);
    assert_eq!(found.bookmarks[0].id, "5");

    let request = &transport.requests()[0];
    assert_eq!(request.form_value("count"), Some("100"));
    assert_eq!(request.form_value("levels"), Some("13"));
    assert_eq!(request.form_value("minHealth"), Some("100"));
    assert_eq!(request.form_value("types"), Some("343"));
    assert!(request.form_value("h").is_some());
}

#[tokio::test]
async fn vengeance_filters_both_sector_lists() {
    let transport = FakeTransport::new(|request| match endpoint(request) {
        "api/bm/bookmarks/vengeanceoutsector" => ok(json!({ "bookmarks": [
            { "id": "out-ok", "x": 110, "y": 200, "level": 50, "rank": "1" },
            { "id": "out-strong", "x": 100, "y": 200, "level": 50, "rank": "4" }
        ]})),
        "api/bm/bookmarks/vengeanceinsector" => ok(json!({ "bookmarks": [
            { "id": "in-strong", "x": 100, "y": 201, "level": 120, "rank": "2" },
            { "id": "in-ok", "x": 101, "y": 200, "level": 90, "rank": "2" },
            { "id": "in-far", "x": 900, "y": 900, "level": 10, "rank": "1" }
        ]})),
        _ => ok(json!({})),
    });
    let fleets = fleet_ops(transport);

    let targets = fleets.vengeance_targets("1").await.unwrap().unwrap();
    let ids: Vec<&str> = targets.iter().map(|t| t.id.as_str()).collect();
    assert_eq!(ids, ["in-ok", "out-ok"]);
}

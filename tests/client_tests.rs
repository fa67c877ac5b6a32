mod common;

use battlepirates_cc::client::api::build_parameter_string;
use battlepirates_cc::client::{HttpMethod, RequestBody};
use battlepirates_cc::models::BalanceResponse;
use battlepirates_cc::signing::digest;
use battlepirates_cc::{fields, Action, BotError};
use common::*;
use serde_json::json;

#[test]
fn parameter_strings_follow_the_action_table() {
    let cases = [
        (Action::CrewCreate, fields!("packId" => "9"), "9"),
        (Action::CrewReroll, fields!("transactionId" => 555), "555"),
        (Action::CrewAccept, fields!("transactionId" => "556"), "556"),
        (Action::CrewDelete, fields!("id" => "long-crew-id"), "long-crew-id"),
        (Action::CurrencyBalance, fields!("userid" => 4242, "currencyid" => 1), "14242"),
        (Action::CrewAssign, fields!("id" => "abc", "fleet_id" => "3"), "3abc"),
        (Action::CrewStorage, fields!("anything" => "ignored"), ""),
        (Action::FleetList, fields!(), ""),
        (Action::Repair, fields!("fleet" => 2), ""),
    ];

    for (action, params, expected) in cases {
        assert_eq!(
            build_parameter_string(action, &params, "worldSeed").unwrap(),
            expected,
            "{:?}",
            action
        );
    }
}

#[test]
fn move_string_is_prefixed_with_world_seed() {
    let params = fields!(
        "worldindex" => 3,
        "actions" => "[[\"move\",1,2,887,4242]]",
        "map_signed_request" => "map-signed",
        "id" => "map-55",
    );
    assert_eq!(
        build_parameter_string(Action::Move, &params, "worldSeed").unwrap(),
        "worldSeed[[\"move\",1,2,887,4242]]map-55map-signed3"
    );
}

#[test]
fn locator_skips_missing_and_empty_fields() {
    let params = fields!("count" => "100", "levels" => "13", "minHealth" => "100", "types" => "");
    assert_eq!(
        build_parameter_string(Action::Locator, &params, "").unwrap(),
        "10013100"
    );
    assert_eq!(build_parameter_string(Action::Locator, &fields!(), "").unwrap(), "");
}

#[test]
fn missing_required_field_is_a_protocol_error() {
    let err = build_parameter_string(Action::CrewAssign, &fields!("id" => "abc"), "").unwrap_err();
    assert!(matches!(err, BotError::Protocol(_)), "{err:?}");
}

#[tokio::test]
async fn body_signed_calls_carry_signature_in_form() {
    let transport = FakeTransport::new(|_| ok(json!({ "balances": { "1": { "amount": 3000 } } })));
    let client = client_with(test_config(), transport.clone());

    let response: BalanceResponse = client
        .execute_as(
            Action::CurrencyBalance,
            "player/getCurrencyBalance",
            fields!(),
            fields!("userid" => 4242, "currencyid" => 1),
        )
        .await
        .unwrap();
    assert_eq!(response.amount(1), Some(3000));

    let request = &transport.requests()[0];
    assert_eq!(request.method, HttpMethod::Post);
    assert_eq!(request.url, "https://game.test/player/getCurrencyBalance");
    assert_eq!(request.query_value("signed_request"), Some("signed"));
    assert_eq!(request.query_value("game_signed_request"), Some("game-signed"));
    assert_eq!(request.query_value("PHPSESSID"), Some("null"));
    assert_eq!(request.query_value("flashsession"), Some("null"));
    assert!(request.query_value("ts").is_some());
    assert_eq!(request.query_value("h"), None);

    let nonce: u32 = request.form_value("hn").unwrap().parse().unwrap();
    let expected = digest("abcXYZ0", "14242", nonce, true).unwrap();
    assert_eq!(request.form_value("h"), Some(expected.as_str()));
}

#[tokio::test]
async fn query_signed_calls_carry_signature_in_query() {
    let transport = FakeTransport::new(|_| ok(json!({ "fleets": [] })));
    let client = client_with(test_config(), transport.clone());

    client
        .execute(Action::FleetList, "users/4242/dock/base/fleets", fields!(), fields!())
        .await
        .unwrap();

    let request = &transport.requests()[0];
    assert_eq!(request.method, HttpMethod::Get);
    assert_eq!(request.body, RequestBody::Empty);
    let nonce: u32 = request.query_value("hn").unwrap().parse().unwrap();
    let expected = digest("abcXYZ0", "", nonce, true).unwrap();
    assert_eq!(request.query_value("h"), Some(expected.as_str()));
}

#[tokio::test]
async fn world_map_moves_use_world_surface_unsecured() {
    let transport = FakeTransport::new(|_| ok(json!({ "objects": [] })));
    let client = client_with(test_config(), transport.clone());

    client
        .execute(
            Action::Move,
            "updateMapObjects2.php",
            fields!("actions" => "[]", "id" => "map-55", "worldindex" => 3),
            fields!(),
        )
        .await
        .unwrap();

    let request = &transport.requests()[0];
    assert_eq!(request.url, "https://map.test/updateMapObjects2.php");
    assert_eq!(request.query_value("map_signed_request"), Some("map-signed"));
    assert_eq!(request.query_value("signed_request"), None);

    let nonce: u32 = request.query_value("hn").unwrap().parse().unwrap();
    let expected = digest("worldSeed", "worldSeed[]map-55map-signed3", nonce, false).unwrap();
    assert_eq!(request.query_value("h"), Some(expected.as_str()));
}

#[tokio::test]
async fn json_actions_send_json_bodies() {
    let transport = FakeTransport::new(|_| ok(json!({ "complete_time": 10, "currenttime": 5 })));
    let client = client_with(test_config(), transport.clone());

    client
        .execute(Action::Repair, "dock/base/repair", fields!(), fields!("fleet" => 2))
        .await
        .unwrap();

    let request = &transport.requests()[0];
    assert_eq!(request.method, HttpMethod::Put);
    assert_eq!(request.body, RequestBody::Json(json!({ "fleet": 2 })));
    assert!(request.query_value("h").is_some());
}

#[tokio::test]
async fn non_success_status_is_a_transport_error() {
    let transport = FakeTransport::new(|_| (503, json!({ "error": "busy" })));
    let client = client_with(test_config(), transport);

    let err = client
        .execute(Action::CrewStorage, "api/bm/roguecrew/read", fields!(), fields!())
        .await
        .unwrap_err();
    assert!(
        matches!(err, BotError::Transport { status: 503, ref endpoint } if endpoint == "api/bm/roguecrew/read"),
        "{err:?}"
    );
}

#[tokio::test]
async fn unexpected_shape_is_a_protocol_error() {
    let transport = FakeTransport::new(|_| ok(json!({ "nothing": true })));
    let client = client_with(test_config(), transport);

    let err = client
        .execute_as::<BalanceResponse>(
            Action::CurrencyBalance,
            "player/getCurrencyBalance",
            fields!(),
            fields!("userid" => 4242, "currencyid" => 1),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, BotError::Protocol(_)), "{err:?}");
}

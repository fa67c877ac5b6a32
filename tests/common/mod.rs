#![allow(dead_code)]

use async_trait::async_trait;
use battlepirates_cc::client::{HttpRequest, HttpResponse, Transport};
use battlepirates_cc::{BotConfig, GameClient, Result};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

type Handler = Box<dyn Fn(&HttpRequest) -> (u16, Value) + Send + Sync>;

/// In-memory server: records every request and answers through `handler`
pub struct FakeTransport {
    requests: Mutex<Vec<HttpRequest>>,
    handler: Handler,
}

impl FakeTransport {
    pub fn new(handler: impl Fn(&HttpRequest) -> (u16, Value) + Send + Sync + 'static) -> Arc<Self> {
        Arc::new(Self {
            requests: Mutex::new(Vec::new()),
            handler: Box::new(handler),
        })
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn calls_to(&self, endpoint: &str) -> Vec<HttpRequest> {
        self.requests()
            .into_iter()
            .filter(|r| r.url.ends_with(endpoint))
            .collect()
    }
}

#[async_trait]
impl Transport for FakeTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse> {
        let (status, body) = (self.handler)(&request);
        self.requests.lock().unwrap().push(request);
        Ok(HttpResponse {
            status,
            body: body.to_string(),
        })
    }
}

pub fn test_config() -> BotConfig {
    let mut config = BotConfig::default();
    config.identity.user_id = 4242;
    config.identity.base_id = 777;
    config.identity.world_index = 3;
    config.identity.phpsessid = "sess".to_string();
    config.identity.signed_request = "signed".to_string();
    config.identity.game_signed_request = "game-signed".to_string();
    config.identity.map_signed_request = "map-signed".to_string();
    config.links.base_url = "https://game.test".to_string();
    config.links.world_map_url = "https://map.test".to_string();
    config.seeds.base = "abcXYZ0".to_string();
    config.seeds.world = "worldSeed".to_string();
    config.base.x = 10000;
    config.base.y = 20000;
    config.crews.allow_list = vec![7];
    config.crews.block_list = vec![3];
    config.crews.names = BTreeMap::from([
        ("3".to_string(), "(B) Deckhand".to_string()),
        ("7".to_string(), "(E) Grease Monkey".to_string()),
    ]);
    config.crews.tracked_types = vec![7];
    config
}

pub fn client_with(config: BotConfig, transport: Arc<FakeTransport>) -> GameClient {
    GameClient::new(transport, Arc::new(config))
}

pub fn ok(body: Value) -> (u16, Value) {
    (200, body)
}

pub fn fleet_listing(fleet_id: &str, on_map: bool) -> Value {
    json!({
        "fleets": [{
            "id": fleet_id,
            "is_on_map": on_map,
            "mapId": if on_map { json!("map-55") } else { Value::Null },
            "ships": [
                { "actives": { "fltp": "1", "id": 9001 } },
                { "actives": { "fltp": "2", "id": 9002 } }
            ]
        }]
    })
}

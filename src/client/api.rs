use crate::client::transport::{HttpMethod, HttpRequest, RequestBody, Transport};
use crate::config::BotConfig;
use crate::error::{BotError, Result};
use crate::signing;
use crate::debug_api_call;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::fs::OpenOptions;
use std::io::Write;
use std::sync::Arc;

pub type Fields = Map<String, Value>;

/// Which backend a call goes to. Each surface has its own seed and its
/// own set of identity parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Surface {
    Primary,
    WorldMap,
}

/// Where the signed fields are read from and where `hn`/`h` are written
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    Query,
    Body,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyEncoding {
    None,
    Form,
    Json,
}

/// Every call the bot makes. This table is the protocol contract: the
/// signed field list, its order, and the transport shape must match
/// what the server recomputes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    CrewCreate,
    CrewReroll,
    CrewAccept,
    CrewDelete,
    CurrencyBalance,
    CrewStorage,
    CrewAssign,
    FleetList,
    Launch,
    Move,
    Locator,
    FleetEdit,
    Repair,
    InstantRepair,
}

impl Action {
    pub fn surface(&self) -> Surface {
        match self {
            Action::Move => Surface::WorldMap,
            _ => Surface::Primary,
        }
    }

    pub fn method(&self) -> HttpMethod {
        match self {
            Action::FleetList | Action::Move => HttpMethod::Get,
            Action::FleetEdit | Action::Repair => HttpMethod::Put,
            _ => HttpMethod::Post,
        }
    }

    pub fn body_encoding(&self) -> BodyEncoding {
        match self {
            Action::FleetList | Action::Move => BodyEncoding::None,
            Action::Launch | Action::FleetEdit | Action::Repair | Action::InstantRepair => BodyEncoding::Json,
            _ => BodyEncoding::Form,
        }
    }

    pub fn placement(&self) -> Placement {
        match self {
            Action::CrewCreate
            | Action::CrewReroll
            | Action::CrewAccept
            | Action::CrewDelete
            | Action::CurrencyBalance
            | Action::CrewStorage
            | Action::CrewAssign
            | Action::Locator => Placement::Body,
            _ => Placement::Query,
        }
    }

    /// Move is the only call signed without the salted seed
    pub fn secure(&self) -> bool {
        !matches!(self, Action::Move)
    }

    /// Ordered field names concatenated into the parameter string
    pub fn signed_fields(&self) -> &'static [&'static str] {
        match self {
            Action::CrewCreate => &["packId"],
            Action::CrewReroll | Action::CrewAccept => &["transactionId"],
            Action::CrewDelete => &["id"],
            Action::CurrencyBalance => &["currencyid", "userid"],
            Action::CrewAssign => &["fleet_id", "id"],
            Action::Move => &["actions", "id", "map_signed_request", "worldindex"],
            Action::Locator => &["campaignId", "count", "levels", "minHealth", "types"],
            Action::CrewStorage
            | Action::FleetList
            | Action::Launch
            | Action::FleetEdit
            | Action::Repair
            | Action::InstantRepair => &[],
        }
    }

    /// Locator fields are only signed when present and non-empty
    fn fields_optional(&self) -> bool {
        matches!(self, Action::Locator)
    }
}

/// Render a field the way the server stringifies it: strings raw,
/// integers without padding.
pub fn render_field(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Build the string fed to the signature engine for `action`.
/// `world_seed` prefixes the world map move string.
pub fn build_parameter_string(action: Action, fields: &Fields, world_seed: &str) -> Result<String> {
    let mut string = String::new();
    if action == Action::Move {
        string.push_str(world_seed);
    }

    for name in action.signed_fields() {
        match fields.get(*name).map(render_field) {
            Some(rendered) if !rendered.is_empty() => string.push_str(&rendered),
            _ if action.fields_optional() => {}
            Some(rendered) => string.push_str(&rendered),
            None => {
                return Err(BotError::protocol(format!(
                    "{:?} requires field '{}' for signing",
                    action, name
                )))
            }
        }
    }

    Ok(string)
}

/// Signing HTTP client shared by crew and fleet operations
#[derive(Clone)]
pub struct GameClient {
    transport: Arc<dyn Transport>,
    config: Arc<BotConfig>,
    api_logging: bool,
}

impl GameClient {
    pub fn new(transport: Arc<dyn Transport>, config: Arc<BotConfig>) -> Self {
        let api_logging = config.logging.api_logging;
        Self {
            transport,
            config,
            api_logging,
        }
    }

    pub fn config(&self) -> &BotConfig {
        &self.config
    }

    fn surface_params(&self, surface: Surface, query: &mut Fields) {
        let identity = &self.config.identity;
        match surface {
            Surface::Primary => {
                query.insert("ts".to_string(), Value::from(chrono::Utc::now().timestamp()));
                query.insert("signed_request".to_string(), Value::from(identity.signed_request.clone()));
                query.insert("game_signed_request".to_string(), Value::from(identity.game_signed_request.clone()));
                query.insert("PHPSESSID".to_string(), Value::from("null"));
                query.insert("flashsession".to_string(), Value::from("null"));
            }
            Surface::WorldMap => {
                query.insert("game_signed_request".to_string(), Value::from(identity.game_signed_request.clone()));
                query.insert("map_signed_request".to_string(), Value::from(identity.map_signed_request.clone()));
            }
        }
    }

    fn surface_root(&self, surface: Surface) -> (&str, &str) {
        match surface {
            Surface::Primary => (&self.config.links.base_url, &self.config.seeds.base),
            Surface::WorldMap => (&self.config.links.world_map_url, &self.config.seeds.world),
        }
    }

    /// Sign and send one call, returning the decoded JSON body.
    /// Non-success statuses fail with `BotError::Transport`; nothing is retried here.
    pub async fn execute(&self, action: Action, endpoint: &str, mut query: Fields, mut body: Fields) -> Result<Value> {
        let surface = action.surface();
        self.surface_params(surface, &mut query);

        let (root, seed) = self.surface_root(surface);
        let placement = action.placement();
        let signed_source = match placement {
            Placement::Query => &query,
            Placement::Body => &body,
        };
        let parameter_string = build_parameter_string(action, signed_source, &self.config.seeds.world)?;
        let signature = signing::sign(seed, &parameter_string, action.secure())?;

        let target = match placement {
            Placement::Query => &mut query,
            Placement::Body => &mut body,
        };
        target.insert("hn".to_string(), Value::from(signature.nonce.to_string()));
        target.insert("h".to_string(), Value::from(signature.digest));

        let url = format!("{}/{}", root.trim_end_matches('/'), endpoint.trim_start_matches('/'));
        let request_body = match action.body_encoding() {
            BodyEncoding::None => RequestBody::Empty,
            BodyEncoding::Form => RequestBody::Form(to_pairs(&body)),
            BodyEncoding::Json => RequestBody::Json(Value::Object(body)),
        };
        let request = HttpRequest {
            method: action.method(),
            url,
            query: to_pairs(&query),
            body: request_body,
        };

        debug_api_call!(request.method.as_str(), endpoint, action);
        let response = self.transport.send(request).await?;
        self.log_api_call(action, endpoint, response.status);

        if !response.is_success() {
            return Err(BotError::Transport {
                status: response.status,
                endpoint: endpoint.to_string(),
            });
        }

        Ok(serde_json::from_str(&response.body)?)
    }

    /// Execute and decode into a typed model. Shape mismatches become
    /// `BotError::Protocol`.
    pub async fn execute_as<T: DeserializeOwned>(&self, action: Action, endpoint: &str, query: Fields, body: Fields) -> Result<T> {
        let value = self.execute(action, endpoint, query, body).await?;
        decode(value, endpoint)
    }

    fn log_api_call(&self, action: Action, endpoint: &str, status: u16) {
        if !self.api_logging {
            return;
        }

        let timestamp = chrono::Utc::now().format("%Y-%m-%d %H:%M:%S UTC");
        let log_entry = format!(
            "=== [{}] {} {} ({:?}) -> {}\n",
            timestamp,
            action.method().as_str(),
            endpoint,
            action,
            status
        );

        if let Ok(mut file) = OpenOptions::new()
            .create(true)
            .append(true)
            .open("api_debug.log")
        {
            let _ = file.write_all(log_entry.as_bytes());
        }
    }
}

pub fn decode<T: DeserializeOwned>(value: Value, context: &str) -> Result<T> {
    serde_json::from_value(value).map_err(|e| BotError::protocol(format!("{}: {}", context, e)))
}

fn to_pairs(fields: &Fields) -> Vec<(String, String)> {
    fields
        .iter()
        .map(|(key, value)| (key.clone(), render_field(value)))
        .collect()
}

/// Build a `Fields` map from literal pairs
#[macro_export]
macro_rules! fields {
    () => { $crate::client::api::Fields::new() };
    ($($key:expr => $value:expr),+ $(,)?) => {{
        let mut map = $crate::client::api::Fields::new();
        $( map.insert($key.to_string(), serde_json::Value::from($value)); )+
        map
    }};
}

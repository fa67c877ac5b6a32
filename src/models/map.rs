use serde::Deserialize;
use serde_json::Value;
use crate::error::{BotError, Result};

/// Response of the world map update call
#[derive(Debug, Deserialize, Clone)]
pub struct MapObjectsResponse {
    #[serde(default)]
    pub objects: Vec<MapObject>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct MapObject {
    #[serde(default)]
    pub data: MapObjectData,
    #[serde(default)]
    pub actions: Vec<Vec<Value>>,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct MapObjectData {
    #[serde(default)]
    pub combat_guid: Option<Value>,
}

/// Identity of a live battle, read back from a no-op move
#[derive(Debug, Clone, PartialEq)]
pub struct CombatTarget {
    pub combat_guid: String,
    pub engage_id: u32,
    pub server_url: String,
}

impl MapObjectsResponse {
    /// `Ok(None)` when the fleet is not engaged. The first object's first
    /// action carries `[kind, engage_id, _, server_url, ...]` while in combat.
    pub fn combat(&self) -> Result<Option<CombatTarget>> {
        let object = self
            .objects
            .first()
            .ok_or_else(|| BotError::protocol("map update returned no objects"))?;

        let guid = match &object.data.combat_guid {
            None | Some(Value::Null) => return Ok(None),
            Some(Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
        };

        let action = object
            .actions
            .first()
            .ok_or_else(|| BotError::protocol("combat object has no actions"))?;

        let engage_id = action
            .get(1)
            .and_then(|v| match v {
                Value::Number(n) => n.as_u64(),
                Value::String(s) => s.parse().ok(),
                _ => None,
            })
            .and_then(|n| u32::try_from(n).ok())
            .ok_or_else(|| BotError::protocol("combat action has no engage id"))?;

        let server_url = action
            .get(3)
            .and_then(Value::as_str)
            .ok_or_else(|| BotError::protocol("combat action has no server url"))?
            .to_string();

        Ok(Some(CombatTarget {
            combat_guid: guid,
            engage_id,
            server_url,
        }))
    }
}

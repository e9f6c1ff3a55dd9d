// Typed chat reply shapes, used by tests to read back relayed model output.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::json_extract::extract_json_value;
use super::menu::{MenuResult, SchemaError};

const MAX_RECOMMENDATIONS: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PreferenceKind {
    Restriction,
    Flavor,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PreferenceAction {
    Add,
    Remove,
}

fn default_strength() -> u8 {
    2
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreferenceUpdate {
    #[serde(rename = "type")]
    pub kind: PreferenceKind,
    pub action: PreferenceAction,
    pub value: String,
    #[serde(default = "default_strength")]
    pub strength: u8,
}

impl PreferenceUpdate {
    fn is_valid(&self) -> bool {
        !self.value.is_empty() && (1..=3).contains(&self.strength)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Recommendation {
    pub item_id: String,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatReply {
    pub message: String,
    #[serde(default)]
    pub recommendations: Vec<Recommendation>,
    #[serde(default)]
    pub quick_replies: Vec<String>,
    #[serde(default)]
    pub preference_updates: Vec<PreferenceUpdate>,
    #[serde(default)]
    pub trigger_explore: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreChatReply {
    pub message: String,
    #[serde(default)]
    pub quick_replies: Vec<String>,
    #[serde(default)]
    pub preference_updates: Vec<PreferenceUpdate>,
}

impl ChatReply {
    /// Drops recommendations whose item id does not exist in `menu`.
    pub fn retain_menu_recommendations(&mut self, menu: &MenuResult) -> usize {
        let before = self.recommendations.len();
        self.recommendations
            .retain(|rec| menu.item(&rec.item_id).is_some());
        before - self.recommendations.len()
    }
}

fn reply_object(text: &str) -> Result<serde_json::Map<String, Value>, SchemaError> {
    match extract_json_value(text) {
        Some(Value::Object(map)) => Ok(map),
        _ => Err(SchemaError {
            path: "$".to_string(),
            message: "no JSON object found in reply".to_string(),
        }),
    }
}

fn message_field(obj: &serde_json::Map<String, Value>) -> Result<String, SchemaError> {
    match obj.get("message").and_then(Value::as_str) {
        Some(m) if !m.is_empty() => Ok(m.to_string()),
        _ => Err(SchemaError {
            path: "message".to_string(),
            message: "expected a non-empty string".to_string(),
        }),
    }
}

fn string_list(obj: &serde_json::Map<String, Value>, key: &str) -> Vec<String> {
    obj.get(key)
        .and_then(Value::as_array)
        .map(|arr| {
            arr.iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

// Malformed entries are skipped rather than failing the reply.
fn preference_updates(obj: &serde_json::Map<String, Value>) -> Vec<PreferenceUpdate> {
    obj.get("preferenceUpdates")
        .and_then(Value::as_array)
        .map(|arr| {
            arr.iter()
                .filter_map(|v| serde_json::from_value::<PreferenceUpdate>(v.clone()).ok())
                .filter(PreferenceUpdate::is_valid)
                .collect()
        })
        .unwrap_or_default()
}

pub fn parse_chat_reply(text: &str) -> Result<ChatReply, SchemaError> {
    let obj = reply_object(text)?;
    let mut recommendations: Vec<Recommendation> = obj
        .get("recommendations")
        .and_then(Value::as_array)
        .map(|arr| {
            arr.iter()
                .filter_map(|v| serde_json::from_value::<Recommendation>(v.clone()).ok())
                .filter(|r| !r.item_id.is_empty() && !r.reason.is_empty())
                .collect()
        })
        .unwrap_or_default();
    recommendations.truncate(MAX_RECOMMENDATIONS);

    Ok(ChatReply {
        message: message_field(&obj)?,
        recommendations,
        quick_replies: string_list(&obj, "quickReplies"),
        preference_updates: preference_updates(&obj),
        trigger_explore: obj
            .get("triggerExplore")
            .and_then(Value::as_bool)
            .unwrap_or(false),
    })
}

pub fn parse_pre_chat_reply(text: &str) -> Result<PreChatReply, SchemaError> {
    let obj = reply_object(text)?;
    Ok(PreChatReply {
        message: message_field(&obj)?,
        quick_replies: string_list(&obj, "quickReplies"),
        preference_updates: preference_updates(&obj),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proxy::mappers::menu::validate_menu_result;
    use serde_json::json;

    #[test]
    fn test_pre_chat_reply_defaults() {
        let reply = parse_pre_chat_reply("```json\n{\"message\": \"Nice to meet you!\"}\n```").unwrap();
        assert_eq!(reply.message, "Nice to meet you!");
        assert!(reply.quick_replies.is_empty());
        assert!(reply.preference_updates.is_empty());
    }

    #[test]
    fn test_preference_update_strength_default_and_bad_entries() {
        let text = json!({
            "message": "noted",
            "preferenceUpdates": [
                {"type": "restriction", "action": "add", "value": "peanut"},
                {"type": "flavor", "action": "add", "value": "spicy", "strength": 3},
                {"type": "mood", "action": "add", "value": "happy"},
                {"type": "flavor", "action": "add", "value": ""},
                {"type": "flavor", "action": "remove", "value": "sweet", "strength": 7}
            ]
        })
        .to_string();
        let reply = parse_pre_chat_reply(&text).unwrap();
        assert_eq!(reply.preference_updates.len(), 2);
        assert_eq!(reply.preference_updates[0].strength, 2);
        assert_eq!(reply.preference_updates[1].kind, PreferenceKind::Flavor);
    }

    #[test]
    fn test_recommendations_capped_at_three() {
        let recs: Vec<Value> = (0..5)
            .map(|i| json!({"itemId": format!("item000{}", i), "reason": "tasty"}))
            .collect();
        let text = json!({"message": "try these", "recommendations": recs, "triggerExplore": true}).to_string();
        let reply = parse_chat_reply(&text).unwrap();
        assert_eq!(reply.recommendations.len(), 3);
        assert!(reply.trigger_explore);
    }

    #[test]
    fn test_empty_message_is_rejected() {
        assert_eq!(parse_chat_reply(r#"{"message": ""}"#).unwrap_err().path, "message");
        assert!(parse_chat_reply("I am not JSON").is_err());
    }

    #[test]
    fn test_retain_menu_recommendations() {
        let menu = validate_menu_result(&json!({
            "menuType": "cafe",
            "detectedLanguage": "en",
            "priceLevel": 1,
            "categories": [],
            "items": [{"id": "latte001", "nameOriginal": "Latte", "nameTranslated": "拿铁"}],
            "imageCount": 1
        }))
        .unwrap();
        let mut reply = parse_chat_reply(
            &json!({
                "message": "ok",
                "recommendations": [
                    {"itemId": "latte001", "reason": "smooth"},
                    {"itemId": "ghost999", "reason": "made up"}
                ]
            })
            .to_string(),
        )
        .unwrap();
        assert_eq!(reply.retain_menu_recommendations(&menu), 1);
        assert_eq!(reply.recommendations[0].item_id, "latte001");
    }
}

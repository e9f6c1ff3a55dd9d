// Menu recognition result and its tolerant validator

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::whitelist::{Whitelist, ALLERGEN_TYPES, DIETARY_FLAGS, ITEM_TAGS};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MenuType {
    Restaurant,
    Bar,
    Dessert,
    Fastfood,
    Cafe,
    Other,
}

impl MenuType {
    fn parse(value: &str) -> Option<Self> {
        match value {
            "restaurant" => Some(MenuType::Restaurant),
            "bar" => Some(MenuType::Bar),
            "dessert" => Some(MenuType::Dessert),
            "fastfood" => Some(MenuType::Fastfood),
            "cafe" => Some(MenuType::Cafe),
            "other" => Some(MenuType::Other),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MenuResult {
    pub menu_type: MenuType,
    pub detected_language: String,
    pub price_level: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub currency: Option<String>,
    pub categories: Vec<Category>,
    pub items: Vec<MenuItem>,
    pub processing_ms: u64,
    pub image_count: u32,
}

#[cfg(test)]
impl MenuResult {
    pub fn item(&self, id: &str) -> Option<&MenuItem> {
        self.items.iter().find(|item| item.id == id)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    pub id: String,
    pub name_original: String,
    pub name_translated: String,
    pub item_ids: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MenuItem {
    pub id: String,
    pub name_original: String,
    pub name_translated: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description_translated: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price_text: Option<String>,
    pub tags: Vec<String>,
    pub brief: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub brief_detail: Option<String>,
    pub allergens: Vec<Allergen>,
    pub dietary_flags: Vec<String>,
    pub spice_level: u8,
    pub calories: Option<i64>,
}

impl MenuItem {
    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Allergen {
    #[serde(rename = "type")]
    pub kind: String,
    pub uncertain: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{path}: {message}")]
pub struct SchemaError {
    pub path: String,
    pub message: String,
}

impl SchemaError {
    fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

const FORBIDDEN_TOP_LEVEL_FIELDS: [&str; 2] = ["agentRole", "agentGreeting"];

/// Validates a menu record, coercing and filtering loose fields instead of
/// rejecting them. Unknown extra fields are ignored.
pub fn validate_menu_result(value: &Value) -> Result<MenuResult, SchemaError> {
    let obj = value
        .as_object()
        .ok_or_else(|| SchemaError::new("$", "expected an object"))?;

    if let Some(field) = FORBIDDEN_TOP_LEVEL_FIELDS
        .iter()
        .find(|f| obj.contains_key(**f))
    {
        return Err(SchemaError::new(*field, "must not be present"));
    }

    let menu_type = obj
        .get("menuType")
        .and_then(Value::as_str)
        .and_then(MenuType::parse)
        .ok_or_else(|| SchemaError::new("menuType", "expected one of restaurant, bar, dessert, fastfood, cafe, other"))?;

    let detected_language = required_str(obj, "detectedLanguage", "detectedLanguage")?;
    let lang_len = detected_language.chars().count();
    if !(2..=5).contains(&lang_len) {
        return Err(SchemaError::new(
            "detectedLanguage",
            "expected between 2 and 5 characters",
        ));
    }

    let price_level = match obj.get("priceLevel").and_then(Value::as_f64) {
        Some(n) if n == 1.0 || n == 2.0 || n == 3.0 => n as u8,
        _ => return Err(SchemaError::new("priceLevel", "expected 1, 2 or 3")),
    };

    let currency = optional_str(obj, "currency", "currency")?;

    let categories = required_array(obj, "categories", "categories")?
        .iter()
        .enumerate()
        .map(|(i, c)| validate_category(c, &format!("categories[{}]", i)))
        .collect::<Result<Vec<_>, _>>()?;

    let items = required_array(obj, "items", "items")?
        .iter()
        .enumerate()
        .map(|(i, item)| validate_item(item, &format!("items[{}]", i)))
        .collect::<Result<Vec<_>, _>>()?;

    let processing_ms = match obj.get("processingMs") {
        None | Some(Value::Null) => 0,
        Some(v) => v
            .as_f64()
            .filter(|n| n.is_finite() && *n >= 0.0)
            .map(|n| n.round() as u64)
            .ok_or_else(|| SchemaError::new("processingMs", "expected a number"))?,
    };

    let image_count = match obj.get("imageCount").and_then(Value::as_f64) {
        Some(n) if n >= 1.0 && n.is_finite() => n as u32,
        _ => return Err(SchemaError::new("imageCount", "expected a number >= 1")),
    };

    Ok(MenuResult {
        menu_type,
        detected_language,
        price_level,
        currency,
        categories,
        items,
        processing_ms,
        image_count,
    })
}

fn validate_category(value: &Value, path: &str) -> Result<Category, SchemaError> {
    let obj = value
        .as_object()
        .ok_or_else(|| SchemaError::new(path, "expected an object"))?;
    let item_ids = required_array(obj, "itemIds", &format!("{}.itemIds", path))?
        .iter()
        .enumerate()
        .map(|(i, id)| {
            id.as_str()
                .map(str::to_string)
                .ok_or_else(|| SchemaError::new(format!("{}.itemIds[{}]", path, i), "expected a string"))
        })
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Category {
        id: required_str(obj, "id", &format!("{}.id", path))?,
        name_original: required_str(obj, "nameOriginal", &format!("{}.nameOriginal", path))?,
        name_translated: required_str(obj, "nameTranslated", &format!("{}.nameTranslated", path))?,
        item_ids,
    })
}

fn validate_item(value: &Value, path: &str) -> Result<MenuItem, SchemaError> {
    let obj = value
        .as_object()
        .ok_or_else(|| SchemaError::new(path, "expected an object"))?;
    let field = |name: &str| format!("{}.{}", path, name);

    Ok(MenuItem {
        id: required_str(obj, "id", &field("id"))?,
        name_original: required_str(obj, "nameOriginal", &field("nameOriginal"))?,
        name_translated: required_str(obj, "nameTranslated", &field("nameTranslated"))?,
        description_translated: optional_str(obj, "descriptionTranslated", &field("descriptionTranslated"))?,
        price: obj.get("price").and_then(coerce_number),
        price_text: optional_str(obj, "priceText", &field("priceText"))?,
        tags: project_strings(&ITEM_TAGS, obj.get("tags")),
        brief: optional_str(obj, "brief", &field("brief"))?.unwrap_or_default(),
        brief_detail: optional_str(obj, "briefDetail", &field("briefDetail"))?,
        allergens: normalize_allergens(obj.get("allergens")),
        dietary_flags: project_strings(&DIETARY_FLAGS, obj.get("dietaryFlags")),
        spice_level: coerce_spice_level(obj.get("spiceLevel")),
        calories: coerce_calories(obj.get("calories")),
    })
}

fn required_str(obj: &Map<String, Value>, key: &str, path: &str) -> Result<String, SchemaError> {
    match obj.get(key).and_then(Value::as_str) {
        Some(s) if !s.is_empty() => Ok(s.to_string()),
        Some(_) => Err(SchemaError::new(path, "must not be empty")),
        None => Err(SchemaError::new(path, "expected a string")),
    }
}

fn optional_str(obj: &Map<String, Value>, key: &str, path: &str) -> Result<Option<String>, SchemaError> {
    match obj.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(_) => Err(SchemaError::new(path, "expected a string")),
    }
}

fn required_array<'a>(
    obj: &'a Map<String, Value>,
    key: &str,
    path: &str,
) -> Result<&'a Vec<Value>, SchemaError> {
    obj.get(key)
        .and_then(Value::as_array)
        .ok_or_else(|| SchemaError::new(path, "expected an array"))
}

fn project_strings(whitelist: &Whitelist, value: Option<&Value>) -> Vec<String> {
    let values = value
        .and_then(Value::as_array)
        .map(|arr| arr.iter().filter_map(Value::as_str).collect::<Vec<_>>())
        .unwrap_or_default();
    whitelist.project(values)
}

/// Finite number or numeric string; anything else is `None`.
fn coerce_number(value: &Value) -> Option<f64> {
    let n = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    n.is_finite().then_some(n)
}

fn coerce_spice_level(value: Option<&Value>) -> u8 {
    let level = match value {
        Some(Value::String(s)) if s.trim().is_empty() => 0.0,
        Some(v) => coerce_number(v).unwrap_or(0.0),
        None => 0.0,
    };
    level.round().clamp(0.0, 5.0) as u8
}

fn coerce_calories(value: Option<&Value>) -> Option<i64> {
    match value {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) if s.trim().is_empty() || s == "null" => None,
        Some(v) => coerce_number(v).map(|n| n.round() as i64),
    }
}

fn is_truthy(value: &Value) -> bool {
    matches!(value, Value::Bool(true)) || value.as_str() == Some("true")
}

/// Accepts `[{type, uncertain}]` or a `{type: bool}` map. Map entries that
/// are not true are dropped; malformed array entries are dropped.
fn normalize_allergens(value: Option<&Value>) -> Vec<Allergen> {
    let allergens: Vec<Allergen> = match value {
        Some(Value::Array(entries)) => entries
            .iter()
            .filter_map(|entry| {
                let kind = entry.get("type")?.as_str()?;
                Some(Allergen {
                    kind: kind.to_string(),
                    uncertain: entry.get("uncertain").is_some_and(is_truthy),
                })
            })
            .collect(),
        Some(Value::Object(map)) => map
            .iter()
            .filter(|(_, flag)| is_truthy(flag))
            .map(|(kind, _)| Allergen {
                kind: kind.clone(),
                uncertain: false,
            })
            .collect(),
        _ => Vec::new(),
    };
    ALLERGEN_TYPES.project_by(allergens, |a| a.kind.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn item(extra: Value) -> Value {
        let mut base = json!({
            "id": "a1b2c3d4",
            "nameOriginal": "麻婆豆腐",
            "nameTranslated": "Mapo Tofu",
        });
        if let (Some(base_obj), Some(extra_obj)) = (base.as_object_mut(), extra.as_object()) {
            for (k, v) in extra_obj {
                base_obj.insert(k.clone(), v.clone());
            }
        }
        base
    }

    fn menu_with(items: Vec<Value>) -> Value {
        json!({
            "menuType": "restaurant",
            "detectedLanguage": "zh",
            "priceLevel": 2,
            "currency": "CNY",
            "categories": [{
                "id": "c1",
                "nameOriginal": "热菜",
                "nameTranslated": "Hot dishes",
                "itemIds": ["a1b2c3d4", "missing1"]
            }],
            "items": items,
            "imageCount": 1
        })
    }

    #[test]
    fn test_minimal_item_gets_defaults() {
        let menu = validate_menu_result(&menu_with(vec![item(json!({}))])).unwrap();
        let first = &menu.items[0];
        assert_eq!(first.brief, "");
        assert!(first.tags.is_empty());
        assert!(first.allergens.is_empty());
        assert_eq!(first.spice_level, 0);
        assert_eq!(first.calories, None);
        assert_eq!(menu.processing_ms, 0);
        // dangling category references are tolerated
        assert_eq!(menu.categories[0].item_ids.len(), 2);
    }

    #[test]
    fn test_allergen_map_drops_false_entries() {
        let menu = validate_menu_result(&menu_with(vec![item(
            json!({"allergens": {"peanut": true, "fish": false}}),
        )]))
        .unwrap();
        assert_eq!(
            serde_json::to_value(&menu.items[0].allergens).unwrap(),
            json!([{"type": "peanut", "uncertain": false}])
        );
    }

    #[test]
    fn test_allergen_array_coerces_uncertain_and_whitelists() {
        let menu = validate_menu_result(&menu_with(vec![item(json!({
            "allergens": [
                {"type": "egg", "uncertain": "true"},
                {"type": "soy"},
                {"type": "msg", "uncertain": true},
                "dairy",
                {"uncertain": true}
            ]
        }))]))
        .unwrap();
        assert_eq!(
            menu.items[0].allergens,
            vec![
                Allergen { kind: "egg".into(), uncertain: true },
                Allergen { kind: "soy".into(), uncertain: false },
            ]
        );
    }

    #[test]
    fn test_invalid_tag_is_dropped_not_fatal() {
        let menu = validate_menu_result(&menu_with(vec![item(
            json!({"tags": ["spicy", "contains_gluten"], "dietaryFlags": ["halal", "paleo"]}),
        )]))
        .unwrap();
        assert_eq!(menu.items[0].tags, vec!["spicy"]);
        assert_eq!(menu.items[0].dietary_flags, vec!["halal"]);
    }

    #[test]
    fn test_repeated_tags_collapse_to_one() {
        let menu = validate_menu_result(&menu_with(vec![item(json!({
            "tags": ["spicy", "popular", "spicy", "bogus", "popular"],
            "dietaryFlags": ["halal", "halal"]
        }))]))
        .unwrap();
        assert_eq!(menu.items[0].tags, vec!["spicy", "popular"]);
        assert_eq!(menu.items[0].dietary_flags, vec!["halal"]);
    }

    #[test]
    fn test_spice_level_coercion() {
        let cases = [
            (json!("3"), 3),
            (json!(2.6), 3),
            (json!(9), 5),
            (json!(-2), 0),
            (json!("very hot"), 0),
            (json!(null), 0),
        ];
        for (input, expected) in cases {
            let menu = validate_menu_result(&menu_with(vec![item(json!({"spiceLevel": input}))])).unwrap();
            assert_eq!(menu.items[0].spice_level, expected);
        }
    }

    #[test]
    fn test_calories_coercion() {
        let cases = [
            (json!("450"), Some(450)),
            (json!(320.4), Some(320)),
            (json!(""), None),
            (json!("null"), None),
            (json!("about 300"), None),
            (json!(null), None),
        ];
        for (input, expected) in cases {
            let menu = validate_menu_result(&menu_with(vec![item(json!({"calories": input}))])).unwrap();
            assert_eq!(menu.items[0].calories, expected);
        }
    }

    #[test]
    fn test_agent_fields_reject_record() {
        let mut menu = menu_with(vec![item(json!({}))]);
        menu["agentRole"] = json!("waiter");
        let err = validate_menu_result(&menu).unwrap_err();
        assert_eq!(err.path, "agentRole");

        let mut menu = menu_with(vec![item(json!({}))]);
        menu["agentGreeting"] = json!("hello");
        assert!(validate_menu_result(&menu).is_err());
    }

    #[test]
    fn test_required_fields() {
        let mut menu = menu_with(vec![item(json!({}))]);
        menu.as_object_mut().unwrap().remove("items");
        assert_eq!(validate_menu_result(&menu).unwrap_err().path, "items");

        let menu = menu_with(vec![item(json!({"nameTranslated": ""}))]);
        assert_eq!(
            validate_menu_result(&menu).unwrap_err().path,
            "items[0].nameTranslated"
        );
    }

    #[test]
    fn test_enum_and_range_fields() {
        let mut menu = menu_with(vec![]);
        menu["menuType"] = json!("diner");
        assert_eq!(validate_menu_result(&menu).unwrap_err().path, "menuType");

        let mut menu = menu_with(vec![]);
        menu["priceLevel"] = json!(4);
        assert_eq!(validate_menu_result(&menu).unwrap_err().path, "priceLevel");

        let mut menu = menu_with(vec![]);
        menu["detectedLanguage"] = json!("chinese");
        assert_eq!(validate_menu_result(&menu).unwrap_err().path, "detectedLanguage");

        let mut menu = menu_with(vec![]);
        menu["imageCount"] = json!(0);
        assert_eq!(validate_menu_result(&menu).unwrap_err().path, "imageCount");
    }

    #[test]
    fn test_unknown_fields_ignored_and_round_trip() {
        let mut raw = menu_with(vec![item(json!({"price": "38", "chefNote": "x"}))]);
        raw["extra"] = json!({"anything": true});
        let menu = validate_menu_result(&raw).unwrap();
        assert_eq!(menu.items[0].price, Some(38.0));
        let again = validate_menu_result(&serde_json::to_value(&menu).unwrap()).unwrap();
        assert_eq!(again, menu);
    }
}

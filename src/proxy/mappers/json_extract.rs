use regex::Regex;
use serde_json::Value;
use std::sync::LazyLock;

static FENCED_BLOCK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"```(?:json)?\s*([\s\S]*?)\s*```").expect("valid fenced block regex")
});

/// Recovers a JSON object from free-form model output. Tries, in order, the
/// whole text, the first fenced code block, then the outermost brace span.
pub fn extract_json_value(text: &str) -> Option<Value> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }

    if let Ok(value) = serde_json::from_str::<Value>(trimmed) {
        return Some(value);
    }

    if let Some(inner) = FENCED_BLOCK.captures(trimmed).and_then(|c| c.get(1)) {
        if let Ok(value) = serde_json::from_str::<Value>(inner.as_str()) {
            return Some(value);
        }
    }

    let start = trimmed.find('{')?;
    let end = trimmed.rfind('}')?;
    if end <= start {
        return None;
    }
    serde_json::from_str::<Value>(&trimmed[start..=end]).ok()
}

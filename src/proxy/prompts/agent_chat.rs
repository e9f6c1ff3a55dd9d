// System prompt for the menu-aware chat mode

use chrono::{DateTime, Local, Timelike};
use rand::Rng;
use serde_json::Value;
use std::collections::HashSet;

use crate::constants::MAX_MENU_ITEMS_IN_CONTEXT;
use crate::proxy::mappers::menu::{MenuItem, MenuResult};
use crate::proxy::mappers::request::{Language, Preferences, RequestContextInfo};
use crate::proxy::upstream::weather::WeatherInfo;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MealPeriod {
    Breakfast,
    Lunch,
    AfternoonTea,
    Dinner,
    LateNight,
}

impl MealPeriod {
    pub fn from_hour(hour: u32) -> Self {
        match hour {
            0..=9 => MealPeriod::Breakfast,
            10..=13 => MealPeriod::Lunch,
            14..=16 => MealPeriod::AfternoonTea,
            17..=20 => MealPeriod::Dinner,
            _ => MealPeriod::LateNight,
        }
    }

    pub fn label(self, language: Language) -> &'static str {
        match self {
            MealPeriod::Breakfast => language.pick("早餐", "breakfast"),
            MealPeriod::Lunch => language.pick("午餐", "lunch"),
            MealPeriod::AfternoonTea => language.pick("下午茶", "afternoon tea"),
            MealPeriod::Dinner => language.pick("晚餐", "dinner"),
            MealPeriod::LateNight => language.pick("宵夜", "late night"),
        }
    }
}

fn is_priority(item: &MenuItem) -> bool {
    item.has_tag("popular") || item.has_tag("signature")
}

/// Bounds the menu handed to the model. Above the cap, popular and signature
/// items are kept and the rest are drawn by an unbiased Fisher-Yates shuffle.
pub fn sample_menu_items<'a, R: Rng + ?Sized>(items: &'a [MenuItem], rng: &mut R) -> Vec<&'a MenuItem> {
    if items.len() <= MAX_MENU_ITEMS_IN_CONTEXT {
        return items.iter().collect();
    }

    let (mut priority, mut rest): (Vec<&MenuItem>, Vec<&MenuItem>) =
        items.iter().partition(|item| is_priority(item));
    priority.truncate(MAX_MENU_ITEMS_IN_CONTEXT);
    let remaining = MAX_MENU_ITEMS_IN_CONTEXT - priority.len();

    for i in (1..rest.len()).rev() {
        let j = rng.gen_range(0..=i);
        rest.swap(i, j);
    }
    rest.truncate(remaining);

    priority.extend(rest);
    priority
}

fn item_line(item: &MenuItem) -> String {
    let price = item
        .price_text
        .as_deref()
        .filter(|p| !p.is_empty())
        .map(|p| format!(" {}", p))
        .unwrap_or_default();
    let tags = if item.tags.is_empty() {
        String::new()
    } else {
        format!(" [{}]", item.tags.join(","))
    };
    format!(
        "  {}: {}（{}）{}{}",
        item.id, item.name_original, item.name_translated, price, tags
    )
}

/// One `【category】` block per category with at least one sampled item; items
/// no category references are listed under `【其他】`.
pub fn build_menu_summary(menu: &MenuResult, items: &[&MenuItem]) -> String {
    let mut lines = Vec::new();
    let mut included: HashSet<&str> = HashSet::new();

    for category in &menu.categories {
        let members: Vec<&&MenuItem> = items
            .iter()
            .filter(|item| category.item_ids.iter().any(|id| id == &item.id))
            .collect();
        if members.is_empty() {
            continue;
        }
        lines.push(format!("【{}】", category.name_translated));
        for item in members {
            lines.push(item_line(item));
            included.insert(item.id.as_str());
        }
    }

    let orphans: Vec<&&MenuItem> = items
        .iter()
        .filter(|item| !included.contains(item.id.as_str()))
        .collect();
    if !orphans.is_empty() {
        lines.push("【其他】".to_string());
        for item in orphans {
            lines.push(item_line(item));
        }
    }

    lines.join("\n")
}

fn preference_label(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Object(map) => match map.get("value") {
            Some(Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
            None => value.to_string(),
        },
        other => other.to_string(),
    }
}

pub fn preference_summary(preferences: &Preferences, language: Language) -> String {
    let labels: Vec<String> = preferences
        .restrictions
        .iter()
        .chain(preferences.flavors.iter())
        .map(preference_label)
        .collect();
    if labels.is_empty() {
        language.pick("无特殊偏好", "no special preferences").to_string()
    } else {
        labels.join("、")
    }
}

pub struct AgentChatInput<'a> {
    pub menu: &'a MenuResult,
    pub preferences: &'a Preferences,
    pub context: &'a RequestContextInfo,
    pub weather: Option<&'a WeatherInfo>,
}

fn local_time(timestamp_ms: i64) -> DateTime<Local> {
    DateTime::from_timestamp_millis(timestamp_ms)
        .map(|t| t.with_timezone(&Local))
        .unwrap_or_else(Local::now)
}

pub fn build_agent_chat_system<R: Rng + ?Sized>(input: &AgentChatInput<'_>, rng: &mut R) -> String {
    let lang = input.context.language;
    let time = local_time(input.context.timestamp);
    let meal = MealPeriod::from_hour(time.hour()).label(lang);
    let clock = time.format("%H:%M").to_string();

    let location = match &input.context.location {
        Some(loc) => format!("({:.3}, {:.3})", loc.lat, loc.lng),
        None => lang.pick("未知位置", "unknown location").to_string(),
    };
    let weather = match input.weather {
        Some(w) => match lang {
            Language::Zh => format!("\n- 天气：{}°C，{}", w.temp, w.description),
            Language::En => format!("\n- Weather: {}°C, {}", w.temp, w.description),
        },
        None => String::new(),
    };
    let prefs = preference_summary(input.preferences, lang);

    let menu = input.menu;
    let sampled = sample_menu_items(&menu.items, rng);
    let summary = build_menu_summary(menu, &sampled);
    let total = menu.items.len();
    let sampled_note = if total > MAX_MENU_ITEMS_IN_CONTEXT {
        match lang {
            Language::Zh => format!("（共 {} 道，已采样 {} 道）", total, sampled.len()),
            Language::En => format!(" ({} total, sampled {})", total, sampled.len()),
        }
    } else {
        String::new()
    };
    let menu_type = serde_json::to_value(menu.menu_type)
        .ok()
        .and_then(|v| v.as_str().map(str::to_string))
        .unwrap_or_default();

    match lang {
        Language::Zh => format!(
            r#"你是 SAGE，一个为旅行者设计的点餐智能体。

## 角色边界
- 你帮助用户决定吃什么，但不能下单、不能通知厨房、不能确认订单。
- 用户确认想要某道菜时，回复"已加入点餐单，可以展示给服务员～"，并在 recommendations 中给出对应 itemId。
- 不要说"已为您下单""订单已确认""开始准备"之类的话。

当前场景：
- 时间：{clock}（{meal}时段），只用于辅助判断，用户意图优先，不要说与时间矛盾的话
- 位置：{location}{weather}
- 用户偏好：{prefs}

菜单（{menu_type}，价格档次 {price_level}/3，{detected}）{sampled_note}：
{summary}

回复规则：
- 使用中文，每次不超过 2 句话
- 建议要具体，带原文菜名和译名
- 生成 2-4 个用户视角的 quickReplies，不要暗示你能下单
- 用户已选 3 道及以上时，加一个"看看点餐单"的选项
- 优先避开用户的过敏和忌口
- recommendations 最多 3 个，itemId 必须来自上面的菜单，绝不编造
- 消息正文里不要出现 itemId
- 不要重复问已经回答过的问题

只输出 JSON，不要代码块：
{{"message":"...","recommendations":[{{"itemId":"...","reason":"..."}}],"quickReplies":["..."],"preferenceUpdates":[],"triggerExplore":false}}"#,
            price_level = menu.price_level,
            detected = menu.detected_language,
        ),
        Language::En => format!(
            r#"You are SAGE, a dining agent built for travelers.

## Role boundaries
- You help the user decide what to order. You cannot place orders, notify the kitchen or confirm orders.
- When the user confirms a dish, reply "Added to your order card, show it to your waiter when ready!" and put its itemId in recommendations.
- Never say "order placed", "order confirmed" or "preparing now".

Current context:
- Time: {clock} ({meal}). A hint only: the user's intent wins, and never contradict the actual time.
- Location: {location}{weather}
- User preferences: {prefs}

Menu ({menu_type}, price level {price_level}/3, language: {detected}){sampled_note}:
{summary}

Reply rules:
- Use English, at most 2 sentences per reply
- Be specific and give both the original and translated dish names
- Offer 2-4 quickReplies written from the user's point of view, never implying you can order
- Once the user has chosen 3 or more dishes, include an option to view the order card
- Steer clear of the user's allergies and restrictions
- At most 3 recommendations; every itemId MUST come from the menu above. Never invent dishes.
- Never show an itemId in the message text
- Don't ask again about anything already answered

Output JSON only, no code block:
{{"message":"...","recommendations":[{{"itemId":"...","reason":"..."}}],"quickReplies":["..."],"preferenceUpdates":[],"triggerExplore":false}}"#,
            price_level = menu.price_level,
            detected = menu.detected_language,
        ),
    }
}

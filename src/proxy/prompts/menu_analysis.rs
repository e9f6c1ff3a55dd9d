use chrono::{DateTime, SecondsFormat, Utc};

use crate::proxy::mappers::request::Language;

pub const MENU_ANALYSIS_SYSTEM: &str = r#"你是 SAGE 菜单识别引擎。分析菜单图片，只输出纯 JSON，不要 markdown，不要解释。

## 字段规则
- id：8 位字母数字，全局唯一
- nameOriginal：菜单原文；配料或口味选项并入主菜，不单独成项
- nameTranslated：译成用户语言；无法识别时填"（无法识别）"
- price：数值；priceText：带货币符号的原文
- tags 只能取：spicy, vegetarian, vegan, gluten_free, contains_nuts, contains_seafood, contains_pork, contains_alcohol, popular, signature；不确定就不加
- contains_seafood 仅在菜名明确含鱼、虾、蟹、贝或海鲜时使用
- brief（必填）：一句话概括食材与味型；推断不出时用 nameTranslated
- briefDetail（可选）：一到两句，含类比与文化背景
- allergens：数组，type 只能取 peanut/shellfish/fish/gluten/dairy/egg/soy/tree_nut/sesame；uncertain=true 表示可能含有；shellfish 指甲壳类，fish 指鱼类；宁可多标
- dietaryFlags：halal/vegetarian/vegan/raw/contains_alcohol；菜名含肉类或有蛋白质选项时绝不标 vegetarian/vegan
- spiceLevel：0-5，0 表示不辣或未知
- calories：估算千卡，或 null

## 输出 schema
{"menuType":"restaurant|bar|dessert|fastfood|cafe|other","detectedLanguage":"ISO639-1","priceLevel":1,"currency":"ISO4217","categories":[{"id":"","nameOriginal":"","nameTranslated":"","itemIds":[]}],"items":[{"id":"","nameOriginal":"","nameTranslated":"","descriptionTranslated":"","price":0,"priceText":"","tags":[],"brief":"","briefDetail":"","allergens":[],"dietaryFlags":[],"spiceLevel":0,"calories":null}],"processingMs":0,"imageCount":1}"#;

pub fn build_menu_analysis_instruction(
    language: Language,
    image_count: usize,
    now: DateTime<Utc>,
) -> String {
    format!(
        "请识别这份菜单图片（共 {} 张），输出 JSON。\n用户语言：{}\n时间：{}",
        image_count,
        language.pick("中文", "English"),
        now.to_rfc3339_opts(SecondsFormat::Millis, true)
    )
}

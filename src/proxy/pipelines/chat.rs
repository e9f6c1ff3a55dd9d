use crate::constants::MAX_CHAT_MESSAGES;
use crate::proxy::config::ModelsConfig;
use crate::proxy::handlers::errors::ApiError;
use crate::proxy::mappers::menu::validate_menu_result;
use crate::proxy::mappers::request::{ChatMode, ChatRequest};
use crate::proxy::prompts::{build_agent_chat_system, pre_chat_system, AgentChatInput};
use crate::proxy::upstream::fallback::Attempt;
use crate::proxy::upstream::models::ChatMessage;
use crate::proxy::upstream::weather::WeatherClient;

/// Everything needed to open the streamed reply for one chat turn.
#[derive(Debug, Clone)]
pub struct ChatPlan {
    pub mode: ChatMode,
    pub primary: Attempt,
    pub fallback: Option<Attempt>,
    pub messages: Vec<ChatMessage>,
}

/// Validates a chat turn and assembles its prompt. Any rejection happens
/// here, before a model is contacted.
pub async fn plan(
    request: ChatRequest,
    models: &ModelsConfig,
    weather: &WeatherClient,
) -> Result<ChatPlan, ApiError> {
    if request.messages.len() > MAX_CHAT_MESSAGES {
        return Err(ApiError::invalid_request(format!(
            "messages: at most {} allowed",
            MAX_CHAT_MESSAGES
        )));
    }

    let ChatRequest {
        mode,
        messages,
        menu_data,
        preferences,
        context,
    } = request;

    let (system_prompt, primary, fallback) = match mode {
        ChatMode::PreChat => (
            pre_chat_system(context.language).to_string(),
            Attempt::from(&models.chat_fast),
            None,
        ),
        ChatMode::Chat => {
            let menu_data = menu_data
                .filter(|m| !m.is_null())
                .ok_or_else(|| ApiError::invalid_request("menuData is required for mode=chat"))?;
            let menu = validate_menu_result(&menu_data).map_err(|e| {
                tracing::warn!("Rejected client menuData: {}", e);
                ApiError::invalid_request("menuData schema invalid")
            })?;

            let conditions = match &context.location {
                Some(loc) => weather.current(loc.lat, loc.lng, context.language).await,
                None => None,
            };

            let input = AgentChatInput {
                menu: &menu,
                preferences: &preferences,
                context: &context,
                weather: conditions.as_ref(),
            };
            let system = {
                let mut rng = rand::thread_rng();
                build_agent_chat_system(&input, &mut rng)
            };
            (
                system,
                Attempt::from(&models.chat_accurate),
                Some(Attempt::from(&models.chat_fast)),
            )
        }
    };

    let mut upstream_messages = Vec::with_capacity(messages.len() + 1);
    upstream_messages.push(ChatMessage::system(system_prompt));
    upstream_messages.extend(
        messages
            .into_iter()
            .map(|turn| ChatMessage::text(turn.role.as_str(), turn.content)),
    );

    Ok(ChatPlan {
        mode,
        primary,
        fallback,
        messages: upstream_messages,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proxy::config::WeatherConfig;
    use crate::proxy::handlers::errors::ErrorCode;
    use crate::proxy::mappers::request::{ChatRole, ChatTurn, Preferences, RequestContextInfo, Language, Location};
    use crate::proxy::tests::StubUpstream;
    use crate::proxy::upstream::models::MessageContent;
    use serde_json::json;

    fn offline_weather() -> WeatherClient {
        WeatherClient::new(
            reqwest::Client::new(),
            &WeatherConfig {
                base_url: "http://127.0.0.1:9/forecast".to_string(),
                timeout_ms: 200,
            },
        )
    }

    fn request(mode: ChatMode, menu: Option<serde_json::Value>) -> ChatRequest {
        ChatRequest {
            mode,
            messages: vec![ChatTurn {
                role: ChatRole::User,
                content: "just me".to_string(),
            }],
            menu_data: menu,
            preferences: Preferences::default(),
            context: RequestContextInfo {
                language: Language::En,
                timestamp: 1_700_000_000_000,
                location: None,
            },
        }
    }

    fn menu() -> serde_json::Value {
        json!({
            "menuType": "restaurant",
            "detectedLanguage": "ja",
            "priceLevel": 2,
            "categories": [],
            "items": [{"id": "ramen001", "nameOriginal": "ラーメン", "nameTranslated": "Ramen"}],
            "imageCount": 1
        })
    }

    fn system_text(plan: &ChatPlan) -> &str {
        match &plan.messages[0].content {
            MessageContent::Text(text) => text,
            MessageContent::Parts(_) => panic!("system prompt should be text"),
        }
    }

    #[tokio::test]
    async fn test_pre_chat_uses_fast_model_without_fallback() {
        let models = ModelsConfig::default();
        let plan = plan(request(ChatMode::PreChat, None), &models, &offline_weather())
            .await
            .unwrap();
        assert_eq!(plan.primary.model, models.chat_fast.name);
        assert!(plan.fallback.is_none());
        assert_eq!(plan.messages.len(), 2);
        assert_eq!(plan.messages[0].role, "system");
        assert!(system_text(&plan).contains("still being scanned"));
        assert_eq!(plan.messages[1], ChatMessage::user("just me"));
    }

    #[tokio::test]
    async fn test_chat_requires_menu() {
        let models = ModelsConfig::default();
        for menu in [None, Some(serde_json::Value::Null)] {
            let err = plan(request(ChatMode::Chat, menu), &models, &offline_weather())
                .await
                .unwrap_err();
            assert_eq!(err.code(), ErrorCode::InvalidRequest);
            assert_eq!(err.detail(), Some("menuData is required for mode=chat"));
        }
    }

    #[tokio::test]
    async fn test_chat_rejects_tampered_menu() {
        let mut tampered = menu();
        tampered["agentRole"] = json!("pirate");
        let err = plan(request(ChatMode::Chat, Some(tampered)), &ModelsConfig::default(), &offline_weather())
            .await
            .unwrap_err();
        assert_eq!(err.detail(), Some("menuData schema invalid"));
    }

    #[tokio::test]
    async fn test_chat_uses_accurate_model_with_fast_fallback() {
        let models = ModelsConfig::default();
        let plan = plan(request(ChatMode::Chat, Some(menu())), &models, &offline_weather())
            .await
            .unwrap();
        assert_eq!(plan.primary.model, "qwen3.5-plus");
        assert_eq!(plan.fallback.as_ref().map(|a| a.model.as_str()), Some("qwen3.5-flash"));
        assert!(system_text(&plan).contains("ramen001: ラーメン（Ramen）"));
        assert!(!system_text(&plan).contains("Weather:"));
    }

    #[tokio::test]
    async fn test_chat_embeds_weather_when_located() {
        let stub = StubUpstream::start().await;
        stub.weather(json!({"current": {"temperature_2m": 9.2, "weather_code": 63}}));
        let weather = WeatherClient::new(
            reqwest::Client::new(),
            &WeatherConfig {
                base_url: stub.weather_url(),
                timeout_ms: 2_000,
            },
        );
        let mut req = request(ChatMode::Chat, Some(menu()));
        req.context.location = Some(Location { lat: 35.68, lng: 139.69, accuracy: Some(20.0) });
        let plan = plan(req, &ModelsConfig::default(), &weather).await.unwrap();
        assert!(system_text(&plan).contains("Weather: 9°C, Rain"));
        assert!(system_text(&plan).contains("(35.680, 139.690)"));
    }

    #[tokio::test]
    async fn test_too_many_messages() {
        let mut req = request(ChatMode::PreChat, None);
        req.messages = vec![req.messages[0].clone(); MAX_CHAT_MESSAGES + 1];
        let err = plan(req, &ModelsConfig::default(), &offline_weather())
            .await
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::InvalidRequest);
    }
}

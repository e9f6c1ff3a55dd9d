// Menu photo analysis: vision call with model fallback, then tolerant validation

use chrono::Utc;
use serde::Serialize;
use serde_json::json;
use std::time::Instant;

use crate::constants::{
    estimate_base64_bytes, MAX_IMAGES, MAX_IMAGE_BYTES, MAX_TOTAL_IMAGE_BYTES,
    SUPPORTED_IMAGE_MIME_TYPES,
};
use crate::proxy::config::ModelsConfig;
use crate::proxy::handlers::errors::{ApiError, ErrorCode};
use crate::proxy::mappers::json_extract::extract_json_value;
use crate::proxy::mappers::menu::{validate_menu_result, MenuResult};
use crate::proxy::mappers::request::{AnalyzeRequest, ImageInput, Language};
use crate::proxy::prompts::{build_menu_analysis_instruction, MENU_ANALYSIS_SYSTEM};
use crate::proxy::upstream::client::ModelClient;
use crate::proxy::upstream::fallback::{run_with_fallback, Attempt, FallbackOutcome};
use crate::proxy::upstream::models::{ChatMessage, ContentPart};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnalyzeStage {
    Uploading,
    Preparing,
    VisionPrimary,
    VisionFallback,
    Validating,
    Completed,
}

impl AnalyzeStage {
    pub fn as_str(self) -> &'static str {
        match self {
            AnalyzeStage::Uploading => "uploading",
            AnalyzeStage::Preparing => "preparing",
            AnalyzeStage::VisionPrimary => "vision_primary",
            AnalyzeStage::VisionFallback => "vision_fallback",
            AnalyzeStage::Validating => "validating",
            AnalyzeStage::Completed => "completed",
        }
    }

    pub fn progress(self) -> u8 {
        match self {
            AnalyzeStage::Uploading => 10,
            AnalyzeStage::Preparing => 20,
            AnalyzeStage::VisionPrimary => 45,
            AnalyzeStage::VisionFallback => 65,
            AnalyzeStage::Validating => 85,
            AnalyzeStage::Completed => 100,
        }
    }

    pub fn message(self, language: Language) -> &'static str {
        match self {
            AnalyzeStage::Uploading => {
                language.pick("收到图片，开始处理…", "Images received. Processing upload…")
            }
            AnalyzeStage::Preparing => language.pick(
                "图片上传完成，准备识别…",
                "Upload complete. Preparing vision analysis…",
            ),
            AnalyzeStage::VisionPrimary => {
                language.pick("正在识别菜单（快速模型）…", "Scanning menu with fast model…")
            }
            AnalyzeStage::VisionFallback => language.pick(
                "快速模型失败，切换增强模型…",
                "Fast model failed, switching to fallback model…",
            ),
            AnalyzeStage::Validating => language.pick("解析识别结果…", "Validating result…"),
            AnalyzeStage::Completed => language.pick("识别完成", "Completed"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProgressEvent {
    pub stage: &'static str,
    pub progress: u8,
    pub message: &'static str,
}

impl ProgressEvent {
    pub fn new(stage: AnalyzeStage, language: Language) -> Self {
        Self {
            stage: stage.as_str(),
            progress: stage.progress(),
            message: stage.message(language),
        }
    }
}

/// An analyze request that passed every local check.
#[derive(Debug, Clone)]
pub struct PreparedAnalyze {
    pub images: Vec<ImageInput>,
    pub language: Language,
}

/// Rejects a request on count, mime type or size before any model call.
pub fn prepare(request: AnalyzeRequest) -> Result<PreparedAnalyze, ApiError> {
    let AnalyzeRequest { images, context } = request;

    if images.len() > MAX_IMAGES {
        return Err(ApiError::with_detail(
            ErrorCode::TooManyImages,
            format!("{} images received, at most {} allowed", images.len(), MAX_IMAGES),
        ));
    }
    if images.is_empty() {
        return Err(ApiError::invalid_request("At least one image is required"));
    }

    let mut total = 0usize;
    for (index, image) in images.iter().enumerate() {
        if !SUPPORTED_IMAGE_MIME_TYPES.contains(&image.mime_type.as_str()) {
            return Err(ApiError::invalid_request(format!(
                "images[{}]: unsupported mime type {}",
                index, image.mime_type
            )));
        }
        if image.data.is_empty() {
            return Err(ApiError::invalid_request(format!("images[{}]: empty data", index)));
        }
        let bytes = estimate_base64_bytes(&image.data);
        if bytes > MAX_IMAGE_BYTES {
            return Err(ApiError::with_detail(
                ErrorCode::PayloadTooLarge,
                "Image exceeds 4 MB",
            ));
        }
        total += bytes;
    }
    if total > MAX_TOTAL_IMAGE_BYTES {
        return Err(ApiError::with_detail(
            ErrorCode::PayloadTooLarge,
            "Total images exceed 10 MB",
        ));
    }

    Ok(PreparedAnalyze {
        images,
        language: context.language,
    })
}

fn build_messages(prepared: &PreparedAnalyze) -> Vec<ChatMessage> {
    let mut parts: Vec<ContentPart> = prepared
        .images
        .iter()
        .map(|img| ContentPart::image_data(&img.mime_type, &img.data))
        .collect();
    parts.push(ContentPart::text(build_menu_analysis_instruction(
        prepared.language,
        prepared.images.len(),
        Utc::now(),
    )));
    vec![
        ChatMessage::system(MENU_ANALYSIS_SYSTEM),
        ChatMessage::user_parts(parts),
    ]
}

/// Extracts, stamps and validates one model reply. Zero items counts as a failure.
fn parse_menu(text: &str, image_count: usize) -> Result<MenuResult, String> {
    let mut value = extract_json_value(text).ok_or("no JSON object in model output")?;
    match value.as_object_mut() {
        Some(obj) => {
            obj.insert("imageCount".to_string(), json!(image_count));
        }
        None => return Err("model output is not a JSON object".to_string()),
    }
    let menu = validate_menu_result(&value).map_err(|e| e.to_string())?;
    if menu.items.is_empty() {
        return Err("zero items recognized".to_string());
    }
    Ok(menu)
}

pub async fn run<F>(
    client: &ModelClient,
    models: &ModelsConfig,
    prepared: PreparedAnalyze,
    mut on_progress: F,
) -> Result<MenuResult, ApiError>
where
    F: FnMut(ProgressEvent),
{
    let started = Instant::now();
    let language = prepared.language;
    let image_count = prepared.images.len();
    on_progress(ProgressEvent::new(AnalyzeStage::Preparing, language));

    let messages = build_messages(&prepared);
    let messages_ref = &messages;
    let attempts = [
        Attempt::from(&models.vision_fast),
        Attempt::from(&models.vision_accurate),
    ];

    let outcome = run_with_fallback(&attempts, |_| true, |index, attempt| {
        let stage = if index == 0 {
            AnalyzeStage::VisionPrimary
        } else {
            AnalyzeStage::VisionFallback
        };
        on_progress(ProgressEvent::new(stage, language));
        let model = attempt.model.clone();
        let timeout = attempt.timeout;
        async move { client.stream_aggregate(&model, messages_ref, timeout).await }
    })
    .await;

    let (text, model_used, index) = match outcome {
        FallbackOutcome::Success {
            value,
            model,
            index,
        } => (value, model, index),
        FallbackOutcome::Exhausted { errors } => {
            let code = errors
                .last()
                .map(|(_, e)| e.error_code())
                .unwrap_or(ErrorCode::AiUnavailable);
            tracing::error!(attempts = errors.len(), code = %code, "Every vision model failed");
            return Err(ApiError::with_detail(code, "Vision models failed"));
        }
    };

    on_progress(ProgressEvent::new(AnalyzeStage::Validating, language));

    let (mut menu, model_used) = match parse_menu(&text, image_count) {
        Ok(menu) => (menu, model_used),
        Err(reason) if index == 0 => {
            // one re-attempt against the accurate model, only for fast-model output
            tracing::warn!(model = %model_used, "Vision output rejected, retrying with accurate model: {}", reason);
            let accurate = &models.vision_accurate;
            let retry_text = client
                .stream_aggregate(&accurate.name, &messages, accurate.timeout())
                .await
                .map_err(|e| {
                    tracing::error!("Vision re-attempt failed: {}", e);
                    ApiError::with_detail(ErrorCode::AiInvalidResponse, "Menu could not be parsed")
                })?;
            let menu = parse_menu(&retry_text, image_count).map_err(|reason| {
                tracing::error!(model = %accurate.name, "Vision output rejected again: {}", reason);
                ApiError::with_detail(ErrorCode::AiInvalidResponse, "Menu could not be parsed")
            })?;
            (menu, accurate.name.clone())
        }
        Err(reason) => {
            tracing::error!(model = %model_used, "Vision output rejected: {}", reason);
            return Err(ApiError::with_detail(
                ErrorCode::AiInvalidResponse,
                "Menu could not be parsed",
            ));
        }
    };

    menu.processing_ms = started.elapsed().as_millis() as u64;
    tracing::info!(
        model = %model_used,
        items = menu.items.len(),
        images = image_count,
        processing_ms = menu.processing_ms,
        language = %menu.detected_language,
        "Menu analysis succeeded"
    );
    Ok(menu)
}

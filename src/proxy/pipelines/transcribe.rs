use crate::constants::{estimate_base64_bytes, MAX_AUDIO_BYTES};
use crate::proxy::config::ModelTier;
use crate::proxy::handlers::errors::{ApiError, ErrorCode};
use crate::proxy::mappers::request::{Language, TranscribeRequest};
use crate::proxy::upstream::client::ModelClient;
use crate::proxy::upstream::models::{ChatMessage, ContentPart, InputAudio};

const TRANSCRIBE_SYSTEM_ZH: &str = "你是语音转写助手。把音频内容逐字转写成文字，只输出转写结果，除标点外不要添加任何内容。音频里没有语音时输出空字符串。";
const TRANSCRIBE_SYSTEM_EN: &str = "You are a speech transcription assistant. Transcribe the audio verbatim and output only the transcription. If there is no speech, output an empty string.";

/// Audio container name expected by the model for a browser mime type.
pub fn audio_format(mime_type: &str) -> &'static str {
    let mime = mime_type.to_ascii_lowercase();
    if mime.contains("wav") {
        "wav"
    } else if mime.contains("mp3") || mime.contains("mpeg") {
        "mp3"
    } else if mime.contains("mp4") || mime.contains("m4a") || mime.contains("aac") {
        "mp4"
    } else if mime.contains("webm") {
        "webm"
    } else if mime.contains("ogg") {
        "ogg"
    } else if mime.contains("flac") {
        "flac"
    } else {
        "wav"
    }
}

pub async fn run(
    client: &ModelClient,
    tier: &ModelTier,
    request: TranscribeRequest,
) -> Result<String, ApiError> {
    let audio = request
        .audio
        .filter(|a| !a.is_empty())
        .ok_or_else(|| ApiError::invalid_request("Missing audio field"))?;

    let estimated = estimate_base64_bytes(&audio);
    if estimated > MAX_AUDIO_BYTES {
        return Err(ApiError::with_detail(
            ErrorCode::PayloadTooLarge,
            format!("Audio too large: ~{} bytes (max {})", estimated, MAX_AUDIO_BYTES),
        ));
    }

    let mime = request.mime_type.as_deref().unwrap_or("audio/wav");
    let format = audio_format(mime);
    let mime_base = mime
        .split(';')
        .next()
        .map(str::trim)
        .filter(|m| !m.is_empty())
        .unwrap_or("audio/wav");
    let language = request.language.unwrap_or(Language::En);

    let messages = vec![
        ChatMessage::system(language.pick(TRANSCRIBE_SYSTEM_ZH, TRANSCRIBE_SYSTEM_EN)),
        ChatMessage::user_parts(vec![
            ContentPart::InputAudio {
                input_audio: InputAudio {
                    data: format!("data:{};base64,{}", mime_base, audio),
                    format: format.to_string(),
                },
            },
            ContentPart::text(language.pick("请转写这段音频。", "Please transcribe this audio.")),
        ]),
    ];

    tracing::info!(
        audio_bytes = estimated,
        format,
        language = language.as_str(),
        "Transcription started"
    );

    match client.complete(&tier.name, &messages, tier.timeout()).await {
        Ok(text) => {
            tracing::info!(chars = text.chars().count(), "Transcription finished");
            Ok(text)
        }
        Err(e) => {
            tracing::error!("Transcription failed: {}", e);
            let detail = if e.is_timeout() {
                "Transcription timed out"
            } else {
                "Transcription failed"
            };
            Err(ApiError::with_detail(e.error_code(), detail))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_audio_format_mapping() {
        assert_eq!(audio_format("audio/wav"), "wav");
        assert_eq!(audio_format("audio/mpeg"), "mp3");
        assert_eq!(audio_format("audio/mp4;codecs=mp4a.40.2"), "mp4");
        assert_eq!(audio_format("audio/x-m4a"), "mp4");
        assert_eq!(audio_format("audio/webm;codecs=opus"), "webm");
        assert_eq!(audio_format("audio/ogg"), "ogg");
        assert_eq!(audio_format("audio/flac"), "flac");
        assert_eq!(audio_format("application/octet-stream"), "wav");
    }
}

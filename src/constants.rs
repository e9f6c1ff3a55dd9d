use std::sync::LazyLock;

pub const REQUEST_ID_HEADER: &str = "x-request-id";

pub const MAX_IMAGES: usize = 5;
pub const MAX_IMAGE_BYTES: usize = 4 * 1024 * 1024;
pub const MAX_TOTAL_IMAGE_BYTES: usize = 10 * 1024 * 1024;
pub const MAX_AUDIO_BYTES: usize = 500 * 1024;
pub const MAX_CHAT_MESSAGES: usize = 100;
pub const MAX_MENU_ITEMS_IN_CONTEXT: usize = 200;

pub const SUPPORTED_IMAGE_MIME_TYPES: [&str; 4] =
    ["image/jpeg", "image/png", "image/webp", "image/heic"];

pub static USER_AGENT: LazyLock<String> = LazyLock::new(|| {
    let agent = format!(
        "sage-gateway/{} {}/{}",
        env!("CARGO_PKG_VERSION"),
        std::env::consts::OS,
        std::env::consts::ARCH
    );
    tracing::debug!(user_agent = %agent, "User-Agent initialized");
    agent
});

/// Decoded size of a base64 payload, estimated from its length without decoding it.
pub fn estimate_base64_bytes(data: &str) -> usize {
    data.trim_end_matches('=').len() * 3 / 4
}

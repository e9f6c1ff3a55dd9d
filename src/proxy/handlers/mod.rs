pub mod analyze;
pub mod chat;
pub mod common;
pub mod errors;
pub mod streaming;
pub mod transcribe;

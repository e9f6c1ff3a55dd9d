// Request pipelines sitting between the HTTP handlers and the model client

pub mod analyze;
pub mod chat;
pub mod transcribe;

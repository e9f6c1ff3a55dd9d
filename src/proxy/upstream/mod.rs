pub mod client;
pub mod fallback;
pub mod models;
pub mod sse;
pub mod weather;

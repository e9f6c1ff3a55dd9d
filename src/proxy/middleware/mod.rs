pub mod client_ip;
pub mod cors;
pub mod request_context;

pub use client_ip::ClientIp;
pub use cors::cors_middleware;
pub use request_context::request_context_middleware;

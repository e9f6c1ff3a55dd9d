pub mod config;
pub mod handlers;
pub mod health;
pub mod mappers;
pub mod middleware;
pub mod pipelines;
pub mod prompts;
pub mod rate_limit;
pub mod routes;
pub mod server;
pub mod state;
pub mod upstream;

pub use config::GatewayConfig;
pub use server::{build_app, AxumServer};

#[cfg(test)]
pub mod tests;
